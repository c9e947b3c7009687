//! Substitution: fill a freshly parsed replacement from a match's captures,
//! then rewrite the matched node's parent slot.
//!
//! The parent-slot shape decides everything: scalar slots are overwritten,
//! single elements of list slots are replaced, and list-valued captures are
//! spliced over the elements the match consumed. Shape mismatches that have
//! no sensible adaptation (a statement list where an expression is expected)
//! are errors.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::matcher::ListKind;
use crate::pattern::{from_wild_name, MetaVar};
use crate::syntax::ast::{walk, Ast, Node, NodeId, SlotKind, SlotShape};
use crate::syntax::pos::Span;

/// Record the parent of every node reachable from `root`. List wrappers are
/// transparent: they never get an entry of their own, and their elements
/// point at the wrapper so lookups can pass through the first element.
pub fn fill_parents(ast: &Ast, parents: &mut HashMap<NodeId, NodeId>, root: NodeId) {
    fn go(ast: &Ast, parents: &mut HashMap<NodeId, NodeId>, id: NodeId, parent: Option<NodeId>) {
        if !ast.node(id).is_list() {
            if let Some(p) = parent {
                parents.insert(id, p);
            }
        }
        for child in ast.children(id) {
            go(ast, parents, child, Some(id));
        }
    }
    go(ast, parents, root, None);
}

/// Reset every span under `root` to the no-position sentinel.
pub fn scrub_positions(ast: &mut Ast, root: NodeId) {
    let mut ids = Vec::new();
    walk(ast, root, &mut |id| ids.push(id));
    for id in ids {
        ast.set_span(id, Span::none());
    }
}

pub struct Subst<'a> {
    pub ast: &'a mut Ast,
    pub parents: &'a mut HashMap<NodeId, NodeId>,
    pub vars: &'a [MetaVar],
}

fn node_category(node: &Node) -> SlotKind {
    match node {
        Node::ExprStmt { .. }
        | Node::EmptyStmt
        | Node::LabeledStmt { .. }
        | Node::SendStmt { .. }
        | Node::IncDecStmt { .. }
        | Node::AssignStmt { .. }
        | Node::GoStmt { .. }
        | Node::DeferStmt { .. }
        | Node::ReturnStmt { .. }
        | Node::BranchStmt { .. }
        | Node::BlockStmt { .. }
        | Node::IfStmt { .. }
        | Node::CaseClause { .. }
        | Node::SwitchStmt { .. }
        | Node::TypeSwitchStmt { .. }
        | Node::CommClause { .. }
        | Node::SelectStmt { .. }
        | Node::ForStmt { .. }
        | Node::RangeStmt { .. }
        | Node::DeclStmt { .. } => SlotKind::Stmt,
        Node::GenDecl { .. } | Node::FuncDecl { .. } => SlotKind::Decl,
        Node::ValueSpec { .. } | Node::TypeSpec { .. } | Node::ImportSpec { .. } => SlotKind::Spec,
        Node::Field { .. } => SlotKind::Field,
        _ => SlotKind::Expr,
    }
}

fn describe(node: &Node) -> &'static str {
    match node {
        Node::ExprList(_) => "expression list",
        Node::StmtList(_) => "statement list",
        Node::IdentList(_) => "identifier list",
        Node::FieldList(_) => "field list",
        Node::SpecList(_) => "spec list",
        n => match node_category(n) {
            SlotKind::Stmt => "statement",
            SlotKind::Decl => "declaration",
            SlotKind::Spec => "spec",
            SlotKind::Field => "field",
            SlotKind::Ident | SlotKind::Expr => "expression",
        },
    }
}

impl<'a> Subst<'a> {
    fn shape_err(&self, slot: &str, got: NodeId) -> Error {
        Error::SubstShape {
            slot: slot.to_string(),
            got: describe(self.ast.node(got)).to_string(),
        }
    }

    /// Replace every wildcard identifier in `root` with the value captured
    /// under its user-facing name, returning the (possibly new) root.
    pub fn fill_values(
        &mut self,
        root: NodeId,
        values: &HashMap<String, NodeId>,
    ) -> Result<NodeId> {
        let mut wilds = Vec::new();
        let ast = &*self.ast;
        walk(ast, root, &mut |id| {
            if let Node::Ident { name } = ast.node(id) {
                if let Some(idx) = from_wild_name(name) {
                    wilds.push((id, idx));
                }
            }
        });
        let mut new_root = root;
        for (id, idx) in wilds {
            let name = self.vars[idx].name.as_str();
            if name.is_empty() || name == "_" {
                continue;
            }
            let Some(&value) = values.get(name) else {
                return Err(Error::SubstShape {
                    slot: format!("${name}"),
                    got: "no captured value".to_string(),
                });
            };
            if id == new_root {
                new_root = self.unwrap_scalar(value, SlotKind::Expr).unwrap_or(value);
                continue;
            }
            self.subst_node(id, value)?;
        }
        Ok(new_root)
    }

    /// When a scalar position receives a one-element list capture, use the
    /// element itself.
    fn unwrap_scalar(&self, value: NodeId, _kind: SlotKind) -> Option<NodeId> {
        match self.ast.node(value).list_elems() {
            Some([single]) => Some(*single),
            _ => None,
        }
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        let key = match self.ast.node(node).list_elems() {
            Some(elems) => *elems.first()?,
            None => node,
        };
        self.parents.get(&key).copied()
    }

    fn set_parent(&mut self, node: NodeId, parent: NodeId) {
        let key = match self.ast.node(node).list_elems() {
            Some(elems) => match elems.first() {
                Some(&first) => first,
                None => return,
            },
            None => node,
        };
        self.parents.insert(key, parent);
    }

    fn clear_parent(&mut self, node: NodeId) {
        let key = match self.ast.node(node).list_elems() {
            Some(elems) => match elems.first() {
                Some(&first) => first,
                None => return,
            },
            None => node,
        };
        self.parents.remove(&key);
    }

    /// Substitute `new` into the slot currently holding `old`.
    pub fn subst_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let Some(parent) = self.parent_of(old) else {
            // old was a root, so the replacement becomes one
            self.clear_parent(new);
            return Ok(());
        };
        self.set_parent(new, parent);

        if let Some(old_elems) = self.ast.node(old).list_elems().map(|e| e.to_vec()) {
            // the match consumed a run of a list; splice over it
            let anchor = match old_elems.first() {
                Some(&a) => a,
                None => return Ok(()),
            };
            let (_, kind) = self
                .ast
                .slot_of(parent, anchor)
                .unwrap_or((SlotShape::List, SlotKind::Stmt));
            let new_elems = self.adapt_list(new, kind)?;
            self.stamp_spans(old, &new_elems);
            for &e in &new_elems {
                self.parents.insert(e, parent);
            }
            self.splice(parent, anchor, old_elems.len(), &new_elems);
            return Ok(());
        }

        let Some((shape, kind)) = self.ast.slot_of(parent, old) else {
            return Ok(());
        };
        match shape {
            SlotShape::Scalar => {
                let new = self.adapt_scalar(old, new, kind)?;
                self.parents.insert(new, parent);
                let node = self.ast.node_mut(parent);
                Ast::remap_children(node, &mut |id| if id == old { new } else { id });
            }
            SlotShape::List => {
                let new_elems = self.adapt_list(new, kind)?;
                self.stamp_spans(old, &new_elems);
                for &e in &new_elems {
                    self.parents.insert(e, parent);
                }
                self.splice(parent, old, 1, &new_elems);
            }
        }
        Ok(())
    }

    /// Give position-less installed elements the replaced node's span, so a
    /// list match keeps reporting and deduplicating by where it was. A list
    /// wrapper's own span comes from its first and last elements, so those
    /// are the ones that matter.
    fn stamp_spans(&mut self, old: NodeId, new_elems: &[NodeId]) {
        let old_span = self.ast.span(old);
        if old_span.is_none() {
            return;
        }
        for e in [new_elems.first(), new_elems.last()].into_iter().flatten() {
            if self.ast.raw_span(*e).is_none() {
                self.ast.set_span(*e, old_span);
            }
        }
    }

    fn splice(&mut self, parent: NodeId, anchor: NodeId, old_len: usize, new_elems: &[NodeId]) {
        for list in self.ast.node_lists_mut(parent) {
            if let Some(i) = list.iter().position(|&x| x == anchor) {
                let end = (i + old_len).min(list.len());
                list.splice(i..end, new_elems.iter().copied());
                return;
            }
        }
    }

    /// Fit a replacement into a scalar slot of the given kind.
    fn adapt_scalar(&mut self, old: NodeId, new: NodeId, kind: SlotKind) -> Result<NodeId> {
        let new = match self.unwrap_scalar(new, kind) {
            Some(single) => single,
            None if self.ast.node(new).is_list() => {
                return Err(self.shape_err("node", new));
            }
            None => new,
        };
        let got = node_category(self.ast.node(new));
        let adapted = match (kind, got) {
            (SlotKind::Stmt, SlotKind::Expr) => {
                let stmt = self.ast.alloc(Node::ExprStmt { x: new }, Span::none());
                self.parents.insert(new, stmt);
                stmt
            }
            (SlotKind::Stmt, SlotKind::Decl) => {
                let stmt = self.ast.alloc(Node::DeclStmt { decl: new }, Span::none());
                self.parents.insert(new, stmt);
                stmt
            }
            (SlotKind::Expr, SlotKind::Expr)
            | (SlotKind::Stmt, SlotKind::Stmt)
            | (SlotKind::Decl, SlotKind::Decl)
            | (SlotKind::Spec, SlotKind::Spec)
            | (SlotKind::Field, SlotKind::Field) => new,
            (SlotKind::Ident, _) => {
                if self.ast.ident_name(new).is_none() {
                    return Err(self.shape_err("identifier", new));
                }
                new
            }
            _ => return Err(self.shape_err(describe(self.ast.node(old)), new)),
        };
        // keep reporting and deduplication sensible after the rewrite; the
        // caller's match may still point at the unwrapped node
        let old_span = self.ast.span(old);
        if !old_span.is_none() {
            self.ast.set_span(adapted, old_span);
            if adapted != new && self.ast.raw_span(new).is_none() {
                self.ast.set_span(new, old_span);
            }
        }
        Ok(adapted)
    }

    /// Fit a replacement into a list slot: single nodes become one element,
    /// list captures are spliced elementwise.
    fn adapt_list(&mut self, new: NodeId, kind: SlotKind) -> Result<Vec<NodeId>> {
        let elems = match self.ast.node(new).list_elems() {
            Some(elems) => elems.to_vec(),
            None => vec![new],
        };
        let list_kind = match self.ast.node(new) {
            Node::StmtList(_) => Some(ListKind::Stmt),
            Node::ExprList(_) => Some(ListKind::Expr),
            _ => None,
        };
        // a statement list cannot stand where expressions are expected
        if kind == SlotKind::Expr && list_kind == Some(ListKind::Stmt) {
            return Err(self.shape_err("expressions", new));
        }
        let mut out = Vec::with_capacity(elems.len());
        for e in elems {
            let cat = node_category(self.ast.node(e));
            let adapted = match (kind, cat) {
                (SlotKind::Stmt, SlotKind::Expr) => {
                    let span = self.ast.span(e);
                    self.ast.alloc(Node::ExprStmt { x: e }, span)
                }
                (SlotKind::Stmt, SlotKind::Decl) => {
                    let span = self.ast.span(e);
                    self.ast.alloc(Node::DeclStmt { decl: e }, span)
                }
                (SlotKind::Expr, SlotKind::Stmt) => return Err(self.shape_err("expressions", e)),
                _ => e,
            };
            out.push(adapted);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::parse::parse_any;
    use crate::syntax::printer::print_compact;

    #[test]
    fn fill_parents_skips_list_wrappers() {
        let mut ast = Ast::new();
        let root = parse_any(&mut ast, "a(); b()").unwrap();
        let mut parents = HashMap::new();
        fill_parents(&ast, &mut parents, root);
        assert!(!parents.contains_key(&root));
        let elems: Vec<NodeId> = ast.node(root).list_elems().unwrap().to_vec();
        assert_eq!(parents.get(&elems[0]), Some(&root));
    }

    #[test]
    fn scrub_resets_spans() {
        let mut ast = Ast::new();
        let root = parse_any(&mut ast, "foo(1)").unwrap();
        assert!(!ast.span(root).is_none());
        scrub_positions(&mut ast, root);
        assert!(ast.span(root).is_none());
    }

    #[test]
    fn scalar_substitution_rewrites_parent() {
        let mut ast = Ast::new();
        let root = parse_any(&mut ast, "foo(bar)").unwrap();
        let mut parents = HashMap::new();
        fill_parents(&ast, &mut parents, root);
        let arg = ast.children(root)[1];
        let repl = parse_any(&mut ast, "baz").unwrap();
        let vars = Vec::new();
        let mut s = Subst {
            ast: &mut ast,
            parents: &mut parents,
            vars: &vars,
        };
        s.subst_node(arg, repl).unwrap();
        assert_eq!(print_compact(&ast, root), "foo(baz)");
        assert_eq!(parents.get(&repl), Some(&root));
    }

    #[test]
    fn expression_wraps_into_statement_slot() {
        let mut ast = Ast::new();
        let root = parse_any(&mut ast, "{ a(); b(); }").unwrap();
        let mut parents = HashMap::new();
        fill_parents(&ast, &mut parents, root);
        let stmts = ast.children(root);
        let repl = parse_any(&mut ast, "c").unwrap(); // a bare expression
        let vars = Vec::new();
        let mut s = Subst {
            ast: &mut ast,
            parents: &mut parents,
            vars: &vars,
        };
        s.subst_node(stmts[0], repl).unwrap();
        assert_eq!(print_compact(&ast, root), "{ c; b(); }");
    }

    #[test]
    fn list_capture_splices_into_args() {
        let mut ast = Ast::new();
        let root = parse_any(&mut ast, "f(x)").unwrap();
        let mut parents = HashMap::new();
        fill_parents(&ast, &mut parents, root);
        let arg = ast.children(root)[1];
        let c = parse_any(&mut ast, "c").unwrap();
        let d = parse_any(&mut ast, "d").unwrap();
        let list = ast.alloc(Node::ExprList(vec![c, d]), Span::none());
        let vars = Vec::new();
        let mut s = Subst {
            ast: &mut ast,
            parents: &mut parents,
            vars: &vars,
        };
        s.subst_node(arg, list).unwrap();
        assert_eq!(print_compact(&ast, root), "f(c, d)");
    }

    #[test]
    fn stmt_list_into_expr_slot_is_an_error() {
        let mut ast = Ast::new();
        let root = parse_any(&mut ast, "f(x)").unwrap();
        let mut parents = HashMap::new();
        fill_parents(&ast, &mut parents, root);
        let arg = ast.children(root)[1];
        let stmts = parse_any(&mut ast, "a(); b()").unwrap();
        let vars = Vec::new();
        let mut s = Subst {
            ast: &mut ast,
            parents: &mut parents,
            vars: &vars,
        };
        let err = s.subst_node(arg, stmts).unwrap_err();
        assert!(matches!(err, Error::SubstShape { .. }), "{err}");
    }
}
