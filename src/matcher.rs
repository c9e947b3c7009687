//! Structural matcher: position-independent equality between pattern nodes
//! and target nodes, with wildcard unification and variadic list splicing.
//!
//! Matching is a recursive comparison parameterized by node kind. Wildcard
//! identifiers (`gogrep_<n>`) unify by user-facing name: the first occurrence
//! binds, later occurrences must be structurally equal to the binding.
//! Variadic wildcards consume contiguous runs of list elements, tried
//! longest-first with backtracking so that consecutive variadics and
//! repeated names (`c($*x); c($*x)`) resolve correctly.

use std::collections::HashMap;

use crate::pattern::{from_wild_name, MetaVar, PredKind};
use crate::syntax::ast::{Ast, Node, NodeId};
use crate::syntax::pos::Span;
use crate::syntax::token::TokenKind;
use crate::typeinfo::{assignable, comparable, convertible, identical, TypeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Expr,
    Stmt,
    Ident,
    Field,
    Spec,
}

impl ListKind {
    fn wrapper(self, elems: Vec<NodeId>) -> Node {
        match self {
            ListKind::Expr => Node::ExprList(elems),
            ListKind::Stmt => Node::StmtList(elems),
            ListKind::Ident => Node::IdentList(elems),
            ListKind::Field => Node::FieldList(elems),
            ListKind::Spec => Node::SpecList(elems),
        }
    }
}

pub struct Matcher<'a> {
    pub ast: &'a mut Ast,
    pub vars: &'a [MetaVar],
    pub info: Option<&'a TypeInfo>,
    pub aggressive: bool,
    /// Bindings by wildcard name, accumulated over the current attempt.
    pub values: HashMap<String, NodeId>,
}

/// The sub-lists of a node that splice matching may run over.
pub fn sub_lists(ast: &Ast, id: NodeId) -> Vec<(ListKind, Vec<NodeId>)> {
    let mut out = Vec::new();
    let mut add = |kind: ListKind, list: &[NodeId]| {
        if !list.is_empty() {
            out.push((kind, list.to_vec()));
        }
    };
    match ast.node(id) {
        Node::CompositeLit { elts, .. } => add(ListKind::Expr, elts),
        Node::CallExpr { args, .. } => add(ListKind::Expr, args),
        Node::AssignStmt { lhs, rhs, .. } => {
            add(ListKind::Expr, lhs);
            add(ListKind::Expr, rhs);
        }
        Node::ReturnStmt { results } => add(ListKind::Expr, results),
        Node::BlockStmt { list } => add(ListKind::Stmt, list),
        Node::ValueSpec { values, .. } => add(ListKind::Expr, values),
        Node::CaseClause { list, body } => {
            add(ListKind::Expr, list);
            add(ListKind::Stmt, body);
        }
        Node::CommClause { body, .. } => add(ListKind::Stmt, body),
        _ => {}
    }
    out
}

impl<'a> Matcher<'a> {
    pub fn new(
        ast: &'a mut Ast,
        vars: &'a [MetaVar],
        info: Option<&'a TypeInfo>,
        aggressive: bool,
    ) -> Matcher<'a> {
        Matcher {
            ast,
            vars,
            info,
            aggressive,
            values: HashMap::new(),
        }
    }

    /// Match at this exact node. For list-wrapper pairs of the same kind a
    /// partial splice is attempted; the returned node is the matched region.
    /// A bare `$*x` pattern splices over any list, so it can match `a; b`.
    pub fn top_match(&mut self, pat: NodeId, node: NodeId) -> Option<NodeId> {
        let pair = match (self.ast.node(pat), self.ast.node(node)) {
            (Node::StmtList(p), Node::StmtList(n)) => Some((p.clone(), n.clone(), ListKind::Stmt)),
            (Node::ExprList(p), Node::ExprList(n)) => Some((p.clone(), n.clone(), ListKind::Expr)),
            _ => match (self.is_variadic(pat), self.ast.node(node)) {
                (Some(_), n) if n.is_list() => {
                    let elems = n.list_elems().unwrap_or_default().to_vec();
                    let kind = match n {
                        Node::ExprList(_) => ListKind::Expr,
                        Node::IdentList(_) => ListKind::Ident,
                        Node::FieldList(_) => ListKind::Field,
                        Node::SpecList(_) => ListKind::Spec,
                        _ => ListKind::Stmt,
                    };
                    Some((vec![pat], elems, kind))
                }
                _ => None,
            },
        };
        if let Some((pats, nodes, kind)) = pair {
            let (start, end) = self.list_match(&pats, &nodes, true, kind)?;
            if start == 0 && end == nodes.len() {
                return Some(node);
            }
            let sub = kind.wrapper(nodes[start..end].to_vec());
            return Some(self.ast.alloc(sub, Span::none()));
        }
        if self.node_match(pat, node) {
            Some(node)
        } else {
            None
        }
    }

    /// The meta-var index of a wildcard pattern element, seeing through an
    /// expression-statement or anonymous-field wrapping. Synthesized case
    /// clauses are deliberately not unwrapped here; only an all-synthetic
    /// switch body strips them, via `cases_match`.
    pub fn wild_idx(&self, id: NodeId) -> Option<usize> {
        match self.ast.node(id) {
            Node::Ident { name } => from_wild_name(name),
            Node::ExprStmt { x } => match self.ast.node(*x) {
                Node::Ident { name } => from_wild_name(name),
                _ => None,
            },
            Node::Field { names, typ: Some(t), .. } if names.is_empty() => {
                match self.ast.node(*t) {
                    Node::Ident { name } => from_wild_name(name),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn is_variadic(&self, id: NodeId) -> Option<usize> {
        let idx = self.wild_idx(id)?;
        if self.vars.get(idx).is_some_and(|v| v.variadic) {
            Some(idx)
        } else {
            None
        }
    }

    /// The wildcard inside a `case gogrep_N: gogrep_body` clause synthesized
    /// by the token mill, if this is one.
    fn synthetic_clause_wild(&self, id: NodeId) -> Option<NodeId> {
        let (expr, body) = match self.ast.node(id) {
            Node::CaseClause { list, body } if list.len() == 1 && body.len() == 1 => {
                (list[0], body[0])
            }
            Node::CommClause {
                comm: Some(c),
                body,
            } if body.len() == 1 => match self.ast.node(*c) {
                Node::ExprStmt { x } => (*x, body[0]),
                _ => return None,
            },
            _ => return None,
        };
        let is_body_marker = match self.ast.node(body) {
            Node::ExprStmt { x } => self.ast.ident_name(*x) == Some("gogrep_body"),
            _ => false,
        };
        if !is_body_marker {
            return None;
        }
        match self.ast.node(expr) {
            Node::Ident { name } if from_wild_name(name).is_some() => Some(expr),
            _ => None,
        }
    }

    fn ident_like(&self, id: NodeId) -> Option<String> {
        match self.ast.node(id) {
            Node::Ident { name } => Some(name.clone()),
            Node::ExprStmt { x } => match self.ast.node(*x) {
                Node::Ident { name } => Some(name.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    fn wildcard_match(&mut self, idx: usize, node: NodeId) -> bool {
        let var = &self.vars[idx];
        if var.name == "_" {
            // values are discarded, matches anything
            return true;
        }
        let name = var.name.clone();
        if !var.name_rxs.is_empty() {
            let Some(s) = self.ident_like(node) else {
                return false;
            };
            if !self.vars[idx].name_rxs.iter().all(|rx| rx.is_match(&s)) {
                return false;
            }
        }
        if let Some(&prev) = self.values.get(&name) {
            // multiple uses must match
            if !self.node_match(prev, node) {
                return false;
            }
        } else {
            self.values.insert(name, node);
        }
        self.type_preds(idx, node)
    }

    fn type_preds(&mut self, idx: usize, node: NodeId) -> bool {
        let var = &self.vars[idx];
        if !var.is_typed() {
            return true;
        }
        let Some(info) = self.info else {
            return false;
        };
        let t = info.type_of(node).clone();
        for pred in &var.type_preds {
            let Some(want) = &pred.typ else {
                return false;
            };
            let ok = match pred.kind {
                PredKind::Identical => identical(&t, want),
                PredKind::Assignable => assignable(&t, want),
                PredKind::Convertible => convertible(&t, want),
            };
            if !ok {
                return false;
            }
        }
        if let Some(kind) = var.underlying {
            if t.kind() != Some(kind) {
                return false;
            }
        }
        if var.comparable && !comparable(&t) {
            return false;
        }
        if var.addressable && !info.addressable(self.ast, node) {
            return false;
        }
        true
    }

    fn opt_match(&mut self, a: Option<NodeId>, b: Option<NodeId>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.node_match(a, b),
            _ => false,
        }
    }

    pub fn node_match(&mut self, pat: NodeId, node: NodeId) -> bool {
        if let Node::Ident { name } = self.ast.node(pat) {
            if let Some(idx) = from_wild_name(name) {
                if self.vars[idx].variadic {
                    // variadic wildcards only consume list runs
                    return false;
                }
                return self.wildcard_match(idx, node);
            }
        }
        if !self.aggressive {
            return self.exact_match(pat, node);
        }
        let saved = self.values.clone();
        if self.exact_match(pat, node) {
            return true;
        }
        self.values = saved.clone();
        if self.relaxed_match(pat, node) {
            return true;
        }
        self.values = saved;
        false
    }

    fn exact_match(&mut self, pat: NodeId, node: NodeId) -> bool {
        use Node::*;
        let p = self.ast.node(pat).clone();
        let n = self.ast.node(node).clone();
        match (p, n) {
            (Ident { name: a }, Ident { name: b }) => a == b,
            (
                BasicLit { kind: k1, value: v1 },
                BasicLit { kind: k2, value: v2 },
            ) => k1 == k2 && v1 == v2,
            (
                CompositeLit { typ: t1, elts: e1 },
                CompositeLit { typ: t2, elts: e2 },
            ) => self.opt_match(t1, t2) && self.lists_eq(&e1, &e2, ListKind::Expr),
            (FuncLit { typ: t1, body: b1 }, FuncLit { typ: t2, body: b2 }) => {
                self.node_match(t1, t2) && self.node_match(b1, b2)
            }
            (Ellipsis { elt: e1 }, Ellipsis { elt: e2 }) => self.opt_match(e1, e2),
            (ParenExpr { x: x1 }, ParenExpr { x: x2 }) => self.node_match(x1, x2),
            (
                SelectorExpr { x: x1, sel: s1 },
                SelectorExpr { x: x2, sel: s2 },
            ) => self.node_match(x1, x2) && self.node_match(s1, s2),
            (
                IndexExpr { x: x1, index: i1 },
                IndexExpr { x: x2, index: i2 },
            ) => self.node_match(x1, x2) && self.node_match(i1, i2),
            (
                SliceExpr {
                    x: x1,
                    low: l1,
                    high: h1,
                    max: m1,
                },
                SliceExpr {
                    x: x2,
                    low: l2,
                    high: h2,
                    max: m2,
                },
            ) => {
                self.node_match(x1, x2)
                    && self.opt_match(l1, l2)
                    && self.opt_match(h1, h2)
                    && self.opt_match(m1, m2)
            }
            (
                TypeAssertExpr { x: x1, typ: t1 },
                TypeAssertExpr { x: x2, typ: t2 },
            ) => self.node_match(x1, x2) && self.opt_match(t1, t2),
            (
                CallExpr {
                    fun: f1,
                    args: a1,
                    has_ellipsis: e1,
                },
                CallExpr {
                    fun: f2,
                    args: a2,
                    has_ellipsis: e2,
                },
            ) => e1 == e2 && self.node_match(f1, f2) && self.lists_eq(&a1, &a2, ListKind::Expr),
            (StarExpr { x: x1 }, StarExpr { x: x2 }) => self.node_match(x1, x2),
            (UnaryExpr { op: o1, x: x1 }, UnaryExpr { op: o2, x: x2 }) => {
                o1 == o2 && self.node_match(x1, x2)
            }
            (
                BinaryExpr { op: o1, x: x1, y: y1 },
                BinaryExpr { op: o2, x: x2, y: y2 },
            ) => o1 == o2 && self.node_match(x1, x2) && self.node_match(y1, y2),
            (
                KeyValueExpr { key: k1, value: v1 },
                KeyValueExpr { key: k2, value: v2 },
            ) => self.node_match(k1, k2) && self.node_match(v1, v2),
            (ArrayType { len: l1, elt: e1 }, ArrayType { len: l2, elt: e2 }) => {
                self.opt_match(l1, l2) && self.node_match(e1, e2)
            }
            (StructType { fields: f1 }, StructType { fields: f2 }) => {
                self.lists_eq(&f1, &f2, ListKind::Field)
            }
            (
                Field {
                    names: n1,
                    typ: t1,
                    tag: tag1,
                },
                Field {
                    names: n2, typ: t2, ..
                },
            ) => {
                // allow a bare $var to match a whole field
                if n1.is_empty() && tag1.is_none() {
                    if let Some(t1) = t1 {
                        let saved = self.values.clone();
                        if self.node_match(t1, node) {
                            return true;
                        }
                        self.values = saved;
                    }
                }
                self.lists_eq(&n1, &n2, ListKind::Ident) && self.opt_match(t1, t2)
            }
            (
                FuncType {
                    params: p1,
                    results: r1,
                },
                FuncType {
                    params: p2,
                    results: r2,
                },
            ) => self.lists_eq(&p1, &p2, ListKind::Field) && self.lists_eq(&r1, &r2, ListKind::Field),
            (InterfaceType { methods: m1 }, InterfaceType { methods: m2 }) => {
                self.lists_eq(&m1, &m2, ListKind::Field)
            }
            (
                MapType { key: k1, value: v1 },
                MapType { key: k2, value: v2 },
            ) => self.node_match(k1, k2) && self.node_match(v1, v2),
            (
                ChanType { dir: d1, value: v1 },
                ChanType { dir: d2, value: v2 },
            ) => d1 == d2 && self.node_match(v1, v2),
            (ExprStmt { x: x1 }, _) => {
                // prefer matching $x as a statement, to match any statement
                if let Node::Ident { name } = self.ast.node(x1) {
                    if let Some(idx) = from_wild_name(name) {
                        if self.vars[idx].variadic {
                            return false;
                        }
                        return self.wildcard_match(idx, node);
                    }
                }
                match self.ast.node(node) {
                    Node::ExprStmt { x: x2 } => {
                        let x2 = *x2;
                        self.node_match(x1, x2)
                    }
                    _ => false,
                }
            }
            (EmptyStmt, EmptyStmt) => true,
            (
                LabeledStmt { label: l1, stmt: s1 },
                LabeledStmt { label: l2, stmt: s2 },
            ) => self.node_match(l1, l2) && self.node_match(s1, s2),
            (
                SendStmt { chan: c1, value: v1 },
                SendStmt { chan: c2, value: v2 },
            ) => self.node_match(c1, c2) && self.node_match(v1, v2),
            (IncDecStmt { x: x1, op: o1 }, IncDecStmt { x: x2, op: o2 }) => {
                o1 == o2 && self.node_match(x1, x2)
            }
            (
                AssignStmt {
                    lhs: l1,
                    op: o1,
                    rhs: r1,
                },
                AssignStmt {
                    lhs: l2,
                    op: o2,
                    rhs: r2,
                },
            ) => {
                o1 == o2 && self.lists_eq(&l1, &l2, ListKind::Expr)
                    && self.lists_eq(&r1, &r2, ListKind::Expr)
            }
            (GoStmt { call: c1 }, GoStmt { call: c2 }) => self.node_match(c1, c2),
            (DeferStmt { call: c1 }, DeferStmt { call: c2 }) => self.node_match(c1, c2),
            (ReturnStmt { results: r1 }, ReturnStmt { results: r2 }) => {
                self.lists_eq(&r1, &r2, ListKind::Expr)
            }
            (
                BranchStmt { op: o1, label: l1 },
                BranchStmt { op: o2, label: l2 },
            ) => o1 == o2 && self.opt_match(l1, l2),
            (BlockStmt { list: l1 }, BlockStmt { list: l2 }) => {
                if let Some(true) = self.cases_match(&l1, &l2) {
                    return true;
                }
                self.lists_eq(&l1, &l2, ListKind::Stmt)
            }
            (
                IfStmt {
                    init: i1,
                    cond: c1,
                    body: b1,
                    els: e1,
                },
                IfStmt {
                    init: i2,
                    cond: c2,
                    body: b2,
                    els: e2,
                },
            ) => {
                let h1 = header(&[i1, Some(c1)]);
                let h2 = header(&[i2, Some(c2)]);
                self.lists_eq(&h1, &h2, ListKind::Stmt)
                    && self.node_match(b1, b2)
                    && self.opt_match(e1, e2)
            }
            (
                CaseClause { list: l1, body: b1 },
                CaseClause { list: l2, body: b2 },
            ) => self.lists_eq(&l1, &l2, ListKind::Expr) && self.lists_eq(&b1, &b2, ListKind::Stmt),
            (
                SwitchStmt {
                    init: i1,
                    tag: t1,
                    body: b1,
                },
                SwitchStmt {
                    init: i2,
                    tag: t2,
                    body: b2,
                },
            ) => {
                let h1 = header(&[i1, t1]);
                let h2 = header(&[i2, t2]);
                self.lists_eq(&h1, &h2, ListKind::Stmt) && self.node_match(b1, b2)
            }
            (
                TypeSwitchStmt {
                    init: i1,
                    assign: a1,
                    body: b1,
                },
                TypeSwitchStmt {
                    init: i2,
                    assign: a2,
                    body: b2,
                },
            ) => {
                let h1 = header(&[i1, Some(a1)]);
                let h2 = header(&[i2, Some(a2)]);
                self.lists_eq(&h1, &h2, ListKind::Stmt) && self.node_match(b1, b2)
            }
            (
                CommClause { comm: c1, body: b1 },
                CommClause { comm: c2, body: b2 },
            ) => self.opt_match(c1, c2) && self.lists_eq(&b1, &b2, ListKind::Stmt),
            (SelectStmt { body: b1 }, SelectStmt { body: b2 }) => self.node_match(b1, b2),
            (
                ForStmt {
                    init: i1,
                    cond: c1,
                    post: p1,
                    body: b1,
                },
                ForStmt {
                    init: i2,
                    cond: c2,
                    post: p2,
                    body: b2,
                },
            ) => {
                let h1 = header(&[i1, c1, p1]);
                let h2 = header(&[i2, c2, p2]);
                self.lists_eq(&h1, &h2, ListKind::Stmt) && self.node_match(b1, b2)
            }
            (
                ForStmt {
                    init: None,
                    cond: Some(c1),
                    post: None,
                    body: b1,
                },
                RangeStmt {
                    key,
                    value,
                    x,
                    body: b2,
                    ..
                },
            ) => {
                // `for $*xs {}` also covers range loops
                let Some(idx) = self.is_variadic(c1) else {
                    return false;
                };
                let hdr = header(&[key, value, Some(x)]);
                let run = self.bind_run(idx, &hdr, ListKind::Stmt);
                run && self.node_match(b1, b2)
            }
            (
                RangeStmt {
                    key: k1,
                    value: v1,
                    op: o1,
                    x: x1,
                    body: b1,
                },
                RangeStmt {
                    key: k2,
                    value: v2,
                    op: o2,
                    x: x2,
                    body: b2,
                },
            ) => {
                let (k1, o1) = self.norm_range(k1, v1, o1);
                let (k2, o2) = self.norm_range(k2, v2, o2);
                o1 == o2
                    && self.opt_match(k1, k2)
                    && self.opt_match(v1, v2)
                    && self.node_match(x1, x2)
                    && self.node_match(b1, b2)
            }
            (DeclStmt { decl: d1 }, DeclStmt { decl: d2 }) => self.node_match(d1, d2),
            (
                GenDecl {
                    op: o1, specs: s1, ..
                },
                GenDecl {
                    op: o2, specs: s2, ..
                },
            ) => o1 == o2 && self.lists_eq(&s1, &s2, ListKind::Spec),
            (
                ValueSpec {
                    names: n1,
                    typ: t1,
                    values: v1,
                },
                ValueSpec {
                    names: n2,
                    typ: t2,
                    values: v2,
                },
            ) => {
                if self.aggressive && n1.len() == 1 && n2.len() > 1 {
                    // a name in a grouped spec matches the single form
                    let one_name = n2.iter().any(|&n| {
                        let saved = self.values.clone();
                        if self.node_match(n1[0], n) {
                            true
                        } else {
                            self.values = saved;
                            false
                        }
                    });
                    return one_name
                        && self.opt_match(t1, t2)
                        && self.lists_eq(&v1, &v2, ListKind::Expr);
                }
                self.lists_eq(&n1, &n2, ListKind::Ident)
                    && self.opt_match(t1, t2)
                    && self.lists_eq(&v1, &v2, ListKind::Expr)
            }
            (
                TypeSpec {
                    name: n1, typ: t1, ..
                },
                TypeSpec {
                    name: n2, typ: t2, ..
                },
            ) => self.node_match(n1, n2) && self.node_match(t1, t2),
            (
                ImportSpec { name: n1, path: p1 },
                ImportSpec { name: n2, path: p2 },
            ) => self.opt_match(n1, n2) && self.node_match(p1, p2),
            (
                FuncDecl {
                    recv: r1,
                    name: n1,
                    typ: t1,
                    body: b1,
                },
                FuncDecl {
                    recv: r2,
                    name: n2,
                    typ: t2,
                    body: b2,
                },
            ) => {
                self.opt_match(r1, r2)
                    && self.node_match(n1, n2)
                    && self.node_match(t1, t2)
                    && self.opt_match(b1, b2)
            }
            (File { name: n1, decls: d1 }, File { name: n2, decls: d2 }) => {
                self.node_match(n1, n2) && self.lists_eq(&d1, &d2, ListKind::Spec)
            }
            (ExprList(a), ExprList(b)) => self.lists_eq(&a, &b, ListKind::Expr),
            (StmtList(a), StmtList(b)) => self.lists_eq(&a, &b, ListKind::Stmt),
            (IdentList(a), IdentList(b)) => self.lists_eq(&a, &b, ListKind::Ident),
            (FieldList(a), FieldList(b)) => self.lists_eq(&a, &b, ListKind::Field),
            (SpecList(a), SpecList(b)) => self.lists_eq(&a, &b, ListKind::Spec),
            _ => false,
        }
    }

    /// The aggressive-mode OR-branches: statement/block flattening, the
    /// three value-binding forms, and single-case blocks.
    fn relaxed_match(&mut self, pat: NodeId, node: NodeId) -> bool {
        let p = self.ast.node(pat).clone();
        let n = self.ast.node(node).clone();
        // a statement matches a block holding only it, both ways
        if let Node::BlockStmt { list } = &p {
            if list.len() == 1 && !matches!(n, Node::BlockStmt { .. }) {
                if self.node_match(list[0], node) {
                    return true;
                }
            }
            // a block matches a single case clause via the clause's body
            if let Node::CaseClause { body, .. } | Node::CommClause { body, .. } = &n {
                let (l1, body) = (list.clone(), body.clone());
                if self.lists_eq(&l1, &body, ListKind::Stmt) {
                    return true;
                }
            }
        }
        if let Node::BlockStmt { list } = &n {
            if list.len() == 1 && !matches!(p, Node::BlockStmt { .. }) {
                if self.node_match(pat, list[0]) {
                    return true;
                }
            }
        }
        // `x := y`, `x = y`, and `var x = y` all bind a value to a name
        if let (Some((l1, r1)), Some((l2, r2))) = (self.as_binding(pat), self.as_binding(node)) {
            if self.lists_eq(&l1, &l2, ListKind::Expr) && self.lists_eq(&r1, &r2, ListKind::Expr) {
                return true;
            }
        }
        false
    }

    /// The lhs/rhs of a binding statement: `x = y`, `x := y`, `var x = y`.
    /// Only statements qualify, so a `var` decl is not double-counted
    /// through its spec.
    fn as_binding(&self, id: NodeId) -> Option<(Vec<NodeId>, Vec<NodeId>)> {
        match self.ast.node(id) {
            Node::AssignStmt { lhs, op, rhs }
                if matches!(op, TokenKind::Assign | TokenKind::Define) =>
            {
                Some((lhs.clone(), rhs.clone()))
            }
            Node::DeclStmt { decl } => match self.ast.node(*decl) {
                Node::GenDecl { op, specs, .. }
                    if *op == TokenKind::Var && specs.len() == 1 =>
                {
                    match self.ast.node(specs[0]) {
                        Node::ValueSpec {
                            names,
                            typ: None,
                            values,
                        } if !values.is_empty() => Some((names.clone(), values.clone())),
                        _ => None,
                    }
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn norm_range(
        &self,
        key: Option<NodeId>,
        value: Option<NodeId>,
        op: TokenKind,
    ) -> (Option<NodeId>, TokenKind) {
        if self.aggressive
            && value.is_none()
            && op == TokenKind::Assign
            && key.is_some_and(|k| self.ast.ident_name(k) == Some("_"))
        {
            return (None, TokenKind::Illegal);
        }
        (key, op)
    }

    /// A switch/select body where every pattern statement is a synthesized
    /// wildcard case matches the wildcards against the clause list itself.
    fn cases_match(&mut self, pats: &[NodeId], tgts: &[NodeId]) -> Option<bool> {
        if !tgts.iter().all(|&t| {
            matches!(
                self.ast.node(t),
                Node::CaseClause { .. } | Node::CommClause { .. }
            )
        }) {
            return None;
        }
        let mut wilds = Vec::with_capacity(pats.len());
        for &p in pats {
            wilds.push(self.synthetic_clause_wild(p)?);
        }
        Some(self.lists_eq(&wilds, tgts, ListKind::Stmt))
    }

    fn lists_eq(&mut self, pats: &[NodeId], nodes: &[NodeId], kind: ListKind) -> bool {
        self.list_match(pats, nodes, false, kind).is_some()
    }

    /// Match a pattern element list against a target list. With `partial`,
    /// any contiguous sub-range may match; the smallest start wins, and
    /// variadic runs are tried longest-first.
    pub fn list_match(
        &mut self,
        pats: &[NodeId],
        nodes: &[NodeId],
        partial: bool,
        kind: ListKind,
    ) -> Option<(usize, usize)> {
        if !partial {
            let saved = self.values.clone();
            if let Some(end) = self.match_seq(pats, nodes, 0, 0, false, kind) {
                debug_assert_eq!(end, nodes.len());
                return Some((0, end));
            }
            self.values = saved;
            return None;
        }
        for start in 0..=nodes.len() {
            let saved = self.values.clone();
            if let Some(end) = self.match_seq(pats, nodes, 0, start, true, kind) {
                return Some((start, end));
            }
            self.values = saved;
        }
        None
    }

    fn match_seq(
        &mut self,
        pats: &[NodeId],
        nodes: &[NodeId],
        p: usize,
        n: usize,
        trailing_ok: bool,
        kind: ListKind,
    ) -> Option<usize> {
        if p == pats.len() {
            if n == nodes.len() || trailing_ok {
                return Some(n);
            }
            return None;
        }
        if let Some(idx) = self.is_variadic(pats[p]) {
            // try run lengths from the remainder downwards
            for len in (0..=nodes.len() - n).rev() {
                let saved = self.values.clone();
                if self.bind_run(idx, &nodes[n..n + len], kind) {
                    if let Some(end) = self.match_seq(pats, nodes, p + 1, n + len, trailing_ok, kind)
                    {
                        return Some(end);
                    }
                }
                self.values = saved;
            }
            return None;
        }
        if n >= nodes.len() {
            return None;
        }
        let saved = self.values.clone();
        if self.node_match(pats[p], nodes[n]) {
            if let Some(end) = self.match_seq(pats, nodes, p + 1, n + 1, trailing_ok, kind) {
                return Some(end);
            }
        }
        self.values = saved;
        None
    }

    /// Bind a variadic wildcard to a run of nodes, as a list wrapper.
    fn bind_run(&mut self, idx: usize, run: &[NodeId], kind: ListKind) -> bool {
        let name = self.vars[idx].name.clone();
        if name == "_" {
            return true;
        }
        let wrapper = self.ast.alloc(kind.wrapper(run.to_vec()), Span::none());
        if let Some(&prev) = self.values.get(&name) {
            return self.node_match(prev, wrapper);
        }
        self.values.insert(name, wrapper);
        true
    }
}

fn header(slots: &[Option<NodeId>]) -> Vec<NodeId> {
    slots.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{self, MetaVar};
    use crate::pattern::parse::parse_any;

    struct Fixture {
        ast: Ast,
        vars: Vec<MetaVar>,
    }

    impl Fixture {
        fn new() -> Fixture {
            Fixture {
                ast: Ast::new(),
                vars: Vec::new(),
            }
        }

        fn compile(&mut self, src: &str) -> NodeId {
            pattern::compile(&mut self.ast, &mut self.vars, src)
                .unwrap_or_else(|e| panic!("{src:?}: {e}"))
                .root
        }

        fn target(&mut self, src: &str) -> NodeId {
            parse_any(&mut self.ast, src).unwrap_or_else(|e| panic!("{src:?}: {e}"))
        }

        fn matches(&mut self, pat: NodeId, node: NodeId) -> bool {
            let mut m = Matcher::new(&mut self.ast, &self.vars, None, false);
            m.top_match(pat, node).is_some()
        }
    }

    fn check(pat: &str, target: &str, want: bool) {
        let mut f = Fixture::new();
        let p = f.compile(pat);
        let t = f.target(target);
        assert_eq!(f.matches(p, t), want, "pattern {pat:?} vs {target:?}");
    }

    #[test]
    fn literal_equality() {
        check("123", "123", true);
        check("123", "124", false);
        check("false", "true", false);
        check("\"foo\"", "\"foo\"", true);
    }

    #[test]
    fn wildcard_unification() {
        check("foo($x, $x)", "foo(1, 1)", true);
        check("foo($x, $x)", "foo(1, 2)", false);
        check("foo($_, $_)", "foo(1, 2)", true);
        check("foo($x, $y, $y)", "foo(1, 2, 2)", true);
        check("$x + $x", "a + a", true);
        check("$x - $x", "a - b", false);
    }

    #[test]
    fn operators_and_kinds_must_agree() {
        check("$x == $y", "a == b", true);
        check("$x == $y", "a != b", false);
        check("($x)", "(a + b)", true);
        check("($x)", "a + b", false);
    }

    #[test]
    fn variadic_args() {
        check("print($*x)", "print()", true);
        check("print($*x)", "print(a, b)", true);
        check("print($*x, $y, $*z)", "print(a)", true);
        check("print($*x, $y, $*z)", "print(a, b, c)", true);
        check("print($*_, $x)", "print(a, b, c)", true);
        check("foo($x...)", "foo(a)", false);
        check("append($x, $y...)", "append(a, bs...)", true);
    }

    #[test]
    fn variadic_repetition_must_agree() {
        check("c($*x); c($*x)", "c(); c()", true);
        check("c($*x); c($*x)", "c(x); c(y)", false);
        check("c($*x); c($*x)", "c(x, y); c(z)", false);
        check("c($*x); c($*x)", "c(x, y); c(x, y)", true);
        check("c($*x, y); c($*x, y)", "c(x, y); c(x, y)", true);
        check("c($*x, $*y); c($*x, $*y)", "c(x, y); c(x, y)", true);
    }

    #[test]
    fn statement_lists_splice_partially() {
        check("b; c", "b; c", true);
        check("b; c", "a; b; c; d", true);
        check("b; c", "b; x; c", false);
        check("$*_; b; $*_", "a; b; c; d", true);
        check("$x(); $y()", "a(); b()", true);
        check("$x(); $y()", "a()", false);
        // expressions do not imply partial matches
        check("b, c", "a, b, c, d", false);
    }

    #[test]
    fn splice_returns_subrange() {
        let mut f = Fixture::new();
        let p = f.compile("b; c");
        let t = f.target("a; b; c; d");
        let mut m = Matcher::new(&mut f.ast, &f.vars, None, false);
        let found = m.top_match(p, t).unwrap();
        assert_eq!(
            crate::syntax::printer::print_compact(m.ast, found),
            "b; c"
        );
    }

    #[test]
    fn mixing_list_kinds_fails() {
        check("$x, $y", "1; 2", false);
        check("$x; $y", "1, 2", false);
    }

    #[test]
    fn header_wildcards() {
        check("if $*x {}", "if a {}", true);
        check("if $*x {}", "if a(); b {}", true);
        check("if $*_ {} else {}", "if a(); b {}", false);
        check("if $*_; b {}", "if b {}", true);
        check("if $*_; b {}", "if a := f(); b {}", true);
        check("if a(); $*_ {}", "if b {}", false);
        check("for $*x {}", "for {}", true);
        check("for $*x {}", "for a {}", true);
        check("for $*x {}", "for i(); a; p() {}", true);
        check("for $*x; b; $*x {}", "for b {}", true);
        check("for $*x; b; $*x {}", "for a(); b; a() {}", true);
        check("for $*x; b; $*x {}", "for a(); b; c() {}", false);
        check("for a(); $*_; {}", "for b {}", false);
        check("for ; $*_; c() {}", "for b {}", false);
        check("switch $*x {}", "switch a {}", true);
        check("switch $*x {}", "switch a(); b {}", true);
        check("switch $*_; b {}", "switch b := f(); b {}", true);
        check("switch $*_; b {}", "switch b := f(); c {}", false);
        check("switch $_ {}", "switch x; y {}", false);
        check("switch $_; $_ {}", "switch x; y {}", true);
        check("switch $_; $_ {}", "switch x {}", false);
    }

    #[test]
    fn header_wildcards_unify_across_statements() {
        check("if $*x {}; if $*x {}", "if a(); b {}; if a(); b {}", true);
        check("if $*x {}; if $*x {}", "if a(); b {}; if b {}", false);
        check(
            "for $*x {}; for $*x {}",
            "for i(); a; p() {}; for i(); a; p() {}",
            true,
        );
        check(
            "for $*x {}; for $*x {}",
            "for i(); a; p() {}; for i(); b; p() {}",
            false,
        );
        check("if $*x {}; for $*x {}", "if a(); b {}; for a(); b; {}", true);
        check(
            "if $*x {}; for $*x {}",
            "if a(); b {}; for a(); b; c() {}",
            false,
        );
    }

    #[test]
    fn range_loops() {
        check("for $x := range $y { $z }", "for i := range l { c() }", true);
        check("for $x := range $y { $z }", "for i = range l { c() }", false);
        check("for $x = range $y { $z }", "for i := range l { c() }", false);
        check("for range $y { $z }", "for _, e := range l { e() }", false);
        check("for $_ {}", "for range x {}", false);
        check("for $*_ {}", "for range x {}", true);
        check("for $*_ {}", "for _, v := range x {}", true);
    }

    #[test]
    fn case_clause_wildcards() {
        check("switch x {case 4: x}", "switch x {case 4: x}", true);
        check("switch x {case 4: x}", "switch x {case 5: x}", false);
        check("switch {$_}", "switch {case 5: x}", true);
        check("switch x {$*_}", "switch x {case 5: x}", true);
        check("switch x {$*_}", "switch x {}", true);
        check("switch x {$*_}", "switch x {case 1: a; case 2: b}", true);
        check("switch {$a; $a}", "switch {case true: a; case true: a}", true);
        check("switch {$a; $a}", "switch {case true: a; case true: b}", false);
        check("switch { $*_; case $*_: $*a }", "switch { case x: y() }", false);
        check("select {$*_}", "select {case <-x: a}", true);
        check("select {$*_}", "select {}", true);
        check("select {$a; $a}", "select {case <-x: a; case <-x: a}", true);
        check("select {$a; $a}", "select {case <-x: a; case <-x: b}", false);
        check(
            "select {case x := <-y: f(x)}",
            "select {case x := <-y: f(x)}",
            true,
        );
    }

    #[test]
    fn aggressive_relaxations() {
        fn check_aggr(pat: &str, target: &str, want: bool) {
            let mut f = Fixture::new();
            let p = f.compile(pat);
            let compiled_aggressive = pat.starts_with('~');
            let t = f.target(target);
            let mut m = Matcher::new(&mut f.ast, &f.vars, None, compiled_aggressive);
            assert_eq!(m.top_match(p, t).is_some(), want, "{pat:?} vs {target:?}");
        }
        check_aggr("for range $x {}", "for _ = range a {}", false);
        check_aggr("~ for range $x {}", "for _ = range a {}", true);
        check_aggr("~ for _ = range $x {}", "for range a {}", true);
        check_aggr("a = b", "a := b", false);
        check_aggr("~ a = b", "a := b", true);
        check_aggr("~ a := b", "a = b", true);
        check_aggr("~ a = b", "var a = b", true);
    }

    #[test]
    fn value_specs() {
        // bare `$_ int` spec patterns are reached by the query walk; at the
        // declaration level the shapes must line up exactly
        check("var $x int", "var a int", true);
        check("var $x int", "var a int = 3", false);
        check("const $x = $y", "const a = b", true);
        check("const $x = $y", "const (a = b)", true);
    }

    #[test]
    fn func_decls() {
        check(
            "func $_($x $y) $y { return $x }",
            "func a(i int) int { return i }",
            true,
        );
        check("func $x(i int)", "func a(i int)", true);
        check("func $x(i int) {}", "func a(i int)", false);
        check("func $_() $*_ { $*_ }", "func f() {}", true);
        check(
            "func $_() $*_ { $*_ }",
            "func f() (int, error) { return 3, nil }",
            true,
        );
    }

    #[test]
    fn type_exprs() {
        check("[8]$x", "[8]int", true);
        check("struct{field $t}", "struct{field int}", true);
        check("struct{field $t}", "struct{other int}", false);
        check("struct{field $t}", "struct{f1, f2 int}", false);
        check("interface{$x() int}", "interface{i() int}", true);
        check("chan $x", "chan bool", true);
        check("<-chan $x", "chan bool", false);
        check("chan $x", "chan<- bool", false);
        check(
            "struct{$*_; Foo $t; $*_}",
            "struct{Foo string; a int; B}",
            true,
        );
    }

    #[test]
    fn regex_constrained_wildcards() {
        let mut f = Fixture::new();
        let p = f.compile("$(x /^foo.*/)");
        let t1 = f.target("foobar");
        let t2 = f.target("barfoo");
        assert!(f.matches(p, t1));
        assert!(!f.matches(p, t2));
    }

    #[test]
    fn regex_needs_ident_like_candidate() {
        let mut f = Fixture::new();
        let p = f.compile("$(x /.*/)");
        let t = f.target("a.field");
        assert!(!f.matches(p, t));
    }

    #[test]
    fn blocks_and_empty_stmts() {
        check("{ $x }", "{ a() }", true);
        check("{ $x }", "{ a(); b() }", false);
        check(";", ";", true);
        check("break foo", "break foo", true);
        check("break foo", "break bar", false);
        check("break foo", "continue foo", false);
        check("break", "break", true);
        check("break foo", "break", false);
        check("x <- 1", "x <- 1", true);
        check("x <- 1", "y <- 1", false);
        check("foo: a", "foo: a", true);
        check("foo: a", "foo: b", false);
    }
}
