//! Query state and pipeline operators.
//!
//! `G` carries the syntax arena, the parent map, optional type info, the
//! meta-var table, and the current set of matches. Operators replace or
//! filter the current set; `Replace`/`Suggest` rewrite the tree in place.
//! Any error aborts the pipeline; operators never leave partial progress
//! visible to later ones.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, PatPos, Result};
use crate::matcher::{sub_lists, ListKind, Matcher};
use crate::pattern::{self, CompiledPattern, MetaVar};
use crate::subst::{fill_parents, scrub_positions, Subst};
use crate::syntax::ast::{walk, Ast, Node, NodeId};
use crate::syntax::pos::SourceMap;
use crate::syntax::printer;
use crate::typeinfo::{assignable, comparable, convertible, identical, Kind, Type, TypeInfo};

/// One pipeline operator, as parsed from a query script.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    All(String),
    Including(String),
    Excluding(String),
    Regexp(String),
    TypeIs(String),
    Assignable(String),
    Convertible(String),
    Comparable,
    Addressable,
    KindIs(Kind),
    Replace(String),
    Suggest(String),
    Report(String),
    With(Vec<Op>),
}

#[derive(Debug, Clone)]
pub struct Match {
    pub node: NodeId,
    pub values: HashMap<String, NodeId>,
}

pub struct G {
    pub ast: Ast,
    pub source_map: SourceMap,
    pub vars: Vec<MetaVar>,
    pub info: Option<TypeInfo>,
    pub current: Vec<Match>,
    /// Report output, one line per reported match.
    pub emitted: Vec<String>,
    roots: Vec<NodeId>,
    parents: HashMap<NodeId, NodeId>,
    aggressive: bool,
}

impl G {
    pub fn new(ast: Ast, source_map: SourceMap, roots: Vec<NodeId>) -> G {
        let mut g = G {
            ast,
            source_map,
            vars: Vec::new(),
            info: None,
            current: Vec::new(),
            emitted: Vec::new(),
            roots,
            parents: HashMap::new(),
            aggressive: false,
        };
        for &root in &g.roots.clone() {
            fill_parents(&g.ast, &mut g.parents, root);
        }
        g
    }

    /// Execute a pipeline against the roots and return the final match set.
    pub fn run(&mut self, ops: &[Op]) -> Result<Vec<NodeId>> {
        self.current = self
            .roots
            .iter()
            .map(|&node| Match {
                node,
                values: HashMap::new(),
            })
            .collect();
        self.exec(ops)?;
        Ok(self.current.iter().map(|m| m.node).collect())
    }

    pub fn exec(&mut self, ops: &[Op]) -> Result<()> {
        for op in ops {
            match op {
                Op::All(p) => self.all(p)?,
                Op::Including(p) => self.including(p, true)?,
                Op::Excluding(p) => self.including(p, false)?,
                Op::Regexp(rx) => self.regexp(rx)?,
                Op::TypeIs(t) => self.type_is(t)?,
                Op::Assignable(t) => self.assignable_to(t)?,
                Op::Convertible(t) => self.convertible_to(t)?,
                Op::Comparable => self.comparable_filter()?,
                Op::Addressable => self.addressable_filter()?,
                Op::KindIs(k) => self.kind_is(*k)?,
                Op::Replace(p) => self.replace(p)?,
                Op::Suggest(p) => self.suggest(p)?,
                Op::Report(msg) => self.report(msg),
                Op::With(ops) => self.with(ops)?,
            }
        }
        Ok(())
    }

    fn ensure_info(&mut self) {
        if self.info.is_none() {
            self.info = Some(TypeInfo::check(&self.ast, &self.roots));
        }
    }

    fn compile(&mut self, src: &str) -> Result<CompiledPattern> {
        let start = self.vars.len();
        let pat = pattern::compile(&mut self.ast, &mut self.vars, src)?;
        if pat.aggressive {
            self.aggressive = true;
        }
        if self.vars[start..].iter().any(|v| v.is_typed()) {
            self.ensure_info();
            let info = self.info.as_ref().expect("type info was just built");
            for var in &mut self.vars[start..] {
                for pred in &mut var.type_preds {
                    pred.typ = Some(info.resolve(&self.ast, pred.expr)?);
                }
            }
        }
        Ok(pat)
    }

    /// Visit order and splice candidates under a match node.
    fn candidates(&mut self, pat: CompiledPattern, from: NodeId) -> Vec<NodeId> {
        #[derive(PartialEq)]
        enum Shape {
            StmtList,
            ExprList,
            Wild,
            Other,
        }
        let shape = match self.ast.node(pat.root) {
            Node::StmtList(_) => Shape::StmtList,
            Node::ExprList(_) => Shape::ExprList,
            Node::Ident { name } if pattern::from_wild_name(name).is_some() => Shape::Wild,
            _ => Shape::Other,
        };
        let mut visits = Vec::new();
        walk(&self.ast, from, &mut |id| visits.push(id));
        let mut out = Vec::new();
        for v in visits {
            out.push(v);
            if shape == Shape::Other {
                continue;
            }
            for (kind, elems) in sub_lists(&self.ast, v) {
                let want = match shape {
                    Shape::StmtList => kind == ListKind::Stmt,
                    Shape::ExprList => kind == ListKind::Expr,
                    Shape::Wild => true,
                    Shape::Other => false,
                };
                if want {
                    let wrapper = kind_wrapper(kind, elems);
                    out.push(self.ast.alloc(wrapper, crate::syntax::pos::Span::none()));
                }
            }
        }
        out
    }

    fn try_match(
        &mut self,
        pat: CompiledPattern,
        cand: NodeId,
        values: &HashMap<String, NodeId>,
    ) -> Option<(NodeId, HashMap<String, NodeId>)> {
        let mut m = Matcher::new(
            &mut self.ast,
            &self.vars,
            self.info.as_ref(),
            self.aggressive,
        );
        m.values = values.clone();
        let found = m.top_match(pat.root, cand)?;
        let values = std::mem::take(&mut m.values);
        Some((found, values))
    }

    /// Replace the current matches with every sub-match of `pattern`,
    /// deduplicated by source position. Each new match starts from a copy of
    /// its parent match's captures.
    pub fn all(&mut self, pattern: &str) -> Result<()> {
        let pat = self.compile(pattern)?;
        let current = std::mem::take(&mut self.current);
        let mut next = Vec::new();
        let mut seen = HashSet::new();
        for m in &current {
            for cand in self.candidates(pat, m.node) {
                if let Some((found, values)) = self.try_match(pat, cand, &m.values) {
                    let span = self.ast.span(found);
                    if seen.insert((span.start, span.end)) {
                        next.push(Match {
                            node: found,
                            values,
                        });
                    }
                }
            }
        }
        self.current = next;
        Ok(())
    }

    fn including(&mut self, pattern: &str, want_any: bool) -> Result<()> {
        let pat = self.compile(pattern)?;
        let current = std::mem::take(&mut self.current);
        let mut next = Vec::new();
        for m in current {
            let mut any = false;
            for cand in self.candidates(pat, m.node) {
                if self.try_match(pat, cand, &m.values).is_some() {
                    any = true;
                    break;
                }
            }
            if any == want_any {
                next.push(m);
            }
        }
        self.current = next;
        Ok(())
    }

    fn node_string(&self, id: NodeId) -> Option<String> {
        match self.ast.node(id) {
            Node::Ident { name } => Some(name.clone()),
            Node::ExprStmt { x } => match self.ast.node(*x) {
                Node::Ident { name } => Some(name.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Keep matches whose rendered identifier matches the anchored regex.
    pub fn regexp(&mut self, expr: &str) -> Result<()> {
        let mut rx = expr.to_string();
        if !rx.starts_with('^') {
            rx = format!("^{rx}");
        }
        if !rx.ends_with('$') {
            rx = format!("{rx}$");
        }
        let rx = regex::Regex::new(&rx).map_err(|source| Error::Regex {
            pos: PatPos { line: 1, col: 1 },
            source,
        })?;
        let current = std::mem::take(&mut self.current);
        self.current = current
            .into_iter()
            .filter(|m| {
                self.node_string(m.node)
                    .is_some_and(|s| !s.is_empty() && rx.is_match(&s))
            })
            .collect();
        Ok(())
    }

    fn resolve_type_str(&mut self, expr: &str) -> Result<Type> {
        self.ensure_info();
        let type_expr = pattern::parse::parse_type(&mut self.ast, expr)?;
        let info = self.info.as_ref().expect("type info was just built");
        info.resolve(&self.ast, type_expr)
    }

    fn type_filter(&mut self, f: impl Fn(&Type) -> bool) {
        self.ensure_info();
        let info = self.info.as_ref().expect("type info was just built");
        let current = std::mem::take(&mut self.current);
        self.current = current
            .into_iter()
            .filter(|m| f(info.type_of(m.node)))
            .collect();
    }

    pub fn type_is(&mut self, expr: &str) -> Result<()> {
        let want = self.resolve_type_str(expr)?;
        self.type_filter(|t| identical(t, &want));
        Ok(())
    }

    pub fn assignable_to(&mut self, expr: &str) -> Result<()> {
        let want = self.resolve_type_str(expr)?;
        self.type_filter(|t| !matches!(t, Type::Invalid) && assignable(t, &want));
        Ok(())
    }

    pub fn convertible_to(&mut self, expr: &str) -> Result<()> {
        let want = self.resolve_type_str(expr)?;
        self.type_filter(|t| !matches!(t, Type::Invalid) && convertible(t, &want));
        Ok(())
    }

    pub fn comparable_filter(&mut self) -> Result<()> {
        self.type_filter(|t| !matches!(t, Type::Invalid) && comparable(t));
        Ok(())
    }

    pub fn kind_is(&mut self, kind: Kind) -> Result<()> {
        self.type_filter(|t| t.kind() == Some(kind));
        Ok(())
    }

    pub fn addressable_filter(&mut self) -> Result<()> {
        self.ensure_info();
        let info = self.info.as_ref().expect("type info was just built");
        let current = std::mem::take(&mut self.current);
        self.current = current
            .into_iter()
            .filter(|m| info.addressable(&self.ast, m.node))
            .collect();
        Ok(())
    }

    /// Parse `pattern` fresh for each match, fill its wildcards from the
    /// captures, and substitute it over the matched node.
    pub fn replace(&mut self, pattern: &str) -> Result<()> {
        for i in 0..self.current.len() {
            let pat = self.compile(pattern)?;
            scrub_positions(&mut self.ast, pat.root);
            fill_parents(&self.ast, &mut self.parents, pat.root);
            let (old, values) = {
                let m = &self.current[i];
                (m.node, m.values.clone())
            };
            let mut subst = Subst {
                ast: &mut self.ast,
                parents: &mut self.parents,
                vars: &self.vars,
            };
            let new_root = subst.fill_values(pat.root, &values)?;
            subst.subst_node(old, new_root)?;
            self.current[i].node = new_root;
        }
        Ok(())
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        let key = match self.ast.node(node).list_elems() {
            Some(elems) => *elems.first()?,
            None => node,
        };
        self.parents.get(&key).copied()
    }

    fn node_root(&self, node: NodeId) -> NodeId {
        let Some(parent) = self.parent_of(node) else {
            return node;
        };
        if self.ast.node(parent).is_list() {
            return parent;
        }
        self.node_root(parent)
    }

    /// `Replace`, then write file-backed roots to disk. Matches without a
    /// backing file carry their rewritten root forward to be printed.
    pub fn suggest(&mut self, pattern: &str) -> Result<()> {
        self.replace(pattern)?;
        let current = std::mem::take(&mut self.current);
        let mut seen = HashSet::new();
        let mut to_write: Vec<(NodeId, PathBuf)> = Vec::new();
        let mut next = Vec::new();
        for m in current {
            let root = self.node_root(m.node);
            let span = self.ast.span(root);
            if !seen.insert((span.start, span.end)) {
                continue;
            }
            let is_file = matches!(self.ast.node(root), Node::File { .. });
            if is_file {
                if let Some(path) = self.source_map.file_path(span.start) {
                    to_write.push((root, path.clone()));
                    continue;
                }
            }
            next.push(Match {
                node: root,
                values: HashMap::new(),
            });
        }
        for (root, path) in to_write {
            let mut f = std::fs::OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&path)?;
            f.write_all(printer::print(&self.ast, root).as_bytes())?;
        }
        self.current = next;
        Ok(())
    }

    /// Emit one line per match, expanding `$name` from the captures, then
    /// clear the current set.
    pub fn report(&mut self, message: &str) {
        let current = std::mem::take(&mut self.current);
        for m in current {
            let expanded = expand_message(message, |name| match m.values.get(name) {
                Some(&node) => printer::print_compact(&self.ast, node),
                None => format!("$!{{unknown: {name}}}"),
            });
            let pos = self.source_map.position(self.ast.span(m.node).start);
            self.emitted.push(format!("{pos}: {expanded}"));
        }
    }

    /// Keep matches for which the sub-pipeline, run on that match alone,
    /// ends with a non-empty set.
    pub fn with(&mut self, ops: &[Op]) -> Result<()> {
        let current = std::mem::take(&mut self.current);
        let mut next = Vec::new();
        for m in current {
            self.current = vec![m.clone()];
            self.exec(ops)?;
            if !self.current.is_empty() {
                next.push(m);
            }
        }
        self.current = next;
        Ok(())
    }

    pub fn including_op(&mut self, pattern: &str) -> Result<()> {
        self.including(pattern, true)
    }

    pub fn excluding_op(&mut self, pattern: &str) -> Result<()> {
        self.including(pattern, false)
    }
}

fn kind_wrapper(kind: ListKind, elems: Vec<NodeId>) -> Node {
    match kind {
        ListKind::Expr => Node::ExprList(elems),
        ListKind::Stmt => Node::StmtList(elems),
        ListKind::Ident => Node::IdentList(elems),
        ListKind::Field => Node::FieldList(elems),
        ListKind::Spec => Node::SpecList(elems),
    }
}

/// Expand `$name` and `${name}` references in a report message.
fn expand_message(msg: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::new();
    let mut chars = msg.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '{')) => {
                chars.next();
                let start = i + 2;
                let mut end = start;
                for (j, c) in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    end = j + c.len_utf8();
                }
                out.push_str(&f(&msg[start..end]));
            }
            Some((j, c2)) if c2.is_ascii_alphanumeric() || *c2 == '_' => {
                let start = *j;
                let mut end = start;
                while let Some((j, c2)) = chars.peek() {
                    if c2.is_ascii_alphanumeric() || *c2 == '_' {
                        end = *j + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&f(&msg[start..end]));
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::parse::parse_any;
    use std::path::PathBuf;

    fn build(input: &str) -> G {
        let mut ast = Ast::new();
        let mut sm = SourceMap::new();
        sm.add_file(PathBuf::new(), input);
        let root = parse_any(&mut ast, input).unwrap_or_else(|e| panic!("{input:?}: {e}"));
        G::new(ast, sm, vec![root])
    }

    fn grep(ops: &[Op], input: &str) -> Result<(G, Vec<NodeId>)> {
        let mut g = build(input);
        let nodes = g.run(ops)?;
        Ok((g, nodes))
    }

    fn count(ops: &[Op], input: &str) -> usize {
        let (_, nodes) = grep(ops, input).unwrap_or_else(|e| panic!("{ops:?} on {input:?}: {e}"));
        nodes.len()
    }

    fn one(ops: &[Op], input: &str) -> String {
        let (g, nodes) = grep(ops, input).unwrap_or_else(|e| panic!("{ops:?} on {input:?}: {e}"));
        assert_eq!(nodes.len(), 1, "{ops:?} on {input:?}");
        printer::print_compact(&g.ast, nodes[0])
    }

    fn err(ops: &[Op], input: &str) -> String {
        let e = grep(ops, input).err().unwrap_or_else(|| panic!("{ops:?} on {input:?}: no error"));
        e.to_string()
    }

    fn all(p: &str) -> Op {
        Op::All(p.to_string())
    }

    #[test]
    fn basic_lits_and_wildcards() {
        assert_eq!(count(&[all("123")], "123"), 1);
        assert_eq!(count(&[all("false")], "true"), 0);
        assert_eq!(count(&[all("$x")], "rune"), 1);
        assert_eq!(count(&[all("foo($x, $x)")], "foo(1, 2)"), 0);
        assert_eq!(count(&[all("foo($_, $_)")], "foo(1, 2)"), 1);
        assert_eq!(count(&[all("foo($x, $y, $y)")], "foo(1, 2, 2)"), 1);
        assert_eq!(count(&[all("$x")], "\"foo\""), 1);
    }

    #[test]
    fn recursion_and_dedup() {
        assert_eq!(count(&[all("$x")], "a + b"), 3);
        assert_eq!(count(&[all("$x + $x")], "foo(a + a, b + b)"), 2);
        assert_eq!(count(&[all("$x")], "var a int"), 4);
        assert_eq!(count(&[all("go foo()")], "a(); go foo(); a()"), 1);
        assert_eq!(count(&[all("$x")], "a, b"), 3);
        assert_eq!(count(&[all("$x")], "a; b"), 3);
    }

    #[test]
    fn regexp_filter() {
        let rx = |s: &str| Op::Regexp(s.to_string());
        assert_eq!(count(&[all("$x"), rx("foo")], "bar"), 0);
        assert_eq!(count(&[all("$x"), rx("foo")], "foo"), 1);
        assert_eq!(count(&[all("$x"), rx("foo")], "_foo"), 0);
        assert_eq!(count(&[all("$x"), rx("foo")], "foo_"), 0);
        assert_eq!(count(&[all("$x"), rx(".*foo.*")], "_foo_"), 1);
        assert_eq!(count(&[all("$x = $_"), all("$x"), rx(".*")], "a = b"), 1);
        assert_eq!(count(&[all("$x = $_"), all("$x"), rx(".*")], "a.field = b"), 0);
        assert_eq!(
            count(
                &[all("$x"), rx(".*foo.*"), rx(".*bar.*")],
                "foobar; barfoo; foo; barbar"
            ),
            2
        );
    }

    #[test]
    fn constrained_wildcard_regexes() {
        assert_eq!(count(&[all("$(x /^foo.*/)")], "foobar; barfoo"), 1);
    }

    #[test]
    fn expression_lists() {
        assert_eq!(count(&[all("$x, $y")], "foo(1, 2)"), 1);
        assert_eq!(count(&[all("$x, $y")], "1"), 0);
        assert_eq!(count(&[all("b, c")], "a, b, c, d"), 0);
        assert_eq!(count(&[all("b, c")], "foo(a, b, c, d)"), 0);
        assert_eq!(count(&[all("print($*_, $x)")], "print(a, b, c)"), 1);
    }

    #[test]
    fn variadic_wildcards() {
        assert_eq!(one(&[all("$*x")], "a, b"), "a, b");
        assert_eq!(count(&[all("print($*x)")], "print()"), 1);
        assert_eq!(count(&[all("print($*x)")], "print(a, b)"), 1);
        assert_eq!(count(&[all("print($*x, $y, $*z)")], "print()"), 0);
        assert_eq!(count(&[all("print($*x, $y, $*z)")], "print(a)"), 1);
        assert_eq!(count(&[all("print($*x, $y, $*z)")], "print(a, b, c)"), 1);
        assert_eq!(count(&[all("{ $*_; return nil }")], "{ return nil }"), 1);
        assert_eq!(count(&[all("{ $*_; return nil }")], "{ a(); b(); return nil }"), 1);
        assert_eq!(count(&[all("c($*x); c($*x)")], "c(); c()"), 1);
        assert_eq!(count(&[all("c($*x); c()")], "c(); c()"), 1);
        assert_eq!(count(&[all("c($*x); c($*x)")], "c(x); c(y)"), 0);
        assert_eq!(count(&[all("c($*x); c($*x)")], "c(x, y); c(z)"), 0);
        assert_eq!(count(&[all("c($*x); c($*x)")], "c(x, y); c(x, y)"), 1);
    }

    #[test]
    fn composite_and_func_lits() {
        assert_eq!(count(&[all("[]float64{$x}")], "[]float64{3}"), 1);
        assert_eq!(count(&[all("[2]bool{$x, 0}")], "[2]bool{3, 1}"), 0);
        assert_eq!(
            count(&[all("someStruct{fld: $x}")], "someStruct{fld: a, fld2: b}"),
            0
        );
        assert_eq!(count(&[all("map[int]int{1: $x}")], "map[int]int{1: a}"), 1);
        assert_eq!(
            count(
                &[all("func($s string) { print($s) }")],
                "func(a string) { print(a) }"
            ),
            1
        );
        assert_eq!(count(&[all("func($x ...$t) {}")], "func(a ...int) {}"), 1);
    }

    #[test]
    fn statement_sequences() {
        assert_eq!(count(&[all("$x(); $y()")], "a(); b()"), 1);
        assert_eq!(count(&[all("$x(); $y()")], "a()"), 0);
        assert_eq!(count(&[all("b; c")], "b"), 0);
        assert_eq!(count(&[all("b; c")], "b; c"), 1);
        assert_eq!(count(&[all("b; c")], "b; x; c"), 0);
        assert_eq!(one(&[all("b; c")], "a; b; c; d"), "b; c");
        assert_eq!(count(&[all("b; c")], "{b; c; d}"), 1);
        assert_eq!(count(&[all("b; c")], "{a; b; c}"), 1);
        assert_eq!(one(&[all("b; c")], "{b; b; c; c}"), "b; c");
        assert_eq!(one(&[all("$x++; $x--")], "n; a++; b++; b--"), "b++; b--");
        assert_eq!(one(&[all("$*_; b; $*_")], "{a; b; c; d}"), "a; b; c; d");
        assert_eq!(count(&[all("{$*_; $x}")], "{a; b; c}"), 1);
        assert_eq!(count(&[all("{b; c}")], "{a; b; c}"), 0);
        assert_eq!(
            one(&[all("$x := $_; $x = $_")], "a := n; b := n; b = g"),
            "b := n; b = g"
        );
        assert_eq!(
            one(&[all("$x := $_; $*_; $x = $_")], "a := n; b := n; b = g"),
            "b := n; b = g"
        );
        assert_eq!(count(&[all("$x, $y")], "1; 2"), 0);
        assert_eq!(count(&[all("$x; $y")], "1, 2"), 0);
        assert_eq!(one(&[all("$*x")], "a; b"), "a; b");
        assert_eq!(count(&[all("$*x; b; $*y")], "a; b; c"), 1);
        assert_eq!(count(&[all("$*x; b; $*x")], "a; b; c"), 0);
    }

    #[test]
    fn forcing_statement_patterns() {
        assert_eq!(count(&[all("append($*_);")], "f(); x = append(x, a)"), 0);
        assert_eq!(count(&[all("append($*_);")], "f(); append(x, a)"), 1);
    }

    #[test]
    fn declarations() {
        assert_eq!(count(&[all("const $x = $y")], "const a = b"), 1);
        assert_eq!(count(&[all("const $x = $y")], "const (a = b)"), 1);
        assert_eq!(count(&[all("const $x = $y")], "const (a = b\nc = d)"), 0);
        assert_eq!(count(&[all("var $x int")], "var a int"), 1);
        assert_eq!(count(&[all("var $x int")], "var a int = 3"), 0);
        assert_eq!(count(&[all("$_ int")], "var a int"), 1);
        assert_eq!(count(&[all("$_ int")], "var a bool"), 0);
        assert_eq!(count(&[all("$_ int")], "var a int = 3"), 0);
        assert_eq!(count(&[all("$_ int")], "var a, b int"), 0);
        assert_eq!(count(&[all("struct{}")], "type T struct{}"), 1);
        assert_eq!(count(&[all("type $x struct{}")], "type T struct{}"), 1);
        assert_eq!(count(&[all("struct{$_ int}")], "type T struct{n int}"), 1);
        assert_eq!(count(&[all("struct{$_ int}")], "var V struct{n int}"), 1);
        assert_eq!(count(&[all("struct{$_}")], "type T struct{n int}"), 1);
        assert_eq!(count(&[all("struct{$*_}")], "type T struct{n int}"), 1);
    }

    #[test]
    fn whole_files() {
        assert_eq!(count(&[all("package $_")], "package p; var a = 1"), 0);
        assert_eq!(
            count(
                &[all("package $_; func Foo() { $*_ }")],
                "package p; func Foo() {}"
            ),
            1
        );
    }

    #[test]
    fn if_and_loop_statements() {
        assert_eq!(
            count(&[all("if $x != nil { $y }")], "if p != nil { p.foo() }"),
            1
        );
        assert_eq!(count(&[all("if $x { $y }")], "if a { b() } else { c() }"), 0);
        assert_eq!(count(&[all("if $x != nil { $y }")], "if a != nil { return a }"), 1);
        assert_eq!(count(&[all("for $x { $y }")], "for b { c() }"), 1);
        assert_eq!(count(&[all("$x++")], "a[b]++"), 1);
        assert_eq!(count(&[all("$x--")], "a++"), 0);
        assert_eq!(count(&[all("return nil, $x")], "{ return nil, err }"), 1);
        assert_eq!(count(&[all("return nil, $x")], "{ return nil, 0, err }"), 0);
    }

    #[test]
    fn go_and_defer() {
        assert_eq!(count(&[all("go $x()")], "go func() { a() }()"), 1);
        assert_eq!(count(&[all("go func() { $x }()")], "go func() { a() }()"), 1);
        assert_eq!(count(&[all("go func() { $x }()")], "go a()"), 0);
        assert_eq!(count(&[all("defer $x()")], "defer func() { a() }()"), 1);
        assert_eq!(count(&[all("defer func() { $x }()")], "defer func() { a() }()"), 1);
        assert_eq!(count(&[all("defer func() { $x }()")], "defer a()"), 0);
    }

    #[test]
    fn aggressive_mode() {
        assert_eq!(count(&[all("for range $x {}")], "for _ = range a {}"), 0);
        assert_eq!(count(&[all("~ for range $x {}")], "for _ = range a {}"), 1);
        assert_eq!(count(&[all("~ for _ = range $x {}")], "for range a {}"), 1);
        assert_eq!(count(&[all("a int")], "var (a, b int; c bool)"), 0);
        assert_eq!(count(&[all("~ a int")], "var (a, b uint; c bool)"), 0);
        assert_eq!(count(&[all("~ a int")], "var (a, b int; c bool)"), 1);
        assert_eq!(count(&[all("{ x; }")], "switch { case true: x; }"), 0);
        assert_eq!(count(&[all("~ { x; }")], "switch { case true: x; }"), 1);
        assert_eq!(count(&[all("a = b")], "a = b; a := b"), 1);
        assert_eq!(count(&[all("a := b")], "a = b; a := b"), 1);
        assert_eq!(count(&[all("~ a = b")], "a = b; a := b; var a = b"), 3);
        assert_eq!(count(&[all("~ a := b")], "a = b; a := b; var a = b"), 3);
    }

    #[test]
    fn pipelined_operators() {
        assert_eq!(
            count(
                &[all("break")],
                "switch { case x: break }; for { y(); break; break }"
            ),
            3
        );
        assert_eq!(
            count(
                &[all("for { $*_ }"), all("break")],
                "switch { case x: break }; for { y(); break; break }"
            ),
            2
        );
        assert_eq!(
            count(
                &[all("for { $*_ }"), Op::Including("break".to_string())],
                "break; for {}; for { if x { break } else { break } }"
            ),
            1
        );
        assert_eq!(
            count(
                &[all("for { $*_ }"), Op::Excluding("break".to_string())],
                "break; for {}; for { x() }; for { break }"
            ),
            2
        );
        assert_eq!(
            one(&[all("for { $*sts }"), all("$*sts")], "for { a(); b() }"),
            "a(); b()"
        );
        assert_eq!(
            one(&[all("for { $*sts }"), all("$*sts")], "for { if x { a(); b() } }"),
            "if x { a(); b(); }"
        );
    }

    #[test]
    fn with_filters_by_subpipeline() {
        assert_eq!(
            count(
                &[
                    all("for { $*_ }"),
                    Op::With(vec![all("break")]),
                ],
                "for {}; for { break }"
            ),
            1
        );
    }

    #[test]
    fn suggestions_rewrite_matches() {
        let sg = |p: &str| Op::Suggest(p.to_string());
        assert_eq!(
            one(&[all("foo"), sg("bar")], "foo(); println(\"foo\"); println(foo, foobar)"),
            "bar(); println(\"foo\"); println(bar, foobar)"
        );
        assert_eq!(
            one(&[all("$f()"), sg("$f(nil)")], "foo(); bar(); baz(x)"),
            "foo(nil); bar(nil); baz(x)"
        );
        assert_eq!(
            one(&[all("foo($*_)"), sg("foo()")], "foo(); foo(a, b); bar(x)"),
            "foo(); foo(); bar(x)"
        );
        assert_eq!(
            one(&[all("a, b"), sg("c, d")], "foo(); foo(a, b); bar(a, b)"),
            "foo(); foo(c, d); bar(c, d)"
        );
        assert_eq!(
            one(
                &[all("a(); b()"), sg("c(); d()")],
                "{ a(); b(); c(); }; { a(); a(); b(); }"
            ),
            "{ c(); d(); c(); }; { a(); c(); d(); }"
        );
        assert_eq!(
            one(&[all("a()"), sg("c()")], "{ a(); b(); a(); }"),
            "{ c(); b(); c(); }"
        );
        assert_eq!(
            one(
                &[all("go func() { $f() }()"), sg("go $f()")],
                "{ go func() { f.Close() }(); }"
            ),
            "{ go f.Close(); }"
        );
        assert_eq!(
            one(&[all("foo"), sg("bar")], "package p; var foo int"),
            "package p; var bar int"
        );
        assert_eq!(one(&[all("foo($*a)"), sg("bar($*a)")], "{ foo(); }"), "{ bar(); }");
        assert_eq!(one(&[all("foo($*a)"), sg("bar($*a)")], "{ foo(0); }"), "{ bar(0); }");
        assert_eq!(
            one(&[all("a(); b()"), sg("x = a()")], "{ a(); b(); }"),
            "{ x = a(); }"
        );
        assert_eq!(one(&[all("a(); b()"), sg("a()")], "{ a(); b(); }"), "{ a(); }");
        assert_eq!(one(&[all("a, b"), sg("c")], "foo(a, b)"), "foo(c)");
        assert_eq!(
            one(&[all("b = a()"), sg("c()")], "if b = a(); b { }"),
            "if c(); b {}"
        );
        assert_eq!(one(&[all("f($*a)"), sg("f2(x, $a)")], "f(c, d)"), "f2(x, c, d)");
        assert_eq!(
            one(
                &[
                    all("err = f(); if err != nil { $*then }"),
                    sg("if err := f(); err != nil { $then }")
                ],
                "{ err = f(); if err != nil { handle(err); }; }"
            ),
            "{ if err := f(); err != nil { handle(err); }; }"
        );
        assert_eq!(one(&[all("List{$e}"), sg("$e")], "List{foo()}"), "foo()");
    }

    #[test]
    fn replace_keeps_spans_on_list_matches() {
        // a $*x match is a whole list; the installed replacement must take
        // over its position or later reports and dedup land on 0:0
        let (g, nodes) = grep(
            &[all("$*x"), Op::Replace("a; b".to_string())],
            "x(); y()",
        )
        .unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(!g.ast.span(nodes[0]).is_none());
        assert_eq!(printer::print_compact(&g.ast, nodes[0]), "a; b");
    }

    #[test]
    fn replace_keeps_spans_on_partial_splices() {
        let (g, nodes) = grep(
            &[all("b(); c()"), Op::Replace("d()".to_string())],
            "a(); b(); c(); e()",
        )
        .unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(!g.ast.span(nodes[0]).is_none());
        assert_eq!(printer::print_compact(&g.ast, nodes[0]), "d()");
    }

    #[test]
    fn report_expands_captures() {
        let (g, nodes) = grep(
            &[all("foo($x)"), Op::Report("arg is $x, other is $y".to_string())],
            "foo(42)",
        )
        .unwrap();
        assert!(nodes.is_empty());
        assert_eq!(g.emitted.len(), 1);
        assert!(
            g.emitted[0].ends_with("arg is 42, other is $!{unknown: y}"),
            "{:?}",
            g.emitted[0]
        );
    }

    #[test]
    fn type_operator_errors() {
        assert_eq!(
            err(&[all("$x"), Op::TypeIs("foo".to_string())], "a"),
            "unknown type: \"foo\""
        );
        assert_eq!(
            err(&[all("$x"), Op::TypeIs("{".to_string())], "a"),
            "1:1: expected ';', found '{'"
        );
        assert_eq!(
            err(&[all("$x"), Op::TypeIs("notType + expr".to_string())], "a"),
            "1:9: expected ';', found '+'"
        );
    }

    #[test]
    fn tokenize_and_parse_errors() {
        assert!(err(&[all("$")], "nosrc").contains("1:2: $ must be followed by ident, got EOF"));
        assert!(err(&[all("\"")], "nosrc").contains("1:1: string literal not terminated"));
        assert!(err(&[all("")], "nosrc").contains("empty source code"));
        assert!(err(&[all("\t")], "nosrc").contains("empty source code"));
        assert!(err(&[all("foo)")], "nosrc").contains("1:4: expected statement, found ')'"));
        assert!(err(&[all("{")], "nosrc").contains("1:4: expected '}', found 'EOF'"));
        assert!(err(&[all("$x)")], "nosrc").contains("1:3: expected statement, found ')'"));
        assert!(err(&[all("$x(")], "nosrc").contains("1:5: expected operand, found '}'"));
        assert!(err(&[all("$*x)")], "nosrc").contains("1:4: expected statement, found ')'"));
        assert!(err(&[all("a\n$x)")], "nosrc").contains("2:3: expected statement, found ')'"));
    }

    #[test]
    fn typed_filters() {
        let ty = |s: &str| Op::TypeIs(s.to_string());
        let conv = |s: &str| Op::Convertible(s.to_string());
        assert_eq!(count(&[all("$x"), ty("int")], "var i int"), 2);
        assert_eq!(count(&[all("var _ = $x"), all("$x"), ty("[2]int")], "var _ = [...]int{1}"), 0);
        assert_eq!(
            count(&[all("var _ = $x"), all("$x"), ty("[2]int")], "var _ = [...]int{1, 2}"),
            1
        );
        assert_eq!(count(&[all("var _ = $x"), all("$x"), ty("[2]int")], "var _ = []int{1, 2}"), 0);
        assert_eq!(count(&[all("var _ = $x"), all("$x"), ty("*int")], "var _ = int(3)"), 0);
        assert_eq!(count(&[all("var _ = $x"), all("$x"), ty("*int")], "var _ = new(int)"), 1);
        assert_eq!(count(&[all("const _ = $x"), all("$x"), ty("int")], "const _ = 3"), 0);
        assert_eq!(count(&[all("const _ = $x"), all("$x"), conv("int")], "const _ = 3"), 1);
        assert_eq!(count(&[all("const _ = $x"), all("$x"), conv("int32")], "const _ = 3"), 1);
        assert_eq!(count(&[all("const _ = $x"), all("$x"), conv("[]byte")], "const _ = 3"), 0);
        assert_eq!(count(&[all("var $x $_"), all("$x"), ty("int")], "type I int; var i I"), 0);
        assert_eq!(count(&[all("var $x $_"), all("$x"), conv("int")], "type I int; var i I"), 1);
        assert_eq!(count(&[all("$x"), ty("*I")], "type I int; var i *I"), 2);
    }

    #[test]
    fn comparable_and_addressable_filters() {
        assert_eq!(count(&[all("var _ = $x"), all("$x"), Op::Comparable], "var _ = []byte{0}"), 0);
        assert_eq!(
            count(&[all("var _ = $x"), all("$x"), Op::Comparable], "var _ = [...]byte{0}"),
            1
        );
        assert_eq!(count(&[all("var _ = $x"), all("$x"), Op::Addressable], "var _ = []byte{0}"), 0);
        assert_eq!(
            count(
                &[all("var _ = $x"), all("$x"), Op::Addressable],
                "var s struct { i int }; var _ = s.i"
            ),
            1
        );
    }

    #[test]
    fn kind_filters() {
        let kind = |k: Kind| Op::KindIs(k);
        for (k, input, want) in [
            (Kind::Basic, "var _ = []byte{}", 0),
            (Kind::Basic, "var _ = 3", 1),
            (Kind::Array, "var _ = []byte{}", 0),
            (Kind::Array, "var _ = [...]byte{}", 1),
            (Kind::Slice, "var _ = []byte{}", 1),
            (Kind::Slice, "var _ = [...]byte{}", 0),
            (Kind::Struct, "var _ = []byte{}", 0),
            (Kind::Struct, "var _ = struct{}{}", 1),
            (Kind::Interface, "var _ = struct{}{}", 0),
            (Kind::Interface, "var _ = interface{}(nil)", 1),
            (Kind::Pointer, "var _ = new(byte)", 1),
            (Kind::Func, "var _ = func() {}", 1),
            (Kind::Map, "var _ = map[int]int{}", 1),
            (Kind::Chan, "var _ = make(chan int)", 1),
        ] {
            assert_eq!(
                count(&[all("var _ = $x"), all("$x"), kind(k)], input),
                want,
                "{k:?} on {input}"
            );
        }
    }

    #[test]
    fn typed_wildcard_attributes() {
        // `i` and the `int` type ident carry the type; the decl nodes do not
        assert_eq!(count(&[all("$(x type(int))")], "var i int"), 2);
        // the `[]byte` type expr and the composite literal are slices
        assert_eq!(count(&[all("$(x is(slice))")], "var _ = []byte{}"), 2);
        // `0` and `byte` are comparable; the slice is not
        assert_eq!(count(&[all("$(x comp())")], "var _ = []byte{0}"), 2);
    }
}
