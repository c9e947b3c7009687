//! AST pretty-printer.
//!
//! The normal mode renders files the way they are written back to disk
//! (tab indentation, one statement per line). The compact mode renders any
//! node on a single line for match output: newlines become `; ` or `, `
//! depending on list context, raw string literals containing newlines are
//! re-quoted as interpreted strings, and a trailing `; ` is trimmed.

use super::ast::{Ast, ChanDir, Node, NodeId};
use super::token::TokenKind;

pub fn print(ast: &Ast, id: NodeId) -> String {
    let mut p = Printer {
        ast,
        out: String::new(),
        indent: 0,
        compact: false,
    };
    p.node(id);
    if !p.out.ends_with('\n') {
        p.out.push('\n');
    }
    p.out
}

pub fn print_compact(ast: &Ast, id: NodeId) -> String {
    let mut p = Printer {
        ast,
        out: String::new(),
        indent: 0,
        compact: true,
    };
    p.node(id);
    let mut out = p.out;
    if let Some(stripped) = out.strip_suffix("; ") {
        out = stripped.to_string();
    }
    out.trim_end().to_string()
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    indent: usize,
    compact: bool,
}

/// Whether a line ending in `c` needs a `;` when joined onto one line.
fn needs_semi(out: &str) -> bool {
    let Some(c) = out.chars().last() else {
        return false;
    };
    c == ')'
        || c == ']'
        || c == '}'
        || c == '"'
        || c == '\''
        || c == '`'
        || c.is_ascii_alphanumeric()
        || c == '_'
        || out.ends_with("++")
        || out.ends_with("--")
}

impl<'a> Printer<'a> {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        if self.compact {
            if self.out.ends_with("; ") || self.out.ends_with(' ') || self.out.is_empty() {
                return;
            }
            if needs_semi(&self.out) {
                self.push("; ");
            } else {
                self.push(" ");
            }
        } else {
            self.out.push('\n');
            for _ in 0..self.indent {
                self.out.push('\t');
            }
        }
    }

    fn join(&mut self, ids: &[NodeId], sep: &str) {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            self.node(id);
        }
    }

    fn stmt_lines(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.newline();
            self.node(id);
        }
    }

    fn node(&mut self, id: NodeId) {
        let ast = self.ast;
        match ast.node(id) {
            Node::File { name, decls } => {
                self.push("package ");
                self.node(*name);
                self.newline();
                for &d in decls {
                    self.newline();
                    self.node(d);
                    self.newline();
                }
            }
            Node::Ident { name } => self.push(&name.clone()),
            Node::BasicLit { kind, value } => {
                if self.compact
                    && *kind == TokenKind::String
                    && value.starts_with('`')
                    && value.contains('\n')
                {
                    let inner = &value[1..value.len() - 1];
                    let quoted = format!("{inner:?}");
                    self.push(&quoted);
                } else {
                    self.push(&value.clone());
                }
            }
            Node::CompositeLit { typ, elts } => {
                if let Some(t) = typ {
                    self.node(*t);
                }
                self.push("{");
                self.join(&elts.clone(), ", ");
                self.push("}");
            }
            Node::FuncLit { typ, body } => {
                self.node(*typ);
                self.push(" ");
                self.node(*body);
            }
            Node::Ellipsis { elt } => {
                self.push("...");
                if let Some(e) = elt {
                    self.node(*e);
                }
            }
            Node::ParenExpr { x } => {
                self.push("(");
                self.node(*x);
                self.push(")");
            }
            Node::SelectorExpr { x, sel } => {
                self.node(*x);
                self.push(".");
                self.node(*sel);
            }
            Node::IndexExpr { x, index } => {
                self.node(*x);
                self.push("[");
                self.node(*index);
                self.push("]");
            }
            Node::SliceExpr { x, low, high, max } => {
                let (low, high, max) = (*low, *high, *max);
                self.node(*x);
                self.push("[");
                if let Some(l) = low {
                    self.node(l);
                }
                self.push(":");
                if let Some(h) = high {
                    self.node(h);
                }
                if let Some(m) = max {
                    self.push(":");
                    self.node(m);
                }
                self.push("]");
            }
            Node::TypeAssertExpr { x, typ } => {
                let typ = *typ;
                self.node(*x);
                self.push(".(");
                match typ {
                    Some(t) => self.node(t),
                    None => self.push("type"),
                }
                self.push(")");
            }
            Node::CallExpr {
                fun,
                args,
                has_ellipsis,
            } => {
                let has_ellipsis = *has_ellipsis;
                self.node(*fun);
                self.push("(");
                self.join(&args.clone(), ", ");
                if has_ellipsis {
                    self.push("...");
                }
                self.push(")");
            }
            Node::StarExpr { x } => {
                self.push("*");
                self.node(*x);
            }
            Node::UnaryExpr { op, x } => {
                self.push(op.text());
                self.node(*x);
            }
            Node::BinaryExpr { op, x, y } => {
                let op = *op;
                self.node(*x);
                self.push(" ");
                self.push(op.text());
                self.push(" ");
                self.node(*y);
            }
            Node::KeyValueExpr { key, value } => {
                self.node(*key);
                self.push(": ");
                self.node(*value);
            }
            Node::ArrayType { len, elt } => {
                let (len, elt) = (*len, *elt);
                self.push("[");
                if let Some(l) = len {
                    self.node(l);
                }
                self.push("]");
                self.node(elt);
            }
            Node::StructType { fields } => {
                self.push("struct{");
                self.join(&fields.clone(), "; ");
                self.push("}");
            }
            Node::Field { names, typ, tag } => {
                let (typ, tag) = (*typ, tag.clone());
                self.join(&names.clone(), ", ");
                if let Some(t) = typ {
                    if !names.is_empty() {
                        self.push(" ");
                    }
                    self.node(t);
                }
                if let Some(tag) = tag {
                    self.push(" ");
                    self.push(&tag);
                }
            }
            Node::FuncType { params, results } => {
                self.push("func(");
                self.join(&params.clone(), ", ");
                self.push(")");
                self.results(&results.clone());
            }
            Node::InterfaceType { methods } => {
                self.push("interface{");
                self.join(&methods.clone(), "; ");
                self.push("}");
            }
            Node::MapType { key, value } => {
                self.push("map[");
                self.node(*key);
                self.push("]");
                self.node(*value);
            }
            Node::ChanType { dir, value } => {
                match dir {
                    ChanDir::SendRecv => self.push("chan "),
                    ChanDir::Send => self.push("chan<- "),
                    ChanDir::Recv => self.push("<-chan "),
                }
                self.node(*value);
            }
            Node::ExprStmt { x } => self.node(*x),
            Node::EmptyStmt => {}
            Node::LabeledStmt { label, stmt } => {
                self.node(*label);
                self.push(":");
                self.newline();
                self.node(*stmt);
            }
            Node::SendStmt { chan, value } => {
                self.node(*chan);
                self.push(" <- ");
                self.node(*value);
            }
            Node::IncDecStmt { x, op } => {
                let op = *op;
                self.node(*x);
                self.push(op.text());
            }
            Node::AssignStmt { lhs, op, rhs } => {
                let op = *op;
                self.join(&lhs.clone(), ", ");
                self.push(" ");
                self.push(op.text());
                self.push(" ");
                self.join(&rhs.clone(), ", ");
            }
            Node::GoStmt { call } => {
                self.push("go ");
                self.node(*call);
            }
            Node::DeferStmt { call } => {
                self.push("defer ");
                self.node(*call);
            }
            Node::ReturnStmt { results } => {
                self.push("return");
                if !results.is_empty() {
                    self.push(" ");
                    self.join(&results.clone(), ", ");
                }
            }
            Node::BranchStmt { op, label } => {
                let label = *label;
                self.push(op.text());
                if let Some(l) = label {
                    self.push(" ");
                    self.node(l);
                }
            }
            Node::BlockStmt { list } => {
                if list.is_empty() {
                    self.push("{}");
                    return;
                }
                self.push("{");
                self.indent += 1;
                self.stmt_lines(&list.clone());
                self.indent -= 1;
                self.newline();
                self.push("}");
            }
            Node::IfStmt {
                init,
                cond,
                body,
                els,
            } => {
                let (init, cond, body, els) = (*init, *cond, *body, *els);
                self.push("if ");
                if let Some(i) = init {
                    self.node(i);
                    self.push("; ");
                }
                self.node(cond);
                self.push(" ");
                self.node(body);
                if let Some(e) = els {
                    self.push(" else ");
                    self.node(e);
                }
            }
            Node::CaseClause { list, body } => {
                if list.is_empty() {
                    self.push("default:");
                } else {
                    self.push("case ");
                    self.join(&list.clone(), ", ");
                    self.push(":");
                }
                self.indent += 1;
                self.stmt_lines(&body.clone());
                self.indent -= 1;
            }
            Node::SwitchStmt { init, tag, body } => {
                let (init, tag, body) = (*init, *tag, *body);
                self.push("switch ");
                if let Some(i) = init {
                    self.node(i);
                    self.push("; ");
                }
                if let Some(t) = tag {
                    self.node(t);
                    self.push(" ");
                }
                self.node(body);
            }
            Node::TypeSwitchStmt { init, assign, body } => {
                let (init, assign, body) = (*init, *assign, *body);
                self.push("switch ");
                if let Some(i) = init {
                    self.node(i);
                    self.push("; ");
                }
                self.node(assign);
                self.push(" ");
                self.node(body);
            }
            Node::CommClause { comm, body } => {
                let comm = *comm;
                match comm {
                    Some(c) => {
                        self.push("case ");
                        self.node(c);
                        self.push(":");
                    }
                    None => self.push("default:"),
                }
                self.indent += 1;
                self.stmt_lines(&body.clone());
                self.indent -= 1;
            }
            Node::SelectStmt { body } => {
                self.push("select ");
                self.node(*body);
            }
            Node::ForStmt {
                init,
                cond,
                post,
                body,
            } => {
                let (init, cond, post, body) = (*init, *cond, *post, *body);
                self.push("for ");
                if init.is_some() || post.is_some() {
                    if let Some(i) = init {
                        self.node(i);
                    }
                    self.push("; ");
                    if let Some(c) = cond {
                        self.node(c);
                    }
                    self.push("; ");
                    if let Some(p) = post {
                        self.node(p);
                        self.push(" ");
                    }
                } else if let Some(c) = cond {
                    self.node(c);
                    self.push(" ");
                }
                self.node(body);
            }
            Node::RangeStmt {
                key,
                value,
                op,
                x,
                body,
            } => {
                let (key, value, op, x, body) = (*key, *value, *op, *x, *body);
                self.push("for ");
                if let Some(k) = key {
                    self.node(k);
                    if let Some(v) = value {
                        self.push(", ");
                        self.node(v);
                    }
                    self.push(" ");
                    self.push(op.text());
                    self.push(" ");
                }
                self.push("range ");
                self.node(x);
                self.push(" ");
                self.node(body);
            }
            Node::DeclStmt { decl } => self.node(*decl),
            Node::GenDecl { op, specs, grouped } => {
                let (op, grouped) = (*op, *grouped);
                self.push(op.text());
                self.push(" ");
                if grouped {
                    self.push("(");
                    self.indent += 1;
                    self.stmt_lines(&specs.clone());
                    self.indent -= 1;
                    self.newline();
                    self.push(")");
                } else if let Some(&spec) = specs.first() {
                    self.node(spec);
                }
            }
            Node::ValueSpec { names, typ, values } => {
                let typ = *typ;
                self.join(&names.clone(), ", ");
                if let Some(t) = typ {
                    self.push(" ");
                    self.node(t);
                }
                if !values.is_empty() {
                    self.push(" = ");
                    self.join(&values.clone(), ", ");
                }
            }
            Node::TypeSpec { name, typ, alias } => {
                let (typ, alias) = (*typ, *alias);
                self.node(*name);
                if alias {
                    self.push(" =");
                }
                self.push(" ");
                self.node(typ);
            }
            Node::ImportSpec { name, path } => {
                let path = *path;
                if let Some(n) = name {
                    self.node(*n);
                    self.push(" ");
                }
                self.node(path);
            }
            Node::FuncDecl {
                recv,
                name,
                typ,
                body,
            } => {
                let (recv, name, typ, body) = (*recv, *name, *typ, *body);
                self.push("func ");
                if let Some(r) = recv {
                    self.push("(");
                    self.node(r);
                    self.push(") ");
                }
                self.node(name);
                // the function's own type prints without the leading keyword
                if let Node::FuncType { params, results } = ast.node(typ) {
                    let (params, results) = (params.clone(), results.clone());
                    self.push("(");
                    self.join(&params, ", ");
                    self.push(")");
                    self.results(&results);
                } else {
                    self.node(typ);
                }
                if let Some(b) = body {
                    self.push(" ");
                    self.node(b);
                }
            }
            Node::ExprList(v) | Node::IdentList(v) | Node::FieldList(v) => {
                self.join(&v.clone(), ", ")
            }
            Node::StmtList(v) | Node::SpecList(v) => {
                let v = v.clone();
                for (i, id) in v.iter().enumerate() {
                    if i > 0 {
                        if self.compact {
                            self.push("; ");
                        } else {
                            self.newline();
                        }
                    }
                    self.node(*id);
                }
            }
        }
    }

    fn results(&mut self, results: &[NodeId]) {
        let ast = self.ast;
        match results {
            [] => {}
            [single] if matches!(ast.node(*single), Node::Field { names, .. } if names.is_empty()) =>
            {
                self.push(" ");
                self.node(*single);
            }
            _ => {
                self.push(" (");
                self.join(results, ", ");
                self.push(")");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser;

    fn compact(src: &str) -> String {
        let mut ast = Ast::new();
        let file = parser::parse_file(&mut ast, 0, &format!("package p; func _() {{ {src} }}"))
            .unwrap_or_else(|e| panic!("{src:?}: {e}"));
        let body = match ast.node(file) {
            Node::File { decls, .. } => match ast.node(decls[0]) {
                Node::FuncDecl { body, .. } => body.unwrap(),
                n => panic!("unexpected {n:?}"),
            },
            n => panic!("unexpected {n:?}"),
        };
        let stmts = match ast.node(body) {
            Node::BlockStmt { list } => list.clone(),
            n => panic!("unexpected {n:?}"),
        };
        if stmts.len() == 1 {
            print_compact(&ast, stmts[0])
        } else {
            let wrapper = ast.alloc(Node::StmtList(stmts), crate::syntax::pos::Span::none());
            print_compact(&ast, wrapper)
        }
    }

    #[test]
    fn compact_statements() {
        assert_eq!(compact("a(); b()"), "a(); b()");
        assert_eq!(compact("x := 1"), "x := 1");
        assert_eq!(compact("if x { a(); b() }"), "if x { a(); b(); }");
        assert_eq!(compact("for i := 0; i < 3; i++ {}"), "for i := 0; i < 3; i++ {}");
        assert_eq!(compact("go func() { f() }()"), "go func() { f(); }()");
    }

    #[test]
    fn compact_exprs() {
        assert_eq!(compact("a[len(a)-1]"), "a[len(a) - 1]");
        assert_eq!(compact("x.(string)"), "x.(string)");
        assert_eq!(compact("append(a, bs...)"), "append(a, bs...)");
        assert_eq!(compact("m[1:2:3]"), "m[1:2:3]");
        assert_eq!(compact("<-chan int(nil)"), "<-chan int(nil)");
    }

    #[test]
    fn compact_requotes_multiline_raw_strings() {
        assert_eq!(compact("_ = `a\nb`"), "_ = \"a\\nb\"");
    }

    #[test]
    fn file_print_round_trips() {
        let mut ast = Ast::new();
        let file =
            parser::parse_file(&mut ast, 0, "package p\n\nvar a = 1\n\nfunc f() {\n\ta()\n}\n")
                .unwrap();
        let printed = print(&ast, file);
        // parse the printed output again; it must be valid
        let mut ast2 = Ast::new();
        parser::parse_file(&mut ast2, 0, &printed).unwrap_or_else(|e| panic!("{printed:?}: {e}"));
        assert!(printed.starts_with("package p\n"));
        assert!(printed.contains("var a = 1"));
    }

    #[test]
    fn range_and_switch_render() {
        assert_eq!(compact("for _ = range a {}"), "for _ = range a {}");
        assert_eq!(compact("for range a {}"), "for range a {}");
        assert_eq!(
            compact("switch x { case 4: x }"),
            "switch x { case 4: x; }"
        );
    }
}
