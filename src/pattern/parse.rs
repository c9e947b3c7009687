//! The template cascade: recover a syntax node from rewritten pattern source.
//!
//! Seven templates are tried in order, returning the narrowest node that
//! parses cleanly. The statement template covers most patterns, so its error
//! is the one surfaced when nothing parses, with the template prefix length
//! subtracted from line-1 columns.

use crate::error::{Error, PatPos, Result};
use crate::syntax::ast::{Ast, Node, NodeId};
use crate::syntax::parser::{self, ParseError};
use crate::syntax::pos::Span;
use crate::syntax::scanner::Scanner;
use crate::syntax::token::TokenKind;

/// Column shift of `src` inside the statement template, line 1.
const STMT_TMPL_OFFSET: usize = 22;
/// Column shift of `src` inside the type template, line 1.
const TYPE_TMPL_OFFSET: usize = 17;

fn attempt(ast: &mut Ast, wrapped: &str) -> std::result::Result<NodeId, ParseError> {
    let mut scratch = Ast::new();
    let root = parser::parse_file(&mut scratch, 0, wrapped)?;
    let off = ast.absorb(scratch);
    Ok(NodeId(root.0 + off))
}

fn file_decls(ast: &Ast, file: NodeId) -> Vec<NodeId> {
    match ast.node(file) {
        Node::File { decls, .. } => decls.clone(),
        _ => Vec::new(),
    }
}

fn first_value_spec(ast: &Ast, file: NodeId) -> Option<NodeId> {
    let decls = file_decls(ast, file);
    match ast.node(*decls.first()?) {
        Node::GenDecl { specs, .. } => specs.first().copied(),
        _ => None,
    }
}

fn func_body_list(ast: &Ast, file: NodeId) -> Option<Vec<NodeId>> {
    let decls = file_decls(ast, file);
    match ast.node(*decls.first()?) {
        Node::FuncDecl { body: Some(b), .. } => match ast.node(*b) {
            Node::BlockStmt { list } => Some(list.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn sub_tmpl_offset(mut e: ParseError, offset: usize) -> ParseError {
    if e.line == 1 && e.col > offset {
        e.col -= offset;
    }
    e
}

fn to_parse_error(e: ParseError) -> Error {
    Error::Parse {
        pos: PatPos {
            line: e.line,
            col: e.col,
        },
        msg: e.msg,
    }
}

/// Parse the node contained in `src` as one of: a file, a declaration, a
/// block, an expression list, a statement list, a type, or a value spec.
pub fn parse_any(ast: &mut Ast, src: &str) -> Result<NodeId> {
    let mut sc = Scanner::new(src);
    if sc.scan().kind == TokenKind::Eof {
        return Err(Error::EmptySource);
    }
    let mut main_err: Option<ParseError> = None;

    // first try as a whole file
    if let Ok(file) = attempt(ast, src) {
        return Ok(file);
    }

    // then as a single declaration, or many
    if let Ok(file) = attempt(ast, &format!("package p; {src}")) {
        let decls = file_decls(ast, file);
        if decls.len() == 1 {
            return Ok(decls[0]);
        }
        return Ok(file);
    }

    // then as a block; otherwise blocks might be mistaken for composite
    // literals further below
    if let Ok(file) = attempt(ast, &format!("package p; func _() {{ if true {src} else {{}} }}")) {
        if let Some(list) = func_body_list(ast, file) {
            if list.len() == 1 {
                if let Node::IfStmt { body, .. } = ast.node(list[0]) {
                    return Ok(*body);
                }
            }
        }
    }

    // then as value expressions
    if let Ok(file) = attempt(ast, &format!("package p; var _ = []interface{{}}{{ {src}, }}")) {
        if let Some(spec) = first_value_spec(ast, file) {
            if let Node::ValueSpec { values, .. } = ast.node(spec) {
                if let Some(&cl) = values.first() {
                    if let Node::CompositeLit { elts, .. } = ast.node(cl) {
                        let elts = elts.clone();
                        if elts.len() == 1 {
                            return Ok(elts[0]);
                        }
                        return Ok(ast.alloc(Node::ExprList(elts), Span::none()));
                    }
                }
            }
        }
    }

    // then try as statements
    match attempt(ast, &format!("package p; func _() {{ {src} }}")) {
        Ok(file) => {
            if let Some(list) = func_body_list(ast, file) {
                if list.len() == 1 {
                    return Ok(list[0]);
                }
                return Ok(ast.alloc(Node::StmtList(list), Span::none()));
            }
        }
        Err(e) => {
            // statements cover most patterns, so this is the error to show
            main_err = Some(sub_tmpl_offset(e, STMT_TMPL_OFFSET));
        }
    }

    // type expressions not yet picked up, for e.g. chans and interfaces
    if let Ok(file) = attempt(ast, &format!("package p; var _ {src}")) {
        if let Some(spec) = first_value_spec(ast, file) {
            if let Node::ValueSpec { typ: Some(t), .. } = ast.node(spec) {
                return Ok(*t);
            }
        }
    }

    // value specs
    if let Ok(file) = attempt(ast, &format!("package p; var {src}")) {
        if let Some(spec) = first_value_spec(ast, file) {
            if matches!(ast.node(spec), Node::ValueSpec { .. }) {
                return Ok(spec);
            }
        }
    }

    let e = main_err.unwrap_or(ParseError {
        line: 1,
        col: 1,
        msg: "invalid pattern syntax".to_string(),
    });
    Err(to_parse_error(e))
}

/// Parse `src` as a type expression, for the `Type`/`Assignable`/`Convertible`
/// pipeline operators.
pub fn parse_type(ast: &mut Ast, src: &str) -> Result<NodeId> {
    match attempt(ast, &format!("package p; var _ {src}")) {
        Ok(file) => {
            if let Some(spec) = first_value_spec(ast, file) {
                if let Node::ValueSpec { typ: Some(t), .. } = ast.node(spec) {
                    return Ok(*t);
                }
            }
            Err(Error::TypeParse {
                pos: PatPos { line: 1, col: 1 },
                msg: "expected type".to_string(),
            })
        }
        Err(e) => {
            let e = sub_tmpl_offset(e, TYPE_TMPL_OFFSET);
            Err(Error::TypeParse {
                pos: PatPos {
                    line: e.line,
                    col: e.col,
                },
                msg: e.msg,
            })
        }
    }
}
