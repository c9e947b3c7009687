//! Recursive-descent Go parser.
//!
//! Parses the language subset the pattern engine matches: files,
//! declarations, statements, expressions, and type expressions (no
//! generics). Parsing fails on the first error; error texts follow
//! go/parser so column-corrected messages read the same.

use super::ast::{Ast, ChanDir, Node, NodeId};
use super::pos::{LineMap, Span};
use super::scanner::{Scanner, Tok};
use super::token::TokenKind;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub msg: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.msg)
    }
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'s, 'a> {
    sc: Scanner<'s>,
    lines: LineMap,
    ast: &'a mut Ast,
    base: u32,
    tok: Tok,
    prev_end: u32,
    expr_lev: i32,
}

/// Parse a whole Go file. `base` is the global offset of the source in the
/// caller's source map; node spans come out in global coordinates.
pub fn parse_file(ast: &mut Ast, base: u32, src: &str) -> PResult<NodeId> {
    let mut p = Parser::new(ast, base, src);
    let file = p.parse_file()?;
    Ok(file)
}

/// Parse a single expression followed by end of input.
pub fn parse_expr(ast: &mut Ast, src: &str) -> PResult<NodeId> {
    let mut p = Parser::new(ast, 0, src);
    let x = p.expr()?;
    // a trailing inserted semicolon is fine
    if p.tok.kind == TokenKind::Semicolon && p.tok.lit == "\n" {
        p.next();
    }
    if p.tok.kind != TokenKind::Eof {
        return Err(p.err_expected("';'"));
    }
    Ok(x)
}

impl<'s, 'a> Parser<'s, 'a> {
    fn new(ast: &'a mut Ast, base: u32, src: &'s str) -> Parser<'s, 'a> {
        let mut p = Parser {
            sc: Scanner::new(src),
            lines: LineMap::new(src),
            ast,
            base,
            tok: Tok {
                kind: TokenKind::Eof,
                lit: String::new(),
                off: 0,
            },
            prev_end: 0,
            expr_lev: 0,
        };
        p.next();
        p
    }

    fn next(&mut self) {
        self.prev_end = self.tok_end();
        self.tok = self.sc.scan();
    }

    fn tok_end(&self) -> u32 {
        let len = if self.tok.lit.is_empty() {
            self.tok.kind.text().len()
        } else {
            self.tok.lit.len()
        };
        match self.tok.kind {
            TokenKind::Eof => self.tok.off,
            _ => self.tok.off + len as u32,
        }
    }

    fn pos(&self) -> u32 {
        self.tok.off
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start + self.base, self.prev_end + self.base)
    }

    fn err_at(&self, off: u32, msg: String) -> ParseError {
        let (line, col) = self.lines.line_col(off);
        ParseError { line, col, msg }
    }

    fn found(&self) -> String {
        match self.tok.kind {
            TokenKind::Eof => "'EOF'".to_string(),
            k if k.is_literal() && !self.tok.lit.is_empty() && k != TokenKind::Ident => {
                self.tok.lit.clone()
            }
            TokenKind::Ident => self.tok.lit.clone(),
            k => format!("'{}'", k.text()),
        }
    }

    fn err_expected(&self, what: &str) -> ParseError {
        // surface a pending scanner error first, as the scanner saw it
        if let Some(e) = self.sc.errors.first() {
            return self.err_at(e.off, e.msg.clone());
        }
        self.err_at(self.pos(), format!("expected {}, found {}", what, self.found()))
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<u32> {
        if self.tok.kind != kind {
            return Err(self.err_expected(&format!("'{}'", kind.text())));
        }
        let off = self.pos();
        self.next();
        Ok(off)
    }

    fn expect_semi(&mut self) -> PResult<()> {
        match self.tok.kind {
            TokenKind::Rparen | TokenKind::Rbrace => Ok(()),
            TokenKind::Semicolon => {
                self.next();
                Ok(())
            }
            _ => Err(self.err_expected("';'")),
        }
    }

    fn alloc(&mut self, node: Node, start: u32) -> NodeId {
        let span = self.span_from(start);
        self.ast.alloc(node, span)
    }

    // ----- file and declarations -----

    fn parse_file(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Package)?;
        let name = self.ident()?;
        self.expect_semi()?;
        let mut decls = Vec::new();
        while self.tok.kind != TokenKind::Eof {
            decls.push(self.decl()?);
        }
        Ok(self.alloc(Node::File { name, decls }, start))
    }

    fn decl(&mut self) -> PResult<NodeId> {
        match self.tok.kind {
            TokenKind::Func => self.func_decl(),
            TokenKind::Var | TokenKind::Const | TokenKind::Type | TokenKind::Import => {
                let d = self.gen_decl()?;
                self.expect_semi()?;
                Ok(d)
            }
            _ => Err(self.err_expected("declaration")),
        }
    }

    fn func_decl(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Func)?;
        let mut recv = None;
        if self.tok.kind == TokenKind::Lparen {
            let fields = self.params()?;
            recv = fields.into_iter().next();
        }
        let name = self.ident()?;
        let typ = self.signature(start)?;
        let body = if self.tok.kind == TokenKind::Lbrace {
            Some(self.block()?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(self.alloc(
            Node::FuncDecl {
                recv,
                name,
                typ,
                body,
            },
            start,
        ))
    }

    fn signature(&mut self, start: u32) -> PResult<NodeId> {
        let params = self.params()?;
        let results = self.results()?;
        Ok(self.alloc(Node::FuncType { params, results }, start))
    }

    fn gen_decl(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        let op = self.tok.kind;
        self.next();
        let mut specs = Vec::new();
        let grouped = self.tok.kind == TokenKind::Lparen;
        if grouped {
            self.next();
            while self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Eof {
                specs.push(self.spec(op)?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::Rparen)?;
        } else {
            specs.push(self.spec(op)?);
        }
        Ok(self.alloc(Node::GenDecl { op, specs, grouped }, start))
    }

    fn spec(&mut self, decl_op: TokenKind) -> PResult<NodeId> {
        let start = self.pos();
        match decl_op {
            TokenKind::Import => {
                let name = match self.tok.kind {
                    TokenKind::Ident => Some(self.ident()?),
                    TokenKind::Period => {
                        let p = self.pos();
                        self.next();
                        Some(self.alloc(
                            Node::Ident {
                                name: ".".to_string(),
                            },
                            p,
                        ))
                    }
                    _ => None,
                };
                if self.tok.kind != TokenKind::String {
                    return Err(self.err_expected("import path"));
                }
                let path = self.basic_lit();
                Ok(self.alloc(Node::ImportSpec { name, path }, start))
            }
            TokenKind::Type => {
                let name = self.ident()?;
                let alias = self.tok.kind == TokenKind::Assign;
                if alias {
                    self.next();
                }
                let typ = self.type_expr()?;
                Ok(self.alloc(Node::TypeSpec { name, typ, alias }, start))
            }
            _ => self.value_spec(start),
        }
    }

    fn value_spec(&mut self, start: u32) -> PResult<NodeId> {
        let names = self.ident_list()?;
        let typ = if self.type_start() {
            Some(self.type_expr()?)
        } else {
            None
        };
        let mut values = Vec::new();
        if self.tok.kind == TokenKind::Assign {
            self.next();
            values = self.expr_list()?;
        }
        Ok(self.alloc(Node::ValueSpec { names, typ, values }, start))
    }

    fn ident(&mut self) -> PResult<NodeId> {
        if self.tok.kind != TokenKind::Ident {
            return Err(self.err_expected("identifier"));
        }
        let start = self.pos();
        let name = std::mem::take(&mut self.tok.lit);
        self.next();
        Ok(self.alloc(Node::Ident { name }, start))
    }

    fn ident_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut list = vec![self.ident()?];
        while self.tok.kind == TokenKind::Comma {
            self.next();
            list.push(self.ident()?);
        }
        Ok(list)
    }

    fn basic_lit(&mut self) -> NodeId {
        let start = self.pos();
        let kind = self.tok.kind;
        let value = std::mem::take(&mut self.tok.lit);
        self.next();
        self.alloc(Node::BasicLit { kind, value }, start)
    }

    // ----- types -----

    fn type_start(&self) -> bool {
        matches!(
            self.tok.kind,
            TokenKind::Ident
                | TokenKind::Lparen
                | TokenKind::Lbrack
                | TokenKind::Mul
                | TokenKind::Arrow
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Interface
                | TokenKind::Map
                | TokenKind::Struct
        )
    }

    // Types are unary-shaped; stopping before binary operators keeps
    // `var _ notType + expr` an error rather than a binary-expression type.
    fn type_expr(&mut self) -> PResult<NodeId> {
        self.unary_expr()
    }

    fn struct_type(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Struct)?;
        self.expect(TokenKind::Lbrace)?;
        let mut fields = Vec::new();
        while self.tok.kind != TokenKind::Rbrace && self.tok.kind != TokenKind::Eof {
            fields.push(self.field_decl()?);
            self.expect_semi()?;
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(self.alloc(Node::StructType { fields }, start))
    }

    fn field_decl(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        let mut exprs = vec![self.type_expr()?];
        while self.tok.kind == TokenKind::Comma {
            self.next();
            exprs.push(self.type_expr()?);
        }
        let (names, typ) = if self.type_start() {
            // the leading expressions were field names
            for e in &exprs {
                if self.ast.ident_name(*e).is_none() {
                    return Err(self.err_at(self.pos(), "expected field name".to_string()));
                }
            }
            (exprs, Some(self.type_expr()?))
        } else {
            if exprs.len() != 1 {
                return Err(self.err_expected("type"));
            }
            // embedded field
            (Vec::new(), Some(exprs.remove(0)))
        };
        let tag = if self.tok.kind == TokenKind::String {
            let t = std::mem::take(&mut self.tok.lit);
            self.next();
            Some(t)
        } else {
            None
        };
        Ok(self.alloc(Node::Field { names, typ, tag }, start))
    }

    fn interface_type(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Interface)?;
        self.expect(TokenKind::Lbrace)?;
        let mut methods = Vec::new();
        while self.tok.kind != TokenKind::Rbrace && self.tok.kind != TokenKind::Eof {
            let fstart = self.pos();
            let mut first = self.ident()?;
            let field = if self.tok.kind == TokenKind::Lparen {
                let typ = self.signature(fstart)?;
                self.alloc(
                    Node::Field {
                        names: vec![first],
                        typ: Some(typ),
                        tag: None,
                    },
                    fstart,
                )
            } else {
                // embedded interface, possibly qualified
                while self.tok.kind == TokenKind::Period {
                    self.next();
                    let sel = self.ident()?;
                    first = self.alloc(Node::SelectorExpr { x: first, sel }, fstart);
                }
                self.alloc(
                    Node::Field {
                        names: Vec::new(),
                        typ: Some(first),
                        tag: None,
                    },
                    fstart,
                )
            };
            methods.push(field);
            self.expect_semi()?;
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(self.alloc(Node::InterfaceType { methods }, start))
    }

    fn params(&mut self) -> PResult<Vec<NodeId>> {
        self.expect(TokenKind::Lparen)?;
        let saved = self.expr_lev;
        self.expr_lev = 1;
        // entries are (exprs, typ): a trailing type groups the pending names
        let mut entries: Vec<(Vec<NodeId>, Option<NodeId>, u32)> = Vec::new();
        while self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Eof {
            let estart = self.pos();
            if self.tok.kind == TokenKind::Ellipsis {
                let typ = self.ellipsis_type()?;
                entries.push((Vec::new(), Some(typ), estart));
            } else {
                let first = self.type_expr()?;
                if self.type_start() || self.tok.kind == TokenKind::Ellipsis {
                    let typ = if self.tok.kind == TokenKind::Ellipsis {
                        self.ellipsis_type()?
                    } else {
                        self.type_expr()?
                    };
                    entries.push((vec![first], Some(typ), estart));
                } else {
                    entries.push((vec![first], None, estart));
                }
            }
            if self.tok.kind != TokenKind::Comma {
                break;
            }
            self.next();
        }
        self.expr_lev = saved;
        self.expect(TokenKind::Rparen)?;

        let named = entries.iter().any(|(_, t, _)| t.is_some());
        let mut fields = Vec::new();
        if named {
            let mut pending: Vec<NodeId> = Vec::new();
            let mut pending_start = 0;
            for (exprs, typ, estart) in entries {
                if pending.is_empty() {
                    pending_start = estart;
                }
                pending.extend(exprs);
                if let Some(typ) = typ {
                    let names = std::mem::take(&mut pending);
                    fields.push(self.alloc(
                        Node::Field {
                            names,
                            typ: Some(typ),
                            tag: None,
                        },
                        pending_start,
                    ));
                }
            }
            for name in pending {
                // a trailing name with no following type is an anonymous type
                let span = self.ast.span(name);
                fields.push(self.ast.alloc(
                    Node::Field {
                        names: Vec::new(),
                        typ: Some(name),
                        tag: None,
                    },
                    span,
                ));
            }
        } else {
            for (exprs, _, estart) in entries {
                for e in exprs {
                    fields.push(self.alloc(
                        Node::Field {
                            names: Vec::new(),
                            typ: Some(e),
                            tag: None,
                        },
                        estart,
                    ));
                }
            }
        }
        Ok(fields)
    }

    fn ellipsis_type(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Ellipsis)?;
        let elt = if self.type_start() {
            Some(self.type_expr()?)
        } else {
            None
        };
        Ok(self.alloc(Node::Ellipsis { elt }, start))
    }

    fn results(&mut self) -> PResult<Vec<NodeId>> {
        if self.tok.kind == TokenKind::Lparen {
            return self.params();
        }
        if self.type_start() {
            let start = self.pos();
            let typ = self.type_expr()?;
            let field = self.alloc(
                Node::Field {
                    names: Vec::new(),
                    typ: Some(typ),
                    tag: None,
                },
                start,
            );
            return Ok(vec![field]);
        }
        Ok(Vec::new())
    }

    // ----- expressions -----

    fn expr(&mut self) -> PResult<NodeId> {
        self.binary_expr(0)
    }

    fn expr_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut list = vec![self.expr()?];
        while self.tok.kind == TokenKind::Comma {
            self.next();
            list.push(self.expr()?);
        }
        Ok(list)
    }

    fn binary_expr(&mut self, min_prec: u8) -> PResult<NodeId> {
        let start = self.pos();
        let mut x = self.unary_expr()?;
        loop {
            let prec = self.tok.kind.precedence();
            if prec == 0 || prec <= min_prec {
                return Ok(x);
            }
            let op = self.tok.kind;
            self.next();
            let y = self.binary_expr(prec)?;
            x = self.alloc(Node::BinaryExpr { op, x, y }, start);
        }
    }

    fn unary_expr(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        match self.tok.kind {
            TokenKind::Add | TokenKind::Sub | TokenKind::Not | TokenKind::Xor | TokenKind::And => {
                let op = self.tok.kind;
                self.next();
                let x = self.unary_expr()?;
                Ok(self.alloc(Node::UnaryExpr { op, x }, start))
            }
            TokenKind::Mul => {
                self.next();
                let x = self.unary_expr()?;
                Ok(self.alloc(Node::StarExpr { x }, start))
            }
            TokenKind::Arrow => {
                self.next();
                if self.tok.kind == TokenKind::Chan {
                    self.next();
                    let value = self.unary_expr()?;
                    return Ok(self.alloc(
                        Node::ChanType {
                            dir: ChanDir::Recv,
                            value,
                        },
                        start,
                    ));
                }
                let x = self.unary_expr()?;
                Ok(self.alloc(
                    Node::UnaryExpr {
                        op: TokenKind::Arrow,
                        x,
                    },
                    start,
                ))
            }
            _ => self.primary_expr(),
        }
    }

    fn primary_expr(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        let mut x = self.operand()?;
        loop {
            match self.tok.kind {
                TokenKind::Period => {
                    self.next();
                    match self.tok.kind {
                        TokenKind::Ident => {
                            let sel = self.ident()?;
                            x = self.alloc(Node::SelectorExpr { x, sel }, start);
                        }
                        TokenKind::Lparen => {
                            self.next();
                            let typ = if self.tok.kind == TokenKind::Type {
                                self.next();
                                None
                            } else {
                                Some(self.type_expr()?)
                            };
                            self.expect(TokenKind::Rparen)?;
                            x = self.alloc(Node::TypeAssertExpr { x, typ }, start);
                        }
                        _ => return Err(self.err_expected("selector or type assertion")),
                    }
                }
                TokenKind::Lbrack => {
                    self.next();
                    let saved = self.expr_lev;
                    self.expr_lev = 1;
                    let mut low = None;
                    if self.tok.kind != TokenKind::Colon {
                        low = Some(self.expr()?);
                    }
                    if self.tok.kind == TokenKind::Colon {
                        self.next();
                        let mut high = None;
                        let mut max = None;
                        if self.tok.kind != TokenKind::Rbrack && self.tok.kind != TokenKind::Colon
                        {
                            high = Some(self.expr()?);
                        }
                        if self.tok.kind == TokenKind::Colon {
                            self.next();
                            max = Some(self.expr()?);
                        }
                        self.expr_lev = saved;
                        self.expect(TokenKind::Rbrack)?;
                        x = self.alloc(Node::SliceExpr { x, low, high, max }, start);
                    } else {
                        self.expr_lev = saved;
                        self.expect(TokenKind::Rbrack)?;
                        let index = low.ok_or_else(|| self.err_expected("operand"))?;
                        x = self.alloc(Node::IndexExpr { x, index }, start);
                    }
                }
                TokenKind::Lparen => {
                    self.next();
                    let saved = self.expr_lev;
                    self.expr_lev = 1;
                    let mut args = Vec::new();
                    let mut has_ellipsis = false;
                    while self.tok.kind != TokenKind::Rparen && self.tok.kind != TokenKind::Eof {
                        args.push(self.expr()?);
                        if self.tok.kind == TokenKind::Ellipsis {
                            self.next();
                            has_ellipsis = true;
                        }
                        if self.tok.kind != TokenKind::Comma {
                            break;
                        }
                        self.next();
                    }
                    self.expr_lev = saved;
                    self.expect(TokenKind::Rparen)?;
                    x = self.alloc(
                        Node::CallExpr {
                            fun: x,
                            args,
                            has_ellipsis,
                        },
                        start,
                    );
                }
                TokenKind::Lbrace => {
                    if !self.lit_type_ok(x) {
                        return Ok(x);
                    }
                    let elts = self.lit_value()?;
                    x = self.alloc(
                        Node::CompositeLit {
                            typ: Some(x),
                            elts,
                        },
                        start,
                    );
                }
                _ => return Ok(x),
            }
        }
    }

    /// Whether `{` after this operand starts a composite literal.
    fn lit_type_ok(&self, x: NodeId) -> bool {
        match self.ast.node(x) {
            Node::ArrayType { .. } | Node::MapType { .. } | Node::StructType { .. } => true,
            Node::Ident { .. } | Node::SelectorExpr { .. } => self.expr_lev >= 0,
            _ => false,
        }
    }

    fn lit_value(&mut self) -> PResult<Vec<NodeId>> {
        self.expect(TokenKind::Lbrace)?;
        let saved = self.expr_lev;
        self.expr_lev = 1;
        let mut elts = Vec::new();
        while self.tok.kind != TokenKind::Rbrace && self.tok.kind != TokenKind::Eof {
            elts.push(self.lit_elt()?);
            if self.tok.kind != TokenKind::Comma {
                break;
            }
            self.next();
        }
        self.expr_lev = saved;
        self.expect(TokenKind::Rbrace)?;
        Ok(elts)
    }

    fn lit_elt(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        let key = if self.tok.kind == TokenKind::Lbrace {
            let elts = self.lit_value()?;
            self.alloc(Node::CompositeLit { typ: None, elts }, start)
        } else {
            self.expr()?
        };
        if self.tok.kind == TokenKind::Colon {
            self.next();
            let value = if self.tok.kind == TokenKind::Lbrace {
                let vstart = self.pos();
                let elts = self.lit_value()?;
                self.alloc(Node::CompositeLit { typ: None, elts }, vstart)
            } else {
                self.expr()?
            };
            return Ok(self.alloc(Node::KeyValueExpr { key, value }, start));
        }
        Ok(key)
    }

    fn operand(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        match self.tok.kind {
            TokenKind::Ident => self.ident(),
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Char
            | TokenKind::String => Ok(self.basic_lit()),
            TokenKind::Lparen => {
                self.next();
                let saved = self.expr_lev;
                self.expr_lev = 1;
                let x = self.expr()?;
                self.expr_lev = saved;
                self.expect(TokenKind::Rparen)?;
                Ok(self.alloc(Node::ParenExpr { x }, start))
            }
            TokenKind::Func => {
                self.next();
                let typ = self.signature(start)?;
                if self.tok.kind == TokenKind::Lbrace {
                    let saved = self.expr_lev;
                    self.expr_lev = 0;
                    let body = self.block()?;
                    self.expr_lev = saved;
                    return Ok(self.alloc(Node::FuncLit { typ, body }, start));
                }
                Ok(typ)
            }
            TokenKind::Lbrack => {
                self.next();
                let len = match self.tok.kind {
                    TokenKind::Rbrack => None,
                    TokenKind::Ellipsis => {
                        let estart = self.pos();
                        self.next();
                        Some(self.alloc(Node::Ellipsis { elt: None }, estart))
                    }
                    _ => {
                        let saved = self.expr_lev;
                        self.expr_lev = 1;
                        let e = self.expr()?;
                        self.expr_lev = saved;
                        Some(e)
                    }
                };
                self.expect(TokenKind::Rbrack)?;
                let elt = self.type_expr()?;
                Ok(self.alloc(Node::ArrayType { len, elt }, start))
            }
            TokenKind::Map => {
                self.next();
                self.expect(TokenKind::Lbrack)?;
                let key = self.type_expr()?;
                self.expect(TokenKind::Rbrack)?;
                let value = self.type_expr()?;
                Ok(self.alloc(Node::MapType { key, value }, start))
            }
            TokenKind::Chan => {
                self.next();
                let dir = if self.tok.kind == TokenKind::Arrow {
                    self.next();
                    ChanDir::Send
                } else {
                    ChanDir::SendRecv
                };
                let value = self.unary_expr()?;
                Ok(self.alloc(Node::ChanType { dir, value }, start))
            }
            TokenKind::Struct => self.struct_type(),
            TokenKind::Interface => self.interface_type(),
            _ => Err(self.err_expected("operand")),
        }
    }

    // ----- statements -----

    fn block(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Lbrace)?;
        let list = self.stmt_list()?;
        self.expect(TokenKind::Rbrace)?;
        Ok(self.alloc(Node::BlockStmt { list }, start))
    }

    fn stmt_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut list = Vec::new();
        while !matches!(
            self.tok.kind,
            TokenKind::Rbrace | TokenKind::Case | TokenKind::Default | TokenKind::Eof
        ) {
            list.push(self.stmt()?);
        }
        Ok(list)
    }

    pub(crate) fn stmt(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        match self.tok.kind {
            TokenKind::Var | TokenKind::Const | TokenKind::Type => {
                let decl = self.gen_decl()?;
                self.expect_semi()?;
                Ok(self.alloc(Node::DeclStmt { decl }, start))
            }
            TokenKind::Semicolon => {
                self.next();
                Ok(self.alloc(Node::EmptyStmt, start))
            }
            TokenKind::Lbrace => {
                let b = self.block()?;
                self.expect_semi()?;
                Ok(b)
            }
            TokenKind::Go | TokenKind::Defer => {
                let kw = self.tok.kind;
                self.next();
                let call = self.expr()?;
                if !matches!(self.ast.node(call), Node::CallExpr { .. }) {
                    let what = if kw == TokenKind::Go { "go" } else { "defer" };
                    return Err(
                        self.err_at(start, format!("expression in {} must be function call", what))
                    );
                }
                self.expect_semi()?;
                let node = if kw == TokenKind::Go {
                    Node::GoStmt { call }
                } else {
                    Node::DeferStmt { call }
                };
                Ok(self.alloc(node, start))
            }
            TokenKind::Return => {
                self.next();
                let mut results = Vec::new();
                if !matches!(
                    self.tok.kind,
                    TokenKind::Semicolon | TokenKind::Rbrace | TokenKind::Eof
                ) {
                    results = self.expr_list()?;
                }
                self.expect_semi()?;
                Ok(self.alloc(Node::ReturnStmt { results }, start))
            }
            TokenKind::Break | TokenKind::Continue | TokenKind::Goto | TokenKind::Fallthrough => {
                let op = self.tok.kind;
                self.next();
                let label = if self.tok.kind == TokenKind::Ident
                    && op != TokenKind::Fallthrough
                {
                    Some(self.ident()?)
                } else {
                    None
                };
                self.expect_semi()?;
                Ok(self.alloc(Node::BranchStmt { op, label }, start))
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Switch => self.switch_stmt(),
            TokenKind::Select => self.select_stmt(),
            _ => {
                let s = self.simple_stmt(true)?;
                // a labeled statement's inner statement consumed its semicolon
                if !matches!(self.ast.node(s), Node::LabeledStmt { .. }) {
                    self.expect_semi()?;
                }
                Ok(s)
            }
        }
    }

    /// An assignment, send, inc/dec, labeled, or expression statement.
    fn simple_stmt(&mut self, label_ok: bool) -> PResult<NodeId> {
        let start = self.pos();
        if self.tok.kind == TokenKind::Range {
            return Err(self.err_expected("statement"));
        }
        if !(self.type_start()
            || self.tok.kind.is_literal()
            || matches!(
                self.tok.kind,
                TokenKind::Add
                    | TokenKind::Sub
                    | TokenKind::Not
                    | TokenKind::Xor
                    | TokenKind::And
                    | TokenKind::Arrow
            ))
        {
            return Err(self.err_expected("statement"));
        }
        let lhs = self.expr_list()?;
        match self.tok.kind {
            op if op.is_assign_op() => {
                self.next();
                let rhs = self.expr_list()?;
                Ok(self.alloc(Node::AssignStmt { lhs, op, rhs }, start))
            }
            TokenKind::Colon if label_ok && lhs.len() == 1 => {
                let label = lhs[0];
                if self.ast.ident_name(label).is_none() {
                    return Err(self.err_expected("':'"));
                }
                self.next();
                let stmt = self.stmt()?;
                Ok(self.alloc(Node::LabeledStmt { label, stmt }, start))
            }
            TokenKind::Arrow if lhs.len() == 1 => {
                self.next();
                let value = self.expr()?;
                Ok(self.alloc(
                    Node::SendStmt {
                        chan: lhs[0],
                        value,
                    },
                    start,
                ))
            }
            TokenKind::Inc | TokenKind::Dec if lhs.len() == 1 => {
                let op = self.tok.kind;
                self.next();
                Ok(self.alloc(Node::IncDecStmt { x: lhs[0], op }, start))
            }
            _ => {
                if lhs.len() != 1 {
                    return Err(self.err_expected("':='"));
                }
                Ok(self.alloc(Node::ExprStmt { x: lhs[0] }, start))
            }
        }
    }

    fn cond_of(&mut self, stmt: NodeId) -> PResult<NodeId> {
        match self.ast.node(stmt) {
            Node::ExprStmt { x } => Ok(*x),
            _ => Err(self.err_at(
                self.ast.span(stmt).start.saturating_sub(self.base),
                "expected boolean expression".to_string(),
            )),
        }
    }

    fn if_stmt(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::If)?;
        let saved = self.expr_lev;
        self.expr_lev = -1;
        if self.tok.kind == TokenKind::Lbrace {
            return Err(self.err_at(self.pos(), "missing condition in if statement".to_string()));
        }
        let mut init = None;
        let s1 = self.simple_stmt(false)?;
        let cond_stmt = if self.tok.kind == TokenKind::Semicolon {
            self.next();
            init = Some(s1);
            self.simple_stmt(false)?
        } else {
            s1
        };
        let cond = self.cond_of(cond_stmt)?;
        self.expr_lev = saved;
        let body = self.block()?;
        let els = if self.tok.kind == TokenKind::Else {
            self.next();
            let e = match self.tok.kind {
                TokenKind::If => self.if_stmt()?,
                TokenKind::Lbrace => {
                    let b = self.block()?;
                    self.expect_semi()?;
                    b
                }
                _ => return Err(self.err_expected("if statement or block")),
            };
            Some(e)
        } else {
            self.expect_semi()?;
            None
        };
        Ok(self.alloc(
            Node::IfStmt {
                init,
                cond,
                body,
                els,
            },
            start,
        ))
    }

    fn for_stmt(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::For)?;
        let saved = self.expr_lev;
        self.expr_lev = -1;

        // bare `for range x`
        if self.tok.kind == TokenKind::Range {
            self.next();
            let x = self.expr()?;
            self.expr_lev = saved;
            let body = self.block()?;
            self.expect_semi()?;
            return Ok(self.alloc(
                Node::RangeStmt {
                    key: None,
                    value: None,
                    op: TokenKind::Illegal,
                    x,
                    body,
                },
                start,
            ));
        }

        let mut init = None;
        let mut cond = None;
        let mut post = None;
        if self.tok.kind != TokenKind::Lbrace {
            if self.tok.kind != TokenKind::Semicolon {
                // could be a range clause with key/value
                let lhs_start = self.pos();
                let lhs = self.expr_list()?;
                if self.tok.kind.is_assign_op() {
                    let op = self.tok.kind;
                    self.next();
                    if self.tok.kind == TokenKind::Range {
                        if !matches!(op, TokenKind::Assign | TokenKind::Define) || lhs.len() > 2 {
                            return Err(self.err_at(
                                lhs_start,
                                "expected at most 2 expressions".to_string(),
                            ));
                        }
                        self.next();
                        let x = self.expr()?;
                        self.expr_lev = saved;
                        let body = self.block()?;
                        self.expect_semi()?;
                        return Ok(self.alloc(
                            Node::RangeStmt {
                                key: lhs.first().copied(),
                                value: lhs.get(1).copied(),
                                op,
                                x,
                                body,
                            },
                            start,
                        ));
                    }
                    let rhs = self.expr_list()?;
                    init = Some(self.alloc(Node::AssignStmt { lhs, op, rhs }, lhs_start));
                } else if lhs.len() == 1 {
                    match self.tok.kind {
                        TokenKind::Inc | TokenKind::Dec => {
                            let op = self.tok.kind;
                            self.next();
                            init = Some(self.alloc(Node::IncDecStmt { x: lhs[0], op }, lhs_start));
                        }
                        _ => init = Some(self.alloc(Node::ExprStmt { x: lhs[0] }, lhs_start)),
                    }
                } else {
                    return Err(self.err_expected("':='"));
                }
            }
            if self.tok.kind == TokenKind::Semicolon {
                self.next();
                if self.tok.kind != TokenKind::Semicolon {
                    let c = self.simple_stmt(false)?;
                    cond = Some(self.cond_of(c)?);
                }
                self.expect(TokenKind::Semicolon)?;
                if self.tok.kind != TokenKind::Lbrace {
                    post = Some(self.simple_stmt(false)?);
                }
            } else {
                // single header element: it was the condition
                let c = init.take().ok_or_else(|| self.err_expected("condition"))?;
                cond = Some(self.cond_of(c)?);
            }
        }
        self.expr_lev = saved;
        let body = self.block()?;
        self.expect_semi()?;
        Ok(self.alloc(
            Node::ForStmt {
                init,
                cond,
                post,
                body,
            },
            start,
        ))
    }

    fn switch_stmt(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Switch)?;
        let saved = self.expr_lev;
        self.expr_lev = -1;
        let mut s1 = None;
        let mut s2 = None;
        if self.tok.kind != TokenKind::Lbrace {
            s2 = Some(self.simple_stmt(false)?);
            if self.tok.kind == TokenKind::Semicolon {
                self.next();
                s1 = s2.take();
                if self.tok.kind != TokenKind::Lbrace {
                    s2 = Some(self.simple_stmt(false)?);
                }
            }
        }
        self.expr_lev = saved;

        let is_type_switch = s2.is_some_and(|s| self.is_type_switch_guard(s));
        let node = if is_type_switch {
            let body = self.case_body()?;
            Node::TypeSwitchStmt {
                init: s1,
                assign: s2.unwrap(),
                body,
            }
        } else {
            let tag = match s2 {
                Some(s) => Some(self.cond_of(s)?),
                None => None,
            };
            let body = self.case_body()?;
            Node::SwitchStmt {
                init: s1,
                tag,
                body,
            }
        };
        self.expect_semi()?;
        Ok(self.alloc(node, start))
    }

    fn is_type_switch_guard(&self, stmt: NodeId) -> bool {
        let assert_is_type = |x: NodeId| {
            matches!(self.ast.node(x), Node::TypeAssertExpr { typ: None, .. })
        };
        match self.ast.node(stmt) {
            Node::ExprStmt { x } => assert_is_type(*x),
            Node::AssignStmt { rhs, op, .. } => {
                *op == TokenKind::Define && rhs.len() == 1 && assert_is_type(rhs[0])
            }
            _ => false,
        }
    }

    fn case_body(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Lbrace)?;
        let mut list = Vec::new();
        while matches!(self.tok.kind, TokenKind::Case | TokenKind::Default) {
            let cstart = self.pos();
            let clause_list = if self.tok.kind == TokenKind::Case {
                self.next();
                self.expr_list()?
            } else {
                self.next();
                Vec::new()
            };
            self.expect(TokenKind::Colon)?;
            let body = self.stmt_list()?;
            list.push(self.alloc(
                Node::CaseClause {
                    list: clause_list,
                    body,
                },
                cstart,
            ));
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(self.alloc(Node::BlockStmt { list }, start))
    }

    fn select_stmt(&mut self) -> PResult<NodeId> {
        let start = self.pos();
        self.expect(TokenKind::Select)?;
        let bstart = self.pos();
        self.expect(TokenKind::Lbrace)?;
        let mut list = Vec::new();
        while matches!(self.tok.kind, TokenKind::Case | TokenKind::Default) {
            let cstart = self.pos();
            let comm = if self.tok.kind == TokenKind::Case {
                self.next();
                Some(self.simple_stmt(false)?)
            } else {
                self.next();
                None
            };
            self.expect(TokenKind::Colon)?;
            let body = self.stmt_list()?;
            list.push(self.alloc(Node::CommClause { comm, body }, cstart));
        }
        self.expect(TokenKind::Rbrace)?;
        let body = self.alloc(Node::BlockStmt { list }, bstart);
        self.expect_semi()?;
        Ok(self.alloc(Node::SelectStmt { body }, start))
    }
}
