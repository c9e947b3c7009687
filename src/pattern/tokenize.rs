//! The token mill: re-scan a pattern, recognizing the wildcard sigils.
//!
//! The host scanner is driven over a mutable copy of the pattern; `$` and
//! `~` arrive as whitelisted illegal characters. Regex attribute bodies are
//! blanked out of the buffer in a pre-pass so the scanner only ever sees
//! whitespace where `/…/` stood, exactly as if the bytes had been overwritten
//! under its nose.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Error, PatPos, Result};
use crate::syntax::ast::Ast;
use crate::syntax::parser;
use crate::syntax::pos::LineMap;
use crate::syntax::scanner::{Scanner, Tok};
use crate::syntax::token::TokenKind;

use super::{MetaVar, PredKind, TypePred, WILD_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MillKind {
    Tok(TokenKind),
    Aggressive,
}

#[derive(Debug, Clone)]
pub struct FullToken {
    pub off: u32,
    pub kind: MillKind,
    pub lit: String,
}

impl FullToken {
    fn plain(t: Tok) -> FullToken {
        FullToken {
            off: t.off,
            kind: MillKind::Tok(t.kind),
            lit: t.lit,
        }
    }
}

const WHITELISTED: [&str; 2] = [
    "illegal character U+0024 '$'",
    "illegal character U+007E '~'",
];

#[derive(Debug, Clone, Copy)]
enum CaseStatus {
    None,
    NeedBlock,
    Here,
}

pub fn tokenize(ast: &mut Ast, vars: &mut Vec<MetaVar>, src: &str) -> Result<Vec<FullToken>> {
    let mut buf = src.as_bytes().to_vec();
    let lines = LineMap::new(src);
    let regexes = blank_regexes(&mut buf, &lines)?;
    let buf = String::from_utf8(buf).expect("blanking regexes keeps the buffer valid");

    let mut sc = Scanner::new(&buf);
    let mut toks = Vec::new();
    loop {
        let t = sc.scan();
        if t.kind == TokenKind::Eof {
            break;
        }
        toks.push(t);
    }
    if let Some(e) = sc
        .errors
        .iter()
        .find(|e| !WHITELISTED.contains(&e.msg.as_str()))
    {
        return Err(Error::Token {
            pos: pat_pos(&lines, e.off),
            msg: e.msg.clone(),
        });
    }

    let mut mill = Mill {
        toks,
        i: 0,
        lines: &lines,
        buf: &buf,
        regexes,
        ast,
        vars,
    };
    mill.run()
}

fn pat_pos(lines: &LineMap, off: u32) -> PatPos {
    let (line, col) = lines.line_col(off);
    PatPos { line, col }
}

/// Blank every `/regex/` body inside `$(…)` attributes, collecting the bodies
/// keyed by the offset of the opening slash. The buffer is re-scanned after
/// each blank so the scanner never trips over regex metacharacters.
fn blank_regexes(buf: &mut [u8], lines: &LineMap) -> Result<HashMap<u32, String>> {
    let mut regexes: HashMap<u32, String> = HashMap::new();
    'rescan: loop {
        let text = String::from_utf8_lossy(buf).into_owned();
        let mut sc = Scanner::new(&text);
        let mut pending_dollar = false;
        let mut in_attr = false;
        let mut depth = 0usize;
        loop {
            let t = sc.scan();
            match t.kind {
                TokenKind::Eof => return Ok(regexes),
                TokenKind::Illegal if t.lit == "$" => {
                    pending_dollar = true;
                    continue;
                }
                TokenKind::Lparen => {
                    if pending_dollar {
                        in_attr = true;
                        depth = 1;
                    } else if in_attr {
                        depth += 1;
                    }
                }
                TokenKind::Rparen if in_attr => {
                    depth -= 1;
                    if depth == 0 {
                        in_attr = false;
                    }
                }
                TokenKind::Quo if in_attr && depth == 1 => {
                    if !regexes.contains_key(&t.off) {
                        let start = t.off as usize + 1;
                        let rel = buf[start..].iter().position(|&b| b == b'/');
                        let Some(rel) = rel else {
                            return Err(Error::UnclosedRegex {
                                pos: pat_pos(lines, t.off),
                            });
                        };
                        let end = start + rel;
                        let body = String::from_utf8_lossy(&buf[start..end]).into_owned();
                        regexes.insert(t.off, body);
                        for b in &mut buf[start..end] {
                            *b = b' ';
                        }
                        continue 'rescan;
                    }
                }
                _ => {}
            }
            pending_dollar = false;
        }
    }
}

struct Mill<'a> {
    toks: Vec<Tok>,
    i: usize,
    lines: &'a LineMap,
    buf: &'a str,
    regexes: HashMap<u32, String>,
    ast: &'a mut Ast,
    vars: &'a mut Vec<MetaVar>,
}

impl<'a> Mill<'a> {
    fn next(&mut self) -> Tok {
        let t = self.toks.get(self.i).cloned().unwrap_or(Tok {
            kind: TokenKind::Eof,
            lit: String::new(),
            off: self.buf.len() as u32,
        });
        self.i += 1;
        t
    }

    fn pos(&self, off: u32) -> PatPos {
        pat_pos(self.lines, off)
    }

    fn run(&mut self) -> Result<Vec<FullToken>> {
        let mut out: Vec<FullToken> = Vec::new();
        let mut case_stat = CaseStatus::None;
        loop {
            let t = self.next();
            if t.kind == TokenKind::Eof {
                return Ok(out);
            }
            match t.lit.as_str() {
                "$" => {}
                "~" => {
                    if !out.is_empty() {
                        return Err(Error::Token {
                            pos: self.pos(t.off),
                            msg: "~ must be at the start of the pattern".to_string(),
                        });
                    }
                    out.push(FullToken {
                        off: t.off,
                        kind: MillKind::Aggressive,
                        lit: String::new(),
                    });
                    continue;
                }
                lit => {
                    match lit {
                        "case" => case_stat = CaseStatus::None,
                        "switch" | "select" => case_stat = CaseStatus::NeedBlock,
                        _ => {}
                    }
                    if t.kind == TokenKind::Lbrace && matches!(case_stat, CaseStatus::NeedBlock) {
                        case_stat = CaseStatus::Here;
                    }
                    out.push(FullToken::plain(t));
                    continue;
                }
            }
            // wildcard
            let wt = self.wildcard(t.off)?;
            if matches!(case_stat, CaseStatus::Here) {
                out.push(FullToken {
                    off: wt.off,
                    kind: MillKind::Tok(TokenKind::Ident),
                    lit: "case".to_string(),
                });
                out.push(wt.clone());
                out.push(FullToken {
                    off: wt.off,
                    kind: MillKind::Tok(TokenKind::Colon),
                    lit: String::new(),
                });
                out.push(FullToken {
                    off: wt.off,
                    kind: MillKind::Tok(TokenKind::Ident),
                    lit: "gogrep_body".to_string(),
                });
            } else {
                out.push(wt);
            }
        }
    }

    /// Recognize the wildcard that follows a `$`, which sits at `dollar_off`.
    fn wildcard(&mut self, dollar_off: u32) -> Result<FullToken> {
        let mut t = self.next();
        let paren = t.kind == TokenKind::Lparen;
        if paren {
            t = self.next();
        }
        let mut info = MetaVar::default();
        if t.kind == TokenKind::Mul {
            t = self.next();
            info.variadic = true;
        }
        if t.kind != TokenKind::Ident {
            return Err(Error::DollarWithoutIdent {
                pos: self.pos(t.off),
                got: if t.kind.is_keyword() {
                    t.lit.clone()
                } else {
                    t.kind.text().to_string()
                },
            });
        }
        let id = self.vars.len();
        let wt = FullToken {
            off: dollar_off,
            kind: MillKind::Tok(TokenKind::Ident),
            lit: format!("{WILD_PREFIX}{id}"),
        };
        info.name = t.lit.clone();
        if !paren {
            self.vars.push(info);
            return Ok(wt);
        }
        t = self.next();
        loop {
            match t.kind {
                TokenKind::Eof | TokenKind::Semicolon | TokenKind::Rparen => break,
                TokenKind::Quo => {
                    let Some(body) = self.regexes.get(&t.off).cloned() else {
                        return Err(Error::UnclosedRegex {
                            pos: self.pos(t.off),
                        });
                    };
                    let mut rx = body;
                    if !rx.starts_with('^') {
                        rx = format!("^{rx}");
                    }
                    if !rx.ends_with('$') {
                        rx = format!("{rx}$");
                    }
                    match Regex::new(&rx) {
                        Ok(rx) => info.name_rxs.push(rx),
                        Err(e) => {
                            return Err(Error::Regex {
                                pos: self.pos(dollar_off),
                                source: e,
                            })
                        }
                    }
                    // the blanked body leaves the closing slash as the next token
                    let closing = self.next();
                    if closing.kind != TokenKind::Quo {
                        return Err(Error::UnclosedRegex {
                            pos: self.pos(t.off),
                        });
                    }
                    t = self.next();
                    continue;
                }
                _ => {}
            }

            let op = t.lit.clone();
            let op_off = t.off;
            t = self.next();
            if t.kind != TokenKind::Lparen {
                return Err(Error::Attribute {
                    pos: self.pos(dollar_off),
                    msg: "wanted (".to_string(),
                });
            }
            match op.as_str() {
                "type" | "asgn" | "conv" => {
                    t = self.next();
                    let start = t.off as usize;
                    let mut end = start;
                    let mut open = 1;
                    while open > 0 {
                        match t.kind {
                            TokenKind::Lparen => open += 1,
                            TokenKind::Rparen => {
                                open -= 1;
                                end = t.off as usize;
                            }
                            TokenKind::Eof => {
                                return Err(Error::Attribute {
                                    pos: self.pos(dollar_off),
                                    msg: "expected ) to close (".to_string(),
                                });
                            }
                            _ => {}
                        }
                        if open > 0 {
                            t = self.next();
                        }
                    }
                    let text = self.buf[start..end].trim().to_string();
                    let expr = parser::parse_expr(self.ast, &text).map_err(|e| {
                        Error::Attribute {
                            pos: self.pos(dollar_off),
                            msg: format!("could not parse expr {text:?}: {e}"),
                        }
                    })?;
                    let kind = match op.as_str() {
                        "type" => PredKind::Identical,
                        "asgn" => PredKind::Assignable,
                        _ => PredKind::Convertible,
                    };
                    info.type_preds.push(TypePred {
                        kind,
                        expr,
                        typ: None,
                    });
                    t = self.next();
                    continue;
                }
                "comp" => info.comparable = true,
                "addr" => info.addressable = true,
                "is" => {
                    t = self.next();
                    info.underlying = Some(match t.lit.as_str() {
                        "basic" => crate::typeinfo::Kind::Basic,
                        "array" => crate::typeinfo::Kind::Array,
                        "slice" => crate::typeinfo::Kind::Slice,
                        "struct" => crate::typeinfo::Kind::Struct,
                        "interface" => crate::typeinfo::Kind::Interface,
                        "pointer" => crate::typeinfo::Kind::Pointer,
                        "func" => crate::typeinfo::Kind::Func,
                        "map" => crate::typeinfo::Kind::Map,
                        "chan" => crate::typeinfo::Kind::Chan,
                        other => {
                            return Err(Error::Attribute {
                                pos: self.pos(dollar_off),
                                msg: format!("unknown type: {other:?}"),
                            });
                        }
                    });
                }
                _ => {
                    return Err(Error::Attribute {
                        pos: self.pos(op_off),
                        msg: format!("unknown op {op:?}"),
                    });
                }
            }
            t = self.next();
            if t.kind != TokenKind::Rparen {
                return Err(Error::Attribute {
                    pos: self.pos(dollar_off),
                    msg: "wanted )".to_string(),
                });
            }
            t = self.next();
        }
        if t.kind != TokenKind::Rparen {
            return Err(Error::UnclosedParen {
                pos: self.pos(t.off),
            });
        }
        self.vars.push(info);
        Ok(wt)
    }
}
