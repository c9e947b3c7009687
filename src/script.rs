//! Query-script parser.
//!
//! A query is a `;`-separated sequence of operator calls:
//!
//!     All('foo($x)'); Excluding('bar'); Report('found $x')
//!
//! String arguments take single quotes, double quotes, or backticks. `With`
//! takes a nested call sequence. A query that does not start with a known
//! operator call is a bare pattern, which the caller turns into an implicit
//! `All`.

use anyhow::{anyhow, bail, Result};

use crate::query::Op;
use crate::typeinfo::Kind;

/// Whether the query text starts like an operator call. Only then is a
/// malformed query an error rather than a pattern.
pub fn looks_like_pipeline(src: &str) -> bool {
    let trimmed = src.trim_start();
    let name: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if !is_op_name(&name) {
        return false;
    }
    trimmed[name.len()..].trim_start().starts_with('(')
}

fn is_op_name(name: &str) -> bool {
    matches!(
        name,
        "All"
            | "Including"
            | "Incl"
            | "Excluding"
            | "Excl"
            | "Regexp"
            | "Regx"
            | "Type"
            | "Assignable"
            | "Asgn"
            | "Convertible"
            | "Conv"
            | "Comparable"
            | "Comp"
            | "Addressable"
            | "Addr"
            | "Kind"
            | "Replace"
            | "Suggest"
            | "Report"
            | "With"
    )
}

pub fn parse(src: &str) -> Result<Vec<Op>> {
    let mut p = Parser {
        src: src.as_bytes(),
        pos: 0,
    };
    let ops = p.calls()?;
    p.skip_ws();
    if p.pos != p.src.len() {
        bail!("unexpected trailing input at byte {}", p.pos);
    }
    if ops.is_empty() {
        bail!("empty query");
    }
    Ok(ops)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> u8 {
        *self.src.get(self.pos).unwrap_or(&0)
    }

    fn calls(&mut self) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        loop {
            self.skip_ws();
            if self.pos >= self.src.len() || self.peek() == b')' {
                return Ok(ops);
            }
            ops.push(self.call()?);
            self.skip_ws();
            if self.peek() == b';' {
                self.pos += 1;
                continue;
            }
            return Ok(ops);
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        self.skip_ws();
        if self.peek() != b {
            bail!("expected {:?} at byte {}", b as char, self.pos);
        }
        self.pos += 1;
        Ok(())
    }

    fn string_arg(&mut self) -> Result<String> {
        self.skip_ws();
        let quote = self.peek();
        if !matches!(quote, b'\'' | b'"' | b'`') {
            bail!("expected a quoted string at byte {}", self.pos);
        }
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos] != quote {
            self.pos += 1;
        }
        if self.pos >= self.src.len() {
            bail!("unterminated string argument");
        }
        let s = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.pos += 1;
        Ok(s)
    }

    fn call(&mut self) -> Result<Op> {
        self.skip_ws();
        let name = self.ident();
        if name.is_empty() {
            bail!("expected an operator name at byte {}", self.pos);
        }
        if !is_op_name(&name) {
            bail!("unknown operator {name:?}");
        }
        self.expect(b'(')?;
        let op = match name.as_str() {
            "All" => Op::All(self.string_arg()?),
            "Including" | "Incl" => Op::Including(self.string_arg()?),
            "Excluding" | "Excl" => Op::Excluding(self.string_arg()?),
            "Regexp" | "Regx" => Op::Regexp(self.string_arg()?),
            "Type" => Op::TypeIs(self.string_arg()?),
            "Assignable" | "Asgn" => Op::Assignable(self.string_arg()?),
            "Convertible" | "Conv" => Op::Convertible(self.string_arg()?),
            "Comparable" | "Comp" => Op::Comparable,
            "Addressable" | "Addr" => Op::Addressable,
            "Replace" => Op::Replace(self.string_arg()?),
            "Suggest" => Op::Suggest(self.string_arg()?),
            "Report" => Op::Report(self.string_arg()?),
            "Kind" => {
                self.skip_ws();
                let tag = self.ident();
                let kind = kind_from_tag(&tag)
                    .ok_or_else(|| anyhow!("unknown kind {tag:?}"))?;
                Op::KindIs(kind)
            }
            "With" => Op::With(self.calls()?),
            _ => unreachable!("is_op_name covers every operator"),
        };
        self.expect(b')')?;
        Ok(op)
    }
}

fn kind_from_tag(tag: &str) -> Option<Kind> {
    Some(match tag {
        "basic" | "Basic" => Kind::Basic,
        "array" | "Array" => Kind::Array,
        "slice" | "Slice" => Kind::Slice,
        "struct" | "Struct" => Kind::Struct,
        "interface" | "Interface" => Kind::Interface,
        "pointer" | "Pointer" => Kind::Pointer,
        "func" | "Func" => Kind::Func,
        "map" | "Map" => Kind::Map,
        "chan" | "Chan" => Kind::Chan,
        _ => return None,
    })
}
