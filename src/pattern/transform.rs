//! Pattern rewriter: reproduce source the host parser accepts.
//!
//! The emitted text keeps every token at its original offset by padding with
//! spaces, so parser error columns map back to the user's pattern after the
//! recorded offsets (one per inserted `gogrep_` prefix) are subtracted.

use crate::error::PatPos;

use super::tokenize::{FullToken, MillKind};
use super::is_wild_name;
use super::WILD_PREFIX;

#[derive(Debug, Clone, Copy)]
pub struct PosOffset {
    pub at_line: usize,
    pub at_col: usize,
    pub offset: usize,
}

struct LineColBuffer {
    out: String,
    line: usize,
    col: usize,
    offs: i64,
}

impl LineColBuffer {
    fn write(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.offs += 1;
        }
        self.out.push_str(s);
    }
}

/// Rewrite the token stream into parseable source. Returns the source, the
/// column offsets introduced for wildcard identifiers, and whether the
/// pattern carried the aggressive marker.
pub fn transform(toks: &[FullToken]) -> (String, Vec<PosOffset>, bool) {
    let mut toks = toks;
    let mut aggressive = false;
    if let Some(first) = toks.first() {
        if first.kind == MillKind::Aggressive {
            aggressive = true;
            toks = &toks[1..];
        }
    }
    let mut lbuf = LineColBuffer {
        out: String::new(),
        line: 1,
        col: 1,
        offs: 0,
    };
    let mut offsets = Vec::new();
    let mut last_lit = false;
    for t in toks {
        if lbuf.offs >= t.off as i64 && last_lit && !t.lit.is_empty() {
            lbuf.write(" ");
        }
        while lbuf.offs < t.off as i64 {
            lbuf.write(" ");
        }
        if t.lit.is_empty() {
            let text = match t.kind {
                MillKind::Tok(k) => k.text(),
                MillKind::Aggressive => "~",
            };
            lbuf.write(text);
            last_lit = false;
            continue;
        }
        if is_wild_name(&t.lit) {
            // correct for the prefix bytes that replace the user's `$`
            lbuf.offs -= (WILD_PREFIX.len() - 1) as i64;
            offsets.push(PosOffset {
                at_line: lbuf.line,
                at_col: lbuf.col,
                offset: WILD_PREFIX.len() - 1,
            });
        }
        lbuf.write(&t.lit);
        last_lit = !t.lit.trim().is_empty();
    }
    // trailing newlines can cause issues with commas
    (lbuf.out.trim().to_string(), offsets, aggressive)
}

/// Map a parse-error position in the rewritten source back to the user's
/// pattern by subtracting every inserted-prefix offset before it.
pub fn correct_pos(mut pos: PatPos, offsets: &[PosOffset]) -> PatPos {
    for off in offsets {
        if pos.line == off.at_line && pos.col >= off.at_col {
            pos.col -= off.offset;
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::tokenize::tokenize;
    use crate::syntax::ast::Ast;

    fn rewrite(src: &str) -> (String, Vec<PosOffset>, bool) {
        let mut ast = Ast::new();
        let mut vars = Vec::new();
        let toks = tokenize(&mut ast, &mut vars, src).unwrap();
        transform(&toks)
    }

    fn drop_semis(s: &str) -> String {
        s.trim_end_matches(|c| c == '\n' || c == ';' || c == ' ').to_string()
    }

    #[test]
    fn plain_source_round_trips() {
        let (out, offs, aggressive) = rewrite("foo(a, b)");
        assert_eq!(drop_semis(&out), "foo(a, b)");
        assert!(offs.is_empty());
        assert!(!aggressive);
    }

    #[test]
    fn wildcards_are_rewritten() {
        let (out, offs, _) = rewrite("foo($x)");
        assert_eq!(drop_semis(&out), "foo(gogrep_0)");
        assert_eq!(offs.len(), 1);
        assert_eq!(offs[0].offset, WILD_PREFIX.len() - 1);
    }

    #[test]
    fn aggressive_marker_is_stripped() {
        let (out, _, aggressive) = rewrite("~ foo()");
        assert!(aggressive);
        assert!(!out.contains('~'));
    }

    #[test]
    fn adjacent_wildcards_do_not_fuse() {
        let (out, _, _) = rewrite("$x $y");
        assert!(out.contains("gogrep_0 gogrep_1"), "{out}");
    }

    #[test]
    fn newlines_are_preserved() {
        let (out, _, _) = rewrite("a\nb");
        assert!(out.contains('\n'), "{out}");
    }

    #[test]
    fn correct_pos_subtracts_offsets() {
        let offs = vec![PosOffset {
            at_line: 1,
            at_col: 1,
            offset: 6,
        }];
        let p = correct_pos(PatPos { line: 1, col: 10 }, &offs);
        assert_eq!((p.line, p.col), (1, 4));
        let p = correct_pos(PatPos { line: 2, col: 10 }, &offs);
        assert_eq!((p.line, p.col), (2, 10));
    }
}
