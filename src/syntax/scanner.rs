//! Go scanner with automatic semicolon insertion.
//!
//! Errors are collected rather than aborting the scan, so callers (the
//! pattern token mill in particular) can whitelist specific messages and keep
//! going. Message texts follow go/scanner so the whitelist contract holds.

use super::token::TokenKind;

#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokenKind,
    /// Source text for identifiers, keywords, and literals; ";" or "\n" for
    /// semicolons (explicit vs inserted); empty for operators.
    pub lit: String,
    /// Local byte offset of the token's first character.
    pub off: u32,
}

#[derive(Debug, Clone)]
pub struct ScanError {
    pub off: u32,
    pub msg: String,
}

pub struct Scanner<'a> {
    src: &'a [u8],
    off: usize,
    insert_semi: bool,
    pub errors: Vec<ScanError>,
}

fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Scanner<'a> {
        Scanner {
            src: src.as_bytes(),
            off: 0,
            insert_semi: false,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> u8 {
        *self.src.get(self.off).unwrap_or(&0)
    }

    fn peek_at(&self, n: usize) -> u8 {
        *self.src.get(self.off + n).unwrap_or(&0)
    }

    fn error(&mut self, off: usize, msg: impl Into<String>) {
        self.errors.push(ScanError {
            off: off as u32,
            msg: msg.into(),
        });
    }

    /// Skip whitespace and comments. Returns true if a newline (or an
    /// equivalent multi-line comment) should trigger semicolon insertion.
    fn skip_blank(&mut self) -> bool {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' => self.off += 1,
                b'\n' => {
                    if self.insert_semi {
                        return true;
                    }
                    self.off += 1;
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while self.off < self.src.len() && self.peek() != b'\n' {
                        self.off += 1;
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    let start = self.off;
                    self.off += 2;
                    let mut newline = false;
                    loop {
                        if self.off >= self.src.len() {
                            self.error(start, "comment not terminated");
                            break;
                        }
                        let b = self.src[self.off];
                        if b == b'\n' {
                            newline = true;
                        }
                        if b == b'*' && self.peek_at(1) == b'/' {
                            self.off += 2;
                            break;
                        }
                        self.off += 1;
                    }
                    if newline && self.insert_semi {
                        return true;
                    }
                }
                _ => return false,
            }
        }
    }

    pub fn scan(&mut self) -> Tok {
        if self.skip_blank() {
            // stand in for the semicolon; a comment may already have
            // consumed past the newline itself
            let off = self.off as u32;
            if self.peek() == b'\n' {
                self.off += 1;
            }
            self.insert_semi = false;
            return Tok {
                kind: TokenKind::Semicolon,
                lit: "\n".to_string(),
                off,
            };
        }
        let start = self.off;
        if self.off >= self.src.len() {
            if self.insert_semi {
                self.insert_semi = false;
                return Tok {
                    kind: TokenKind::Semicolon,
                    lit: "\n".to_string(),
                    off: start as u32,
                };
            }
            return Tok {
                kind: TokenKind::Eof,
                lit: String::new(),
                off: start as u32,
            };
        }

        let b = self.src[self.off];
        if is_letter(b) {
            return self.scan_ident(start);
        }
        if is_digit(b) || (b == b'.' && is_digit(self.peek_at(1))) {
            return self.scan_number(start);
        }

        self.off += 1;
        let kind = match b {
            b'"' => return self.scan_string(start),
            b'`' => return self.scan_raw_string(start),
            b'\'' => return self.scan_rune(start),
            b'(' => {
                self.insert_semi = false;
                TokenKind::Lparen
            }
            b'[' => {
                self.insert_semi = false;
                TokenKind::Lbrack
            }
            b'{' => {
                self.insert_semi = false;
                TokenKind::Lbrace
            }
            b')' => {
                self.insert_semi = true;
                TokenKind::Rparen
            }
            b']' => {
                self.insert_semi = true;
                TokenKind::Rbrack
            }
            b'}' => {
                self.insert_semi = true;
                TokenKind::Rbrace
            }
            b',' => {
                self.insert_semi = false;
                TokenKind::Comma
            }
            b';' => {
                self.insert_semi = false;
                return Tok {
                    kind: TokenKind::Semicolon,
                    lit: ";".to_string(),
                    off: start as u32,
                };
            }
            b':' => self.switch2(TokenKind::Colon, b'=', TokenKind::Define),
            b'.' => {
                if self.peek() == b'.' && self.peek_at(1) == b'.' {
                    self.off += 2;
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Period
                }
            }
            b'+' => self.op3(TokenKind::Add, TokenKind::AddAssign, b'+', TokenKind::Inc),
            b'-' => self.op3(TokenKind::Sub, TokenKind::SubAssign, b'-', TokenKind::Dec),
            b'*' => self.switch2(TokenKind::Mul, b'=', TokenKind::MulAssign),
            b'/' => self.switch2(TokenKind::Quo, b'=', TokenKind::QuoAssign),
            b'%' => self.switch2(TokenKind::Rem, b'=', TokenKind::RemAssign),
            b'^' => self.switch2(TokenKind::Xor, b'=', TokenKind::XorAssign),
            b'<' => {
                if self.peek() == b'-' {
                    self.off += 1;
                    TokenKind::Arrow
                } else if self.peek() == b'<' {
                    self.off += 1;
                    self.switch2(TokenKind::Shl, b'=', TokenKind::ShlAssign)
                } else {
                    self.switch2(TokenKind::Lss, b'=', TokenKind::Leq)
                }
            }
            b'>' => {
                if self.peek() == b'>' {
                    self.off += 1;
                    self.switch2(TokenKind::Shr, b'=', TokenKind::ShrAssign)
                } else {
                    self.switch2(TokenKind::Gtr, b'=', TokenKind::Geq)
                }
            }
            b'=' => self.switch2(TokenKind::Assign, b'=', TokenKind::Eql),
            b'!' => self.switch2(TokenKind::Not, b'=', TokenKind::Neq),
            b'&' => {
                if self.peek() == b'^' {
                    self.off += 1;
                    self.switch2(TokenKind::AndNot, b'=', TokenKind::AndNotAssign)
                } else if self.peek() == b'&' {
                    self.off += 1;
                    TokenKind::LAnd
                } else {
                    self.switch2(TokenKind::And, b'=', TokenKind::AndAssign)
                }
            }
            b'|' => {
                if self.peek() == b'|' {
                    self.off += 1;
                    TokenKind::LOr
                } else {
                    self.switch2(TokenKind::Or, b'=', TokenKind::OrAssign)
                }
            }
            _ => {
                let ch = if b < 0x80 { b as char } else { '\u{fffd}' };
                self.error(
                    start,
                    format!("illegal character U+{:04X} '{}'", ch as u32, ch),
                );
                self.insert_semi = false;
                return Tok {
                    kind: TokenKind::Illegal,
                    lit: ch.to_string(),
                    off: start as u32,
                };
            }
        };
        if matches!(
            kind,
            TokenKind::Inc | TokenKind::Dec | TokenKind::Rparen | TokenKind::Rbrack | TokenKind::Rbrace
        ) {
            self.insert_semi = true;
        } else if !matches!(kind, TokenKind::Lparen | TokenKind::Lbrack | TokenKind::Lbrace) {
            self.insert_semi = false;
        }
        Tok {
            kind,
            lit: String::new(),
            off: start as u32,
        }
    }

    fn switch2(&mut self, tok0: TokenKind, next: u8, tok1: TokenKind) -> TokenKind {
        if self.peek() == next {
            self.off += 1;
            tok1
        } else {
            tok0
        }
    }

    fn op3(&mut self, tok0: TokenKind, assign: TokenKind, dup: u8, tok2: TokenKind) -> TokenKind {
        if self.peek() == b'=' {
            self.off += 1;
            assign
        } else if self.peek() == dup {
            self.off += 1;
            tok2
        } else {
            tok0
        }
    }

    fn lit_from(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.src[start..self.off]).into_owned()
    }

    fn scan_ident(&mut self, start: usize) -> Tok {
        while self.off < self.src.len() && (is_letter(self.src[self.off]) || is_digit(self.src[self.off])) {
            self.off += 1;
        }
        let lit = self.lit_from(start);
        let kind = TokenKind::keyword(&lit).unwrap_or(TokenKind::Ident);
        self.insert_semi = matches!(
            kind,
            TokenKind::Ident
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Fallthrough
                | TokenKind::Return
        );
        Tok {
            kind,
            lit,
            off: start as u32,
        }
    }

    fn scan_number(&mut self, start: usize) -> Tok {
        let mut kind = TokenKind::Int;
        if self.peek() == b'0' && matches!(self.peek_at(1) | 0x20, b'x' | b'b' | b'o') {
            self.off += 2;
            while self.off < self.src.len()
                && (self.src[self.off].is_ascii_hexdigit() || self.src[self.off] == b'_')
            {
                self.off += 1;
            }
        } else {
            while is_digit(self.peek()) || self.peek() == b'_' {
                self.off += 1;
            }
            if self.peek() == b'.' && self.peek_at(1) != b'.' {
                kind = TokenKind::Float;
                self.off += 1;
                while is_digit(self.peek()) || self.peek() == b'_' {
                    self.off += 1;
                }
            }
            let has_exp = matches!(self.peek() | 0x20, b'e')
                && (is_digit(self.peek_at(1))
                    || (matches!(self.peek_at(1), b'+' | b'-') && is_digit(self.peek_at(2))));
            if has_exp {
                kind = TokenKind::Float;
                self.off += 1;
                if matches!(self.peek(), b'+' | b'-') {
                    self.off += 1;
                }
                while is_digit(self.peek()) {
                    self.off += 1;
                }
            }
        }
        if self.peek() == b'i' {
            kind = TokenKind::Imag;
            self.off += 1;
        }
        self.insert_semi = true;
        Tok {
            kind,
            lit: self.lit_from(start),
            off: start as u32,
        }
    }

    fn scan_string(&mut self, start: usize) -> Tok {
        loop {
            if self.off >= self.src.len() || self.src[self.off] == b'\n' {
                self.error(start, "string literal not terminated");
                break;
            }
            let b = self.src[self.off];
            self.off += 1;
            if b == b'"' {
                break;
            }
            if b == b'\\' && self.off < self.src.len() {
                self.off += 1;
            }
        }
        self.insert_semi = true;
        Tok {
            kind: TokenKind::String,
            lit: self.lit_from(start),
            off: start as u32,
        }
    }

    fn scan_raw_string(&mut self, start: usize) -> Tok {
        loop {
            if self.off >= self.src.len() {
                self.error(start, "raw string literal not terminated");
                break;
            }
            let b = self.src[self.off];
            self.off += 1;
            if b == b'`' {
                break;
            }
        }
        self.insert_semi = true;
        Tok {
            kind: TokenKind::String,
            lit: self.lit_from(start),
            off: start as u32,
        }
    }

    fn scan_rune(&mut self, start: usize) -> Tok {
        loop {
            if self.off >= self.src.len() || self.src[self.off] == b'\n' {
                self.error(start, "rune literal not terminated");
                break;
            }
            let b = self.src[self.off];
            self.off += 1;
            if b == b'\'' {
                break;
            }
            if b == b'\\' && self.off < self.src.len() {
                self.off += 1;
            }
        }
        self.insert_semi = true;
        Tok {
            kind: TokenKind::Char,
            lit: self.lit_from(start),
            off: start as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut s = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let t = s.scan();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn scans_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a := b <- c &^ d"),
            vec![Ident, Define, Ident, Arrow, Ident, AndNot, Ident, Semicolon]
        );
    }

    #[test]
    fn semicolon_insertion_on_newline() {
        use TokenKind::*;
        assert_eq!(
            kinds("a\nb"),
            vec![Ident, Semicolon, Ident, Semicolon]
        );
        // no insertion after a binary operator
        assert_eq!(kinds("a +\nb"), vec![Ident, Add, Ident, Semicolon]);
    }

    #[test]
    fn semicolon_at_eof() {
        let mut s = Scanner::new("x++");
        assert_eq!(s.scan().kind, TokenKind::Ident);
        assert_eq!(s.scan().kind, TokenKind::Inc);
        let t = s.scan();
        assert_eq!(t.kind, TokenKind::Semicolon);
        assert_eq!(t.lit, "\n");
    }

    #[test]
    fn illegal_dollar_reports_go_style_message() {
        let mut s = Scanner::new("$x");
        let t = s.scan();
        assert_eq!(t.kind, TokenKind::Illegal);
        assert_eq!(t.lit, "$");
        assert_eq!(s.errors[0].msg, "illegal character U+0024 '$'");
        assert_eq!(s.scan().lit, "x");
    }

    #[test]
    fn illegal_tilde() {
        let mut s = Scanner::new("~");
        let t = s.scan();
        assert_eq!(t.lit, "~");
        assert_eq!(s.errors[0].msg, "illegal character U+007E '~'");
    }

    #[test]
    fn unterminated_string() {
        let mut s = Scanner::new("\"");
        let t = s.scan();
        assert_eq!(t.kind, TokenKind::String);
        assert_eq!(s.errors[0].msg, "string literal not terminated");
        assert_eq!(s.errors[0].off, 0);
    }

    #[test]
    fn raw_string_spans_newlines() {
        let mut s = Scanner::new("`a\nb`");
        let t = s.scan();
        assert_eq!(t.kind, TokenKind::String);
        assert_eq!(t.lit, "`a\nb`");
        assert!(s.errors.is_empty());
    }

    #[test]
    fn numbers() {
        use TokenKind::*;
        assert_eq!(kinds("1 0x2f 1.5 2e10 3i"), vec![Int, Int, Float, Float, Imag, Semicolon]);
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(kinds("a // c\nb"), vec![Ident, Semicolon, Ident, Semicolon]);
        assert_eq!(kinds("a /* c */ b"), vec![Ident, Ident, Semicolon]);
    }

    #[test]
    fn token_offsets() {
        let mut s = Scanner::new("ab cd");
        assert_eq!(s.scan().off, 0);
        assert_eq!(s.scan().off, 3);
    }
}
