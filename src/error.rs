//! Pattern-engine error taxonomy.
//!
//! Every variant is fatal to the pipeline invocation that raised it; the
//! driver returns it to the caller, which renders it on stderr. Display
//! texts follow the original tool's messages so scripted callers keep
//! working.

use thiserror::Error;

/// A pattern-local line:column pair (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatPos {
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for PatPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse expr: empty source code")]
    EmptySource,

    #[error("cannot tokenize expr: {pos}: {msg}")]
    Token { pos: PatPos, msg: String },

    #[error("cannot tokenize expr: {pos}: $ must be followed by ident, got {got}")]
    DollarWithoutIdent { pos: PatPos, got: String },

    #[error("cannot tokenize expr: {pos}: expected ) to close $(")]
    UnclosedParen { pos: PatPos },

    #[error("cannot tokenize expr: {pos}: expected / to terminate regex")]
    UnclosedRegex { pos: PatPos },

    #[error("cannot tokenize expr: {pos}: {source}")]
    Regex {
        pos: PatPos,
        source: regex::Error,
    },

    #[error("cannot tokenize expr: {pos}: {msg}")]
    Attribute { pos: PatPos, msg: String },

    #[error("cannot parse expr: {pos}: {msg}")]
    Parse { pos: PatPos, msg: String },

    #[error("unknown type: {0:?}")]
    TypeResolve(String),

    #[error("{pos}: {msg}")]
    TypeParse { pos: PatPos, msg: String },

    #[error("cannot replace {slot} with {got}")]
    SubstShape { slot: String, got: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_original_texts() {
        let e = Error::DollarWithoutIdent {
            pos: PatPos { line: 1, col: 2 },
            got: "EOF".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "cannot tokenize expr: 1:2: $ must be followed by ident, got EOF"
        );
        assert_eq!(Error::EmptySource.to_string(), "cannot parse expr: empty source code");
        assert_eq!(
            Error::TypeResolve("foo".to_string()).to_string(),
            "unknown type: \"foo\""
        );
        let e = Error::Parse {
            pos: PatPos { line: 1, col: 4 },
            msg: "expected statement, found ')'".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "cannot parse expr: 1:4: expected statement, found ')'"
        );
    }
}
