//! Pattern compilation: token mill, source rewriter, and template parsing.
//!
//! A pattern is Go source extended with wildcard sigils. Compilation re-scans
//! the pattern recognizing `$`, `$*`, `$(…)` and `~`, rewrites the token
//! stream into plain Go the host parser accepts (wildcards become
//! `gogrep_<index>` identifiers), and recovers a syntax node through a
//! template cascade, keeping column offsets so parse errors point back into
//! the user's pattern.

pub mod parse;
pub mod tokenize;
pub mod transform;

use regex::Regex;

use crate::error::{Error, Result};
use crate::syntax::ast::{Ast, NodeId};
use crate::typeinfo::{Kind, Type};

pub const WILD_PREFIX: &str = "gogrep_";

pub fn is_wild_name(name: &str) -> bool {
    name.starts_with(WILD_PREFIX)
}

/// The meta-var table index encoded in a wildcard identifier, if any.
pub fn from_wild_name(name: &str) -> Option<usize> {
    name.strip_prefix(WILD_PREFIX)?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredKind {
    Identical,
    Assignable,
    Convertible,
}

#[derive(Debug, Clone)]
pub struct TypePred {
    pub kind: PredKind,
    /// The type expression as parsed from the attribute.
    pub expr: NodeId,
    /// Resolved against the query's type info before matching starts.
    pub typ: Option<Type>,
}

/// One wildcard record. The table is append-only and immutable once a
/// pattern is compiled; wildcard identifiers index into it.
#[derive(Debug, Clone, Default)]
pub struct MetaVar {
    pub name: String,
    pub variadic: bool,
    pub name_rxs: Vec<Regex>,
    pub type_preds: Vec<TypePred>,
    pub underlying: Option<Kind>,
    pub comparable: bool,
    pub addressable: bool,
}

impl MetaVar {
    pub fn is_typed(&self) -> bool {
        !self.type_preds.is_empty()
            || self.underlying.is_some()
            || self.comparable
            || self.addressable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompiledPattern {
    pub root: NodeId,
    pub aggressive: bool,
}

/// Compile a pattern: tokenize with sigils, rewrite to parseable source,
/// and run the template cascade. New meta-vars are appended to `vars`; type
/// predicate expressions are parsed into `ast` but left unresolved.
pub fn compile(ast: &mut Ast, vars: &mut Vec<MetaVar>, src: &str) -> Result<CompiledPattern> {
    let toks = tokenize::tokenize(ast, vars, src)?;
    let (rewritten, offsets, aggressive) = transform::transform(&toks);
    let root = match parse::parse_any(ast, &rewritten) {
        Ok(root) => root,
        Err(Error::Parse { pos, msg }) => {
            let pos = transform::correct_pos(pos, &offsets);
            return Err(Error::Parse { pos, msg });
        }
        Err(e) => return Err(e),
    };
    Ok(CompiledPattern { root, aggressive })
}
