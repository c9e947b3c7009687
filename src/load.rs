//! Input loading: discover Go files under the given paths, parse them in
//! parallel, and absorb the results into one arena in path order.
//!
//! Directories are walked with ignore-file support; `_test.go` files are
//! skipped unless requested. With no paths at all, callers use
//! [`load_fragment`] to parse standard input as a single program fragment
//! through the same template cascade patterns go through, so `a; b` works.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::error;
use crate::pattern::parse::parse_any;
use crate::syntax::ast::{Ast, NodeId};
use crate::syntax::parser;
use crate::syntax::pos::SourceMap;

/// Parsed inputs, ready to seed a query state.
#[derive(Debug)]
pub struct Input {
    pub ast: Ast,
    pub source_map: SourceMap,
    pub roots: Vec<NodeId>,
}

pub fn load_paths(paths: &[PathBuf], include_tests: bool) -> Result<Input> {
    let files = discover_files(paths, include_tests)?;
    if files.is_empty() {
        bail!("no Go files found");
    }

    // parse in parallel; everything after this point is in path order
    let parsed: Vec<(PathBuf, String, Ast, NodeId)> = files
        .into_par_iter()
        .map(|path| {
            let src = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut ast = Ast::new();
            let root = parser::parse_file(&mut ast, 0, &src)
                .map_err(|e| anyhow::anyhow!("{}:{e}", path.display()))?;
            Ok((path, src, ast, root))
        })
        .collect::<Result<_>>()?;

    let mut input = Input {
        ast: Ast::new(),
        source_map: SourceMap::new(),
        roots: Vec::new(),
    };
    for (path, src, ast, root) in parsed {
        let base = input.source_map.add_file(path, &src);
        let offset = input.ast.absorb(ast);
        let root = NodeId(root.0 + offset);
        shift_spans(&mut input.ast, offset, base);
        input.roots.push(root);
    }
    Ok(input)
}

fn shift_spans(ast: &mut Ast, from: u32, base: u32) {
    use crate::syntax::pos::Span;
    for id in from..ast.len() as u32 {
        let node = NodeId(id);
        let span = ast.raw_span(node);
        if !span.is_none() {
            ast.set_span(node, Span::new(span.start + base, span.end + base));
        }
    }
}

/// Parse an in-memory fragment (stdin, tests) as a single program.
pub fn load_fragment(src: &str) -> error::Result<Input> {
    let mut ast = Ast::new();
    let mut source_map = SourceMap::new();
    source_map.add_file(PathBuf::new(), src);
    let root = parse_any(&mut ast, src)?;
    Ok(Input {
        ast,
        source_map,
        roots: vec![root],
    })
}

fn discover_files(paths: &[PathBuf], include_tests: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            // explicit files bypass the test filter
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_directory(path, include_tests)?);
        } else {
            bail!("path does not exist: {}", path.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_go_file(path: &Path, include_tests: bool) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if !name.ends_with(".go") {
        return false;
    }
    include_tests || !name.ends_with("_test.go")
}

fn walk_directory(dir: &Path, include_tests: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(dir)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .build();
    for entry in walker {
        let entry = entry.context("failed to walk directory")?;
        if entry.file_type().is_some_and(|t| t.is_file())
            && is_go_file(entry.path(), include_tests)
        {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}
