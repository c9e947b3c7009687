//! gogrep searches, filters, and rewrites Go source code by matching
//! syntax-tree patterns. A pattern is a fragment of Go that may embed
//! wildcards (`$x`), variadic wildcards (`$*xs`), anchored name regexes and
//! type predicates (`$(x /^New.*/ type(error))`), and the `~` aggressive
//! marker. Queries compose pipeline operators over the current match set and
//! end by printing matches, reporting messages, or rewriting files in place.

pub mod cli;
pub mod error;
pub mod formatter;
pub mod load;
pub mod matcher;
pub mod pattern;
pub mod query;
pub mod script;
pub mod subst;
pub mod syntax;
pub mod typeinfo;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use cli::Args;
use formatter::MatchRecord;
use query::{Op, G};

/// Resolve the query argument: a script file, an operator pipeline, or a
/// bare pattern (implicit `All`).
fn resolve_query(query: &str) -> Result<Vec<Op>> {
    let text = if Path::new(query).is_file() {
        let raw = std::fs::read_to_string(query)
            .with_context(|| format!("failed to read query file {query}"))?;
        let stripped: Vec<&str> = raw
            .lines()
            .filter(|l| !l.trim_start().starts_with('#'))
            .collect();
        stripped.join("\n").trim().to_string()
    } else {
        query.to_string()
    };
    if script::looks_like_pipeline(&text) {
        script::parse(&text)
    } else {
        Ok(vec![Op::All(text)])
    }
}

/// Run a query. Returns the exit code: 0 = ok, 2 = usage error; load and
/// pipeline errors are returned as errors (the binary maps them to 1).
pub fn run(args: Args) -> Result<i32> {
    let ops = match resolve_query(&args.query) {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("usage: {e:#}");
            return Ok(2);
        }
    };

    let load_start = std::time::Instant::now();
    let input = if args.paths.is_empty() {
        let mut src = String::new();
        std::io::stdin()
            .read_to_string(&mut src)
            .context("failed to read standard input")?;
        load::load_fragment(&src).map_err(anyhow::Error::new)?
    } else {
        load::load_paths(&args.paths, args.tests)?
    };
    if args.debug {
        eprintln!(
            "debug: loaded {} root(s) in {:.0?}",
            input.roots.len(),
            load_start.elapsed()
        );
    }

    let mut g = G::new(input.ast, input.source_map, input.roots);
    let run_start = std::time::Instant::now();
    let nodes = g.run(&ops).map_err(anyhow::Error::new)?;
    if args.debug {
        eprintln!("debug: pipeline ran in {:.0?}", run_start.elapsed());
    }

    for line in &g.emitted {
        println!("{line}");
    }

    let records: Vec<MatchRecord> = nodes
        .iter()
        .map(|&node| {
            let pos = g.source_map.position(g.ast.span(node).start);
            MatchRecord {
                path: pos.filename,
                line: pos.line,
                column: pos.column,
                text: syntax::printer::print_compact(&g.ast, node),
            }
        })
        .collect();
    formatter::print(&args.format, &records);
    Ok(0)
}
