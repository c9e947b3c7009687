use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "gogrep",
    version,
    about = "Search, filter, and rewrite Go code by syntax-tree patterns",
    after_help = "\
QUERY is a pattern (`if $x != nil { return $x }`), a pipeline of operator
calls (`All('foo($*_)'); Suggest('foo()')`), or a file containing one.
With no paths, standard input is read as a single program fragment."
)]
pub struct Args {
    /// Pattern, operator pipeline, or query-script file
    pub query: String,

    /// Go files or directories to search
    pub paths: Vec<PathBuf>,

    /// Also search _test.go files
    #[arg(long)]
    pub tests: bool,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}
