use std::process;

use clap::Parser;

use gogrep::cli::Args;

fn main() {
    let args = Args::parse();
    match gogrep::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
