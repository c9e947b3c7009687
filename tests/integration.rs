//! Integration tests for the full query pipeline.
//!
//! These exercise loading real files from a temp directory, running operator
//! pipelines against them, and — for `Suggest` — verifying the files were
//! rewritten in place. Fragment inputs cover the stdin path.

use std::fs;
use std::path::{Path, PathBuf};

use gogrep::load;
use gogrep::query::{Op, G};
use gogrep::script;
use gogrep::syntax::printer;

fn temp_dir(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gogrep_integration_{test_name}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run_on_files(dir: &Path, ops: &[Op]) -> (G, Vec<String>) {
    let input = load::load_paths(&[dir.to_path_buf()], false).unwrap();
    let mut g = G::new(input.ast, input.source_map, input.roots);
    let nodes = g.run(ops).unwrap();
    let rendered = nodes
        .iter()
        .map(|&n| printer::print_compact(&g.ast, n))
        .collect();
    (g, rendered)
}

fn all(p: &str) -> Op {
    Op::All(p.to_string())
}

#[test]
fn finds_matches_across_files() {
    let dir = temp_dir("across_files");
    write_file(
        &dir,
        "a.go",
        "package a\n\nfunc f() {\n\tif err != nil {\n\t\treturn err\n\t}\n}\n",
    );
    write_file(
        &dir,
        "b.go",
        "package b\n\nfunc g() error {\n\tif err != nil {\n\t\treturn err\n\t}\n\treturn nil\n}\n",
    );
    let (_, matches) = run_on_files(&dir, &[all("if $x != nil { return $x }")]);
    assert_eq!(matches.len(), 2);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn match_positions_point_into_files() {
    let dir = temp_dir("positions");
    write_file(&dir, "a.go", "package a\n\nfunc f() {\n\tfoo(1)\n}\n");
    let input = load::load_paths(&[dir.clone()], false).unwrap();
    let mut g = G::new(input.ast, input.source_map, input.roots);
    let nodes = g.run(&[all("foo($x)")]).unwrap();
    assert_eq!(nodes.len(), 1);
    let pos = g.source_map.position(g.ast.span(nodes[0]).start);
    assert!(pos.filename.ends_with("a.go"));
    assert_eq!((pos.line, pos.column), (4, 2));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn report_lines_carry_file_positions() {
    let dir = temp_dir("report");
    write_file(&dir, "a.go", "package a\n\nvar x = foo(42)\n");
    let (g, matches) = run_on_files(
        &dir,
        &[all("foo($n)"), Op::Report("calls foo with $n".to_string())],
    );
    assert!(matches.is_empty());
    assert_eq!(g.emitted.len(), 1);
    assert!(g.emitted[0].contains("a.go:3:9: calls foo with 42"), "{}", g.emitted[0]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn suggest_rewrites_files_in_place() {
    let dir = temp_dir("suggest");
    write_file(
        &dir,
        "a.go",
        "package a\n\nfunc f() {\n\tfoo(1)\n\tbar()\n\tfoo(2, 3)\n}\n",
    );
    run_on_files(&dir, &[all("foo($*args)"), Op::Suggest("baz($*args)".to_string())]);
    let rewritten = fs::read_to_string(dir.join("a.go")).unwrap();
    assert!(rewritten.contains("baz(1)"), "{rewritten}");
    assert!(rewritten.contains("baz(2, 3)"), "{rewritten}");
    assert!(rewritten.contains("bar()"), "{rewritten}");
    assert!(!rewritten.contains("foo("), "{rewritten}");
    // the rewritten file must still parse
    load::load_paths(&[dir.clone()], false).unwrap();
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn suggest_only_touches_matching_files() {
    let dir = temp_dir("suggest_scope");
    write_file(&dir, "a.go", "package a\n\nvar _ = foo()\n");
    let before = "package b\n\nvar _ = bar()\n";
    write_file(&dir, "b.go", before);
    run_on_files(&dir, &[all("foo()"), Op::Suggest("quux()".to_string())]);
    assert_eq!(fs::read_to_string(dir.join("b.go")).unwrap(), before);
    assert!(fs::read_to_string(dir.join("a.go")).unwrap().contains("quux()"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn replaced_list_matches_keep_their_positions() {
    let dir = temp_dir("replace_list_report");
    write_file(&dir, "a.go", "package a\n\nfunc f() {\n\tx()\n\ty()\n}\n");
    let (g, matches) = run_on_files(
        &dir,
        &[
            all("x(); y()"),
            Op::Replace("a(); b()".to_string()),
            Op::Report("rewrote".to_string()),
        ],
    );
    assert!(matches.is_empty());
    assert_eq!(g.emitted.len(), 1);
    // the report points at where the replaced statements were
    assert!(g.emitted[0].contains("a.go:4:2: rewrote"), "{}", g.emitted[0]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn pipeline_scripts_drive_the_same_engine() {
    let dir = temp_dir("script");
    write_file(
        &dir,
        "a.go",
        "package a\n\nfunc f() {\n\tfor {\n\t\tbreak\n\t}\n\tfor {\n\t\tx()\n\t}\n}\n",
    );
    let ops = script::parse("All('for { $*_ }'); Excluding('break')").unwrap();
    let (_, matches) = run_on_files(&dir, &ops);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].contains("x()"), "{}", matches[0]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn fragment_input_counts() {
    let input = load::load_fragment("a(); go foo(); a()").unwrap();
    let mut g = G::new(input.ast, input.source_map, input.roots);
    let nodes = g.run(&[all("go foo()")]).unwrap();
    assert_eq!(nodes.len(), 1);
}

#[test]
fn fragment_suggest_passes_matches_through() {
    let input = load::load_fragment("List{foo()}").unwrap();
    let mut g = G::new(input.ast, input.source_map, input.roots);
    let nodes = g
        .run(&[all("List{$e}"), Op::Suggest("$e".to_string())])
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(printer::print_compact(&g.ast, nodes[0]), "foo()");
}

#[test]
fn typed_pipeline_over_files() {
    let dir = temp_dir("typed");
    write_file(
        &dir,
        "a.go",
        "package a\n\ntype I int\n\nvar i I\nvar n int\nvar s []byte\n",
    );
    let ops = script::parse("All('var $x $_'); All('$x'); Conv('int')").unwrap();
    let (_, matches) = run_on_files(&dir, &ops);
    // i and n convert to int; s does not
    assert_eq!(matches.len(), 2);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn pipeline_errors_abort() {
    let input = load::load_fragment("foo()").unwrap();
    let mut g = G::new(input.ast, input.source_map, input.roots);
    let err = g.run(&[all("$")]).unwrap_err();
    assert!(err.to_string().contains("$ must be followed by ident"));
}

#[test]
fn aggressive_query_over_files() {
    let dir = temp_dir("aggressive");
    write_file(
        &dir,
        "a.go",
        "package a\n\nfunc f(xs []int) {\n\tfor _ = range xs {\n\t}\n}\n",
    );
    let (_, matches) = run_on_files(&dir, &[all("~ for range $x {}")]);
    assert_eq!(matches.len(), 1);
    fs::remove_dir_all(&dir).ok();
}
