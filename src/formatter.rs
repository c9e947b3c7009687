//! Result rendering: `FILE:LINE:COL: <compact-node>` lines or JSON.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub text: String,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    match_count: usize,
    matches: &'a [MatchRecord],
}

pub fn render_text(records: &[MatchRecord]) -> String {
    let mut out = String::new();
    for r in records {
        if r.path.is_empty() {
            out.push_str(&format!("{}:{}: {}\n", r.line, r.column, r.text));
        } else {
            out.push_str(&format!("{}:{}:{}: {}\n", r.path, r.line, r.column, r.text));
        }
    }
    out
}

pub fn render_json(records: &[MatchRecord]) -> String {
    let output = JsonOutput {
        match_count: records.len(),
        matches: records,
    };
    // our types always serialize successfully
    serde_json::to_string_pretty(&output).expect("serializing match records")
}

pub fn print(format: &str, records: &[MatchRecord]) {
    match format {
        "json" => println!("{}", render_json(records)),
        _ => print!("{}", render_text(records)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MatchRecord {
        MatchRecord {
            path: "main.go".to_string(),
            line: 3,
            column: 7,
            text: "foo(bar)".to_string(),
        }
    }

    #[test]
    fn text_lines() {
        assert_eq!(render_text(&[record()]), "main.go:3:7: foo(bar)\n");
        let mut r = record();
        r.path = String::new();
        assert_eq!(render_text(&[r]), "3:7: foo(bar)\n");
    }

    #[test]
    fn json_structure() {
        let out = render_json(&[record()]);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["match_count"], 1);
        assert_eq!(v["matches"][0]["path"], "main.go");
        assert_eq!(v["matches"][0]["text"], "foo(bar)");
    }
}
