//! Byte spans, line maps, and the multi-file source map.
//!
//! Node positions are byte offsets into a global coordinate space: every
//! loaded source occupies a contiguous base..base+len range, so a single u32
//! identifies both the file and the offset within it.

use std::fmt;
use std::path::PathBuf;

/// Sentinel for nodes that have no source position (replacement templates,
/// synthesized wrappers).
pub const NO_POS: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Span {
        Span { start, end }
    }

    pub fn none() -> Span {
        Span {
            start: NO_POS,
            end: NO_POS,
        }
    }

    pub fn is_none(&self) -> bool {
        self.start == NO_POS
    }
}

/// A resolved position: 1-indexed line, 1-indexed byte column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub filename: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        }
    }
}

/// Byte offsets where each line starts, for offset -> line:col lookups.
#[derive(Debug, Clone)]
pub struct LineMap {
    starts: Vec<u32>,
}

impl LineMap {
    pub fn new(src: &str) -> LineMap {
        let mut starts = vec![0u32];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i as u32 + 1);
            }
        }
        LineMap { starts }
    }

    /// Convert a local byte offset into (1-indexed line, 1-indexed column).
    pub fn line_col(&self, offset: u32) -> (usize, usize) {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, (offset - self.starts[line]) as usize + 1)
    }
}

#[derive(Debug)]
struct MappedFile {
    name: PathBuf,
    base: u32,
    len: u32,
    lines: LineMap,
}

/// Registry of loaded sources. Each file gets a disjoint base offset so that
/// any global position resolves back to a file, line, and column.
#[derive(Default, Debug)]
pub struct SourceMap {
    files: Vec<MappedFile>,
    next_base: u32,
}

impl SourceMap {
    pub fn new() -> SourceMap {
        SourceMap::default()
    }

    /// Register a source and return its base offset. An empty name marks
    /// sources that are not backed by a file on disk (stdin, fragments).
    pub fn add_file(&mut self, name: PathBuf, src: &str) -> u32 {
        let base = self.next_base;
        let len = src.len() as u32 + 1;
        self.files.push(MappedFile {
            name,
            base,
            len,
            lines: LineMap::new(src),
        });
        self.next_base = base + len;
        base
    }

    fn file_at(&self, pos: u32) -> Option<&MappedFile> {
        if pos == NO_POS {
            return None;
        }
        self.files
            .iter()
            .find(|f| pos >= f.base && pos < f.base + f.len)
    }

    /// Resolve a global position. Positions outside every file resolve to
    /// line 0 with an empty name.
    pub fn position(&self, pos: u32) -> Position {
        match self.file_at(pos) {
            Some(f) => {
                let (line, column) = f.lines.line_col(pos - f.base);
                Position {
                    filename: f.name.to_string_lossy().into_owned(),
                    line,
                    column,
                }
            }
            None => Position {
                filename: String::new(),
                line: 0,
                column: 0,
            },
        }
    }

    /// The on-disk path backing a position, if any.
    pub fn file_path(&self, pos: u32) -> Option<&PathBuf> {
        let f = self.file_at(pos)?;
        if f.name.as_os_str().is_empty() {
            None
        } else {
            Some(&f.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_map_single_line() {
        let lm = LineMap::new("hello");
        assert_eq!(lm.line_col(0), (1, 1));
        assert_eq!(lm.line_col(4), (1, 5));
    }

    #[test]
    fn line_map_multiline() {
        let lm = LineMap::new("abc\ndef\nghi");
        assert_eq!(lm.line_col(0), (1, 1));
        assert_eq!(lm.line_col(4), (2, 1));
        assert_eq!(lm.line_col(9), (3, 2));
    }

    #[test]
    fn source_map_two_files() {
        let mut sm = SourceMap::new();
        let b1 = sm.add_file(PathBuf::from("a.go"), "package a\n");
        let b2 = sm.add_file(PathBuf::from("b.go"), "package b\n");
        assert!(b2 > b1);
        let p = sm.position(b2 + 8);
        assert_eq!(p.filename, "b.go");
        assert_eq!(p.line, 1);
        assert_eq!(p.column, 9);
    }

    #[test]
    fn source_map_unnamed_has_no_path() {
        let mut sm = SourceMap::new();
        let b = sm.add_file(PathBuf::new(), "x");
        assert_eq!(sm.file_path(b), None);
        assert_eq!(sm.position(NO_POS).line, 0);
    }
}
