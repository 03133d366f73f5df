// src/abort_on.rs

//! Line matcher behind `--abort-on`.

use regex::Regex;

/// Matches complete stdout lines against a pattern, carrying partial lines
/// across chunk boundaries.
#[derive(Debug)]
pub struct LineMatcher {
    re: Regex,
    partial: String,
    matched: bool,
}

impl LineMatcher {
    pub fn new(re: Regex) -> Self {
        Self {
            re,
            partial: String::new(),
            matched: false,
        }
    }

    /// Feed one chunk. Returns `true` the first time a complete line matches;
    /// later calls always return `false`.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.matched {
            return false;
        }
        self.partial.push_str(&String::from_utf8_lossy(chunk));

        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            if self.re.is_match(line.trim_end_matches(['\r', '\n'])) {
                self.matched = true;
                self.partial.clear();
                return true;
            }
        }
        false
    }
}
