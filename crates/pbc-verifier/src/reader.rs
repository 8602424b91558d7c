// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Line-oriented reading of proof files.
//!
//! The first line must be the proof header; after that, blank lines and
//! `*` comment lines are skipped and every other line is one rule
//! invocation.

use pbc_core::{CheckResult, StepError, StepResult, WordScanner};

/// Supported proof format: major version 1, minors 0 through 2.
const SUPPORTED_MINORS: std::ops::RangeInclusive<u32> = 0..=2;

pub struct ProofReader<'a> {
    file: String,
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> ProofReader<'a> {
    pub fn new(text: &'a str, file: &str) -> Self {
        Self {
            file: file.to_string(),
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// 1-based number of the line last returned.
    pub fn current_line(&self) -> usize {
        self.pos
    }

    /// Consume and validate the `pseudo-Boolean proof version 1.x` header.
    pub fn expect_header(&mut self) -> CheckResult<()> {
        let line = match self.lines.first() {
            Some(line) => *line,
            None => {
                return Err(StepError::syntax("expected proof header").at(&self.file, 1, 1));
            }
        };
        self.pos = 1;

        let mut words = WordScanner::new(line);
        let parsed: StepResult<()> = (|| {
            words.expect_word("pseudo-Boolean")?;
            words.expect_word("proof")?;
            words.expect_word("version")?;
            let version = words.expect_next("expected a version number")?;
            let (major, minor) = version
                .split_once('.')
                .ok_or_else(|| StepError::syntax(format!("malformed version '{version}'")))?;
            let major: u32 = major
                .parse()
                .map_err(|_| StepError::syntax(format!("malformed version '{version}'")))?;
            let minor: u32 = minor
                .parse()
                .map_err(|_| StepError::syntax(format!("malformed version '{version}'")))?;
            if major != 1 || !SUPPORTED_MINORS.contains(&minor) {
                return Err(StepError::syntax(format!(
                    "unsupported proof version {major}.{minor}"
                )));
            }
            words.expect_end()
        })();
        parsed.map_err(|e| e.at(&self.file, 1, words.column()))
    }

    /// The next rule line, skipping blanks and `*` comments.
    pub fn next_rule_line(&mut self) -> Option<(usize, &'a str)> {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            self.pos += 1;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('*') {
                continue;
            }
            return Some((self.pos, line));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_versions() {
        for minor in 0..=2 {
            let text = format!("pseudo-Boolean proof version 1.{minor}\n");
            let mut reader = ProofReader::new(&text, "p.pbp");
            assert!(reader.expect_header().is_ok());
        }

        let mut reader = ProofReader::new("pseudo-Boolean proof version 1.3\n", "p.pbp");
        assert!(reader.expect_header().is_err());

        let mut reader = ProofReader::new("refutation graph\n", "p.pbp");
        assert!(reader.expect_header().is_err());
    }

    #[test]
    fn test_skips_comments_and_blanks() {
        let text = "pseudo-Boolean proof version 1.2\n\n* comment\nf\n  \nc 1\n";
        let mut reader = ProofReader::new(text, "p.pbp");
        reader.expect_header().unwrap();

        assert_eq!(reader.next_rule_line(), Some((4, "f")));
        assert_eq!(reader.next_rule_line(), Some((6, "c 1")));
        assert_eq!(reader.next_rule_line(), None);
        assert_eq!(reader.current_line(), 6);
    }
}
