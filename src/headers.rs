//-
// Copyright (c) 2026, the Mailsplit developers
//
// This file is part of Mailsplit.
//
// Mailsplit is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mailsplit is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Mailsplit. If not, see <http://www.gnu.org/licenses/>.

//! An ordered, mutable view of a raw header block.
//!
//! The original bytes are retained alongside the parsed line list. As long as
//! nothing is mutated, `build` returns those bytes verbatim, which is what
//! makes whole-message round-trips byte-exact even for header blocks full of
//! oddities (unusual whitespace, bare LF endings, missing colons).

use crate::encoded_word::decode_words;
use crate::header::fold_line;

/// One logical header line. `key` is the lower-cased, trimmed header name;
/// `line` is the full raw line with any continuation lines folded in behind
/// CRLF separators, without a trailing line ending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderLine {
    pub key: String,
    pub line: Vec<u8>,
}

/// A parsed header block.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    raw: Vec<u8>,
    lines: Vec<HeaderLine>,
    changed: bool,
    // Pseudo-lines some sources prepend to the real headers. They are not
    // header lines but must survive a rebuild.
    mbox: Option<Vec<u8>>,
    http: Option<Vec<u8>>,
}

impl Headers {
    /// Parses `raw` (the full head chunk, including the terminating blank
    /// line if present). Never fails; garbage lines become header lines with
    /// whatever key can be extracted from them.
    pub fn new(raw: Vec<u8>) -> Self {
        let mut this = Headers {
            raw,
            lines: Vec::new(),
            changed: false,
            mbox: None,
            http: None,
        };
        this.parse();
        this
    }

    fn parse(&mut self) {
        let raw = std::mem::replace(&mut self.raw, Vec::new());

        let mut first = true;
        for mut line in raw.split(|&b| b == b'\n') {
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if line.is_empty() {
                break;
            }

            if first {
                first = false;
                if line.len() >= 5
                    && line[..5].eq_ignore_ascii_case(b"From ")
                {
                    self.mbox = Some(line.to_vec());
                    continue;
                }
                if line.starts_with(b"POST ") {
                    self.http = Some(line.to_vec());
                    continue;
                }
            }

            if matches!(line[0], b' ' | b'\t') && !self.lines.is_empty() {
                let prev = self.lines.last_mut().unwrap();
                prev.line.extend_from_slice(b"\r\n");
                prev.line.extend_from_slice(line);
            } else {
                self.lines.push(HeaderLine {
                    key: extract_key(line),
                    line: line.to_vec(),
                });
            }
        }

        self.raw = raw;
    }

    pub fn has_header(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.lines.iter().any(|hl| hl.key == key)
    }

    /// All raw lines whose key matches, in order.
    pub fn get(&self, key: &str) -> Vec<&[u8]> {
        let key = key.to_ascii_lowercase();
        self.lines
            .iter()
            .filter(|hl| hl.key == key)
            .map(|hl| hl.line.as_slice())
            .collect()
    }

    /// The decoded value of the first matching header, with RFC 2047 encoded
    /// words resolved and surrounding whitespace trimmed. Empty string when
    /// the header is absent.
    pub fn get_first(&self, key: &str) -> String {
        let key = key.to_ascii_lowercase();
        for hl in &self.lines {
            if hl.key == key {
                let line = String::from_utf8_lossy(&hl.line);
                let value = match line.find(':') {
                    Some(colon) => &line[colon + 1..],
                    None => "",
                };
                return decode_words(value).trim().to_owned();
            }
        }
        String::new()
    }

    /// All lines, in order.
    pub fn get_list(&self) -> &[HeaderLine] {
        &self.lines
    }

    /// Inserts `Key: value`, folded at 76 columns, at `index` (0 prepends,
    /// anything past the end appends).
    pub fn add(&mut self, key: &str, value: &str, index: usize) {
        let line = fold_line(&format!("{}: {}", key, value), 76);
        self.add_formatted(key, line.into_bytes(), index);
    }

    /// Like `add` but the caller supplies the already-formatted line.
    pub fn add_formatted(&mut self, key: &str, line: Vec<u8>, index: usize) {
        let index = usize::min(index, self.lines.len());
        self.lines.insert(
            index,
            HeaderLine {
                key: key.trim().to_ascii_lowercase(),
                line,
            },
        );
        self.changed = true;
    }

    /// Removes every line matching `key`.
    pub fn remove(&mut self, key: &str) {
        let key = key.to_ascii_lowercase();
        let before = self.lines.len();
        self.lines.retain(|hl| hl.key != key);
        if self.lines.len() != before {
            self.changed = true;
        }
    }

    /// Replaces a header value.
    ///
    /// With `relative_index == None`, all existing occurrences are removed
    /// and a single new line takes the position of the first one (appended
    /// when the header was absent). With `Some(n)` (`n >= 1`), only the n-th
    /// occurrence *counting from the end* is replaced, and a missing target
    /// is a no-op.
    pub fn update(
        &mut self,
        key: &str,
        value: &str,
        relative_index: Option<usize>,
    ) {
        let key_lc = key.to_ascii_lowercase();
        let line =
            fold_line(&format!("{}: {}", key, value), 76).into_bytes();

        match relative_index {
            None => {
                let first = self
                    .lines
                    .iter()
                    .position(|hl| hl.key == key_lc);
                self.lines.retain(|hl| hl.key != key_lc);
                let index = first.unwrap_or_else(|| self.lines.len());
                self.lines.insert(
                    index,
                    HeaderLine { key: key_lc, line },
                );
                self.changed = true;
            },
            Some(n) if n >= 1 => {
                let matches: Vec<usize> = self
                    .lines
                    .iter()
                    .enumerate()
                    .filter(|(_, hl)| hl.key == key_lc)
                    .map(|(i, _)| i)
                    .collect();
                if n <= matches.len() {
                    let target = matches[matches.len() - n];
                    self.lines[target].line = line;
                    self.changed = true;
                }
            },
            Some(_) => (),
        }
    }

    /// Serializes the header block, including the blank separator line.
    ///
    /// If nothing was mutated and no line-ending override is given, the
    /// original bytes are returned untouched. Otherwise the block is rebuilt
    /// from the line list with `line_end` (CRLF by default) normalizing every
    /// internal ending.
    pub fn build(&self, line_end: Option<&[u8]>) -> Vec<u8> {
        if !self.changed && line_end.is_none() {
            return self.raw.clone();
        }

        let le = line_end.unwrap_or(b"\r\n");
        let mut out = Vec::with_capacity(self.raw.len() + 16);

        if let Some(ref mbox) = self.mbox {
            out.extend_from_slice(mbox);
            out.extend_from_slice(le);
        }
        if let Some(ref http) = self.http {
            out.extend_from_slice(http);
            out.extend_from_slice(le);
        }

        for (i, hl) in self.lines.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(le);
            }
            push_with_line_endings(&mut out, &hl.line, le);
        }

        out.extend_from_slice(le);
        out.extend_from_slice(le);
        out
    }
}

fn extract_key(line: &[u8]) -> String {
    let name = match memchr::memchr(b':', line) {
        Some(colon) => &line[..colon],
        None => line,
    };
    String::from_utf8_lossy(name)
        .trim()
        .to_ascii_lowercase()
}

// Copies `line` to `out`, replacing every internal CRLF or bare LF with `le`.
fn push_with_line_endings(out: &mut Vec<u8>, line: &[u8], le: &[u8]) {
    let mut rest = line;
    while let Some(lf) = memchr::memchr(b'\n', rest) {
        let end = if lf > 0 && rest[lf - 1] == b'\r' {
            lf - 1
        } else {
            lf
        };
        out.extend_from_slice(&rest[..end]);
        out.extend_from_slice(le);
        rest = &rest[lf + 1..];
    }
    out.extend_from_slice(rest);
}
