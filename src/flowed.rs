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

//! RFC 3676 `format=flowed` unwrapping.

/// Unfolds `format=flowed` text.
///
/// A line ending in a space is soft-wrapped and joins the following line,
/// unless it is the `-- ` signature separator. With `del_sp` (the `delsp=yes`
/// parameter) the wrap spaces themselves are deleted. Space stuffing is
/// removed afterwards, one leading space per resulting line.
///
/// Line endings in the output are normalized to LF; callers re-encoding the
/// result apply their own line-ending discipline. Never fails, any byte
/// sequence is acceptable input.
pub fn flowed_decode(data: &[u8], del_sp: bool) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(data.len());
    // where the last (still growing) line starts in `body`
    let mut line_start = 0usize;

    for (i, line) in split_lines(data).enumerate() {
        if i > 0 {
            let joins = {
                let last = &body[line_start..];
                last.ends_with(b" ") && last != b"-- "
            };
            if del_sp {
                while body.len() > line_start
                    && body.last() == Some(&b' ')
                {
                    body.pop();
                }
            }
            if !joins {
                body.push(b'\n');
                line_start = body.len();
            }
        }
        body.extend_from_slice(line);
    }

    let mut out = Vec::with_capacity(body.len());
    for (i, line) in body.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        match line.split_first() {
            Some((b' ', rest)) => out.extend_from_slice(rest),
            _ => out.extend_from_slice(line),
        }
    }
    out
}

// Splits on LF, tolerating CRLF.
fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n').map(|line| {
        line.strip_suffix(b"\r").unwrap_or(line)
    })
}
