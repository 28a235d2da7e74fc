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

use std::borrow::Cow;

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Encoded bytes and soft line endings are both handled, the latter by
/// discarding. UNIX line endings are accepted as well as DOS line endings.
///
/// This never fails. Invalid sequences are passed through untransformed, and
/// restrictions such as no trailing whitespace on a line are not enforced.
/// 8-bit bytes pass through, including invalid UTF-8.
///
/// Returns the decoded bytes plus a possible "dangling" suffix of `s`: an
/// escape sequence cut off by the end of the input, which the caller should
/// prepend to the next chunk when decoding a stream.
pub fn qp_decode(s: &[u8]) -> (Cow<'_, [u8]>, &[u8]) {
    let first = match memchr::memchr(b'=', s) {
        Some(ix) => ix,
        None => return (Cow::Borrowed(s), &[]),
    };

    let mut out = Vec::with_capacity(s.len());
    out.extend_from_slice(&s[..first]);

    let mut i = first;
    while i < s.len() {
        if s[i] != b'=' {
            out.push(s[i]);
            i += 1;
            continue;
        }

        let rest = &s[i + 1..];
        match rest {
            [] => return (Cow::Owned(out), &s[i..]),
            // soft line break, discarded
            [b'\n', ..] => i += 2,
            [b'\r', b'\n', ..] => i += 3,
            // a single byte could still grow into a complete escape
            [_] => return (Cow::Owned(out), &s[i..]),
            [hi, lo, ..] => {
                match hex_val(*hi)
                    .and_then(|h| hex_val(*lo).map(|l| (h << 4) | l))
                {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    },
                    None => {
                        // invalid escape, keep the = verbatim and rescan
                        out.push(b'=');
                        i += 1;
                    },
                }
            },
        }
    }

    (Cow::Owned(out), &[])
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
