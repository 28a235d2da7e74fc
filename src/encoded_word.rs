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

//! RFC 2047 "encoded word" decoding for header values.

use std::borrow::Cow;

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

use crate::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
    static ref EMBEDDED_WORD: Regex =
        Regex::new(r"=\?[!->@-~]*\?[!->@-~]*\?[!->@-~]*\?=").unwrap();
}

/// Test if `word` (in its entirety) is an RFC 2047 encoded word, and decode
/// it if so.
///
/// Returns `None` both when `word` is not an encoded word and when it is one
/// that cannot be decoded (unknown charset, bad base64). The caller needs the
/// distinction: whitespace between adjacent encoded words is deleted, but
/// whitespace around ordinary text is not.
///
/// RFC 2047 caps encoded words at 75 characters, but real agents produce
/// longer ones and real readers accept them, so no length limit is enforced
/// here.
pub fn ew_decode(word: &str) -> Option<Cow<'_, str>> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1).unwrap().as_str();
    let transfer_encoding = captures.get(2).unwrap().as_str();
    let mut content =
        Cow::Borrowed(captures.get(3).unwrap().as_str().as_bytes());

    // _ stands for ASCII space regardless of charset, before transfer
    // decoding
    if content.contains(&b'_') {
        for b in content.to_mut() {
            if *b == b'_' {
                *b = b' ';
            }
        }
    }

    // Once the cow goes owned it must stay owned so that the borrowed case
    // only ever borrows from `word`.
    let content = match content {
        Cow::Owned(content) => decode_xfer(transfer_encoding, &content)
            .map(Cow::into_owned)
            .map(Cow::Owned),
        Cow::Borrowed(content) => decode_xfer(transfer_encoding, content),
    }?;

    match content {
        Cow::Owned(content) => decode_charset(charset, &content)
            .map(Cow::into_owned)
            .map(Cow::Owned),
        Cow::Borrowed(content) => decode_charset(charset, content),
    }
}

fn decode_xfer<'a>(xfer: &str, content: &'a [u8]) -> Option<Cow<'a, [u8]>> {
    match xfer {
        "q" | "Q" => Some(qp_decode(content).0),
        "b" | "B" => base64::decode(content).ok().map(Cow::Owned),
        _ => None,
    }
}

fn decode_charset<'a>(
    charset: &str,
    content: &'a [u8],
) -> Option<Cow<'a, str>> {
    Some(
        Encoding::for_label_no_replacement(charset.as_bytes())?
            .decode_with_bom_removal(content)
            .0,
    )
}

/// Decodes every encoded word embedded in `input`, leaving everything that
/// does not decode untouched.
///
/// Whitespace consisting only of linear whitespace between two successfully
/// decoded words is dropped, per RFC 2047 §6.2.
pub fn decode_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut last_end = 0;
    let mut prev_decoded = false;

    for m in EMBEDDED_WORD.find_iter(input) {
        let gap = &input[last_end..m.start()];
        match ew_decode(m.as_str()) {
            Some(decoded) => {
                if !(prev_decoded
                    && !gap.is_empty()
                    && gap.chars().all(|c| c.is_ascii_whitespace()))
                {
                    out.push_str(gap);
                }
                out.push_str(&decoded);
                prev_decoded = true;
            },
            None => {
                out.push_str(gap);
                out.push_str(m.as_str());
                prev_decoded = false;
            },
        }
        last_end = m.end();
    }

    out.push_str(&input[last_end..]);
    out
}
