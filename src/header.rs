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

//! Utilities for working with structured header values.
//!
//! A structured value is the `value; key=param; key=param` shape used by
//! Content-Type and Content-Disposition. Parsing is deliberately forgiving:
//! anything that does not parse as a parameter list is dropped rather than
//! reported, since real mail contains every imaginable corruption and the
//! engine must carry on regardless.

use std::borrow::Cow;

use nom::branch::alt;
use nom::bytes::complete::{is_not, take, take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;

/// Content-Transfer-Encoding values the engine distinguishes.
///
/// Anything unrecognised maps to `Other`, which is treated as an identity
/// encoding for decode purposes but as "unsafe" by the rewriter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Other,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::SevenBit
    }
}

impl ContentTransferEncoding {
    /// The canonical header spelling of this encoding.
    pub fn name(self) -> &'static str {
        match self {
            ContentTransferEncoding::SevenBit => "7bit",
            ContentTransferEncoding::EightBit => "8bit",
            ContentTransferEncoding::Binary => "binary",
            ContentTransferEncoding::Base64 => "base64",
            ContentTransferEncoding::QuotedPrintable => "quoted-printable",
            ContentTransferEncoding::Other => "binary",
        }
    }

    /// Whether content in this encoding can pass through a rewrite
    /// unreencoded without risking boundary collisions or 8-bit leakage.
    pub fn is_rewrite_safe(self) -> bool {
        matches!(
            self,
            ContentTransferEncoding::Base64
                | ContentTransferEncoding::QuotedPrintable
        )
    }
}

/// Parses a Content-Transfer-Encoding header value.
///
/// RFC 2045 comments are stripped first; some agents emit values like
/// `7bit (but really 8bit)`. An empty value yields the 7bit default.
pub fn parse_content_transfer_encoding(
    raw: &str,
) -> ContentTransferEncoding {
    let mut cleaned = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 => cleaned.push(c),
            _ => (),
        }
    }

    let cleaned = cleaned.trim().to_ascii_lowercase();
    match cleaned.as_str() {
        "" | "7bit" => ContentTransferEncoding::SevenBit,
        "8bit" => ContentTransferEncoding::EightBit,
        "binary" => ContentTransferEncoding::Binary,
        "base64" => ContentTransferEncoding::Base64,
        "quoted-printable" => ContentTransferEncoding::QuotedPrintable,
        _ => ContentTransferEncoding::Other,
    }
}

/// A parsed structured header value: the main value plus its parameters.
///
/// Parameter keys are normalised to lower case; values are kept as raw bytes
/// since some (multipart boundaries in particular) must round-trip exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderValue {
    pub value: String,
    pub params: Vec<(String, Vec<u8>)>,
}

impl HeaderValue {
    pub fn param(&self, name: &str) -> Option<&[u8]> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn param_str(&self, name: &str) -> Option<Cow<'_, str>> {
        self.param(name).map(String::from_utf8_lossy)
    }

    pub fn set_param(&mut self, name: &str, value: &[u8]) {
        let name = name.to_ascii_lowercase();
        if let Some(entry) =
            self.params.iter_mut().find(|(k, _)| *k == name)
        {
            entry.1 = value.to_vec();
        } else {
            self.params.push((name, value.to_vec()));
        }
    }

    pub fn remove_param(&mut self, name: &str) {
        self.params.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }
}

// RFC 2045 token, extended to tolerate 8-bit bytes since headers in the wild
// contain them.
fn is_token_char(b: u8) -> bool {
    (b > 0x20
        && b < 0x7f
        && !matches!(
            b,
            b'(' | b')'
                | b'<'
                | b'>'
                | b'@'
                | b','
                | b';'
                | b':'
                | b'\\'
                | b'"'
                | b'/'
                | b'['
                | b']'
                | b'?'
                | b'='
        ))
        || b >= 0x80
}

fn ows(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))(input)
}

fn token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_token_char)(input)
}

fn qcontent(input: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((is_not("\\\""), preceded(char('\\'), take(1usize))))(input)
}

fn quoted_string(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    delimited(
        char('"'),
        fold_many0(qcontent, Vec::new(), |mut acc: Vec<u8>, item| {
            acc.extend_from_slice(item);
            acc
        }),
        char('"'),
    )(input)
}

fn param_value(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    alt((quoted_string, map(token, |t: &[u8]| t.to_vec())))(input)
}

fn param(input: &[u8]) -> IResult<&[u8], (String, Vec<u8>)> {
    map(
        separated_pair(
            preceded(ows, token),
            preceded(ows, char('=')),
            preceded(ows, param_value),
        ),
        |(k, v): (&[u8], Vec<u8>)| {
            (String::from_utf8_lossy(k).to_ascii_lowercase(), v)
        },
    )(input)
}

// A `;`-introduced segment. Anything that is not a well-formed `key=value`
// is consumed up to the next `;` and dropped.
fn param_segment(
    input: &[u8],
) -> IResult<&[u8], Option<(String, Vec<u8>)>> {
    preceded(
        pair(ows, char(';')),
        alt((
            map(param, Some),
            map(opt(is_not(";")), |_: Option<&[u8]>| None),
        )),
    )(input)
}

fn structured_value(input: &[u8]) -> IResult<&[u8], HeaderValue> {
    map(
        pair(take_while(|b| b != b';'), many0(param_segment)),
        |(value, params): (&[u8], Vec<Option<(String, Vec<u8>)>>)| {
            HeaderValue {
                value: String::from_utf8_lossy(value).trim().to_owned(),
                params: params.into_iter().flatten().collect(),
            }
        },
    )(input)
}

/// Parses a structured header value into its value and parameter list,
/// merging RFC 2231 parameter continuations.
///
/// Never fails; unparseable parameter segments are dropped and an entirely
/// unparseable input becomes a bare value with no parameters.
pub fn parse_header_value(raw: &str) -> HeaderValue {
    let mut parsed = match structured_value(raw.as_bytes()) {
        Ok((_, v)) => v,
        Err(_) => HeaderValue {
            value: raw.trim().to_owned(),
            params: Vec::new(),
        },
    };
    decode_parameter_continuations(&mut parsed.params);
    parsed
}

/// Rebuilds a structured header value string from a value and parameters.
/// The reverse of `parse_header_value` for the common (non-continued) case.
pub fn build_header_value(value: &str, params: &[(String, Vec<u8>)]) -> String {
    let mut out = String::from(value);
    for (key, val) in params {
        out.push_str("; ");
        out.push_str(key);
        out.push('=');
        out.push_str(&quote_param_value(val));
    }
    out
}

fn quote_param_value(value: &[u8]) -> String {
    if !value.is_empty() && value.iter().all(|&b| is_token_char(b)) {
        return String::from_utf8_lossy(value).into_owned();
    }

    let mut out = String::from("\"");
    for &b in value {
        if b == b'"' || b == b'\\' {
            out.push('\\');
        }
        out.push(b as char);
    }
    out.push('"');
    out
}

// One piece of a possibly-continued RFC 2231 parameter.
struct ParamPiece {
    index: Option<u32>,
    extended: bool,
    value: Vec<u8>,
}

// Splits `filename*0*` style keys into (base, index, extended). Returns
// `None` for ordinary keys.
fn split_continuation_key(key: &str) -> Option<(&str, Option<u32>, bool)> {
    let (key, extended) = match key.strip_suffix('*') {
        Some(k) => (k, true),
        None => (key, false),
    };

    match key.rfind('*') {
        Some(star) => {
            let index = key[star + 1..].parse::<u32>().ok()?;
            Some((&key[..star], Some(index), extended))
        },
        None if extended => Some((key, None, true)),
        None => None,
    }
}

/// Merges RFC 2231 continued/extended parameters (`key*0*=...; key*1=...`)
/// into single decoded parameters, in place. Decoding failures fall back to
/// the raw concatenated value rather than erroring out.
pub fn decode_parameter_continuations(params: &mut Vec<(String, Vec<u8>)>) {
    let mut merged: Vec<(String, Vec<u8>)> = Vec::with_capacity(params.len());
    let mut pieces: Vec<(String, Vec<ParamPiece>)> = Vec::new();

    for (key, value) in params.drain(..) {
        match split_continuation_key(&key) {
            Some((base, index, extended)) => {
                let piece = ParamPiece {
                    index,
                    extended,
                    value,
                };
                match pieces.iter_mut().find(|(b, _)| *b == base) {
                    Some((_, list)) => list.push(piece),
                    None => {
                        let base = base.to_owned();
                        // placeholder keeps the original position
                        merged.push((base.clone(), Vec::new()));
                        pieces.push((base, vec![piece]));
                    },
                }
            },
            None => merged.push((key, value)),
        }
    }

    for (base, mut list) in pieces {
        list.sort_by_key(|p| p.index.unwrap_or(0));

        let mut charset = None;
        let mut bytes = Vec::new();
        for (i, piece) in list.iter().enumerate() {
            let mut value: &[u8] = &piece.value;
            if i == 0 && piece.extended {
                // charset'language'value prefix on the first piece
                if let Some((cs, rest)) = split_charset_prefix(value) {
                    charset = Some(cs);
                    value = rest;
                }
            }
            if piece.extended {
                bytes.extend_from_slice(&percent_decode(value));
            } else {
                bytes.extend_from_slice(value);
            }
        }

        let decoded = match charset
            .as_deref()
            .and_then(|cs| encoding_rs::Encoding::for_label(cs.as_bytes()))
        {
            Some(enc) => enc.decode(&bytes).0.into_owned().into_bytes(),
            None => bytes,
        };

        if let Some(slot) = merged.iter_mut().find(|(k, _)| *k == base) {
            slot.1 = decoded;
        }
    }

    *params = merged;
}

fn split_charset_prefix(value: &[u8]) -> Option<(String, &[u8])> {
    let first = memchr::memchr(b'\'', value)?;
    let second = memchr::memchr(b'\'', &value[first + 1..])?;
    let charset = String::from_utf8_lossy(&value[..first]).into_owned();
    Some((charset, &value[first + second + 2..]))
}

fn percent_decode(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        if value[i] == b'%' && i + 2 < value.len() {
            let hex = &value[i + 1..i + 3];
            if let Some(b) = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(value[i]);
        i += 1;
    }
    out
}

/// Folds a single logical header line (`Key: value`) to the given column
/// target by inserting CRLF before whitespace runs. Continuation lines thus
/// begin with the whitespace that preceded the break, which is what the
/// unfolding side expects.
pub fn fold_line(line: &str, line_length: usize) -> String {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut result = String::with_capacity(len + len / line_length * 2);

    while pos < len {
        let end = usize::min(pos + line_length, len);
        let window = &bytes[pos..end];

        if window.len() < line_length {
            result.push_str(&line[pos..]);
            break;
        }

        // find the last whitespace run in the window, skipping one that
        // starts the window (a break there would produce an empty line)
        let mut ws_start = None;
        let mut i = window.len();
        while i > 0 && !window[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        while i > 0 && window[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        if i > 0 {
            ws_start = Some(i);
        }

        let cut = match ws_start {
            Some(idx) => pos + idx,
            None => {
                // no usable break point: run through the end of the
                // current word
                let rest = &bytes[end..];
                let word_len = rest
                    .iter()
                    .position(|b| b.is_ascii_whitespace())
                    .unwrap_or(rest.len());
                end + word_len
            },
        };

        result.push_str(&line[pos..cut]);
        pos = cut;
        if pos < len {
            result.push_str("\r\n");
        }
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_simple_content_type() {
        let hv = parse_header_value("text/plain; charset=utf-8");
        assert_eq!("text/plain", hv.value);
        assert_eq!(Some(&b"utf-8"[..]), hv.param("charset"));
    }

    #[test]
    fn parse_quoted_params() {
        let hv = parse_header_value(
            "multipart/mixed; boundary=\"b 1\\\"2\"; x=y",
        );
        assert_eq!("multipart/mixed", hv.value);
        assert_eq!(Some(&b"b 1\"2"[..]), hv.param("boundary"));
        assert_eq!(Some(&b"y"[..]), hv.param("x"));
    }

    #[test]
    fn parse_drops_malformed_segments() {
        let hv = parse_header_value("text/html; @@@; charset=latin1");
        assert_eq!("text/html", hv.value);
        assert_eq!(Some(&b"latin1"[..]), hv.param("charset"));
    }

    #[test]
    fn parse_case_and_whitespace() {
        let hv = parse_header_value("  TEXT/Plain ; CharSet = UTF-8 ");
        assert_eq!("TEXT/Plain", hv.value);
        assert_eq!(Some(&b"UTF-8"[..]), hv.param("charset"));
    }

    #[test]
    fn continuation_plain() {
        let hv = parse_header_value(
            "attachment; filename*0=long; filename*1=name.txt",
        );
        assert_eq!(Some(&b"longname.txt"[..]), hv.param("filename"));
    }

    #[test]
    fn continuation_extended_charset() {
        let hv = parse_header_value(
            "attachment; filename*0*=utf-8''%C3%A5%20r; filename*1=.txt",
        );
        assert_eq!("å r.txt", hv.param_str("filename").unwrap());
    }

    #[test]
    fn extended_single() {
        let hv =
            parse_header_value("attachment; filename*=utf-8''a%20b.txt");
        assert_eq!("a b.txt", hv.param_str("filename").unwrap());
    }

    #[test]
    fn build_round_trip() {
        let built = build_header_value(
            "text/plain",
            &[
                ("charset".to_owned(), b"utf-8".to_vec()),
                ("name".to_owned(), b"two words".to_vec()),
            ],
        );
        assert_eq!("text/plain; charset=utf-8; name=\"two words\"", built);
        let hv = parse_header_value(&built);
        assert_eq!(Some(&b"two words"[..]), hv.param("name"));
    }

    #[test]
    fn cte_parsing() {
        use ContentTransferEncoding as CTE;
        assert_eq!(CTE::SevenBit, parse_content_transfer_encoding(""));
        assert_eq!(CTE::SevenBit, parse_content_transfer_encoding("7BIT"));
        assert_eq!(
            CTE::Base64,
            parse_content_transfer_encoding(" base64 ")
        );
        assert_eq!(
            CTE::QuotedPrintable,
            parse_content_transfer_encoding("Quoted-Printable (legacy)")
        );
        assert_eq!(CTE::Other, parse_content_transfer_encoding("x-uue"));
    }

    #[test]
    fn fold_line_short_is_untouched() {
        assert_eq!("Subject: hi", fold_line("Subject: hi", 76));
    }

    #[test]
    fn fold_line_breaks_at_whitespace() {
        let long = format!("Subject: {}", "word ".repeat(30));
        let long = long.trim_end();
        let folded = fold_line(long, 76);
        for part in folded.split("\r\n").skip(1) {
            assert!(part.starts_with(' '), "bad continuation: {:?}", part);
        }
        assert_eq!(
            long.replace("\r\n", ""),
            folded.replace("\r\n", ""),
            "folding must not lose bytes"
        );
        for part in folded.split("\r\n") {
            assert!(part.len() <= 76, "overlong segment: {:?}", part);
        }
    }

    #[test]
    fn fold_line_unbreakable_word_runs_long() {
        let long = format!("X: {}", "a".repeat(200));
        let folded = fold_line(&long, 76);
        assert_eq!(long, folded.replace("\r\n", ""));
    }
}
