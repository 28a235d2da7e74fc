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

//! Streaming transfer-encoding codecs.
//!
//! Each codec accepts arbitrary byte chunks via `push` and is flushed with
//! `finish`. Chunk boundaries never affect the output, which lets the
//! rewriter feed whatever spans the splitter happens to produce.

use crate::header::ContentTransferEncoding;
use crate::quoted_printable::qp_decode;

/// Decoder for a declared Content-Transfer-Encoding.
///
/// The identity encodings (7bit, 8bit, binary) and anything unrecognised
/// pass bytes through untouched.
#[derive(Debug)]
pub enum ContentDecoder {
    Identity,
    Base64(Base64Decoder),
    QuotedPrintable(QpDecoder),
}

impl ContentDecoder {
    pub fn for_encoding(cte: ContentTransferEncoding) -> Self {
        match cte {
            ContentTransferEncoding::Base64 => {
                ContentDecoder::Base64(Base64Decoder::default())
            },
            ContentTransferEncoding::QuotedPrintable => {
                ContentDecoder::QuotedPrintable(QpDecoder::default())
            },
            _ => ContentDecoder::Identity,
        }
    }

    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        match self {
            ContentDecoder::Identity => out.extend_from_slice(data),
            ContentDecoder::Base64(d) => d.push(data, out),
            ContentDecoder::QuotedPrintable(d) => d.push(data, out),
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        match self {
            ContentDecoder::Identity => (),
            ContentDecoder::Base64(d) => d.finish(out),
            ContentDecoder::QuotedPrintable(d) => d.finish(out),
        }
    }
}

/// Encoder for a target Content-Transfer-Encoding.
#[derive(Debug)]
pub enum ContentEncoder {
    Identity,
    Base64(Base64Encoder),
    QuotedPrintable(QpEncoder),
}

impl ContentEncoder {
    pub fn for_encoding(cte: ContentTransferEncoding) -> Self {
        match cte {
            ContentTransferEncoding::Base64 => {
                ContentEncoder::Base64(Base64Encoder::default())
            },
            ContentTransferEncoding::QuotedPrintable => {
                ContentEncoder::QuotedPrintable(QpEncoder::default())
            },
            _ => ContentEncoder::Identity,
        }
    }

    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        match self {
            ContentEncoder::Identity => out.extend_from_slice(data),
            ContentEncoder::Base64(e) => e.push(data, out),
            ContentEncoder::QuotedPrintable(e) => e.push(data, out),
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        match self {
            ContentEncoder::Identity => (),
            ContentEncoder::Base64(e) => e.finish(out),
            ContentEncoder::QuotedPrintable(e) => e.finish(out),
        }
    }
}

/// Streaming base64 decoder tolerant of line breaks and junk bytes, which
/// are simply skipped.
#[derive(Debug, Default)]
pub struct Base64Decoder {
    pending: Vec<u8>,
}

impl Base64Decoder {
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for &byte in data {
            match byte {
                b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'+' | b'/'
                | b'=' => self.pending.push(byte),
                _ => (),
            }
        }

        let usable = self.pending.len() / 4 * 4;
        if usable > 0 {
            let _ = base64::decode_config_buf(
                &self.pending[..usable],
                base64::STANDARD,
                out,
            );
            self.pending.copy_within(usable.., 0);
            self.pending.truncate(self.pending.len() - usable);
        }
    }

    /// Attempts to salvage a trailing unpadded quantum by padding it out.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending.is_empty() {
            return;
        }

        let mut tail = std::mem::take(&mut self.pending);
        while tail.len() % 4 != 0 {
            tail.push(b'=');
        }
        if let Ok(decoded) = base64::decode_config(&tail, base64::STANDARD) {
            out.extend_from_slice(&decoded);
        }
    }
}

/// Streaming base64 encoder producing 76-character lines.
///
/// Line breaks are emitted *before* each line except the first, so the
/// output carries no trailing line ending. The surrounding framing (the
/// withheld body ending re-attached by the splitter's consumer) supplies it.
#[derive(Debug, Default)]
pub struct Base64Encoder {
    pending: Vec<u8>,
    any_output: bool,
}

// 57 input bytes make exactly one 76-character output line.
const BASE64_LINE_INPUT: usize = 57;

impl Base64Encoder {
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(data);

        while self.pending.len() >= BASE64_LINE_INPUT {
            if self.any_output {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(
                base64::encode_config(
                    &self.pending[..BASE64_LINE_INPUT],
                    base64::STANDARD,
                )
                .as_bytes(),
            );
            self.any_output = true;
            self.pending.copy_within(BASE64_LINE_INPUT.., 0);
            self.pending
                .truncate(self.pending.len() - BASE64_LINE_INPUT);
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if !self.pending.is_empty() {
            if self.any_output {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(
                base64::encode_config(&self.pending, base64::STANDARD)
                    .as_bytes(),
            );
            self.any_output = true;
            self.pending.clear();
        }
    }
}

/// Streaming quoted-printable decoder built on `qp_decode`, carrying escape
/// sequences that straddle chunk boundaries.
#[derive(Debug, Default)]
pub struct QpDecoder {
    dangling: Vec<u8>,
}

impl QpDecoder {
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        if self.dangling.is_empty() {
            let (decoded, dangling) = qp_decode(data);
            out.extend_from_slice(&decoded);
            self.dangling = dangling.to_vec();
        } else {
            let mut buf = std::mem::take(&mut self.dangling);
            buf.extend_from_slice(data);
            let (decoded, dangling) = qp_decode(&buf);
            out.extend_from_slice(&decoded);
            self.dangling = dangling.to_vec();
        }
    }

    /// A truncated escape at end of input is emitted verbatim.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.dangling);
        self.dangling.clear();
    }
}

/// Streaming quoted-printable encoder.
///
/// Lines are soft-wrapped at 76 characters. Input line breaks (CRLF or bare
/// LF) become hard CRLF breaks, with any trailing space or tab on the line
/// escaped as RFC 2045 requires. The output carries no trailing line ending.
#[derive(Debug, Default)]
pub struct QpEncoder {
    line: Vec<u8>,
    pending_cr: bool,
}

impl QpEncoder {
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for &b in data {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    self.hard_break(out);
                    continue;
                }
                self.push_atom(b"=0D", out);
            }

            match b {
                b'\r' => self.pending_cr = true,
                b'\n' => self.hard_break(out),
                b' ' | b'\t' => self.push_atom(&[b], out),
                0x21..=0x3C | 0x3E..=0x7E => self.push_atom(&[b], out),
                _ => {
                    let hex = b"0123456789ABCDEF";
                    let atom = [
                        b'=',
                        hex[usize::from(b >> 4)],
                        hex[usize::from(b & 0xf)],
                    ];
                    self.push_atom(&atom, out);
                },
            }
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            self.push_atom(b"=0D", out);
        }
        self.escape_trailing_whitespace(out);
        out.extend_from_slice(&self.line);
        self.line.clear();
    }

    fn push_atom(&mut self, atom: &[u8], out: &mut Vec<u8>) {
        if self.line.len() + atom.len() > 75 {
            out.extend_from_slice(&self.line);
            out.extend_from_slice(b"=\r\n");
            self.line.clear();
        }
        self.line.extend_from_slice(atom);
    }

    fn hard_break(&mut self, out: &mut Vec<u8>) {
        self.escape_trailing_whitespace(out);
        out.extend_from_slice(&self.line);
        out.extend_from_slice(b"\r\n");
        self.line.clear();
    }

    // Space or tab cannot end an encoded line.
    fn escape_trailing_whitespace(&mut self, out: &mut Vec<u8>) {
        match self.line.last() {
            Some(&b) if b == b' ' || b == b'\t' => {
                self.line.pop();
                let atom = if b == b' ' { b"=20" } else { b"=09" };
                self.push_atom(atom, out);
            },
            _ => (),
        }
    }
}
