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

//! MIME tree nodes.
//!
//! Nodes live in a `NodeArena` owned by the splitter and are referred to by
//! index handles, so events can carry a node reference without entangling
//! lifetimes with the splitter itself. Parent links are plain handles into
//! the same arena.

use crate::content_encoding::{ContentDecoder, ContentEncoder};
use crate::header::{
    build_header_value, parse_content_transfer_encoding, parse_header_value,
    ContentTransferEncoding, HeaderValue,
};
use crate::headers::Headers;

/// Handle to a node in a `NodeArena`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// One element of an IMAP-style part number.
///
/// The body of an inline `message/rfc822` part is addressed as `TEXT` rather
/// than by ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartNumberSegment {
    Part(u32),
    Text,
}

#[derive(Debug)]
enum HeaderState {
    Collecting(Vec<u8>),
    Parsed(Headers),
}

/// A single node of the MIME tree: the headers of one entity plus the
/// structural facts extracted from them.
#[derive(Debug)]
pub struct MimeNode {
    id: NodeId,
    parent: Option<NodeId>,
    header_state: HeaderState,

    /// Lower-cased `type/subtype`, empty when the header is absent.
    pub content_type: String,
    pub encoding: ContentTransferEncoding,
    pub charset: Option<String>,
    /// Lower-cased Content-Disposition value.
    pub disposition: Option<String>,
    pub filename: Option<String>,
    /// Multipart subtype, when this node is a multipart container.
    pub multipart: Option<String>,
    /// Raw boundary bytes; only set for multipart nodes.
    pub boundary: Option<Vec<u8>>,
    pub flowed: bool,
    pub del_sp: bool,
    pub part_number: Vec<PartNumberSegment>,

    /// Boundary of the enclosing multipart, used for boundary dispatch.
    pub(crate) parent_boundary: Option<Vec<u8>>,
    /// Set on a node whose body was entered as an inline message/rfc822.
    pub(crate) message_node: bool,

    child_count: u32,
    parsed_content_type: Option<HeaderValue>,
    parsed_disposition: Option<HeaderValue>,
}

/// Flat storage for the nodes of one message.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<MimeNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena::default()
    }

    /// Number of nodes allocated so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a new node. Its part number is derived from the parent: a
    /// `message/rfc822` parent contributes a `TEXT` segment, any other
    /// parent its next 1-based child ordinal.
    pub fn alloc(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);

        let part_number = match parent {
            None => Vec::new(),
            Some(pid) => {
                let p = &mut self.nodes[pid.0 as usize];
                let mut pn = p.part_number.clone();
                if p.message_node || p.content_type == "message/rfc822" {
                    pn.push(PartNumberSegment::Text);
                } else {
                    p.child_count += 1;
                    pn.push(PartNumberSegment::Part(p.child_count));
                }
                pn
            },
        };

        self.nodes.push(MimeNode {
            id,
            parent,
            header_state: HeaderState::Collecting(Vec::new()),
            content_type: String::new(),
            encoding: ContentTransferEncoding::default(),
            charset: None,
            disposition: None,
            filename: None,
            multipart: None,
            boundary: None,
            flowed: false,
            del_sp: false,
            part_number,
            parent_boundary: None,
            message_node: false,
            child_count: 0,
            parsed_content_type: None,
            parsed_disposition: None,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> &MimeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut MimeNode {
        &mut self.nodes[id.0 as usize]
    }
}

impl MimeNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart.is_some()
    }

    /// Appends raw head bytes (one or more lines, endings included).
    pub(crate) fn add_header_chunk(&mut self, chunk: &[u8]) {
        if let HeaderState::Collecting(ref mut buf) = self.header_state {
            buf.extend_from_slice(chunk);
        }
    }

    pub(crate) fn collected_header_len(&self) -> usize {
        match self.header_state {
            HeaderState::Collecting(ref buf) => buf.len(),
            HeaderState::Parsed(_) => 0,
        }
    }

    /// Parses the collected head bytes. Idempotent; the second and later
    /// calls are no-ops.
    pub fn parse_headers(&mut self) {
        let buf = match self.header_state {
            HeaderState::Collecting(ref mut buf) => std::mem::take(buf),
            HeaderState::Parsed(_) => return,
        };
        let headers = Headers::new(buf);
        self.extract_structure(&headers);
        self.header_state = HeaderState::Parsed(headers);
    }

    fn extract_structure(&mut self, headers: &Headers) {
        let ct = parse_header_value(&headers.get_first("content-type"));
        self.content_type = ct.value.to_ascii_lowercase();
        self.charset =
            ct.param_str("charset").map(|c| c.to_ascii_lowercase());

        if let Some(subtype) = self.content_type.strip_prefix("multipart/")
        {
            self.multipart = Some(subtype.to_owned());
            self.boundary = ct.param("boundary").map(<[u8]>::to_vec);
        }

        if self.content_type == "text/plain" {
            self.flowed = ct
                .param_str("format")
                .map_or(false, |f| f.eq_ignore_ascii_case("flowed"));
            self.del_sp = ct
                .param_str("delsp")
                .map_or(false, |d| d.eq_ignore_ascii_case("yes"));
        }

        self.encoding = parse_content_transfer_encoding(
            &headers.get_first("content-transfer-encoding"),
        );

        let cd = if headers.has_header("content-disposition") {
            let cd = parse_header_value(
                &headers.get_first("content-disposition"),
            );
            self.disposition = Some(cd.value.to_ascii_lowercase());
            Some(cd)
        } else {
            None
        };

        self.filename = cd
            .as_ref()
            .and_then(|cd| cd.param("filename"))
            .or_else(|| ct.param("name"))
            .map(decode_filename);

        self.parsed_content_type = Some(ct);
        self.parsed_disposition = cd;
    }

    /// The parsed header block. `None` until `parse_headers` has run.
    pub fn headers(&self) -> Option<&Headers> {
        match self.header_state {
            HeaderState::Parsed(ref h) => Some(h),
            HeaderState::Collecting(_) => None,
        }
    }

    pub fn headers_mut(&mut self) -> Option<&mut Headers> {
        match self.header_state {
            HeaderState::Parsed(ref mut h) => Some(h),
            HeaderState::Collecting(_) => None,
        }
    }

    /// Serializes the head chunk. Byte-exact when nothing was mutated.
    pub fn build_headers(&self, line_end: Option<&[u8]>) -> Vec<u8> {
        match self.header_state {
            HeaderState::Parsed(ref h) => h.build(line_end),
            HeaderState::Collecting(ref buf) => buf.clone(),
        }
    }

    /// Replaces the Content-Type value, keeping existing parameters.
    pub fn set_content_type(&mut self, content_type: &str) {
        self.parse_headers();
        self.content_type = content_type.to_ascii_lowercase();
        let hv = self
            .parsed_content_type
            .get_or_insert_with(HeaderValue::default);
        hv.value = content_type.to_owned();
        self.sync_content_type_header();
    }

    /// Replaces the charset parameter of the Content-Type.
    pub fn set_charset(&mut self, charset: &str) {
        self.parse_headers();
        self.charset = Some(charset.to_ascii_lowercase());
        let hv = self
            .parsed_content_type
            .get_or_insert_with(HeaderValue::default);
        hv.set_param("charset", charset.as_bytes());
        self.sync_content_type_header();
    }

    /// Replaces the file name: the Content-Disposition `filename` parameter
    /// when a disposition header exists, the Content-Type `name` parameter
    /// otherwise.
    pub fn set_filename(&mut self, filename: &str) {
        self.parse_headers();
        self.filename = Some(filename.to_owned());
        if self.parsed_disposition.is_some() {
            let hv = self.parsed_disposition.as_mut().unwrap();
            hv.set_param("filename", filename.as_bytes());
            self.sync_disposition_header();
        } else {
            let hv = self
                .parsed_content_type
                .get_or_insert_with(HeaderValue::default);
            hv.set_param("name", filename.as_bytes());
            self.sync_content_type_header();
        }
    }

    /// Drops the `format=flowed` / `delsp` marking, both from the flags and
    /// from the serialized Content-Type. Used after content has been
    /// unwrapped in place.
    pub fn clear_flowed(&mut self) {
        if !self.flowed && !self.del_sp {
            return;
        }
        self.flowed = false;
        self.del_sp = false;
        if let Some(ref mut hv) = self.parsed_content_type {
            hv.remove_param("format");
            hv.remove_param("delsp");
        }
        self.sync_content_type_header();
    }

    fn sync_content_type_header(&mut self) {
        if let (HeaderState::Parsed(headers), Some(hv)) =
            (&mut self.header_state, &self.parsed_content_type)
        {
            headers.update(
                "Content-Type",
                &build_header_value(&hv.value, &hv.params),
                None,
            );
        }
    }

    fn sync_disposition_header(&mut self) {
        if let (HeaderState::Parsed(headers), Some(hv)) =
            (&mut self.header_state, &self.parsed_disposition)
        {
            headers.update(
                "Content-Disposition",
                &build_header_value(&hv.value, &hv.params),
                None,
            );
        }
    }

    /// A streaming decoder for this node's declared transfer encoding.
    pub fn get_decoder(&self) -> ContentDecoder {
        ContentDecoder::for_encoding(self.encoding)
    }

    /// A streaming encoder for this node's content.
    ///
    /// With `force`, content is re-encoded in the given encoding instead of
    /// the declared one, and the Content-Transfer-Encoding header is
    /// rewritten to match.
    pub fn get_encoder(
        &mut self,
        force: Option<ContentTransferEncoding>,
    ) -> ContentEncoder {
        if let Some(target) = force {
            if target != self.encoding {
                self.parse_headers();
                self.encoding = target;
                if let HeaderState::Parsed(ref mut headers) =
                    self.header_state
                {
                    headers.update(
                        "Content-Transfer-Encoding",
                        target.name(),
                        None,
                    );
                }
            }
        }
        ContentEncoder::for_encoding(self.encoding)
    }
}

fn decode_filename(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => crate::encoded_word::decode_words(s),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parsed(head: &[u8]) -> (NodeArena, NodeId) {
        let mut arena = NodeArena::new();
        let id = arena.alloc(None);
        arena.get_mut(id).add_header_chunk(head);
        arena.get_mut(id).parse_headers();
        (arena, id)
    }

    #[test]
    fn extracts_multipart_structure() {
        let (arena, id) = parsed(
            b"Content-Type: multipart/mixed; boundary=\"abc def\"\r\n\r\n",
        );
        let node = arena.get(id);
        assert_eq!("multipart/mixed", node.content_type);
        assert_eq!(Some("mixed".to_owned()), node.multipart);
        assert_eq!(Some(b"abc def".to_vec()), node.boundary);
    }

    #[test]
    fn extracts_flowed_text() {
        let (arena, id) = parsed(
            b"Content-Type: text/plain; charset=UTF-8; format=Flowed; delsp=yes\r\n\r\n",
        );
        let node = arena.get(id);
        assert!(node.flowed);
        assert!(node.del_sp);
        assert_eq!(Some("utf-8".to_owned()), node.charset);
        assert!(node.boundary.is_none());
    }

    #[test]
    fn flowed_only_applies_to_text_plain() {
        let (arena, id) =
            parsed(b"Content-Type: text/html; format=flowed\r\n\r\n");
        assert!(!arena.get(id).flowed);
    }

    #[test]
    fn filename_prefers_disposition() {
        let (arena, id) = parsed(
            b"Content-Type: application/pdf; name=ct.pdf\r\n\
              Content-Disposition: attachment; filename=cd.pdf\r\n\r\n",
        );
        let node = arena.get(id);
        assert_eq!(Some("cd.pdf".to_owned()), node.filename);
        assert_eq!(Some("attachment".to_owned()), node.disposition);
    }

    #[test]
    fn filename_falls_back_to_name() {
        let (arena, id) =
            parsed(b"Content-Type: application/pdf; name=ct.pdf\r\n\r\n");
        assert_eq!(Some("ct.pdf".to_owned()), arena.get(id).filename);
    }

    #[test]
    fn filename_encoded_word() {
        let (arena, id) = parsed(
            b"Content-Disposition: attachment; \
              filename=\"=?ISO-8859-1?Q?Andr=E9?=.txt\"\r\n\r\n",
        );
        assert_eq!(
            Some("Andr\u{e9}.txt".to_owned()),
            arena.get(id).filename
        );
    }

    #[test]
    fn part_numbers() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(None);
        arena
            .get_mut(root)
            .add_header_chunk(b"Content-Type: multipart/mixed; boundary=b\r\n\r\n");
        arena.get_mut(root).parse_headers();

        let c1 = arena.alloc(Some(root));
        let c2 = arena.alloc(Some(root));
        assert_eq!(
            vec![PartNumberSegment::Part(1)],
            arena.get(c1).part_number
        );
        assert_eq!(
            vec![PartNumberSegment::Part(2)],
            arena.get(c2).part_number
        );

        arena
            .get_mut(c2)
            .add_header_chunk(b"Content-Type: message/rfc822\r\n\r\n");
        arena.get_mut(c2).parse_headers();
        let embedded = arena.alloc(Some(c2));
        assert_eq!(
            vec![PartNumberSegment::Part(2), PartNumberSegment::Text],
            arena.get(embedded).part_number
        );
    }

    #[test]
    fn set_content_type_keeps_params() {
        let (mut arena, id) = parsed(
            b"Content-Type: text/plain; charset=utf-8\r\n\r\n",
        );
        arena.get_mut(id).set_content_type("text/html");
        let node = arena.get(id);
        assert_eq!("text/html", node.content_type);
        assert_eq!(
            b"Content-Type: text/html; charset=utf-8\r\n\r\n".to_vec(),
            node.build_headers(None)
        );
    }

    #[test]
    fn clear_flowed_rewrites_header() {
        let (mut arena, id) = parsed(
            b"Content-Type: text/plain; format=flowed; delsp=yes\r\n\r\n",
        );
        arena.get_mut(id).clear_flowed();
        let node = arena.get(id);
        assert!(!node.flowed);
        assert_eq!(
            b"Content-Type: text/plain\r\n\r\n".to_vec(),
            node.build_headers(None)
        );
    }

    #[test]
    fn forced_encoder_rewrites_cte_header() {
        let (mut arena, id) = parsed(
            b"Content-Type: text/plain\r\n\
              Content-Transfer-Encoding: 8bit\r\n\r\n",
        );
        arena
            .get_mut(id)
            .get_encoder(Some(ContentTransferEncoding::QuotedPrintable));
        let node = arena.get(id);
        assert_eq!(ContentTransferEncoding::QuotedPrintable, node.encoding);
        assert_eq!(
            b"Content-Type: text/plain\r\n\
              Content-Transfer-Encoding: quoted-printable\r\n\r\n"
                .to_vec(),
            node.build_headers(None)
        );
    }

    #[test]
    fn unchanged_headers_round_trip() {
        let head: &[u8] = b"X-Weird:   spaced\t\r\nNo-Colon-Line\r\n\r\n";
        let (arena, id) = parsed(head);
        assert_eq!(head.to_vec(), arena.get(id).build_headers(None));
    }
}
