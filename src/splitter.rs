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

//! The push-based message splitter.
//!
//! Bytes go in through `push` in chunks of any size; structural events come
//! out through `next_event`. Concatenating the serialized form of every
//! event reproduces the input byte for byte, which is the load-bearing
//! invariant of the whole crate: anything the splitter cannot make sense of
//! still flows through as data.
//!
//! Internally the input is re-segmented into lines at LF. Each complete line
//! is checked against the current node's own and parent boundaries before
//! any state logic runs, then fed to the head accumulator or grouped into a
//! data/body span. The line ending that terminates a body span is withheld
//! and re-attached to the front of whatever span follows, so body events
//! never carry their final line break.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::header::ContentTransferEncoding;
use crate::node::{MimeNode, NodeArena, NodeId};

/// One structural event of a split message.
///
/// The serialized form of an event sequence (headers for `Node`, verbatim
/// bytes for `Data` and `Body`) concatenates to the original message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A node's head is complete. Emitted after any boundary line that
    /// introduced the node.
    Node(NodeId),
    /// Structural bytes: boundary lines, multipart preamble and epilogue.
    /// Line endings are included.
    Data { node: NodeId, value: Vec<u8> },
    /// Leaf content bytes. The final line ending of a body span is withheld
    /// and carried by the following event.
    Body { node: NodeId, value: Vec<u8> },
}

/// Splitter tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Largest head block a single node may accumulate before the splitter
    /// fails with `HeaderSizeExceeded`.
    pub max_head_size: usize,
    /// Largest number of non-root nodes before the splitter fails with
    /// `NodeCountExceeded`. Guards against boundary bombs.
    pub max_child_nodes: usize,
    /// Treat inline `message/rfc822` parts as opaque content instead of
    /// descending into them.
    pub ignore_embedded: bool,
    /// When true, a `message/rfc822` part is considered inline unless its
    /// disposition says `attachment`; when false, only an explicit `inline`
    /// disposition is descended into.
    pub default_inline_embedded: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        SplitterConfig {
            max_head_size: 1024 * 1024,
            max_child_nodes: 1000,
            ignore_embedded: false,
            default_inline_embedded: true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum State {
    Head,
    Body,
}

#[derive(Clone, Copy, Debug)]
enum Failure {
    HeaderSize,
    NodeCount,
}

impl Failure {
    fn to_error(self) -> Error {
        match self {
            Failure::HeaderSize => Error::HeaderSizeExceeded,
            Failure::NodeCount => Error::NodeCountExceeded,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpanKind {
    Data,
    Body,
}

#[derive(Debug)]
struct Span {
    kind: SpanKind,
    node: NodeId,
    value: Vec<u8>,
}

enum BoundaryMatch {
    OwnNext,
    OwnFinal,
    ParentNext,
    ParentFinal,
}

/// Streaming MIME splitter.
pub struct MessageSplitter {
    config: SplitterConfig,
    arena: NodeArena,
    events: VecDeque<Event>,

    state: State,
    current: NodeId,
    /// Ancestor multiparts to return to at their final boundary. Seeded
    /// with the root so a stray final boundary degrades gracefully.
    stack: Vec<NodeId>,

    /// Partial line carried between chunks.
    pending: Vec<u8>,
    /// Line ending withheld from the last body line.
    held: &'static [u8],
    span: Option<Span>,

    failure: Option<Failure>,
    seen_input: bool,
    finished: bool,
}

impl MessageSplitter {
    pub fn new() -> Self {
        Self::with_config(SplitterConfig::default())
    }

    pub fn with_config(config: SplitterConfig) -> Self {
        let mut arena = NodeArena::new();
        let root = arena.alloc(None);
        MessageSplitter {
            config,
            arena,
            events: VecDeque::new(),
            state: State::Head,
            current: root,
            stack: vec![root],
            pending: Vec::new(),
            held: b"",
            span: None,
            failure: None,
            seen_input: false,
            finished: false,
        }
    }

    pub fn node(&self, id: NodeId) -> &MimeNode {
        self.arena.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut MimeNode {
        self.arena.get_mut(id)
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    /// Pops the next queued event. Events queued before a failure remain
    /// available after it.
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Feeds a chunk of the message. Spans open at the end of the chunk are
    /// flushed, so every pushed byte (minus a partial line and a withheld
    /// ending) is represented in the event queue afterwards.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.check_failure()?;
        if !chunk.is_empty() {
            self.seen_input = true;
        }

        let mut data = chunk;
        while let Some(lf) = memchr::memchr(b'\n', data) {
            let (head, rest) = data.split_at(lf + 1);
            data = rest;

            if self.pending.is_empty() {
                self.process_line(head)?;
            } else {
                let mut line = std::mem::take(&mut self.pending);
                line.extend_from_slice(head);
                self.process_line(&line)?;
            }
        }
        if !data.is_empty() {
            self.pending.extend_from_slice(data);
        }

        self.flush_span();
        Ok(())
    }

    /// Ends the input: the final partial line is processed, an unterminated
    /// head is force-parsed so its node is still announced, and any withheld
    /// ending is emitted.
    pub fn finish(&mut self) -> Result<(), Error> {
        self.check_failure()?;
        if self.finished {
            return Ok(());
        }

        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.process_line(&line)?;
        }

        match self.state {
            State::Head => {
                let id = self.current;
                if self.arena.get(id).collected_header_len() > 0 {
                    self.arena.get_mut(id).parse_headers();
                    self.flush_span();
                    self.events.push_back(Event::Node(id));
                }
            },
            State::Body => {
                if !self.held.is_empty() {
                    let held = std::mem::replace(&mut self.held, b"");
                    let kind = self.content_kind();
                    self.span_append(kind, self.current, held);
                }
            },
        }

        self.flush_span();
        self.finished = true;
        Ok(())
    }

    fn check_failure(&self) -> Result<(), Error> {
        match self.failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn process_line(&mut self, line: &[u8]) -> Result<(), Error> {
        match self.state {
            State::Head => self.process_head_line(line),
            State::Body => self.process_body_line(line),
        }
    }

    fn process_head_line(&mut self, line: &[u8]) -> Result<(), Error> {
        let collected = self.arena.get(self.current).collected_header_len();
        if collected + line.len() > self.config.max_head_size {
            log::warn!(
                "head block exceeds {} bytes, giving up",
                self.config.max_head_size
            );
            self.failure = Some(Failure::HeaderSize);
            return Err(Error::HeaderSizeExceeded);
        }

        self.arena.get_mut(self.current).add_header_chunk(line);

        if line != b"\n" && line != b"\r\n" {
            return Ok(());
        }

        // blank line: this head is complete
        let id = self.current;
        self.arena.get_mut(id).parse_headers();

        if self.enters_embedded_message(id) {
            self.check_node_limit()?;
            let parent_boundary = self
                .arena
                .get(id)
                .parent()
                .and_then(|p| self.arena.get(p).boundary.clone());
            self.arena.get_mut(id).message_node = true;
            let child = self.arena.alloc(Some(id));
            self.arena.get_mut(child).parent_boundary = parent_boundary;
            self.current = child;
            // state stays Head: the embedded message's own head follows
            log::trace!("descending into inline message/rfc822");
        } else {
            self.state = State::Body;
            let node = self.arena.get(id);
            if node.is_multipart() && node.boundary.is_some() {
                self.stack.push(id);
            }
        }

        self.flush_span();
        self.events.push_back(Event::Node(id));
        Ok(())
    }

    fn enters_embedded_message(&self, id: NodeId) -> bool {
        let node = self.arena.get(id);
        if node.content_type != "message/rfc822"
            || self.config.ignore_embedded
        {
            return false;
        }

        // only identity encodings leave the embedded message splittable
        if !matches!(
            node.encoding,
            ContentTransferEncoding::SevenBit
                | ContentTransferEncoding::EightBit
                | ContentTransferEncoding::Binary
        ) {
            return false;
        }

        match node.disposition.as_deref() {
            Some("attachment") => false,
            Some("inline") => true,
            _ => self.config.default_inline_embedded,
        }
    }

    fn process_body_line(&mut self, line: &[u8]) -> Result<(), Error> {
        match self.check_boundary(line) {
            Some(BoundaryMatch::OwnNext) => {
                self.check_node_limit()?;
                let parent = self.current;
                let boundary = self.arena.get(parent).boundary.clone();
                let child = self.arena.alloc(Some(parent));
                self.arena.get_mut(child).parent_boundary = boundary;
                self.current = child;
                self.state = State::Head;
                self.emit_data_line(line);
            },
            Some(BoundaryMatch::OwnFinal) => {
                // end of our children; epilogue lines stay with this node
                self.emit_data_line(line);
            },
            Some(BoundaryMatch::ParentNext) => {
                self.check_node_limit()?;
                let mut parent = self.arena.get(self.current).parent();
                if let Some(p) = parent {
                    if self.arena.get(p).content_type == "message/rfc822" {
                        // the sibling of an inline message's content is a
                        // sibling of the message part itself
                        parent = self.arena.get(p).parent();
                    }
                }
                let boundary = parent
                    .and_then(|p| self.arena.get(p).boundary.clone());
                let child = self.arena.alloc(parent);
                self.arena.get_mut(child).parent_boundary = boundary;
                self.current = child;
                self.state = State::Head;
                self.emit_data_line(line);
            },
            Some(BoundaryMatch::ParentFinal) => {
                self.current = self.stack.pop().unwrap_or(self.current);
                self.state = State::Body;
                self.emit_data_line(line);
            },
            None => {
                let kind = self.content_kind();
                self.emit_content_line(kind, line);
            },
        }
        Ok(())
    }

    fn check_node_limit(&mut self) -> Result<(), Error> {
        if self.arena.len() - 1 >= self.config.max_child_nodes {
            log::warn!(
                "message exceeds {} nodes, giving up",
                self.config.max_child_nodes
            );
            self.failure = Some(Failure::NodeCount);
            return Err(Error::NodeCountExceeded);
        }
        Ok(())
    }

    // A multipart node's non-boundary lines are structure (preamble,
    // epilogue), not content.
    fn content_kind(&self) -> SpanKind {
        if self.arena.get(self.current).is_multipart() {
            SpanKind::Data
        } else {
            SpanKind::Body
        }
    }

    fn check_boundary(&self, line: &[u8]) -> Option<BoundaryMatch> {
        let mut startpos = 0;
        if !line.is_empty() && (line[0] == b'\r' || line[0] == b'\n') {
            startpos += 1;
            if line.len() >= 2 && (line[0] == b'\r' || line[1] == b'\n') {
                startpos += 1;
            }
        }
        if line.len() < 4
            || line.get(startpos) != Some(&b'-')
            || line.get(startpos + 1) != Some(&b'-')
        {
            return None;
        }

        let node = self.arena.get(self.current);
        if let Some(ref own) = node.boundary {
            match compare_boundary(line, startpos, own) {
                Some(false) => return Some(BoundaryMatch::OwnNext),
                Some(true) => return Some(BoundaryMatch::OwnFinal),
                None => (),
            }
        }
        if let Some(ref parent) = node.parent_boundary {
            match compare_boundary(line, startpos, parent) {
                Some(false) => return Some(BoundaryMatch::ParentNext),
                Some(true) => return Some(BoundaryMatch::ParentFinal),
                None => (),
            }
        }
        None
    }

    fn emit_data_line(&mut self, line: &[u8]) {
        let node = self.current;
        if !self.held.is_empty() {
            let held = std::mem::replace(&mut self.held, b"");
            self.span_append(SpanKind::Data, node, held);
        }
        self.span_append(SpanKind::Data, node, line);
    }

    fn emit_content_line(&mut self, kind: SpanKind, line: &[u8]) {
        let node = self.current;
        if !self.held.is_empty() {
            let held = std::mem::replace(&mut self.held, b"");
            self.span_append(kind, node, held);
        }
        match kind {
            SpanKind::Body => {
                let (content, ending) = split_line_ending(line);
                self.span_append(kind, node, content);
                self.held = ending;
            },
            SpanKind::Data => self.span_append(kind, node, line),
        }
    }

    fn span_append(&mut self, kind: SpanKind, node: NodeId, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.span {
            Some(ref mut span)
                if span.kind == kind && span.node == node =>
            {
                span.value.extend_from_slice(bytes);
            },
            _ => {
                self.flush_span();
                self.span = Some(Span {
                    kind,
                    node,
                    value: bytes.to_vec(),
                });
            },
        }
    }

    fn flush_span(&mut self) {
        if let Some(span) = self.span.take() {
            if !span.value.is_empty() {
                self.events.push_back(match span.kind {
                    SpanKind::Data => Event::Data {
                        node: span.node,
                        value: span.value,
                    },
                    SpanKind::Body => Event::Body {
                        node: span.node,
                        value: span.value,
                    },
                });
            }
        }
    }
}

impl Default for MessageSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn split_line_ending(line: &[u8]) -> (&[u8], &'static [u8]) {
    if line.ends_with(b"\r\n") {
        (&line[..line.len() - 2], b"\r\n")
    } else if line.ends_with(b"\n") {
        (&line[..line.len() - 1], b"\n")
    } else {
        (line, b"")
    }
}

/// Matches one line against `--boundary` (`Some(false)`, a part delimiter)
/// or `--boundary--` (`Some(true)`, the final delimiter), tolerating one
/// leading line ending at `startpos` and either ending style after. A line
/// that merely starts with the delimiter is no boundary at all.
fn compare_boundary(
    line: &[u8],
    startpos: usize,
    boundary: &[u8],
) -> Option<bool> {
    if line.len() < boundary.len() + 3 + startpos
        || line.len() > boundary.len() + 6 + startpos
    {
        return None;
    }
    if &line[startpos + 2..startpos + 2 + boundary.len()] != &boundary[..] {
        return None;
    }

    for (pos, &c) in line[startpos + 2 + boundary.len()..].iter().enumerate()
    {
        match pos {
            0 if c == b'\r' || c == b'\n' => return Some(false),
            0 | 1 if c != b'-' => return None,
            2 if c != b'\r' && c != b'\n' => return None,
            3 if c != b'\n' => return None,
            _ => (),
        }
    }

    Some(true)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::PartNumberSegment;

    fn split(message: &[u8]) -> (MessageSplitter, Vec<Event>) {
        let mut splitter = MessageSplitter::new();
        splitter.push(message).unwrap();
        splitter.finish().unwrap();
        let mut events = Vec::new();
        while let Some(ev) = splitter.next_event() {
            events.push(ev);
        }
        (splitter, events)
    }

    fn join(splitter: &MessageSplitter, events: &[Event]) -> Vec<u8> {
        let mut out = Vec::new();
        for ev in events {
            match ev {
                Event::Node(id) => out.extend_from_slice(
                    &splitter.node(*id).build_headers(None),
                ),
                Event::Data { value, .. } | Event::Body { value, .. } => {
                    out.extend_from_slice(value)
                },
            }
        }
        out
    }

    #[test]
    fn simple_message() {
        let (splitter, events) =
            split(b"Subject: test\r\n\r\nHello world!");
        assert_eq!(2, events.len());
        match &events[0] {
            Event::Node(id) => {
                assert_eq!(
                    "test",
                    splitter.node(*id).headers().unwrap().get_first("subject")
                );
            },
            other => panic!("expected node event, got {:?}", other),
        }
        assert!(matches!(
            &events[1],
            Event::Body { value, .. } if value == b"Hello world!"
        ));
    }

    #[test]
    fn body_events_withhold_final_line_ending() {
        let (_, events) = split(b"Subject: t\r\n\r\nHello world!\r\n");
        // the trailing CRLF surfaces as its own event after the flush
        let bodies: Vec<&[u8]> = events
            .iter()
            .filter_map(|ev| match ev {
                Event::Body { value, .. } => Some(value.as_slice()),
                _ => None,
            })
            .collect();
        assert_eq!(vec![&b"Hello world!"[..], &b"\r\n"[..]], bodies);
    }

    const NESTED: &[u8] = b"Content-Type: multipart/mixed; boundary=outer\r\n\
        \r\n\
        preamble\r\n\
        --outer\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        hello\r\n\
        --outer\r\n\
        Content-Type: multipart/alternative; boundary=inner\r\n\
        \r\n\
        --inner\r\n\
        Content-Type: text/html\r\n\
        \r\n\
        <b>hi</b>\r\n\
        --inner--\r\n\
        --outer--\r\n\
        epilogue\r\n";

    #[test]
    fn nested_multipart_structure() {
        let (splitter, events) = split(NESTED);

        let nodes: Vec<NodeId> = events
            .iter()
            .filter_map(|ev| match ev {
                Event::Node(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(4, nodes.len());
        assert_eq!(
            "multipart/mixed",
            splitter.node(nodes[0]).content_type
        );
        assert_eq!(
            vec![PartNumberSegment::Part(1)],
            splitter.node(nodes[1]).part_number
        );
        assert_eq!(
            vec![PartNumberSegment::Part(2)],
            splitter.node(nodes[2]).part_number
        );
        assert_eq!(
            vec![PartNumberSegment::Part(2), PartNumberSegment::Part(1)],
            splitter.node(nodes[3]).part_number
        );

        // preamble and boundaries are data, leaf content is body
        assert!(matches!(
            &events[1],
            Event::Data { value, .. } if value == b"preamble\r\n"
        ));
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Body { value, .. } if value == b"hello"
        )));

        assert_eq!(NESTED.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn boundary_line_endings_stay_with_data() {
        let (splitter, events) = split(NESTED);
        // the CRLF ending "hello" re-attaches to the front of the next
        // boundary line
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Data { value, .. } if value.starts_with(b"\r\n--outer\r\n")
        )));
        assert_eq!(NESTED.to_vec(), join(&splitter, &events));
    }

    const EMBEDDED: &[u8] = b"Content-Type: multipart/mixed; boundary=b\r\n\
        \r\n\
        --b\r\n\
        Content-Type: message/rfc822\r\n\
        \r\n\
        Subject: inner\r\n\
        \r\n\
        inner body\r\n\
        --b--\r\n";

    #[test]
    fn embedded_message_is_descended_into() {
        let (splitter, events) = split(EMBEDDED);

        let nodes: Vec<NodeId> = events
            .iter()
            .filter_map(|ev| match ev {
                Event::Node(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(3, nodes.len());
        assert_eq!(
            "message/rfc822",
            splitter.node(nodes[1]).content_type
        );
        assert_eq!(
            vec![PartNumberSegment::Part(1), PartNumberSegment::Text],
            splitter.node(nodes[2]).part_number
        );
        assert_eq!(
            "inner",
            splitter
                .node(nodes[2])
                .headers()
                .unwrap()
                .get_first("subject")
        );
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Body { value, .. } if value == b"inner body"
        )));

        assert_eq!(EMBEDDED.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn embedded_message_opaque_when_ignored() {
        let mut splitter = MessageSplitter::with_config(SplitterConfig {
            ignore_embedded: true,
            ..SplitterConfig::default()
        });
        splitter.push(EMBEDDED).unwrap();
        splitter.finish().unwrap();

        let mut events = Vec::new();
        while let Some(ev) = splitter.next_event() {
            events.push(ev);
        }

        let nodes: Vec<NodeId> = events
            .iter()
            .filter_map(|ev| match ev {
                Event::Node(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(2, nodes.len(), "no node for the embedded message");
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Body { value, .. }
                if value == b"Subject: inner\r\n\r\ninner body"
        )));
        assert_eq!(EMBEDDED.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn embedded_attachment_is_opaque_by_default() {
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\
            Content-Type: message/rfc822\r\n\
            Content-Disposition: attachment\r\n\
            \r\n\
            Subject: inner\r\n\
            \r\n\
            inner body\r\n\
            --b--\r\n";
        let (splitter, events) = split(message);
        let node_count = events
            .iter()
            .filter(|ev| matches!(ev, Event::Node(_)))
            .count();
        assert_eq!(2, node_count);
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn base64_embedded_message_is_opaque() {
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\
            Content-Type: message/rfc822\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            U3ViamVjdDogaW5uZXINCg0KaW5uZXIgYm9keQ==\r\n\
            --b--\r\n";
        let (splitter, events) = split(message);
        let node_count = events
            .iter()
            .filter(|ev| matches!(ev, Event::Node(_)))
            .count();
        assert_eq!(2, node_count);
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn sibling_after_embedded_message_climbs_out() {
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\
            Content-Type: message/rfc822\r\n\
            \r\n\
            Subject: inner\r\n\
            \r\n\
            inner body\r\n\
            --b\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            second part\r\n\
            --b--\r\n";
        let (splitter, events) = split(message);

        let nodes: Vec<NodeId> = events
            .iter()
            .filter_map(|ev| match ev {
                Event::Node(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(4, nodes.len());
        // the part after the inner message is a sibling of the message
        // part, not of its content
        assert_eq!(
            vec![PartNumberSegment::Part(2)],
            splitter.node(nodes[3]).part_number
        );
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn boundary_prefix_is_not_a_boundary() {
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            --bx is no boundary\r\n\
            --b--\r\n";
        let (splitter, events) = split(message);
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Body { value, .. } if value == b"--bx is no boundary"
        )));
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn unterminated_final_boundary_at_eof() {
        // "--b--" with no line ending at EOF is still the final delimiter
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\
            \r\n\
            x\r\n\
            --b--";
        let (splitter, events) = split(message);
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Data { value, .. } if value == b"\r\n--b--"
        )));
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn truncated_boundary_at_eof_is_body() {
        // a bare "--b" cut off by EOF is not a boundary
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\
            \r\n\
            x\r\n\
            --b";
        let (splitter, events) = split(message);
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Body { value, .. } if value == b"\r\n--b"
        )));
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn headers_without_blank_line_still_announced() {
        let (splitter, events) = split(b"Subject: cut off\r\n");
        assert_eq!(1, events.len());
        match &events[0] {
            Event::Node(id) => assert_eq!(
                "cut off",
                splitter.node(*id).headers().unwrap().get_first("subject")
            ),
            other => panic!("expected node event, got {:?}", other),
        }
        assert_eq!(
            b"Subject: cut off\r\n".to_vec(),
            join(&splitter, &events)
        );
    }

    #[test]
    fn empty_input_produces_no_events() {
        let (_, events) = split(b"");
        assert!(events.is_empty());
    }

    #[test]
    fn head_size_guard() {
        let mut splitter = MessageSplitter::with_config(SplitterConfig {
            max_head_size: 5,
            ..SplitterConfig::default()
        });
        assert!(matches!(
            splitter.push(b"Subject: test\r\n\r\n"),
            Err(Error::HeaderSizeExceeded)
        ));
        assert!(splitter.next_event().is_none(), "no partial event");
        assert!(matches!(
            splitter.finish(),
            Err(Error::HeaderSizeExceeded)
        ));
    }

    #[test]
    fn node_count_guard() {
        let mut splitter = MessageSplitter::with_config(SplitterConfig {
            max_child_nodes: 2,
            ..SplitterConfig::default()
        });
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
            \r\n\
            --b\r\n\r\none\r\n\
            --b\r\n\r\ntwo\r\n\
            --b\r\n\r\nthree\r\n\
            --b--\r\n";
        assert!(matches!(
            splitter.push(message),
            Err(Error::NodeCountExceeded)
        ));
        // events for the part of the message before the guard tripped are
        // still there
        assert!(splitter.next_event().is_some());
    }

    #[test]
    fn single_byte_chunking_round_trips() {
        let mut splitter = MessageSplitter::new();
        for byte in NESTED {
            splitter.push(std::slice::from_ref(byte)).unwrap();
        }
        splitter.finish().unwrap();

        let mut events = Vec::new();
        while let Some(ev) = splitter.next_event() {
            events.push(ev);
        }
        assert_eq!(NESTED.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn lf_only_message_round_trips() {
        let message = b"Content-Type: multipart/mixed; boundary=b\n\
            \n\
            --b\n\
            Content-Type: text/plain\n\
            \n\
            unix endings\n\
            --b--\n";
        let (splitter, events) = split(message);
        assert!(events.iter().any(|ev| matches!(
            ev,
            Event::Body { value, .. } if value == b"unix endings"
        )));
        assert_eq!(message.to_vec(), join(&splitter, &events));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SplitterConfig =
            serde_json::from_str(r#"{"max_child_nodes": 5}"#).unwrap();
        assert_eq!(5, config.max_child_nodes);
        assert_eq!(1024 * 1024, config.max_head_size);
        assert!(!config.ignore_embedded);
        assert!(config.default_inline_embedded);
    }
}
