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

//! In-place rewriting and observation of selected body parts.
//!
//! Both helpers sit between the splitter and the joiner and work on the
//! event stream. `NodeRewriter` replaces the content of matching leaf parts
//! through a decode/transform/encode cycle; `NodeStreamer` leaves the stream
//! untouched and only feeds an observer the decoded content of matching
//! parts.

use std::collections::VecDeque;

use crate::content_encoding::ContentDecoder;
use crate::error::Error;
use crate::flowed::flowed_decode;
use crate::header::ContentTransferEncoding;
use crate::node::{MimeNode, NodeArena, NodeId};
use crate::splitter::Event;

struct Intercept {
    node: NodeId,
    decoder: ContentDecoder,
    flowed: bool,
    del_sp: bool,
    decoded: Vec<u8>,
}

impl Intercept {
    fn start(node: &MimeNode) -> Self {
        Intercept {
            node: node.id(),
            decoder: node.get_decoder(),
            flowed: node.flowed,
            del_sp: node.del_sp,
            decoded: Vec::new(),
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.decoder.push(chunk, &mut self.decoded);
    }

    fn into_content(mut self) -> Vec<u8> {
        self.decoder.finish(&mut self.decoded);
        if self.flowed {
            flowed_decode(&self.decoded, self.del_sp)
        } else {
            self.decoded
        }
    }
}

/// Rewrites the content of every node accepted by the matcher.
///
/// While a matching node is intercepted, its node event is withheld and its
/// body events are decoded and buffered. The event that ends the part (or
/// the end of the stream) triggers the transform; the node event is emitted
/// only then, so any header changes the transform made are serialized. The
/// re-encoded content follows as a single body event, and only after that is
/// the terminating event itself processed, so it may in turn start the next
/// interception.
///
/// Content already in base64 or quoted-printable is re-encoded the same way.
/// Any other encoding is unsafe to reproduce after an arbitrary transform
/// (the new content may contain boundary lookalikes or 8-bit data), so
/// quoted-printable is substituted and the Content-Transfer-Encoding header
/// rewritten along the way.
pub struct NodeRewriter<M, T> {
    matcher: M,
    transform: T,
    intercept: Option<Intercept>,
    out: VecDeque<Event>,
}

impl<M, T> NodeRewriter<M, T>
where
    M: FnMut(&MimeNode) -> bool,
    T: FnMut(&mut MimeNode, Vec<u8>) -> Result<Vec<u8>, Error>,
{
    pub fn new(matcher: M, transform: T) -> Self {
        NodeRewriter {
            matcher,
            transform,
            intercept: None,
            out: VecDeque::new(),
        }
    }

    /// Feeds one splitter event through the rewriter.
    pub fn process(
        &mut self,
        arena: &mut NodeArena,
        event: Event,
    ) -> Result<(), Error> {
        if self.intercept.is_some() {
            if let Event::Body { ref value, .. } = event {
                self.intercept.as_mut().unwrap().feed(value);
                return Ok(());
            }
            self.complete(arena)?;
        }

        match event {
            Event::Node(id) if (self.matcher)(arena.get(id)) => {
                self.intercept = Some(Intercept::start(arena.get(id)));
            },
            other => self.out.push_back(other),
        }
        Ok(())
    }

    /// Ends the stream, completing an interception still in progress.
    pub fn finish(&mut self, arena: &mut NodeArena) -> Result<(), Error> {
        if self.intercept.is_some() {
            self.complete(arena)?;
        }
        Ok(())
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.out.pop_front()
    }

    fn complete(&mut self, arena: &mut NodeArena) -> Result<(), Error> {
        let intercept = self.intercept.take().unwrap();
        let id = intercept.node;
        let was_flowed = intercept.flowed;
        let content = intercept.into_content();

        let node = arena.get_mut(id);
        if was_flowed {
            // the content is unwrapped now; the headers must say so before
            // they are serialized
            node.clear_flowed();
        }

        let content = (self.transform)(node, content)?;

        let force = if node.encoding.is_rewrite_safe() {
            None
        } else {
            Some(ContentTransferEncoding::QuotedPrintable)
        };
        let mut encoder = node.get_encoder(force);

        self.out.push_back(Event::Node(id));
        let mut encoded = Vec::new();
        encoder.push(&content, &mut encoded);
        encoder.finish(&mut encoded);
        if !encoded.is_empty() {
            self.out.push_back(Event::Body {
                node: id,
                value: encoded,
            });
        }
        Ok(())
    }
}

/// Feeds an observer the decoded content of every node accepted by the
/// matcher, passing all events through unchanged.
///
/// Flowed text is unwrapped for the observer but, unlike with the rewriter,
/// the node itself is left alone since nothing in the stream changes.
pub struct NodeStreamer<M, O> {
    matcher: M,
    observer: O,
    intercept: Option<Intercept>,
    out: VecDeque<Event>,
}

impl<M, O> NodeStreamer<M, O>
where
    M: FnMut(&MimeNode) -> bool,
    O: FnMut(&MimeNode, &[u8]) -> Result<(), Error>,
{
    pub fn new(matcher: M, observer: O) -> Self {
        NodeStreamer {
            matcher,
            observer,
            intercept: None,
            out: VecDeque::new(),
        }
    }

    pub fn process(
        &mut self,
        arena: &NodeArena,
        event: Event,
    ) -> Result<(), Error> {
        if self.intercept.is_some() {
            if let Event::Body { ref value, .. } = event {
                self.intercept.as_mut().unwrap().feed(value);
                self.out.push_back(event);
                return Ok(());
            }
            self.complete(arena)?;
        }

        if let Event::Node(id) = event {
            if (self.matcher)(arena.get(id)) {
                self.intercept = Some(Intercept::start(arena.get(id)));
            }
        }
        self.out.push_back(event);
        Ok(())
    }

    pub fn finish(&mut self, arena: &NodeArena) -> Result<(), Error> {
        if self.intercept.is_some() {
            self.complete(arena)?;
        }
        Ok(())
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.out.pop_front()
    }

    fn complete(&mut self, arena: &NodeArena) -> Result<(), Error> {
        let intercept = self.intercept.take().unwrap();
        let id = intercept.node;
        let content = intercept.into_content();
        (self.observer)(arena.get(id), &content)
    }
}
