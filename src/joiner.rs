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

//! Reassembly of a split message.
//!
//! The joiner is deliberately dumb: it serializes events in the exact order
//! given and never reorders or inspects them. For an unmodified event
//! sequence the output equals the original input; whatever a rewriter
//! changed comes out changed, everything else byte-identical.

use std::io::Write;

use crate::error::Error;
use crate::node::NodeArena;
use crate::splitter::Event;

/// Writes split events back out as a message.
pub struct MessageJoiner<W> {
    out: W,
}

impl<W: Write> MessageJoiner<W> {
    pub fn new(out: W) -> Self {
        MessageJoiner { out }
    }

    /// Serializes one event: the (possibly rebuilt) head block for `Node`,
    /// the carried bytes for `Data` and `Body`.
    pub fn feed(&mut self, arena: &NodeArena, event: &Event) -> Result<(), Error> {
        match event {
            Event::Node(id) => {
                self.out.write_all(&arena.get(*id).build_headers(None))?
            },
            Event::Data { value, .. } | Event::Body { value, .. } => {
                self.out.write_all(value)?
            },
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Splits `message` and joins it straight back: the identity transform, and
/// a convenient smoke test for a message surviving the pipeline.
pub fn round_trip(message: &[u8]) -> Result<Vec<u8>, Error> {
    use crate::splitter::MessageSplitter;

    let mut splitter = MessageSplitter::new();
    splitter.push(message)?;
    splitter.finish()?;

    let mut joiner = MessageJoiner::new(Vec::new());
    while let Some(event) = splitter.next_event() {
        joiner.feed(splitter.arena(), &event)?;
    }
    Ok(joiner.into_inner())
}
