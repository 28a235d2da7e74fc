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

//! Streaming MIME/RFC 5322 message surgery.
//!
//! A message of any size is pushed chunk by chunk through a
//! [`MessageSplitter`], which emits structural events: one `Node` per MIME
//! entity head, `Data` for boundaries and other structure, `Body` for leaf
//! content. Feeding the unchanged events to a [`MessageJoiner`] reproduces
//! the input byte for byte, malformed messages included. A
//! [`NodeRewriter`] or [`NodeStreamer`] placed between the two replaces or
//! observes the decoded content of selected parts while everything else
//! streams through untouched.
//!
//! ```
//! use mailsplit::{MessageJoiner, MessageSplitter};
//!
//! # fn main() -> Result<(), mailsplit::Error> {
//! let mut splitter = MessageSplitter::new();
//! splitter.push(b"Subject: hi\r\n\r\nHello!\r\n")?;
//! splitter.finish()?;
//!
//! let mut joiner = MessageJoiner::new(Vec::new());
//! while let Some(event) = splitter.next_event() {
//!     joiner.feed(splitter.arena(), &event)?;
//! }
//! assert_eq!(b"Subject: hi\r\n\r\nHello!\r\n".to_vec(), joiner.into_inner());
//! # Ok(())
//! # }
//! ```

pub mod content_encoding;
pub mod encoded_word;
pub mod error;
pub mod flowed;
pub mod header;
pub mod headers;
pub mod joiner;
pub mod node;
pub mod quoted_printable;
pub mod rewriter;
pub mod splitter;

pub use crate::error::Error;
pub use crate::header::ContentTransferEncoding;
pub use crate::headers::Headers;
pub use crate::joiner::MessageJoiner;
pub use crate::node::{MimeNode, NodeArena, NodeId, PartNumberSegment};
pub use crate::rewriter::{NodeRewriter, NodeStreamer};
pub use crate::splitter::{Event, MessageSplitter, SplitterConfig};
