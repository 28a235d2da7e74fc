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

use std::io;

use thiserror::Error;

/// Errors surfaced by the splitting/joining/rewriting pipeline.
///
/// Malformed mail is generally *not* an error; the splitter degrades
/// gracefully (truncated multiparts, missing blank lines, bogus header
/// values). The only fatal parse conditions are the two resource guards,
/// which exist to stop boundary bombs and unbounded header accumulation.
#[derive(Error, Debug)]
pub enum Error {
    /// A single node accumulated more header bytes than the configured
    /// `max_head_size`.
    #[error("Header block exceeds configured size limit")]
    HeaderSizeExceeded,
    /// The message declared more structural nodes than the configured
    /// `max_child_nodes`.
    #[error("Too many MIME nodes in message")]
    NodeCountExceeded,
    /// A rewrite callback reported failure; the pipeline is aborted.
    #[error("Node rewrite failed: {0}")]
    Rewrite(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
