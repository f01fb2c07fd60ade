// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Replay errors
//!
//! Every error is fatal. Partial replay against live hardware state
//! cannot be resumed safely, so the replayer stops at the first
//! inconsistency and reports the offending action.

use thiserror::Error;

use crate::trace::{self, Kind};

/// A list of possible errors during replay
#[derive(Debug, Error)]
pub enum Error<E: std::error::Error + 'static> {
    /// The trace itself is malformed
    #[error("trace error: {0}")]
    Trace(#[from] trace::Error),
    /// An action references an id no earlier action created
    #[error("action {index} ({kind:?}): unknown {entity} id {id}")]
    UnknownId {
        index: usize,
        kind: Kind,
        entity: &'static str,
        id: u32,
    },
    /// A preamble action appeared in the middle of the stream
    #[error("action {index}: stray stream preamble")]
    StrayPreamble { index: usize },
    /// A gather lies outside its backing buffer's content
    #[error("action {index}: gather outside buffer {buffer}")]
    BadGather { index: usize, buffer: u32 },
    /// A load-data page lies outside its buffer's size
    #[error("action {index}: page load outside buffer {buffer}")]
    BadLoad { index: usize, buffer: u32 },
    /// The live driver rejected an operation
    #[error("driver failure: {0}")]
    Driver(#[source] E),
}
