// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace format and I/O errors

use thiserror::Error;

use super::Kind;

/// A list of possible errors while writing or reading a trace
///
/// Reading errors carry the index of the offending action so a broken
/// trace can be located; the replayer treats every one of them as fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying reader or writer failed. On the recording side this
    /// aborts the capture immediately, a truncated trace is unreplayable.
    #[error("trace i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not open with the trace magic value
    #[error("bad magic value {0:02x?}")]
    BadMagic([u8; 8]),
    /// The file's format version does not match exactly
    #[error("unsupported format version {0}")]
    BadVersion(u16),
    /// The first two actions are not stream-start and stream-info
    #[error("action {index}: expected the stream preamble")]
    MissingPreamble { index: usize },
    /// An action kind tag outside the known set
    #[error("action {index}: unknown action kind {kind:#x}")]
    UnknownKind { index: usize, kind: u32 },
    /// The stream ended inside an action
    #[error("action {index}: truncated payload")]
    Truncated {
        index: usize,
        kind: Option<Kind>,
    },
    /// The stream-info compression mode is unknown or was not built in
    #[error("unsupported compression mode {0}")]
    UnsupportedCompression(u32),
    /// A compressed page did not inflate to exactly one page
    #[error("action {index}: page payload of {size} bytes is not a page")]
    BadPageSize { index: usize, size: usize },
    /// A compressed page failed to decompress
    #[error("action {index}: page decompression failed")]
    Decompress { index: usize },
}
