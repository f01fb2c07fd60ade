// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Interception errors

use thiserror::Error;

use crate::trace;

/// A list of possible errors while shadowing intercepted calls
///
/// [`Io`][Self::Io] carries the failure of the delegated real system call
/// and is meant to be forwarded to the intercepted application as errno.
/// Every other variant is fatal: the shadow state no longer matches what
/// the kernel saw and the wrapper cannot stay transparent.
#[derive(Debug, Error)]
pub enum Error {
    /// The delegated system call failed
    #[error("system call failed: {0}")]
    Io(#[from] std::io::Error),
    /// Recording to the trace file failed
    #[error("trace recording failed: {0}")]
    Trace(#[from] trace::Error),
    /// A submitted job references a buffer object that was never tracked.
    /// The observed command stream is internally inconsistent.
    #[error("unknown buffer object {0} referenced by submission")]
    UnknownHandle(u32),
    /// Submit data arrived on a channel without an open job
    #[error("submit data without an open job")]
    NoOpenJob,
    /// A submit stream delivered a partial record
    #[error("malformed {0} record in submit stream")]
    MalformedRecord(&'static str),
}
