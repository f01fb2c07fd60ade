// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Live driver interface
//!
//! The replayer reconstructs traced state against a [`Driver`]. The
//! production implementation talks to a real kernel driver instance; tests
//! substitute a recording fake. References returned by the driver are
//! opaque, the replayer maps trace ids onto them.

use tracing::debug;

use crate::trace::Engine;

/// Driver-side context reference
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextRef(pub u64);

/// Driver-side buffer-object reference
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferRef(pub u64);

/// Driver-side channel reference
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelRef(pub u64);

/// Completion condition of a submitted job
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fence {
    pub syncpt_id: u32,
    pub threshold: u32,
}

/// Bound on a completion wait
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Give up after this many milliseconds
    Millis(u32),
    /// Wait indefinitely
    Forever,
}

impl Default for Wait {
    fn default() -> Self {
        Self::Forever
    }
}

/// A gather with relocations already patched in, ready for submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedGather {
    /// Driver-side buffer the stream originates from
    pub buffer: BufferRef,
    /// Byte offset of the stream within that buffer
    pub offset: u32,
    /// The stream's words with relocation targets resolved
    pub words: Vec<u32>,
}

/// A live driver connection
pub trait Driver {
    type Error: std::error::Error + 'static;

    fn create_context(&mut self, flags: u32) -> Result<ContextRef, Self::Error>;
    fn destroy_context(&mut self, context: ContextRef) -> Result<(), Self::Error>;

    /// Allocate a buffer object, returning its reference and bus address
    fn create_buffer(&mut self, size: u32, flags: u32) -> Result<(BufferRef, u32), Self::Error>;
    fn destroy_buffer(&mut self, buffer: BufferRef) -> Result<(), Self::Error>;
    /// Load one page of content at its page offset
    fn load_buffer(&mut self, buffer: BufferRef, page: u32, data: &[u8])
        -> Result<(), Self::Error>;

    fn open_channel(&mut self, engine: Engine) -> Result<ChannelRef, Self::Error>;
    fn close_channel(&mut self, channel: ChannelRef) -> Result<(), Self::Error>;

    /// Submit a job, returning the fence signalling its completion
    fn submit(
        &mut self,
        channel: ChannelRef,
        gathers: &[PreparedGather],
        syncpt_incrs: u32,
    ) -> Result<Fence, Self::Error>;

    /// Wait until `fence` is reached, bounded by `wait`
    fn wait(&mut self, fence: Fence, wait: Wait) -> Result<(), Self::Error>;
}

/// A traced framebuffer as handed to the display back end
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Framebuffer {
    /// Trace id of the backing buffer object
    pub buffer: u32,
    pub width: u16,
    pub height: u16,
    pub pitch: u32,
    pub format: u32,
    pub flags: u32,
}

/// Display back end
pub trait Present {
    /// Scan out `framebuffer`
    fn display(&mut self, framebuffer: &Framebuffer);
}

/// Default no-op display back end
#[derive(Copy, Clone, Debug, Default)]
pub struct NoPresent;

impl Present for NoPresent {
    fn display(&mut self, framebuffer: &Framebuffer) {
        debug!(buffer = framebuffer.buffer, "display suppressed, no back end");
    }
}
