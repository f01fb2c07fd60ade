// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace actions and their wire encoding
//!
//! All integers are little-endian and packed without implicit padding.
//! Variable-size content only ever appears as an explicit raw block behind
//! a fixed header: the page bytes of a load-data action and the gather and
//! relocation records trailing a job submission.

use super::{compress, Compression, MAGIC, PAGE_SIZE, VERSION};

/// Action kind tags
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Kind {
    StreamStart = 1,
    StreamInfo = 2,
    ContextCreate = 3,
    ContextDestroy = 4,
    BufferCreate = 5,
    BufferDestroy = 6,
    BufferLoadData = 7,
    BufferSetFlags = 8,
    FramebufferAdd = 9,
    FramebufferDelete = 10,
    FramebufferDisplay = 11,
    JobContextCreate = 12,
    JobContextDestroy = 13,
    JobSubmit = 14,
}

impl Kind {
    /// Decode a kind tag
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::StreamStart),
            2 => Some(Self::StreamInfo),
            3 => Some(Self::ContextCreate),
            4 => Some(Self::ContextDestroy),
            5 => Some(Self::BufferCreate),
            6 => Some(Self::BufferDestroy),
            7 => Some(Self::BufferLoadData),
            8 => Some(Self::BufferSetFlags),
            9 => Some(Self::FramebufferAdd),
            10 => Some(Self::FramebufferDelete),
            11 => Some(Self::FramebufferDisplay),
            12 => Some(Self::JobContextCreate),
            13 => Some(Self::JobContextDestroy),
            14 => Some(Self::JobSubmit),
            _ => None,
        }
    }
}

/// Submission target engine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Engine {
    Gr2d = 0,
    Gr3d = 1,
}

impl Engine {
    /// Decode an engine selector field
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Gr2d),
            1 => Some(Self::Gr3d),
            _ => None,
        }
    }
}

/// One command-buffer reference of a submitted job, 12 bytes on the wire
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GatherRecord {
    /// Backing buffer id
    pub buffer: u32,
    /// Byte offset of the sub-stream within the buffer
    pub offset: u32,
    /// Sub-stream length in words
    pub words: u32,
}

/// One relocation of a submitted job, 20 bytes on the wire
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RelocRecord {
    /// Buffer holding the word to patch
    pub cmdbuf: u32,
    /// Byte offset of the word to patch
    pub cmdbuf_offset: u32,
    /// Buffer whose address is patched in
    pub target: u32,
    /// Byte offset added to the target address
    pub target_offset: u32,
    /// Right shift applied to the patched address
    pub shift: u32,
}

/// The atomic unit of the on-disk log
///
/// Load-data payloads always describe exactly one uncompressed page here;
/// compression is applied at encoding time and undone by the
/// [`Reader`][super::Reader].
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    StreamStart {
        magic: [u8; 8],
        version: u16,
    },
    StreamInfo {
        family: u32,
        compression: u32,
    },
    ContextCreate {
        id: u32,
        flags: u32,
    },
    ContextDestroy {
        id: u32,
    },
    BufferCreate {
        id: u32,
        context: u32,
        size: u32,
        flags: u32,
    },
    BufferDestroy {
        id: u32,
    },
    BufferLoadData {
        id: u32,
        page: u32,
        data: Vec<u8>,
    },
    BufferSetFlags {
        id: u32,
        flags: u32,
    },
    FramebufferAdd {
        id: u32,
        width: u16,
        height: u16,
        pitch: u32,
        format: u32,
        flags: u32,
    },
    FramebufferDelete {
        id: u32,
    },
    FramebufferDisplay {
        id: u32,
    },
    JobContextCreate {
        id: u32,
        context: u32,
        engine: Engine,
    },
    JobContextDestroy {
        id: u32,
    },
    JobSubmit {
        job_context: u32,
        syncpt_id: u32,
        syncpt_incrs: u32,
        gathers: Vec<GatherRecord>,
        relocs: Vec<RelocRecord>,
    },
}

impl Action {
    /// The stream-start preamble action of this implementation
    pub fn stream_start() -> Self {
        Self::StreamStart {
            magic: MAGIC,
            version: VERSION,
        }
    }

    /// This action's kind tag
    pub fn kind(&self) -> Kind {
        match self {
            Self::StreamStart { .. } => Kind::StreamStart,
            Self::StreamInfo { .. } => Kind::StreamInfo,
            Self::ContextCreate { .. } => Kind::ContextCreate,
            Self::ContextDestroy { .. } => Kind::ContextDestroy,
            Self::BufferCreate { .. } => Kind::BufferCreate,
            Self::BufferDestroy { .. } => Kind::BufferDestroy,
            Self::BufferLoadData { .. } => Kind::BufferLoadData,
            Self::BufferSetFlags { .. } => Kind::BufferSetFlags,
            Self::FramebufferAdd { .. } => Kind::FramebufferAdd,
            Self::FramebufferDelete { .. } => Kind::FramebufferDelete,
            Self::FramebufferDisplay { .. } => Kind::FramebufferDisplay,
            Self::JobContextCreate { .. } => Kind::JobContextCreate,
            Self::JobContextDestroy { .. } => Kind::JobContextDestroy,
            Self::JobSubmit { .. } => Kind::JobSubmit,
        }
    }

    /// Serialize the action, compressing page data with `mode`
    ///
    /// A load-data block is stored compressed only if that makes it
    /// smaller than a literal page; a `data_size` of zero on the wire
    /// means exactly [`PAGE_SIZE`] literal bytes follow.
    pub fn encode(&self, mode: Compression, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.kind() as u32).to_le_bytes());
        match self {
            Self::StreamStart { magic, version } => {
                out.extend_from_slice(magic);
                out.extend_from_slice(&version.to_le_bytes());
            }
            Self::StreamInfo {
                family,
                compression,
            } => {
                put_u32(out, *family);
                put_u32(out, *compression);
            }
            Self::ContextCreate { id, flags } => {
                put_u32(out, *id);
                put_u32(out, *flags);
            }
            Self::ContextDestroy { id }
            | Self::BufferDestroy { id }
            | Self::FramebufferDelete { id }
            | Self::FramebufferDisplay { id }
            | Self::JobContextDestroy { id } => put_u32(out, *id),
            Self::BufferCreate {
                id,
                context,
                size,
                flags,
            } => {
                put_u32(out, *id);
                put_u32(out, *context);
                put_u32(out, *size);
                put_u32(out, *flags);
            }
            Self::BufferLoadData { id, page, data } => {
                debug_assert_eq!(data.len(), PAGE_SIZE);
                put_u32(out, *id);
                put_u32(out, *page);
                match compress::compress(mode, data) {
                    Some(packed) => {
                        put_u32(out, packed.len() as u32);
                        out.extend_from_slice(&packed);
                    }
                    None => {
                        put_u32(out, 0);
                        out.extend_from_slice(data);
                    }
                }
            }
            Self::BufferSetFlags { id, flags } => {
                put_u32(out, *id);
                put_u32(out, *flags);
            }
            Self::FramebufferAdd {
                id,
                width,
                height,
                pitch,
                format,
                flags,
            } => {
                put_u32(out, *id);
                out.extend_from_slice(&width.to_le_bytes());
                out.extend_from_slice(&height.to_le_bytes());
                put_u32(out, *pitch);
                put_u32(out, *format);
                put_u32(out, *flags);
            }
            Self::JobContextCreate {
                id,
                context,
                engine,
            } => {
                put_u32(out, *id);
                put_u32(out, *context);
                put_u32(out, *engine as u32);
            }
            Self::JobSubmit {
                job_context,
                syncpt_id,
                syncpt_incrs,
                gathers,
                relocs,
            } => {
                put_u32(out, *job_context);
                put_u32(out, *syncpt_id);
                put_u32(out, *syncpt_incrs);
                put_u32(out, gathers.len() as u32);
                put_u32(out, relocs.len() as u32);
                for gather in gathers {
                    put_u32(out, gather.buffer);
                    put_u32(out, gather.offset);
                    put_u32(out, gather.words);
                }
                for reloc in relocs {
                    put_u32(out, reloc.cmdbuf);
                    put_u32(out, reloc.cmdbuf_offset);
                    put_u32(out, reloc.target);
                    put_u32(out, reloc.target_offset);
                    put_u32(out, reloc.shift);
                }
            }
        }
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
