// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Recognized ioctl requests and their argument layouts
//!
//! Argument structures are decoded field by field from the raw argument
//! memory, never transmuted, so a short or garbled argument degrades into
//! a logged pass-through instead of undefined behavior. All fields are
//! little-endian 32-bit words, matching the kernel ABI of the driver.

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << 30) | ((size as u32 & 0x3fff) << 16) | ((ty as u32) << 8) | nr as u32
}

const fn io(ty: u8, nr: u8) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

const fn ior(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_READ, ty, nr, size)
}

const fn iow(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_WRITE, ty, nr, size)
}

const fn iowr(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size)
}

/// ioctl magic of the buffer-object allocator device
pub const NVMAP_MAGIC: u8 = b'N';
/// ioctl magic of the channel and control devices
pub const NVHOST_MAGIC: u8 = b'H';

pub const NVMAP_IOC_CREATE: u32 = iowr(NVMAP_MAGIC, 0, 8);
pub const NVMAP_IOC_CLAIM: u32 = iowr(NVMAP_MAGIC, 1, 8);
pub const NVMAP_IOC_FROM_ID: u32 = iowr(NVMAP_MAGIC, 2, 8);
pub const NVMAP_IOC_ALLOC: u32 = iow(NVMAP_MAGIC, 3, 16);
pub const NVMAP_IOC_FREE: u32 = io(NVMAP_MAGIC, 4);
pub const NVMAP_IOC_MMAP: u32 = iowr(NVMAP_MAGIC, 5, 16);
pub const NVMAP_IOC_WRITE: u32 = iow(NVMAP_MAGIC, 6, 28);
pub const NVMAP_IOC_READ: u32 = iow(NVMAP_MAGIC, 7, 28);
pub const NVMAP_IOC_PARAM: u32 = iowr(NVMAP_MAGIC, 8, 12);
pub const NVMAP_IOC_PIN: u32 = iowr(NVMAP_MAGIC, 10, 12);
pub const NVMAP_IOC_UNPIN: u32 = iow(NVMAP_MAGIC, 11, 12);
pub const NVMAP_IOC_CACHE: u32 = iow(NVMAP_MAGIC, 12, 16);
pub const NVMAP_IOC_GET_ID: u32 = iowr(NVMAP_MAGIC, 13, 8);

pub const NVHOST_IOC_CHANNEL_FLUSH: u32 = ior(NVHOST_MAGIC, 1, 4);
pub const NVHOST_IOC_CHANNEL_GET_SYNCPOINTS: u32 = ior(NVHOST_MAGIC, 2, 4);
pub const NVHOST_IOC_CHANNEL_GET_WAITBASES: u32 = ior(NVHOST_MAGIC, 3, 4);
pub const NVHOST_IOC_CHANNEL_GET_MODMUTEXES: u32 = ior(NVHOST_MAGIC, 4, 4);
pub const NVHOST_IOC_CHANNEL_SET_NVMAP_FD: u32 = iow(NVHOST_MAGIC, 5, 4);
pub const NVHOST_IOC_CHANNEL_NULL_KICKOFF: u32 = ior(NVHOST_MAGIC, 6, 4);
pub const NVHOST_IOC_CHANNEL_SUBMIT: u32 = iow(NVHOST_MAGIC, 8, 28);
pub const NVHOST_IOC_CHANNEL_GET_TIMEDOUT: u32 = ior(NVHOST_MAGIC, 12, 4);
pub const NVHOST_IOC_CHANNEL_SET_PRIORITY: u32 = iow(NVHOST_MAGIC, 13, 4);

pub const NVHOST_IOC_CTRL_SYNCPT_READ: u32 = iowr(NVHOST_MAGIC, 0x41, 8);
pub const NVHOST_IOC_CTRL_SYNCPT_INCR: u32 = iow(NVHOST_MAGIC, 0x42, 4);
pub const NVHOST_IOC_CTRL_SYNCPT_WAIT: u32 = iow(NVHOST_MAGIC, 0x43, 12);
pub const NVHOST_IOC_CTRL_SYNCPT_WAITEX: u32 = iowr(NVHOST_MAGIC, 0x44, 16);
pub const NVHOST_IOC_CTRL_GET_VERSION: u32 = ior(NVHOST_MAGIC, 0x45, 4);

/// Read the little-endian word at field position `index`
pub fn field(arg: &[u8], index: usize) -> Option<u32> {
    let bytes = arg.get(index * 4..index * 4 + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Argument of the create, claim, from-id and get-id requests
///
/// On entry the first word carries the size (create) or foreign id; on
/// exit the kernel fills the handle word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HandleArg {
    pub param: u32,
    pub handle: u32,
}

impl HandleArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            param: field(arg, 0)?,
            handle: field(arg, 1)?,
        })
    }
}

/// Argument of the alloc request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocArg {
    pub handle: u32,
    pub heap_mask: u32,
    pub flags: u32,
    pub align: u32,
}

impl AllocArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            handle: field(arg, 0)?,
            heap_mask: field(arg, 1)?,
            flags: field(arg, 2)?,
            align: field(arg, 3)?,
        })
    }
}

/// Argument of the mmap request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MmapArg {
    pub handle: u32,
    pub offset: u32,
    pub length: u32,
    pub flags: u32,
}

impl MmapArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            handle: field(arg, 0)?,
            offset: field(arg, 1)?,
            length: field(arg, 2)?,
            flags: field(arg, 3)?,
        })
    }
}

/// Argument of the strided write and read requests
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RwArg {
    /// Application-side buffer address
    pub addr: u32,
    pub handle: u32,
    /// Byte offset into the buffer object
    pub offset: u32,
    pub elem_size: u32,
    pub handle_stride: u32,
    pub user_stride: u32,
    pub count: u32,
}

impl RwArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            addr: field(arg, 0)?,
            handle: field(arg, 1)?,
            offset: field(arg, 2)?,
            elem_size: field(arg, 3)?,
            handle_stride: field(arg, 4)?,
            user_stride: field(arg, 5)?,
            count: field(arg, 6)?,
        })
    }
}

/// Argument of the param request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamArg {
    pub handle: u32,
    pub param: u32,
    pub result: u32,
}

impl ParamArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            handle: field(arg, 0)?,
            param: field(arg, 1)?,
            result: field(arg, 2)?,
        })
    }
}

/// Argument of the pin and unpin requests
///
/// Both pointers live in application memory; the kernel fills the address
/// array on pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PinArg {
    pub count: u32,
    pub handles_ptr: u32,
    pub addrs_ptr: u32,
}

impl PinArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            count: field(arg, 0)?,
            handles_ptr: field(arg, 1)?,
            addrs_ptr: field(arg, 2)?,
        })
    }
}

/// Argument of the channel submit request
///
/// Declares the record counts the following `write` calls deliver. The
/// relocation-shift stream exists from submit protocol version 2 on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SubmitArg {
    pub syncpt_id: u32,
    pub syncpt_incrs: u32,
    pub num_cmdbufs: u32,
    pub num_relocs: u32,
    pub version: u32,
    pub num_waitchks: u32,
    pub waitchk_mask: u32,
}

impl SubmitArg {
    pub fn decode(arg: &[u8]) -> Option<Self> {
        Some(Self {
            syncpt_id: field(arg, 0)?,
            syncpt_incrs: field(arg, 1)?,
            num_cmdbufs: field(arg, 2)?,
            num_relocs: field(arg, 3)?,
            version: field(arg, 4)?,
            num_waitchks: field(arg, 5)?,
            waitchk_mask: field(arg, 6)?,
        })
    }
}

/// One command-buffer descriptor of the submit write stream, 12 bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CmdBuf {
    pub mem: u32,
    pub offset: u32,
    pub words: u32,
}

impl CmdBuf {
    pub const SIZE: usize = 12;

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            mem: field(bytes, 0)?,
            offset: field(bytes, 1)?,
            words: field(bytes, 2)?,
        })
    }
}

/// One relocation of the submit write stream, 16 bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reloc {
    pub cmdbuf_mem: u32,
    pub cmdbuf_offset: u32,
    pub target_mem: u32,
    pub target_offset: u32,
}

impl Reloc {
    pub const SIZE: usize = 16;

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            cmdbuf_mem: field(bytes, 0)?,
            cmdbuf_offset: field(bytes, 1)?,
            target_mem: field(bytes, 2)?,
            target_offset: field(bytes, 3)?,
        })
    }
}

/// One wait-check of the submit write stream, 16 bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaitChk {
    pub mem: u32,
    pub offset: u32,
    pub syncpt_id: u32,
    pub thresh: u32,
}

impl WaitChk {
    pub const SIZE: usize = 16;

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            mem: field(bytes, 0)?,
            offset: field(bytes, 1)?,
            syncpt_id: field(bytes, 2)?,
            thresh: field(bytes, 3)?,
        })
    }
}

/// Symbolic name of a recognized request, for logging
pub fn request_name(request: u32) -> Option<&'static str> {
    Some(match request {
        NVMAP_IOC_CREATE => "NVMAP_IOC_CREATE",
        NVMAP_IOC_CLAIM => "NVMAP_IOC_CLAIM",
        NVMAP_IOC_FROM_ID => "NVMAP_IOC_FROM_ID",
        NVMAP_IOC_ALLOC => "NVMAP_IOC_ALLOC",
        NVMAP_IOC_FREE => "NVMAP_IOC_FREE",
        NVMAP_IOC_MMAP => "NVMAP_IOC_MMAP",
        NVMAP_IOC_WRITE => "NVMAP_IOC_WRITE",
        NVMAP_IOC_READ => "NVMAP_IOC_READ",
        NVMAP_IOC_PARAM => "NVMAP_IOC_PARAM",
        NVMAP_IOC_PIN => "NVMAP_IOC_PIN",
        NVMAP_IOC_UNPIN => "NVMAP_IOC_UNPIN",
        NVMAP_IOC_CACHE => "NVMAP_IOC_CACHE",
        NVMAP_IOC_GET_ID => "NVMAP_IOC_GET_ID",
        NVHOST_IOC_CHANNEL_FLUSH => "NVHOST_IOC_CHANNEL_FLUSH",
        NVHOST_IOC_CHANNEL_GET_SYNCPOINTS => "NVHOST_IOC_CHANNEL_GET_SYNCPOINTS",
        NVHOST_IOC_CHANNEL_GET_WAITBASES => "NVHOST_IOC_CHANNEL_GET_WAITBASES",
        NVHOST_IOC_CHANNEL_GET_MODMUTEXES => "NVHOST_IOC_CHANNEL_GET_MODMUTEXES",
        NVHOST_IOC_CHANNEL_SET_NVMAP_FD => "NVHOST_IOC_CHANNEL_SET_NVMAP_FD",
        NVHOST_IOC_CHANNEL_NULL_KICKOFF => "NVHOST_IOC_CHANNEL_NULL_KICKOFF",
        NVHOST_IOC_CHANNEL_SUBMIT => "NVHOST_IOC_CHANNEL_SUBMIT",
        NVHOST_IOC_CHANNEL_GET_TIMEDOUT => "NVHOST_IOC_CHANNEL_GET_TIMEDOUT",
        NVHOST_IOC_CHANNEL_SET_PRIORITY => "NVHOST_IOC_CHANNEL_SET_PRIORITY",
        NVHOST_IOC_CTRL_SYNCPT_READ => "NVHOST_IOC_CTRL_SYNCPT_READ",
        NVHOST_IOC_CTRL_SYNCPT_INCR => "NVHOST_IOC_CTRL_SYNCPT_INCR",
        NVHOST_IOC_CTRL_SYNCPT_WAIT => "NVHOST_IOC_CTRL_SYNCPT_WAIT",
        NVHOST_IOC_CTRL_SYNCPT_WAITEX => "NVHOST_IOC_CTRL_SYNCPT_WAITEX",
        NVHOST_IOC_CTRL_GET_VERSION => "NVHOST_IOC_CTRL_GET_VERSION",
        _ => return None,
    })
}
