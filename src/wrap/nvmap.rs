// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Buffer-object allocator device shadow
//!
//! Tracks the lifecycle of kernel buffer objects: handle creation,
//! allocation parameters, host-visible mappings and raw data writes.
//! Application bytes written through the strided write request are copied
//! into the handle's shadow buffer so they survive without a live mapping.

use std::io::Write;

use tracing::{debug, warn};

use super::ioctl::{self, AllocArg, HandleArg, MmapArg, ParamArg, PinArg, RwArg};
use super::syscall::SysApi;
use super::{BufferHandle, Error, HookCtx};

/// Buffer size query of the param request
const PARAM_SIZE: u32 = 1;

/// Shadow state of one open allocator descriptor
#[derive(Debug)]
pub struct NvmapShadow {
    /// Trace context id this descriptor records under
    context: u32,
    /// Handles created through this descriptor, in creation order
    owned: Vec<u32>,
}

impl NvmapShadow {
    pub fn new(context: u32) -> Self {
        Self {
            context,
            owned: Vec::new(),
        }
    }

    /// Trace context id of this descriptor
    pub fn context(&self) -> u32 {
        self.context
    }

    /// Handles created through this descriptor
    pub fn owned(&self) -> &[u32] {
        &self.owned
    }

    /// Inspect a completed allocator ioctl
    pub(crate) fn leave_ioctl<S: SysApi, W: Write>(
        &mut self,
        ctx: &mut HookCtx<'_, S, W>,
        request: u32,
        arg: &[u8],
    ) -> Result<(), Error> {
        match request {
            ioctl::NVMAP_IOC_CREATE => {
                let Some(arg) = HandleArg::decode(arg) else {
                    return Self::garbled("create", arg);
                };
                self.track(ctx, arg.handle, arg.param)?;
            }
            ioctl::NVMAP_IOC_CLAIM | ioctl::NVMAP_IOC_FROM_ID => {
                let Some(arg) = HandleArg::decode(arg) else {
                    return Self::garbled("claim", arg);
                };
                // the foreign id does not tell us the size yet
                self.track(ctx, arg.handle, 0)?;
            }
            ioctl::NVMAP_IOC_ALLOC => {
                let Some(arg) = AllocArg::decode(arg) else {
                    return Self::garbled("alloc", arg);
                };
                if let Some(handle) = ctx.handles.get_mut(&arg.handle) {
                    handle.allocated(arg.heap_mask, arg.flags, arg.align);
                    debug!(
                        handle = arg.handle,
                        heap_mask = %format_args!("{:#x}", arg.heap_mask),
                        flags = arg.flags,
                        align = arg.align,
                        "buffer allocated",
                    );
                } else {
                    warn!(handle = arg.handle, "alloc for untracked handle");
                }
            }
            ioctl::NVMAP_IOC_FREE => {
                let Some(id) = ioctl::field(arg, 0) else {
                    return Self::garbled("free", arg);
                };
                if ctx.handles.remove(&id).is_some() {
                    self.owned.retain(|&owned| owned != id);
                    ctx.recorder.buffer_destroyed(id)?;
                } else {
                    warn!(handle = id, "free for untracked handle");
                }
            }
            ioctl::NVMAP_IOC_MMAP => {
                let Some(arg) = MmapArg::decode(arg) else {
                    return Self::garbled("mmap", arg);
                };
                if let Some(handle) = ctx.handles.get_mut(&arg.handle) {
                    handle.mmap_offset = Some(arg.offset);
                    debug!(handle = arg.handle, offset = arg.offset, "mapping prepared");
                }
            }
            ioctl::NVMAP_IOC_WRITE => {
                let Some(arg) = RwArg::decode(arg) else {
                    return Self::garbled("write", arg);
                };
                if ctx.handles.contains_key(&arg.handle) {
                    Self::shadow_write(ctx, &arg);
                } else {
                    warn!(handle = arg.handle, "write to untracked handle");
                }
            }
            ioctl::NVMAP_IOC_READ => {
                debug!("buffer read-back");
            }
            ioctl::NVMAP_IOC_PARAM => {
                let Some(arg) = ParamArg::decode(arg) else {
                    return Self::garbled("param", arg);
                };
                if arg.param == PARAM_SIZE {
                    if let Some(handle) = ctx.handles.get_mut(&arg.handle) {
                        if handle.size == 0 {
                            handle.resize(arg.result);
                        }
                    }
                }
            }
            ioctl::NVMAP_IOC_PIN => {
                let Some(arg) = PinArg::decode(arg) else {
                    return Self::garbled("pin", arg);
                };
                Self::pinned(ctx, &arg);
            }
            ioctl::NVMAP_IOC_UNPIN => {
                debug!("buffers unpinned");
            }
            ioctl::NVMAP_IOC_CACHE => {
                debug!("cache maintenance");
            }
            ioctl::NVMAP_IOC_GET_ID => {
                debug!("global id queried");
            }
            _ => {
                warn!(request = %format_args!("{request:#010x}"), "unknown allocator ioctl");
            }
        }
        Ok(())
    }

    /// Record a fresh handle under this descriptor's context
    fn track<S: SysApi, W: Write>(
        &mut self,
        ctx: &mut HookCtx<'_, S, W>,
        id: u32,
        size: u32,
    ) -> Result<(), Error> {
        debug!(handle = id, size, "buffer created");
        ctx.handles.insert(id, BufferHandle::new(id, size));
        self.owned.push(id);
        ctx.recorder.buffer_created(id, self.context, size, 0)?;
        Ok(())
    }

    /// Copy strided application bytes into the shadow buffer
    fn shadow_write<S: SysApi, W: Write>(ctx: &mut HookCtx<'_, S, W>, arg: &RwArg) {
        let elem = arg.elem_size as usize;
        for index in 0..arg.count as usize {
            let src = arg.addr as usize + index * arg.user_stride as usize;
            let dst = arg.offset as usize + index * arg.handle_stride as usize;
            let Some(bytes) = ctx.sys.read_user(src, elem) else {
                warn!(handle = arg.handle, "write source not readable");
                return;
            };
            if let Some(handle) = ctx.handles.get_mut(&arg.handle) {
                handle.store(dst, &bytes);
            }
        }
    }

    /// Read back the kernel-assigned pin addresses
    fn pinned<S: SysApi, W: Write>(ctx: &mut HookCtx<'_, S, W>, arg: &PinArg) {
        let count = arg.count as usize;
        let Some(ids) = ctx.sys.read_user(arg.handles_ptr as usize, count * 4) else {
            return;
        };
        let Some(addrs) = ctx.sys.read_user(arg.addrs_ptr as usize, count * 4) else {
            return;
        };
        let ids = super::le_words(&ids, 0, count as u32);
        let addrs = super::le_words(&addrs, 0, count as u32);
        for (&id, &addr) in ids.iter().zip(&addrs) {
            if let Some(handle) = ctx.handles.get_mut(&id) {
                handle.pinned = Some(addr);
                debug!(handle = id, addr = %format_args!("{addr:#010x}"), "buffer pinned");
            }
        }
    }

    fn garbled(what: &'static str, arg: &[u8]) -> Result<(), Error> {
        warn!(what, len = arg.len(), "garbled allocator argument");
        Ok(())
    }
}
