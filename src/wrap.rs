// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Device-file shadow registry
//!
//! The registry intercepts the file-lifecycle and I/O system calls a
//! graphics client issues against the driver's character devices and
//! maintains a shadow of the kernel state they create: buffer objects,
//! their mappings and contents, and the job a channel is assembling.
//! Calls for descriptors that match no registered device path pass
//! through to the real kernel untouched.
//!
//! The registry is an explicit context object constructed once at process
//! start and threaded through the intercepted entry points; it owns the
//! [recorder][crate::trace::Recorder] and the [`SysApi`] strategy, so no
//! process-wide mutable state is involved.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::os::fd::RawFd;

use bitflags::bitflags;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::trace::{Engine, Recorder, PAGE_SIZE};

pub mod error;
pub mod ioctl;
pub mod syscall;

mod channel;
mod ctrl;
mod nvmap;


pub use channel::{ChannelShadow, Job};
pub use error::Error;
pub use nvmap::NvmapShadow;
pub use syscall::{Passthrough, SysApi};

/// Default device node of the buffer-object allocator
pub const DEV_NVMAP: &str = "/dev/nvmap";
/// Default device node of the 2D engine channel
pub const DEV_GR2D: &str = "/dev/nvhost-gr2d";
/// Default device node of the 3D engine channel
pub const DEV_GR3D: &str = "/dev/nvhost-gr3d";
/// Default device node of the control device
pub const DEV_CTRL: &str = "/dev/nvhost-ctrl";

bitflags! {
    /// Layout flags of a tracked buffer object
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        /// Content is stored in the tiled layout
        const TILED = 1 << 0;
        /// Rows are stored bottom-up
        const BOTTOM_UP = 1 << 1;
    }
}

/// The closed set of shadowed device kinds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    /// Buffer-object allocator
    Nvmap,
    /// 2D engine channel
    Channel2d,
    /// 3D engine channel
    Channel3d,
    /// Sync-point control device
    Ctrl,
}

/// A host-visible mapping of a buffer object
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mapping {
    pub addr: usize,
    pub len: usize,
}

/// Shadow of one kernel buffer object
///
/// The shadow copy holds the content the application uploaded through
/// explicit writes; while a live mapping exists, the mapping is the
/// authoritative content source instead.
#[derive(Debug)]
pub struct BufferHandle {
    pub id: u32,
    pub size: u32,
    pub flags: BufferFlags,
    /// Whether a scan-out framebuffer lives in this buffer
    pub framebuffer: bool,
    heap_mask: u32,
    alloc_flags: u32,
    align: u32,
    mmap_offset: Option<u32>,
    mapping: Option<Mapping>,
    pinned: Option<u32>,
    shadow: Vec<u8>,
}

impl BufferHandle {
    fn new(id: u32, size: u32) -> Self {
        Self {
            id,
            size,
            flags: BufferFlags::empty(),
            framebuffer: false,
            heap_mask: 0,
            alloc_flags: 0,
            align: 0,
            mmap_offset: None,
            mapping: None,
            pinned: None,
            shadow: vec![0; (size as usize).next_multiple_of(PAGE_SIZE)],
        }
    }

    fn allocated(&mut self, heap_mask: u32, flags: u32, align: u32) {
        self.heap_mask = heap_mask;
        self.alloc_flags = flags;
        self.align = align;
    }

    fn resize(&mut self, size: u32) {
        self.size = size;
        self.shadow
            .resize((size as usize).next_multiple_of(PAGE_SIZE), 0);
    }

    /// Copy application bytes into the shadow at `offset`
    fn store(&mut self, offset: usize, bytes: &[u8]) {
        let Some(slot) = self
            .shadow
            .get_mut(offset..offset.saturating_add(bytes.len()))
        else {
            warn!(
                handle = self.id,
                offset,
                len = bytes.len(),
                "write beyond buffer bounds dropped",
            );
            return;
        };
        slot.copy_from_slice(bytes);
    }

    /// Allocation parameters recorded from the alloc request
    pub fn alloc_params(&self) -> (u32, u32, u32) {
        (self.heap_mask, self.alloc_flags, self.align)
    }

    /// The shadow copy, whole pages
    pub fn shadow_bytes(&self) -> &[u8] {
        &self.shadow
    }

    /// Current content, whole pages
    ///
    /// Reads the live mapping through the system-call strategy when one
    /// exists and falls back to the shadow copy otherwise.
    pub fn content(&self, sys: &mut impl SysApi) -> Cow<'_, [u8]> {
        let Some(mapping) = self.mapping else {
            return Cow::Borrowed(&self.shadow);
        };
        let len = mapping.len.min(self.shadow.len());
        match sys.read_user(mapping.addr, len) {
            Some(bytes) => Cow::Owned(bytes),
            None => Cow::Borrowed(&self.shadow),
        }
    }

    /// Fold the live mapping's content back into the shadow copy
    fn sync_shadow(&mut self, sys: &mut impl SysApi) {
        if let Some(mapping) = self.mapping {
            let len = mapping.len.min(self.shadow.len());
            if let Some(bytes) = sys.read_user(mapping.addr, len) {
                self.shadow[..len].copy_from_slice(&bytes);
            }
        }
    }
}

/// Extract `count` little-endian words starting at byte `offset`
pub fn le_words(content: &[u8], offset: u32, count: u32) -> Vec<u32> {
    (0..count as usize)
        .map_while(|index| {
            let at = offset as usize + index * 4;
            let bytes = content.get(at..at + 4)?;
            Some(u32::from_le_bytes(bytes.try_into().ok()?))
        })
        .collect()
}

/// Per-hook view of the registry's shared state
pub(crate) struct HookCtx<'a, S: SysApi, W: Write> {
    pub sys: &'a mut S,
    pub handles: &'a mut HashMap<u32, BufferHandle>,
    pub recorder: &'a mut Recorder<W>,
    pub config: &'a Config,
}

/// Device-specific shadow of one open descriptor
#[derive(Debug)]
enum Shadow {
    Nvmap(NvmapShadow),
    Channel(ChannelShadow),
    Ctrl(ctrl::CtrlShadow),
}

/// The intercepted-call dispatcher
///
/// One registry exists per intercepted process. Interception shims call
/// the entry points below in place of the real system calls; the registry
/// delegates to its [`SysApi`] and runs the device hooks around the
/// delegation. An [`Error::Io`] only reports the real call's failure and
/// is meant to be forwarded as errno; every other error is fatal.
pub struct Registry<S: SysApi, W: Write> {
    sys: S,
    recorder: Recorder<W>,
    config: Config,
    paths: HashMap<String, DeviceKind>,
    shadows: HashMap<RawFd, Shadow>,
    handles: HashMap<u32, BufferHandle>,
    next_context: u32,
    next_job_context: u32,
    current_context: Option<u32>,
}

impl<S: SysApi, W: Write> Registry<S, W> {
    /// Create a registry with the default device paths registered
    pub fn new(sys: S, recorder: Recorder<W>, config: Config) -> Self {
        let mut registry = Self {
            sys,
            recorder,
            config,
            paths: HashMap::new(),
            shadows: HashMap::new(),
            handles: HashMap::new(),
            next_context: 0,
            next_job_context: 0,
            current_context: None,
        };
        registry.register_default_paths();
        registry
    }

    /// Register the canonical device nodes
    pub fn register_default_paths(&mut self) {
        self.register_path(DEV_NVMAP, DeviceKind::Nvmap);
        self.register_path(DEV_GR2D, DeviceKind::Channel2d);
        self.register_path(DEV_GR3D, DeviceKind::Channel3d);
        self.register_path(DEV_CTRL, DeviceKind::Ctrl);
    }

    /// Register an additional device path
    pub fn register_path(&mut self, path: &str, kind: DeviceKind) {
        self.paths.insert(path.to_owned(), kind);
    }

    /// Look up a tracked buffer object
    pub fn handle(&self, id: u32) -> Option<&BufferHandle> {
        self.handles.get(&id)
    }

    /// Access the system-call strategy
    pub fn sys_mut(&mut self) -> &mut S {
        &mut self.sys
    }

    /// Whether a descriptor is currently shadowed
    pub fn is_shadowed(&self, fd: RawFd) -> bool {
        self.shadows.contains_key(&fd)
    }

    /// Intercepted `open`
    pub fn open(&mut self, path: &str, flags: i32, mode: u32) -> Result<RawFd, Error> {
        let kind = self.paths.get(path).copied();
        let fd = self.sys.open(path, flags, mode)?;
        let Some(kind) = kind else {
            trace!(path, fd, "open pass-through");
            return Ok(fd);
        };

        debug!(path, fd, ?kind, "shadowing device file");
        let shadow = match kind {
            DeviceKind::Nvmap => {
                let context = self.next_context;
                self.next_context += 1;
                self.current_context = Some(context);
                self.recorder.context_created(context, 0)?;
                Shadow::Nvmap(NvmapShadow::new(context))
            }
            DeviceKind::Channel2d | DeviceKind::Channel3d => {
                let engine = if kind == DeviceKind::Channel2d {
                    Engine::Gr2d
                } else {
                    Engine::Gr3d
                };
                let context = self.require_context()?;
                let job_context = self.next_job_context;
                self.next_job_context += 1;
                self.recorder
                    .job_context_created(job_context, context, engine)?;
                Shadow::Channel(ChannelShadow::new(job_context, engine))
            }
            DeviceKind::Ctrl => Shadow::Ctrl(ctrl::CtrlShadow),
        };
        self.shadows.insert(fd, shadow);
        Ok(fd)
    }

    /// Intercepted `close`
    pub fn close(&mut self, fd: RawFd) -> Result<(), Error> {
        self.sys.close(fd)?;
        let Some(shadow) = self.shadows.remove(&fd) else {
            return Ok(());
        };
        match shadow {
            Shadow::Nvmap(nvmap) => {
                for &id in nvmap.owned() {
                    if self.handles.remove(&id).is_some() {
                        self.recorder.buffer_destroyed(id)?;
                    }
                }
                self.recorder.context_destroyed(nvmap.context())?;
                if self.current_context == Some(nvmap.context()) {
                    self.current_context = None;
                }
            }
            Shadow::Channel(channel) => {
                self.recorder.job_context_destroyed(channel.job_context())?;
            }
            Shadow::Ctrl(_) => (),
        }
        debug!(fd, "shadow released");
        Ok(())
    }

    /// Intercepted `ioctl`
    ///
    /// `arg` is the ioctl argument memory; the kernel's in-place updates
    /// are visible to the leave hooks. Hooks only run when the real call
    /// succeeded.
    pub fn ioctl(&mut self, fd: RawFd, request: u32, arg: &mut [u8]) -> Result<i32, Error> {
        let Some(shadow) = self.shadows.get_mut(&fd) else {
            trace!(fd, request = %format_args!("{request:#010x}"), "ioctl pass-through");
            return Ok(self.sys.ioctl(fd, request, arg)?);
        };

        if let Some(name) = ioctl::request_name(request) {
            trace!(fd, name, "ioctl");
        } else {
            warn!(fd, request = %format_args!("{request:#010x}"), "unrecognized ioctl");
        }

        if let Shadow::Channel(channel) = &mut *shadow {
            channel.enter_ioctl(request, arg);
        }

        let ret = self.sys.ioctl(fd, request, arg)?;
        if ret < 0 {
            return Ok(ret);
        }

        let mut ctx = HookCtx {
            sys: &mut self.sys,
            handles: &mut self.handles,
            recorder: &mut self.recorder,
            config: &self.config,
        };
        match shadow {
            Shadow::Nvmap(nvmap) => nvmap.leave_ioctl(&mut ctx, request, arg)?,
            Shadow::Channel(channel) => channel.leave_ioctl(&mut ctx, request, arg)?,
            Shadow::Ctrl(ctrl) => ctrl.leave_ioctl(request, arg),
        }
        Ok(ret)
    }

    /// Intercepted `write`
    pub fn write(&mut self, fd: RawFd, buf: &[u8]) -> Result<usize, Error> {
        let written = self.sys.write(fd, buf)?;
        match self.shadows.get_mut(&fd) {
            Some(Shadow::Channel(channel)) => {
                channel.submit_write(&buf[..written])?;
            }
            Some(_) => debug!(fd, len = written, "write on shadowed device"),
            None => trace!(fd, len = written, "write pass-through"),
        }
        Ok(written)
    }

    /// Intercepted `read`
    pub fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> Result<usize, Error> {
        let read = self.sys.read(fd, buf)?;
        if self.shadows.contains_key(&fd) {
            debug!(fd, len = read, "read on shadowed device");
        }
        Ok(read)
    }

    /// Intercepted `mmap` on a device descriptor
    pub fn mmap(&mut self, fd: RawFd, len: usize, offset: u64) -> Result<usize, Error> {
        let addr = self.sys.mmap(fd, len, offset)?;
        if matches!(self.shadows.get(&fd), Some(Shadow::Nvmap(_))) {
            let matched = self
                .handles
                .values_mut()
                .find(|handle| handle.mmap_offset == Some(offset as u32));
            if let Some(handle) = matched {
                handle.mapping = Some(Mapping { addr, len });
                debug!(handle = handle.id, addr = %format_args!("{addr:#x}"), "buffer mapped");
            } else {
                warn!(offset, "mapping matches no tracked buffer");
            }
        }
        Ok(addr)
    }

    /// Intercepted `munmap`
    pub fn munmap(&mut self, addr: usize, len: usize) -> Result<(), Error> {
        let matched = self
            .handles
            .values_mut()
            .find(|handle| matches!(handle.mapping, Some(mapping) if mapping.addr == addr));
        if let Some(handle) = matched {
            handle.sync_shadow(&mut self.sys);
            handle.mapping = None;
            debug!(handle = handle.id, "buffer unmapped");
        }
        self.sys.munmap(addr, len)?;
        Ok(())
    }

    /// Update a tracked buffer's layout flags
    pub fn set_buffer_flags(&mut self, id: u32, flags: BufferFlags) -> Result<(), Error> {
        let Some(handle) = self.handles.get_mut(&id) else {
            return Err(Error::UnknownHandle(id));
        };
        handle.flags = flags;
        self.recorder.buffer_flags_changed(id, flags.bits())?;
        Ok(())
    }

    /// A display integration added a framebuffer in buffer `id`
    pub fn framebuffer_added(
        &mut self,
        id: u32,
        width: u16,
        height: u16,
        pitch: u32,
        format: u32,
    ) -> Result<(), Error> {
        let Some(handle) = self.handles.get_mut(&id) else {
            return Err(Error::UnknownHandle(id));
        };
        handle.framebuffer = true;
        let flags = handle.flags.bits();
        self.recorder
            .framebuffer_added(id, width, height, pitch, format, flags)?;
        Ok(())
    }

    /// A display integration dropped the framebuffer in buffer `id`
    pub fn framebuffer_removed(&mut self, id: u32) -> Result<(), Error> {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.framebuffer = false;
        }
        self.recorder.framebuffer_deleted(id)?;
        Ok(())
    }

    /// A display integration scanned out the framebuffer in buffer `id`
    pub fn framebuffer_displayed(&mut self, id: u32) -> Result<(), Error> {
        if let Some(handle) = self.handles.get(&id) {
            // scan-out content must be in the trace before the display action
            let content = handle.content(&mut self.sys);
            self.recorder.capture_buffer(id, &content, true)?;
        }
        self.recorder.framebuffer_displayed(id)?;
        Ok(())
    }

    /// Tear the registry apart, returning strategy and recorder
    pub fn into_parts(self) -> (S, Recorder<W>) {
        (self.sys, self.recorder)
    }

    /// The trace context a new channel records under
    ///
    /// Channels can open before the allocator; the job context still needs
    /// a context id that exists in the trace, so one is synthesized.
    fn require_context(&mut self) -> Result<u32, Error> {
        if let Some(context) = self.current_context {
            return Ok(context);
        }
        let context = self.next_context;
        self.next_context += 1;
        self.current_context = Some(context);
        self.recorder.context_created(context, 0)?;
        Ok(context)
    }
}
