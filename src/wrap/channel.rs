// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Channel device shadow
//!
//! A channel descriptor submits jobs to one engine. The submit ioctl
//! announces a job and its record counts; the following `write` calls
//! deliver, in strict order, the declared command-buffer descriptors,
//! relocations, wait-checks and, from submit protocol version 2 on, the
//! relocation shifts. The flush ioctl finalizes the job: referenced
//! buffers are captured, the command streams decoded, and the submission
//! recorded.

use std::collections::BTreeSet;
use std::io::Write;
use std::os::fd::RawFd;

use tracing::{debug, trace, warn};

use super::ioctl::{self, CmdBuf, Reloc, SubmitArg, WaitChk};
use super::syscall::SysApi;
use super::{le_words, Error, HookCtx};
use crate::host1x::{Decoder, Dump};
use crate::trace::{Engine, GatherRecord, RelocRecord};

/// A submission unit under assembly
#[derive(Debug)]
pub struct Job {
    pub syncpt_id: u32,
    pub syncpt_incrs: u32,
    pub version: u32,
    want_cmdbufs: u32,
    want_relocs: u32,
    want_waitchks: u32,
    want_shifts: u32,
    cmdbufs: Vec<CmdBuf>,
    relocs: Vec<Reloc>,
    waitchks: Vec<WaitChk>,
    shifts: Vec<u32>,
}

impl Job {
    fn new(header: &SubmitArg) -> Self {
        let want_shifts = if header.version >= 2 {
            header.num_relocs
        } else {
            0
        };
        Self {
            syncpt_id: header.syncpt_id,
            syncpt_incrs: header.syncpt_incrs,
            version: header.version,
            want_cmdbufs: header.num_cmdbufs,
            want_relocs: header.num_relocs,
            want_waitchks: header.num_waitchks,
            want_shifts,
            cmdbufs: Vec::new(),
            relocs: Vec::new(),
            waitchks: Vec::new(),
            shifts: Vec::new(),
        }
    }

    /// Whether every declared record has arrived
    fn complete(&self) -> bool {
        self.want_cmdbufs == 0
            && self.want_relocs == 0
            && self.want_waitchks == 0
            && self.want_shifts == 0
    }

    /// Shift of relocation `index`, zero before protocol version 2
    fn shift(&self, index: usize) -> u32 {
        self.shifts.get(index).copied().unwrap_or(0)
    }

    /// Wait-checks delivered for this job
    pub fn waitchks(&self) -> &[WaitChk] {
        &self.waitchks
    }
}

/// Shadow state of one open channel descriptor
#[derive(Debug)]
pub struct ChannelShadow {
    engine: Engine,
    job_context: u32,
    nvmap_fd: Option<RawFd>,
    job: Option<Job>,
}

impl ChannelShadow {
    pub fn new(job_context: u32, engine: Engine) -> Self {
        Self {
            engine,
            job_context,
            nvmap_fd: None,
            job: None,
        }
    }

    /// Trace job-context id of this descriptor
    pub fn job_context(&self) -> u32 {
        self.job_context
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Allocator descriptor attached via set-nvmap-fd
    pub fn nvmap_fd(&self) -> Option<RawFd> {
        self.nvmap_fd
    }

    /// Inspect a channel ioctl before it reaches the kernel
    pub(crate) fn enter_ioctl(&mut self, request: u32, arg: &[u8]) {
        if request == ioctl::NVHOST_IOC_CHANNEL_SET_NVMAP_FD {
            if let Some(fd) = ioctl::field(arg, 0) {
                self.nvmap_fd = Some(fd as RawFd);
                debug!(fd, "allocator descriptor attached");
            }
        }
    }

    /// Inspect a completed channel ioctl
    pub(crate) fn leave_ioctl<S: SysApi, W: Write>(
        &mut self,
        ctx: &mut HookCtx<'_, S, W>,
        request: u32,
        arg: &[u8],
    ) -> Result<(), Error> {
        match request {
            ioctl::NVHOST_IOC_CHANNEL_SUBMIT => {
                let Some(header) = SubmitArg::decode(arg) else {
                    warn!(len = arg.len(), "garbled submit header");
                    return Ok(());
                };
                if let Some(stale) = self.job.take() {
                    warn!(
                        syncpt = stale.syncpt_id,
                        "submit header while a job was still open",
                    );
                }
                debug!(
                    syncpt = header.syncpt_id,
                    incrs = header.syncpt_incrs,
                    cmdbufs = header.num_cmdbufs,
                    relocs = header.num_relocs,
                    waitchks = header.num_waitchks,
                    version = header.version,
                    "job opened",
                );
                self.job = Some(Job::new(&header));
            }
            ioctl::NVHOST_IOC_CHANNEL_FLUSH => {
                self.flush(ctx)?;
            }
            ioctl::NVHOST_IOC_CHANNEL_GET_SYNCPOINTS
            | ioctl::NVHOST_IOC_CHANNEL_GET_WAITBASES
            | ioctl::NVHOST_IOC_CHANNEL_GET_MODMUTEXES
            | ioctl::NVHOST_IOC_CHANNEL_NULL_KICKOFF
            | ioctl::NVHOST_IOC_CHANNEL_GET_TIMEDOUT => {
                debug!(value = ioctl::field(arg, 0), "channel query");
            }
            ioctl::NVHOST_IOC_CHANNEL_SET_NVMAP_FD => (),
            ioctl::NVHOST_IOC_CHANNEL_SET_PRIORITY => {
                debug!(priority = ioctl::field(arg, 0), "channel priority");
            }
            _ => {
                warn!(request = %format_args!("{request:#010x}"), "unknown channel ioctl");
            }
        }
        Ok(())
    }

    /// Consume submit records delivered through `write`
    ///
    /// Records arrive in strict order and must not be split across record
    /// boundaries; stray bytes after the last expected record are a
    /// protocol violation.
    pub(crate) fn submit_write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let Some(job) = self.job.as_mut() else {
            return Err(Error::NoOpenJob);
        };

        let mut rest = bytes;
        while !rest.is_empty() {
            if job.want_cmdbufs > 0 {
                let Some(cmdbuf) = rest.get(..CmdBuf::SIZE).and_then(CmdBuf::decode) else {
                    return Err(Error::MalformedRecord("command-buffer"));
                };
                trace!(
                    mem = cmdbuf.mem,
                    offset = cmdbuf.offset,
                    words = cmdbuf.words,
                    "gather",
                );
                job.cmdbufs.push(cmdbuf);
                job.want_cmdbufs -= 1;
                rest = &rest[CmdBuf::SIZE..];
            } else if job.want_relocs > 0 {
                let Some(reloc) = rest.get(..Reloc::SIZE).and_then(Reloc::decode) else {
                    return Err(Error::MalformedRecord("relocation"));
                };
                trace!(
                    cmdbuf = reloc.cmdbuf_mem,
                    offset = reloc.cmdbuf_offset,
                    target = reloc.target_mem,
                    "relocation",
                );
                job.relocs.push(reloc);
                job.want_relocs -= 1;
                rest = &rest[Reloc::SIZE..];
            } else if job.want_waitchks > 0 {
                let Some(waitchk) = rest.get(..WaitChk::SIZE).and_then(WaitChk::decode) else {
                    return Err(Error::MalformedRecord("wait-check"));
                };
                trace!(
                    syncpt = waitchk.syncpt_id,
                    thresh = waitchk.thresh,
                    "wait-check",
                );
                job.waitchks.push(waitchk);
                job.want_waitchks -= 1;
                rest = &rest[WaitChk::SIZE..];
            } else if job.want_shifts > 0 {
                let Some(shift) = ioctl::field(rest, 0) else {
                    return Err(Error::MalformedRecord("relocation-shift"));
                };
                job.shifts.push(shift);
                job.want_shifts -= 1;
                rest = &rest[4..];
            } else {
                return Err(Error::MalformedRecord("trailing"));
            }
        }
        Ok(())
    }

    /// Finalize the open job: capture buffers, decode, record
    fn flush<S: SysApi, W: Write>(&mut self, ctx: &mut HookCtx<'_, S, W>) -> Result<(), Error> {
        let Some(job) = self.job.take() else {
            debug!("flush without an open job");
            return Ok(());
        };
        if !job.complete() {
            warn!(
                cmdbufs = job.want_cmdbufs,
                relocs = job.want_relocs,
                waitchks = job.want_waitchks,
                shifts = job.want_shifts,
                "flushing an incomplete job",
            );
        }

        // every buffer the job touches must be tracked
        let mut referenced = BTreeSet::new();
        for cmdbuf in &job.cmdbufs {
            referenced.insert(cmdbuf.mem);
        }
        for reloc in &job.relocs {
            referenced.insert(reloc.cmdbuf_mem);
            referenced.insert(reloc.target_mem);
        }
        for &id in &referenced {
            if !ctx.handles.contains_key(&id) {
                return Err(Error::UnknownHandle(id));
            }
        }

        if ctx.config.verbose {
            self.dump_job(ctx, &job);
        }

        for &id in &referenced {
            if let Some(handle) = ctx.handles.get(&id) {
                let content = handle.content(ctx.sys);
                ctx.recorder
                    .capture_buffer(id, &content, handle.framebuffer)?;
            }
        }

        let gathers = job
            .cmdbufs
            .iter()
            .map(|cmdbuf| GatherRecord {
                buffer: cmdbuf.mem,
                offset: cmdbuf.offset,
                words: cmdbuf.words,
            })
            .collect();
        let relocs = job
            .relocs
            .iter()
            .enumerate()
            .map(|(index, reloc)| RelocRecord {
                cmdbuf: reloc.cmdbuf_mem,
                cmdbuf_offset: reloc.cmdbuf_offset,
                target: reloc.target_mem,
                target_offset: reloc.target_offset,
                shift: job.shift(index),
            })
            .collect();
        ctx.recorder.job_submitted(
            self.job_context,
            job.syncpt_id,
            job.syncpt_incrs,
            gathers,
            relocs,
        )?;
        debug!(job_context = self.job_context, "job recorded");
        Ok(())
    }

    /// Decode the job's command streams into the textual dump
    ///
    /// Relocation placeholders are patched with the pinned address of
    /// their target where one is known, so the dump shows the words the
    /// engine will actually fetch. Decode failures only affect the dump.
    fn dump_job<S: SysApi, W: Write>(&self, ctx: &mut HookCtx<'_, S, W>, job: &Job) {
        for cmdbuf in &job.cmdbufs {
            let Some(handle) = ctx.handles.get(&cmdbuf.mem) else {
                continue;
            };
            let mut words = le_words(&handle.content(ctx.sys), cmdbuf.offset, cmdbuf.words);
            for (index, reloc) in job.relocs.iter().enumerate() {
                if reloc.cmdbuf_mem != cmdbuf.mem {
                    continue;
                }
                let Some(target) = ctx.handles.get(&reloc.target_mem) else {
                    continue;
                };
                let Some(pinned) = target.pinned else {
                    continue;
                };
                let word = reloc.cmdbuf_offset.wrapping_sub(cmdbuf.offset) / 4;
                if let Some(slot) = words.get_mut(word as usize) {
                    *slot = (pinned + reloc.target_offset) >> job.shift(index);
                }
            }

            let mut dump = Dump::new(true);
            let mut decoder = Decoder::new(&words);
            if let Err(err) = decoder.decode(&mut dump) {
                warn!(%err, "command stream decoding halted");
            }
            trace!(
                mem = cmdbuf.mem,
                offset = cmdbuf.offset,
                "command stream:\n{}",
                dump.finish(),
            );
        }
    }
}
