// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace replay
//!
//! A [`Replayer`] runs a trace, action by action, against a live
//! [`Driver`] connection: it reconstructs contexts, buffer objects and
//! framebuffers under the ids the trace assigned, resolves each gather's
//! backing buffer, patches relocations into the gather's copy and submits
//! the job, waiting for its completion before the next action is
//! processed. Relative initiation order of the original capture is
//! preserved; concurrent execution is not.
//!
//! Replay is strict: any reference to an id no earlier action created,
//! and any malformed trace content, halts replay with an error naming the
//! offending action. State already established on the live driver is left
//! as is, a partial replay cannot be resumed.

use std::collections::HashMap;
use std::io::Read;

use tracing::{debug, trace};

use crate::trace::{Action, GatherRecord, Kind, Reader, RelocRecord, PAGE_SIZE};
use crate::wrap::le_words;

pub mod driver;
pub mod error;


pub use driver::{
    BufferRef, ChannelRef, ContextRef, Driver, Fence, Framebuffer, NoPresent, PreparedGather,
    Present, Wait,
};
pub use error::Error;

/// A buffer object under reconstruction
struct ReplayBuffer {
    buffer: BufferRef,
    /// Bus address the live driver assigned
    iova: u32,
    /// Mirror of the content loaded so far, for gather resolution
    data: Vec<u8>,
}

/// A reconstructed job context
struct JobContext {
    channel: ChannelRef,
}

/// The replay state machine
///
/// Ids are trusted as the trace assigned them and only checked for
/// existence. A framebuffer is handed to the [`Present`] back end once
/// per distinct handle; display actions for the buffer already on scan
/// out are suppressed.
pub struct Replayer<D: Driver, P: Present = NoPresent> {
    driver: D,
    present: P,
    wait: Wait,
    contexts: HashMap<u32, ContextRef>,
    buffers: HashMap<u32, ReplayBuffer>,
    framebuffers: HashMap<u32, Framebuffer>,
    job_contexts: HashMap<u32, JobContext>,
    displayed: Option<u32>,
}

impl<D: Driver> Replayer<D> {
    /// Create a replayer over a live driver connection
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            present: NoPresent,
            wait: Wait::default(),
            contexts: HashMap::new(),
            buffers: HashMap::new(),
            framebuffers: HashMap::new(),
            job_contexts: HashMap::new(),
            displayed: None,
        }
    }
}

impl<D: Driver, P: Present> Replayer<D, P> {
    /// Attach a display back end
    pub fn with_present<Q: Present>(self, present: Q) -> Replayer<D, Q> {
        Replayer {
            driver: self.driver,
            present,
            wait: self.wait,
            contexts: self.contexts,
            buffers: self.buffers,
            framebuffers: self.framebuffers,
            job_contexts: self.job_contexts,
            displayed: self.displayed,
        }
    }

    /// Bound every job-completion wait
    pub fn with_wait(self, wait: Wait) -> Self {
        Self { wait, ..self }
    }

    /// Tear the replayer apart, returning the driver connection
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run every remaining action of `reader` to completion
    pub fn run<R: Read>(&mut self, reader: &mut Reader<R>) -> Result<(), Error<D::Error>> {
        while let Some(action) = reader.next_action()? {
            let index = reader.position() - 1;
            self.apply(index, action)?;
        }
        debug!("replay complete");
        Ok(())
    }

    /// Apply a single action
    pub fn apply(&mut self, index: usize, action: Action) -> Result<(), Error<D::Error>> {
        trace!(index, kind = ?action.kind(), "replaying action");
        match action {
            Action::StreamStart { .. } | Action::StreamInfo { .. } => {
                return Err(Error::StrayPreamble { index });
            }
            Action::ContextCreate { id, flags } => {
                let context = self.driver.create_context(flags).map_err(Error::Driver)?;
                self.contexts.insert(id, context);
            }
            Action::ContextDestroy { id } => {
                let context = self.take_context(index, Kind::ContextDestroy, id)?;
                self.driver.destroy_context(context).map_err(Error::Driver)?;
            }
            Action::BufferCreate {
                id,
                context,
                size,
                flags,
            } => {
                self.context(index, Kind::BufferCreate, context)?;
                let (buffer, iova) = self
                    .driver
                    .create_buffer(size, flags)
                    .map_err(Error::Driver)?;
                self.buffers.insert(
                    id,
                    ReplayBuffer {
                        buffer,
                        iova,
                        data: vec![0; (size as usize).next_multiple_of(PAGE_SIZE)],
                    },
                );
            }
            Action::BufferDestroy { id } => {
                let replay = self
                    .buffers
                    .remove(&id)
                    .ok_or(Error::UnknownId {
                        index,
                        kind: Kind::BufferDestroy,
                        entity: "buffer",
                        id,
                    })?;
                self.driver
                    .destroy_buffer(replay.buffer)
                    .map_err(Error::Driver)?;
            }
            Action::BufferLoadData { id, page, data } => {
                let replay = self.buffer_mut(index, Kind::BufferLoadData, id)?;
                let at = page as usize * PAGE_SIZE;
                if let Some(slot) = replay.data.get_mut(at..at + data.len()) {
                    slot.copy_from_slice(&data);
                } else {
                    return Err(Error::BadLoad { index, buffer: id });
                }
                let buffer = replay.buffer;
                self.driver
                    .load_buffer(buffer, page, &data)
                    .map_err(Error::Driver)?;
            }
            Action::BufferSetFlags { id, flags } => {
                self.buffer_mut(index, Kind::BufferSetFlags, id)?;
                debug!(id, flags, "buffer flags updated");
            }
            Action::FramebufferAdd {
                id,
                width,
                height,
                pitch,
                format,
                flags,
            } => {
                self.buffer_mut(index, Kind::FramebufferAdd, id)?;
                self.framebuffers.insert(
                    id,
                    Framebuffer {
                        buffer: id,
                        width,
                        height,
                        pitch,
                        format,
                        flags,
                    },
                );
            }
            Action::FramebufferDelete { id } => {
                self.framebuffers.remove(&id).ok_or(Error::UnknownId {
                    index,
                    kind: Kind::FramebufferDelete,
                    entity: "framebuffer",
                    id,
                })?;
                if self.displayed == Some(id) {
                    self.displayed = None;
                }
            }
            Action::FramebufferDisplay { id } => {
                let framebuffer = self.framebuffers.get(&id).ok_or(Error::UnknownId {
                    index,
                    kind: Kind::FramebufferDisplay,
                    entity: "framebuffer",
                    id,
                })?;
                if self.displayed == Some(id) {
                    debug!(id, "redundant display suppressed");
                } else {
                    self.present.display(framebuffer);
                    self.displayed = Some(id);
                }
            }
            Action::JobContextCreate {
                id,
                context,
                engine,
            } => {
                self.context(index, Kind::JobContextCreate, context)?;
                let channel = self.driver.open_channel(engine).map_err(Error::Driver)?;
                self.job_contexts.insert(id, JobContext { channel });
            }
            Action::JobContextDestroy { id } => {
                let job = self.job_contexts.remove(&id).ok_or(Error::UnknownId {
                    index,
                    kind: Kind::JobContextDestroy,
                    entity: "job context",
                    id,
                })?;
                self.driver.close_channel(job.channel).map_err(Error::Driver)?;
            }
            Action::JobSubmit {
                job_context,
                syncpt_id,
                syncpt_incrs,
                gathers,
                relocs,
            } => {
                debug!(job_context, syncpt_id, "submitting job");
                self.submit(index, job_context, syncpt_incrs, &gathers, &relocs)?;
            }
        }
        Ok(())
    }

    /// Resolve, patch and submit one job, then wait for its completion
    fn submit(
        &mut self,
        index: usize,
        job_context: u32,
        syncpt_incrs: u32,
        gathers: &[GatherRecord],
        relocs: &[RelocRecord],
    ) -> Result<(), Error<D::Error>> {
        let kind = Kind::JobSubmit;
        let channel = self
            .job_contexts
            .get(&job_context)
            .ok_or(Error::UnknownId {
                index,
                kind,
                entity: "job context",
                id: job_context,
            })?
            .channel;

        let mut prepared = Vec::with_capacity(gathers.len());
        for gather in gathers {
            let backing = self.buffer(index, kind, gather.buffer)?;
            let mut words = le_words(&backing.data, gather.offset, gather.words);
            if words.len() != gather.words as usize {
                return Err(Error::BadGather {
                    index,
                    buffer: gather.buffer,
                });
            }
            let buffer = backing.buffer;

            for reloc in relocs {
                if reloc.cmdbuf != gather.buffer {
                    continue;
                }
                let Some(word) = reloc
                    .cmdbuf_offset
                    .checked_sub(gather.offset)
                    .map(|bytes| bytes / 4)
                    .filter(|&word| word < gather.words)
                else {
                    continue;
                };
                let target = self.buffer(index, kind, reloc.target)?;
                words[word as usize] =
                    target.iova.wrapping_add(reloc.target_offset) >> reloc.shift;
            }

            prepared.push(PreparedGather {
                buffer,
                offset: gather.offset,
                words,
            });
        }

        let fence = self
            .driver
            .submit(channel, &prepared, syncpt_incrs)
            .map_err(Error::Driver)?;
        self.driver.wait(fence, self.wait).map_err(Error::Driver)
    }

    fn context(&self, index: usize, kind: Kind, id: u32) -> Result<ContextRef, Error<D::Error>> {
        self.contexts.get(&id).copied().ok_or(Error::UnknownId {
            index,
            kind,
            entity: "context",
            id,
        })
    }

    fn take_context(
        &mut self,
        index: usize,
        kind: Kind,
        id: u32,
    ) -> Result<ContextRef, Error<D::Error>> {
        self.contexts.remove(&id).ok_or(Error::UnknownId {
            index,
            kind,
            entity: "context",
            id,
        })
    }

    fn buffer(&self, index: usize, kind: Kind, id: u32) -> Result<&ReplayBuffer, Error<D::Error>> {
        self.buffers.get(&id).ok_or(Error::UnknownId {
            index,
            kind,
            entity: "buffer",
            id,
        })
    }

    fn buffer_mut(
        &mut self,
        index: usize,
        kind: Kind,
        id: u32,
    ) -> Result<&mut ReplayBuffer, Error<D::Error>> {
        self.buffers.get_mut(&id).ok_or(Error::UnknownId {
            index,
            kind,
            entity: "buffer",
            id,
        })
    }
}
