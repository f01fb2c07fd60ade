// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Sequential trace reading

use std::io::Read;

use super::action::{Action, Engine, GatherRecord, Kind, RelocRecord};
use super::{compress, Compression, Error, MAGIC, PAGE_SIZE, VERSION};

/// Strict single-pass trace decoder
///
/// The constructor consumes and validates the stream preamble; afterwards
/// [`next_action`][Self::next_action] yields one action at a time until
/// the clean end of the stream. Any violation of the format is an error
/// carrying the index of the offending action.
#[derive(Debug)]
pub struct Reader<R: Read> {
    input: R,
    index: usize,
    family: u32,
    compression: Compression,
}

impl<R: Read> Reader<R> {
    /// Open a trace, validating magic value, version and preamble order
    pub fn new(input: R) -> Result<Self, Error> {
        let mut reader = Self {
            input,
            index: 0,
            family: 0,
            compression: Compression::None,
        };

        match reader.next_raw()? {
            Some(Action::StreamStart { magic, version }) => {
                if magic != MAGIC {
                    return Err(Error::BadMagic(magic));
                }
                if version != VERSION {
                    return Err(Error::BadVersion(version));
                }
            }
            _ => return Err(Error::MissingPreamble { index: 0 }),
        }
        match reader.next_raw()? {
            Some(Action::StreamInfo {
                family,
                compression,
            }) => {
                reader.family = family;
                reader.compression = Compression::from_tag(compression)
                    .ok_or(Error::UnsupportedCompression(compression))?;
            }
            _ => return Err(Error::MissingPreamble { index: 1 }),
        }
        Ok(reader)
    }

    /// Driver family recorded in the stream-info action
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Compression mode recorded in the stream-info action
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Index of the next action
    pub fn position(&self) -> usize {
        self.index
    }

    /// Decode the next action, `None` at the clean end of the stream
    pub fn next_action(&mut self) -> Result<Option<Action>, Error> {
        self.next_raw()
    }

    fn next_raw(&mut self) -> Result<Option<Action>, Error> {
        let Some(tag) = self.read_tag()? else {
            return Ok(None);
        };
        let index = self.index;
        let kind = Kind::from_tag(tag).ok_or(Error::UnknownKind { index, kind: tag })?;

        let action = match kind {
            Kind::StreamStart => {
                let mut magic = [0; 8];
                self.read_bytes(&mut magic, kind)?;
                Action::StreamStart {
                    magic,
                    version: self.read_u16(kind)?,
                }
            }
            Kind::StreamInfo => Action::StreamInfo {
                family: self.read_u32(kind)?,
                compression: self.read_u32(kind)?,
            },
            Kind::ContextCreate => Action::ContextCreate {
                id: self.read_u32(kind)?,
                flags: self.read_u32(kind)?,
            },
            Kind::ContextDestroy => Action::ContextDestroy {
                id: self.read_u32(kind)?,
            },
            Kind::BufferCreate => Action::BufferCreate {
                id: self.read_u32(kind)?,
                context: self.read_u32(kind)?,
                size: self.read_u32(kind)?,
                flags: self.read_u32(kind)?,
            },
            Kind::BufferDestroy => Action::BufferDestroy {
                id: self.read_u32(kind)?,
            },
            Kind::BufferLoadData => {
                let id = self.read_u32(kind)?;
                let page = self.read_u32(kind)?;
                let data_size = self.read_u32(kind)? as usize;
                let data = self.read_page(data_size, kind)?;
                Action::BufferLoadData { id, page, data }
            }
            Kind::BufferSetFlags => Action::BufferSetFlags {
                id: self.read_u32(kind)?,
                flags: self.read_u32(kind)?,
            },
            Kind::FramebufferAdd => Action::FramebufferAdd {
                id: self.read_u32(kind)?,
                width: self.read_u16(kind)?,
                height: self.read_u16(kind)?,
                pitch: self.read_u32(kind)?,
                format: self.read_u32(kind)?,
                flags: self.read_u32(kind)?,
            },
            Kind::FramebufferDelete => Action::FramebufferDelete {
                id: self.read_u32(kind)?,
            },
            Kind::FramebufferDisplay => Action::FramebufferDisplay {
                id: self.read_u32(kind)?,
            },
            Kind::JobContextCreate => {
                let id = self.read_u32(kind)?;
                let context = self.read_u32(kind)?;
                let engine = self.read_u32(kind)?;
                Action::JobContextCreate {
                    id,
                    context,
                    engine: Engine::from_tag(engine).ok_or(Error::UnknownKind {
                        index,
                        kind: engine,
                    })?,
                }
            }
            Kind::JobContextDestroy => Action::JobContextDestroy {
                id: self.read_u32(kind)?,
            },
            Kind::JobSubmit => {
                let job_context = self.read_u32(kind)?;
                let syncpt_id = self.read_u32(kind)?;
                let syncpt_incrs = self.read_u32(kind)?;
                let num_gathers = self.read_u32(kind)?;
                let num_relocs = self.read_u32(kind)?;
                let gathers = (0..num_gathers)
                    .map(|_| {
                        Ok(GatherRecord {
                            buffer: self.read_u32(kind)?,
                            offset: self.read_u32(kind)?,
                            words: self.read_u32(kind)?,
                        })
                    })
                    .collect::<Result<_, Error>>()?;
                let relocs = (0..num_relocs)
                    .map(|_| {
                        Ok(RelocRecord {
                            cmdbuf: self.read_u32(kind)?,
                            cmdbuf_offset: self.read_u32(kind)?,
                            target: self.read_u32(kind)?,
                            target_offset: self.read_u32(kind)?,
                            shift: self.read_u32(kind)?,
                        })
                    })
                    .collect::<Result<_, Error>>()?;
                Action::JobSubmit {
                    job_context,
                    syncpt_id,
                    syncpt_incrs,
                    gathers,
                    relocs,
                }
            }
        };
        self.index += 1;
        Ok(Some(action))
    }

    /// Read a load-data block, undoing compression
    fn read_page(&mut self, data_size: usize, kind: Kind) -> Result<Vec<u8>, Error> {
        if data_size == 0 {
            let mut data = vec![0; PAGE_SIZE];
            self.read_bytes(&mut data, kind)?;
            return Ok(data);
        }
        if self.compression == Compression::None || data_size > PAGE_SIZE {
            return Err(Error::BadPageSize {
                index: self.index,
                size: data_size,
            });
        }
        let mut packed = vec![0; data_size];
        self.read_bytes(&mut packed, kind)?;
        compress::decompress(self.compression, &packed, self.index)
    }

    /// Read an action tag, detecting the clean end of the stream
    fn read_tag(&mut self) -> Result<Option<u32>, Error> {
        let mut buf = [0; 4];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.input.read(&mut buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::Truncated {
                    index: self.index,
                    kind: None,
                });
            }
            filled += n;
        }
        Ok(Some(u32::from_le_bytes(buf)))
    }

    fn read_bytes(&mut self, buf: &mut [u8], kind: Kind) -> Result<(), Error> {
        self.input.read_exact(buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Truncated {
                    index: self.index,
                    kind: Some(kind),
                }
            } else {
                Error::Io(err)
            }
        })
    }

    fn read_u16(&mut self, kind: Kind) -> Result<u16, Error> {
        let mut buf = [0; 2];
        self.read_bytes(&mut buf, kind)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self, kind: Kind) -> Result<u32, Error> {
        let mut buf = [0; 4];
        self.read_bytes(&mut buf, kind)?;
        Ok(u32::from_le_bytes(buf))
    }
}
