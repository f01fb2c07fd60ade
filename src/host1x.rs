// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! host1x command-stream decoding
//!
//! A push buffer is a flat sequence of 32-bit words. The top four bits of
//! each word at an opcode boundary select one of nine opcode kinds; an
//! opcode consumes a fixed or count-derived number of following data words.
//! [`Decoder`] walks a word slice with a single cursor and surfaces every
//! register write through a caller-supplied [`CommandSink`], so the textual
//! [`Dump`] and stateful consumers such as the
//! [recorder][crate::trace::Recorder] share one decode pass.

use thiserror::Error;
use tracing::trace;

mod dump;

#[cfg(test)]
mod tests;

pub use dump::{class_name, Dump};

/// Class id of the host1x channel class itself
pub const CLASS_HOST1X: u16 = 0x01;
/// Class id of the 2D engine
pub const CLASS_GR2D: u16 = 0x51;
/// Class id of the 2D surface blitter
pub const CLASS_GR2D_SB: u16 = 0x52;
/// Class id of the 3D engine
pub const CLASS_GR3D: u16 = 0x60;

/// A list of possible errors while decoding a push buffer
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The top four bits of the word at an opcode boundary are not a known
    /// opcode. Decoding of the stream halts.
    #[error("unknown opcode {opcode:#x} at word {pos}")]
    UnknownOpcode { opcode: u8, pos: usize },
    /// An opcode declared more data words than the stream holds
    #[error("stream truncated at word {pos}, {missing} more words required")]
    Truncated { pos: usize, missing: usize },
}

/// Opcode kinds of the host1x command language
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    SetClass,
    Incr,
    NonIncr,
    Mask,
    Imm,
    Restart,
    Gather,
    Extend,
    ChDone,
}

/// Consumer of decoded commands
///
/// Only [`register_write`][Self::register_write] is mandatory; the
/// remaining notifications default to no-ops.
pub trait CommandSink {
    /// A data word was written to `offset` of the engine class `class`
    fn register_write(&mut self, class: u16, offset: u16, value: u32);

    /// The stream switched to the engine class `class`
    fn class_switch(&mut self, class: u16) {
        let _ = class;
    }

    /// The stream splices in `words` words of another push buffer
    fn gather(&mut self, offset: u16, words: u16, base: u32) {
        let _ = (offset, words, base);
    }

    /// The stream continues at a new base address
    fn restart(&mut self, base: u32) {
        let _ = base;
    }

    /// An extended operation with an opaque value
    fn extend(&mut self, subop: u8, value: u32) {
        let _ = (subop, value);
    }

    /// The channel signalled completion
    fn channel_done(&mut self) {}
}

/// Decoder for host1x push buffers
///
/// The decoder walks the word slice it was constructed over and maintains
/// the current engine class across commands. One decoder instance decodes
/// one gather's worth of words; decoding is resumable command by command
/// via [`decode_command`][Self::decode_command].
#[derive(Clone)]
pub struct Decoder<'d> {
    words: &'d [u32],
    pos: usize,
    class: u16,
}

impl<'d> Decoder<'d> {
    /// Create a decoder over a word slice, starting in the host1x class
    pub fn new(words: &'d [u32]) -> Self {
        Self {
            words,
            pos: 0,
            class: CLASS_HOST1X,
        }
    }

    /// Start decoding in the given engine class instead
    pub fn with_class(self, class: u16) -> Self {
        Self { class, ..self }
    }

    /// Current cursor position in words from the start of the stream
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decode the entire remaining stream into `sink`
    pub fn decode(&mut self, sink: &mut impl CommandSink) -> Result<(), Error> {
        while self.decode_command(sink)?.is_some() {}
        Ok(())
    }

    /// Decode a single command, advancing the cursor past its data words
    ///
    /// Returns the kind of the decoded opcode, or `None` if the stream is
    /// exhausted. On error the cursor is left at the offending word.
    pub fn decode_command(
        &mut self,
        sink: &mut impl CommandSink,
    ) -> Result<Option<Opcode>, Error> {
        let Some(&word) = self.words.get(self.pos) else {
            return Ok(None);
        };
        let pos = self.pos;
        let opcode = (word >> 28) as u8;
        let offset = ((word >> 16) & 0xfff) as u16;
        trace!(pos, word = %format_args!("{word:#010x}"), "command word");

        let kind = match opcode {
            0x0 => {
                let class = ((word >> 6) & 0x3ff) as u16;
                let mask = (word & 0x3f) as u16;
                self.class = class;
                sink.class_switch(class);
                self.pos += 1;
                self.masked_writes(offset, mask, sink)?;
                Opcode::SetClass
            }
            0x1 | 0x2 => {
                let count = (word & 0xffff) as usize;
                let data = self.data_words(pos, 1, count)?;
                for (i, &value) in data.iter().enumerate() {
                    let dest = if opcode == 0x1 {
                        offset + i as u16
                    } else {
                        offset
                    };
                    sink.register_write(self.class, dest, value);
                }
                self.pos += 1 + count;
                if opcode == 0x1 {
                    Opcode::Incr
                } else {
                    Opcode::NonIncr
                }
            }
            0x3 => {
                let mask = (word & 0xffff) as u16;
                self.pos += 1;
                self.masked_writes(offset, mask, sink)?;
                Opcode::Mask
            }
            0x4 => {
                sink.register_write(self.class, offset, word & 0xffff);
                self.pos += 1;
                Opcode::Imm
            }
            0x5 => {
                sink.restart((word & 0x0fff_ffff) << 4);
                self.pos += 1;
                Opcode::Restart
            }
            0x6 => {
                let count = (word & 0x3fff) as u16;
                let base = self.data_words(pos, 1, 1)?[0];
                sink.gather(offset, count, base);
                self.pos += 2;
                Opcode::Gather
            }
            0xe => {
                let subop = ((word >> 24) & 0xf) as u8;
                sink.extend(subop, word & 0x00ff_ffff);
                self.pos += 1;
                Opcode::Extend
            }
            0xf => {
                sink.channel_done();
                self.pos += 1;
                Opcode::ChDone
            }
            opcode => return Err(Error::UnknownOpcode { opcode, pos }),
        };
        Ok(Some(kind))
    }

    /// Consume one data word per set mask bit, writing to offset+bit-index
    fn masked_writes(
        &mut self,
        offset: u16,
        mask: u16,
        sink: &mut impl CommandSink,
    ) -> Result<(), Error> {
        let count = mask.count_ones() as usize;
        let data = self.data_words(self.pos - 1, 0, count)?;
        let set_bits = (0u16..16).filter(|bit| mask & (1 << bit) != 0);
        for (bit, &value) in set_bits.zip(data) {
            sink.register_write(self.class, offset + bit, value);
        }
        self.pos += count;
        Ok(())
    }

    /// The `count` data words starting `skip` words past the cursor
    fn data_words(&self, pos: usize, skip: usize, count: usize) -> Result<&'d [u32], Error> {
        let first = self.pos + skip;
        self.words.get(first..first + count).ok_or(Error::Truncated {
            pos,
            missing: first + count - self.words.len(),
        })
    }
}

/// Constructors for command words
///
/// These build the opcode words the [`Decoder`] consumes and are primarily
/// useful for tests and for synthesizing replacement streams.
pub mod opcode {
    /// Switch to `class`, then write the masked registers at `offset`
    pub const fn setclass(offset: u16, class: u16, mask: u8) -> u32 {
        ((offset as u32 & 0xfff) << 16) | ((class as u32 & 0x3ff) << 6) | (mask as u32 & 0x3f)
    }

    /// Write `count` words to consecutive registers starting at `offset`
    pub const fn incr(offset: u16, count: u16) -> u32 {
        0x1000_0000 | ((offset as u32 & 0xfff) << 16) | count as u32
    }

    /// Write `count` words to the single register at `offset`
    pub const fn nonincr(offset: u16, count: u16) -> u32 {
        0x2000_0000 | ((offset as u32 & 0xfff) << 16) | count as u32
    }

    /// Write one word per set mask bit to `offset` + bit index
    pub const fn mask(offset: u16, mask: u16) -> u32 {
        0x3000_0000 | ((offset as u32 & 0xfff) << 16) | mask as u32
    }

    /// Write the immediate `value` to `offset`
    pub const fn imm(offset: u16, value: u16) -> u32 {
        0x4000_0000 | ((offset as u32 & 0xfff) << 16) | value as u32
    }

    /// Continue the stream at `base` (16-byte aligned)
    pub const fn restart(base: u32) -> u32 {
        0x5000_0000 | (base >> 4)
    }

    /// Splice in `count` words from another buffer; the base address
    /// follows as the next word
    pub const fn gather(offset: u16, count: u16) -> u32 {
        0x6000_0000 | ((offset as u32 & 0xfff) << 16) | (count as u32 & 0x3fff)
    }

    /// Extended operation
    pub const fn extend(subop: u8, value: u32) -> u32 {
        0xe000_0000 | ((subop as u32 & 0xf) << 24) | (value & 0x00ff_ffff)
    }

    /// Channel completion marker
    pub const fn chdone() -> u32 {
        0xf000_0000
    }
}
