// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Textual push-buffer dump

use std::fmt::Write;

use super::{CommandSink, CLASS_GR2D, CLASS_GR2D_SB, CLASS_GR3D, CLASS_HOST1X};
use crate::shader::{fragment, linker, vertex};

/// GR3D register receiving vertex processor instruction words
const VERTEX_INST_FIFO: u16 = 0x206;
/// GR3D register receiving linker instruction words
const LINKER_INST_FIFO: u16 = 0x300;
/// GR3D register receiving fragment ALU instruction words
const ALU_INST_FIFO: u16 = 0x804;

/// Symbolic name of an engine class, if known
pub fn class_name(class: u16) -> Option<&'static str> {
    match class {
        CLASS_HOST1X => Some("HOST1X"),
        CLASS_GR2D => Some("GR2D"),
        CLASS_GR2D_SB => Some("GR2D_SB"),
        CLASS_GR3D => Some("GR3D"),
        _ => None,
    }
}

/// A [`CommandSink`] rendering the stream as text
///
/// The dump accumulates one line per command or data word into an internal
/// buffer retrieved with [`finish`][Self::finish]. With disassembly
/// enabled, words written to the GR3D instruction FIFOs are additionally
/// run through the [shader][crate::shader] disassemblers as soon as an
/// instruction's word group is complete.
#[derive(Debug, Default)]
pub struct Dump {
    text: String,
    disassemble: bool,
    vertex_fifo: Vec<u32>,
    linker_fifo: Vec<u32>,
    alu_fifo: Vec<u32>,
}

impl Dump {
    /// Create a dump, optionally disassembling shader uploads
    pub fn new(disassemble: bool) -> Self {
        Self {
            disassemble,
            ..Self::default()
        }
    }

    /// Retrieve the accumulated text
    pub fn finish(self) -> String {
        self.text
    }

    fn class_label(class: u16) -> String {
        class_name(class).map_or_else(|| format!("{class:#05x}"), str::to_owned)
    }

    fn fifo_write(&mut self, offset: u16, value: u32) {
        match offset {
            VERTEX_INST_FIFO => {
                self.vertex_fifo.push(value);
                if let Ok(words) = <[u32; 4]>::try_from(self.vertex_fifo.as_slice()) {
                    let _ = writeln!(self.text, "    vs: {}", vertex::disassemble(&words));
                    self.vertex_fifo.clear();
                }
            }
            LINKER_INST_FIFO => {
                self.linker_fifo.push(value);
                if let Ok(words) = <[u32; 2]>::try_from(self.linker_fifo.as_slice()) {
                    let _ = writeln!(self.text, "    lnk: {}", linker::disassemble(&words));
                    self.linker_fifo.clear();
                }
            }
            ALU_INST_FIFO => {
                self.alu_fifo.push(value);
                if let Ok(words) = <[u32; 2]>::try_from(self.alu_fifo.as_slice()) {
                    let insn = fragment::AluInstruction::decode(&words);
                    let _ = writeln!(self.text, "    alu: {}", insn.display(None));
                    self.alu_fifo.clear();
                }
            }
            _ => (),
        }
    }
}

impl CommandSink for Dump {
    fn register_write(&mut self, class: u16, offset: u16, value: u32) {
        let label = Self::class_label(class);
        let _ = writeln!(self.text, "  {label}[{offset:#05x}] = {value:#010x}");
        if self.disassemble && class == CLASS_GR3D {
            self.fifo_write(offset, value);
        }
    }

    fn class_switch(&mut self, class: u16) {
        let _ = writeln!(self.text, "class {}", Self::class_label(class));
    }

    fn gather(&mut self, offset: u16, words: u16, base: u32) {
        let _ = writeln!(
            self.text,
            "gather [{offset:#05x}] {words} words @ {base:#010x}",
        );
    }

    fn restart(&mut self, base: u32) {
        let _ = writeln!(self.text, "restart @ {base:#010x}");
    }

    fn extend(&mut self, subop: u8, value: u32) {
        let _ = writeln!(self.text, "extend {subop} {value:#x}");
    }

    fn channel_done(&mut self) {
        let _ = writeln!(self.text, "done");
    }
}
