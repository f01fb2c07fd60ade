// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Shader linker instruction disassembly
//!
//! The linker routes vertex outputs into fragment input rows. One 64-bit
//! instruction describes the routing of a single vertex export slot:
//!
//! | bits   | field                                   |
//! |--------|-----------------------------------------|
//! | 0..4   | vertex export slot                      |
//! | 5..8   | target fragment input row               |
//! | 9..20  | per-component routing, 3 bits per lane  |
//! | 21     | constant across the primitive           |

use core::fmt;

use crate::bits::WordView;

/// Number of 32-bit words per instruction
pub const WORDS_PER_INSTRUCTION: usize = 2;

/// How one component of a varying reaches the fragment stage
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Routing {
    /// Component is not forwarded
    Disabled,
    /// Forwarded without interpolation
    Flat,
    /// Perspective-correct interpolation
    Perspective,
    /// Screen-linear interpolation
    Linear,
}

impl Routing {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => Self::Disabled,
            1 => Self::Flat,
            2 => Self::Perspective,
            _ => Self::Linear,
        }
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "off"),
            Self::Flat => write!(f, "flat"),
            Self::Perspective => write!(f, "persp"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

/// A decoded 64-bit linker instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub export_slot: u8,
    pub input_row: u8,
    pub routing: [Routing; 4],
    pub constant: bool,
}

impl Instruction {
    /// Decode an instruction from its two words in upload order
    pub fn decode(words: &[u32; WORDS_PER_INSTRUCTION]) -> Self {
        let view = WordView::new(words);
        Self {
            export_slot: view.field(0, 4) as u8,
            input_row: view.field(5, 8) as u8,
            routing: [
                Routing::from_bits(view.field(9, 11)),
                Routing::from_bits(view.field(12, 14)),
                Routing::from_bits(view.field(15, 17)),
                Routing::from_bits(view.field(18, 20)),
            ],
            constant: view.bit(21) != 0,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LINK o{} -> t{}", self.export_slot, self.input_row)?;
        for (lane, routing) in ["x", "y", "z", "w"].iter().zip(&self.routing) {
            write!(f, " {lane}={routing}")?;
        }
        if self.constant {
            write!(f, " const")?;
        }
        Ok(())
    }
}

/// Disassemble a single instruction to text
pub fn disassemble(words: &[u32; WORDS_PER_INSTRUCTION]) -> String {
    Instruction::decode(words).to_string()
}
