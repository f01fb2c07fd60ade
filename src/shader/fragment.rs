// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Fragment pipeline micro-op disassembly
//!
//! Unlike the vertex processor, the fragment pipeline has no single
//! instruction word. A scheduled [`Group`] combines micro-ops for up to
//! five stages: the pixel sequencer (PSEQ), the multi-function unit (MFU),
//! the texture unit (TEX), up to four 64-bit ALU slots and the data-write
//! unit (DW). Each stage decodes independently; the group is only a
//! scheduling container.
//!
//! ALU operands select one of six register classes. Embedded constants
//! come from the group's shared immediate word: the x10 datapath splits it
//! into three 10-bit [fx10][super::float::fx10_to_f32] lanes, the x20
//! datapath reads its low 20 bits as one
//! [fp20][super::float::fp20_to_f32] value.

use core::fmt;

use crate::bits::WordView;

use super::float;
use super::Modifiers;

/// ALU slot count limit per group
pub const MAX_ALU_SLOTS: usize = 4;

/// Register classes a fragment ALU operand can name
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterClass {
    /// Per-row working register
    Row,
    /// Global (uniform) register
    Global,
    /// Condition register
    Condition,
    /// Lane of the group's immediate word
    EmbeddedConstant,
    /// Interpolated fragment position
    Position,
    /// Polygon facing bit
    Face,
}

impl RegisterClass {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => Self::Row,
            1 => Self::Global,
            2 => Self::Condition,
            3 => Self::EmbeddedConstant,
            4 => Self::Position,
            _ => Self::Face,
        }
    }
}

/// ALU accumulation operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum AluOp {
    MAD,
    MIN,
    MAX,
    CSEL,
    Unknown(u8),
}

impl AluOp {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::MAD,
            1 => Self::MIN,
            2 => Self::MAX,
            3 => Self::CSEL,
            n => Self::Unknown(n as u8),
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(n) => write!(f, "AOP({n})"),
            op => write!(f, "{op:?}"),
        }
    }
}

/// Result scale applied after accumulation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scale {
    X1,
    X2,
    X4,
    Div2,
}

impl Scale {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => Self::X1,
            1 => Self::X2,
            2 => Self::X4,
            _ => Self::Div2,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X1 => Ok(()),
            Self::X2 => write!(f, "_x2"),
            Self::X4 => write!(f, "_x4"),
            Self::Div2 => write!(f, "_d2"),
        }
    }
}

/// A decoded ALU source operand
///
/// Twelve bits: class (3), index (5), negate, absolute, x10 high-half
/// select, one reserved bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Operand {
    pub class: RegisterClass,
    pub index: u8,
    pub modifiers: Modifiers,
    pub high_half: bool,
}

impl Operand {
    fn decode(view: &WordView, base: usize) -> Self {
        Self {
            class: RegisterClass::from_bits(view.field(base, base + 2)),
            index: view.field(base + 3, base + 7) as u8,
            modifiers: Modifiers {
                negate: view.bit(base + 8) != 0,
                absolute: view.bit(base + 9) != 0,
            },
            high_half: view.bit(base + 10) != 0,
        }
    }

    /// Render the operand, resolving embedded constants against `imm`
    fn display(&self, x20: bool, imm: Option<u32>) -> String {
        let half = if self.high_half { ".h" } else { ".l" };
        let name = match self.class {
            RegisterClass::Row => format!("r{}{half}", self.index),
            RegisterClass::Global => format!("g{}{half}", self.index),
            RegisterClass::Condition => format!("cr{}", self.index),
            RegisterClass::Position => format!("pos{half}"),
            RegisterClass::Face => "face".into(),
            RegisterClass::EmbeddedConstant => match imm {
                Some(imm) if x20 => float::display(float::fp20_to_f32(imm & 0xf_ffff)),
                Some(imm) => {
                    let lane = u32::from(self.index % 3);
                    float::display(float::fx10_to_f32(imm >> (10 * lane)))
                }
                None => format!("imm{}", self.index % 3),
            },
        };
        self.modifiers.wrap(name)
    }
}

/// A decoded 64-bit ALU slot
///
/// | bits   | field                         |
/// |--------|-------------------------------|
/// | 0..3   | destination register index    |
/// | 4      | destination is global         |
/// | 5      | destination high half         |
/// | 6..8   | opcode                        |
/// | 9..20  | source A                      |
/// | 21..32 | source B                      |
/// | 33..44 | source C                      |
/// | 45..46 | scale                         |
/// | 47     | accumulate                    |
/// | 48..51 | accumulator register index    |
/// | 52     | x20 datapath                  |
/// | 53     | saturate                      |
/// | 54     | condition write               |
/// | 55     | last slot in group            |
#[derive(Clone, Debug, PartialEq)]
pub struct AluInstruction {
    pub op: AluOp,
    pub dest: u8,
    pub dest_global: bool,
    pub dest_high: bool,
    pub sources: [Operand; 3],
    pub scale: Scale,
    pub accumulate: Option<u8>,
    pub x20: bool,
    pub saturate: bool,
    pub condition_write: bool,
    pub last_in_group: bool,
}

impl AluInstruction {
    /// Decode a slot from its two upload words
    pub fn decode(words: &[u32; 2]) -> Self {
        let view = WordView::new(words);
        Self {
            op: AluOp::from_bits(view.field(6, 8)),
            dest: view.field(0, 3) as u8,
            dest_global: view.bit(4) != 0,
            dest_high: view.bit(5) != 0,
            sources: [
                Operand::decode(&view, 9),
                Operand::decode(&view, 21),
                Operand::decode(&view, 33),
            ],
            scale: Scale::from_bits(view.field(45, 46)),
            accumulate: (view.bit(47) != 0).then(|| view.field(48, 51) as u8),
            x20: view.bit(52) != 0,
            saturate: view.bit(53) != 0,
            condition_write: view.bit(54) != 0,
            last_in_group: view.bit(55) != 0,
        }
    }

    /// Render the slot, resolving embedded constants against `imm`
    pub fn display(&self, imm: Option<u32>) -> String {
        let mut out = String::new();
        let dest_bank = if self.dest_global { "g" } else { "r" };
        let dest_half = if self.dest_high { "h" } else { "l" };
        let saturate = if self.saturate { "_sat" } else { "" };
        out.push_str(&format!(
            "{}{}{saturate} {dest_bank}{}.{dest_half}",
            self.op, self.scale, self.dest,
        ));
        for source in &self.sources {
            out.push_str(", ");
            out.push_str(&source.display(self.x20, imm));
        }
        if let Some(acc) = self.accumulate {
            out.push_str(&format!(" + r{acc}"));
        }
        if self.condition_write {
            out.push_str(" (cc)");
        }
        out
    }
}

/// Multi-function unit operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum MfuOp {
    NOP,
    RCP,
    RSQ,
    LG2,
    EX2,
    SQRT,
    SIN,
    COS,
    FRC,
    PREEXP,
    PRESIN,
    PRECOS,
    Unknown(u8),
}

impl MfuOp {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::NOP,
            1 => Self::RCP,
            2 => Self::RSQ,
            3 => Self::LG2,
            4 => Self::EX2,
            5 => Self::SQRT,
            6 => Self::SIN,
            7 => Self::COS,
            8 => Self::FRC,
            9 => Self::PREEXP,
            10 => Self::PRESIN,
            11 => Self::PRECOS,
            n => Self::Unknown(n as u8),
        }
    }
}

impl fmt::Display for MfuOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(n) => write!(f, "MOP({n})"),
            op => write!(f, "{op:?}"),
        }
    }
}

/// One varying-interpolation slot of the MFU word
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interpolation {
    pub tram_row: u8,
    pub perspective: bool,
}

/// A decoded 64-bit MFU word: op (4), source row (6), destination row (6),
/// then four 6-bit interpolation slots (enable, tram row (4), perspective)
#[derive(Clone, Debug, PartialEq)]
pub struct MfuInstruction {
    pub op: MfuOp,
    pub source: u8,
    pub dest: u8,
    pub interpolations: [Option<Interpolation>; 4],
}

impl MfuInstruction {
    pub fn decode(words: &[u32; 2]) -> Self {
        let view = WordView::new(words);
        let interpolation = |base: usize| {
            (view.bit(base) != 0).then(|| Interpolation {
                tram_row: view.field(base + 1, base + 4) as u8,
                perspective: view.bit(base + 5) != 0,
            })
        };
        Self {
            op: MfuOp::from_bits(view.field(0, 3)),
            source: view.field(4, 9) as u8,
            dest: view.field(10, 15) as u8,
            interpolations: [
                interpolation(16),
                interpolation(22),
                interpolation(28),
                interpolation(34),
            ],
        }
    }
}

impl fmt::Display for MfuInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op != MfuOp::NOP {
            write!(f, "{} r{}, r{}", self.op, self.dest, self.source)?;
        } else {
            write!(f, "NOP")?;
        }
        if self.interpolations.iter().any(Option::is_some) {
            write!(f, " ipl")?;
            for slot in &self.interpolations {
                match slot {
                    Some(i) => {
                        let mode = if i.perspective { "p" } else { "n" };
                        write!(f, " t{}.{mode}", i.tram_row)?;
                    }
                    None => write!(f, " -")?,
                }
            }
        }
        Ok(())
    }
}

/// A decoded 64-bit texture word: sampler (4), coordinate source row (6),
/// destination row (6), lod-bias enable, cube-map fetch
#[derive(Clone, Debug, PartialEq)]
pub struct TexInstruction {
    pub sampler: u8,
    pub source: u8,
    pub dest: u8,
    pub lod_bias: bool,
    pub cube: bool,
}

impl TexInstruction {
    pub fn decode(words: &[u32; 2]) -> Self {
        let view = WordView::new(words);
        Self {
            sampler: view.field(0, 3) as u8,
            source: view.field(4, 9) as u8,
            dest: view.field(10, 15) as u8,
            lod_bias: view.bit(16) != 0,
            cube: view.bit(17) != 0,
        }
    }
}

impl fmt::Display for TexInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TEX r{}, s{}, r{}", self.dest, self.sampler, self.source)?;
        if self.lod_bias {
            write!(f, " +lod")?;
        }
        if self.cube {
            write!(f, " cube")?;
        }
        Ok(())
    }
}

/// A decoded 32-bit pixel-sequencer word
#[derive(Clone, Debug, PartialEq)]
pub struct PseqInstruction {
    pub raw: u32,
}

impl PseqInstruction {
    pub fn decode(word: u32) -> Self {
        Self { raw: word }
    }
}

impl fmt::Display for PseqInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PSEQ {:#010x}", self.raw)
    }
}

/// A decoded 64-bit data-write word: source row (6), depth write, color
/// write, render target (4)
#[derive(Clone, Debug, PartialEq)]
pub struct DwInstruction {
    pub source: u8,
    pub depth: bool,
    pub color: bool,
    pub render_target: u8,
}

impl DwInstruction {
    pub fn decode(words: &[u32; 2]) -> Self {
        let view = WordView::new(words);
        Self {
            source: view.field(0, 5) as u8,
            depth: view.bit(6) != 0,
            color: view.bit(7) != 0,
            render_target: view.field(8, 11) as u8,
        }
    }
}

impl fmt::Display for DwInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DW rt{}, r{}", self.render_target, self.source)?;
        if self.color {
            write!(f, " color")?;
        }
        if self.depth {
            write!(f, " depth")?;
        }
        Ok(())
    }
}

/// One scheduled micro-op group
///
/// All stages are optional; an empty group is legal and disassembles to
/// nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    pub pseq: Option<PseqInstruction>,
    pub mfu: Option<MfuInstruction>,
    pub tex: Option<TexInstruction>,
    pub alu: Vec<AluInstruction>,
    pub dw: Option<DwInstruction>,
    /// Shared immediate word for embedded-constant operands
    pub imm: Option<u32>,
}

impl Group {
    /// Disassemble the group, one line per micro-op
    pub fn disassemble(&self) -> String {
        let mut lines = Vec::new();
        if let Some(pseq) = &self.pseq {
            lines.push(pseq.to_string());
        }
        if let Some(mfu) = &self.mfu {
            lines.push(format!("MFU {mfu}"));
        }
        if let Some(tex) = &self.tex {
            lines.push(tex.to_string());
        }
        for (slot, alu) in self.alu.iter().take(MAX_ALU_SLOTS).enumerate() {
            lines.push(format!("ALU{slot} {}", alu.display(self.imm)));
        }
        if let Some(dw) = &self.dw {
            lines.push(dw.to_string());
        }
        lines.join("\n")
    }
}
