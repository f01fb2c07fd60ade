// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Vertex processor VLIW disassembly
//!
//! A vertex instruction is 128 bits wide, uploaded as four words and
//! issued to a vector unit and a scalar unit in parallel. The bit layout
//! below is addressed through a word-reversed [`WordView`], so positions
//! match the encoding tables:
//!
//! | bits      | field                               |
//! |-----------|-------------------------------------|
//! | 0         | end of program                      |
//! | 1..4      | vector write mask (x highest)       |
//! | 5..8      | scalar write mask                   |
//! | 9..14     | vector destination register         |
//! | 15        | export enable                       |
//! | 16..20    | export slot                         |
//! | 21..26    | scalar opcode                       |
//! | 27..32    | vector opcode                       |
//! | 33..52    | source C                            |
//! | 53..72    | source B                            |
//! | 73..92    | source A                            |
//! | 93..98    | attribute fetch slot                |
//! | 99..106   | uniform fetch slot                  |
//! | 107       | saturate                            |
//! | 108       | condition write enable              |
//! | 109..110  | condition test                      |
//! | 111..116  | scalar destination register         |
//!
//! Sources are 20 bits each: class (2), register index (6), swizzle (8),
//! negate (1), absolute (1), two reserved bits.

use core::fmt;

use crate::bits::WordView;

use super::{Modifiers, Swizzle, WriteMask};

/// Number of 32-bit words per instruction
pub const WORDS_PER_INSTRUCTION: usize = 4;

/// Register classes a vertex source operand can name
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterClass {
    Temporary,
    Attribute,
    Uniform,
    Condition,
}

impl RegisterClass {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => Self::Temporary,
            1 => Self::Attribute,
            2 => Self::Uniform,
            _ => Self::Condition,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Self::Temporary => "r",
            Self::Attribute => "a",
            Self::Uniform => "c",
            Self::Condition => "cc",
        }
    }
}

/// Vector unit operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum VectorOp {
    NOP,
    MOV,
    MUL,
    ADD,
    MAD,
    DP3,
    DPH,
    DP4,
    DST,
    MIN,
    MAX,
    SLT,
    SGE,
    ARL,
    FRC,
    FLR,
    SEQ,
    SFL,
    SGT,
    SLE,
    SNE,
    STR,
    SSG,
    Unknown(u8),
}

impl VectorOp {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::NOP,
            1 => Self::MOV,
            2 => Self::MUL,
            3 => Self::ADD,
            4 => Self::MAD,
            5 => Self::DP3,
            6 => Self::DPH,
            7 => Self::DP4,
            8 => Self::DST,
            9 => Self::MIN,
            10 => Self::MAX,
            11 => Self::SLT,
            12 => Self::SGE,
            13 => Self::ARL,
            14 => Self::FRC,
            15 => Self::FLR,
            16 => Self::SEQ,
            17 => Self::SFL,
            18 => Self::SGT,
            19 => Self::SLE,
            20 => Self::SNE,
            21 => Self::STR,
            22 => Self::SSG,
            n => Self::Unknown(n as u8),
        }
    }

    /// Number of source operands the operation reads
    fn arity(&self) -> usize {
        match self {
            Self::NOP => 0,
            Self::MOV | Self::FRC | Self::FLR | Self::ARL | Self::SSG => 1,
            Self::MAD => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for VectorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(n) => write!(f, "VOP({n})"),
            op => write!(f, "{op:?}"),
        }
    }
}

/// Scalar unit operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ScalarOp {
    NOP,
    MOV,
    RCP,
    RCC,
    RSQ,
    EXP,
    LOG,
    LIT,
    LG2,
    EX2,
    SIN,
    COS,
    Unknown(u8),
}

impl ScalarOp {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::NOP,
            1 => Self::MOV,
            2 => Self::RCP,
            3 => Self::RCC,
            4 => Self::RSQ,
            5 => Self::EXP,
            6 => Self::LOG,
            7 => Self::LIT,
            8 => Self::LG2,
            9 => Self::EX2,
            10 => Self::SIN,
            11 => Self::COS,
            n => Self::Unknown(n as u8),
        }
    }
}

impl fmt::Display for ScalarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(n) => write!(f, "SOP({n})"),
            op => write!(f, "{op:?}"),
        }
    }
}

/// A decoded source operand
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub class: RegisterClass,
    pub index: u8,
    pub swizzle: Swizzle,
    pub modifiers: Modifiers,
}

impl Source {
    fn decode(view: &WordView, base: usize) -> Self {
        Self {
            class: RegisterClass::from_bits(view.field(base, base + 1)),
            index: view.field(base + 2, base + 7) as u8,
            swizzle: Swizzle::from_bits(view.field(base + 8, base + 15)),
            modifiers: Modifiers {
                negate: view.bit(base + 16) != 0,
                absolute: view.bit(base + 17) != 0,
            },
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut name = format!("{}{}", self.class.prefix(), self.index);
        if self.swizzle != Swizzle::IDENTITY {
            name = format!("{name}.{}", self.swizzle);
        }
        write!(f, "{}", self.modifiers.wrap(name))
    }
}

/// Condition test gating the register writes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConditionTest {
    Always,
    LessThan,
    Equal,
    GreaterThan,
}

impl ConditionTest {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => Self::Always,
            1 => Self::LessThan,
            2 => Self::Equal,
            _ => Self::GreaterThan,
        }
    }
}

/// A decoded 128-bit vertex instruction
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub vector_op: VectorOp,
    pub scalar_op: ScalarOp,
    pub vector_mask: WriteMask,
    pub scalar_mask: WriteMask,
    pub vector_dest: u8,
    pub scalar_dest: u8,
    pub export: Option<u8>,
    pub sources: [Source; 3],
    pub attribute_slot: u8,
    pub uniform_slot: u8,
    pub saturate: bool,
    pub condition_write: bool,
    pub condition_test: ConditionTest,
    pub end_of_program: bool,
}

impl Instruction {
    /// Decode an instruction from its four words in upload order
    pub fn decode(words: &[u32; WORDS_PER_INSTRUCTION]) -> Self {
        let view = WordView::new(words);
        Self {
            vector_op: VectorOp::from_bits(view.field(27, 32)),
            scalar_op: ScalarOp::from_bits(view.field(21, 26)),
            vector_mask: WriteMask(view.field(1, 4)),
            scalar_mask: WriteMask(view.field(5, 8)),
            vector_dest: view.field(9, 14) as u8,
            scalar_dest: view.field(111, 116) as u8,
            export: (view.bit(15) != 0).then(|| view.field(16, 20) as u8),
            sources: [
                Source::decode(&view, 73),
                Source::decode(&view, 53),
                Source::decode(&view, 33),
            ],
            attribute_slot: view.field(93, 98) as u8,
            uniform_slot: view.field(99, 106) as u8,
            saturate: view.bit(107) != 0,
            condition_write: view.bit(108) != 0,
            condition_test: ConditionTest::from_bits(view.field(109, 110)),
            end_of_program: view.bit(0) != 0,
        }
    }

    fn destination(&self) -> String {
        match self.export {
            Some(slot) => format!("o{slot}.{}", self.vector_mask),
            None => format!("r{}.{}", self.vector_dest, self.vector_mask),
        }
    }

    fn issue(&self, f: &mut fmt::Formatter<'_>, op: String, dest: String, arity: usize) -> fmt::Result {
        write!(f, "{op} {dest}")?;
        for source in &self.sources[..arity] {
            write!(f, ", {source}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.vector_op != VectorOp::NOP && !self.vector_mask.is_empty() {
            let saturate = if self.saturate { "_sat" } else { "" };
            self.issue(
                f,
                format!("{}v{saturate}", self.vector_op),
                self.destination(),
                self.vector_op.arity(),
            )?;
            first = false;
        }
        if self.scalar_op != ScalarOp::NOP && !self.scalar_mask.is_empty() {
            if !first {
                write!(f, "; ")?;
            }
            // the scalar unit always reads source C
            write!(
                f,
                "{}s r{}.{}, {}",
                self.scalar_op, self.scalar_dest, self.scalar_mask, self.sources[2],
            )?;
            first = false;
        }
        if first {
            write!(f, "NOP")?;
        }
        if self.end_of_program {
            write!(f, " ; end")?;
        }
        Ok(())
    }
}

/// Disassemble a single instruction to text
pub fn disassemble(words: &[u32; WORDS_PER_INSTRUCTION]) -> String {
    Instruction::decode(words).to_string()
}
