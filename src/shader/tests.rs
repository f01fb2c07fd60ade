// Copyright (C) 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Disassembler tests
//!
//! Instructions are assembled through [`WordView::set_field`] against the
//! documented encoding tables and the resulting text is checked verbatim.
use crate::bits::WordView;

use super::fragment::{self, AluOp, RegisterClass as FragClass, Scale};
use super::linker::{self, Routing};
use super::vertex::{self, ConditionTest, RegisterClass, ScalarOp, VectorOp};
use super::{Component, Modifiers, Swizzle};

fn vertex_words(build: impl FnOnce(&mut WordView)) -> [u32; 4] {
    let mut view = WordView::new(&[0; 4]);
    build(&mut view);
    view.words().try_into().unwrap()
}

fn pair_words(build: impl FnOnce(&mut WordView)) -> [u32; 2] {
    let mut view = WordView::new(&[0; 2]);
    build(&mut view);
    view.words().try_into().unwrap()
}

#[test]
fn vertex_dual_issue() {
    let words = vertex_words(|v| {
        v.set_bit(0, 1); // end of program
        v.set_field(1, 4, 0b1110); // vector mask xyz
        v.set_field(5, 8, 0b1000); // scalar mask x
        v.set_field(9, 14, 3); // vector dest r3
        v.set_field(111, 116, 5); // scalar dest r5
        v.set_field(27, 32, 4); // MAD
        v.set_field(21, 26, 4); // RSQ
        // source A: r1.xyzw
        v.set_field(75, 80, 1);
        v.set_field(81, 88, 0xe4);
        // source B: -c12.xxxx
        v.set_field(53, 54, 2);
        v.set_field(55, 60, 12);
        v.set_bit(69, 1);
        // source C: r1.wwww
        v.set_field(35, 40, 1);
        v.set_field(41, 48, 0xff);
    });

    let insn = vertex::Instruction::decode(&words);
    assert_eq!(insn.vector_op, VectorOp::MAD);
    assert_eq!(insn.scalar_op, ScalarOp::RSQ);
    assert_eq!(insn.sources[0].class, RegisterClass::Temporary);
    assert_eq!(insn.sources[0].swizzle, Swizzle::IDENTITY);
    assert_eq!(insn.sources[1].class, RegisterClass::Uniform);
    assert_eq!(
        insn.sources[1].modifiers,
        Modifiers {
            negate: true,
            absolute: false,
        },
    );
    assert_eq!(insn.condition_test, ConditionTest::Always);
    assert!(insn.end_of_program);
    assert_eq!(
        insn.to_string(),
        "MADv r3.xyz, r1, -c12.xxxx, r1.wwww; RSQs r5.x, r1.wwww ; end",
    );
}

#[test]
fn vertex_export_and_saturate() {
    let words = vertex_words(|v| {
        v.set_field(1, 4, 0b1111);
        v.set_field(27, 32, 1); // MOV
        v.set_bit(15, 1); // export
        v.set_field(16, 20, 6); // o6
        v.set_bit(107, 1); // saturate
        // source A: |a2.yyyy|
        v.set_field(73, 74, 1);
        v.set_field(75, 80, 2);
        v.set_field(81, 88, 0x55);
        v.set_bit(90, 1);
    });

    assert_eq!(vertex::disassemble(&words), "MOVv_sat o6.xyzw, |a2.yyyy|");
}

#[test]
fn vertex_all_nops() {
    let insn = vertex::Instruction::decode(&[0; 4]);
    assert_eq!(insn.vector_op, VectorOp::NOP);
    assert_eq!(insn.scalar_op, ScalarOp::NOP);
    assert_eq!(insn.to_string(), "NOP");
}

#[test]
fn vertex_swizzle_lanes() {
    assert_eq!(Swizzle::from_bits(0xe4), Swizzle::IDENTITY);
    assert_eq!(
        Swizzle::from_bits(0x00),
        Swizzle([Component::X, Component::X, Component::X, Component::X]),
    );
    assert_eq!(Swizzle::from_bits(0x1b).to_string(), "wzyx");
}

#[test]
fn fragment_alu_fx10_immediate() {
    let words = pair_words(|v| {
        v.set_field(0, 3, 2); // dest r2
        v.set_bit(5, 1); // high half
        v.set_field(6, 8, 0); // MAD
        // source A: r1
        v.set_field(12, 16, 1);
        // source B: embedded constant, lane 1
        v.set_field(21, 23, 3);
        v.set_field(24, 28, 1);
        // source C: g0
        v.set_field(33, 35, 1);
        v.set_field(45, 46, 1); // x2
    });

    let insn = fragment::AluInstruction::decode(&words);
    assert_eq!(insn.op, AluOp::MAD);
    assert_eq!(insn.scale, Scale::X2);
    assert_eq!(insn.sources[1].class, FragClass::EmbeddedConstant);
    // lane 1 of the immediate word holds fx10 0x080 = 0.5
    assert_eq!(insn.display(Some(0x080 << 10)), "MAD_x2 r2.h, r1.l, 0.5, g0.l");
    // without an immediate word the lane is named, not resolved
    assert_eq!(insn.display(None), "MAD_x2 r2.h, r1.l, imm1, g0.l");
}

#[test]
fn fragment_alu_fp20_immediate() {
    let words = pair_words(|v| {
        v.set_field(6, 8, 2); // MAX
        v.set_field(9, 11, 3); // source A: embedded constant, lane 0
        v.set_field(33, 35, 4); // source C: position
        v.set_bit(52, 1); // x20 datapath
        v.set_bit(47, 1); // accumulate
        v.set_field(48, 51, 7); // into r7
    });

    let insn = fragment::AluInstruction::decode(&words);
    assert!(insn.x20);
    // fp20 with exponent 31 and zero mantissa is 1.0
    assert_eq!(
        insn.display(Some(31 << 13)),
        "MAX r0.l, 1.0, r0.l, pos.l + r7",
    );
}

#[test]
fn fragment_group_lines() {
    let alu = fragment::AluInstruction::decode(&pair_words(|v| {
        v.set_field(0, 3, 1);
        v.set_bit(55, 1); // last in group
    }));
    assert!(alu.last_in_group);

    let group = fragment::Group {
        pseq: Some(fragment::PseqInstruction::decode(0x0000_0001)),
        mfu: Some(fragment::MfuInstruction::decode(&pair_words(|v| {
            v.set_field(0, 3, 1); // RCP
            v.set_field(4, 9, 2);
            v.set_field(10, 15, 4);
            v.set_bit(16, 1); // ipl slot 0: t3, perspective
            v.set_field(17, 20, 3);
            v.set_bit(21, 1);
        }))),
        tex: Some(fragment::TexInstruction::decode(&pair_words(|v| {
            v.set_field(0, 3, 1);
            v.set_field(4, 9, 0);
            v.set_field(10, 15, 2);
            v.set_bit(17, 1); // cube
        }))),
        alu: vec![alu],
        dw: Some(fragment::DwInstruction::decode(&pair_words(|v| {
            v.set_field(0, 5, 1);
            v.set_bit(7, 1); // color
        }))),
        imm: None,
    };

    let text = group.disassemble();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "PSEQ 0x00000001",
            "MFU RCP r4, r2 ipl t3.p - - -",
            "TEX r2, s1, r0 cube",
            "ALU0 MAD r1.l, r0.l, r0.l, r0.l",
            "DW rt0, r1 color",
        ],
    );
}

#[test]
fn linker_routing() {
    let words = pair_words(|v| {
        v.set_field(0, 4, 4); // o4
        v.set_field(5, 8, 1); // t1
        v.set_field(9, 11, 2); // x perspective
        v.set_field(12, 14, 2); // y perspective
        v.set_field(15, 17, 1); // z flat
    });

    let insn = linker::Instruction::decode(&words);
    assert_eq!(insn.export_slot, 4);
    assert_eq!(insn.input_row, 1);
    assert_eq!(
        insn.routing,
        [Routing::Perspective, Routing::Perspective, Routing::Flat, Routing::Disabled],
    );
    assert_eq!(
        linker::disassemble(&words),
        "LINK o4 -> t1 x=persp y=persp z=flat w=off",
    );
}

#[test]
fn linker_constant_flag() {
    let words = pair_words(|v| {
        v.set_field(9, 11, 1);
        v.set_bit(21, 1);
    });
    assert_eq!(
        linker::disassemble(&words),
        "LINK o0 -> t0 x=flat y=off z=off w=off const",
    );
}
