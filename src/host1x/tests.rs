// Copyright (C) 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Push-buffer decoder tests
use super::*;

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Class(u16),
    Write(u16, u16, u32),
    Gather(u16, u16, u32),
    Restart(u32),
    Extend(u8, u32),
    Done,
}

#[derive(Default)]
struct Record(Vec<Event>);

impl CommandSink for Record {
    fn register_write(&mut self, class: u16, offset: u16, value: u32) {
        self.0.push(Event::Write(class, offset, value));
    }

    fn class_switch(&mut self, class: u16) {
        self.0.push(Event::Class(class));
    }

    fn gather(&mut self, offset: u16, words: u16, base: u32) {
        self.0.push(Event::Gather(offset, words, base));
    }

    fn restart(&mut self, base: u32) {
        self.0.push(Event::Restart(base));
    }

    fn extend(&mut self, subop: u8, value: u32) {
        self.0.push(Event::Extend(subop, value));
    }

    fn channel_done(&mut self) {
        self.0.push(Event::Done);
    }
}

/// Decode one command and assert kind and resulting cursor position
fn step(decoder: &mut Decoder, sink: &mut Record, kind: Opcode, pos: usize) {
    assert_eq!(decoder.decode_command(sink), Ok(Some(kind)));
    assert_eq!(decoder.position(), pos);
}

#[test]
fn setclass_with_mask() {
    // mask 0b101001 writes offsets +0, +3 and +5
    let words = [opcode::setclass(0x100, CLASS_GR3D, 0b101001), 1, 2, 3];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::SetClass, 4);
    assert_eq!(
        sink.0,
        vec![
            Event::Class(CLASS_GR3D),
            Event::Write(CLASS_GR3D, 0x100, 1),
            Event::Write(CLASS_GR3D, 0x103, 2),
            Event::Write(CLASS_GR3D, 0x105, 3),
        ],
    );
}

#[test]
fn setclass_without_writes() {
    let words = [opcode::setclass(0, CLASS_GR2D, 0)];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::SetClass, 1);
    assert_eq!(sink.0, vec![Event::Class(CLASS_GR2D)]);
}

#[test]
fn incr_advances_offset() {
    let words = [opcode::incr(0x500, 3), 10, 11, 12];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words).with_class(CLASS_GR2D);
    step(&mut decoder, &mut sink, Opcode::Incr, 4);
    assert_eq!(
        sink.0,
        vec![
            Event::Write(CLASS_GR2D, 0x500, 10),
            Event::Write(CLASS_GR2D, 0x501, 11),
            Event::Write(CLASS_GR2D, 0x502, 12),
        ],
    );
}

#[test]
fn nonincr_keeps_offset() {
    let words = [opcode::nonincr(0x700, 2), 20, 21];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words).with_class(CLASS_GR3D);
    step(&mut decoder, &mut sink, Opcode::NonIncr, 3);
    assert_eq!(
        sink.0,
        vec![
            Event::Write(CLASS_GR3D, 0x700, 20),
            Event::Write(CLASS_GR3D, 0x700, 21),
        ],
    );
}

#[test]
fn mask_writes_set_bits() {
    // bits 0, 2 and 15
    let words = [opcode::mask(0x040, 0x8005), 1, 2, 3];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words).with_class(CLASS_GR2D);
    step(&mut decoder, &mut sink, Opcode::Mask, 4);
    assert_eq!(
        sink.0,
        vec![
            Event::Write(CLASS_GR2D, 0x040, 1),
            Event::Write(CLASS_GR2D, 0x042, 2),
            Event::Write(CLASS_GR2D, 0x04f, 3),
        ],
    );
}

#[test]
fn imm_consumes_single_word() {
    let words = [opcode::imm(0x009, 0xabcd)];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::Imm, 1);
    assert_eq!(sink.0, vec![Event::Write(CLASS_HOST1X, 0x009, 0xabcd)]);
}

#[test]
fn restart_rebases_stream() {
    let words = [opcode::restart(0x1000_0000)];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::Restart, 1);
    assert_eq!(sink.0, vec![Event::Restart(0x1000_0000)]);
}

#[test]
fn gather_takes_base_word() {
    let words = [opcode::gather(0, 8), 0x0200_0000];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::Gather, 2);
    assert_eq!(sink.0, vec![Event::Gather(0, 8, 0x0200_0000)]);
}

#[test]
fn extend_and_chdone() {
    let words = [opcode::extend(2, 0x1234), opcode::chdone()];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::Extend, 1);
    step(&mut decoder, &mut sink, Opcode::ChDone, 2);
    assert_eq!(sink.0, vec![Event::Extend(2, 0x1234), Event::Done]);
    assert_eq!(decoder.decode_command(&mut sink), Ok(None));
}

#[test]
fn unknown_opcode_halts() {
    let words = [opcode::imm(0, 0), 0x7000_0000];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    step(&mut decoder, &mut sink, Opcode::Imm, 1);
    assert_eq!(
        decoder.decode_command(&mut sink),
        Err(Error::UnknownOpcode {
            opcode: 0x7,
            pos: 1,
        }),
    );
}

#[test]
fn truncated_incr() {
    let words = [opcode::incr(0, 3), 1];
    let mut decoder = Decoder::new(&words);
    assert_eq!(
        decoder.decode(&mut Record::default()),
        Err(Error::Truncated {
            pos: 0,
            missing: 2,
        }),
    );
}

#[test]
fn truncated_gather() {
    let words = [opcode::gather(0, 4)];
    let mut decoder = Decoder::new(&words);
    assert_eq!(
        decoder.decode(&mut Record::default()),
        Err(Error::Truncated {
            pos: 0,
            missing: 1,
        }),
    );
}

#[test]
fn class_persists_across_commands() {
    let words = [
        opcode::setclass(0, CLASS_GR3D, 0),
        opcode::imm(0x205, 1),
        opcode::imm(0x206, 2),
    ];
    let mut sink = Record::default();
    let mut decoder = Decoder::new(&words);
    decoder.decode(&mut sink).unwrap();
    assert_eq!(
        sink.0,
        vec![
            Event::Class(CLASS_GR3D),
            Event::Write(CLASS_GR3D, 0x205, 1),
            Event::Write(CLASS_GR3D, 0x206, 2),
        ],
    );
}

#[test]
fn dump_renders_stream() {
    let words = [
        opcode::setclass(0, CLASS_GR2D, 0),
        opcode::imm(0x009, 1),
        opcode::gather(0, 2), 0x4000,
        opcode::chdone(),
    ];
    let mut dump = Dump::new(false);
    Decoder::new(&words).decode(&mut dump).unwrap();
    let text = dump.finish();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "class GR2D",
            "  GR2D[0x009] = 0x00000001",
            "gather [0x000] 2 words @ 0x00004000",
            "done",
        ],
    );
}

#[test]
fn dump_disassembles_vertex_upload() {
    let mut stream = vec![opcode::setclass(0, CLASS_GR3D, 0), opcode::nonincr(0x206, 4)];
    stream.extend_from_slice(&[0, 0, 0, 0]);
    let mut dump = Dump::new(true);
    Decoder::new(&stream).decode(&mut dump).unwrap();
    assert!(dump.finish().contains("vs: NOP"));
}
