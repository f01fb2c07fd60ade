// Copyright (C) 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Word-view tests
use super::*;

#[test]
fn word_order_is_reversed() {
    // bit 0 is the LSB of the last supplied word
    let view = WordView::new(&[0x8000_0000, 0x0000_0001]);
    assert_eq!(view.bit(0), 1);
    assert_eq!(view.bit(63), 1);
    assert_eq!(view.bit(1), 0);
    assert_eq!(view.bit(62), 0);
}

#[test]
fn field_crosses_word_boundary() {
    let view = WordView::new(&[0b101, 0xc000_0000]);
    // bits 30..=34 pick up the two top bits of the last word and the low
    // three bits of the first
    assert_eq!(view.field(30, 34), 0b10111);
}

#[test]
fn field_msb_is_upper_position() {
    let mut view = WordView::new(&[0]);
    view.set_bit(7, 1);
    assert_eq!(view.field(4, 7), 0b1000);
    assert_eq!(view.field(7, 10), 0b0001);
}

#[test]
fn insert_extract_round_trip() {
    for (from, to) in [(0, 0), (3, 10), (28, 37), (40, 71), (90, 95)] {
        let mut view = WordView::new(&[0; 3]);
        let value = 0xdead_beef;
        view.set_field(from, to, value);
        let width = to - from + 1;
        let mask = if width == 32 { u32::MAX } else { (1 << width) - 1 };
        assert_eq!(view.field(from, to), value & mask, "span {from}..={to}");
    }
}

#[test]
fn insert_does_not_clobber_neighbours() {
    let mut view = WordView::new(&[u32::MAX; 2]);
    view.set_field(10, 13, 0);
    assert_eq!(view.field(6, 9), 0xf);
    assert_eq!(view.field(10, 13), 0);
    assert_eq!(view.field(14, 17), 0xf);
}

#[test]
fn out_of_range_reads_yield_zero() {
    let view = WordView::new(&[u32::MAX]);
    assert_eq!(view.bit(32), 0);
    assert_eq!(view.field(30, 33), 0);
    assert_eq!(view.field(0, 32), 0); // 33-bit span
    assert_eq!(view.field(8, 4), 0); // reversed bounds
}

#[test]
fn out_of_range_writes_are_dropped() {
    let mut view = WordView::new(&[0]);
    view.set_bit(40, 1);
    view.set_field(20, 52, u32::MAX);
    assert_eq!(view.words(), vec![0]);
}

#[test]
fn words_returns_original_order() {
    let words = [0x1111_1111, 0x2222_2222, 0x3333_3333];
    assert_eq!(WordView::new(&words).words(), words);
}
