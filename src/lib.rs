// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! # Interception, decoding and record/replay for Tegra20 GPU channel traffic
//!
//! This crate reverse-engineers the command traffic a graphics client issues
//! against the Tegra20 kernel driver stack: the `nvmap` buffer-object
//! allocator, the `nvhost` 2D/3D channel devices and the `nvhost-ctrl`
//! control device. It shadows the file descriptors of those devices,
//! decodes the host1x command-stream opcode language and the GR3D shader
//! instruction words, and serializes every tracked operation into a binary
//! trace which [`replay`] later reconstructs against a live driver.
//!
//! See [`wrap`] for the device-file shadow registry, [`host1x`] for the
//! command-stream decoder, [`shader`] for the instruction disassemblers and
//! [`trace`]/[`replay`] for the capture log and its replay engine.
//!
//! # Example
//!
//! The following example decodes a small host1x push buffer and collects
//! the register writes it performs.
//!
//! ```
//! use tegra_trace::host1x::{self, CommandSink, Decoder};
//!
//! #[derive(Default)]
//! struct Writes(Vec<(u16, u16, u32)>);
//!
//! impl CommandSink for Writes {
//!     fn register_write(&mut self, class: u16, offset: u16, value: u32) {
//!         self.0.push((class, offset, value));
//!     }
//! }
//!
//! // setclass GR2D, then an immediate write and a two-word increment burst
//! let stream = [
//!     host1x::opcode::setclass(0x000, 0x51, 0x0),
//!     host1x::opcode::imm(0x009, 0x0001),
//!     host1x::opcode::incr(0x01e, 2),
//!     0xdead_0000,
//!     0xdead_0001,
//! ];
//!
//! let mut writes = Writes::default();
//! Decoder::new(&stream).decode(&mut writes).unwrap();
//! assert_eq!(
//!     writes.0,
//!     vec![
//!         (0x51, 0x009, 0x0001),
//!         (0x51, 0x01e, 0xdead_0000),
//!         (0x51, 0x01f, 0xdead_0001),
//!     ],
//! );
//! ```

pub mod bits;
pub mod config;
pub mod host1x;
pub mod replay;
pub mod shader;
pub mod trace;
pub mod wrap;

pub use config::Config;
