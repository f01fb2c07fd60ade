// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Control device shadow
//!
//! The control device only carries sync-point queries and waits. Nothing
//! needs reconstruction at replay time, the hooks merely narrate the
//! traffic.

use tracing::{debug, warn};

use super::ioctl;

/// Shadow state of one open control descriptor
#[derive(Debug, Default)]
pub struct CtrlShadow;

impl CtrlShadow {
    /// Inspect a completed control ioctl
    pub(crate) fn leave_ioctl(&mut self, request: u32, arg: &[u8]) {
        match request {
            ioctl::NVHOST_IOC_CTRL_SYNCPT_READ => {
                debug!(
                    syncpt = ioctl::field(arg, 0),
                    value = ioctl::field(arg, 1),
                    "sync point read",
                );
            }
            ioctl::NVHOST_IOC_CTRL_SYNCPT_INCR => {
                debug!(syncpt = ioctl::field(arg, 0), "sync point incremented");
            }
            ioctl::NVHOST_IOC_CTRL_SYNCPT_WAIT => {
                debug!(
                    syncpt = ioctl::field(arg, 0),
                    thresh = ioctl::field(arg, 1),
                    timeout = ioctl::field(arg, 2),
                    "sync point wait",
                );
            }
            ioctl::NVHOST_IOC_CTRL_SYNCPT_WAITEX => {
                debug!(
                    syncpt = ioctl::field(arg, 0),
                    thresh = ioctl::field(arg, 1),
                    timeout = ioctl::field(arg, 2),
                    value = ioctl::field(arg, 3),
                    "sync point wait (extended)",
                );
            }
            ioctl::NVHOST_IOC_CTRL_GET_VERSION => {
                debug!(version = ioctl::field(arg, 0), "driver version queried");
            }
            _ => {
                warn!(request = %format_args!("{request:#010x}"), "unknown control ioctl");
            }
        }
    }
}
