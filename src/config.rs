// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Configuration and process-wide setup utilities

use std::path::PathBuf;

/// Name of the environment variable selecting the trace output path
///
/// Setting this variable enables recording; in its absence every recording
/// call is a no-op.
pub const OUTPUT_ENV: &str = "TEGRA_TRACE_OUT";

/// Name of the environment variable enabling verbose textual tracing
pub const VERBOSE_ENV: &str = "TEGRA_TRACE_VERBOSE";

/// Wrapper configuration
///
/// A configuration controls whether intercepted traffic is recorded to a
/// trace file and whether the textual command-stream dump is emitted. It is
/// constructed once at process start and threaded through the intercepted
/// call entry points via [`Registry`][crate::wrap::Registry].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Path of the trace file to record to, `None` disables recording
    pub output: Option<PathBuf>,
    /// Emit the textual command-stream and disassembly dump
    pub verbose: bool,
}

impl Config {
    /// Construct a configuration from the process environment
    pub fn from_env() -> Self {
        let output = std::env::var_os(OUTPUT_ENV).map(PathBuf::from);
        let verbose = std::env::var_os(VERBOSE_ENV).is_some_and(|v| v != "0");
        Self { output, verbose }
    }

    /// Install a `tracing` subscriber honoring this configuration
    ///
    /// Textual tracing is emitted at `trace` level when [`Config::verbose`]
    /// is set and at `info` level otherwise, unless `RUST_LOG` overrides the
    /// filter. Installation failures are ignored so a host application that
    /// already installed a subscriber keeps its own.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let default = if self.verbose { "trace" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
