// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup.
//!
//! `RUST_LOG` sets the filter (default `info,tower_http=debug`). `LOG_FORMAT`
//! selects `json` or `pretty` output (default `pretty`).

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unable to set global default subscriber: {0}")]
pub struct LoggingInitError(#[source] Box<dyn std::error::Error + Send + Sync + 'static>);

/// Install the global subscriber. Errors if one is already installed.
pub fn init() -> Result<(), LoggingInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    result.map_err(LoggingInitError)
}
