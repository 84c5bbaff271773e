//! Shared helpers for command implementations.

use anyhow::{Result, bail};
use chrono::{Local, NaiveDateTime};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a wall-clock timestamp argument.
pub fn parse_timestamp_arg(value: &str) -> Result<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(t);
        }
    }
    bail!("invalid timestamp '{value}', expected e.g. 2025-03-10T08:00:00");
}

/// Parses an optional timestamp argument, defaulting to the local wall clock.
pub fn timestamp_or_now(value: Option<&str>) -> Result<NaiveDateTime> {
    value.map_or_else(|| Ok(Local::now().naive_local()), parse_timestamp_arg)
}
