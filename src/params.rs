//! Parsing of the mode-specific string parameters commands carry.
//!
//! All parsers are total: malformed or missing input falls back to the
//! documented default instead of failing the command.

use crate::constants::{DEFAULT_INTERP_COUNT, DEFAULT_PLOT_INTERVALS};
use crate::types::CalculationBasis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Write semantics for a single value update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Overwrite an existing value at the timestamp (default)
    Replace,
    /// Keep both the old and the new value
    Insert,
    /// Skip the write when a value already exists at the timestamp
    NoReplace,
    /// Skip the write when no value exists at the timestamp
    ReplaceOnly,
    /// Insert bypassing archive compression
    InsertNoCompression,
    /// Remove the value at the timestamp (delete fallback path)
    Remove,
}

impl UpdateMode {
    pub fn parse(token: Option<&str>) -> Self {
        match token {
            Some("i") => UpdateMode::Insert,
            Some("nr") => UpdateMode::NoReplace,
            Some("ro") => UpdateMode::ReplaceOnly,
            Some("inc") => UpdateMode::InsertNoCompression,
            Some("rm") => UpdateMode::Remove,
            _ => UpdateMode::Replace,
        }
    }
}

/// Buffering policy for a write, orthogonal to the update mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferMode {
    BufferIfPossible,
    DoNotBuffer,
    Buffer,
}

impl BufferMode {
    pub fn parse(token: Option<&str>) -> Self {
        match token {
            Some("dnb") => BufferMode::DoNotBuffer,
            Some("buf") => BufferMode::Buffer,
            _ => BufferMode::BufferIfPossible,
        }
    }
}

/// Sub-mode of the interpolated read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationSpec {
    /// Evenly spaced sample count across the range
    ByCount(u32),
    /// Fixed sample interval
    ByInterval(Duration),
}

/// Maximum values per point for the archived read; 0 means unbounded
pub fn parse_max_count(param: Option<&str>) -> u32 {
    param.and_then(|p| p.parse().ok()).unwrap_or(0)
}

/// Target pixel-bucket count for the plot read
pub fn parse_plot_intervals(param: Option<&str>) -> u32 {
    param
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PLOT_INTERVALS)
}

/// `c=<n>` selects the count sub-mode; anything else is tried as a
/// duration and falls back to `default_interval` when unparsable or zero
pub fn parse_interpolation(param: Option<&str>, default_interval: Duration) -> InterpolationSpec {
    match param {
        Some(p) if p.starts_with("c=") => {
            let count = p[2..].parse().unwrap_or(DEFAULT_INTERP_COUNT);
            InterpolationSpec::ByCount(count)
        }
        Some(p) => match humantime::parse_duration(p) {
            Ok(interval) if !interval.is_zero() => InterpolationSpec::ByInterval(interval),
            _ => InterpolationSpec::ByInterval(default_interval),
        },
        None => InterpolationSpec::ByInterval(default_interval),
    }
}

/// `t` selects time weighting; everything else is event weighted
pub fn parse_basis(param: Option<&str>) -> CalculationBasis {
    match param {
        Some("t") => CalculationBasis::TimeWeighted,
        _ => CalculationBasis::EventWeighted,
    }
}
