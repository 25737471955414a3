//! Profile segmentation.
//!
//! Classifies a continuous depth (or pressure-proxy) time-series into
//! discrete monotonic dive/climb excursions. Detection is a hysteresis scan:
//! a turning point is only accepted once the signal has reversed by at least
//! [`SegmenterConfig::noise_threshold`] and the reversal has persisted for at
//! least [`SegmenterConfig::min_duration`], which suppresses sensor jitter
//! and brief reversals. The first and last valid samples are always
//! candidate boundaries, so a clean monotonic dive yields exactly one
//! profile.

use crate::error::{AppResult, GliderError};
use crate::frame::nanmean;

/// One monotonic vertical excursion, bounded by epoch timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileInterval {
    pub start: f64,
    pub end: f64,
}

impl ProfileInterval {
    /// Mean epoch timestamp of the interval endpoints.
    pub fn mean_time(&self) -> f64 {
        nanmean(&[self.start, self.end])
    }
}

/// Tunable thresholds for turning-point acceptance.
///
/// The defaults suit a Slocum pressure sensor sampled every few seconds:
/// jitter is well under 0.1 dbar, and no real excursion reverses for less
/// than a few seconds. Deployments with noisier CTDs should raise
/// `noise_threshold` rather than post-filter the interval list.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Minimum monotonic movement (dbar or m) since the last accepted
    /// turning point before a reversal is believed. Default 0.25.
    pub noise_threshold: f64,
    /// Minimum duration (s) a reversal must persist before the turning
    /// point is accepted. Default 8.0.
    pub min_duration: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 0.25,
            min_duration: 8.0,
        }
    }
}

/// Segment a depth time-series into profile intervals.
///
/// Returns intervals strictly ordered by start time, non-overlapping, with
/// distinct starts. An empty or single-sample signal yields no intervals;
/// an all-NaN or flat signal is a [`GliderError::DegenerateSignal`] so the
/// caller can tell "nothing to segment" from "signal unusable".
pub fn find_profiles(
    times: &[f64],
    depths: &[f64],
    config: &SegmenterConfig,
) -> AppResult<Vec<ProfileInterval>> {
    if times.len() != depths.len() {
        return Err(GliderError::ConfigValidation(format!(
            "time series length {} does not match depth series length {}",
            times.len(),
            depths.len()
        )));
    }

    if times.is_empty() {
        return Ok(Vec::new());
    }

    // Drop rows where either coordinate is missing.
    let valid: Vec<(f64, f64)> = times
        .iter()
        .zip(depths)
        .filter(|(t, d)| t.is_finite() && d.is_finite())
        .map(|(t, d)| (*t, *d))
        .collect();

    if valid.is_empty() {
        return Err(GliderError::DegenerateSignal(
            "depth signal contains no valid samples".to_string(),
        ));
    }
    if valid.len() < 2 {
        return Ok(Vec::new());
    }

    let min_depth = valid.iter().map(|(_, d)| *d).fold(f64::INFINITY, f64::min);
    let max_depth = valid
        .iter()
        .map(|(_, d)| *d)
        .fold(f64::NEG_INFINITY, f64::max);
    if max_depth - min_depth < config.noise_threshold {
        return Err(GliderError::DegenerateSignal(format!(
            "depth signal is flat ({:.3} total range)",
            max_depth - min_depth
        )));
    }

    // Hysteresis scan. `extremum` tracks the running extremum of the
    // current excursion; a reversal larger than the noise threshold that
    // lasts at least the minimum duration turns it into a boundary.
    let mut turns: Vec<usize> = Vec::new();
    let mut direction: i8 = 0;
    let mut extremum = 0usize;
    for i in 1..valid.len() {
        let (t, d) = valid[i];
        let (ext_t, ext_d) = valid[extremum];
        match direction {
            0 => {
                if (d - ext_d).abs() >= config.noise_threshold {
                    direction = if d > ext_d { 1 } else { -1 };
                    extremum = i;
                }
            }
            1 => {
                if d >= ext_d {
                    extremum = i;
                } else if ext_d - d >= config.noise_threshold
                    && t - ext_t >= config.min_duration
                {
                    turns.push(extremum);
                    direction = -1;
                    extremum = i;
                }
            }
            _ => {
                if d <= ext_d {
                    extremum = i;
                } else if d - ext_d >= config.noise_threshold
                    && t - ext_t >= config.min_duration
                {
                    turns.push(extremum);
                    direction = 1;
                    extremum = i;
                }
            }
        }
    }

    // The first and last valid samples are always candidate boundaries.
    let mut boundaries = Vec::with_capacity(turns.len() + 2);
    boundaries.push(0);
    for turn in turns {
        if turn != 0 && turn != valid.len() - 1 {
            boundaries.push(turn);
        }
    }
    boundaries.push(valid.len() - 1);

    let mut intervals = Vec::with_capacity(boundaries.len().saturating_sub(1));
    for pair in boundaries.windows(2) {
        let start = valid[pair[0]].0;
        let end = valid[pair[1]].0;
        if start < end {
            intervals.push(ProfileInterval { start, end });
        }
    }

    Ok(intervals)
}
