use serde::{Deserialize, Serialize};

use crate::db::models::{GlucoseReading, TargetRange};

/// How many of the most recent readings the trend looks at.
const TREND_WINDOW: usize = 5;
/// Fewer readings than this and the trend is reported as stable.
const TREND_MIN_READINGS: usize = 3;
/// mg/dL difference between newest and oldest pairs that counts as movement.
const TREND_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

/// Aggregates over one window, all in mg/dL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseStats {
    #[serde(rename = "avgGlucose")]
    pub avg: f64,
    #[serde(rename = "minGlucose")]
    pub min: f64,
    #[serde(rename = "maxGlucose")]
    pub max: f64,
    #[serde(rename = "stdDeviation")]
    pub std_dev: f64,
    #[serde(rename = "timeInRange")]
    pub time_in_range_percent: f64,
    pub readings_count: usize,
    pub trend: Trend,
}

impl GlucoseStats {
    fn empty() -> Self {
        Self {
            avg: 0.0,
            min: 0.0,
            max: 0.0,
            std_dev: 0.0,
            time_in_range_percent: 0.0,
            readings_count: 0,
            trend: Trend::Stable,
        }
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compute statistics for `readings`, which must be ordered oldest first.
pub fn compute(readings: &[GlucoseReading], range: &TargetRange) -> GlucoseStats {
    if readings.is_empty() {
        return GlucoseStats::empty();
    }

    let values: Vec<f64> = readings.iter().map(GlucoseReading::mg_dl).collect();
    let avg = mean(&values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let in_range = values.iter().filter(|v| range.contains(**v)).count();

    GlucoseStats {
        avg: round1(avg),
        min,
        max,
        std_dev: round1(variance.sqrt()),
        time_in_range_percent: round1(in_range as f64 / values.len() as f64 * 100.0),
        readings_count: values.len(),
        trend: trend(&values),
    }
}

/// Trend over the last `TREND_WINDOW` values of an oldest-first series:
/// mean of the two newest minus mean of the two oldest in that window.
pub fn trend(values: &[f64]) -> Trend {
    let recent = &values[values.len().saturating_sub(TREND_WINDOW)..];
    if recent.len() < TREND_MIN_READINGS {
        return Trend::Stable;
    }

    let oldest = mean(&recent[..2]);
    let newest = mean(&recent[recent.len() - 2..]);
    let diff = newest - oldest;

    if diff > TREND_THRESHOLD {
        Trend::Rising
    } else if diff < -TREND_THRESHOLD {
        Trend::Falling
    } else {
        Trend::Stable
    }
}
