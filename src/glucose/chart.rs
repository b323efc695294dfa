//! Hour/day bucketing for chart series.
//!
//! Buckets are aligned to UTC hour and day boundaries. The iterator borrows an
//! oldest-first slice and yields one bucket per non-empty interval, so calling
//! `buckets` again on the same slice always yields the same sequence.

use std::str::FromStr;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::stats::round1;
use crate::db::models::GlucoseReading;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
}

impl Granularity {
    fn width(&self) -> TimeDelta {
        match self {
            Granularity::Hour => TimeDelta::hours(1),
            Granularity::Day => TimeDelta::days(1),
        }
    }

    /// Start of the UTC hour or day containing `at`.
    pub fn truncate(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        // Only fails for timestamps outside chrono's nanosecond range.
        at.duration_trunc(self.width()).unwrap_or(at)
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            other => Err(format!("unknown chart interval '{other}', expected hour or day")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartBucket {
    #[serde(rename = "timestamp")]
    pub bucket_start: DateTime<Utc>,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl ChartBucket {
    fn from_readings(bucket_start: DateTime<Utc>, readings: &[GlucoseReading]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for value in readings.iter().map(GlucoseReading::mg_dl) {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }

        Self {
            bucket_start,
            avg: round1(sum / readings.len() as f64),
            min,
            max,
            count: readings.len(),
        }
    }
}

/// Lazily groups consecutive readings that fall in the same interval.
#[derive(Debug, Clone)]
pub struct Buckets<'a> {
    remaining: &'a [GlucoseReading],
    granularity: Granularity,
}

impl Iterator for Buckets<'_> {
    type Item = ChartBucket;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.remaining.first()?;
        let start = self.granularity.truncate(first.measured_at);
        let len = self
            .remaining
            .iter()
            .take_while(|r| self.granularity.truncate(r.measured_at) == start)
            .count();

        let (bucket, rest) = self.remaining.split_at(len);
        self.remaining = rest;
        Some(ChartBucket::from_readings(start, bucket))
    }
}

/// `readings` must be ordered oldest first.
pub fn buckets(readings: &[GlucoseReading], granularity: Granularity) -> Buckets<'_> {
    Buckets {
        remaining: readings,
        granularity,
    }
}
