//! Glucose ingestion, alerting and analytics.
//!
//! `GlucoseService` owns the validation rules and talks to storage only
//! through the injected [`GlucoseStore`].

pub mod alerting;
pub mod chart;
mod memory;
pub mod stats;
mod store;

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

pub use chart::{ChartBucket, Granularity};
pub use memory::InMemoryStore;
pub use stats::{GlucoseStats, Trend};
pub use store::GlucoseStore;

use crate::db::models::{Alert, GlucoseReading, NewReading, TargetRange};
use crate::error::GlucoseError;

/// Lowest physiologically plausible reading (mg/dL).
pub const MIN_READING_MG_DL: f64 = 20.0;
/// Highest physiologically plausible reading (mg/dL).
pub const MAX_READING_MG_DL: f64 = 600.0;
pub const MAX_BATCH_SIZE: usize = 500;

type Result<T> = std::result::Result<T, GlucoseError>;

pub fn validate_value(reading: &NewReading) -> Result<()> {
    let mg_dl = reading.unit.to_mg_dl(reading.value);
    if !mg_dl.is_finite() || !(MIN_READING_MG_DL..=MAX_READING_MG_DL).contains(&mg_dl) {
        return Err(GlucoseError::validation(format!(
            "glucose value {} {} is outside the accepted range {}-{} mg/dL",
            reading.value,
            reading.unit.as_str(),
            MIN_READING_MG_DL,
            MAX_READING_MG_DL
        )));
    }
    Ok(())
}

pub fn validate_range(range: &TargetRange) -> Result<()> {
    let bounds = MIN_READING_MG_DL..=MAX_READING_MG_DL;
    if !bounds.contains(&range.min) || !bounds.contains(&range.max) || range.min >= range.max {
        return Err(GlucoseError::validation(format!(
            "target range {}-{} must satisfy {} <= min < max <= {}",
            range.min, range.max, MIN_READING_MG_DL, MAX_READING_MG_DL
        )));
    }
    Ok(())
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start > end {
        return Err(GlucoseError::validation(format!(
            "start {start} is after end {end}"
        )));
    }
    Ok(())
}

/// Narrow a window to whole milliseconds, the precision readings are stored
/// at, so every store sees the same inclusive bounds.
fn millisecond_bounds(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let floor = start.trunc_subsecs(3);
    let start = if floor < start {
        floor
            .checked_add_signed(Duration::milliseconds(1))
            .unwrap_or(start)
    } else {
        start
    };
    (start, end.trunc_subsecs(3))
}

#[derive(Clone)]
pub struct GlucoseService {
    store: Arc<dyn GlucoseStore>,
    default_range: TargetRange,
    default_window: Duration,
}

impl GlucoseService {
    pub fn new(store: Arc<dyn GlucoseStore>, default_range: TargetRange) -> Self {
        Self {
            store,
            default_range,
            default_window: Duration::days(7),
        }
    }

    pub fn with_default_window(mut self, window: Duration) -> Self {
        self.default_window = window;
        self
    }

    /// Fill in a missing window bound: the window ends now and spans the
    /// configured default length.
    pub fn resolve_window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let end = end.unwrap_or_else(Utc::now);
        let start = match start {
            Some(start) => start,
            None => end.checked_sub_signed(self.default_window).ok_or_else(|| {
                GlucoseError::validation(format!(
                    "default window of {} days before {end} is out of range",
                    self.default_window.num_days()
                ))
            })?,
        };
        Ok((start, end))
    }

    fn build_reading(
        &self,
        user_id: &str,
        input: NewReading,
        now: DateTime<Utc>,
    ) -> GlucoseReading {
        GlucoseReading {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            value: input.value,
            unit: input.unit,
            measured_at: input.measured_at.trunc_subsecs(3),
            source: input.source,
            notes: input.notes,
            meal_context: input.meal_context,
            created_at: now,
        }
    }

    pub async fn target_range(&self, user_id: &str) -> Result<TargetRange> {
        let configured = self.store.target_range(user_id).await?;
        Ok(configured.unwrap_or(self.default_range))
    }

    pub async fn set_target_range(&self, user_id: &str, range: TargetRange) -> Result<TargetRange> {
        validate_range(&range)?;
        self.store.set_target_range(user_id, range).await?;
        info!("Target range for {user_id} set to {}-{}", range.min, range.max);
        Ok(range)
    }

    /// Validate and store one reading, then raise an alert for it if needed.
    pub async fn record_reading(&self, user_id: &str, input: NewReading) -> Result<GlucoseReading> {
        validate_value(&input)?;

        let reading = self.build_reading(user_id, input, Utc::now().trunc_subsecs(3));
        self.store.insert_reading(&reading).await?;
        debug!("Recorded reading {} for {user_id}", reading.id);

        self.raise_alert(&reading).await;
        Ok(reading)
    }

    /// Validate and store many readings in one transaction. Nothing is stored
    /// unless every entry is valid and every insert succeeds.
    pub async fn record_batch(
        &self,
        user_id: &str,
        inputs: Vec<NewReading>,
    ) -> Result<Vec<GlucoseReading>> {
        if inputs.is_empty() {
            return Err(GlucoseError::validation("batch contains no readings"));
        }
        if inputs.len() > MAX_BATCH_SIZE {
            return Err(GlucoseError::validation(format!(
                "batch of {} readings exceeds the limit of {MAX_BATCH_SIZE}",
                inputs.len()
            )));
        }
        for (index, input) in inputs.iter().enumerate() {
            validate_value(input).map_err(|err| {
                GlucoseError::validation(format!("reading {index}: {err}"))
            })?;
        }

        let now = Utc::now().trunc_subsecs(3);
        let readings: Vec<GlucoseReading> = inputs
            .into_iter()
            .map(|input| self.build_reading(user_id, input, now))
            .collect();
        self.store.insert_readings(&readings).await?;
        debug!("Recorded batch of {} readings for {user_id}", readings.len());

        for reading in &readings {
            self.raise_alert(reading).await;
        }
        Ok(readings)
    }

    /// Best effort: failures are logged and never undo the stored reading.
    async fn raise_alert(&self, reading: &GlucoseReading) -> Option<Alert> {
        let range = match self.target_range(&reading.user_id).await {
            Ok(range) => range,
            Err(err) => {
                warn!(
                    "Could not load target range for {}, using default: {err}",
                    reading.user_id
                );
                self.default_range
            }
        };

        let alert = alerting::evaluate(reading, &range, Utc::now().trunc_subsecs(3))?;
        match self.store.insert_alert(&alert).await {
            Ok(()) => {
                info!(
                    "Raised {} {} alert for reading {}",
                    alert.severity.as_str(),
                    alert.alert_type.as_str(),
                    reading.id
                );
                Some(alert)
            }
            Err(err) => {
                warn!("Failed to store alert for reading {}: {err:#}", reading.id);
                None
            }
        }
    }

    pub async fn delete_reading(&self, user_id: &str, reading_id: &str) -> Result<()> {
        if !self.store.delete_reading(user_id, reading_id).await? {
            return Err(GlucoseError::NotFound("reading"));
        }
        debug!("Deleted reading {reading_id} for {user_id}");
        Ok(())
    }

    pub async fn list_readings(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>> {
        validate_window(start, end)?;
        let (start, end) = millisecond_bounds(start, end);
        let mut readings = self.store.readings_in_range(user_id, start, end).await?;
        readings.sort_by_key(|r| r.measured_at);
        Ok(readings)
    }

    pub async fn compute_stats(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<GlucoseStats> {
        let readings = self.list_readings(user_id, start, end).await?;
        let range = self.target_range(user_id).await?;
        Ok(stats::compute(&readings, &range))
    }

    pub async fn chart_series(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<ChartBucket>> {
        let readings = self.list_readings(user_id, start, end).await?;
        Ok(chart::buckets(&readings, granularity).collect())
    }

    pub async fn list_alerts(
        &self,
        user_id: &str,
        unacknowledged_only: bool,
    ) -> Result<Vec<Alert>> {
        Ok(self.store.alerts(user_id, unacknowledged_only).await?)
    }

    pub async fn acknowledge_alert(&self, user_id: &str, alert_id: &str) -> Result<Alert> {
        self.store
            .acknowledge_alert(user_id, alert_id, Utc::now().trunc_subsecs(3))
            .await?
            .ok_or(GlucoseError::NotFound("alert"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AlertSeverity, AlertType, GlucoseUnit};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, hour, minute, 0).unwrap()
    }

    fn service() -> (Arc<InMemoryStore>, GlucoseService) {
        let store = Arc::new(InMemoryStore::new());
        let service = GlucoseService::new(store.clone(), TargetRange::default());
        (store, service)
    }

    fn whole_day() -> (DateTime<Utc>, DateTime<Utc>) {
        (at(0, 0), at(23, 59))
    }

    #[tokio::test]
    async fn accepts_values_only_within_plausible_bounds() {
        let (store, service) = service();
        for value in [20.0, 100.0, 600.0] {
            assert!(service
                .record_reading("alice", NewReading::mg_dl(value, at(8, 0)))
                .await
                .is_ok());
        }
        for value in [19.9, 600.1, 0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = service
                .record_reading("alice", NewReading::mg_dl(value, at(8, 0)))
                .await
                .unwrap_err();
            assert!(matches!(err, GlucoseError::Validation(_)));
        }
        assert_eq!(store.reading_count(), 3);
    }

    #[tokio::test]
    async fn mmol_bounds_use_converted_value() {
        let (_store, service) = service();
        let mut input = NewReading::mg_dl(1.0, at(8, 0));
        input.unit = GlucoseUnit::MmolL;
        assert!(service.record_reading("alice", input.clone()).await.is_err());

        input.value = 5.5;
        let reading = service.record_reading("alice", input).await.unwrap();
        assert_eq!(reading.unit, GlucoseUnit::MmolL);
        assert_eq!(reading.value, 5.5);
    }

    #[tokio::test]
    async fn critical_low_raises_exactly_one_alert() {
        let (_store, service) = service();
        let reading = service
            .record_reading("alice", NewReading::mg_dl(53.0, at(8, 0)))
            .await
            .unwrap();

        let alerts = service.list_alerts("alice", false).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].alert_type, AlertType::LowGlucose);
        assert_eq!(alerts[0].related_reading_id, reading.id);
    }

    #[tokio::test]
    async fn above_critical_ceiling_beats_target_max_warning() {
        let (_store, service) = service();
        service
            .record_reading("alice", NewReading::mg_dl(181.0, at(8, 0)))
            .await
            .unwrap();

        let alerts = service.list_alerts("alice", false).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].alert_type, AlertType::HighGlucose);
    }

    #[tokio::test]
    async fn user_target_range_drives_warnings() {
        let (_store, service) = service();
        service
            .set_target_range("alice", TargetRange::new(90.0, 120.0))
            .await
            .unwrap();
        service
            .record_reading("alice", NewReading::mg_dl(85.0, at(8, 0)))
            .await
            .unwrap();
        service
            .record_reading("alice", NewReading::mg_dl(130.0, at(9, 0)))
            .await
            .unwrap();
        service
            .record_reading("alice", NewReading::mg_dl(100.0, at(10, 0)))
            .await
            .unwrap();

        let alerts = service.list_alerts("alice", false).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.severity == AlertSeverity::Warning));
        // bob still uses the default range
        service
            .record_reading("bob", NewReading::mg_dl(85.0, at(8, 0)))
            .await
            .unwrap();
        assert!(service.list_alerts("bob", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_out_of_range_readings_each_alert() {
        let (store, service) = service();
        for minute in 0..3 {
            service
                .record_reading("alice", NewReading::mg_dl(250.0, at(8, minute)))
                .await
                .unwrap();
        }
        assert_eq!(store.alert_count(), 3);
    }

    #[tokio::test]
    async fn rejects_invalid_target_ranges() {
        let (_store, service) = service();
        for range in [
            TargetRange::new(120.0, 90.0),
            TargetRange::new(100.0, 100.0),
            TargetRange::new(10.0, 140.0),
            TargetRange::new(70.0, 700.0),
        ] {
            assert!(service.set_target_range("alice", range).await.is_err());
        }
        assert_eq!(
            service.target_range("alice").await.unwrap(),
            TargetRange::default()
        );
    }

    #[tokio::test]
    async fn batch_with_invalid_entry_persists_nothing() {
        let (store, service) = service();
        let batch = vec![
            NewReading::mg_dl(100.0, at(8, 0)),
            NewReading::mg_dl(900.0, at(8, 5)),
            NewReading::mg_dl(110.0, at(8, 10)),
        ];

        let err = service.record_batch("alice", batch).await.unwrap_err();
        assert!(matches!(err, GlucoseError::Validation(msg) if msg.starts_with("reading 1:")));
        assert_eq!(store.reading_count(), 0);
    }

    #[tokio::test]
    async fn batch_stores_all_and_alerts_per_reading() {
        let (store, service) = service();
        let batch = vec![
            NewReading::mg_dl(100.0, at(8, 0)),
            NewReading::mg_dl(45.0, at(8, 5)),
            NewReading::mg_dl(200.0, at(8, 10)),
        ];

        let stored = service.record_batch("alice", batch).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(store.reading_count(), 3);
        assert_eq!(store.alert_count(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let (_store, service) = service();
        assert!(service.record_batch("alice", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn delete_checks_ownership() {
        let (store, service) = service();
        let reading = service
            .record_reading("alice", NewReading::mg_dl(40.0, at(8, 0)))
            .await
            .unwrap();

        let err = service.delete_reading("bob", &reading.id).await.unwrap_err();
        assert!(matches!(err, GlucoseError::NotFound("reading")));

        service.delete_reading("alice", &reading.id).await.unwrap();
        assert_eq!(store.reading_count(), 0);
        assert_eq!(store.alert_count(), 0);
    }

    #[tokio::test]
    async fn stats_over_empty_window() {
        let (_store, service) = service();
        let (start, end) = whole_day();
        let stats = service.compute_stats("alice", start, end).await.unwrap();
        assert_eq!(stats.readings_count, 0);
        assert_eq!(stats.time_in_range_percent, 0.0);
    }

    #[tokio::test]
    async fn stats_trend_falls_when_latest_readings_drop() {
        let (_store, service) = service();
        // inserted out of order on purpose
        for (value, minute) in [(85.0, 40), (125.0, 0), (100.0, 20), (115.0, 10), (95.0, 30)] {
            service
                .record_reading("alice", NewReading::mg_dl(value, at(8, minute)))
                .await
                .unwrap();
        }
        let (start, end) = whole_day();
        let stats = service.compute_stats("alice", start, end).await.unwrap();
        assert_eq!(stats.trend, Trend::Falling);
        assert_eq!(stats.readings_count, 5);
    }

    #[tokio::test]
    async fn stats_reject_inverted_window() {
        let (_store, service) = service();
        let (start, end) = whole_day();
        assert!(matches!(
            service.compute_stats("alice", end, start).await,
            Err(GlucoseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn chart_series_is_idempotent() {
        let (_store, service) = service();
        for (value, hour) in [(100.0, 7), (140.0, 7), (90.0, 12)] {
            service
                .record_reading("alice", NewReading::mg_dl(value, at(hour, 15)))
                .await
                .unwrap();
        }
        let (start, end) = whole_day();
        let first = service
            .chart_series("alice", start, end, Granularity::Hour)
            .await
            .unwrap();
        let second = service
            .chart_series("alice", start, end, Granularity::Hour)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].avg, 120.0);
    }

    #[tokio::test]
    async fn acknowledge_requires_owner() {
        let (_store, service) = service();
        service
            .record_reading("alice", NewReading::mg_dl(40.0, at(8, 0)))
            .await
            .unwrap();
        let alert_id = service.list_alerts("alice", true).await.unwrap()[0].id.clone();

        assert!(matches!(
            service.acknowledge_alert("bob", &alert_id).await,
            Err(GlucoseError::NotFound("alert"))
        ));
        let acked = service.acknowledge_alert("alice", &alert_id).await.unwrap();
        assert!(acked.acknowledged_at.is_some());
        assert!(service.list_alerts("alice", true).await.unwrap().is_empty());
    }

    #[test]
    fn resolve_window_defaults_to_trailing_days() {
        let (_store, service) = service();
        let service = service.with_default_window(Duration::days(3));
        let end = at(12, 0);
        assert_eq!(
            service.resolve_window(None, Some(end)).unwrap(),
            (end - Duration::days(3), end)
        );
        let start = at(1, 0);
        assert_eq!(service.resolve_window(Some(start), Some(end)).unwrap(), (start, end));
    }

    #[test]
    fn oversized_default_window_is_rejected() {
        let (_store, service) = service();
        let service = service.with_default_window(Duration::days(100_000_000));
        let err = service.resolve_window(None, Some(at(12, 0))).unwrap_err();
        assert!(matches!(err, GlucoseError::Validation(_)));

        let start = at(1, 0);
        assert_eq!(service.resolve_window(Some(start), None).unwrap().0, start);
    }

    #[tokio::test]
    async fn sub_millisecond_bounds_agree_across_stores() {
        let dir = tempfile::tempdir().unwrap();
        let database = crate::db::Database::new(dir.path().join("glucolog.sqlite3")).unwrap();
        let stores: [Arc<dyn GlucoseStore>; 2] =
            [Arc::new(database), Arc::new(InMemoryStore::new())];

        for store in stores {
            let service = GlucoseService::new(store, TargetRange::default());
            service
                .record_reading("alice", NewReading::mg_dl(100.0, at(8, 0)))
                .await
                .unwrap();

            let half_ms = Duration::microseconds(500);
            let after = service
                .list_readings("alice", at(8, 0) + half_ms, at(9, 0))
                .await
                .unwrap();
            assert!(after.is_empty());

            let before = service
                .list_readings("alice", at(7, 0), at(8, 0) - half_ms)
                .await
                .unwrap();
            assert!(before.is_empty());

            let around = service
                .list_readings("alice", at(8, 0) - half_ms, at(8, 0) + half_ms)
                .await
                .unwrap();
            assert_eq!(around.len(), 1);
        }
    }

    /// Store whose alert writes always fail.
    struct FailingAlerts(InMemoryStore);

    #[async_trait]
    impl GlucoseStore for FailingAlerts {
        async fn insert_reading(&self, reading: &GlucoseReading) -> anyhow::Result<()> {
            self.0.insert_reading(reading).await
        }
        async fn insert_readings(&self, readings: &[GlucoseReading]) -> anyhow::Result<()> {
            self.0.insert_readings(readings).await
        }
        async fn readings_in_range(
            &self,
            user_id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<GlucoseReading>> {
            self.0.readings_in_range(user_id, start, end).await
        }
        async fn delete_reading(&self, user_id: &str, reading_id: &str) -> anyhow::Result<bool> {
            self.0.delete_reading(user_id, reading_id).await
        }
        async fn target_range(&self, _user_id: &str) -> anyhow::Result<Option<TargetRange>> {
            anyhow::bail!("profiles table unavailable")
        }
        async fn set_target_range(&self, user_id: &str, range: TargetRange) -> anyhow::Result<()> {
            self.0.set_target_range(user_id, range).await
        }
        async fn insert_alert(&self, _alert: &Alert) -> anyhow::Result<()> {
            anyhow::bail!("alerts table unavailable")
        }
        async fn alerts(
            &self,
            user_id: &str,
            unacknowledged_only: bool,
        ) -> anyhow::Result<Vec<Alert>> {
            self.0.alerts(user_id, unacknowledged_only).await
        }
        async fn acknowledge_alert(
            &self,
            user_id: &str,
            alert_id: &str,
            at: DateTime<Utc>,
        ) -> anyhow::Result<Option<Alert>> {
            self.0.acknowledge_alert(user_id, alert_id, at).await
        }
    }

    #[tokio::test]
    async fn alert_failure_does_not_fail_ingestion() {
        let service = GlucoseService::new(
            Arc::new(FailingAlerts(InMemoryStore::new())),
            TargetRange::default(),
        );
        let reading = service
            .record_reading("alice", NewReading::mg_dl(30.0, at(8, 0)))
            .await
            .unwrap();
        assert_eq!(reading.value, 30.0);

        let (start, end) = whole_day();
        let stored = service.list_readings("alice", start, end).await.unwrap();
        assert_eq!(stored, vec![reading]);
    }
}
