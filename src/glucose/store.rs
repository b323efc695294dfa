use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{
    models::{Alert, GlucoseReading, TargetRange},
    Database,
};

/// Data-access contract the glucose service is built against.
///
/// `Database` is the production implementation; `InMemoryStore` implements the
/// same contract for tests.
#[async_trait]
pub trait GlucoseStore: Send + Sync {
    async fn insert_reading(&self, reading: &GlucoseReading) -> Result<()>;

    /// All-or-nothing: on any failure no reading of the batch is kept.
    async fn insert_readings(&self, readings: &[GlucoseReading]) -> Result<()>;

    /// Inclusive window, oldest first.
    async fn readings_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>>;

    /// Removes the reading and its alert. False if the user owns no such reading.
    async fn delete_reading(&self, user_id: &str, reading_id: &str) -> Result<bool>;

    async fn target_range(&self, user_id: &str) -> Result<Option<TargetRange>>;

    async fn set_target_range(&self, user_id: &str, range: TargetRange) -> Result<()>;

    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// Newest first.
    async fn alerts(&self, user_id: &str, unacknowledged_only: bool) -> Result<Vec<Alert>>;

    /// Sets `acknowledged_at` once; later calls return the alert unchanged.
    async fn acknowledge_alert(
        &self,
        user_id: &str,
        alert_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>>;
}

#[async_trait]
impl GlucoseStore for Database {
    async fn insert_reading(&self, reading: &GlucoseReading) -> Result<()> {
        Database::insert_reading(self, reading).await
    }

    async fn insert_readings(&self, readings: &[GlucoseReading]) -> Result<()> {
        Database::insert_readings(self, readings).await
    }

    async fn readings_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>> {
        self.get_readings_in_range(user_id, start, end).await
    }

    async fn delete_reading(&self, user_id: &str, reading_id: &str) -> Result<bool> {
        Database::delete_reading(self, user_id, reading_id).await
    }

    async fn target_range(&self, user_id: &str) -> Result<Option<TargetRange>> {
        self.get_target_range(user_id).await
    }

    async fn set_target_range(&self, user_id: &str, range: TargetRange) -> Result<()> {
        self.upsert_target_range(user_id, range).await
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        Database::insert_alert(self, alert).await
    }

    async fn alerts(&self, user_id: &str, unacknowledged_only: bool) -> Result<Vec<Alert>> {
        self.list_alerts(user_id, unacknowledged_only).await
    }

    async fn acknowledge_alert(
        &self,
        user_id: &str,
        alert_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        Database::acknowledge_alert(self, user_id, alert_id, at).await
    }
}
