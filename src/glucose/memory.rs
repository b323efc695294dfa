use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::GlucoseStore;
use crate::db::models::{Alert, GlucoseReading, TargetRange};

#[derive(Default)]
struct MemoryState {
    readings: Vec<GlucoseReading>,
    alerts: Vec<Alert>,
    ranges: HashMap<String, TargetRange>,
}

impl MemoryState {
    fn has_reading(&self, id: &str) -> bool {
        self.readings.iter().any(|r| r.id == id)
    }
}

/// Process-local `GlucoseStore` with the same constraints as the SQLite
/// schema: unique ids, one alert per reading, alerts must reference a stored
/// reading, and deleting a reading removes its alert.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    pub fn reading_count(&self) -> usize {
        self.lock().map(|s| s.readings.len()).unwrap_or(0)
    }

    pub fn alert_count(&self) -> usize {
        self.lock().map(|s| s.alerts.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GlucoseStore for InMemoryStore {
    async fn insert_reading(&self, reading: &GlucoseReading) -> Result<()> {
        let mut state = self.lock()?;
        if state.has_reading(&reading.id) {
            bail!("duplicate glucose reading id {}", reading.id);
        }
        state.readings.push(reading.clone());
        Ok(())
    }

    async fn insert_readings(&self, readings: &[GlucoseReading]) -> Result<()> {
        let mut state = self.lock()?;
        let mut seen = HashSet::new();
        for reading in readings {
            if state.has_reading(&reading.id) || !seen.insert(reading.id.as_str()) {
                bail!("duplicate glucose reading id {}", reading.id);
            }
        }
        state.readings.extend_from_slice(readings);
        Ok(())
    }

    async fn readings_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>> {
        let state = self.lock()?;
        let mut found: Vec<GlucoseReading> = state
            .readings
            .iter()
            .filter(|r| r.user_id == user_id && r.measured_at >= start && r.measured_at <= end)
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.measured_at, r.created_at));
        Ok(found)
    }

    async fn delete_reading(&self, user_id: &str, reading_id: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let before = state.readings.len();
        state
            .readings
            .retain(|r| !(r.id == reading_id && r.user_id == user_id));
        let removed = state.readings.len() != before;
        if removed {
            state.alerts.retain(|a| a.related_reading_id != reading_id);
        }
        Ok(removed)
    }

    async fn target_range(&self, user_id: &str) -> Result<Option<TargetRange>> {
        Ok(self.lock()?.ranges.get(user_id).copied())
    }

    async fn set_target_range(&self, user_id: &str, range: TargetRange) -> Result<()> {
        self.lock()?.ranges.insert(user_id.to_string(), range);
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let mut state = self.lock()?;
        if !state.has_reading(&alert.related_reading_id) {
            bail!("alert references unknown reading {}", alert.related_reading_id);
        }
        if state
            .alerts
            .iter()
            .any(|a| a.id == alert.id || a.related_reading_id == alert.related_reading_id)
        {
            bail!("reading {} already has an alert", alert.related_reading_id);
        }
        state.alerts.push(alert.clone());
        Ok(())
    }

    async fn alerts(&self, user_id: &str, unacknowledged_only: bool) -> Result<Vec<Alert>> {
        let state = self.lock()?;
        let mut found: Vec<Alert> = state
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| !unacknowledged_only || a.acknowledged_at.is_none())
            .cloned()
            .collect();
        found.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(found)
    }

    async fn acknowledge_alert(
        &self,
        user_id: &str,
        alert_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let mut state = self.lock()?;
        let Some(alert) = state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.user_id == user_id)
        else {
            return Ok(None);
        };
        alert.acknowledged_at.get_or_insert(at);
        Ok(Some(alert.clone()))
    }
}
