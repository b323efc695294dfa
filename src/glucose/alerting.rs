//! Threshold classification for freshly recorded readings.
//!
//! Rules are checked most severe first and the first match wins, so a value
//! above the critical ceiling is critical even when it is also above the
//! user's target maximum.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Alert, AlertSeverity, AlertType, GlucoseReading, TargetRange};

/// Below this (mg/dL) a reading is critically low regardless of target range.
pub const CRITICAL_LOW_MG_DL: f64 = 54.0;
/// Above this (mg/dL) a reading is critically high regardless of target range.
pub const CRITICAL_HIGH_MG_DL: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
}

impl Classification {
    const fn new(alert_type: AlertType, severity: AlertSeverity) -> Self {
        Self {
            alert_type,
            severity,
        }
    }
}

/// Classify a mg/dL value against `range`; `None` means no alert.
pub fn classify(value: f64, range: &TargetRange) -> Option<Classification> {
    use AlertSeverity::{Critical, Warning};
    use AlertType::{HighGlucose, LowGlucose};

    if value < CRITICAL_LOW_MG_DL {
        Some(Classification::new(LowGlucose, Critical))
    } else if value < range.min {
        Some(Classification::new(LowGlucose, Warning))
    } else if value > CRITICAL_HIGH_MG_DL {
        Some(Classification::new(HighGlucose, Critical))
    } else if value > range.max {
        Some(Classification::new(HighGlucose, Warning))
    } else {
        None
    }
}

fn message_for(classification: Classification, reading: &GlucoseReading) -> String {
    let label = match (classification.severity, classification.alert_type) {
        (AlertSeverity::Critical, AlertType::LowGlucose) => "Critical low glucose",
        (AlertSeverity::Critical, AlertType::HighGlucose) => "Critical high glucose",
        (_, AlertType::LowGlucose) => "Low glucose",
        (_, AlertType::HighGlucose) => "High glucose",
    };
    format!("{label}: {} {}", reading.value, reading.unit.as_str())
}

/// Build the alert a reading should raise, if any.
pub fn evaluate(
    reading: &GlucoseReading,
    range: &TargetRange,
    triggered_at: DateTime<Utc>,
) -> Option<Alert> {
    let classification = classify(reading.mg_dl(), range)?;
    Some(Alert {
        id: Uuid::new_v4().to_string(),
        user_id: reading.user_id.clone(),
        alert_type: classification.alert_type,
        severity: classification.severity,
        message: message_for(classification, reading),
        related_reading_id: reading.id.clone(),
        triggered_at,
        acknowledged_at: None,
    })
}
