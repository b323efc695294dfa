use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::{AlertSeverity, AlertType, GlucoseUnit, MealContext, ReadingSource};

/// Fixed-width RFC 3339 so that text comparison in SQL matches time order.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_unit(value: &str) -> Result<GlucoseUnit> {
    match value {
        "mg/dL" => Ok(GlucoseUnit::MgDl),
        "mmol/L" => Ok(GlucoseUnit::MmolL),
        other => Err(anyhow!("unknown glucose unit {other}")),
    }
}

pub fn parse_source(value: &str) -> Result<ReadingSource> {
    match value {
        "manual" => Ok(ReadingSource::Manual),
        "device" => Ok(ReadingSource::Device),
        other => Err(anyhow!("unknown reading source {other}")),
    }
}

pub fn parse_meal_context(value: Option<String>) -> Result<Option<MealContext>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let context = match raw.as_str() {
        "fasting" => MealContext::Fasting,
        "before_meal" => MealContext::BeforeMeal,
        "after_meal" => MealContext::AfterMeal,
        "bedtime" => MealContext::Bedtime,
        "other" => MealContext::Other,
        other => return Err(anyhow!("unknown meal context {other}")),
    };
    Ok(Some(context))
}

pub fn parse_alert_type(value: &str) -> Result<AlertType> {
    match value {
        "low_glucose" => Ok(AlertType::LowGlucose),
        "high_glucose" => Ok(AlertType::HighGlucose),
        other => Err(anyhow!("unknown alert type {other}")),
    }
}

pub fn parse_severity(value: &str) -> Result<AlertSeverity> {
    match value {
        "info" => Ok(AlertSeverity::Info),
        "warning" => Ok(AlertSeverity::Warning),
        "critical" => Ok(AlertSeverity::Critical),
        other => Err(anyhow!("unknown alert severity {other}")),
    }
}
