//! Glucose reading data models.
//!
//! A reading is immutable once stored; the only mutation an owner can make is
//! deleting it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// mmol/L to mg/dL conversion factor.
pub const MMOL_TO_MG_DL: f64 = 18.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GlucoseUnit {
    #[default]
    #[serde(rename = "mg/dL")]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseUnit::MgDl => "mg/dL",
            GlucoseUnit::MmolL => "mmol/L",
        }
    }

    pub fn to_mg_dl(&self, value: f64) -> f64 {
        match self {
            GlucoseUnit::MgDl => value,
            GlucoseUnit::MmolL => value * MMOL_TO_MG_DL,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    #[default]
    Manual,
    Device,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::Manual => "manual",
            ReadingSource::Device => "device",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MealContext {
    Fasting,
    BeforeMeal,
    AfterMeal,
    Bedtime,
    Other,
}

impl MealContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealContext::Fasting => "fasting",
            MealContext::BeforeMeal => "before_meal",
            MealContext::AfterMeal => "after_meal",
            MealContext::Bedtime => "bedtime",
            MealContext::Other => "other",
        }
    }
}

/// A single stored glucose measurement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseReading {
    pub id: String,
    pub user_id: String,
    pub value: f64,
    pub unit: GlucoseUnit,
    pub measured_at: DateTime<Utc>,
    pub source: ReadingSource,
    pub notes: Option<String>,
    pub meal_context: Option<MealContext>,
    pub created_at: DateTime<Utc>,
}

impl GlucoseReading {
    /// Value normalized to mg/dL; every threshold and statistic uses this.
    pub fn mg_dl(&self) -> f64 {
        self.unit.to_mg_dl(self.value)
    }
}

/// Caller-supplied fields for a reading that has not been stored yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReading {
    pub value: f64,
    pub measured_at: DateTime<Utc>,
    #[serde(default)]
    pub unit: GlucoseUnit,
    #[serde(default)]
    pub source: ReadingSource,
    #[serde(default)]
    pub meal_context: Option<MealContext>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewReading {
    pub fn mg_dl(value: f64, measured_at: DateTime<Utc>) -> Self {
        Self {
            value,
            measured_at,
            unit: GlucoseUnit::MgDl,
            source: ReadingSource::Manual,
            meal_context: None,
            notes: None,
        }
    }
}
