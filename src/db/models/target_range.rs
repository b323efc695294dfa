use serde::{Deserialize, Serialize};

/// Per-user band (mg/dL) that defines "in range" for statistics and the
/// warning-level alert rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl TargetRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Used by both alerting and statistics when a user has not configured a range.
impl Default for TargetRange {
    fn default() -> Self {
        Self::new(70.0, 140.0)
    }
}
