pub mod alert;
pub mod reading;
pub mod target_range;

pub use alert::{Alert, AlertSeverity, AlertType};
pub use reading::{GlucoseReading, GlucoseUnit, MealContext, NewReading, ReadingSource};
pub use target_range::TargetRange;
