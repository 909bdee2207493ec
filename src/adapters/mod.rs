//! Vendor payload adapters
//!
//! Adapters pull individual metrics out of raw vendor JSON. Every accessor is
//! best-effort: a missing or malformed field yields `None` so that one broken
//! metric never blocks the others.

mod garmin;

pub use garmin::GarminAdapter;

use serde_json::Value;

use crate::types::ActivitySummary;

/// Trait for vendor payload adapters
pub trait VendorPayloadAdapter {
    /// Overall sleep score from the sleep detail payload
    fn sleep_score(&self, sleep: &Value) -> Option<f64>;

    /// Last-night HRV average from the HRV payload
    fn hrv_last_night_avg(&self, hrv: &Value) -> Option<f64>;

    /// Average stress level from the daily summary payload
    fn average_stress(&self, stats: &Value) -> Option<f64>;

    /// Highest body battery level among the day's samples
    fn body_battery_max(&self, samples: &Value) -> Option<f64>;

    /// Activities that started on `date` (YYYY-MM-DD, local time)
    fn activities_on(&self, activities: &Value, date: &str) -> Vec<ActivitySummary>;
}
