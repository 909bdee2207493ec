//! Garmin vendor adapter
//!
//! Parses Garmin Connect payloads and extracts the daily metrics.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::VendorPayloadAdapter;
use crate::types::ActivitySummary;

/// Garmin payload adapter
pub struct GarminAdapter;

impl VendorPayloadAdapter for GarminAdapter {
    fn sleep_score(&self, sleep: &Value) -> Option<f64> {
        let dto = parse::<GarminSleep>(sleep, "sleep")?.daily_sleep_dto?;
        dto.sleep_score.or_else(|| {
            dto.sleep_scores
                .and_then(|scores| scores.overall)
                .and_then(|overall| overall.value)
        })
    }

    fn hrv_last_night_avg(&self, hrv: &Value) -> Option<f64> {
        parse::<GarminHrv>(hrv, "hrv")?
            .hrv_summary?
            .last_night_avg
    }

    fn average_stress(&self, stats: &Value) -> Option<f64> {
        parse::<GarminStats>(stats, "stats")?.average_stress_level
    }

    fn body_battery_max(&self, samples: &Value) -> Option<f64> {
        let samples = match samples {
            Value::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };

        samples
            .iter()
            .flat_map(sample_levels)
            .fold(None, |max: Option<f64>, level| {
                Some(max.map_or(level, |m| m.max(level)))
            })
    }

    fn activities_on(&self, activities: &Value, date: &str) -> Vec<ActivitySummary> {
        let Some(items) = activities.as_array() else {
            debug!("activity payload is not a list");
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| parse::<GarminActivity>(item, "activity"))
            .filter_map(|activity| {
                let start = activity.start_time_local?;
                if !start.starts_with(date) {
                    return None;
                }
                Some(ActivitySummary {
                    start_time_local: start,
                    type_key: activity.activity_type.and_then(|t| t.type_key),
                    name: activity.activity_name,
                    duration_minutes: activity.duration.map(|secs| secs / 60.0),
                    calories: activity.calories,
                })
            })
            .collect()
    }
}

fn parse<T: DeserializeOwned>(value: &Value, what: &str) -> Option<T> {
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(payload = what, error = %e, "malformed Garmin payload");
            None
        }
    }
}

/// Numeric levels carried by one body battery sample.
///
/// A sample reports its level under `value` or `bodyBatteryValue`; the daily
/// report form instead carries `bodyBatteryValuesArray` of `[timestamp, level]`.
/// `baselineValue` is the last resort when none of those hold a number.
fn sample_levels(sample: &Value) -> Vec<f64> {
    let single = sample
        .get("value")
        .and_then(Value::as_f64)
        .or_else(|| sample.get("bodyBatteryValue").and_then(Value::as_f64));
    if let Some(level) = single {
        return vec![level];
    }

    let levels: Vec<f64> = sample
        .get("bodyBatteryValuesArray")
        .and_then(Value::as_array)
        .map(|pairs| {
            pairs
                .iter()
                .filter_map(|pair| pair.get(1).and_then(Value::as_f64))
                .collect()
        })
        .unwrap_or_default();
    if !levels.is_empty() {
        return levels;
    }

    sample
        .get("baselineValue")
        .and_then(Value::as_f64)
        .into_iter()
        .collect()
}

// Garmin Connect response structures

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminStats {
    average_stress_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GarminSleep {
    #[serde(rename = "dailySleepDTO")]
    daily_sleep_dto: Option<GarminSleepDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminSleepDto {
    sleep_score: Option<f64>,
    sleep_scores: Option<GarminSleepScores>,
}

#[derive(Debug, Deserialize)]
struct GarminSleepScores {
    overall: Option<GarminScoreValue>,
}

#[derive(Debug, Deserialize)]
struct GarminScoreValue {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminHrv {
    hrv_summary: Option<GarminHrvSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminHrvSummary {
    last_night_avg: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminActivity {
    start_time_local: Option<String>,
    activity_type: Option<GarminActivityType>,
    activity_name: Option<String>,
    /// Seconds
    duration: Option<f64>,
    calories: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminActivityType {
    type_key: Option<String>,
}
