//! Daily metric collection and record assembly
//!
//! Each upstream metric is fetched independently. A failed fetch or an
//! unusable payload becomes the `N/A` sentinel in the assembled record and
//! never prevents the remaining metrics from being collected.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use tracing::warn;

use crate::adapters::VendorPayloadAdapter;
use crate::flatten::{flatten, flatten_into};
use crate::source::{FetchError, MetricSource};
use crate::table::DATE_FORMAT;
use crate::types::{ActivitySummary, FieldValue, FlatRecord, DATE_COLUMN, NOT_AVAILABLE};

/// Column names of the summary metrics
pub mod columns {
    pub const SLEEP_SCORE: &str = "Sleep_Score";
    pub const HRV_AVG: &str = "HRV_Avg";
    pub const STRESS_AVG: &str = "Stress_Avg";
    pub const BODY_BATTERY_MAX: &str = "Body_Battery_Max";
    pub const ACTIVITY_COUNT: &str = "Activity_Count";
    pub const ACTIVITY_MINUTES: &str = "Activity_Minutes";
    pub const ACTIVITY_CALORIES: &str = "Activity_Calories";
    pub const ACTIVITIES: &str = "Activities";
}

/// Default number of recent activities requested from the provider
pub const DEFAULT_ACTIVITY_LIMIT: usize = 5;

/// Metrics gathered for one calendar day
#[derive(Debug, Clone, Default)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub sleep_score: Option<f64>,
    pub hrv_avg: Option<f64>,
    pub stress_avg: Option<f64>,
    pub body_battery_max: Option<f64>,
    /// `None` when the activity list could not be fetched
    pub activities: Option<Vec<ActivitySummary>>,
    /// Raw payloads kept for optional flattening, keyed by prefix
    raw: Vec<(&'static str, Value)>,
}

impl DailyMetrics {
    /// Fetch and extract every metric for `date`
    pub fn collect(
        source: &dyn MetricSource,
        adapter: &dyn VendorPayloadAdapter,
        date: NaiveDate,
        activity_limit: usize,
    ) -> Self {
        let stats = fetch("stats", || source.daily_stats(date));
        let sleep = fetch("sleep", || source.sleep(date));
        let hrv = fetch("hrv", || source.hrv(date));
        let body_battery = fetch("body_battery", || source.body_battery(date));
        let activities = fetch("activities", || source.activities(0, activity_limit));

        let mut metrics = DailyMetrics {
            date,
            sleep_score: sleep.as_ref().and_then(|v| adapter.sleep_score(v)),
            hrv_avg: hrv.as_ref().and_then(|v| adapter.hrv_last_night_avg(v)),
            stress_avg: stats.as_ref().and_then(|v| adapter.average_stress(v)),
            body_battery_max: body_battery
                .as_ref()
                .and_then(|v| adapter.body_battery_max(v)),
            activities: activities
                .as_ref()
                .map(|v| adapter.activities_on(v, &date.format(DATE_FORMAT).to_string())),
            raw: Vec::new(),
        };

        for (prefix, payload) in [("stats", stats), ("sleep", sleep), ("hrv", hrv)] {
            if let Some(payload) = payload {
                metrics.raw.push((prefix, payload));
            }
        }

        for column in metrics.unavailable() {
            warn!(%date, column, "metric not available");
        }

        metrics
    }

    /// Columns that will carry the sentinel
    pub fn unavailable(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let checks = [
            (columns::SLEEP_SCORE, self.sleep_score.is_none()),
            (columns::HRV_AVG, self.hrv_avg.is_none()),
            (columns::STRESS_AVG, self.stress_avg.is_none()),
            (columns::BODY_BATTERY_MAX, self.body_battery_max.is_none()),
            (columns::ACTIVITIES, self.activities.is_none()),
        ];
        for (column, is_missing) in checks {
            if is_missing {
                missing.push(column);
            }
        }
        missing
    }

    /// Assemble the flat record for the table.
    ///
    /// With `include_raw`, the raw stats, sleep and HRV payloads are also
    /// flattened in under their prefixes (e.g. `sleep.dailySleepDTO.sleepScore`).
    pub fn to_record(&self, include_raw: bool) -> FlatRecord {
        let mut row = Map::new();
        row.insert(
            DATE_COLUMN.to_string(),
            Value::String(self.date.format(DATE_FORMAT).to_string()),
        );
        row.insert(columns::SLEEP_SCORE.into(), metric(self.sleep_score));
        row.insert(columns::HRV_AVG.into(), metric(self.hrv_avg));
        row.insert(columns::STRESS_AVG.into(), metric(self.stress_avg));
        row.insert(columns::BODY_BATTERY_MAX.into(), metric(self.body_battery_max));

        match &self.activities {
            Some(list) => {
                let minutes: f64 = list.iter().filter_map(|a| a.duration_minutes).sum();
                let calories: f64 = list.iter().filter_map(|a| a.calories).sum();
                row.insert(columns::ACTIVITY_COUNT.into(), json!(list.len()));
                row.insert(
                    columns::ACTIVITY_MINUTES.into(),
                    metric(Some((minutes * 10.0).round() / 10.0)),
                );
                row.insert(columns::ACTIVITY_CALORIES.into(), metric(Some(calories)));
                row.insert(
                    columns::ACTIVITIES.into(),
                    Value::Array(list.iter().map(activity_value).collect()),
                );
            }
            None => {
                for column in [
                    columns::ACTIVITY_COUNT,
                    columns::ACTIVITY_MINUTES,
                    columns::ACTIVITY_CALORIES,
                    columns::ACTIVITIES,
                ] {
                    row.insert(column.into(), Value::String(NOT_AVAILABLE.into()));
                }
            }
        }

        let mut record = flatten(&Value::Object(row));
        if include_raw {
            for (prefix, payload) in &self.raw {
                flatten_into(payload, &format!("{prefix}."), &mut record);
            }
        }
        record
    }

    /// Human-readable markdown report for the day
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Garmin Health Report: {}", self.date);
        let _ = writeln!(out, "- **Body Battery:** Max {}", display(self.body_battery_max));
        let _ = writeln!(out, "- **Sleep Score:** {}", display(self.sleep_score));
        let _ = writeln!(out, "- **HRV Average:** {}", display(self.hrv_avg));
        let _ = writeln!(out, "- **Stress Level:** {}", display(self.stress_avg));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Activities:");

        match &self.activities {
            None => {
                let _ = writeln!(out, "- {NOT_AVAILABLE}");
            }
            Some(list) => {
                for activity in list {
                    let name = activity
                        .name
                        .as_deref()
                        .or(activity.type_key.as_deref())
                        .unwrap_or("Activity");
                    let minutes = activity
                        .duration_minutes
                        .map(|m| format!("{m:.1}"))
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                    let _ = writeln!(
                        out,
                        "- {name}: {minutes} mins, {} cal",
                        display(activity.calories)
                    );
                }
            }
        }
        out
    }
}

fn fetch(metric: &str, call: impl FnOnce() -> Result<Value, FetchError>) -> Option<Value> {
    match call() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(metric, error = %e, "fetch failed");
            None
        }
    }
}

fn metric(value: Option<f64>) -> Value {
    match value.and_then(FieldValue::from_f64) {
        Some(FieldValue::Number(n)) => Value::Number(n),
        _ => Value::String(NOT_AVAILABLE.to_string()),
    }
}

fn display(value: Option<f64>) -> String {
    value
        .and_then(FieldValue::from_f64)
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn activity_value(activity: &ActivitySummary) -> Value {
    json!({
        "start": activity.start_time_local,
        "type": activity.type_key,
        "name": activity.name,
        "minutes": activity.duration_minutes.map(|m| (m * 10.0).round() / 10.0),
        "calories": activity.calories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::GarminAdapter;
    use pretty_assertions::assert_eq;

    struct FakeSource {
        fail_hrv: bool,
    }

    impl MetricSource for FakeSource {
        fn daily_stats(&self, _date: NaiveDate) -> Result<Value, FetchError> {
            Ok(json!({"averageStressLevel": 28}))
        }

        fn sleep(&self, _date: NaiveDate) -> Result<Value, FetchError> {
            Ok(json!({"dailySleepDTO": {"sleepScore": 81}}))
        }

        fn hrv(&self, _date: NaiveDate) -> Result<Value, FetchError> {
            if self.fail_hrv {
                Err(FetchError::Status {
                    endpoint: "/hrv".into(),
                    status: 500,
                })
            } else {
                Ok(json!({"hrvSummary": {"lastNightAvg": 52}}))
            }
        }

        fn body_battery(&self, _date: NaiveDate) -> Result<Value, FetchError> {
            Ok(json!([{"value": 10}, {"bodyBatteryValue": 40}, {"value": null}]))
        }

        fn activities(&self, _start: usize, _limit: usize) -> Result<Value, FetchError> {
            Ok(json!([
                {
                    "startTimeLocal": "2024-01-15 07:00:00",
                    "activityType": {"typeKey": "running"},
                    "activityName": "Morning Run",
                    "duration": 1830.0,
                    "calories": 300.0
                },
                {
                    "startTimeLocal": "2024-01-15 18:00:00",
                    "activityName": "Walk",
                    "duration": 1200.0,
                    "calories": 90.0
                },
                {
                    "startTimeLocal": "2024-01-14 18:00:00",
                    "activityName": "Old Ride",
                    "duration": 3600.0,
                    "calories": 500.0
                }
            ]))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_collect_and_record() {
        let metrics =
            DailyMetrics::collect(&FakeSource { fail_hrv: false }, &GarminAdapter, date(), 5);
        assert!(metrics.unavailable().is_empty());

        let record = metrics.to_record(false);
        assert_eq!(record.date(), Some("2024-01-15"));
        assert_eq!(record.get(columns::SLEEP_SCORE), Some(&FieldValue::from(81)));
        assert_eq!(record.get(columns::HRV_AVG), Some(&FieldValue::from(52)));
        assert_eq!(record.get(columns::STRESS_AVG), Some(&FieldValue::from(28)));
        assert_eq!(
            record.get(columns::BODY_BATTERY_MAX),
            Some(&FieldValue::from(40))
        );
        assert_eq!(record.get(columns::ACTIVITY_COUNT), Some(&FieldValue::from(2)));
        assert_eq!(
            record.get(columns::ACTIVITY_MINUTES).and_then(FieldValue::as_f64),
            Some(50.5)
        );
        assert_eq!(
            record.get(columns::ACTIVITY_CALORIES),
            Some(&FieldValue::from(390))
        );

        let activities = record.get(columns::ACTIVITIES).and_then(FieldValue::as_str).unwrap();
        assert!(activities.starts_with('['));
        assert!(activities.contains("Morning Run"));
        assert!(!activities.contains("Old Ride"));
    }

    #[test]
    fn test_one_failed_metric_does_not_block_others() {
        let metrics =
            DailyMetrics::collect(&FakeSource { fail_hrv: true }, &GarminAdapter, date(), 5);
        assert_eq!(metrics.unavailable(), vec![columns::HRV_AVG]);

        let record = metrics.to_record(false);
        assert_eq!(record.get(columns::HRV_AVG), Some(&FieldValue::not_available()));
        assert_eq!(record.get(columns::SLEEP_SCORE), Some(&FieldValue::from(81)));
    }

    #[test]
    fn test_missing_everything_uses_sentinel() {
        let metrics = DailyMetrics {
            date: date(),
            ..Default::default()
        };
        let record = metrics.to_record(false);

        for column in [
            columns::SLEEP_SCORE,
            columns::HRV_AVG,
            columns::STRESS_AVG,
            columns::BODY_BATTERY_MAX,
            columns::ACTIVITY_COUNT,
            columns::ACTIVITIES,
        ] {
            assert_eq!(record.get(column), Some(&FieldValue::not_available()), "{column}");
        }
    }

    #[test]
    fn test_include_raw_flattens_payloads() {
        let metrics =
            DailyMetrics::collect(&FakeSource { fail_hrv: false }, &GarminAdapter, date(), 5);

        let plain = metrics.to_record(false);
        assert!(!plain.contains_key("sleep.dailySleepDTO.sleepScore"));

        let full = metrics.to_record(true);
        assert_eq!(
            full.get("sleep.dailySleepDTO.sleepScore"),
            Some(&FieldValue::from(81))
        );
        assert_eq!(
            full.get("hrv.hrvSummary.lastNightAvg"),
            Some(&FieldValue::from(52))
        );
        assert_eq!(full.get("stats.averageStressLevel"), Some(&FieldValue::from(28)));
    }

    #[test]
    fn test_markdown_report() {
        let metrics =
            DailyMetrics::collect(&FakeSource { fail_hrv: true }, &GarminAdapter, date(), 5);
        let md = metrics.to_markdown();

        assert!(md.starts_with("# Garmin Health Report: 2024-01-15\n"));
        assert!(md.contains("- **Body Battery:** Max 40\n"));
        assert!(md.contains("- **HRV Average:** N/A\n"));
        assert!(md.contains("- Morning Run: 30.5 mins, 300 cal\n"));
        assert!(md.contains("- Walk: 20.0 mins, 90 cal\n"));
    }
}
