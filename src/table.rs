//! Date-keyed time-series table
//!
//! A table holds flat records ordered by their `Date` value, at most one per
//! date, and a column list that is the union of every key it has ever seen.
//! Upserting a record replaces the row for its date; columns that the new
//! record lacks are kept for all other rows and render as empty cells.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::types::{FieldValue, FlatRecord, DATE_COLUMN};

/// Calendar date format used by the `Date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ordered collection of flat records keyed by date
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<FlatRecord>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Create an empty table with only the `Date` column
    pub fn new() -> Self {
        Self {
            columns: vec![DATE_COLUMN.to_string()],
            records: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[FlatRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the row for a date
    pub fn get(&self, date: &str) -> Option<&FlatRecord> {
        self.records.iter().find(|r| r.date() == Some(date))
    }

    /// Insert a record, replacing any existing row with the same date.
    ///
    /// The record is validated before anything is touched; on error the
    /// table is left exactly as it was.
    pub fn upsert(&mut self, record: FlatRecord) -> Result<(), SyncError> {
        let date = record_date(&record)?;
        self.apply(date, record);
        Ok(())
    }

    /// Upsert several records in order; a later record for a date wins.
    ///
    /// Every record is validated up front, so either all are applied or
    /// none are.
    pub fn upsert_all(&mut self, records: Vec<FlatRecord>) -> Result<(), SyncError> {
        let dated = records
            .into_iter()
            .map(|r| record_date(&r).map(|d| (d, r)))
            .collect::<Result<Vec<_>, _>>()?;

        for (date, record) in dated {
            self.apply(date, record);
        }
        Ok(())
    }

    fn apply(&mut self, date: String, record: FlatRecord) {
        let before = self.records.len();
        self.records.retain(|r| r.date() != Some(date.as_str()));
        if self.records.len() != before {
            debug!(date = %date, "replacing existing row");
        }

        for key in record.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.to_string());
            }
        }

        self.records.push(record);
        // Stable, so equal dates (none after retain) keep insertion order
        self.records.sort_by(|a, b| a.date().cmp(&b.date()));
    }

    /// Parse a persisted CSV table.
    ///
    /// The header must contain a `Date` column. Rows that cannot be read or
    /// carry no valid date are skipped with a warning so the remaining
    /// history survives. Empty cells are treated as absent fields.
    pub fn from_csv(text: &str) -> Result<Self, SyncError> {
        let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        if !headers.iter().any(|h| h == DATE_COLUMN) {
            return Err(SyncError::InvalidRecord(format!(
                "table header has no `{DATE_COLUMN}` column"
            )));
        }

        let mut table = Table::new();
        for header in headers.iter() {
            if !table.columns.iter().any(|c| c == header) {
                table.columns.push(header.to_string());
            }
        }

        for (index, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(row = index + 1, error = %e, "skipping unreadable table row");
                    continue;
                }
            };

            let record: FlatRecord = headers
                .iter()
                .zip(row.iter())
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(header, cell)| {
                    let value = if header == DATE_COLUMN {
                        FieldValue::Text(cell.to_string())
                    } else {
                        FieldValue::parse_cell(cell)
                    };
                    (header.to_string(), value)
                })
                .collect();

            match record_date(&record) {
                Ok(date) => table.apply(date, record),
                Err(e) => {
                    warn!(row = index + 1, error = %e, "skipping table row without a valid date")
                }
            }
        }

        Ok(table)
    }

    /// Load a persisted table, falling back to an empty one when the
    /// content is absent or cannot be parsed.
    pub fn load_or_empty(content: Option<&str>) -> Self {
        match content {
            None => Table::new(),
            Some(text) if text.trim().is_empty() => Table::new(),
            Some(text) => match Table::from_csv(text) {
                Ok(table) => table,
                Err(e) => {
                    warn!(error = %e, "persisted table is unreadable, starting empty");
                    Table::new()
                }
            },
        }
    }

    /// Serialize as CSV with a header row equal to the column union
    pub fn to_csv(&self) -> Result<String, SyncError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;

        for record in &self.records {
            writer.write_record(self.columns.iter().map(|column| {
                record
                    .get(column)
                    .map(FieldValue::to_string)
                    .unwrap_or_default()
            }))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| SyncError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| SyncError::EncodingError(e.to_string()))
    }
}

/// Return a new table with `record` upserted, leaving `table` untouched
pub fn upsert(table: &Table, record: FlatRecord) -> Result<Table, SyncError> {
    let mut next = table.clone();
    next.upsert(record)?;
    Ok(next)
}

/// Validate and return the record's date key
fn record_date(record: &FlatRecord) -> Result<String, SyncError> {
    let value = record.get(DATE_COLUMN).ok_or_else(|| {
        SyncError::InvalidRecord(format!("record has no `{DATE_COLUMN}` field"))
    })?;

    let text = value.as_str().ok_or_else(|| {
        SyncError::InvalidRecord(format!("`{DATE_COLUMN}` must be text, got {value:?}"))
    })?;

    if text.trim().is_empty() {
        return Err(SyncError::InvalidRecord(format!("`{DATE_COLUMN}` is empty")));
    }

    // Only canonical YYYY-MM-DD keeps lexicographic and calendar order equal
    let parsed = NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| SyncError::InvalidRecord(format!("malformed date {text:?}: {e}")))?;
    if parsed.format(DATE_FORMAT).to_string() != text {
        return Err(SyncError::InvalidRecord(format!(
            "date {text:?} is not in YYYY-MM-DD form"
        )));
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rec(date: &str, fields: &[(&str, i64)]) -> FlatRecord {
        let mut r = FlatRecord::new();
        r.insert(DATE_COLUMN, date);
        for (k, v) in fields {
            r.insert(*k, *v);
        }
        r
    }

    fn dates(table: &Table) -> Vec<&str> {
        table.records().iter().filter_map(|r| r.date()).collect()
    }

    #[test]
    fn test_upsert_replaces_same_date() {
        let mut table = Table::new();
        table.upsert(rec("2024-01-01", &[("X", 1)])).unwrap();
        table.upsert(rec("2024-01-01", &[("X", 2)])).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("2024-01-01").unwrap().get("X"),
            Some(&FieldValue::from(2))
        );
    }

    #[test]
    fn test_upsert_keeps_ascending_order() {
        let mut table = Table::new();
        for d in ["2024-03-01", "2023-12-31", "2024-01-15", "2024-01-02"] {
            table.upsert(rec(d, &[])).unwrap();
        }
        assert_eq!(
            dates(&table),
            vec!["2023-12-31", "2024-01-02", "2024-01-15", "2024-03-01"]
        );
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut base = Table::new();
        base.upsert(rec("2024-01-01", &[("X", 5)])).unwrap();
        let r = rec("2024-01-02", &[("Y", 7)]);

        let once = upsert(&base, r.clone()).unwrap();
        let twice = upsert(&once, r).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_column_preservation() {
        let mut table = Table::new();
        table.upsert(rec("2024-01-01", &[("X", 5)])).unwrap();
        table.upsert(rec("2024-01-02", &[("Y", 7)])).unwrap();

        assert_eq!(table.columns(), &["Date", "X", "Y"]);
        assert_eq!(
            table.to_csv().unwrap(),
            "Date,X,Y\n2024-01-01,5,\n2024-01-02,,7\n"
        );
    }

    #[test]
    fn test_replaced_row_keeps_stale_column_in_header() {
        let mut table = Table::new();
        table.upsert(rec("2024-01-01", &[("X", 5)])).unwrap();
        table.upsert(rec("2024-01-01", &[("Y", 7)])).unwrap();

        assert_eq!(table.columns(), &["Date", "X", "Y"]);
        assert_eq!(table.to_csv().unwrap(), "Date,X,Y\n2024-01-01,,7\n");
    }

    #[test]
    fn test_missing_date_is_rejected_without_mutation() {
        let mut table = Table::new();
        table.upsert(rec("2024-01-01", &[("X", 5)])).unwrap();
        let before = table.clone();

        let mut bad = FlatRecord::new();
        bad.insert("Sleep_Score", 80);
        let err = table.upsert(bad).unwrap_err();

        assert!(matches!(err, SyncError::InvalidRecord(_)));
        assert_eq!(table, before);
    }

    #[test]
    fn test_malformed_dates_are_rejected() {
        let mut table = Table::new();
        for bad in ["", "  ", "yesterday", "2024-13-01", "2024-1-5"] {
            let mut r = FlatRecord::new();
            r.insert(DATE_COLUMN, bad);
            assert!(table.upsert(r).is_err(), "accepted {bad:?}");
        }

        let mut numeric = FlatRecord::new();
        numeric.insert(DATE_COLUMN, 20240101);
        assert!(table.upsert(numeric).is_err());
        assert!(table.is_empty());
        assert_eq!(table.columns(), &["Date"]);
    }

    #[test]
    fn test_upsert_all_last_write_wins() {
        let mut table = Table::new();
        table
            .upsert_all(vec![
                rec("2024-01-01", &[("X", 1)]),
                rec("2024-01-01", &[("X", 9)]),
            ])
            .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("2024-01-01").unwrap().get("X"),
            Some(&FieldValue::from(9))
        );
    }

    #[test]
    fn test_upsert_all_is_atomic() {
        let mut table = Table::new();
        let result = table.upsert_all(vec![rec("2024-01-01", &[]), FlatRecord::new()]);
        assert!(result.is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_csv_round_trip() {
        let csv_text = "Date,Sleep_Score,Note\n2024-01-01,80,N/A\n2024-01-02,,ok\n";
        let table = Table::from_csv(csv_text).unwrap();

        assert_eq!(table.len(), 2);
        let first = table.get("2024-01-01").unwrap();
        assert_eq!(first.get("Sleep_Score"), Some(&FieldValue::from(80)));
        assert!(table.get("2024-01-02").unwrap().get("Sleep_Score").is_none());
        assert_eq!(table.to_csv().unwrap(), csv_text);
    }

    #[test]
    fn test_csv_header_order_moves_date_first() {
        let table = Table::from_csv("X,Date\n1,2024-01-01\n").unwrap();
        assert_eq!(table.columns(), &["Date", "X"]);
    }

    #[test]
    fn test_csv_duplicate_dates_collapse() {
        let table = Table::from_csv("Date,X\n2024-01-02,1\n2024-01-01,2\n2024-01-02,3\n").unwrap();
        assert_eq!(dates(&table), vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(
            table.get("2024-01-02").unwrap().get("X"),
            Some(&FieldValue::from(3))
        );
    }

    #[test]
    fn test_load_or_empty_on_corrupt_input() {
        assert!(Table::load_or_empty(None).is_empty());
        assert!(Table::load_or_empty(Some("")).is_empty());
        assert!(Table::load_or_empty(Some("Foo,Bar\n1,2\n")).is_empty());
        assert!(Table::load_or_empty(Some("\u{0}garbage")).is_empty());
    }

    #[test]
    fn test_csv_skips_rows_without_valid_date() {
        let csv_text = "Date,X\n\
                        2024-01-01,1\n\
                        ,\n\
                        2024-01-02,2\n\
                        not-a-date,3\n\
                        2024-01-03,3,extra\n\
                        2024-01-04,4\n\
                        ,\n";
        let table = Table::load_or_empty(Some(csv_text));

        assert_eq!(dates(&table), vec!["2024-01-01", "2024-01-02", "2024-01-04"]);
        assert_eq!(table.columns(), &["Date", "X"]);
        assert_eq!(
            table.get("2024-01-04").unwrap().get("X"),
            Some(&FieldValue::from(4))
        );
    }

    #[test]
    fn test_upsert_after_blank_trailing_row_keeps_history() {
        let mut csv_text = String::from("Date,Sleep_Score\n");
        for day in 1..=30 {
            csv_text.push_str(&format!("2023-12-{day:02},{}\n", 60 + day));
        }
        csv_text.push_str(",\n");

        let table = Table::load_or_empty(Some(&csv_text));
        let next = upsert(&table, rec("2024-01-15", &[("Sleep_Score", 80)])).unwrap();

        assert_eq!(next.len(), 31);
        assert_eq!(next.records()[0].date(), Some("2023-12-01"));
        assert_eq!(next.records()[30].date(), Some("2024-01-15"));
    }
}
