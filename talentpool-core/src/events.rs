//! Activity export loading
//!
//! One CSV row is one folder-move event for a candidate invitation. Dates are
//! coerced leniently (malformed values become `None`), folder names are kept
//! in raw and normalized form, and the raw records are retained so a labeled
//! export can reproduce every original column.

use crate::error::{DashboardError, Result};
use crate::folders::{FolderCatalog, FolderName};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

pub const COL_CANDIDATE: &str = "CAMPAIGNINVITATIONID";
pub const COL_INVITED_AT: &str = "INVITATIONDT";
pub const COL_ACTIVITY_AT: &str = "ACTIVITY_CREATED_AT";
pub const COL_FOLDER_FROM: &str = "FOLDER_FROM_TITLE";
pub const COL_FOLDER_TO: &str = "FOLDER_TO_TITLE";
pub const COL_SITE: &str = "CAMPAIGN_SITE";
pub const COL_TITLE: &str = "CAMPAIGNTITLE";
pub const COL_FAILED_REASON: &str = "FAILED_REASON";
pub const COL_CEFR: &str = "CEFR";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse an export timestamp; anything unrecognized is missing
///
/// Timestamps carrying an offset are converted to UTC.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Trimmed non-empty text, else missing
fn optional_text(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One folder-move event
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    /// Index of the source record in the owning table
    pub row: usize,
    pub candidate_id: String,
    pub invited_at: Option<NaiveDateTime>,
    pub activity_at: Option<NaiveDateTime>,
    pub folder_from: Option<FolderName>,
    pub folder_to: Option<FolderName>,
    pub site: Option<String>,
    pub title: Option<String>,
    pub failed_reason: Option<String>,
    pub cefr: Option<String>,
}

impl ActivityEvent {
    /// Whether either endpoint of this move is a client folder
    pub fn touches_client_folder(&self, catalog: &FolderCatalog) -> bool {
        catalog.is_client_folder(self.folder_from.as_ref())
            || catalog.is_client_folder(self.folder_to.as_ref())
    }
}

/// Which optional columns the export carried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptionalColumns {
    pub failed_reason: bool,
    pub cefr: bool,
}

/// Header positions of the columns the reports read
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    candidate: usize,
    invited_at: usize,
    activity_at: usize,
    folder_from: usize,
    folder_to: usize,
    site: usize,
    title: usize,
    failed_reason: Option<usize>,
    cefr: Option<usize>,
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
        };
        let require =
            |name: &'static str| find(name).ok_or(DashboardError::MissingColumn(name));

        Ok(ColumnLayout {
            candidate: require(COL_CANDIDATE)?,
            invited_at: require(COL_INVITED_AT)?,
            activity_at: require(COL_ACTIVITY_AT)?,
            folder_from: require(COL_FOLDER_FROM)?,
            folder_to: require(COL_FOLDER_TO)?,
            site: require(COL_SITE)?,
            title: require(COL_TITLE)?,
            failed_reason: find(COL_FAILED_REASON),
            cefr: find(COL_CEFR),
        })
    }

    fn event(&self, row: usize, record: &StringRecord) -> Option<ActivityEvent> {
        let cell = |idx: usize| record.get(idx).unwrap_or("");
        let candidate_id = optional_text(record.get(self.candidate))?;

        Some(ActivityEvent {
            row,
            candidate_id,
            invited_at: parse_timestamp(cell(self.invited_at)),
            activity_at: parse_timestamp(cell(self.activity_at)),
            folder_from: FolderName::parse(cell(self.folder_from)),
            folder_to: FolderName::parse(cell(self.folder_to)),
            site: optional_text(record.get(self.site)),
            title: optional_text(record.get(self.title)),
            failed_reason: self.failed_reason.and_then(|i| optional_text(record.get(i))),
            cefr: self.cefr.and_then(|i| optional_text(record.get(i))),
        })
    }
}

/// The loaded activity export
#[derive(Debug, Clone)]
pub struct EventTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
    events: Vec<ActivityEvent>,
    columns: OptionalColumns,
}

impl EventTable {
    /// Load an export from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DashboardError::MissingFile(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|source| DashboardError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        tracing::debug!(
            path = %path.display(),
            rows = table.len(),
            candidates = table.candidate_count(),
            "loaded activity export"
        );
        Ok(table)
    }

    /// Parse an export from any reader
    ///
    /// Rows without a candidate id are dropped.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(DashboardError::EmptyTable);
        }
        let layout = ColumnLayout::resolve(&headers)?;

        let mut records = Vec::new();
        let mut events = Vec::new();
        let mut dropped = 0usize;
        for result in rdr.records() {
            let record = result?;
            match layout.event(records.len(), &record) {
                Some(event) => {
                    events.push(event);
                    records.push(record);
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, "dropped rows without a candidate id");
        }
        if events.is_empty() {
            return Err(DashboardError::EmptyTable);
        }

        Ok(EventTable {
            headers,
            records,
            events,
            columns: OptionalColumns {
                failed_reason: layout.failed_reason.is_some(),
                cefr: layout.cefr.is_some(),
            },
        })
    }

    pub fn events(&self) -> &[ActivityEvent] {
        &self.events
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Raw record an event was parsed from
    pub fn record(&self, row: usize) -> Option<&StringRecord> {
        self.records.get(row)
    }

    pub fn columns(&self) -> OptionalColumns {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of distinct candidates
    pub fn candidate_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.candidate_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "CAMPAIGNINVITATIONID,INVITATIONDT,ACTIVITY_CREATED_AT,FOLDER_FROM_TITLE,FOLDER_TO_TITLE,CAMPAIGN_SITE,CAMPAIGNTITLE,FAILED_REASON,CEFR";

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2024-03-01 08:15:00"),
            Some(dt("2024-03-01 08:15:00"))
        );
        assert_eq!(
            parse_timestamp("2024-03-01 08:15:00.250"),
            Some(dt("2024-03-01 08:15:00") + chrono::Duration::milliseconds(250))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T08:15:00"),
            Some(dt("2024-03-01 08:15:00"))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T08:15:00+08:00"),
            Some(dt("2024-03-01 00:15:00"))
        );
        assert_eq!(
            parse_timestamp("2024-03-01 08:15:00+08:00"),
            Some(dt("2024-03-01 00:15:00"))
        );
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(dt("2024-03-01 00:00:00"))
        );
        assert_eq!(
            parse_timestamp("3/1/2024 8:15"),
            Some(dt("2024-03-01 08:15:00"))
        );
    }

    #[test]
    fn test_malformed_timestamp_is_missing() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn test_from_reader_parses_rows() {
        let csv = format!(
            "{HEADER}\n\
             101,2024-03-01 09:00:00,2024-03-02 10:00:00,Inbox, Talent Pool ,Manila,Voice Support,,B2\n\
             101,2024-03-01 09:00:00,bad,Talent Pool,Acme Wave,Manila,Voice Support,Failed interview,B2\n"
        );
        let table = EventTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.candidate_count(), 1);
        assert_eq!(
            table.columns(),
            OptionalColumns {
                failed_reason: true,
                cefr: true
            }
        );

        let first = &table.events()[0];
        assert_eq!(first.candidate_id, "101");
        assert_eq!(first.folder_to.as_ref().unwrap().key(), "talent pool");
        assert_eq!(first.failed_reason, None);
        assert_eq!(first.cefr.as_deref(), Some("B2"));

        let second = &table.events()[1];
        assert_eq!(second.activity_at, None);
        assert_eq!(second.failed_reason.as_deref(), Some("Failed interview"));
        assert_eq!(table.record(second.row).unwrap().get(4), Some("Acme Wave"));
    }

    #[test]
    fn test_optional_columns_may_be_absent() {
        let csv = "CAMPAIGNINVITATIONID,INVITATIONDT,ACTIVITY_CREATED_AT,FOLDER_FROM_TITLE,FOLDER_TO_TITLE,CAMPAIGN_SITE,CAMPAIGNTITLE\n\
                   7,2024-03-01,2024-03-01,Inbox,Completed,Cebu,Chat\n";
        let table = EventTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.columns(), OptionalColumns::default());
        assert_eq!(table.events()[0].cefr, None);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "CAMPAIGNINVITATIONID,INVITATIONDT\n1,2024-03-01\n";
        let err = EventTable::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::MissingColumn(COL_ACTIVITY_AT)
        ));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let err = EventTable::from_reader(HEADER.as_bytes()).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyTable));
        let err = EventTable::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyTable));
    }

    #[test]
    fn test_rows_without_candidate_are_dropped() {
        let csv = format!(
            "{HEADER}\n\
             ,2024-03-01,2024-03-01,Inbox,Completed,Cebu,Chat,,\n\
             5,2024-03-01,2024-03-01,Inbox,Completed,Cebu,Chat,,\n"
        );
        let table = EventTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.events()[0].row, 0);
        assert_eq!(table.record(0).unwrap().get(0), Some("5"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EventTable::load(Path::new("/nonexistent/export.csv")).unwrap_err();
        assert!(matches!(err, DashboardError::MissingFile(_)));
    }

    #[test]
    fn test_touches_client_folder() {
        let catalog = FolderCatalog::standard();
        let csv = format!(
            "{HEADER}\n\
             1,2024-03-01,2024-03-01,Talent Pool,Acme Wave,Cebu,Chat,,\n\
             1,2024-03-01,2024-03-02,Inbox,Completed,Cebu,Chat,,\n"
        );
        let table = EventTable::from_reader(csv.as_bytes()).unwrap();
        assert!(table.events()[0].touches_client_folder(&catalog));
        assert!(!table.events()[1].touches_client_folder(&catalog));
    }
}
