//! Header-driven tabular feed.
//!
//! Columns are located by header name through a [`ColumnMapping`] supplied per
//! job. Records are produced lazily, one row at a time.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Serialize;
use thiserror::Error;

use iamdir_core::{DirectoryError, DirectoryResult};

/// Record fields the reconciler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedField {
    LoginName,
    Email,
    FirstName,
    LastName,
    Active,
}

impl FeedField {
    pub const ALL: [FeedField; 5] = [
        FeedField::LoginName,
        FeedField::Email,
        FeedField::FirstName,
        FeedField::LastName,
        FeedField::Active,
    ];

    pub const REQUIRED: [FeedField; 4] = [
        FeedField::LoginName,
        FeedField::Email,
        FeedField::FirstName,
        FeedField::LastName,
    ];

    /// Canonical column header.
    pub fn column(&self) -> &'static str {
        match self {
            FeedField::LoginName => "loginName",
            FeedField::Email => "email",
            FeedField::FirstName => "firstName",
            FeedField::LastName => "lastName",
            FeedField::Active => "active",
        }
    }
}

/// Field -> column header. Header matching ignores case and surrounding
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: BTreeMap<FeedField, String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            columns: FeedField::ALL
                .iter()
                .map(|f| (*f, f.column().to_string()))
                .collect(),
        }
    }
}

impl ColumnMapping {
    /// Read `field` from a differently named column.
    pub fn with_column(mut self, field: FeedField, header: impl Into<String>) -> Self {
        self.columns.insert(field, header.into());
        self
    }

    pub fn header(&self, field: FeedField) -> &str {
        self.columns
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.column())
    }

    fn resolve(&self, headers: &csv::StringRecord) -> BTreeMap<FeedField, usize> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        FeedField::ALL
            .iter()
            .filter_map(|field| {
                let wanted = self.header(*field).trim().to_lowercase();
                normalized
                    .iter()
                    .position(|h| *h == wanted)
                    .map(|idx| (*field, idx))
            })
            .collect()
    }
}

/// One raw candidate record. Fields are trimmed; blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    /// 1-based physical line in the source (header is line 1).
    pub line: u64,
    pub login_name: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: Option<String>,
}

/// A record that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub login_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
}

impl FeedRecord {
    fn get(&self, field: FeedField) -> Option<&str> {
        let value = match field {
            FeedField::LoginName => &self.login_name,
            FeedField::Email => &self.email,
            FeedField::FirstName => &self.first_name,
            FeedField::LastName => &self.last_name,
            FeedField::Active => &self.active,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn set(&mut self, field: FeedField, value: Option<String>) {
        let slot = match field {
            FeedField::LoginName => &mut self.login_name,
            FeedField::Email => &mut self.email,
            FeedField::FirstName => &mut self.first_name,
            FeedField::LastName => &mut self.last_name,
            FeedField::Active => &mut self.active,
        };
        *slot = value;
    }

    fn required(&self, field: FeedField) -> DirectoryResult<String> {
        self.get(field)
            .map(str::to_string)
            .ok_or_else(|| DirectoryError::validation(format!("field '{}' is required", field.column())))
    }

    /// Checks that every required field is present and non-blank.
    pub fn validate(&self) -> DirectoryResult<Candidate> {
        Ok(Candidate {
            login_name: self.required(FeedField::LoginName)?,
            email: self.required(FeedField::Email)?,
            first_name: self.required(FeedField::FirstName)?,
            last_name: self.required(FeedField::LastName)?,
            active: parse_active(self.get(FeedField::Active)),
        })
    }
}

/// Absent or blank means active; otherwise `true`, `yes`, `1` or `y`
/// (any case) are truthy and everything else is not.
pub fn parse_active(token: Option<&str>) -> bool {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        None => true,
        Some(t) => matches!(t.to_lowercase().as_str(), "true" | "yes" | "1" | "y"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The source itself cannot be read; the job must fail.
    #[error("feed unreadable: {0}")]
    Unreadable(String),

    /// One row could not be decoded; only that record fails.
    #[error("line {line}: malformed row: {reason}")]
    MalformedRow { line: u64, reason: String },
}

impl FeedError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Unreadable(_))
    }
}

/// Lazy iterator over the records of a CSV source.
pub struct CsvFeed<R: Read> {
    rows: csv::StringRecordsIntoIter<R>,
    columns: BTreeMap<FeedField, usize>,
    last_line: u64,
}

impl<R: Read> std::fmt::Debug for CsvFeed<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvFeed")
            .field("columns", &self.columns)
            .field("last_line", &self.last_line)
            .finish_non_exhaustive()
    }
}

impl<R: Read> CsvFeed<R> {
    /// Reads the header row. Fails only if the header itself is unreadable;
    /// missing columns surface later as per-record validation failures.
    pub fn open(source: R, mapping: &ColumnMapping) -> Result<Self, FeedError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| FeedError::Unreadable(e.to_string()))?
            .clone();
        let columns = mapping.resolve(&headers);
        tracing::debug!(columns = ?columns, "feed header resolved");

        Ok(Self {
            rows: reader.into_records(),
            columns,
            last_line: 1,
        })
    }

    fn to_record(&self, row: &csv::StringRecord, line: u64) -> FeedRecord {
        let mut record = FeedRecord {
            line,
            ..Default::default()
        };
        for (field, idx) in &self.columns {
            let value = row
                .get(*idx)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            record.set(*field, value);
        }
        record
    }
}

impl<R: Read> Iterator for CsvFeed<R> {
    type Item = Result<FeedRecord, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.rows.next()?;
        match next {
            Ok(row) => {
                let line = row
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.last_line + 1);
                self.last_line = line;
                Some(Ok(self.to_record(&row, line)))
            }
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.last_line + 1);
                self.last_line = line;
                match err.kind() {
                    csv::ErrorKind::Io(_) => Some(Err(FeedError::Unreadable(err.to_string()))),
                    _ => Some(Err(FeedError::MalformedRow {
                        line,
                        reason: err.to_string(),
                    })),
                }
            }
        }
    }
}

/// Description of the accepted feed layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedTemplate {
    pub columns: Vec<&'static str>,
    pub required: Vec<&'static str>,
    pub active_values: Vec<&'static str>,
    pub example: String,
}

pub fn feed_template() -> FeedTemplate {
    FeedTemplate {
        columns: FeedField::ALL.iter().map(FeedField::column).collect(),
        required: FeedField::REQUIRED.iter().map(FeedField::column).collect(),
        active_values: vec!["true", "yes", "1", "y"],
        example: "loginName,email,firstName,lastName,active\n\
                  john.doe,john.doe@example.com,John,Doe,true\n\
                  jane.smith,jane.smith@example.com,Jane,Smith,true\n"
            .to_string(),
    }
}
