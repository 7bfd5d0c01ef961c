use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type BookId = i64;
pub type IssueId = i64;
pub type StudentId = i64;

/// A catalogued title and its copy counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: String,
    pub publication_year: i32,
    pub total_copies: i64,
    pub available_copies: i64,
    #[serde(default)]
    pub description: String,
    pub date_added: DateTime<Utc>,
}

impl Book {
    pub fn copies_in_bounds(&self) -> bool {
        (0..=self.total_copies).contains(&self.available_copies)
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// Input for `catalog::create`. Every required field is optional here so that a
/// missing field surfaces as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub total_copies: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub total_copies: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    All,
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    #[serde(default)]
    pub availability: Availability,
}

/// Persisted ledger status. `overdue` is deliberately absent; see [`DisplayStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Issued,
    Returned,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Returned => "returned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "issued" => Some(Self::Issued),
            "returned" => Some(Self::Returned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id: IssueId,
    pub book_id: BookId,
    pub student_id: StudentId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: IssueStatus,
    pub return_date: Option<NaiveDate>,
}

impl IssueRecord {
    pub fn is_consistent(&self) -> bool {
        match self.status {
            IssueStatus::Issued => self.return_date.is_none(),
            IssueStatus::Returned => self.return_date.is_some(),
        }
    }
}

/// Status shown to users, derived from a record and a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Issued,
    Returned,
    Overdue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Issued,
    Returned,
    Overdue,
}

#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    pub book_id: Option<BookId>,
    pub student_id: Option<StudentId>,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueRequest {
    pub book_id: BookId,
    pub student_id: StudentId,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueView {
    #[serde(flatten)]
    pub record: IssueRecord,
    pub display_status: DisplayStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub title_count: usize,
    pub total_copies: i64,
    pub available_copies: i64,
    pub active_issues: usize,
    pub overdue_issues: usize,
    pub returned_issues: usize,
}
