use std::collections::HashSet;

use chrono::{Days, NaiveDate};

use super::error::{LibraryError, LibraryResult};
use super::model::{Book, IssueRecord};

pub const DEFAULT_LOAN_DAYS: i64 = 14;
pub const MAX_LOAN_DAYS: i64 = 3650;
/// Upper bound on `totalCopies`; keeps copy arithmetic and catalog totals in range.
pub const MAX_COPIES: i64 = 1_000_000;

pub fn required<T>(field: &str, value: Option<T>) -> LibraryResult<T> {
    value.ok_or_else(|| LibraryError::validation(format!("missing required field: {field}")))
}

/// Trimmed, non-blank text.
pub fn required_text(field: &str, value: Option<String>) -> LibraryResult<String> {
    let text = required(field, value)?.trim().to_string();
    if text.is_empty() {
        return Err(LibraryError::validation(format!(
            "missing required field: {field}"
        )));
    }
    Ok(text)
}

pub fn check_copy_ceiling(total_copies: i64) -> LibraryResult<()> {
    if total_copies > MAX_COPIES {
        return Err(LibraryError::validation(format!(
            "totalCopies must not exceed {MAX_COPIES}, got {total_copies}"
        )));
    }
    Ok(())
}

/// Record-level invariants shared by fixture sets and imported workspaces:
/// unique ids and ISBNs, copy counts within bounds, and a return date exactly
/// when the record is returned.
pub fn check_records(books: &[Book], issues: &[IssueRecord]) -> LibraryResult<()> {
    let mut book_ids = HashSet::new();
    let mut isbns = HashSet::new();
    for b in books {
        if !book_ids.insert(b.id) {
            return Err(LibraryError::validation(format!("duplicate book id {}", b.id)));
        }
        if !isbns.insert(b.isbn.as_str()) {
            return Err(LibraryError::validation(format!("duplicate ISBN {}", b.isbn)));
        }
        if !b.copies_in_bounds() {
            return Err(LibraryError::validation(format!(
                "book {} has {} of {} copies available",
                b.id, b.available_copies, b.total_copies
            )));
        }
        check_copy_ceiling(b.total_copies)?;
    }

    let mut issue_ids = HashSet::new();
    for r in issues {
        if !issue_ids.insert(r.id) {
            return Err(LibraryError::validation(format!("duplicate issue id {}", r.id)));
        }
        if !r.is_consistent() {
            return Err(LibraryError::validation(format!(
                "issue {} has status {} but returnDate {:?}",
                r.id,
                r.status.as_str(),
                r.return_date
            )));
        }
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` date. A full ISO timestamp (`YYYY-MM-DDT...`) is
/// accepted and truncated to its date part.
pub fn parse_iso_date(field: &str, raw: &str) -> LibraryResult<NaiveDate> {
    let t = raw.trim();
    let date_part = match t.split_once('T') {
        Some((date, _)) => date,
        None => t,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .filter(|_| date_part.len() == 10)
        .ok_or_else(|| {
            LibraryError::validation(format!("{field} must be an ISO date (YYYY-MM-DD), got {t:?}"))
        })
}

pub fn default_due_date(today: NaiveDate, loan_days: i64) -> LibraryResult<NaiveDate> {
    u64::try_from(loan_days)
        .ok()
        .filter(|days| *days <= MAX_LOAN_DAYS as u64)
        .and_then(|days| today.checked_add_days(Days::new(days)))
        .ok_or_else(|| {
            LibraryError::validation(format!(
                "loan period must be within 0..={MAX_LOAN_DAYS} days, got {loan_days}"
            ))
        })
}
