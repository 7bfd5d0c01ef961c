//! Issue/return workflow. Every mutation here changes the ledger and the
//! catalog's copy count in a single store transaction.

use chrono::NaiveDate;

use super::catalog::apply_adjustment;
use super::error::{LibraryError, LibraryResult};
use super::model::{
    Book, BookId, DisplayStatus, IssueId, IssueQuery, IssueRecord, IssueRequest, IssueStatus,
    IssueView, LibrarySummary, StatusFilter, StudentId,
};
use super::store::{atomically, read, IssueSelector, LibraryStore};

pub fn is_overdue(record: &IssueRecord, as_of: NaiveDate) -> bool {
    record.status == IssueStatus::Issued && record.due_date < as_of
}

pub fn display_status(record: &IssueRecord, as_of: NaiveDate) -> DisplayStatus {
    match record.status {
        IssueStatus::Returned => DisplayStatus::Returned,
        IssueStatus::Issued if is_overdue(record, as_of) => DisplayStatus::Overdue,
        IssueStatus::Issued => DisplayStatus::Issued,
    }
}

pub fn view(record: IssueRecord, as_of: NaiveDate) -> IssueView {
    let display_status = display_status(&record, as_of);
    IssueView {
        record,
        display_status,
    }
}

pub fn get(store: &dyn LibraryStore, id: IssueId) -> LibraryResult<IssueRecord> {
    read(store, |repo| {
        repo.find_issue(id)?
            .ok_or_else(|| LibraryError::issue_not_found(id))
    })
}

pub fn list(
    store: &dyn LibraryStore,
    query: &IssueQuery,
    as_of: NaiveDate,
) -> LibraryResult<Vec<IssueRecord>> {
    let selector = IssueSelector {
        book_id: query.book_id,
        student_id: query.student_id,
    };
    let records = read(store, |repo| repo.list_issues(selector))?;
    Ok(records
        .into_iter()
        .filter(|r| match query.status {
            StatusFilter::All => true,
            StatusFilter::Issued => r.status == IssueStatus::Issued,
            StatusFilter::Returned => r.status == IssueStatus::Returned,
            StatusFilter::Overdue => is_overdue(r, as_of),
        })
        .collect())
}

pub fn by_student(store: &dyn LibraryStore, student_id: StudentId) -> LibraryResult<Vec<IssueRecord>> {
    read(store, |repo| {
        repo.list_issues(IssueSelector {
            student_id: Some(student_id),
            ..IssueSelector::default()
        })
    })
}

pub fn by_book(store: &dyn LibraryStore, book_id: BookId) -> LibraryResult<Vec<IssueRecord>> {
    read(store, |repo| {
        repo.list_issues(IssueSelector {
            book_id: Some(book_id),
            ..IssueSelector::default()
        })
    })
}

pub fn overdue(store: &dyn LibraryStore, as_of: NaiveDate) -> LibraryResult<Vec<IssueRecord>> {
    list(
        store,
        &IssueQuery {
            status: StatusFilter::Overdue,
            ..IssueQuery::default()
        },
        as_of,
    )
}

pub fn issue(
    store: &mut dyn LibraryStore,
    req: IssueRequest,
    today: NaiveDate,
) -> LibraryResult<IssueRecord> {
    let record = atomically(store, |repo| {
        match repo.find_book(req.book_id)? {
            Some(book) if book.is_available() => {}
            _ => {
                return Err(LibraryError::Unavailable {
                    book_id: req.book_id,
                })
            }
        }
        let record = IssueRecord {
            id: repo.next_issue_id()?,
            book_id: req.book_id,
            student_id: req.student_id,
            issue_date: today,
            due_date: req.due_date,
            status: IssueStatus::Issued,
            return_date: None,
        };
        repo.insert_issue(&record)?;
        apply_adjustment(repo, req.book_id, -1)?;
        Ok(record)
    })?;

    tracing::info!(
        issue_id = record.id,
        book_id = record.book_id,
        student_id = record.student_id,
        due = %record.due_date,
        "book issued"
    );
    Ok(record)
}

pub fn return_book(
    store: &mut dyn LibraryStore,
    id: IssueId,
    today: NaiveDate,
) -> LibraryResult<IssueRecord> {
    let record = atomically(store, |repo| {
        let mut record = repo
            .find_issue(id)?
            .ok_or_else(|| LibraryError::issue_not_found(id))?;
        if record.status == IssueStatus::Returned {
            return Err(LibraryError::invalid_state(format!(
                "issue record {id} is already returned"
            )));
        }
        record.status = IssueStatus::Returned;
        record.return_date = Some(today);
        repo.save_issue(&record)?;
        apply_adjustment(repo, record.book_id, 1)?;
        Ok(record)
    })?;

    tracing::info!(issue_id = id, book_id = record.book_id, "book returned");
    Ok(record)
}

/// Removes a record in any state. A still-issued record gives its copy back
/// first, unless its book has since been removed from the catalog.
pub fn delete(store: &mut dyn LibraryStore, id: IssueId) -> LibraryResult<()> {
    let restored = atomically(store, |repo| {
        let record = repo
            .find_issue(id)?
            .ok_or_else(|| LibraryError::issue_not_found(id))?;
        let restore = record.status == IssueStatus::Issued
            && repo.find_book(record.book_id)?.is_some();
        if restore {
            apply_adjustment(repo, record.book_id, 1)?;
        }
        repo.remove_issue(id)?;
        Ok(restore)
    })?;

    tracing::info!(issue_id = id, restored_copy = restored, "issue record deleted");
    Ok(())
}

/// Moves the due date of an outstanding issue. Returned records are frozen.
pub fn extend_due(
    store: &mut dyn LibraryStore,
    id: IssueId,
    due_date: NaiveDate,
) -> LibraryResult<IssueRecord> {
    let record = atomically(store, |repo| {
        let mut record = repo
            .find_issue(id)?
            .ok_or_else(|| LibraryError::issue_not_found(id))?;
        if record.status != IssueStatus::Issued {
            return Err(LibraryError::invalid_state(format!(
                "issue record {id} is already returned"
            )));
        }
        if due_date < record.issue_date {
            return Err(LibraryError::validation(
                "dueDate must not be before the issue date",
            ));
        }
        record.due_date = due_date;
        repo.save_issue(&record)?;
        Ok(record)
    })?;

    tracing::info!(issue_id = id, due = %record.due_date, "due date changed");
    Ok(record)
}

pub fn summary(store: &dyn LibraryStore, as_of: NaiveDate) -> LibraryResult<LibrarySummary> {
    let (books, issues) = read(store, |repo| {
        Ok((repo.list_books()?, repo.list_issues(IssueSelector::default())?))
    })?;

    let copies = |field: fn(&Book) -> i64| {
        books
            .iter()
            .try_fold(0i64, |acc, b| acc.checked_add(field(b)))
            .ok_or_else(|| LibraryError::invalid_state("catalog copy totals overflow"))
    };
    let mut out = LibrarySummary {
        title_count: books.len(),
        total_copies: copies(|b| b.total_copies)?,
        available_copies: copies(|b| b.available_copies)?,
        ..LibrarySummary::default()
    };
    for r in &issues {
        match display_status(r, as_of) {
            DisplayStatus::Issued => out.active_issues += 1,
            DisplayStatus::Overdue => {
                out.active_issues += 1;
                out.overdue_issues += 1;
            }
            DisplayStatus::Returned => out.returned_issues += 1,
        }
    }
    Ok(out)
}
