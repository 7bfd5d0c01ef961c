//! JSON seed data for the in-memory store and for workspace imports.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::error::{LibraryError, LibraryResult};
use super::model::{Book, BookId, IssueRecord, IssueStatus};
use super::store::{atomically, LibraryStore};
use super::validate::check_records;

const BUNDLED: &str = include_str!("../../fixtures/library.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub issues: Vec<IssueRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub books: usize,
    pub issues: usize,
}

impl Fixtures {
    pub fn bundled() -> anyhow::Result<Self> {
        serde_json::from_str(BUNDLED).context("bundled library fixtures are invalid JSON")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixtures {}", path.to_string_lossy()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("fixtures {} are invalid", path.to_string_lossy()))
    }

    /// Checks the data-model invariants on the fixture set alone. On top of the
    /// per-record checks, every issue must point at a fixture book and each
    /// book's missing copies must equal its outstanding issues, so that every
    /// seeded loan can be returned.
    pub fn validate(&self) -> LibraryResult<()> {
        check_records(&self.books, &self.issues)?;

        let mut outstanding: HashMap<BookId, i64> =
            self.books.iter().map(|b| (b.id, 0)).collect();
        for r in &self.issues {
            let Some(count) = outstanding.get_mut(&r.book_id) else {
                return Err(LibraryError::validation(format!(
                    "issue {} refers to book {} which is not in the fixtures",
                    r.id, r.book_id
                )));
            };
            if r.status == IssueStatus::Issued {
                *count += 1;
            }
        }
        for b in &self.books {
            let on_loan = b.total_copies - b.available_copies;
            let issued = outstanding.get(&b.id).copied().unwrap_or(0);
            if on_loan != issued {
                return Err(LibraryError::validation(format!(
                    "book {} has {on_loan} copies out but {issued} outstanding issues",
                    b.id
                )));
            }
        }
        Ok(())
    }

    /// Inserts every record in one transaction. Ids and ISBNs must not collide
    /// with records already in the store.
    pub fn seed(&self, store: &mut dyn LibraryStore) -> LibraryResult<SeedSummary> {
        self.validate()?;
        atomically(store, |repo| {
            for b in &self.books {
                if repo.find_book(b.id)?.is_some() {
                    return Err(LibraryError::validation(format!("book id {} already exists", b.id)));
                }
                if repo.find_book_by_isbn(&b.isbn)?.is_some() {
                    return Err(LibraryError::validation(format!(
                        "a book with ISBN {} already exists",
                        b.isbn
                    )));
                }
                repo.insert_book(b)?;
            }
            for r in &self.issues {
                if repo.find_issue(r.id)?.is_some() {
                    return Err(LibraryError::validation(format!("issue id {} already exists", r.id)));
                }
                repo.insert_issue(r)?;
            }
            Ok(())
        })?;
        tracing::info!(
            books = self.books.len(),
            issues = self.issues.len(),
            backend = store.backend(),
            "fixtures seeded"
        );
        Ok(SeedSummary {
            books: self.books.len(),
            issues: self.issues.len(),
        })
    }
}
