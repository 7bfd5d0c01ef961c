use std::collections::BTreeMap;

use super::error::LibraryResult;
use super::model::{Book, BookId, IssueId, IssueRecord};
use super::store::{IssueSelector, LibraryRepo, LibraryStore, ReadWork, WriteWork};

#[derive(Debug, Clone, Default)]
struct Aggregate {
    books: BTreeMap<BookId, Book>,
    issues: BTreeMap<IssueId, IssueRecord>,
}

impl LibraryRepo for Aggregate {
    fn list_books(&self) -> LibraryResult<Vec<Book>> {
        Ok(self.books.values().cloned().collect())
    }

    fn find_book(&self, id: BookId) -> LibraryResult<Option<Book>> {
        Ok(self.books.get(&id).cloned())
    }

    fn find_book_by_isbn(&self, isbn: &str) -> LibraryResult<Option<Book>> {
        Ok(self.books.values().find(|b| b.isbn == isbn).cloned())
    }

    fn next_book_id(&self) -> LibraryResult<BookId> {
        Ok(self.books.keys().next_back().map(|id| id + 1).unwrap_or(1))
    }

    fn insert_book(&mut self, book: &Book) -> LibraryResult<()> {
        self.books.insert(book.id, book.clone());
        Ok(())
    }

    fn save_book(&mut self, book: &Book) -> LibraryResult<()> {
        self.books.insert(book.id, book.clone());
        Ok(())
    }

    fn remove_book(&mut self, id: BookId) -> LibraryResult<bool> {
        Ok(self.books.remove(&id).is_some())
    }

    fn list_issues(&self, selector: IssueSelector) -> LibraryResult<Vec<IssueRecord>> {
        Ok(self
            .issues
            .values()
            .filter(|r| selector.book_id.map_or(true, |b| r.book_id == b))
            .filter(|r| selector.student_id.map_or(true, |s| r.student_id == s))
            .cloned()
            .collect())
    }

    fn find_issue(&self, id: IssueId) -> LibraryResult<Option<IssueRecord>> {
        Ok(self.issues.get(&id).cloned())
    }

    fn next_issue_id(&self) -> LibraryResult<IssueId> {
        Ok(self.issues.keys().next_back().map(|id| id + 1).unwrap_or(1))
    }

    fn insert_issue(&mut self, record: &IssueRecord) -> LibraryResult<()> {
        self.issues.insert(record.id, record.clone());
        Ok(())
    }

    fn save_issue(&mut self, record: &IssueRecord) -> LibraryResult<()> {
        self.issues.insert(record.id, record.clone());
        Ok(())
    }

    fn remove_issue(&mut self, id: IssueId) -> LibraryResult<bool> {
        Ok(self.issues.remove(&id).is_some())
    }
}

/// In-process store. Transactions run against a draft copy of the whole
/// aggregate which replaces the live state only when the work succeeds.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Aggregate,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LibraryStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn read(&self, work: &mut ReadWork<'_>) -> LibraryResult<()> {
        work(&self.state)
    }

    fn transaction(&mut self, work: &mut WriteWork<'_>) -> LibraryResult<()> {
        let mut draft = self.state.clone();
        work(&mut draft)?;
        self.state = draft;
        Ok(())
    }
}
