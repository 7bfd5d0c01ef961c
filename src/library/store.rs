use super::error::{LibraryError, LibraryResult};
use super::model::{Book, BookId, IssueId, IssueRecord, StudentId};

/// Filter pushed down to the store when listing issue records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueSelector {
    pub book_id: Option<BookId>,
    pub student_id: Option<StudentId>,
}

/// Record-level access to books and issue records.
///
/// Implementations perform no domain validation; the catalog and ledger
/// modules own every invariant and only ever call these methods from inside
/// [`LibraryStore::read`] or [`LibraryStore::transaction`].
pub trait LibraryRepo {
    fn list_books(&self) -> LibraryResult<Vec<Book>>;
    fn find_book(&self, id: BookId) -> LibraryResult<Option<Book>>;
    fn find_book_by_isbn(&self, isbn: &str) -> LibraryResult<Option<Book>>;
    /// One past the current maximum book id (1 for an empty catalog).
    fn next_book_id(&self) -> LibraryResult<BookId>;
    fn insert_book(&mut self, book: &Book) -> LibraryResult<()>;
    fn save_book(&mut self, book: &Book) -> LibraryResult<()>;
    fn remove_book(&mut self, id: BookId) -> LibraryResult<bool>;

    /// Ordered by id.
    fn list_issues(&self, selector: IssueSelector) -> LibraryResult<Vec<IssueRecord>>;
    fn find_issue(&self, id: IssueId) -> LibraryResult<Option<IssueRecord>>;
    fn next_issue_id(&self) -> LibraryResult<IssueId>;
    fn insert_issue(&mut self, record: &IssueRecord) -> LibraryResult<()>;
    fn save_issue(&mut self, record: &IssueRecord) -> LibraryResult<()>;
    fn remove_issue(&mut self, id: IssueId) -> LibraryResult<bool>;
}

pub type ReadWork<'w> = dyn FnMut(&dyn LibraryRepo) -> LibraryResult<()> + 'w;
pub type WriteWork<'w> = dyn FnMut(&mut dyn LibraryRepo) -> LibraryResult<()> + 'w;

/// A persistence backend that can run work atomically.
pub trait LibraryStore: Send {
    fn backend(&self) -> &'static str;

    fn read(&self, work: &mut ReadWork<'_>) -> LibraryResult<()>;

    /// Runs `work` so that either all of its writes become visible or none do.
    /// `work` is called exactly once.
    fn transaction(&mut self, work: &mut WriteWork<'_>) -> LibraryResult<()>;
}

pub fn read<T>(
    store: &dyn LibraryStore,
    f: impl FnOnce(&dyn LibraryRepo) -> LibraryResult<T>,
) -> LibraryResult<T> {
    let mut f = Some(f);
    let mut out = None;
    store.read(&mut |repo| {
        if let Some(f) = f.take() {
            out = Some(f(repo)?);
        }
        Ok(())
    })?;
    out.ok_or_else(|| LibraryError::Storage(format!("{} read did not run", store.backend())))
}

pub fn atomically<T>(
    store: &mut dyn LibraryStore,
    f: impl FnOnce(&mut dyn LibraryRepo) -> LibraryResult<T>,
) -> LibraryResult<T> {
    let mut f = Some(f);
    let mut out = None;
    store.transaction(&mut |repo| {
        if let Some(f) = f.take() {
            out = Some(f(repo)?);
        }
        Ok(())
    })?;
    out.ok_or_else(|| LibraryError::Storage(format!("{} transaction did not run", store.backend())))
}
