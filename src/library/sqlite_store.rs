use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use super::error::LibraryResult;
use super::model::{Book, BookId, IssueId, IssueRecord, IssueStatus};
use super::store::{IssueSelector, LibraryRepo, LibraryStore, ReadWork, WriteWork};

const BOOK_COLUMNS: &str = "id, title, author, isbn, genre, publication_year, total_copies,
     available_copies, description, date_added";
const ISSUE_COLUMNS: &str = "id, book_id, student_id, issue_date, due_date, status, return_date";

impl ToSql for IssueStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IssueStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        IssueStatus::parse(raw).ok_or_else(|| {
            FromSqlError::Other(format!("unknown issue status: {raw}").into())
        })
    }
}

fn book_from_row(r: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: r.get(0)?,
        title: r.get(1)?,
        author: r.get(2)?,
        isbn: r.get(3)?,
        genre: r.get(4)?,
        publication_year: r.get(5)?,
        total_copies: r.get(6)?,
        available_copies: r.get(7)?,
        description: r.get(8)?,
        date_added: r.get(9)?,
    })
}

fn issue_from_row(r: &Row<'_>) -> rusqlite::Result<IssueRecord> {
    Ok(IssueRecord {
        id: r.get(0)?,
        book_id: r.get(1)?,
        student_id: r.get(2)?,
        issue_date: r.get(3)?,
        due_date: r.get(4)?,
        status: r.get(5)?,
        return_date: r.get(6)?,
    })
}

/// Repository over a borrowed connection; used both for plain reads and
/// inside an open transaction.
struct SqliteRepo<'c> {
    conn: &'c Connection,
}

impl LibraryRepo for SqliteRepo<'_> {
    fn list_books(&self) -> LibraryResult<Vec<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id"))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn find_book(&self, id: BookId) -> LibraryResult<Option<Book>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"),
                [id],
                book_from_row,
            )
            .optional()?)
    }

    fn find_book_by_isbn(&self, isbn: &str) -> LibraryResult<Option<Book>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?"),
                [isbn],
                book_from_row,
            )
            .optional()?)
    }

    fn next_book_id(&self) -> LibraryResult<BookId> {
        Ok(self
            .conn
            .query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM books", [], |r| r.get(0))?)
    }

    fn insert_book(&mut self, book: &Book) -> LibraryResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO books({BOOK_COLUMNS}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            (
                book.id,
                &book.title,
                &book.author,
                &book.isbn,
                &book.genre,
                book.publication_year,
                book.total_copies,
                book.available_copies,
                &book.description,
                book.date_added,
            ),
        )?;
        Ok(())
    }

    fn save_book(&mut self, book: &Book) -> LibraryResult<()> {
        self.conn.execute(
            "UPDATE books
             SET title = ?, author = ?, isbn = ?, genre = ?, publication_year = ?,
                 total_copies = ?, available_copies = ?, description = ?
             WHERE id = ?",
            (
                &book.title,
                &book.author,
                &book.isbn,
                &book.genre,
                book.publication_year,
                book.total_copies,
                book.available_copies,
                &book.description,
                book.id,
            ),
        )?;
        Ok(())
    }

    fn remove_book(&mut self, id: BookId) -> LibraryResult<bool> {
        Ok(self.conn.execute("DELETE FROM books WHERE id = ?", [id])? > 0)
    }

    fn list_issues(&self, selector: IssueSelector) -> LibraryResult<Vec<IssueRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ISSUE_COLUMNS}
             FROM book_issues
             WHERE (?1 IS NULL OR book_id = ?1)
               AND (?2 IS NULL OR student_id = ?2)
             ORDER BY id"
        ))?;
        let issues = stmt
            .query_map((selector.book_id, selector.student_id), issue_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    fn find_issue(&self, id: IssueId) -> LibraryResult<Option<IssueRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM book_issues WHERE id = ?"),
                [id],
                issue_from_row,
            )
            .optional()?)
    }

    fn next_issue_id(&self) -> LibraryResult<IssueId> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(id), 0) + 1 FROM book_issues",
            [],
            |r| r.get(0),
        )?)
    }

    fn insert_issue(&mut self, record: &IssueRecord) -> LibraryResult<()> {
        self.conn.execute(
            &format!("INSERT INTO book_issues({ISSUE_COLUMNS}) VALUES(?, ?, ?, ?, ?, ?, ?)"),
            (
                record.id,
                record.book_id,
                record.student_id,
                record.issue_date,
                record.due_date,
                record.status,
                record.return_date,
            ),
        )?;
        Ok(())
    }

    fn save_issue(&mut self, record: &IssueRecord) -> LibraryResult<()> {
        self.conn.execute(
            "UPDATE book_issues
             SET book_id = ?, student_id = ?, issue_date = ?, due_date = ?,
                 status = ?, return_date = ?
             WHERE id = ?",
            (
                record.book_id,
                record.student_id,
                record.issue_date,
                record.due_date,
                record.status,
                record.return_date,
                record.id,
            ),
        )?;
        Ok(())
    }

    fn remove_issue(&mut self, id: IssueId) -> LibraryResult<bool> {
        Ok(self.conn.execute("DELETE FROM book_issues WHERE id = ?", [id])? > 0)
    }
}

/// Workspace-backed store. Each transaction is a SQLite transaction that is
/// rolled back when the work returns an error.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl LibraryStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn read(&self, work: &mut ReadWork<'_>) -> LibraryResult<()> {
        work(&SqliteRepo { conn: &self.conn })
    }

    fn transaction(&mut self, work: &mut WriteWork<'_>) -> LibraryResult<()> {
        let tx = self.conn.transaction()?;
        let res = work(&mut SqliteRepo { conn: &tx });
        match res {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                // Dropping also rolls back; be explicit so a failed rollback is logged.
                if let Err(rb) = tx.rollback() {
                    tracing::warn!(error = %rb, "sqlite rollback failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::library::error::LibraryError;
    use crate::library::store::{atomically, read};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn store() -> SqliteStore {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::init_schema(&conn).expect("schema");
        SqliteStore::new(conn)
    }

    fn book(id: BookId) -> Book {
        Book {
            id,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: format!("978-0-{id}"),
            genre: "Science Fiction".to_string(),
            publication_year: 1965,
            total_copies: 3,
            available_copies: 3,
            description: "Desert planet".to_string(),
            date_added: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn books_and_issues_survive_a_roundtrip_through_sqlite() {
        let mut s = store();
        let record = IssueRecord {
            id: 1,
            book_id: 4,
            student_id: 9,
            issue_date: date(2024, 3, 2),
            due_date: date(2024, 3, 16),
            status: IssueStatus::Issued,
            return_date: None,
        };
        atomically(&mut s, |repo| {
            repo.insert_book(&book(4))?;
            repo.insert_issue(&record)
        })
        .expect("insert");

        let found = read(&s, |repo| repo.find_book(4)).unwrap().expect("book");
        assert_eq!(found, book(4));
        let by_isbn = read(&s, |repo| repo.find_book_by_isbn("978-0-4")).unwrap();
        assert_eq!(by_isbn.map(|b| b.id), Some(4));

        let issues = read(&s, |repo| {
            repo.list_issues(IssueSelector {
                student_id: Some(9),
                ..IssueSelector::default()
            })
        })
        .unwrap();
        assert_eq!(issues, vec![record]);
        let none = read(&s, |repo| {
            repo.list_issues(IssueSelector {
                book_id: Some(5),
                ..IssueSelector::default()
            })
        })
        .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn error_inside_transaction_rolls_back() {
        let mut s = store();
        let res: LibraryResult<()> = atomically(&mut s, |repo| {
            repo.insert_book(&book(1))?;
            Err(LibraryError::invalid_state("abort"))
        });
        assert!(matches!(res, Err(LibraryError::InvalidState(_))));
        assert!(read(&s, |repo| repo.list_books()).unwrap().is_empty());
        assert_eq!(read(&s, |repo| repo.next_book_id()).unwrap(), 1);
    }

    #[test]
    fn schema_rejects_copy_counts_out_of_bounds() {
        let mut s = store();
        let mut bad = book(1);
        bad.available_copies = 4;
        let res = atomically(&mut s, |repo| repo.insert_book(&bad));
        assert!(matches!(res, Err(LibraryError::Sqlite(_))));
    }
}
