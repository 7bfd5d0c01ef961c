use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::library::store::{self, IssueSelector};
use crate::library::{validate, LibraryError, SqliteStore};

pub const DB_FILE_NAME: &str = "campus.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspace_meta(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // No foreign key from book_issues to books: deleting a book is
    // unconditional and callers reconcile outstanding issues themselves.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS books(
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            isbn TEXT NOT NULL,
            genre TEXT NOT NULL,
            publication_year INTEGER NOT NULL,
            total_copies INTEGER NOT NULL,
            available_copies INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date_added TEXT NOT NULL,
            CHECK(available_copies >= 0 AND available_copies <= total_copies)
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_books_isbn ON books(isbn)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS book_issues(
            id INTEGER PRIMARY KEY,
            book_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            issue_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('issued', 'returned')),
            return_date TEXT,
            CHECK((status = 'returned') = (return_date IS NOT NULL))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_book_issues_book ON book_issues(book_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_book_issues_student ON book_issues(student_id)",
        [],
    )?;

    ensure_workspace_id(conn)?;
    Ok(())
}

/// Checks that the SQLite file at `path` holds a campus library whose rows
/// satisfy the record invariants. Backup imports run this on the staged
/// database; every rejection is a [`LibraryError::Validation`].
pub fn verify_library_db(path: &Path) -> anyhow::Result<()> {
    let rejected =
        |why: String| LibraryError::validation(format!("not a campus library database: {why}"));

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| rejected(e.to_string()))?;
    for table in ["books", "book_issues"] {
        let present: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
                [table],
                |r| r.get(0),
            )
            .map_err(|e| rejected(e.to_string()))?;
        if !present {
            return Err(rejected(format!("missing table {table}")).into());
        }
    }

    let library = SqliteStore::new(conn);
    let (books, issues) = store::read(&library, |repo| {
        Ok((repo.list_books()?, repo.list_issues(IssueSelector::default())?))
    })
    .map_err(|e| rejected(e.to_string()))?;
    validate::check_records(&books, &issues)?;
    tracing::debug!(
        books = books.len(),
        issues = issues.len(),
        "staged library database verified"
    );
    Ok(())
}

/// Stable identifier of the workspace, created on first open. Carried in
/// backup manifests so restores can be traced to their source.
pub fn workspace_id(conn: &Connection) -> anyhow::Result<String> {
    let id: String = conn.query_row(
        "SELECT value FROM workspace_meta WHERE key = 'workspace_id'",
        [],
        |r| r.get(0),
    )?;
    Ok(id)
}

fn ensure_workspace_id(conn: &Connection) -> anyhow::Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM workspace_meta WHERE key = 'workspace_id'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    if existing.is_none() {
        conn.execute(
            "INSERT INTO workspace_meta(key, value) VALUES('workspace_id', ?)",
            [Uuid::new_v4().to_string()],
        )?;
    }
    Ok(())
}
