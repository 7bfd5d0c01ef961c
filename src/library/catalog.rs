//! Book inventory: creation, edits, removal and copy-count bookkeeping.

use chrono::{DateTime, Utc};

use super::error::{LibraryError, LibraryResult};
use super::model::{Availability, Book, BookId, BookPatch, BookQuery, NewBook};
use super::store::{atomically, read, LibraryRepo, LibraryStore};
use super::validate::{check_copy_ceiling, required, required_text};

pub fn get(store: &dyn LibraryStore, id: BookId) -> LibraryResult<Book> {
    read(store, |repo| {
        repo.find_book(id)?
            .ok_or_else(|| LibraryError::book_not_found(id))
    })
}

pub fn list(store: &dyn LibraryStore, query: &BookQuery) -> LibraryResult<Vec<Book>> {
    let books = read(store, |repo| repo.list_books())?;
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let genre = query
        .genre
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("all"));

    let mut out: Vec<Book> = books
        .into_iter()
        .filter(|b| match &search {
            Some(term) => {
                b.title.to_lowercase().contains(term)
                    || b.author.to_lowercase().contains(term)
                    || b.isbn.to_lowercase().contains(term)
            }
            None => true,
        })
        .filter(|b| genre.map_or(true, |g| b.genre == g))
        .filter(|b| match query.availability {
            Availability::All => true,
            Availability::Available => b.is_available(),
            Availability::Unavailable => !b.is_available(),
        })
        .collect();
    out.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
    Ok(out)
}

pub fn genres(store: &dyn LibraryStore) -> LibraryResult<Vec<String>> {
    let mut genres: Vec<String> = read(store, |repo| repo.list_books())?
        .into_iter()
        .map(|b| b.genre)
        .filter(|g| !g.trim().is_empty())
        .collect();
    genres.sort();
    genres.dedup();
    Ok(genres)
}

pub fn create(
    store: &mut dyn LibraryStore,
    input: NewBook,
    now: DateTime<Utc>,
) -> LibraryResult<Book> {
    let title = required_text("title", input.title)?;
    let author = required_text("author", input.author)?;
    let isbn = required_text("isbn", input.isbn)?;
    let genre = required_text("genre", input.genre)?;
    let publication_year = required("publicationYear", input.publication_year)?;
    let total_copies = required("totalCopies", input.total_copies)?;
    if total_copies < 1 {
        return Err(LibraryError::validation(
            "totalCopies must be at least 1",
        ));
    }
    check_copy_ceiling(total_copies)?;

    let book = atomically(store, |repo| {
        if repo.find_book_by_isbn(&isbn)?.is_some() {
            return Err(LibraryError::validation(format!(
                "a book with ISBN {isbn} already exists"
            )));
        }
        let book = Book {
            id: repo.next_book_id()?,
            title,
            author,
            isbn,
            genre,
            publication_year,
            total_copies,
            available_copies: total_copies,
            description: input.description.unwrap_or_default().trim().to_string(),
            date_added: now,
        };
        repo.insert_book(&book)?;
        Ok(book)
    })?;

    tracing::info!(book_id = book.id, isbn = %book.isbn, copies = book.total_copies, "book created");
    Ok(book)
}

pub fn update(store: &mut dyn LibraryStore, id: BookId, patch: BookPatch) -> LibraryResult<Book> {
    let book = atomically(store, |repo| {
        let mut book = repo
            .find_book(id)?
            .ok_or_else(|| LibraryError::book_not_found(id))?;

        if let Some(isbn) = patch.isbn {
            let isbn = required_text("isbn", Some(isbn))?;
            if let Some(other) = repo.find_book_by_isbn(&isbn)? {
                if other.id != id {
                    return Err(LibraryError::validation(format!(
                        "ISBN {isbn} is already used by book {}",
                        other.id
                    )));
                }
            }
            book.isbn = isbn;
        }
        if let Some(title) = patch.title {
            book.title = required_text("title", Some(title))?;
        }
        if let Some(author) = patch.author {
            book.author = required_text("author", Some(author))?;
        }
        if let Some(genre) = patch.genre {
            book.genre = required_text("genre", Some(genre))?;
        }
        if let Some(year) = patch.publication_year {
            book.publication_year = year;
        }
        if let Some(description) = patch.description {
            book.description = description.trim().to_string();
        }
        if let Some(total) = patch.total_copies {
            if total < 0 {
                return Err(LibraryError::validation("totalCopies must not be negative"));
            }
            check_copy_ceiling(total)?;
            let delta = total - book.total_copies;
            book.total_copies = total;
            book.available_copies = (book.available_copies + delta).max(0);
        }

        repo.save_book(&book)?;
        Ok(book)
    })?;

    tracing::info!(book_id = id, available = book.available_copies, total = book.total_copies, "book updated");
    Ok(book)
}

/// Removes the book regardless of outstanding issues.
pub fn delete(store: &mut dyn LibraryStore, id: BookId) -> LibraryResult<()> {
    atomically(store, |repo| {
        if !repo.remove_book(id)? {
            return Err(LibraryError::book_not_found(id));
        }
        Ok(())
    })?;
    tracing::info!(book_id = id, "book deleted");
    Ok(())
}

pub fn adjust_availability(
    store: &mut dyn LibraryStore,
    id: BookId,
    delta: i64,
) -> LibraryResult<Book> {
    let book = atomically(store, |repo| apply_adjustment(repo, id, delta))?;
    tracing::info!(book_id = id, delta, available = book.available_copies, "availability adjusted");
    Ok(book)
}

/// Copy-count change used by the ledger inside its own transaction.
pub(super) fn apply_adjustment(
    repo: &mut dyn LibraryRepo,
    id: BookId,
    delta: i64,
) -> LibraryResult<Book> {
    let mut book = repo
        .find_book(id)?
        .ok_or_else(|| LibraryError::book_not_found(id))?;
    let next = book
        .available_copies
        .checked_add(delta)
        .filter(|n| (0..=book.total_copies).contains(n))
        .ok_or_else(|| {
            LibraryError::invalid_state(format!(
                "adjusting book {id} by {delta} leaves its copy count outside 0..={}",
                book.total_copies
            ))
        })?;
    book.available_copies = next;
    repo.save_book(&book)?;
    Ok(book)
}
