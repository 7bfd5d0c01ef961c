use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{decode, get_required_i64, store, store_mut, to_json};
use crate::ipc::types::{AppState, Request};
use crate::library::catalog;
use crate::library::model::{BookPatch, BookQuery, NewBook};
use chrono::Utc;
use serde_json::json;

fn books_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let query: BookQuery = decode(&req.params, "book query")?;
    let books = catalog::list(store(state)?, &query)?;
    Ok(json!({ "books": to_json(&books)? }))
}

fn books_genres(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let genres = catalog::genres(store(state)?)?;
    Ok(json!({ "genres": genres }))
}

fn books_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let book_id = get_required_i64(&req.params, "bookId")?;
    to_json(&catalog::get(store(state)?, book_id)?)
}

fn books_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let input: NewBook = decode(&req.params, "book")?;
    let book = catalog::create(store_mut(state)?, input, Utc::now())?;
    to_json(&book)
}

fn books_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let book_id = get_required_i64(&req.params, "bookId")?;
    let patch: BookPatch = match req.params.get("patch") {
        Some(p) => decode(p, "patch")?,
        None => return Err(HandlerErr::bad_params("missing patch")),
    };
    to_json(&catalog::update(store_mut(state)?, book_id, patch)?)
}

fn books_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let book_id = get_required_i64(&req.params, "bookId")?;
    catalog::delete(store_mut(state)?, book_id)?;
    Ok(json!({ "ok": true }))
}

fn books_adjust_availability(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let book_id = get_required_i64(&req.params, "bookId")?;
    let delta = get_required_i64(&req.params, "delta")?;
    to_json(&catalog::adjust_availability(store_mut(state)?, book_id, delta)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "books.list" => books_list(state, req),
        "books.genres" => books_genres(state, req),
        "books.get" => books_get(state, req),
        "books.create" => books_create(state, req),
        "books.update" => books_update(state, req),
        "books.delete" => books_delete(state, req),
        "books.adjustAvailability" => books_adjust_availability(state, req),
        _ => return None,
    };
    Some(match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
