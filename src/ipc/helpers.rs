use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;

use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::library::validate::parse_iso_date;
use crate::library::LibraryStore;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn store(state: &AppState) -> Result<&dyn LibraryStore, HandlerErr> {
    state.library.as_deref().ok_or_else(HandlerErr::no_workspace)
}

/// The boxed store is `'static`; spelling that out keeps the invariant `&mut`
/// borrow tied to `state` alone.
pub fn store_mut(state: &mut AppState) -> Result<&mut (dyn LibraryStore + 'static), HandlerErr> {
    state.library.as_deref_mut().ok_or_else(HandlerErr::no_workspace)
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Integer ids arrive either as JSON numbers or numeric strings.
pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    match get_optional_i64(params, key)? {
        Some(v) => Ok(v),
        None => Err(HandlerErr::bad_params(format!("missing {key}"))),
    }
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be an integer"))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("{key} must be an integer"))),
        Some(_) => Err(HandlerErr::bad_params(format!("{key} must be an integer"))),
    }
}

pub fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match get_optional_str(params, key) {
        Some(raw) => Ok(Some(parse_iso_date(key, &raw)?)),
        None => Ok(None),
    }
}

/// Reference date for overdue classification; defaults to today.
pub fn as_of(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    Ok(get_optional_date(params, "asOf")?.unwrap_or_else(today))
}

pub fn decode<T: DeserializeOwned>(value: &serde_json::Value, what: &str) -> Result<T, HandlerErr> {
    let value = if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value.clone()
    };
    serde_json::from_value(value).map_err(|e| HandlerErr::bad_params(format!("invalid {what}: {e}")))
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })
}
