use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    as_of, decode, get_optional_date, get_optional_i64, get_required_i64, store, store_mut,
    to_json, today,
};
use crate::ipc::types::{AppState, Request};
use crate::library::ledger;
use crate::library::model::{IssueQuery, IssueRecord, IssueRequest, StatusFilter};
use crate::library::validate::{default_due_date, parse_iso_date};
use chrono::NaiveDate;
use serde_json::json;

fn views(records: Vec<IssueRecord>, reference: NaiveDate) -> Result<serde_json::Value, HandlerErr> {
    let views: Vec<_> = records
        .into_iter()
        .map(|r| ledger::view(r, reference))
        .collect();
    Ok(json!({ "issues": to_json(&views)? }))
}

fn issues_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let reference = as_of(&req.params)?;
    let status: StatusFilter = match req.params.get("status") {
        None | Some(serde_json::Value::Null) => StatusFilter::All,
        Some(v) => decode(v, "status")?,
    };
    let query = IssueQuery {
        book_id: get_optional_i64(&req.params, "bookId")?,
        student_id: get_optional_i64(&req.params, "studentId")?,
        status,
    };
    let records = ledger::list(store(state)?, &query, reference)?;
    views(records, reference)
}

fn issues_by_student(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(&req.params, "studentId")?;
    let records = ledger::by_student(store(state)?, student_id)?;
    views(records, as_of(&req.params)?)
}

fn issues_by_book(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let book_id = get_required_i64(&req.params, "bookId")?;
    let records = ledger::by_book(store(state)?, book_id)?;
    views(records, as_of(&req.params)?)
}

fn issues_overdue(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let reference = as_of(&req.params)?;
    let records = ledger::overdue(store(state)?, reference)?;
    views(records, reference)
}

fn issues_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let issue_id = get_required_i64(&req.params, "issueId")?;
    let record = ledger::get(store(state)?, issue_id)?;
    to_json(&ledger::view(record, as_of(&req.params)?))
}

fn issues_issue(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let book_id = get_required_i64(&req.params, "bookId")?;
    let student_id = get_required_i64(&req.params, "studentId")?;
    let issued_on = today();
    let due_date = match get_optional_date(&req.params, "dueDate")? {
        Some(d) => d,
        None => default_due_date(issued_on, state.settings.loan_period_days)?,
    };
    let record = ledger::issue(
        store_mut(state)?,
        IssueRequest {
            book_id,
            student_id,
            due_date,
        },
        issued_on,
    )?;
    to_json(&record)
}

fn issues_return(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let issue_id = get_required_i64(&req.params, "issueId")?;
    to_json(&ledger::return_book(store_mut(state)?, issue_id, today())?)
}

fn issues_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let issue_id = get_required_i64(&req.params, "issueId")?;
    ledger::delete(store_mut(state)?, issue_id)?;
    Ok(json!({ "ok": true }))
}

fn issues_extend_due(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let issue_id = get_required_i64(&req.params, "issueId")?;
    let raw = req
        .params
        .get("dueDate")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing dueDate"))?;
    let due_date = parse_iso_date("dueDate", raw)?;
    to_json(&ledger::extend_due(store_mut(state)?, issue_id, due_date)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "issues.list" => issues_list(state, req),
        "issues.byStudent" => issues_by_student(state, req),
        "issues.byBook" => issues_by_book(state, req),
        "issues.overdue" => issues_overdue(state, req),
        "issues.get" => issues_get(state, req),
        "issues.issue" => issues_issue(state, req),
        "issues.return" => issues_return(state, req),
        "issues.delete" => issues_delete(state, req),
        "issues.extendDue" => issues_extend_due(state, req),
        _ => return None,
    };
    Some(match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
