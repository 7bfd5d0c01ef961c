use crate::db;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{as_of, get_optional_str, get_required_str, store, store_mut, to_json};
use crate::ipc::types::{AppState, Request};
use crate::library::fixtures::Fixtures;
use crate::library::{ledger, MemoryStore, SqliteStore};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.library.as_ref().map(|s| s.backend()),
            "loanPeriodDays": state.settings.loan_period_days,
        }),
    )
}

/// Opens (or creates) the workspace database and makes it the active store.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    let workspace_id = db::workspace_id(&conn)?;
    tracing::info!(workspace = %path.display(), %workspace_id, "workspace opened");
    state.workspace = Some(path.to_path_buf());
    state.workspace_id = Some(workspace_id);
    state.library = Some(Box::new(SqliteStore::new(conn)));
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "workspaceId": state.workspace_id,
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn load_fixtures(req: &Request) -> Result<Fixtures, HandlerErr> {
    let loaded = match get_optional_str(&req.params, "fixturesPath") {
        Some(p) => Fixtures::load(Path::new(&p)),
        None => Fixtures::bundled(),
    };
    loaded.map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: None,
    })
}

fn workspace_open_memory(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let fixtures = load_fixtures(req)?;
    let mut memory = MemoryStore::new();
    let seeded = fixtures.seed(&mut memory)?;

    state.workspace = None;
    state.workspace_id = None;
    state.library = Some(Box::new(memory));
    tracing::info!(books = seeded.books, issues = seeded.issues, "in-memory library opened");
    Ok(json!({
        "backend": "memory",
        "books": seeded.books,
        "issues": seeded.issues,
    }))
}

fn library_import_fixtures(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = get_required_str(&req.params, "path")?;
    let fixtures = Fixtures::load(Path::new(&path)).map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "path": path })),
    })?;
    let seeded = fixtures.seed(store_mut(state)?)?;
    Ok(json!({ "books": seeded.books, "issues": seeded.issues }))
}

fn library_summary(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let reference = as_of(&req.params)?;
    let summary = ledger::summary(store(state)?, reference)?;
    to_json(&summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "health" => return Some(handle_health(state, req)),
        "workspace.select" => return Some(handle_workspace_select(state, req)),
        "workspace.openMemory" => workspace_open_memory(state, req),
        "library.importFixtures" => library_import_fixtures(state, req),
        "library.summary" => library_summary(state, req),
        _ => return None,
    };
    Some(match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
