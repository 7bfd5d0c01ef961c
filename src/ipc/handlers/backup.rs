use crate::backup;
use crate::db;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::library::LibraryError;
use serde_json::json;
use std::path::{Path, PathBuf};

/// `workspacePath` when given, otherwise the selected workspace.
fn target_workspace(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    get_optional_str(&req.params, "workspacePath")
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(HandlerErr::no_workspace)
}

fn bundle_failure(e: anyhow::Error, path: &Path) -> HandlerErr {
    HandlerErr {
        code: e
            .downcast_ref::<LibraryError>()
            .map_or("io_failed", LibraryError::code),
        message: format!("{e:#}"),
        details: Some(json!({ "path": path.to_string_lossy() })),
    }
}

fn export_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(&req.params, "outPath")?);
    let workspace = target_workspace(state, req)?;
    let workspace_id = state
        .workspace_id
        .as_deref()
        .filter(|_| state.workspace.as_ref() == Some(&workspace));

    let export = backup::export_workspace_bundle(&workspace, &out_path, workspace_id)
        .map_err(|e| bundle_failure(e, &out_path))?;
    tracing::info!(
        path = %out_path.display(),
        sha256 = %export.db_sha256,
        "workspace bundle exported"
    );
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    }))
}

fn import_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let in_path = PathBuf::from(get_required_str(&req.params, "inPath")?);
    let workspace = target_workspace(state, req)?;
    if !in_path.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path.to_string_lossy() })),
        });
    }

    // Release the handle on a database that may be replaced; it is reopened
    // below whether or not the import goes through.
    let was_active = state.workspace.as_ref() == Some(&workspace);
    if was_active {
        state.library = None;
        state.workspace_id = None;
    }

    let imported = backup::import_workspace_bundle(&in_path, &workspace, db::verify_library_db);
    let import = match imported {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %in_path.display(), error = %format!("{e:#}"), "bundle import rejected");
            if was_active {
                open_workspace(state, &workspace).map_err(|reopen| HandlerErr {
                    code: "db_open_failed",
                    message: format!("{reopen:#}"),
                    details: None,
                })?;
            }
            return Err(bundle_failure(e, &in_path));
        }
    };

    open_workspace(state, &workspace).map_err(|e| HandlerErr {
        code: "db_open_failed",
        message: format!("{e:#}"),
        details: None,
    })?;
    tracing::info!(
        workspace = %workspace.display(),
        format = %import.bundle_format_detected,
        "workspace bundle imported"
    );
    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "workspaceId": state.workspace_id,
        "bundleFormatDetected": import.bundle_format_detected,
        "sourceWorkspaceId": import.workspace_id,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, req),
        "backup.importWorkspaceBundle" => import_bundle(state, req),
        _ => return None,
    };
    Some(match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
