mod backup;
mod db;
mod ipc;
mod library;
mod settings;
mod telemetry;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use settings::Settings;

fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load campusd settings")?;
    telemetry::init(&settings);

    let mut state = ipc::AppState::new(settings.clone());
    if let Some(path) = settings.workspace.as_deref() {
        ipc::open_workspace(&mut state, path)
            .with_context(|| format!("failed to open workspace {}", path.display()))?;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "campusd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("campusd shutting down");
    Ok(())
}
