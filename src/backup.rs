//! Workspace bundles. A bundle is a zip holding the workspace database, a
//! manifest that pins the database's SHA-256, and a little provenance
//! metadata. Imports are staged next to the live database and only swapped in
//! once the checksum and the caller's verification both pass.

use anyhow::{anyhow, bail, ensure, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT_V1: &str = "campus-workspace-v1";
const LEGACY_SQLITE_FORMAT: &str = "legacy-sqlite3";

const DB_FILE_NAME: &str = "campus.sqlite3";
const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/campus.sqlite3";
const SOURCE_ENTRY: &str = "meta/workspace.json";
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    exported_at: Option<u64>,
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    db_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub workspace_id: Option<String>,
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("cannot open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("cannot hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

fn write_json_entry<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    value: &impl Serialize,
    opts: FileOptions,
) -> anyhow::Result<()> {
    zip.start_file(name, opts)
        .with_context(|| format!("cannot start bundle entry {name}"))?;
    serde_json::to_writer_pretty(&mut *zip, value)
        .with_context(|| format!("cannot write bundle entry {name}"))?;
    Ok(())
}

/// Writes `<workspace>/campus.sqlite3` into a bundle at `out_path`.
pub fn export_workspace_bundle(
    workspace: &Path,
    out_path: &Path,
    workspace_id: Option<&str>,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace.join(DB_FILE_NAME);
    ensure!(
        db_path.is_file(),
        "workspace database not found: {}",
        db_path.display()
    );
    if let Some(dir) = out_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create bundle directory {}", dir.display()))?;
    }

    let db_sha256 = sha256_file(&db_path)?;
    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        version: 1,
        app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        exported_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs()),
        workspace_id: workspace_id.map(str::to_string),
        db_sha256: Some(db_sha256.clone()),
    };

    let out = File::create(out_path)
        .with_context(|| format!("cannot create bundle {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    write_json_entry(&mut zip, MANIFEST_ENTRY, &manifest, opts)?;
    zip.start_file(DB_ENTRY, opts)
        .context("cannot start database entry")?;
    let mut db = File::open(&db_path)
        .with_context(|| format!("cannot open database {}", db_path.display()))?;
    io::copy(&mut db, &mut zip).context("cannot write database entry")?;
    write_json_entry(
        &mut zip,
        SOURCE_ENTRY,
        &serde_json::json!({ "sourceWorkspace": workspace.to_string_lossy() }),
        opts,
    )?;
    zip.finish().context("cannot finalize bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
        db_sha256,
    })
}

fn is_zip(path: &Path) -> anyhow::Result<bool> {
    let mut head = [0u8; 4];
    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    match file.read_exact(&mut head) {
        Ok(()) => Ok(head == ZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).context("cannot read file signature"),
    }
}

/// Extracts the database from `in_path` into `staged`, checking the manifest
/// checksum for zip bundles. Bare SQLite files are copied as legacy backups.
fn stage_database(in_path: &Path, staged: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip(in_path)? {
        fs::copy(in_path, staged)
            .with_context(|| format!("cannot stage legacy backup {}", in_path.display()))?;
        return Ok(ImportSummary {
            bundle_format_detected: LEGACY_SQLITE_FORMAT.to_string(),
            workspace_id: None,
        });
    }

    let file = File::open(in_path)
        .with_context(|| format!("cannot open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;
    let manifest: Manifest = {
        let entry = archive
            .by_name(MANIFEST_ENTRY)
            .context("bundle has no manifest.json")?;
        serde_json::from_reader(entry).context("manifest.json is invalid")?
    };
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }
    let expected = manifest
        .db_sha256
        .as_deref()
        .ok_or_else(|| anyhow!("manifest.json has no dbSha256"))?;

    {
        let mut entry = archive
            .by_name(DB_ENTRY)
            .with_context(|| format!("bundle has no {DB_ENTRY}"))?;
        let mut out = File::create(staged)
            .with_context(|| format!("cannot create {}", staged.display()))?;
        io::copy(&mut entry, &mut out).context("cannot extract database entry")?;
        out.sync_all().context("cannot flush extracted database")?;
    }
    let actual = sha256_file(staged)?;
    ensure!(
        actual == expected,
        "database checksum mismatch: manifest {expected} but extracted {actual}"
    );

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        workspace_id: manifest.workspace_id,
    })
}

/// Restores `in_path` into `<workspace>/campus.sqlite3`.
///
/// `verify` sees the staged database before it replaces the live one; if it
/// fails, the staged copy is discarded and the workspace is left as it was.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace: &Path,
    verify: impl FnOnce(&Path) -> anyhow::Result<()>,
) -> anyhow::Result<ImportSummary> {
    fs::create_dir_all(workspace)
        .with_context(|| format!("cannot create workspace {}", workspace.display()))?;
    let staged: PathBuf = workspace.join(format!("{DB_FILE_NAME}.importing"));
    if staged.exists() {
        let _ = fs::remove_file(&staged);
    }

    let staged_ok = stage_database(in_path, &staged).and_then(|summary| {
        verify(&staged).context("imported database was rejected")?;
        Ok(summary)
    });
    let summary = match staged_ok {
        Ok(summary) => summary,
        Err(e) => {
            let _ = fs::remove_file(&staged);
            return Err(e);
        }
    };

    let live = workspace.join(DB_FILE_NAME);
    if live.exists() {
        fs::remove_file(&live)
            .with_context(|| format!("cannot replace database {}", live.display()))?;
    }
    fs::rename(&staged, &live)
        .with_context(|| format!("cannot move imported database to {}", live.display()))?;
    Ok(summary)
}
