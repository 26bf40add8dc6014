use crate::catalog::config::DatabaseConfig;
use crate::catalog::fingerprint_hex;
use crate::catalog::schema::DatabaseSchema;
use crate::config::MergeConfig;
use crate::diff::{ChangeEntry, DiffScope, diff_metadata};
use crate::error::{MergeError, ResultExt};
use crate::merge::try_merge;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Input and output locations of a file-based merge. Absent config paths
/// stand for empty configurations; an absent ancestor for an empty database.
#[derive(Debug, Clone, Default)]
pub struct MergeFileSet {
    pub ancestor: Option<PathBuf>,
    pub head: PathBuf,
    pub base: PathBuf,
    pub ancestor_config: Option<PathBuf>,
    pub head_config: Option<PathBuf>,
    pub base_config: Option<PathBuf>,
    pub out_schema: PathBuf,
    pub out_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    pub schema_fingerprint_hex: String,
    pub schemas: u64,
    pub tables: u64,
    pub views: u64,
    pub functions: u64,
    pub procedures: u64,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MergeError> {
    let bytes = fs::read(path)
        .map_err(MergeError::from)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| MergeError::Decode(format!("{}: {e}", path.display())))
}

pub fn load_schema(path: &Path) -> Result<DatabaseSchema, MergeError> {
    read_json(path)
}

pub fn load_database_config(path: Option<&Path>) -> Result<DatabaseConfig, MergeError> {
    match path {
        Some(path) => read_json(path),
        None => Ok(DatabaseConfig::default()),
    }
}

/// Writes `value` as pretty JSON through a temp file in the destination
/// directory, so readers never observe a partial file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), MergeError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| MergeError::Encode(e.to_string()))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MergeError::Io(e.error))?;
    Ok(())
}

pub fn merge_files(files: &MergeFileSet, config: &MergeConfig) -> Result<MergeReport, MergeError> {
    let ancestor = files.ancestor.as_deref().map(load_schema).transpose()?;
    let head = load_schema(&files.head)?;
    let base = load_schema(&files.base)?;
    let ancestor_config = load_database_config(files.ancestor_config.as_deref())?;
    let head_config = load_database_config(files.head_config.as_deref())?;
    let base_config = load_database_config(files.base_config.as_deref())?;

    let merged = try_merge(
        ancestor.as_ref(),
        &head,
        &base,
        &ancestor_config,
        &head_config,
        &base_config,
        config,
    )?;
    write_json(&files.out_schema, &merged.schema)?;
    if let Some(out_config) = &files.out_config {
        write_json(out_config, &merged.config)?;
    }
    summarize(&merged.schema)
}

pub fn diff_files(
    from: &Path,
    to: &Path,
    scope: DiffScope,
) -> Result<Vec<ChangeEntry>, MergeError> {
    let from = load_schema(from)?;
    let to = load_schema(to)?;
    Ok(diff_metadata(&from, &to, scope)?.changes())
}

pub fn fingerprint_file(path: &Path) -> Result<String, MergeError> {
    fingerprint_hex(&load_schema(path)?)
}

pub fn summarize(schema: &DatabaseSchema) -> Result<MergeReport, MergeError> {
    let mut report = MergeReport {
        schema_fingerprint_hex: fingerprint_hex(schema)?,
        schemas: schema.schemas.len() as u64,
        tables: 0,
        views: 0,
        functions: 0,
        procedures: 0,
    };
    for s in &schema.schemas {
        report.tables = report.tables.saturating_add(s.tables.len() as u64);
        report.views = report.views.saturating_add(s.views.len() as u64);
        report.functions = report.functions.saturating_add(s.functions.len() as u64);
        report.procedures = report.procedures.saturating_add(s.procedures.len() as u64);
    }
    Ok(report)
}
