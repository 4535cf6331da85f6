//! `stasis list`, `stasis inspect`, and `stasis check`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::Serialize;
use stasis_core::{FieldCatalog, FieldValue, ResumeField, ResumeMask};
use stasis_resume::{NoOverrides, ResumeIssue, ResumeSnapshot, ResumeStore};
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};
use crate::output::{to_json, value_text};

fn stored_ids(store: &ResumeStore) -> CliResult<Vec<Uuid>> {
    let root = store.storage().root();
    store
        .storage()
        .list()
        .with_context(|| format!("failed to list {}", root.display()))
        .map_err(CliError::failure)
}

pub(crate) fn list(dir: &Path, format: OutputFormat) -> CliResult<String> {
    let ids = stored_ids(&ResumeStore::open(dir))?;
    match format {
        OutputFormat::Json => to_json(&ids),
        OutputFormat::Table if ids.is_empty() => {
            Ok(format!("no resume snapshots in {}", dir.display()))
        }
        OutputFormat::Table => Ok(ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

#[derive(Debug, Serialize)]
struct SnapshotView<'a> {
    torrent_id: Uuid,
    version: u32,
    newer_format: bool,
    fields: BTreeMap<&'a str, &'a FieldValue>,
    unrecognized: Vec<String>,
}

impl<'a> SnapshotView<'a> {
    fn new(torrent_id: Uuid, snapshot: &'a ResumeSnapshot) -> Self {
        Self {
            torrent_id,
            version: snapshot.version(),
            newer_format: snapshot.is_newer_format(),
            fields: snapshot.entries().collect(),
            unrecognized: snapshot.unrecognized(),
        }
    }
}

pub(crate) fn inspect(dir: &Path, id: Uuid, format: OutputFormat) -> CliResult<String> {
    let snapshot = ResumeStore::open(dir)
        .read_snapshot(id)
        .map_err(|issue| CliError::failure(describe_issue(id, dir, issue)))?;
    let view = SnapshotView::new(id, &snapshot);
    match format {
        OutputFormat::Json => to_json(&view),
        OutputFormat::Table => {
            let mut lines = vec![
                format!("torrent: {}", view.torrent_id),
                format!(
                    "version: {}{}",
                    view.version,
                    if view.newer_format { " (newer)" } else { "" }
                ),
                format!("{:<26} {:<12} VALUE", "KEY", "KIND"),
            ];
            lines.extend(view.fields.iter().map(|(key, value)| {
                let known = ResumeField::from_key(key).is_some_and(|field| field.kind() == value.kind());
                format!(
                    "{:<26} {:<12} {}{}",
                    key,
                    value.kind().as_str(),
                    value_text(value),
                    if known { "" } else { "  (unrecognized)" }
                )
            }));
            let missing_values: Vec<&str> = view
                .unrecognized
                .iter()
                .map(String::as_str)
                .filter(|key| !view.fields.contains_key(key))
                .collect();
            if !missing_values.is_empty() {
                lines.push(format!("undecodable: {}", missing_values.join(", ")));
            }
            Ok(lines.join("\n"))
        }
    }
}

fn describe_issue(id: Uuid, dir: &Path, issue: ResumeIssue) -> anyhow::Error {
    match issue {
        ResumeIssue::NotFound => anyhow!("no resume snapshot for {id} in {}", dir.display()),
        ResumeIssue::Corrupt { source } => {
            anyhow::Error::new(source).context(format!("resume snapshot for {id} is corrupt"))
        }
        ResumeIssue::Io { source } => {
            anyhow::Error::new(source).context(format!("failed to read resume snapshot for {id}"))
        }
        ResumeIssue::VersionMismatch { found, supported, .. } => anyhow!(
            "resume snapshot for {id} uses format {found}; this build reads up to {supported}"
        ),
    }
}

#[derive(Debug, Serialize)]
struct CheckRow {
    torrent_id: Uuid,
    outcome: &'static str,
    loaded: usize,
    skipped: Vec<String>,
}

pub(crate) fn check(dir: &Path, format: OutputFormat) -> CliResult<String> {
    let store = ResumeStore::open(dir);
    let mut rows = Vec::new();
    for id in stored_ids(&store)? {
        let outcome = store
            .load(id, ResumeMask::all(), &NoOverrides)
            .with_context(|| format!("failed to load {id}"))
            .map_err(CliError::failure)?;
        rows.push(CheckRow {
            torrent_id: id,
            outcome: outcome.label(),
            loaded: outcome.loaded.len(),
            skipped: outcome.skipped,
        });
    }
    match format {
        OutputFormat::Json => to_json(&rows),
        OutputFormat::Table => {
            let mut lines = vec![format!(
                "{:<36} {:<16} {:>6} SKIPPED",
                "ID", "OUTCOME", "LOADED"
            )];
            lines.extend(rows.iter().map(|row| {
                format!(
                    "{:<36} {:<16} {:>6} {}",
                    row.torrent_id,
                    row.outcome,
                    row.loaded,
                    row.skipped.join(",")
                )
            }));
            Ok(lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use stasis_resume::FsResumeStorage;
    use stasis_test_support::fixtures::{live_record, resume_dir};

    fn text(result: CliResult<String>) -> Result<String> {
        result.map_err(|err| anyhow!(err.display_message()))
    }

    #[test]
    fn inspect_shows_stored_fields() -> Result<()> {
        let dir = resume_dir()?;
        let id = Uuid::new_v4();
        ResumeStore::open(dir.path()).save(&live_record(id)?)?;

        let json: serde_json::Value =
            serde_json::from_str(&text(inspect(dir.path(), id, OutputFormat::Json))?)?;
        assert_eq!(json["torrent_id"], id.to_string());
        assert_eq!(json["fields"]["name"]["value"], "ubuntu-24.04.iso");
        assert_eq!(json["newer_format"], false);

        let table = text(inspect(dir.path(), id, OutputFormat::Table))?;
        assert!(table.contains("download_dir"));
        assert!(!table.contains("(unrecognized)"));
        Ok(())
    }

    #[test]
    fn inspect_reports_missing_and_corrupt_snapshots() -> Result<()> {
        let dir = resume_dir()?;
        let id = Uuid::new_v4();
        let missing = inspect(dir.path(), id, OutputFormat::Table)
            .err()
            .ok_or_else(|| anyhow!("missing snapshot was accepted"))?;
        assert_eq!(missing.exit_code(), 3);
        assert!(missing.display_message().contains("no resume snapshot"));

        fs::write(FsResumeStorage::new(dir.path()).path_for(id), b"{\"version\":")?;
        let corrupt = inspect(dir.path(), id, OutputFormat::Json)
            .err()
            .ok_or_else(|| anyhow!("corrupt snapshot was accepted"))?;
        assert!(corrupt.display_message().contains("is corrupt"));
        Ok(())
    }

    #[test]
    fn check_and_list_cover_every_stored_snapshot() -> Result<()> {
        let dir = resume_dir()?;
        let good = Uuid::from_u128(1);
        let bad = Uuid::from_u128(2);
        ResumeStore::open(dir.path()).save(&live_record(good)?)?;
        fs::write(FsResumeStorage::new(dir.path()).path_for(bad), b"garbage")?;

        let listed: Vec<Uuid> = serde_json::from_str(&text(list(dir.path(), OutputFormat::Json))?)?;
        assert_eq!(listed, vec![good, bad]);

        let rows: Vec<serde_json::Value> =
            serde_json::from_str(&text(check(dir.path(), OutputFormat::Json))?)?;
        assert_eq!(rows[0]["outcome"], "restored");
        assert!(rows[0]["loaded"].as_u64().unwrap_or(0) > 0);
        assert_eq!(rows[1]["outcome"], "corrupt");
        assert_eq!(rows[1]["loaded"], 0);
        Ok(())
    }

    #[test]
    fn empty_directory_lists_nothing() -> Result<()> {
        let dir = resume_dir()?;
        let table = text(list(&dir.path().join("absent"), OutputFormat::Table))?;
        assert!(table.starts_with("no resume snapshots"));
        Ok(())
    }
}
