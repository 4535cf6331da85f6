//! `stasis catalog`.

use serde::Serialize;
use stasis_core::{FieldCatalog, ResumeField, TorrentField};

use crate::cli::{CatalogChoice, OutputFormat};
use crate::error::CliResult;
use crate::output::{or_dash, to_json};

#[derive(Debug, Serialize)]
struct CatalogRow {
    catalog: &'static str,
    bit: u32,
    key: &'static str,
    kind: &'static str,
    /// Counterpart key in the other catalog.
    counterpart: Option<&'static str>,
}

fn persisted_rows() -> impl Iterator<Item = CatalogRow> {
    ResumeField::ALL.iter().map(|field| CatalogRow {
        catalog: ResumeField::NAME,
        bit: field.bit(),
        key: field.key(),
        kind: field.kind().as_str(),
        counterpart: Some(field.synced().key()),
    })
}

fn synced_rows() -> impl Iterator<Item = CatalogRow> {
    TorrentField::ALL.iter().map(|field| CatalogRow {
        catalog: TorrentField::NAME,
        bit: field.bit(),
        key: field.key(),
        kind: field.kind().as_str(),
        counterpart: field.persisted().map(|persisted| persisted.key()),
    })
}

pub(crate) fn render(choice: CatalogChoice, format: OutputFormat) -> CliResult<String> {
    let rows: Vec<CatalogRow> = match choice {
        CatalogChoice::Persisted => persisted_rows().collect(),
        CatalogChoice::Synced => synced_rows().collect(),
        CatalogChoice::All => persisted_rows().chain(synced_rows()).collect(),
    };
    match format {
        OutputFormat::Json => to_json(&rows),
        OutputFormat::Table => {
            let mut lines = vec![format!(
                "{:<10} {:>3} {:<26} {:<12} COUNTERPART",
                "CATALOG", "BIT", "KEY", "KIND"
            )];
            lines.extend(rows.iter().map(|row| {
                format!(
                    "{:<10} {:>3} {:<26} {:<12} {}",
                    row.catalog,
                    row.bit,
                    row.key,
                    row.kind,
                    or_dash(row.counterpart)
                )
            }));
            Ok(lines.join("\n"))
        }
    }
}
