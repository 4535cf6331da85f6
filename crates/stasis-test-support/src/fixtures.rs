//! Test fixtures and environment helpers.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use stasis_core::{
    IdleLimit, LimitMode, RatioLimit, Snapshot, SpeedLimit, TorrentField, TorrentRecord,
};
use tempfile::TempDir;
use uuid::Uuid;

/// Fresh temporary directory for resume snapshots; removed when dropped.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn resume_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("stasis-resume-")
        .tempdir()
        .context("failed to create temporary resume directory")
}

/// Fixed timestamp so snapshots compare equal across runs.
///
/// # Errors
///
/// Returns an error if the fixed instant is not representable.
pub fn fixed_time() -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .context("fixed timestamp is ambiguous")
}

/// Snapshot covering a spread of persisted fields with every composite kind.
///
/// # Errors
///
/// Returns an error if a value does not match its field's kind.
pub fn persisted_snapshot() -> Result<Snapshot> {
    Ok(Snapshot::new()
        .with(TorrentField::Name, "ubuntu-24.04.iso")?
        .with(TorrentField::DownloadDir, "/srv/torrents")?
        .with(TorrentField::DownloadedEver, 1_048_576_u64)?
        .with(TorrentField::UploadedEver, 524_288_u64)?
        .with(TorrentField::Running, true)?
        .with(TorrentField::AddedDate, fixed_time()?)?
        .with(TorrentField::Labels, vec!["linux".to_owned(), "iso".to_owned()])?
        .with(
            TorrentField::SpeedLimit,
            SpeedLimit {
                up_kbps: 512,
                up_limited: true,
                down_kbps: 0,
                down_limited: false,
                honors_session_limits: true,
            },
        )?
        .with(
            TorrentField::SeedRatioLimit,
            RatioLimit {
                mode: LimitMode::Single,
                ratio: 2.0,
            },
        )?
        .with(
            TorrentField::SeedIdleLimit,
            IdleLimit {
                mode: LimitMode::Global,
                minutes: 30,
            },
        )?)
}

/// Snapshot shaped like a periodic engine update: transfer counters plus
/// transient progress fields.
///
/// # Errors
///
/// Returns an error if a value does not match its field's kind.
pub fn engine_tick(downloaded: u64, status: i64) -> Result<Snapshot> {
    Ok(Snapshot::new()
        .with(TorrentField::DownloadedEver, downloaded)?
        .with(TorrentField::HaveVerified, downloaded)?
        .with(TorrentField::TotalSize, 4 * 1_048_576_u64)?
        .with(TorrentField::SizeWhenDone, 4 * 1_048_576_u64)?
        .with(
            TorrentField::LeftUntilDone,
            (4 * 1_048_576_u64).saturating_sub(downloaded),
        )?
        .with(TorrentField::Status, status)?)
}

/// Live record seeded with [`persisted_snapshot`] and a clean dirty-mask.
///
/// # Errors
///
/// Returns an error if the fixture snapshot is rejected.
pub fn live_record(id: Uuid) -> Result<TorrentRecord> {
    let mut record = TorrentRecord::new(id);
    record.go_live(&persisted_snapshot()?)?;
    record.consume_dirty();
    Ok(record)
}
