use std::fs;
use std::io;
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::Duration;

use anyhow::{Context, Result};
use stasis_config::StasisConfig;
use stasis_core::{FieldCatalog, ResumeField, ResumeMask, TorrentField};
use stasis_events::{Event, EventBus, EventStream};
use stasis_resume::{
    AddTorrentOptions, FsResumeStorage, JsonResumeCodec, ResumeStorage, ResumeStore,
};
use stasis_runtime::{
    AddRequest, ChangeFeed, RemoveOptions, RuntimeError, SessionOptions, TorrentSession,
    publish_changes,
};
use stasis_telemetry::Metrics;
use stasis_test_support::fixtures::{engine_tick, persisted_snapshot, resume_dir};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(5);

fn options() -> SessionOptions {
    SessionOptions {
        checkpoint_interval: Duration::from_secs(3_600),
        strict_resume_io: false,
        change_poll_interval: None,
    }
}

fn fs_session(dir: &std::path::Path, strict: bool) -> Result<TorrentSession> {
    Ok(TorrentSession::new(
        ResumeStore::open(dir),
        EventBus::new(),
        Metrics::new()?,
        SessionOptions {
            strict_resume_io: strict,
            ..options()
        },
    ))
}

async fn next_event(stream: &mut EventStream) -> Result<Event> {
    let envelope = timeout(WAIT, stream.next())
        .await
        .context("timed out waiting for an event")?
        .context("event bus closed")?;
    Ok(envelope.event)
}

#[tokio::test]
async fn state_survives_a_session_restart() -> Result<()> {
    let dir = resume_dir()?;
    let id = Uuid::new_v4();

    let first = fs_session(dir.path(), false)?;
    let added = first
        .add(AddRequest::new(id).with_defaults(persisted_snapshot()?))
        .await?;
    assert_eq!(added.resume, "not_found");
    assert!(added.loaded.is_empty());
    first.apply(id, &engine_tick(8_192, 4)?).await?;
    assert_eq!(first.shutdown().await?.saved, 1);

    let second = fs_session(dir.path(), false)?;
    let mut events = second.events().subscribe(None);
    let added = second
        .add(AddRequest::new(id).with_options(AddTorrentOptions {
            download_dir: Some("/mnt/elsewhere".into()),
            ..AddTorrentOptions::default()
        }))
        .await?;
    assert_eq!(added.resume, "restored");
    assert!(added.loaded.contains(ResumeField::Name));
    assert!(added.loaded.contains(ResumeField::DownloadDir));

    let record = added.handle.cloned()?;
    assert_eq!(record.name(), Some("ubuntu-24.04.iso"));
    assert_eq!(record.download_dir(), Some("/mnt/elsewhere"));
    assert_eq!(record.unsigned(TorrentField::DownloadedEver), 8_192);

    match next_event(&mut events).await? {
        Event::TorrentAdded {
            torrent_id,
            name,
            resume,
            loaded,
        } => {
            assert_eq!(torrent_id, id);
            assert_eq!(name.as_deref(), Some("ubuntu-24.04.iso"));
            assert_eq!(resume, "restored");
            assert!(loaded.contains(&"download_dir".to_string()));
        }
        other => anyhow::bail!("unexpected event {other:?}"),
    }

    let report = second.flush().await?;
    assert_eq!(report.saved, 1, "the override differs from disk and must be written");
    second.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_and_unknown_ids_are_rejected() -> Result<()> {
    let dir = resume_dir()?;
    let session = fs_session(dir.path(), false)?;
    let id = Uuid::new_v4();
    session.add(AddRequest::new(id)).await?;

    assert!(matches!(
        session.add(AddRequest::new(id)).await,
        Err(RuntimeError::AlreadyTracked { torrent_id }) if torrent_id == id
    ));
    let stranger = Uuid::new_v4();
    assert!(matches!(
        session.apply(stranger, &engine_tick(1, 4)?).await,
        Err(RuntimeError::UnknownTorrent { .. })
    ));
    assert!(matches!(
        session.remove(stranger, RemoveOptions::default()).await,
        Err(RuntimeError::UnknownTorrent { .. })
    ));
    assert_eq!(session.ids().await, vec![id]);
    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn removal_saves_or_deletes_as_asked() -> Result<()> {
    let dir = resume_dir()?;
    let session = fs_session(dir.path(), false)?;
    let storage = FsResumeStorage::new(dir.path());

    let kept = Uuid::new_v4();
    session
        .add(AddRequest::new(kept).with_defaults(persisted_snapshot()?))
        .await?;
    let removed = session.remove(kept, RemoveOptions::default()).await?;
    assert!(removed.saved);
    assert!(!removed.resume_deleted);
    assert!(storage.read(kept)?.is_some());
    assert!(session.handle(kept).await.is_none());

    let dropped = Uuid::new_v4();
    let added = session
        .add(AddRequest::new(dropped).with_defaults(persisted_snapshot()?))
        .await?;
    session.flush().await?;
    assert!(storage.read(dropped)?.is_some());
    let removed = session
        .remove(
            dropped,
            RemoveOptions {
                final_save: true,
                delete_resume: true,
            },
        )
        .await?;
    assert!(removed.resume_deleted);
    assert!(!removed.saved);
    assert!(storage.read(dropped)?.is_none());
    assert!(matches!(
        added.handle.apply(&engine_tick(1, 4)?),
        Err(stasis_core::SyncError::RecordRemoved { .. })
    ));

    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unreadable_resume_data_respects_strictness() -> Result<()> {
    let dir = resume_dir()?;
    let id = Uuid::new_v4();
    fs::create_dir_all(FsResumeStorage::new(dir.path()).path_for(id))?;

    let lenient = fs_session(dir.path(), false)?;
    let added = lenient.add(AddRequest::new(id)).await?;
    assert_eq!(added.resume, "io");
    lenient.shutdown().await?;

    let strict = fs_session(dir.path(), true)?;
    assert!(matches!(
        strict.add(AddRequest::new(id)).await,
        Err(RuntimeError::Resume {
            operation: "load",
            ..
        })
    ));
    assert!(strict.ids().await.is_empty());
    strict.add(AddRequest::new(Uuid::new_v4())).await?;
    strict.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn change_feed_reports_only_changed_fields() -> Result<()> {
    let dir = resume_dir()?;
    let session = fs_session(dir.path(), false)?;
    let id = Uuid::new_v4();
    session
        .add(
            AddRequest::new(id)
                .with_fields(ResumeMask::EMPTY)
                .with_defaults(persisted_snapshot()?),
        )
        .await?;

    let tracked = session.tracked();
    let events = session.events().clone();
    assert_eq!(publish_changes(&tracked, &events).await, 1);
    assert_eq!(publish_changes(&tracked, &events).await, 0);

    let mut stream = events.subscribe(None);
    let feed = ChangeFeed::spawn(tracked, events.clone(), Duration::from_millis(10));
    let changed = session
        .apply(
            id,
            &stasis_core::Snapshot::new().with(TorrentField::UploadSpeed, 512_u64)?,
        )
        .await?;
    assert_eq!(changed.keys(), vec![TorrentField::UploadSpeed.key()]);

    match next_event(&mut stream).await? {
        Event::FieldsChanged { torrent_id, fields } => {
            assert_eq!(torrent_id, id);
            assert_eq!(fields, vec!["upload_speed".to_string()]);
        }
        other => anyhow::bail!("unexpected event {other:?}"),
    }
    feed.shutdown().await?;
    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn configured_session_publishes_changes_on_its_own() -> Result<()> {
    let dir = resume_dir()?;
    let config = StasisConfig {
        resume_dir: dir.path().to_path_buf(),
        change_poll_interval_ms: 10,
        ..StasisConfig::default()
    };
    let events = EventBus::new();
    let mut stream = events.subscribe(None);
    let session = TorrentSession::from_config(&config, events, Metrics::new()?)?;
    let id = Uuid::new_v4();
    session.add(AddRequest::new(id)).await?;
    session
        .apply(
            id,
            &stasis_core::Snapshot::new().with(TorrentField::UploadSpeed, 64_u64)?,
        )
        .await?;

    loop {
        if let Event::FieldsChanged { torrent_id, fields } = next_event(&mut stream).await? {
            assert_eq!(torrent_id, id);
            if fields.iter().any(|field| field == "upload_speed") {
                break;
            }
        }
    }
    session.shutdown().await?;
    Ok(())
}

struct GateStorage {
    entered: mpsc::UnboundedSender<()>,
    release: Mutex<std_mpsc::Receiver<()>>,
}

impl ResumeStorage for GateStorage {
    fn read(&self, _id: Uuid) -> io::Result<Option<Vec<u8>>> {
        let _ = self.entered.send(());
        let release = self
            .release
            .lock()
            .map_err(|_| io::Error::other("gate poisoned"))?;
        let _ = release.recv();
        Ok(None)
    }

    fn replace(&self, _id: Uuid, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn remove(&self, _id: Uuid) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn removal_during_load_abandons_the_add() -> Result<()> {
    let (entered, mut entered_rx) = mpsc::unbounded_channel();
    let (release, release_rx) = std_mpsc::channel();
    let storage = GateStorage {
        entered,
        release: Mutex::new(release_rx),
    };
    let session = Arc::new(TorrentSession::new(
        ResumeStore::new(storage, JsonResumeCodec),
        EventBus::new(),
        Metrics::new()?,
        options(),
    ));
    let id = Uuid::new_v4();

    let adding = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.add(AddRequest::new(id)).await }
    });
    timeout(WAIT, entered_rx.recv())
        .await
        .context("load never started")?;

    let removed = session.remove(id, RemoveOptions::default()).await?;
    assert!(!removed.saved);
    release.send(())?;

    assert!(matches!(
        timeout(WAIT, adding).await??,
        Err(RuntimeError::AddCancelled { torrent_id }) if torrent_id == id
    ));
    assert!(session.handle(id).await.is_none());
    assert!(session.ids().await.is_empty());
    Ok(())
}
