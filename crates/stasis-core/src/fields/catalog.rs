//! Compile-time field catalogs.
//!
//! Discriminants are bit positions. They are append-only: a new attribute takes
//! the next free position and existing positions are never renumbered or reused.
//! Persisted keys are independent of positions so snapshots survive reordering.

use std::fmt::Debug;
use std::hash::Hash;

use super::value::ValueKind;

/// A closed set of attributes, each with a stable bit position.
pub trait FieldCatalog: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Catalog name used in logs.
    const NAME: &'static str;
    /// Every member, in bit order.
    const ALL: &'static [Self];
    /// Union of every member's bit.
    const ALL_BITS: u64;

    /// Bit position of this member.
    fn bit(self) -> u32;

    /// Stable, versioned key used wherever the field is written out.
    fn key(self) -> &'static str;

    /// Shape of the values this field accepts.
    fn kind(self) -> ValueKind;

    /// Reverse lookup by bit position.
    #[must_use]
    fn from_bit(bit: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.bit() == bit)
    }

    /// Reverse lookup by stable key.
    #[must_use]
    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.key() == key)
    }
}

macro_rules! field_catalog {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($label:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $bit:literal => ($key:literal, $kind:ident),
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $bit,
            )+
        }

        impl FieldCatalog for $name {
            const NAME: &'static str = $label;
            const ALL: &'static [Self] = &[$(Self::$variant,)+];
            const ALL_BITS: u64 = 0 $(| (1_u64 << $bit))+;

            fn bit(self) -> u32 {
                u32::from(self as u8)
            }

            fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)+
                }
            }

            fn kind(self) -> ValueKind {
                match self {
                    $(Self::$variant => ValueKind::$kind,)+
                }
            }
        }

        const _: () = assert!(<$name as FieldCatalog>::ALL.len() <= 64);
    };
}

field_catalog! {
    /// Attributes eligible for durable storage in a resume snapshot.
    pub enum ResumeField ("persisted") {
        /// Total bytes ever downloaded.
        Downloaded = 0 => ("downloaded", UInt),
        /// Total bytes ever uploaded.
        Uploaded = 1 => ("uploaded", UInt),
        /// Total bytes discarded after failed hash checks.
        Corrupt = 2 => ("corrupt", UInt),
        /// Compact peer cache for fast reconnection.
        Peers = 3 => ("peers", Bytes),
        /// Verified piece bitfield.
        Progress = 4 => ("progress", Bytes),
        /// Per-file "do not download" flags.
        Dnd = 5 => ("dnd", BoolList),
        /// Per-file priorities.
        FilePriorities = 6 => ("priority", IntList),
        /// Bandwidth priority relative to other torrents.
        BandwidthPriority = 7 => ("bandwidth_priority", Int),
        /// Upload and download limits.
        SpeedLimit = 8 => ("speed_limit", SpeedLimit),
        /// Whether the torrent was running.
        Run = 9 => ("running", Bool),
        /// Final download directory.
        DownloadDir = 10 => ("download_dir", Text),
        /// Directory used while the torrent is incomplete.
        IncompleteDir = 11 => ("incomplete_dir", Text),
        /// Per-torrent peer connection cap.
        MaxPeers = 12 => ("max_peers", Int),
        /// When the torrent was added.
        AddedDate = 13 => ("added_date", Time),
        /// When the torrent finished downloading.
        DoneDate = 14 => ("done_date", Time),
        /// Last time data was transferred.
        ActivityDate = 15 => ("activity_date", Time),
        /// Seed ratio limit.
        RatioLimit = 16 => ("ratio_limit", RatioLimit),
        /// Seed idle limit.
        IdleLimit = 17 => ("idle_limit", IdleLimit),
        /// Accumulated seconds spent seeding.
        TimeSeeding = 18 => ("seeding_time_seconds", UInt),
        /// Accumulated seconds spent downloading.
        TimeDownloading = 19 => ("downloading_time_seconds", UInt),
        /// File names, after any renames.
        Filenames = 20 => ("files", TextList),
        /// Display name.
        Name = 21 => ("name", Text),
        /// User labels.
        Labels = 22 => ("labels", TextList),
        /// Bandwidth group name.
        Group = 23 => ("group", Text),
        /// Whether pieces are requested in order.
        SequentialDownload = 24 => ("sequential_download", Bool),
    }
}

field_catalog! {
    /// Attributes synchronized from the engine into observer-facing records.
    ///
    /// Positions 0..=24 mirror [`ResumeField`]; everything after is transient.
    pub enum TorrentField ("synced") {
        /// Total bytes ever downloaded.
        DownloadedEver = 0 => ("downloaded_ever", UInt),
        /// Total bytes ever uploaded.
        UploadedEver = 1 => ("uploaded_ever", UInt),
        /// Total bytes discarded after failed hash checks.
        CorruptEver = 2 => ("corrupt_ever", UInt),
        /// Compact peer cache.
        PeerCache = 3 => ("peer_cache", Bytes),
        /// Verified piece bitfield.
        PieceProgress = 4 => ("piece_progress", Bytes),
        /// Per-file "do not download" flags.
        FileDnd = 5 => ("file_dnd", BoolList),
        /// Per-file priorities.
        FilePriorities = 6 => ("file_priorities", IntList),
        /// Bandwidth priority.
        BandwidthPriority = 7 => ("bandwidth_priority", Int),
        /// Upload and download limits.
        SpeedLimit = 8 => ("speed_limit", SpeedLimit),
        /// Whether the torrent is running.
        Running = 9 => ("running", Bool),
        /// Final download directory.
        DownloadDir = 10 => ("download_dir", Text),
        /// Directory used while incomplete.
        IncompleteDir = 11 => ("incomplete_dir", Text),
        /// Per-torrent peer connection cap.
        PeerLimit = 12 => ("peer_limit", Int),
        /// When the torrent was added.
        AddedDate = 13 => ("added_date", Time),
        /// When the torrent finished downloading.
        DoneDate = 14 => ("done_date", Time),
        /// Last time data was transferred.
        ActivityDate = 15 => ("activity_date", Time),
        /// Seed ratio limit.
        SeedRatioLimit = 16 => ("seed_ratio_limit", RatioLimit),
        /// Seed idle limit.
        SeedIdleLimit = 17 => ("seed_idle_limit", IdleLimit),
        /// Seconds spent seeding.
        SecondsSeeding = 18 => ("seconds_seeding", UInt),
        /// Seconds spent downloading.
        SecondsDownloading = 19 => ("seconds_downloading", UInt),
        /// File names.
        FileNames = 20 => ("file_names", TextList),
        /// Display name.
        Name = 21 => ("name", Text),
        /// User labels.
        Labels = 22 => ("labels", TextList),
        /// Bandwidth group.
        Group = 23 => ("group", Text),
        /// Sequential download toggle.
        SequentialDownload = 24 => ("sequential_download", Bool),
        /// Metainfo comment.
        Comment = 25 => ("comment", Text),
        /// Metainfo creator.
        Creator = 26 => ("creator", Text),
        /// Metainfo creation date.
        DateCreated = 27 => ("date_created", Time),
        /// Bytes available from connected peers that we still want.
        DesiredAvailable = 28 => ("desired_available", UInt),
        /// Current download rate in bytes per second.
        DownloadSpeed = 29 => ("download_speed", UInt),
        /// Last time the torrent's settings were edited.
        EditDate = 30 => ("edit_date", Time),
        /// Engine error code; zero means healthy.
        ErrorCode = 31 => ("error_code", Int),
        /// Engine error message.
        ErrorString = 32 => ("error_string", Text),
        /// Estimated seconds until done; negative when unknown.
        Eta = 33 => ("eta", Int),
        /// Number of files in the payload.
        FileCount = 34 => ("file_count", UInt),
        /// Hex info-hash.
        HashString = 35 => ("hash_string", Text),
        /// Downloaded bytes not yet hash-checked.
        HaveUnchecked = 36 => ("have_unchecked", UInt),
        /// Downloaded bytes that passed hash checks.
        HaveVerified = 37 => ("have_verified", UInt),
        /// Whether seeding limits have been reached.
        IsFinished = 38 => ("is_finished", Bool),
        /// Private-tracker flag.
        IsPrivate = 39 => ("is_private", Bool),
        /// Whether the torrent is stalled in the queue.
        IsStalled = 40 => ("is_stalled", Bool),
        /// Wanted bytes still missing.
        LeftUntilDone = 41 => ("left_until_done", UInt),
        /// Earliest time a manual announce is allowed.
        ManualAnnounceTime = 42 => ("manual_announce_time", Time),
        /// Fraction of metadata fetched for magnet links.
        MetadataPercentComplete = 43 => ("metadata_percent_complete", Float),
        /// Connected peer count.
        PeersConnected = 44 => ("peers_connected", Int),
        /// Peers we upload to.
        PeersGettingFromUs = 45 => ("peers_getting_from_us", Int),
        /// Peers we download from.
        PeersSendingToUs = 46 => ("peers_sending_to_us", Int),
        /// Number of pieces.
        PieceCount = 47 => ("piece_count", UInt),
        /// Piece size in bytes.
        PieceSize = 48 => ("piece_size", UInt),
        /// MIME type of the dominant file.
        PrimaryMimeType = 49 => ("primary_mime_type", Text),
        /// Position in the transfer queue.
        QueuePosition = 50 => ("queue_position", Int),
        /// Fraction of a running verification.
        RecheckProgress = 51 => ("recheck_progress", Float),
        /// Bytes of wanted files.
        SizeWhenDone = 52 => ("size_when_done", UInt),
        /// When the torrent was last started.
        StartDate = 53 => ("start_date", Time),
        /// Raw activity status code.
        Status = 54 => ("status", Int),
        /// Total payload size in bytes.
        TotalSize = 55 => ("total_size", UInt),
        /// Announce list in tiered text form.
        TrackerList = 56 => ("tracker_list", Text),
        /// Current upload rate in bytes per second.
        UploadSpeed = 57 => ("upload_speed", UInt),
        /// Web seeds we download from.
        WebseedsSendingToUs = 58 => ("webseeds_sending_to_us", Int),
    }
}

impl ResumeField {
    /// The synced attribute holding this field's live value.
    #[must_use]
    pub const fn synced(self) -> TorrentField {
        match self {
            Self::Downloaded => TorrentField::DownloadedEver,
            Self::Uploaded => TorrentField::UploadedEver,
            Self::Corrupt => TorrentField::CorruptEver,
            Self::Peers => TorrentField::PeerCache,
            Self::Progress => TorrentField::PieceProgress,
            Self::Dnd => TorrentField::FileDnd,
            Self::FilePriorities => TorrentField::FilePriorities,
            Self::BandwidthPriority => TorrentField::BandwidthPriority,
            Self::SpeedLimit => TorrentField::SpeedLimit,
            Self::Run => TorrentField::Running,
            Self::DownloadDir => TorrentField::DownloadDir,
            Self::IncompleteDir => TorrentField::IncompleteDir,
            Self::MaxPeers => TorrentField::PeerLimit,
            Self::AddedDate => TorrentField::AddedDate,
            Self::DoneDate => TorrentField::DoneDate,
            Self::ActivityDate => TorrentField::ActivityDate,
            Self::RatioLimit => TorrentField::SeedRatioLimit,
            Self::IdleLimit => TorrentField::SeedIdleLimit,
            Self::TimeSeeding => TorrentField::SecondsSeeding,
            Self::TimeDownloading => TorrentField::SecondsDownloading,
            Self::Filenames => TorrentField::FileNames,
            Self::Name => TorrentField::Name,
            Self::Labels => TorrentField::Labels,
            Self::Group => TorrentField::Group,
            Self::SequentialDownload => TorrentField::SequentialDownload,
        }
    }
}

impl TorrentField {
    /// The persisted counterpart, when this attribute survives restarts.
    #[must_use]
    pub fn persisted(self) -> Option<ResumeField> {
        ResumeField::ALL
            .iter()
            .copied()
            .find(|field| field.synced() == self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_catalog_is_well_formed<C: FieldCatalog>() {
        let mut bits = HashSet::new();
        let mut keys = HashSet::new();
        let mut union = 0_u64;
        for field in C::ALL {
            assert!(field.bit() < 64, "{field:?} exceeds mask width");
            assert!(bits.insert(field.bit()), "{field:?} reuses a bit");
            assert!(keys.insert(field.key()), "{field:?} reuses a key");
            assert_eq!(C::from_bit(field.bit()), Some(*field));
            assert_eq!(C::from_key(field.key()), Some(*field));
            union |= 1_u64 << field.bit();
        }
        assert_eq!(union, C::ALL_BITS);
    }

    #[test]
    fn catalogs_have_unique_bits_and_keys() {
        assert_catalog_is_well_formed::<ResumeField>();
        assert_catalog_is_well_formed::<TorrentField>();
        assert_eq!(ResumeField::ALL.len(), 25);
        assert_eq!(TorrentField::ALL.len(), 59);
    }

    #[test]
    fn persisted_bit_positions_are_pinned() {
        let pinned = [
            (ResumeField::Downloaded, 0),
            (ResumeField::Uploaded, 1),
            (ResumeField::Corrupt, 2),
            (ResumeField::Peers, 3),
            (ResumeField::Progress, 4),
            (ResumeField::Dnd, 5),
            (ResumeField::FilePriorities, 6),
            (ResumeField::BandwidthPriority, 7),
            (ResumeField::SpeedLimit, 8),
            (ResumeField::Run, 9),
            (ResumeField::DownloadDir, 10),
            (ResumeField::IncompleteDir, 11),
            (ResumeField::MaxPeers, 12),
            (ResumeField::AddedDate, 13),
            (ResumeField::DoneDate, 14),
            (ResumeField::ActivityDate, 15),
            (ResumeField::RatioLimit, 16),
            (ResumeField::IdleLimit, 17),
            (ResumeField::TimeSeeding, 18),
            (ResumeField::TimeDownloading, 19),
            (ResumeField::Filenames, 20),
            (ResumeField::Name, 21),
            (ResumeField::Labels, 22),
            (ResumeField::Group, 23),
            (ResumeField::SequentialDownload, 24),
        ];
        for (field, bit) in pinned {
            assert_eq!(field.bit(), bit, "{field:?} moved");
        }
    }

    #[test]
    fn every_persisted_field_maps_to_a_synced_field_of_the_same_kind() {
        for field in ResumeField::ALL {
            let synced = field.synced();
            assert_eq!(field.kind(), synced.kind(), "{field:?}");
            assert_eq!(synced.persisted(), Some(*field));
        }
        assert_eq!(TorrentField::TotalSize.persisted(), None);
    }

    #[test]
    fn unknown_keys_do_not_resolve() {
        assert_eq!(ResumeField::from_key("bogus"), None);
        assert_eq!(TorrentField::from_bit(63), None);
    }
}
