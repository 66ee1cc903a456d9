//! Core domain types shared across the gateway, queue fetcher, jobs, and scheduler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of media a curator manages. Drives which detail-item id key and search
/// command name the gateway uses against that curator's backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CuratorKind {
    /// Movie library manager (Radarr-shaped).
    Movie,
    /// TV series library manager (Sonarr-shaped).
    Series,
    /// Music library manager (Lidarr-shaped).
    Music,
    /// Book library manager (Readarr-shaped).
    Book,
    /// Specialized/adult content manager. Does not support guided search.
    Adult,
}

impl CuratorKind {
    /// The JSON key this curator kind uses for its detail-item id in queue entries
    /// (e.g. `movieId`, `episodeId`).
    pub fn detail_item_id_key(self) -> &'static str {
        match self {
            CuratorKind::Movie => "movieId",
            CuratorKind::Series => "episodeId",
            CuratorKind::Music => "albumId",
            CuratorKind::Book => "bookId",
            CuratorKind::Adult => "movieId",
        }
    }

    /// The command name this curator kind expects for a guided-search trigger.
    pub fn search_command_name(self) -> &'static str {
        match self {
            CuratorKind::Movie | CuratorKind::Adult => "MoviesSearch",
            CuratorKind::Series => "EpisodeSearch",
            CuratorKind::Music => "AlbumSearch",
            CuratorKind::Book => "BookSearch",
        }
    }

    /// Whether this curator kind supports guided search at all. The adult/specialized
    /// kind does not, mirroring the original implementation's exclusion of its
    /// equivalent kind from both search variants.
    pub fn supports_search(self) -> bool {
        !matches!(self, CuratorKind::Adult)
    }
}

/// The kind of download client backing a curator's queue entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadClientKind {
    /// A BitTorrent client (qBittorrent-shaped). Supports the rich capability set.
    TorrentP2p,
    /// A Usenet client (SABnzbd-shaped). Supports the limited capability set.
    Usenet,
}

/// The protocol a queue entry was downloaded over, as reported by the curator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// BitTorrent transfer.
    TorrentP2p,
    /// Usenet transfer.
    Usenet,
}

/// How an offending download is handled once a removal job has decided to act on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerHandling {
    /// Remove the queue entry (and optionally blocklist it).
    Remove,
    /// Do nothing; leave the entry in the queue.
    Skip,
    /// Apply the configured obsolete tag instead of removing.
    TagAsObsolete,
}

/// Which queue scope a removal job's predicate is evaluated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The curator's normally-visible queue.
    Normal,
    /// The full queue, including entries with no backing detail item.
    Full,
    /// `Full \ Normal` — entries visible only when unknown items are included.
    Orphans,
}

/// A unique identifier for a download, as assigned by the download client
/// (a torrent info-hash or an NZB's internal id). Several [`QueueItem`]s can share one.
pub type DownloadId = String;

/// One line in a curator's download queue, normalized to a uniform shape regardless of
/// which curator vendor produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueItem {
    /// The curator-assigned id for this specific queue row.
    pub queue_entry_id: i64,
    /// The download-client-side id shared by all queue rows backed by the same
    /// download (e.g. all episodes of one season torrent).
    pub download_id: DownloadId,
    /// The curator's detail-item id (movie/episode/album/book), if this entry has one.
    /// Absent for orphan entries.
    pub detail_item_id: Option<i64>,
    /// Human-readable title, for logging.
    pub title: String,
    /// Total size in bytes, as reported by the curator.
    pub size: u64,
    /// Bytes remaining, as reported by the curator.
    pub size_left: u64,
    /// Curator-reported queue status (`"downloading"`, `"warning"`, `"completed"`, ...).
    pub status: String,
    /// Curator-reported tracked-download status (`"ok"`, `"warning"`, ...), distinct
    /// from `status`; used by the failed-import predicate.
    pub tracked_download_status: Option<String>,
    /// Curator-reported tracked-download state (`"importPending"`, `"importFailed"`,
    /// `"importBlocked"`, ...).
    pub tracked_download_state: Option<String>,
    /// Free-form diagnostic messages attached by the curator, each with the message
    /// text itself (used by the failed-import predicate's glob matching).
    pub status_messages: Vec<String>,
    /// The curator's single summarizing error message, if any.
    pub error_message: Option<String>,
    /// Transfer protocol.
    pub protocol: Protocol,
    /// Name of the download client handling this entry, as the curator reports it.
    /// Must match a configured [`crate::domain::DownloadClientKind`] entry's name
    /// exactly for the action dispatcher to find it.
    pub download_client_name: String,
    /// Indexer name, used only for de-duplicated logging of ignored statuses.
    pub indexer: Option<String>,
}

impl QueueItem {
    /// Whether this entry's status marks it as transient noise that must be invisible
    /// to every predicate (`delay`, `downloadClientUnavailable`).
    pub fn is_ignored_status(&self) -> bool {
        matches!(self.status.as_str(), "delay" | "downloadClientUnavailable")
    }
}

/// All [`QueueItem`]s that share one [`DownloadId`], the unit a removal job and the
/// action dispatcher act on atomically.
#[derive(Clone, Debug)]
pub struct DownloadGrouping {
    /// The shared download id.
    pub download_id: DownloadId,
    /// Every queue item backed by that download.
    pub items: Vec<QueueItem>,
    /// Diagnostic messages a predicate attached to this group (e.g. matched
    /// failed-import status messages), surfaced by the action dispatcher.
    pub removal_messages: Vec<String>,
}

impl DownloadGrouping {
    /// The first queue entry id in the group, used as the target of
    /// `removeQueueEntry` (removing one entry removes the whole backing download at
    /// the curator).
    pub fn first_queue_entry_id(&self) -> i64 {
        self.items[0].queue_entry_id
    }

    /// The protocol shared by every item in the group (grouping atomicity guarantees
    /// every item in a group shares the same download, hence the same protocol).
    pub fn protocol(&self) -> Protocol {
        self.items[0].protocol
    }

    /// The download client name shared by every item in the group.
    pub fn download_client_name(&self) -> &str {
        &self.items[0].download_client_name
    }
}

/// Group a flat list of queue items by their shared `download_id`, preserving the
/// first-seen order of groups.
pub fn group_by_download_id(items: Vec<QueueItem>) -> Vec<DownloadGrouping> {
    let mut order: Vec<DownloadId> = Vec::new();
    let mut groups: HashMap<DownloadId, Vec<QueueItem>> = HashMap::new();
    for item in items {
        if !groups.contains_key(&item.download_id) {
            order.push(item.download_id.clone());
        }
        groups.entry(item.download_id.clone()).or_default().push(item);
    }
    order
        .into_iter()
        .map(|download_id| {
            let items = groups.remove(&download_id).unwrap_or_default();
            DownloadGrouping {
                download_id,
                items,
                removal_messages: Vec::new(),
            }
        })
        .collect()
}

/// Per-job, per-download cross-cycle strike state.
#[derive(Clone, Debug)]
pub struct StrikeRecord {
    /// The removal job this record belongs to.
    pub job_name: &'static str,
    /// The download this record tracks.
    pub download_id: DownloadId,
    /// Title, kept for log readability across cycles.
    pub title: String,
    /// Consecutive-offense counter.
    pub strikes: u32,
    /// Whether accrual/recovery is currently paused (e.g. bandwidth saturation).
    pub tracking_paused: bool,
    /// Why tracking is paused, if it is.
    pub pause_reason: Option<String>,
}

/// A curator's wanted-but-not-yet-obtained item, as returned by `listWanted`.
#[derive(Clone, Debug)]
pub struct WantedItem {
    /// The detail-item id this wanted entry refers to.
    pub detail_item_id: i64,
    /// Human-readable title.
    pub title: String,
    /// When this item was last searched for, if ever.
    pub last_search_time: Option<chrono::DateTime<chrono::Utc>>,
    /// For series curators: the parent series id, used to resolve a readable title.
    pub series_id: Option<i64>,
    /// For series curators: season number.
    pub season_number: Option<i32>,
    /// For series curators: episode number.
    pub episode_number: Option<i32>,
}

/// Which variant of "wanted" a search job asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WantedKind {
    /// Items with no file at all.
    Missing,
    /// Items below the configured quality cutoff.
    CutoffUnmet,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(download_id: &str, queue_entry_id: i64) -> QueueItem {
        QueueItem {
            queue_entry_id,
            download_id: download_id.into(),
            detail_item_id: Some(queue_entry_id),
            title: "t".into(),
            size: 100,
            size_left: 0,
            status: "downloading".into(),
            tracked_download_status: None,
            tracked_download_state: None,
            status_messages: vec![],
            error_message: None,
            protocol: Protocol::TorrentP2p,
            download_client_name: "qbit".into(),
            indexer: None,
        }
    }

    #[test]
    fn grouping_collects_shared_download_ids() {
        let items = vec![item("H", 1), item("H", 2), item("G", 3)];
        let groups = group_by_download_id(items);
        assert_eq!(groups.len(), 2);
        let h = groups.iter().find(|g| g.download_id == "H").unwrap();
        assert_eq!(h.items.len(), 2);
        assert_eq!(h.first_queue_entry_id(), 1);
    }

    #[test]
    fn ignored_status_is_detected() {
        let mut it = item("H", 1);
        it.status = "delay".into();
        assert!(it.is_ignored_status());
        it.status = "downloadClientUnavailable".into();
        assert!(it.is_ignored_status());
        it.status = "warning".into();
        assert!(!it.is_ignored_status());
    }

    #[test]
    fn curator_kind_detail_item_keys_match_vendor_shapes() {
        assert_eq!(CuratorKind::Movie.detail_item_id_key(), "movieId");
        assert_eq!(CuratorKind::Series.detail_item_id_key(), "episodeId");
        assert!(!CuratorKind::Adult.supports_search());
        assert!(CuratorKind::Movie.supports_search());
    }
}
