//! Curator capability façade (§4.1).

use crate::config::InstanceConfig;
use crate::domain::{CuratorKind, DownloadId, Protocol, QueueItem, Scope, WantedItem, WantedKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of a successful `probe()` call.
#[derive(Debug, Clone)]
pub struct CuratorProbe {
    /// Version string reported by the curator.
    pub version: String,
    /// Instance name, for logging.
    pub instance_name: String,
}

/// A curator's reported binding to one of its configured download clients.
#[derive(Debug, Clone)]
pub struct DownloadClientBinding {
    /// Name as the curator knows it.
    pub name: String,
    /// Vendor-reported implementation kind (used only for logging/diagnostics).
    pub vendor_kind: String,
}

/// A curator's root folder.
#[derive(Debug, Clone)]
pub struct RootFolder {
    /// Filesystem path.
    pub path: String,
    /// Whether the curator currently reports the path as accessible.
    pub accessible: bool,
}

/// The minimum curator version this crate supports talking to.
pub const MIN_SUPPORTED_VERSION: &str = "3.0.0.0";

/// Capabilities the core needs from a single curator instance.
#[async_trait]
pub trait CuratorGateway: Send + Sync {
    /// Probe connectivity, version, and instance identity. Fails fatally at setup and
    /// with `AuthFailed`/`VersionTooLow`/`BackendUnreachable` mid-cycle.
    async fn probe(&self) -> Result<CuratorProbe>;

    /// Fetch and normalize this curator's queue for the given scope. Issues a
    /// "refresh monitored downloads" command first so the result reflects current
    /// download-client state.
    async fn get_queue(&self, scope: Scope) -> Result<Vec<QueueItem>>;

    /// Remove one queue entry, optionally blocklisting it, and ask the curator to also
    /// remove the backing download from its download client.
    async fn remove_queue_entry(&self, queue_entry_id: i64, blocklist: bool) -> Result<bool>;

    /// Whether the given detail item is currently monitored.
    async fn is_monitored(&self, detail_item_id: i64) -> Result<bool>;

    /// List wanted items of the given kind (missing or cutoff-unmet).
    async fn list_wanted(&self, kind: WantedKind) -> Result<Vec<WantedItem>>;

    /// Fire a guided search for the given detail-item ids. Fire-and-forget.
    async fn command_search(&self, detail_item_ids: &[i64]) -> Result<()>;

    /// List this curator's configured download-client bindings, for reconciling
    /// against configured download clients by exact name.
    async fn list_download_clients_binding(&self) -> Result<Vec<DownloadClientBinding>>;

    /// List root folders, for the deletion bridge.
    async fn list_root_folders(&self) -> Result<Vec<RootFolder>>;

    /// Find the detail item backed by a filesystem path, for the deletion bridge.
    async fn find_item_by_path(&self, path: &str) -> Result<Option<i64>>;

    /// Ask the curator to refresh one detail item, for the deletion bridge.
    async fn refresh_item(&self, detail_item_id: i64) -> Result<()>;

    /// This curator's kind, for predicates that need it (e.g. search support).
    fn kind(&self) -> CuratorKind;

    /// A short name for this curator instance, used in logs and error messages.
    fn name(&self) -> &str;
}

/// Generic HTTP+JSON implementation of [`CuratorGateway`] against the common
/// *arr-family API shape (queue/command/wanted/rootfolder/parse endpoints).
pub struct HttpCuratorGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    kind: CuratorKind,
    name: String,
    test_run: bool,
}

impl HttpCuratorGateway {
    /// Build a gateway for one configured curator instance.
    pub fn new(client: reqwest::Client, kind: CuratorKind, instance: &InstanceConfig, test_run: bool) -> Self {
        Self {
            client,
            base_url: instance.base_url.trim_end_matches('/').to_string(),
            api_key: instance.api_key.clone(),
            kind,
            name: instance.base_url.clone(),
            test_run,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::unreachable(&self.name, e))?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::AuthFailed {
                backend: self.name.clone(),
            });
        }
        if !resp.status().is_success() {
            return Err(Error::unreachable(&self.name, resp.status()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::bad_response(&self.name, e))
    }

    /// Mutating POST/PUT/DELETE calls are intercepted here when `test_run` is set,
    /// returning synthetic success without touching the network. This is the single
    /// enforcement point named in §7: every mutating call on this gateway funnels
    /// through it, so no job needs to opt in separately.
    async fn mutate(&self, method: reqwest::Method, path: &str, body: Option<serde_json::Value>) -> Result<()> {
        if self.test_run {
            debug!(backend = %self.name, %method, path, "test run: suppressing mutating call");
            return Ok(());
        }
        let mut req = self
            .client
            .request(method, self.url(path))
            .header("X-Api-Key", &self.api_key);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.map_err(|e| Error::unreachable(&self.name, e))?;
        if !resp.status().is_success() {
            return Err(Error::ActionRejected {
                backend: self.name.clone(),
                detail: resp.status().to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawQueueResponse {
    #[serde(default)]
    records: Vec<RawQueueItem>,
    #[serde(rename = "totalRecords", default)]
    total_records: i64,
}

#[derive(Deserialize)]
struct RawQueueItem {
    id: i64,
    #[serde(rename = "downloadId")]
    download_id: Option<String>,
    title: Option<String>,
    size: Option<u64>,
    sizeleft: Option<u64>,
    status: Option<String>,
    #[serde(rename = "trackedDownloadStatus")]
    tracked_download_status: Option<String>,
    #[serde(rename = "trackedDownloadState")]
    tracked_download_state: Option<String>,
    #[serde(rename = "statusMessages", default)]
    status_messages: Vec<RawStatusMessage>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    protocol: Option<String>,
    #[serde(rename = "downloadClient")]
    download_client: Option<String>,
    indexer: Option<String>,
    #[serde(rename = "movieId")]
    movie_id: Option<i64>,
    #[serde(rename = "episodeId")]
    episode_id: Option<i64>,
    #[serde(rename = "albumId")]
    album_id: Option<i64>,
    #[serde(rename = "bookId")]
    book_id: Option<i64>,
}

#[derive(Deserialize)]
struct RawStatusMessage {
    #[serde(default)]
    messages: Vec<String>,
}

const PAGE_SIZE: i64 = 200;

#[async_trait]
impl CuratorGateway for HttpCuratorGateway {
    async fn probe(&self) -> Result<CuratorProbe> {
        #[derive(Deserialize)]
        struct SystemStatus {
            version: String,
            #[serde(rename = "instanceName", default)]
            instance_name: Option<String>,
        }
        let status: SystemStatus = self.get_json("/api/v3/system/status").await?;
        if status.version.as_str() < MIN_SUPPORTED_VERSION {
            return Err(Error::VersionTooLow {
                backend: self.name.clone(),
                minimum: MIN_SUPPORTED_VERSION.into(),
                actual: status.version.clone(),
            });
        }
        Ok(CuratorProbe {
            version: status.version,
            instance_name: status.instance_name.unwrap_or_else(|| self.name.clone()),
        })
    }

    async fn get_queue(&self, scope: Scope) -> Result<Vec<QueueItem>> {
        self.mutate(
            reqwest::Method::POST,
            "/api/v3/command",
            Some(json!({ "name": "RefreshMonitoredDownloads" })),
        )
        .await?;

        let include_unknown = matches!(scope, Scope::Full | Scope::Orphans);
        let normal_ids: Option<HashSet<i64>> = if scope == Scope::Orphans {
            Some(
                self.fetch_queue_page_set(false)
                    .await?
                    .into_iter()
                    .map(|item| item.id)
                    .collect(),
            )
        } else {
            None
        };

        let raw_items = self.fetch_queue_page_set(include_unknown).await?;
        let items: Vec<QueueItem> = raw_items
            .into_iter()
            .filter(|raw| {
                if let Some(normal) = &normal_ids {
                    // orphans = full \ normal
                    !normal.contains(&raw.id)
                } else {
                    true
                }
            })
            .filter_map(|raw| self.normalize(raw))
            .collect();
        Ok(items)
    }

    async fn remove_queue_entry(&self, queue_entry_id: i64, blocklist: bool) -> Result<bool> {
        let path = format!(
            "/api/v3/queue/{queue_entry_id}?removeFromClient=true&blocklist={blocklist}"
        );
        self.mutate(reqwest::Method::DELETE, &path, None).await?;
        Ok(true)
    }

    async fn is_monitored(&self, detail_item_id: i64) -> Result<bool> {
        #[derive(Deserialize)]
        struct Monitored {
            monitored: bool,
        }
        let path = match self.kind {
            CuratorKind::Movie | CuratorKind::Adult => format!("/api/v3/movie/{detail_item_id}"),
            CuratorKind::Series => format!("/api/v3/episode/{detail_item_id}"),
            CuratorKind::Music => format!("/api/v3/album/{detail_item_id}"),
            CuratorKind::Book => format!("/api/v3/book/{detail_item_id}"),
        };
        let item: Monitored = self.get_json(&path).await?;
        Ok(item.monitored)
    }

    async fn list_wanted(&self, kind: WantedKind) -> Result<Vec<WantedItem>> {
        #[derive(Deserialize)]
        struct RawWanted {
            id: i64,
            title: Option<String>,
            #[serde(rename = "lastSearchTime")]
            last_search_time: Option<chrono::DateTime<chrono::Utc>>,
            #[serde(rename = "seriesId")]
            series_id: Option<i64>,
            #[serde(rename = "seasonNumber")]
            season_number: Option<i32>,
            #[serde(rename = "episodeNumber")]
            episode_number: Option<i32>,
        }
        #[derive(Deserialize)]
        struct RawWantedResponse {
            #[serde(default)]
            records: Vec<RawWanted>,
        }
        let path = match kind {
            WantedKind::Missing => "/api/v3/wanted/missing?pageSize=1000",
            WantedKind::CutoffUnmet => "/api/v3/wanted/cutoff?pageSize=1000",
        };
        let resp: RawWantedResponse = self.get_json(path).await?;
        Ok(resp
            .records
            .into_iter()
            .map(|w| WantedItem {
                detail_item_id: w.id,
                title: w.title.unwrap_or_default(),
                last_search_time: w.last_search_time,
                series_id: w.series_id,
                season_number: w.season_number,
                episode_number: w.episode_number,
            })
            .collect())
    }

    async fn command_search(&self, detail_item_ids: &[i64]) -> Result<()> {
        let ids_key = self.kind.detail_item_id_key();
        let plural_key = format!("{}s", &ids_key[..ids_key.len() - 2]);
        self.mutate(
            reqwest::Method::POST,
            "/api/v3/command",
            Some(json!({
                "name": self.kind.search_command_name(),
                plural_key: detail_item_ids,
            })),
        )
        .await
    }

    async fn list_download_clients_binding(&self) -> Result<Vec<DownloadClientBinding>> {
        #[derive(Deserialize)]
        struct RawClient {
            name: String,
            implementation: String,
        }
        let clients: Vec<RawClient> = self.get_json("/api/v3/downloadclient").await?;
        Ok(clients
            .into_iter()
            .map(|c| DownloadClientBinding {
                name: c.name,
                vendor_kind: c.implementation,
            })
            .collect())
    }

    async fn list_root_folders(&self) -> Result<Vec<RootFolder>> {
        #[derive(Deserialize)]
        struct RawFolder {
            path: String,
            accessible: bool,
        }
        let folders: Vec<RawFolder> = self.get_json("/api/v3/rootfolder").await?;
        Ok(folders
            .into_iter()
            .map(|f| RootFolder {
                path: f.path,
                accessible: f.accessible,
            })
            .collect())
    }

    async fn find_item_by_path(&self, path: &str) -> Result<Option<i64>> {
        #[derive(Deserialize)]
        struct Parsed {
            #[serde(rename = "movieId")]
            movie_id: Option<i64>,
        }
        let encoded = urlencoding_lite(path);
        let parsed: Parsed = self.get_json(&format!("/api/v3/parse?path={encoded}")).await?;
        Ok(parsed.movie_id)
    }

    async fn refresh_item(&self, detail_item_id: i64) -> Result<()> {
        let (command, key) = match self.kind {
            CuratorKind::Movie | CuratorKind::Adult => ("RescanMovie", "movieId"),
            CuratorKind::Series => ("RescanSeries", "seriesId"),
            CuratorKind::Music => ("RescanArtist", "artistId"),
            CuratorKind::Book => ("RescanAuthor", "authorId"),
        };
        self.mutate(
            reqwest::Method::POST,
            "/api/v3/command",
            Some(json!({ "name": command, key: detail_item_id })),
        )
        .await
    }

    fn kind(&self) -> CuratorKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl HttpCuratorGateway {
    async fn fetch_queue_page_set(&self, include_unknown: bool) -> Result<Vec<RawQueueItem>> {
        let mut page = 1;
        let mut all = Vec::new();
        loop {
            let path = format!(
                "/api/v3/queue?page={page}&pageSize={PAGE_SIZE}&includeUnknownMovieItems={include_unknown}"
            );
            let resp: RawQueueResponse = self.get_json(&path).await?;
            let fetched = resp.records.len() as i64;
            all.extend(resp.records);
            if (page * PAGE_SIZE) >= resp.total_records || fetched == 0 {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    fn normalize(&self, raw: RawQueueItem) -> Option<QueueItem> {
        let download_id = raw.download_id?;
        let protocol = match raw.protocol.as_deref() {
            Some("torrent") => Protocol::TorrentP2p,
            Some("usenet") => Protocol::Usenet,
            _ => {
                warn!(queue_entry_id = raw.id, "queue entry missing recognizable protocol");
                return None;
            }
        };
        let detail_item_id = match self.kind {
            CuratorKind::Movie | CuratorKind::Adult => raw.movie_id,
            CuratorKind::Series => raw.episode_id,
            CuratorKind::Music => raw.album_id,
            CuratorKind::Book => raw.book_id,
        };
        Some(QueueItem {
            queue_entry_id: raw.id,
            download_id,
            detail_item_id,
            title: raw.title.unwrap_or_default(),
            size: raw.size.unwrap_or(0),
            size_left: raw.sizeleft.unwrap_or(0),
            status: raw.status.unwrap_or_default(),
            tracked_download_status: raw.tracked_download_status,
            tracked_download_state: raw.tracked_download_state,
            status_messages: raw
                .status_messages
                .into_iter()
                .flat_map(|m| m.messages)
                .collect(),
            error_message: raw.error_message,
            protocol,
            download_client_name: raw.download_client.unwrap_or_default(),
            indexer: raw.indexer,
        })
    }
}

/// Minimal percent-encoding for the one query-string value this gateway builds from
/// user-controlled data (a filesystem path).
fn urlencoding_lite(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
