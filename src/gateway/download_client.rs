//! Download-client capability façade (§4.2).
//!
//! Torrent-p2p and Usenet clients expose different capability sets. Rather than one
//! trait every implementor must fully satisfy, optional capabilities return `None`/a
//! no-op default for clients that do not support them, and callers query for presence
//! instead of downcasting.

use crate::config::DownloadClientConfig;
use crate::domain::DownloadClientKind;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// One file inside a torrent, as reported by `listItemFiles`.
#[derive(Debug, Clone)]
pub struct TorrentFile {
    /// Index of this file within the torrent, used by `setFilePriority`.
    pub index: u32,
    /// Path of the file inside the torrent.
    pub path: String,
    /// Current download priority (0 = do not download).
    pub priority: u32,
    /// Fraction of the file available in the swarm, 0.0..=1.0.
    pub availability: f64,
    /// Fraction of the file already downloaded, 0.0..=1.0.
    pub progress: f64,
}

/// One item as reported by a download client's own queue listing.
#[derive(Debug, Clone)]
pub struct ClientItem {
    /// The client-side download id (torrent hash or NZB id).
    pub download_id: String,
    /// Client-reported state string (`"downloading"`, `"stalledDL"`, `"forcedDL"`, ...).
    pub state: String,
    /// Whether torrent metadata has been fetched yet (always true for usenet).
    pub has_metadata: bool,
    /// Fraction of the swarm's pieces available, torrent-p2p only.
    pub availability: Option<f64>,
    /// Tags currently applied, torrent-p2p only.
    pub tags: Vec<String>,
    /// Whether the torrent's tracker is marked private, torrent-p2p only.
    pub is_private: Option<bool>,
    /// Exact bytes downloaded, when the client can report it precisely.
    pub completed_bytes: Option<u64>,
}

/// Capabilities the core needs from a download client. Methods not supported by a
/// given client kind return `Ok(None)` / a no-op, never an error — callers treat
/// absence as "this signal does not apply here", per the graceful-degradation
/// requirement.
#[async_trait]
pub trait DownloadClientGateway: Send + Sync {
    /// This client's kind.
    fn kind(&self) -> DownloadClientKind;
    /// Configured name, must match what curators report for their binding.
    fn name(&self) -> &str;

    /// Acquire or refresh a session token. No-op for usenet clients.
    async fn ensure_session(&self) -> Result<()>;

    /// Probe connectivity (peer connectivity for torrent-p2p, service reachability
    /// for usenet).
    async fn probe_connected(&self) -> Result<bool>;

    /// List items by download id.
    async fn list_items(&self, ids: &[String]) -> Result<Vec<ClientItem>>;

    /// List a torrent's files. `None` for usenet clients.
    async fn list_item_files(&self, download_id: &str) -> Result<Option<Vec<TorrentFile>>>;

    /// Set one file's priority. No-op for usenet clients.
    async fn set_file_priority(&self, download_id: &str, file_index: u32, priority: u32) -> Result<()>;

    /// Ensure a tag exists and apply it to the given downloads. No-op for usenet.
    async fn apply_tag(&self, tag: &str, download_ids: &[String]) -> Result<()>;

    /// Exact or derived bytes downloaded for one download.
    async fn downloaded_bytes(&self, download_id: &str) -> Result<Option<u64>>;

    /// Fraction of configured bandwidth limit currently in use, 0.0 if unlimited or
    /// not applicable (usenet).
    async fn global_bandwidth_utilization(&self) -> Result<f64>;
}

/// Generic HTTP+JSON implementation, specialized per [`DownloadClientKind`] against
/// the qBittorrent Web API (torrent-p2p) / SABnzbd API (usenet) capability shapes.
pub struct HttpDownloadClientGateway {
    client: reqwest::Client,
    base_url: String,
    kind: DownloadClientKind,
    name: String,
    username: Option<String>,
    password: Option<String>,
    test_run: bool,
}

impl HttpDownloadClientGateway {
    /// Build a gateway for one configured download client.
    pub fn new(
        client: reqwest::Client,
        kind: DownloadClientKind,
        config: &DownloadClientConfig,
        test_run: bool,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            kind,
            name: config.name.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
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
            .send()
            .await
            .map_err(|e| Error::unreachable(&self.name, e))?;
        if resp.status() == reqwest::StatusCode::FORBIDDEN || resp.status() == reqwest::StatusCode::UNAUTHORIZED {
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

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<()> {
        if self.test_run {
            return Ok(());
        }
        let resp = self
            .client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .map_err(|e| Error::unreachable(&self.name, e))?;
        if !resp.status().is_success() {
            return Err(Error::ActionRejected {
                backend: self.name.clone(),
                detail: resp.status().to_string(),
            });
        }
        Ok(())
    }

    /// Fallback for qBittorrent versions older than 5.0, whose `torrents/info`
    /// response carries no `private` field. Best-effort: a failed or malformed
    /// response just leaves privacy unknown rather than failing the whole listing.
    async fn fetch_is_private(&self, hash: &str) -> Option<bool> {
        #[derive(Deserialize)]
        struct Properties {
            #[serde(default)]
            is_private: Option<bool>,
        }
        let path = format!("/api/v2/torrents/properties?hash={hash}");
        self.get_json::<Properties>(&path).await.ok()?.is_private
    }
}

#[async_trait]
impl DownloadClientGateway for HttpDownloadClientGateway {
    fn kind(&self) -> DownloadClientKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_session(&self) -> Result<()> {
        if self.kind != DownloadClientKind::TorrentP2p {
            return Ok(());
        }
        if self.test_run {
            return Ok(());
        }
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Ok(());
        };
        let resp = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await
            .map_err(|e| Error::unreachable(&self.name, e))?;
        if !resp.status().is_success() {
            return Err(Error::AuthFailed {
                backend: self.name.clone(),
            });
        }
        Ok(())
    }

    async fn probe_connected(&self) -> Result<bool> {
        match self.kind {
            DownloadClientKind::TorrentP2p => {
                #[derive(Deserialize)]
                struct ConnectionStatus {
                    connection_status: String,
                }
                let status: ConnectionStatus = self.get_json("/api/v2/transfer/info").await?;
                Ok(status.connection_status != "firewalled" && status.connection_status != "disconnected")
            }
            DownloadClientKind::Usenet => {
                #[derive(Deserialize)]
                struct Version {
                    version: Option<String>,
                }
                let resp: Result<Version> = self.get_json("/api?mode=version&output=json").await;
                Ok(resp.is_ok())
            }
        }
    }

    async fn list_items(&self, ids: &[String]) -> Result<Vec<ClientItem>> {
        match self.kind {
            DownloadClientKind::TorrentP2p => {
                #[derive(Deserialize)]
                struct RawTorrent {
                    hash: String,
                    state: String,
                    availability: Option<f64>,
                    #[serde(default)]
                    tags: String,
                    #[serde(default)]
                    completed: Option<u64>,
                    /// Present on qBittorrent >= 5.0; absent on older versions, where
                    /// privacy has to be fetched per-torrent instead.
                    #[serde(default)]
                    private: Option<bool>,
                }
                let torrents: Vec<RawTorrent> = self.get_json("/api/v2/torrents/info").await?;
                let mut items = Vec::with_capacity(torrents.len());
                for t in torrents {
                    if !(ids.is_empty() || ids.contains(&t.hash)) {
                        continue;
                    }
                    let is_private = match t.private {
                        Some(private) => Some(private),
                        None => self.fetch_is_private(&t.hash).await,
                    };
                    items.push(ClientItem {
                        download_id: t.hash,
                        has_metadata: !matches!(t.state.as_str(), "metaDL" | "checkingResumeData"),
                        state: t.state,
                        availability: t.availability,
                        tags: t.tags.split(", ").filter(|s| !s.is_empty()).map(String::from).collect(),
                        is_private,
                        completed_bytes: t.completed,
                    });
                }
                Ok(items)
            }
            DownloadClientKind::Usenet => {
                #[derive(Deserialize)]
                struct SlotWrapper {
                    queue: SlotQueue,
                }
                #[derive(Deserialize)]
                struct SlotQueue {
                    #[serde(default)]
                    slots: Vec<RawSlot>,
                }
                #[derive(Deserialize)]
                struct RawSlot {
                    nzo_id: String,
                    status: String,
                }
                let resp: SlotWrapper = self.get_json("/api?mode=queue&output=json").await?;
                Ok(resp
                    .queue
                    .slots
                    .into_iter()
                    .filter(|s| ids.is_empty() || ids.contains(&s.nzo_id))
                    .map(|s| ClientItem {
                        download_id: s.nzo_id,
                        state: s.status,
                        has_metadata: true,
                        availability: None,
                        tags: Vec::new(),
                        is_private: None,
                        completed_bytes: None,
                    })
                    .collect())
            }
        }
    }

    async fn list_item_files(&self, download_id: &str) -> Result<Option<Vec<TorrentFile>>> {
        if self.kind != DownloadClientKind::TorrentP2p {
            return Ok(None);
        }
        #[derive(Deserialize)]
        struct RawFile {
            index: u32,
            name: String,
            priority: u32,
            availability: f64,
            progress: f64,
        }
        let files: Vec<RawFile> = self
            .get_json(&format!("/api/v2/torrents/files?hash={download_id}"))
            .await?;
        Ok(Some(
            files
                .into_iter()
                .map(|f| TorrentFile {
                    index: f.index,
                    path: f.name,
                    priority: f.priority,
                    availability: f.availability,
                    progress: f.progress,
                })
                .collect(),
        ))
    }

    async fn set_file_priority(&self, download_id: &str, file_index: u32, priority: u32) -> Result<()> {
        if self.kind != DownloadClientKind::TorrentP2p {
            return Ok(());
        }
        self.post_form(
            "/api/v2/torrents/filePrio",
            &[
                ("hash", download_id),
                ("id", &file_index.to_string()),
                ("priority", &priority.to_string()),
            ],
        )
        .await
    }

    async fn apply_tag(&self, tag: &str, download_ids: &[String]) -> Result<()> {
        if self.kind != DownloadClientKind::TorrentP2p {
            return Ok(());
        }
        self.post_form("/api/v2/torrents/createTags", &[("tags", tag)]).await?;
        let hashes = download_ids.join("|");
        self.post_form("/api/v2/torrents/addTags", &[("hashes", &hashes), ("tags", tag)])
            .await
    }

    async fn downloaded_bytes(&self, download_id: &str) -> Result<Option<u64>> {
        let items = self.list_items(std::slice::from_ref(&download_id.to_string())).await?;
        Ok(items.into_iter().find_map(|i| i.completed_bytes))
    }

    async fn global_bandwidth_utilization(&self) -> Result<f64> {
        if self.kind != DownloadClientKind::TorrentP2p {
            return Ok(0.0);
        }
        #[derive(Deserialize)]
        struct TransferInfo {
            dl_info_speed: u64,
            dl_rate_limit: u64,
        }
        let info: TransferInfo = self.get_json("/api/v2/transfer/info").await?;
        if info.dl_rate_limit == 0 {
            return Ok(0.0);
        }
        Ok(info.dl_info_speed as f64 / info.dl_rate_limit as f64)
    }
}
