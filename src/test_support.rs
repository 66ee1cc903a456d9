//! Shared test doubles, used only by `#[cfg(test)]` modules across the crate.

#![cfg(test)]

use crate::domain::{CuratorKind, Protocol, QueueItem, WantedItem, WantedKind};
use crate::error::Result;
use crate::gateway::curator::{DownloadClientBinding, RootFolder};
use crate::gateway::{CuratorGateway, CuratorProbe};
use async_trait::async_trait;

/// Build a minimal [`QueueItem`] for predicate tests, with sane defaults that most
/// tests don't care about.
pub fn item(download_id: &str, status: &str) -> QueueItem {
    QueueItem {
        queue_entry_id: download_id.len() as i64,
        download_id: download_id.into(),
        detail_item_id: Some(1),
        title: format!("title-{download_id}"),
        size: 1_000_000,
        size_left: 500_000,
        status: status.into(),
        tracked_download_status: None,
        tracked_download_state: None,
        status_messages: vec![],
        error_message: None,
        protocol: Protocol::TorrentP2p,
        download_client_name: "qbit".into(),
        indexer: Some("indexer".into()),
    }
}

/// A [`CuratorGateway`] every method of which panics if called. Pass to predicate
/// tests that never touch the curator gateway.
pub struct NullCuratorGateway;

#[async_trait]
impl CuratorGateway for NullCuratorGateway {
    async fn probe(&self) -> Result<CuratorProbe> {
        unimplemented!("NullCuratorGateway::probe")
    }
    async fn get_queue(&self, _scope: crate::domain::Scope) -> Result<Vec<QueueItem>> {
        unimplemented!("NullCuratorGateway::get_queue")
    }
    async fn remove_queue_entry(&self, _id: i64, _blocklist: bool) -> Result<bool> {
        unimplemented!("NullCuratorGateway::remove_queue_entry")
    }
    async fn is_monitored(&self, _id: i64) -> Result<bool> {
        unimplemented!("NullCuratorGateway::is_monitored")
    }
    async fn list_wanted(&self, _kind: WantedKind) -> Result<Vec<WantedItem>> {
        unimplemented!("NullCuratorGateway::list_wanted")
    }
    async fn command_search(&self, _ids: &[i64]) -> Result<()> {
        unimplemented!("NullCuratorGateway::command_search")
    }
    async fn list_download_clients_binding(&self) -> Result<Vec<DownloadClientBinding>> {
        unimplemented!("NullCuratorGateway::list_download_clients_binding")
    }
    async fn list_root_folders(&self) -> Result<Vec<RootFolder>> {
        unimplemented!("NullCuratorGateway::list_root_folders")
    }
    async fn find_item_by_path(&self, _path: &str) -> Result<Option<i64>> {
        unimplemented!("NullCuratorGateway::find_item_by_path")
    }
    async fn refresh_item(&self, _id: i64) -> Result<()> {
        unimplemented!("NullCuratorGateway::refresh_item")
    }
    fn kind(&self) -> CuratorKind {
        CuratorKind::Movie
    }
    fn name(&self) -> &str {
        "null-curator"
    }
}

/// A [`CuratorGateway`] that records `remove_queue_entry` calls instead of making them.
/// Every other method panics.
pub struct RecordingCuratorGateway {
    pub removed: std::sync::Mutex<Vec<(i64, bool)>>,
}

impl RecordingCuratorGateway {
    pub fn new() -> Self {
        Self {
            removed: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CuratorGateway for RecordingCuratorGateway {
    async fn probe(&self) -> Result<CuratorProbe> {
        unimplemented!("RecordingCuratorGateway::probe")
    }
    async fn get_queue(&self, _scope: crate::domain::Scope) -> Result<Vec<QueueItem>> {
        unimplemented!("RecordingCuratorGateway::get_queue")
    }
    async fn remove_queue_entry(&self, id: i64, blocklist: bool) -> Result<bool> {
        self.removed.lock().unwrap().push((id, blocklist));
        Ok(true)
    }
    async fn is_monitored(&self, _id: i64) -> Result<bool> {
        unimplemented!("RecordingCuratorGateway::is_monitored")
    }
    async fn list_wanted(&self, _kind: WantedKind) -> Result<Vec<WantedItem>> {
        unimplemented!("RecordingCuratorGateway::list_wanted")
    }
    async fn command_search(&self, _ids: &[i64]) -> Result<()> {
        unimplemented!("RecordingCuratorGateway::command_search")
    }
    async fn list_download_clients_binding(&self) -> Result<Vec<DownloadClientBinding>> {
        unimplemented!("RecordingCuratorGateway::list_download_clients_binding")
    }
    async fn list_root_folders(&self) -> Result<Vec<RootFolder>> {
        unimplemented!("RecordingCuratorGateway::list_root_folders")
    }
    async fn find_item_by_path(&self, _path: &str) -> Result<Option<i64>> {
        unimplemented!("RecordingCuratorGateway::find_item_by_path")
    }
    async fn refresh_item(&self, _id: i64) -> Result<()> {
        unimplemented!("RecordingCuratorGateway::refresh_item")
    }
    fn kind(&self) -> CuratorKind {
        CuratorKind::Movie
    }
    fn name(&self) -> &str {
        "recording-curator"
    }
}

/// A [`DownloadClientGateway`] that records `apply_tag` calls instead of making them.
pub struct RecordingDownloadClient {
    pub name: String,
    pub tagged: std::sync::Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingDownloadClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            tagged: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl crate::gateway::DownloadClientGateway for RecordingDownloadClient {
    fn kind(&self) -> crate::domain::DownloadClientKind {
        crate::domain::DownloadClientKind::TorrentP2p
    }
    fn name(&self) -> &str {
        &self.name
    }
    async fn ensure_session(&self) -> Result<()> {
        Ok(())
    }
    async fn probe_connected(&self) -> Result<bool> {
        Ok(true)
    }
    async fn list_items(&self, _ids: &[String]) -> Result<Vec<crate::gateway::download_client::ClientItem>> {
        Ok(vec![])
    }
    async fn list_item_files(&self, _download_id: &str) -> Result<Option<Vec<crate::gateway::download_client::TorrentFile>>> {
        Ok(None)
    }
    async fn set_file_priority(&self, _download_id: &str, _file_index: u32, _priority: u32) -> Result<()> {
        Ok(())
    }
    async fn apply_tag(&self, tag: &str, download_ids: &[String]) -> Result<()> {
        self.tagged.lock().unwrap().push((tag.into(), download_ids.to_vec()));
        Ok(())
    }
    async fn downloaded_bytes(&self, _download_id: &str) -> Result<Option<u64>> {
        Ok(None)
    }
    async fn global_bandwidth_utilization(&self) -> Result<f64> {
        Ok(0.0)
    }
}

/// A default [`ResolvedJobConfig`] for tests that only care about one or two fields.
pub fn job_config() -> crate::config::ResolvedJobConfig {
    crate::config::ResolvedJobConfig {
        enabled: true,
        max_strikes: None,
        min_speed_kbs: 100.0,
        max_concurrent_searches: 3,
        min_days_between_searches: 7,
        message_patterns: vec!["*".into()],
    }
}
