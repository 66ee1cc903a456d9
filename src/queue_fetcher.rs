//! Queue retrieval and normalization (§4.3).
//!
//! The gateway already paginates, refreshes, normalizes detail-item ids, and computes
//! the orphan set difference. What is left here is the part that depends on
//! daemon-wide configuration rather than curator wire shape: dropping transient
//! statuses and entries routed to ignored download clients.

use crate::domain::{QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use std::collections::HashSet;
use tracing::debug;

/// Fetch one curator's queue for the given scope, normalized and filtered per §4.3.
pub async fn fetch(
    gateway: &dyn CuratorGateway,
    scope: Scope,
    ignored_download_clients: &[String],
) -> Result<Vec<QueueItem>> {
    let items = gateway.get_queue(scope).await?;
    let mut logged: HashSet<(String, &'static str, String)> = HashSet::new();

    let filtered = items
        .into_iter()
        .filter(|item| {
            if item.is_ignored_status() {
                let protocol = match item.protocol {
                    crate::domain::Protocol::TorrentP2p => "torrent-p2p",
                    crate::domain::Protocol::Usenet => "usenet",
                };
                let key = (
                    item.title.clone(),
                    protocol,
                    item.indexer.clone().unwrap_or_default(),
                );
                if logged.insert(key) {
                    debug!(title = %item.title, protocol, indexer = ?item.indexer, "ignoring transient queue status");
                }
                return false;
            }
            if ignored_download_clients
                .iter()
                .any(|name| name == &item.download_client_name)
            {
                return false;
            }
            true
        })
        .collect();
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Protocol;
    use async_trait::async_trait;

    fn item(status: &str, client: &str) -> QueueItem {
        QueueItem {
            queue_entry_id: 1,
            download_id: "H".into(),
            detail_item_id: Some(1),
            title: "t".into(),
            size: 100,
            size_left: 50,
            status: status.into(),
            tracked_download_status: None,
            tracked_download_state: None,
            status_messages: vec![],
            error_message: None,
            protocol: Protocol::TorrentP2p,
            download_client_name: client.into(),
            indexer: None,
        }
    }

    struct FakeGateway(Vec<QueueItem>);

    #[async_trait]
    impl CuratorGateway for FakeGateway {
        async fn probe(&self) -> Result<crate::gateway::CuratorProbe> {
            unimplemented!()
        }
        async fn get_queue(&self, _scope: Scope) -> Result<Vec<QueueItem>> {
            Ok(self.0.clone())
        }
        async fn remove_queue_entry(&self, _id: i64, _blocklist: bool) -> Result<bool> {
            unimplemented!()
        }
        async fn is_monitored(&self, _id: i64) -> Result<bool> {
            unimplemented!()
        }
        async fn list_wanted(&self, _kind: crate::domain::WantedKind) -> Result<Vec<crate::domain::WantedItem>> {
            unimplemented!()
        }
        async fn command_search(&self, _ids: &[i64]) -> Result<()> {
            unimplemented!()
        }
        async fn list_download_clients_binding(&self) -> Result<Vec<crate::gateway::curator::DownloadClientBinding>> {
            unimplemented!()
        }
        async fn list_root_folders(&self) -> Result<Vec<crate::gateway::curator::RootFolder>> {
            unimplemented!()
        }
        async fn find_item_by_path(&self, _path: &str) -> Result<Option<i64>> {
            unimplemented!()
        }
        async fn refresh_item(&self, _id: i64) -> Result<()> {
            unimplemented!()
        }
        fn kind(&self) -> crate::domain::CuratorKind {
            crate::domain::CuratorKind::Movie
        }
        fn name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn drops_transient_statuses() {
        let gw = FakeGateway(vec![item("delay", "qbit"), item("downloading", "qbit")]);
        let result = fetch(&gw, Scope::Normal, &[]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].status, "downloading");
    }

    #[tokio::test]
    async fn drops_ignored_download_clients() {
        let gw = FakeGateway(vec![item("downloading", "dead-client")]);
        let result = fetch(&gw, Scope::Normal, &["dead-client".to_string()]).await.unwrap();
        assert!(result.is_empty());
    }
}
