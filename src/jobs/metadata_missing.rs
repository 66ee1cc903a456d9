//! `remove_metadata_missing`: `status == "queued" AND errorMessage` reports the
//! download client is still fetching torrent metadata. Blocklist true, strikes used.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;

const METADATA_SUFFIX: &str = "is downloading metadata";

/// See module docs.
pub struct MetadataMissing;

#[async_trait]
impl RemovalJob for MetadataMissing {
    fn name(&self) -> &'static str {
        "remove_metadata_missing"
    }

    fn scope(&self) -> Scope {
        Scope::Normal
    }

    fn blocklist_on_removal(&self) -> bool {
        true
    }

    fn uses_strikes(&self) -> bool {
        true
    }

    async fn predicate(
        &self,
        items: &[QueueItem],
        _tracker: &mut Tracker,
        _config: &ResolvedJobConfig,
        _curator: &dyn CuratorGateway,
        _clients: &DownloadClients,
        _timer_minutes: u64,
    ) -> Result<Vec<DownloadGrouping>> {
        let offending: Vec<QueueItem> = items
            .iter()
            .filter(|i| {
                i.status == "queued"
                    && i.error_message
                        .as_deref()
                        .is_some_and(|m| m.ends_with(METADATA_SUFFIX))
            })
            .cloned()
            .collect();
        Ok(group_by_download_id(offending))
    }
}
