//! `remove_stalled`: `status == "warning" AND errorMessage == "The download is stalled
//! with no connections"`. Blocklist true, strikes used.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;

const STALLED_MESSAGE: &str = "The download is stalled with no connections";

/// See module docs.
pub struct Stalled;

#[async_trait]
impl RemovalJob for Stalled {
    fn name(&self) -> &'static str {
        "remove_stalled"
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
            .filter(|i| i.status == "warning" && i.error_message.as_deref() == Some(STALLED_MESSAGE))
            .cloned()
            .collect();
        Ok(group_by_download_id(offending))
    }
}
