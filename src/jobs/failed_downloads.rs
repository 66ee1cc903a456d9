//! `remove_failed_downloads`: `status == "failed"`. Scope normal, no blocklist, no
//! strikes — a failed download is acted upon immediately.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;

/// See module docs.
pub struct FailedDownloads;

#[async_trait]
impl RemovalJob for FailedDownloads {
    fn name(&self) -> &'static str {
        "remove_failed_downloads"
    }

    fn scope(&self) -> Scope {
        Scope::Normal
    }

    fn blocklist_on_removal(&self) -> bool {
        false
    }

    fn uses_strikes(&self) -> bool {
        false
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
        let offending: Vec<QueueItem> = items.iter().filter(|i| i.status == "failed").cloned().collect();
        Ok(group_by_download_id(offending))
    }
}
