//! `remove_unmonitored`: a download is offending only if every queue item sharing its
//! `downloadId` has a `detailItemId` and every one of those resolves unmonitored at the
//! curator. Blocklist false, no strikes — this is acting on user intent, not failure.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;

/// See module docs.
pub struct Unmonitored;

#[async_trait]
impl RemovalJob for Unmonitored {
    fn name(&self) -> &'static str {
        "remove_unmonitored"
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
        curator: &dyn CuratorGateway,
        _clients: &DownloadClients,
        _timer_minutes: u64,
    ) -> Result<Vec<DownloadGrouping>> {
        let mut offending = Vec::new();
        for group in group_by_download_id(items.to_vec()) {
            let mut all_unmonitored = true;
            for item in &group.items {
                let Some(detail_item_id) = item.detail_item_id else {
                    all_unmonitored = false;
                    break;
                };
                if curator.is_monitored(detail_item_id).await? {
                    all_unmonitored = false;
                    break;
                }
            }
            if all_unmonitored {
                offending.push(group);
            }
        }
        Ok(offending)
    }
}
