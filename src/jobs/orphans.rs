//! `remove_orphans`: every item the gateway surfaces under the `orphans` scope
//! (`full \ normal`) is offending outright. Blocklist false, no strikes.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;

/// See module docs.
pub struct Orphans;

#[async_trait]
impl RemovalJob for Orphans {
    fn name(&self) -> &'static str {
        "remove_orphans"
    }

    fn scope(&self) -> Scope {
        Scope::Orphans
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
        Ok(group_by_download_id(items.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, job_config, NullCuratorGateway};

    #[tokio::test]
    async fn every_item_in_scope_is_offending() {
        let job = Orphans;
        let items = vec![item("H", "downloading"), item("G", "warning")];
        let groups = job
            .predicate(
                &items,
                &mut Tracker::new(),
                &job_config(),
                &NullCuratorGateway,
                &DownloadClients::new(),
                10,
            )
            .await
            .unwrap();
        assert_eq!(groups.len(), 2);
    }
}
