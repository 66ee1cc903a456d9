//! `remove_slow`: torrent-p2p throughput policing (§4.5). Skips bandwidth-saturated and
//! first-sample downloads; everything else is judged against `minSpeedKBs`. Blocklist
//! true, strikes used.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{DownloadGrouping, Protocol, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::strike_filter;
use crate::tracker::Tracker;
use async_trait::async_trait;
use tracing::debug;

const BANDWIDTH_SATURATION_THRESHOLD: f64 = 0.8;
const SATURATION_PAUSE_REASON: &str = "High Bandwidth Usage";

/// See module docs.
pub struct Slow;

#[async_trait]
impl RemovalJob for Slow {
    fn name(&self) -> &'static str {
        "remove_slow"
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
        tracker: &mut Tracker,
        config: &ResolvedJobConfig,
        _curator: &dyn CuratorGateway,
        clients: &DownloadClients,
        timer_minutes: u64,
    ) -> Result<Vec<DownloadGrouping>> {
        let mut offending = Vec::new();

        for item in items {
            if item.protocol != Protocol::TorrentP2p {
                continue;
            }
            if !is_downloading(&item.status) {
                continue;
            }
            if item.size > 0 && item.size_left == 0 {
                continue;
            }
            let Some(client) = clients.get(&item.download_client_name) else {
                continue;
            };

            let utilization = client.global_bandwidth_utilization().await?;
            if utilization > BANDWIDTH_SATURATION_THRESHOLD {
                strike_filter::pause(tracker, self.name(), &item.download_id, &item.title, SATURATION_PAUSE_REASON);
                continue;
            }
            strike_filter::unpause(tracker, self.name(), &item.download_id);

            let bytes_now = match client.downloaded_bytes(&item.download_id).await? {
                Some(bytes) => bytes,
                None => item.size.saturating_sub(item.size_left),
            };

            let previous = tracker.progress_by_download_id.insert(item.download_id.clone(), bytes_now);
            let Some(bytes_prev) = previous else {
                debug!(download_id = %item.download_id, "first speed sample, no delta yet");
                continue;
            };

            let delta = bytes_now.saturating_sub(bytes_prev) as f64;
            let speed_kbs = delta / 1000.0 / (timer_minutes as f64 * 60.0);
            if speed_kbs < config.min_speed_kbs {
                offending.push(crate::domain::DownloadGrouping {
                    download_id: item.download_id.clone(),
                    items: vec![item.clone()],
                    removal_messages: vec![],
                });
            }
        }

        Ok(offending)
    }
}

fn is_downloading(status: &str) -> bool {
    status == "downloading"
}
