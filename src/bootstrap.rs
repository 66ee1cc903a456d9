//! Turns a loaded [`Config`] into a running [`CycleScheduler`]: builds one HTTP gateway
//! per configured curator instance and download client, probes each curator once so
//! setup failures surface before the tick loop starts, and wires the scheduler's
//! download-client map per curator from the curator's own reported bindings.

use crate::config::Config;
use crate::domain::DownloadClientKind;
use crate::error::{Error, Result};
use crate::gateway::{build_http_client, CuratorGateway, DownloadClientGateway, HttpCuratorGateway, HttpDownloadClientGateway};
use crate::jobs::DownloadClients;
use crate::scheduler::{CuratorUnit, CycleScheduler};
use crate::tracker::Tracker;
use std::sync::Arc;
use tracing::{info, warn};

/// Build every configured gateway, probe each curator, and assemble a ready-to-run
/// [`CycleScheduler`]. Returns a fatal [`Error`] if any curator cannot be probed.
pub async fn build_scheduler(config: Config) -> Result<CycleScheduler> {
    let http_client = build_http_client(config.general.ssl_verification).map_err(Error::from)?;
    let test_run = config.general.test_run;

    let mut all_clients: Vec<Arc<dyn DownloadClientGateway>> = Vec::new();
    for (kind, instances) in &config.download_clients {
        for instance in instances {
            let gateway = Arc::new(HttpDownloadClientGateway::new(http_client.clone(), *kind, instance, test_run));
            all_clients.push(gateway);
        }
    }

    let mut curators = Vec::new();
    for (kind, instances) in &config.instances {
        for instance in instances {
            let gateway: Arc<dyn CuratorGateway> =
                Arc::new(HttpCuratorGateway::new(http_client.clone(), *kind, instance, test_run));
            let probe = gateway.probe().await?;
            info!(curator = gateway.name(), version = probe.version, "curator connected");

            let download_clients = bind_download_clients(gateway.as_ref(), &all_clients).await?;
            curators.push(CuratorUnit {
                gateway,
                download_clients,
                tracker: Tracker::new(),
            });
        }
    }

    let torrent_clients: Vec<Arc<dyn DownloadClientGateway>> = all_clients
        .iter()
        .filter(|c| c.kind() == DownloadClientKind::TorrentP2p)
        .cloned()
        .collect();

    Ok(CycleScheduler::new(config, curators, torrent_clients))
}

/// Reconcile a curator's reported download-client bindings against the configured
/// clients by exact name, so each curator only sees the clients it actually uses.
async fn bind_download_clients(
    curator: &dyn CuratorGateway,
    all_clients: &[Arc<dyn DownloadClientGateway>],
) -> Result<DownloadClients> {
    let bindings = curator.list_download_clients_binding().await?;
    let mut clients = DownloadClients::new();
    for binding in bindings {
        match all_clients.iter().find(|c| c.name() == binding.name) {
            Some(client) => {
                clients.insert(binding.name, client.clone());
            }
            None => {
                warn!(
                    curator = curator.name(),
                    client = binding.name,
                    "curator reports a download client binding with no matching configured client"
                );
            }
        }
    }
    Ok(clients)
}
