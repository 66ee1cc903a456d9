//! End-to-end scenario tests driving individual removal jobs through the full
//! predicate -> strike-filter -> dispatch pipeline (`jobs::run_job`) against an
//! in-memory fake gateway, simulating several cycles by hand.

use async_trait::async_trait;
use queue_warden::action_dispatcher::DispatchContext;
use queue_warden::config::ResolvedJobConfig;
use queue_warden::domain::{CuratorKind, DownloadClientKind, Protocol, QueueItem, Scope, TrackerHandling, WantedItem, WantedKind};
use queue_warden::error::Result;
use queue_warden::gateway::curator::{CuratorProbe, DownloadClientBinding, RootFolder};
use queue_warden::gateway::download_client::{ClientItem, TorrentFile};
use queue_warden::gateway::{CuratorGateway, DownloadClientGateway};
use queue_warden::jobs::{self, DownloadClients};
use queue_warden::tracker::Tracker;
use std::collections::HashMap;
use std::sync::Mutex;

const STALLED_MESSAGE: &str = "The download is stalled with no connections";

fn item(download_id: &str, queue_entry_id: i64, status: &str) -> QueueItem {
    QueueItem {
        queue_entry_id,
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
        indexer: None,
    }
}

fn default_config(max_strikes: Option<u32>) -> ResolvedJobConfig {
    ResolvedJobConfig {
        enabled: true,
        max_strikes,
        min_speed_kbs: 100.0,
        max_concurrent_searches: 3,
        min_days_between_searches: 7,
        message_patterns: vec!["*".into()],
    }
}

fn dispatch_ctx(private: TrackerHandling, public: TrackerHandling, obsolete_tag: &str) -> DispatchContext {
    DispatchContext {
        private_tracker_handling: private,
        public_tracker_handling: public,
        obsolete_tag: obsolete_tag.into(),
    }
}

/// A curator gateway backed by mutable in-memory queues, one per scope that any of
/// these scenarios need, plus an `is_monitored` lookup table.
struct FakeCurator {
    normal_queue: Mutex<Vec<QueueItem>>,
    orphan_queue: Mutex<Vec<QueueItem>>,
    monitored: Mutex<HashMap<i64, bool>>,
    removed: Mutex<Vec<(i64, bool)>>,
}

impl FakeCurator {
    fn new() -> Self {
        Self {
            normal_queue: Mutex::new(vec![]),
            orphan_queue: Mutex::new(vec![]),
            monitored: Mutex::new(HashMap::new()),
            removed: Mutex::new(vec![]),
        }
    }

    fn set_normal(&self, items: Vec<QueueItem>) {
        *self.normal_queue.lock().unwrap() = items;
    }

    fn set_orphans(&self, items: Vec<QueueItem>) {
        *self.orphan_queue.lock().unwrap() = items;
    }

    fn set_monitored(&self, detail_item_id: i64, monitored: bool) {
        self.monitored.lock().unwrap().insert(detail_item_id, monitored);
    }
}

#[async_trait]
impl CuratorGateway for FakeCurator {
    async fn probe(&self) -> Result<CuratorProbe> {
        unimplemented!()
    }
    async fn get_queue(&self, scope: Scope) -> Result<Vec<QueueItem>> {
        Ok(match scope {
            Scope::Normal => self.normal_queue.lock().unwrap().clone(),
            Scope::Orphans => self.orphan_queue.lock().unwrap().clone(),
            Scope::Full => self.normal_queue.lock().unwrap().clone(),
        })
    }
    async fn remove_queue_entry(&self, queue_entry_id: i64, blocklist: bool) -> Result<bool> {
        self.removed.lock().unwrap().push((queue_entry_id, blocklist));
        Ok(true)
    }
    async fn is_monitored(&self, detail_item_id: i64) -> Result<bool> {
        Ok(*self.monitored.lock().unwrap().get(&detail_item_id).unwrap_or(&true))
    }
    async fn list_wanted(&self, _kind: WantedKind) -> Result<Vec<WantedItem>> {
        unimplemented!()
    }
    async fn command_search(&self, _ids: &[i64]) -> Result<()> {
        unimplemented!()
    }
    async fn list_download_clients_binding(&self) -> Result<Vec<DownloadClientBinding>> {
        unimplemented!()
    }
    async fn list_root_folders(&self) -> Result<Vec<RootFolder>> {
        unimplemented!()
    }
    async fn find_item_by_path(&self, _path: &str) -> Result<Option<i64>> {
        unimplemented!()
    }
    async fn refresh_item(&self, _id: i64) -> Result<()> {
        unimplemented!()
    }
    fn kind(&self) -> CuratorKind {
        CuratorKind::Movie
    }
    fn name(&self) -> &str {
        "fake-curator"
    }
}

/// A torrent-p2p download client with mutable bandwidth/progress state and recorded
/// tag calls, for the bandwidth-saturation and tag-as-obsolete scenarios.
struct FakeDownloadClient {
    name: String,
    utilization: Mutex<f64>,
    downloaded: Mutex<u64>,
    tagged: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeDownloadClient {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            utilization: Mutex::new(0.0),
            downloaded: Mutex::new(0),
            tagged: Mutex::new(vec![]),
        }
    }

    fn set_bandwidth(&self, utilization: f64, downloaded: u64) {
        *self.utilization.lock().unwrap() = utilization;
        *self.downloaded.lock().unwrap() = downloaded;
    }
}

#[async_trait]
impl DownloadClientGateway for FakeDownloadClient {
    fn kind(&self) -> DownloadClientKind {
        DownloadClientKind::TorrentP2p
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
    async fn list_items(&self, _ids: &[String]) -> Result<Vec<ClientItem>> {
        Ok(vec![])
    }
    async fn list_item_files(&self, _download_id: &str) -> Result<Option<Vec<TorrentFile>>> {
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
        Ok(Some(*self.downloaded.lock().unwrap()))
    }
    async fn global_bandwidth_utilization(&self) -> Result<f64> {
        Ok(*self.utilization.lock().unwrap())
    }
}

/// S1: a stalled download survives three offending cycles untouched, then is removed
/// and blocklisted on the fourth. Once the curator no longer reports it in the queue
/// at all, the strike record is cleared on the next cycle's recovery pass.
#[tokio::test]
async fn stalled_download_is_removed_on_the_fourth_strike_then_its_record_clears() {
    let job = jobs::stalled::Stalled;
    let curator = FakeCurator::new();
    let clients = DownloadClients::new();
    let mut tracker = Tracker::new();
    let config = default_config(Some(3));
    let ctx = dispatch_ctx(TrackerHandling::TagAsObsolete, TrackerHandling::Remove, "obsolete");

    let mut stalled_item = item("H", 42, "warning");
    stalled_item.error_message = Some(STALLED_MESSAGE.into());
    curator.set_normal(vec![stalled_item]);

    for _ in 0..3 {
        jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
            .await
            .unwrap();
        assert!(curator.removed.lock().unwrap().is_empty());
    }

    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert_eq!(curator.removed.lock().unwrap().as_slice(), &[(42, true)]);

    curator.set_normal(vec![]);
    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert!(!tracker.defective["remove_stalled"].contains_key("H"));
    assert_eq!(curator.removed.lock().unwrap().len(), 1);
}

/// S2: a download recovers before reaching the strike threshold; no removal happens
/// and its strike record is deleted the cycle it stops offending.
#[tokio::test]
async fn recovered_download_is_never_removed() {
    let job = jobs::stalled::Stalled;
    let curator = FakeCurator::new();
    let clients = DownloadClients::new();
    let mut tracker = Tracker::new();
    let config = default_config(Some(3));
    let ctx = dispatch_ctx(TrackerHandling::Remove, TrackerHandling::Remove, "obsolete");

    let mut stalled_item = item("H", 42, "warning");
    stalled_item.error_message = Some(STALLED_MESSAGE.into());
    curator.set_normal(vec![stalled_item]);

    for _ in 0..2 {
        jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
            .await
            .unwrap();
    }
    assert_eq!(tracker.defective["remove_stalled"]["H"].strikes, 2);

    curator.set_normal(vec![item("H", 42, "downloading")]);
    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();

    assert!(!tracker.defective["remove_stalled"].contains_key("H"));
    assert!(curator.removed.lock().unwrap().is_empty());
}

/// S3: a private torrent is tagged obsolete instead of removed once it exceeds the
/// strike threshold.
#[tokio::test]
async fn private_tracker_download_is_tagged_instead_of_removed() {
    let job = jobs::stalled::Stalled;
    let curator = FakeCurator::new();
    let client = std::sync::Arc::new(FakeDownloadClient::new("qbit"));
    let mut clients = DownloadClients::new();
    clients.insert("qbit".to_string(), client.clone() as std::sync::Arc<dyn DownloadClientGateway>);
    let mut tracker = Tracker::new();
    tracker.private.insert("P".to_string());
    let config = default_config(Some(3));
    let ctx = dispatch_ctx(TrackerHandling::TagAsObsolete, TrackerHandling::Remove, "Obsolete");

    let mut stalled_item = item("P", 7, "warning");
    stalled_item.error_message = Some(STALLED_MESSAGE.into());
    curator.set_normal(vec![stalled_item]);

    for _ in 0..3 {
        jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
            .await
            .unwrap();
        assert!(client.tagged.lock().unwrap().is_empty());
    }

    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert_eq!(
        client.tagged.lock().unwrap().as_slice(),
        &[("Obsolete".to_string(), vec!["P".to_string()])]
    );
    assert!(curator.removed.lock().unwrap().is_empty());
}

/// S4: an orphan entry is removed outright, without blocklisting, the first cycle it
/// appears.
#[tokio::test]
async fn orphan_is_removed_immediately_without_blocklisting() {
    let job = jobs::orphans::Orphans;
    let curator = FakeCurator::new();
    let clients = DownloadClients::new();
    let mut tracker = Tracker::new();
    let config = default_config(None);
    let ctx = dispatch_ctx(TrackerHandling::Remove, TrackerHandling::Remove, "obsolete");

    let mut orphan = item("O", 99, "downloading");
    orphan.detail_item_id = None;
    curator.set_orphans(vec![orphan]);

    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert_eq!(curator.removed.lock().unwrap().as_slice(), &[(99, false)]);
}

/// S5: a season pack where one episode is still monitored is left untouched; only a
/// group where every member is unmonitored qualifies.
#[tokio::test]
async fn partially_monitored_group_is_left_alone() {
    let job = jobs::unmonitored::Unmonitored;
    let curator = FakeCurator::new();
    let clients = DownloadClients::new();
    let mut tracker = Tracker::new();
    let config = default_config(None);
    let ctx = dispatch_ctx(TrackerHandling::Remove, TrackerHandling::Remove, "obsolete");

    let mut ep1 = item("G", 10, "downloading");
    ep1.detail_item_id = Some(10);
    let mut ep2 = item("G", 11, "downloading");
    ep2.detail_item_id = Some(11);
    curator.set_normal(vec![ep1, ep2]);
    curator.set_monitored(10, true);
    curator.set_monitored(11, false);

    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert!(curator.removed.lock().unwrap().is_empty());
}

/// S6: while bandwidth is saturated, strike tracking is paused and no strikes accrue.
/// The first cycle after desaturation only establishes a fresh progress anchor (no
/// delta yet to judge), so accrual actually starts the cycle after that; the download
/// is removed once four consecutive low-speed cycles follow.
#[tokio::test]
async fn bandwidth_saturation_pauses_strikes_until_desaturated() {
    let job = jobs::slow::Slow;
    let curator = FakeCurator::new();
    let client = std::sync::Arc::new(FakeDownloadClient::new("qbit"));
    let mut clients = DownloadClients::new();
    clients.insert("qbit".to_string(), client.clone() as std::sync::Arc<dyn DownloadClientGateway>);
    let mut tracker = Tracker::new();
    let mut config = default_config(Some(3));
    config.min_speed_kbs = 1_000_000.0;
    let ctx = dispatch_ctx(TrackerHandling::Remove, TrackerHandling::Remove, "obsolete");

    let mut slow_item = item("S", 5, "downloading");
    slow_item.size = 10_000_000;
    slow_item.size_left = 5_000_000;
    curator.set_normal(vec![slow_item]);

    // Cycles 1-2: saturated, strikes paused.
    for _ in 0..2 {
        client.set_bandwidth(0.9, 1_000);
        jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
            .await
            .unwrap();
    }
    assert!(tracker.defective["remove_slow"]["S"].tracking_paused);
    assert_eq!(tracker.defective["remove_slow"]["S"].strikes, 0);
    assert!(curator.removed.lock().unwrap().is_empty());

    // Cycle 3: desaturated, but this is the first real sample -> no delta, no strike,
    // and the now-unpaused, non-offending record is recovered (deleted).
    client.set_bandwidth(0.3, 1_000);
    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert!(!tracker.defective["remove_slow"].contains_key("S"));

    // Cycles 4-6: consistently slow -> strikes accrue to 3, still below threshold.
    let mut bytes = 1_000u64;
    for _ in 0..3 {
        bytes += 100;
        client.set_bandwidth(0.3, bytes);
        jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
            .await
            .unwrap();
    }
    assert!(curator.removed.lock().unwrap().is_empty());
    assert_eq!(tracker.defective["remove_slow"]["S"].strikes, 3);

    // Cycle 7: fourth consecutive slow cycle exceeds max_strikes=3 -> removed.
    bytes += 100;
    client.set_bandwidth(0.3, bytes);
    jobs::run_job(&job, &curator, &clients, &mut tracker, &config, &[], 10, &ctx)
        .await
        .unwrap();
    assert_eq!(curator.removed.lock().unwrap().as_slice(), &[(5, true)]);
}
