//! `remove_missing_files`: either `status=="warning"` with a recognized missing-files
//! `errorMessage`, or `status=="completed"` with a `statusMessage` reporting nothing
//! was eligible for import. Blocklist false, no strikes — the download is genuinely
//! gone, not transiently struggling.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;

const MISSING_FILES_MESSAGES: &[&str] = &[
    "The download is missing files",
    "qBittorrent is reporting missing files",
];

const NO_IMPORT_PREFIX: &str = "No files found are eligible for import in";

fn is_missing_files(item: &QueueItem) -> bool {
    if item.status == "warning" {
        if let Some(msg) = &item.error_message {
            if MISSING_FILES_MESSAGES.contains(&msg.as_str()) {
                return true;
            }
        }
    }
    if item.status == "completed" {
        return item
            .status_messages
            .iter()
            .any(|m| m.starts_with(NO_IMPORT_PREFIX));
    }
    false
}

/// See module docs.
pub struct MissingFiles;

#[async_trait]
impl RemovalJob for MissingFiles {
    fn name(&self) -> &'static str {
        "remove_missing_files"
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
        let offending: Vec<QueueItem> = items.iter().filter(|i| is_missing_files(i)).cloned().collect();
        Ok(group_by_download_id(offending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, job_config, NullCuratorGateway};

    #[tokio::test]
    async fn matches_warning_error_message_or_completed_status_message() {
        let job = MissingFiles;
        let mut by_error = item("H", "warning");
        by_error.error_message = Some("The download is missing files".into());
        let mut by_status_message = item("G", "completed");
        by_status_message.status_messages = vec!["No files found are eligible for import in /x".into()];
        let mut wrong = item("F", "failed");
        wrong.error_message = Some("The download is missing files".into());
        let groups = job
            .predicate(
                &[by_error, by_status_message, wrong],
                &mut Tracker::new(),
                &job_config(),
                &NullCuratorGateway,
                &DownloadClients::new(),
                10,
            )
            .await
            .unwrap();
        let mut ids: Vec<&str> = groups.iter().map(|g| g.download_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["G", "H"]);
    }
}
