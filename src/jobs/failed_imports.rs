//! `remove_failed_imports`: a completed download stuck importing, with diagnostics
//! matching the configured glob patterns. Blocklist true, strikes used.
//!
//! Per the resolved reading of the original behavior (see design notes), this job
//! uses only the stricter `completed + warning + importPending/importFailed/
//! importBlocked` rule; `trackedDownloadStatus == "warning"` alone is not sufficient.

use super::{DownloadClients, RemovalJob};
use crate::config::ResolvedJobConfig;
use crate::domain::{group_by_download_id, DownloadGrouping, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::tracker::Tracker;
use async_trait::async_trait;
use regex::Regex;

const IMPORT_STUCK_STATES: &[&str] = &["importPending", "importFailed", "importBlocked"];

fn is_candidate(item: &QueueItem) -> bool {
    item.status == "completed"
        && item.tracked_download_status.as_deref() == Some("warning")
        && item
            .tracked_download_state
            .as_deref()
            .is_some_and(|s| IMPORT_STUCK_STATES.contains(&s))
}

/// Translate a shell-style glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

fn matching_messages(status_messages: &[String], patterns: &[String]) -> Vec<String> {
    if patterns.is_empty() {
        return status_messages.to_vec();
    }
    let compiled: Vec<Regex> = patterns.iter().map(|p| glob_to_regex(p)).collect();
    status_messages
        .iter()
        .filter(|msg| compiled.iter().any(|re| re.is_match(msg)))
        .cloned()
        .collect()
}

/// See module docs.
pub struct FailedImports;

#[async_trait]
impl RemovalJob for FailedImports {
    fn name(&self) -> &'static str {
        "remove_failed_imports"
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
        config: &ResolvedJobConfig,
        _curator: &dyn CuratorGateway,
        _clients: &DownloadClients,
        _timer_minutes: u64,
    ) -> Result<Vec<DownloadGrouping>> {
        let offending: Vec<QueueItem> = items.iter().filter(|i| is_candidate(i)).cloned().collect();
        let mut groups = group_by_download_id(offending);
        groups.retain_mut(|group| {
            let matched: Vec<String> = group
                .items
                .iter()
                .flat_map(|item| matching_messages(&item.status_messages, &config.message_patterns))
                .collect();
            if matched.is_empty() {
                return false;
            }
            group.removal_messages = matched;
            true
        });
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{item, job_config, NullCuratorGateway};

    fn candidate(download_id: &str, messages: &[&str]) -> QueueItem {
        let mut i = item(download_id, "completed");
        i.tracked_download_status = Some("warning".into());
        i.tracked_download_state = Some("importFailed".into());
        i.status_messages = messages.iter().map(|s| s.to_string()).collect();
        i
    }

    #[tokio::test]
    async fn default_wildcard_pattern_matches_any_message() {
        let job = FailedImports;
        let item = candidate("H", &["Not a sample"]);
        let groups = job
            .predicate(&[item], &mut Tracker::new(), &job_config(), &NullCuratorGateway, &DownloadClients::new(), 10)
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].removal_messages, vec!["Not a sample".to_string()]);
    }

    #[tokio::test]
    async fn wrong_tracked_state_is_not_offending() {
        let job = FailedImports;
        let mut i = candidate("H", &["x"]);
        i.tracked_download_state = Some("importCompleted".into());
        let groups = job
            .predicate(&[i], &mut Tracker::new(), &job_config(), &NullCuratorGateway, &DownloadClients::new(), 10)
            .await
            .unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn pattern_with_no_match_drops_the_group() {
        let job = FailedImports;
        let mut config = job_config();
        config.message_patterns = vec!["Sample*".into()];
        let item = candidate("H", &["Not a sample file"]);
        let groups = job
            .predicate(&[item], &mut Tracker::new(), &config, &NullCuratorGateway, &DownloadClients::new(), 10)
            .await
            .unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn glob_star_matches_prefix() {
        let job = FailedImports;
        let mut config = job_config();
        config.message_patterns = vec!["Sample*".into()];
        let item = candidate("H", &["Sample file detected and removed"]);
        let groups = job
            .predicate(&[item], &mut Tracker::new(), &config, &NullCuratorGateway, &DownloadClients::new(), 10)
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
    }
}
