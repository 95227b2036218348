//! Orchestrates engine runs with bounded retry and audit logging.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::errors::Result;
use crate::sync::{
    HistoryStore, MessageSource, RetryPolicy, SyncEngine, SyncKind, SyncLogEntry, SyncReport,
    SyncStatus,
};

/// Wraps one engine invocation per group with retry/backoff and writes an
/// audit row for the outcome.
pub struct SyncOrchestrator {
    engine: SyncEngine,
    source: Arc<dyn MessageSource>,
    store: Arc<dyn HistoryStore>,
    policy: RetryPolicy,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn MessageSource>, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            engine: SyncEngine::new(Arc::clone(&source), Arc::clone(&store)),
            source,
            store,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.engine = self.engine.with_batch_size(batch_size);
        self
    }

    /// Sync one group, retrying retryable failures per the policy.
    pub async fn sync_group(&self, group_id: &str) -> SyncReport {
        self.run(group_id, SyncKind::Incremental).await
    }

    /// Reset the group's checkpoint and re-sync its full history.
    pub async fn resync_group(&self, group_id: &str) -> SyncReport {
        if let Err(err) = self.store.reset_checkpoint(group_id).await {
            error!(
                "Could not reset checkpoint for group {}: {}",
                group_id, err
            );
            return SyncReport::failed(err.to_string());
        }
        self.run(group_id, SyncKind::Full).await
    }

    /// Sync several groups sequentially.
    pub async fn sync_groups(&self, group_ids: &[String]) -> BTreeMap<String, SyncReport> {
        let mut results = BTreeMap::new();
        for group_id in group_ids {
            info!("Syncing group {}...", group_id);
            let report = self.sync_group(group_id).await;
            results.insert(group_id.clone(), report);
        }
        results
    }

    /// Sync every group visible to the credential.
    pub async fn sync_all_groups(&self) -> Result<BTreeMap<String, SyncReport>> {
        info!("Fetching all groups...");
        let groups = self.source.fetch_all_groups().await?;
        let group_ids: Vec<String> = groups.into_iter().map(|g| g.id).collect();
        info!("Found {} groups, starting sync", group_ids.len());
        Ok(self.sync_groups(&group_ids).await)
    }

    async fn run(&self, group_id: &str, kind: SyncKind) -> SyncReport {
        let started_at = Utc::now();

        match self.sync_with_retry(group_id).await {
            Ok(fetched) => {
                let entry = SyncLogEntry {
                    group_id: Some(group_id.to_string()),
                    started_at,
                    completed_at: Some(Utc::now()),
                    messages_fetched: fetched as i64,
                    status: SyncStatus::Completed,
                    error_message: None,
                    sync_kind: kind,
                };
                if let Err(err) = self.store.append_sync_log(entry).await {
                    warn!("Could not record sync log for group {}: {}", group_id, err);
                }
                info!(
                    "Successfully synced group {} ({} messages)",
                    group_id, fetched
                );
                SyncReport::succeeded(fetched)
            }
            Err(err) => {
                let message = err.to_string();
                error!("Failed to sync group {}: {}", group_id, message);

                // Best-effort: the group row may not exist yet, in which case
                // the audit write fails too and is tolerated.
                let entry = SyncLogEntry {
                    group_id: Some(group_id.to_string()),
                    started_at,
                    completed_at: Some(Utc::now()),
                    messages_fetched: 0,
                    status: SyncStatus::Failed,
                    error_message: Some(message.clone()),
                    sync_kind: kind,
                };
                if let Err(log_err) = self.store.append_sync_log(entry).await {
                    debug!(
                        "Could not record failed sync log for group {}: {}",
                        group_id, log_err
                    );
                }
                SyncReport::failed(message)
            }
        }
    }

    async fn sync_with_retry(&self, group_id: &str) -> Result<usize> {
        let mut attempt = 1;
        loop {
            match self.engine.sync_group(group_id).await {
                Ok(fetched) => return Ok(fetched),
                Err(err) if attempt < self.policy.max_attempts && self.policy.is_retryable(&err) => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "Sync attempt {}/{} for group {} failed ({}), retrying in {:?}",
                        attempt, self.policy.max_attempts, group_id, err, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
