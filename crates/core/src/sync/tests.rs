use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::errors::{ApiError, DatabaseError, Error, Result};
use crate::sync::{
    BatchReport, GroupProfile, HistoryStore, MessageRecord, MessageSource, PageCursor, RetryPolicy,
    SyncEngine, SyncLogEntry, SyncOrchestrator, SyncStatus,
};

fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

fn group(id: &str) -> GroupProfile {
    GroupProfile {
        id: id.to_string(),
        name: format!("Group {}", id),
        description: None,
        image_url: None,
        creator_user_id: None,
        created_at: ts(0),
        updated_at: None,
        group_type: None,
        share_url: None,
        last_synced_at: None,
        last_synced_message_id: None,
    }
}

fn record(n: i64) -> MessageRecord {
    MessageRecord {
        id: format!("m{:04}", n),
        source_guid: None,
        user_id: Some(format!("u{}", n % 7)),
        created_at: ts(n),
        text: Some(format!("message {}", n)),
        system: false,
        sender_name: Some(format!("User {}", n % 7)),
        sender_avatar_url: None,
        favorited_by: Vec::new(),
        attachments: Vec::new(),
    }
}

/// Fake API backed by an oldest-first canonical history per group.
struct FakeSource {
    groups: Mutex<HashMap<String, GroupProfile>>,
    // Oldest-first; pages are served newest-first like the real API.
    history: Mutex<HashMap<String, Vec<MessageRecord>>>,
    fetch_errors: Mutex<VecDeque<Error>>,
    message_calls: AtomicUsize,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            fetch_errors: Mutex::new(VecDeque::new()),
            message_calls: AtomicUsize::new(0),
        }
    }

    fn with_history(group_id: &str, records: Vec<MessageRecord>) -> Self {
        let source = Self::new();
        source
            .groups
            .lock()
            .unwrap()
            .insert(group_id.to_string(), group(group_id));
        source
            .history
            .lock()
            .unwrap()
            .insert(group_id.to_string(), records);
        source
    }

    fn push_error(&self, error: Error) {
        self.fetch_errors.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn fetch_group(&self, group_id: &str) -> Result<GroupProfile> {
        self.groups
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .ok_or_else(|| Error::Api(ApiError::NotFound(format!("group {}", group_id))))
    }

    async fn fetch_all_groups(&self) -> Result<Vec<GroupProfile>> {
        Ok(self.groups.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_messages(
        &self,
        group_id: &str,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fetch_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        let history = self.history.lock().unwrap();
        let all = history.get(group_id).cloned().unwrap_or_default();

        let slice: Vec<MessageRecord> = match cursor {
            PageCursor::Start => all.iter().rev().take(limit).cloned().collect(),
            PageCursor::Before(id) => {
                let idx = all.iter().position(|m| m.id == id).unwrap_or(0);
                all[..idx].iter().rev().take(limit).cloned().collect()
            }
            PageCursor::Since(id) => {
                let idx = all.iter().position(|m| m.id == id);
                match idx {
                    Some(idx) => all[idx + 1..].iter().rev().take(limit).cloned().collect(),
                    None => Vec::new(),
                }
            }
        };
        Ok(slice)
    }
}

/// Fake source that replays scripted pages regardless of cursor.
struct ScriptedPagesSource {
    pages: Mutex<VecDeque<Vec<MessageRecord>>>,
}

#[async_trait]
impl MessageSource for ScriptedPagesSource {
    async fn fetch_group(&self, group_id: &str) -> Result<GroupProfile> {
        Ok(group(group_id))
    }

    async fn fetch_all_groups(&self) -> Result<Vec<GroupProfile>> {
        Ok(Vec::new())
    }

    async fn fetch_messages(
        &self,
        _group_id: &str,
        _cursor: PageCursor,
        _limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// In-memory store with natural-key dedup and injectable failures.
#[derive(Default)]
struct FakeStore {
    groups: Mutex<HashMap<String, GroupProfile>>,
    records: Mutex<HashMap<String, Vec<MessageRecord>>>,
    logs: Mutex<Vec<SyncLogEntry>>,
    fail_after_batches: Mutex<Option<usize>>,
    committed_batches: AtomicUsize,
    fail_sync_log: Mutex<bool>,
}

impl FakeStore {
    fn checkpoint(&self, group_id: &str) -> Option<String> {
        self.groups
            .lock()
            .unwrap()
            .get(group_id)
            .and_then(|g| g.last_synced_message_id.clone())
    }

    fn stored_ids(&self, group_id: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .get(group_id)
            .map(|records| records.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for FakeStore {
    async fn load_group(&self, group_id: &str) -> Result<Option<GroupProfile>> {
        Ok(self.groups.lock().unwrap().get(group_id).cloned())
    }

    async fn insert_group(&self, group: &GroupProfile) -> Result<()> {
        self.groups
            .lock()
            .unwrap()
            .insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn persist_batch(
        &self,
        group_id: &str,
        records: &[MessageRecord],
    ) -> Result<BatchReport> {
        if let Some(max) = *self.fail_after_batches.lock().unwrap() {
            if self.committed_batches.load(Ordering::SeqCst) >= max {
                return Err(Error::Database(DatabaseError::Internal(
                    "injected batch failure".to_string(),
                )));
            }
        }

        let mut report = BatchReport::default();
        {
            let mut stored = self.records.lock().unwrap();
            let stored = stored.entry(group_id.to_string()).or_default();
            for record in records {
                if stored.iter().any(|r| r.id == record.id) {
                    report.skipped += 1;
                } else {
                    stored.push(record.clone());
                    report.inserted += 1;
                }
            }
        }

        // Checkpoint and inserts are one atomic unit in the real store.
        let last = &records[records.len() - 1];
        let mut groups = self.groups.lock().unwrap();
        let entry = groups
            .entry(group_id.to_string())
            .or_insert_with(|| group(group_id));
        entry.last_synced_message_id = Some(last.id.clone());
        entry.last_synced_at = Some(Utc::now());

        self.committed_batches.fetch_add(1, Ordering::SeqCst);
        Ok(report)
    }

    async fn reset_checkpoint(&self, group_id: &str) -> Result<()> {
        if let Some(group) = self.groups.lock().unwrap().get_mut(group_id) {
            group.last_synced_message_id = None;
            group.last_synced_at = None;
        }
        Ok(())
    }

    async fn append_sync_log(&self, entry: SyncLogEntry) -> Result<()> {
        if *self.fail_sync_log.lock().unwrap() {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "no such group".to_string(),
            )));
        }
        self.logs.lock().unwrap().push(entry);
        Ok(())
    }
}

fn engine_for(source: Arc<FakeSource>, store: Arc<FakeStore>) -> SyncEngine {
    SyncEngine::new(source, store)
}

#[tokio::test]
async fn bootstrap_stores_full_history_and_sets_checkpoint() {
    let history: Vec<MessageRecord> = (1..=150).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g1", history));
    let store = Arc::new(FakeStore::default());

    let fetched = engine_for(Arc::clone(&source), Arc::clone(&store))
        .sync_group("g1")
        .await
        .expect("bootstrap sync");

    assert_eq!(fetched, 150);
    assert_eq!(store.stored_ids("g1").len(), 150);
    // Ordering invariant: the checkpoint is the newest record's id.
    assert_eq!(store.checkpoint("g1").as_deref(), Some("m0150"));
    // Two pages of 100/50, each requested once.
    assert_eq!(source.message_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_sync_with_no_new_messages_is_a_noop() {
    let history: Vec<MessageRecord> = (1..=150).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g1", history));
    let store = Arc::new(FakeStore::default());
    let engine = engine_for(Arc::clone(&source), Arc::clone(&store));

    engine.sync_group("g1").await.expect("first sync");
    let checkpoint = store.checkpoint("g1");

    let fetched = engine.sync_group("g1").await.expect("second sync");
    assert_eq!(fetched, 0);
    assert_eq!(store.checkpoint("g1"), checkpoint);
    assert_eq!(store.stored_ids("g1").len(), 150);
}

#[tokio::test]
async fn incremental_sync_fetches_only_records_after_checkpoint() {
    let history: Vec<MessageRecord> = (1..=120).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g1", history.clone()));
    let store = Arc::new(FakeStore::default());
    let engine = engine_for(Arc::clone(&source), Arc::clone(&store));

    engine.sync_group("g1").await.expect("bootstrap");

    // Ten new messages arrive.
    source
        .history
        .lock()
        .unwrap()
        .get_mut("g1")
        .unwrap()
        .extend((121..=130).map(record));

    let fetched = engine.sync_group("g1").await.expect("incremental");
    assert_eq!(fetched, 10);
    assert_eq!(store.stored_ids("g1").len(), 130);
    assert_eq!(store.checkpoint("g1").as_deref(), Some("m0130"));
}

#[tokio::test]
async fn overlapping_bootstrap_pages_insert_each_record_once() {
    // Page 1: newest 100 (51..=150). Page 2 overlaps 50 records (1..=100).
    let page1: Vec<MessageRecord> = (51..=150).rev().map(record).collect();
    let page2: Vec<MessageRecord> = (1..=100).rev().map(record).collect();
    let source = Arc::new(ScriptedPagesSource {
        pages: Mutex::new(VecDeque::from(vec![page1, page2])),
    });
    let store = Arc::new(FakeStore::default());

    let fetched = SyncEngine::new(source, Arc::clone(&store) as Arc<dyn HistoryStore>)
        .sync_group("g1")
        .await
        .expect("sync");

    // 200 fetched, but only 150 distinct natural keys stored.
    assert_eq!(fetched, 200);
    let mut ids = store.stored_ids("g1");
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 150);
}

#[tokio::test]
async fn batch_failure_leaves_checkpoint_at_last_commit_and_resumes() {
    let history: Vec<MessageRecord> = (1..=150).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g1", history));
    let store = Arc::new(FakeStore::default());
    *store.fail_after_batches.lock().unwrap() = Some(2);

    let engine = engine_for(Arc::clone(&source), Arc::clone(&store)).with_batch_size(50);
    let err = engine.sync_group("g1").await.expect_err("injected failure");
    assert!(matches!(err, Error::Database(_)));

    // Two batches of 50 committed before the failure.
    assert_eq!(store.stored_ids("g1").len(), 100);
    assert_eq!(store.checkpoint("g1").as_deref(), Some("m0100"));

    // Next run resumes from the checkpoint and produces zero duplicates.
    *store.fail_after_batches.lock().unwrap() = None;
    let fetched = engine.sync_group("g1").await.expect("resume");
    assert_eq!(fetched, 50);
    let mut ids = store.stored_ids("g1");
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total, "resume must not duplicate rows");
    assert_eq!(total, 150);
    assert_eq!(store.checkpoint("g1").as_deref(), Some("m0150"));
}

#[tokio::test]
async fn unknown_group_is_created_from_api_metadata() {
    let history: Vec<MessageRecord> = (1..=5).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g9", history));
    let store = Arc::new(FakeStore::default());

    let fetched = engine_for(source, Arc::clone(&store))
        .sync_group("g9")
        .await
        .expect("sync");

    assert_eq!(fetched, 5);
    let groups = store.groups.lock().unwrap();
    assert!(groups.contains_key("g9"));
}

#[tokio::test(start_paused = true)]
async fn orchestrator_retries_rate_limit_and_counts_only_success() {
    let history: Vec<MessageRecord> = (1..=30).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g1", history));
    source.push_error(Error::Api(ApiError::RateLimitExceeded(
        "throttled".to_string(),
    )));
    let store = Arc::new(FakeStore::default());

    let orchestrator = SyncOrchestrator::new(source, Arc::clone(&store) as Arc<dyn HistoryStore>);
    let report = orchestrator.sync_group("g1").await;

    assert!(report.is_ok(), "expected success, got {:?}", report.error);
    assert_eq!(report.messages_fetched, 30);

    let logs = store.logs.lock().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Completed);
    assert_eq!(logs[0].messages_fetched, 30);
}

#[tokio::test]
async fn orchestrator_does_not_retry_authentication_errors() {
    let source = Arc::new(FakeSource::new());
    source
        .groups
        .lock()
        .unwrap()
        .insert("g1".to_string(), group("g1"));
    source.push_error(Error::Api(ApiError::Authentication(
        "invalid token".to_string(),
    )));
    let store = Arc::new(FakeStore::default());

    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&source) as Arc<dyn MessageSource>,
        Arc::clone(&store) as Arc<dyn HistoryStore>,
    );
    let report = orchestrator.sync_group("g1").await;

    assert!(report.error.as_deref().unwrap().contains("Authentication"));
    assert_eq!(report.messages_fetched, 0);
    assert_eq!(source.message_calls.load(Ordering::SeqCst), 1);

    let logs = store.logs.lock().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Failed);
}

#[tokio::test]
async fn failed_audit_write_is_tolerated() {
    let source = Arc::new(FakeSource::new());
    let store = Arc::new(FakeStore::default());
    *store.fail_sync_log.lock().unwrap() = true;

    let orchestrator = SyncOrchestrator::new(source, Arc::clone(&store) as Arc<dyn HistoryStore>);
    // Unknown group: fetch_group returns NotFound, sync fails, and the audit
    // write fails too; both are reported softly.
    let report = orchestrator.sync_group("missing").await;

    assert!(!report.is_ok());
    assert!(store.logs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn resync_clears_checkpoint_and_walks_full_history() {
    let history: Vec<MessageRecord> = (1..=40).map(record).collect();
    let source = Arc::new(FakeSource::with_history("g1", history));
    let store = Arc::new(FakeStore::default());
    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&source) as Arc<dyn MessageSource>,
        Arc::clone(&store) as Arc<dyn HistoryStore>,
    );

    let first = orchestrator.sync_group("g1").await;
    assert_eq!(first.messages_fetched, 40);

    let again = orchestrator.resync_group("g1").await;
    // Full walk re-fetches everything; dedup keeps the stored set stable.
    assert_eq!(again.messages_fetched, 40);
    assert_eq!(store.stored_ids("g1").len(), 40);
    assert_eq!(store.checkpoint("g1").as_deref(), Some("m0040"));
}

#[tokio::test]
async fn sync_many_reports_per_group_outcomes() {
    let source = Arc::new(FakeSource::new());
    {
        let mut groups = source.groups.lock().unwrap();
        groups.insert("g1".to_string(), group("g1"));
        groups.insert("g2".to_string(), group("g2"));
    }
    source
        .history
        .lock()
        .unwrap()
        .insert("g1".to_string(), (1..=3).map(record).collect());
    let store = Arc::new(FakeStore::default());
    let orchestrator = SyncOrchestrator::new(source, store)
        .with_policy(RetryPolicy::new(1, std::time::Duration::from_millis(1), std::time::Duration::from_millis(1)));

    let results: BTreeMap<String, _> = orchestrator
        .sync_groups(&["g1".to_string(), "g2".to_string()])
        .await;

    assert_eq!(results["g1"].messages_fetched, 3);
    assert!(results["g1"].is_ok());
    assert_eq!(results["g2"].messages_fetched, 0);
    assert!(results["g2"].is_ok());
}
