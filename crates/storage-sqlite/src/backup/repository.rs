//! Repository implementing the core `HistoryStore` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use log::debug;

use groupvault_core::errors::Result;
use groupvault_core::sync::{BatchReport, GroupProfile, HistoryStore, MessageRecord, SyncLogEntry};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{groups, sync_logs};

use super::model::{to_db_timestamp, GroupDB, NewSyncLogDB};
use super::upsert::upsert_record;

pub struct BackupRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl BackupRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        BackupRepository { pool, writer }
    }

    pub fn load_group_impl(&self, group_id: &str) -> Result<Option<GroupProfile>> {
        let mut conn = get_connection(&self.pool)?;
        let group = groups::table
            .find(group_id)
            .first::<GroupDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(group.map(GroupProfile::from))
    }

    pub fn list_groups_impl(&self) -> Result<Vec<GroupProfile>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = groups::table
            .order(groups::name.asc())
            .load::<GroupDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(GroupProfile::from).collect())
    }

    pub fn recent_sync_logs_impl(&self, limit: i64) -> Result<Vec<SyncLogEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_logs::table
            .order(sync_logs::id.desc())
            .limit(limit)
            .load::<super::model::SyncLogDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(sync_log_from_db).collect())
    }
}

fn sync_log_from_db(db: super::model::SyncLogDB) -> SyncLogEntry {
    use groupvault_core::sync::{SyncKind, SyncStatus};

    let status = match db.status.as_str() {
        "running" => SyncStatus::Running,
        "failed" => SyncStatus::Failed,
        _ => SyncStatus::Completed,
    };
    let sync_kind = match db.sync_kind.as_str() {
        "full" => SyncKind::Full,
        _ => SyncKind::Incremental,
    };
    SyncLogEntry {
        group_id: db.group_id,
        started_at: super::model::parse_db_timestamp(&db.started_at),
        completed_at: db
            .completed_at
            .as_deref()
            .map(super::model::parse_db_timestamp),
        messages_fetched: db.messages_fetched,
        status,
        error_message: db.error_message,
        sync_kind,
    }
}

#[async_trait]
impl HistoryStore for BackupRepository {
    async fn load_group(&self, group_id: &str) -> Result<Option<GroupProfile>> {
        self.load_group_impl(group_id)
    }

    /// Insert or refresh the group row. The checkpoint columns are never
    /// touched here; only `persist_batch` and `reset_checkpoint` move them.
    async fn insert_group(&self, group: &GroupProfile) -> Result<()> {
        let group_db = GroupDB::from(group);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(groups::table)
                    .values(&group_db)
                    .on_conflict(groups::id)
                    .do_update()
                    .set((
                        groups::name.eq(&group_db.name),
                        groups::description.eq(&group_db.description),
                        groups::image_url.eq(&group_db.image_url),
                        groups::creator_user_id.eq(&group_db.creator_user_id),
                        groups::updated_at.eq(&group_db.updated_at),
                        groups::group_type.eq(&group_db.group_type),
                        groups::share_url.eq(&group_db.share_url),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    /// Persist one batch and advance the checkpoint, atomically.
    ///
    /// The checkpoint moves to the last record of the batch regardless of how
    /// many records were duplicates; by the time the transaction commits every
    /// record at or before it is durably stored.
    async fn persist_batch(&self, group_id: &str, records: &[MessageRecord]) -> Result<BatchReport> {
        if records.is_empty() {
            return Ok(BatchReport::default());
        }

        let group_id = group_id.to_string();
        let records = records.to_vec();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<BatchReport> {
                let mut report = BatchReport::default();
                for record in &records {
                    if upsert_record(conn, &group_id, record)? {
                        report.inserted += 1;
                    } else {
                        report.skipped += 1;
                    }
                }

                // Safe: the batch is non-empty.
                let checkpoint_id = records[records.len() - 1].id.clone();
                diesel::update(groups::table.find(&group_id))
                    .set((
                        groups::last_synced_message_id.eq(&checkpoint_id),
                        groups::last_synced_at.eq(to_db_timestamp(&Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                debug!(
                    "Committed batch for group {}: {} inserted, {} skipped, checkpoint {}",
                    group_id, report.inserted, report.skipped, checkpoint_id
                );
                Ok(report)
            })
            .await
    }

    async fn reset_checkpoint(&self, group_id: &str) -> Result<()> {
        let group_id = group_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(groups::table.find(&group_id))
                    .set((
                        groups::last_synced_message_id.eq(None::<String>),
                        groups::last_synced_at.eq(None::<String>),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn append_sync_log(&self, entry: SyncLogEntry) -> Result<()> {
        let log_db = NewSyncLogDB::from(entry);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(sync_logs::table)
                    .values(&log_db)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
