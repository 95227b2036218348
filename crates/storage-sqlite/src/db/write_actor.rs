//! Single-writer actor.
//!
//! SQLite allows one writer at a time; funneling every mutation through one
//! dedicated thread removes lock contention and gives each job a full
//! immediate transaction.

use diesel::prelude::*;
use diesel::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use groupvault_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

use super::DbPool;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Distinguishes transaction machinery failures from errors the job itself
/// produced, so the latter pass through unchanged.
enum WriteError {
    Tx(diesel::result::Error),
    App(Error),
}

impl From<diesel::result::Error> for WriteError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Tx(err)
    }
}

/// Cloneable handle submitting jobs to the writer thread.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Run `job` inside an immediate transaction on the writer thread and
    /// await its result.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move |conn| {
            let result = conn
                .immediate_transaction::<_, WriteError, _>(|tx| job(tx).map_err(WriteError::App))
                .map_err(|err| match err {
                    WriteError::Tx(e) => Error::from(StorageError::Query(e)),
                    WriteError::App(e) => e,
                });
            let _ = reply_tx.send(result);
        });

        self.tx.send(wrapped).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer has shut down".to_string(),
            ))
        })?;
        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer dropped the job".to_string(),
            ))
        })?
    }
}

/// Spawn the writer thread. It holds one pooled connection for its lifetime
/// and processes jobs in submission order.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    std::thread::spawn(move || {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                error!("Writer could not acquire a connection: {}", err);
                return;
            }
        };
        while let Some(job) = rx.blocking_recv() {
            job(&mut conn);
        }
    });

    WriteHandle { tx }
}
