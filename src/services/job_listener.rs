//! Wakes a serving pool when any process queues a job
//!
//! The Postgres store issues `pg_notify` on every insert. Polling stays the
//! fallback, so a lost connection only delays pickup until the next poll.

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::queries::import_job::JOBS_QUEUED_CHANNEL;
use crate::services::worker_pool::PoolHandle;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Kick `pool` on every queued-job notification until `cancel` fires
pub async fn listen_for_jobs(db: PgPool, pool: PoolHandle, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        match listen(&db, &pool, &cancel).await {
            Ok(()) => break,
            Err(e) => warn!("Job listener failed, reconnecting in {:?}: {}", RECONNECT_DELAY, e),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
    debug!("Job listener stopped");
}

async fn listen(db: &PgPool, pool: &PoolHandle, cancel: &CancellationToken) -> Result<()> {
    let mut listener = PgListener::connect_with(db).await?;
    listener.listen(JOBS_QUEUED_CHANNEL).await?;
    info!("Listening for queued jobs on '{}'", JOBS_QUEUED_CHANNEL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            notification = listener.recv() => {
                let notification = notification?;
                debug!("Job {} queued", notification.payload());
                pool.kick();
            }
        }
    }
}
