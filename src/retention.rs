//! Retention sweeps over time-ordered partitions.
//!
//! Bounds durable growth by deleting records older than a horizon. The
//! sweep carries no scheduling of its own: the session lifecycle (app
//! startup, a timer in the host) decides when to call it. Concurrent
//! readers are safe because only records already past their horizon are
//! removed.

use chrono::Utc;
use tracing::info;

use crate::error::StoreResult;
use crate::models::Partition;
use crate::store::StoreManager;

pub const DEFAULT_HISTORY_HORIZON_DAYS: u32 = 30;

const MS_PER_DAY: i64 = 86_400_000;

/// Delete every record in `partition` whose time index is at least
/// `horizon_days` old. Returns the number of records removed.
pub async fn sweep(
    store: &StoreManager,
    partition: Partition,
    horizon_days: u32,
) -> StoreResult<u64> {
    let cutoff = Utc::now().timestamp_millis() - i64::from(horizon_days) * MS_PER_DAY;
    let removed = store.sweep_older_than(partition, cutoff).await?;
    if removed > 0 {
        info!(partition = %partition, horizon_days, removed, "retention sweep complete");
    }
    Ok(removed)
}

/// Sweep the history partition, the default retention target.
pub async fn sweep_history(store: &StoreManager, horizon_days: u32) -> StoreResult<u64> {
    sweep(store, Partition::History, horizon_days).await
}
