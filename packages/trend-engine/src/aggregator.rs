use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::expansion::ExpansionStats;
use crate::storage::Storage;
use crate::types::{RunId, RunStatus, StatusCounts};

/// Derive a run's status from its task-status counts.
pub fn derive_run_status(counts: &StatusCounts) -> RunStatus {
    match (counts.queued > 0, counts.error > 0) {
        (true, false) => RunStatus::Running,
        (true, true) => RunStatus::RunningWithErrors,
        (false, false) => RunStatus::Completed,
        (false, true) => RunStatus::CompletedWithErrors,
    }
}

/// Recompute one run's aggregate state from its current task set.
///
/// A pure reduction over the tasks, safe to re-run: counts and cost come
/// straight from storage, and the metadata merge is additive.
pub async fn refresh_run(
    storage: &impl Storage,
    run_id: RunId,
    stats: &ExpansionStats,
    now: DateTime<Utc>,
) -> Result<()> {
    let counts = storage.run_status_counts(run_id).await?;
    let cost = storage.run_cost_total(run_id).await?;
    let status = derive_run_status(&counts);

    storage.update_run_status(run_id, status).await?;
    storage
        .merge_run_metadata(
            run_id,
            &json!({
                "task_counts": counts,
                "total_cost": cost,
                "last_callback_at": now,
                "expansion": {
                    "children_queued": stats.children_queued,
                    "keywords_detected": stats.keywords_detected,
                },
            }),
        )
        .await?;

    tracing::debug!(
        run_id = %run_id.0,
        status = status.as_str(),
        total = counts.total,
        queued = counts.queued,
        error = counts.error,
        cost,
        "Refreshed run aggregate"
    );

    Ok(())
}
