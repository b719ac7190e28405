use std::collections::HashMap;

use chrono::Utc;
use dataforseo_client::{CallbackPayload, TaskResult};

use crate::aggregator::refresh_run;
use crate::classifier::DemandClassifier;
use crate::config::{DiscoveryConfig, SpikeConfig};
use crate::expansion::{handle_completed_task, ExpansionStats};
use crate::poster::TrendsProvider;
use crate::storage::{Storage, TaskCompletion};
use crate::types::*;

/// Outcome of one callback batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub processed: usize,
    pub errors: usize,
    pub runs_updated: usize,
}

/// Processes provider postbacks: applies each task's terminal transition,
/// then triggers detection/expansion once per successfully completed task
/// and refreshes every touched run.
pub struct CallbackProcessor<S, P, C> {
    storage: S,
    provider: P,
    classifier: C,
    spike: SpikeConfig,
    discovery: DiscoveryConfig,
    postback_url: String,
}

impl<S, P, C> CallbackProcessor<S, P, C>
where
    S: Storage,
    P: TrendsProvider,
    C: DemandClassifier,
{
    pub fn new(
        storage: S,
        provider: P,
        classifier: C,
        spike: SpikeConfig,
        discovery: DiscoveryConfig,
        postback_url: String,
    ) -> Self {
        Self {
            storage,
            provider,
            classifier,
            spike,
            discovery,
            postback_url,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    pub fn postback_url(&self) -> &str {
        &self.postback_url
    }

    /// Process one delivered callback batch. Best-effort per task: a
    /// failure on one task is logged and counted, the rest of the batch
    /// still runs.
    pub async fn process(&self, payload: &CallbackPayload) -> CallbackOutcome {
        let now = Utc::now();
        let mut outcome = CallbackOutcome::default();
        let mut touched: HashMap<RunId, ExpansionStats> = HashMap::new();

        for task_result in &payload.tasks {
            match self.process_task(task_result, &mut touched).await {
                Ok(true) => outcome.processed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        task_id = %task_result.id,
                        error = %e,
                        "Failed to process callback task"
                    );
                    outcome.errors += 1;
                }
            }
        }

        // Aggregate once per touched run, after the whole batch, so the
        // derived status never reads a half-applied batch.
        for (run_id, stats) in &touched {
            match refresh_run(&self.storage, *run_id, stats, now).await {
                Ok(()) => outcome.runs_updated += 1,
                Err(e) => {
                    tracing::error!(run_id = %run_id.0, error = %e, "Failed to refresh run");
                    outcome.errors += 1;
                }
            }
        }

        tracing::info!(
            delivered = payload.tasks.len(),
            processed = outcome.processed,
            errors = outcome.errors,
            runs_updated = outcome.runs_updated,
            "Processed callback batch"
        );

        outcome
    }

    /// Handle one task result. Returns Ok(true) when the terminal
    /// transition was applied, Ok(false) when the delivery was skipped
    /// (unknown task or duplicate callback).
    async fn process_task(
        &self,
        task_result: &TaskResult,
        touched: &mut HashMap<RunId, ExpansionStats>,
    ) -> anyhow::Result<bool> {
        let Some(task) = self.storage.get_task(&task_result.id).await? else {
            // Expected under retention: the provider may call back for
            // tasks we have already pruned.
            tracing::info!(task_id = %task_result.id, "Callback for unknown task; skipping");
            return Ok(false);
        };

        let success = task_result.is_success();

        // The inline tag is authoritative at submission time and immune to
        // storage drift; the persisted copy is the fallback.
        let metadata = task_result
            .tag
            .as_deref()
            .and_then(|tag| serde_json::from_str::<TaskMetadata>(tag).ok())
            .unwrap_or_else(|| task.metadata.clone());

        let completion = TaskCompletion {
            provider_task_id: task_result.id.clone(),
            status: if success {
                TaskStatus::Completed
            } else {
                TaskStatus::Error
            },
            metadata: metadata.clone(),
            result_payload: task_result
                .result
                .as_ref()
                .and_then(|r| serde_json::to_value(r).ok()),
            cost: task_result.cost.unwrap_or(0.0),
            completed_at: Utc::now(),
            error_detail: if success {
                None
            } else {
                Some(task_result.status_message.clone().unwrap_or_else(|| {
                    format!("provider status {}", task_result.status_code)
                }))
            },
        };

        if !self.storage.complete_task(&completion).await? {
            tracing::warn!(
                task_id = %task_result.id,
                "Duplicate callback for terminal task; skipping"
            );
            return Ok(false);
        }

        // Every state change touches the task's run, success or not.
        let entry = touched.entry(task.run_id).or_default();

        if success {
            let result = task_result.result.as_ref().and_then(|r| r.first());
            let stats = handle_completed_task(
                &task,
                &metadata,
                result,
                &self.storage,
                &self.provider,
                &self.classifier,
                &self.spike,
                &self.discovery,
                &self.postback_url,
                Utc::now(),
            )
            .await;
            entry.merge(&stats);
        }

        Ok(true)
    }
}
