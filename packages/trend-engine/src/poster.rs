use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dataforseo_client::{TaskEnvelope, TrendsTaskSpec, ERROR_STATUS_THRESHOLD};
use serde_json::json;

use crate::config::DiscoveryConfig;
use crate::storage::Storage;
use crate::types::*;

/// Provider batch-submit limit.
pub const MAX_BATCH_SIZE: usize = 100;

/// Trait for the external trends provider (to allow mocking)
#[async_trait]
pub trait TrendsProvider: Send + Sync {
    /// Submit one batch of specs; returns one acknowledgement per spec,
    /// in order. Per-item provider errors surface via status codes.
    async fn post_tasks(&self, specs: &[TrendsTaskSpec]) -> Result<Vec<TaskEnvelope>>;
}

/// One query the engine wants posted
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub keyword: String,
    pub metadata: TaskMetadata,
}

impl TaskRequest {
    pub fn new(keyword: &str, metadata: TaskMetadata) -> Self {
        Self {
            keyword: keyword.to_string(),
            metadata,
        }
    }
}

/// A request that could not be turned into a queued task
#[derive(Debug, Clone)]
pub struct PostError {
    pub keyword: String,
    pub locale: String,
    pub timeframe: String,
    pub message: String,
}

/// What came out of one posting round
#[derive(Debug, Default)]
pub struct PostOutcome {
    /// Tasks persisted in queued state.
    pub posted: Vec<Task>,
    pub errors: Vec<PostError>,
}

fn build_spec(request: &TaskRequest, postback_url: &str) -> TrendsTaskSpec {
    TrendsTaskSpec {
        keywords: vec![request.keyword.clone()],
        location_code: request.metadata.location_code,
        language_code: request.metadata.language_code.clone(),
        time_range: Some(request.metadata.timeframe.clone()),
        date_from: None,
        date_to: None,
        postback_url: Some(postback_url.to_string()),
        postback_data: Some("regular".to_string()),
        tag: serde_json::to_string(&request.metadata).ok(),
    }
}

fn post_error(request: &TaskRequest, message: impl Into<String>) -> PostError {
    PostError {
        keyword: request.keyword.clone(),
        locale: request.metadata.locale.clone(),
        timeframe: request.metadata.timeframe.clone(),
        message: message.into(),
    }
}

/// Post a list of task requests in bounded batches and persist every task
/// record before returning.
///
/// A failed batch records per-request errors but does not abort subsequent
/// batches. A response item without a provider id is an error with nothing
/// to persist; a provider-rejected item (status at/above 40000) is an
/// error whose task is still recorded so operators can see failed
/// submissions.
pub async fn post_tasks(
    run_id: RunId,
    requests: &[TaskRequest],
    provider: &impl TrendsProvider,
    storage: &impl Storage,
    postback_url: &str,
) -> PostOutcome {
    let mut outcome = PostOutcome::default();

    for batch in requests.chunks(MAX_BATCH_SIZE) {
        let specs: Vec<TrendsTaskSpec> = batch
            .iter()
            .map(|r| build_spec(r, postback_url))
            .collect();

        let acks = match provider.post_tasks(&specs).await {
            Ok(acks) => acks,
            Err(e) => {
                tracing::error!(batch_size = batch.len(), error = %e, "Batch submission failed");
                for request in batch {
                    outcome.errors.push(post_error(request, e.to_string()));
                }
                continue;
            }
        };

        for (i, request) in batch.iter().enumerate() {
            let Some(ack) = acks.get(i) else {
                outcome.errors.push(post_error(request, "Missing task id"));
                continue;
            };
            let Some(task_id) = ack.id.clone() else {
                outcome.errors.push(post_error(request, "Missing task id"));
                continue;
            };

            let rejected = ack.status_code >= ERROR_STATUS_THRESHOLD;
            let task = Task {
                provider_task_id: task_id.clone(),
                run_id,
                keyword: request.keyword.clone(),
                locale: request.metadata.locale.clone(),
                timeframe: request.metadata.timeframe.clone(),
                location_code: request.metadata.location_code,
                language_code: request.metadata.language_code.clone(),
                status: if rejected {
                    TaskStatus::Error
                } else {
                    TaskStatus::Queued
                },
                metadata: request.metadata.clone(),
                request_payload: serde_json::to_value(&specs[i]).unwrap_or(json!({})),
                result_payload: None,
                cost: ack.cost.unwrap_or(0.0),
                posted_at: Utc::now(),
                completed_at: None,
                error_detail: if rejected {
                    Some(
                        ack.status_message
                            .clone()
                            .unwrap_or_else(|| format!("provider status {}", ack.status_code)),
                    )
                } else {
                    None
                },
            };

            if let Err(e) = storage.save_task(&task).await {
                tracing::error!(task_id = %task_id, error = %e, "Failed to persist posted task");
                outcome.errors.push(post_error(request, e.to_string()));
                continue;
            }

            if rejected {
                tracing::warn!(
                    task_id = %task_id,
                    keyword = %request.keyword,
                    status_code = ack.status_code,
                    "Provider rejected task; recorded with error status"
                );
                outcome
                    .errors
                    .push(post_error(request, format!("provider status {}", ack.status_code)));
            } else {
                tracing::debug!(
                    task_id = %task_id,
                    keyword = %request.keyword,
                    depth = request.metadata.depth,
                    "Queued trends task"
                );
                outcome.posted.push(task);
            }
        }
    }

    outcome
}

/// Seed a new discovery run: one task per (keyword, market, timeframe).
pub async fn seed_run(
    keywords: &[String],
    trigger: TriggerSource,
    provider: &impl TrendsProvider,
    storage: &impl Storage,
    discovery: &DiscoveryConfig,
    postback_url: &str,
) -> Result<(Run, PostOutcome)> {
    let mut seeds: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        if !seeds.iter().any(|s| normalize_keyword(s) == normalize_keyword(keyword)) {
            seeds.push(keyword.to_string());
        }
    }

    let market_list: Vec<&str> = discovery.markets.iter().map(|m| m.locale.as_str()).collect();
    let run = Run::new(
        trigger,
        seeds.clone(),
        json!({
            "markets": market_list,
            "timeframes": discovery.timeframes,
            "seed_count": seeds.len(),
        }),
    );
    storage.create_run(&run).await?;

    let mut requests = Vec::new();
    for keyword in &seeds {
        for market in &discovery.markets {
            for timeframe in &discovery.timeframes {
                requests.push(TaskRequest::new(
                    keyword,
                    TaskMetadata::root(
                        keyword,
                        &market.locale,
                        market.location_code,
                        &market.language_code,
                        timeframe,
                    ),
                ));
            }
        }
    }

    let outcome = post_tasks(run.id, &requests, provider, storage, postback_url).await;

    tracing::info!(
        run_id = %run.id.0,
        seeds = seeds.len(),
        posted = outcome.posted.len(),
        errors = outcome.errors.len(),
        "Seeded discovery run"
    );

    storage
        .merge_run_metadata(
            run.id,
            &json!({
                "tasks_posted": outcome.posted.len(),
                "post_errors": outcome.errors.len(),
            }),
        )
        .await?;

    Ok((run, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, MockStorage};

    fn request(keyword: &str) -> TaskRequest {
        TaskRequest::new(
            keyword,
            TaskMetadata::root(keyword, "US", 2840, "en", "past_7_days"),
        )
    }

    #[tokio::test]
    async fn posts_and_persists_tasks() {
        let storage = MockStorage::new();
        let provider = MockProvider::new();
        let run_id = RunId::new();

        let outcome = post_tasks(
            run_id,
            &[request("agent crm"), request("ai notetaker")],
            &provider,
            &storage,
            "https://example.com/cb",
        )
        .await;

        assert_eq!(outcome.posted.len(), 2);
        assert!(outcome.errors.is_empty());
        let task = storage.task("task-0").unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.run_id, run_id);

        // tag round-trips the metadata
        let specs = provider.posted_specs();
        let tag: TaskMetadata = serde_json::from_str(specs[0].tag.as_ref().unwrap()).unwrap();
        assert_eq!(tag.depth, 0);
        assert!(tag.is_root());
    }

    #[tokio::test]
    async fn chunks_batches_at_provider_limit() {
        let storage = MockStorage::new();
        let provider = MockProvider::new();
        let requests: Vec<TaskRequest> =
            (0..250).map(|i| request(&format!("kw {i}"))).collect();

        let outcome = post_tasks(RunId::new(), &requests, &provider, &storage, "https://cb").await;

        assert_eq!(outcome.posted.len(), 250);
        // mock records per-spec, so verify the count survived chunking
        assert_eq!(provider.posted_specs().len(), 250);
    }

    #[tokio::test]
    async fn missing_task_id_is_reported_and_not_persisted() {
        let storage = MockStorage::new();
        let mut provider = MockProvider::new();
        provider.drop_ids_at = vec![1];

        let outcome = post_tasks(
            RunId::new(),
            &[request("a"), request("b")],
            &provider,
            &storage,
            "https://cb",
        )
        .await;

        assert_eq!(outcome.posted.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].message, "Missing task id");
        assert_eq!(outcome.errors[0].keyword, "b");
        assert_eq!(storage.tasks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn provider_rejection_is_error_but_task_is_recorded() {
        let storage = MockStorage::new();
        let mut provider = MockProvider::new();
        provider.error_status_at = vec![0];

        let outcome = post_tasks(
            RunId::new(),
            &[request("agent crm")],
            &provider,
            &storage,
            "https://cb",
        )
        .await;

        assert!(outcome.posted.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        let task = storage.task("task-0").unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.error_detail.is_some());
    }

    #[tokio::test]
    async fn failed_batch_does_not_abort_later_batches() {
        let storage = MockStorage::new();
        let mut provider = MockProvider::new();
        provider.fail_on_calls = vec![0];
        let requests: Vec<TaskRequest> =
            (0..150).map(|i| request(&format!("kw {i}"))).collect();

        let outcome = post_tasks(RunId::new(), &requests, &provider, &storage, "https://cb").await;

        // first batch of 100 fails wholesale, second batch of 50 posts
        assert_eq!(outcome.errors.len(), 100);
        assert_eq!(outcome.posted.len(), 50);
    }

    #[tokio::test]
    async fn seed_run_builds_cross_product_and_dedupes_seeds() {
        let storage = MockStorage::new();
        let provider = MockProvider::new();
        let discovery = DiscoveryConfig::default()
            .with_markets(vec![
                crate::config::Market::new("US", 2840, "en"),
                crate::config::Market::new("GB", 2826, "en"),
            ])
            .with_timeframes(vec!["past_7_days".into(), "past_30_days".into()]);

        let (run, outcome) = seed_run(
            &["Agent CRM".into(), "agent crm ".into(), "ai notetaker".into()],
            TriggerSource::Manual,
            &provider,
            &storage,
            &discovery,
            "https://cb",
        )
        .await
        .unwrap();

        // 2 unique seeds x 2 markets x 2 timeframes
        assert_eq!(outcome.posted.len(), 8);
        let stored = storage.runs.lock().unwrap().get(&run.id).cloned().unwrap();
        assert_eq!(stored.seed_keywords.len(), 2);
        assert_eq!(stored.metadata["tasks_posted"], 8);
    }
}
