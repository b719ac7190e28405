//! In-memory fakes shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use dataforseo_client::{TaskEnvelope, TrendsTaskSpec};

use crate::classifier::{ClassifyRequest, DemandClassifier};
use crate::poster::TrendsProvider;
use crate::storage::{Storage, TaskCompletion};
use crate::types::*;

#[derive(Default)]
pub struct MockStorage {
    pub runs: Mutex<HashMap<RunId, Run>>,
    pub tasks: Mutex<HashMap<String, Task>>,
    pub records: Mutex<HashMap<(String, String, String), KeywordRecord>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self, provider_task_id: &str) -> Option<Task> {
        self.tasks.lock().unwrap().get(provider_task_id).cloned()
    }

    pub fn record(&self, keyword: &str, locale: &str, timeframe: &str) -> Option<KeywordRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(keyword.to_string(), locale.to_string(), timeframe.to_string()))
            .cloned()
    }

    pub fn insert_task(&self, task: Task) {
        self.tasks
            .lock()
            .unwrap()
            .insert(task.provider_task_id.clone(), task);
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn create_run(&self, run: &Run) -> Result<()> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: RunId) -> Result<Option<Run>> {
        Ok(self.runs.lock().unwrap().get(&id).cloned())
    }

    async fn update_run_status(&self, id: RunId, status: RunStatus) -> Result<()> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&id) {
            run.status = status;
        }
        Ok(())
    }

    async fn merge_run_metadata(&self, id: RunId, patch: &serde_json::Value) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs.get_mut(&id) {
            if let (Some(base), Some(add)) = (run.metadata.as_object_mut(), patch.as_object()) {
                for (k, v) in add {
                    base.insert(k.clone(), v.clone());
                }
            } else {
                run.metadata = patch.clone();
            }
        }
        Ok(())
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        tasks
            .entry(task.provider_task_id.clone())
            .or_insert_with(|| task.clone());
        Ok(())
    }

    async fn get_task(&self, provider_task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.lock().unwrap().get(provider_task_id).cloned())
    }

    async fn complete_task(&self, completion: &TaskCompletion) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.get_mut(&completion.provider_task_id) else {
            return Ok(false);
        };
        if task.status.is_terminal() {
            return Ok(false);
        }
        task.status = completion.status;
        task.metadata = completion.metadata.clone();
        task.result_payload = completion.result_payload.clone();
        task.cost = completion.cost;
        task.completed_at = Some(completion.completed_at);
        task.error_detail = completion.error_detail.clone();
        Ok(true)
    }

    async fn run_status_counts(&self, run_id: RunId) -> Result<StatusCounts> {
        let tasks = self.tasks.lock().unwrap();
        let mut counts = StatusCounts::default();
        for task in tasks.values().filter(|t| t.run_id == run_id) {
            counts.total += 1;
            match task.status {
                TaskStatus::Queued => counts.queued += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Error => counts.error += 1,
            }
        }
        Ok(counts)
    }

    async fn run_cost_total(&self, run_id: RunId) -> Result<f64> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .filter(|t| t.run_id == run_id)
            .map(|t| t.cost)
            .sum())
    }

    async fn get_keyword_record(
        &self,
        keyword: &str,
        locale: &str,
        timeframe: &str,
    ) -> Result<Option<KeywordRecord>> {
        Ok(self.record(keyword, locale, timeframe))
    }

    async fn upsert_keyword_record(&self, record: &KeywordRecord) -> Result<()> {
        let key = (
            record.keyword.clone(),
            record.locale.clone(),
            record.timeframe.clone(),
        );
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&key) {
            Some(existing) => {
                existing.first_seen = existing.first_seen.min(record.first_seen);
                existing.last_seen = existing.last_seen.max(record.last_seen);
                existing.spike_score = record.spike_score;
                existing.priority = record.priority;
                if record.demand_summary.is_some() {
                    existing.demand_summary = record.demand_summary.clone();
                }
                existing.metadata = record.metadata.clone();
            }
            None => {
                records.insert(key, record.clone());
            }
        }
        Ok(())
    }
}

/// Provider fake that assigns sequential task ids and records every spec
/// it was asked to post.
pub struct MockProvider {
    pub counter: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub posted: Mutex<Vec<TrendsTaskSpec>>,
    /// Batch call indexes (0-based) that fail wholesale.
    pub fail_on_calls: Vec<usize>,
    /// Ids (0-based, across all calls) that come back without a task id.
    pub drop_ids_at: Vec<usize>,
    /// Ids that come back with a provider error status.
    pub error_status_at: Vec<usize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            fail_on_calls: Vec::new(),
            drop_ids_at: Vec::new(),
            error_status_at: Vec::new(),
        }
    }

    pub fn posted_specs(&self) -> Vec<TrendsTaskSpec> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrendsProvider for MockProvider {
    async fn post_tasks(&self, specs: &[TrendsTaskSpec]) -> Result<Vec<TaskEnvelope>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_calls.contains(&call) {
            anyhow::bail!("simulated batch failure");
        }

        let mut acks = Vec::new();
        for spec in specs {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            self.posted.lock().unwrap().push(spec.clone());
            let id = if self.drop_ids_at.contains(&n) {
                None
            } else {
                Some(format!("task-{n}"))
            };
            let status_code = if self.error_status_at.contains(&n) {
                40501
            } else {
                20100
            };
            acks.push(TaskEnvelope {
                id,
                status_code,
                status_message: None,
                cost: Some(0.0009),
            });
        }
        Ok(acks)
    }
}

/// Classifier fake returning a fixed label.
pub struct MockClassifier {
    pub label: DemandLabel,
    pub calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn tool() -> Self {
        Self {
            label: DemandLabel::Tool,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn non_tool() -> Self {
        Self {
            label: DemandLabel::NonTool,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DemandClassifier for MockClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<DemandAssessment> {
        self.calls.lock().unwrap().push(request.keyword.clone());
        Ok(DemandAssessment {
            label: self.label,
            confidence: Some(0.8),
            summary: Some(format!("summary for {}", request.keyword)),
            reason: None,
        })
    }
}
