use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::*;

pub mod postgres;
pub use postgres::PostgresStorage;

/// Terminal update applied to a task by the callback processor
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub provider_task_id: String,
    pub status: TaskStatus,
    pub metadata: TaskMetadata,
    pub result_payload: Option<serde_json::Value>,
    pub cost: f64,
    pub completed_at: DateTime<Utc>,
    pub error_detail: Option<String>,
}

/// Storage trait for trend discovery data
#[async_trait]
pub trait Storage: Send + Sync {
    // Runs
    async fn create_run(&self, run: &Run) -> Result<()>;
    async fn get_run(&self, id: RunId) -> Result<Option<Run>>;
    async fn update_run_status(&self, id: RunId, status: RunStatus) -> Result<()>;
    /// Additive top-level merge into the run's metadata JSON.
    async fn merge_run_metadata(&self, id: RunId, patch: &serde_json::Value) -> Result<()>;

    // Tasks
    async fn save_task(&self, task: &Task) -> Result<()>;
    async fn get_task(&self, provider_task_id: &str) -> Result<Option<Task>>;
    /// Apply the terminal transition. Returns false when the task was
    /// already terminal, so duplicate callbacks can be rejected.
    async fn complete_task(&self, completion: &TaskCompletion) -> Result<bool>;
    async fn run_status_counts(&self, run_id: RunId) -> Result<StatusCounts>;
    async fn run_cost_total(&self, run_id: RunId) -> Result<f64>;

    // Keyword records
    async fn get_keyword_record(
        &self,
        keyword: &str,
        locale: &str,
        timeframe: &str,
    ) -> Result<Option<KeywordRecord>>;
    /// Upsert keyed on (keyword, locale, timeframe). first_seen only ever
    /// moves earlier, last_seen only later.
    async fn upsert_keyword_record(&self, record: &KeywordRecord) -> Result<()>;
}
