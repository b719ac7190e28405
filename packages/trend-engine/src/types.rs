use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a keyword record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordRecordId(pub Uuid);

impl KeywordRecordId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for KeywordRecordId {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate status of a run, derived from its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    RunningWithErrors,
    Completed,
    CompletedWithErrors,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::RunningWithErrors => "running_with_errors",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed_with_errors",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running_with_errors" => RunStatus::RunningWithErrors,
            "completed" => RunStatus::Completed,
            "completed_with_errors" => RunStatus::CompletedWithErrors,
            _ => RunStatus::Running,
        }
    }
}

/// What kicked off a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Schedule,
    NewsScan,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Schedule => "schedule",
            TriggerSource::NewsScan => "news_scan",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "schedule" => TriggerSource::Schedule,
            "news_scan" => TriggerSource::NewsScan,
            _ => TriggerSource::Manual,
        }
    }
}

/// One discovery sweep across seed keywords, markets, and timeframes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub trigger: TriggerSource,
    pub seed_keywords: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(trigger: TriggerSource, seed_keywords: Vec<String>, metadata: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            status: RunStatus::Running,
            trigger,
            seed_keywords,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Task lifecycle: queued at posting, then exactly one terminal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => TaskStatus::Completed,
            "error" => TaskStatus::Error,
            _ => TaskStatus::Queued,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Queued)
    }
}

/// Where a task's keyword came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Seeded directly from a root keyword list
    Root,
    /// Spawned from a rising entry in another task's result
    Rising,
}

/// Discovery lineage carried by every task. Round-trips through the
/// provider's opaque tag, so the fields are a closed, serialized contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub source: TaskSource,
    pub root_keyword: String,
    #[serde(default)]
    pub root_task_id: Option<String>,
    #[serde(default)]
    pub parent_keyword: Option<String>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    pub depth: u32,
    pub locale: String,
    pub location_code: u32,
    pub language_code: String,
    pub timeframe: String,
    /// Demand assessment attached at expansion time, if the classifier ran.
    #[serde(default)]
    pub demand: Option<DemandAssessment>,
}

impl TaskMetadata {
    /// Metadata for a depth-0 seed task.
    pub fn root(
        keyword: &str,
        locale: &str,
        location_code: u32,
        language_code: &str,
        timeframe: &str,
    ) -> Self {
        Self {
            source: TaskSource::Root,
            root_keyword: keyword.to_string(),
            root_task_id: None,
            parent_keyword: None,
            parent_task_id: None,
            depth: 0,
            locale: locale.to_string(),
            location_code,
            language_code: language_code.to_string(),
            timeframe: timeframe.to_string(),
            demand: None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.source, TaskSource::Root)
    }
}

/// One posted query for one (keyword, locale, timeframe) triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Provider-assigned id; primary key.
    pub provider_task_id: String,
    pub run_id: RunId,
    pub keyword: String,
    pub locale: String,
    pub timeframe: String,
    pub location_code: u32,
    pub language_code: String,
    pub status: TaskStatus,
    pub metadata: TaskMetadata,
    pub request_payload: serde_json::Value,
    pub result_payload: Option<serde_json::Value>,
    pub cost: f64,
    pub posted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
}

/// Two-tier urgency bucket for the dashboard consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpikePriority {
    #[serde(rename = "24h")]
    Hot,
    #[serde(rename = "72h")]
    Watch,
}

impl SpikePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpikePriority::Hot => "24h",
            SpikePriority::Watch => "72h",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "24h" => SpikePriority::Hot,
            _ => SpikePriority::Watch,
        }
    }
}

/// Detected spike state for a (keyword, locale, timeframe), unique on that triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub id: KeywordRecordId,
    pub keyword: String,
    pub locale: String,
    pub timeframe: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub spike_score: f64,
    pub priority: SpikePriority,
    pub demand_summary: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One point of an interest time series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A candidate keyword surfaced inside another keyword's result. Ephemeral;
/// consumed immediately by the expansion controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RisingEntry {
    pub keyword: String,
    pub value: f64,
}

/// Label from the external demand classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLabel {
    Tool,
    NonTool,
    Unclear,
}

/// Classifier verdict for one keyword
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandAssessment {
    pub label: DemandLabel,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DemandAssessment {
    pub fn unclear(reason: impl Into<String>) -> Self {
        Self {
            label: DemandLabel::Unclear,
            confidence: None,
            summary: None,
            reason: Some(reason.into()),
        }
    }
}

/// Task-status counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: i64,
    pub completed: i64,
    pub queued: i64,
    pub error: i64,
}

/// Normalize a keyword for matching and deduplication
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}
