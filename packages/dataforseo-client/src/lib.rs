//! Pure DataForSEO REST API client.
//!
//! A minimal client for the DataForSEO v3 API, covering the Google Trends
//! "explore" endpoints used by the trend engine: batch task submission with
//! postback delivery, plus on-demand task retrieval.
//!
//! # Example
//!
//! ```rust,ignore
//! use dataforseo_client::{DataForSeoClient, TrendsTaskSpec};
//!
//! let client = DataForSeoClient::new("login".into(), "password".into());
//!
//! let acks = client.post_trends_tasks(&[TrendsTaskSpec {
//!     keywords: vec!["agent crm".into()],
//!     location_code: 2840,
//!     language_code: "en".into(),
//!     time_range: Some("past_7_days".into()),
//!     date_from: None,
//!     date_to: None,
//!     postback_url: Some("https://example.com/api/callbacks/dataforseo".into()),
//!     postback_data: Some("regular".into()),
//!     tag: None,
//! }]).await?;
//! ```

pub mod error;
pub mod types;

pub use error::{DataForSeoError, Result};
pub use types::{
    ApiEnvelope, CallbackPayload, GraphPoint, MapPoint, QueryEntry, ResultItem, TaskEnvelope,
    TaskResult, TopicEntry, TrendsResult, TrendsTaskSpec, ERROR_STATUS_THRESHOLD,
};

use std::time::Duration;

const BASE_URL: &str = "https://api.dataforseo.com/v3";

/// Endpoint path for Google Trends explore task submission.
const TRENDS_TASK_POST: &str = "keywords_data/google_trends/explore/task_post";

/// Endpoint path for fetching a finished task by id.
const TRENDS_TASK_GET: &str = "keywords_data/google_trends/explore/task_get";

pub struct DataForSeoClient {
    client: reqwest::Client,
    login: String,
    password: String,
}

impl DataForSeoClient {
    pub fn new(login: String, password: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            login,
            password,
        }
    }

    /// Submit a batch of explore tasks. The provider caps one call at 100
    /// specs; callers are expected to chunk before invoking this.
    ///
    /// Returns one acknowledgement per submitted spec, in order. Per-item
    /// provider errors are reported through each item's `status_code`, not
    /// as a transport error.
    pub async fn post_trends_tasks(&self, specs: &[TrendsTaskSpec]) -> Result<Vec<TaskEnvelope>> {
        let url = format!("{BASE_URL}/{TRENDS_TASK_POST}");
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.login, Some(&self.password))
            .json(specs)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DataForSeoError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: ApiEnvelope = resp.json().await?;
        tracing::debug!(
            submitted = specs.len(),
            acknowledged = envelope.tasks.len(),
            status_code = envelope.status_code,
            "Posted trends task batch"
        );
        Ok(envelope.tasks)
    }

    /// Fetch one finished task by provider id. Used operationally to
    /// re-pull a result when a postback was lost.
    pub async fn get_trends_task(&self, task_id: &str) -> Result<TaskResult> {
        let url = format!("{BASE_URL}/{TRENDS_TASK_GET}/{task_id}");
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.login, Some(&self.password))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DataForSeoError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: serde_json::Value = resp.json().await?;
        task_from_get_envelope(envelope)
    }
}

/// Pull the single task out of a task_get response envelope.
fn task_from_get_envelope(envelope: serde_json::Value) -> Result<TaskResult> {
    let task = envelope
        .get("tasks")
        .and_then(|t| t.get(0))
        .cloned()
        .ok_or(DataForSeoError::MissingTaskId)?;
    Ok(serde_json::from_value(task)?)
}
