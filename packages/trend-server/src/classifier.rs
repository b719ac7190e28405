use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use trend_engine::{ClassifyRequest, DemandAssessment, DemandClassifier, DemandLabel};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You judge whether a search keyword reflects demand for a \
software tool. Reply with strict JSON: {\"label\": \"tool\"|\"non_tool\"|\"unclear\", \
\"confidence\": 0.0-1.0, \"summary\": \"one sentence\", \"reason\": \"short\"}. \
Label \"tool\" only when people searching this term are looking for software to use.";

/// Demand classifier backed by the OpenAI chat completions API.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

#[derive(Deserialize)]
struct Verdict {
    label: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn user_prompt(request: &ClassifyRequest) -> String {
    let mut prompt = format!(
        "Keyword: {}\nLocale: {}\nTimeframe: {}",
        request.keyword, request.locale, request.timeframe
    );
    if let Some(root) = &request.root_keyword {
        prompt.push_str(&format!("\nDiscovered under root keyword: {root}"));
    }
    if let Some(parent) = &request.parent_keyword {
        prompt.push_str(&format!("\nParent keyword: {parent}"));
    }
    if let Some(score) = request.spike_score {
        prompt.push_str(&format!("\nSpike score: {score}"));
    }
    if let Some(notes) = &request.notes {
        prompt.push_str(&format!("\nNotes: {notes}"));
    }
    prompt
}

#[async_trait]
impl DemandClassifier for OpenAiClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<DemandAssessment> {
        let body = json!({
            "model": MODEL,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)},
            ],
        });

        let resp = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Classifier request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Classifier returned {status}: {body}");
        }

        let chat: ChatResponse = resp.json().await.context("Malformed classifier response")?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();
        let verdict: Verdict =
            serde_json::from_str(content).context("Classifier reply was not valid JSON")?;

        let label = match verdict.label.as_str() {
            "tool" => DemandLabel::Tool,
            "non_tool" => DemandLabel::NonTool,
            _ => DemandLabel::Unclear,
        };

        Ok(DemandAssessment {
            label,
            confidence: verdict.confidence,
            summary: verdict.summary,
            reason: verdict.reason,
        })
    }
}

/// Classifier used when no API key is configured: everything is unclear,
/// so nothing gets silently rejected.
pub struct DisabledClassifier;

#[async_trait]
impl DemandClassifier for DisabledClassifier {
    async fn classify(&self, _request: &ClassifyRequest) -> Result<DemandAssessment> {
        Ok(DemandAssessment::unclear("classifier disabled"))
    }
}

/// Either adapter, selected at startup from configuration.
pub enum ServerClassifier {
    OpenAi(OpenAiClassifier),
    Disabled(DisabledClassifier),
}

#[async_trait]
impl DemandClassifier for ServerClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<DemandAssessment> {
        match self {
            ServerClassifier::OpenAi(c) => c.classify(request).await,
            ServerClassifier::Disabled(c) => c.classify(request).await,
        }
    }
}
