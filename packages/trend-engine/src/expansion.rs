//! Keyword detection and recursive fan-out for completed tasks.
//!
//! Expansion is a depth-bounded, gated breadth-first walk driven by the
//! provider: the frontier at depth d is exactly the set of tasks posted
//! from depth d-1 callbacks, and depth is monotonically increasing and
//! capped, so the walk terminates.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use dataforseo_client::TrendsResult;
use serde_json::json;

use crate::analyzer::{analyze_spike, has_decayed};
use crate::classifier::{classify_or_unclear, ClassifyRequest, DemandClassifier};
use crate::config::{DiscoveryConfig, SpikeConfig};
use crate::extractor::{extract_rising, extract_series, extract_top_market};
use crate::poster::{post_tasks, TaskRequest, TrendsProvider};
use crate::storage::Storage;
use crate::types::*;

/// Per-run statistics accumulated while processing callbacks
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpansionStats {
    pub children_queued: usize,
    pub keywords_detected: usize,
}

impl ExpansionStats {
    pub fn merge(&mut self, other: &ExpansionStats) {
        self.children_queued += other.children_queued;
        self.keywords_detected += other.keywords_detected;
    }
}

/// Run detection and expansion for one successfully completed task.
///
/// Best-effort: internal failures are logged and shrink the outcome, they
/// never propagate.
#[allow(clippy::too_many_arguments)]
pub async fn handle_completed_task(
    task: &Task,
    metadata: &TaskMetadata,
    result: Option<&TrendsResult>,
    storage: &impl Storage,
    provider: &impl TrendsProvider,
    classifier: &impl DemandClassifier,
    spike: &SpikeConfig,
    discovery: &DiscoveryConfig,
    postback_url: &str,
    now: DateTime<Utc>,
) -> ExpansionStats {
    let mut stats = ExpansionStats::default();

    let Some(result) = result else {
        tracing::debug!(task_id = %task.provider_task_id, "Completed task carried no result");
        return stats;
    };

    // Detection applies to rising-derived tasks only; roots are curated
    // seeds, not discoveries.
    if !metadata.is_root() {
        let series = extract_series(result, &task.keyword);
        if detect_keyword(task, metadata, &series, storage, classifier, spike, now).await {
            stats.keywords_detected += 1;
        }
    }

    stats.children_queued = expand_task(
        task, metadata, result, storage, provider, classifier, spike, discovery, postback_url,
        now,
    )
    .await;

    stats
}

/// Spike-detection path: decide whether this task's keyword is a genuine
/// new spike and upsert its record if so. Returns true when a record was
/// written.
async fn detect_keyword(
    task: &Task,
    metadata: &TaskMetadata,
    series: &[SeriesPoint],
    storage: &impl Storage,
    classifier: &impl DemandClassifier,
    spike: &SpikeConfig,
    now: DateTime<Utc>,
) -> bool {
    let analysis = analyze_spike(series, now, spike);
    if !analysis.qualifies {
        tracing::debug!(
            keyword = %task.keyword,
            reason = ?analysis.reason,
            "Series does not qualify as a spike"
        );
        return false;
    }

    // A qualifying spike whose tail already dropped is stale by the time
    // this callback arrives; do not (re)record it.
    if has_decayed(series, now, spike) {
        tracing::debug!(keyword = %task.keyword, "Spike already decayed; skipping record");
        return false;
    }

    let Some(first_seen) = analysis.first_seen_at else {
        return false;
    };
    let new_window = Duration::hours(spike.new_keyword_window_hours);
    if now - first_seen > new_window {
        tracing::debug!(keyword = %task.keyword, "Spike outside the new-keyword window");
        return false;
    }

    let keyword = normalize_keyword(&task.keyword);

    match storage
        .get_keyword_record(&keyword, &metadata.locale, &metadata.timeframe)
        .await
    {
        Ok(Some(existing)) if now - existing.first_seen > new_window => {
            tracing::debug!(keyword = %keyword, "Existing record is no longer new; skipping");
            return false;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(keyword = %keyword, error = %e, "Keyword record lookup failed");
            return false;
        }
    }

    let assessment = classify_or_unclear(
        classifier,
        &ClassifyRequest {
            keyword: task.keyword.clone(),
            root_keyword: Some(metadata.root_keyword.clone()),
            parent_keyword: metadata.parent_keyword.clone(),
            locale: metadata.locale.clone(),
            timeframe: metadata.timeframe.clone(),
            spike_score: analysis.spike_score,
            notes: None,
        },
    )
    .await;
    if assessment.label == DemandLabel::NonTool {
        tracing::debug!(keyword = %keyword, "Classifier labeled non_tool; not recording");
        return false;
    }

    let now_ts = Utc::now();
    let record = KeywordRecord {
        id: KeywordRecordId::new(),
        keyword: keyword.clone(),
        locale: metadata.locale.clone(),
        timeframe: metadata.timeframe.clone(),
        first_seen,
        last_seen: analysis.last_seen_at.unwrap_or(first_seen),
        spike_score: analysis.spike_score.unwrap_or(0.0),
        priority: analysis.priority.unwrap_or(SpikePriority::Watch),
        demand_summary: assessment.summary.clone(),
        metadata: json!({
            "spike": {
                "window_hours": spike.window_hours,
                "baseline_max_allowed": spike.baseline_max_allowed,
                "min_spike_value": spike.min_spike_value,
                "baseline_max": analysis.baseline_max,
                "recent_max": analysis.recent_max,
            },
            "source_task_id": task.provider_task_id,
            "root_keyword": metadata.root_keyword,
        }),
        created_at: now_ts,
        updated_at: now_ts,
    };

    if let Err(e) = storage.upsert_keyword_record(&record).await {
        tracing::error!(keyword = %keyword, error = %e, "Failed to upsert keyword record");
        return false;
    }

    tracing::info!(
        keyword = %keyword,
        locale = %metadata.locale,
        spike_score = record.spike_score,
        priority = record.priority.as_str(),
        "Recorded new demand keyword"
    );
    true
}

/// Expansion path: gate, dedupe, and post child tasks for this task's
/// rising entries. Returns the number of children queued.
#[allow(clippy::too_many_arguments)]
async fn expand_task(
    task: &Task,
    metadata: &TaskMetadata,
    result: &TrendsResult,
    storage: &impl Storage,
    provider: &impl TrendsProvider,
    classifier: &impl DemandClassifier,
    spike: &SpikeConfig,
    discovery: &DiscoveryConfig,
    postback_url: &str,
    now: DateTime<Utc>,
) -> usize {
    if metadata.depth >= discovery.max_depth {
        tracing::debug!(
            task_id = %task.provider_task_id,
            depth = metadata.depth,
            "Max discovery depth reached; no expansion"
        );
        return 0;
    }

    // Correct the locale from the result's own geography when available.
    let effective_locale =
        extract_top_market(result).unwrap_or_else(|| metadata.locale.clone());
    let market = discovery.market_for(&effective_locale);

    if market.is_none() && !metadata.is_root() {
        tracing::debug!(
            task_id = %task.provider_task_id,
            locale = %effective_locale,
            "Locale outside configured markets; no expansion"
        );
        return 0;
    }

    // Root tasks expand even off-market, keeping their own codes.
    let (locale, location_code, language_code) = match market {
        Some(m) => (m.locale.clone(), m.location_code, m.language_code.clone()),
        None => (
            effective_locale,
            metadata.location_code,
            metadata.language_code.clone(),
        ),
    };

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(normalize_keyword(&task.keyword));
    seen.insert(normalize_keyword(&metadata.root_keyword));

    let new_window = Duration::hours(spike.new_keyword_window_hours);
    let mut children: Vec<TaskRequest> = Vec::new();

    for entry in extract_rising(result) {
        if entry.value < discovery.min_rising_value {
            continue;
        }
        let normalized = normalize_keyword(&entry.keyword);
        if normalized.is_empty() || !seen.insert(normalized.clone()) {
            continue;
        }

        // A keyword whose record already aged out of the window is not new;
        // re-querying it would only re-surface old demand.
        match storage
            .get_keyword_record(&normalized, &locale, &metadata.timeframe)
            .await
        {
            Ok(Some(existing)) if now - existing.first_seen > new_window => {
                tracing::debug!(keyword = %normalized, "Known keyword past the new window; skipping");
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(keyword = %normalized, error = %e, "Record lookup failed; expanding anyway");
            }
        }

        let assessment = classify_or_unclear(
            classifier,
            &ClassifyRequest {
                keyword: entry.keyword.clone(),
                root_keyword: Some(metadata.root_keyword.clone()),
                parent_keyword: Some(task.keyword.clone()),
                locale: locale.clone(),
                timeframe: metadata.timeframe.clone(),
                spike_score: None,
                notes: Some(format!("rising value {}", entry.value)),
            },
        )
        .await;
        if assessment.label == DemandLabel::NonTool {
            tracing::debug!(keyword = %entry.keyword, "Classifier labeled non_tool; not expanding");
            continue;
        }

        children.push(TaskRequest::new(
            &entry.keyword,
            TaskMetadata {
                source: TaskSource::Rising,
                root_keyword: metadata.root_keyword.clone(),
                root_task_id: metadata
                    .root_task_id
                    .clone()
                    .or_else(|| Some(task.provider_task_id.clone())),
                parent_keyword: Some(task.keyword.clone()),
                parent_task_id: Some(task.provider_task_id.clone()),
                depth: metadata.depth + 1,
                locale: locale.clone(),
                location_code,
                language_code: language_code.clone(),
                timeframe: metadata.timeframe.clone(),
                demand: Some(assessment),
            },
        ));
    }

    if children.is_empty() {
        return 0;
    }

    // One batch per parent task.
    let outcome = post_tasks(task.run_id, &children, provider, storage, postback_url).await;
    tracing::info!(
        task_id = %task.provider_task_id,
        keyword = %task.keyword,
        depth = metadata.depth,
        queued = outcome.posted.len(),
        errors = outcome.errors.len(),
        "Expanded rising entries into child tasks"
    );
    outcome.posted.len()
}
