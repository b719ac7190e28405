use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::types::DemandAssessment;

/// Context handed to the demand classifier for one keyword
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub keyword: String,
    pub root_keyword: Option<String>,
    pub parent_keyword: Option<String>,
    pub locale: String,
    pub timeframe: String,
    pub spike_score: Option<f64>,
    pub notes: Option<String>,
}

/// Black-box oracle deciding whether a keyword reflects demand for a
/// software tool
#[async_trait]
pub trait DemandClassifier: Send + Sync {
    async fn classify(&self, request: &ClassifyRequest) -> Result<DemandAssessment>;
}

/// Classify, mapping any classifier failure to `unclear`.
///
/// The outage policy is fail-open: an unreachable classifier must not
/// silently reject candidates, so callers gate only on an explicit
/// `non_tool` label.
pub async fn classify_or_unclear(
    classifier: &impl DemandClassifier,
    request: &ClassifyRequest,
) -> DemandAssessment {
    match classifier.classify(request).await {
        Ok(assessment) => assessment,
        Err(e) => {
            tracing::warn!(
                keyword = %request.keyword,
                error = %e,
                "Demand classifier failed - treating as unclear"
            );
            DemandAssessment::unclear(format!("classifier error: {e}"))
        }
    }
}

/// Wraps a classifier with an explicit, bounded in-memory response cache.
///
/// The cache is an owned object with process lifecycle, keyed by a digest
/// of the request fields; eviction is FIFO at capacity.
pub struct CachedClassifier<C> {
    inner: C,
    capacity: usize,
    cache: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, DemandAssessment>,
    order: VecDeque<String>,
}

impl<C> CachedClassifier<C> {
    pub fn new(inner: C, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: Mutex::new(CacheState::default()),
        }
    }

    /// Deterministic cache key over every field the classifier sees.
    fn cache_key(request: &ClassifyRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.keyword.as_bytes());
        hasher.update(b"\n");
        hasher.update(request.root_keyword.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\n");
        hasher.update(request.parent_keyword.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\n");
        hasher.update(request.locale.as_bytes());
        hasher.update(b"\n");
        hasher.update(request.timeframe.as_bytes());
        hasher.update(b"\n");
        hasher.update(
            request
                .spike_score
                .map(|s| s.to_string())
                .unwrap_or_default()
                .as_bytes(),
        );
        hasher.update(b"\n");
        hasher.update(request.notes.as_deref().unwrap_or("").as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl<C: DemandClassifier> DemandClassifier for CachedClassifier<C> {
    async fn classify(&self, request: &ClassifyRequest) -> Result<DemandAssessment> {
        let key = Self::cache_key(request);

        if let Some(hit) = self.cache.lock().unwrap().entries.get(&key).cloned() {
            tracing::debug!(keyword = %request.keyword, "Classifier cache hit");
            return Ok(hit);
        }

        let assessment = self.inner.classify(request).await?;

        let mut state = self.cache.lock().unwrap();
        if !state.entries.contains_key(&key) {
            while state.order.len() >= self.capacity {
                if let Some(evicted) = state.order.pop_front() {
                    state.entries.remove(&evicted);
                }
            }
            state.order.push_back(key.clone());
        }
        state.entries.insert(key, assessment.clone());

        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DemandLabel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DemandClassifier for CountingClassifier {
        async fn classify(&self, _request: &ClassifyRequest) -> Result<DemandAssessment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DemandAssessment {
                label: DemandLabel::Tool,
                confidence: Some(0.9),
                summary: Some("test".into()),
                reason: None,
            })
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl DemandClassifier for FailingClassifier {
        async fn classify(&self, _request: &ClassifyRequest) -> Result<DemandAssessment> {
            anyhow::bail!("upstream down")
        }
    }

    fn request(keyword: &str) -> ClassifyRequest {
        ClassifyRequest {
            keyword: keyword.to_string(),
            root_keyword: Some("ai tools".into()),
            parent_keyword: None,
            locale: "US".into(),
            timeframe: "past_7_days".into(),
            spike_score: Some(40.0),
            notes: None,
        }
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache() {
        let classifier = CachedClassifier::new(
            CountingClassifier {
                calls: AtomicUsize::new(0),
            },
            8,
        );

        let req = request("agent crm");
        classifier.classify(&req).await.unwrap();
        classifier.classify(&req).await.unwrap();

        assert_eq!(classifier.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_evicts_oldest_at_capacity() {
        let classifier = CachedClassifier::new(
            CountingClassifier {
                calls: AtomicUsize::new(0),
            },
            2,
        );

        classifier.classify(&request("a")).await.unwrap();
        classifier.classify(&request("b")).await.unwrap();
        classifier.classify(&request("c")).await.unwrap();
        // "a" was evicted, so this is a fresh call
        classifier.classify(&request("a")).await.unwrap();

        assert_eq!(classifier.inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failures_map_to_unclear() {
        let assessment = classify_or_unclear(&FailingClassifier, &request("agent crm")).await;
        assert_eq!(assessment.label, DemandLabel::Unclear);
        assert!(assessment.reason.unwrap().contains("upstream down"));
    }
}
