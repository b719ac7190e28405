//! Trend discovery & spike-detection engine.
//!
//! Seeds batched Google Trends queries through an external provider,
//! processes its asynchronous callbacks, decides which keywords show a
//! genuine new demand spike, and recursively expands discovery from the
//! rising queries inside each result, bounded by depth.

pub mod aggregator;
pub mod analyzer;
pub mod callback;
pub mod classifier;
pub mod config;
pub mod expansion;
pub mod extractor;
pub mod poster;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for clean API
pub use aggregator::{derive_run_status, refresh_run};
pub use analyzer::{analyze_spike, has_decayed, SpikeAnalysis, SpikeRejection};
pub use callback::{CallbackOutcome, CallbackProcessor};
pub use classifier::{CachedClassifier, ClassifyRequest, DemandClassifier};
pub use config::{DiscoveryConfig, Market, SpikeConfig};
pub use expansion::ExpansionStats;
pub use extractor::{extract_rising, extract_series, extract_top_market};
pub use poster::{post_tasks, seed_run, PostOutcome, TaskRequest, TrendsProvider, MAX_BATCH_SIZE};
pub use storage::{PostgresStorage, Storage, TaskCompletion};
pub use types::*;
