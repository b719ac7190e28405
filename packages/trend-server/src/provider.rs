use anyhow::{Context, Result};
use async_trait::async_trait;
use dataforseo_client::{DataForSeoClient, TaskEnvelope, TrendsTaskSpec};
use trend_engine::TrendsProvider;

/// Adapter wiring the DataForSEO client into the engine's provider trait.
pub struct DataForSeoProvider {
    client: DataForSeoClient,
}

impl DataForSeoProvider {
    pub fn new(client: DataForSeoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrendsProvider for DataForSeoProvider {
    async fn post_tasks(&self, specs: &[TrendsTaskSpec]) -> Result<Vec<TaskEnvelope>> {
        self.client
            .post_trends_tasks(specs)
            .await
            .context("DataForSEO batch submission failed")
    }
}
