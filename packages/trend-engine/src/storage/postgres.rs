use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::storage::{Storage, TaskCompletion};
use crate::types::*;

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    // ========================================================================
    // RUNS
    // ========================================================================

    async fn create_run(&self, run: &Run) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trend_runs (id, status, trigger_source, seed_keywords, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run.id.0)
        .bind(run.status.as_str())
        .bind(run.trigger.as_str())
        .bind(&run.seed_keywords)
        .bind(&run.metadata)
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert run")?;

        Ok(())
    }

    async fn get_run(&self, id: RunId) -> Result<Option<Run>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, trigger_source, seed_keywords, metadata, created_at, updated_at
            FROM trend_runs
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch run")?;

        Ok(row.map(|r| Run {
            id: RunId(r.get("id")),
            status: RunStatus::from_str(r.get("status")),
            trigger: TriggerSource::from_str(r.get("trigger_source")),
            seed_keywords: r.get("seed_keywords"),
            metadata: r.get("metadata"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn update_run_status(&self, id: RunId, status: RunStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trend_runs
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .context("Failed to update run status")?;

        Ok(())
    }

    async fn merge_run_metadata(&self, id: RunId, patch: &serde_json::Value) -> Result<()> {
        // jsonb || merges top-level keys additively; foreign keys survive.
        sqlx::query(
            r#"
            UPDATE trend_runs
            SET metadata = metadata || $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(patch)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .context("Failed to merge run metadata")?;

        Ok(())
    }

    // ========================================================================
    // TASKS
    // ========================================================================

    async fn save_task(&self, task: &Task) -> Result<()> {
        let metadata =
            serde_json::to_value(&task.metadata).context("Failed to serialize task metadata")?;

        sqlx::query(
            r#"
            INSERT INTO trend_tasks (
                provider_task_id, run_id, keyword, locale, timeframe,
                location_code, language_code, status, metadata,
                request_payload, result_payload, cost,
                posted_at, completed_at, error_detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (provider_task_id) DO NOTHING
            "#,
        )
        .bind(&task.provider_task_id)
        .bind(task.run_id.0)
        .bind(&task.keyword)
        .bind(&task.locale)
        .bind(&task.timeframe)
        .bind(task.location_code as i64)
        .bind(&task.language_code)
        .bind(task.status.as_str())
        .bind(metadata)
        .bind(&task.request_payload)
        .bind(&task.result_payload)
        .bind(task.cost)
        .bind(task.posted_at)
        .bind(task.completed_at)
        .bind(task.error_detail.as_ref())
        .execute(&self.pool)
        .await
        .context("Failed to insert task")?;

        Ok(())
    }

    async fn get_task(&self, provider_task_id: &str) -> Result<Option<Task>> {
        let row = sqlx::query(
            r#"
            SELECT provider_task_id, run_id, keyword, locale, timeframe,
                   location_code, language_code, status, metadata,
                   request_payload, result_payload, cost,
                   posted_at, completed_at, error_detail
            FROM trend_tasks
            WHERE provider_task_id = $1
            "#,
        )
        .bind(provider_task_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch task")?;

        row.map(|r| {
            let metadata: serde_json::Value = r.get("metadata");
            let metadata: TaskMetadata = serde_json::from_value(metadata)
                .context("Failed to deserialize task metadata")?;

            Ok(Task {
                provider_task_id: r.get("provider_task_id"),
                run_id: RunId(r.get("run_id")),
                keyword: r.get("keyword"),
                locale: r.get("locale"),
                timeframe: r.get("timeframe"),
                location_code: r.get::<i64, _>("location_code") as u32,
                language_code: r.get("language_code"),
                status: TaskStatus::from_str(r.get("status")),
                metadata,
                request_payload: r.get("request_payload"),
                result_payload: r.get("result_payload"),
                cost: r.get("cost"),
                posted_at: r.get("posted_at"),
                completed_at: r.get("completed_at"),
                error_detail: r.get("error_detail"),
            })
        })
        .transpose()
    }

    async fn complete_task(&self, completion: &TaskCompletion) -> Result<bool> {
        let metadata = serde_json::to_value(&completion.metadata)
            .context("Failed to serialize task metadata")?;

        // Guarding on status = 'queued' makes the terminal transition
        // reject duplicate callbacks.
        let result = sqlx::query(
            r#"
            UPDATE trend_tasks
            SET status = $1,
                metadata = $2,
                result_payload = $3,
                cost = $4,
                completed_at = $5,
                error_detail = $6
            WHERE provider_task_id = $7 AND status = 'queued'
            "#,
        )
        .bind(completion.status.as_str())
        .bind(metadata)
        .bind(&completion.result_payload)
        .bind(completion.cost)
        .bind(completion.completed_at)
        .bind(completion.error_detail.as_ref())
        .bind(&completion.provider_task_id)
        .execute(&self.pool)
        .await
        .context("Failed to complete task")?;

        Ok(result.rows_affected() > 0)
    }

    async fn run_status_counts(&self, run_id: RunId) -> Result<StatusCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'error') AS error
            FROM trend_tasks
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.0)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count run tasks")?;

        Ok(StatusCounts {
            total: row.get("total"),
            completed: row.get("completed"),
            queued: row.get("queued"),
            error: row.get("error"),
        })
    }

    async fn run_cost_total(&self, run_id: RunId) -> Result<f64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(cost), 0)::float8 AS total_cost
            FROM trend_tasks
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.0)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum run cost")?;

        Ok(row.get("total_cost"))
    }

    // ========================================================================
    // KEYWORD RECORDS
    // ========================================================================

    async fn get_keyword_record(
        &self,
        keyword: &str,
        locale: &str,
        timeframe: &str,
    ) -> Result<Option<KeywordRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, keyword, locale, timeframe, first_seen, last_seen,
                   spike_score, priority, demand_summary, metadata,
                   created_at, updated_at
            FROM keyword_records
            WHERE keyword = $1 AND locale = $2 AND timeframe = $3
            "#,
        )
        .bind(keyword)
        .bind(locale)
        .bind(timeframe)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch keyword record")?;

        Ok(row.map(|r| KeywordRecord {
            id: KeywordRecordId(r.get("id")),
            keyword: r.get("keyword"),
            locale: r.get("locale"),
            timeframe: r.get("timeframe"),
            first_seen: r.get("first_seen"),
            last_seen: r.get("last_seen"),
            spike_score: r.get("spike_score"),
            priority: SpikePriority::from_str(r.get("priority")),
            demand_summary: r.get("demand_summary"),
            metadata: r.get("metadata"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn upsert_keyword_record(&self, record: &KeywordRecord) -> Result<()> {
        // LEAST/GREATEST keep first_seen from moving later and last_seen
        // from moving earlier across repeated detections.
        sqlx::query(
            r#"
            INSERT INTO keyword_records (
                id, keyword, locale, timeframe, first_seen, last_seen,
                spike_score, priority, demand_summary, metadata,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (keyword, locale, timeframe) DO UPDATE SET
                first_seen = LEAST(keyword_records.first_seen, EXCLUDED.first_seen),
                last_seen = GREATEST(keyword_records.last_seen, EXCLUDED.last_seen),
                spike_score = EXCLUDED.spike_score,
                priority = EXCLUDED.priority,
                demand_summary = COALESCE(EXCLUDED.demand_summary, keyword_records.demand_summary),
                metadata = EXCLUDED.metadata,
                updated_at = NOW()
            "#,
        )
        .bind(record.id.0)
        .bind(&record.keyword)
        .bind(&record.locale)
        .bind(&record.timeframe)
        .bind(record.first_seen)
        .bind(record.last_seen)
        .bind(record.spike_score)
        .bind(record.priority.as_str())
        .bind(record.demand_summary.as_ref())
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert keyword record")?;

        Ok(())
    }
}
