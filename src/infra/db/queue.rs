use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{RepoError, WorkQueue};
use crate::domain::conversion::QueuedWorkItem;
use crate::domain::types::QueuePriority;

use super::{PostgresRepositories, map_sqlx_error};

const CONVERT_JOB_TYPE: &str = "convert";
const DEFAULT_MAX_ATTEMPTS: i32 = 3;

#[async_trait]
impl WorkQueue for PostgresRepositories {
    /// Push one work item to the jobs table the worker fleet polls.
    /// Fire-and-forget: no acknowledgment beyond the successful insert.
    async fn enqueue(&self, item: QueuedWorkItem, priority: QueuePriority) -> Result<(), RepoError> {
        let payload = serde_json::to_value(&item).map_err(RepoError::from_persistence)?;

        sqlx::query(
            r#"
            SELECT apalis.push_job($1, $2::json, $3, $4, $5, $6)
            "#,
        )
        .bind(CONVERT_JOB_TYPE)
        .bind(payload)
        .bind("Pending")
        .bind(OffsetDateTime::now_utc())
        .bind(DEFAULT_MAX_ATTEMPTS)
        .bind(priority.as_i32())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
