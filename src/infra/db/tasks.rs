use std::convert::TryFrom;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{RepoError, TaskStore};
use crate::domain::conversion::{ConversionKey, TaskRecord};
use crate::domain::types::FileStatus;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TaskRow {
    key: String,
    format: String,
    status: FileStatus,
    status_info: i32,
    title: String,
    last_open_date: OffsetDateTime,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = RepoError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let key = ConversionKey::new(row.key)
            .ok_or_else(|| RepoError::from_persistence("empty conversion key in store"))?;
        Ok(Self {
            key,
            format: row.format,
            status: row.status,
            status_info: row.status_info,
            title: row.title,
            last_open_date: row.last_open_date,
        })
    }
}

#[async_trait]
impl TaskStore for PostgresRepositories {
    /// Conditional insert: the row count is the create-vs-exists arbiter.
    /// `ON CONFLICT DO NOTHING` reports one affected row only when this
    /// call inserted, which is what guarantees at most one enqueue per key.
    async fn create_if_absent(&self, record: &TaskRecord) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversion_tasks (key, format, status, status_info, title, last_open_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(record.key.as_str())
        .bind(&record.format)
        .bind(record.status)
        .bind(record.status_info)
        .bind(&record.title)
        .bind(record.last_open_date)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn select(&self, key: &ConversionKey) -> Result<Option<TaskRecord>, RepoError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT key,
                   format,
                   status,
                   status_info,
                   title,
                   last_open_date
              FROM conversion_tasks
             WHERE key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => TaskRecord::try_from(row).map(Some),
            None => Ok(None),
        }
    }
}
