//! Recent activity from `system_logs`.

use crate::error::Result;
use crate::model::{ActivityEntry, LogLevel};
use chrono::{DateTime, Utc};

impl super::Db {
    /// Newest `limit` log lines, newest first.
    pub async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>> {
        let rows: Vec<(i64, String, String, Option<serde_json::Value>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, level, message, context, created_at FROM system_logs
                 ORDER BY created_at DESC
                 LIMIT $1",
            )
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, level, message, context, created_at)| ActivityEntry {
                id,
                level: LogLevel::parse_lenient(&level),
                message,
                context: context.unwrap_or(serde_json::Value::Null),
                created_at,
            })
            .collect())
    }
}
