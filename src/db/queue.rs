//! `content_generation_queue` queries.

use crate::error::{Error, Result};
use crate::model::{DeletedItem, ParentRef, QueueStatus, WorkItem};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

const QUEUE_COLUMNS: &str =
    "id, article_id, topic_article_id, status, attempts, max_attempts, error_message, created_at";

impl super::Db {
    /// Rows with status pending or processing, oldest first.
    pub async fn active_queue(&self) -> Result<Vec<WorkItem>> {
        let statuses: Vec<String> = QueueStatus::ACTIVE
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {QUEUE_COLUMNS} FROM content_generation_queue
             WHERE status = ANY($1)
             ORDER BY created_at ASC"
        ))
        .bind(&statuses)
        .fetch_all(self.pool())
        .await?;

        Ok(decode_rows(rows))
    }

    /// Parent of every queue row, whatever its status.
    pub async fn queued_parents(&self) -> Result<Vec<ParentRef>> {
        let rows: Vec<(Option<Uuid>, Option<Uuid>)> =
            sqlx::query_as("SELECT article_id, topic_article_id FROM content_generation_queue")
                .fetch_all(self.pool())
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(a, t)| ParentRef::from_columns(a, t))
            .collect())
    }

    /// Delete queue rows by id in one statement. Returns every deleted row;
    /// ids that no longer exist are ignored. Only id and parent are read back.
    pub async fn delete_queue_items(&self, ids: &[Uuid]) -> Result<Vec<DeletedItem>> {
        let rows: Vec<(Uuid, Option<Uuid>, Option<Uuid>)> = sqlx::query_as(
            "DELETE FROM content_generation_queue WHERE id = ANY($1)
             RETURNING id, article_id, topic_article_id",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(deleted_item).collect())
    }

    /// Enqueue one pending job per parent, in a single transaction.
    pub async fn enqueue(&self, parents: &[ParentRef], max_attempts: u32) -> Result<Vec<WorkItem>> {
        let max_attempts = attempts_column(max_attempts)?;
        let mut tx = self.pool().begin().await?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(parents.len());

        for parent in parents {
            let (article_id, topic_article_id) = parent.columns();
            let row: WorkItemRow = sqlx::query_as(&format!(
                "INSERT INTO content_generation_queue
                     (id, article_id, topic_article_id, status, attempts, max_attempts, created_at)
                 VALUES ($1, $2, $3, 'pending', 0, $4, $5)
                 RETURNING {QUEUE_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(article_id)
            .bind(topic_article_id)
            .bind(max_attempts)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            created.push(row.try_into_work_item()?);
        }

        tx.commit().await?;
        Ok(created)
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    article_id: Option<Uuid>,
    topic_article_id: Option<Uuid>,
    status: String,
    attempts: i32,
    max_attempts: Option<i32>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl WorkItemRow {
    fn try_into_work_item(self) -> Result<WorkItem> {
        let parent = ParentRef::from_columns(self.article_id, self.topic_article_id).ok_or_else(
            || Error::InvalidRow {
                table: "content_generation_queue",
                reason: format!("row {} has no article reference", self.id),
            },
        )?;

        Ok(WorkItem {
            id: self.id,
            parent,
            status: self.status.parse()?,
            attempts: self.attempts.max(0) as u32,
            max_attempts: self.max_attempts.map(|n| n.max(0) as u32),
            error_message: self.error_message,
            created_at: self.created_at,
        })
    }
}

/// Decode rows, skipping (and logging) malformed ones.
fn decode_rows(rows: Vec<WorkItemRow>) -> Vec<WorkItem> {
    rows.into_iter()
        .filter_map(|row| match row.try_into_work_item() {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("skipping queue row: {e}");
                None
            }
        })
        .collect()
}

/// `max_attempts` as stored: a Postgres `integer`.
fn attempts_column(max_attempts: u32) -> Result<i32> {
    i32::try_from(max_attempts).map_err(|_| {
        Error::Config(format!(
            "max_attempts {max_attempts} does not fit the queue column"
        ))
    })
}

fn deleted_item(
    (id, article_id, topic_article_id): (Uuid, Option<Uuid>, Option<Uuid>),
) -> DeletedItem {
    let parent = ParentRef::from_columns(article_id, topic_article_id);
    if parent.is_none() {
        warn!(%id, "deleted queue row had no article reference");
    }
    DeletedItem { id, parent }
}
