//! Parent article and story queries.
//!
//! Legacy articles live in `articles`, multi-tenant ones in `topic_articles`.
//! Both tables share the columns read here.

use crate::error::Result;
use crate::model::{Article, ParentRef};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title, url, processing_status, created_at";

/// Status an article returns to when its queued job is cancelled.
const ARTICLE_RESET_STATUS: &str = "new";
/// Status a story returns to when its queued job is cancelled.
const STORY_RESET_STATUS: &str = "draft";

impl super::Db {
    /// Fetch parent rows for the given references. Missing rows are simply
    /// absent from the result.
    pub async fn articles(&self, parents: &[ParentRef]) -> Result<Vec<Article>> {
        let (legacy, topic): (Vec<ParentRef>, Vec<ParentRef>) = parents
            .iter()
            .partition(|p| matches!(p, ParentRef::Legacy(_)));

        let mut articles = Vec::with_capacity(parents.len());
        for (table, ids) in [
            ("articles", legacy.iter().map(|p| p.id()).collect::<Vec<_>>()),
            ("topic_articles", topic.iter().map(|p| p.id()).collect()),
        ] {
            if ids.is_empty() {
                continue;
            }
            let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
                "SELECT {ARTICLE_COLUMNS} FROM {table} WHERE id = ANY($1)"
            ))
            .bind(&ids)
            .fetch_all(self.pool())
            .await?;
            articles.extend(rows.into_iter().map(|r| r.into_article(table)));
        }
        Ok(articles)
    }

    /// Newest articles in any of `statuses`, across both tables.
    pub async fn candidate_articles(
        &self,
        statuses: &[String],
        limit: i64,
    ) -> Result<Vec<Article>> {
        let mut articles = Vec::new();
        for table in ["articles", "topic_articles"] {
            let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
                "SELECT {ARTICLE_COLUMNS} FROM {table}
                 WHERE processing_status = ANY($1)
                 ORDER BY created_at DESC
                 LIMIT $2"
            ))
            .bind(statuses)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
            articles.extend(rows.into_iter().map(|r| r.into_article(table)));
        }

        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        articles.truncate(limit.max(0) as usize);
        Ok(articles)
    }

    /// Parents that already have a story.
    pub async fn storied_parents(&self) -> Result<Vec<ParentRef>> {
        let rows: Vec<(Option<Uuid>, Option<Uuid>)> = sqlx::query_as(
            "SELECT article_id, topic_article_id FROM stories
             WHERE article_id IS NOT NULL OR topic_article_id IS NOT NULL",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(a, t)| ParentRef::from_columns(a, t))
            .collect())
    }

    /// Put a parent back to its pre-approval state: its story (if any) back
    /// to draft and the article back to new.
    pub async fn revert_parent(&self, parent: ParentRef) -> Result<()> {
        let story_column = match parent {
            ParentRef::Legacy(_) => "article_id",
            ParentRef::Topic(_) => "topic_article_id",
        };

        let mut tx = self.pool().begin().await?;
        sqlx::query(&format!(
            "UPDATE stories SET status = $1 WHERE {story_column} = $2"
        ))
        .bind(STORY_RESET_STATUS)
        .bind(parent.id())
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "UPDATE {} SET processing_status = $1 WHERE id = $2",
            parent.table()
        ))
        .bind(ARTICLE_RESET_STATUS)
        .bind(parent.id())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    title: Option<String>,
    url: Option<String>,
    processing_status: Option<String>,
    created_at: DateTime<Utc>,
}

impl ArticleRow {
    fn into_article(self, table: &str) -> Article {
        let parent = if table == "topic_articles" {
            ParentRef::Topic(self.id)
        } else {
            ParentRef::Legacy(self.id)
        };
        Article {
            parent,
            title: self.title.unwrap_or_else(|| "(untitled)".to_string()),
            url: self.url,
            processing_status: self.processing_status.unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}
