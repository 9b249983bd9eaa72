//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment};
use forum_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a comment exists.
    pub async fn exists(&self, id: &str) -> AppResult<bool> {
        let count = Comment::find()
            .filter(comment::Column::Id.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List comments on a post, newest first.
    pub async fn list_for_post(
        &self,
        post_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count comments on a post.
    pub async fn count_for_post(&self, post_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every comment on a post, oldest first. Used to build reply trees.
    pub async fn find_all_for_post(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_comment(id: &str, post_id: &str, parent_id: Option<&str>) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            content: "Nice post".to_string(),
            post_id: post_id.to_string(),
            parent_id: parent_id.map(ToString::to_string),
            author_id: "user1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let comment = create_test_comment("cm1", "p1", None);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment.clone()]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let found = repo.find_by_id("cm1").await.unwrap();

        assert_eq!(found, Some(comment));
    }

    #[tokio::test]
    async fn test_find_all_for_post() {
        let root = create_test_comment("cm1", "p1", None);
        let reply = create_test_comment("cm2", "p1", Some("cm1"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[root, reply]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let comments = repo.find_all_for_post("p1").await.unwrap();

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].parent_id.as_deref(), Some("cm1"));
    }
}
