//! Post repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Comment, Post, comment, post};
use forum_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, FromQueryResult)]
struct CommentCount {
    post_id: String,
    count: i64,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post not found: {id}")))
    }

    /// Check whether a post exists.
    pub async fn exists(&self, id: &str) -> AppResult<bool> {
        let count = Post::find()
            .filter(post::Column::Id.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List posts, newest first, optionally limited to one community.
    pub async fn list(
        &self,
        community_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(Self::community_condition(community_id))
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count posts, optionally limited to one community.
    pub async fn count(&self, community_id: Option<&str>) -> AppResult<u64> {
        Post::find()
            .filter(Self::community_condition(community_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Comment counts for many posts in one query.
    ///
    /// Posts without comments are absent from the map.
    pub async fn comment_counts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Comment::find()
            .select_only()
            .column(comment::Column::PostId)
            .column_as(Expr::col(comment::Column::Id).count(), "count")
            .filter(comment::Column::PostId.is_in(post_ids.to_vec()))
            .group_by(comment::Column::PostId)
            .into_model::<CommentCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.post_id, r.count.max(0) as u64))
            .collect())
    }

    fn community_condition(community_id: Option<&str>) -> Condition {
        let mut condition = Condition::all();
        if let Some(id) = community_id {
            condition = condition.add(post::Column::CommunityId.eq(id));
        }
        condition
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    fn create_test_post(id: &str, community_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            title: "Hello".to_string(),
            content: "First post".to_string(),
            community_id: community_id.to_string(),
            author_id: Some("user1".to_string()),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let err = repo.get_by_id("missing").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_community() {
        let p1 = create_test_post("p2", "c1");
        let p2 = create_test_post("p1", "c1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let posts = repo.list(Some("c1"), 0, 10).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "p2");
    }

    #[tokio::test]
    async fn test_comment_counts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "post_id" => Into::<Value>::into("p1"),
                    "count" => Into::<Value>::into(4i64),
                }]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let counts = repo
            .comment_counts(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert_eq!(counts.get("p1"), Some(&4));
        assert_eq!(counts.get("p2"), None);
    }
}
