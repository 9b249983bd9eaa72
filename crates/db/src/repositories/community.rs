//! Community repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Community, CommunityMember, Post, community, community_member, post};
use forum_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};

/// Community repository for database operations.
#[derive(Clone)]
pub struct CommunityRepository {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, FromQueryResult)]
struct CommunityCount {
    community_id: String,
    count: i64,
}

impl CommunityCount {
    fn collect(rows: Vec<Self>) -> HashMap<String, u64> {
        rows.into_iter()
            .map(|r| (r.community_id, r.count.max(0) as u64))
            .collect()
    }
}

impl CommunityRepository {
    /// Create a new community repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a community by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<community::Model>> {
        Community::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a community by its unique name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<community::Model>> {
        Community::find()
            .filter(community::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a community by name, returning an error if not found.
    pub async fn get_by_name(&self, name: &str) -> AppResult<community::Model> {
        self.find_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Community not found: {name}")))
    }

    /// Create a community together with its creator's membership.
    ///
    /// Both rows are written in one transaction.
    pub async fn create_with_member(
        &self,
        model: community::ActiveModel,
        member: community_member::ActiveModel,
    ) -> AppResult<community::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        member
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(created)
    }

    /// List communities, newest first.
    pub async fn list(&self, offset: u64, limit: u64) -> AppResult<Vec<community::Model>> {
        Community::find()
            .order_by_desc(community::Column::CreatedAt)
            .order_by_desc(community::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count all communities.
    pub async fn count(&self) -> AppResult<u64> {
        Community::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Member counts for a page of communities. Communities without members are absent.
    pub async fn member_counts(&self, community_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if community_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = CommunityMember::find()
            .select_only()
            .column(community_member::Column::CommunityId)
            .column_as(Expr::col(community_member::Column::Id).count(), "count")
            .filter(community_member::Column::CommunityId.is_in(community_ids.to_vec()))
            .group_by(community_member::Column::CommunityId)
            .into_model::<CommunityCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(CommunityCount::collect(rows))
    }

    /// Post counts for a page of communities. Communities without posts are absent.
    pub async fn post_counts(&self, community_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if community_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Post::find()
            .select_only()
            .column(post::Column::CommunityId)
            .column_as(Expr::col(post::Column::Id).count(), "count")
            .filter(post::Column::CommunityId.is_in(community_ids.to_vec()))
            .group_by(post::Column::CommunityId)
            .into_model::<CommunityCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(CommunityCount::collect(rows))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Set, Value};

    fn create_test_community(id: &str, name: &str) -> community::Model {
        community::Model {
            id: id.to_string(),
            name: name.to_string(),
            description: Some("A test community".to_string()),
            creator_id: "user1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let community = create_test_community("c1", "rust");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[community.clone()]])
                .into_connection(),
        );

        let repo = CommunityRepository::new(db);
        let found = repo.find_by_name("rust").await.unwrap();

        assert_eq!(found, Some(community));
    }

    #[tokio::test]
    async fn test_get_by_name_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<community::Model>::new()])
                .into_connection(),
        );

        let repo = CommunityRepository::new(db);
        let err = repo.get_by_name("missing").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list() {
        let c1 = create_test_community("c2", "newer");
        let c2 = create_test_community("c1", "older");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[c1, c2]])
                .into_connection(),
        );

        let repo = CommunityRepository::new(db);
        let list = repo.list(0, 10).await.unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "newer");
    }

    #[tokio::test]
    async fn test_member_and_post_counts_are_grouped() {
        let row = |id: &str, n: i64| {
            btreemap! {
                "community_id" => Value::String(Some(Box::new(id.to_string()))),
                "count" => Value::BigInt(Some(n)),
            }
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row("c1", 3), row("c2", 1)]])
                .append_query_results([[row("c1", 7)]])
                .into_connection(),
        );

        let repo = CommunityRepository::new(db);
        let ids = vec!["c1".to_string(), "c2".to_string()];
        let members = repo.member_counts(&ids).await.unwrap();
        let posts = repo.post_counts(&ids).await.unwrap();

        assert_eq!(members.get("c1"), Some(&3));
        assert_eq!(members.get("c2"), Some(&1));
        assert_eq!(posts.get("c1"), Some(&7));
        assert_eq!(posts.get("c2"), None);

        // No ids, no query.
        assert!(repo.member_counts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_member_fails_as_a_unit() {
        let community = create_test_community("c1", "rust");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[community.clone()]])
                .append_query_errors([sea_orm::DbErr::Custom("member insert failed".to_string())])
                .into_connection(),
        );

        let repo = CommunityRepository::new(db);
        let err = repo
            .create_with_member(
                community::ActiveModel {
                    id: Set(community.id.clone()),
                    name: Set(community.name.clone()),
                    description: Set(None),
                    creator_id: Set("user1".to_string()),
                    created_at: Set(community.created_at),
                },
                community_member::ActiveModel {
                    id: Set("m1".to_string()),
                    community_id: Set("c1".to_string()),
                    user_id: Set("user1".to_string()),
                    created_at: Set(community.created_at),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(ref m) if m.contains("member insert failed")));
    }
}
