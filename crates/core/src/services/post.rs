//! Post service.

use chrono::Utc;
use forum_common::{AppError, AppResult, IdGenerator, ListingConfig, Page, PageRequest, get_metrics};
use forum_db::{
    entities::post,
    repositories::{CommunityRepository, PostRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub community_name: String,
    /// Store no author.
    #[serde(default)]
    pub is_anonymous: bool,
}

/// A post with its comment count, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: post::Model,
    pub comment_count: u64,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    community_repo: CommunityRepository,
    listing: ListingConfig,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        community_repo: CommunityRepository,
        listing: ListingConfig,
    ) -> Self {
        Self {
            post_repo,
            community_repo,
            listing,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post in a community.
    pub async fn create(&self, author_id: &str, input: CreatePostInput) -> AppResult<post::Model> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Post title is required".to_string()));
        }

        let community = self.community_repo.get_by_name(&input.community_name).await?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(title),
            content: Set(input.content),
            community_id: Set(community.id),
            author_id: Set((!input.is_anonymous).then(|| author_id.to_string())),
            created_at: Set(Utc::now().into()),
        };
        let created = self.post_repo.create(model).await?;

        get_metrics().record_post_created();
        tracing::info!(
            post_id = %created.id,
            community_id = %created.community_id,
            anonymous = input.is_anonymous,
            "Post created"
        );

        Ok(created)
    }

    /// Get a post by ID.
    pub async fn get(&self, id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(id).await
    }

    /// List posts, newest first, optionally within one community.
    pub async fn list(
        &self,
        community_name: Option<&str>,
        request: PageRequest,
    ) -> AppResult<Page<PostSummary>> {
        let community_id = match community_name {
            Some(name) => Some(self.community_repo.get_by_name(name).await?.id),
            None => None,
        };

        let page = request.resolve(&self.listing);
        let posts = self
            .post_repo
            .list(community_id.as_deref(), page.offset(), page.limit)
            .await?;
        let total = self.post_repo.count(community_id.as_deref()).await?;

        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let counts = self.post_repo.comment_counts(&ids).await?;

        let items = posts
            .into_iter()
            .map(|post| PostSummary {
                comment_count: counts.get(&post.id).copied().unwrap_or(0),
                post,
            })
            .collect();

        Ok(page.into_page(items, total))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use forum_db::entities::community;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::sync::Arc;

    fn create_test_community() -> community::Model {
        community::Model {
            id: "c1".to_string(),
            name: "rust".to_string(),
            description: None,
            creator_id: "u1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_post(id: &str, author_id: Option<&str>) -> post::Model {
        post::Model {
            id: id.to_string(),
            title: "Hello".to_string(),
            content: "World".to_string(),
            community_id: "c1".to_string(),
            author_id: author_id.map(ToString::to_string),
            created_at: Utc::now().into(),
        }
    }

    fn service(db: sea_orm::DatabaseConnection) -> PostService {
        let db = Arc::new(db);
        PostService::new(
            PostRepository::new(db.clone()),
            CommunityRepository::new(db),
            ListingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_in_unknown_community() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<community::Model>::new()])
            .into_connection();

        let err = service(db)
            .create(
                "u1",
                CreatePostInput {
                    title: "Hello".to_string(),
                    content: "World".to_string(),
                    community_name: "nowhere".to_string(),
                    is_anonymous: false,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_anonymous() {
        let created = create_test_post("p1", None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_community()]])
            .append_query_results([[created.clone()]])
            .into_connection();

        let post = service(db)
            .create(
                "u1",
                CreatePostInput {
                    title: "Hello".to_string(),
                    content: "World".to_string(),
                    community_name: "rust".to_string(),
                    is_anonymous: true,
                },
            )
            .await
            .unwrap();

        assert!(post.author_id.is_none());
    }

    #[tokio::test]
    async fn test_list_with_comment_counts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_community()]])
            .append_query_results([[
                create_test_post("p2", Some("u1")),
                create_test_post("p1", Some("u1")),
            ]])
            .append_query_results([[btreemap! {
                "num_items" => Value::BigInt(Some(12))
            }]])
            .append_query_results([[btreemap! {
                "post_id" => Into::<Value>::into("p1"),
                "count" => Into::<Value>::into(3i64),
            }]])
            .into_connection();

        let page = service(db)
            .list(Some("rust"), PageRequest::new(1, 2))
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 12);
        assert_eq!(page.pagination.pages, 6);
        assert_eq!(page.items[0].post.id, "p2");
        assert_eq!(page.items[0].comment_count, 0);
        assert_eq!(page.items[1].comment_count, 3);
    }
}
