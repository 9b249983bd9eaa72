//! Community service.

use chrono::Utc;
use forum_common::{AppError, AppResult, IdGenerator, ListingConfig, Page, PageRequest, get_metrics};
use forum_db::{
    entities::{community, community_member},
    repositories::{CommunityRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Input for creating a community.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommunityInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A community with its counters, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySummary {
    #[serde(flatten)]
    pub community: community::Model,
    pub member_count: u64,
    pub post_count: u64,
}

/// Community service for business logic.
#[derive(Clone)]
pub struct CommunityService {
    community_repo: CommunityRepository,
    user_repo: UserRepository,
    listing: ListingConfig,
    id_gen: IdGenerator,
}

impl CommunityService {
    /// Create a new community service.
    #[must_use]
    pub const fn new(
        community_repo: CommunityRepository,
        user_repo: UserRepository,
        listing: ListingConfig,
    ) -> Self {
        Self {
            community_repo,
            user_repo,
            listing,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a community. The creator becomes its first member.
    pub async fn create(
        &self,
        creator_id: &str,
        input: CreateCommunityInput,
    ) -> AppResult<community::Model> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "Community name is required".to_string(),
            ));
        }

        if self.user_repo.find_by_id(creator_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User not found: {creator_id}")));
        }

        if self.community_repo.find_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict("Community already exists".to_string()));
        }

        let now = Utc::now();
        let community_id = self.id_gen.generate();
        let model = community::ActiveModel {
            id: Set(community_id.clone()),
            name: Set(name),
            description: Set(input.description.filter(|d| !d.trim().is_empty())),
            creator_id: Set(creator_id.to_string()),
            created_at: Set(now.into()),
        };
        let member = community_member::ActiveModel {
            id: Set(self.id_gen.generate()),
            community_id: Set(community_id),
            user_id: Set(creator_id.to_string()),
            created_at: Set(now.into()),
        };
        let created = self.community_repo.create_with_member(model, member).await?;

        get_metrics().record_community_created();
        tracing::info!(community_id = %created.id, name = %created.name, "Community created");

        Ok(created)
    }

    /// Get a community by name.
    pub async fn get_by_name(&self, name: &str) -> AppResult<community::Model> {
        self.community_repo.get_by_name(name).await
    }

    /// List communities, newest first.
    pub async fn list(&self, request: PageRequest) -> AppResult<Page<CommunitySummary>> {
        let page = request.resolve(&self.listing);
        let communities = self
            .community_repo
            .list(page.offset(), page.limit)
            .await?;
        let total = self.community_repo.count().await?;

        let ids: Vec<String> = communities.iter().map(|c| c.id.clone()).collect();
        let members = self.community_repo.member_counts(&ids).await?;
        let posts = self.community_repo.post_counts(&ids).await?;

        let items = communities
            .into_iter()
            .map(|community| CommunitySummary {
                member_count: members.get(&community.id).copied().unwrap_or(0),
                post_count: posts.get(&community.id).copied().unwrap_or(0),
                community,
            })
            .collect();

        Ok(page.into_page(items, total))
    }
}
