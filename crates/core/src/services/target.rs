//! Votable targets and the lookup that decides whether one exists.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use forum_common::{AppError, AppResult};
use forum_db::entities::vote::TargetKind;
use forum_db::repositories::{CommentRepository, PostRepository};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A post or comment a vote points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteTarget {
    #[serde(rename = "targetId")]
    pub id: String,
    #[serde(rename = "targetKind")]
    pub kind: TargetKind,
}

impl VoteTarget {
    /// Create a target.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// A post target.
    #[must_use]
    pub fn post(id: impl Into<String>) -> Self {
        Self::new(id, TargetKind::Post)
    }

    /// A comment target.
    #[must_use]
    pub fn comment(id: impl Into<String>) -> Self {
        Self::new(id, TargetKind::Comment)
    }

    /// Build a target from the older `{postId?, commentId?}` request shape.
    ///
    /// Exactly one of the two ids must be present; empty strings count as absent.
    pub fn from_ids(post_id: Option<String>, comment_id: Option<String>) -> AppResult<Self> {
        let post_id = post_id.filter(|id| !id.is_empty());
        let comment_id = comment_id.filter(|id| !id.is_empty());

        match (post_id, comment_id) {
            (Some(id), None) => Ok(Self::post(id)),
            (None, Some(id)) => Ok(Self::comment(id)),
            (Some(_), Some(_)) => Err(AppError::InvalidInput(
                "Vote must reference either a post or a comment, not both".to_string(),
            )),
            (None, None) => Err(AppError::InvalidInput(
                "Vote must reference a post or a comment".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Answers whether a target exists and is of the declared kind.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// Whether the target exists.
    async fn exists(&self, target: &VoteTarget) -> AppResult<bool>;
}

/// Type alias for a shared target directory.
pub type TargetDirectoryService = Arc<dyn TargetDirectory>;

/// Target directory backed by the post and comment tables.
#[derive(Clone)]
pub struct RepositoryTargetDirectory {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
}

impl RepositoryTargetDirectory {
    /// Create a new repository-backed directory.
    #[must_use]
    pub const fn new(post_repo: PostRepository, comment_repo: CommentRepository) -> Self {
        Self {
            post_repo,
            comment_repo,
        }
    }
}

#[async_trait]
impl TargetDirectory for RepositoryTargetDirectory {
    async fn exists(&self, target: &VoteTarget) -> AppResult<bool> {
        match target.kind {
            TargetKind::Post => self.post_repo.exists(&target.id).await,
            TargetKind::Comment => self.comment_repo.exists(&target.id).await,
        }
    }
}

/// Target directory held in memory.
#[derive(Default)]
pub struct InMemoryTargetDirectory {
    targets: RwLock<HashSet<VoteTarget>>,
}

impl InMemoryTargetDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory holding the given targets.
    #[must_use]
    pub fn with_targets(targets: impl IntoIterator<Item = VoteTarget>) -> Self {
        Self {
            targets: RwLock::new(targets.into_iter().collect()),
        }
    }

    /// Register a target.
    pub async fn add(&self, target: VoteTarget) {
        self.targets.write().await.insert(target);
    }

    /// Forget a target.
    pub async fn remove(&self, target: &VoteTarget) {
        self.targets.write().await.remove(target);
    }
}

#[async_trait]
impl TargetDirectory for InMemoryTargetDirectory {
    async fn exists(&self, target: &VoteTarget) -> AppResult<bool> {
        Ok(self.targets.read().await.contains(target))
    }
}
