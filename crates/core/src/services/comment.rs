//! Comment service.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use forum_common::{AppError, AppResult, IdGenerator, ListingConfig, Page, PageRequest, get_metrics};
use forum_db::{
    entities::comment,
    repositories::{CommentRepository, PostRepository},
};
use sea_orm::Set;
use serde::Deserialize;

/// Input for creating a comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    pub content: String,
    pub post_id: String,
    /// The comment being replied to, if any.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub comment: comment::Model,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Every comment id in this subtree, parents before replies.
    pub fn collect_ids(&self, ids: &mut Vec<String>) {
        ids.push(self.comment.id.clone());
        for reply in &self.replies {
            reply.collect_ids(ids);
        }
    }
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    listing: ListingConfig,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        listing: ListingConfig,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            listing,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a comment on a post, optionally as a reply.
    pub async fn create(
        &self,
        author_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        if input.content.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Comment content is required".to_string(),
            ));
        }

        self.ensure_post(&input.post_id).await?;

        if let Some(ref parent_id) = input.parent_id {
            let parent = self
                .comment_repo
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Comment not found: {parent_id}")))?;
            if parent.post_id != input.post_id {
                return Err(AppError::InvalidInput(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            content: Set(input.content),
            post_id: Set(input.post_id),
            parent_id: Set(input.parent_id),
            author_id: Set(author_id.to_string()),
            created_at: Set(Utc::now().into()),
        };
        let created = self.comment_repo.create(model).await?;

        get_metrics().record_comment_created();
        tracing::info!(
            comment_id = %created.id,
            post_id = %created.post_id,
            "Comment created"
        );

        Ok(created)
    }

    /// List comments on a post, newest first.
    pub async fn list_for_post(
        &self,
        post_id: &str,
        request: PageRequest,
    ) -> AppResult<Page<comment::Model>> {
        self.ensure_post(post_id).await?;

        let page = request.resolve(&self.listing);
        let comments = self
            .comment_repo
            .list_for_post(post_id, page.offset(), page.limit)
            .await?;
        let total = self.comment_repo.count_for_post(post_id).await?;

        Ok(page.into_page(comments, total))
    }

    /// All comments on a post arranged as reply trees, oldest first at each level.
    pub async fn thread(&self, post_id: &str) -> AppResult<Vec<CommentNode>> {
        self.ensure_post(post_id).await?;
        let comments = self.comment_repo.find_all_for_post(post_id).await?;
        Ok(build_tree(comments))
    }

    async fn ensure_post(&self, post_id: &str) -> AppResult<()> {
        if self.post_repo.exists(post_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Post not found: {post_id}")))
        }
    }
}

/// Arrange comments into trees. A comment whose parent is missing becomes a root.
fn build_tree(comments: Vec<comment::Model>) -> Vec<CommentNode> {
    let known: HashSet<String> = comments.iter().map(|c| c.id.clone()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<comment::Model>> = HashMap::new();
    for comment in comments {
        match comment.parent_id.clone() {
            Some(parent_id) if known.contains(&parent_id) && parent_id != comment.id => {
                children.entry(parent_id).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

fn attach(
    comment: comment::Model,
    children: &mut HashMap<String, Vec<comment::Model>>,
) -> CommentNode {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach(reply, children))
        .collect();

    CommentNode { comment, replies }
}
