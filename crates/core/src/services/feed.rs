//! Feed assembly: attaches scores and the viewer's votes to listings.
//!
//! Every page or thread costs a single batched score lookup. Item order is
//! kept exactly as the listing produced it.

use std::collections::HashMap;

use forum_common::{AppResult, Page};
use forum_db::entities::{comment, post};
use serde::Serialize;

use super::comment::CommentNode;
use super::post::PostSummary;
use super::score::{ScoreService, TargetScore};
use super::viewer::Viewer;

/// A post as shown in a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: post::Model,
    pub comment_count: u64,
    pub score: i64,
    pub user_vote: i16,
}

/// A comment as shown in a flat listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub score: i64,
    pub user_vote: i16,
}

/// A comment with its scored replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadView {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub score: i64,
    pub user_vote: i16,
    pub replies: Vec<CommentThreadView>,
}

/// Merges score projections into listing pages.
#[derive(Clone)]
pub struct FeedAssembler {
    scores: ScoreService,
}

impl FeedAssembler {
    /// Create a new feed assembler.
    #[must_use]
    pub const fn new(scores: ScoreService) -> Self {
        Self { scores }
    }

    /// Annotate a page of posts.
    pub async fn posts(
        &self,
        page: Page<PostSummary>,
        viewer: &Viewer,
    ) -> AppResult<Page<PostView>> {
        let ids: Vec<String> = page.items.iter().map(|p| p.post.id.clone()).collect();
        let scores = self.scores.scores_for(&ids, viewer.user_id()).await?;

        Ok(page.map(|summary| {
            let TargetScore { score, user_vote } = lookup(&scores, &summary.post.id);
            PostView {
                post: summary.post,
                comment_count: summary.comment_count,
                score,
                user_vote,
            }
        }))
    }

    /// Annotate a page of comments.
    pub async fn comments(
        &self,
        page: Page<comment::Model>,
        viewer: &Viewer,
    ) -> AppResult<Page<CommentView>> {
        let ids: Vec<String> = page.items.iter().map(|c| c.id.clone()).collect();
        let scores = self.scores.scores_for(&ids, viewer.user_id()).await?;

        Ok(page.map(|comment| {
            let TargetScore { score, user_vote } = lookup(&scores, &comment.id);
            CommentView {
                comment,
                score,
                user_vote,
            }
        }))
    }

    /// Annotate a whole reply tree.
    pub async fn thread(
        &self,
        nodes: Vec<CommentNode>,
        viewer: &Viewer,
    ) -> AppResult<Vec<CommentThreadView>> {
        let mut ids = Vec::new();
        for node in &nodes {
            node.collect_ids(&mut ids);
        }
        let scores = self.scores.scores_for(&ids, viewer.user_id()).await?;

        Ok(nodes
            .into_iter()
            .map(|node| annotate(node, &scores))
            .collect())
    }
}

fn lookup(scores: &HashMap<String, TargetScore>, id: &str) -> TargetScore {
    scores.get(id).copied().unwrap_or_default()
}

fn annotate(node: CommentNode, scores: &HashMap<String, TargetScore>) -> CommentThreadView {
    let TargetScore { score, user_vote } = lookup(scores, &node.comment.id);
    CommentThreadView {
        comment: node.comment,
        score,
        user_vote,
        replies: node
            .replies
            .into_iter()
            .map(|reply| annotate(reply, scores))
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::ledger::{InMemoryVoteLedger, VoteLedger};
    use crate::services::target::VoteTarget;
    use crate::services::vote::VoteValue;
    use chrono::Utc;
    use forum_common::{ListingConfig, PageRequest};
    use forum_db::entities::vote;
    use forum_db::repositories::VoteRepository;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::sync::Arc;

    fn create_test_post(id: &str) -> PostSummary {
        PostSummary {
            post: post::Model {
                id: id.to_string(),
                title: format!("post {id}"),
                content: String::new(),
                community_id: "c1".to_string(),
                author_id: None,
                created_at: Utc::now().into(),
            },
            comment_count: 2,
        }
    }

    fn create_test_comment(id: &str, parent_id: Option<&str>) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            content: String::new(),
            post_id: "p1".to_string(),
            parent_id: parent_id.map(ToString::to_string),
            author_id: "u1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn page<T>(items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        PageRequest::new(1, 10)
            .resolve(&ListingConfig::default())
            .into_page(items, total)
    }

    async fn assembler() -> FeedAssembler {
        let ledger = Arc::new(InMemoryVoteLedger::new());
        ledger.insert("a", &VoteTarget::post("p2"), VoteValue::Up).await.unwrap();
        ledger.insert("b", &VoteTarget::post("p2"), VoteValue::Up).await.unwrap();
        ledger.insert("a", &VoteTarget::comment("c2"), VoteValue::Down).await.unwrap();
        FeedAssembler::new(ScoreService::new(ledger))
    }

    #[tokio::test]
    async fn test_posts_keep_order_and_merge_scores() {
        let assembler = assembler().await;
        let input = page(vec![
            create_test_post("p3"),
            create_test_post("p2"),
            create_test_post("p1"),
        ]);

        let views = assembler.posts(input, &Viewer::user("a")).await.unwrap();

        let ids: Vec<&str> = views.items.iter().map(|v| v.post.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2", "p1"]);
        assert_eq!((views.items[1].score, views.items[1].user_vote), (2, 1));
        assert_eq!((views.items[0].score, views.items[0].user_vote), (0, 0));
        assert_eq!(views.items[1].comment_count, 2);
        assert_eq!(views.pagination.total, 3);
    }

    #[tokio::test]
    async fn test_anonymous_viewer_has_no_votes() {
        let assembler = assembler().await;
        let input = page(vec![create_test_post("p2")]);

        let views = assembler.posts(input, &Viewer::Anonymous).await.unwrap();

        assert_eq!(views.items[0].score, 2);
        assert_eq!(views.items[0].user_vote, 0);
    }

    #[tokio::test]
    async fn test_thread_scores_nested_replies() {
        let assembler = assembler().await;
        let nodes = vec![CommentNode {
            comment: create_test_comment("c1", None),
            replies: vec![CommentNode {
                comment: create_test_comment("c2", Some("c1")),
                replies: vec![],
            }],
        }];

        let views = assembler.thread(nodes, &Viewer::user("a")).await.unwrap();

        assert_eq!(views[0].score, 0);
        assert_eq!(views[0].replies[0].score, -1);
        assert_eq!(views[0].replies[0].user_vote, -1);
    }

    #[tokio::test]
    async fn test_comment_page_uses_one_batched_lookup() {
        // One sum query and one own-votes query; a third query would fail.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "target_id" => Into::<Value>::into("c2"),
                    "score" => Into::<Value>::into(5i64),
                }]])
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );
        let assembler = FeedAssembler::new(ScoreService::new(Arc::new(VoteRepository::new(db))));
        let input = page(vec![
            create_test_comment("c1", None),
            create_test_comment("c2", None),
            create_test_comment("c3", Some("c1")),
        ]);

        let views = assembler.comments(input, &Viewer::user("a")).await.unwrap();

        assert_eq!(views.items.len(), 3);
        assert_eq!(views.items[1].score, 5);
        assert_eq!(views.items[2].score, 0);
    }

    #[test]
    fn test_post_view_serializes_flat() {
        let view = PostView {
            post: create_test_post("p1").post,
            comment_count: 0,
            score: 3,
            user_vote: -1,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["score"], 3);
        assert_eq!(json["userVote"], -1);
        assert_eq!(json["commentCount"], 0);
    }
}
