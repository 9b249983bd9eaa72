//! Voting engine and content services for forum-rs.

pub mod services;

pub use services::*;

use std::sync::Arc;

use forum_common::Config;
use forum_db::repositories::{
    CommentRepository, CommunityRepository, PostRepository, UserRepository, VoteRepository,
};
use sea_orm::DatabaseConnection;

/// Every service wired against one database.
#[derive(Clone)]
pub struct ForumServices {
    /// Community creation and listing.
    pub communities: CommunityService,
    /// Post creation and listing.
    pub posts: PostService,
    /// Comments and reply threads.
    pub comments: CommentService,
    /// Vote casting.
    pub votes: VoteService,
    /// Score projections.
    pub scores: ScoreService,
    /// Scores merged into listings.
    pub feed: FeedAssembler,
}

impl ForumServices {
    /// Build the services over a database connection.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: &Config) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let community_repo = CommunityRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let ledger: VoteLedgerService = Arc::new(VoteRepository::new(Arc::clone(&db)));
        let targets: TargetDirectoryService = Arc::new(RepositoryTargetDirectory::new(
            post_repo.clone(),
            comment_repo.clone(),
        ));

        let scores = ScoreService::new(ledger.clone());

        Self {
            communities: CommunityService::new(
                community_repo.clone(),
                user_repo,
                config.listing.clone(),
            ),
            posts: PostService::new(post_repo.clone(), community_repo, config.listing.clone()),
            comments: CommentService::new(comment_repo, post_repo, config.listing.clone()),
            votes: VoteService::with_config(ledger, targets, &config.voting),
            feed: FeedAssembler::new(scores.clone()),
            scores,
        }
    }
}
