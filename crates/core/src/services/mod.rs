//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod community;
pub mod feed;
pub mod ledger;
pub mod post;
pub mod score;
pub mod target;
pub mod viewer;
pub mod vote;
pub mod vote_lock;

pub use comment::{CommentNode, CommentService, CreateCommentInput};
pub use community::{CommunityService, CommunitySummary, CreateCommunityInput};
pub use feed::{CommentThreadView, CommentView, FeedAssembler, PostView};
pub use ledger::{InMemoryVoteLedger, VoteLedger, VoteLedgerService};
pub use post::{CreatePostInput, PostService, PostSummary};
pub use score::{ScoreCheck, ScoreService, TargetScore};
pub use target::{
    InMemoryTargetDirectory, RepositoryTargetDirectory, TargetDirectory, TargetDirectoryService,
    VoteTarget,
};
pub use viewer::Viewer;
pub use vote::{
    LegacyVoteCommand, VoteCommand, VoteOutcome, VoteOutcomeResponse, VoteService, VoteTransition,
    VoteValue,
};
pub use vote_lock::{VoteGuard, VoteLocks};
