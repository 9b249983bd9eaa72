//! Repositories over the forum tables.

mod comment;
mod community;
mod post;
mod user;
mod vote;

pub use comment::CommentRepository;
pub use community::CommunityRepository;
pub use post::PostRepository;
pub use user::UserRepository;
pub use vote::VoteRepository;
