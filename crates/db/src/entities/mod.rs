//! Database entities.

pub mod comment;
pub mod community;
pub mod community_member;
pub mod post;
pub mod user;
pub mod vote;

pub use comment::Entity as Comment;
pub use community::Entity as Community;
pub use community_member::Entity as CommunityMember;
pub use post::Entity as Post;
pub use user::Entity as User;
pub use vote::Entity as Vote;
