//! Vote entity: one directional vote by a user on a post or comment.
//!
//! A row exists only while the vote is active. Retracting a vote deletes the
//! row; a stored value is always -1 or +1, never 0.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of item a vote points at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[sea_orm(string_value = "post")]
    Post,
    #[sea_orm(string_value = "comment")]
    Comment,
}

impl TargetKind {
    /// Wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who voted
    #[sea_orm(indexed)]
    pub user_id: String,

    /// The post or comment voted on. Unique together with `user_id`.
    #[sea_orm(indexed)]
    pub target_id: String,

    pub target_kind: TargetKind,

    /// -1 or +1
    pub value: i16,

    pub created_at: DateTimeWithTimeZone,

    /// Set when the vote changed direction.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_wire_names() {
        assert_eq!(TargetKind::Post.as_str(), "post");
        assert_eq!(TargetKind::Comment.to_string(), "comment");
        assert_eq!(
            serde_json::to_string(&TargetKind::Comment).ok().as_deref(),
            Some("\"comment\"")
        );
    }

    #[test]
    fn test_target_kind_from_wire() {
        let kind: Result<TargetKind, _> = serde_json::from_str("\"post\"");
        assert!(matches!(kind, Ok(TargetKind::Post)));
        let bad: Result<TargetKind, _> = serde_json::from_str("\"note\"");
        assert!(bad.is_err());
    }
}
