//! Vote repository: storage for the vote ledger.
//!
//! Every write is conditional on what the caller last read, so two racing
//! writers on the same (user, target) pair cannot both succeed:
//! - insert relies on the unique (`user_id`, `target_id`) index,
//! - update and delete match on both the row id and the value read.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Vote, vote};
use chrono::Utc;
use forum_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QuerySelect, SqlErr, sea_query::Expr,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, FromQueryResult)]
struct ScoreSum {
    score: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct TargetScoreSum {
    target_id: String,
    score: Option<i64>,
}

/// Map an insert failure, turning a unique-index hit into a retryable conflict.
fn map_insert_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            AppError::Conflict(format!("Vote already exists: {detail}"))
        }
        _ => AppError::Database(err.to_string()),
    }
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the active vote of a user on a target.
    pub async fn find(&self, user_id: &str, target_id: &str) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::TargetId.eq(target_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new vote. Fails with `Conflict` if the user already has a
    /// vote on this target.
    pub async fn insert(&self, model: vote::ActiveModel) -> AppResult<vote::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_insert_err)
    }

    /// Change a vote's value, provided it still holds `expected`.
    ///
    /// Fails with `NotFound` when the row is gone or was changed by someone else.
    pub async fn update_value(&self, id: &str, expected: i16, value: i16) -> AppResult<()> {
        let result = Vote::update_many()
            .col_expr(vote::Column::Value, Expr::value(value))
            .col_expr(
                vote::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(vote::Column::Id.eq(id))
            .filter(vote::Column::Value.eq(expected))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Vote not found: {id}")));
        }
        Ok(())
    }

    /// Delete a vote, provided it still holds `expected`.
    ///
    /// Fails with `NotFound` when the row is gone or was changed by someone else.
    pub async fn delete(&self, id: &str, expected: i16) -> AppResult<()> {
        let result = Vote::delete_many()
            .filter(vote::Column::Id.eq(id))
            .filter(vote::Column::Value.eq(expected))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Vote not found: {id}")));
        }
        Ok(())
    }

    /// Sum of vote values on a target. Zero when there are no votes.
    pub async fn sum_for_target(&self, target_id: &str) -> AppResult<i64> {
        let row = Vote::find()
            .select_only()
            .column_as(Expr::col(vote::Column::Value).sum(), "score")
            .filter(vote::Column::TargetId.eq(target_id))
            .into_model::<ScoreSum>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.and_then(|r| r.score).unwrap_or(0))
    }

    /// Sums of vote values for many targets in one query.
    ///
    /// Targets without votes are absent from the map.
    pub async fn sums_for_targets(&self, target_ids: &[String]) -> AppResult<HashMap<String, i64>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Vote::find()
            .select_only()
            .column(vote::Column::TargetId)
            .column_as(Expr::col(vote::Column::Value).sum(), "score")
            .filter(vote::Column::TargetId.is_in(target_ids.to_vec()))
            .group_by(vote::Column::TargetId)
            .into_model::<TargetScoreSum>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.target_id, r.score.unwrap_or(0)))
            .collect())
    }

    /// A user's active votes among the given targets.
    pub async fn find_by_user_and_targets(
        &self,
        user_id: &str,
        target_ids: &[String],
    ) -> AppResult<Vec<vote::Model>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }

        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::TargetId.is_in(target_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All active votes on a target.
    pub async fn find_by_target(&self, target_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::TargetId.eq(target_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of rows for a (user, target) pair. Never more than one.
    pub async fn count_for_pair(&self, user_id: &str, target_id: &str) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::TargetId.eq(target_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
