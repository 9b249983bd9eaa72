//! Vote ledger: the authoritative set of active votes.
//!
//! At most one vote exists per (voter, target). Writes are conditional:
//! `insert` fails with `Conflict` when a vote is already there, and
//! `update_value`/`delete` fail with `NotFound` when the vote no longer holds
//! the value the caller read.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use forum_common::{AppError, AppResult, IdGenerator, Timer, get_metrics};
use forum_db::entities::vote;
use forum_db::repositories::VoteRepository;
use sea_orm::Set;
use tokio::sync::RwLock;

use super::target::VoteTarget;
use super::vote::VoteValue;

/// Storage for active votes.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// The active vote of a voter on a target.
    async fn find(&self, voter_id: &str, target_id: &str) -> AppResult<Option<vote::Model>>;

    /// Record a new vote. `Conflict` if the voter already has one on the target.
    async fn insert(
        &self,
        voter_id: &str,
        target: &VoteTarget,
        value: VoteValue,
    ) -> AppResult<vote::Model>;

    /// Flip a vote that still holds `expected`. `NotFound` otherwise.
    async fn update_value(
        &self,
        vote_id: &str,
        expected: VoteValue,
        value: VoteValue,
    ) -> AppResult<()>;

    /// Remove a vote that still holds `expected`. `NotFound` otherwise.
    async fn delete(&self, vote_id: &str, expected: VoteValue) -> AppResult<()>;

    /// Sum of vote values on a target.
    async fn sum_for_target(&self, target_id: &str) -> AppResult<i64>;

    /// Sums for many targets. Targets without votes may be absent.
    async fn sums_for_targets(&self, target_ids: &[String]) -> AppResult<HashMap<String, i64>>;

    /// A voter's stored values among the given targets.
    async fn values_for_voter(
        &self,
        voter_id: &str,
        target_ids: &[String],
    ) -> AppResult<HashMap<String, i16>>;

    /// Every active vote on a target.
    async fn votes_for_target(&self, target_id: &str) -> AppResult<Vec<vote::Model>>;

    /// Number of votes stored for a (voter, target) pair.
    async fn count_for_pair(&self, voter_id: &str, target_id: &str) -> AppResult<u64>;
}

/// Type alias for a shared vote ledger.
pub type VoteLedgerService = Arc<dyn VoteLedger>;

/// Run a ledger query and record its timing.
async fn timed<T>(query: impl Future<Output = AppResult<T>>) -> AppResult<T> {
    let timer = Timer::start();
    let result = query.await;
    get_metrics().record_db_query(timer.elapsed(), result.is_err());
    result
}

#[async_trait]
impl VoteLedger for VoteRepository {
    async fn find(&self, voter_id: &str, target_id: &str) -> AppResult<Option<vote::Model>> {
        timed(Self::find(self, voter_id, target_id)).await
    }

    async fn insert(
        &self,
        voter_id: &str,
        target: &VoteTarget,
        value: VoteValue,
    ) -> AppResult<vote::Model> {
        let model = vote::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            user_id: Set(voter_id.to_string()),
            target_id: Set(target.id.clone()),
            target_kind: Set(target.kind),
            value: Set(value.as_i16()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        timed(Self::insert(self, model)).await
    }

    async fn update_value(
        &self,
        vote_id: &str,
        expected: VoteValue,
        value: VoteValue,
    ) -> AppResult<()> {
        timed(Self::update_value(
            self,
            vote_id,
            expected.as_i16(),
            value.as_i16(),
        ))
        .await
    }

    async fn delete(&self, vote_id: &str, expected: VoteValue) -> AppResult<()> {
        timed(Self::delete(self, vote_id, expected.as_i16())).await
    }

    async fn sum_for_target(&self, target_id: &str) -> AppResult<i64> {
        timed(Self::sum_for_target(self, target_id)).await
    }

    async fn sums_for_targets(&self, target_ids: &[String]) -> AppResult<HashMap<String, i64>> {
        timed(Self::sums_for_targets(self, target_ids)).await
    }

    async fn values_for_voter(
        &self,
        voter_id: &str,
        target_ids: &[String],
    ) -> AppResult<HashMap<String, i16>> {
        let votes = timed(self.find_by_user_and_targets(voter_id, target_ids)).await?;
        Ok(votes.into_iter().map(|v| (v.target_id, v.value)).collect())
    }

    async fn votes_for_target(&self, target_id: &str) -> AppResult<Vec<vote::Model>> {
        timed(self.find_by_target(target_id)).await
    }

    async fn count_for_pair(&self, voter_id: &str, target_id: &str) -> AppResult<u64> {
        timed(Self::count_for_pair(self, voter_id, target_id)).await
    }
}

/// Vote ledger held in memory.
///
/// Keyed by (voter, target), so the one-vote-per-pair rule holds by
/// construction. Conditional writes behave as in the database ledger.
#[derive(Default)]
pub struct InMemoryVoteLedger {
    votes: RwLock<HashMap<(String, String), vote::Model>>,
    id_gen: IdGenerator,
}

impl InMemoryVoteLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active votes across all targets.
    pub async fn len(&self) -> usize {
        self.votes.read().await.len()
    }

    /// Whether no vote is stored.
    pub async fn is_empty(&self) -> bool {
        self.votes.read().await.is_empty()
    }

    /// Snapshot of every active vote.
    pub async fn all(&self) -> Vec<vote::Model> {
        self.votes.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl VoteLedger for InMemoryVoteLedger {
    async fn find(&self, voter_id: &str, target_id: &str) -> AppResult<Option<vote::Model>> {
        let votes = self.votes.read().await;
        Ok(votes
            .get(&(voter_id.to_string(), target_id.to_string()))
            .cloned())
    }

    async fn insert(
        &self,
        voter_id: &str,
        target: &VoteTarget,
        value: VoteValue,
    ) -> AppResult<vote::Model> {
        let mut votes = self.votes.write().await;
        let key = (voter_id.to_string(), target.id.clone());
        if votes.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "Vote already exists: {voter_id} on {target}"
            )));
        }

        let model = vote::Model {
            id: self.id_gen.generate(),
            user_id: voter_id.to_string(),
            target_id: target.id.clone(),
            target_kind: target.kind,
            value: value.as_i16(),
            created_at: Utc::now().into(),
            updated_at: None,
        };
        votes.insert(key, model.clone());
        Ok(model)
    }

    async fn update_value(
        &self,
        vote_id: &str,
        expected: VoteValue,
        value: VoteValue,
    ) -> AppResult<()> {
        let mut votes = self.votes.write().await;
        let vote = votes
            .values_mut()
            .find(|v| v.id == vote_id && v.value == expected.as_i16())
            .ok_or_else(|| AppError::NotFound(format!("Vote not found: {vote_id}")))?;

        vote.value = value.as_i16();
        vote.updated_at = Some(Utc::now().into());
        Ok(())
    }

    async fn delete(&self, vote_id: &str, expected: VoteValue) -> AppResult<()> {
        let mut votes = self.votes.write().await;
        let key = votes
            .iter()
            .find(|(_, v)| v.id == vote_id && v.value == expected.as_i16())
            .map(|(k, _)| k.clone())
            .ok_or_else(|| AppError::NotFound(format!("Vote not found: {vote_id}")))?;

        votes.remove(&key);
        Ok(())
    }

    async fn sum_for_target(&self, target_id: &str) -> AppResult<i64> {
        let votes = self.votes.read().await;
        Ok(votes
            .values()
            .filter(|v| v.target_id == target_id)
            .map(|v| i64::from(v.value))
            .sum())
    }

    async fn sums_for_targets(&self, target_ids: &[String]) -> AppResult<HashMap<String, i64>> {
        let votes = self.votes.read().await;
        let mut sums = HashMap::new();
        for vote in votes.values().filter(|v| target_ids.contains(&v.target_id)) {
            *sums.entry(vote.target_id.clone()).or_insert(0) += i64::from(vote.value);
        }
        Ok(sums)
    }

    async fn values_for_voter(
        &self,
        voter_id: &str,
        target_ids: &[String],
    ) -> AppResult<HashMap<String, i16>> {
        let votes = self.votes.read().await;
        Ok(target_ids
            .iter()
            .filter_map(|target_id| {
                votes
                    .get(&(voter_id.to_string(), target_id.clone()))
                    .map(|v| (target_id.clone(), v.value))
            })
            .collect())
    }

    async fn votes_for_target(&self, target_id: &str) -> AppResult<Vec<vote::Model>> {
        let votes = self.votes.read().await;
        Ok(votes
            .values()
            .filter(|v| v.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn count_for_pair(&self, voter_id: &str, target_id: &str) -> AppResult<u64> {
        let votes = self.votes.read().await;
        Ok(u64::from(
            votes.contains_key(&(voter_id.to_string(), target_id.to_string())),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use forum_db::entities::vote::TargetKind;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_insert_twice_conflicts() {
        let ledger = InMemoryVoteLedger::new();
        let target = VoteTarget::post("p1");

        ledger.insert("a", &target, VoteValue::Up).await.unwrap();
        let err = ledger
            .insert("a", &target, VoteValue::Down)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.count_for_pair("a", "p1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_conditional_update_and_delete() {
        let ledger = InMemoryVoteLedger::new();
        let vote = ledger
            .insert("a", &VoteTarget::post("p1"), VoteValue::Up)
            .await
            .unwrap();

        // Stale expectation loses.
        let err = ledger
            .update_value(&vote.id, VoteValue::Down, VoteValue::Up)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        ledger
            .update_value(&vote.id, VoteValue::Up, VoteValue::Down)
            .await
            .unwrap();
        assert_eq!(ledger.sum_for_target("p1").await.unwrap(), -1);

        let err = ledger.delete(&vote.id, VoteValue::Up).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        ledger.delete(&vote.id, VoteValue::Down).await.unwrap();
        assert!(ledger.is_empty().await);

        let err = ledger.delete(&vote.id, VoteValue::Down).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sums_and_voter_values() {
        let ledger = InMemoryVoteLedger::new();
        let p1 = VoteTarget::post("p1");
        let c1 = VoteTarget::comment("c1");

        ledger.insert("a", &p1, VoteValue::Up).await.unwrap();
        ledger.insert("b", &p1, VoteValue::Up).await.unwrap();
        ledger.insert("b", &c1, VoteValue::Down).await.unwrap();

        let ids = vec!["p1".to_string(), "c1".to_string(), "missing".to_string()];
        let sums = ledger.sums_for_targets(&ids).await.unwrap();
        assert_eq!(sums.get("p1"), Some(&2));
        assert_eq!(sums.get("c1"), Some(&-1));
        assert_eq!(sums.get("missing"), None);

        let values = ledger.values_for_voter("b", &ids).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("c1"), Some(&-1));

        let on_p1 = ledger.votes_for_target("p1").await.unwrap();
        assert_eq!(on_p1.len(), 2);
        assert!(on_p1.iter().all(|v| v.target_kind == TargetKind::Post));
    }

    #[tokio::test]
    async fn test_repository_ledger_lost_race() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let ledger: VoteLedgerService = Arc::new(VoteRepository::new(db));
        let err = ledger
            .update_value("v1", VoteValue::Up, VoteValue::Down)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }
}
