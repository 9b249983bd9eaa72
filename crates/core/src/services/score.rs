//! Score aggregation.
//!
//! Scores are always summed from the ledger on read. Nothing is cached, so
//! there is no counter that could drift from the stored votes.

use std::collections::HashMap;

use forum_common::{AppResult, get_metrics};
use serde::Serialize;

use super::ledger::VoteLedgerService;

/// Score of a target and the viewer's own vote on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetScore {
    /// Sum of all active vote values.
    pub score: i64,
    /// The viewer's stored value, or 0 when there is none.
    pub user_vote: i16,
}

/// Result of checking a target's aggregate against its stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreCheck {
    /// Score as returned by the aggregate query.
    pub aggregate: i64,
    /// Score summed row by row.
    pub recomputed: i64,
    /// Number of active votes.
    pub rows: usize,
}

impl ScoreCheck {
    /// Whether both computations agree.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.aggregate == self.recomputed
    }
}

/// Score service for read projections over the vote ledger.
#[derive(Clone)]
pub struct ScoreService {
    ledger: VoteLedgerService,
}

impl ScoreService {
    /// Create a new score service.
    #[must_use]
    pub const fn new(ledger: VoteLedgerService) -> Self {
        Self { ledger }
    }

    /// Score of a single target.
    pub async fn score_of(&self, target_id: &str) -> AppResult<i64> {
        get_metrics().record_score_query();
        self.ledger.sum_for_target(target_id).await
    }

    /// Score of a target plus the voter's own vote.
    pub async fn score_and_user_vote(
        &self,
        target_id: &str,
        voter_id: Option<&str>,
    ) -> AppResult<TargetScore> {
        let score = self.score_of(target_id).await?;
        let user_vote = match voter_id {
            Some(voter_id) => self
                .ledger
                .find(voter_id, target_id)
                .await?
                .map_or(0, |v| v.value),
            None => 0,
        };

        Ok(TargetScore { score, user_vote })
    }

    /// Scores for a page of targets.
    ///
    /// Issues one sum query, plus one query for the voter's own votes when a
    /// voter is given, however many ids there are. Every requested id is in
    /// the result; ids without votes map to a zero score.
    pub async fn scores_for(
        &self,
        target_ids: &[String],
        voter_id: Option<&str>,
    ) -> AppResult<HashMap<String, TargetScore>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids = target_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        get_metrics().record_score_query();
        let sums = self.ledger.sums_for_targets(&ids).await?;
        let own = match voter_id {
            Some(voter_id) => self.ledger.values_for_voter(voter_id, &ids).await?,
            None => HashMap::new(),
        };

        Ok(ids
            .into_iter()
            .map(|id| {
                let score = TargetScore {
                    score: sums.get(&id).copied().unwrap_or(0),
                    user_vote: own.get(&id).copied().unwrap_or(0),
                };
                (id, score)
            })
            .collect())
    }

    /// Compare the aggregate query with a row-by-row sum.
    pub async fn verify_score(&self, target_id: &str) -> AppResult<ScoreCheck> {
        let aggregate = self.ledger.sum_for_target(target_id).await?;
        let votes = self.ledger.votes_for_target(target_id).await?;

        Ok(ScoreCheck {
            aggregate,
            recomputed: votes.iter().map(|v| i64::from(v.value)).sum(),
            rows: votes.len(),
        })
    }
}
