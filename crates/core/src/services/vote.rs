//! Vote service: the single entry point for casting votes.

use forum_common::{AppError, AppResult, VoteTransitionKind, VotingConfig, get_metrics};
use forum_db::entities::vote::TargetKind;
use serde::{Deserialize, Serialize};

use super::ledger::VoteLedgerService;
use super::score::ScoreService;
use super::target::{TargetDirectoryService, VoteTarget};
use super::viewer::Viewer;
use super::vote_lock::VoteLocks;

/// Direction of a stored vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteValue {
    /// +1
    Up,
    /// -1
    Down,
}

impl VoteValue {
    /// Numeric value as stored.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Signed contribution to a score.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.as_i16() as i64
    }

    /// Read a value back from the ledger.
    pub fn from_stored(value: i16) -> AppResult<Self> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(AppError::Internal(format!(
                "Stored vote has invalid value {other}"
            ))),
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = AppError;

    /// Only -1 and +1 are accepted. Zero is not a way to retract: retracting
    /// means sending the active value again.
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(AppError::InvalidInput(format!(
                "Vote value must be -1 or 1, got {other}"
            ))),
        }
    }
}

/// A request to cast a vote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCommand {
    pub value: i64,
    pub target_id: String,
    pub target_kind: TargetKind,
}

impl VoteCommand {
    /// Create a vote command.
    #[must_use]
    pub fn new(target: VoteTarget, value: i64) -> Self {
        Self {
            value,
            target_id: target.id,
            target_kind: target.kind,
        }
    }

    /// Upvote a target.
    #[must_use]
    pub fn up(target: VoteTarget) -> Self {
        Self::new(target, 1)
    }

    /// Downvote a target.
    #[must_use]
    pub fn down(target: VoteTarget) -> Self {
        Self::new(target, -1)
    }
}

/// The older request shape carrying separate post and comment ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyVoteCommand {
    pub value: i64,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
}

impl TryFrom<LegacyVoteCommand> for VoteCommand {
    type Error = AppError;

    fn try_from(legacy: LegacyVoteCommand) -> Result<Self, Self::Error> {
        let target = VoteTarget::from_ids(legacy.post_id, legacy.comment_id)?;
        Ok(Self::new(target, legacy.value))
    }
}

/// What a cast did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No vote existed; one was created.
    Cast { value: VoteValue },
    /// The existing vote changed direction.
    Changed { from: VoteValue, to: VoteValue },
    /// The same value was sent again; the vote was removed.
    Retracted { removed: VoteValue },
}

impl VoteTransition {
    /// Wire name of the outcome.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cast { .. } => "cast",
            Self::Changed { .. } => "changed",
            Self::Retracted { .. } => "retracted",
        }
    }

    /// Signed change this transition makes to the target's score.
    #[must_use]
    pub const fn score_delta(&self) -> i64 {
        match self {
            Self::Cast { value } => value.as_i64(),
            Self::Changed { from, to } => to.as_i64() - from.as_i64(),
            Self::Retracted { removed } => -removed.as_i64(),
        }
    }

    /// The caller's vote once this transition has been applied, 0 when retracted.
    #[must_use]
    pub const fn user_vote(&self) -> i16 {
        match self {
            Self::Cast { value } | Self::Changed { to: value, .. } => value.as_i16(),
            Self::Retracted { .. } => 0,
        }
    }

    const fn kind(&self) -> VoteTransitionKind {
        match self {
            Self::Cast { .. } => VoteTransitionKind::Cast,
            Self::Changed { .. } => VoteTransitionKind::Changed,
            Self::Retracted { .. } => VoteTransitionKind::Retracted,
        }
    }
}

/// Result of a cast: the transition plus the state the caller now sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub transition: VoteTransition,
    /// Score after the transition.
    pub score: i64,
    /// The caller's vote after the transition, 0 when retracted.
    pub user_vote: i16,
}

/// Response body for a cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcomeResponse {
    pub outcome: &'static str,
    pub score: i64,
    pub user_vote: i16,
}

impl From<VoteOutcome> for VoteOutcomeResponse {
    fn from(outcome: VoteOutcome) -> Self {
        Self {
            outcome: outcome.transition.as_str(),
            score: outcome.score,
            user_vote: outcome.user_vote,
        }
    }
}

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    ledger: VoteLedgerService,
    targets: TargetDirectoryService,
    scores: ScoreService,
    locks: VoteLocks,
    conflict_retries: u32,
}

impl VoteService {
    /// Create a new vote service with default settings.
    #[must_use]
    pub fn new(ledger: VoteLedgerService, targets: TargetDirectoryService) -> Self {
        Self::with_config(ledger, targets, &VotingConfig::default())
    }

    /// Create a new vote service.
    #[must_use]
    pub fn with_config(
        ledger: VoteLedgerService,
        targets: TargetDirectoryService,
        config: &VotingConfig,
    ) -> Self {
        Self {
            scores: ScoreService::new(ledger.clone()),
            ledger,
            targets,
            locks: VoteLocks::new(),
            conflict_retries: config.conflict_retries,
        }
    }

    /// Cast a vote.
    ///
    /// With no vote on the target, the value is recorded. Sending the active
    /// value again retracts it; sending the other value flips it. Rejected
    /// commands leave the ledger untouched.
    pub async fn cast_vote(&self, viewer: &Viewer, command: VoteCommand) -> AppResult<VoteOutcome> {
        self.cast_vote_inner(viewer, command)
            .await
            .map_err(Self::rejected)
    }

    /// Cast a vote sent in the older `{value, postId?, commentId?}` shape.
    pub async fn cast_legacy_vote(
        &self,
        viewer: &Viewer,
        command: LegacyVoteCommand,
    ) -> AppResult<VoteOutcome> {
        if viewer.is_anonymous() {
            return Err(Self::rejected(AppError::Unauthorized));
        }
        let command = VoteCommand::try_from(command).map_err(Self::rejected)?;
        self.cast_vote(viewer, command).await
    }

    fn rejected(e: AppError) -> AppError {
        if !e.is_server_error() && !e.is_retryable() {
            get_metrics().record_vote_rejected();
        }
        e.log();
        e
    }

    async fn cast_vote_inner(
        &self,
        viewer: &Viewer,
        command: VoteCommand,
    ) -> AppResult<VoteOutcome> {
        let voter_id = viewer.user_id().ok_or(AppError::Unauthorized)?;
        let value = VoteValue::try_from(command.value)?;
        if command.target_id.trim().is_empty() {
            return Err(AppError::InvalidInput("Vote target id is empty".to_string()));
        }

        let target = VoteTarget::new(command.target_id, command.target_kind);
        if !self.targets.exists(&target).await? {
            return Err(AppError::TargetNotFound(target.to_string()));
        }

        let guard = self.locks.lock(voter_id, &target.id).await;
        let transition = self.apply_with_retry(voter_id, &target, value).await?;
        get_metrics().record_vote(transition.kind());
        // Read the score before another cast from this voter can land.
        let score = self.scores.score_of(&target.id).await?;
        drop(guard);
        let user_vote = transition.user_vote();

        tracing::info!(
            voter_id = %voter_id,
            target = %target,
            outcome = transition.as_str(),
            score,
            "Vote applied"
        );

        Ok(VoteOutcome {
            transition,
            score,
            user_vote,
        })
    }

    /// Run the toggle rule, re-reading after a lost race.
    async fn apply_with_retry(
        &self,
        voter_id: &str,
        target: &VoteTarget,
        value: VoteValue,
    ) -> AppResult<VoteTransition> {
        let mut attempt = 0;
        loop {
            match self.apply(voter_id, target, value).await {
                Ok(transition) => return Ok(transition),
                Err(AppError::Conflict(reason) | AppError::NotFound(reason)) => {
                    if attempt >= self.conflict_retries {
                        get_metrics().record_vote_conflict();
                        return Err(AppError::Conflict(format!(
                            "Vote on {target} changed concurrently: {reason}"
                        )));
                    }
                    attempt += 1;
                    get_metrics().record_vote_race();
                    tracing::warn!(
                        voter_id = %voter_id,
                        target = %target,
                        attempt,
                        reason = %reason,
                        "Lost vote race, retrying with a fresh read"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One read-decide-write pass.
    async fn apply(
        &self,
        voter_id: &str,
        target: &VoteTarget,
        value: VoteValue,
    ) -> AppResult<VoteTransition> {
        match self.ledger.find(voter_id, &target.id).await? {
            None => {
                self.ledger.insert(voter_id, target, value).await?;
                Ok(VoteTransition::Cast { value })
            }
            Some(existing) => {
                let current = VoteValue::from_stored(existing.value)?;
                if current == value {
                    self.ledger.delete(&existing.id, current).await?;
                    Ok(VoteTransition::Retracted { removed: current })
                } else {
                    self.ledger.update_value(&existing.id, current, value).await?;
                    Ok(VoteTransition::Changed {
                        from: current,
                        to: value,
                    })
                }
            }
        }
    }
}
