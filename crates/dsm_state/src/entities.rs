//! Entities and validation bounds.

use dsm_core::{
    CritiqueId, DeliberationId, FeedbackId, OpinionId, ParticipantId, RankingId, StatementId,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub const MIN_MAX_PARTICIPANTS: u32 = 2;
pub const MAX_MAX_PARTICIPANTS: u32 = 100;
pub const MIN_CRITIQUE_ROUNDS: u32 = 1;
pub const MAX_CRITIQUE_ROUNDS: u32 = 5;
pub const OPINION_TEXT_LEN: std::ops::RangeInclusive<usize> = 10..=5000;
pub const CRITIQUE_TEXT_LEN: std::ops::RangeInclusive<usize> = 10..=5000;
pub const QUESTION_LEN: std::ops::RangeInclusive<usize> = 10..=1000;
pub const FEEDBACK_AGREEMENT: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Opinion,
    Ranking,
    Critique,
    Concluded,
    Finalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub human_name: String,
    /// Salted SHA-256 hash of the credential token; the plaintext token is
    /// returned only once, at registration.
    pub token_hash: String,
    pub created_at: Timestamp,
    pub last_active_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliberation {
    pub id: DeliberationId,
    pub question: String,
    pub stage: Stage,
    pub created_by: ParticipantId,
    /// Frozen at the count of opinions once OPINION is left; `None` until
    /// then.
    pub participant_count: Option<u32>,
    pub max_participants: Option<u32>,
    pub num_critique_rounds: u32,
    /// 0 is the opinion round; 1..=num_critique_rounds are critique rounds.
    pub current_round: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub concluded_at: Option<Timestamp>,
    pub finalized_at: Option<Timestamp>,
    pub metadata: Json,
    /// Set when a round aborts: the stage is left unchanged, but the
    /// failure is recorded for operators.
    pub last_round_failure: Option<(Timestamp, String)>,
}

impl Deliberation {
    pub fn is_accepting_opinions(&self) -> bool {
        self.stage == Stage::Opinion
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opinion {
    pub id: OpinionId,
    pub deliberation_id: DeliberationId,
    pub participant_id: ParticipantId,
    pub text: String,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub deliberation_id: DeliberationId,
    pub round_number: u32,
    pub text: String,
    /// 1 is the winner, increasing for worse. `None` only transiently during
    /// construction; every persisted statement has it set.
    pub social_rank: Option<u32>,
    pub generated_at: Timestamp,
    pub metadata: Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub id: RankingId,
    pub deliberation_id: DeliberationId,
    pub participant_id: ParticipantId,
    pub round_number: u32,
    pub ranks: Vec<(StatementId, u32)>,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    pub id: CritiqueId,
    pub deliberation_id: DeliberationId,
    pub participant_id: ParticipantId,
    pub round_number: u32,
    pub winning_statement: StatementId,
    pub text: String,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanFeedback {
    pub id: FeedbackId,
    pub deliberation_id: DeliberationId,
    pub participant_id: ParticipantId,
    pub final_statement: StatementId,
    pub agreement: u8,
    pub text: Option<String>,
    pub submitted_at: Timestamp,
}
