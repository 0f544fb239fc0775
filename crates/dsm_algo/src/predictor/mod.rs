//! The Ranking Predictor capability set: given a question, a participant's
//! opinion, and K ≥ 2 shuffled candidate statements, produce a length-K
//! rank vector (0 = best, ties allowed) plus a free-form explanation.
//!
//! Three interchangeable implementations conform to the same
//! [`RankingPredictor`] trait, so the Mediation Engine can swap one in for
//! another without touching its round logic.

pub mod chain_of_thought;
pub mod length_based;
pub mod mock;

pub use chain_of_thought::ChainOfThoughtPredictor;
pub use length_based::LengthBasedPredictor;
pub use mock::MockPredictor;

use async_trait::async_trait;

/// Candidates are pre-shuffled and pre-labeled A, B, C, ... by the caller
/// (the Mediation Engine); the predictor deals only in this label order and
/// never sees the canonical candidate identity.
#[derive(Debug, Clone)]
pub struct PredictorInput<'a> {
    pub question: &'a str,
    pub opinion: &'a str,
    pub candidates: &'a [String],
    pub previous_winner: Option<&'a str>,
    pub critique: Option<&'a str>,
    pub retry_limit: u32,
    pub seed: u32,
}

/// `rank` is `None` on unrecoverable parse failure ("nil" — fatal for the
/// round); `Some(all-MOCK)` is a valid abstention, not a failure.
#[derive(Debug, Clone)]
pub struct PredictorOutput {
    pub rank: Option<Vec<i32>>,
    pub explanation: String,
}

#[async_trait]
pub trait RankingPredictor: Send + Sync {
    async fn predict(&self, input: PredictorInput<'_>) -> PredictorOutput;
}
