//! The Statement Generator capability set: given a question, all
//! participant opinions, and optionally the previous round's winner and
//! aligned critiques, produce one candidate consensus statement plus an
//! explanation.

pub mod chain_of_thought;
pub mod mock;

pub use chain_of_thought::ChainOfThoughtGenerator;
pub use mock::MockGenerator;

use async_trait::async_trait;

/// Opinions (and, for critique rounds, the aligned critiques) are already
/// shuffled by the caller (the Mediation Engine) using the same permutation
/// for both lists.
#[derive(Debug, Clone)]
pub struct GeneratorInput<'a> {
    pub question: &'a str,
    pub opinions: &'a [String],
    pub previous_winner: Option<&'a str>,
    pub critiques: Option<&'a [String]>,
    pub retry_limit: u32,
    pub seed: u32,
}

#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub statement: String,
    pub explanation: String,
}

#[async_trait]
pub trait StatementGenerator: Send + Sync {
    async fn generate(&self, input: GeneratorInput<'_>) -> GeneratorOutput;
}
