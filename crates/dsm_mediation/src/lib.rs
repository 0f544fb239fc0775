//! The Mediation Engine: composes the Statement Generator, Ranking
//! Predictor, and Social-Choice Aggregator into one deliberation round.
//!
//! **Seed discipline.** The engine holds a single [`EngineRng`]; each
//! sub-call (a Statement Generator draw, a Ranking Predictor call, the
//! aggregator run) consumes a fresh 32-bit seed from it, and shuffles draw
//! their permutation directly from the same stream. Given the same inputs
//! and the same top-level seed, a round is bitwise reproducible.

#![forbid(unsafe_code)]

use std::sync::Arc;

use dsm_core::EngineRng;

use dsm_algo::generator::{GeneratorInput, StatementGenerator};
use dsm_algo::predictor::{PredictorInput, RankingPredictor};
use dsm_algo::schulze::{aggregate, SchulzeError, TiePolicy};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RoundError {
    /// A participant's ranking came back nil (unrecoverable parse failure)
    /// even after retries — fatal for the round.
    #[error("participant {participant_index} returned a nil ranking; aborting round")]
    NilRanking { participant_index: usize },
    #[error("social-choice aggregation failed: {0}")]
    Aggregation(#[from] SchulzeError),
}

/// Inputs to one round. `opinions` and, for critique rounds, `critiques` are
/// aligned by index (one entry per participant) and in canonical
/// (unshuffled) order; the engine shuffles its own working copies.
#[derive(Debug, Clone)]
pub struct RoundInput<'a> {
    pub question: &'a str,
    pub opinions: &'a [String],
    pub previous_winner: Option<&'a str>,
    pub critiques: Option<&'a [String]>,
    pub num_candidates: usize,
    pub retry_limit: u32,
    pub tie_policy: TiePolicy,
}

/// One round's full output. `statements`/`explanations`/`social_ranks` are
/// sorted by the social ranking (index 0 is the round winner); `rankings` is
/// the raw `R[C][N]` canonical-order matrix, kept for telemetry.
#[derive(Debug, Clone)]
pub struct RoundOutput {
    pub statements: Vec<String>,
    pub explanations: Vec<String>,
    /// 1-indexed: `social_ranks[i]` is the persisted `social_rank` of
    /// `statements[i]`.
    pub social_ranks: Vec<i32>,
    pub rankings: Vec<Vec<i32>>,
    pub ranking_explanations: Vec<String>,
    pub tied_ranks: Vec<i32>,
    pub untied_ranks: Vec<i32>,
}

impl RoundOutput {
    /// The round winner: the statement sorted into position 0.
    pub fn winner(&self) -> &str {
        self.statements
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

pub struct MediationEngine {
    generator: Arc<dyn StatementGenerator>,
    predictor: Arc<dyn RankingPredictor>,
    rng: EngineRng,
}

impl MediationEngine {
    pub fn new(
        generator: Arc<dyn StatementGenerator>,
        predictor: Arc<dyn RankingPredictor>,
        seed: u64,
    ) -> Self {
        Self {
            generator,
            predictor,
            rng: EngineRng::from_seed_u64(seed),
        }
    }

    /// Run one round to completion. Consumes the engine's RNG stream; callers
    /// construct a fresh engine per round (seeded by the caller, typically
    /// the Deliberation State Machine) rather than reusing one across rounds.
    pub async fn run_round(&mut self, input: RoundInput<'_>) -> Result<RoundOutput, RoundError> {
        let n = input.num_candidates;
        let c = input.opinions.len();

        let mut statements = Vec::with_capacity(n);
        let mut explanations = Vec::with_capacity(n);
        for _ in 0..n {
            let perm = self.rng.permutation(c);
            let shuffled_opinions: Vec<String> =
                perm.iter().map(|&idx| input.opinions[idx].clone()).collect();
            let shuffled_critiques: Option<Vec<String>> = input
                .critiques
                .map(|critiques| perm.iter().map(|&idx| critiques[idx].clone()).collect());

            let seed = self.rng.next_seed_u32();
            let gen_input = GeneratorInput {
                question: input.question,
                opinions: &shuffled_opinions,
                previous_winner: input.previous_winner,
                critiques: shuffled_critiques.as_deref(),
                retry_limit: input.retry_limit,
                seed,
            };
            let out = self.generator.generate(gen_input).await;
            statements.push(out.statement);
            explanations.push(out.explanation);
        }

        let mut rows: Vec<Vec<i32>> = Vec::with_capacity(c);
        let mut ranking_explanations = Vec::with_capacity(c);
        for participant_index in 0..c {
            let perm = self.rng.permutation(n);
            let shuffled_statements: Vec<String> =
                perm.iter().map(|&idx| statements[idx].clone()).collect();
            let critique = input.critiques.map(|cr| cr[participant_index].as_str());

            let seed = self.rng.next_seed_u32();
            let pred_input = PredictorInput {
                question: input.question,
                opinion: &input.opinions[participant_index],
                candidates: &shuffled_statements,
                previous_winner: input.previous_winner,
                critique,
                retry_limit: input.retry_limit,
                seed,
            };
            let out = self.predictor.predict(pred_input).await;
            let shuffled_rank = out.rank.ok_or(RoundError::NilRanking { participant_index })?;

            let mut canonical_rank = vec![0i32; n];
            for (label_pos, &original_idx) in perm.iter().enumerate() {
                canonical_rank[original_idx] = shuffled_rank[label_pos];
            }
            rows.push(canonical_rank);
            ranking_explanations.push(out.explanation);
        }

        let seed = self.rng.next_seed_u32();
        let mut sub_rng = EngineRng::from_seed_u64(seed as u64);
        let social = aggregate(&rows, n, input.tie_policy, &mut sub_rng)?;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| social.untied_ranks[i]);

        let sorted_statements = order.iter().map(|&i| statements[i].clone()).collect();
        let sorted_explanations = order.iter().map(|&i| explanations[i].clone()).collect();
        let social_ranks: Vec<i32> = (1..=n as i32).collect();

        Ok(RoundOutput {
            statements: sorted_statements,
            explanations: sorted_explanations,
            social_ranks,
            rankings: rows,
            ranking_explanations,
            tied_ranks: social.tied_ranks,
            untied_ranks: social.untied_ranks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsm_algo::generator::MockGenerator;
    use dsm_algo::predictor::LengthBasedPredictor;

    #[tokio::test]
    async fn opinion_round_produces_n_statements_and_a_strict_social_order() {
        let generator = Arc::new(MockGenerator::new("we should do X"));
        let predictor = Arc::new(LengthBasedPredictor);
        let mut engine = MediationEngine::new(generator, predictor, 42);

        let opinions = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let input = RoundInput {
            question: "what should we do?",
            opinions: &opinions,
            previous_winner: None,
            critiques: None,
            num_candidates: 3,
            retry_limit: 1,
            tie_policy: TiePolicy::Tbrc,
        };
        let out = engine.run_round(input).await.unwrap();
        assert_eq!(out.statements.len(), 3);
        assert_eq!(out.social_ranks, vec![1, 2, 3]);
        assert!(!out.winner().is_empty());
    }

    #[tokio::test]
    async fn nil_ranking_aborts_the_round() {
        use async_trait::async_trait;
        use dsm_algo::predictor::{PredictorInput as PIn, PredictorOutput, RankingPredictor};

        struct AlwaysNil;
        #[async_trait]
        impl RankingPredictor for AlwaysNil {
            async fn predict(&self, _input: PIn<'_>) -> PredictorOutput {
                PredictorOutput {
                    rank: None,
                    explanation: "simulated parse failure".to_string(),
                }
            }
        }

        let generator = Arc::new(MockGenerator::default());
        let predictor = Arc::new(AlwaysNil);
        let mut engine = MediationEngine::new(generator, predictor, 7);

        let opinions = vec!["a".to_string(), "b".to_string()];
        let input = RoundInput {
            question: "q",
            opinions: &opinions,
            previous_winner: None,
            critiques: None,
            num_candidates: 2,
            retry_limit: 0,
            tie_policy: TiePolicy::Tbrc,
        };
        let err = engine.run_round(input).await.unwrap_err();
        assert!(matches!(err, RoundError::NilRanking { participant_index: 0 }));
    }
}
