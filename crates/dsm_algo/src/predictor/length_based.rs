//! Length-based diagnostic Ranking Predictor: no model call, no failure mode.
//! `rank[i] = maxLen - len(statement_i)`, then normalized — used in tests and
//! as a cheap sanity baseline.

use async_trait::async_trait;

use crate::arrow::normalize;

use super::{PredictorInput, PredictorOutput, RankingPredictor};

#[derive(Debug, Default, Clone, Copy)]
pub struct LengthBasedPredictor;

#[async_trait]
impl RankingPredictor for LengthBasedPredictor {
    async fn predict(&self, input: PredictorInput<'_>) -> PredictorOutput {
        let max_len = input
            .candidates
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(0) as i64;
        let raw: Vec<i32> = input
            .candidates
            .iter()
            .map(|s| (max_len - s.chars().count() as i64) as i32)
            .collect();
        PredictorOutput {
            rank: Some(normalize(&raw)),
            explanation: "ranked by ascending statement length".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn longer_statements_rank_better() {
        // rank[i] = maxLen - len(statement_i): the longest statement gets the
        // smallest (best, 0) rank under this formula.
        let candidates = vec!["short".to_string(), "a bit longer".to_string()];
        let input = PredictorInput {
            question: "q",
            opinion: "o",
            candidates: &candidates,
            previous_winner: None,
            critique: None,
            retry_limit: 0,
            seed: 0,
        };
        let out = LengthBasedPredictor.predict(input).await;
        let rank = out.rank.unwrap();
        assert!(rank[0] > rank[1]);
    }
}
