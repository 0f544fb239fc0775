//! Mock Ranking Predictor: always abstains. Used by tests that want to
//! exercise the aggregator's MOCK-row handling without exercising a model.

use async_trait::async_trait;

use crate::arrow::MOCK;

use super::{PredictorInput, PredictorOutput, RankingPredictor};

#[derive(Debug, Default, Clone, Copy)]
pub struct MockPredictor;

#[async_trait]
impl RankingPredictor for MockPredictor {
    async fn predict(&self, input: PredictorInput<'_>) -> PredictorOutput {
        PredictorOutput {
            rank: Some(vec![MOCK; input.candidates.len()]),
            explanation: "mock predictor: abstained".to_string(),
        }
    }
}
