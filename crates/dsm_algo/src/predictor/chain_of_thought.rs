//! Chain-of-thought textual Ranking Predictor.
//!
//! Prompts the backing text model for a single `<answer> reasoning <sep>
//! RANKING </answer>` block where RANKING is arrow notation over the
//! caller-supplied candidate labels, then parses and validates it,
//! retrying with an incremented seed on any parse/shape failure.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::arrow::parse_arrow;
use crate::envelope::extract_answer;
use crate::llm::{SampleTextClient, SampleTextRequest};

use super::{PredictorInput, PredictorOutput, RankingPredictor};

pub struct ChainOfThoughtPredictor {
    client: Arc<dyn SampleTextClient>,
}

impl ChainOfThoughtPredictor {
    pub fn new(client: Arc<dyn SampleTextClient>) -> Self {
        Self { client }
    }

    fn build_prompt(input: &PredictorInput<'_>) -> String {
        let mut prompt = format!(
            "Question: {}\n\nYour opinion: {}\n\nCandidate statements:\n",
            input.question, input.opinion
        );
        for (i, candidate) in input.candidates.iter().enumerate() {
            let label = (b'A' + i as u8) as char;
            prompt.push_str(&format!("{label}. {candidate}\n"));
        }
        if let (Some(winner), Some(critique)) = (input.previous_winner, input.critique) {
            prompt.push_str(&format!(
                "\nPrevious round's winning statement: {winner}\nYour critique of it: {critique}\n"
            ));
        }
        prompt.push_str(
            "\nRank the candidates from best to worst. Respond with exactly one block: \
             <answer> your reasoning <sep> your ranking in arrow notation, e.g. C > A = D > B \
             </answer>",
        );
        prompt
    }

    fn parse_response(raw: &str, k: usize) -> Result<Vec<i32>, String> {
        let envelope = extract_answer(raw).map_err(|e| e.to_string())?;
        let rank = parse_arrow(&envelope.payload).map_err(|e| e.to_string())?;
        if rank.len() != k {
            return Err(format!(
                "ranking length {} does not match candidate count {}",
                rank.len(),
                k
            ));
        }
        Ok(rank)
    }
}

#[async_trait]
impl RankingPredictor for ChainOfThoughtPredictor {
    async fn predict(&self, input: PredictorInput<'_>) -> PredictorOutput {
        let k = input.candidates.len();
        let prompt = Self::build_prompt(&input);
        let mut last_reason = String::new();

        for attempt in 0..=input.retry_limit {
            let seed = input.seed.wrapping_add(attempt);
            let request = SampleTextRequest::new(prompt.clone()).with_seed(seed);
            let raw = self.client.sample_text(request).await;
            if raw.is_empty() {
                last_reason = "empty model response".to_string();
                warn!(attempt, "ranking predictor got empty response, retrying");
                continue;
            }
            match Self::parse_response(&raw, k) {
                Ok(rank) => {
                    return PredictorOutput {
                        rank: Some(rank),
                        explanation: raw,
                    }
                }
                Err(reason) => {
                    warn!(attempt, %reason, "ranking predictor parse failure, retrying");
                    last_reason = reason;
                }
            }
        }

        PredictorOutput {
            rank: None,
            explanation: last_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockSampleTextClient;

    #[tokio::test]
    async fn parses_valid_response_first_try() {
        let client = Arc::new(MockSampleTextClient::new(""));
        client.push_response("<answer> because C is best <sep> C > A = B </answer>");
        let predictor = ChainOfThoughtPredictor::new(client);
        let candidates = vec!["s0".to_string(), "s1".to_string(), "s2".to_string()];
        let input = PredictorInput {
            question: "q",
            opinion: "o",
            candidates: &candidates,
            previous_winner: None,
            critique: None,
            retry_limit: 2,
            seed: 1,
        };
        let out = predictor.predict(input).await;
        assert_eq!(out.rank, Some(vec![1, 1, 0]));
    }

    #[tokio::test]
    async fn retries_then_gives_up_on_malformed_output() {
        let client = Arc::new(MockSampleTextClient::new("garbage no envelope"));
        let predictor = ChainOfThoughtPredictor::new(client);
        let candidates = vec!["s0".to_string(), "s1".to_string()];
        let input = PredictorInput {
            question: "q",
            opinion: "o",
            candidates: &candidates,
            previous_winner: None,
            critique: None,
            retry_limit: 2,
            seed: 1,
        };
        let out = predictor.predict(input).await;
        assert_eq!(out.rank, None);
        assert!(!out.explanation.is_empty());
    }
}
