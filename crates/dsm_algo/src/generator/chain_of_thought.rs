//! Chain-of-thought Statement Generator: prompts the backing text model for
//! one `<answer> reasoning <sep> STATEMENT </answer>` block, parsed by the
//! same envelope rules as the Ranking Predictor, retrying on malformed
//! output.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::envelope::extract_answer;
use crate::llm::{SampleTextClient, SampleTextRequest};

use super::{GeneratorInput, GeneratorOutput, StatementGenerator};

/// A parsed statement shorter than this is treated as malformed output and
/// triggers a retry.
const MIN_STATEMENT_LEN: usize = 5;

pub struct ChainOfThoughtGenerator {
    client: Arc<dyn SampleTextClient>,
}

impl ChainOfThoughtGenerator {
    pub fn new(client: Arc<dyn SampleTextClient>) -> Self {
        Self { client }
    }

    fn build_prompt(input: &GeneratorInput<'_>) -> String {
        let mut prompt = format!("Question: {}\n\nOpinions:\n", input.question);
        for (i, opinion) in input.opinions.iter().enumerate() {
            prompt.push_str(&format!("Opinion Person {}: {}\n", i + 1, opinion));
        }
        if let Some(winner) = input.previous_winner {
            prompt.push_str(&format!("\nPrevious round's winning statement: {winner}\n"));
            if let Some(critiques) = input.critiques {
                prompt.push_str("\nCritiques of that statement:\n");
                for (i, critique) in critiques.iter().enumerate() {
                    prompt.push_str(&format!("Critique Person {}: {}\n", i + 1, critique));
                }
            }
        }
        prompt.push_str(
            "\nPropose a single consensus statement that best captures common ground. \
             Respond with exactly one block: <answer> your reasoning <sep> your statement \
             </answer>",
        );
        prompt
    }
}

#[async_trait]
impl StatementGenerator for ChainOfThoughtGenerator {
    async fn generate(&self, input: GeneratorInput<'_>) -> GeneratorOutput {
        let prompt = Self::build_prompt(&input);
        let mut last = GeneratorOutput {
            statement: String::new(),
            explanation: "exhausted retries with no usable statement".to_string(),
        };

        for attempt in 0..=input.retry_limit {
            let seed = input.seed.wrapping_add(attempt);
            let request = SampleTextRequest::new(prompt.clone()).with_seed(seed);
            let raw = self.client.sample_text(request).await;
            if raw.is_empty() {
                warn!(attempt, "statement generator got empty response, retrying");
                continue;
            }
            match extract_answer(&raw) {
                Ok(envelope) if envelope.payload.chars().count() > MIN_STATEMENT_LEN => {
                    return GeneratorOutput {
                        statement: envelope.payload,
                        explanation: envelope.reasoning,
                    };
                }
                Ok(envelope) => {
                    warn!(attempt, "statement generator output too short, retrying");
                    last.statement = envelope.payload;
                }
                Err(reason) => {
                    warn!(attempt, %reason, "statement generator parse failure, retrying");
                }
            }
        }

        // Best-effort: accept the empty (or too-short) statement rather than
        // failing the round — losing one candidate is recoverable, unlike a
        // nil ranking.
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockSampleTextClient;

    #[tokio::test]
    async fn parses_valid_response() {
        let client = Arc::new(MockSampleTextClient::new(""));
        client.push_response("<answer> common ground found <sep> We agree on X. </answer>");
        let generator = ChainOfThoughtGenerator::new(client);
        let opinions = vec!["a".to_string(), "b".to_string()];
        let input = GeneratorInput {
            question: "q",
            opinions: &opinions,
            previous_winner: None,
            critiques: None,
            retry_limit: 1,
            seed: 0,
        };
        let out = generator.generate(input).await;
        assert_eq!(out.statement, "We agree on X.");
    }

    #[tokio::test]
    async fn accepts_empty_after_exhausting_retries() {
        let client = Arc::new(MockSampleTextClient::new(""));
        let generator = ChainOfThoughtGenerator::new(client);
        let opinions = vec!["a".to_string()];
        let input = GeneratorInput {
            question: "q",
            opinions: &opinions,
            previous_winner: None,
            critiques: None,
            retry_limit: 1,
            seed: 0,
        };
        let out = generator.generate(input).await;
        assert_eq!(out.statement, "");
    }
}
