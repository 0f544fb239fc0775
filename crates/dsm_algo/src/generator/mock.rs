//! Mock Statement Generator: returns a fixed, deterministic statement
//! without calling out to a model. Used by end-to-end tests.

use async_trait::async_trait;

use super::{GeneratorInput, GeneratorOutput, StatementGenerator};

#[derive(Debug, Clone)]
pub struct MockGenerator {
    pub statement: String,
}

impl MockGenerator {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new("a mock consensus statement")
    }
}

#[async_trait]
impl StatementGenerator for MockGenerator {
    async fn generate(&self, _input: GeneratorInput<'_>) -> GeneratorOutput {
        GeneratorOutput {
            statement: self.statement.clone(),
            explanation: "mock generator: fixed statement".to_string(),
        }
    }
}
