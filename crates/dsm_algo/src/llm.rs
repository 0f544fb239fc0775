//! The narrow external text-generation contract: `sample_text`.
//!
//! Modeled as a capability-set trait so the Ranking Predictor and Statement
//! Generator variants can be built against any backing implementation
//! (HTTP client, mock, length-based stub) without depending on a concrete
//! type.

use async_trait::async_trait;

/// One `sample_text` call's parameters.
#[derive(Debug, Clone)]
pub struct SampleTextRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub terminators: Vec<String>,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub seed: Option<u32>,
}

impl SampleTextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 1024,
            terminators: Vec::new(),
            temperature: 0.0,
            timeout_ms: 60_000,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// `sample_text(prompt, max_tokens, terminators, temperature, timeout, seed?)
/// -> string`. On failure or safety block, implementations return the empty
/// string; the caller treats empty as "retry with a new seed."
#[async_trait]
pub trait SampleTextClient: Send + Sync {
    async fn sample_text(&self, request: SampleTextRequest) -> String;
}

/// Fixed/scripted responses for tests and for the length-based and mock
/// predictor/generator variants, which never call out to a model at all.
#[derive(Debug, Default, Clone)]
pub struct MockSampleTextClient {
    responses: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<String>>>,
    pub(crate) fallback: String,
}

impl MockSampleTextClient {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            responses: Default::default(),
            fallback: fallback.into(),
        }
    }

    /// Queue a scripted response; `sample_text` returns queued values in
    /// FIFO order, falling back to `fallback` once the queue is drained.
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().expect("mock lock").push_back(response.into());
    }
}

#[async_trait]
impl SampleTextClient for MockSampleTextClient {
    async fn sample_text(&self, _request: SampleTextRequest) -> String {
        let mut queue = self.responses.lock().expect("mock lock");
        queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_serves_queued_then_fallback() {
        let client = MockSampleTextClient::new("fallback");
        client.push_response("first");
        client.push_response("second");
        let req = SampleTextRequest::new("prompt");
        assert_eq!(client.sample_text(req.clone()).await, "first");
        assert_eq!(client.sample_text(req.clone()).await, "second");
        assert_eq!(client.sample_text(req).await, "fallback");
    }
}
