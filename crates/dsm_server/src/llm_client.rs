//! HTTP-backed [`SampleTextClient`]: POSTs a `sample_text` request to a
//! configured endpoint. Any transport error, non-2xx response, or
//! safety-block field is treated as the empty string, which the Ranking
//! Predictor / Statement Generator variants already interpret as "retry
//! with a new seed."

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dsm_algo::llm::{SampleTextClient, SampleTextRequest};

#[derive(Debug, Serialize)]
struct SampleTextBody<'a> {
    prompt: &'a str,
    max_tokens: u32,
    terminators: &'a [String],
    temperature: f32,
    seed: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SampleTextReply {
    #[serde(default)]
    text: String,
    #[serde(default)]
    blocked: bool,
}

pub struct HttpSampleTextClient {
    http: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl HttpSampleTextClient {
    pub fn new(endpoint: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl SampleTextClient for HttpSampleTextClient {
    async fn sample_text(&self, request: SampleTextRequest) -> String {
        let body = SampleTextBody {
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            terminators: &request.terminators,
            temperature: request.temperature,
            seed: request.seed,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(std::time::Duration::from_millis(request.timeout_ms))
            .query(&[("model", self.model_id.as_str())])
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "text model returned a non-2xx response");
                return String::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "text model request failed");
                return String::new();
            }
        };

        match response.json::<SampleTextReply>().await {
            Ok(reply) if reply.blocked => {
                tracing::warn!("text model response was safety-blocked");
                String::new()
            }
            Ok(reply) => reply.text,
            Err(e) => {
                tracing::warn!(error = %e, "text model response was not valid JSON");
                String::new()
            }
        }
    }
}
