//! Secondary generation tier: single-shot completions
//!
//! A plainer text-in, text-out service used when the session protocol
//! is down. One POST carries the full instruction pair and the sampling
//! parameters; the response is parsed with the same fence-tolerant
//! parser as the primary tier.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{AlmanacError, Result, UpstreamService};
use crate::models::{GenerationMethod, Interpretation};
use crate::net::read_json;

use super::{parse_interpretation, prompt, InterpretationProducer, InterpretationRequest};

const SERVICE: UpstreamService = UpstreamService::GenerationSecondary;

/// Client for the single-shot completion service.
#[derive(Debug)]
pub struct CompletionProducer {
    config: GenerationConfig,
    http: Client,
}

impl CompletionProducer {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AlmanacError::configuration(
                "generation service requires an API key",
            ));
        }
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AlmanacError::configuration(format!("HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    async fn complete(&self, user_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = CompletionRequest {
            model: &self.config.model,
            system: prompt::system_prompt(),
            prompt: user_prompt,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(SERVICE, e))?;
        let parsed: CompletionResponse = read_json(SERVICE, response).await?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl InterpretationProducer for CompletionProducer {
    fn method(&self) -> GenerationMethod {
        GenerationMethod::SecondaryCompletion
    }

    async fn produce(&self, request: &InterpretationRequest) -> Result<Interpretation> {
        debug!(fingerprint = %request.fingerprint, "requesting single-shot completion");
        let text = self.complete(&prompt::user_prompt(request)).await?;
        parse_interpretation(&text)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    system: String,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    /// Some deployments name the field "completion" instead
    #[serde(alias = "completion")]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::test_fixtures::event_request;

    #[test]
    fn request_serializes_with_sampling_parameters() {
        let request = CompletionRequest {
            model: "almanac-interpret-1",
            system: "system".to_string(),
            prompt: "prompt",
            max_tokens: 1024,
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "almanac-interpret-1");
        assert_eq!(json["max_tokens"], 1024);
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn response_accepts_both_field_spellings() {
        let canonical: CompletionResponse = serde_json::from_str(r#"{"text": "a"}"#).unwrap();
        assert_eq!(canonical.text, "a");

        let alias: CompletionResponse = serde_json::from_str(r#"{"completion": "b"}"#).unwrap();
        assert_eq!(alias.text, "b");
    }

    #[test]
    fn empty_api_key_is_a_configuration_error() {
        let config = GenerationConfig::new("https://generation.example", "");
        let err = CompletionProducer::new(config).unwrap_err();
        assert!(!err.advances_fallback());
    }

    #[tokio::test]
    #[ignore = "Requires GENERATION_BASE_URL and GENERATION_API_KEY environment variables"]
    async fn live_completion_round_trip() {
        let config = crate::config::GenerationConfig::from_env()
            .unwrap()
            .expect("generation service not configured");
        let producer = CompletionProducer::new(config).unwrap();
        let interpretation = producer.produce(&event_request()).await.unwrap();
        assert!(interpretation.has_required_fields());
    }
}
