//! Primary generation tier: the session protocol
//!
//! The richer of the two remote services works asynchronously: open a
//! session, post the request as a user message, poll the session status
//! until it completes, then read the assistant's final message. Polling
//! runs on a fixed interval under a hard wall-clock budget so a wedged
//! session degrades to the next tier instead of stalling book assembly.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{AlmanacError, Result, UpstreamService};
use crate::models::{GenerationMethod, Interpretation};
use crate::net::read_json;

use super::{parse_interpretation, prompt, InterpretationProducer, InterpretationRequest};

const SERVICE: UpstreamService = UpstreamService::GenerationPrimary;

/// Client for the session-based generation service.
#[derive(Debug)]
pub struct SessionProducer {
    config: GenerationConfig,
    http: Client,
}

impl SessionProducer {
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

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn create_session(&self) -> Result<String> {
        let request = CreateSessionRequest {
            model: &self.config.model,
            system: prompt::system_prompt(),
        };
        let response = self
            .http
            .post(self.url("/v1/sessions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(SERVICE, e))?;
        let parsed: CreateSessionResponse = read_json(SERVICE, response).await?;
        Ok(parsed.session_id)
    }

    async fn post_message(&self, session_id: &str, content: &str) -> Result<()> {
        let request = PostMessageRequest {
            role: "user",
            content,
        };
        let response = self
            .http
            .post(self.url(&format!("/v1/sessions/{session_id}/messages")))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(SERVICE, e))?;
        // ack payload shape is service-internal, only the status matters
        read_json::<serde_json::Value>(SERVICE, response).await?;
        Ok(())
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatusResponse> {
        let response = self
            .http
            .get(self.url(&format!("/v1/sessions/{session_id}")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(SERVICE, e))?;
        read_json(SERVICE, response).await
    }

    async fn poll_until_complete(&self, session_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.poll_budget;
        loop {
            let status = self.session_status(session_id).await?;
            match status.status {
                SessionState::Completed => return Ok(()),
                SessionState::Failed => {
                    return Err(AlmanacError::unavailable(
                        SERVICE,
                        format!(
                            "session failed: {}",
                            status.error.as_deref().unwrap_or("no reason given")
                        ),
                    ));
                }
                SessionState::Queued | SessionState::InProgress => {
                    if Instant::now() + self.config.poll_interval >= deadline {
                        return Err(AlmanacError::unavailable(
                            SERVICE,
                            format!(
                                "session still {:?} after {:?} budget",
                                status.status, self.config.poll_budget
                            ),
                        ));
                    }
                    sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    async fn final_message(&self, session_id: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(&format!("/v1/sessions/{session_id}/messages")))
            .query(&[("role", "assistant"), ("limit", "1")])
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(SERVICE, e))?;
        let parsed: MessagesResponse = read_json(SERVICE, response).await?;
        // the filter is also applied here in case the service ignores it
        last_assistant(&parsed.messages)
            .map(str::to_string)
            .ok_or_else(|| {
                AlmanacError::data_integrity("completed session has no assistant message")
            })
    }
}

#[async_trait]
impl InterpretationProducer for SessionProducer {
    fn method(&self) -> GenerationMethod {
        GenerationMethod::PrimarySession
    }

    async fn produce(&self, request: &InterpretationRequest) -> Result<Interpretation> {
        let session_id = self.create_session().await?;
        debug!(%session_id, fingerprint = %request.fingerprint, "generation session opened");
        self.post_message(&session_id, &prompt::user_prompt(request))
            .await?;
        self.poll_until_complete(&session_id).await?;
        let text = self.final_message(&session_id).await?;
        parse_interpretation(&text)
    }
}

fn last_assistant(messages: &[SessionMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "assistant")
        .map(|m| m.content.as_str())
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    model: &'a str,
    system: String,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    status: SessionState,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SessionState {
    Queued,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<SessionMessage>,
}

#[derive(Debug, Deserialize)]
struct SessionMessage {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::test_fixtures::event_request;

    #[test]
    fn session_states_decode_from_wire_names() {
        let parsed: SessionStatusResponse =
            serde_json::from_str(r#"{"status": "in_progress"}"#).unwrap();
        assert_eq!(parsed.status, SessionState::InProgress);
        assert!(parsed.error.is_none());

        let failed: SessionStatusResponse =
            serde_json::from_str(r#"{"status": "failed", "error": "model overloaded"}"#).unwrap();
        assert_eq!(failed.status, SessionState::Failed);
        assert_eq!(failed.error.as_deref(), Some("model overloaded"));
    }

    #[test]
    fn final_message_is_the_last_assistant_turn() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"messages": [
                {"role": "user", "content": "interpret this"},
                {"role": "assistant", "content": "first draft"},
                {"role": "assistant", "content": "{\"meaning\": \"m\"}"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(last_assistant(&parsed.messages), Some("{\"meaning\": \"m\"}"));

        let none: MessagesResponse =
            serde_json::from_str(r#"{"messages": [{"role": "user", "content": "hi"}]}"#).unwrap();
        assert_eq!(last_assistant(&none.messages), None);
    }

    #[test]
    fn empty_api_key_is_a_configuration_error() {
        let config = GenerationConfig::new("https://generation.example", "");
        let err = SessionProducer::new(config).unwrap_err();
        assert!(!err.advances_fallback());
    }

    #[tokio::test]
    #[ignore = "Requires GENERATION_BASE_URL and GENERATION_API_KEY environment variables"]
    async fn live_session_round_trip() {
        let config = crate::config::GenerationConfig::from_env()
            .unwrap()
            .expect("generation service not configured");
        let producer = SessionProducer::new(config).unwrap();
        let interpretation = producer.produce(&event_request()).await.unwrap();
        assert!(interpretation.has_required_fields());
    }
}
