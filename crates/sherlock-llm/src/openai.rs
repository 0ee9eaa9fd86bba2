use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use sherlock_core::errors::CompletionError;
use sherlock_core::provider::{CompletionProvider, CompletionRequest, PromptMessage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_key: None,
        }
    }
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                CompletionError::NetworkError(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Seconds form of `Retry-After`. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn extract_content(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(format!("invalid JSON: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CompletionError::MalformedResponse("response has no message content".into()))
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(
        skip(self, request),
        fields(model = %self.model, messages = request.messages.len())
    )]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut req = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(CONNECT_TIMEOUT)
            } else {
                CompletionError::NetworkError(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after = parse_retry_after(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(match CompletionError::from_status(status, body) {
                CompletionError::RateLimited { .. } => CompletionError::RateLimited { retry_after },
                other => other,
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| CompletionError::NetworkError(e.to_string()))?;
        let content = extract_content(&text)?;
        debug!(status, chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer, key: Option<&str>) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            base_url: server.uri(),
            model: "gpt-test".into(),
            api_key: key.map(|k| SecretString::from(k.to_string())),
        })
        .unwrap()
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-test", "temperature": 0.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("SELECT 1")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("sk-test"));
        let out = provider
            .complete(&CompletionRequest::prompt("How many?"))
            .await
            .unwrap();
        assert_eq!(out, "SELECT 1");
    }

    #[tokio::test]
    async fn sends_roles_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "q" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .mount(&server)
            .await;

        let provider = provider_for(&server, None);
        let req = CompletionRequest::deterministic(vec![
            PromptMessage::system("sys"),
            PromptMessage::user("q"),
        ]);
        assert_eq!(provider.complete(&req).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("sk-test"));
        let err = provider
            .complete(&CompletionRequest::prompt("q"))
            .await
            .unwrap_err();
        match err {
            CompletionError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("sk-wrong"));
        let err = provider
            .complete(&CompletionRequest::prompt("q"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.error_kind(), "authentication_failed");
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let provider = provider_for(&server, None);
        let err = provider
            .complete(&CompletionRequest::prompt("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse(_)));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(provider.model(), DEFAULT_MODEL);
    }

    #[test]
    fn retry_after_ignores_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert!(parse_retry_after(&headers).is_none());
        headers.insert(RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
    }
}
