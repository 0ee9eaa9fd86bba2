use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use sherlock_core::errors::CompletionError;
use sherlock_core::provider::{CompletionProvider, CompletionRequest};

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Text(String),
    Error(CompletionError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every request it receives.
pub struct MockProvider {
    responses: Vec<MockResponse>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a script made only of text replies.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(MockResponse::text).collect())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request.clone());

        let Some(response) = self.responses.get(idx) else {
            return Err(CompletionError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        let mut current = response;
        loop {
            match current {
                MockResponse::Text(text) => return Ok(text.clone()),
                MockResponse::Error(e) => return Err(e.clone()),
                MockResponse::Delay(duration, inner) => {
                    tokio::time::sleep(*duration).await;
                    current = inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_responses() {
        let mock = MockProvider::with_texts(["first", "second"]);
        let req = CompletionRequest::prompt("q");

        assert_eq!(mock.complete(&req).await.unwrap(), "first");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.complete(&req).await.unwrap(), "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_responses() {
        let mock = MockProvider::with_texts(["only one"]);
        let req = CompletionRequest::prompt("q");
        let _ = mock.complete(&req).await;
        let err = mock.complete(&req).await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn records_requests() {
        let mock = MockProvider::with_texts(["a", "b"]);
        mock.complete(&CompletionRequest::prompt("one")).await.unwrap();
        mock.complete(&CompletionRequest::prompt("two")).await.unwrap();
        let seen: Vec<String> = mock.requests().iter().map(|r| r.flattened()).collect();
        assert_eq!(seen, vec!["one", "two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_error() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_millis(20),
            MockResponse::Error(CompletionError::RateLimited { retry_after: None }),
        )]);
        let start = tokio::time::Instant::now();
        let result = mock.complete(&CompletionRequest::prompt("q")).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(matches!(result, Err(CompletionError::RateLimited { .. })));
    }

    #[test]
    fn provider_properties() {
        let mock = MockProvider::new(vec![]);
        assert_eq!(mock.name(), "mock");
        assert_eq!(mock.model(), "mock-model");
    }
}
