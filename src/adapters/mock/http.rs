//! Mock HTTP client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::traits::{HttpClient, HttpError, Response};

/// Configured outcome for a URL.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(Response),
    Error(HttpError),
}

/// HTTP client that answers from a table and records requested URLs.
///
/// Clones share the table and the request log.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    default_response: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a response for an exact URL.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// Set the response for URLs without a specific entry.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    /// URLs requested so far, in order.
    pub fn get_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.requests.lock().unwrap().push(url.to_string());

        let configured = self.responses.lock().unwrap().get(url).cloned();
        let response = configured.or_else(|| self.default_response.lock().unwrap().clone());
        match response {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_exact_match_wins_over_default() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::Success(Response::new(503, Bytes::new())));
        client.set_response(
            "http://host/health",
            MockResponse::Success(Response::new(200, Bytes::from("ok"))),
        );

        assert_eq!(client.get("http://host/health").await.unwrap().status, 200);
        assert_eq!(client.get("http://host/other").await.unwrap().status, 503);
        assert_eq!(client.get_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_url_errors() {
        let client = MockHttpClient::new();
        assert!(matches!(
            client.get("http://host/x").await,
            Err(HttpError::Other(_))
        ));
        client.clear_requests();
        assert!(client.get_requests().is_empty());
    }
}
