//! Liveness probe against the backend's health endpoint.
//!
//! Any 2xx answer counts as "backend alive"; the reconnector uses that to
//! skip the rest of a backoff wait.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use url::Url;

use crate::traits::HttpClient;

/// GETs one health URL through an [`HttpClient`]
#[derive(Clone)]
pub struct HealthProbe {
    client: Arc<dyn HttpClient>,
    url: String,
}

impl HealthProbe {
    pub fn new(client: Arc<dyn HttpClient>, url: &Url) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One probe. Errors and non-2xx statuses both mean "not alive".
    pub async fn is_alive(&self) -> bool {
        let start = Instant::now();
        match self.client.get(&self.url).await {
            Ok(response) => {
                debug!(
                    "Health probe {} -> {} in {}ms",
                    self.url,
                    response.status,
                    start.elapsed().as_millis()
                );
                response.is_success()
            }
            Err(e) => {
                debug!("Health probe {} failed: {}", self.url, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe").field("url", &self.url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::adapters::ReqwestHttpClient;
    use crate::traits::{HttpError, Response};
    use bytes::Bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn health_url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_any_2xx_is_alive() {
        let client = Arc::new(MockHttpClient::new());
        let url = health_url("http://localhost:3000/health");
        let probe = HealthProbe::new(client.clone(), &url);

        client.set_default_response(MockResponse::Success(Response::new(204, Bytes::new())));
        assert!(probe.is_alive().await);

        client.set_default_response(MockResponse::Success(Response::new(503, Bytes::new())));
        assert!(!probe.is_alive().await);

        client.set_default_response(MockResponse::Error(HttpError::ConnectionFailed(
            "refused".to_string(),
        )));
        assert!(!probe.is_alive().await);

        assert_eq!(client.get_requests().len(), 3);
        assert_eq!(client.get_requests()[0], "http://localhost:3000/health");
    }

    #[tokio::test]
    async fn test_probe_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let url = health_url(&format!("{}/health", server.uri()));
        let probe = HealthProbe::new(Arc::new(ReqwestHttpClient::new()), &url);
        assert!(probe.is_alive().await);
    }

    #[tokio::test]
    async fn test_probe_server_error_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = health_url(&format!("{}/health", server.uri()));
        let probe = HealthProbe::new(Arc::new(ReqwestHttpClient::new()), &url);
        assert!(!probe.is_alive().await);
    }
}
