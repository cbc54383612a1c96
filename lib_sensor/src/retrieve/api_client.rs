//! # HTTP Submission Client
//!
//! An asynchronous JSON client wrapped around `reqwest`, with exponential
//! backoff retries on transient failures. The simulated producer uses it to
//! post readings to the ingestion endpoint.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

/// Outcome of a completed HTTP exchange.
///
/// A non-2xx status is not an error at this level: the body is kept as text
/// in `error_body` so the caller can log what the server said.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// Deserialized body of a successful response.
    pub data: Option<T>,
    /// Raw body of an unsuccessful response.
    pub error_body: Option<String>,
    /// Numeric HTTP status.
    pub status: u16,
    /// Whether the status was 2xx.
    pub success: bool,
}

/// JSON client bound to a base URL.
pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
}

impl ApiClient {
    /// Builds a client that retries transient failures up to `max_retries` times.
    ///
    /// # Errors
    /// Fails when `base_url` is not an absolute URL or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str, max_retries: u32, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid base URL (must be absolute): {}", base_url))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let inner = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner, base_url })
    }

    /// The URL relative paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends `body` as JSON with a POST to `path` (empty for the base URL itself).
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Performs a request and decodes the response.
    ///
    /// # Errors
    /// Returns an error when the URL cannot be joined, the request cannot be
    /// sent after all retries, or a successful body is not valid JSON for `T`.
    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = if path.is_empty() {
            self.base_url.clone()
        } else {
            self.base_url.join(path)?
        };
        let mut req = self.inner.request(method, url);

        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response = req.send().await?;
        let status = response.status();

        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            Ok(ApiResponse {
                data: None,
                error_body: response.text().await.ok(),
                status: status.as_u16(),
                success: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_base_url() {
        let err = ApiClient::new("/api/sensor-data", 0, Duration::from_secs(1)).err().unwrap();
        assert!(err.to_string().contains("invalid base URL"));
    }

    #[test]
    fn keeps_absolute_base_url() {
        let client = ApiClient::new("http://localhost:3000/api/sensor-data", 3, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url().path(), "/api/sensor-data");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{}/", addr), 0, Duration::from_millis(500)).unwrap();
        let result = client.post_json::<serde_json::Value, _>("", &serde_json::json!({"distance": 1})).await;
        assert!(result.is_err());
    }
}
