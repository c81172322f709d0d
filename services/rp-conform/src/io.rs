//! HTTP client abstraction for testability

use async_trait::async_trait;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL, query string included
    async fn get(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a PUT request with form-encoded body
    async fn put_form(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Client with a per-request timeout
    pub fn with_timeout(timeout: std::time::Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::ConformError::Http(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| crate::ConformError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| crate::ConformError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }

    async fn put_form(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<HttpResponse> {
        tracing::debug!("PUT {}", url);
        let response = self
            .client
            .put(url)
            .form(params)
            .send()
            .await
            .map_err(|e| crate::ConformError::Http(format!("PUT {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| crate::ConformError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("PUT {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Port 1 is reserved and unbound, connections are always refused
    const UNREACHABLE_URL: &str = "http://127.0.0.1:1/api/v1/telescope/0/connected";

    #[tokio::test]
    async fn get_connection_refused_returns_http_error() {
        let client = ReqwestHttpClient::default();
        let err = client.get(UNREACHABLE_URL).await.unwrap_err();

        match &err {
            crate::ConformError::Http(msg) => {
                assert!(msg.starts_with("GET http://127.0.0.1:1/"), "{msg}");
            }
            other => panic!("expected ConformError::Http, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_form_connection_refused_returns_http_error() {
        let client = ReqwestHttpClient::with_timeout(std::time::Duration::from_secs(5)).unwrap();
        let err = client
            .put_form(UNREACHABLE_URL, &[("Connected", "true")])
            .await
            .unwrap_err();

        match &err {
            crate::ConformError::Http(msg) => {
                assert!(msg.starts_with("PUT http://127.0.0.1:1/"), "{msg}");
            }
            other => panic!("expected ConformError::Http, got {other:?}"),
        }
    }
}
