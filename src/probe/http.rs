//! HTTP transport implementation.

use super::{ProbeError, Transport};
use crate::models::HttpMethod;

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

/// [`Transport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the shared client. Certificate validation and redirects are left
    /// to reqwest's defaults.
    pub fn new() -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, method: HttpMethod, url: &Url, timeout: Duration) -> Result<u16, ProbeError> {
        let request = match method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Head => self.client.head(url.clone()),
        };

        let response = request.timeout(timeout).send().await.map_err(|e| map_error(e, timeout))?;
        let code = response.status().as_u16();

        // Read the full body to measure complete transfer time
        if method == HttpMethod::Get {
            response.bytes().await.map_err(|e| map_error(e, timeout))?;
        }

        Ok(code)
    }
}

fn map_error(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if e.is_builder() {
        ProbeError::MalformedTarget(e.to_string())
    } else {
        ProbeError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
    }

    #[tokio::test]
    async fn test_head_returns_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = assert_ok!(HttpTransport::new());
        let code = transport
            .send(HttpMethod::Head, &url(&server, "/health"), Duration::from_secs(5))
            .await;

        assert_eq!(code, Ok(204));
    }

    #[tokio::test]
    async fn test_get_reads_body_and_reports_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = assert_ok!(HttpTransport::new());
        let code = transport
            .send(HttpMethod::Get, &url(&server, "/broken"), Duration::from_secs(5))
            .await;

        assert_eq!(code, Ok(503));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport = assert_ok!(HttpTransport::new());
        let timeout = Duration::from_millis(200);
        let result = transport.send(HttpMethod::Get, &url(&server, "/slow"), timeout).await;

        assert_eq!(result, Err(ProbeError::Timeout(timeout)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = assert_ok!(HttpTransport::new());
        let target = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let result = transport.send(HttpMethod::Head, &target, Duration::from_secs(2)).await;

        assert!(matches!(result, Err(ProbeError::Transport(_))));
    }
}
