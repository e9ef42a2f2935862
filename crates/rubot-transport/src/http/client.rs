//! Bot API client over HTTPS.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, Response};
use serde_json::Value;
use tracing::{debug, trace};

use rubot_core::{ApiTransport, TransportError, TransportResult, UploadFile};

/// [`ApiTransport`] that POSTs JSON to `{base_url}/{token}/{method}`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    /// Creates a transport. `timeout` bounds every request, uploads included.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Io(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Full URL of `method`. Contains the token; never log it.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.token, method)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_json(method: &str, resp: Response) -> TransportResult<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(method, status = status.as_u16(), "Bot API returned an HTTP error");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| request_error(method, e))?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn call(&self, method: &str, body: Value) -> TransportResult<Value> {
        trace!(method, "Calling Bot API");
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(method, e))?;
        Self::read_json(method, resp).await
    }

    async fn upload(&self, upload_url: &str, file: UploadFile) -> TransportResult<Value> {
        const METHOD: &str = "upload";

        trace!(file_name = %file.file_name, size = file.data.len(), "Uploading file");
        let part = Part::bytes(file.data)
            .file_name(file.file_name)
            .mime_str(&file.mime)
            .map_err(|e| request_error(METHOD, e))?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(METHOD, e))?;
        Self::read_json(METHOD, resp).await
    }
}

fn request_error(method: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            method: method.to_string(),
        }
    } else {
        // The URL carries the token.
        TransportError::Request {
            method: method.to_string(),
            reason: err.without_url().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url_trims_trailing_slash() {
        let transport =
            HttpTransport::new("https://botapi.rubika.ir/v3/", "TOKEN", Duration::from_secs(30))
                .unwrap();
        assert_eq!(
            transport.method_url("getMe"),
            "https://botapi.rubika.ir/v3/TOKEN/getMe"
        );

        let transport =
            HttpTransport::new("http://localhost:8080", "T", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.method_url("sendMessage"), "http://localhost:8080/T/sendMessage");
    }

    #[test]
    fn test_debug_hides_token() {
        let transport =
            HttpTransport::new("https://example.org", "secret-token", Duration::from_secs(5))
                .unwrap();
        let debug = format!("{transport:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("example.org"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let transport =
            HttpTransport::new("http://127.0.0.1:9", "T", Duration::from_secs(5)).unwrap();

        let err = transport
            .call("getMe", serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            TransportError::Request { method, reason } => {
                assert_eq!(method, "getMe");
                assert!(!reason.contains("/T/"));
            }
            TransportError::Timeout { .. } => {}
            other => panic!("unexpected error: {other}"),
        }
    }
}
