//! Analysis gateway: the single outbound call to the analysis service
//!
//! Defines the gateway trait and error taxonomy for submitting an
//! [`AnalysisRequest`]. Two implementations:
//! - `HttpGateway`: multipart `POST /predict` over reqwest (production)
//! - `MockGateway`: returns a preconfigured outcome (testing)
//!
//! The gateway also owns the secondary endpoints the result view uses:
//! model artifact downloads and visualization assets.

use crate::intake::AnalysisRequest;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

/// Gateway trait for submitting an analysis.
///
/// Abstracts over transport (HTTP, mock) so the workflow doesn't depend on
/// how the analysis service is reached.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Send one request; the raw JSON body is the candidate result envelope.
    async fn submit(&self, request: AnalysisRequest) -> Result<Value, GatewayError>;
}

/// Body of a non-success response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Pull a server-provided message out of an error body, or synthesize one.
///
/// Never fails: anything that is not `{"error": "<non-empty>"}` yields the
/// generic message.
pub fn server_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Analysis service responded with status {}", status))
}

/// Resolve an image reference to a URL.
///
/// Absolute URLs pass through; anything else is reduced to its file name and
/// served from `/visualizations/`.
pub fn visualization_url(base_url: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    format!(
        "{}/visualizations/{}",
        base_url.trim_end_matches('/'),
        asset_name(reference)
    )
}

/// Final path segment of a server-supplied path. Trailing separators are ignored.
pub fn asset_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

/// HTTP gateway to the analysis service.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// `timeout` of `None` means the call may wait indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch a trained model artifact by its server-side path.
    pub async fn download_artifact(&self, path: &str) -> Result<Vec<u8>, GatewayError> {
        let url = format!("{}/download_model/{}", self.base_url, path.trim_start_matches('/'));
        info!(%url, "downloading model artifact");
        let response = self.client.get(&url).send().await?;
        Self::bytes_or_error(response).await
    }

    /// Fetch a visualization image; `reference` may be a full server path.
    pub async fn fetch_visualization(&self, reference: &str) -> Result<Vec<u8>, GatewayError> {
        let url = visualization_url(&self.base_url, reference);
        debug!(%url, "fetching visualization");
        let response = self.client.get(&url).send().await?;
        Self::bytes_or_error(response).await
    }

    async fn bytes_or_error(response: Response) -> Result<Vec<u8>, GatewayError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(Self::server_error(response).await)
        }
    }

    async fn server_error(response: Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = server_message(status, &body);
        warn!(status, %message, "analysis service returned an error");
        GatewayError::Server { status, message }
    }
}

#[async_trait]
impl AnalysisGateway for HttpGateway {
    async fn submit(&self, request: AnalysisRequest) -> Result<Value, GatewayError> {
        let (file, goal) = request.into_parts();
        let url = format!("{}/predict", self.base_url);
        info!(%url, file = %file.name, bytes = file.size(), "submitting analysis");

        let mut part = Part::bytes(file.bytes).file_name(file.name);
        if let Some(media_type) = file.media_type.as_deref() {
            part = part.mime_str(media_type)?;
        }
        let form = Form::new().part("file", part).text("prompt", goal);

        let response = self.client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::server_error(response).await);
        }

        let body = response.text().await?;
        // A success body that is not JSON is still handed to the classifier.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Mock gateway for testing. Returns a preconfigured outcome.
pub struct MockGateway {
    outcome: Result<Value, GatewayError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<AnalysisRequest>>,
}

impl MockGateway {
    /// A gateway that answers every request with `body`.
    pub fn responding(body: Value) -> Self {
        Self::with_outcome(Ok(body))
    }

    /// A gateway that fails every request with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<Value, GatewayError>) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request received.
    pub fn last_request(&self) -> Option<AnalysisRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl AnalysisGateway for MockGateway {
    async fn submit(&self, request: AnalysisRequest) -> Result<Value, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{validate, IntakeFile};
    use serde_json::json;

    fn request() -> AnalysisRequest {
        let file = IntakeFile::new("sales.csv", Some("text/csv"), b"a\n1\n".to_vec());
        validate(Some(&file), "forecast next quarter").unwrap()
    }

    #[test]
    fn server_message_prefers_body_error() {
        assert_eq!(server_message(400, r#"{"error":"bad column"}"#), "bad column");
    }

    #[test]
    fn server_message_degrades_on_malformed_body() {
        let generic = "Analysis service responded with status 500";
        assert_eq!(server_message(500, ""), generic);
        assert_eq!(server_message(500, "<html>oops</html>"), generic);
        assert_eq!(server_message(500, r#"{"error": 42}"#), generic);
        assert_eq!(server_message(500, r#"{"error": "  "}"#), generic);
        assert_eq!(server_message(500, r#"{"detail":"x"}"#), generic);
    }

    #[test]
    fn visualization_url_strips_directories() {
        assert_eq!(
            visualization_url("http://localhost:5000/", "/srv/out/plots/churn.png"),
            "http://localhost:5000/visualizations/churn.png"
        );
        assert_eq!(
            visualization_url("http://localhost:5000", "plots\\win.png"),
            "http://localhost:5000/visualizations/win.png"
        );
        assert_eq!(
            visualization_url("http://localhost:5000", "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn asset_name_ignores_trailing_separators() {
        assert_eq!(asset_name("plots/"), "plots");
        assert_eq!(asset_name("out\\plots\\"), "plots");
        assert_eq!(asset_name("/models/churn.pkl"), "churn.pkl");
        assert_eq!(
            visualization_url("http://localhost:5000", "/srv/out/plots/"),
            "http://localhost:5000/visualizations/plots"
        );
    }

    #[tokio::test]
    async fn mock_gateway_records_requests() {
        let gateway = MockGateway::responding(json!({"result_type": "text", "data": "ok"}));
        let body = gateway.submit(request()).await.unwrap();
        assert_eq!(body["data"], "ok");
        assert_eq!(gateway.calls(), 1);
        assert_eq!(gateway.last_request().unwrap().goal(), "forecast next quarter");
    }

    #[tokio::test]
    async fn mock_gateway_fails_as_configured() {
        let gateway = MockGateway::failing(GatewayError::Network("refused".into()));
        let err = gateway.submit(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
    }
}
