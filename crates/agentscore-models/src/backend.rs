use std::collections::VecDeque;
use std::sync::Arc;

use agentscore_core::AgentScoreError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

/// JSON-over-HTTP seam shared by remote embedding and chat providers.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AgentScoreError>;
}

/// Sends provider requests as JSON `POST`s with reqwest.
///
/// Error statuses are returned as responses so the provider can map them
/// (429 to `RateLimit`, for example). A non-JSON error body is passed on as
/// a JSON string.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies, TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderBackend for HttpBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AgentScoreError> {
        let headers = request
            .headers
            .iter()
            .fold(self.client.post(&request.url), |builder, (key, value)| {
                builder.header(key, value)
            });

        let response = headers
            .json(&request.body)
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(AgentScoreError::Parsing(format!(
                    "{} returned invalid JSON: {e}",
                    request.url
                )))
            }
            Err(_) => Value::String(text),
        };
        tracing::debug!(url = %request.url, status = status.as_u16(), "provider responded");
        Ok(ProviderResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> AgentScoreError {
    if error.is_timeout() {
        AgentScoreError::Timeout(format!("request to {url} timed out: {error}"))
    } else {
        AgentScoreError::Model(format!("request to {url} failed: {error}"))
    }
}

/// Test backend with queued responses. Records every request it receives.
pub struct FakeBackend {
    responses: Arc<Mutex<VecDeque<Result<ProviderResponse, AgentScoreError>>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_response(&self, response: ProviderResponse) -> &Self {
        self.responses
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(Ok(response));
        self
    }

    pub fn push_error(&self, error: AgentScoreError) -> &Self {
        self.responses
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(Err(error));
        self
    }

    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderBackend for FakeBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AgentScoreError> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .unwrap_or_else(|| Err(AgentScoreError::Model("FakeBackend exhausted".to_string())))
    }
}
