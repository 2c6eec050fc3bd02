use crate::options::Method;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;

/// A fully built request, ready for the wire.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Raw response; statuses are classified by the retry layer, not here.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-level failures. An HTTP error status is not a transport
/// error; it comes back as a regular [`HttpResponse`].
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request body: {0}")]
    Body(String),
}

/// Narrow seam over the network. Implementations must not retry on their
/// own; retries belong to the fetch layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Logs method, URL, status and elapsed time for every outgoing request.
struct RequestLogging;

#[surf::utils::async_trait]
impl surf::middleware::Middleware for RequestLogging {
    async fn handle(
        &self,
        req: surf::Request,
        client: surf::Client,
        next: surf::middleware::Next<'_>,
    ) -> surf::Result<surf::Response> {
        let method = req.method();
        let url = req.url().clone();
        let started = Instant::now();
        let response = next.run(req, client).await?;
        log::debug!(
            "{} {} -> {} ({} ms)",
            method,
            url,
            response.status(),
            started.elapsed().as_millis()
        );
        Ok(response)
    }
}

/// Default transport backed by a `surf` client.
pub struct SurfTransport {
    client: surf::Client,
}

impl SurfTransport {
    pub fn new() -> Self {
        Self {
            client: surf::Client::new().with(RequestLogging),
        }
    }

    /// Wraps an existing client, e.g. one with extra middleware configured.
    pub fn with_client(client: surf::Client) -> Self {
        Self { client }
    }
}

impl Default for SurfTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SurfTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            let body = surf::Body::from_json(body).map_err(|e| TransportError::Body(e.to_string()))?;
            builder = builder.body(body);
        }

        let mut response = builder
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = u16::from(response.status());
        let body = response
            .body_bytes()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
