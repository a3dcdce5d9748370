//! Transport seam: request model and the HTTP implementation.
//!
//! The client core only needs "give me a byte stream for this request";
//! everything reqwest-specific lives here, behind `StreamTransport`.

use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::error::{StreamError, StreamResult};
use crate::render::{AttachmentError, AttachmentPayload, AttachmentStore};

/// Descriptor for a previously uploaded attachment, sent with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub content_type: String,
    pub key: String,
}

/// One streaming chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub agent_id: String,
    pub message: String,
    /// Continuation token from an earlier request in the same conversation.
    pub session_token: Option<String>,
    pub attachments: Vec<AttachmentRef>,
}

/// Byte stream of one persistent response body.
pub type ByteStream = BoxStream<'static, StreamResult<Bytes>>;

/// Opens a persistent byte stream for a chat request.
pub trait StreamTransport: Send + Sync {
    fn open(
        &self,
        request: &ChatRequest,
    ) -> impl std::future::Future<Output = StreamResult<ByteStream>> + Send;
}

/// HTTP transport against the agent backend.
pub struct HttpTransport {
    config: Config,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: Config) -> StreamResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|err| StreamError::connect(format!("building http client: {err}")))?;
        Ok(Self { config, http })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

impl StreamTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> StreamResult<ByteStream> {
        let url = format!("{}/api/agent/stream-chat", self.config.base_url);
        let body = json!({
            "agent_id": request.agent_id,
            "user_message": request.message,
            "session_id": request.session_token,
            "file_attachments": request.attachments,
        });

        let response = self
            .authorize(self.http.post(&url))
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(StreamError::http_status(status.as_u16(), &error_body));
        }

        Ok(response.bytes_stream().map_err(StreamError::read).boxed())
    }
}

impl AttachmentStore for HttpTransport {
    async fn fetch(&self, key: &str) -> Result<AttachmentPayload, AttachmentError> {
        let url = format!("{}/api/files/{key}", self.config.base_url);
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|err| AttachmentError::Other(err.to_string()))?;

        match response.status().as_u16() {
            401 | 403 => return Err(AttachmentError::Unauthorized),
            404 => return Err(AttachmentError::NotFound),
            status if status >= 400 => {
                return Err(AttachmentError::Other(format!("HTTP {status}")));
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AttachmentError::Other(err.to_string()))?;

        Ok(AttachmentPayload {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> StreamError {
    if err.is_timeout() {
        StreamError::timeout(err.to_string())
    } else if err.is_connect() {
        StreamError::connect(err.to_string())
    } else {
        StreamError::read(err)
    }
}
