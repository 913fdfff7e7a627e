//! Webhook transports

use async_trait::async_trait;
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::{
    error::{Error, Result},
    request::{ChatRequest, STREAM_ACCEPT},
};

/// Raw response bytes as they come off the wire
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// A webhook response body
pub enum ResponseBody {
    /// Body that can be read incrementally
    Stream(ByteStream),
    /// Body that is only available in full
    Text(String),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Stream(_) => f.write_str("ResponseBody::Stream(..)"),
            ResponseBody::Text(text) => f.debug_tuple("ResponseBody::Text").field(text).finish(),
        }
    }
}

impl ResponseBody {
    /// Read the whole body into a string
    pub async fn into_text(self) -> Result<String> {
        match self {
            ResponseBody::Text(text) => Ok(text),
            ResponseBody::Stream(mut bytes) => {
                let mut buf = Vec::new();
                while let Some(chunk) = bytes.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
        }
    }
}

/// Something that can POST a chat request to the webhook
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Send a request. Streaming requests should get their body back as a
    /// stream if the transport can provide one.
    async fn post(&self, request: &ChatRequest) -> Result<ResponseBody>;
}

/// reqwest-backed webhook transport
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport for a webhook URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::InvalidConfig("webhook url is empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    /// Use a preconfigured client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, request: &ChatRequest) -> Result<ResponseBody> {
        let mut builder = self.client.post(&self.url).json(request);
        if request.is_streaming() {
            builder = builder.header(reqwest::header::ACCEPT, STREAM_ACCEPT);
        }

        tracing::debug!(url = %self.url, action = ?request.action, "posting to webhook");
        let response = builder.send().await?;

        let status = response.status();
        tracing::debug!(
            status = status.as_u16(),
            content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
            "webhook responded"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        if request.is_streaming() {
            let bytes = response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(Error::from));
            Ok(ResponseBody::Stream(Box::pin(bytes)))
        } else {
            Ok(ResponseBody::Text(response.text().await?))
        }
    }
}
