//! HTTP transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use atlas_core::config::ServerConfig;
use atlas_core::Message;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::composer::{FormPart, TurnBody, TurnRequest};
use crate::error::ChatError;
use crate::transport::{ChatReply, JobAck, JobRequest, Transport};

/// Talks to the agent server. Every request carries the identity header.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    identity_header: HeaderName,
    identity: HeaderValue,
}

impl HttpTransport {
    pub fn new(config: &ServerConfig) -> Result<Self, ChatError> {
        let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
            .map_err(|e| ChatError::Config(format!("invalid identity header name: {e}")))?;
        let identity = HeaderValue::from_str(&config.identity)
            .map_err(|e| ChatError::Config(format!("invalid identity: {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            identity_header,
            identity,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(self.identity_header.clone(), self.identity.clone())
    }
}

fn multipart_form(parts: Vec<FormPart>) -> Form {
    parts.into_iter().fold(Form::new(), |form, part| match part {
        FormPart::Text { name, value } => form.text(name, value),
        FormPart::File {
            name,
            file_name,
            bytes,
        } => form.part(name, Part::bytes(bytes).file_name(file_name)),
    })
}

/// Non-2xx statuses become [`ChatError::Status`] with the body text.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ChatError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}

/// Records that do not decode as a [`Message`] are logged and dropped, so one
/// bad entry does not cost the rest of the history.
fn history_messages(records: Vec<Value>) -> Vec<Message> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable history record");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError> {
        let response = self
            .with_identity(self.client.get(self.url("history")))
            .send()
            .await?;
        let records: Vec<Value> = decode(response).await?;
        Ok(history_messages(records))
    }

    async fn send_turn(&self, request: TurnRequest) -> Result<ChatReply, ChatError> {
        if request.message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let builder = self.with_identity(self.client.post(self.url("chat")));
        let builder = match request.into_body() {
            TurnBody::Json(body) => builder.json(&body),
            TurnBody::Multipart(parts) => {
                debug!(fields = parts.len(), "Sending multipart turn");
                builder.multipart(multipart_form(parts))
            }
        };
        decode(builder.send().await?).await
    }

    async fn schedule_job(&self, request: JobRequest) -> Result<JobAck, ChatError> {
        if request.query.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let response = self
            .with_identity(self.client.post(self.url("jobs")))
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }
}
