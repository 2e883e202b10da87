#![allow(dead_code)]

//! Extraction client: the single point of entry for talking to the résumé
//! extraction service.
//!
//! Sends the raw résumé text as `{"text": ...}` and turns the
//! `text/event-stream` response into a stream of event payloads. Opening the
//! stream is retried on connect errors, 429 and 5xx; once events are flowing,
//! errors are handed to the session as-is.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

pub mod sse;

use sse::SseDecoder;

const EVENT_STREAM: &str = "text/event-stream";
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Expected an event stream, got content type '{0}'")]
    UnexpectedContentType(String),

    #[error("Could not open the extraction stream after {retries} attempts: {last}")]
    RetriesExhausted { retries: u32, last: String },

    #[error("Stream disconnected: {0}")]
    Disconnected(String),
}

/// Event payloads in arrival order. The stream ending is a normal close; an
/// `Err` item is a transport failure and is the last item.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Opens one extraction stream per session generation. Dropping the returned
/// stream closes the underlying connection.
#[async_trait]
pub trait ExtractionTransport: Send + Sync {
    async fn open(&self, text: &str) -> Result<EventStream, TransportError>;
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// HTTP transport backed by `reqwest`.
#[derive(Clone)]
pub struct ExtractionClient {
    client: Client,
    url: String,
    max_retries: u32,
}

impl ExtractionClient {
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder().connect_timeout(connect_timeout).build()?,
            url: url.into(),
            max_retries: max_retries.max(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs the résumé text, retrying with exponential backoff until the
    /// service answers with a 2xx or a non-retryable status.
    async fn connect(&self, text: &str) -> Result<Response, TransportError> {
        let request_body = ParseRequest { text };
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "Extraction connect attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.url)
                .header(header::ACCEPT, EVENT_STREAM)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_connect() => {
                    last_error = e.to_string();
                    continue;
                }
                Err(e) => return Err(TransportError::Http(e)),
            };

            let status = response.status();

            if is_retryable(status) {
                let body = response.text().await.unwrap_or_default();
                warn!("Extraction service returned {}: {}", status, body);
                last_error = format!("status {}: {}", status.as_u16(), error_message(body));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    message: error_message(body),
                });
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !content_type.starts_with(EVENT_STREAM) {
                return Err(TransportError::UnexpectedContentType(content_type.to_string()));
            }

            debug!("Extraction stream opened after {} attempt(s)", attempt + 1);
            return Ok(response);
        }

        warn!(
            "Giving up on the extraction service after {} attempt(s): {}",
            self.max_retries, last_error
        );
        Err(TransportError::RetriesExhausted {
            retries: self.max_retries,
            last: last_error,
        })
    }
}

#[async_trait]
impl ExtractionTransport for ExtractionClient {
    async fn open(&self, text: &str) -> Result<EventStream, TransportError> {
        let response = self.connect(text).await?;
        info!(url = %self.url, "Receiving extraction stream");
        Ok(into_events(response))
    }
}

/// Reads the response body on its own task and forwards complete event
/// payloads. The task ends, dropping the connection, as soon as the receiving
/// side goes away.
fn into_events(response: Response) -> EventStream {
    let (tx, rx) = mpsc::channel::<Result<String, TransportError>>(EVENT_BUFFER);

    tokio::spawn(async move {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();

        loop {
            let chunk: Option<reqwest::Result<Bytes>> = tokio::select! {
                _ = tx.closed() => {
                    debug!("Extraction stream receiver dropped, closing connection");
                    return;
                }
                chunk = body.next() => chunk,
            };

            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    let _ = tx.send(Err(TransportError::Http(e))).await;
                    return;
                }
                None => break,
            };

            for event in decoder.push(&chunk) {
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            let _ = tx.send(Ok(event)).await;
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff: 1s, 2s, 4s...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 * (1u64 << (attempt.saturating_sub(1)).min(16)))
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.detail)
        .unwrap_or(body)
}
