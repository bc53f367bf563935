use axum::body::Bytes;
use futures::{ Stream, StreamExt };
use log::{ error, info };
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::llm::chat::TokenStream;

pub const TEXT_TAG: &str = "0";
pub const ERROR_TAG: &str = "3";
pub const FINISH_TAG: &str = "d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Error,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    finish_reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPart {
    Text(String),
    Error(String),
    Finish(FinishReason),
}

impl StreamPart {
    pub fn encode(&self) -> String {
        let (tag, payload) = match self {
            StreamPart::Text(text) => (TEXT_TAG, json_string(text)),
            StreamPart::Error(message) => (ERROR_TAG, json_string(message)),
            StreamPart::Finish(reason) => {
                let payload = serde_json::to_string(&(FinishPayload { finish_reason: *reason }))
                    .unwrap_or_else(|_| "{}".to_string());
                (FINISH_TAG, payload)
            }
        };
        format!("{}:{}\n", tag, payload)
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.encode())
    }
}

fn json_string(s: &str) -> String {
    // Serializing a &str cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

pub type EncodedStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// Re-encodes provider tokens as protocol lines, one line per token, flushed
/// as soon as the token arrives.
///
/// An upstream failure after the first byte can no longer change the HTTP
/// status, so it is reported in-band with an error part followed by a finish
/// part and the body ends.
pub fn encode_token_stream(
    request_id: String,
    mut tokens: TokenStream,
    error_notice: String
) -> EncodedStream {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(32);

    tokio::spawn(async move {
        let mut fragments = 0usize;
        let mut reason = FinishReason::Stop;

        while let Some(item) = tokens.next().await {
            match item {
                Ok(token) => {
                    if token.is_empty() {
                        continue;
                    }
                    fragments += 1;
                    if tx.send(Ok(StreamPart::Text(token).into_bytes())).await.is_err() {
                        info!("[{}] client went away after {} fragments", request_id, fragments);
                        return;
                    }
                }
                Err(e) => {
                    error!("[{}] upstream stream failed: {}", request_id, e);
                    reason = FinishReason::Error;
                    let _ = tx.send(Ok(StreamPart::Error(error_notice.clone()).into_bytes())).await;
                    break;
                }
            }
        }

        let _ = tx.send(Ok(StreamPart::Finish(reason).into_bytes())).await;
        info!("[{}] stream finished ({:?}) after {} fragments", request_id, reason, fragments);
    });

    Box::pin(ReceiverStream::new(rx))
}
