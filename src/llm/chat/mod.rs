pub mod groq;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::warn;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::groq::GroqChatClient;
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, BoxError>> + Send>>;

/// A message in the provider's wire vocabulary (`system`, `user`, `assistant`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub turns: Vec<ChatTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// The full upstream conversation: system instruction first.
    pub fn messages(&self) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(ChatTurn::new("system", self.system.clone()));
        messages.extend(self.turns.iter().cloned());
        messages
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, BoxError>;

    /// Starts a streamed completion. Connection and status errors are
    /// returned here, before any token; later failures arrive as stream items.
    async fn stream_completion(&self, request: &CompletionRequest) -> Result<TokenStream, BoxError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
    fn supports_native_streaming(&self) -> bool {
        false
    }
}

/// Streams from providers that support it, otherwise wraps the full
/// completion as a single-token stream.
pub async fn stream_chat_for_provider<T: ChatClient + ?Sized>(
    client: &T,
    request: &CompletionRequest
) -> Result<TokenStream, BoxError> {
    if client.supports_native_streaming() {
        return client.stream_completion(request).await;
    }
    let full = client.complete(request).await?;
    Ok(Box::pin(futures::stream::once(async move { Ok(full.response) })))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, BoxError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// What a provider-specific parser made of one line of the response body.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamLine {
    Token(String),
    Skip,
    Done,
}

/// POSTs `payload` and turns the line-delimited response body into a token
/// stream. The request is sent and its status checked before returning, so
/// the caller still gets to answer with a proper error status.
pub async fn http_stream_generate(
    http: &reqwest::Client,
    url: &str,
    payload: impl Serialize,
    line_parser: fn(&str) -> StreamLine,
    headers: Option<Vec<(String, String)>>
) -> Result<TokenStream, BoxError> {
    let mut req = http.post(url).json(&payload);
    if let Some(header_list) = headers {
        for (name, value) in header_list {
            req = req.header(name, value);
        }
    }

    let resp = req.send().await?.error_for_status()?;
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    buffer.extend_from_slice(&buf);
                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        match line_parser(line.trim_end()) {
                            StreamLine::Token(tok) => {
                                if tx.send(Ok(tok)).await.is_err() {
                                    return;
                                }
                            }
                            StreamLine::Skip => {}
                            StreamLine::Done => {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(Box::new(e) as BoxError)).await;
                    return;
                }
            }
        }

        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer);
            match line_parser(line.trim_end()) {
                StreamLine::Token(tok) => {
                    let _ = tx.send(Ok(tok)).await;
                }
                StreamLine::Skip | StreamLine::Done => {}
            }
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

/// Joins a base URL and a route without doubling or dropping the slash.
pub fn endpoint(base_url: &str, route: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(route.trim_end_matches('/')) {
        base.to_string()
    } else {
        format!("{}{}", base, route)
    }
}

pub(crate) fn log_unparsed(provider: &str, data: &str, e: &dyn StdError) {
    warn!("Failed to parse {} chunk: {}, error: {}", provider, data, e);
}
