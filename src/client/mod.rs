//! Client side of the assistant widget: posts the conversation to the chat
//! proxy and rebuilds the assistant's reply from the streamed body.

use futures::StreamExt;
use log::{ error, warn };
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::models::chat::{ ChatRequest, Message, Role };
use crate::models::contact::ContactSubmission;
use crate::stream::{ DecodedFragment, FragmentDecoder };

pub const DEFAULT_GREETING: &str =
    "Hello! I'm the AI assistant for for loop de loop. I can help answer questions about our services, team, or any development-related queries. How can I assist you today?";
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again later.";
pub const NO_RESPONSE: &str = "Sorry, I didn't receive a proper response.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),
}

/// How the last reply arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Streamed {
        fragments: usize,
        skipped: usize,
        /// The server reported an upstream failure partway through.
        interrupted: bool,
    },
    Whole,
}

/// One visitor's conversation. Lives as long as the page; nothing is persisted.
pub struct AssistantSession {
    http: reqwest::Client,
    chat_url: Url,
    messages: Vec<Message>,
}

impl AssistantSession {
    pub fn new(endpoint: &str, greeting: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_client(reqwest::Client::new(), endpoint, greeting)
    }

    pub fn with_client(
        http: reqwest::Client,
        endpoint: &str,
        greeting: impl Into<String>
    ) -> Result<Self, ClientError> {
        let chat_url = Url::parse(endpoint)?.join("/api/chat")?;
        Ok(Self {
            http,
            chat_url,
            messages: vec![Message::assistant(greeting)],
        })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sends `text` and appends the reply. `on_update` sees the assistant
    /// message every time it grows.
    ///
    /// On any failure the apology message is appended before the error is
    /// returned, so the conversation always ends with an assistant turn.
    pub async fn send<F>(&mut self, text: &str, mut on_update: F) -> Result<ReplyKind, ClientError>
        where F: FnMut(&Message)
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let history = self.messages.clone();
        self.messages.push(Message::user(text));

        match self.exchange(text, history, &mut on_update).await {
            Ok(kind) => Ok(kind),
            Err(e) => {
                error!("Chat error: {}", e);
                let apology = Message::assistant(APOLOGY);
                on_update(&apology);
                self.messages.push(apology);
                Err(e)
            }
        }
    }

    async fn exchange<F>(
        &mut self,
        text: &str,
        history: Vec<Message>,
        on_update: &mut F
    ) -> Result<ReplyKind, ClientError>
        where F: FnMut(&Message)
    {
        let request = ChatRequest { message: text.to_string(), history };
        let resp = self.http.post(self.chat_url.clone()).json(&request).send().await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status().as_u16()));
        }

        let is_stream = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/plain"))
            .unwrap_or(false);

        if is_stream {
            return self.read_stream(resp, on_update).await;
        }

        #[derive(Deserialize)]
        struct WholeReply {
            message: Option<String>,
        }

        let body = resp.bytes().await?;
        let reply: WholeReply = serde_json::from_slice(&body)?;
        let content = reply.message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string());
        let message = Message::assistant(content);
        on_update(&message);
        self.messages.push(message);
        Ok(ReplyKind::Whole)
    }

    async fn read_stream<F>(
        &mut self,
        resp: reqwest::Response,
        on_update: &mut F
    ) -> Result<ReplyKind, ClientError>
        where F: FnMut(&Message)
    {
        self.messages.push(Message::assistant(""));
        let mut decoder = FragmentDecoder::new();
        let mut fragments = 0;
        let mut interrupted = false;
        let mut body = resp.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for fragment in decoder.push(&chunk) {
                self.apply(fragment, &mut fragments, &mut interrupted, on_update);
            }
        }
        for fragment in decoder.finish() {
            self.apply(fragment, &mut fragments, &mut interrupted, on_update);
        }

        Ok(ReplyKind::Streamed { fragments, skipped: decoder.skipped(), interrupted })
    }

    fn apply<F>(
        &mut self,
        fragment: DecodedFragment,
        fragments: &mut usize,
        interrupted: &mut bool,
        on_update: &mut F
    )
        where F: FnMut(&Message)
    {
        match fragment {
            DecodedFragment::Text(text) => {
                if let Some(last) = self.messages.last_mut().filter(|m| m.role == Role::Assistant) {
                    last.content.push_str(&text);
                    *fragments += 1;
                    on_update(last);
                }
            }
            DecodedFragment::Error(notice) => {
                warn!("Assistant stream reported an error: {}", notice);
                *interrupted = true;
                // An empty reply is replaced by the notice; a partial one keeps its text.
                let reply_is_empty = self.messages
                    .last()
                    .map(|m| m.role == Role::Assistant && m.content.is_empty())
                    .unwrap_or(false);
                if reply_is_empty {
                    if let Some(last) = self.messages.last_mut() {
                        last.content = notice;
                        on_update(last);
                    }
                } else {
                    let message = Message::assistant(notice);
                    on_update(&message);
                    self.messages.push(message);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactOutcome {
    Sent(String),
    Rejected(String),
    Failed(String),
}

#[derive(Deserialize)]
struct ContactEnvelope {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    error: Option<String>,
}

/// Posts a contact-form submission and reports what the visitor should see.
pub async fn submit_contact(
    http: &reqwest::Client,
    endpoint: &str,
    submission: &ContactSubmission
) -> Result<ContactOutcome, ClientError> {
    let url = Url::parse(endpoint)?.join("/api/contact")?;
    let resp = http.post(url).json(submission).send().await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    let envelope: ContactEnvelope = serde_json::from_slice(&body)?;

    if status.is_success() && envelope.success {
        return Ok(ContactOutcome::Sent(envelope.message.unwrap_or_default()));
    }
    let reason = envelope.error.unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    if status.is_client_error() {
        Ok(ContactOutcome::Rejected(reason))
    } else {
        Ok(ContactOutcome::Failed(reason))
    }
}

/// Reads the assistant greeting the server is configured with.
pub async fn fetch_greeting(http: &reqwest::Client, endpoint: &str) -> Result<String, ClientError> {
    #[derive(Deserialize)]
    struct Greeting {
        greeting: String,
    }

    let url = Url::parse(endpoint)?.join("/api/content")?;
    let resp = http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(ClientError::Status(resp.status().as_u16()));
    }
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice::<Greeting>(&body)?.greeting)
}
