//! The chat proxy: wraps a visitor's message and history with the company
//! system prompt and relays it to the configured LLM provider.

use log::{ info, error };
use std::error::Error;
use std::sync::Arc;
use thiserror::Error as ThisError;

use crate::cli::{ Args, mask_secret };
use crate::config::content::SiteContent;
use crate::config::prompt::PromptConfig;
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{
    BoxError,
    ChatClient,
    ChatTurn,
    CompletionRequest,
    new_client as new_chat_client,
    stream_chat_for_provider,
};
use crate::models::chat::ChatRequest;
use crate::stream::protocol::{ EncodedStream, encode_token_stream };

#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("invalid chat request: {0}")]
    InvalidRequest(String),
    #[error("upstream provider failed: {0}")]
    Upstream(BoxError),
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub error_message: String,
    pub stream_error_notice: String,
}

#[derive(Clone)]
pub struct Assistant {
    chat_client: Arc<dyn ChatClient>,
    system_prompt: String,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(
        args: &Args,
        prompts: &PromptConfig,
        content: &SiteContent
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let llm_type: LlmType = args.chat_llm_type
            .parse()
            .map_err(|e| format!("Invalid chat LLM type: {}", e))?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}, ApiKey={}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default"),
            mask_secret(&args.chat_api_key)
        );

        let settings = AssistantSettings {
            max_tokens: args.chat_max_tokens,
            temperature: args.chat_temperature,
            stream: args.chat_stream,
            error_message: prompts.error_message.clone(),
            stream_error_notice: prompts.stream_error_notice.clone(),
        };

        Ok(Self::from_parts(chat_client, prompts.render_system_prompt(content), settings))
    }

    pub fn from_parts(
        chat_client: Arc<dyn ChatClient>,
        system_prompt: String,
        settings: AssistantSettings
    ) -> Self {
        Self { chat_client, system_prompt, settings }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    /// Upstream conversation: history in order, then the new user turn.
    /// The system prompt travels separately in `CompletionRequest::system`.
    pub fn build_request(&self, request: &ChatRequest) -> Result<CompletionRequest, ProxyError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ProxyError::InvalidRequest("message must not be empty".to_string()));
        }

        let mut turns: Vec<ChatTurn> = request.history
            .iter()
            .map(|msg| ChatTurn::new(msg.role.as_str(), msg.content.clone()))
            .collect();
        turns.push(ChatTurn::new("user", message));

        Ok(CompletionRequest {
            system: self.system_prompt.clone(),
            turns,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        })
    }

    /// Starts the upstream call and returns the encoded body. Fails only if
    /// the provider could not be reached or refused the request.
    pub async fn stream_reply(
        &self,
        request_id: &str,
        request: &ChatRequest
    ) -> Result<EncodedStream, ProxyError> {
        let completion = self.build_request(request)?;
        info!(
            "[{}] forwarding {} turns to {} (max_tokens={})",
            request_id,
            completion.turns.len(),
            self.chat_client.get_model(),
            completion.max_tokens
        );

        let tokens = stream_chat_for_provider(self.chat_client.as_ref(), &completion).await.map_err(
            |e| {
                error!("[{}] chat upstream error: {}", request_id, e);
                ProxyError::Upstream(e)
            }
        )?;

        Ok(encode_token_stream(request_id.to_string(), tokens, self.settings.stream_error_notice.clone()))
    }

    /// Non-streaming variant: waits for the whole completion.
    pub async fn reply(&self, request_id: &str, request: &ChatRequest) -> Result<String, ProxyError> {
        let completion = self.build_request(request)?;
        info!("[{}] forwarding {} turns (non-streaming)", request_id, completion.turns.len());
        let resp = self.chat_client.complete(&completion).await.map_err(|e| {
            error!("[{}] chat upstream error: {}", request_id, e);
            ProxyError::Upstream(e)
        })?;
        Ok(resp.response)
    }
}
