use async_trait::async_trait;

use super::openai::OpenAIChatClient;
use super::{ BoxError, ChatClient, CompletionRequest, CompletionResponse, TokenStream };
use crate::llm::LlmConfig;

pub const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq speaks the chat-completions dialect; only the defaults differ.
pub struct GroqChatClient {
    inner: OpenAIChatClient,
}

impl GroqChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, BoxError> {
        let inner = OpenAIChatClient::new(
            "groq",
            api_key,
            model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        )?;
        Ok(Self { inner })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key.clone().ok_or_else(|| "Groq API key is required".to_string())?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BoxError> {
        self.inner.complete(request).await
    }

    async fn stream_completion(&self, request: &CompletionRequest) -> Result<TokenStream, BoxError> {
        self.inner.stream_completion(request).await
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }

    fn get_model(&self) -> String {
        self.inner.get_model()
    }

    fn get_base_url(&self) -> Option<String> {
        self.inner.get_base_url()
    }
}
