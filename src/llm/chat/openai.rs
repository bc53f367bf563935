use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{
    BoxError,
    ChatClient,
    ChatTurn,
    CompletionRequest,
    CompletionResponse,
    StreamLine,
    TokenStream,
    endpoint,
    http_stream_generate,
    log_unparsed,
};
use crate::llm::LlmConfig;

const CHAT_ROUTE: &str = "/chat/completions";

/// Client for any endpoint speaking the OpenAI chat-completions dialect.
pub struct OpenAIChatClient {
    http: HttpClient,
    provider: &'static str,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
pub(super) struct OpenAIChatRequest {
    model: String,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

/// Parses one server-sent-events line of a streamed chat completion.
pub(super) fn parse_sse_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return StreamLine::Skip;
    }
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(stream_resp) => {
            let content: String = stream_resp.choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            if content.is_empty() {
                StreamLine::Skip
            } else {
                StreamLine::Token(content)
            }
        }
        Err(e) => {
            log_unparsed("chat-completions", data, &e);
            StreamLine::Skip
        }
    }
}

impl OpenAIChatClient {
    pub fn new(
        provider: &'static str,
        api_key: String,
        model: String,
        base_url: String
    ) -> Result<Self, BoxError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                format!("Invalid API key format: {}", e)
            )?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as BoxError)?;

        Ok(Self {
            http,
            provider,
            model,
            base_url: endpoint(&base_url, CHAT_ROUTE),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "OpenAI API key is required".to_string())?;

        Self::new(
            "openai",
            api_key,
            config.completion_model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            config.base_url.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string())
        )
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: request.messages(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: if stream { Some(true) } else { None },
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BoxError> {
        let req = self.build_request(request, false);

        let resp = self.http
            .post(&self.base_url)
            .json(&req)
            .send().await?
            .error_for_status()?
            .json::<OpenAIResponse>().await?;

        let content = resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| format!("No response from {} API", self.provider))?;

        Ok(CompletionResponse { response: content })
    }

    async fn stream_completion(&self, request: &CompletionRequest) -> Result<TokenStream, BoxError> {
        let req = self.build_request(request, true);
        info!("Starting {} stream request to {} ({} messages)", self.provider, self.base_url, req.messages.len());
        http_stream_generate(&self.http, &self.base_url, req, parse_sse_line, None).await
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
