use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{
    BoxError,
    ChatClient,
    ChatTurn,
    CompletionRequest,
    CompletionResponse,
    StreamLine,
    TokenStream,
    http_stream_generate,
    log_unparsed,
};
use crate::llm::{ LlmConfig, LlmType };
use log::info;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatTurn>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

/// Ollama streams newline-delimited JSON objects rather than SSE.
fn parse_ndjson_line(line: &str) -> StreamLine {
    if line.is_empty() {
        return StreamLine::Skip;
    }
    match serde_json::from_str::<OllamaChatResponse>(line) {
        Ok(resp) => {
            let content = resp.message.map(|m| m.content).unwrap_or_default();
            if !content.is_empty() {
                StreamLine::Token(content)
            } else if resp.done {
                StreamLine::Done
            } else {
                StreamLine::Skip
            }
        }
        Err(e) => {
            log_unparsed("ollama", line, &e);
            StreamLine::Skip
        }
    }
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.1".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        if config.llm_type != LlmType::Ollama {
            return Err("Invalid config type for OllamaClient".into());
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.completion_model.clone(),
            messages: request.messages(),
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BoxError> {
        let url = format!("{}/api/chat", self.base_url);
        let req = self.build_request(request, false);
        let resp = self.http
            .post(&url)
            .json(&req)
            .send().await?
            .error_for_status()?
            .json::<OllamaChatResponse>().await?;
        let content = resp.message
            .map(|m| m.content)
            .ok_or_else(|| "No message in Ollama response".to_string())?;
        Ok(CompletionResponse { response: content })
    }

    async fn stream_completion(&self, request: &CompletionRequest) -> Result<TokenStream, BoxError> {
        let url = format!("{}/api/chat", self.base_url);
        info!("Starting Ollama stream request to {}", url);
        let req = self.build_request(request, true);
        http_stream_generate(&self.http, &url, req, parse_ndjson_line, None).await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_lines() {
        assert_eq!(
            parse_ndjson_line(r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#),
            StreamLine::Token("Hi".into())
        );
        assert_eq!(
            parse_ndjson_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#),
            StreamLine::Done
        );
        assert_eq!(parse_ndjson_line("not json"), StreamLine::Skip);
    }
}
