use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for the assistant (groq, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "groq")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.groq.com/openai/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (required for groq and openai)
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., llama-3.1-70b-versatile, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Upper bound on generated tokens per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "500")]
    pub chat_max_tokens: u32,

    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub chat_temperature: f32,

    /// Stream replies as data-stream lines. When false the proxy answers with a single JSON body.
    #[arg(long, env = "CHAT_STREAM", default_value = "true", action = clap::ArgAction::Set)]
    pub chat_stream: bool,

    // --- Content Args ---
    /// Path to the prompt configuration file. Built-in prompts are used when unset.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Path to the site content file. Built-in content is used when unset.
    #[arg(long, env = "CONTENT_PATH")]
    pub content_path: Option<String>,

    // --- Contact Relay Args ---
    /// Where contact submissions go (log, emailjs)
    #[arg(long, env = "MAIL_TYPE", default_value = "log")]
    pub mail_type: String,

    #[arg(long, env = "EMAILJS_BASE_URL", default_value = "https://api.emailjs.com/api/v1.0/email/send")]
    pub emailjs_base_url: String,

    #[arg(long, env = "EMAILJS_SERVICE_ID")]
    pub emailjs_service_id: Option<String>,

    #[arg(long, env = "EMAILJS_TEMPLATE_ID")]
    pub emailjs_template_id: Option<String>,

    #[arg(long, env = "EMAILJS_PUBLIC_KEY", hide_env_values = true)]
    pub emailjs_public_key: Option<String>,

    /// Optional private access token, needed when the EmailJS account enforces strict mode.
    #[arg(long, env = "EMAILJS_PRIVATE_KEY", hide_env_values = true)]
    pub emailjs_private_key: Option<String>,

    /// Recipient passed to the mail template as `to_email`. Defaults to the company address.
    #[arg(long, env = "CONTACT_TO_EMAIL")]
    pub contact_to_email: Option<String>,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Requests per second accepted across all API routes. 0 disables limiting.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

/// Terminal client for the assistant endpoint.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Chat with the site assistant from a terminal", long_about = None)]
pub struct ChatArgs {
    /// Base URL of a running server.
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://127.0.0.1:3000")]
    pub endpoint: String,

    /// Send a single message and exit instead of starting a prompt loop.
    #[arg(short, long)]
    pub message: Option<String>,
}

/// Shows only enough of a secret to tell keys apart in logs.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
