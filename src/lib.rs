pub mod assistant;
pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod mail;
pub mod models;
pub mod server;
pub mod stream;

use assistant::Assistant;
use cli::{ Args, mask_secret };
use config::content::SiteContent;
use config::prompt::load_prompts;
use log::info;
use server::Server;
use server::api::AppState;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat API Key: {}", mask_secret(&args.chat_api_key));
    info!("Chat Max Tokens: {}", args.chat_max_tokens);
    info!("Chat Streaming: {}", args.chat_stream);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("<builtin>"));
    info!("Content Path: {}", args.content_path.as_deref().unwrap_or("<builtin>"));
    info!("Mail Type: {}", args.mail_type);
    info!("Rate Limit: {}/s", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let prompts = load_prompts(args.prompts_path.as_deref())?;
    let content = SiteContent::load(args.content_path.as_deref())?;
    let assistant = Assistant::new(&args, &prompts, &content)?;
    let mailer = mail::create_mailer(&args, &content.email)?;

    let state = AppState::new(
        assistant,
        mailer,
        content,
        prompts.greeting.clone(),
        args.rate_limit_per_second
    );
    let server = Server::new(args, state);
    server.run().await?;

    Ok(())
}
