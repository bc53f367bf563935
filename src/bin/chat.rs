use clap::Parser;
use dotenv::dotenv;
use log::warn;
use loopdeloop_server::cli::ChatArgs;
use loopdeloop_server::client::{ AssistantSession, DEFAULT_GREETING, fetch_greeting };
use std::error::Error;
use std::io::{ self, BufRead, Write };

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ChatArgs::parse();

    let http = reqwest::Client::new();
    let greeting = match fetch_greeting(&http, &args.endpoint).await {
        Ok(greeting) => greeting,
        Err(e) => {
            warn!("Could not fetch greeting from {}: {}", args.endpoint, e);
            DEFAULT_GREETING.to_string()
        }
    };

    let mut session = AssistantSession::with_client(http, &args.endpoint, greeting.clone())?;
    println!("assistant> {}", greeting);

    if let Some(message) = args.message {
        ask(&mut session, &message).await;
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!("you> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        ask(&mut session, line).await;
    }

    Ok(())
}

async fn ask(session: &mut AssistantSession, message: &str) {
    print!("assistant> ");
    let _ = io::stdout().flush();

    // Print only what each update added to the message.
    let mut printed = 0;
    let mut current = None;
    let result = session.send(message, |msg| {
        if current != msg.timestamp {
            if current.is_some() {
                println!();
            }
            current = msg.timestamp;
            printed = 0;
        }
        print!("{}", msg.content.get(printed..).unwrap_or_default());
        printed = msg.content.len();
        let _ = io::stdout().flush();
    }).await;

    println!();
    if let Err(e) = result {
        warn!("Chat request failed: {}", e);
    }
}
