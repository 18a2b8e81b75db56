//! A terminal chat against a running agent studio server.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use agent_studio::{ChatClient, ClientError};
use agent_studio_protocol::aggregate::DEFAULT_TOOL_NAME;
use agent_studio_protocol::{
    ChatMessage, ChatRequest, ContentBlock, StreamItem, ToolEvent, ToolEventKind,
    normalize_toolkits, split_content_aggregated,
};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";
const DEFAULT_URL: &str = "http://127.0.0.1:3000";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(user_id) = env::var("AGENT_STUDIO_USER_ID").ok().filter(|id| !id.is_empty())
    else {
        eprintln!("AGENT_STUDIO_USER_ID environment variable is not set");
        std::process::exit(1);
    };
    let url = env::var("AGENT_STUDIO_URL").unwrap_or_else(|_| DEFAULT_URL.to_owned());
    let toolkits = env::var("AGENT_STUDIO_TOOLKITS").unwrap_or_default();
    let toolkits = normalize_toolkits(toolkits.split(',').map(str::trim));

    let client = ChatClient::new(&url);
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut history: Vec<ChatMessage> = vec![];

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        history.push(ChatMessage::user(line));

        let request = ChatRequest {
            messages: history.clone(),
            user_id: user_id.clone(),
            toolkits: toolkits.clone(),
        };
        match run_turn(&client, &request, &progress_style).await {
            Ok(transcript) => {
                let reply = reply_text(&transcript);
                history.push(ChatMessage::assistant(reply));
            }
            Err(err) => {
                println!("{}{}", BAR_CHAR.bright_red(), err.bright_red());
                // Drop the unanswered message so it is not sent twice.
                history.pop();
            }
        }
        println!();
    }
}

async fn run_turn(
    client: &ChatClient,
    request: &ChatRequest,
    progress_style: &ProgressStyle,
) -> Result<String, ClientError> {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style.clone());
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let mut stream = match client.send(request).await {
        Ok(stream) => stream,
        Err(err) => {
            progress_bar.finish_and_clear();
            return Err(err);
        }
    };

    let mut waiting = Some(progress_bar);
    print!("{}🤖 ", BAR_CHAR.bright_cyan());
    loop {
        let item = stream.next_item().await;
        // Finish the progress bar before printing anything else.
        if let Some(progress_bar) = waiting.take() {
            progress_bar.finish_and_clear();
        }
        match item? {
            Some(StreamItem::Text(text)) => print!("{}", text.bright_white()),
            Some(StreamItem::Event(event)) => print_event(&event),
            None => break,
        }
        std::io::stdout().flush().ok();
    }
    println!();

    let transcript = stream.finish().await?;
    for block in split_content_aggregated(&transcript) {
        match block {
            ContentBlock::ToolAggregate(tool) if !tool.is_finished() => {
                warn!(run_id = tool.run_id.as_str(), "{} never finished", tool.name);
            }
            _ => {}
        }
    }
    Ok(transcript)
}

fn print_event(event: &ToolEvent) {
    let name = event.name.as_deref().unwrap_or(DEFAULT_TOOL_NAME);
    let bar = BAR_CHAR.bright_yellow();
    match event.kind() {
        ToolEventKind::Start => println!("\n{bar}🔧 {}", name.bold()),
        ToolEventKind::End => println!("{bar}{} {name}", "✔".bright_green()),
        ToolEventKind::Error => {
            let reason = event
                .data
                .as_ref()
                .and_then(|data| data.error.as_ref())
                .map(|error| match error.as_str() {
                    Some(reason) => reason.to_owned(),
                    None => error.to_string(),
                })
                .unwrap_or_default();
            println!("{bar}{} {name}: {reason}", "✖".bright_red());
        }
        ToolEventKind::Other => {}
    }
}

/// The text blocks of a transcript, which become the assistant message of
/// the history.
fn reply_text(transcript: &str) -> String {
    split_content_aggregated(transcript)
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {err}");
            None
        }
    }
}
