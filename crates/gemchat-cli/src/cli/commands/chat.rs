//! Interactive chat command.
//!
//! Reads one message per line from stdin. Each completed reply is printed as
//! formatted markup, or streamed as plain text with `--raw`. Lines starting
//! with `/` are commands.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use gemchat_core::chat::ChatService;
use gemchat_core::config::Config;
use gemchat_core::format::format_response;
use gemchat_core::interrupt;
use gemchat_core::providers::ProviderResult;
use gemchat_core::providers::gemini::{GeminiClient, GeminiConfig, StreamEvent, TextStream};
use gemchat_core::session::{ChatSession, InputRejection};
use gemchat_core::transcript;
use tracing::{debug, info};

use super::{auth, connection};

const HELP: &str = "\
Commands:
  /clear         Clear the conversation
  /recent        Show recent searches
  /clear-recent  Forget recent searches
  /test          Test the API connection
  /logout        Sign out and leave the chat
  /help          Show this help
  /quit          Leave the chat";

enum Command {
    Clear,
    Recent,
    ClearRecent,
    Test,
    Logout,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let name = line.strip_prefix('/')?.trim();
        Some(match name {
            "clear" => Command::Clear,
            "recent" => Command::Recent,
            "clear-recent" => Command::ClearRecent,
            "test" => Command::Test,
            "logout" => Command::Logout,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        })
    }
}

/// How a streamed reply ended.
enum StreamEnd {
    Done(ProviderResult<String>),
    Cancelled,
}

pub async fn run(
    config: &Config,
    model: Option<&str>,
    transcript_path: Option<&Path>,
    raw: bool,
) -> Result<()> {
    let auth = auth::load_state(config)?;
    let Some(user) = auth.current_user() else {
        anyhow::bail!("Not signed in. Run `gemchat auth signin` first.");
    };
    let auth_state = auth.subscribe();

    let mut config = config.clone();
    if let Some(model) = model {
        config.model = model.to_string();
    }
    let client = GeminiClient::new(GeminiConfig::from_config(&config).context("gemini config")?);
    if !client.is_initialized() {
        eprintln!("Warning: no Gemini API key configured; messages will fail until GEMINI_API_KEY is set.");
    }
    let service = ChatService::new(client, config.include_history);
    let mut session = ChatSession::new(user, &config.chat);

    println!("Hello {}, Ask me Anything", session.user().name());
    println!("Type /help for commands.");
    info!("Chat started with model {}", service.client().model());

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("read stdin")? == 0 {
            println!();
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(command) = Command::parse(line) {
            match command {
                Command::Clear => {
                    session.clear();
                    println!("Conversation cleared.");
                }
                Command::Recent => print_recent(&session),
                Command::ClearRecent => {
                    session.clear_recent_searches();
                    println!("Recent searches cleared.");
                }
                Command::Test => {
                    if let Err(err) = connection::report(service.client()).await {
                        eprintln!("{err}");
                    }
                }
                Command::Logout => {
                    let outcome = auth.sign_out();
                    println!("{}", outcome.message);
                    if auth_state.borrow().is_none() {
                        break;
                    }
                }
                Command::Help => println!("{HELP}"),
                Command::Quit => break,
                Command::Unknown(name) => eprintln!("Unknown command: /{name}. Type /help."),
            }
            continue;
        }

        match session.check_input(line) {
            Ok(()) => {}
            Err(InputRejection::Empty) => continue,
            Err(rejection) => {
                eprintln!("{rejection}");
                continue;
            }
        }

        send(&service, &mut session, line, raw).await;
    }

    if let Some(path) = transcript_path {
        transcript::write(&session, "gemchat conversation", path)?;
        println!("Transcript written to {}", path.display());
    }
    Ok(())
}

async fn send(service: &ChatService, session: &mut ChatSession, text: &str, raw: bool) {
    interrupt::reset();

    let end = match service.stream_message(session, text).await {
        Ok(stream) => collect_reply(stream, raw).await,
        Err(err) => StreamEnd::Done(Err(err)),
    };

    match end {
        StreamEnd::Cancelled => {
            interrupt::reset();
            eprintln!("\n[reply cancelled]");
        }
        StreamEnd::Done(result) => {
            let outcome = ChatService::record(session, text, result);
            if !outcome.success {
                eprintln!("{}", outcome.response);
            } else if raw {
                println!();
            } else {
                println!("{}", format_response(Some(&outcome.response)));
            }
        }
    }
}

/// Collects deltas until the stream ends or fails or Ctrl+C is pressed.
/// In raw mode each delta is printed as it arrives.
async fn collect_reply(mut stream: TextStream, raw: bool) -> StreamEnd {
    let mut reply = String::new();
    let mut stdout = io::stdout();
    loop {
        let event = tokio::select! {
            biased;
            () = interrupt::wait_for_interrupt() => return StreamEnd::Cancelled,
            event = stream.next() => event,
        };
        match event {
            Some(Ok(StreamEvent::TextDelta(delta))) => {
                if raw {
                    let _ = write!(stdout, "{delta}");
                    let _ = stdout.flush();
                }
                reply.push_str(&delta);
            }
            Some(Ok(StreamEvent::Finished { reason })) => {
                debug!("Reply finished: {reason:?}");
            }
            Some(Err(err)) => {
                if raw && !reply.is_empty() {
                    let _ = writeln!(stdout);
                }
                return StreamEnd::Done(Err(err));
            }
            None => return StreamEnd::Done(Ok(reply)),
        }
    }
}

fn print_recent(session: &ChatSession) {
    let mut recent = session.recent_searches().peekable();
    if recent.peek().is_none() {
        println!("No recent searches.");
        return;
    }
    println!("Recent searches:");
    for (i, query) in recent.enumerate() {
        println!("  {}. {query}", i + 1);
    }
}
