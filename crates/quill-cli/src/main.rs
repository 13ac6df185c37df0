//! quill - streaming chat client

mod clipboard;
mod commands;
mod config;
mod exchange;
mod ui;

use clap::Parser;
use quill_ai::SseTransport;
use quill_chat::{Attachment, ChatSession, SessionEvent, UploadStub, UserInput, is_hosted};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use crate::commands::CommandResult;
use crate::config::Config;
use crate::exchange::Exchange;

/// quill - chat with a streaming completion endpoint
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat-completion endpoint URL
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer key for the endpoint (falls back to QUILL_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Model to request (default: gpt-4-all)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f64>,

    /// Number of trailing turns sent as context
    #[arg(long = "history")]
    history_window: Option<usize>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Attach a hosted file (URL) to the first message
    #[arg(long)]
    attach: Option<String>,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Flags that override the config file
    fn overrides(&self) -> Config {
        Config {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            history_window: self.history_window,
            tui: self.no_tui.then_some(false),
            ..Default::default()
        }
    }
}

/// Resolve an attachment reference; only hosted URLs are accepted
fn resolve_attachment(reference: &str) -> anyhow::Result<Attachment> {
    if is_hosted(reference) {
        Ok(Attachment::from_url(reference))
    } else {
        Ok(UploadStub.upload(Path::new(reference))?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // CLI flags take precedence over the file
    let cfg = Config::load().merge(args.overrides());

    let mut transport = SseTransport::new(cfg.api_url());
    if let Some(key) = cfg.api_key() {
        transport = transport.with_api_key(key);
    }
    tracing::debug!(url = transport.url(), "using endpoint");

    let mut session = ChatSession::new(cfg.session_config(), Arc::new(transport));

    let attachment = args.attach.as_deref().map(resolve_attachment).transpose()?;

    // Non-interactive mode
    if let Some(command) = args.command {
        let input = UserInput {
            text: command,
            attachment,
        };
        return run_command(&mut session, input).await;
    }

    let use_tui = cfg.tui.unwrap_or(true) && std::io::stdout().is_terminal();
    if use_tui {
        let theme = quill_tui::Theme::by_name(cfg.theme.as_deref().unwrap_or("dark"));
        return ui::run_tui(&mut session, theme, attachment).await;
    }

    run_interactive(&mut session, attachment).await
}

/// Print a reply as it streams; ends after the exchange does
fn spawn_printer(mut rx: broadcast::Receiver<SessionEvent>) -> tokio::task::JoinHandle<()> {
    use std::io::Write;

    tokio::spawn(async move {
        let mut current = None;
        let mut printed = 0;

        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };

            match event {
                SessionEvent::ReplyUpdated { index, content } => {
                    if current != Some(index) {
                        current = Some(index);
                        printed = 0;
                    }
                    if let Some(new) = content.get(printed..) {
                        print!("{}", new);
                        let _ = std::io::stdout().flush();
                    }
                    printed = content.len();
                }
                SessionEvent::MessageAppended { message } if message.is_assistant() => {
                    if current.is_some() {
                        println!();
                    }
                    print!("{}", message.content);
                }
                SessionEvent::Retrying {
                    attempt,
                    max_retries,
                    error,
                } => {
                    eprintln!("\n[reconnecting {}/{}: {}]", attempt, max_retries, error);
                }
                SessionEvent::ExchangeEnd { outcome } => {
                    println!();
                    if !outcome.is_completed() {
                        eprintln!("[{}]", outcome.describe());
                    }
                    break;
                }
                _ => {}
            }
        }
    })
}

/// Run one exchange with streamed output; Ctrl+C stops the reply
async fn run_exchange(session: &mut ChatSession, request: Exchange) -> anyhow::Result<()> {
    let printer = spawn_printer(session.subscribe());
    let handle = session.handle();

    let exchange = request.run(session);
    tokio::pin!(exchange);

    let result = loop {
        tokio::select! {
            result = &mut exchange => break result,
            _ = tokio::signal::ctrl_c() => handle.stop(),
        }
    };

    match result {
        Ok(Some(_)) => {
            let _ = printer.await;
            Ok(())
        }
        Ok(None) => {
            printer.abort();
            println!("Nothing to regenerate.");
            Ok(())
        }
        Err(e) => {
            printer.abort();
            Err(e.into())
        }
    }
}

async fn run_command(session: &mut ChatSession, input: UserInput) -> anyhow::Result<()> {
    println!("quill> {}", input.text);
    println!();
    run_exchange(session, Exchange::Submit(input)).await
}

/// Copy the latest reply and describe the result; a failed write is
/// reported, not fatal
fn copy_reply(reply: Option<&str>, out: &mut impl std::io::Write) -> String {
    match reply {
        Some(text) => match clipboard::copy_to(out, text) {
            Ok(()) => "Copied.".to_string(),
            Err(e) => format!("Copy failed: {}", e),
        },
        None => "Nothing to copy.".to_string(),
    }
}

async fn run_interactive(
    session: &mut ChatSession,
    mut attachment: Option<Attachment>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    if io::stderr().is_terminal() {
        eprintln!("quill ({})", session.config().params.model);
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        match &attachment {
            Some(a) => print!("[{}] > ", a.name),
            None => print!("> "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }
        let input = input.trim_end_matches(['\r', '\n']);

        let model = session.config().params.model.clone();
        if let Some(result) = commands::execute_command(input, &model) {
            match result {
                CommandResult::Clear => {
                    session.clear();
                    println!("Cleared conversation.");
                }
                CommandResult::Regenerate => {
                    if let Err(e) = run_exchange(session, Exchange::Regenerate).await {
                        eprintln!("Error: {}", e);
                    }
                }
                CommandResult::Copy => {
                    let reply = session.conversation().last_assistant().map(|m| m.content.as_str());
                    println!("{}", copy_reply(reply, &mut io::stdout()));
                }
                CommandResult::Attach(a) => {
                    println!("Attached {} ({})", a.name, a.url);
                    attachment = Some(a);
                }
                CommandResult::Detach => {
                    attachment = None;
                    println!("Attachment removed.");
                }
                CommandResult::ChangeModel(model) => {
                    println!("Switched to: {}", model);
                    session.set_model(model);
                }
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::Error(msg) => eprintln!("Error: {}", msg),
                CommandResult::Exit => break,
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            continue;
        }

        let request = UserInput {
            text: input.to_string(),
            attachment: attachment.clone(),
        };
        match run_exchange(session, Exchange::Submit(request)).await {
            Ok(()) => attachment = None,
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
