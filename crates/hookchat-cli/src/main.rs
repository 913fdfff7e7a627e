//! hookchat - terminal chat client for webhook-backed assistants

mod config;
mod ui;

use clap::Parser;
use hookchat_core::{
    ChatWidget, EntryKind, FileHistory, FileSessionId, HistoryStore, SessionIdProvider, Surface,
    WidgetEvent,
};
use hookchat_wire::HttpTransport;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// hookchat - chat with a webhook from the terminal
#[derive(Parser, Debug)]
#[command(name = "hookchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Webhook URL (overrides the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// Route forwarded to the webhook in request metadata
    #[arg(short, long)]
    route: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ask for a single non-streamed answer
    #[arg(long)]
    no_stream: bool,

    /// Give up on an answer after this many milliseconds (0 waits forever)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Send a single message, print the answer and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// With --command, print the formatted markup instead of the raw answer
    #[arg(long)]
    markup: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Forget the stored conversation and start a new session
    #[arg(long)]
    clear_history: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => config::Config::load_from(path),
        None => config::Config::load(),
    };
    if let Some(url) = &args.url {
        config.widget.webhook.url = url.clone();
    }
    if let Some(route) = &args.route {
        config.widget.webhook.route = route.clone();
    }
    if args.no_stream {
        config.widget.webhook.streaming = false;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.widget.webhook.timeout_ms = timeout_ms;
    }

    if args.verbose || config.widget.debug {
        tracing_subscriber::fmt()
            .with_env_filter("hookchat=debug")
            .with_writer(io::stderr)
            .init();
    }

    let mut session_ids = FileSessionId::load_or_create(FileSessionId::default_path())?;
    let mut history = FileHistory::new(FileHistory::default_path());

    // No webhook needed to forget the conversation
    if args.clear_history {
        history.clear()?;
        let id = session_ids.rotate()?;
        println!("History cleared. New session: {}", id);
        return Ok(());
    }

    if let Err(e) = config.widget.validate() {
        eprintln!("Error: {}", e);
        eprintln!("Pass --url or set webhook.url in {}", config::Config::config_path().display());
        std::process::exit(1);
    }

    let transport = Arc::new(HttpTransport::new(config.widget.webhook.url.clone())?);
    let use_tui = config.tui.unwrap_or(true) && !args.no_tui;
    let mut widget = ChatWidget::mount(
        Surface::shared(),
        config.widget,
        transport,
        Box::new(history),
        Box::new(session_ids),
    )?;
    tracing::debug!(session_id = widget.session_id(), "starting hookchat");

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&mut widget, &command, args.markup).await;
    }

    if use_tui && io::IsTerminal::is_terminal(&io::stdout()) {
        return ui::run_tui(&mut widget).await;
    }

    run_interactive(&mut widget).await
}

/// Print an answer as its fragments arrive, until the send ends
fn spawn_printer(mut receiver: broadcast::Receiver<WidgetEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut printed = false;
        while let Ok(event) = receiver.recv().await {
            match &event {
                WidgetEvent::Fragment { text } => {
                    print!("{}", text);
                    io::stdout().flush().ok();
                    printed = true;
                }
                WidgetEvent::Completed { text } => {
                    if !printed {
                        print!("{}", text);
                    }
                    println!();
                }
                WidgetEvent::Failed { label, .. } => {
                    if printed {
                        println!();
                    }
                    eprintln!("Error: {}", label);
                }
                _ => {}
            }
            if event.is_terminal() {
                break;
            }
        }
    })
}

/// Let the printer drain the last events
async fn finish_printer(printer: JoinHandle<()>) {
    let abort = printer.abort_handle();
    if tokio::time::timeout(Duration::from_millis(100), printer)
        .await
        .is_err()
    {
        abort.abort();
    }
}

async fn run_command(widget: &mut ChatWidget, command: &str, markup: bool) -> anyhow::Result<()> {
    let printer = (!markup).then(|| spawn_printer(widget.subscribe()));

    let result = widget.send(command).await;
    if let Some(printer) = printer {
        finish_printer(printer).await;
    }

    match result {
        Ok(_) if markup => {
            let surface = widget.surface().lock();
            if let Some(entry) = surface
                .entries()
                .iter()
                .rev()
                .find(|e| e.kind == EntryKind::Bot)
            {
                println!("{}", entry.markup);
            }
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => {
            if markup {
                eprintln!("Error: {}", e);
            }
            tracing::debug!("send failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_transcript(widget: &ChatWidget) {
    let name = widget.config().branding.name.clone();
    let bot = if name.trim().is_empty() { "Assistant".to_string() } else { name };
    let surface = widget.surface().lock();
    for entry in surface.entries() {
        match entry.kind {
            EntryKind::User => println!("you> {}", entry.text),
            EntryKind::Bot => println!("{}> {}", bot, entry.text),
            EntryKind::Error => eprintln!("Error: {}", entry.text),
            EntryKind::Typing => {}
        }
    }
}

async fn run_interactive(widget: &mut ChatWidget) -> anyhow::Result<()> {
    if let Err(e) = widget.start_conversation().await {
        eprintln!("Error: {}", e);
    }
    print_transcript(widget);

    if io::IsTerminal::is_terminal(&io::stderr()) {
        eprintln!("session {} (/clear to start over, Ctrl+D to quit)", widget.session_id());
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/clear" => {
                match widget.clear_history() {
                    Ok(id) => println!("History cleared. New session: {}", id),
                    Err(e) => eprintln!("Error: {}", e),
                }
                continue;
            }
            _ => {}
        }

        let printer = spawn_printer(widget.subscribe());
        let abort = widget.handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                abort.abort();
            }
        });

        if let Err(e) = widget.send(input).await {
            tracing::debug!("send failed: {}", e);
        }
        interrupt.abort();
        finish_printer(printer).await;

        println!();
    }

    Ok(())
}
