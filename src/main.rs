use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dictation_bridge::bridge::{ActionOutcome, BridgeController, CommandInterpreter, StatusEvent};
use dictation_bridge::config::Config;
use dictation_bridge::editor::{MemoryClipboard, MemoryDocument};

#[derive(Parser)]
#[command(name = "dictation-bridge", version, about = "Turn dictated clipboard text into editor actions")]
struct Cli {
    /// Config file (default: ./dictation-bridge.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the clipboard and drive the focused application (default)
    Run,
    /// Show how each phrase would be interpreted
    Classify {
        #[arg(required = true)]
        phrases: Vec<String>,
    },
    /// Print the voice command reference
    Commands,
    /// Feed each line of a file (or - for stdin) through an in-memory document
    Replay { file: PathBuf },
    /// Print the effective configuration
    Config {
        /// Write it to this path instead
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[hotpath::main]
fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cli.config.as_deref()).await,
        Command::Classify { phrases } => {
            classify(&phrases);
            Ok(())
        }
        Command::Commands => {
            print!("{}", CommandInterpreter::help_text());
            Ok(())
        }
        Command::Replay { file } => replay(cli.config.as_deref(), &file).await,
        Command::Config { write } => show_config(cli.config.as_deref(), write.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[cfg(feature = "system")]
async fn run(config_path: Option<&Path>) -> Result<()> {
    use dictation_bridge::editor::{KeystrokeEditor, SystemClipboard};
    use tokio::sync::broadcast::error::RecvError;
    use tracing::{info, warn};

    let config = Config::load(config_path)?;
    let editor = KeystrokeEditor::new(&config.input).context("keyboard input unavailable")?;
    let clipboard = SystemClipboard::new().context("system clipboard unavailable")?;

    let mut controller = BridgeController::new(editor, clipboard);
    let mut events = controller.subscribe();

    let (stop_tx, stop_rx) = flume::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl+C handler")?;

    controller.start(config.bridge).await?;
    info!("press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = stop_rx.recv_async() => break,
            event = events.recv() => match event {
                Ok(StatusEvent::Notice(message)) => eprintln!("{}", message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "status events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.stop().await;
    let status = controller.status();
    info!(accepted_changes = status.accepted_changes, "bridge {}", status.state);
    Ok(())
}

#[cfg(not(feature = "system"))]
async fn run(_config_path: Option<&Path>) -> Result<()> {
    anyhow::bail!("built without the `system` feature; only classify, commands, replay and config are available")
}

fn classify(phrases: &[String]) {
    let interpreter = CommandInterpreter::new();
    for phrase in phrases {
        let command = interpreter.classify(phrase);
        println!("{:<12} {:?} -> {}", command.kind(), phrase, command);
    }
}

async fn replay(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let reader: Box<dyn Read> = if file == Path::new("-") {
        Box::new(io::stdin())
    } else {
        Box::new(
            std::fs::File::open(file)
                .with_context(|| format!("failed to open {}", file.display()))?,
        )
    };

    let clipboard = MemoryClipboard::default();
    let doc = MemoryDocument::new(clipboard.clone());
    let mut controller = BridgeController::new(doc.clone(), clipboard.clone());
    let mut events = controller.subscribe();
    controller.start(config.bridge).await?;

    for line in BufReader::new(reader).lines() {
        let line = line.context("failed to read replay input")?;
        clipboard.set(&line);
        controller.tick_now().await;

        // The poll loop may have picked the change up first; both report here
        while let Ok(event) = events.try_recv() {
            if let StatusEvent::Action(outcome) = event {
                print_outcome(&outcome);
            }
        }
    }

    controller.stop().await;
    println!("---");
    println!("{}", doc.text());
    Ok(())
}

fn print_outcome(outcome: &ActionOutcome) {
    match &outcome.error {
        None => println!("#{:<4} {:<12} {}", outcome.sequence, outcome.kind, outcome.detail),
        Some(error) => println!(
            "#{:<4} {:<12} {} (failed: {})",
            outcome.sequence, outcome.kind, outcome.detail, error
        ),
    }
}

fn show_config(config_path: Option<&Path>, write: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    match write {
        Some(path) => {
            config.save(path)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
