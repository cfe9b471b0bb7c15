//! framelog CLI
//!
//! Command-line interface for captured WebSocket messages:
//! - Record messages
//! - List channels
//! - Browse a filtered view page by page
//! - Follow new messages as they arrive

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use framelog::config::{generate_default_config, Config, LoggingConfig};
use framelog::feed::{ChangeFeed, MessageRecorder};
use framelog::store::{Criteria, Direction, MessageFilter, MessageKey, NewMessage, SqliteStore};
use framelog::view::{Column, MessagesView, RowPosition, ViewEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "framelog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Browse captured WebSocket messages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: searched in standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Message database (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file
    InitConfig {
        /// Destination (default: print to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Append messages to the store
    Record {
        /// Channel the messages belong to
        #[arg(long)]
        channel: u32,
        /// Direction (out, in)
        #[arg(short, long, default_value = "out")]
        direction: Direction,
        /// WebSocket opcode
        #[arg(long, default_value_t = 1)]
        opcode: u8,
        /// Payload text (default: synthetic payloads)
        payload: Option<String>,
        /// Number of synthetic messages when no payload is given
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },

    /// List channels with captured messages
    Channels,

    /// Print rows of a filtered view
    Browse {
        #[command(flatten)]
        filter: FilterArgs,
        /// First row to print
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Rows to print
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
        /// Print complete payloads instead of previews
        #[arg(long)]
        full: bool,
    },

    /// Find the row of a message in a filtered view
    Locate {
        /// Channel of the message
        channel_id: u32,
        /// Message id within the channel
        message_id: u32,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Record synthetic messages on a producer thread and print view updates
    Tail {
        #[command(flatten)]
        filter: FilterArgs,
        /// Channels the producer writes to, round robin
        #[arg(long, default_value_t = 2)]
        channels: u32,
        /// Messages to produce
        #[arg(short = 'n', long, default_value_t = 20)]
        count: u32,
        /// Delay between messages in milliseconds
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
    },
}

/// Criteria selection shared by view commands
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Only show this channel
    #[arg(long = "scope")]
    pub scope: Option<u32>,
    /// Only show this direction (out, in)
    #[arg(long = "only")]
    pub direction: Option<Direction>,
    /// Only show these opcodes (repeatable)
    #[arg(long = "opcode")]
    pub opcodes: Vec<u8>,
}

impl FilterArgs {
    fn criteria(&self) -> Criteria {
        let mut filter = MessageFilter::new().opcodes(self.opcodes.iter().copied());
        if let Some(direction) = self.direction {
            filter = filter.direction(direction);
        }
        Criteria::new(self.scope, filter)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logging depends on the config, so the source is reported once it is up
    let config_path = cli.config.clone().or_else(Config::locate);
    let mut config = match &config_path {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env(),
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }

    init_logging(&config.logging)?;

    match &config_path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    match cli.command {
        Commands::InitConfig { output, force } => init_config(output.as_deref(), force)?,
        Commands::Record {
            channel,
            direction,
            opcode,
            payload,
            count,
        } => {
            let store = open_store(&config)?;
            let feed = Arc::new(ChangeFeed::new(config.feed.clone()));
            let recorder = MessageRecorder::new(store, feed);

            let payloads: Vec<String> = match payload {
                Some(text) => vec![text],
                None => (1..=count).map(synthetic_payload).collect(),
            };

            for text in payloads {
                let message = recorder
                    .record(NewMessage::text(channel, direction, text).opcode(opcode))
                    .context("Failed to record message")?;
                println!(
                    "Recorded {} {} {} bytes",
                    message.key(),
                    message.direction.arrow(),
                    message.payload_length
                );
            }
        }

        Commands::Channels => {
            let store = open_store(&config)?;
            let channels = store.channels()?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&channels)?);
            } else if channels.is_empty() {
                println!("No messages captured yet.");
                println!();
                println!("Record one with:");
                println!("  framelog record --channel 1 hello");
            } else {
                println!("{:<10} {:>10}  {:<23}  {:<23}", "Channel", "Messages", "First", "Last");
                println!("{}", "-".repeat(72));
                for channel in channels {
                    println!(
                        "{:<10} {:>10}  {:<23}  {:<23}",
                        channel.channel_id,
                        channel.message_count,
                        framelog::view::columns::format_timestamp(channel.first_timestamp),
                        framelog::view::columns::format_timestamp(channel.last_timestamp)
                    );
                }
            }
        }

        Commands::Browse {
            filter,
            offset,
            limit,
            full,
        } => {
            let store = open_store(&config)?;
            let view = MessagesView::new(store, filter.criteria(), config.view.clone());
            let rows = view.row_count();
            let end = offset.saturating_add(limit).min(rows);

            if cli.format == "json" {
                let messages: Vec<_> = (offset..end)
                    .filter_map(|i| if full { view.full_message_at(i) } else { view.row_at(i) })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_header();
                for index in offset..end {
                    if full {
                        print_full_row(&view, index);
                    } else {
                        print_row(&view, index);
                    }
                }
                println!();
                println!("Rows {}-{} of {}", offset.min(rows), end, rows);
            }
            tracing::debug!("{}", view.stats());
        }

        Commands::Locate {
            channel_id,
            message_id,
            filter,
        } => {
            let store = open_store(&config)?;
            let view = MessagesView::new(store, filter.criteria(), config.view.clone());
            let key = MessageKey::new(channel_id, message_id);

            match view.index_of(key) {
                Some(RowPosition::Exact(index)) => println!("{} is row {}", key, index),
                Some(RowPosition::Estimated(index)) => {
                    println!("{} is probably row {} (lookup failed)", key, index)
                }
                None => println!("{} is not in this view", key),
            }
        }

        Commands::Tail {
            filter,
            channels,
            count,
            interval_ms,
        } => {
            let store = open_store(&config)?;
            let feed = Arc::new(ChangeFeed::new(config.feed.clone()));
            let recorder = MessageRecorder::new(store.clone(), feed.clone());
            let view = Arc::new(MessagesView::new(
                store,
                filter.criteria(),
                config.view.clone(),
            ));
            let listener = feed.register(view.clone())?;
            tail(view, recorder, channels.max(1), count, interval_ms).await?;
            feed.unregister(&listener);
        }
    }

    Ok(())
}

async fn tail(
    view: Arc<MessagesView>,
    recorder: MessageRecorder,
    channels: u32,
    count: u32,
    interval_ms: u64,
) -> anyhow::Result<()> {
    let mut events = view.subscribe();
    println!("{} rows in view", view.row_count());
    print_header();

    let mut producer = tokio::task::spawn_blocking(move || -> anyhow::Result<u32> {
        for i in 0..count {
            let direction = if i % 2 == 0 {
                Direction::Outgoing
            } else {
                Direction::Incoming
            };
            recorder.record(NewMessage::text(i % channels + 1, direction, synthetic_payload(i + 1)))?;
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
        Ok(count)
    });

    let produced = loop {
        tokio::select! {
            done = &mut producer => break done??,
            event = events.recv() => match event {
                Ok(event) => handle_event(&view, event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "View events dropped");
                }
                Err(RecvError::Closed) => break 0,
            },
        }
    };

    while let Ok(event) = events.try_recv() {
        handle_event(&view, event);
    }

    println!();
    println!("Produced {} messages, {} rows in view", produced, view.row_count());
    Ok(())
}

fn handle_event(view: &MessagesView, event: ViewEvent) {
    match event {
        ViewEvent::RowAppended { index } => print_row(view, index),
        ViewEvent::Reset => println!("-- view reset, {} rows --", view.row_count()),
    }
}

fn print_header() {
    let names: Vec<&str> = Column::all().iter().map(|c| c.name()).collect();
    println!(
        "{:>6} {:<8} {:<3} {:<23} {:<9} {:>14}  {}",
        "Row", names[0], "", names[2], names[3], names[4], names[5]
    );
    println!("{}", "-".repeat(90));
}

fn print_row(view: &MessagesView, index: u64) {
    let cells: Vec<String> = Column::all()
        .iter()
        .map(|&column| view.value_at(index, column).to_string())
        .collect();
    println!(
        "{:>6} {:<8} {:<3} {:<23} {:<9} {:>14}  {}",
        index, cells[0], cells[1], cells[2], cells[3], cells[4], cells[5]
    );
}

fn print_full_row(view: &MessagesView, index: u64) {
    print_row(view, index);
    if let Some(message) = view.full_message_at(index) {
        match message.payload.as_text() {
            Some(text) => println!("{:>6} {}", "", text),
            None => println!("{:>6} {}", "", framelog::view::columns::BINARY_PAYLOAD),
        }
    }
}

fn synthetic_payload(n: u32) -> String {
    format!(
        "{{\"type\":\"update\",\"seq\":{},\"sent\":\"{}\"}}",
        n,
        chrono::Utc::now().to_rfc3339()
    )
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteStore>> {
    let path = expand_home(&config.store.path);
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open message store at {:?}", path))?;
    Ok(Arc::new(store))
}

fn init_config(output: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let content = generate_default_config();
    let Some(path) = output else {
        print!("{}", content);
        return Ok(());
    };

    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    println!("Wrote default config to {:?}", path);
    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("framelog={}", config.level)));

    let json = config.format == "json";
    let pretty_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let file_layer = match &config.file {
        Some(path) => {
            let path = expand_home(Path::new(path));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    Ok(())
}
