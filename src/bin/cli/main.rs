mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use echoloop_lib::markers::MarkerSource;
use echoloop_lib::review::{Rating, SortOption};

#[derive(Parser)]
#[command(name = "echoloop-cli", about = "Mark, loop and review hard-to-understand moments", version)]
struct Cli {
    /// Data directory (default: platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Mark the moment at a playback position
    Mark {
        /// Media identifier
        media: String,
        /// Playback position in seconds
        time: f64,
        /// JSON array of {start, end, text} transcript segments
        #[arg(long)]
        segments: Option<PathBuf>,
        /// loop, shadow or reading
        #[arg(long, default_value = "loop")]
        source: MarkerSource,
    },

    /// List markers of a media item with their marked groups
    List {
        /// Media identifier
        media: String,
    },

    /// Toggle a word, or an inclusive range of words
    Toggle {
        marker: Uuid,
        index: usize,
        /// End of the range
        end: Option<usize>,
    },

    /// Add or remove a tag
    Tag {
        marker: Uuid,
        tag: String,
        #[arg(long)]
        remove: bool,
    },

    /// Set the definition or notes of a marked word or phrase
    Vocab {
        marker: Uuid,
        /// Any word index inside the group
        index: usize,
        #[arg(long, conflicts_with = "notes", required_unless_present = "notes")]
        definition: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Set a marker's free-text note
    Note { marker: Uuid, text: String },

    /// Delete a marker
    Delete { marker: Uuid },

    /// Unmark a word everywhere in a media item
    Prune {
        media: String,
        word: String,
    },

    /// Show the due review queue
    Due {
        /// Restrict to one media item
        #[arg(long)]
        media: Option<String>,
        /// due_first, random, newest or oldest (default from config)
        #[arg(long)]
        sort: Option<SortOption>,
        /// Include learning cards that are not due yet
        #[arg(long)]
        include_pending: bool,
    },

    /// Rate a card: again, hard, good or easy
    Rate { marker: Uuid, rating: Rating },

    /// Deck statistics and pending learning cards
    Stats {
        #[arg(long)]
        media: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let app = app::App::new(cli.data_dir, cli.config.as_deref())?;
    let format = &cli.format;

    match cli.command {
        Command::Mark { media, time, segments, source } => {
            commands::mark::run(&app, &media, time, segments.as_deref(), source, format)?;
        }
        Command::List { media } => {
            commands::list::run(&app, &media, format)?;
        }
        Command::Toggle { marker, index, end } => {
            commands::edit::run_toggle(&app, marker, index, end, format)?;
        }
        Command::Tag { marker, tag, remove } => {
            commands::edit::run_tag(&app, marker, &tag, remove, format)?;
        }
        Command::Vocab { marker, index, definition, notes } => {
            commands::edit::run_vocab(&app, marker, index, definition, notes, format)?;
        }
        Command::Note { marker, text } => {
            commands::edit::run_note(&app, marker, &text, format)?;
        }
        Command::Delete { marker } => {
            commands::edit::run_delete(&app, marker, format)?;
        }
        Command::Prune { media, word } => {
            commands::edit::run_prune(&app, &media, &word, format)?;
        }
        Command::Due { media, sort, include_pending } => {
            commands::due::run(&app, media, sort, include_pending, format).await?;
        }
        Command::Rate { marker, rating } => {
            commands::rate::run(&app, marker, rating, format).await?;
        }
        Command::Stats { media } => {
            commands::stats::run(&app, media, format).await?;
        }
    }

    Ok(())
}
