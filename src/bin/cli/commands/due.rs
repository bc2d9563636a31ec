use anyhow::{Context, Result};

use echoloop_lib::review::{format_interval, preview_intervals, Rating, ReviewBackend, SortOption};

use super::{format_time, print_json};
use crate::app::App;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    media: Option<String>,
    sort: Option<SortOption>,
    include_pending: bool,
    format: &OutputFormat,
) -> Result<()> {
    let scope = App::scope(media);
    let mut options = app.config.queue_options();
    if let Some(sort) = sort {
        options.sort = sort;
    }

    let queue = app
        .storage
        .fetch_due_cards(&scope, &options, include_pending)
        .await
        .context("Failed to derive due queue")?;

    match format {
        OutputFormat::Json => print_json(&queue)?,
        OutputFormat::Plain => {
            if queue.is_empty() {
                println!("Nothing due.");
                return Ok(());
            }

            let now = chrono::Utc::now();
            for card in &queue {
                let preview = preview_intervals(app.storage.policy(), &card.srs, now);
                let buttons: Vec<String> = Rating::ALL
                    .iter()
                    .zip(preview.iter())
                    .map(|(rating, offset)| format!("{:?} {}", rating, format_interval(*offset)))
                    .collect();

                println!(
                    "{}  {:<10} {}  {}",
                    card.id,
                    format!("{:?}", card.srs.card_state),
                    format_time(card.start),
                    card.text.as_deref().unwrap_or("(no transcript)")
                );
                println!("    {}", buttons.join(" | "));
            }
            println!("\n{} card(s) due", queue.len());
        }
    }

    Ok(())
}
