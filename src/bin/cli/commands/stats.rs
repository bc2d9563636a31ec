use anyhow::{Context, Result};
use serde::Serialize;

use echoloop_lib::review::{DeckStats, LearningStatus, ReviewBackend};

use super::print_json;
use crate::app::App;
use crate::OutputFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsOutput {
    #[serde(flatten)]
    deck: DeckStats,
    learning_status: LearningStatus,
}

pub async fn run(app: &App, media: Option<String>, format: &OutputFormat) -> Result<()> {
    let scope = App::scope(media);
    let deck = app.storage.fetch_stats(&scope).await.context("Failed to compute stats")?;
    let learning_status = app
        .storage
        .fetch_learning_status(&scope)
        .await
        .context("Failed to read learning status")?;

    match format {
        OutputFormat::Json => print_json(&StatsOutput { deck, learning_status })?,
        OutputFormat::Plain => {
            println!("Total      {}", deck.total);
            println!("New        {}", deck.new);
            println!("Learning   {}", deck.learning);
            println!("Review     {}", deck.review);
            println!("Mastered   {}", deck.mastered);
            println!("Due today  {}", deck.due_today);
            if let Some(seconds) = learning_status.next_due_in {
                println!(
                    "\n{} learning card(s) pending, next in {}s",
                    learning_status.pending_count, seconds
                );
            }
        }
    }

    Ok(())
}
