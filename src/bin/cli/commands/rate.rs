use anyhow::{Context, Result};
use uuid::Uuid;

use echoloop_lib::review::{Rating, ReviewBackend, ReviewScope};

use super::{print_json, print_marker};
use crate::app::App;
use crate::OutputFormat;

pub async fn run(app: &App, id: Uuid, rating: Rating, format: &OutputFormat) -> Result<()> {
    let marker = app
        .storage
        .submit_review(&ReviewScope::All, id, rating)
        .await
        .with_context(|| format!("Failed to rate marker {}", id))?;

    match format {
        OutputFormat::Json => print_json(&marker)?,
        OutputFormat::Plain => {
            print_marker(&marker);
            let next = marker
                .srs
                .next_review_date
                .map(|due| due.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "now".to_string());
            println!("    {:?}, next review {}", marker.srs.card_state, next);
        }
    }

    Ok(())
}
