use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use echoloop_lib::markers::{AddOutcome, MarkerSource, Segment};

use super::{print_json, print_marker};
use crate::app::App;
use crate::OutputFormat;

pub fn run(
    app: &App,
    media: &str,
    time: f64,
    segments_path: Option<&Path>,
    source: MarkerSource,
    format: &OutputFormat,
) -> Result<()> {
    let segments: Vec<Segment> = match segments_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read segments from {}", path.display()))?;
            serde_json::from_str(&content).context("Segments must be a JSON array of {start, end, text}")?
        }
        None => Vec::new(),
    };

    let mut store = app.load_store(media)?;
    let outcome = store
        .add_marker(Some(time), &segments, source)
        .context("Failed to add marker")?;
    app.save_store(&store)?;

    let marker = app.find_marker(outcome.marker_id())?;
    match format {
        OutputFormat::Json => print_json(&marker)?,
        OutputFormat::Plain => {
            match outcome {
                AddOutcome::Created(_) => println!("Created marker:"),
                AddOutcome::Merged { press_count, .. } => {
                    println!("Re-marked the last segment ({} presses):", press_count)
                }
            }
            print_marker(&marker);
        }
    }

    Ok(())
}
