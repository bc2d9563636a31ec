use anyhow::Result;
use uuid::Uuid;

use echoloop_lib::markers::{Marker, VocabField};

use super::{print_json, print_marker};
use crate::app::App;
use crate::OutputFormat;

fn show(marker: Option<Marker>, format: &OutputFormat) -> Result<()> {
    let Some(marker) = marker else {
        return Ok(());
    };
    match format {
        OutputFormat::Json => print_json(&marker),
        OutputFormat::Plain => {
            print_marker(&marker);
            Ok(())
        }
    }
}

pub fn run_toggle(app: &App, id: Uuid, index: usize, end: Option<usize>, format: &OutputFormat) -> Result<()> {
    let marker = app.edit_marker(id, |store| match end {
        Some(end) => store.toggle_range(id, index, end),
        None => store.toggle_word(id, index),
    })?;
    show(marker, format)
}

pub fn run_tag(app: &App, id: Uuid, tag: &str, remove: bool, format: &OutputFormat) -> Result<()> {
    let marker = app.edit_marker(id, |store| {
        if remove {
            store.remove_tag(id, tag)
        } else {
            store.add_tag(id, tag)
        }
    })?;
    show(marker, format)
}

pub fn run_vocab(
    app: &App,
    id: Uuid,
    index: usize,
    definition: Option<String>,
    notes: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let (field, value) = match (definition, notes) {
        (Some(definition), _) => (VocabField::Definition, definition),
        (None, Some(notes)) => (VocabField::Notes, notes),
        (None, None) => anyhow::bail!("Pass --definition or --notes"),
    };
    let marker = app.edit_marker(id, |store| store.update_vocab_data(id, index, field, value))?;
    show(marker, format)
}

pub fn run_note(app: &App, id: Uuid, text: &str, format: &OutputFormat) -> Result<()> {
    let marker = app.edit_marker(id, |store| store.set_note(id, text))?;
    show(marker, format)
}

pub fn run_delete(app: &App, id: Uuid, format: &OutputFormat) -> Result<()> {
    app.edit_marker(id, |store| store.remove_marker(id))?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "deleted": id })),
        OutputFormat::Plain => {
            println!("Deleted marker {}", id);
            Ok(())
        }
    }
}

pub fn run_prune(app: &App, media: &str, word: &str, format: &OutputFormat) -> Result<()> {
    let mut store = app.load_store(media)?;
    let removed = store.remove_word_by_text(word);
    if removed > 0 {
        app.save_store(&store)?;
    }

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "word": word, "removed": removed })),
        OutputFormat::Plain => {
            println!("Unmarked '{}' in {} place(s)", word, removed);
            Ok(())
        }
    }
}
