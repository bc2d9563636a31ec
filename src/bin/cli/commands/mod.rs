pub mod due;
pub mod edit;
pub mod list;
pub mod mark;
pub mod rate;
pub mod stats;

use anyhow::Result;
use serde::Serialize;

use echoloop_lib::markers::store::group_views;
use echoloop_lib::markers::Marker;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `00:12.34` style timestamp
pub fn format_time(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor() as u64;
    format!("{:02}:{:05.2}", minutes, seconds - minutes as f64 * 60.0)
}

/// Marker with its marked words or phrases, as shown by most commands
pub fn print_marker(marker: &Marker) {
    let text = marker.text.as_deref().unwrap_or("(no transcript)");
    println!(
        "{}  {}-{}  x{}  {}",
        marker.id,
        format_time(marker.start),
        format_time(marker.end),
        marker.press_count,
        text
    );

    if !marker.tags.is_empty() {
        let tags: Vec<String> = marker.tags.iter().map(|t| format!("#{}", t)).collect();
        println!("    tags: {}", tags.join(" "));
    }
    for view in group_views(marker) {
        let kind = if view.group.is_phrase { "phrase" } else { "word" };
        match &view.vocab {
            Some(vocab) if !vocab.definition.is_empty() => {
                println!("    [{}] {} ({}): {}", view.group.main_index, view.text, kind, vocab.definition)
            }
            _ => println!("    [{}] {} ({})", view.group.main_index, view.text, kind),
        }
    }
    if !marker.note.is_empty() {
        println!("    note: {}", marker.note);
    }
}
