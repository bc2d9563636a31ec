use anyhow::Result;
use serde::Serialize;

use echoloop_lib::markers::store::group_views;
use echoloop_lib::markers::{GroupView, Marker};

use super::{print_json, print_marker};
use crate::app::App;
use crate::OutputFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkerListing<'a> {
    #[serde(flatten)]
    marker: &'a Marker,
    groups: Vec<GroupView>,
}

pub fn run(app: &App, media: &str, format: &OutputFormat) -> Result<()> {
    let store = app.load_store(media)?;

    match format {
        OutputFormat::Json => {
            let output: Vec<MarkerListing> = store
                .markers()
                .iter()
                .map(|marker| MarkerListing {
                    marker,
                    groups: group_views(marker),
                })
                .collect();
            print_json(&output)?;
        }
        OutputFormat::Plain => {
            if store.is_empty() {
                println!("No markers for '{}'.", media);
                return Ok(());
            }

            for marker in store.markers() {
                print_marker(marker);
            }
            let marked = store.markers().iter().filter(|m| m.is_reviewable()).count();
            println!("\n{} markers, {} with marked words", store.len(), marked);
        }
    }

    Ok(())
}
