use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use echoloop_lib::config::{default_config_path, EngineConfig};
use echoloop_lib::markers::{Marker, MarkerStore};
use echoloop_lib::review::storage::default_data_dir;
use echoloop_lib::review::{CardStorage, ReviewScope};

/// Shared application state for CLI commands
pub struct App {
    pub config: EngineConfig,
    pub storage: CardStorage,
}

impl App {
    pub fn new(data_dir: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => match default_config_path() {
                Some(path) => EngineConfig::load_or_default(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => EngineConfig::default(),
            },
        };

        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir().context("Failed to get data directory")?,
        };

        let storage = CardStorage::new(data_dir)
            .with_policy(config.policy())
            .with_mastered_interval(config.scheduler.mastered_interval_days);
        storage.init().context("Failed to initialize card storage")?;

        Ok(Self { config, storage })
    }

    pub fn scope(media: Option<String>) -> ReviewScope {
        media.map_or(ReviewScope::All, ReviewScope::Media)
    }

    pub fn load_store(&self, media_id: &str) -> Result<MarkerStore> {
        self.storage
            .load_store(media_id, self.config.marker_options())
            .with_context(|| format!("Failed to load markers for '{}'", media_id))
    }

    pub fn save_store(&self, store: &MarkerStore) -> Result<()> {
        self.storage
            .save_store(store)
            .with_context(|| format!("Failed to save markers for '{}'", store.media_id()))
    }

    pub fn find_marker(&self, id: Uuid) -> Result<Marker> {
        self.storage
            .get_marker(id)
            .with_context(|| format!("Marker {} not found", id))
    }

    /// Load the store owning `id`, apply `edit`, save it and return the
    /// marker as it is afterwards (`None` if the edit removed it)
    pub fn edit_marker<F>(&self, id: Uuid, edit: F) -> Result<Option<Marker>>
    where
        F: FnOnce(&mut MarkerStore) -> bool,
    {
        let marker = self.find_marker(id)?;
        let mut store = self.load_store(&marker.media_id)?;
        if !edit(&mut store) {
            bail!("Marker {} could not be updated", id);
        }
        self.save_store(&store)?;
        Ok(store.get(id).cloned())
    }
}
