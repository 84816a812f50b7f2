use anyhow::{Context, Result};
use serde_json::{from_reader, to_writer_pretty};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::show::Show;

pub const SHOW_EXTENSION: &str = "prism.json";

/// Loads and saves shows as pretty-printed JSON files in one directory.
pub struct ShowManager {
    shows_directory: PathBuf,
    current_path: Option<PathBuf>,
}

impl ShowManager {
    pub fn new(shows_directory: PathBuf) -> Self {
        Self {
            shows_directory,
            current_path: None,
        }
    }

    pub fn from_current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Save to the file the show was loaded from, or a new file named after the show.
    pub fn save_show(&mut self, show: &Show) -> Result<PathBuf> {
        let path = match &self.current_path {
            Some(path) => path.clone(),
            None => {
                let sanitized_name = show.name.replace(' ', "_").to_lowercase();
                self.shows_directory
                    .join(format!("{}.{}", sanitized_name, SHOW_EXTENSION))
            }
        };
        self.save_show_as(show, path)
    }

    pub fn save_show_as(&mut self, show: &Show, path: PathBuf) -> Result<PathBuf> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create show file {}", path.display()))?;
        to_writer_pretty(BufWriter::new(file), show)?;

        log::info!("Saved show \"{}\" to {}", show.name, path.display());
        self.current_path = Some(path.clone());
        Ok(path)
    }

    pub fn load_show(&mut self, path: &Path) -> Result<Show> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open show file {}", path.display()))?;
        let show: Show = from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse show file {}", path.display()))?;

        log::info!(
            "Loaded show \"{}\": {} fixtures, {} cuelists",
            show.name,
            show.fixtures.len(),
            show.cuelists.len()
        );
        self.current_path = Some(path.to_path_buf());
        Ok(show)
    }

    pub fn list_shows(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.shows_directory)?;

        let mut shows = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_show = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with(&format!(".{}", SHOW_EXTENSION)));

            if path.is_file() && is_show {
                shows.push(path);
            }
        }
        shows.sort();

        Ok(shows)
    }
}

#[cfg(test)]
mod tests {
    use prism_fixtures::{ChannelLayout, Fixture, FixtureId, Model, ModelId};
    use tempfile::TempDir;

    use super::*;
    use crate::cue::cue::{Cue, Cuelist};
    use crate::show::show::{CueId, CuelistId};

    fn sample_show() -> Show {
        let mut show = Show::new("Club Night");
        show.add_model(Model::new(
            ModelId(1),
            "Par",
            ChannelLayout::parse("DRGB").unwrap(),
        ));
        let mut fixture = Fixture::new(FixtureId(1), "Par 1", Some(ModelId(1)));
        fixture.patch(1, 17).unwrap();
        show.add_fixture(fixture);
        let mut list = Cuelist::new(CuelistId(1), "Main", 0);
        list.add_cue(Cue::new(CueId(1), "Open", 2.0));
        show.add_cuelist(list);
        show
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut manager = ShowManager::new(dir.path().to_path_buf());

        let path = manager.save_show(&sample_show()).unwrap();
        assert_eq!(path, dir.path().join("club_night.prism.json"));
        assert_eq!(manager.current_path(), Some(path.as_path()));

        let mut other = ShowManager::new(dir.path().to_path_buf());
        let loaded = other.load_show(&path).unwrap();
        assert_eq!(loaded.name, "Club Night");
        assert_eq!(loaded.fixtures[&FixtureId(1)].address, 17);
        assert_eq!(loaded.cuelists[&CuelistId(1)].cues.len(), 1);

        assert_eq!(other.list_shows().unwrap(), vec![path]);
    }

    #[test]
    fn test_invalid_channel_string_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.prism.json");
        let mut json = serde_json::to_value(sample_show()).unwrap();
        json["models"]["1"]["channels"] = serde_json::Value::from("DRGX");
        fs::write(&path, json.to_string()).unwrap();

        let mut manager = ShowManager::new(dir.path().to_path_buf());
        assert!(manager.load_show(&path).is_err());
        assert!(manager.current_path().is_none());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut manager = ShowManager::new(dir.path().to_path_buf());
        assert!(manager.load_show(&dir.path().join("nope.prism.json")).is_err());
        assert!(manager.list_shows().unwrap().is_empty());
    }
}
