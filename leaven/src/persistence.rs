use crate::config::project_dirs;
use anyhow::{Context, Result};
use leaven_ipc::Preset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What survives a restart: the chosen preset and the user's own presets.
/// Timer progress is deliberately not part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub selected_preset: Option<String>,
    #[serde(default)]
    pub custom_presets: Vec<Preset>,
}

pub struct Persistence;

impl Persistence {
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs =
            project_dirs().ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        let data_dir = proj_dirs.data_dir();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        Ok(data_dir.to_path_buf())
    }

    fn get_data_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("state.json"))
    }

    pub fn save(state: &SavedState) -> Result<()> {
        Self::save_to(&Self::get_data_path()?, state)
    }

    pub fn load() -> Result<Option<SavedState>> {
        Self::load_from(&Self::get_data_path()?)
    }

    pub fn save_to(path: &Path, state: &SavedState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        // Write then rename so a crash mid-save leaves the old file intact.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Option<SavedState>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path)?;
        let state: SavedState = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse saved state at {:?}", path))?;
        Ok(Some(state))
    }
}
