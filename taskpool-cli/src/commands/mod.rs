pub mod init;
pub mod order;
pub mod plan;
pub mod run;
pub mod task;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use taskpool_core::{config, GroupOrder, TaskPoolConfig};

/// The config file every subcommand reads and writes.
#[derive(Debug, Clone)]
pub struct ConfigLocation {
    path: PathBuf,
}

impl ConfigLocation {
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None => config::config_path().context("could not determine home directory")?,
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file → defaults.
    pub fn load(&self) -> Result<TaskPoolConfig> {
        config::load_or_default_from(&self.path)
            .with_context(|| format!("failed to load {}", self.display()))
    }

    pub fn save(&self, config: &TaskPoolConfig) -> Result<()> {
        config::save_to(&self.path, config)
            .with_context(|| format!("failed to save {}", self.display()))
    }

    /// The path with the home directory shortened to `~`.
    pub fn display(&self) -> String {
        match dirs::home_dir().and_then(|home| self.path.strip_prefix(home).ok().map(Path::to_path_buf)) {
            Some(rel) => format!("~/{}", rel.display()),
            None => self.path.display().to_string(),
        }
    }
}

/// `--order` override, else the stored order.
pub fn effective_order(config: &TaskPoolConfig, flag: Option<&str>) -> GroupOrder {
    match flag {
        Some(raw) => GroupOrder::parse(raw),
        None => config.group_order(),
    }
}
