//! Persisted task pool document.
//!
//! # Storage layout
//!
//! ```text
//! ~/.taskpool/
//!   config.json     (mode 0600, written atomically)
//! ```
//!
//! Any path may be used instead; a `.yaml` / `.yml` extension selects YAML,
//! everything else is JSON.
//!
//! # API pattern
//!
//! - `load_from(path)` / `save_to(path, …)`: explicit file
//! - `fn_at(home: &Path, …)`: default file under an explicit home; used in tests
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{GroupOrder, Task};

pub const CONFIG_DIR: &str = ".taskpool";
pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_GROUP_ORDER: &str = "1,2";

/// Flat record of tasks plus group order plus the force-copy flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPoolConfig {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "default_group_order")]
    pub group_order: String,
    #[serde(default)]
    pub force_copy: bool,
}

fn default_group_order() -> String {
    DEFAULT_GROUP_ORDER.to_string()
}

impl Default for TaskPoolConfig {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            group_order: default_group_order(),
            force_copy: false,
        }
    }
}

impl TaskPoolConfig {
    pub fn group_order(&self) -> GroupOrder {
        GroupOrder::parse(&self.group_order)
    }

    /// Store `raw` in its normalized `a,b,c` form.
    pub fn set_group_order(&mut self, raw: &str) {
        self.group_order = GroupOrder::parse(raw).to_string();
    }

    pub fn push_task(&mut self, task: impl Into<Task>) {
        self.tasks.push(task.into());
    }

    pub fn remove_task(&mut self, index: usize) -> Result<Task, ConfigError> {
        if index >= self.tasks.len() {
            return Err(ConfigError::NoSuchTask {
                index,
                len: self.tasks.len(),
            });
        }
        Ok(self.tasks.remove(index))
    }
}

// ---------------------------------------------------------------------------
// 1. Paths
// ---------------------------------------------------------------------------

/// `<home>/.taskpool/config.json`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_for(path: &Path) -> Format {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            Format::Yaml
        }
        _ => Format::Json,
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load a config file.
///
/// Returns `ConfigError::NotFound` if absent and a parse error carrying the
/// path if malformed.
pub fn load_from(path: &Path) -> Result<TaskPoolConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    match format_for(path) {
        Format::Json => serde_json::from_str(&contents).map_err(|source| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source,
        }),
        Format::Yaml => serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Like [`load_from`], but a missing file yields [`TaskPoolConfig::default`].
pub fn load_or_default_from(path: &Path) -> Result<TaskPoolConfig, ConfigError> {
    match load_from(path) {
        Err(ConfigError::NotFound { .. }) => {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(TaskPoolConfig::default())
        }
        other => other,
    }
}

/// Load `<home>/.taskpool/config.json`, defaulting when absent.
pub fn load_at(home: &Path) -> Result<TaskPoolConfig, ConfigError> {
    load_or_default_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<TaskPoolConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a config file.
///
/// Write flow: serialize → `<file>.tmp` sibling → `chmod 0600` → `rename`.
/// The parent directory is created if missing.
pub fn save_to(path: &Path, config: &TaskPoolConfig) -> Result<(), ConfigError> {
    let body = match format_for(path) {
        Format::Json => serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        Format::Yaml => {
            serde_yaml::to_string(config).map_err(|e| ConfigError::Serialize(e.to_string()))?
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_FILE.to_string());
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    std::fs::write(&tmp_path, body).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Save to `<home>/.taskpool/config.json`.
pub fn save_at(home: &Path, config: &TaskPoolConfig) -> Result<(), ConfigError> {
    save_to(&config_path_at(home), config)
}

/// `save_at` convenience wrapper.
pub fn save(config: &TaskPoolConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
