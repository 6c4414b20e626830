//! Application configuration and module table loading for scubuild.
//!
//! User config lives at `~/.scubuild/scubuild.toml`.
//! CLI flags override config file values, which override defaults.
//! The module table lives inside the engine tree (default `scu_modules.toml`).

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScuBuildError};
use crate::types::ModuleTable;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "scubuild.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".scubuild";

// ---------------------------------------------------------------------------
// Config structs (matching scubuild.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Module table file name, resolved against the engine root.
    #[serde(default = "default_table_file")]
    pub table_file: String,

    /// Include cap applied to uncapped modules in release builds; `0` disables it.
    #[serde(default = "default_release_max_per_unit")]
    pub release_max_per_unit: usize,

    /// Print each generated file name.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            table_file: default_table_file(),
            release_max_per_unit: default_release_max_per_unit(),
            verbose: false,
        }
    }
}

fn default_table_file() -> String {
    "scu_modules.toml".into()
}
fn default_release_max_per_unit() -> usize {
    8
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.scubuild/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ScuBuildError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.scubuild/scubuild.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ScuBuildError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ScuBuildError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScuBuildError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScuBuildError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScuBuildError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Module table
// ---------------------------------------------------------------------------

/// Load and validate a module table.
pub fn load_module_table(path: &Path) -> Result<ModuleTable> {
    let content = std::fs::read_to_string(path).map_err(|e| ScuBuildError::io(path, e))?;

    let table: ModuleTable = toml::from_str(&content)
        .map_err(|e| ScuBuildError::config(format!("failed to parse {}: {e}", path.display())))?;

    validate_module_table(&table)?;
    tracing::debug!(?path, modules = table.modules.len(), "loaded module table");

    Ok(table)
}

/// Write a module table as pretty TOML, refusing to overwrite an existing file.
pub fn write_module_table(path: &Path, table: &ModuleTable) -> Result<()> {
    if path.exists() {
        return Err(ScuBuildError::config(format!(
            "{} already exists, not overwriting",
            path.display()
        )));
    }

    let content =
        toml::to_string_pretty(table).map_err(|e| ScuBuildError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| ScuBuildError::io(path, e))?;
    tracing::info!(?path, "wrote module table");

    Ok(())
}

fn validate_module_table(table: &ModuleTable) -> Result<()> {
    for (idx, module) in table.modules.iter().enumerate() {
        if module.dirs.is_empty() || module.dirs[0].trim().is_empty() {
            return Err(ScuBuildError::config(format!(
                "module #{idx} has no main folder"
            )));
        }
        if module.extensions.is_empty() {
            return Err(ScuBuildError::config(format!(
                "module '{}' lists no extensions",
                module.dirs[0]
            )));
        }
        if let Some(ext) = module
            .extensions
            .iter()
            .find(|e| e.is_empty() || e.contains('.') || e.contains('/'))
        {
            return Err(ScuBuildError::config(format!(
                "module '{}' has invalid extension '{ext}' (expected e.g. \"cpp\")",
                module.dirs[0]
            )));
        }
        if module.dirs.iter().any(|d| Path::new(d).is_absolute()) {
            return Err(ScuBuildError::config(format!(
                "module '{}' uses an absolute directory; paths must be relative to the engine root",
                module.dirs[0]
            )));
        }
        if module
            .dirs
            .iter()
            .any(|d| Path::new(d).components().any(|c| c == Component::ParentDir))
        {
            return Err(ScuBuildError::config(format!(
                "module '{}' escapes its folder with '..'",
                module.dirs[0]
            )));
        }
    }
    Ok(())
}
