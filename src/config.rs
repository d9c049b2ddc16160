use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overrides the per-user directories with a single one. Handy for
/// scripting and for keeping test runs away from real data.
pub const HOME_ENV: &str = "TASKBOX_HOME";

const CONFIG_FILE: &str = "config.json";
const DB_FILE: &str = "data.db";

/// Where taskbox keeps its files.
#[derive(Debug, Clone, PartialEq)]
pub struct Locations {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Locations {
    /// The per-user locations, unless `TASKBOX_HOME` says otherwise.
    pub fn resolve() -> Result<Locations> {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Ok(Locations::at(PathBuf::from(home)));
        }

        let dirs = ProjectDirs::from("sh", "1234", "taskbox")
            .ok_or_else(|| anyhow!("Could not determine a home directory."))?;
        Ok(Locations {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
        })
    }

    /// Keep everything under one directory.
    pub fn at(dir: PathBuf) -> Locations {
        Locations {
            config_dir: dir.clone(),
            data_dir: dir,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn default_db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}

/// Settings persisted in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Load the config file, or the defaults if there is none yet.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Drop every stored setting so the defaults apply again.
    pub fn reset(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "config removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove config file: {}", path.display())),
        }
    }

    /// The configured database path, or `default` when none is set.
    pub fn db_path_or(&self, default: PathBuf) -> PathBuf {
        self.db_path.clone().unwrap_or(default)
    }
}

/// Pick the database file: explicit flag first, then the config file,
/// then the per-user default.
pub fn resolve_db_path(flag: Option<PathBuf>, config: &Config, locations: &Locations) -> PathBuf {
    flag.unwrap_or_else(|| config.db_path_or(locations.default_db_path()))
}
