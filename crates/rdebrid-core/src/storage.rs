//! Config store: the single JSON file holding the API token

use crate::error::RdebridError;
use rdebrid_types::Config;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const APP_DIR: &str = "rdebrid";
const CONFIG_FILE: &str = "config.json";

/// Reads and writes the persisted [`Config`]
#[derive(Clone)]
#[derive(Debug)]
pub struct ConfigStore {
    /// Full path of the config file
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by an explicit file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/rdebrid/config.json`
    pub fn default_location() -> Result<Self, RdebridError> {
        let base = dirs::config_dir().ok_or_else(|| {
            RdebridError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine the user config directory",
            ))
        })?;
        Ok(Self::new(base.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration.
    ///
    /// A missing file or a blank token is `NotConfigured`.
    pub async fn load(&self) -> Result<Config, RdebridError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}", self.path.display());
                return Err(RdebridError::NotConfigured);
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&content)?;
        if !config.has_token() {
            return Err(RdebridError::NotConfigured);
        }

        debug!(
            "Loaded config from {} (downloader: {:?})",
            self.path.display(),
            config.preferred_downloader
        );
        Ok(config)
    }

    /// Write the configuration, replacing whatever was there
    pub async fn save(&self, config: &Config) -> Result<(), RdebridError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(config)?;

        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path).await?;
        file.write_all(content.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        // An existing file keeps its old mode on open, so tighten it explicitly
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        info!("Saved config to {}", self.path.display());
        Ok(())
    }
}
