//! Replication settings and their durable store.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replication backend tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationProvider {
    /// Git remote.
    #[default]
    Git,
}

/// Replication settings. The only state kept across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationConfig {
    /// Replication has been configured successfully.
    pub enabled: bool,
    /// Backend tag, set once configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ReplicationProvider>,
    /// Remote repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Commit author name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Commit author email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl ReplicationConfig {
    /// Settings recorded after a successful configure.
    pub fn git(
        repo_url: impl Into<String>,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            enabled: true,
            provider: Some(ReplicationProvider::Git),
            repo_url: Some(repo_url.into()),
            user_name: Some(user_name.into()),
            user_email: Some(user_email.into()),
        }
    }
}

/// JSON file holding [`ReplicationConfig`].
///
/// Writes go to a sibling temporary file that is synced and then renamed
/// over the target, so a crash leaves either the old or the new settings.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store for `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings; a missing file yields the defaults.
    pub fn load(&self) -> CoreResult<ReplicationConfig> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                Ok(ReplicationConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Saves settings.
    pub fn save(&self, config: &ReplicationConfig) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(config)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), enabled = config.enabled, "saved settings");
        Ok(())
    }
}
