//! Configuration storage
//!
//! Reads and writes the persisted config file. Lookup order for the path:
//! 1. $SSHBUDDY_CONFIG
//! 2. $XDG_CONFIG_HOME/sshbuddy/config.json
//! 3. ~/.config/sshbuddy/config.json

use crate::config::Config;
use crate::types::StoreError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "SSHBUDDY_CONFIG";

/// Resolve the default config file path.
pub fn default_config_path() -> Result<PathBuf, StoreError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let config_dir = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .map(|home| home.join(".config"))
            .ok_or(StoreError::NoConfigDir)?,
    };

    Ok(config_dir.join("sshbuddy").join("config.json"))
}

/// Owner of the config file. All mutations go through [`ConfigStore::update`]
/// or [`ConfigStore::write`], which hold the write lock for the whole
/// read-modify-write.
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self::with_path(default_config_path()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted config; a missing file yields defaults.
    pub async fn read_raw(&self) -> Result<Config, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Replace the file with `config` (manual hosts only).
    pub async fn write(&self, config: &Config) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_locked(config).await
    }

    /// Read the current file, apply `f` and write it back, all under the write
    /// lock. Nothing is written when `f` leaves the config unchanged.
    pub async fn update<F, T>(&self, f: F) -> Result<(Config, T), StoreError>
    where
        F: FnOnce(&mut Config) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let before = self.read_raw().await?;
        let mut config = before.clone();
        let out = f(&mut config);

        if config.to_persisted() != before.to_persisted() {
            self.write_locked(&config).await?;
        } else {
            debug!("Configuration unchanged, skipping write");
        }
        Ok((config.to_persisted(), out))
    }

    async fn write_locked(&self, config: &Config) -> Result<(), StoreError> {
        let write_err = |e: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        let json = serde_json::to_string_pretty(&config.to_persisted())
            .map_err(StoreError::Serialize)?;

        // Write to temp file first, then rename
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(write_err)?;
        file.write_all(json.as_bytes()).await.map_err(write_err)?;
        file.write_all(b"\n").await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(write_err)?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }

        info!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Host, Source};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = tempdir().unwrap();
        let store = ConfigStore::with_path(temp.path().join("config.json"));

        let config = store.read_raw().await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::with_path(path);
        let err = store.read_raw().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_write_round_trip() {
        let temp = tempdir().unwrap();
        let store = ConfigStore::with_path(temp.path().join("nested").join("config.json"));

        let mut config = Config::default();
        config
            .hosts
            .push(Host::new("db", "10.0.0.5").with_user("postgres").with_port(2222));
        config.favorites.insert("db".to_string(), true);
        config.favorites.insert("from-ssh-config".to_string(), true);
        store.write(&config).await.unwrap();

        let loaded = store.read_raw().await.unwrap();
        assert_eq!(loaded.hosts, config.hosts);
        assert_eq!(loaded.favorites, config.favorites);
        assert!(!temp.path().join("nested").join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_drops_non_manual_hosts() {
        let temp = tempdir().unwrap();
        let store = ConfigStore::with_path(temp.path().join("config.json"));

        let mut config = Config::default();
        config.hosts.push(Host::new("mine", "1.1.1.1"));
        config
            .hosts
            .push(Host::new("remote-only", "2.2.2.2").with_source(Source::Remote));
        store.write(&config).await.unwrap();

        let loaded = store.read_raw().await.unwrap();
        assert_eq!(loaded.hosts.len(), 1);
        assert_eq!(loaded.hosts[0].alias, "mine");
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let temp = tempdir().unwrap();
        let store = std::sync::Arc::new(ConfigStore::with_path(temp.path().join("config.json")));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update(|cfg| {
                        cfg.favorites.insert(format!("host-{}", i), true);
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let loaded = store.read_raw().await.unwrap();
        assert_eq!(loaded.favorites.len(), 8);
    }

    #[tokio::test]
    async fn test_unchanged_update_does_not_write() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        let store = ConfigStore::with_path(path.clone());

        store.update(|_| ()).await.unwrap();
        assert!(!path.exists());

        store
            .update(|cfg| cfg.source_toggles.remote = true)
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let temp = tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = ConfigStore::with_path(blocker.join("config.json"));

        let err = store.write(&Config::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        let store = ConfigStore::with_path(path.clone());

        let mut first = Config::default();
        first.hosts.push(Host::new("kept", "1.1.1.1"));
        store.write(&first).await.unwrap();

        // Occupy the temp file's name so the next write cannot create it
        let temp_path = temp.path().join("config.json.tmp");
        std::fs::create_dir(&temp_path).unwrap();
        std::fs::write(temp_path.join("occupied"), "x").unwrap();

        let mut second = Config::default();
        second.hosts.push(Host::new("lost", "2.2.2.2"));
        second.hosts.push(Host::new("also-lost", "3.3.3.3"));
        let err = store.write(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));

        let loaded = store.read_raw().await.unwrap();
        assert_eq!(loaded.hosts.len(), 1);
        assert_eq!(loaded.hosts[0].alias, "kept");
    }
}
