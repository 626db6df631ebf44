//! Host aggregation over all enabled sources
//!
//! Priority order (highest to lowest):
//! 1. Manual hosts from the config file
//! 2. SSH client configuration
//! 3. Remote host list
//!
//! Winners are recomputed on every load; nothing about the merge is persisted.

use crate::aggregate::merge::{apply_favorites, merge_by_priority, sort_hosts};
use crate::config::{Config, ConfigStore, LocalConfigSettings, RemoteSettings, SourceToggles};
use crate::sources::{LocalConfigReader, RemoteHostClient};
use crate::types::{
    Host, HostError, RemoteError, SessionToken, Source, SourceUnavailable, StoreError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call settings for [`Aggregator::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Upper bound for the remote fetch. Falls back to the configured
    /// `remote.timeoutSecs` when unset.
    pub remote_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Merged, de-duplicated, sorted hosts.
    pub hosts: Vec<Host>,

    /// Sources that failed and were skipped.
    pub degraded: Vec<SourceUnavailable>,

    /// Session token the remote client ended up with, when it differs from
    /// the persisted one. Hand it to [`Aggregator::persist_token`] to keep it.
    pub refreshed_token: Option<SessionToken>,
}

impl LoadOutcome {
    pub fn find(&self, alias: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.matches_alias(alias))
    }
}

/// Replacement values for [`Aggregator::save_manual`]. `None` leaves a
/// section as it is on disk.
#[derive(Debug, Clone, Default)]
pub struct ManualUpdate {
    pub hosts: Option<Vec<Host>>,
    pub favorites: Option<BTreeMap<String, bool>>,
    pub source_toggles: Option<SourceToggles>,
    pub remote: Option<RemoteSettings>,
    pub local_config: Option<LocalConfigSettings>,
}

pub struct Aggregator {
    store: Arc<ConfigStore>,
    local: Arc<dyn LocalConfigReader>,
    remote: Arc<dyn RemoteHostClient>,
}

fn store_error(err: StoreError) -> HostError {
    match err {
        StoreError::Read { .. } | StoreError::Parse { .. } | StoreError::NoConfigDir => {
            HostError::ConfigRead(err)
        }
        StoreError::Write { .. } | StoreError::Serialize(_) => HostError::Persistence(err),
    }
}

impl Aggregator {
    pub fn new(
        store: Arc<ConfigStore>,
        local: Arc<dyn LocalConfigReader>,
        remote: Arc<dyn RemoteHostClient>,
    ) -> Self {
        Self {
            store,
            local,
            remote,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Read every enabled source and merge them into one sorted list.
    ///
    /// Fails only when the config file cannot be read or the remote source
    /// requires authentication. Other source failures are logged and listed
    /// in [`LoadOutcome::degraded`].
    pub async fn load(&self, options: &LoadOptions) -> Result<LoadOutcome, HostError> {
        let config = self.store.read_raw().await.map_err(HostError::ConfigRead)?;

        let mut batches: Vec<(Source, Vec<Host>)> = Vec::new();
        let mut degraded = Vec::new();

        if config.is_source_enabled(Source::Manual) {
            debug!("Manual source: {} hosts", config.hosts.len());
            batches.push((Source::Manual, config.hosts.clone()));
        }

        // Both fetches finish before anything is merged
        let (local_result, remote_result) = tokio::join!(
            self.read_local(&config),
            self.fetch_remote(&config, options)
        );

        match local_result {
            Some(Ok(hosts)) => {
                debug!("Local config source: {} hosts", hosts.len());
                batches.push((Source::LocalConfig, hosts));
            }
            Some(Err(reason)) => {
                warn!("Skipping local config source: {}", reason);
                degraded.push(SourceUnavailable {
                    source: Source::LocalConfig,
                    reason,
                });
            }
            None => {}
        }

        let mut refreshed_token = None;
        match remote_result {
            Some(Ok(hosts)) => {
                debug!("Remote source: {} hosts", hosts.len());
                batches.push((Source::Remote, hosts));

                let current = self.remote.current_token().await;
                if current.is_some() && current != config.remote.session_token() {
                    debug!("Remote session token changed during fetch");
                    refreshed_token = current;
                }
            }
            Some(Err(RemoteError::AuthRequired(auth))) => {
                info!("Remote source requires authentication");
                return Err(HostError::AuthRequired(auth));
            }
            Some(Err(e)) => {
                warn!("Skipping remote source: {}", e);
                degraded.push(SourceUnavailable {
                    source: Source::Remote,
                    reason: e.to_string(),
                });
            }
            None => {}
        }

        let mut hosts = merge_by_priority(batches);
        apply_favorites(&mut hosts, &config.favorites);
        sort_hosts(&mut hosts);

        info!(
            "Loaded {} hosts ({} sources degraded)",
            hosts.len(),
            degraded.len()
        );

        Ok(LoadOutcome {
            hosts,
            degraded,
            refreshed_token,
        })
    }

    async fn read_local(&self, config: &Config) -> Option<Result<Vec<Host>, String>> {
        if !config.is_source_enabled(Source::LocalConfig) {
            debug!("Local config source disabled");
            return None;
        }
        Some(self.local.read().await.map_err(|e| e.to_string()))
    }

    async fn fetch_remote(
        &self,
        config: &Config,
        options: &LoadOptions,
    ) -> Option<Result<Vec<Host>, RemoteError>> {
        if !config.is_source_enabled(Source::Remote) {
            debug!("Remote source disabled or not configured");
            return None;
        }

        let limit = options
            .remote_timeout
            .unwrap_or_else(|| Duration::from_secs(config.remote.timeout_secs));
        let fetch = self
            .remote
            .fetch_hosts(&config.remote.base_url, config.remote.session_token());

        let result = match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(limit)),
        };
        Some(result)
    }

    /// Load and pick one host by alias, optionally a specific source's variant.
    pub async fn resolve(
        &self,
        alias: &str,
        source: Option<Source>,
        options: &LoadOptions,
    ) -> Result<(Host, LoadOutcome), HostError> {
        let outcome = self.load(options).await?;
        let host = outcome
            .find(alias)
            .and_then(|h| h.variant(source))
            .cloned()
            .ok_or_else(|| match source {
                Some(src) => HostError::HostNotFound(format!("{} (in {})", alias, src)),
                None => HostError::HostNotFound(alias.to_string()),
            })?;
        Ok((host, outcome))
    }

    /// Replace the given sections of the persisted config in one write.
    pub async fn save_manual(&self, update: ManualUpdate) -> Result<(), HostError> {
        self.update_config(move |config| {
            if let Some(hosts) = update.hosts {
                config.hosts = hosts;
            }
            if let Some(favorites) = update.favorites {
                config.favorites = favorites;
            }
            if let Some(toggles) = update.source_toggles {
                config.source_toggles = toggles;
            }
            if let Some(remote) = update.remote {
                config.remote = remote;
            }
            if let Some(local) = update.local_config {
                config.local_config = local;
            }
        })
        .await
    }

    /// Read-modify-write of the config file under the store's write lock.
    pub async fn update_config<F, T>(&self, f: F) -> Result<T, HostError>
    where
        F: FnOnce(&mut Config) -> T,
    {
        let (_, out) = self.store.update(f).await.map_err(store_error)?;
        Ok(out)
    }

    /// Persist a session token unless it is already stored. Returns whether
    /// the file was written.
    pub async fn persist_token(&self, token: &SessionToken) -> Result<bool, HostError> {
        self.update_config(|config| {
            if config.remote.session_token().as_ref() == Some(token) {
                return false;
            }
            config.remote.set_session_token(Some(token));
            true
        })
        .await
    }

    /// Log in to the remote host list and store the resulting token.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, HostError> {
        let config = self.store.read_raw().await.map_err(HostError::ConfigRead)?;
        if !config.remote.is_configured() {
            return Err(HostError::RemoteNotConfigured);
        }

        let token = self
            .remote
            .authenticate(&config.remote.base_url, username, password)
            .await
            .map_err(|e| match e {
                RemoteError::AuthRequired(auth) => HostError::AuthRequired(auth),
                other => HostError::Remote(other),
            })?;

        self.persist_token(&token).await?;
        Ok(token)
    }
}
