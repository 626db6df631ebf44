//! Built-in defaults used when no config file exists
//!
//! Manual and local-config sources are on, the remote source is off.

use super::user_config::{Config, LocalConfigSettings, RemoteSettings, SourceToggles};
use std::collections::BTreeMap;

pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

impl Default for SourceToggles {
    fn default() -> Self {
        Self {
            manual: true,
            local_config: true,
            remote: false,
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            token: None,
            token_expiry: None,
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

impl Default for LocalConfigSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            favorites: BTreeMap::new(),
            source_toggles: SourceToggles::default(),
            remote: RemoteSettings::default(),
            local_config: LocalConfigSettings::default(),
        }
    }
}
