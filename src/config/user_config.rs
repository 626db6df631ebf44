//! Persisted configuration file layout

use crate::types::{Host, SessionToken, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::defaults::{default_remote_timeout_secs, default_true};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Manually entered hosts only.
    #[serde(default)]
    pub hosts: Vec<Host>,

    /// alias -> true, independent of which source supplies the alias.
    #[serde(default)]
    pub favorites: BTreeMap<String, bool>,

    #[serde(default, alias = "sources")]
    pub source_toggles: SourceToggles,

    #[serde(default, alias = "termix")]
    pub remote: RemoteSettings,

    #[serde(default, alias = "ssh")]
    pub local_config: LocalConfigSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceToggles {
    #[serde(default = "default_true")]
    pub manual: bool,
    #[serde(default = "default_true")]
    pub local_config: bool,
    #[serde(default)]
    pub remote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConfigSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceToggles {
    pub fn is_enabled(&self, source: Source) -> bool {
        match source {
            Source::Manual => self.manual,
            Source::LocalConfig => self.local_config,
            Source::Remote => self.remote,
        }
    }

    pub fn set(&mut self, source: Source, enabled: bool) {
        match source {
            Source::Manual => self.manual = enabled,
            Source::LocalConfig => self.local_config = enabled,
            Source::Remote => self.remote = enabled,
        }
    }
}

impl RemoteSettings {
    /// Remote is fetched only when enabled and pointed at something.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.base_url.trim().is_empty()
    }

    pub fn session_token(&self) -> Option<SessionToken> {
        self.token
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| SessionToken::new(t.clone(), self.token_expiry))
    }

    pub fn set_session_token(&mut self, token: Option<&SessionToken>) {
        self.token = token.map(|t| t.token.clone());
        self.token_expiry = token.and_then(|t| t.expiry);
    }
}

impl Config {
    pub fn is_source_enabled(&self, source: Source) -> bool {
        if !self.source_toggles.is_enabled(source) {
            return false;
        }
        match source {
            Source::Manual => true,
            Source::LocalConfig => self.local_config.enabled,
            Source::Remote => self.remote.is_configured(),
        }
    }

    /// Favorite lookup; alias keys compare case-insensitively.
    pub fn is_favorite(&self, alias: &str) -> bool {
        let wanted = alias.to_lowercase();
        self.favorites
            .iter()
            .any(|(key, fav)| *fav && key.to_lowercase() == wanted)
    }

    /// Copy of this config in the shape that is written to disk.
    pub fn to_persisted(&self) -> Config {
        Config {
            hosts: self
                .hosts
                .iter()
                .filter(|h| h.source == Source::Manual)
                .map(Host::to_manual_record)
                .collect(),
            favorites: self
                .favorites
                .iter()
                .filter(|(_, fav)| **fav)
                .map(|(alias, _)| (alias.clone(), true))
                .collect(),
            ..self.clone()
        }
    }
}
