//! Host records and their provenance

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 22;

/// Where a host record came from.
///
/// `Ord` only gives maps a stable key order; merge priority is
/// [`Source::PRIORITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Manual,
    LocalConfig,
    Remote,
}

impl Source {
    /// All sources, highest priority first.
    pub const PRIORITY: [Source; 3] = [Source::Manual, Source::LocalConfig, Source::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::LocalConfig => "local-config",
            Source::Remote => "remote",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(Source::Manual),
            "local-config" | "ssh-config" => Ok(Source::LocalConfig),
            "remote" | "termix" => Ok(Source::Remote),
            other => Err(format!(
                "unknown source '{}' (expected manual, local-config or remote)",
                other
            )),
        }
    }
}

fn default_source() -> Source {
    Source::Manual
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u16),
    Text(String),
}

impl PortRepr {
    /// `None` for an empty string.
    fn into_port(self) -> Result<Option<u16>, String> {
        match self {
            PortRepr::Number(port) => Ok(Some(port)),
            PortRepr::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse::<u16>()
                    .map(Some)
                    .map_err(|e| format!("invalid port '{}': {}", text, e))
            }
        }
    }
}

/// Older config files store the port as a string ("22"); accept both.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    PortRepr::deserialize(deserializer)?
        .into_port()
        .map(|port| port.unwrap_or(DEFAULT_PORT))
        .map_err(serde::de::Error::custom)
}

/// Lenient port for records from other systems: `null`, missing, empty and
/// unparsable values all come back as `None` instead of failing the record.
pub(crate) fn deserialize_optional_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let port = value
        .and_then(|v| PortRepr::deserialize(v).ok())
        .and_then(|repr| repr.into_port().ok())
        .flatten();
    Ok(port)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub alias: String,
    pub hostname: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_jump: Option<String>,
    #[serde(default, alias = "defaultPath", skip_serializing_if = "Option::is_none")]
    pub default_remote_path: Option<String>,
    #[serde(default = "default_source")]
    pub source: Source,

    /// Sources this alias was found in during the last load, priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_in: Vec<Source>,

    /// Every source's own record for this alias, winner included.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<Source, Host>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub favorite: bool,
}

impl Host {
    pub fn new(alias: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            hostname: hostname.into(),
            user: String::new(),
            port: DEFAULT_PORT,
            identity_file: None,
            proxy_jump: None,
            default_remote_path: None,
            source: Source::Manual,
            available_in: Vec::new(),
            variants: BTreeMap::new(),
            favorite: false,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Lowercased alias, the key used for lookups and merging.
    pub fn alias_key(&self) -> String {
        self.alias.to_lowercase()
    }

    pub fn matches_alias(&self, alias: &str) -> bool {
        self.alias.to_lowercase() == alias.to_lowercase()
    }

    /// `user@hostname`, or the bare hostname when no user is set.
    pub fn target(&self) -> String {
        let user = self.user.trim();
        if user.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}@{}", user, self.hostname)
        }
    }

    /// The record as a single source contributed it, without merge bookkeeping.
    pub fn source_record(&self) -> Host {
        Host {
            available_in: Vec::new(),
            variants: BTreeMap::new(),
            favorite: false,
            ..self.clone()
        }
    }

    /// The record as it should be persisted in the manual host list.
    pub fn to_manual_record(&self) -> Host {
        Host {
            source: Source::Manual,
            ..self.source_record()
        }
    }

    /// Pick the record a given source contributed, falling back to `self`
    /// when no source is requested.
    pub fn variant(&self, source: Option<Source>) -> Option<&Host> {
        match source {
            None => Some(self),
            Some(src) => self.variants.get(&src),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_accepts_string_and_number() {
        let from_text: Host =
            serde_json::from_str(r#"{"alias":"a","hostname":"h","port":"2222"}"#).unwrap();
        assert_eq!(from_text.port, 2222);

        let from_number: Host =
            serde_json::from_str(r#"{"alias":"a","hostname":"h","port":2200}"#).unwrap();
        assert_eq!(from_number.port, 2200);

        let missing: Host = serde_json::from_str(r#"{"alias":"a","hostname":"h"}"#).unwrap();
        assert_eq!(missing.port, 22);
        assert_eq!(missing.source, Source::Manual);

        let empty: Host =
            serde_json::from_str(r#"{"alias":"a","hostname":"h","port":""}"#).unwrap();
        assert_eq!(empty.port, 22);
    }

    #[test]
    fn test_source_names() {
        assert_eq!(
            serde_json::to_string(&Source::LocalConfig).unwrap(),
            "\"local-config\""
        );
        assert_eq!("ssh-config".parse::<Source>().unwrap(), Source::LocalConfig);
        assert_eq!("Remote".parse::<Source>().unwrap(), Source::Remote);
        assert!("nowhere".parse::<Source>().is_err());
        assert!(Source::Manual < Source::LocalConfig && Source::LocalConfig < Source::Remote);
    }

    #[test]
    fn test_manual_record_strips_provenance() {
        let mut host = Host::new("web", "10.0.0.1").with_source(Source::Remote);
        host.available_in = vec![Source::Remote];
        host.favorite = true;
        host.variants.insert(Source::Remote, host.source_record());

        let record = host.to_manual_record();
        assert_eq!(record.source, Source::Manual);
        assert!(record.available_in.is_empty());
        assert!(record.variants.is_empty());
        assert!(!record.favorite);

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("availableIn"));
        assert!(!json.contains("favorite"));
    }

    #[test]
    fn test_target() {
        assert_eq!(Host::new("a", "h").target(), "h");
        assert_eq!(Host::new("a", "h").with_user("root").target(), "root@h");
    }
}
