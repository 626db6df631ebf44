//! Persisted configuration for sshbuddy
//!
//! Holds the manual host list, favorites, per-source toggles and the cached
//! remote session. Only manual hosts are ever written as hosts; hosts from
//! the SSH client config and the remote list live in memory per load.

mod defaults;
mod store;
mod user_config;

pub use defaults::DEFAULT_REMOTE_TIMEOUT_SECS;
pub use store::{default_config_path, ConfigStore, CONFIG_ENV};
pub use user_config::{Config, LocalConfigSettings, RemoteSettings, SourceToggles};
