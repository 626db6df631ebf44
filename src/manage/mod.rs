//! Edits to the manual host list and favorites
//!
//! These operate on an in-memory [`Config`]; callers run them inside
//! [`crate::Aggregator::update_config`] so the change is a single
//! read-modify-write of the config file.

mod export;
mod import;

pub use export::{export_ssh_config, render_ssh_config};
pub use import::{import_hosts, ImportReport};

use crate::config::Config;
use crate::types::{Host, Source};

/// Flip the favorite flag for `alias` and return the new state.
///
/// Every key matching the alias case-insensitively is cleared first so the
/// map never holds two spellings of one alias.
pub fn toggle_favorite(config: &mut Config, alias: &str) -> bool {
    let now_favorite = !config.is_favorite(alias);
    let wanted = alias.to_lowercase();
    config
        .favorites
        .retain(|key, _| key.to_lowercase() != wanted);
    if now_favorite {
        config.favorites.insert(alias.to_string(), true);
    }
    now_favorite
}

/// Insert or replace a manual host. Returns true when an existing entry was
/// replaced.
pub fn upsert_manual(config: &mut Config, host: Host) -> bool {
    let record = host.to_manual_record();
    match config.hosts.iter_mut().find(|h| h.matches_alias(&record.alias)) {
        Some(existing) => {
            *existing = record;
            true
        }
        None => {
            config.hosts.push(record);
            false
        }
    }
}

/// Remove a manual host by alias. Returns the removed record, if any.
pub fn remove_manual(config: &mut Config, alias: &str) -> Option<Host> {
    let pos = config.hosts.iter().position(|h| h.matches_alias(alias))?;
    Some(config.hosts.remove(pos))
}

/// Enable or disable a source.
pub fn set_source_enabled(config: &mut Config, source: Source, enabled: bool) {
    config.source_toggles.set(source, enabled);
    match source {
        Source::LocalConfig if enabled => config.local_config.enabled = true,
        Source::Remote if enabled => config.remote.enabled = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_favorite() {
        let mut config = Config::default();
        config.favorites.insert("WEB".to_string(), true);

        assert!(!toggle_favorite(&mut config, "web"));
        assert!(config.favorites.is_empty());

        assert!(toggle_favorite(&mut config, "web"));
        assert_eq!(config.favorites.get("web"), Some(&true));
        assert_eq!(config.favorites.len(), 1);
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut config = Config::default();
        assert!(!upsert_manual(&mut config, Host::new("db", "10.0.0.5")));
        assert!(upsert_manual(
            &mut config,
            Host::new("DB", "10.0.0.6").with_source(Source::Remote)
        ));
        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts[0].hostname, "10.0.0.6");
        assert_eq!(config.hosts[0].source, Source::Manual);

        assert!(remove_manual(&mut config, "nope").is_none());
        assert_eq!(remove_manual(&mut config, "db").unwrap().alias, "DB");
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn test_enabling_remote_sets_both_flags() {
        let mut config = Config::default();
        set_source_enabled(&mut config, Source::Remote, true);
        assert!(config.source_toggles.remote);
        assert!(config.remote.enabled);

        set_source_enabled(&mut config, Source::Manual, false);
        assert!(!config.source_toggles.manual);
    }
}
