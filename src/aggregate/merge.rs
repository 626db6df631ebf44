//! Priority merge of per-source host lists
//!
//! Pure functions over already-collected inputs; nothing here does I/O.

use crate::types::{Host, Source};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Merge per-source host lists into one list keyed by case-insensitive alias.
///
/// Batches are processed in [`Source::PRIORITY`] order regardless of the order
/// they are passed in. The first source to supply an alias wins; later
/// sources only add themselves to `available_in` and `variants`. Output keeps
/// first-seen order.
pub fn merge_by_priority(mut batches: Vec<(Source, Vec<Host>)>) -> Vec<Host> {
    batches.sort_by_key(|(source, _)| Source::PRIORITY.iter().position(|s| s == source));

    let mut merged: Vec<Host> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (source, hosts) in batches {
        for host in hosts {
            let mut record = host.source_record();
            record.source = source;
            let key = record.alias_key();

            match index.get(&key) {
                Some(&pos) => {
                    let winner = &mut merged[pos];
                    if winner.variants.contains_key(&source) {
                        debug!("Duplicate alias '{}' within {}, keeping first", record.alias, source);
                        continue;
                    }
                    winner.available_in.push(source);
                    winner.variants.insert(source, record);
                }
                None => {
                    let mut winner = record.clone();
                    winner.available_in = vec![source];
                    winner.variants.insert(source, record);
                    index.insert(key, merged.len());
                    merged.push(winner);
                }
            }
        }
    }

    merged
}

/// Set `favorite` from the persisted favorites map, whatever source won.
pub fn apply_favorites(hosts: &mut [Host], favorites: &BTreeMap<String, bool>) {
    let wanted: HashSet<String> = favorites
        .iter()
        .filter(|(_, fav)| **fav)
        .map(|(alias, _)| alias.to_lowercase())
        .collect();

    for host in hosts.iter_mut() {
        host.favorite = wanted.contains(&host.alias_key());
    }
}

/// Favorites first, then case-insensitive alias; ties keep input order.
pub fn sort_hosts(hosts: &mut [Host]) {
    hosts.sort_by(|a, b| {
        b.favorite
            .cmp(&a.favorite)
            .then_with(|| a.alias_key().cmp(&b.alias_key()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(alias: &str, hostname: &str) -> Host {
        Host::new(alias, hostname)
    }

    fn aliases(hosts: &[Host]) -> Vec<&str> {
        hosts.iter().map(|h| h.alias.as_str()).collect()
    }

    #[test]
    fn test_higher_priority_wins_and_variants_are_kept() {
        let manual = host("db", "10.0.0.1").with_user("admin");
        let local = host("db", "db.internal").with_user("postgres").with_port(2222);

        let merged = merge_by_priority(vec![
            (Source::LocalConfig, vec![local.clone()]),
            (Source::Manual, vec![manual.clone()]),
        ]);

        assert_eq!(merged.len(), 1);
        let db = &merged[0];
        assert_eq!(db.hostname, "10.0.0.1");
        assert_eq!(db.user, "admin");
        assert_eq!(db.source, Source::Manual);
        assert_eq!(db.available_in, vec![Source::Manual, Source::LocalConfig]);

        assert_eq!(db.variants[&Source::Manual], manual);
        assert_eq!(
            db.variants[&Source::LocalConfig],
            local.with_source(Source::LocalConfig)
        );
    }

    #[test]
    fn test_alias_collision_ignores_case() {
        let merged = merge_by_priority(vec![
            (Source::Manual, vec![host("Web", "1.1.1.1")]),
            (Source::Remote, vec![host("web", "2.2.2.2")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].alias, "Web");
        assert_eq!(merged[0].hostname, "1.1.1.1");
        assert_eq!(merged[0].available_in, vec![Source::Manual, Source::Remote]);
        assert_eq!(merged[0].variants[&Source::Remote].alias, "web");
    }

    #[test]
    fn test_union_of_aliases() {
        let merged = merge_by_priority(vec![
            (Source::Manual, vec![host("a", "1"), host("b", "2")]),
            (Source::LocalConfig, vec![host("B", "3"), host("c", "4")]),
            (Source::Remote, vec![host("d", "5"), host("A", "6")]),
        ]);
        assert_eq!(aliases(&merged), vec!["a", "b", "c", "d"]);
        assert!(merged.iter().all(|h| !h.available_in.is_empty()));
        assert_eq!(merged[0].available_in, vec![Source::Manual, Source::Remote]);
    }

    #[test]
    fn test_duplicate_within_source_keeps_first() {
        let merged = merge_by_priority(vec![(
            Source::LocalConfig,
            vec![host("x", "first"), host("X", "second")],
        )]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].hostname, "first");
        assert_eq!(merged[0].available_in, vec![Source::LocalConfig]);
    }

    #[test]
    fn test_favorites_reapplied_regardless_of_winner() {
        let mut merged = merge_by_priority(vec![(
            Source::Remote,
            vec![host("db", "1"), host("web", "2")],
        )]);
        let mut favorites = BTreeMap::new();
        favorites.insert("DB".to_string(), true);
        favorites.insert("web".to_string(), false);

        apply_favorites(&mut merged, &favorites);
        assert!(merged[0].favorite);
        assert!(!merged[1].favorite);
    }

    #[test]
    fn test_sort_favorites_then_alias() {
        let mut hosts = vec![host("zeta", "1"), host("alpha", "2"), host("beta", "3")];
        hosts[1].favorite = true;

        sort_hosts(&mut hosts);
        assert_eq!(aliases(&hosts), vec!["alpha", "beta", "zeta"]);

        let mut hosts = vec![host("b", "1"), host("C", "2"), host("a", "3"), host("x", "4")];
        hosts[3].favorite = true;
        hosts[1].favorite = true;
        sort_hosts(&mut hosts);
        assert_eq!(aliases(&hosts), vec!["C", "x", "a", "b"]);
    }

    #[test]
    fn test_sort_ties_keep_insertion_order() {
        let mut hosts = vec![host("Same", "first"), host("same", "second")];
        sort_hosts(&mut hosts);
        assert_eq!(hosts[0].hostname, "first");
        assert_eq!(hosts[1].hostname, "second");
    }
}
