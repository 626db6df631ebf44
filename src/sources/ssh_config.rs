//! SSH client configuration reader
//!
//! Scans ~/.ssh/config, top-level *.conf files in ~/.ssh and
//! ~/.ssh/config.d/*.conf, in that order.

use crate::sources::LocalConfigReader;
use crate::types::{Host, Source, SourceError, DEFAULT_PORT};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct SshConfigReader {
    ssh_dir: Option<PathBuf>,
}

impl SshConfigReader {
    /// Reader rooted at `~/.ssh`.
    pub fn new() -> Self {
        Self {
            ssh_dir: dirs::home_dir().map(|home| home.join(".ssh")),
        }
    }

    pub fn with_dir(ssh_dir: PathBuf) -> Self {
        Self {
            ssh_dir: Some(ssh_dir),
        }
    }

    async fn discover_files(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let ssh_dir = match &self.ssh_dir {
            Some(dir) => dir,
            None => return paths,
        };

        let main_config = ssh_dir.join("config");
        if fs::metadata(&main_config)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            paths.push(main_config);
        }

        for dir in [ssh_dir.clone(), ssh_dir.join("config.d")] {
            for path in collect_conf_files(&dir).await {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        paths
    }
}

impl Default for SshConfigReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalConfigReader for SshConfigReader {
    async fn read(&self) -> Result<Vec<Host>, SourceError> {
        let files = self.discover_files().await;
        let mut hosts = Vec::new();
        let mut seen = HashSet::new();

        for path in files {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| SourceError::Io {
                    path: path.clone(),
                    source: e,
                })?;

            let parsed = parse_ssh_config(&content);
            debug!("Parsed {} hosts from {}", parsed.len(), path.display());

            for host in parsed {
                if seen.insert(host.alias_key()) {
                    hosts.push(host);
                }
            }
        }

        Ok(hosts)
    }
}

async fn collect_conf_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return files,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".conf"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }

    files.sort();
    files
}

#[derive(Default)]
struct BlockOptions {
    hostname: Option<String>,
    user: Option<String>,
    /// Raw value; an unparsable first `Port` still blocks later ones.
    port: Option<String>,
    identity_file: Option<String>,
    proxy_jump: Option<String>,
}

/// Parse the `Host` blocks of one SSH config file.
///
/// Wildcard and negated patterns are skipped, `Match` blocks are ignored and
/// a block without `HostName` connects to its alias.
pub fn parse_ssh_config(content: &str) -> Vec<Host> {
    let mut hosts = Vec::new();
    let mut aliases: Vec<String> = Vec::new();
    let mut opts = BlockOptions::default();

    for raw_line in content.lines() {
        let line = strip_comment(raw_line);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = split_directive(line);

        if key.eq_ignore_ascii_case("Host") {
            flush_block(&mut hosts, &mut aliases, &mut opts);
            aliases = value
                .split_whitespace()
                .map(unquote)
                .filter(|alias| is_concrete_alias(alias))
                .map(str::to_string)
                .collect();
            continue;
        }

        if key.eq_ignore_ascii_case("Match") {
            flush_block(&mut hosts, &mut aliases, &mut opts);
            continue;
        }

        if aliases.is_empty() || value.is_empty() {
            continue;
        }

        let value = unquote(value).to_string();
        // ssh uses the first value it sees for each option
        match key.to_ascii_lowercase().as_str() {
            "hostname" if opts.hostname.is_none() => opts.hostname = Some(value),
            "user" if opts.user.is_none() => opts.user = Some(value),
            "port" if opts.port.is_none() => opts.port = Some(value),
            "identityfile" if opts.identity_file.is_none() => opts.identity_file = Some(value),
            "proxyjump" if opts.proxy_jump.is_none() => opts.proxy_jump = Some(value),
            _ => {}
        }
    }

    flush_block(&mut hosts, &mut aliases, &mut opts);
    hosts
}

fn flush_block(hosts: &mut Vec<Host>, aliases: &mut Vec<String>, opts: &mut BlockOptions) {
    for alias in aliases.drain(..) {
        let hostname = opts
            .hostname
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| alias.clone());

        let mut host = Host::new(alias, hostname)
            .with_user(opts.user.clone().unwrap_or_default())
            .with_port(
                opts.port
                    .as_deref()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(DEFAULT_PORT),
            )
            .with_source(Source::LocalConfig);
        host.identity_file = opts.identity_file.clone();
        host.proxy_jump = opts.proxy_jump.clone();
        hosts.push(host);
    }
    *opts = BlockOptions::default();
}

/// Split `Key value` or `Key=value`.
fn split_directive(line: &str) -> (&str, &str) {
    let end = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let key = &line[..end];
    let rest = line[end..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    (key, rest.trim())
}

fn strip_comment(input: &str) -> &str {
    let mut in_quotes = false;
    for (idx, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &input[..idx],
            _ => {}
        }
    }
    input
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn is_concrete_alias(alias: &str) -> bool {
    !alias.is_empty() && !alias.contains(['*', '?', '!'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
# Global defaults
Host *
    ServerAliveInterval 30

Host web web-alias   # two names
    HostName 10.0.0.10
    User deploy
    Port 2222
    IdentityFile ~/.ssh/id_web

Host db
    hostname=db.internal
    user = postgres
    ProxyJump bastion

Host bastion
    User jump

Match host *.corp
    User corp

Host !negated staging-?
    HostName ignored
"#;

    #[test]
    fn test_parse_blocks() {
        let hosts = parse_ssh_config(SAMPLE);
        let aliases: Vec<&str> = hosts.iter().map(|h| h.alias.as_str()).collect();
        assert_eq!(aliases, vec!["web", "web-alias", "db", "bastion"]);

        let web = &hosts[0];
        assert_eq!(web.hostname, "10.0.0.10");
        assert_eq!(web.user, "deploy");
        assert_eq!(web.port, 2222);
        assert_eq!(web.identity_file.as_deref(), Some("~/.ssh/id_web"));
        assert_eq!(web.source, Source::LocalConfig);
        assert_eq!(hosts[1].hostname, "10.0.0.10");

        let db = &hosts[2];
        assert_eq!(db.hostname, "db.internal");
        assert_eq!(db.user, "postgres");
        assert_eq!(db.port, 22);
        assert_eq!(db.proxy_jump.as_deref(), Some("bastion"));

        // No HostName: connect to the alias itself
        assert_eq!(hosts[3].hostname, "bastion");
        assert_eq!(hosts[3].user, "jump");
    }

    #[test]
    fn test_first_value_wins() {
        let hosts = parse_ssh_config("Host a\n  User first\n  User second\n  Port nope\n");
        assert_eq!(hosts[0].user, "first");
        assert_eq!(hosts[0].port, 22);
    }

    #[test]
    fn test_invalid_port_still_shadows_later_ports() {
        let hosts = parse_ssh_config("Host a\n  Port nope\n  Port 2222\n");
        assert_eq!(hosts[0].port, 22);

        let hosts = parse_ssh_config("Host b\n  Port 2200\n  Port 2222\n");
        assert_eq!(hosts[0].port, 2200);
    }

    #[test]
    fn test_quoted_hash_is_not_a_comment() {
        let hosts = parse_ssh_config("Host a\n  IdentityFile \"~/keys/#1\"\n");
        assert_eq!(hosts[0].identity_file.as_deref(), Some("~/keys/#1"));
    }

    #[tokio::test]
    async fn test_reader_scans_config_and_conf_files() {
        let temp = tempdir().unwrap();
        let ssh_dir = temp.path().join(".ssh");
        std::fs::create_dir_all(ssh_dir.join("config.d")).unwrap();
        std::fs::write(ssh_dir.join("config"), "Host main\n  HostName 1.1.1.1\n").unwrap();
        std::fs::write(ssh_dir.join("extra.conf"), "Host extra\n  HostName 2.2.2.2\n").unwrap();
        std::fs::write(
            ssh_dir.join("config.d").join("work.conf"),
            "Host MAIN\n  HostName 9.9.9.9\nHost work\n  HostName 3.3.3.3\n",
        )
        .unwrap();
        std::fs::write(ssh_dir.join("known_hosts"), "Host nope\n").unwrap();

        let reader = SshConfigReader::with_dir(ssh_dir);
        let hosts = reader.read().await.unwrap();
        let aliases: Vec<&str> = hosts.iter().map(|h| h.alias.as_str()).collect();
        assert_eq!(aliases, vec!["main", "extra", "work"]);
        assert_eq!(hosts[0].hostname, "1.1.1.1");
    }

    #[tokio::test]
    async fn test_missing_ssh_dir_is_empty() {
        let temp = tempdir().unwrap();
        let reader = SshConfigReader::with_dir(temp.path().join("absent"));
        assert!(reader.read().await.unwrap().is_empty());
    }
}
