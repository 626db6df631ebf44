use crate::types::{Host, DEFAULT_PORT};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Render hosts as `~/.ssh/config` blocks.
pub fn render_ssh_config(hosts: &[Host]) -> String {
    let mut out = String::from("# Generated by sshbuddy\n\n");

    for host in hosts {
        let _ = writeln!(out, "Host {}", host.alias);
        let _ = writeln!(out, "    HostName {}", host.hostname);
        if !host.user.trim().is_empty() {
            let _ = writeln!(out, "    User {}", host.user);
        }
        if host.port != DEFAULT_PORT {
            let _ = writeln!(out, "    Port {}", host.port);
        }
        if let Some(identity) = host.identity_file.as_deref().filter(|v| !v.is_empty()) {
            let _ = writeln!(out, "    IdentityFile {}", identity);
        }
        if let Some(jump) = host.proxy_jump.as_deref().filter(|v| !v.is_empty()) {
            let _ = writeln!(out, "    ProxyJump {}", jump);
        }
        out.push('\n');
    }

    out
}

/// Write rendered hosts to `path`. An existing file is moved to `<path>.bak`
/// first. Returns the backup path when one was made.
pub async fn export_ssh_config(hosts: &[Host], path: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut backup = None;

    if fs::metadata(path).await.is_ok() {
        let mut backup_name = path.as_os_str().to_owned();
        backup_name.push(".bak");
        let backup_path = PathBuf::from(backup_name);
        // No backup, no overwrite
        fs::rename(path, &backup_path).await.map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("could not back up {}: {}", path.display(), e),
            )
        })?;
        info!("Backed up {} to {}", path.display(), backup_path.display());
        backup = Some(backup_path);
    } else if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, render_ssh_config(hosts)).await?;
    info!("Exported {} hosts to {}", hosts.len(), path.display());
    Ok(backup)
}
