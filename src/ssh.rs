//! Launching `ssh` for a host

use crate::types::Host;
use std::process::{Command, ExitStatus};
use tracing::info;

/// Arguments for `ssh` to reach `host`, in the order ssh expects them.
pub fn command_args(host: &Host) -> Vec<String> {
    let mut args = vec!["-p".to_string(), host.port.to_string()];

    if let Some(identity) = host.identity_file.as_deref().filter(|v| !v.is_empty()) {
        args.push("-i".to_string());
        args.push(identity.to_string());
    }

    if let Some(jump) = host.proxy_jump.as_deref().filter(|v| !v.is_empty()) {
        args.push("-J".to_string());
        args.push(jump.to_string());
    }

    match host.default_remote_path.as_deref().filter(|v| !v.is_empty()) {
        Some(path) => {
            args.push("-t".to_string());
            args.push(host.target());
            args.push(format!(
                "cd \"{}\" && exec $SHELL -l",
                escape_for_double_quotes(path)
            ));
        }
        None => args.push(host.target()),
    }

    args
}

/// Escape a path for use inside double quotes on the remote shell.
///
/// `~` becomes `$HOME` since tilde does not expand inside quotes; `$` is left
/// alone so variables still expand.
fn escape_for_double_quotes(path: &str) -> String {
    let path = if path == "~" {
        "$HOME".to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("$HOME/{}", rest)
    } else {
        path.to_string()
    };

    path.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('`', "\\`")
}

/// Run `ssh` in the foreground with the terminal attached.
pub fn connect(host: &Host) -> std::io::Result<ExitStatus> {
    let args = command_args(host);
    info!("Running ssh {}", args.join(" "));
    Command::new("ssh").args(&args).status()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_args() {
        let host = Host::new("web", "10.0.0.1").with_user("deploy");
        assert_eq!(command_args(&host), vec!["-p", "22", "deploy@10.0.0.1"]);

        let bare = Host::new("web", "10.0.0.1").with_port(2222);
        assert_eq!(command_args(&bare), vec!["-p", "2222", "10.0.0.1"]);
    }

    #[test]
    fn test_identity_jump_and_path() {
        let mut host = Host::new("web", "10.0.0.1").with_user("deploy");
        host.identity_file = Some("~/.ssh/id_web".to_string());
        host.proxy_jump = Some("bastion".to_string());
        host.default_remote_path = Some("~/apps/my \"app\"".to_string());

        assert_eq!(
            command_args(&host),
            vec![
                "-p",
                "22",
                "-i",
                "~/.ssh/id_web",
                "-J",
                "bastion",
                "-t",
                "deploy@10.0.0.1",
                "cd \"$HOME/apps/my \\\"app\\\"\" && exec $SHELL -l",
            ]
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_for_double_quotes("~"), "$HOME");
        assert_eq!(escape_for_double_quotes("/srv/`rm`"), "/srv/\\`rm\\`");
        assert_eq!(escape_for_double_quotes("C:\\x"), "C:\\\\x");
        assert_eq!(escape_for_double_quotes("$APP_DIR"), "$APP_DIR");
    }
}
