use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use sshbuddy::config::ConfigStore;
use sshbuddy::manage::{self, ImportReport};
use sshbuddy::probe::{probe_hosts, status_key};
use sshbuddy::sources::Credentials;
use sshbuddy::{
    Aggregator, Host, HostError, HttpRemoteClient, LoadOptions, LoadOutcome, LocalConfigReader,
    Source, SshConfigReader,
};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for any single HTTP request to the remote host list.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials used to log in again when the stored session token is
/// missing or expired.
const REMOTE_USER_ENV: &str = "SSHBUDDY_REMOTE_USER";
const REMOTE_PASSWORD_ENV: &str = "SSHBUDDY_REMOTE_PASSWORD";

/// One host list from manual entries, ~/.ssh/config and a remote host service.
#[derive(Parser, Debug)]
#[command(name = "sshbuddy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to $SSHBUDDY_CONFIG or ~/.config/sshbuddy/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Log to file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Give up on the remote host list after this many seconds
    #[arg(long, global = true)]
    remote_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all hosts
    #[command(alias = "ls")]
    List {
        /// Print the merged hosts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one host with every source's variant
    Show { alias: String },

    /// Connect to a host by alias
    #[command(alias = "c")]
    Connect {
        alias: String,

        /// Use this source's record instead of the winning one
        #[arg(long)]
        source: Option<Source>,
    },

    /// Add or replace a manual host
    Add {
        alias: String,
        hostname: String,
        #[arg(short, long, default_value = "")]
        user: String,
        #[arg(short, long, default_value_t = 22)]
        port: u16,
        #[arg(short, long)]
        identity_file: Option<String>,
        #[arg(short = 'J', long)]
        proxy_jump: Option<String>,
        /// Directory to cd into after connecting
        #[arg(long)]
        default_path: Option<String>,
    },

    /// Remove a manual host
    #[command(alias = "rm")]
    Remove { alias: String },

    /// Toggle the favorite flag of a host
    #[command(alias = "fav")]
    Favorite { alias: String },

    /// Copy hosts from another source into the manual list
    Import {
        /// local-config or remote
        from: Source,

        /// Replace manual hosts with the same alias
        #[arg(long)]
        overwrite: bool,
    },

    /// Write manual hosts in ssh_config format
    Export {
        /// Print instead of writing a file
        #[arg(long)]
        stdout: bool,

        /// Target file (defaults to ~/.ssh/config)
        #[arg(long, conflicts_with = "stdout")]
        file: Option<PathBuf>,
    },

    /// Enable or disable a host source
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Configure the remote host list
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },

    /// Check which hosts accept TCP connections on their SSH port
    Ping {
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

#[derive(Subcommand, Debug)]
enum SourceAction {
    Enable { source: Source },
    Disable { source: Source },
}

#[derive(Subcommand, Debug)]
enum RemoteAction {
    /// Set the base URL and enable the remote source
    SetUrl { url: String },

    /// Log in; the password is read from stdin
    Auth {
        #[arg(short, long)]
        username: String,
    },

    /// Forget the cached session token
    Logout,
}

fn setup_logging(log_level: &str, log_file: Option<PathBuf>) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)?;
        subscriber.with_writer(file).with_ansi(false).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    Ok(())
}

struct App {
    aggregator: Aggregator,
    options: LoadOptions,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let store = match &args.config {
            Some(path) => ConfigStore::with_path(path.clone()),
            None => ConfigStore::new()?,
        };
        debug!("Using config file {}", store.path().display());

        let mut remote = HttpRemoteClient::new(HTTP_REQUEST_TIMEOUT)?;
        if let Some(credentials) = remote_credentials_from_env() {
            debug!("Remote login credentials taken from {}", REMOTE_USER_ENV);
            remote = remote.with_credentials(credentials);
        }
        let aggregator = Aggregator::new(
            Arc::new(store),
            Arc::new(SshConfigReader::new()),
            Arc::new(remote),
        );

        Ok(Self {
            aggregator,
            options: LoadOptions {
                remote_timeout: args.remote_timeout.map(Duration::from_secs),
            },
        })
    }

    /// Load the merged list, reporting degraded sources and keeping any
    /// refreshed session token.
    async fn load(&self) -> Result<LoadOutcome> {
        let outcome = match self.aggregator.load(&self.options).await {
            Ok(outcome) => outcome,
            Err(HostError::AuthRequired(auth)) => {
                bail!(
                    "{}\nRun `sshbuddy remote auth --username <name>` to log in.",
                    auth
                );
            }
            Err(e) => return Err(e.into()),
        };

        for degraded in &outcome.degraded {
            eprintln!("warning: {}", degraded);
        }

        if let Some(token) = &outcome.refreshed_token {
            if self.aggregator.persist_token(token).await? {
                info!("Stored refreshed remote session token");
            }
        }

        Ok(outcome)
    }
}

fn remote_credentials_from_env() -> Option<Credentials> {
    let username = std::env::var(REMOTE_USER_ENV).ok().filter(|v| !v.is_empty())?;
    let password = std::env::var(REMOTE_PASSWORD_ENV).ok().filter(|v| !v.is_empty())?;
    Some(Credentials { username, password })
}

fn print_hosts(hosts: &[Host]) {
    if hosts.is_empty() {
        println!("No hosts configured");
        return;
    }

    for host in hosts {
        let star = if host.favorite { "*" } else { " " };
        let sources = host
            .available_in
            .iter()
            .map(Source::as_str)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{} {:<20} {}:{}  [{}]",
            star,
            host.alias,
            host.target(),
            host.port,
            sources
        );
    }
}

fn print_import(report: &ImportReport) {
    for alias in &report.imported {
        println!("+ Imported: {}", alias);
    }
    for alias in &report.updated {
        println!("~ Updated:  {}", alias);
    }
    for alias in &report.skipped {
        println!("- Skipped:  {} (already exists, use --overwrite to replace)", alias);
    }
    println!(
        "\nImport complete! Imported: {}, Updated: {}, Skipped: {}",
        report.imported.len(),
        report.updated.len(),
        report.skipped.len()
    );
}

fn read_password() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        std::io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given on stdin");
    }
    Ok(password)
}

async fn run(args: Args) -> Result<()> {
    let app = App::new(&args)?;
    let aggregator = &app.aggregator;

    match args.command {
        Command::List { json } => {
            let outcome = app.load().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.hosts)?);
            } else {
                print_hosts(&outcome.hosts);
            }
        }

        Command::Show { alias } => {
            let outcome = app.load().await?;
            let host = outcome
                .find(&alias)
                .ok_or_else(|| HostError::HostNotFound(alias.clone()))?;
            println!("{}", serde_json::to_string_pretty(host)?);
        }

        Command::Connect { alias, source } => {
            let host = match aggregator.resolve(&alias, source, &app.options).await {
                Ok((host, outcome)) => {
                    if let Some(token) = &outcome.refreshed_token {
                        aggregator.persist_token(token).await?;
                    }
                    host
                }
                Err(HostError::HostNotFound(_)) => {
                    bail!("Host with alias '{}' not found (see `sshbuddy list`)", alias);
                }
                Err(e) => return Err(e.into()),
            };

            println!("Connecting to {} ({})...", host.alias, host.target());
            let status = tokio::task::spawn_blocking(move || sshbuddy::ssh::connect(&host))
                .await?
                .context("Failed to run ssh")?;
            if !status.success() {
                bail!("ssh exited with {}", status);
            }
        }

        Command::Add {
            alias,
            hostname,
            user,
            port,
            identity_file,
            proxy_jump,
            default_path,
        } => {
            let mut host = Host::new(alias.clone(), hostname)
                .with_user(user)
                .with_port(port);
            host.identity_file = identity_file;
            host.proxy_jump = proxy_jump;
            host.default_remote_path = default_path;

            let replaced = aggregator
                .update_config(|cfg| manage::upsert_manual(cfg, host))
                .await?;
            println!("{} {}", if replaced { "Updated" } else { "Added" }, alias);
        }

        Command::Remove { alias } => {
            let removed = aggregator
                .update_config(|cfg| manage::remove_manual(cfg, &alias))
                .await?;
            match removed {
                Some(host) => println!("Removed {}", host.alias),
                None => bail!("No manual host with alias '{}'", alias),
            }
        }

        Command::Favorite { alias } => {
            let outcome = app.load().await?;
            let canonical = outcome
                .find(&alias)
                .map(|h| h.alias.clone())
                .ok_or_else(|| HostError::HostNotFound(alias.clone()))?;
            let now = aggregator
                .update_config(|cfg| manage::toggle_favorite(cfg, &canonical))
                .await?;
            println!(
                "{} {} favorites",
                if now { "Added" } else { "Removed" },
                canonical
            );
        }

        Command::Import { from, overwrite } => {
            let incoming: Vec<Host> = match from {
                Source::LocalConfig => SshConfigReader::new().read().await?,
                Source::Remote => {
                    let outcome = app.load().await?;
                    outcome
                        .hosts
                        .iter()
                        .filter_map(|h| h.variants.get(&Source::Remote).cloned())
                        .collect()
                }
                Source::Manual => bail!("Hosts are already manual; import from local-config or remote"),
            };

            if incoming.is_empty() {
                println!("No hosts found in {}", from);
                return Ok(());
            }
            println!("Found {} host(s) in {}\n", incoming.len(), from);

            let report = aggregator
                .update_config(|cfg| manage::import_hosts(&mut cfg.hosts, &incoming, overwrite))
                .await?;
            print_import(&report);
        }

        Command::Export { stdout, file } => {
            let config = aggregator.store().read_raw().await?;
            if config.hosts.is_empty() {
                println!("No manual hosts to export");
                return Ok(());
            }

            if stdout {
                print!("{}", manage::render_ssh_config(&config.hosts));
            } else {
                let target = match file {
                    Some(path) => path,
                    None => dirs::home_dir()
                        .map(|home| home.join(".ssh").join("config"))
                        .ok_or_else(|| anyhow!("Cannot determine home directory"))?,
                };
                if let Some(backup) = manage::export_ssh_config(&config.hosts, &target).await? {
                    println!("Created backup at {}", backup.display());
                }
                println!(
                    "Exported {} hosts to {}",
                    config.hosts.len(),
                    target.display()
                );
            }
        }

        Command::Source { action } => {
            let (source, enabled) = match action {
                SourceAction::Enable { source } => (source, true),
                SourceAction::Disable { source } => (source, false),
            };
            aggregator
                .update_config(|cfg| manage::set_source_enabled(cfg, source, enabled))
                .await?;
            println!(
                "{} source {}",
                if enabled { "Enabled" } else { "Disabled" },
                source
            );
        }

        Command::Remote { action } => match action {
            RemoteAction::SetUrl { url } => {
                let url = url.trim().to_string();
                url::Url::parse(&url).with_context(|| format!("Invalid URL '{}'", url))?;
                aggregator
                    .update_config(|cfg| {
                        if cfg.remote.base_url != url {
                            cfg.remote.set_session_token(None);
                        }
                        cfg.remote.base_url = url.clone();
                        manage::set_source_enabled(cfg, Source::Remote, true);
                    })
                    .await?;
                println!("Remote host list set to {}", url);
            }
            RemoteAction::Auth { username } => {
                let password = read_password()?;
                let token = aggregator.authenticate(&username, &password).await?;
                match token.expiry {
                    Some(expiry) => println!("Authenticated; session valid until {}", expiry),
                    None => println!("Authenticated"),
                }
            }
            RemoteAction::Logout => {
                aggregator
                    .update_config(|cfg| cfg.remote.set_session_token(None))
                    .await?;
                println!("Remote session token removed");
            }
        },

        Command::Ping { timeout_ms } => {
            let outcome = app.load().await?;
            let statuses = probe_hosts(&outcome.hosts, Duration::from_millis(timeout_ms)).await;
            for host in &outcome.hosts {
                let line = match statuses.get(&status_key(host)) {
                    Some(status) if status.reachable => format!(
                        "up    {}ms",
                        status.latency_ms.unwrap_or_default()
                    ),
                    _ => "down".to_string(),
                };
                println!("{:<20} {:<30} {}", host.alias, host.target(), line);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.log_file.clone())?;

    info!("Starting sshbuddy v{}", env!("CARGO_PKG_VERSION"));

    run(args).await
}
