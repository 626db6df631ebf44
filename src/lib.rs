//! sshbuddy - one host list from many places
//!
//! Collects SSH hosts from a manually curated list, the local SSH client
//! configuration and an optional remote host-listing service, and merges them
//! into a single de-duplicated, priority-ordered list.

pub mod aggregate;
pub mod config;
pub mod manage;
pub mod probe;
pub mod sources;
pub mod ssh;
pub mod types;

pub use aggregate::{Aggregator, LoadOptions, LoadOutcome, ManualUpdate};
pub use config::{Config, ConfigStore};
pub use sources::{HttpRemoteClient, LocalConfigReader, RemoteHostClient, SshConfigReader};
pub use types::{AuthRequired, Host, HostError, SessionToken, Source};
