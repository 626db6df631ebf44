//! Host sources other than the manual list
//!
//! The aggregator talks to these through traits so they can be swapped in
//! tests or embedded front-ends.

mod remote;
mod ssh_config;

pub use remote::{Credentials, HttpRemoteClient};
pub use ssh_config::{parse_ssh_config, SshConfigReader};

use crate::types::{Host, RemoteError, SessionToken, SourceError};
use async_trait::async_trait;

/// Reads hosts from the user's SSH client configuration.
#[async_trait]
pub trait LocalConfigReader: Send + Sync {
    async fn read(&self) -> Result<Vec<Host>, SourceError>;
}

/// Authenticates against and fetches hosts from a remote host-listing API.
#[async_trait]
pub trait RemoteHostClient: Send + Sync {
    /// Log in and return a session token. The token also becomes the
    /// client's current token.
    async fn authenticate(
        &self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, RemoteError>;

    /// Fetch the host list. Fails with [`RemoteError::AuthRequired`] when the
    /// server (or the lack of a usable token) demands a login.
    async fn fetch_hosts(
        &self,
        base_url: &str,
        cached: Option<SessionToken>,
    ) -> Result<Vec<Host>, RemoteError>;

    /// Token the client last used successfully or obtained, if any.
    async fn current_token(&self) -> Option<SessionToken>;
}
