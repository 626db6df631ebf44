//! Best-effort reachability checks
//!
//! One task per host, each attempting a TCP connect to the SSH port. Results
//! go into their own status map; the host records are only read.

use crate::types::Host;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    pub reachable: bool,
    pub latency_ms: Option<u64>,
}

/// Key used for the status map: `hostname:user`, lowercased.
pub fn status_key(host: &Host) -> String {
    format!("{}:{}", host.hostname, host.user).to_lowercase()
}

async fn probe_one(hostname: String, port: u16, limit: Duration) -> HostStatus {
    let started = Instant::now();
    match tokio::time::timeout(limit, TcpStream::connect((hostname.as_str(), port))).await {
        Ok(Ok(_stream)) => HostStatus {
            reachable: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Ok(Err(e)) => {
            debug!("{}:{} unreachable: {}", hostname, port, e);
            HostStatus {
                reachable: false,
                latency_ms: None,
            }
        }
        Err(_) => {
            debug!("{}:{} timed out", hostname, port);
            HostStatus {
                reachable: false,
                latency_ms: None,
            }
        }
    }
}

/// Probe every host concurrently, each bounded by `limit`.
pub async fn probe_hosts(hosts: &[Host], limit: Duration) -> BTreeMap<String, HostStatus> {
    let mut tasks = JoinSet::new();
    for host in hosts {
        let key = status_key(host);
        let hostname = host.hostname.clone();
        let port = host.port;
        tasks.spawn(async move { (key, probe_one(hostname, port, limit).await) });
    }

    let mut statuses = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, status)) => {
                statuses.insert(key, status);
            }
            Err(e) => debug!("Probe task failed: {}", e),
        }
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_listening_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();

        // Bind and drop to find a port that is very likely closed
        let closed_port = {
            let tmp = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tmp.local_addr().unwrap().port()
        };

        let hosts = vec![
            Host::new("open", "127.0.0.1").with_user("a").with_port(open_port),
            Host::new("closed", "127.0.0.1").with_user("b").with_port(closed_port),
        ];
        let before = hosts.clone();

        let statuses = probe_hosts(&hosts, Duration::from_secs(2)).await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses["127.0.0.1:a"].reachable);
        assert!(statuses["127.0.0.1:a"].latency_ms.is_some());
        assert!(!statuses["127.0.0.1:b"].reachable);
        assert_eq!(hosts, before);
    }

    #[test]
    fn test_status_key() {
        let host = Host::new("x", "Web.Example").with_user("Root");
        assert_eq!(status_key(&host), "web.example:root");
    }
}
