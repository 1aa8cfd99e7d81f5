//! Peer health probing.
//!
//! Each node of the deployment exposes a healthcheck endpoint that
//! answers whether that node is part of a healthy Primary Component.
//! The checker walks the configured peers in order and reports whether
//! any of them is healthy right now. Network errors are indistinguishable
//! from "unhealthy" for decision purposes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use marictl_core::defaults::HEALTH_CHECK_TIMEOUT_SECS;

/// Answers "is any peer's Primary Component healthy right now?".
#[async_trait]
pub trait ClusterHealthChecker: Send + Sync {
    async fn any_healthy(&self) -> bool;
}

/// Probes the Galera healthcheck endpoint on every configured peer.
pub struct HttpHealthChecker {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl HttpHealthChecker {
    /// `cluster_ips` in deterministic deployment order; `port` is the
    /// healthcheck listener on each peer.
    pub fn new(cluster_ips: &[String], port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: cluster_ips
                .iter()
                .map(|ip| format!("http://{ip}:{port}/"))
                .collect(),
        }
    }
}

#[async_trait]
impl ClusterHealthChecker for HttpHealthChecker {
    async fn any_healthy(&self) -> bool {
        for endpoint in &self.endpoints {
            let request = self
                .client
                .get(endpoint)
                .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS));

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!("healthy cluster node found at {endpoint}");
                    return true;
                }
                Ok(response) => {
                    debug!("{endpoint} reports unhealthy: {}", response.status());
                }
                Err(e) => {
                    debug!("probe of {endpoint} failed: {e}");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal one-shot HTTP responder for probe tests.
    async fn serve_once(listener: TcpListener, status_line: &'static str) {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response = format!("{status_line}\r\nContent-Length: 0\r\n\r\n");
            let _ = stream.write_all(response.as_bytes()).await;
        }
    }

    #[tokio::test]
    async fn test_no_peers_means_unhealthy() {
        let checker = HttpHealthChecker::new(&[], 9200);
        assert!(!checker.any_healthy().await);
    }

    #[tokio::test]
    async fn test_unreachable_peer_reads_as_unhealthy() {
        // Bind and drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker = HttpHealthChecker::new(&["127.0.0.1".to_string()], port);
        assert!(!checker.any_healthy().await);
    }

    #[tokio::test]
    async fn test_healthy_peer_is_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK"));

        let checker = HttpHealthChecker::new(&["127.0.0.1".to_string()], port);
        assert!(checker.any_healthy().await);
    }

    #[tokio::test]
    async fn test_error_status_reads_as_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, "HTTP/1.1 503 Service Unavailable"));

        let checker = HttpHealthChecker::new(&["127.0.0.1".to_string()], port);
        assert!(!checker.any_healthy().await);
    }
}
