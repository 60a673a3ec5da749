use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use minirpc_common::http::SERVERS_HEADER;
use minirpc_common::{Result, RpcError};

use crate::discovery::{Discovery, MultiServerDiscovery, SelectMode};

/// How long a fetched server list is trusted by default.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on one registry request.
const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Discovery backed by a registry.
///
/// The server list is fetched from the registry URL and cached for
/// `update_interval`; [`get`](Discovery::get) and
/// [`get_all`](Discovery::get_all) refresh a stale list first.
pub struct RegistryDiscovery {
    servers: MultiServerDiscovery,
    registry: String,
    update_interval: Duration,
    last_update: Mutex<Option<Instant>>,
    http: Client<HttpConnector, Empty<Bytes>>,
}

impl RegistryDiscovery {
    /// Creates a discovery reading from `registry`, e.g.
    /// `http://127.0.0.1:9999/_minirpc_/registry`.
    ///
    /// A zero `update_interval` selects [`DEFAULT_UPDATE_INTERVAL`].
    pub fn new(registry: impl Into<String>, update_interval: Duration) -> Self {
        let update_interval = if update_interval.is_zero() {
            DEFAULT_UPDATE_INTERVAL
        } else {
            update_interval
        };
        Self {
            servers: MultiServerDiscovery::new(Vec::new()),
            registry: registry.into(),
            update_interval,
            last_update: Mutex::new(None),
            http: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    async fn fetch(&self) -> Result<Vec<String>> {
        let request = Request::builder()
            .method("GET")
            .uri(&self.registry)
            .body(Empty::<Bytes>::new())
            .map_err(|e| RpcError::Discovery(format!("refresh err: {}", e)))?;

        let response = tokio::time::timeout(REGISTRY_TIMEOUT, self.http.request(request))
            .await
            .map_err(|_| RpcError::Discovery("refresh err: registry timed out".into()))?
            .map_err(|e| RpcError::Discovery(format!("refresh err: {}", e)))?;

        if !response.status().is_success() {
            return Err(RpcError::Discovery(format!(
                "refresh err: registry returned {}",
                response.status()
            )));
        }

        let servers = response
            .headers()
            .get(SERVERS_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        Ok(servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }
}

#[async_trait]
impl Discovery for RegistryDiscovery {
    async fn refresh(&self) -> Result<()> {
        let mut last_update = self.last_update.lock().await;
        if let Some(at) = *last_update {
            if at.elapsed() < self.update_interval {
                return Ok(());
            }
        }

        tracing::info!("rpc registry: refresh servers from registry {}", self.registry);
        let servers = self.fetch().await.map_err(|e| {
            tracing::warn!("rpc registry: {}", e);
            e
        })?;
        self.servers.set_servers(servers);
        *last_update = Some(Instant::now());
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        let mut last_update = self.last_update.lock().await;
        self.servers.set_servers(servers);
        *last_update = Some(Instant::now());
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        self.refresh().await?;
        self.servers.select(mode)
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        self.refresh().await?;
        Ok(self.servers.all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_uses_default() {
        let d = RegistryDiscovery::new("http://127.0.0.1:1/_minirpc_/registry", Duration::ZERO);
        assert_eq!(d.update_interval(), DEFAULT_UPDATE_INTERVAL);
    }

    #[tokio::test]
    async fn test_update_skips_fetch_until_stale() {
        // Nothing listens on the registry address; a fetch would fail.
        let d = RegistryDiscovery::new(
            "http://127.0.0.1:1/_minirpc_/registry",
            Duration::from_secs(60),
        );
        d.update(vec!["tcp@a".to_string(), "tcp@b".to_string()])
            .await
            .unwrap();

        assert_eq!(d.get_all().await.unwrap().len(), 2);
        assert!(d.get(SelectMode::RoundRobin).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_registry() {
        let d = RegistryDiscovery::new(
            "http://127.0.0.1:1/_minirpc_/registry",
            Duration::from_secs(60),
        );
        let err = d.get_all().await.unwrap_err();
        assert!(err.to_string().starts_with("rpc discovery: refresh err"));
    }
}
