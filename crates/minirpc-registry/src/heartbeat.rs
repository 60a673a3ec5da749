use bytes::Bytes;
use http_body_util::Empty;
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::task::JoinHandle;

use minirpc_common::http::SERVER_HEADER;
use minirpc_common::{Result, RpcError};

use crate::registry::DEFAULT_TTL;

/// Default heartbeat period: one minute less than the default TTL.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(DEFAULT_TTL.as_secs() - 60);

/// Upper bound on one heartbeat request.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

/// Announces `addr` to the registry at `registry`, then keeps announcing it
/// every `interval` on a background task.
///
/// The first announcement happens before this returns, so a bad registry
/// URL is reported to the caller. The background task stops at the first
/// failed announcement. A zero `interval` selects
/// [`DEFAULT_HEARTBEAT_INTERVAL`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> minirpc_common::Result<()> {
/// let task = minirpc_registry::heartbeat(
///     "http://127.0.0.1:9999/_minirpc_/registry",
///     "tcp@127.0.0.1:9001",
///     Duration::ZERO,
/// )
/// .await?;
/// # task.abort();
/// # Ok(())
/// # }
/// ```
pub async fn heartbeat(registry: &str, addr: &str, interval: Duration) -> Result<JoinHandle<()>> {
    let interval = if interval.is_zero() {
        DEFAULT_HEARTBEAT_INTERVAL
    } else {
        interval
    };

    let http: HttpClient = Client::builder(TokioExecutor::new()).build_http();
    send_heartbeat(&http, registry, addr).await?;

    let registry = registry.to_string();
    let addr = addr.to_string();
    Ok(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = send_heartbeat(&http, &registry, &addr).await {
                tracing::error!("rpc server: heart beat err: {}", e);
                break;
            }
        }
    }))
}

async fn send_heartbeat(http: &HttpClient, registry: &str, addr: &str) -> Result<()> {
    tracing::info!("{} send heart beat to registry {}", addr, registry);

    let request = Request::builder()
        .method("POST")
        .uri(registry)
        .header(SERVER_HEADER, addr)
        .body(Empty::<Bytes>::new())
        .map_err(|e| RpcError::Registry(format!("heart beat err: {}", e)))?;

    let response = tokio::time::timeout(HEARTBEAT_TIMEOUT, http.request(request))
        .await
        .map_err(|_| RpcError::Registry("heart beat err: registry timed out".into()))?
        .map_err(|e| RpcError::Registry(format!("heart beat err: {}", e)))?;

    if !response.status().is_success() {
        return Err(RpcError::Registry(format!(
            "heart beat err: registry returned {}",
            response.status()
        )));
    }
    Ok(())
}
