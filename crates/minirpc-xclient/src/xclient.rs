use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use minirpc_client::{xdial, Client};
use minirpc_common::{Context, Options, Result};

use crate::discovery::{Discovery, SelectMode};

/// Load-balancing client over a [`Discovery`].
///
/// Keeps one [`Client`] per server address and reuses it for as long as it
/// stays available.
///
/// # Example
///
/// ```no_run
/// use minirpc_common::{Context, Options};
/// use minirpc_xclient::{MultiServerDiscovery, SelectMode, XClient};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> minirpc_common::Result<()> {
/// let discovery = MultiServerDiscovery::new(vec![
///     "tcp@127.0.0.1:9001".to_string(),
///     "tcp@127.0.0.1:9002".to_string(),
/// ]);
/// let xc = XClient::new(Arc::new(discovery), SelectMode::RoundRobin, Options::default());
///
/// let sum: i32 = xc.call(&Context::background(), "Arith.Sum", &(1, 2)).await?;
/// xc.close().await?;
/// # let _ = sum;
/// # Ok(())
/// # }
/// ```
pub struct XClient {
    discovery: Arc<dyn Discovery>,
    mode: SelectMode,
    opt: Options,
    clients: Mutex<HashMap<String, Arc<Client>>>,
}

impl XClient {
    pub fn new(discovery: Arc<dyn Discovery>, mode: SelectMode, opt: Options) -> Self {
        Self {
            discovery,
            mode,
            opt,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> SelectMode {
        self.mode
    }

    /// Calls `service_method` on a server chosen by the discovery.
    pub async fn call<A, R>(&self, ctx: &Context, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let rpc_addr = self.discovery.get(self.mode).await?;
        self.call_addr(&rpc_addr, ctx, service_method, args).await
    }

    /// Calls `service_method` on the server at `rpc_addr`.
    pub async fn call_addr<A, R>(
        &self,
        rpc_addr: &str,
        ctx: &Context,
        service_method: &str,
        args: &A,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let client = self.dial(rpc_addr).await?;
        client.call_with_context(ctx, service_method, args).await
    }

    /// Calls `service_method` on every server at once.
    ///
    /// The first failure cancels the calls still in flight and is returned.
    /// The first successful reply is written to `reply`, even if another
    /// server fails.
    pub async fn broadcast<A, R>(
        &self,
        ctx: &Context,
        service_method: &str,
        args: &A,
        mut reply: Option<&mut R>,
    ) -> Result<()>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let servers = self.discovery.get_all().await?;
        let ctx = ctx.child();

        let mut branches: FuturesUnordered<_> = servers
            .iter()
            .map(|rpc_addr| {
                let ctx = &ctx;
                async move { self.call_addr::<A, R>(rpc_addr, ctx, service_method, args).await }
            })
            .collect();

        let mut reply_done = reply.is_none();
        let mut first_err = None;

        while let Some(result) = branches.next().await {
            match result {
                Ok(value) if !reply_done => {
                    if let Some(slot) = reply.as_deref_mut() {
                        *slot = value;
                    }
                    reply_done = true;
                }
                Ok(_) => {}
                Err(e) => {
                    if first_err.is_none() {
                        tracing::debug!("rpc xclient: broadcast {} failed: {}", service_method, e);
                        first_err = Some(e);
                        ctx.cancel();
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Closes every cached client.
    pub async fn close(&self) -> Result<()> {
        let mut clients = self.clients.lock().await;
        for (rpc_addr, client) in clients.drain() {
            if let Err(e) = client.close().await {
                tracing::debug!("rpc xclient: closing {}: {}", rpc_addr, e);
            }
        }
        Ok(())
    }

    async fn dial(&self, rpc_addr: &str) -> Result<Arc<Client>> {
        let mut clients = self.clients.lock().await;

        if let Some(client) = clients.get(rpc_addr) {
            if client.is_available() {
                return Ok(Arc::clone(client));
            }
            let _ = client.close().await;
            clients.remove(rpc_addr);
        }

        tracing::debug!("rpc xclient: dialing {}", rpc_addr);
        let client = Arc::new(xdial(rpc_addr, self.opt.clone()).await?);
        clients.insert(rpc_addr.to_string(), Arc::clone(&client));
        Ok(client)
    }
}
