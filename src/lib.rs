//! # MiniRPC
//!
//! An embedded RPC framework: register typed services on a [`Server`],
//! call them through a pipelined [`Client`], and spread calls across many
//! servers with an [`XClient`] fed by static or registry-backed discovery.
//!
//! This crate re-exports the workspace crates:
//!
//! - [`common`]: wire protocol, codecs, options and [`Context`]
//! - [`server`]: services and the server, raw TCP or behind HTTP
//! - [`client`]: the pipelined client and dialers
//! - [`xclient`]: discovery and the load-balanced client
//! - [`registry`]: the heartbeat registry
//!
//! # Example
//!
//! ```no_run
//! use minirpc::{Context, Options, Server, Service};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> minirpc::Result<()> {
//! let service = Service::builder("Echo", ())
//!     .method("Say", |_: &(), msg: String, reply: &mut String| {
//!         *reply = msg;
//!         Ok::<(), String>(())
//!     })
//!     .build()?;
//!
//! let server = Arc::new(Server::default());
//! server.register(service)?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! let addr = listener.local_addr()?;
//! tokio::spawn(server.accept(listener));
//!
//! let client = minirpc::client::dial("tcp", &addr.to_string(), Options::default()).await?;
//! let reply: String = client
//!     .call_with_context(&Context::background(), "Echo.Say", "hi")
//!     .await?;
//! assert_eq!(reply, "hi");
//! # Ok(())
//! # }
//! ```

pub use minirpc_client as client;
pub use minirpc_common as common;
pub use minirpc_registry as registry;
pub use minirpc_server as server;
pub use minirpc_xclient as xclient;

pub use minirpc_client::Client;
pub use minirpc_common::{CodecType, Context, Options, Result, RpcError};
pub use minirpc_registry::Registry;
pub use minirpc_server::{Server, Service};
pub use minirpc_xclient::{Discovery, MultiServerDiscovery, RegistryDiscovery, SelectMode, XClient};
