//! MiniRPC Registry
//!
//! A small HTTP registry servers announce themselves to, and the heartbeat
//! loop that keeps an announcement alive.
//!
//! # Example
//!
//! ```no_run
//! use minirpc_registry::{heartbeat, Registry};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> minirpc_common::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:9999").await?;
//! tokio::spawn(Arc::new(Registry::default()).serve(listener));
//!
//! heartbeat(
//!     "http://127.0.0.1:9999/_minirpc_/registry",
//!     "tcp@127.0.0.1:9001",
//!     Duration::ZERO,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod heartbeat;
pub mod http_server;
pub mod registry;

pub use heartbeat::{heartbeat, DEFAULT_HEARTBEAT_INTERVAL};
pub use registry::{Registry, DEFAULT_TTL};
