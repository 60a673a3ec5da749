//! MiniRPC Client
//!
//! This crate provides the client side of MiniRPC: a [`Client`] that
//! multiplexes concurrent calls over one connection, the [`Call`] handle for
//! asynchronous calls, and the dial helpers for TCP, Unix sockets and HTTP
//! tunnelling.
//!
//! # Example
//!
//! ```no_run
//! use minirpc_client::xdial;
//! use minirpc_common::{Context, Options};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> minirpc_common::Result<()> {
//! let client = xdial("http@127.0.0.1:9999", Options::default()).await?;
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(1));
//! let sum: i32 = client.call_with_context(&ctx, "Arith.Sum", &(1, 2)).await?;
//!
//! let call = client.go::<_, i32>("Arith.Mul", &(3, 4)).await;
//! assert_eq!(call.done().await?, 12);
//! # let _ = sum;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod dial;

pub use call::Call;
pub use client::{Client, DEFAULT_CALL_TIMEOUT};
pub use dial::{dial, dial_http, dial_timeout, new_client, new_http_client, xdial, BoxedTransport};
