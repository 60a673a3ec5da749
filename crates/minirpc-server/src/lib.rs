//! MiniRPC Server
//!
//! This crate provides service registration, per-connection request
//! dispatch with handle timeouts, and an HTTP front door that tunnels RPC
//! traffic through `CONNECT`.
//!
//! # Components
//!
//! - [`Service`] / [`MethodType`]: typed methods registered by name
//! - [`Server`]: accepts connections and dispatches requests
//! - [`http_server`]: hyper-based front door and debug page

pub mod debug;
pub mod http_server;
pub mod server;
pub mod service;

pub use server::Server;
pub use service::{Invocation, MethodResult, MethodType, Service, ServiceBuilder};
