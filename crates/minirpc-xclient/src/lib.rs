//! MiniRPC XClient
//!
//! Service discovery and load balancing on top of
//! [`minirpc_client::Client`].
//!
//! # Components
//!
//! - [`Discovery`]: source of server addresses, with [`SelectMode`]
//! - [`MultiServerDiscovery`]: a list maintained by hand
//! - [`RegistryDiscovery`]: a list fetched from a registry and cached
//! - [`XClient`]: picks a server per call, or broadcasts to all of them

pub mod discovery;
pub mod registry_discovery;
pub mod xclient;

pub use discovery::{Discovery, MultiServerDiscovery, SelectMode};
pub use registry_discovery::{RegistryDiscovery, DEFAULT_UPDATE_INTERVAL};
pub use xclient::XClient;
