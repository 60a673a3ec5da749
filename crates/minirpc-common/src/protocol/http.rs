//! HTTP resource paths and headers.

/// Path a client `CONNECT`s to in order to tunnel RPC traffic over HTTP.
pub const RPC_PATH: &str = "/_minirpc_";

/// Path of the server's debug page.
pub const DEBUG_PATH: &str = "/debug/minirpc";

/// Path of the registry resource.
pub const REGISTRY_PATH: &str = "/_minirpc_/registry";

/// Reason phrase of a successful `CONNECT`.
pub const CONNECTED_REASON: &str = "Connected to MiniRPC";

/// Registry response header listing alive servers, comma separated.
pub const SERVERS_HEADER: &str = "X-Minirpc-Servers";

/// Heartbeat request header carrying the announcing server's address.
pub const SERVER_HEADER: &str = "X-Minirpc-Server";
