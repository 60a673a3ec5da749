pub mod error;
pub mod header;
pub mod http;
pub mod options;


pub use error::{Result, RpcError, HANDLE_TIMEOUT_MARKER, SERVER_ERROR_PREFIX};
pub use header::{Header, Seq};
pub use options::{Options, DEFAULT_CONNECT_TIMEOUT, MAGIC_NUMBER};
