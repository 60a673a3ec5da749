use std::time::Duration;
use thiserror::Error;

/// Prefix the server puts in front of every protocol-level error message.
pub const SERVER_ERROR_PREFIX: &str = "rpc server:";

/// Marker contained in every server-side handle timeout message.
pub const HANDLE_TIMEOUT_MARKER: &str = "request handle timeout";

/// Errors surfaced by every MiniRPC component.
///
/// The variants fall into four families so callers can decide whether a retry
/// makes sense:
///
/// - transport: [`Transport`](Self::Transport), [`Shutdown`](Self::Shutdown),
///   [`Closed`](Self::Closed), [`InvalidOptions`](Self::InvalidOptions)
/// - protocol: [`Codec`](Self::Codec), [`Protocol`](Self::Protocol)
/// - application: [`Remote`](Self::Remote)
/// - timeout: [`ConnectTimeout`](Self::ConnectTimeout),
///   [`CallTimeout`](Self::CallTimeout), [`HandleTimeout`](Self::HandleTimeout)
///
/// The enum is `Clone` because a single transport failure is delivered to
/// every call pending on the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("connection is shut down")]
    Shutdown,

    #[error("connection closed by peer")]
    Closed,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("{0}")]
    Protocol(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("rpc client: connect timeout: expect within {0:?}")]
    ConnectTimeout(Duration),

    #[error("rpc client: call failed: context deadline exceeded")]
    CallTimeout,

    #[error("rpc client: call failed: context canceled")]
    Cancelled,

    #[error("{0}")]
    HandleTimeout(String),

    #[error("{0}")]
    Remote(String),

    #[error("rpc: service already defined: {0}")]
    AlreadyDefined(String),

    #[error("rpc discovery: {0}")]
    Discovery(String),

    #[error("rpc registry: {0}")]
    Registry(String),
}

impl RpcError {
    /// Classifies the error string carried in a response header.
    ///
    /// Only the server's own messages start with [`SERVER_ERROR_PREFIX`];
    /// the server rewrites method errors that would. Among those, handle
    /// timeouts carry [`HANDLE_TIMEOUT_MARKER`]. Everything else came out
    /// of the registered method.
    pub fn from_remote(message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.starts_with(SERVER_ERROR_PREFIX) {
            RpcError::Remote(message)
        } else if message.contains(HANDLE_TIMEOUT_MARKER) {
            RpcError::HandleTimeout(message)
        } else {
            RpcError::Protocol(message)
        }
    }

    /// Returns `true` for connect, call and server handle timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectTimeout(_) | RpcError::CallTimeout | RpcError::HandleTimeout(_)
        )
    }

    /// Returns `true` if the error means the connection can no longer be used.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_)
                | RpcError::Shutdown
                | RpcError::Closed
                | RpcError::InvalidOptions(_)
        )
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => RpcError::Closed,
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected => {
                RpcError::Transport(format!("connection lost: {}", err))
            }
            _ => RpcError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Codec(format!("json: {}", err))
    }
}

impl From<postcard::Error> for RpcError {
    fn from(err: postcard::Error) -> Self {
        RpcError::Codec(format!("postcard: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
