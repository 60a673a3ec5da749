//! Connection options exchanged once during the handshake.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transport::CodecType;

/// Identifies a MiniRPC handshake.
pub const MAGIC_NUMBER: u32 = 0x3bef5c;

/// Default connect timeout applied by [`Options::default`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options negotiated at the start of every connection.
///
/// The client writes them as a single JSON line before any framed traffic.
/// The server uses `codec_type` to pick the codec for the rest of the
/// connection and `handle_timeout` to bound each dispatched call.
///
/// # Example
///
/// ```
/// use minirpc_common::{CodecType, Options};
/// use std::time::Duration;
///
/// let opt = Options::default()
///     .with_codec(CodecType::Json)
///     .with_handle_timeout(Duration::from_secs(1));
/// assert_eq!(opt.connect_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Options {
    /// Must equal [`MAGIC_NUMBER`]
    pub magic_number: u32,
    /// Codec used for every header and body after the handshake
    pub codec_type: CodecType,
    /// Bound on connect + handshake; zero means unlimited
    pub connect_timeout: Duration,
    /// Bound on each server-side dispatch; zero defers to the server default
    pub handle_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            magic_number: MAGIC_NUMBER,
            codec_type: CodecType::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handle_timeout: Duration::ZERO,
        }
    }
}

impl Options {
    pub fn with_codec(mut self, codec_type: CodecType) -> Self {
        self.codec_type = codec_type;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_timeout = timeout;
        self
    }

    /// Returns `true` if the magic number identifies a MiniRPC peer.
    pub fn is_valid(&self) -> bool {
        self.magic_number == MAGIC_NUMBER
    }
}
