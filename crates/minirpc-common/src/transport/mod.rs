//! MiniRPC Transport Layer
//!
//! This module turns any byte stream into a MiniRPC connection.
//!
//! # Architecture
//!
//! - **Handshake**: one JSON line carrying [`Options`](crate::Options)
//! - **Codec**: [`CodecType`] picked by the handshake (postcard or JSON)
//! - **Wire Format**: header frame then body frame, each
//!   `[4-byte length prefix as u32 big-endian] + [encoded data]`
//!
//! # Message Size Limits
//!
//! Frames larger than [`MAX_FRAME_SIZE`] are rejected on both read and write.

pub mod codec;
pub mod framed;
pub mod handshake;

pub use codec::CodecType;
pub use framed::{CodecReader, CodecWriter};
pub use handshake::{read_options, write_options};

use tokio::io::{AsyncRead, AsyncWrite};

/// Maximum size of a single frame (100 MB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// A bidirectional byte stream a connection can run over.
///
/// Implemented for TCP and Unix streams as well as upgraded HTTP
/// connections.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

#[cfg(test)]
mod tests;
