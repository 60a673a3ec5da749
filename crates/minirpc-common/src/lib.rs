//! MiniRPC Common Types and Transport
//!
//! This crate provides the wire protocol, codecs and shared types used by
//! every MiniRPC component.
//!
//! # Overview
//!
//! - **Protocol Layer**: [`Options`], [`Header`] and the [`RpcError`] type
//! - **Transport Layer**: handshake, [`CodecType`] and the framed
//!   [`CodecReader`] / [`CodecWriter`] pair
//! - **Context**: cancellation scopes with optional deadlines
//!
//! # Architecture
//!
//! Every connection starts with the client's [`Options`] as a single JSON
//! line. The server validates [`MAGIC_NUMBER`] and switches to the codec the
//! client asked for. After that both sides exchange header/body frame pairs:
//!
//! ```text
//! | Options (JSON line) | Header1 | Body1 | Header2 | Body2 | ...
//! ```
//!
//! # Example
//!
//! ```
//! use minirpc_common::{CodecType, Header};
//!
//! let header = Header::new("Arith.Sum", 1);
//! let bytes = CodecType::Json.encode(&header).unwrap();
//! let decoded: Header = CodecType::Json.decode(&bytes).unwrap();
//! assert_eq!(decoded.split_service_method(), Some(("Arith", "Sum")));
//! ```

pub mod context;
pub mod protocol;
pub mod transport;

pub use context::{Context, ContextError};
pub use protocol::*;
pub use transport::{CodecReader, CodecType, CodecWriter, Transport};
