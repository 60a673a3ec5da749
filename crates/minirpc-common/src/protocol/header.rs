//! Per-message header.

use serde::{Deserialize, Serialize};

/// Sequence number correlating a request with its response on one connection.
pub type Seq = u64;

/// Header preceding every body on the wire, in both directions.
///
/// # Fields
///
/// - `service_method`: target in `"Service.Method"` form
/// - `seq`: chosen by the client, echoed by the server
/// - `error`: empty on success, otherwise the failure reported by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub service_method: String,
    pub seq: Seq,
    pub error: String,
}

impl Header {
    /// Creates a request header.
    pub fn new(service_method: impl Into<String>, seq: Seq) -> Self {
        Header {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    /// Returns a copy of this header carrying `error`.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Header {
            service_method: self.service_method.clone(),
            seq: self.seq,
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Splits `service_method` at the last `.` into service and method names.
    ///
    /// Returns `None` if there is no dot or either side is empty.
    pub fn split_service_method(&self) -> Option<(&str, &str)> {
        let dot = self.service_method.rfind('.')?;
        let (service, method) = (&self.service_method[..dot], &self.service_method[dot + 1..]);
        if service.is_empty() || method.is_empty() {
            return None;
        }
        Some((service, method))
    }
}
