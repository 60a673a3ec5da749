use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::oneshot;

use minirpc_common::{CodecType, Result, RpcError, Seq};

/// Completion slot of a pending call: the raw reply body or the failure.
pub(crate) type Completion = oneshot::Sender<Result<Vec<u8>>>;

enum CallState {
    Pending(oneshot::Receiver<Result<Vec<u8>>>),
    Failed(RpcError),
}

/// One in-flight call, returned by [`Client::go`](crate::Client::go).
///
/// Await [`done`](Self::done) for the reply. Completion is delivered
/// exactly once, whether by a reply, a remote error or a connection failure.
pub struct Call<R> {
    seq: Seq,
    service_method: String,
    codec: CodecType,
    state: CallState,
    _reply: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> Call<R> {
    pub(crate) fn pending(
        seq: Seq,
        service_method: String,
        codec: CodecType,
        rx: oneshot::Receiver<Result<Vec<u8>>>,
    ) -> Self {
        Call {
            seq,
            service_method,
            codec,
            state: CallState::Pending(rx),
            _reply: PhantomData,
        }
    }

    pub(crate) fn failed(service_method: String, codec: CodecType, err: RpcError) -> Self {
        Call {
            seq: 0,
            service_method,
            codec,
            state: CallState::Failed(err),
            _reply: PhantomData,
        }
    }

    /// Sequence number on the wire; zero if the call was never sent.
    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn service_method(&self) -> &str {
        &self.service_method
    }

    /// Waits for the call to finish and decodes the reply.
    pub async fn done(self) -> Result<R> {
        let body = match self.state {
            CallState::Failed(err) => return Err(err),
            CallState::Pending(rx) => rx.await.map_err(|_| RpcError::Shutdown)??,
        };
        self.codec
            .decode(&body)
            .map_err(|e| RpcError::Codec(format!("reading body {}", e)))
    }
}
