use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use minirpc_common::transport::write_options;
use minirpc_common::{
    CodecReader, CodecType, CodecWriter, Context, Header, Options, Result, RpcError, Seq,
    Transport,
};

use crate::call::{Call, Completion};

/// Timeout applied by [`Client::call`].
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Default)]
struct State {
    seq: Seq,
    pending: HashMap<Seq, Completion>,
    closing: bool,
    shutdown: bool,
}

struct Inner {
    sending: AsyncMutex<CodecWriter<BoxedWriter>>,
    state: Mutex<State>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove_call(&self, seq: Seq) -> Option<Completion> {
        self.state().pending.remove(&seq)
    }

    /// Fails every pending call with `err` and marks the client shut down.
    async fn terminate_calls(&self, err: RpcError) {
        let _sending = self.sending.lock().await;
        let mut state = self.state();
        state.shutdown = true;
        for (_, completion) in state.pending.drain() {
            let _ = completion.send(Err(err.clone()));
        }
    }
}

/// MiniRPC client over a single connection.
///
/// Calls are pipelined: any number may be in flight at once, each matched
/// to its response by sequence number. A background task reads responses
/// until the connection fails or [`close`](Self::close) is called.
///
/// # Example
///
/// ```no_run
/// use minirpc_client::dial;
/// use minirpc_common::Options;
///
/// # #[tokio::main]
/// # async fn main() -> minirpc_common::Result<()> {
/// let client = dial("tcp", "127.0.0.1:9999", Options::default()).await?;
/// let sum: i32 = client.call("Arith.Sum", &(1, 2)).await?;
/// assert_eq!(sum, 3);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    inner: Arc<Inner>,
    opt: Options,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Performs the handshake on `conn` and starts reading responses.
    pub async fn new<T: Transport>(mut conn: T, opt: Options) -> Result<Client> {
        if let Err(e) = write_options(&mut conn, &opt).await {
            tracing::error!("rpc client: options error: {}", e);
            return Err(e);
        }

        let codec = opt.codec_type;
        let (read_half, write_half) = tokio::io::split(conn);
        let reader = CodecReader::new(BufReader::new(read_half), codec);
        let writer: BoxedWriter = Box::new(write_half);

        let inner = Arc::new(Inner {
            sending: AsyncMutex::new(CodecWriter::new(writer, codec)),
            state: Mutex::new(State {
                seq: 1,
                ..State::default()
            }),
        });

        let receiver = tokio::spawn(receive(Arc::clone(&inner), reader));

        Ok(Client {
            inner,
            opt,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    pub fn options(&self) -> &Options {
        &self.opt
    }

    pub fn codec(&self) -> CodecType {
        self.opt.codec_type
    }

    /// Returns `true` until the client is closed or its connection fails.
    pub fn is_available(&self) -> bool {
        let state = self.inner.state();
        !state.closing && !state.shutdown
    }

    /// Sends a call and returns without waiting for the reply.
    ///
    /// Failures to send are reported through the returned [`Call`].
    pub async fn go<A, R>(&self, service_method: &str, args: &A) -> Call<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let codec = self.codec();
        let mut sending = self.inner.sending.lock().await;

        let (seq, rx) = match self.register_call() {
            Ok(registered) => registered,
            Err(e) => return Call::failed(service_method.to_string(), codec, e),
        };

        tracing::debug!("rpc client: sending {} seq {}", service_method, seq);
        let header = Header::new(service_method, seq);
        if let Err(e) = sending.write(&header, args).await {
            // The receive loop may already have completed the call.
            if let Some(completion) = self.inner.remove_call(seq) {
                let _ = completion.send(Err(e));
            }
        }
        drop(sending);

        Call::pending(seq, service_method.to_string(), codec, rx)
    }

    /// Calls `service_method` and waits for the reply, giving up after
    /// [`DEFAULT_CALL_TIMEOUT`].
    pub async fn call<A, R>(&self, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let ctx = Context::background().with_timeout(DEFAULT_CALL_TIMEOUT);
        self.call_with_context(&ctx, service_method, args).await
    }

    /// Calls `service_method` and waits for the reply or for `ctx` to end.
    ///
    /// When `ctx` ends first the call is dropped from the pending table and
    /// [`RpcError::CallTimeout`] or [`RpcError::Cancelled`] is returned; a
    /// late response is discarded by the receive loop.
    pub async fn call_with_context<A, R>(
        &self,
        ctx: &Context,
        service_method: &str,
        args: &A,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let call: Call<R> = self.go(service_method, args).await;
        let seq = call.seq();

        tokio::select! {
            result = call.done() => result,
            err = ctx.done() => {
                self.inner.remove_call(seq);
                tracing::debug!("rpc client: {} seq {} abandoned: {}", service_method, seq, err);
                Err(err.into())
            }
        }
    }

    /// Closes the connection and fails every pending call.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Shutdown`] if the client was already closed.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.inner.state();
            if state.closing {
                return Err(RpcError::Shutdown);
            }
            state.closing = true;
        }

        if let Err(e) = self.inner.sending.lock().await.close().await {
            tracing::debug!("rpc client: closing connection: {}", e);
        }
        if let Some(receiver) = self.take_receiver() {
            receiver.abort();
        }
        self.inner.terminate_calls(RpcError::Shutdown).await;
        Ok(())
    }

    fn register_call(&self) -> Result<(Seq, tokio::sync::oneshot::Receiver<Result<Vec<u8>>>)> {
        let mut state = self.inner.state();
        if state.closing || state.shutdown {
            return Err(RpcError::Shutdown);
        }
        let seq = state.seq;
        state.seq += 1;
        let (tx, rx) = tokio::sync::oneshot::channel();
        state.pending.insert(seq, tx);
        Ok((seq, rx))
    }

    fn take_receiver(&self) -> Option<JoinHandle<()>> {
        self.receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // The receive task holds the write half; stop it so the socket closes.
        if let Some(receiver) = self.take_receiver() {
            receiver.abort();
        }
    }
}

/// Reads responses until the connection fails, then fails what is left.
async fn receive<R: AsyncRead + Unpin>(inner: Arc<Inner>, mut reader: CodecReader<R>) {
    let err = loop {
        let header = match reader.read_header().await {
            Ok(header) => header,
            Err(e) => break e,
        };

        match inner.remove_call(header.seq) {
            None => {
                // Usually a call that was abandoned after its context ended.
                tracing::debug!("rpc client: discarding response for seq {}", header.seq);
                if let Err(e) = reader.discard_body().await {
                    break e;
                }
            }
            Some(completion) if header.is_error() => {
                let discarded = reader.discard_body().await;
                let _ = completion.send(Err(RpcError::from_remote(header.error)));
                if let Err(e) = discarded {
                    break e;
                }
            }
            Some(completion) => match reader.read_body_raw().await {
                Ok(body) => {
                    let _ = completion.send(Ok(body));
                }
                Err(e) => {
                    let _ = completion.send(Err(e.clone()));
                    break e;
                }
            },
        }
    };

    match &err {
        RpcError::Closed => tracing::debug!("rpc client: connection closed"),
        e => tracing::warn!("rpc client: receive error: {}", e),
    }
    inner.terminate_calls(err).await;
}
