use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use minirpc_common::transport::read_options;
use minirpc_common::{
    CodecReader, CodecType, CodecWriter, Header, Result, RpcError, Transport,
};

use crate::service::{Invocation, MethodResult, MethodType, Service};

type SharedWriter<T> = Arc<Mutex<CodecWriter<WriteHalf<T>>>>;

/// MiniRPC server.
///
/// Holds the registered services and serves any number of connections.
/// Each connection is handled on its own task and each request on its own
/// task, so a slow method never blocks other calls on the same connection.
///
/// # Example
///
/// ```no_run
/// use minirpc_server::{Server, Service};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Arith;
///
/// # #[tokio::main]
/// # async fn main() -> minirpc_common::Result<()> {
/// let server = Arc::new(Server::new(Duration::from_secs(5)));
/// server.register(
///     Service::builder("Arith", Arith)
///         .method("Sum", |_: &Arith, args: (i32, i32), reply: &mut i32| {
///             *reply = args.0 + args.1;
///             Ok::<(), String>(())
///         })
///         .build()?,
/// )?;
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:9999").await?;
/// server.accept(listener).await
/// # }
/// ```
pub struct Server {
    services: RwLock<HashMap<String, Arc<Service>>>,
    handle_timeout: Duration,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Server {
    /// Creates a server.
    ///
    /// `handle_timeout` bounds each dispatched call when the client did not
    /// ask for its own bound; zero means unlimited.
    pub fn new(handle_timeout: Duration) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            handle_timeout,
        }
    }

    pub fn handle_timeout(&self) -> Duration {
        self.handle_timeout
    }

    /// Publishes a service.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::AlreadyDefined`] if a service with the same name
    /// is already registered; the existing service is kept.
    pub fn register(&self, service: Service) -> Result<()> {
        let mut services = self
            .services
            .write()
            .map_err(|_| RpcError::Protocol("rpc server: service map poisoned".into()))?;

        if services.contains_key(service.name()) {
            return Err(RpcError::AlreadyDefined(service.name().to_string()));
        }

        for method in service.methods() {
            tracing::info!("rpc server: register {}.{}", service.name(), method.name());
        }
        services.insert(service.name().to_string(), Arc::new(service));
        Ok(())
    }

    /// Registered services in name order.
    pub fn services(&self) -> Vec<Arc<Service>> {
        let mut services: Vec<_> = match self.services.read() {
            Ok(services) => services.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        services.sort_by(|a, b| a.name().cmp(b.name()));
        services
    }

    /// Accepts TCP connections until the listener fails, serving each on
    /// its own task.
    pub async fn accept(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("rpc server: listening on {}", addr);
        }
        loop {
            let (stream, peer) = listener.accept().await.map_err(|e| {
                tracing::error!("rpc server: accept error: {}", e);
                RpcError::from(e)
            })?;
            tracing::debug!("rpc server: accepted connection from {}", peer);

            let server = Arc::clone(&self);
            tokio::spawn(async move { server.serve_conn(stream).await });
        }
    }

    /// Accepts Unix socket connections until the listener fails.
    #[cfg(unix)]
    pub async fn accept_unix(self: Arc<Self>, listener: tokio::net::UnixListener) -> Result<()> {
        loop {
            let (stream, _) = listener.accept().await.map_err(|e| {
                tracing::error!("rpc server: accept error: {}", e);
                RpcError::from(e)
            })?;
            tracing::debug!("rpc server: accepted unix connection");

            let server = Arc::clone(&self);
            tokio::spawn(async move { server.serve_conn(stream).await });
        }
    }

    /// Runs one connection to completion.
    ///
    /// Reads the handshake, then serves requests until the peer hangs up or
    /// a header cannot be read. Returns after every in-flight request has
    /// been answered.
    pub async fn serve_conn<T: Transport>(&self, conn: T) {
        let (read_half, write_half) = tokio::io::split(conn);
        let mut buffered = BufReader::new(read_half);

        let opt = match read_options(&mut buffered).await {
            Ok(opt) => opt,
            Err(RpcError::Closed) => {
                tracing::debug!("rpc server: connection closed before handshake");
                return;
            }
            Err(e) => {
                tracing::warn!("rpc server: options error: {}", e);
                return;
            }
        };

        let timeout = if opt.handle_timeout.is_zero() {
            self.handle_timeout
        } else {
            opt.handle_timeout
        };
        tracing::debug!(
            "rpc server: handshake done, codec {}, handle timeout {:?}",
            opt.codec_type,
            timeout
        );

        let reader = CodecReader::new(buffered, opt.codec_type);
        let writer = Arc::new(Mutex::new(CodecWriter::new(write_half, opt.codec_type)));
        self.serve_codec(reader, writer, timeout).await;
    }

    async fn serve_codec<T: Transport>(
        &self,
        mut reader: CodecReader<BufReader<ReadHalf<T>>>,
        writer: SharedWriter<T>,
        timeout: Duration,
    ) {
        let codec = reader.codec();
        let mut inflight = JoinSet::new();

        loop {
            let header = match reader.read_header().await {
                Ok(header) => header,
                Err(RpcError::Closed) => break,
                Err(e) => {
                    tracing::warn!("rpc server: read header error: {}", e);
                    break;
                }
            };

            match self.read_request(&mut reader, codec, &header).await {
                Ok(Ok(invocation)) => {
                    tracing::debug!("rpc server: dispatching {} seq {}", header.service_method, header.seq);
                    inflight.spawn(handle_request(Arc::clone(&writer), header, invocation, timeout));
                }
                Ok(Err(message)) => {
                    tracing::warn!("{}", message);
                    send_response(&writer, &header, Err(message)).await;
                }
                Err(e) => {
                    tracing::warn!("rpc server: read body error: {}", e);
                    break;
                }
            }

            while let Some(joined) = inflight.try_join_next() {
                log_join(joined);
            }
        }

        while let Some(joined) = inflight.join_next().await {
            log_join(joined);
        }

        if let Err(e) = writer.lock().await.close().await {
            tracing::debug!("rpc server: closing connection: {}", e);
        }
    }

    /// Resolves the target and decodes the argument.
    ///
    /// The outer error means the stream is no longer usable. The inner error
    /// is a per-request failure to report back to the client; the body has
    /// been consumed either way.
    async fn read_request<R: AsyncRead + Unpin>(
        &self,
        reader: &mut CodecReader<R>,
        codec: CodecType,
        header: &Header,
    ) -> Result<std::result::Result<Invocation, String>> {
        let method = match self.find_method(header) {
            Ok(method) => method,
            Err(message) => {
                reader.discard_body().await?;
                return Ok(Err(message));
            }
        };

        let body = reader.read_body_raw().await?;
        Ok(method
            .prepare(codec, &body)
            .map_err(|e| format!("rpc server: read argv err: {}", e)))
    }

    fn find_method(&self, header: &Header) -> std::result::Result<Arc<MethodType>, String> {
        let (service_name, method_name) = header.split_service_method().ok_or_else(|| {
            format!(
                "rpc server: service/method request ill-formed: {}",
                header.service_method
            )
        })?;

        let service = self
            .services
            .read()
            .map_err(|_| "rpc server: service map poisoned".to_string())?
            .get(service_name)
            .cloned()
            .ok_or_else(|| format!("rpc server: can't find service {}", service_name))?;

        service
            .method(method_name)
            .cloned()
            .ok_or_else(|| format!("rpc server: can't find method {}", method_name))
    }
}

/// Runs one invocation and writes its response.
///
/// The invocation runs on its own task. If `timeout` elapses first the
/// timeout error is sent at once and the task is left to finish on its own;
/// its result is dropped.
async fn handle_request<W>(
    writer: Arc<Mutex<CodecWriter<W>>>,
    header: Header,
    invocation: Invocation,
    timeout: Duration,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let task = tokio::spawn(invocation.run());

    let joined = if timeout.is_zero() {
        Some(task.await)
    } else {
        tokio::time::timeout(timeout, task).await.ok()
    };

    let result = match joined {
        Some(Ok(result)) => result,
        Some(Err(e)) => Err(format!("rpc server: method panicked: {}", e)),
        None => {
            tracing::warn!(
                "rpc server: {} seq {} exceeded {:?}",
                header.service_method,
                header.seq,
                timeout
            );
            Err(format!(
                "rpc server: request handle timeout: expect within {:?}",
                timeout
            ))
        }
    };

    send_response(&writer, &header, result).await;
}

async fn send_response<W: AsyncWrite + Unpin>(
    writer: &Mutex<CodecWriter<W>>,
    header: &Header,
    result: MethodResult,
) {
    let mut writer = writer.lock().await;
    let written = match result {
        Ok(body) => writer.write_raw(header, &body).await,
        Err(message) => writer.write(&header.with_error(message), &()).await,
    };
    if let Err(e) = written {
        tracing::error!("rpc server: write response error: {}", e);
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("rpc server: request task failed: {}", e);
    }
}
