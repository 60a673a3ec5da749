//! Connecting to servers.
//!
//! Every dial goes through [`dial_timeout`], which bounds connect plus
//! handshake by [`Options::connect_timeout`]. Addresses passed to [`xdial`]
//! take the form `protocol@addr`, where `protocol` is `tcp`, `unix` or
//! `http`.

use std::future::Future;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper::ext::ReasonPhrase;
use hyper::header::HOST;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use minirpc_common::http::{CONNECTED_REASON, RPC_PATH};
use minirpc_common::{Options, Result, RpcError, Transport};

use crate::client::Client;

/// A connection of any supported network.
pub type BoxedTransport = Box<dyn Transport>;

/// Connects to `address` over `network` (`tcp` or `unix`).
pub async fn dial(network: &str, address: &str, opt: Options) -> Result<Client> {
    dial_timeout(new_client, network, address, opt).await
}

/// Connects to a server behind the HTTP front door.
pub async fn dial_http(network: &str, address: &str, opt: Options) -> Result<Client> {
    dial_timeout(
        |conn, opt| new_http_client(conn, address, opt),
        network,
        address,
        opt,
    )
    .await
}

/// Connects according to `rpc_addr`, e.g. `tcp@127.0.0.1:9999`,
/// `unix@/tmp/minirpc.sock` or `http@127.0.0.1:9999`.
pub async fn xdial(rpc_addr: &str, opt: Options) -> Result<Client> {
    let (protocol, address) = rpc_addr.split_once('@').ok_or_else(|| {
        RpcError::Transport(format!(
            "rpc client err: wrong format '{}', expect protocol@addr",
            rpc_addr
        ))
    })?;

    match protocol {
        "http" => dial_http("tcp", address, opt).await,
        network => dial(network, address, opt).await,
    }
}

/// Connects and runs `new_client` on the connection, racing both against
/// `opt.connect_timeout`. A zero timeout means no limit.
///
/// # Errors
///
/// Returns [`RpcError::ConnectTimeout`] if the timeout elapses first.
pub async fn dial_timeout<F, Fut>(
    new_client: F,
    network: &str,
    address: &str,
    opt: Options,
) -> Result<Client>
where
    F: FnOnce(BoxedTransport, Options) -> Fut,
    Fut: Future<Output = Result<Client>>,
{
    let timeout = opt.connect_timeout;
    let attempt = async {
        let conn = connect(network, address).await?;
        new_client(conn, opt).await
    };

    if timeout.is_zero() {
        return attempt.await;
    }

    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("rpc client: connect to {} timed out after {:?}", address, timeout);
            Err(RpcError::ConnectTimeout(timeout))
        }
    }
}

/// Default client constructor used by [`dial`].
pub async fn new_client(conn: BoxedTransport, opt: Options) -> Result<Client> {
    Client::new(conn, opt).await
}

/// Tunnels through `CONNECT` before handing the connection to the client.
///
/// The server must answer `200 Connected to MiniRPC`; the upgraded stream
/// then carries the plain RPC protocol.
pub async fn new_http_client(conn: BoxedTransport, host: &str, opt: Options) -> Result<Client> {
    let (mut sender, connection) = http1::handshake(TokioIo::new(conn))
        .await
        .map_err(http_error)?;
    tokio::spawn(async move {
        if let Err(e) = connection.with_upgrades().await {
            tracing::debug!("rpc client: HTTP connection error: {}", e);
        }
    });

    let request = Request::builder()
        .method(Method::CONNECT)
        .uri(RPC_PATH)
        .header(HOST, host)
        .body(Empty::<Bytes>::new())
        .map_err(|e| RpcError::Transport(format!("building CONNECT request: {}", e)))?;
    let response = sender.send_request(request).await.map_err(http_error)?;

    let reason = response
        .extensions()
        .get::<ReasonPhrase>()
        .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());
    if response.status() != StatusCode::OK || reason.as_deref() != Some(CONNECTED_REASON) {
        return Err(RpcError::Transport(format!(
            "unexpected HTTP response: {} {}",
            response.status().as_u16(),
            reason.as_deref().unwrap_or_default()
        )));
    }

    let upgraded = hyper::upgrade::on(response).await.map_err(http_error)?;
    Client::new(TokioIo::new(upgraded), opt).await
}

fn http_error(err: hyper::Error) -> RpcError {
    RpcError::Transport(format!("HTTP: {}", err))
}

async fn connect(network: &str, address: &str) -> Result<BoxedTransport> {
    match network {
        "tcp" => {
            let stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        "unix" => Ok(Box::new(tokio::net::UnixStream::connect(address).await?)),
        other => Err(RpcError::Transport(format!("unsupported network {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_xdial_rejects_missing_protocol() {
        let err = xdial("127.0.0.1:1", Options::default()).await.err().unwrap();
        assert!(err.to_string().contains("expect protocol@addr"));
    }

    #[tokio::test]
    async fn test_unsupported_network() {
        let err = dial("udp", "127.0.0.1:1", Options::default()).await.err().unwrap();
        assert!(err.to_string().contains("unsupported network udp"));
    }
}
