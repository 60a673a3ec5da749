//! HTTP front door for the MiniRPC server
//!
//! Lets RPC traffic cross HTTP proxies by tunnelling through `CONNECT`, and
//! serves a small debug page.
//!
//! # Routes
//!
//! - `CONNECT /_minirpc_`: answered with `200 Connected to MiniRPC`, after
//!   which the upgraded connection speaks the plain RPC protocol
//! - any other method on `/_minirpc_`: `405 must CONNECT`
//! - `/debug/minirpc`: HTML listing of services, methods and call counts
//! - everything else: `404`

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::ext::ReasonPhrase;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

use minirpc_common::http::{CONNECTED_REASON, DEBUG_PATH, RPC_PATH};
use minirpc_common::{Result, RpcError};

use crate::debug;
use crate::server::Server;

impl Server {
    /// Accepts HTTP connections until the listener fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use minirpc_server::Server;
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> minirpc_common::Result<()> {
    /// let server = Arc::new(Server::default());
    /// let listener = tokio::net::TcpListener::bind("127.0.0.1:9999").await?;
    /// server.serve_http(listener).await
    /// # }
    /// ```
    pub async fn serve_http(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("rpc server: serving HTTP on {}", addr);
        }
        loop {
            let (stream, _) = listener.accept().await.map_err(|e| {
                tracing::error!("rpc server: accept error: {}", e);
                RpcError::from(e)
            })?;

            let io = TokioIo::new(stream);
            let server = Arc::clone(&self);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { handle_http(server, req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .with_upgrades()
                    .await
                {
                    tracing::debug!("rpc server: error serving HTTP connection: {}", err);
                }
            });
        }
    }
}

async fn handle_http(
    server: Arc<Server>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        RPC_PATH => Ok(handle_connect(server, req)),
        DEBUG_PATH => Ok(text_response(
            StatusCode::OK,
            "text/html; charset=utf-8",
            debug::render(&server.services()),
        )),
        _ => Ok(text_response(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            "404 page not found\n".to_string(),
        )),
    }
}

fn handle_connect(server: Arc<Server>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() != Method::CONNECT {
        return text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain; charset=utf-8",
            "405 must CONNECT\n".to_string(),
        );
    }

    tokio::task::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => server.serve_conn(TokioIo::new(upgraded)).await,
            Err(e) => tracing::warn!("rpc server: upgrade error: {}", e),
        }
    });

    let mut response = Response::new(Full::new(Bytes::new()));
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(CONNECTED_REASON.as_bytes()));
    response
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    response
}
