//! HTTP resource for the registry
//!
//! # Routes
//!
//! - `GET /_minirpc_/registry`: `200` with alive servers in
//!   `X-Minirpc-Servers`, comma separated
//! - `POST /_minirpc_/registry`: records the address in `X-Minirpc-Server`;
//!   `500` if the header is missing
//! - any other method: `405`
//! - other paths: `404`

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

use minirpc_common::http::{REGISTRY_PATH, SERVERS_HEADER, SERVER_HEADER};
use minirpc_common::{Result, RpcError};

use crate::registry::Registry;

impl Registry {
    /// Serves the registry over HTTP until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("rpc registry: serving on {}{}", addr, REGISTRY_PATH);
        }
        loop {
            let (stream, _) = listener.accept().await.map_err(|e| {
                tracing::error!("rpc registry: accept error: {}", e);
                RpcError::from(e)
            })?;

            let io = TokioIo::new(stream);
            let registry = Arc::clone(&self);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let registry = Arc::clone(&registry);
                    async move { handle_request(&registry, req) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!("rpc registry: error serving connection: {}", err);
                }
            });
        }
    }
}

fn handle_request(
    registry: &Registry,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != REGISTRY_PATH {
        return Ok(status(StatusCode::NOT_FOUND));
    }

    match *req.method() {
        Method::GET => {
            let servers = registry.alive_servers().join(",");
            let mut response = status(StatusCode::OK);
            match HeaderValue::from_str(&servers) {
                Ok(value) => {
                    response.headers_mut().insert(SERVERS_HEADER, value);
                }
                Err(e) => {
                    tracing::error!("rpc registry: invalid server list: {}", e);
                    return Ok(status(StatusCode::INTERNAL_SERVER_ERROR));
                }
            }
            Ok(response)
        }
        Method::POST => {
            let addr = req
                .headers()
                .get(SERVER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());

            match addr {
                Some(addr) => {
                    tracing::debug!("rpc registry: heartbeat from {}", addr);
                    registry.put_server(addr);
                    Ok(status(StatusCode::OK))
                }
                None => Ok(status(StatusCode::INTERNAL_SERVER_ERROR)),
            }
        }
        _ => Ok(status(StatusCode::METHOD_NOT_ALLOWED)),
    }
}

fn status(code: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = code;
    response
}
