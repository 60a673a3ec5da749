//! MiniRPC end-to-end tests
//!
//! Brings up a registry, several HTTP servers announcing themselves by
//! heartbeat, and an XClient discovering them through the registry.

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use minirpc::{Context, Options, Registry, RegistryDiscovery, RpcError, SelectMode, Server, Service, XClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Args {
    num1: i64,
    num2: i64,
}

struct Foo;

fn foo_service() -> Service {
    Service::builder("Foo", Foo)
        .method("Sum", |_: &Foo, args: Args, reply: &mut i64| {
            *reply = args.num1 + args.num2;
            Ok::<(), String>(())
        })
        .async_method("Sleep", |_: Arc<Foo>, args: Args, _: i64| async move {
            tokio::time::sleep(Duration::from_millis(args.num1 as u64)).await;
            Ok::<i64, String>(args.num1 + args.num2)
        })
        .build()
        .unwrap()
}

async fn start_registry() -> String {
    let registry = Arc::new(Registry::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(registry.serve(listener));
    format!("http://{}{}", addr, minirpc::common::http::REGISTRY_PATH)
}

async fn start_http_server(registry: &str) -> (String, tokio::task::JoinHandle<()>) {
    let server = Arc::new(Server::default());
    server.register(foo_service()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve_http(listener));
    let beat = minirpc::registry::heartbeat(registry, &format!("http@{}", addr), Duration::ZERO)
        .await
        .unwrap();
    (addr.to_string(), beat)
}

#[tokio::test]
async fn test_registry_discovery_call_and_broadcast() {
    let registry = start_registry().await;
    let (_, beat1) = start_http_server(&registry).await;
    let (_, beat2) = start_http_server(&registry).await;

    let discovery = Arc::new(RegistryDiscovery::new(registry.clone(), Duration::ZERO));
    let xc = XClient::new(discovery, SelectMode::RoundRobin, Options::default());
    let ctx = Context::background();

    for i in 0..5 {
        let reply: i64 = xc.call(&ctx, "Foo.Sum", &Args { num1: i, num2: i * i }).await.unwrap();
        assert_eq!(reply, i + i * i);
    }

    let mut reply = 0i64;
    xc.broadcast(&ctx, "Foo.Sum", &Args { num1: 3, num2: 4 }, Some(&mut reply))
        .await
        .unwrap();
    assert_eq!(reply, 7);

    let short = ctx.with_timeout(Duration::from_millis(100));
    let err = xc
        .broadcast::<_, i64>(&short, "Foo.Sleep", &Args { num1: 2000, num2: 0 }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::CallTimeout), "got {err:?}");

    xc.close().await.unwrap();
    beat1.abort();
    beat2.abort();
}

#[tokio::test]
async fn test_debug_page_over_http() {
    let server = Arc::new(Server::default());
    server.register(foo_service()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Arc::clone(&server).serve_http(listener));

    let client = minirpc::client::dial_http("tcp", &addr.to_string(), Options::default())
        .await
        .unwrap();
    for _ in 0..3 {
        let _: i64 = client.call("Foo.Sum", &Args { num1: 1, num2: 2 }).await.unwrap();
    }

    let http: HttpClient<_, Empty<Bytes>> = HttpClient::builder(TokioExecutor::new()).build_http();
    let uri = format!("http://{}{}", addr, minirpc::common::http::DEBUG_PATH)
        .parse()
        .unwrap();
    let response = http.get(uri).await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8_lossy(&body);
    assert!(page.contains("Service Foo"));
    assert!(page.contains("<td align=center>3</td>"));
}
