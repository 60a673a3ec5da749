//! # MiniRPC CLI Entry Point
//!
//! Main binary for MiniRPC. Starts servers and registries, and makes
//! one-off calls.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the Arith service over raw TCP
//! minirpc server -b 127.0.0.1:9001
//!
//! # Serve over the HTTP front door and announce to a registry
//! minirpc server -b 127.0.0.1:9002 --http --registry http://127.0.0.1:9999/_minirpc_/registry
//!
//! # Start a registry
//! minirpc registry -b 0.0.0.0:9999
//!
//! # Make a call (outputs raw JSON)
//! minirpc call tcp@127.0.0.1:9001 Arith.Sum -a '{"num1": 1, "num2": 2}'
//! ```
//!
//! ## Address Format
//!
//! Server addresses passed to `call` use the `protocol@addr` form:
//! - `tcp@127.0.0.1:9001`
//! - `http@127.0.0.1:9002`
//! - `unix@/tmp/minirpc.sock`
//!
//! Registry URLs must include the `http://` or `https://` prefix.

use anyhow::Result;
use argh::FromArgs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use minirpc_common::{CodecType, Context, Options};

/// Validates that a URL string starts with http:// or https://
///
/// # Errors
///
/// Returns an error if the URL doesn't start with http:// or https://
fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

/// Validates a `protocol@addr` server address.
fn validate_rpc_addr(rpc_addr: &str) -> Result<()> {
    match rpc_addr.split_once('@') {
        Some((protocol, addr)) if !protocol.is_empty() && !addr.is_empty() => Ok(()),
        _ => Err(anyhow::anyhow!(
            "Invalid server address: '{}' must be in the form protocol@addr",
            rpc_addr
        )),
    }
}

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// MiniRPC - a small RPC framework with discovery and a registry
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
///
/// - **Server**: Serve the built-in `Arith` service
/// - **Registry**: Run a heartbeat registry
/// - **Call**: Make a single call (unix-friendly JSON output)
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Server(ServerArgs),
    Registry(RegistryArgs),
    Call(CallArgs),
}

/// Arguments for starting a MiniRPC server.
///
/// # Example
///
/// ```bash
/// minirpc server -b 0.0.0.0:9001 --handle-timeout-ms 5000
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "server")]
/// start a MiniRPC server
struct ServerArgs {
    /// address to bind the server to
    ///
    /// Defaults to "0.0.0.0:0" which assigns a random available port.
    /// The actual bound address is logged at startup.
    #[argh(option, short = 'b', default = "\"0.0.0.0:0\".into()")]
    bind: String,

    /// serve behind the HTTP front door
    ///
    /// Clients reach the RPC endpoint with `CONNECT /_minirpc_` and the
    /// debug page is served at `/debug/minirpc`.
    #[argh(switch)]
    http: bool,

    /// optional registry URL to send heartbeats to
    ///
    /// Must include the http:// or https:// prefix
    /// (e.g., http://127.0.0.1:9999/_minirpc_/registry).
    #[argh(option, long = "registry")]
    registry: Option<String>,

    /// heartbeat interval in seconds
    ///
    /// Defaults to one minute less than the registry's default TTL.
    #[argh(option, long = "heartbeat-secs")]
    heartbeat_secs: Option<u64>,

    /// default per-request handle timeout in milliseconds
    ///
    /// Used when the client does not ask for one. 0 means unlimited.
    #[argh(option, long = "handle-timeout-ms", default = "0")]
    handle_timeout_ms: u64,
}

/// Arguments for starting a registry.
///
/// # Example
///
/// ```bash
/// minirpc registry -b 0.0.0.0:9999 --ttl-secs 60
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "registry")]
/// start a MiniRPC registry
struct RegistryArgs {
    /// address to bind the registry's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:9999\".into()")]
    bind: String,

    /// how long a server stays alive without a heartbeat, in seconds
    ///
    /// 0 means servers never expire. Defaults to 300.
    #[argh(option, long = "ttl-secs", default = "300")]
    ttl_secs: u64,
}

/// Arguments for making a single call.
///
/// Arguments and replies are carried with the JSON codec, so any method
/// whose types are JSON-representable can be called. The reply is written
/// to stdout as raw JSON.
///
/// # Examples
///
/// ```bash
/// minirpc call tcp@127.0.0.1:9001 Arith.Mul -a '{"num1": 6, "num2": 7}'
/// minirpc call http@127.0.0.1:9002 Arith.Sum -a '{"num1": 1, "num2": 2}' | jq .
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a method on a MiniRPC server
struct CallArgs {
    /// server address in protocol@addr form
    #[argh(positional)]
    server_address: String,

    /// method to call, as Service.Method
    #[argh(positional)]
    method: String,

    /// JSON string containing the argument of the method
    ///
    /// Defaults to `null`.
    #[argh(option, short = 'a', long = "args", default = "\"null\".into()")]
    args: String,

    /// call timeout in milliseconds, 0 means no limit
    #[argh(option, long = "timeout-ms", default = "10000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // call: keep output clean for piping to jq
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Server(args) => run_server(args).await,
        Commands::Registry(args) => run_registry(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

fn parse_bind(bind: &str) -> Result<SocketAddr> {
    bind.parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", bind, e))
}

async fn run_server(args: ServerArgs) -> Result<()> {
    if let Some(registry) = &args.registry {
        validate_http_url(registry, "registry address")?;
    }

    let server = Arc::new(minirpc_server::Server::new(Duration::from_millis(
        args.handle_timeout_ms,
    )));
    server.register(minirpc_cli::arith::service()?)?;

    let listener = TcpListener::bind(parse_bind(&args.bind)?).await?;
    let local_addr = listener.local_addr()?;
    let protocol = if args.http { "http" } else { "tcp" };
    tracing::info!("MiniRPC server listening on {}@{}", protocol, local_addr);

    let _heartbeat = match &args.registry {
        Some(registry) => {
            let interval = args
                .heartbeat_secs
                .map(Duration::from_secs)
                .unwrap_or(Duration::ZERO);
            let rpc_addr = format!("{}@{}", protocol, local_addr);
            tracing::info!("Sending heartbeats for {} to {}", rpc_addr, registry);
            Some(minirpc_registry::heartbeat(registry, &rpc_addr, interval).await?)
        }
        None => None,
    };

    if args.http {
        server.serve_http(listener).await?;
    } else {
        server.accept(listener).await?;
    }
    Ok(())
}

async fn run_registry(args: RegistryArgs) -> Result<()> {
    let registry = Arc::new(minirpc_registry::Registry::new(Duration::from_secs(
        args.ttl_secs,
    )));
    let listener = TcpListener::bind(parse_bind(&args.bind)?).await?;
    tracing::info!(
        "MiniRPC registry listening on http://{}{}",
        listener.local_addr()?,
        minirpc_common::http::REGISTRY_PATH
    );
    registry.serve(listener).await?;
    Ok(())
}

/// Executes the `call` subcommand.
///
/// # Errors
///
/// Returns an error if the args string is not valid JSON, the server
/// cannot be reached, or the call itself fails.
async fn run_call(args: CallArgs) -> Result<()> {
    validate_rpc_addr(&args.server_address)?;

    let args_value: serde_json::Value = serde_json::from_str(&args.args)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in args: {}", e))?;

    let opt = Options::default().with_codec(CodecType::Json);
    let client = minirpc_client::xdial(&args.server_address, opt).await?;

    let ctx = if args.timeout_ms == 0 {
        Context::background()
    } else {
        Context::background().with_timeout(Duration::from_millis(args.timeout_ms))
    };
    let result: serde_json::Value = client
        .call_with_context(&ctx, &args.method, &args_value)
        .await?;
    let _ = client.close().await;

    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_server_defaults() {
        let args: Cli = Cli::from_args(&["minirpc"], &["server"]).unwrap();
        match args.command {
            Commands::Server(ServerArgs { bind, http, registry, heartbeat_secs, handle_timeout_ms }) => {
                assert_eq!(bind, "0.0.0.0:0");
                assert!(!http);
                assert!(registry.is_none());
                assert!(heartbeat_secs.is_none());
                assert_eq!(handle_timeout_ms, 0);
            }
            _ => panic!("Expected Server command"),
        }
    }

    #[test]
    fn test_cli_parse_server_with_registry() {
        let args: Cli = Cli::from_args(&["minirpc"], &[
            "server",
            "-b", "127.0.0.1:9001",
            "--http",
            "--registry", "http://127.0.0.1:9999/_minirpc_/registry",
            "--heartbeat-secs", "30",
            "--handle-timeout-ms", "500",
        ]).unwrap();
        match args.command {
            Commands::Server(ServerArgs { bind, http, registry, heartbeat_secs, handle_timeout_ms }) => {
                assert_eq!(bind, "127.0.0.1:9001");
                assert!(http);
                assert_eq!(registry.as_deref(), Some("http://127.0.0.1:9999/_minirpc_/registry"));
                assert_eq!(heartbeat_secs, Some(30));
                assert_eq!(handle_timeout_ms, 500);
            }
            _ => panic!("Expected Server command"),
        }
    }

    #[test]
    fn test_cli_parse_registry() {
        let args: Cli = Cli::from_args(&["minirpc"], &["registry"]).unwrap();
        match args.command {
            Commands::Registry(RegistryArgs { bind, ttl_secs }) => {
                assert_eq!(bind, "0.0.0.0:9999");
                assert_eq!(ttl_secs, 300);
            }
            _ => panic!("Expected Registry command"),
        }

        let args: Cli = Cli::from_args(&["minirpc"], &["registry", "--ttl-secs", "0"]).unwrap();
        match args.command {
            Commands::Registry(RegistryArgs { ttl_secs, .. }) => assert_eq!(ttl_secs, 0),
            _ => panic!("Expected Registry command"),
        }
    }

    #[test]
    fn test_cli_parse_call() {
        let args: Cli = Cli::from_args(&["minirpc"], &[
            "call",
            "tcp@127.0.0.1:9001",
            "Arith.Sum",
            "-a", r#"{"num1": 1, "num2": 2}"#,
        ]).unwrap();
        match args.command {
            Commands::Call(CallArgs { server_address, method, args, timeout_ms }) => {
                assert_eq!(server_address, "tcp@127.0.0.1:9001");
                assert_eq!(method, "Arith.Sum");
                assert_eq!(args, r#"{"num1": 1, "num2": 2}"#);
                assert_eq!(timeout_ms, 10000);
            }
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_parse_call_default_args() {
        let args: Cli = Cli::from_args(&["minirpc"], &["call", "http@127.0.0.1:9002", "Arith.Mul"]).unwrap();
        match args.command {
            Commands::Call(CallArgs { args, .. }) => assert_eq!(args, "null"),
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_parse_call_missing_method() {
        assert!(Cli::from_args(&["minirpc"], &["call", "tcp@127.0.0.1:9001"]).is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://127.0.0.1:9999/_minirpc_/registry", "registry").is_ok());
        assert!(validate_http_url("https://example.com", "registry").is_ok());
        assert!(validate_http_url("127.0.0.1:9999", "registry").is_err());
    }

    #[test]
    fn test_validate_rpc_addr() {
        assert!(validate_rpc_addr("tcp@127.0.0.1:9001").is_ok());
        assert!(validate_rpc_addr("unix@/tmp/minirpc.sock").is_ok());
        assert!(validate_rpc_addr("127.0.0.1:9001").is_err());
        assert!(validate_rpc_addr("tcp@").is_err());
    }
}
