//! Service registration and method dispatch.
//!
//! A [`Service`] wraps one receiver object and a table of typed methods.
//! Each method is type-erased at registration time into a handler that
//! decodes its argument from body bytes and yields an encoded reply, so the
//! server can dispatch by name without knowing any concrete types.
//!
//! # Example
//!
//! ```
//! use minirpc_server::Service;
//!
//! struct Arith;
//!
//! let service = Service::builder("Arith", Arith)
//!     .method("Sum", |_: &Arith, args: (i32, i32), reply: &mut i32| {
//!         *reply = args.0 + args.1;
//!         Ok::<(), String>(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(service.name(), "Arith");
//! assert!(service.method("Sum").is_some());
//! ```

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use minirpc_common::{CodecType, Result, RpcError, SERVER_ERROR_PREFIX};

/// Outcome of one invocation: the encoded reply, or the error string that
/// goes into the response header.
pub type MethodResult = std::result::Result<Vec<u8>, String>;

type Prepared = Result<BoxFuture<'static, MethodResult>>;

type Handler = Box<dyn Fn(CodecType, &[u8]) -> Prepared + Send + Sync>;

/// One registered method.
pub struct MethodType {
    name: String,
    arg_type: &'static str,
    reply_type: &'static str,
    num_calls: AtomicU64,
    handler: Handler,
}

impl MethodType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name of the argument, for display.
    pub fn arg_type(&self) -> &'static str {
        self.arg_type
    }

    /// Type name of the reply, for display.
    pub fn reply_type(&self) -> &'static str {
        self.reply_type
    }

    /// Number of invocations started so far.
    pub fn num_calls(&self) -> u64 {
        self.num_calls.load(Ordering::Relaxed)
    }

    /// Decodes the argument from `body` and allocates the reply.
    ///
    /// Nothing runs until [`Invocation::run`] is awaited.
    pub fn prepare(self: &Arc<Self>, codec: CodecType, body: &[u8]) -> Result<Invocation> {
        let call = (self.handler)(codec, body)?;
        Ok(Invocation {
            method: Arc::clone(self),
            call,
        })
    }
}

impl fmt::Debug for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodType")
            .field("name", &self.name)
            .field("arg_type", &self.arg_type)
            .field("reply_type", &self.reply_type)
            .field("num_calls", &self.num_calls())
            .finish()
    }
}

/// A prepared call, ready to run.
pub struct Invocation {
    method: Arc<MethodType>,
    call: BoxFuture<'static, MethodResult>,
}

impl Invocation {
    pub fn method(&self) -> &Arc<MethodType> {
        &self.method
    }

    /// Counts the call and runs the method.
    pub async fn run(self) -> MethodResult {
        self.method.num_calls.fetch_add(1, Ordering::Relaxed);
        self.call.await
    }
}

/// A named receiver and its methods.
pub struct Service {
    name: String,
    type_name: &'static str,
    methods: BTreeMap<String, Arc<MethodType>>,
}

impl Service {
    /// Starts building a service named `name` around `receiver`.
    pub fn builder<S: Send + Sync + 'static>(name: impl Into<String>, receiver: S) -> ServiceBuilder<S> {
        ServiceBuilder {
            name: name.into(),
            receiver: Arc::new(receiver),
            methods: BTreeMap::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name of the receiver.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodType>> {
        self.methods.get(name)
    }

    /// Methods in name order.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodType>> {
        self.methods.values()
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder returned by [`Service::builder`].
///
/// Invalid names and duplicate methods are reported by [`build`](Self::build).
pub struct ServiceBuilder<S> {
    name: String,
    receiver: Arc<S>,
    methods: BTreeMap<String, Arc<MethodType>>,
    error: Option<RpcError>,
}

impl<S: Send + Sync + 'static> ServiceBuilder<S> {
    /// Registers a synchronous method.
    ///
    /// The method fills a server-allocated `R::default()` and runs on the
    /// blocking thread pool, so it may block freely.
    pub fn method<A, R, E, F>(self, name: &str, f: F) -> Self
    where
        A: Serialize + DeserializeOwned + Send + 'static,
        R: Serialize + DeserializeOwned + Default + Send + 'static,
        E: Display + 'static,
        F: Fn(&S, A, &mut R) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        let f = Arc::new(f);
        let handler: Handler = Box::new(move |codec: CodecType, body: &[u8]| -> Prepared {
            let args: A = codec.decode(body)?;
            let receiver = Arc::clone(&receiver);
            let f = Arc::clone(&f);
            Ok(async move {
                let joined = tokio::task::spawn_blocking(move || {
                    let mut reply = R::default();
                    f(&*receiver, args, &mut reply)
                        .map(|()| reply)
                        .map_err(method_error)
                })
                .await;
                match joined {
                    Ok(Ok(reply)) => encode_reply(codec, &reply),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(format!("rpc server: method panicked: {}", e)),
                }
            }
            .boxed())
        });
        self.insert::<A, R>(name, handler)
    }

    /// Registers an async method.
    ///
    /// The method receives the receiver, the decoded argument and a
    /// server-allocated `R::default()`, and resolves to the filled reply.
    pub fn async_method<A, R, E, F, Fut>(self, name: &str, f: F) -> Self
    where
        A: Serialize + DeserializeOwned + Send + 'static,
        R: Serialize + DeserializeOwned + Default + Send + 'static,
        E: Display + 'static,
        F: Fn(Arc<S>, A, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        let handler: Handler = Box::new(move |codec: CodecType, body: &[u8]| -> Prepared {
            let args: A = codec.decode(body)?;
            let fut = f(Arc::clone(&receiver), args, R::default());
            Ok(async move {
                match fut.await {
                    Ok(reply) => encode_reply(codec, &reply),
                    Err(e) => Err(method_error(e)),
                }
            }
            .boxed())
        });
        self.insert::<A, R>(name, handler)
    }

    /// Finishes the service.
    ///
    /// # Errors
    ///
    /// Fails if the service or any method name is not an identifier, a
    /// method was registered twice, or no method was registered.
    pub fn build(self) -> Result<Service> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !is_identifier(&self.name) {
            return Err(RpcError::Protocol(format!(
                "rpc server: {:?} is not a valid service name",
                self.name
            )));
        }
        if self.methods.is_empty() {
            return Err(RpcError::Protocol(format!(
                "rpc server: service {} has no methods",
                self.name
            )));
        }
        Ok(Service {
            name: self.name,
            type_name: std::any::type_name::<S>(),
            methods: self.methods,
        })
    }

    fn insert<A, R>(mut self, name: &str, handler: Handler) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !is_identifier(name) {
            self.error = Some(RpcError::Protocol(format!(
                "rpc server: {:?} is not a valid method name",
                name
            )));
            return self;
        }
        if self.methods.contains_key(name) {
            self.error = Some(RpcError::Protocol(format!(
                "rpc server: method {}.{} registered twice",
                self.name, name
            )));
            return self;
        }
        let method = MethodType {
            name: name.to_string(),
            arg_type: std::any::type_name::<A>(),
            reply_type: std::any::type_name::<R>(),
            num_calls: AtomicU64::new(0),
            handler,
        };
        self.methods.insert(name.to_string(), Arc::new(method));
        self
    }
}

/// Message sent back for an error returned by a registered method.
///
/// Never empty, so the response is always read as a failure, and never
/// starting with [`SERVER_ERROR_PREFIX`], which is reserved for the server's
/// own errors.
fn method_error(err: impl Display) -> String {
    let message = err.to_string();
    if message.is_empty() {
        "method returned an empty error".to_string()
    } else if message.starts_with(SERVER_ERROR_PREFIX) {
        format!("method error: {}", message)
    } else {
        message
    }
}

fn encode_reply<R: Serialize>(codec: CodecType, reply: &R) -> MethodResult {
    codec
        .encode(reply)
        .map_err(|e| format!("rpc server: encoding reply: {}", e))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
