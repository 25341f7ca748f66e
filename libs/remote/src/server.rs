//! Actor Server
//!
//! HTTP endpoint that receives envelopes from other processes and delivers
//! them to local actors exactly like a local send.
//!
//! ## Routes
//!
//! | Route | Meaning |
//! |---|---|
//! | `PUT /actors/{to}/{from}` | deliver the bincode value in the body from `from` to `to` |
//! | `PUT /actors/{to}` | same, from a fresh anonymous sender |
//! | `GET /actors` | number of registered local actors |
//!
//! A delivery answers `200` with the handler's result value, `400` for an
//! undecodable body or a rejected message, `404` for an unknown receiver
//! and `500` for any other failure.

use crate::codec::{decode_reference, decode_value, encode_value};
use crate::error::{RemoteError, Result};
use crate::reference::RemoteReferenceFactory;
use crate::router::RemoteRouter;
use actor_core::{
    ActorBehavior, ActorError, ActorRef, CompositeRouter, Context, ContextBuilder, EnvelopeKind,
    LocalRouter, Message, Reference, Value, WeakContext,
};
use actor_config::RuntimeConfig;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted message body
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Shared state of the HTTP routes
struct Endpoint {
    context: OnceCell<WeakContext>,
    timeout: Duration,
}

impl Endpoint {
    fn new(timeout: Duration) -> Self {
        Self {
            context: OnceCell::new(),
            timeout,
        }
    }

    fn attach(&self, context: &Context) {
        let _ = self.context.set(context.downgrade());
    }

    fn context(&self) -> Option<Context> {
        self.context
            .get()
            .and_then(WeakContext::upgrade)
            .filter(|context| !context.is_stopped())
    }

    async fn deliver(&self, to: &str, from: Option<&str>, body: Bytes) -> warp::reply::Response {
        let context = match self.context() {
            Some(context) => context,
            None => return text(StatusCode::SERVICE_UNAVAILABLE, "endpoint is not running"),
        };

        let to = match decode_reference(to) {
            Ok(to) => to,
            Err(error) => return text(StatusCode::BAD_REQUEST, error.to_string()),
        };
        let receiver = match context.notary().identify(to.name()) {
            Some(receiver) => receiver,
            None => return text(StatusCode::NOT_FOUND, format!("Unknown actor: {}", to)),
        };
        let sender = match from.map(decode_reference).transpose() {
            Ok(Some(sender)) => sender,
            Ok(None) => Reference::parse(&format!("actor://anonymous-{}@remote", Uuid::new_v4())),
            Err(error) => return text(StatusCode::BAD_REQUEST, error.to_string()),
        };
        let value = match decode_value(&body) {
            Ok(value) => value,
            Err(error) => return text(StatusCode::BAD_REQUEST, error.to_string()),
        };

        debug!(actor = %receiver, from = %sender, "Remote envelope received");

        let timeout = self.timeout;
        let outcome = tokio::task::spawn_blocking(move || {
            context
                .post(sender, receiver, Message::value(value), EnvelopeKind::Normal)
                .get_timeout(timeout)
        })
        .await;

        match outcome {
            Ok(Ok(payload)) => match payload.downcast_ref::<Value>().map(encode_value) {
                Some(Ok(bytes)) => {
                    warp::reply::with_status(bytes.to_vec(), StatusCode::OK).into_response()
                }
                Some(Err(error)) => text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
                None => text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "handler result is not a value",
                ),
            },
            Ok(Err(error)) => failure(&error),
            Err(error) => {
                warn!(%error, "Delivery task failed");
                text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }

    fn size(&self) -> warp::reply::Response {
        match self.context() {
            Some(context) => text(StatusCode::OK, context.notary().size().to_string()),
            None => text(StatusCode::SERVICE_UNAVAILABLE, "endpoint is not running"),
        }
    }
}

fn text(status: StatusCode, body: impl Into<String>) -> warp::reply::Response {
    warp::reply::with_status(body.into(), status).into_response()
}

fn failure(error: &ActorError) -> warp::reply::Response {
    let status = match error {
        ActorError::UnknownActor { .. } => StatusCode::NOT_FOUND,
        ActorError::InvalidMessage { .. } | ActorError::UnsupportedMessage { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    text(status, error.to_string())
}

fn with_endpoint(
    endpoint: Arc<Endpoint>,
) -> impl Filter<Extract = (Arc<Endpoint>,), Error = Infallible> + Clone {
    warp::any().map(move || endpoint.clone())
}

fn routes(
    endpoint: Arc<Endpoint>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone + Send + Sync + 'static
{
    let body = warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes());

    let addressed = warp::put()
        .and(warp::path!("actors" / String / String))
        .and(body.clone())
        .and(with_endpoint(endpoint.clone()))
        .and_then(
            |to: String, from: String, body: Bytes, endpoint: Arc<Endpoint>| async move {
                Ok::<_, Rejection>(endpoint.deliver(&to, Some(&from), body).await)
            },
        );

    let anonymous = warp::put()
        .and(warp::path!("actors" / String))
        .and(body)
        .and(with_endpoint(endpoint.clone()))
        .and_then(|to: String, body: Bytes, endpoint: Arc<Endpoint>| async move {
            Ok::<_, Rejection>(endpoint.deliver(&to, None, body).await)
        });

    let size = warp::get()
        .and(warp::path!("actors"))
        .and(with_endpoint(endpoint))
        .map(|endpoint: Arc<Endpoint>| endpoint.size());

    addressed.or(anonymous).unify().or(size).unify()
}

/// A context reachable over HTTP
pub struct ActorServer {
    context: Context,
    uri: String,
    local_addr: SocketAddr,
    max_local_actors: usize,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    runtime: Mutex<Option<Runtime>>,
}

impl ActorServer {
    /// Start an endpoint if `config.remote.enabled`
    pub fn start_if_enabled(config: RuntimeConfig) -> Result<Option<Self>> {
        if !config.remote.enabled {
            return Ok(None);
        }
        Self::start(ContextBuilder::from_config(config)).map(Some)
    }

    /// Bind `remote.host:remote.port` and build the context behind it
    ///
    /// Port `0` binds an ephemeral port; [`uri`](Self::uri) reports the
    /// bound one. References created by the context carry the endpoint URI
    /// as their origin.
    pub fn start(builder: ContextBuilder) -> Result<Self> {
        let settings = builder.config().remote.clone();
        let namespace = builder.config().namespace.clone();

        let address: SocketAddr = format!("{}:{}", settings.host, settings.port)
            .parse()
            .map_err(|e| {
                RemoteError::configuration(format!("Invalid bind address: {}", e), Some("remote.host"))
            })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("actor-remote")
            .enable_all()
            .build()
            .map_err(|e| RemoteError::runtime(format!("Failed to build runtime: {}", e)))?;

        let endpoint = Arc::new(Endpoint::new(settings.request_timeout()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (local_addr, server) = {
            let _guard = runtime.enter();
            warp::serve(routes(endpoint.clone()))
                .try_bind_with_graceful_shutdown(address, async move {
                    let _ = shutdown_rx.await;
                })
                .map_err(|e| RemoteError::bind(e.to_string(), Some(address)))?
        };
        runtime.spawn(server);

        let uri = format!("http://{}:{}", settings.host, local_addr.port());
        let remote = RemoteRouter::new(runtime.handle().clone(), settings.request_timeout())?;
        let context = builder
            .with_reference_factory(Arc::new(RemoteReferenceFactory::new(namespace, uri.clone())))
            .with_router(Arc::new(CompositeRouter::new(
                uri.clone(),
                Arc::new(LocalRouter::new()),
                Arc::new(remote),
            )))
            .build()?;
        endpoint.attach(&context);

        info!(%uri, %local_addr, "Actor server listening");

        Ok(Self {
            context,
            uri,
            local_addr,
            max_local_actors: settings.max_local_actors,
            shutdown: Mutex::new(Some(shutdown_tx)),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Base URI other endpoints use to reach this one
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register a local actor, refusing once `remote.max_local_actors` are registered
    pub fn new_actor<T: ActorBehavior>(&self, name: &str, object: Arc<T>) -> Result<ActorRef> {
        if self.context.notary().size() >= self.max_local_actors {
            return Err(RemoteError::configuration(
                format!("local actor limit of {} reached", self.max_local_actors),
                Some("remote.max_local_actors"),
            ));
        }
        Ok(self.context.new_actor(name, object)?)
    }

    /// Reference of `name` hosted by the endpoint at `origin`
    pub fn remote_reference(&self, name: &str, origin: &str) -> Reference {
        Reference::new(
            format!("{}{}@{}", self.context.config().namespace, name, origin),
            name,
        )
    }

    /// Stop the context and the HTTP endpoint; returns false if already stopped
    pub fn stop(&self) -> bool {
        let runtime = self.runtime.lock().take();
        let Some(runtime) = runtime else {
            return false;
        };
        self.context.stop();
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }
        runtime.shutdown_timeout(Duration::from_secs(1));
        info!(uri = %self.uri, "Actor server stopped");
        true
    }
}

impl Drop for ActorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ActorServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorServer")
            .field("uri", &self.uri)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.remote.port = 0;
        config.executor.core_threads = 1;
        config
    }

    fn ephemeral() -> ContextBuilder {
        ContextBuilder::from_config(ephemeral_config())
    }

    struct Idle;
    impl ActorBehavior for Idle {}

    #[test]
    fn test_references_carry_endpoint_uri() {
        let server = ActorServer::start(ephemeral()).unwrap();
        let actor = server.new_actor("idle", Arc::new(Idle)).unwrap();

        assert!(server.uri().starts_with("http://127.0.0.1:"));
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(actor.reference().origin(), Some(server.uri()));
        assert_eq!(actor.reference().simple_name(), "idle");
        assert!(server.stop());
        assert!(!server.stop());
    }

    #[test]
    fn test_local_actor_limit() {
        let mut config = ephemeral_config();
        config.remote.max_local_actors = 1;

        let server = ActorServer::start(ContextBuilder::from_config(config)).unwrap();
        server.new_actor("first", Arc::new(Idle)).unwrap();
        assert!(matches!(
            server.new_actor("second", Arc::new(Idle)),
            Err(RemoteError::Configuration { .. })
        ));
    }

    #[test]
    fn test_disabled_remote_starts_nothing() {
        assert!(ActorServer::start_if_enabled(RuntimeConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_failure_status_codes() {
        assert_eq!(
            failure(&ActorError::unknown_actor("actor://ghost")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            failure(&ActorError::invalid_message("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            failure(&ActorError::Cancelled).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
