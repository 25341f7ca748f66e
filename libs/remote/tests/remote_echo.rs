//! Remote Echo Tests
//!
//! Two endpoints in one process, each with its own context and origin,
//! exchanging value messages over HTTP.

use actor_config::RuntimeConfig;
use actor_core::{ActorBehavior, ActorError, ContextBuilder, Frame, Message, Value};
use actor_remote::{encode_value, ActorServer};
use parking_lot::Mutex;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn start_server() -> ActorServer {
    init_tracing();
    let mut config = RuntimeConfig::default();
    config.remote.enabled = true;
    config.remote.port = 0;
    config.remote.request_timeout_secs = 5;
    ActorServer::start(ContextBuilder::from_config(config)).expect("server should start")
}

fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Records every value with its sender and answers `ping` with `pong`
struct Echo {
    name: &'static str,
    received: Mutex<Vec<(String, Value)>>,
}

impl Echo {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            received: Mutex::new(Vec::new()),
        })
    }
}

impl ActorBehavior for Echo {
    fn on_message(&self, message: Value, frame: &Frame) -> anyhow::Result<Value> {
        self.received
            .lock()
            .push((frame.sender().name().to_string(), message.clone()));
        if message.as_text() == Some("ping") {
            frame.reply_value("pong");
        }
        Ok(Value::from(format!("{} got {}", self.name, message)))
    }
}

struct Silent;

impl ActorBehavior for Silent {}

#[test]
fn test_echo_between_endpoints() {
    let server1 = start_server();
    let server2 = start_server();
    assert_ne!(server1.uri(), server2.uri());

    let echo1_object = Echo::new("echo-1");
    let echo2_object = Echo::new("echo-2");
    let echo1 = server1.new_actor("echo-1", echo1_object.clone()).unwrap();
    let echo2 = server2.new_actor("echo-2", echo2_object.clone()).unwrap();

    let reply = echo2
        .send(echo1.reference(), Message::value("ping"))
        .get_as::<Value>()
        .unwrap();
    assert_eq!(reply, Value::from("echo-1 got ping"));

    assert_eq!(
        *echo1_object.received.lock(),
        vec![(echo2.name().to_string(), Value::from("ping"))]
    );
    assert!(eventually(Duration::from_secs(5), || {
        *echo2_object.received.lock() == vec![(echo1.name().to_string(), Value::from("pong"))]
    }));

    assert!(server1.stop());
    assert!(server2.stop());
}

#[test]
fn test_remote_failures_reach_the_sender() {
    let server1 = start_server();
    let server2 = start_server();
    server1.new_actor("silent", Arc::new(Silent)).unwrap();

    let ghost = server2.remote_reference("ghost", server1.uri());
    let unknown = server2.context().send(&ghost, Message::value(1i64));
    assert!(matches!(unknown.get(), Err(ActorError::UnknownActor { .. })));

    let silent = server2.remote_reference("silent", server1.uri());
    let rejected = server2.context().send(&silent, Message::value(1i64));
    assert!(matches!(rejected.get(), Err(ActorError::InvalidMessage { .. })));

    let closure = server2.context().send(&silent, Message::run(|_| Ok(())));
    assert!(matches!(closure.get(), Err(ActorError::InvalidMessage { .. })));
}

#[test]
fn test_unreachable_endpoint_is_a_transport_error() {
    let server = start_server();
    let nowhere = server.remote_reference("echo", "http://127.0.0.1:1");
    let response = server.context().send(&nowhere, Message::value("ping"));

    let error = response.get().unwrap_err();
    assert!(matches!(
        error,
        ActorError::Transport { .. } | ActorError::Timeout { .. }
    ));
}

#[test]
fn test_http_surface() {
    let server = start_server();
    let echo_object = Echo::new("echo-1");
    server.new_actor("echo-1", echo_object.clone()).unwrap();
    let uri = server.uri().to_string();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let client = reqwest::Client::new();

        let size = client.get(format!("{}/actors", uri)).send().await.unwrap();
        assert_eq!(size.status(), reqwest::StatusCode::OK);
        assert_eq!(size.text().await.unwrap(), "1");

        let missing = client
            .put(format!("{}/actors/nobody-here", uri))
            .body(encode_value(&Value::from("hi")).unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let garbage = client
            .put(format!("{}/actors/echo-1", uri))
            .body(Vec::new())
            .send()
            .await
            .unwrap();
        assert_eq!(garbage.status(), reqwest::StatusCode::BAD_REQUEST);

        let anonymous = client
            .put(format!("{}/actors/echo-1", uri))
            .body(encode_value(&Value::from("hi")).unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(anonymous.status(), reqwest::StatusCode::OK);
        let body = anonymous.bytes().await.unwrap();
        assert_eq!(
            actor_remote::decode_value(&body).unwrap(),
            Value::from("echo-1 got hi")
        );
    });
    drop(runtime);

    let received = echo_object.received.lock();
    assert_eq!(received.len(), 1);
    assert!(received[0].0.starts_with("actor://anonymous-"));
    assert!(received[0].0.ends_with("@remote"));
}
