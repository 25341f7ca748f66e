//! Remote Router
//!
//! Delivers envelopes for actors of other endpoints over HTTP. Routing only
//! queues the request on the transport runtime; the envelope's response is
//! settled when the remote endpoint answers:
//!
//! - `200` completes it with the decoded result value
//! - `400` fails it with [`ActorError::InvalidMessage`]
//! - `404` fails it with [`ActorError::UnknownActor`]
//! - anything else fails it with [`ActorError::Transport`]

use crate::codec::{decode_value, encode_reference, encode_value};
use crate::error::RemoteError;
use actor_core::{ActorError, Envelope, Message, Reference, Router, Value};
use bytes::Bytes;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub struct RemoteRouter {
    client: reqwest::Client,
    handle: Handle,
    timeout: Duration,
    stopped: AtomicBool,
}

impl RemoteRouter {
    /// Router issuing requests on `handle`, each bounded by `timeout`
    pub fn new(handle: Handle, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RemoteError::runtime(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            handle,
            timeout,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `PUT` target for an envelope from `from` to `to`
    pub fn endpoint(to: &Reference, from: &Reference) -> actor_core::Result<String> {
        let origin = to
            .origin()
            .ok_or_else(|| ActorError::unknown_actor(to))?
            .trim_end_matches('/');
        Ok(format!(
            "{}/actors/{}/{}",
            origin,
            encode_reference(to),
            encode_reference(from)
        ))
    }
}

impl Router for RemoteRouter {
    fn route(&self, envelope: &Envelope) -> actor_core::Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(ActorError::ContextStopped);
        }

        let value = envelope
            .with_message(|message| message.and_then(Message::as_value).cloned())
            .ok_or_else(|| {
                ActorError::invalid_message(format!(
                    "{} messages cannot be sent to {}",
                    envelope.message_kind().label(),
                    envelope.to()
                ))
            })?;
        let url = Self::endpoint(envelope.to(), envelope.from())?;
        let body = encode_value(&value)?;

        debug!(
            sequence = envelope.sequence(),
            actor = %envelope.to(),
            %url,
            "Routing envelope to remote endpoint"
        );

        let client = self.client.clone();
        let response = envelope.response().clone();
        let receiver = envelope.to().clone();
        let timeout = self.timeout;
        self.handle.spawn(async move {
            match deliver(&client, &url, body, &receiver, timeout).await {
                Ok(value) => {
                    response.complete(value);
                }
                Err(error) => {
                    warn!(actor = %receiver, %error, "Remote delivery failed");
                    response.fail(error);
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

async fn deliver(
    client: &reqwest::Client,
    url: &str,
    body: Bytes,
    receiver: &Reference,
    timeout: Duration,
) -> actor_core::Result<Value> {
    let reply = client.put(url).body(body).send().await.map_err(|e| {
        if e.is_timeout() {
            ActorError::timeout("remote delivery", timeout)
        } else {
            ActorError::transport(format!("PUT {} failed: {}", url, e))
        }
    })?;

    let status = reply.status();
    let bytes = reply
        .bytes()
        .await
        .map_err(|e| ActorError::transport(format!("Reading reply from {} failed: {}", url, e)))?;

    match status {
        StatusCode::OK => Ok(decode_value(&bytes)?),
        StatusCode::BAD_REQUEST => Err(ActorError::invalid_message(
            String::from_utf8_lossy(&bytes).into_owned(),
        )),
        StatusCode::NOT_FOUND => Err(ActorError::unknown_actor(receiver)),
        other => Err(ActorError::transport(format!(
            "{} answered {}: {}",
            url,
            other,
            String::from_utf8_lossy(&bytes)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_receiver_origin() {
        let to = Reference::parse("actor://echo-1@http://127.0.0.1:7001/");
        let from = Reference::parse("actor://echo-2@http://127.0.0.1:7002");
        let url = RemoteRouter::endpoint(&to, &from).unwrap();

        assert!(url.starts_with("http://127.0.0.1:7001/actors/"));
        assert_eq!(url.matches('/').count(), 5);
    }

    #[test]
    fn test_endpoint_requires_origin() {
        let to = Reference::parse("actor://local-only");
        assert!(matches!(
            RemoteRouter::endpoint(&to, &Reference::nobody()),
            Err(ActorError::UnknownActor { .. })
        ));
    }

    #[test]
    fn test_closures_cannot_be_routed() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let router = RemoteRouter::new(runtime.handle().clone(), Duration::from_secs(1)).unwrap();
        let envelope = Envelope::new(
            Reference::nobody(),
            Reference::parse("actor://echo@http://127.0.0.1:1"),
            Message::run(|_| Ok(())),
        );

        assert!(matches!(
            router.route(&envelope),
            Err(ActorError::InvalidMessage { .. })
        ));

        router.stop();
        let value = Envelope::new(
            Reference::nobody(),
            Reference::parse("actor://echo@http://127.0.0.1:1"),
            Message::value(1i64),
        );
        assert!(matches!(router.route(&value), Err(ActorError::ContextStopped)));
    }
}
