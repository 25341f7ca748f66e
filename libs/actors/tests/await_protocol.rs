//! Await Protocol Tests
//!
//! Covers waiting on other actors from inside a handler:
//! - Sequential token requests between two actors
//! - Mailbox progress while a handler waits
//! - Condition awaits released by a later message
//! - Long-running condition polls
//! - Mutual awaits between two actors
//! - Deadlines and failure propagation

mod common;

use actor_core::{ActorBehavior, ActorError, Message, Reference};
use common::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Hands out increasing tokens
struct Network {
    issued: AtomicU64,
}

impl ActorBehavior for Network {}

/// Asks the network for a token per request
struct Gateway {
    network: Reference,
    tokens: Mutex<Vec<u64>>,
}

impl ActorBehavior for Gateway {}

fn request_token() -> Message {
    Message::call(|frame| {
        let gateway = frame
            .this::<Gateway>()
            .ok_or_else(|| anyhow::anyhow!("gateway missing"))?;
        let token = frame
            .await_on(
                &gateway.network,
                Message::call(|frame| {
                    let network = frame
                        .this::<Network>()
                        .ok_or_else(|| anyhow::anyhow!("network missing"))?;
                    Ok(network.issued.fetch_add(1, Ordering::SeqCst) + 1)
                }),
            )
            .get_as::<u64>()?;
        gateway.tokens.lock().push(token);
        Ok(token)
    })
}

#[test]
fn test_sequential_gateway_tokens() {
    let context = test_context();
    let network = context
        .new_actor("network", Arc::new(Network { issued: AtomicU64::new(0) }))
        .unwrap();
    let gateway_object = Arc::new(Gateway {
        network: network.reference().clone(),
        tokens: Mutex::new(Vec::new()),
    });
    let gateway = context.new_actor("gateway", gateway_object.clone()).unwrap();

    for expected in 1..=50u64 {
        let token = gateway.ask::<u64>(request_token()).unwrap();
        assert_eq!(token, expected);
    }

    assert_eq!(*gateway_object.tokens.lock(), (1..=50).collect::<Vec<_>>());
    assert!(context.stop());
}

struct Door {
    open: Arc<AtomicBool>,
}

impl ActorBehavior for Door {}

struct Porter;

impl ActorBehavior for Porter {}

#[test]
fn test_awaiting_actor_keeps_processing() {
    let context = test_context();
    let open = Arc::new(AtomicBool::new(false));
    let door = context
        .new_actor("door", Arc::new(Door { open: open.clone() }))
        .unwrap();
    let porter = context.new_actor("porter", Arc::new(Porter)).unwrap();

    // The porter only finishes once the door actor has handled a later message
    let porter_ref = porter.reference().clone();
    let watched = open.clone();
    let waiting = door.tell(Message::call(move |frame| {
        let opened = frame
            .await_on(
                &porter_ref,
                Message::call(move |_| {
                    Ok(eventually(Duration::from_secs(5), || {
                        watched.load(Ordering::SeqCst)
                    }))
                }),
            )
            .get_as::<bool>()?;
        Ok(opened)
    }));

    let opener = door.tell(Message::run(|frame| {
        let door = frame
            .this::<Door>()
            .ok_or_else(|| anyhow::anyhow!("door missing"))?;
        door.open.store(true, Ordering::SeqCst);
        Ok(())
    }));

    opener.get().unwrap();
    assert!(waiting.get_as::<bool>().unwrap());
    context.stop();
}

struct Guard {
    released: AtomicBool,
}

impl ActorBehavior for Guard {}

#[test]
fn test_await_until_released_by_later_message() {
    let context = test_context();
    let guard_object = Arc::new(Guard {
        released: AtomicBool::new(false),
    });
    let guard = context.new_actor("guard", guard_object.clone()).unwrap();

    let watched = guard_object.clone();
    let waiting = guard.tell(Message::call(move |frame| {
        let watched = watched.clone();
        let passed = frame
            .await_until(frame.receiver(), move || watched.released.load(Ordering::SeqCst))
            .get_as::<bool>()?;
        Ok(passed)
    }));

    guard
        .tell(Message::run(|frame| {
            let guard = frame
                .this::<Guard>()
                .ok_or_else(|| anyhow::anyhow!("guard missing"))?;
            guard.released.store(true, Ordering::SeqCst);
            Ok(())
        }))
        .get()
        .unwrap();

    assert!(waiting.get_as::<bool>().unwrap());
    context.stop();
}

#[test]
fn test_await_until_from_outside() {
    let context = test_context();
    let guard_object = Arc::new(Guard {
        released: AtomicBool::new(false),
    });
    let guard = context.new_actor("guard", guard_object.clone()).unwrap();

    let flipper = guard_object.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        flipper.released.store(true, Ordering::SeqCst);
    });

    let watched = guard_object.clone();
    let response = context.await_until(guard.reference(), move || {
        watched.released.load(Ordering::SeqCst)
    });
    assert!(response.get_as::<bool>().unwrap());

    handle.join().unwrap();
    context.stop();
}

#[test]
fn test_await_until_survives_many_polls() {
    let context = test_context();
    let guard = context
        .new_actor(
            "guard",
            Arc::new(Guard {
                released: AtomicBool::new(false),
            }),
        )
        .unwrap();

    let polls = Arc::new(AtomicUsize::new(0));
    let counted = polls.clone();
    let response = context.await_until(guard.reference(), move || {
        counted.fetch_add(1, Ordering::SeqCst) + 1 >= 100_000
    });

    assert!(response.get_timeout(Duration::from_secs(120)).is_ok());
    assert!(response.get_as::<bool>().unwrap());
    assert_eq!(polls.load(Ordering::SeqCst), 100_000);

    // The actor is still usable once the condition held
    assert_eq!(guard.ask::<u8>(Message::call(|_| Ok(3u8))).unwrap(), 3);
    context.stop();
}

#[test]
fn test_mutual_await_through_frames() {
    let context = test_context();
    let a = context.new_actor("a", Arc::new(Porter)).unwrap();
    let b = context.new_actor("b", Arc::new(Porter)).unwrap();

    let (a_ref, b_ref) = (a.reference().clone(), b.reference().clone());
    let response = a.tell(Message::call(move |frame| {
        let value = frame
            .await_on(
                &b_ref,
                Message::call(move |frame| {
                    let inner = frame
                        .await_on(&a_ref, Message::call(|_| Ok(7u8)))
                        .get_as::<u8>()?;
                    Ok(inner)
                }),
            )
            .get_as::<u8>()?;
        Ok(value)
    }));

    assert!(response.get_timeout(Duration::from_secs(5)).is_ok());
    assert_eq!(response.get_as::<u8>().unwrap(), 7);
    context.stop();
}

#[test]
fn test_mutual_await_through_actor_refs() {
    let context = test_context();
    let a = context.new_actor("a", Arc::new(Porter)).unwrap();
    let b = context.new_actor("b", Arc::new(Porter)).unwrap();

    let (a_ref, b_ref) = (a.reference().clone(), b.reference().clone());
    let response = a.tell(Message::call(move |frame| {
        let value = frame
            .actor()
            .await_on(
                &b_ref,
                Message::call(move |frame| {
                    let inner = frame
                        .actor()
                        .await_on(&a_ref, Message::call(|_| Ok(7u8)))
                        .get_as::<u8>()?;
                    Ok(inner)
                }),
            )
            .get_as::<u8>()?;
        Ok(value)
    }));

    assert!(response.get_timeout(Duration::from_secs(5)).is_ok());
    assert_eq!(response.get_as::<u8>().unwrap(), 7);

    // Condition awaits through the handle release the slot as well
    let b_ref = b.reference().clone();
    let flag = Arc::new(AtomicBool::new(false));
    let watched = flag.clone();
    let waiting = a.tell(Message::call(move |frame| {
        let watched = watched.clone();
        let passed = frame
            .actor()
            .await_until(&b_ref, move || watched.load(Ordering::SeqCst))
            .get_as::<bool>()?;
        Ok(passed)
    }));
    let setter = flag.clone();
    a.tell(Message::run(move |_| {
        setter.store(true, Ordering::SeqCst);
        Ok(())
    }))
    .get_timeout(Duration::from_secs(5))
    .unwrap();
    assert!(waiting.get_as::<bool>().unwrap());
    context.stop();
}

#[test]
fn test_await_deadline_expires() {
    let context = test_context();
    let slow = context.new_actor("slow", Arc::new(Porter)).unwrap();

    let response = context.await_within(
        slow.reference(),
        Message::call(|_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(1u8)
        }),
        Duration::from_millis(20),
    );

    assert!(response.error().unwrap().is_timeout());
    // The late result does not replace the timeout
    std::thread::sleep(Duration::from_millis(400));
    assert!(response.error().unwrap().is_timeout());
    context.stop();
}

#[test]
fn test_handler_failures_reach_the_awaiting_actor() {
    let context = test_context();
    let failing = context.new_actor("failing", Arc::new(Porter)).unwrap();
    let caller = context.new_actor("caller", Arc::new(Porter)).unwrap();

    let failing_ref = failing.reference().clone();
    let outcome = caller.ask::<String>(Message::call(move |frame| {
        let error = frame
            .await_on(
                &failing_ref,
                Message::run(|_| {
                    Err(anyhow::anyhow!("ledger offline").context("posting entry"))
                }),
            )
            .get()
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected a failure"))?;
        Ok(error.to_string())
    }));

    assert_eq!(outcome.unwrap(), "Handler failed: ledger offline");
    context.stop();
}

#[test]
fn test_panicking_handler_fails_response() {
    let context = test_context();
    let actor = context.new_actor("fragile", Arc::new(Porter)).unwrap();

    let response = actor.tell(Message::run(|_| panic!("snapped")));
    assert!(matches!(response.get(), Err(ActorError::Panicked { ref message }) if message == "snapped"));

    // The actor keeps working afterwards
    assert_eq!(actor.ask::<u8>(Message::call(|_| Ok(9u8))).unwrap(), 9);
    context.stop();
}

#[test]
fn test_await_on_unknown_actor_fails_fast() {
    let context = test_context();
    let caller = context.new_actor("caller", Arc::new(Porter)).unwrap();

    let failed = caller.ask::<bool>(Message::call(|frame| {
        let ghost = Reference::parse("actor://ghost");
        let response = frame.await_on(&ghost, Message::run(|_| Ok(())));
        Ok(matches!(response.get(), Err(ActorError::UnknownActor { .. })))
    }));

    assert!(failed.unwrap());
    context.stop();
}
