//! Unit tests for routing and response correlation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::config::ConfigSnapshot;
use crate::error::HandlerError;
use crate::manifest::Manifest;
use crate::transport::test_utils::SharedBuffer;

const CONTINUE: &str = r#"{"result":"continue"}"#;

fn context_over(buffer: &SharedBuffer) -> PluginContext {
    PluginContext::new(
        Arc::new(Manifest::new(vec![], vec![], vec![], vec![], true)),
        Arc::new(ConfigSnapshot::default()),
        SharedWriter::new(buffer.clone()),
    )
}

fn continue_directive() -> Value {
    serde_json::from_str(CONTINUE).expect("directive")
}

fn decode_frames(buffer: &SharedBuffer) -> Vec<Value> {
    buffer
        .frames()
        .iter()
        .map(|frame| serde_json::from_slice(frame).expect("frame is json"))
        .collect()
}

struct Harness {
    buffer: SharedBuffer,
    context: PluginContext,
    sender: SharedWriter,
}

impl Harness {
    fn new() -> Self {
        let buffer = SharedBuffer::default();
        let context = context_over(&buffer);
        let sender = SharedWriter::new(buffer.clone());
        Self {
            buffer,
            context,
            sender,
        }
    }

    fn dispatch(&self, dispatcher: &mut Dispatcher, envelope: &Envelope) -> DispatchOutcome {
        dispatcher
            .dispatch(envelope, &self.context, &self.sender)
            .expect("dispatch failed")
    }
}

// ---------------------------------------------------------------------------
// Correlator
// ---------------------------------------------------------------------------

#[test]
fn correlator_sends_exactly_one_response() {
    let harness = Harness::new();
    let mut correlator = ResponseCorrelator::new();
    let id = RequestId::Number(7);

    correlator.begin(id.clone(), "htlc_accepted").expect("begin");
    correlator
        .complete(&id, &harness.sender, continue_directive())
        .expect("complete");

    assert!(correlator.is_idle());
    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], json!(7));
    assert_eq!(frames[0]["result"], continue_directive());
}

#[test]
fn second_completion_is_a_double_response() {
    let harness = Harness::new();
    let mut correlator = ResponseCorrelator::new();
    let id = RequestId::Number(7);

    correlator.begin(id.clone(), "htlc_accepted").expect("begin");
    correlator
        .complete(&id, &harness.sender, continue_directive())
        .expect("first completion");

    let result = correlator.complete(&id, &harness.sender, continue_directive());
    assert!(matches!(result, Err(PluginError::DoubleResponse { .. })));
    // Nothing extra reached the daemon.
    assert_eq!(decode_frames(&harness.buffer).len(), 1);
}

#[test]
fn reused_in_flight_id_is_rejected() {
    let mut correlator = ResponseCorrelator::new();
    let id = RequestId::from("cln:hook#1");

    correlator.begin(id.clone(), "htlc_accepted").expect("first");
    let result = correlator.begin(id, "htlc_accepted");
    assert!(matches!(result, Err(PluginError::MalformedEnvelope { .. })));
}

#[test]
fn responses_correlate_by_id_not_order() {
    let harness = Harness::new();
    let mut correlator = ResponseCorrelator::new();
    let first = RequestId::Number(1);
    let second = RequestId::Number(2);

    correlator.begin(first.clone(), "htlc_accepted").expect("begin 1");
    correlator.begin(second.clone(), "htlc_accepted").expect("begin 2");
    correlator
        .complete(&second, &harness.sender, json!({"result": "continue"}))
        .expect("complete 2");
    correlator
        .complete(&first, &harness.sender, json!({"result": "fail"}))
        .expect("complete 1");

    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames[0]["id"], json!(2));
    assert_eq!(frames[1]["id"], json!(1));
}

// ---------------------------------------------------------------------------
// Hook dispatch
// ---------------------------------------------------------------------------

fn hook_dispatcher(handler: crate::registry::HookHandler) -> Dispatcher {
    let mut registry = HandlerRegistry::new();
    registry
        .register_hook("htlc_accepted", handler)
        .expect("register hook");
    Dispatcher::new(registry, continue_directive())
}

#[rstest]
fn hook_reply_carries_handler_directive() {
    let harness = Harness::new();
    let mut dispatcher = hook_dispatcher(Box::new(|_ctx, _params| {
        Ok(json!({"result": "resolve", "payment_key": "00"}))
    }));
    let call = Envelope::request(RequestId::Number(5), "htlc_accepted", Some(json!({})));

    let outcome = harness.dispatch(&mut dispatcher, &call);

    assert_eq!(outcome, DispatchOutcome::Continue);
    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["result"]["result"], json!("resolve"));
}

#[rstest]
fn failing_hook_gets_exactly_one_safe_default_reply() {
    let harness = Harness::new();
    let mut dispatcher =
        hook_dispatcher(Box::new(|_ctx, _params| Err(HandlerError::new("boom"))));
    let call = Envelope::request(RequestId::Number(9), "htlc_accepted", Some(json!({})));

    harness.dispatch(&mut dispatcher, &call);

    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames.len(), 1, "exactly one reply even on failure");
    assert_eq!(frames[0]["id"], json!(9));
    assert_eq!(frames[0]["result"], continue_directive());
    assert_eq!(frames[0].get("error"), None);
}

#[rstest]
fn hook_reply_is_sent_despite_handler_logging() {
    let harness = Harness::new();
    let mut dispatcher = hook_dispatcher(Box::new(|ctx, _params| {
        ctx.log(crate::context::LogLevel::Info, "htlc accepted!")?;
        Ok(json!({"result": "continue"}))
    }));
    let call = Envelope::request(RequestId::Number(3), "htlc_accepted", Some(json!({})));

    harness.dispatch(&mut dispatcher, &call);

    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames.len(), 2, "log notification plus one reply");
    assert_eq!(frames[0]["method"], json!("log"));
    assert_eq!(frames[1]["id"], json!(3));
    assert_eq!(frames[1]["result"], continue_directive());
}

// ---------------------------------------------------------------------------
// RPC dispatch
// ---------------------------------------------------------------------------

#[rstest]
fn rpc_failure_becomes_an_error_reply() {
    let harness = Harness::new();
    let mut registry = HandlerRegistry::new();
    registry
        .register_rpc(
            "watch-status",
            Box::new(|_ctx, _params| Err(HandlerError::new("state unavailable"))),
        )
        .expect("register rpc");
    let mut dispatcher = Dispatcher::new(registry, continue_directive());
    let call = Envelope::request(RequestId::Number(11), "watch-status", None);

    harness.dispatch(&mut dispatcher, &call);

    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["error"]["code"], json!(crate::envelope::INTERNAL_ERROR));
    assert_eq!(frames[0]["error"]["message"], json!("state unavailable"));
    assert_eq!(frames[0].get("result"), None);
}

#[rstest]
fn unknown_method_gets_method_not_found() {
    let harness = Harness::new();
    let mut dispatcher = Dispatcher::new(HandlerRegistry::new(), continue_directive());
    let call = Envelope::request(RequestId::Number(13), "bogus", None);

    harness.dispatch(&mut dispatcher, &call);

    let frames = decode_frames(&harness.buffer);
    assert_eq!(frames.len(), 1);
    assert_eq!(
        frames[0]["error"]["code"],
        json!(crate::envelope::METHOD_NOT_FOUND)
    );
}

// ---------------------------------------------------------------------------
// Notification dispatch
// ---------------------------------------------------------------------------

#[rstest]
fn notifications_produce_no_reply_even_when_handlers_fail() {
    let harness = Harness::new();
    let mut registry = HandlerRegistry::new();
    registry.subscribe(
        "channel_state_changed",
        Box::new(|_ctx, _params| Err(HandlerError::new("boom"))),
    );
    let mut dispatcher = Dispatcher::new(registry, continue_directive());
    let event = Envelope::notification("channel_state_changed", Some(json!({})));

    let outcome = harness.dispatch(&mut dispatcher, &event);

    assert_eq!(outcome, DispatchOutcome::Continue);
    assert!(harness.buffer.frames().is_empty(), "no reply for notifications");
}

#[rstest]
fn all_subscribers_fire_for_one_event() {
    let harness = Harness::new();
    let count = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    for _ in 0..2 {
        let count = Arc::clone(&count);
        registry.subscribe(
            "channel_state_changed",
            Box::new(move |_ctx, _params| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
    }
    let mut dispatcher = Dispatcher::new(registry, continue_directive());
    let event = Envelope::notification("channel_state_changed", Some(json!({})));

    harness.dispatch(&mut dispatcher, &event);

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[rstest]
fn unhandled_shutdown_notification_ends_the_loop() {
    let harness = Harness::new();
    let mut dispatcher = Dispatcher::new(HandlerRegistry::new(), continue_directive());
    let event = Envelope::notification("shutdown", None);

    let outcome = harness.dispatch(&mut dispatcher, &event);

    assert_eq!(outcome, DispatchOutcome::Shutdown);
    assert!(harness.buffer.frames().is_empty());
}

#[rstest]
fn subscribed_shutdown_runs_the_handler_then_ends_the_loop() {
    let harness = Harness::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    let fired_clone = Arc::clone(&fired);
    registry.subscribe(
        "shutdown",
        Box::new(move |_ctx, _params| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let mut dispatcher = Dispatcher::new(registry, continue_directive());

    let outcome = harness.dispatch(&mut dispatcher, &Envelope::notification("shutdown", None));

    assert_eq!(outcome, DispatchOutcome::Shutdown);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[rstest]
fn unexpected_response_frames_are_ignored() {
    let harness = Harness::new();
    let mut dispatcher = Dispatcher::new(HandlerRegistry::new(), continue_directive());
    let response = Envelope::response(RequestId::Number(40), json!({}));

    let outcome = harness.dispatch(&mut dispatcher, &response);

    assert_eq!(outcome, DispatchOutcome::Continue);
    assert!(harness.buffer.frames().is_empty());
}
