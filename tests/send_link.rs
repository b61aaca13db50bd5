//! Public-API tests for the send-link handler and the handler registry.

pub mod common;

use amqp_send_link::{
    AmqpSender, DeliveryOutcome, DeliveryState, EngineDelivery, EngineLink, Error, LinkEvent,
    LinkHandlerRegistry, OpenState, SendLinkHandler,
    testing::{MockLink, RecordingSender, SenderCall},
};
use common::harness::{TestHarness, init_tracing};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

#[test]
fn test_full_link_scenario() {
    let TestHarness {
        link,
        sender,
        handler,
    } = TestHarness::new();

    handler.on_local_open();
    link.set_remote_target(Some(TestHarness::target()));
    handler.on_remote_open(link.remote_target().as_ref());
    link.set_remote_credit(50);
    handler.on_flow(link.remote_credit());

    let d1 = link.deliver("d1", DeliveryState::Accepted);
    let d2 = link.deliver("d2", DeliveryState::Accepted);
    handler.on_delivery(d1.clone());

    link.set_remote_credit(49);
    handler.on_flow(link.remote_credit());

    let calls = sender.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[0], SenderCall::OpenComplete { error: None });
    assert_eq!(calls[1], SenderCall::Flow(50));
    assert!(matches!(&calls[2], SenderCall::SendComplete(o) if o.tag == "d1".into()));
    assert!(matches!(&calls[3], SenderCall::SendComplete(o) if o.tag == "d2".into()));
    assert_eq!(calls[4], SenderCall::Flow(49));
    assert!(d1.is_settled() && d2.is_settled());
}

#[test]
fn test_receiver_link_is_rejected_at_attach() {
    init_tracing();
    let result = SendLinkHandler::attach(
        MockLink::receiver("inbound"),
        Arc::new(RecordingSender::new()),
        Default::default(),
    );
    let err = result.err().map(|e| e.to_string());
    assert_eq!(
        err.as_deref(),
        Some("link 'inbound' has role Receiver, expected a sender link")
    );
}

/// A sender that tracks outstanding sends by tag, the way a message sender
/// correlates settlements with pending work.
#[derive(Default)]
struct TrackingSender {
    opened: AtomicUsize,
    outstanding: Mutex<Vec<String>>,
    failed: Mutex<Vec<String>>,
    credit: Mutex<Option<u32>>,
}

impl AmqpSender for TrackingSender {
    fn on_open_complete(&self, error: Option<Error>) {
        assert!(error.is_none());
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn on_send_complete(&self, outcome: DeliveryOutcome) {
        let tag = outcome.tag.to_string();
        self.outstanding.lock().unwrap().retain(|t| *t != tag);
        if !outcome.state.is_success() {
            self.failed.lock().unwrap().push(tag);
        }
    }

    fn on_flow(&self, remote_credit: u32) {
        *self.credit.lock().unwrap() = Some(remote_credit);
    }
}

#[test]
fn test_custom_sender_correlates_outcomes() {
    init_tracing();
    let link = MockLink::sender("tracked");
    let sender = Arc::new(TrackingSender::default());
    let handler = SendLinkHandler::attach(link.clone(), Arc::clone(&sender), Default::default())
        .unwrap();

    handler.on_flow(3);

    let tags = ["a", "b", "c"];
    sender
        .outstanding
        .lock()
        .unwrap()
        .extend(tags.iter().map(|t| t.to_string()));
    let a = link.issue("a");
    let b = link.issue("b");
    let c = link.issue("c");
    link.ready(&a, DeliveryState::Accepted);
    link.ready(&b, DeliveryState::Rejected { condition: Some("amqp:resource-limit-exceeded".into()) });
    link.ready(&c, DeliveryState::Released);

    assert_eq!(handler.on_delivery(a), 3);

    assert_eq!(sender.opened.load(Ordering::SeqCst), 1);
    assert!(sender.outstanding.lock().unwrap().is_empty());
    assert_eq!(*sender.failed.lock().unwrap(), vec!["b".to_string(), "c".to_string()]);
    assert_eq!(*sender.credit.lock().unwrap(), Some(3));
    assert_eq!(link.unsettled(), 0);
    assert_eq!(c.settle_count(), 1);
}

#[test]
fn test_registry_routes_events_per_link() {
    let registry = LinkHandlerRegistry::new();
    let first = TestHarness::new();
    let second = TestHarness::new();

    registry.register(Arc::clone(&first.handler)).unwrap();
    registry.register(Arc::clone(&second.handler)).unwrap();

    let first_name = first.link.name().to_string();
    let second_name = second.link.name().to_string();

    registry
        .dispatch(&first_name, LinkEvent::RemoteOpen { remote_target: None })
        .unwrap();
    registry
        .dispatch(&second_name, LinkEvent::RemoteOpen { remote_target: Some(TestHarness::target()) })
        .unwrap();
    registry
        .dispatch(&first_name, LinkEvent::Flow { remote_credit: 8 })
        .unwrap();

    let delivery = second.link.deliver("x", DeliveryState::Accepted);
    registry
        .dispatch(&second_name, LinkEvent::Delivery { first: delivery.clone() })
        .unwrap();

    assert_eq!(first.sender.calls(), vec![
        SenderCall::OpenComplete { error: None },
        SenderCall::Flow(8),
    ]);
    assert_eq!(second.sender.open_complete_count(), 1);
    assert_eq!(second.sender.send_completions().len(), 1);
    assert!(delivery.is_settled());

    assert_eq!(first.handler.open_state(), OpenState::Completed);
    assert!(matches!(
        registry.dispatch("unknown", LinkEvent::LocalOpen),
        Err(Error::UnknownLink(_))
    ));
}
