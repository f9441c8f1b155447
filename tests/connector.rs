// tests/connector.rs
//
// Routing, subscription lifetime and pending-retry behaviour of a single
// connector, driven through the in-memory session's injection hooks.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::json;
use session_link::{
    // ---
    ActivationState,
    Connector,
    Descriptor,
    Error,
    MemorySession,
    RawPayload,
    Result,
    SessionConfig,
    SessionDelegate,
    SubscriptionHandle,
    Transport,
    TransportBase,
};

use common::{eventually, init_logging, is_inactive, payload, recorder, within, Ping, Pong};

fn active_connector(id: &str) -> (Arc<MemorySession>, Arc<MemorySession>, Connector) {
    // ---
    let (session, peer) = MemorySession::pair(SessionConfig::new(id), SessionConfig::new("peer"));
    let connector = Connector::builder(session.clone()).build().unwrap();
    (session, peer, connector)
}

fn pending_connector(id: &str) -> (Arc<MemorySession>, Arc<MemorySession>, Connector) {
    // ---
    let (session, peer) = MemorySession::pair(
        SessionConfig::new(id).with_auto_activate(false),
        SessionConfig::new("peer"),
    );
    let connector = Connector::builder(session.clone()).build().unwrap();
    (session, peer, connector)
}

#[tokio::test]
async fn ping_is_delivered_and_pong_is_not() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("ping-pong");
    let (seen, callback) = recorder::<Ping>();
    let _handle = connector.subscribe(Descriptor::<Ping>::json(), callback);

    session.inject_message(payload(json!({ "__type": "ping", "count": 3 })));
    session.inject_message(payload(json!({ "__type": "pong", "count": 3 })));
    within(connector.flush_deliveries()).await;

    assert_eq!(*seen.lock().unwrap(), vec![Ping { count: 3 }]);
}

#[tokio::test]
async fn subscriptions_only_see_their_tag() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("isolation");
    let (pings, on_ping) = recorder::<Ping>();
    let (pongs, on_pong) = recorder::<Pong>();
    let _a = connector.subscribe(Descriptor::<Ping>::json(), on_ping);
    let _b = connector.subscribe(Descriptor::<Pong>::json(), on_pong);

    for count in 0..3 {
        session.inject_message(payload(json!({ "__type": "ping", "count": count })));
    }
    session.inject_message(payload(json!({ "__type": "pong", "count": 9 })));
    session.inject_message(payload(json!({ "__type": "other", "count": 1 })));
    within(connector.flush_deliveries()).await;

    let pings: Vec<i64> = pings.lock().unwrap().iter().map(|p| p.count).collect();
    assert_eq!(pings, vec![0, 1, 2]);
    assert_eq!(*pongs.lock().unwrap(), vec![Pong { count: 9 }]);
}

#[tokio::test]
async fn fan_out_reaches_every_subscriber_once_in_order() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("fan-out");
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<SubscriptionHandle> = ["first", "second"]
        .into_iter()
        .map(|label| {
            let order = order.clone();
            connector.subscribe(Descriptor::<Ping>::json(), move |ping: Ping| {
                order.lock().unwrap().push(format!("{label}:{}", ping.count));
            })
        })
        .collect();
    assert_eq!(connector.subscription_count(), 2);

    session.inject_message(payload(json!({ "__type": "ping", "count": 5 })));
    within(connector.flush_deliveries()).await;

    assert_eq!(*order.lock().unwrap(), vec!["first:5", "second:5"]);
    drop(handles);
    assert_eq!(connector.subscription_count(), 0);
}

#[tokio::test]
async fn explicit_unsubscribe_is_idempotent() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("unsubscribe");
    let (seen, callback) = recorder::<Ping>();
    let handle = connector.subscribe(Descriptor::<Ping>::json(), callback);
    assert!(handle.is_active());

    connector.unsubscribe(&handle);
    connector.unsubscribe(&handle);
    assert!(!handle.is_active());
    assert_eq!(connector.subscription_count(), 0);

    session.inject_message(payload(json!({ "__type": "ping", "count": 1 })));
    within(connector.flush_deliveries()).await;
    assert!(seen.lock().unwrap().is_empty());

    // the eventual drop is a no-op
    drop(handle);
    assert_eq!(connector.subscription_count(), 0);
}

#[tokio::test]
async fn dropped_handle_stops_delivery() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("drop");
    let (seen, callback) = recorder::<Ping>();

    let handle = connector.subscribe(Descriptor::<Ping>::json(), callback);
    session.inject_message(payload(json!({ "__type": "ping", "count": 1 })));
    within(connector.flush_deliveries()).await;

    drop(handle);
    session.inject_message(payload(json!({ "__type": "ping", "count": 2 })));
    within(connector.flush_deliveries()).await;

    assert_eq!(*seen.lock().unwrap(), vec![Ping { count: 1 }]);
}

#[tokio::test]
async fn handle_does_not_keep_connector_alive() {
    // ---
    init_logging();
    let (_session, _peer, connector) = active_connector("weak");
    let (_seen, callback) = recorder::<Ping>();
    let handle = connector.subscribe(Descriptor::<Ping>::json(), callback);

    drop(connector);
    assert!(!handle.is_active());
    drop(handle);
}

#[tokio::test]
async fn subscriber_can_unsubscribe_itself() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("one-shot");
    let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
    let (seen, record) = recorder::<Ping>();

    let own = slot.clone();
    let handle = connector.subscribe(Descriptor::<Ping>::json(), move |ping: Ping| {
        record(ping);
        let handle = own.lock().unwrap().take();
        drop(handle);
    });
    *slot.lock().unwrap() = Some(handle);

    session.inject_message(payload(json!({ "__type": "ping", "count": 1 })));
    within(connector.flush_deliveries()).await;
    session.inject_message(payload(json!({ "__type": "ping", "count": 2 })));
    within(connector.flush_deliveries()).await;

    assert_eq!(*seen.lock().unwrap(), vec![Ping { count: 1 }]);
    assert_eq!(connector.subscription_count(), 0);
}

#[tokio::test]
async fn malformed_payloads_are_dropped() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("malformed");
    let (seen, callback) = recorder::<Ping>();
    let _handle = connector.subscribe(Descriptor::<Ping>::json(), callback);

    session.inject_message(payload(json!({ "count": 1 })));
    session.inject_application_context(payload(json!({ "__type": 7, "count": 2 })));
    session.inject_user_info(payload(json!({ "__type": null })));
    // right tag, undecodable fields
    session.inject_message(payload(json!({ "__type": "ping", "count": "four" })));
    within(connector.flush_deliveries()).await;
    assert!(seen.lock().unwrap().is_empty());

    // still usable afterwards
    session.inject_message(payload(json!({ "__type": "ping", "count": 5 })));
    within(connector.flush_deliveries()).await;
    assert_eq!(*seen.lock().unwrap(), vec![Ping { count: 5 }]);
}

#[tokio::test]
async fn all_three_channels_share_one_dispatch() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("channels");
    let (seen, callback) = recorder::<Ping>();
    let _handle = connector.subscribe(Descriptor::<Ping>::json(), callback);

    session.inject_message(payload(json!({ "__type": "ping", "count": 1 })));
    session.inject_application_context(payload(json!({ "__type": "ping", "count": 2 })));
    session.inject_user_info(payload(json!({ "__type": "ping", "count": 3 })));
    within(connector.flush_deliveries()).await;

    let counts: Vec<i64> = seen.lock().unwrap().iter().map(|p| p.count).collect();
    assert_eq!(counts, vec![1, 2, 3]);
}

#[tokio::test]
async fn send_while_inactive_parks_and_retries_once() {
    // ---
    init_logging();
    let (session, _peer, connector) = pending_connector("retry");
    assert!(!connector.has_active_channel());

    let result = connector.send(Ping { count: 1 }, None);
    assert!(is_inactive(&result));
    assert!(connector.has_pending_message());
    assert!(session.sent_messages().is_empty());

    session.complete_activation(ActivationState::Activated);
    assert!(!connector.has_pending_message());
    assert!(eventually(|| session.sent_messages().len() == 1).await);
    assert_eq!(
        session.sent_messages()[0],
        payload(json!({ "__type": "ping", "count": 1 }))
    );

    // nothing parked: a second completion sends nothing
    session.complete_activation(ActivationState::Activated);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.sent_messages().len(), 1);
}

#[tokio::test]
async fn pending_slot_keeps_only_latest() {
    // ---
    init_logging();
    let (session, _peer, connector) = pending_connector("overwrite");

    assert!(is_inactive(&connector.send(Ping { count: 1 }, None)));
    assert!(is_inactive(&connector.send(Pong { count: 2 }, None)));

    session.complete_activation(ActivationState::Activated);
    assert!(eventually(|| !session.sent_messages().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sent = session.sent_messages();
    assert_eq!(sent, vec![payload(json!({ "__type": "pong", "count": 2 }))]);
}

#[tokio::test]
async fn failed_activation_parks_message_again() {
    // ---
    init_logging();
    let (session, _peer, connector) = pending_connector("failed-activation");
    assert!(is_inactive(&connector.send(Ping { count: 7 }, None)));

    session.fail_activation(Error::TransportSend("pairing refused".into()));
    assert!(connector.has_pending_message());
    assert!(session.sent_messages().is_empty());

    session.complete_activation(ActivationState::Activated);
    assert!(eventually(|| session.sent_messages().len() == 1).await);
    assert!(!connector.has_pending_message());
}

#[tokio::test]
async fn transport_failure_goes_to_error_handler() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("send-failure");
    session.fail_sends(true);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let result = connector.send(
        Ping { count: 1 },
        Some(Box::new(move |err| {
            let _ = tx.send(err);
        })),
    );
    assert!(result.is_ok());

    let err = within(rx).await.unwrap();
    assert!(matches!(err, Error::TransportSend(_)));
    assert!(!connector.has_pending_message());

    // connector stays usable
    session.fail_sends(false);
    connector.send(Ping { count: 2 }, None).unwrap();
    assert!(eventually(|| session.sent_messages().len() == 1).await);
}

#[tokio::test]
async fn context_failures_are_swallowed() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("context");

    session.fail_context_updates(true);
    connector.update_application_context(&Ping { count: 1 });
    assert!(session.application_context().is_none());

    session.fail_context_updates(false);
    connector.update_application_context(&Ping { count: 2 });
    assert_eq!(
        session.application_context(),
        Some(payload(json!({ "__type": "ping", "count": 2 })))
    );
}

#[tokio::test]
async fn user_info_requires_active_session() {
    // ---
    init_logging();
    let (_session, _peer, connector) = pending_connector("user-info");
    let result = connector.transfer_user_info(&Ping { count: 1 });
    assert!(is_inactive(&result));
    assert!(!connector.has_pending_message());
}

#[tokio::test]
async fn concurrent_inbound_is_serialized() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("concurrent");
    let (seen, callback) = recorder::<Ping>();
    let _handle = connector.subscribe(Descriptor::<Ping>::json(), callback);

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let session = session.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    session.inject_message(payload(json!({ "__type": "ping", "count": t * 100 + i })));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    within(connector.flush_deliveries()).await;

    let mut counts: Vec<i64> = seen.lock().unwrap().iter().map(|p| p.count).collect();
    assert_eq!(counts.len(), 100);
    counts.sort_unstable();
    counts.dedup();
    assert_eq!(counts.len(), 100);
}

#[tokio::test]
async fn dropping_handle_during_dispatch_stops_delivery() {
    // ---
    init_logging();
    let (session, _peer, connector) = active_connector("drop-race");
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let handle = connector.subscribe(Descriptor::<Ping>::json(), move |_ping: Ping| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let stop = Arc::new(AtomicBool::new(false));
    let injectors: Vec<_> = (0..3)
        .map(|t| {
            let session = session.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut i = 0;
                while !stop.load(Ordering::SeqCst) && i < 10_000 {
                    session.inject_message(payload(json!({ "__type": "ping", "count": t * 10_000 + i })));
                    i += 1;
                }
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(5)).await;
    drop(handle);
    stop.store(true, Ordering::SeqCst);
    for injector in injectors {
        injector.join().unwrap();
    }
    within(connector.flush_deliveries()).await;
    assert_eq!(connector.subscription_count(), 0);

    let settled = delivered.load(Ordering::SeqCst);
    for count in 0..10 {
        session.inject_message(payload(json!({ "__type": "ping", "count": count })));
    }
    within(connector.flush_deliveries()).await;
    assert_eq!(delivered.load(Ordering::SeqCst), settled);
}

/// Transport that finishes activation from inside the first readiness query,
/// as a platform stack completing on another thread mid-send would.
struct LateActivation {
    base: TransportBase,
    state: Mutex<ActivationState>,
    queried: AtomicBool,
    delegate: Mutex<Option<Weak<dyn SessionDelegate>>>,
    sent: Mutex<Vec<RawPayload>>,
}

impl LateActivation {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            base: TransportBase::from(&SessionConfig::new("late")),
            state: Mutex::new(ActivationState::NotActivated),
            queried: AtomicBool::new(false),
            delegate: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl Transport for LateActivation {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn activation_state(&self) -> ActivationState {
        // ---
        let observed = *self.state.lock().unwrap();
        if !self.queried.swap(true, Ordering::SeqCst) {
            *self.state.lock().unwrap() = ActivationState::Activated;
            let delegate = self.delegate.lock().unwrap().clone();
            if let Some(delegate) = delegate.and_then(|weak| weak.upgrade()) {
                delegate.activation_did_complete(ActivationState::Activated, None);
            }
        }
        observed
    }

    fn activate(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, payload: RawPayload) -> Result<()> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    fn update_application_context(&self, _payload: RawPayload) -> Result<()> {
        Ok(())
    }

    fn transfer_user_info(&self, _payload: RawPayload) -> Result<()> {
        Ok(())
    }

    fn set_delegate(&self, delegate: Weak<dyn SessionDelegate>) {
        *self.delegate.lock().unwrap() = Some(delegate);
    }
}

#[tokio::test]
async fn activation_during_send_does_not_strand_message() {
    // ---
    init_logging();
    let transport = LateActivation::new();
    let connector = Connector::builder(transport.clone())
        .activate_on_build(false)
        .build()
        .unwrap();

    let result = connector.send(Ping { count: 4 }, None);
    assert!(result.is_ok());
    assert!(connector.has_active_channel());
    assert!(!connector.has_pending_message());

    assert!(eventually(|| transport.sent.lock().unwrap().len() == 1).await);
    assert_eq!(
        transport.sent.lock().unwrap()[0],
        payload(json!({ "__type": "ping", "count": 4 }))
    );
}
