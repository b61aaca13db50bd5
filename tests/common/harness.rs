//! tests/common/harness.rs
use amqp_send_link::{
    Config, SendLinkHandler, TargetDescriptor,
    testing::{MockLink, RecordingSender},
};
use std::sync::{
    Arc, Once,
    atomic::{AtomicU32, Ordering},
};
use tracing_subscriber::fmt::format::FmtSpan;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "amqp_send_link=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_test_writer()
            .init();
    });
}

// Use a global counter to give every harness its own link name.
static NEXT_LINK_ID: AtomicU32 = AtomicU32::new(1);

pub type Handler = SendLinkHandler<MockLink, RecordingSender>;

/// A test harness that owns one sender link, its handler and the recording sender.
pub struct TestHarness {
    pub link: MockLink,
    pub sender: Arc<RecordingSender>,
    pub handler: Arc<Handler>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::for_sender("integration-sender"))
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let id = NEXT_LINK_ID.fetch_add(1, Ordering::SeqCst);
        let link = MockLink::sender(format!("link-{id}"))
            .with_local_target(TargetDescriptor::new("hub/partitions/0"));
        let sender = Arc::new(RecordingSender::new());
        let handler = SendLinkHandler::attach(link.clone(), Arc::clone(&sender), config).unwrap();

        Self {
            link,
            sender,
            handler: Arc::new(handler),
        }
    }

    pub fn target() -> TargetDescriptor {
        TargetDescriptor::new("hub/partitions/0")
    }
}
