//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::{
    config::Config,
    core::handler::SendLinkHandler,
    link::TargetDescriptor,
    testing::{MockLink, RecordingSender},
};
use std::sync::{Arc, Once};

pub const TEST_SENDER_NAME: &str = "test-sender";
pub const TEST_LINK_NAME: &str = "test-link";

pub type TestHandler = SendLinkHandler<MockLink, RecordingSender>;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "amqp_send_link=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A handler attached to a fresh sender link, plus the link handle and the
/// recording sender so tests can drive the engine side and inspect callbacks.
pub struct TestHarness {
    pub handler: Arc<TestHandler>,
    pub link: MockLink,
    pub sender: Arc<RecordingSender>,
}

impl TestHarness {
    pub fn new() -> Self {
        init_tracing();
        let link = MockLink::sender(TEST_LINK_NAME)
            .with_local_target(TargetDescriptor::new("test-entity"));
        let sender = Arc::new(RecordingSender::new());
        let handler = SendLinkHandler::attach(
            link.clone(),
            Arc::clone(&sender),
            Config::for_sender(TEST_SENDER_NAME),
        )
        .expect("sender link must attach");

        Self {
            handler: Arc::new(handler),
            link,
            sender,
        }
    }

    pub fn target() -> TargetDescriptor {
        TargetDescriptor::new("test-entity")
    }

    /// Simulates the peer answering the open, with or without a target.
    pub fn remote_open(&self, with_target: bool) {
        let target = with_target.then(Self::target);
        self.link.set_remote_target(target.clone());
        self.handler.on_remote_open(target.as_ref());
    }

    /// Simulates a flow frame from the peer.
    pub fn flow(&self, credit: u32) {
        self.link.set_remote_credit(credit);
        self.handler.on_flow(credit);
    }
}
