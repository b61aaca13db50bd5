#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the AMQP 1.0 send-link handler library.
//! AMQP 1.0 发送链路处理器库的根。

pub mod config;
pub mod error;
pub mod link;
pub mod registry;
pub mod sender;
pub mod testing;

pub mod core;

pub use crate::core::{
    dispatcher::{EventDispatcher, EventSource, LinkEvent, LinkEventPump, LinkEventSender},
    handler::{SendLinkHandler, SendLinkStats},
    lifecycle::{OpenState, OpenTrigger},
};
pub use config::Config;
pub use error::{Error, Result};
pub use link::{DeliveryState, DeliveryTag, EngineDelivery, EngineLink, LinkRole, TargetDescriptor};
pub use registry::LinkHandlerRegistry;
pub use sender::{AmqpSender, DeliveryOutcome};
