//! 协议引擎侧的链路与投递抽象。
//! Engine-facing abstractions for links and deliveries.
//!
//! 协议引擎（帧编解码、会话管理）是外部协作者。本模块只描述处理器需要从
//! 引擎读取的内容，任何引擎（包括 `testing` 中的内存引擎）都可以实现这些特征。
//!
//! The protocol engine (frame codec, session management) is an external
//! collaborator. This module only describes what the handler reads from the
//! engine, so any engine, including the in-memory one in `testing`, can drive it.

use bytes::Bytes;
use std::fmt;

/// The direction of a link.
/// 链路的方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRole {
    /// Transfers flow from the local endpoint to the peer.
    /// 消息从本地端点流向对端。
    Sender,
    /// Transfers flow from the peer to the local endpoint.
    /// 消息从对端流向本地端点。
    Receiver,
}

/// The peer-side address negotiated while a link opens.
///
/// 链路打开期间协商的对端地址描述。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetDescriptor {
    /// The node address, e.g. an entity path.
    /// 节点地址，例如实体路径。
    pub address: String,
    /// Whether the terminus survives link detach.
    /// 终端在链路分离后是否保留。
    pub durable: bool,
    /// Whether the peer created the node on demand.
    /// 对端是否按需创建了该节点。
    pub dynamic: bool,
}

impl TargetDescriptor {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Target{{address='{}', durable={}, dynamic={}}}",
            self.address, self.durable, self.dynamic
        )
    }
}

/// Opaque tag correlating a delivery with the application-level send.
///
/// 将投递与应用层发送操作关联起来的不透明标签。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag(Bytes);

impl DeliveryTag {
    pub fn new(tag: impl Into<Bytes>) -> Self {
        Self(tag.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&'static str> for DeliveryTag {
    fn from(tag: &'static str) -> Self {
        Self(Bytes::from_static(tag.as_bytes()))
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// The remote disposition of a delivery.
///
/// 投递的远端处置状态。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeliveryState {
    /// The peer has not reported an outcome yet.
    /// 对端尚未报告结果。
    #[default]
    Pending,
    /// The peer accepted the message.
    /// 对端接受了消息。
    Accepted,
    /// The peer rejected the message, optionally with an error condition.
    /// 对端拒绝了消息，可能附带错误条件。
    Rejected { condition: Option<String> },
    /// The peer released the message without processing it.
    /// 对端未处理就释放了消息。
    Released,
    /// The peer modified the delivery annotations and gave it back.
    /// 对端修改了投递注解并将其退回。
    Modified {
        delivery_failed: bool,
        undeliverable_here: bool,
    },
}

impl DeliveryState {
    /// Whether the peer has reported an outcome.
    /// 对端是否已经报告结果。
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryState::Accepted)
    }
}

/// A delivery as tracked by the protocol engine.
///
/// Implementations are cheap handles onto engine state; cloning never copies
/// the delivery itself. `settle` is terminal and one-way.
///
/// 协议引擎跟踪的一次投递。
///
/// 实现是指向引擎状态的廉价句柄，克隆不会复制投递本身。`settle` 是单向的终止操作。
pub trait EngineDelivery: Clone + Send + Sync {
    fn tag(&self) -> DeliveryTag;

    fn remote_state(&self) -> DeliveryState;

    /// True while the transport layer still holds the delivery's bytes.
    /// 传输层仍持有该投递的字节时为真。
    fn is_buffered(&self) -> bool;

    fn is_settled(&self) -> bool;

    /// Releases the delivery from the engine's unsettled set.
    /// 将投递从引擎的未结算集合中释放。
    fn settle(&self);
}

/// A link as tracked by the protocol engine.
///
/// 协议引擎跟踪的一条链路。
pub trait EngineLink: Send + Sync {
    /// The engine's delivery handle type.
    /// 引擎的投递句柄类型。
    type Delivery: EngineDelivery;

    fn name(&self) -> &str;

    fn role(&self) -> LinkRole;

    fn local_target(&self) -> Option<TargetDescriptor>;

    /// Absent until the peer answers the open.
    /// 在对端响应打开之前为空。
    fn remote_target(&self) -> Option<TargetDescriptor>;

    /// The credit most recently granted by the peer.
    /// 对端最近授予的信用额度。
    fn remote_credit(&self) -> u32;

    /// The locally available credit.
    /// 本地可用的信用额度。
    fn credit(&self) -> u32;

    /// The number of deliveries the engine still holds unsettled.
    /// 引擎仍未结算的投递数量。
    fn unsettled(&self) -> usize;

    /// The next delivery the engine considers ready, if any.
    ///
    /// 引擎认为已就绪的下一个投递（如果有）。
    fn current(&self) -> Option<Self::Delivery>;
}
