//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use crate::link::LinkRole;
use thiserror::Error;

/// The primary error type for the send-link handler library.
/// 发送链路处理器库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// A handler was attached to a link that cannot send.
    /// 处理器被绑定到了一个不能发送的链路上。
    #[error("link '{link}' has role {role:?}, expected a sender link")]
    NotSenderLink { link: String, role: LinkRole },

    /// A handler for the same link name is already registered.
    /// 同名链路的处理器已经注册。
    #[error("a handler for link '{0}' is already registered")]
    DuplicateLink(String),

    /// No handler is registered for the named link.
    /// 指定名称的链路没有注册处理器。
    #[error("no handler registered for link '{0}'")]
    UnknownLink(String),

    /// The event channel feeding a link handler was closed.
    /// 向链路处理器投递事件的通道已关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,

    /// The link was detached by the transport before it finished opening.
    /// This core never produces it; the transport layer hands it to
    /// `AmqpSender::on_open_complete` when an open fails.
    ///
    /// 链路在打开完成前被传输层分离。
    /// 本核心从不产生该错误；由传输层在打开失败时传给 `AmqpSender::on_open_complete`。
    #[error("link detached: {}", .condition.as_deref().unwrap_or("no condition"))]
    LinkDetached { condition: Option<String> },
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
