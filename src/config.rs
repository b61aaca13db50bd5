//! 定义了发送链路处理器的可配置参数。
//! Defines configurable parameters for the send-link handler.

/// A structure containing all configurable parameters for a send-link handler.
///
/// 包含发送链路处理器所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct Config {
    /// The name of the owning message sender. Only used in diagnostics.
    /// 所属消息发送者的名称。仅用于诊断。
    pub sender_name: String,

    /// The capacity of the event channel created by `LinkEventPump::spawn`.
    /// Engine callbacks wait for room when the pump falls behind.
    ///
    /// `LinkEventPump::spawn` 创建的事件通道容量。
    /// 当事件泵处理不及时，引擎回调会等待通道空出位置。
    pub event_channel_capacity: usize,
}

impl Config {
    /// Creates a configuration for the named sender with default values elsewhere.
    /// 为指定名称的发送者创建配置，其余参数使用默认值。
    pub fn for_sender(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sender_name: "sender".to_string(),
            event_channel_capacity: 128,
        }
    }
}
