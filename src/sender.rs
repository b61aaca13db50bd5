//! 处理器向上层消息发送者通知的接口。
//! The interface the handler notifies on the higher-level message sender.

use crate::{
    error::Error,
    link::{DeliveryState, DeliveryTag, EngineDelivery},
};

/// An owned snapshot of a delivery, taken right before it is settled.
///
/// 投递的自有快照，在结算之前立即获取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Correlates the outcome with the application-level send.
    /// 将结果与应用层发送操作关联。
    pub tag: DeliveryTag,
    /// The disposition reported by the peer.
    /// 对端报告的处置状态。
    pub state: DeliveryState,
    /// Whether the transport still held the delivery when it was reported.
    /// 报告时传输层是否仍持有该投递。
    pub buffered: bool,
}

impl DeliveryOutcome {
    pub fn snapshot<D: EngineDelivery>(delivery: &D) -> Self {
        Self {
            tag: delivery.tag(),
            state: delivery.remote_state(),
            buffered: delivery.is_buffered(),
        }
    }
}

/// The callbacks a send-link handler invokes on its message sender.
///
/// The handler only reports protocol facts. Retry and failure policy belong
/// to the implementor.
///
/// 发送链路处理器在其消息发送者上调用的回调。
///
/// 处理器只报告协议层面的事实，重试与失败策略由实现者决定。
pub trait AmqpSender: Send + Sync {
    /// Called at most once per link, when the link becomes usable.
    /// 每条链路至多调用一次，在链路可用时调用。
    fn on_open_complete(&self, error: Option<Error>);

    /// Called once per settled delivery, whatever its outcome.
    /// 每个被结算的投递调用一次，无论其结果如何。
    fn on_send_complete(&self, outcome: DeliveryOutcome);

    /// Called once per flow event with the peer's current credit.
    /// 每个流控事件调用一次，携带对端当前的信用额度。
    fn on_flow(&self, remote_credit: u32);
}

impl<T: AmqpSender + ?Sized> AmqpSender for std::sync::Arc<T> {
    fn on_open_complete(&self, error: Option<Error>) {
        (**self).on_open_complete(error)
    }

    fn on_send_complete(&self, outcome: DeliveryOutcome) {
        (**self).on_send_complete(outcome)
    }

    fn on_flow(&self, remote_credit: u32) {
        (**self).on_flow(remote_credit)
    }
}
