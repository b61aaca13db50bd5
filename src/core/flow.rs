//! 信用流控跟踪器 - 将对端授予的信用额度转发给发送者
//! Credit Flow Tracker - Forwards peer-granted credit to the sender
//!
//! 每个流控事件恰好产生一次转发，值为该时刻观察到的信用额度。没有重试、
//! 没有缓冲，后一个事件直接覆盖前一个值。
//!
//! Each flow event yields exactly one forwarded notification with the credit
//! observed at that instant. No retries, no buffering: the next event simply
//! replaces the previous value.

use crate::sender::AmqpSender;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// 尚未观察到流控事件；任何 `u32` 信用额度都不会等于该值
/// No flow observed yet; no `u32` credit can ever equal this value
const NO_CREDIT: u64 = u64::MAX;

/// 信用流控跟踪器
/// Credit flow tracker
#[derive(Debug)]
pub struct CreditFlowTracker {
    /// 最后转发的信用额度，未观察到时为 `NO_CREDIT`
    /// Last forwarded credit, `NO_CREDIT` until one is observed
    last_credit: AtomicU64,
    /// 已处理的流控事件数量
    /// Number of flow events processed
    flow_events: AtomicU64,
}

impl Default for CreditFlowTracker {
    fn default() -> Self {
        Self {
            last_credit: AtomicU64::new(NO_CREDIT),
            flow_events: AtomicU64::new(0),
        }
    }
}

impl CreditFlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件转发本次流控事件的信用额度
    /// Unconditionally forward the credit carried by this flow event
    pub fn on_flow<S: AmqpSender + ?Sized>(&self, remote_credit: u32, sender: &S) {
        self.last_credit
            .store(u64::from(remote_credit), Ordering::Release);
        let events = self.flow_events.fetch_add(1, Ordering::AcqRel) + 1;

        trace!(remote_credit, events, "Forwarding flow credit");
        sender.on_flow(remote_credit);
    }

    /// 最后转发的信用额度，尚无流控事件时为 `None`
    /// Last forwarded credit, `None` before any flow event
    pub fn last_remote_credit(&self) -> Option<u32> {
        match self.last_credit.load(Ordering::Acquire) {
            NO_CREDIT => None,
            credit => u32::try_from(credit).ok(),
        }
    }

    pub fn flow_events(&self) -> u64 {
        self.flow_events.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSender, SenderCall};

    #[test]
    fn test_forwards_exact_credit() {
        let tracker = CreditFlowTracker::new();
        let sender = RecordingSender::new();

        assert_eq!(tracker.last_remote_credit(), None);

        tracker.on_flow(100, &sender);
        tracker.on_flow(3, &sender);
        tracker.on_flow(0, &sender);

        assert_eq!(
            sender.calls(),
            vec![SenderCall::Flow(100), SenderCall::Flow(3), SenderCall::Flow(0)]
        );
        assert_eq!(tracker.last_remote_credit(), Some(0));
        assert_eq!(tracker.flow_events(), 3);
    }

    #[test]
    fn test_repeated_value_is_forwarded_each_time() {
        let tracker = CreditFlowTracker::new();
        let sender = RecordingSender::new();

        tracker.on_flow(7, &sender);
        tracker.on_flow(7, &sender);

        assert_eq!(sender.calls(), vec![SenderCall::Flow(7), SenderCall::Flow(7)]);
    }

    #[test]
    fn test_max_credit_is_not_mistaken_for_unset() {
        let tracker = CreditFlowTracker::new();
        let sender = RecordingSender::new();

        tracker.on_flow(u32::MAX, &sender);
        assert_eq!(tracker.last_remote_credit(), Some(u32::MAX));

        tracker.on_flow(0, &sender);
        assert_eq!(tracker.last_remote_credit(), Some(0));
    }
}
