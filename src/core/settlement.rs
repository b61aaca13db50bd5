//! 投递结算循环 - 逐个报告并结算链路上已就绪的投递
//! Delivery Settlement Loop - Reports and settles every ready delivery on a link
//!
//! 从事件携带的投递开始，每一步都向引擎重新拉取"下一个就绪投递"，而不是
//! 预先缓存整条链。引擎是"是否仍未结算"的唯一事实来源；处理器不做二次去重，
//! 只在引擎交回一个已结算的投递时终止循环。
//!
//! Starting from the delivery carried by the event, every step pulls the next
//! ready delivery from the engine instead of caching the chain up front. The
//! engine is the source of truth for "still unsettled"; the handler performs
//! no secondary deduplication and only stops when the engine hands back a
//! delivery that is already settled.

use crate::{
    link::{EngineDelivery, EngineLink},
    sender::{AmqpSender, DeliveryOutcome},
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// 按引擎顺序惰性产出就绪投递的序列
/// Lazily yields ready deliveries in engine order
///
/// 第一次产出事件的起始投递，之后每次都调用 `EngineLink::current`。调用者必须在
/// 请求下一项之前结算当前项。
///
/// The first step yields the event's starting delivery, every later step calls
/// `EngineLink::current`. Callers must settle the current item before asking
/// for the next one.
pub struct ReadyDeliveries<'a, L: EngineLink> {
    link: &'a L,
    first: Option<L::Delivery>,
}

impl<'a, L: EngineLink> ReadyDeliveries<'a, L> {
    pub fn new(link: &'a L, first: L::Delivery) -> Self {
        Self {
            link,
            first: Some(first),
        }
    }
}

impl<L: EngineLink> Iterator for ReadyDeliveries<'_, L> {
    type Item = L::Delivery;

    fn next(&mut self) -> Option<Self::Item> {
        let delivery = match self.first.take() {
            Some(first) => first,
            None => self.link.current()?,
        };

        if delivery.is_settled() {
            warn!(
                link = %self.link.name(),
                tag = %delivery.tag(),
                "Engine exposed an already settled delivery, stopping settlement"
            );
            return None;
        }

        Some(delivery)
    }
}

/// 投递结算循环
/// Delivery settlement loop
#[derive(Debug)]
pub struct DeliverySettlementLoop {
    sender_name: String,
    settled: AtomicU64,
}

impl DeliverySettlementLoop {
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            settled: AtomicU64::new(0),
        }
    }

    /// 报告并结算从 `first` 开始的所有就绪投递，返回本次结算的数量
    /// Report and settle every ready delivery starting at `first`, returns how many were settled
    pub fn drain<L, S>(&self, link: &L, first: L::Delivery, sender: &S) -> usize
    where
        L: EngineLink,
        S: AmqpSender + ?Sized,
    {
        let mut count = 0;
        for delivery in ReadyDeliveries::new(link, first) {
            let outcome = DeliveryOutcome::snapshot(&delivery);
            trace!(
                sender = %self.sender_name,
                link = %link.name(),
                unsettled = link.unsettled(),
                credit = link.remote_credit(),
                delivery_state = ?outcome.state,
                buffered = outcome.buffered,
                tag = %outcome.tag,
                "onDelivery"
            );
            if !outcome.state.is_terminal() {
                // 引擎报告就绪但对端尚未给出结果，仍然按原样转发并结算
                // Ready without a remote outcome; still relayed and settled as is
                debug!(
                    sender = %self.sender_name,
                    link = %link.name(),
                    tag = %outcome.tag,
                    "Settling delivery without a terminal remote state"
                );
            }

            sender.on_send_complete(outcome);
            delivery.settle();
            count += 1;
        }

        self.settled.fetch_add(count as u64, Ordering::AcqRel);
        count
    }

    /// 累计结算的投递数量
    /// Total number of deliveries settled
    pub fn settled_deliveries(&self) -> u64 {
        self.settled.load(Ordering::Acquire)
    }
}
