//! 发送链路处理器 - 把引擎事件转换为发送者只会收到一次的通知流
//! Send Link Handler - Turns engine events into an exactly-once notification stream for the sender
//!
//! 处理器组合了三个职责：
//! - `LinkLifecycleCoordinator`：解决打开竞争，只通知一次打开完成
//! - `CreditFlowTracker`：每个流控事件转发一次信用额度
//! - `DeliverySettlementLoop`：报告并结算每个就绪投递
//!
//! The handler composes three responsibilities:
//! - `LinkLifecycleCoordinator`: resolves the open race and notifies open-complete once
//! - `CreditFlowTracker`: forwards credit once per flow event
//! - `DeliverySettlementLoop`: reports and settles every ready delivery

use super::{
    flow::CreditFlowTracker,
    lifecycle::{LinkLifecycleCoordinator, OpenState, OpenTrigger},
    settlement::DeliverySettlementLoop,
};
use crate::{
    config::Config,
    error::{Error, Result},
    link::{EngineLink, LinkRole, TargetDescriptor},
    sender::AmqpSender,
};
use std::sync::Arc;
use tracing::debug;

/// 处理器诊断快照
/// Diagnostic snapshot of a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendLinkStats {
    pub open_state: OpenState,
    pub open_trigger: Option<OpenTrigger>,
    pub awaiting_error: bool,
    pub last_remote_credit: Option<u32>,
    pub flow_events: u64,
    pub settled_deliveries: u64,
}

/// 单条发送链路的事件处理器
/// Event handler for a single send link
///
/// 所有事件方法都接受 `&self`，同一个处理器可以通过 `Arc` 在多个执行上下文之间共享。
///
/// Every event method takes `&self`, so one handler can be shared across
/// execution contexts through an `Arc`.
#[derive(Debug)]
pub struct SendLinkHandler<L: EngineLink, S: AmqpSender> {
    link: L,
    sender: Arc<S>,
    config: Config,
    lifecycle: LinkLifecycleCoordinator,
    flow: CreditFlowTracker,
    settlement: DeliverySettlementLoop,
}

impl<L: EngineLink, S: AmqpSender> SendLinkHandler<L, S> {
    /// 将处理器绑定到一条发送链路
    /// Attach a handler to a send link
    ///
    /// 链路角色只在这里检查一次，之后的事件不再做运行时类型判断。
    ///
    /// The link role is checked here once; later events do no runtime role checks.
    pub fn attach(link: L, sender: Arc<S>, config: Config) -> Result<Self> {
        let role = link.role();
        if role != LinkRole::Sender {
            return Err(Error::NotSenderLink {
                link: link.name().to_string(),
                role,
            });
        }

        debug!(
            sender = %config.sender_name,
            link = %link.name(),
            "Send link handler attached"
        );

        Ok(Self {
            lifecycle: LinkLifecycleCoordinator::new(config.sender_name.clone(), link.name()),
            flow: CreditFlowTracker::new(),
            settlement: DeliverySettlementLoop::new(config.sender_name.clone()),
            link,
            sender,
            config,
        })
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_name(&self) -> &str {
        self.link.name()
    }

    pub fn sender_name(&self) -> &str {
        &self.config.sender_name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 本地端点已打开
    /// Local endpoint opened
    pub fn on_local_open(&self) {
        self.lifecycle.on_local_open(self.link.local_target().as_ref());
    }

    /// 对端响应了打开
    /// Peer responded to the open
    pub fn on_remote_open(&self, remote_target: Option<&TargetDescriptor>) {
        let sender = self.sender.as_ref();
        self.lifecycle
            .on_remote_open(remote_target, sender, |credit| self.flow.on_flow(credit, sender));
    }

    /// 对端更新了流控信用额度
    /// Peer updated flow-control credit
    ///
    /// 打开完成之后只剩一次原子读取；完成之前到达的信用先被暂存，由完成打开的上下文在通知之后按到达顺序转发。
    ///
    /// After the open has completed this costs one atomic load. Credit that
    /// arrives earlier is parked first and forwarded in arrival order by the
    /// completing context after the notification.
    pub fn on_flow(&self, remote_credit: u32) {
        let sender = self.sender.as_ref();

        // 打开完成检查必须先于信用转发
        // The open-completion check must run before the credit is forwarded
        if self.lifecycle.admit_flow(remote_credit) {
            self.flow.on_flow(remote_credit, sender);
        } else {
            self.lifecycle
                .on_first_flow(sender, |credit| self.flow.on_flow(credit, sender));
        }

        debug!(
            sender = %self.config.sender_name,
            link = %self.link.name(),
            unsettled = self.link.unsettled(),
            credit = self.link.credit(),
            remote_credit,
            "onLinkFlow"
        );
    }

    /// 一个或多个投递已就绪，返回本次结算的数量
    /// One or more deliveries are ready, returns how many were settled
    pub fn on_delivery(&self, first: L::Delivery) -> usize {
        self.settlement
            .drain(&self.link, first, self.sender.as_ref())
    }

    pub fn open_state(&self) -> OpenState {
        self.lifecycle.open_state()
    }

    pub fn stats(&self) -> SendLinkStats {
        SendLinkStats {
            open_state: self.lifecycle.open_state(),
            open_trigger: self.lifecycle.open_trigger(),
            awaiting_error: self.lifecycle.awaiting_error(),
            last_remote_credit: self.flow.last_remote_credit(),
            flow_events: self.flow.flow_events(),
            settled_deliveries: self.settlement.settled_deliveries(),
        }
    }
}
