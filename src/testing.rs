//! 内存协议引擎与记录型发送者，用于测试和演示
//! In-memory protocol engine and a recording sender, for tests and demos
//!
//! `MockLink` 和 `MockDelivery` 是共享内部状态的句柄，与真实引擎对象的语义一致：
//! 克隆句柄不会复制链路或投递。
//!
//! `MockLink` and `MockDelivery` are handles onto shared state, matching the
//! semantics of real engine objects: cloning a handle never copies the link or
//! the delivery.

use crate::{
    error::Error,
    link::{DeliveryState, DeliveryTag, EngineDelivery, EngineLink, LinkRole, TargetDescriptor},
    sender::{AmqpSender, DeliveryOutcome},
};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct DeliveryInner {
    tag: DeliveryTag,
    state: Mutex<DeliveryState>,
    buffered: AtomicBool,
    settled: AtomicBool,
    settle_count: AtomicU32,
}

/// A delivery owned by a `MockLink`.
/// 属于 `MockLink` 的投递。
#[derive(Debug, Clone)]
pub struct MockDelivery {
    inner: Arc<DeliveryInner>,
}

impl MockDelivery {
    fn new(tag: DeliveryTag) -> Self {
        Self {
            inner: Arc::new(DeliveryInner {
                tag,
                state: Mutex::new(DeliveryState::Pending),
                buffered: AtomicBool::new(true),
                settled: AtomicBool::new(false),
                settle_count: AtomicU32::new(0),
            }),
        }
    }

    /// How many times `settle` was called. Anything above one is a double settlement.
    /// `settle` 被调用的次数。大于一表示重复结算。
    pub fn settle_count(&self) -> u32 {
        self.inner.settle_count.load(Ordering::Acquire)
    }

    pub fn set_buffered(&self, buffered: bool) {
        self.inner.buffered.store(buffered, Ordering::Release);
    }

    fn set_state(&self, state: DeliveryState) {
        *lock(&self.inner.state) = state;
    }

    fn same(&self, other: &MockDelivery) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl EngineDelivery for MockDelivery {
    fn tag(&self) -> DeliveryTag {
        self.inner.tag.clone()
    }

    fn remote_state(&self) -> DeliveryState {
        lock(&self.inner.state).clone()
    }

    fn is_buffered(&self) -> bool {
        self.inner.buffered.load(Ordering::Acquire)
    }

    fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::Acquire)
    }

    fn settle(&self) {
        self.inner.settle_count.fetch_add(1, Ordering::AcqRel);
        self.inner.settled.store(true, Ordering::Release);
        self.inner.buffered.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct LinkInner {
    local_target: Option<TargetDescriptor>,
    remote_target: Option<TargetDescriptor>,
    remote_credit: u32,
    credit: u32,
    issued: Vec<MockDelivery>,
    ready: VecDeque<MockDelivery>,
}

/// An in-memory link that behaves like an engine link.
///
/// `current()` returns the first unsettled delivery that was marked ready,
/// in the order it became ready.
///
/// 行为与引擎链路一致的内存链路。
///
/// `current()` 按就绪顺序返回第一个已就绪且未结算的投递。
#[derive(Debug, Clone)]
pub struct MockLink {
    name: Arc<str>,
    role: LinkRole,
    inner: Arc<Mutex<LinkInner>>,
}

impl MockLink {
    pub fn new(name: impl Into<String>, role: LinkRole) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            role,
            inner: Arc::new(Mutex::new(LinkInner {
                local_target: None,
                remote_target: None,
                remote_credit: 0,
                credit: 0,
                issued: Vec::new(),
                ready: VecDeque::new(),
            })),
        }
    }

    pub fn sender(name: impl Into<String>) -> Self {
        Self::new(name, LinkRole::Sender)
    }

    pub fn receiver(name: impl Into<String>) -> Self {
        Self::new(name, LinkRole::Receiver)
    }

    pub fn with_local_target(self, target: TargetDescriptor) -> Self {
        lock(&self.inner).local_target = Some(target);
        self
    }

    pub fn set_remote_target(&self, target: Option<TargetDescriptor>) {
        lock(&self.inner).remote_target = target;
    }

    /// Records a flow frame from the peer.
    /// 记录来自对端的流控帧。
    pub fn set_remote_credit(&self, credit: u32) {
        let mut inner = lock(&self.inner);
        inner.remote_credit = credit;
        inner.credit = credit;
    }

    /// Issues a send. The delivery stays pending until marked ready.
    /// 发出一次发送。投递在被标记为就绪之前保持待定。
    pub fn issue(&self, tag: impl Into<DeliveryTag>) -> MockDelivery {
        let delivery = MockDelivery::new(tag.into());
        let mut inner = lock(&self.inner);
        inner.issued.push(delivery.clone());
        inner.credit = inner.credit.saturating_sub(1);
        delivery
    }

    /// Applies the peer's disposition and queues the delivery as ready.
    /// 应用对端的处置结果，并将投递加入就绪队列。
    pub fn ready(&self, delivery: &MockDelivery, state: DeliveryState) {
        delivery.set_state(state);
        let mut inner = lock(&self.inner);
        if !inner.ready.iter().any(|queued| queued.same(delivery)) {
            inner.ready.push_back(delivery.clone());
        }
    }

    /// Issues a send and immediately marks it ready with the given state.
    /// 发出一次发送，并立即以给定状态标记为就绪。
    pub fn deliver(&self, tag: impl Into<DeliveryTag>, state: DeliveryState) -> MockDelivery {
        let delivery = self.issue(tag);
        self.ready(&delivery, state);
        delivery
    }
}

impl EngineLink for MockLink {
    type Delivery = MockDelivery;

    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> LinkRole {
        self.role
    }

    fn local_target(&self) -> Option<TargetDescriptor> {
        lock(&self.inner).local_target.clone()
    }

    fn remote_target(&self) -> Option<TargetDescriptor> {
        lock(&self.inner).remote_target.clone()
    }

    fn remote_credit(&self) -> u32 {
        lock(&self.inner).remote_credit
    }

    fn credit(&self) -> u32 {
        lock(&self.inner).credit
    }

    fn unsettled(&self) -> usize {
        lock(&self.inner)
            .issued
            .iter()
            .filter(|delivery| !delivery.is_settled())
            .count()
    }

    fn current(&self) -> Option<MockDelivery> {
        let mut inner = lock(&self.inner);
        while inner.ready.front().is_some_and(|front| front.is_settled()) {
            inner.ready.pop_front();
        }
        inner.ready.front().cloned()
    }
}

/// A call observed by `RecordingSender`.
/// `RecordingSender` 观察到的一次调用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderCall {
    OpenComplete { error: Option<String> },
    SendComplete(DeliveryOutcome),
    Flow(u32),
}

/// An `AmqpSender` that records every callback in order.
/// 按顺序记录每次回调的 `AmqpSender`。
#[derive(Debug, Default)]
pub struct RecordingSender {
    calls: Mutex<Vec<SenderCall>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SenderCall> {
        lock(&self.calls).clone()
    }

    pub fn open_complete_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, SenderCall::OpenComplete { .. }))
            .count()
    }

    pub fn send_completions(&self) -> Vec<DeliveryOutcome> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                SenderCall::SendComplete(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn flows(&self) -> Vec<u32> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                SenderCall::Flow(credit) => Some(*credit),
                _ => None,
            })
            .collect()
    }
}

impl AmqpSender for RecordingSender {
    fn on_open_complete(&self, error: Option<Error>) {
        lock(&self.calls).push(SenderCall::OpenComplete {
            error: error.map(|e| e.to_string()),
        });
    }

    fn on_send_complete(&self, outcome: DeliveryOutcome) {
        lock(&self.calls).push(SenderCall::SendComplete(outcome));
    }

    fn on_flow(&self, remote_credit: u32) {
        lock(&self.calls).push(SenderCall::Flow(remote_credit));
    }
}
