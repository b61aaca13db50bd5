//! 链路生命周期协调器 - 解决链路打开竞争并保证"打开完成"只通知一次
//! Link Lifecycle Coordinator - Resolves the link-open race and notifies "open complete" exactly once
//!
//! 两个独立的事件都可以完成打开：携带目标的远端打开（主触发），以及链路上
//! 观察到的第一个流控事件（次触发，部分对端先通过流控表示就绪）。两条路径
//! 通过对同一个原子状态做比较交换来竞争，只有胜者执行通知。
//!
//! 通知回调执行期间不持有任何锁，发送者可以在回调中重入处理器。此时到达的
//! 流控信用被暂存，由完成打开的上下文在回调返回后按顺序释放，因此发送者永远
//! 不会先于打开完成看到信用更新。
//!
//! Two independent events can complete the open: a remote open carrying a
//! target (primary trigger) and the first flow event seen on the link
//! (secondary trigger, some peers signal readiness through flow first). Both
//! paths compare-and-swap the same atomic state and only the winner notifies.
//!
//! No lock is held while the notification runs, so the sender may re-enter
//! the handler from inside it. Credit arriving meanwhile is parked and
//! released in order by the completing context once the callback returns, so
//! the sender never sees a credit update before open-complete.

use crate::{link::TargetDescriptor, sender::AmqpSender};
use std::{
    collections::VecDeque,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};
use tracing::{debug, info};

/// 链路打开状态，只能单调前进
/// Link open state, only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    /// 两个触发条件都尚未出现
    /// Neither trigger condition has been observed
    Unresolved,
    /// 一个触发条件已出现，通知正在进行
    /// One trigger was observed and the notification is in flight
    Completing,
    /// 通知已送达，此后幂等
    /// Notification delivered, idempotent from here on
    Completed,
}

impl OpenState {
    fn as_u8(self) -> u8 {
        match self {
            OpenState::Unresolved => 0,
            OpenState::Completing => 1,
            OpenState::Completed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => OpenState::Unresolved,
            1 => OpenState::Completing,
            _ => OpenState::Completed,
        }
    }
}

/// 完成打开的触发来源
/// The trigger that completed the open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenTrigger {
    /// 携带目标的远端打开
    /// Remote open carrying a resolved target
    RemoteOpen,
    /// 链路上的第一个流控事件
    /// First flow event on the link
    FirstFlow,
}

const NO_TRIGGER: u8 = 0;

impl OpenTrigger {
    fn as_u8(self) -> u8 {
        match self {
            OpenTrigger::RemoteOpen => 1,
            OpenTrigger::FirstFlow => 2,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(OpenTrigger::RemoteOpen),
            2 => Some(OpenTrigger::FirstFlow),
            _ => None,
        }
    }
}

/// 链路生命周期协调器
/// Link lifecycle coordinator
#[derive(Debug)]
pub struct LinkLifecycleCoordinator {
    /// 当前打开状态（`OpenState` 的编码）
    /// Current open state (encoded `OpenState`)
    open: AtomicU8,
    /// 胜出的触发来源
    /// Winning trigger
    trigger: AtomicU8,
    /// 观察到未携带目标的远端打开
    /// A remote open without target was observed
    ambiguous_open: AtomicBool,
    /// 打开完成前到达、等待释放的信用额度
    /// Credit that arrived before completion and awaits release
    parked_credit: Mutex<VecDeque<u32>>,
    sender_name: String,
    link_name: String,
}

impl LinkLifecycleCoordinator {
    /// 创建新的生命周期协调器
    /// Create a new lifecycle coordinator
    pub fn new(sender_name: impl Into<String>, link_name: impl Into<String>) -> Self {
        Self {
            open: AtomicU8::new(OpenState::Unresolved.as_u8()),
            trigger: AtomicU8::new(NO_TRIGGER),
            ambiguous_open: AtomicBool::new(false),
            parked_credit: Mutex::new(VecDeque::new()),
            sender_name: sender_name.into(),
            link_name: link_name.into(),
        }
    }

    // The queue is only ever pushed to or swapped out whole, so a poisoned
    // guard still holds a consistent value. No callback runs under this lock.
    fn parked(&self) -> MutexGuard<'_, VecDeque<u32>> {
        self.parked_credit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 本地端点已打开，仅记录日志
    /// Local endpoint opened, informational only
    pub fn on_local_open(&self, local_target: Option<&TargetDescriptor>) {
        info!(
            sender = %self.sender_name,
            link = %self.link_name,
            local_target = ?local_target.map(ToString::to_string),
            "onLinkLocalOpen"
        );
    }

    /// 处理远端打开。返回本次调用是否执行了打开完成通知
    /// Handle a remote open. Returns whether this call delivered the open-complete notification
    ///
    /// `release` 接收在通知期间被暂存的信用额度。
    /// `release` receives any credit parked while the notification ran.
    pub fn on_remote_open<S, F>(
        &self,
        remote_target: Option<&TargetDescriptor>,
        sender: &S,
        release: F,
    ) -> bool
    where
        S: AmqpSender + ?Sized,
        F: FnMut(u32),
    {
        match remote_target {
            Some(target) => {
                info!(
                    sender = %self.sender_name,
                    link = %self.link_name,
                    remote_target = %target,
                    "onLinkRemoteOpen"
                );
                self.try_complete(OpenTrigger::RemoteOpen, sender, release)
            }
            None => {
                // 没有目标：等待传输层给出确定的错误信号
                // No target: wait for a definitive error signal from the transport layer
                self.ambiguous_open.store(true, Ordering::Release);
                info!(
                    sender = %self.sender_name,
                    link = %self.link_name,
                    action = "waitingForError",
                    "onLinkRemoteOpen without remote target"
                );
                false
            }
        }
    }

    /// 处理链路上的第一个流控事件。返回本次调用是否执行了打开完成通知
    /// Handle the first flow on the link. Returns whether this call delivered the open-complete notification
    pub fn on_first_flow<S, F>(&self, sender: &S, release: F) -> bool
    where
        S: AmqpSender + ?Sized,
        F: FnMut(u32),
    {
        self.try_complete(OpenTrigger::FirstFlow, sender, release)
    }

    /// 判断一次信用更新能否立即转发
    /// Decide whether a credit update may be forwarded right away
    ///
    /// 打开完成后返回 `true`。否则信用被暂存并返回 `false`，稍后由完成打开的上下文释放。
    ///
    /// Returns `true` once the open has completed. Otherwise the credit is
    /// parked and `false` is returned; the completing context releases it later.
    pub fn admit_flow(&self, remote_credit: u32) -> bool {
        if self.is_open() {
            return true;
        }

        let mut parked = self.parked();
        // Re-check under the lock: completion flips to Completed only while holding it.
        if self.is_open() {
            return true;
        }
        parked.push_back(remote_credit);
        debug!(
            sender = %self.sender_name,
            link = %self.link_name,
            remote_credit,
            "Flow parked until open completes"
        );
        false
    }

    fn try_complete<S, F>(&self, trigger: OpenTrigger, sender: &S, mut release: F) -> bool
    where
        S: AmqpSender + ?Sized,
        F: FnMut(u32),
    {
        if self
            .open
            .compare_exchange(
                OpenState::Unresolved.as_u8(),
                OpenState::Completing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!(
                sender = %self.sender_name,
                link = %self.link_name,
                ?trigger,
                winner = ?self.open_trigger(),
                "Open already completed or completing, trigger suppressed"
            );
            return false;
        }

        self.trigger.store(trigger.as_u8(), Ordering::Release);
        sender.on_open_complete(None);

        // 释放通知期间暂存的信用，直到队列为空时才标记为已完成
        // Release credit parked during the notification; Completed is set only once the queue is empty
        loop {
            let batch = {
                let mut parked = self.parked();
                if parked.is_empty() {
                    self.open
                        .store(OpenState::Completed.as_u8(), Ordering::Release);
                    break;
                }
                std::mem::take(&mut *parked)
            };
            batch.into_iter().for_each(&mut release);
        }

        info!(
            sender = %self.sender_name,
            link = %self.link_name,
            ?trigger,
            "Link open completed"
        );
        true
    }

    pub fn open_state(&self) -> OpenState {
        OpenState::from_u8(self.open.load(Ordering::Acquire))
    }

    /// 获取完成打开的触发来源
    /// Gets the trigger that completed the open
    pub fn open_trigger(&self) -> Option<OpenTrigger> {
        OpenTrigger::from_u8(self.trigger.load(Ordering::Acquire))
    }

    /// 远端打开未携带目标且链路仍未完成打开
    /// A remote open without target was seen and the link is still unresolved
    pub fn awaiting_error(&self) -> bool {
        self.ambiguous_open.load(Ordering::Acquire)
            && self.open_state() == OpenState::Unresolved
    }

    pub fn is_open(&self) -> bool {
        self.open_state() == OpenState::Completed
    }
}
