//! 事件分发器 - 负责将引擎事件路由到发送链路处理器
//! Event Dispatcher - Routes engine events to the send link handler
//!
//! 引擎可以直接调用处理器的方法，也可以把事件推入 `LinkEventPump`，由一个
//! tokio 任务按顺序逐个分发，这样每条链路只有一个逻辑分发上下文。
//!
//! The engine may call the handler's methods directly, or push events into a
//! `LinkEventPump`, where one tokio task dispatches them in order, giving each
//! link a single logical dispatch context.

use super::handler::SendLinkHandler;
use crate::{
    error::{Error, Result},
    link::{EngineLink, TargetDescriptor},
    sender::AmqpSender,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, trace};

/// 协议引擎为一条链路发出的事件
/// Events the protocol engine emits for one link
#[derive(Debug, Clone)]
pub enum LinkEvent<D> {
    /// 本地端点已打开
    /// Local endpoint opened
    LocalOpen,
    /// 对端响应了打开
    /// Peer responded to the open
    RemoteOpen {
        remote_target: Option<TargetDescriptor>,
    },
    /// 对端更新了流控信用额度
    /// Peer updated flow-control credit
    Flow { remote_credit: u32 },
    /// 一个或多个投递已就绪，从 `first` 开始
    /// One or more deliveries are ready, starting at `first`
    Delivery { first: D },
}

impl<D> LinkEvent<D> {
    /// 获取事件名称（用于日志）
    /// Gets the event name (for logging)
    pub fn name(&self) -> &'static str {
        match self {
            LinkEvent::LocalOpen => "LocalOpen",
            LinkEvent::RemoteOpen { .. } => "RemoteOpen",
            LinkEvent::Flow { .. } => "Flow",
            LinkEvent::Delivery { .. } => "Delivery",
        }
    }
}

/// 事件分发器，负责将各种事件路由到正确的处理方法
/// Event dispatcher that routes various events to the correct handling methods
pub struct EventDispatcher;

impl EventDispatcher {
    /// 分发一个链路事件
    /// Dispatches one link event
    pub fn dispatch<L, S>(handler: &SendLinkHandler<L, S>, event: LinkEvent<L::Delivery>)
    where
        L: EngineLink,
        S: AmqpSender,
    {
        trace!(link = %handler.link_name(), event = event.name(), "Dispatching link event");
        match event {
            LinkEvent::LocalOpen => handler.on_local_open(),
            LinkEvent::RemoteOpen { remote_target } => {
                handler.on_remote_open(remote_target.as_ref())
            }
            LinkEvent::Flow { remote_credit } => handler.on_flow(remote_credit),
            LinkEvent::Delivery { first } => {
                handler.on_delivery(first);
            }
        }
    }
}

/// 异步事件源
/// Asynchronous source of link events
#[async_trait]
pub trait EventSource<D>: Send {
    /// 等待下一个事件；事件源结束时返回 `None`
    /// Waits for the next event; returns `None` once the source is finished
    async fn next_event(&mut self) -> Option<LinkEvent<D>>;
}

#[async_trait]
impl<D: Send> EventSource<D> for mpsc::Receiver<LinkEvent<D>> {
    async fn next_event(&mut self) -> Option<LinkEvent<D>> {
        self.recv().await
    }
}

/// 向事件泵投递事件的句柄
/// Handle for pushing events into a pump
#[derive(Debug)]
pub struct LinkEventSender<D> {
    tx: mpsc::Sender<LinkEvent<D>>,
}

impl<D> Clone for LinkEventSender<D> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<D: Send> LinkEventSender<D> {
    /// 投递一个事件，通道满时等待
    /// Pushes one event, waiting while the channel is full
    pub async fn send(&self, event: LinkEvent<D>) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::ChannelClosed)
    }

    /// 从非异步的引擎回调中投递事件
    /// Pushes an event from a non-async engine callback
    pub fn blocking_send(&self, event: LinkEvent<D>) -> Result<()> {
        self.tx.blocking_send(event).map_err(|_| Error::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 按顺序把事件源中的事件分发给处理器的事件泵
/// Event pump that dispatches events from a source to a handler, in order
pub struct LinkEventPump;

impl LinkEventPump {
    /// 启动一个由 mpsc 通道驱动的事件泵任务
    /// Spawns a pump task driven by an mpsc channel
    ///
    /// 通道容量取自处理器的 `Config::event_channel_capacity`。所有发送句柄被丢弃后任务结束。
    ///
    /// The channel capacity comes from the handler's
    /// `Config::event_channel_capacity`. The task ends once every sender
    /// handle is dropped.
    pub fn spawn<L, S>(
        handler: Arc<SendLinkHandler<L, S>>,
    ) -> (LinkEventSender<L::Delivery>, JoinHandle<()>)
    where
        L: EngineLink + 'static,
        L::Delivery: 'static,
        S: AmqpSender + 'static,
    {
        let capacity = handler.config().event_channel_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(Self::run(handler, rx));
        (LinkEventSender { tx }, task)
    }

    /// 运行事件泵直到事件源结束
    /// Runs the pump until the source is finished
    pub async fn run<L, S, E>(handler: Arc<SendLinkHandler<L, S>>, mut source: E)
    where
        L: EngineLink,
        S: AmqpSender,
        E: EventSource<L::Delivery>,
    {
        let mut dispatched: u64 = 0;
        while let Some(event) = source.next_event().await {
            EventDispatcher::dispatch(&handler, event);
            dispatched += 1;
        }
        debug!(
            sender = %handler.sender_name(),
            link = %handler.link_name(),
            dispatched,
            "Link event source finished, pump stopped"
        );
    }
}
