//! 链路处理器注册表 - 按链路名称把会话中的引擎事件路由到对应处理器
//! Link Handler Registry - Routes a session's engine events to handlers by link name

use crate::{
    core::{
        dispatcher::{EventDispatcher, LinkEvent},
        handler::SendLinkHandler,
    },
    error::{Error, Result},
    link::EngineLink,
    sender::AmqpSender,
};
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use tracing::{debug, warn};

/// 以链路名称为键的处理器注册表，可在多个线程中并发路由
/// Handler registry keyed by link name, safe to route from several threads at once
#[derive(Debug)]
pub struct LinkHandlerRegistry<L: EngineLink, S: AmqpSender> {
    handlers: DashMap<String, Arc<SendLinkHandler<L, S>>>,
}

impl<L: EngineLink, S: AmqpSender> Default for LinkHandlerRegistry<L, S> {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }
}

impl<L: EngineLink, S: AmqpSender> LinkHandlerRegistry<L, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器；同名链路已存在时返回错误
    /// Register a handler; fails when a handler with the same link name exists
    pub fn register(&self, handler: Arc<SendLinkHandler<L, S>>) -> Result<()> {
        let name = handler.link_name().to_string();
        match self.handlers.entry(name) {
            Entry::Occupied(entry) => {
                warn!(link = %entry.key(), "Duplicate link handler registration rejected");
                Err(Error::DuplicateLink(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                debug!(link = %entry.key(), "Link handler registered");
                entry.insert(handler);
                Ok(())
            }
        }
    }

    pub fn get(&self, link_name: &str) -> Option<Arc<SendLinkHandler<L, S>>> {
        self.handlers
            .get(link_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 移除处理器，例如在链路最终关闭之后
    /// Remove a handler, e.g. after the link is finally closed
    pub fn remove(&self, link_name: &str) -> Option<Arc<SendLinkHandler<L, S>>> {
        let removed = self.handlers.remove(link_name).map(|(_, handler)| handler);
        if removed.is_some() {
            debug!(link = %link_name, "Link handler removed");
        }
        removed
    }

    /// 将事件分发给指定链路的处理器
    /// Dispatch an event to the handler of the named link
    pub fn dispatch(&self, link_name: &str, event: LinkEvent<L::Delivery>) -> Result<()> {
        // Clone the handler out so no shard lock is held while sender callbacks run.
        let handler = self
            .get(link_name)
            .ok_or_else(|| Error::UnknownLink(link_name.to_string()))?;
        EventDispatcher::dispatch(&handler, event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
