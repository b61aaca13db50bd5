//! The send-link handler core.
//! 发送链路处理器核心。

pub mod dispatcher;
pub mod flow;
pub mod handler;
pub mod lifecycle;
pub mod settlement;

#[cfg(test)]
mod tests;
#[cfg(test)]
pub mod test_utils;
