pub mod logging;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::common::payload::Payload;

pub use logging::LoggingProxy;

/// 不透明的访客标识，只作为能力令牌传递
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type VisitorIdCallback = Box<dyn FnOnce(VisitorId) + Send>;

/// 宿主提供的记录代理
///
/// 观察层从不构造该对象；投递、重试、缓冲均由代理自行负责。
pub trait ObserverProxy: Send + Sync {
    fn record_view_event(&self, name: &str, payload: &Payload);

    fn record_action_event(&self, name: &str, payload: &Payload);

    fn record_conversion_event(
        &self,
        name: &str,
        payload: &Payload,
        transaction_id: &str,
        cart_items: &[Value],
        value: f64,
        currency: &str,
    );

    /// 异步获取访客标识；回调可能在任意时刻触发，也可能永不触发
    fn synch_visitor_id(&self, callback: VisitorIdCallback);
}

/// 第二方分析集成（例如 GA4）的访客标识同步钩子
pub trait SecondaryAnalytics: Send + Sync {
    fn sync_visitor_id(&self, visitor_id: &VisitorId);
}

impl<F> SecondaryAnalytics for F
where
    F: Fn(&VisitorId) + Send + Sync,
{
    fn sync_visitor_id(&self, visitor_id: &VisitorId) {
        self(visitor_id)
    }
}
