use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ObserverProxy, VisitorId, VisitorIdCallback};
use crate::common::payload::Payload;

/// 参考代理：把事件写入 tracing 日志，并为本次页面生命周期签发一个 uuid 访客标识
pub struct LoggingProxy {
    visitor_id: VisitorId,
    recorded: AtomicUsize,
}

impl LoggingProxy {
    pub fn new() -> Self {
        Self::with_visitor_id(VisitorId::new(Uuid::new_v4().to_string()))
    }

    pub fn with_visitor_id(visitor_id: VisitorId) -> Self {
        Self {
            visitor_id,
            recorded: AtomicUsize::new(0),
        }
    }

    pub fn visitor_id(&self) -> &VisitorId {
        &self.visitor_id
    }

    /// 已记录的事件总数（三类事件合计）
    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    fn log_event(&self, class: &str, name: &str, payload: &Payload) {
        let payload = JsonValue::Object(payload.clone());
        info!(event = name, class, payload = %payload, "[Proxy] record");
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for LoggingProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverProxy for LoggingProxy {
    fn record_view_event(&self, name: &str, payload: &Payload) {
        self.log_event("view", name, payload);
    }

    fn record_action_event(&self, name: &str, payload: &Payload) {
        self.log_event("action", name, payload);
    }

    fn record_conversion_event(
        &self,
        name: &str,
        payload: &Payload,
        transaction_id: &str,
        cart_items: &[JsonValue],
        value: f64,
        currency: &str,
    ) {
        info!(
            transaction_id,
            items = cart_items.len(),
            value,
            currency,
            "[Proxy] conversion"
        );
        self.log_event("conversion", name, payload);
    }

    fn synch_visitor_id(&self, callback: VisitorIdCallback) {
        let visitor_id = self.visitor_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::task::yield_now().await;
                    callback(visitor_id);
                });
            }
            Err(_) => {
                warn!("[Proxy] No async runtime, delivering visitor id inline");
                callback(visitor_id);
            }
        }
    }
}
