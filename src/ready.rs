use tracing::info;

use crate::common::events::EventName;
use crate::observer::LeoObserver;

impl LeoObserver {
    /// 宿主在代理就绪后调用的唯一入口
    ///
    /// 先记录携带 UTM 归因的页面浏览事件，再发起访客标识同步（不等待回调）。
    /// 重复调用会重复记录页面浏览事件。
    pub fn on_proxy_ready(&self) {
        let payload = self.utm().map(|utm| utm.to_payload());
        info!(
            "[Ready] Proxy ready, recording page view (attribution: {})",
            payload.is_some()
        );
        self.record(EventName::PageView, payload);
        self.sync_visitor_id(|visitor_id| {
            info!("[Ready] Visitor id synchronized: {}", visitor_id);
        });
    }
}
