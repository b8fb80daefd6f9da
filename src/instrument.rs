use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::common::events::EventName;
use crate::common::payload::Payload;
use crate::dom::{Document, Element, ElementId};
use crate::observer::LeoObserver;
use crate::scheduler::Scheduler;

pub type PayloadBuilder = Arc<dyn Fn(&dyn Element) -> Payload + Send + Sync>;
pub type ClickSink = Arc<dyn Fn(Payload) + Send + Sync>;

/// 延迟扫描式自动埋点
///
/// 每个元素只会被绑定一次：已埋点元素的身份记录在共享集合中，
/// 重复调用同一选择器（或选择器相互重叠）不会产生重复监听器。
#[derive(Clone)]
pub struct AutoTracker {
    document: Arc<dyn Document>,
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    instrumented: Arc<Mutex<HashSet<ElementId>>>,
}

impl AutoTracker {
    pub fn new(document: Arc<dyn Document>, scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        Self {
            document,
            scheduler,
            delay,
            instrumented: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 在固定延迟后对 `selector` 做一次扫描并绑定点击监听器
    pub fn track(&self, selector: &str, builder: PayloadBuilder, sink: ClickSink) {
        let selector = selector.to_string();
        let document = self.document.clone();
        let instrumented = self.instrumented.clone();
        debug!("[AutoTrack] Scan for '{}' in {:?}", selector, self.delay);
        self.scheduler.schedule(
            self.delay,
            Box::new(move || {
                let bound = bind_matching(&*document, &selector, &builder, &sink, &instrumented);
                debug!("[AutoTrack] '{}' bound {} new element(s)", selector, bound);
            }),
        );
    }

    pub fn is_instrumented(&self, id: ElementId) -> bool {
        self.instrumented
            .lock()
            .map(|set| set.contains(&id))
            .unwrap_or(false)
    }

    pub fn instrumented_count(&self) -> usize {
        self.instrumented.lock().map(|set| set.len()).unwrap_or(0)
    }
}

fn bind_matching(
    document: &dyn Document,
    selector: &str,
    builder: &PayloadBuilder,
    sink: &ClickSink,
    instrumented: &Mutex<HashSet<ElementId>>,
) -> usize {
    let elements = document.query_selector_all(selector);
    if elements.is_empty() {
        return 0;
    }

    let fresh: Vec<Arc<dyn Element>> = {
        let Ok(mut marked) = instrumented.lock() else {
            warn!("[AutoTrack] Instrumentation marker poisoned, skipping scan");
            return 0;
        };
        elements
            .into_iter()
            .filter(|element| marked.insert(element.id()))
            .collect()
    };

    for element in &fresh {
        let target = Arc::downgrade(element);
        let builder = builder.clone();
        let sink = sink.clone();
        element.add_click_listener(Box::new(move || {
            if let Some(element) = target.upgrade() {
                sink(builder(&*element));
            }
        }));
    }
    fresh.len()
}

pub fn link_payload(element: &dyn Element) -> Payload {
    let mut payload = Payload::new();
    payload.insert(
        "url".to_string(),
        Value::String(element.attribute("href").unwrap_or_default()),
    );
    payload.insert("linkText".to_string(), Value::String(element.inner_text()));
    payload
}

pub fn button_payload(element: &dyn Element) -> Payload {
    let mut payload = Payload::new();
    payload.insert("buttonText".to_string(), Value::String(element.inner_text()));
    payload
}

impl LeoObserver {
    /// 对匹配 `selector` 的元素自动记录 `click-details` 事件
    pub fn auto_track<F>(&self, selector: &str, builder: F)
    where
        F: Fn(&dyn Element) -> Payload + Send + Sync + 'static,
    {
        let observer = Arc::downgrade(&self.inner);
        let sink: ClickSink = Arc::new(move |payload: Payload| {
            if let Some(inner) = observer.upgrade() {
                inner.record(EventName::ClickDetails, Some(payload));
            }
        });
        self.inner.tracker.track(selector, Arc::new(builder), sink);
    }

    pub fn add_tracking_all_links(&self) {
        self.auto_track("a", link_payload);
    }

    pub fn add_tracking_all_buttons(&self) {
        self.auto_track("button", button_payload);
    }

    pub fn auto_tracker(&self) -> &AutoTracker {
        &self.inner.tracker
    }
}
