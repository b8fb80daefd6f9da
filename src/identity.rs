use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::dom::{Document, ElementId};
use crate::observer::LeoObserver;
use crate::proxy::{ObserverProxy, SecondaryAnalytics, VisitorId};

/// 访客标识同步器
///
/// 第二方钩子在构造时一次性确定；访客标识在页面生命周期内至多保存一次，之后不再刷新。
#[derive(Clone)]
pub struct IdentitySynchronizer {
    proxy: Arc<dyn ObserverProxy>,
    document: Arc<dyn Document>,
    secondary: Option<Arc<dyn SecondaryAnalytics>>,
    param_name: String,
    visitor_id: Arc<OnceLock<VisitorId>>,
    tagged: Arc<Mutex<HashSet<ElementId>>>,
}

impl IdentitySynchronizer {
    pub fn new(
        proxy: Arc<dyn ObserverProxy>,
        document: Arc<dyn Document>,
        secondary: Option<Arc<dyn SecondaryAnalytics>>,
        param_name: String,
    ) -> Self {
        Self {
            proxy,
            document,
            secondary,
            param_name,
            visitor_id: Arc::new(OnceLock::new()),
            tagged: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn visitor_id(&self) -> Option<&VisitorId> {
        self.visitor_id.get()
    }

    /// 向代理请求访客标识；回调触发后改写外链并通知第二方集成
    ///
    /// 本身不重试。若代理永不回调，改写与同步都不会发生。
    pub fn sync<F>(&self, on_ready: F)
    where
        F: FnOnce(&VisitorId) + Send + 'static,
    {
        let synchronizer = self.clone();
        self.proxy.synch_visitor_id(Box::new(move |delivered| {
            synchronizer.apply(delivered, on_ready);
        }));
    }

    fn apply<F>(&self, delivered: VisitorId, on_ready: F)
    where
        F: FnOnce(&VisitorId),
    {
        if delivered.is_empty() {
            debug!("[Identity] Proxy delivered an empty visitor id, ignoring");
            return;
        }
        let visitor_id = self.visitor_id.get_or_init(|| delivered);

        let rewritten = match self.tagged.lock() {
            Ok(mut tagged) => {
                rewrite_outbound_links(&*self.document, &self.param_name, visitor_id, &mut tagged)
            }
            Err(_) => {
                warn!("[Identity] Rewrite marker poisoned, skipping link pass");
                0
            }
        };
        info!("[Identity] Tagged {} outbound link(s)", rewritten);

        if let Some(secondary) = &self.secondary {
            secondary.sync_visitor_id(visitor_id);
        }
        on_ready(visitor_id);
    }
}

/// 为所有外部 HTTP(S) 链接追加 `<param_name>=<visitor_id>` 查询参数
///
/// 站内链接、非 HTTP(S) 链接、无法解析的链接以及 `tagged` 中已改写过的元素保持不变。
/// 外链上已有的同名参数（来自其他站点的旧值）会被替换为当前访客标识。
/// 返回被改写的链接数量。
pub fn rewrite_outbound_links(
    document: &dyn Document,
    param_name: &str,
    visitor_id: &VisitorId,
    tagged: &mut HashSet<ElementId>,
) -> usize {
    let page = document.location();
    let mut rewritten = 0usize;

    for anchor in document.query_selector_all("a") {
        if tagged.contains(&anchor.id()) {
            continue;
        }
        let Some(href) = anchor.href() else {
            continue;
        };
        let Ok(mut url) = Url::parse(&href) else {
            debug!("[Identity] Skipping unparseable href: {}", href);
            continue;
        };
        if !is_outbound(&url, &page) {
            continue;
        }
        if url.query_pairs().any(|(key, _)| key == param_name) {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != param_name)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair(param_name, visitor_id.as_str());
        } else {
            url.query_pairs_mut()
                .append_pair(param_name, visitor_id.as_str());
        }
        anchor.set_href(url.as_str());
        tagged.insert(anchor.id());
        rewritten += 1;
    }

    rewritten
}

/// 主机比较与浏览器的 `location.host` 一致：主机名加非默认端口
fn is_outbound(url: &Url, page: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    url.host_str() != page.host_str() || url.port() != page.port()
}

impl LeoObserver {
    pub fn sync_visitor_id<F>(&self, on_ready: F)
    where
        F: FnOnce(&VisitorId) + Send + 'static,
    {
        self.inner.identity.sync(on_ready);
    }

    pub fn visitor_id(&self) -> Option<VisitorId> {
        self.inner.identity.visitor_id().cloned()
    }
}
