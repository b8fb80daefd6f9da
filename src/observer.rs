use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::common::events::{ConversionEvent, EventClass, EventName};
use crate::common::payload::{payload_from_json, Payload};
use crate::config::ObserverSettings;
use crate::dom::Document;
use crate::identity::IdentitySynchronizer;
use crate::instrument::AutoTracker;
use crate::proxy::{ObserverProxy, SecondaryAnalytics};
use crate::scheduler::Scheduler;
use crate::utm::{extract_utm_with_prefix, UtmParameters};

/// 宿主环境：观察层的全部外部依赖在这里一次性注入
pub struct HostEnvironment {
    pub proxy: Option<Arc<dyn ObserverProxy>>,
    pub document: Arc<dyn Document>,
    pub scheduler: Arc<dyn Scheduler>,
    pub secondary: Option<Arc<dyn SecondaryAnalytics>>,
    pub settings: ObserverSettings,
}

impl HostEnvironment {
    pub fn new(document: Arc<dyn Document>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            proxy: None,
            document,
            scheduler,
            secondary: None,
            settings: ObserverSettings::default(),
        }
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn ObserverProxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn SecondaryAnalytics>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_settings(mut self, settings: ObserverSettings) -> Self {
        self.settings = settings;
        self
    }
}

pub(crate) struct ObserverInner {
    pub(crate) proxy: Arc<dyn ObserverProxy>,
    pub(crate) settings: ObserverSettings,
    pub(crate) utm: Option<UtmParameters>,
    pub(crate) tracker: AutoTracker,
    pub(crate) identity: IdentitySynchronizer,
}

impl ObserverInner {
    /// 每次调用恰好对应一次代理调用，不做批量、重试或缓冲
    pub(crate) fn record(&self, event: EventName, payload: Option<Payload>) {
        let payload = payload.unwrap_or_default();
        let name = event.as_str();
        debug!("[Observer] {} ({} keys)", name, payload.len());
        match event.class() {
            EventClass::View => self.proxy.record_view_event(name, &payload),
            EventClass::Action => self.proxy.record_action_event(name, &payload),
            EventClass::Conversion => {
                let conversion = ConversionEvent::from_payload(payload);
                self.proxy.record_conversion_event(
                    name,
                    &conversion.payload,
                    &conversion.transaction_id,
                    &conversion.shopping_cart_items,
                    conversion.transaction_value,
                    &conversion.currency_code,
                );
            }
        }
    }
}

/// 事件分类门面
///
/// 只有在代理存在时才能构造；调用方持有 `Option<LeoObserver>`，
/// “观察层不可用”是合法的程序状态。克隆开销很小，内部共享同一实例。
#[derive(Clone)]
pub struct LeoObserver {
    pub(crate) inner: Arc<ObserverInner>,
}

impl LeoObserver {
    /// 安装观察层；代理缺失时返回 None，整个埋点层退化为空操作
    ///
    /// UTM 归因参数在此处从页面地址捕获一次，之后整个页面生命周期内不变。
    pub fn install(host: HostEnvironment) -> Option<Self> {
        let Some(proxy) = host.proxy else {
            info!("[Observer] Proxy not installed, tracking disabled");
            return None;
        };
        let settings = host.settings;
        let location = host.document.location();
        let utm = extract_utm_with_prefix(location.query().unwrap_or(""), &settings.utm.prefix);

        let tracker = AutoTracker::new(
            host.document.clone(),
            host.scheduler,
            Duration::from_millis(settings.instrumentation.delay_ms),
        );
        let identity = IdentitySynchronizer::new(
            proxy.clone(),
            host.document,
            host.secondary,
            settings.identity.param_name.clone(),
        );

        info!(
            "[Observer] Installed (utm keys: {})",
            utm.as_ref().map(UtmParameters::len).unwrap_or(0)
        );
        Some(Self {
            inner: Arc::new(ObserverInner {
                proxy,
                settings,
                utm,
                tracker,
                identity,
            }),
        })
    }

    pub fn utm(&self) -> Option<&UtmParameters> {
        self.inner.utm.as_ref()
    }

    pub fn settings(&self) -> &ObserverSettings {
        &self.inner.settings
    }

    pub fn record(&self, event: EventName, payload: Option<Payload>) {
        self.inner.record(event, payload);
    }

    /// 记录已序列化的载荷；载荷异常时以空映射发送
    pub fn record_json(&self, event: EventName, payload: &str) {
        let limits = &self.inner.settings.payload;
        let payload = payload_from_json(payload, limits.max_len, limits.max_depth);
        self.inner.record(event, Some(payload));
    }
}

macro_rules! taxonomy_methods {
    ($($method:ident => $event:ident),* $(,)?) => {
        impl LeoObserver {
            $(
                pub fn $method(&self, payload: Option<Payload>) {
                    self.record(EventName::$event, payload);
                }
            )*
        }
    };
}

taxonomy_methods! {
    record_event_page_view => PageView,
    record_event_content_view => ContentView,
    record_event_stock_view => StockView,
    record_event_click_details => ClickDetails,
    record_event_submit_contact => SubmitContact,
    record_event_add_watchlist => AddWatchlist,
    record_event_remove_watchlist => RemoveWatchlist,
    record_event_buy_stock => BuyStock,
    record_event_sell_stock => SellStock,
    record_event_check_stock => CheckStock,
    record_event_register_account => RegisterAccount,
    record_event_user_login => UserLogin,
    record_event_user_logout => UserLogout,
    record_event_ask_question => AskQuestion,
    record_event_focus_index_metric => FocusIndexMetric,
    record_event_add_learning_course => AddLearningCourse,
    record_event_remove_learning_course => RemoveLearningCourse,
    record_event_add_reading_list => AddReadingList,
    record_event_remove_reading_list => RemoveReadingList,
    record_event_purchase => Purchase,
}
