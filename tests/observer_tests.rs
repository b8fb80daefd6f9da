use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use leo_observer::dom::{Element, MemoryDocument};
use leo_observer::proxy::VisitorIdCallback;
use leo_observer::scheduler::ManualScheduler;
use leo_observer::{
    EventClass, EventName, HostEnvironment, LeoObserver, ObserverProxy, ObserverSettings,
    Payload, SecondaryAnalytics, VisitorId,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    View(String, Payload),
    Action(String, Payload),
    Conversion {
        name: String,
        payload: Payload,
        transaction_id: String,
        items: Vec<Value>,
        value: f64,
        currency: String,
    },
}

/// 记录所有调用；访客标识回调被挂起，由测试决定何时触发
#[derive(Default)]
struct RecordingProxy {
    calls: Mutex<Vec<Call>>,
    pending: Mutex<Vec<VisitorIdCallback>>,
}

impl RecordingProxy {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn pending_syncs(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn deliver(&self, visitor_id: &str) {
        let callbacks: Vec<VisitorIdCallback> = self.pending.lock().unwrap().drain(..).collect();
        for callback in callbacks {
            callback(VisitorId::new(visitor_id));
        }
    }
}

impl ObserverProxy for RecordingProxy {
    fn record_view_event(&self, name: &str, payload: &Payload) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::View(name.to_string(), payload.clone()));
    }

    fn record_action_event(&self, name: &str, payload: &Payload) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Action(name.to_string(), payload.clone()));
    }

    fn record_conversion_event(
        &self,
        name: &str,
        payload: &Payload,
        transaction_id: &str,
        cart_items: &[Value],
        value: f64,
        currency: &str,
    ) {
        self.calls.lock().unwrap().push(Call::Conversion {
            name: name.to_string(),
            payload: payload.clone(),
            transaction_id: transaction_id.to_string(),
            items: cart_items.to_vec(),
            value,
            currency: currency.to_string(),
        });
    }

    fn synch_visitor_id(&self, callback: VisitorIdCallback) {
        self.pending.lock().unwrap().push(callback);
    }
}

struct Page {
    document: Arc<MemoryDocument>,
    scheduler: Arc<ManualScheduler>,
    proxy: Arc<RecordingProxy>,
    observer: LeoObserver,
}

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn install_with(url: &str, secondary: Option<Arc<dyn SecondaryAnalytics>>) -> Page {
    let document = Arc::new(MemoryDocument::parse(url).expect("page url"));
    let scheduler = Arc::new(ManualScheduler::new());
    let proxy = Arc::new(RecordingProxy::default());
    let mut host =
        HostEnvironment::new(document.clone(), scheduler.clone()).with_proxy(proxy.clone());
    if let Some(secondary) = secondary {
        host = host.with_secondary(secondary);
    }
    let observer = LeoObserver::install(host).expect("observer installed");
    Page {
        document,
        scheduler,
        proxy,
        observer,
    }
}

fn install(url: &str) -> Page {
    install_with(url, None)
}

#[test]
fn missing_proxy_disables_tracking() {
    let document = Arc::new(MemoryDocument::parse("https://dashboard.example/").unwrap());
    let scheduler = Arc::new(ManualScheduler::new());
    let host = HostEnvironment::new(document, scheduler);
    assert!(LeoObserver::install(host).is_none());
}

#[test]
fn omitted_payload_is_sent_as_empty_map() {
    let page = install("https://dashboard.example/");
    page.observer.record_event_content_view(None);
    page.observer.record_event_user_logout(None);
    assert_eq!(
        page.proxy.calls(),
        vec![
            Call::View("content-view".into(), Payload::new()),
            Call::Action("user-logout".into(), Payload::new()),
        ]
    );
}

#[test]
fn every_taxonomy_entry_reaches_its_proxy_method_once() {
    let page = install("https://dashboard.example/");
    for event in EventName::ALL {
        page.observer
            .record(event, Some(payload(json!({ "source": "test" }))));
    }
    let calls = page.proxy.calls();
    assert_eq!(calls.len(), EventName::ALL.len());
    for (event, call) in EventName::ALL.into_iter().zip(calls) {
        match (event.class(), call) {
            (EventClass::View, Call::View(name, _)) => assert_eq!(name, event.as_str()),
            (EventClass::Action, Call::Action(name, _)) => assert_eq!(name, event.as_str()),
            (EventClass::Conversion, Call::Conversion { name, .. }) => {
                assert_eq!(name, event.as_str())
            }
            (class, call) => panic!("{:?} routed as {:?}", class, call),
        }
    }
}

#[test]
fn named_methods_forward_free_form_payloads() {
    let page = install("https://dashboard.example/");
    page.observer
        .record_event_buy_stock(Some(payload(json!({ "stockSymbol": "AAPL" }))));
    page.observer
        .record_event_focus_index_metric(Some(payload(json!({ "metric": "SPX", "range": [1, 5] }))));
    page.observer
        .record_event_stock_view(Some(payload(json!({ "stockSymbol": "MSFT" }))));
    assert_eq!(
        page.proxy.calls(),
        vec![
            Call::Action("buy-stock".into(), payload(json!({ "stockSymbol": "AAPL" }))),
            Call::Action(
                "focus-index-metric".into(),
                payload(json!({ "metric": "SPX", "range": [1, 5] }))
            ),
            Call::View("stock-view".into(), payload(json!({ "stockSymbol": "MSFT" }))),
        ]
    );
}

#[test]
fn purchase_with_malformed_value_defaults_safely() {
    let page = install("https://dashboard.example/");
    page.observer.record_event_purchase(Some(payload(json!({
        "transactionId": "tx-9",
        "transactionValue": "twelve",
        "shoppingCartItems": [{ "sku": "AAPL", "qty": 1 }],
        "channel": "web"
    }))));
    assert_eq!(
        page.proxy.calls(),
        vec![Call::Conversion {
            name: "purchase".into(),
            payload: payload(json!({ "channel": "web" })),
            transaction_id: "tx-9".into(),
            items: vec![json!({ "sku": "AAPL", "qty": 1 })],
            value: 0.0,
            currency: "USD".into(),
        }]
    );
}

#[test]
fn purchase_without_payload_still_calls_proxy() {
    let page = install("https://dashboard.example/");
    page.observer.record_event_purchase(None);
    match page.proxy.calls().as_slice() {
        [Call::Conversion {
            transaction_id,
            items,
            value,
            currency,
            ..
        }] => {
            assert_eq!(transaction_id, "");
            assert!(items.is_empty());
            assert_eq!(*value, 0.0);
            assert_eq!(currency, "USD");
        }
        other => panic!("unexpected calls: {:?}", other),
    }
}

#[test]
fn stored_payload_falls_back_to_empty_map() {
    let page = install("https://dashboard.example/");
    page.observer
        .record_json(EventName::AddReadingList, r#"{"title": "Intro to ETFs"}"#);
    page.observer.record_json(EventName::AddReadingList, "{broken");
    assert_eq!(
        page.proxy.calls(),
        vec![
            Call::Action(
                "add-reading-list".into(),
                payload(json!({ "title": "Intro to ETFs" }))
            ),
            Call::Action("add-reading-list".into(), Payload::new()),
        ]
    );
}

#[test]
fn auto_track_twice_binds_each_element_once() {
    let page = install("https://dashboard.example/");
    let buttons: Vec<_> = ["Buy", "Sell", "Watch"]
        .iter()
        .map(|text| page.document.append_button(text))
        .collect();

    page.observer.add_tracking_all_buttons();
    page.observer.add_tracking_all_buttons();
    page.scheduler.advance(Duration::from_millis(1500));

    let bound: usize = buttons.iter().map(|b| b.listener_count()).sum();
    assert_eq!(bound, buttons.len());
    assert_eq!(page.observer.auto_tracker().instrumented_count(), 3);

    buttons[1].click();
    assert_eq!(
        page.proxy.calls(),
        vec![Call::Action(
            "click-details".into(),
            payload(json!({ "buttonText": "Sell" }))
        )]
    );
}

#[test]
fn later_scan_picks_up_newly_rendered_elements_only() {
    let page = install("https://dashboard.example/");
    let first = page.document.append_anchor("/a", "A");
    page.observer.add_tracking_all_links();
    page.scheduler.advance(Duration::from_millis(1500));

    let second = page.document.append_anchor("https://partner.example/", "Partner");
    page.observer.add_tracking_all_links();
    page.scheduler.advance(Duration::from_millis(1500));

    assert_eq!(first.listener_count(), 1);
    assert_eq!(second.listener_count(), 1);

    second.click();
    assert_eq!(
        page.proxy.calls(),
        vec![Call::Action(
            "click-details".into(),
            payload(json!({ "url": "https://partner.example/", "linkText": "Partner" }))
        )]
    );
}

#[test]
fn custom_selector_uses_configured_delay() {
    let document = Arc::new(MemoryDocument::parse("https://dashboard.example/").unwrap());
    let scheduler = Arc::new(ManualScheduler::new());
    let proxy = Arc::new(RecordingProxy::default());
    let mut settings = ObserverSettings::default();
    settings.instrumentation.delay_ms = 200;
    let observer = LeoObserver::install(
        HostEnvironment::new(document.clone(), scheduler.clone())
            .with_proxy(proxy.clone())
            .with_settings(settings),
    )
    .unwrap();

    let card = document.create_element("div");
    card.set_attribute("class", "course-card");
    card.set_inner_text("Options 101");
    observer.auto_track(".course-card", |el: &dyn Element| {
        payload(json!({ "course": el.inner_text() }))
    });

    scheduler.advance(Duration::from_millis(199));
    assert_eq!(card.listener_count(), 0);
    scheduler.advance(Duration::from_millis(1));
    card.click();
    assert_eq!(
        proxy.calls(),
        vec![Call::Action(
            "click-details".into(),
            payload(json!({ "course": "Options 101" }))
        )]
    );
}

#[test]
fn ready_hook_end_to_end() {
    let forwarded = Arc::new(Mutex::new(Vec::new()));
    let hook_seen = forwarded.clone();
    let secondary: Arc<dyn SecondaryAnalytics> = Arc::new(move |id: &VisitorId| {
        hook_seen.lock().unwrap().push(id.clone());
    });
    let page = install_with(
        "https://dashboard.example/?utm_source=news&utm_medium=email&ref=x",
        Some(secondary),
    );
    let external = page.document.append_anchor("https://partner.example/page", "Partner");
    let internal = page.document.append_anchor("/home", "Home");

    page.observer.on_proxy_ready();

    assert_eq!(
        page.proxy.calls(),
        vec![Call::View(
            "page-view".into(),
            payload(json!({ "utm_source": "news", "utm_medium": "email" }))
        )]
    );
    assert_eq!(page.proxy.pending_syncs(), 1);
    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/page")
    );
    assert!(forwarded.lock().unwrap().is_empty());

    page.proxy.deliver("abc123");

    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/page?leosyn=abc123")
    );
    assert_eq!(internal.attribute("href").as_deref(), Some("/home"));
    assert_eq!(*forwarded.lock().unwrap(), vec![VisitorId::new("abc123")]);
    assert_eq!(page.observer.visitor_id(), Some(VisitorId::new("abc123")));
}

#[test]
fn ready_without_attribution_sends_empty_page_view() {
    let page = install("https://dashboard.example/?ref=x");
    assert!(page.observer.utm().is_none());
    page.observer.on_proxy_ready();
    assert_eq!(
        page.proxy.calls(),
        vec![Call::View("page-view".into(), Payload::new())]
    );
}

#[test]
fn repeated_ready_refires_page_view_but_tags_links_once() {
    let page = install("https://dashboard.example/?utm_campaign=spring");
    let external = page.document.append_anchor("https://partner.example/page?a=1", "Partner");

    page.observer.on_proxy_ready();
    page.observer.on_proxy_ready();
    assert_eq!(page.proxy.calls().len(), 2);
    assert_eq!(page.proxy.pending_syncs(), 2);

    page.proxy.deliver("abc123");
    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/page?a=1&leosyn=abc123")
    );
}

#[test]
fn visitor_id_is_kept_from_first_delivery() {
    let page = install("https://dashboard.example/");
    page.observer.sync_visitor_id(|_| {});
    page.proxy.deliver("first");
    page.observer.sync_visitor_id(|_| {});
    page.proxy.deliver("second");
    assert_eq!(page.observer.visitor_id(), Some(VisitorId::new("first")));
}

#[test]
fn silent_proxy_means_no_rewrite_and_no_secondary_sync() {
    let calls = Arc::new(Mutex::new(0usize));
    let hook_calls = calls.clone();
    let secondary: Arc<dyn SecondaryAnalytics> = Arc::new(move |_: &VisitorId| {
        *hook_calls.lock().unwrap() += 1;
    });
    let page = install_with("https://dashboard.example/", Some(secondary));
    let external = page.document.append_anchor("https://partner.example/page", "Partner");

    page.observer.on_proxy_ready();
    page.scheduler.advance(Duration::from_secs(60));

    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/page")
    );
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(page.observer.visitor_id(), None);
}

#[test]
fn empty_visitor_id_is_ignored() {
    let page = install("https://dashboard.example/");
    let external = page.document.append_anchor("https://partner.example/page", "Partner");
    let ready = Arc::new(Mutex::new(false));
    let ready_flag = ready.clone();
    page.observer
        .sync_visitor_id(move |_| *ready_flag.lock().unwrap() = true);
    page.proxy.deliver("  ");
    assert!(!*ready.lock().unwrap());
    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/page")
    );
}

#[test]
fn custom_param_name_is_applied() {
    let document = Arc::new(MemoryDocument::parse("https://dashboard.example/").unwrap());
    let proxy = Arc::new(RecordingProxy::default());
    let mut settings = ObserverSettings::default();
    settings.identity.param_name = "vid".to_string();
    let observer = LeoObserver::install(
        HostEnvironment::new(document.clone(), Arc::new(ManualScheduler::new()))
            .with_proxy(proxy.clone())
            .with_settings(settings),
    )
    .unwrap();
    let external = document.append_anchor("https://partner.example/", "Partner");

    observer.sync_visitor_id(|_| {});
    proxy.deliver("abc123");
    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/?vid=abc123")
    );
}

#[test]
fn stale_visitor_param_is_replaced_once_per_anchor() {
    let page = install("https://dashboard.example/");
    let external = page
        .document
        .append_anchor("https://partner.example/page?leosyn=old", "Partner");

    page.observer.on_proxy_ready();
    page.observer.on_proxy_ready();
    page.proxy.deliver("abc123");

    assert_eq!(
        external.attribute("href").as_deref(),
        Some("https://partner.example/page?leosyn=abc123")
    );
}
