use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use leo_observer::dom::{Element, MemoryDocument};
use leo_observer::proxy::LoggingProxy;
use leo_observer::scheduler::TokioScheduler;
use leo_observer::{HostEnvironment, LeoObserver, ObserverSettings, SecondaryAnalytics, VisitorId};

const DEFAULT_PAGE: &str =
    "https://dashboard.example/portfolio?utm_source=news&utm_medium=email&ref=x";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leo_observer=info".parse()?),
        )
        .init();

    let settings = ObserverSettings::new()?;
    let page_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PAGE.to_string());
    info!("[Startup] Simulating page {}", page_url);

    // 示例页面
    let document = Arc::new(MemoryDocument::parse(&page_url)?);
    document.append_anchor("/home", "Home");
    document.append_anchor("https://partner.example/page", "Partner");
    document.append_anchor("https://news.example/markets?region=us", "Markets");
    document.append_anchor("mailto:support@dashboard.example", "Support");
    document.append_button("Buy");
    document.append_button("Add to watchlist");

    let scheduler = TokioScheduler::current()
        .ok_or_else(|| anyhow::anyhow!("tokio runtime unavailable"))?;
    let secondary: Arc<dyn SecondaryAnalytics> = Arc::new(|visitor_id: &VisitorId| {
        info!("[GA4] Visitor id forwarded: {}", visitor_id);
    });
    let host = HostEnvironment::new(document.clone(), Arc::new(scheduler))
        .with_proxy(Arc::new(LoggingProxy::new()))
        .with_secondary(secondary)
        .with_settings(settings.clone());

    let Some(observer) = LeoObserver::install(host) else {
        return Ok(());
    };
    observer.on_proxy_ready();
    observer.add_tracking_all_links();
    observer.add_tracking_all_buttons();

    tokio::time::sleep(Duration::from_millis(settings.instrumentation.delay_ms + 100)).await;

    for element in document
        .elements_by_tag("a")
        .into_iter()
        .chain(document.elements_by_tag("button"))
    {
        element.click();
    }

    for anchor in document.elements_by_tag("a") {
        println!("{}", anchor.attribute("href").unwrap_or_default());
    }
    Ok(())
}
