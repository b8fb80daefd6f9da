pub mod memory;

use std::sync::Arc;
use url::Url;

pub use memory::{MemoryDocument, MemoryElement};

/// 元素身份标识，仅用于关联“是否已埋点”，不持有元素
pub type ElementId = u64;

pub type ClickListener = Box<dyn Fn() + Send + Sync>;

/// 宿主 DOM 元素的最小能力集
pub trait Element: Send + Sync {
    fn id(&self) -> ElementId;

    fn tag_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<String>;

    fn inner_text(&self) -> String;

    /// 解析后的绝对地址（对应浏览器中的 `a.href`），无法解析时为 None
    fn href(&self) -> Option<String>;

    fn set_href(&self, href: &str);

    fn add_click_listener(&self, listener: ClickListener);
}

/// 宿主文档：元素查询与当前页面地址
pub trait Document: Send + Sync {
    fn query_selector_all(&self, selector: &str) -> Vec<Arc<dyn Element>>;

    fn location(&self) -> Url;
}
