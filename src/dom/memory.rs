use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use url::Url;

use super::{ClickListener, Document, Element, ElementId};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

fn selector_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<tag>[A-Za-z][A-Za-z0-9-]*|\*)?(?:#(?P<id>[\w-]+))?(?P<classes>(?:\.[\w-]+)*)$")
            .expect("selector pattern")
    })
}

/// 简单选择器：`tag`、`*`、`#id`、`.class` 及其组合（如 `a.cta`），逗号分隔表示并集
#[derive(Debug, Clone, PartialEq, Eq)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl SimpleSelector {
    fn parse_list(selector: &str) -> Option<Vec<SimpleSelector>> {
        selector
            .split(',')
            .map(|part| Self::parse(part.trim()))
            .collect()
    }

    fn parse(part: &str) -> Option<SimpleSelector> {
        if part.is_empty() {
            return None;
        }
        let caps = selector_pattern().captures(part)?;
        let tag = caps
            .name("tag")
            .map(|m| m.as_str())
            .filter(|tag| *tag != "*")
            .map(|tag| tag.to_ascii_lowercase());
        let id = caps.name("id").map(|m| m.as_str().to_string());
        let classes = caps
            .name("classes")
            .map(|m| {
                m.as_str()
                    .split('.')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(SimpleSelector { tag, id, classes })
    }

    fn matches(&self, element: &MemoryElement) -> bool {
        if let Some(tag) = &self.tag {
            if tag != &element.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if self.classes.is_empty() {
            return true;
        }
        let class_attr = element.attribute("class").unwrap_or_default();
        let own: Vec<&str> = class_attr.split_whitespace().collect();
        self.classes.iter().all(|c| own.contains(&c.as_str()))
    }
}

/// 内存中的元素，实现 [`Element`]，供测试与演示程序使用
pub struct MemoryElement {
    id: ElementId,
    tag: String,
    base: Url,
    attributes: RwLock<HashMap<String, String>>,
    text: RwLock<String>,
    listeners: Mutex<Vec<Arc<ClickListener>>>,
}

impl MemoryElement {
    fn new(tag: &str, base: Url) -> Self {
        Self {
            id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
            tag: tag.to_ascii_lowercase(),
            base,
            attributes: RwLock::new(HashMap::new()),
            text: RwLock::new(String::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Ok(mut attributes) = self.attributes.write() {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_inner_text(&self, text: &str) {
        if let Ok(mut current) = self.text.write() {
            *current = text.to_string();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// 模拟一次点击：依次触发已绑定的监听器
    pub fn click(&self) {
        let listeners: Vec<Arc<ClickListener>> = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener();
        }
    }
}

impl Element for MemoryElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().ok()?.get(name).cloned()
    }

    fn inner_text(&self) -> String {
        self.text.read().map(|t| t.clone()).unwrap_or_default()
    }

    fn href(&self) -> Option<String> {
        let raw = self.attribute("href")?;
        self.base.join(raw.trim()).ok().map(|url| url.to_string())
    }

    fn set_href(&self, href: &str) {
        self.set_attribute("href", href);
    }

    fn add_click_listener(&self, listener: ClickListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Arc::new(listener));
        }
    }
}

/// 内存文档：按插入顺序保存元素，可在任意时刻追加或移除以模拟动态渲染
pub struct MemoryDocument {
    location: Url,
    elements: RwLock<Vec<Arc<MemoryElement>>>,
}

impl MemoryDocument {
    pub fn new(location: Url) -> Self {
        Self {
            location,
            elements: RwLock::new(Vec::new()),
        }
    }

    pub fn parse(location: &str) -> anyhow::Result<Self> {
        Ok(Self::new(Url::parse(location)?))
    }

    pub fn create_element(&self, tag: &str) -> Arc<MemoryElement> {
        let element = Arc::new(MemoryElement::new(tag, self.location.clone()));
        if let Ok(mut elements) = self.elements.write() {
            elements.push(element.clone());
        }
        element
    }

    pub fn append_anchor(&self, href: &str, text: &str) -> Arc<MemoryElement> {
        let anchor = self.create_element("a");
        anchor.set_attribute("href", href);
        anchor.set_inner_text(text);
        anchor
    }

    pub fn append_button(&self, text: &str) -> Arc<MemoryElement> {
        let button = self.create_element("button");
        button.set_inner_text(text);
        button
    }

    pub fn remove_element(&self, id: ElementId) {
        if let Ok(mut elements) = self.elements.write() {
            elements.retain(|el| el.id != id);
        }
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<Arc<MemoryElement>> {
        let tag = tag.to_ascii_lowercase();
        self.elements
            .read()
            .map(|elements| elements.iter().filter(|el| el.tag == tag).cloned().collect())
            .unwrap_or_default()
    }
}

impl Document for MemoryDocument {
    fn query_selector_all(&self, selector: &str) -> Vec<Arc<dyn Element>> {
        let Some(selectors) = SimpleSelector::parse_list(selector) else {
            tracing::debug!("[Dom] Unsupported selector: {}", selector);
            return Vec::new();
        };
        let Ok(elements) = self.elements.read() else {
            return Vec::new();
        };
        elements
            .iter()
            .filter(|el| selectors.iter().any(|s| s.matches(el)))
            .map(|el| el.clone() as Arc<dyn Element>)
            .collect()
    }

    fn location(&self) -> Url {
        self.location.clone()
    }
}
