use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::{form_urlencoded, Url};

use crate::common::payload::Payload;

pub const UTM_PREFIX: &str = "utm_";

/// 页面加载时捕获的营销归因参数，至少包含一个键
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UtmParameters(BTreeMap<String, String>);

impl UtmParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_payload(&self) -> Payload {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// 从页面地址提取 UTM 参数；没有任何匹配键时返回 None（而不是空映射）
pub fn extract_utm(location: &Url) -> Option<UtmParameters> {
    extract_utm_with_prefix(location.query().unwrap_or(""), UTM_PREFIX)
}

/// 解析原始查询串（可带前导 `?`，对应 `location.search`）
pub fn extract_utm_from_query(query: &str) -> Option<UtmParameters> {
    let query = query.strip_prefix('?').unwrap_or(query);
    extract_utm_with_prefix(query, UTM_PREFIX)
}

/// 结构化解析 `application/x-www-form-urlencoded` 查询串
///
/// 解码是有损的（非法百分号序列原样保留，非 UTF-8 字节替换为 U+FFFD），
/// 因此任何输入都不会失败。重复键以最后一次出现为准。
/// `query` 不含前导 `?`（即 `Url::query()` 的返回值）。
pub fn extract_utm_with_prefix(query: &str, prefix: &str) -> Option<UtmParameters> {
    let params: BTreeMap<String, String> = form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if params.is_empty() {
        None
    } else {
        Some(UtmParameters(params))
    }
}
