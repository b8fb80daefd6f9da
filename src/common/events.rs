use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::payload::Payload;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    View,
    Action,
    Conversion,
}

/// 事件名称分类表（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    PageView,
    ContentView,
    StockView,
    ClickDetails,
    SubmitContact,
    AddWatchlist,
    RemoveWatchlist,
    BuyStock,
    SellStock,
    CheckStock,
    RegisterAccount,
    UserLogin,
    UserLogout,
    AskQuestion,
    FocusIndexMetric,
    AddLearningCourse,
    RemoveLearningCourse,
    AddReadingList,
    RemoveReadingList,
    Purchase,
}

impl EventName {
    pub const ALL: [EventName; 20] = [
        EventName::PageView,
        EventName::ContentView,
        EventName::StockView,
        EventName::ClickDetails,
        EventName::SubmitContact,
        EventName::AddWatchlist,
        EventName::RemoveWatchlist,
        EventName::BuyStock,
        EventName::SellStock,
        EventName::CheckStock,
        EventName::RegisterAccount,
        EventName::UserLogin,
        EventName::UserLogout,
        EventName::AskQuestion,
        EventName::FocusIndexMetric,
        EventName::AddLearningCourse,
        EventName::RemoveLearningCourse,
        EventName::AddReadingList,
        EventName::RemoveReadingList,
        EventName::Purchase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventName::PageView => "page-view",
            EventName::ContentView => "content-view",
            EventName::StockView => "stock-view",
            EventName::ClickDetails => "click-details",
            EventName::SubmitContact => "submit-contact",
            EventName::AddWatchlist => "add-watchlist",
            EventName::RemoveWatchlist => "remove-watchlist",
            EventName::BuyStock => "buy-stock",
            EventName::SellStock => "sell-stock",
            EventName::CheckStock => "check-stock",
            EventName::RegisterAccount => "register-account",
            EventName::UserLogin => "user-login",
            EventName::UserLogout => "user-logout",
            EventName::AskQuestion => "ask-question",
            EventName::FocusIndexMetric => "focus-index-metric",
            EventName::AddLearningCourse => "add-learning-course",
            EventName::RemoveLearningCourse => "remove-learning-course",
            EventName::AddReadingList => "add-reading-list",
            EventName::RemoveReadingList => "remove-reading-list",
            EventName::Purchase => "purchase",
        }
    }

    pub fn class(self) -> EventClass {
        match self {
            EventName::PageView | EventName::ContentView | EventName::StockView => {
                EventClass::View
            }
            EventName::Purchase => EventClass::Conversion,
            _ => EventClass::Action,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 转化事件：必填字段在构造时被强制转换为安全默认值，而不是拒绝
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionEvent {
    pub payload: Payload,
    pub transaction_id: String,
    pub transaction_value: f64,
    pub currency_code: String,
    pub shopping_cart_items: Vec<Value>,
}

impl ConversionEvent {
    pub const KEY_TRANSACTION_ID: &'static str = "transactionId";
    pub const KEY_TRANSACTION_VALUE: &'static str = "transactionValue";
    pub const KEY_CURRENCY_CODE: &'static str = "currencyCode";
    pub const KEY_CART_ITEMS: &'static str = "shoppingCartItems";

    /// 从原始载荷中拆出转化字段，其余键原样保留为事件载荷
    pub fn from_payload(mut payload: Payload) -> Self {
        let transaction_id = payload
            .remove(Self::KEY_TRANSACTION_ID)
            .map(coerce_transaction_id)
            .unwrap_or_default();
        let transaction_value = payload
            .remove(Self::KEY_TRANSACTION_VALUE)
            .map(coerce_value)
            .unwrap_or(0.0);
        let currency_code = payload
            .remove(Self::KEY_CURRENCY_CODE)
            .and_then(coerce_currency)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let shopping_cart_items = match payload.remove(Self::KEY_CART_ITEMS) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        Self {
            payload,
            transaction_id,
            transaction_value,
            currency_code,
            shopping_cart_items,
        }
    }
}

fn coerce_transaction_id(value: Value) -> String {
    match value {
        Value::String(id) => id.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn coerce_value(value: Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn coerce_currency(value: Value) -> Option<String> {
    match value {
        Value::String(code) if !code.trim().is_empty() => Some(code.trim().to_string()),
        _ => None,
    }
}
