use serde_json::{Map, Value};
use tracing::debug;

/// 事件载荷：生产方自定义的键值映射
pub type Payload = Map<String, Value>;

/// 载荷嵌套深度：标量为 0，每层对象或数组加 1
pub fn payload_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(payload_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(payload_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// 解析已序列化的载荷（例如本地存储中的数据）
///
/// 超长、非法 JSON、非对象或嵌套超过 `max_depth` 时都退化为空映射，不向调用方抛错。
/// 极深的输入在解析阶段即被 serde_json 自身的递归上限拒绝。
pub fn payload_from_json(input: &str, max_len: usize, max_depth: usize) -> Payload {
    if input.len() > max_len {
        debug!(
            "[Observer] Stored payload rejected: {} bytes over limit {}",
            input.len(),
            max_len
        );
        return Payload::new();
    }
    let map = match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            debug!("[Observer] Stored payload is not an object");
            return Payload::new();
        }
        Err(e) => {
            debug!("[Observer] Stored payload unparseable: {}", e);
            return Payload::new();
        }
    };
    let depth = 1 + map.values().map(payload_depth).max().unwrap_or(0);
    if depth > max_depth {
        debug!("[Observer] Stored payload nested {} levels deep", depth);
        return Payload::new();
    }
    map
}
