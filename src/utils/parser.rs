/// 后端回答解析工具
use serde_json::Value;

/// 严格解析后端 `answer` 文本并取出指定键
///
/// # 参数
/// - `answer`: 后端返回的 JSON 文本
/// - `key`: 要读取的键名
///
/// # 返回
/// 文本不是 JSON 对象、键不存在或值为 null 时返回 `None`
pub fn parse_strict(answer: &str, key: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(answer) {
        Ok(Value::Object(mut obj)) => obj.remove(key).filter(|v| !v.is_null()),
        _ => None,
    }
}
