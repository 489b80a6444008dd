//! 汇总统计服务 - 业务能力层
//!
//! 只负责从报告计算 `Summary`，纯函数，不做任何 I/O

use regex::Regex;
use serde_json::Value;

use crate::models::{ExtractedReport, Summary};

/// 完成度关键词，按顺序匹配（否定形式必须先于 "complete" / "done"）
const QUALITATIVE_PATTERNS: [(&str, u32); 3] = [
    (
        r"(?i)\b(not\s+(yet\s+)?(started|complete|completed|done)|pending|tbd)\b",
        0,
    ),
    (r"(?i)\b(in\s+progress|ongoing|under\s*way)\b", 50),
    (r"(?i)\b(complete|completed|done)\b", 100),
];

/// 计算报告汇总
///
/// # 参数
/// - `report`: 报告（只读）
///
/// # 返回
/// 目标数、BMP 数、平均完成度；没有任何目标给出有效完成度时完成度为 0
pub fn compute_summary(report: &ExtractedReport) -> Summary {
    let rates: Vec<u32> = report
        .goals
        .iter()
        .filter_map(|goal| goal.get("completionRate"))
        .filter_map(normalize_completion)
        .collect();

    let completion_rate = if rates.is_empty() {
        0
    } else {
        let sum: u32 = rates.iter().sum();
        (f64::from(sum) / rates.len() as f64).round() as u32
    };

    Summary {
        total_goals: report.goals.len(),
        total_bmps: report.bmps.len(),
        completion_rate,
    }
}

/// 将单个完成度值归一化为 0–100
///
/// # 返回
/// 无法识别时返回 `None`（该目标不参与平均）
pub fn normalize_completion(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().and_then(normalize_number),
        Value::String(s) => normalize_text(s),
        _ => None,
    }
}

/// 0–1 视为比例，(1, 100] 视为百分数，其余无效
fn normalize_number(n: f64) -> Option<u32> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    if n <= 1.0 {
        Some((n * 100.0).round() as u32)
    } else if n <= 100.0 {
        Some(n.round() as u32)
    } else {
        None
    }
}

fn normalize_text(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // "NN%" 形式，超出范围时截断
    if let Ok(re) = Regex::new(r"(-?\d+(?:\.\d+)?)\s*%") {
        if let Some(pct) = re
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
        {
            return Some(pct.clamp(0.0, 100.0).round() as u32);
        }
    }

    for (pattern, rate) in QUALITATIVE_PATTERNS {
        if let Ok(re) = Regex::new(pattern) {
            if re.is_match(text) {
                return Some(rate);
            }
        }
    }

    text.parse::<f64>().ok().and_then(normalize_number)
}
