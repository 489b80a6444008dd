//! 提取报告数据模型
//!
//! 与后端和本地存储交换的 JSON 结构，字段名使用 camelCase。
//! 字段槽位保存后端回答的原始 JSON：数组槽位接受任意数组，`identity` 接受任意对象。

use crate::error::FieldMergeError;
use crate::models::field_key::FieldKey;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 报告条目（污染物、目标、BMP 等）
///
/// 后端回答的条目形状不固定（同一字段可能是数字或文本，条目本身也可能是字符串），
/// 因此按原始 JSON 保存
pub type ReportItem = Value;

/// 报告身份信息（huc、planYear 等），按原始 JSON 对象保存
pub type ReportIdentity = Map<String, Value>;

/// 汇总统计（由 goals / bmps 计算得出，不向后端请求）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "totalGoals", default)]
    pub total_goals: usize,
    #[serde(rename = "totalBMPs", default)]
    pub total_bmps: usize,
    /// 平均完成度（0–100），没有有效数据时为 0
    #[serde(rename = "completionRate", default, deserialize_with = "null_to_default")]
    pub completion_rate: u32,
}

/// 提取报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedReport {
    /// 上传时生成的 GUID，之后不再改变
    pub id: String,
    /// 上传时的种子报告没有该字段，视为 false
    #[serde(default)]
    pub is_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub identity: ReportIdentity,
    #[serde(default, deserialize_with = "null_to_default")]
    pub pollutants: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub goals: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub bmps: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub implementation_activities: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub monitoring_metrics: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub outreach_activities: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub geographic_areas: Vec<ReportItem>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub summary: Summary,
    /// landUse、funding 等未提取的字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractedReport {
    /// 创建上传后的种子报告（所有字段为空，未加载）
    pub fn skeleton(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_loaded: false,
            name: None,
            identity: default_identity(),
            pollutants: Vec::new(),
            goals: Vec::new(),
            bmps: Vec::new(),
            implementation_activities: Vec::new(),
            monitoring_metrics: Vec::new(),
            outreach_activities: Vec::new(),
            geographic_areas: Vec::new(),
            summary: Summary::default(),
            extra: Map::new(),
        }
    }

    /// 将后端返回的字段值合并进报告
    ///
    /// 数组字段直接整体替换，`identity` 需要对象并整体替换，不检查条目内容。
    /// 返回错误时报告保持不变。
    pub fn merge_field(&mut self, key: FieldKey, value: Value) -> Result<(), FieldMergeError> {
        match key {
            FieldKey::Identity => match value {
                Value::Object(identity) => self.identity = identity,
                other => return Err(FieldMergeError::unexpected_shape(key, "object", &other)),
            },
            FieldKey::Pollutants => self.pollutants = array_slot(key, value)?,
            FieldKey::Goals => self.goals = array_slot(key, value)?,
            FieldKey::Bmps => self.bmps = array_slot(key, value)?,
            FieldKey::ImplementationActivities => {
                self.implementation_activities = array_slot(key, value)?
            }
            FieldKey::MonitoringMetrics => self.monitoring_metrics = array_slot(key, value)?,
            FieldKey::OutreachActivities => self.outreach_activities = array_slot(key, value)?,
            FieldKey::GeographicAreas => self.geographic_areas = array_slot(key, value)?,
        }
        Ok(())
    }

    /// 字段当前的条目数（identity 记为 1）
    pub fn slot_len(&self, key: FieldKey) -> usize {
        match key {
            FieldKey::Identity => 1,
            FieldKey::Pollutants => self.pollutants.len(),
            FieldKey::Goals => self.goals.len(),
            FieldKey::Bmps => self.bmps.len(),
            FieldKey::ImplementationActivities => self.implementation_activities.len(),
            FieldKey::MonitoringMetrics => self.monitoring_metrics.len(),
            FieldKey::OutreachActivities => self.outreach_activities.len(),
            FieldKey::GeographicAreas => self.geographic_areas.len(),
        }
    }
}

fn array_slot(key: FieldKey, value: Value) -> Result<Vec<ReportItem>, FieldMergeError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(FieldMergeError::unexpected_shape(key, "array", &other)),
    }
}

/// 上传时的 `identity`：`{ "huc": "" }`
fn default_identity() -> ReportIdentity {
    let mut identity = Map::new();
    identity.insert("huc".to_string(), Value::String(String::new()));
    identity
}

/// null 按默认值处理（旧版本数据中常见）
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
