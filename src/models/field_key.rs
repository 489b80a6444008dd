use serde::{Deserialize, Serialize};

/// 可提取的字段键
///
/// 顺序即为提取顺序，见 [`FieldKey::ALL`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    /// 报告身份信息（唯一的对象类型字段）
    Identity,
    /// 污染物
    Pollutants,
    /// 目标
    Goals,
    /// 最佳管理措施
    Bmps,
    /// 实施活动
    ImplementationActivities,
    /// 监测指标
    MonitoringMetrics,
    /// 宣传推广活动
    OutreachActivities,
    /// 地理区域
    GeographicAreas,
}

impl FieldKey {
    /// 固定的提取顺序
    pub const ALL: [FieldKey; 8] = [
        FieldKey::Identity,
        FieldKey::Pollutants,
        FieldKey::Goals,
        FieldKey::Bmps,
        FieldKey::ImplementationActivities,
        FieldKey::MonitoringMetrics,
        FieldKey::OutreachActivities,
        FieldKey::GeographicAreas,
    ];

    /// 后端使用的键名
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Identity => "identity",
            FieldKey::Pollutants => "pollutants",
            FieldKey::Goals => "goals",
            FieldKey::Bmps => "bmps",
            FieldKey::ImplementationActivities => "implementationActivities",
            FieldKey::MonitoringMetrics => "monitoringMetrics",
            FieldKey::OutreachActivities => "outreachActivities",
            FieldKey::GeographicAreas => "geographicAreas",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
