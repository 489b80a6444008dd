use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::models::ExtractedReport;
use crate::store::ReportStore;

/// 进程内报告存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    reports: RwLock<HashMap<String, ExtractedReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用已有报告初始化
    pub fn with_reports(reports: impl IntoIterator<Item = ExtractedReport>) -> Self {
        let reports = reports
            .into_iter()
            .map(|report| (report.id.clone(), report))
            .collect();
        Self {
            reports: RwLock::new(reports),
        }
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn get(&self, id: &str) -> AppResult<Option<ExtractedReport>> {
        Ok(self.reports.read().await.get(id).cloned())
    }

    async fn set(&self, id: &str, report: &ExtractedReport) -> AppResult<()> {
        self.reports
            .write()
            .await
            .insert(id.to_string(), report.clone());
        Ok(())
    }
}
