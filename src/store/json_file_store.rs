use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, StoreError};
use crate::models::ExtractedReport;
use crate::store::ReportStore;

/// 文件报告存储
///
/// 每个报告保存为 `<folder>/<id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    folder: PathBuf,
}

impl JsonFileStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// 报告文件路径，ID 不能包含路径分隔符
    fn path_for(&self, id: &str) -> AppResult<PathBuf> {
        if id.is_empty() || id.contains(|c| c == '/' || c == '\\') || id.contains("..") {
            return Err(AppError::store_read_failed(
                id,
                io::Error::new(io::ErrorKind::InvalidInput, "非法的报告ID"),
            ));
        }
        Ok(self.folder.join(format!("{}.json", id)))
    }

    /// 加载目录中的所有报告
    ///
    /// 解析失败的文件只记录警告并跳过
    pub async fn load_all(&self) -> AppResult<Vec<ExtractedReport>> {
        if !self.folder.exists() {
            warn!("报告目录不存在: {}", self.folder.display());
            return Ok(Vec::new());
        }

        let folder = self.folder.display().to_string();
        let mut entries = fs::read_dir(&self.folder)
            .await
            .map_err(|e| AppError::store_read_failed(&folder, e))?;

        let mut reports = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::store_read_failed(&folder, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match read_report(&path).await {
                Ok(report) => {
                    debug!(
                        "已加载报告: {}",
                        path.file_name().unwrap_or_default().to_string_lossy()
                    );
                    reports.push(report);
                }
                Err(e) => warn!("加载报告失败 {}: {}", path.display(), e),
            }
        }

        reports.sort_by(|a, b| a.id.cmp(&b.id));
        info!("📁 从 {} 加载了 {} 个报告", folder, reports.len());
        Ok(reports)
    }
}

async fn read_report(path: &Path) -> AppResult<ExtractedReport> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::store_read_failed(path.display().to_string(), e))?;
    serde_json::from_str(&content).map_err(|source| {
        StoreError::Malformed {
            id: path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            source,
        }
        .into()
    })
}

#[async_trait]
impl ReportStore for JsonFileStore {
    async fn get(&self, id: &str) -> AppResult<Option<ExtractedReport>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        read_report(&path).await.map(Some)
    }

    async fn set(&self, id: &str, report: &ExtractedReport) -> AppResult<()> {
        let path = self.path_for(id)?;
        let content = serde_json::to_string_pretty(report).map_err(|source| StoreError::Malformed {
            id: id.to_string(),
            source,
        })?;

        fs::create_dir_all(&self.folder)
            .await
            .map_err(|e| AppError::store_write_failed(self.folder.display().to_string(), e))?;

        // 先写临时文件再改名，避免写一半的文件
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| AppError::store_write_failed(tmp_path.display().to_string(), e))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| AppError::store_write_failed(path.display().to_string(), e))?;

        debug!("报告已写入: {}", path.display());
        Ok(())
    }
}
