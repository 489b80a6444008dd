//! 存储层（Store）
//!
//! 以报告 ID 为键的持久化键值存储，只暴露 `get` / `set`。
//!
//! - `MemoryStore` - 进程内存储，测试和嵌入式调用使用
//! - `JsonFileStore` - 每个报告一个 `<id>.json` 文件，批量处理使用

pub mod json_file_store;
pub mod memory_store;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::ExtractedReport;

pub use json_file_store::JsonFileStore;
pub use memory_store::MemoryStore;

/// 报告存储
///
/// 同一个键没有并发写入者，最后一次写入生效
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// 按 ID 读取报告，不存在时返回 `None`
    async fn get(&self, id: &str) -> AppResult<Option<ExtractedReport>>;

    /// 按 ID 写入报告
    async fn set(&self, id: &str, report: &ExtractedReport) -> AppResult<()>;
}

#[async_trait]
impl<T: ReportStore + ?Sized> ReportStore for Arc<T> {
    async fn get(&self, id: &str) -> AppResult<Option<ExtractedReport>> {
        (**self).get(id).await
    }

    async fn set(&self, id: &str, report: &ExtractedReport) -> AppResult<()> {
        (**self).set(id, report).await
    }
}
