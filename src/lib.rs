//! # Report Extract
//!
//! 流域管理计划报告的字段提取客户端
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 模型层（Models）
//! - `models/` - 报告结构、字段键、汇总
//!
//! ### ② 能力层（Clients / Services / Store）
//! - `clients/` - `FieldRequester`（`/ask`）和 `JobStatusPoller`（`/status`）
//! - `services/` - `compute_summary` 汇总计算
//! - `store/` - `ReportStore`（内存 / JSON 文件）
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/report_orchestrator` - 单个报告的字段提取
//! - `orchestrator/driver` - 对外视图与一次性触发
//! - `orchestrator/batch_processor` - 命令行批量处理
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;

// 重新导出常用类型
pub use clients::{FieldRequester, HttpFieldRequester, JobStatusPoller};
pub use config::{Config, ExtractionSettings};
pub use error::{AppError, AppResult};
pub use models::{ExtractedReport, FieldKey, Summary};
pub use orchestrator::{
    App, ExtractionState, OrchestratorDriver, ReportOrchestrator, ReportView, RunOutcome,
};
pub use services::compute_summary;
pub use store::{JsonFileStore, MemoryStore, ReportStore};
