//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `report_orchestrator` - 单个报告编排器
//! - 按固定顺序逐个（或分批）请求 8 个字段
//! - 合并结果、计算汇总、写入存储
//! - 同一 ID 同时只允许一次提取
//!
//! ### `driver` - 编排驱动器
//! - 决定是否需要提取
//! - 把编排状态发布为 `ReportView`
//! - 存储写入成功后才公开最终报告
//!
//! ### `batch_processor` - 批量报告处理器
//! - 命令行应用生命周期（初始化、运行）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<ExtractedReport>)
//!     ↓
//! driver (处理单个报告的展示状态)
//!     ↓
//! report_orchestrator (处理 8 个字段)
//!     ↓
//! clients / services / store
//! ```

pub mod batch_processor;
pub mod driver;
pub mod report_orchestrator;

pub use batch_processor::App;
pub use driver::{OrchestratorDriver, ReportView};
pub use report_orchestrator::{
    ExtractionState, FieldStats, ProgressObserver, ReportOrchestrator, RunOutcome,
};
