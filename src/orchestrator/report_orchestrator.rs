//! 单个报告编排器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责一个报告的完整字段提取，是报告级别的编排器。
//!
//! ## 状态机
//!
//! ```text
//! Idle ──▶ Extracting { key, progress } (每个字段一次) ──▶ Finalizing ──▶ Done
//! ```
//!
//! ## 核心规则
//!
//! 1. **只运行一次**：`is_loaded == true` 的报告直接返回，不发任何请求
//! 2. **同 ID 互斥**：同一 ID 正在提取时，再次调用立即返回 `InFlight`
//! 3. **失败隔离**：单个字段失败只保留原值，不中断循环
//! 4. **进度**：每个字段尝试后更新，结束时一定为 100
//! 5. **先落盘再公开**：汇总 → `is_loaded = true` → 写入存储 → `Done`

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::clients::FieldRequester;
use crate::config::ExtractionSettings;
use crate::error::{AppResult, PreconditionError};
use crate::models::{ExtractedReport, FieldKey};
use crate::services::compute_summary;
use crate::store::ReportStore;

/// 编排状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    /// 已接收种子报告，尚未发出请求
    Idle,
    /// 正在请求 `key`，`progress` 为已完成的百分比
    Extracting { key: FieldKey, progress: u8 },
    /// 所有字段已尝试，正在计算汇总并写入存储
    Finalizing,
    /// 报告已加载
    Done,
}

/// 状态观察者
pub trait ProgressObserver: Send + Sync {
    fn on_state(&self, state: ExtractionState);
}

impl<F> ProgressObserver for F
where
    F: Fn(ExtractionState) + Send + Sync,
{
    fn on_state(&self, state: ExtractionState) {
        self(state)
    }
}

/// 字段处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldStats {
    /// 成功写入的字段数
    pub filled: usize,
    /// 失败（保持原值）的字段数
    pub failed: usize,
}

/// 编排结果
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// 报告已加载，未做任何请求
    AlreadyLoaded(ExtractedReport),
    /// 同一 ID 的提取正在进行，本次未做任何请求
    InFlight,
    /// 提取完成并已写入存储
    Completed {
        report: ExtractedReport,
        stats: FieldStats,
    },
}

impl RunOutcome {
    /// 结果中的报告（`InFlight` 时为 `None`）
    pub fn report(&self) -> Option<&ExtractedReport> {
        match self {
            RunOutcome::AlreadyLoaded(report) | RunOutcome::Completed { report, .. } => {
                Some(report)
            }
            RunOutcome::InFlight => None,
        }
    }
}

/// 报告编排器
///
/// - 持有字段请求能力和存储
/// - 维护正在提取的 ID 集合
/// - 不关心报告从哪里来、结果如何展示
pub struct ReportOrchestrator<R, S> {
    requester: R,
    store: S,
    settings: ExtractionSettings,
    in_flight: Mutex<HashSet<String>>,
}

impl<R, S> ReportOrchestrator<R, S>
where
    R: FieldRequester,
    S: ReportStore,
{
    /// 创建编排器
    pub fn new(requester: R, store: S, settings: ExtractionSettings) -> Self {
        Self {
            requester,
            store,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// 该 ID 是否正在提取
    pub fn is_in_flight(&self, report_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(report_id)
    }

    /// 提取报告的所有字段
    ///
    /// # 参数
    /// - `report`: 种子报告（或已加载的报告）
    /// - `observer`: 状态观察者
    ///
    /// # 返回
    /// - `Err(Precondition)`: 报告 ID 为空
    /// - `Err(Store)`: 最终写入失败，`is_loaded` 未被持久化
    pub async fn run(
        &self,
        report: ExtractedReport,
        observer: &dyn ProgressObserver,
    ) -> AppResult<RunOutcome> {
        if report.id.trim().is_empty() {
            return Err(PreconditionError::MissingReportId.into());
        }

        if report.is_loaded {
            debug!("[报告 {}] 已加载，跳过提取", report.id);
            observer.on_state(ExtractionState::Done);
            return Ok(RunOutcome::AlreadyLoaded(report));
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &report.id) else {
            info!("[报告 {}] 提取已在进行中，跳过", report.id);
            return Ok(RunOutcome::InFlight);
        };

        self.extract(report, observer).await
    }

    async fn extract(
        &self,
        report: ExtractedReport,
        observer: &dyn ProgressObserver,
    ) -> AppResult<RunOutcome> {
        let report_id = report.id.clone();
        let mut draft = report;
        let mut stats = FieldStats::default();

        observer.on_state(ExtractionState::Idle);
        log_report_start(&report_id, &self.settings);

        // 给后端一点准备时间
        if !self.settings.head_start.is_zero() {
            tokio::time::sleep(self.settings.head_start).await;
        }

        let total = FieldKey::ALL.len();
        let batch_size = self.settings.batch_size.max(1);
        let mut completed = 0;

        for (batch_index, batch) in FieldKey::ALL.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.settings.ask_delay.is_zero() {
                tokio::time::sleep(self.settings.ask_delay).await;
            }

            observer.on_state(ExtractionState::Extracting {
                key: batch[0],
                progress: percent(completed, total),
            });
            info!(
                "[报告 {}] 🔍 请求字段 {} ({}/{})",
                report_id,
                batch
                    .iter()
                    .map(|key| key.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                completed + 1,
                total
            );

            let answers = join_all(
                batch
                    .iter()
                    .map(|&key| self.requester.request(&report_id, key)),
            )
            .await;

            for (&key, answer) in batch.iter().zip(answers) {
                merge_answer(&mut draft, key, answer, &mut stats);
                completed += 1;
                observer.on_state(ExtractionState::Extracting {
                    key,
                    progress: percent(completed, total),
                });
            }
        }

        observer.on_state(ExtractionState::Finalizing);
        draft.summary = compute_summary(&draft);
        draft.is_loaded = true;

        self.store.set(&report_id, &draft).await?;

        log_report_complete(&report_id, &draft, &stats);
        observer.on_state(ExtractionState::Done);

        Ok(RunOutcome::Completed {
            report: draft,
            stats,
        })
    }
}

/// 合并单个字段结果，失败时保持原值
fn merge_answer(
    draft: &mut ExtractedReport,
    key: FieldKey,
    answer: Option<Value>,
    stats: &mut FieldStats,
) {
    let Some(value) = answer else {
        warn!("[报告 {}] ⚠️ 字段 {} 无结果，保持原值", draft.id, key);
        stats.failed += 1;
        return;
    };

    match draft.merge_field(key, value) {
        Ok(()) => {
            stats.filled += 1;
            info!(
                "[报告 {}] ✓ 字段 {}: {} 条",
                draft.id,
                key,
                draft.slot_len(key)
            );
        }
        Err(e) => {
            stats.failed += 1;
            warn!("[报告 {}] ⚠️ {}，保持原值", draft.id, e);
        }
    }
}

/// 四舍五入的百分比
fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// 正在提取的 ID 登记，离开作用域时自动注销
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashSet<String>>,
    report_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(registry: &'a Mutex<HashSet<String>>, report_id: &str) -> Option<Self> {
        let inserted = registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(report_id.to_string());
        inserted.then(|| Self {
            registry,
            report_id: report_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.report_id);
    }
}

// ========== 日志辅助函数 ==========

fn log_report_start(report_id: &str, settings: &ExtractionSettings) {
    info!("[报告 {}] 开始提取", report_id);
    info!(
        "[报告 {}] 字段总数: {}，每批 {} 个，间隔 {} 毫秒",
        report_id,
        FieldKey::ALL.len(),
        settings.batch_size,
        settings.ask_delay.as_millis()
    );
}

fn log_report_complete(report_id: &str, report: &ExtractedReport, stats: &FieldStats) {
    info!(
        "[报告 {}] 字段统计: 成功 {}, 保持原值 {}, 总计 {}",
        report_id,
        stats.filled,
        stats.failed,
        FieldKey::ALL.len()
    );
    info!(
        "[报告 {}] 汇总: 目标 {} 个, BMP {} 个, 平均完成度 {}%",
        report_id,
        report.summary.total_goals,
        report.summary.total_bmps,
        report.summary.completion_rate
    );
    info!("[报告 {}] ✅ 提取完成并已保存", report_id);
}
