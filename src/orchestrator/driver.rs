//! 编排驱动器 - 对外展示边界
//!
//! 把编排器的状态整理成调用方（例如 UI）可以直接读取的 [`ReportView`]，
//! 并保证每个报告生命周期只触发一次编排。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, warn};

use crate::clients::FieldRequester;
use crate::error::AppResult;
use crate::models::{ExtractedReport, FieldKey};
use crate::orchestrator::report_orchestrator::{
    ExtractionState, ProgressObserver, ReportOrchestrator, RunOutcome,
};
use crate::store::ReportStore;

/// 对外视图
#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    /// 当前报告；提取过程中仍为种子报告，完成后为最终报告
    pub report: Option<ExtractedReport>,
    /// 是否正在提取
    pub loading: bool,
    /// 0–100
    pub progress: u8,
    /// 正在请求的字段，`None` 表示尚未开始
    pub current_step: Option<FieldKey>,
    /// 是否有可用的本地报告
    pub has_local_copy: bool,
}

impl ReportView {
    /// 根据初始报告构造视图
    pub fn initial(report: Option<&ExtractedReport>) -> Self {
        match report {
            None => Self {
                report: None,
                loading: false,
                progress: 0,
                current_step: None,
                has_local_copy: false,
            },
            Some(report) => Self {
                report: Some(report.clone()),
                loading: !report.is_loaded,
                progress: if report.is_loaded { 100 } else { 0 },
                current_step: None,
                has_local_copy: true,
            },
        }
    }

    /// 报告是否已完成提取
    pub fn is_loaded(&self) -> bool {
        self.report.as_ref().is_some_and(|r| r.is_loaded)
    }
}

/// 把编排状态写入 watch 通道
struct ViewPublisher<'a> {
    tx: &'a watch::Sender<ReportView>,
}

impl ProgressObserver for ViewPublisher<'_> {
    fn on_state(&self, state: ExtractionState) {
        self.tx.send_modify(|view| match state {
            ExtractionState::Idle => {
                view.loading = true;
                view.progress = 0;
                view.current_step = None;
            }
            ExtractionState::Extracting { key, progress } => {
                view.current_step = Some(key);
                view.progress = view.progress.max(progress);
            }
            ExtractionState::Finalizing => {}
            ExtractionState::Done => view.progress = 100,
        });
    }
}

/// 编排驱动器
///
/// 职责：
/// - 判断是否需要编排（无报告、ID 为空、已加载时不需要）
/// - 最多触发一次编排
/// - 存储写入成功后才公开最终报告并结束 `loading`
pub struct OrchestratorDriver<R, S> {
    orchestrator: Arc<ReportOrchestrator<R, S>>,
    initial: Option<ExtractedReport>,
    view_tx: watch::Sender<ReportView>,
    started: AtomicBool,
}

impl<R, S> OrchestratorDriver<R, S>
where
    R: FieldRequester,
    S: ReportStore,
{
    /// 创建驱动器
    ///
    /// # 参数
    /// - `orchestrator`: 共享的编排器
    /// - `initial`: 初始报告；为 `None` 或 ID 为空时视为没有本地报告
    pub fn new(orchestrator: Arc<ReportOrchestrator<R, S>>, initial: Option<ExtractedReport>) -> Self {
        let initial = initial.filter(|report| {
            let has_id = !report.id.trim().is_empty();
            if !has_id {
                warn!("⚠️ 报告缺少ID，不进行提取");
            }
            has_id
        });
        let (view_tx, _) = watch::channel(ReportView::initial(initial.as_ref()));

        Self {
            orchestrator,
            initial,
            view_tx,
            started: AtomicBool::new(false),
        }
    }

    /// 从编排器的存储中按 ID 读取初始报告
    pub async fn from_store(
        orchestrator: Arc<ReportOrchestrator<R, S>>,
        report_id: &str,
    ) -> AppResult<Self> {
        let initial = if report_id.trim().is_empty() {
            None
        } else {
            orchestrator.store().get(report_id).await?
        };
        Ok(Self::new(orchestrator, initial))
    }

    /// 订阅视图变化
    pub fn subscribe(&self) -> watch::Receiver<ReportView> {
        self.view_tx.subscribe()
    }

    /// 当前视图
    pub fn view(&self) -> ReportView {
        self.view_tx.borrow().clone()
    }

    /// 触发编排并等待结束
    ///
    /// 重复调用只返回当前视图，不会再次编排
    ///
    /// # 返回
    /// 编排结束后的视图；存储写入失败时返回错误，视图中的报告仍为种子报告
    pub async fn run(&self) -> AppResult<ReportView> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(self.view());
        }

        let Some(report) = self.initial.clone() else {
            return Ok(self.view());
        };
        let report_id = report.id.clone();

        let publisher = ViewPublisher { tx: &self.view_tx };
        match self.orchestrator.run(report, &publisher).await {
            Ok(RunOutcome::Completed { report, .. }) | Ok(RunOutcome::AlreadyLoaded(report)) => {
                self.view_tx.send_modify(|view| {
                    view.report = Some(report);
                    view.progress = 100;
                    view.loading = false;
                });
            }
            Ok(RunOutcome::InFlight) => {
                self.view_tx.send_modify(|view| view.loading = false);
            }
            Err(e) => {
                error!("[报告 {}] ❌ 提取失败: {}", report_id, e);
                self.view_tx.send_modify(|view| view.loading = false);
                return Err(e);
            }
        }

        Ok(self.view())
    }
}
