//! 批量报告处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是命令行应用的入口，负责批量报告的提取和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建 HTTP 客户端和存储
//! 2. **批量加载**：读取存储目录中的报告，或按命令行给出的 ID 创建种子报告
//! 3. **并发控制**：使用 Semaphore 限制同时提取的报告数量
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **全局统计**：汇总所有报告的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个字段的细节
//! - **向下委托**：每个报告交给 `OrchestratorDriver` 处理

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::{HttpFieldRequester, JobStatusPoller};
use crate::config::Config;
use crate::models::ExtractedReport;
use crate::orchestrator::driver::OrchestratorDriver;
use crate::orchestrator::report_orchestrator::ReportOrchestrator;
use crate::store::{JsonFileStore, ReportStore};

type FileOrchestrator = ReportOrchestrator<HttpFieldRequester, JsonFileStore>;

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Arc<FileOrchestrator>,
    poller: Option<Arc<JobStatusPoller>>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        info!(
            "🚀 报告字段提取启动 | 接口 {} | 最大并发 {}",
            config.ask_url(),
            config.max_concurrent_reports
        );

        let requester = HttpFieldRequester::new(&config)?;
        let store = JsonFileStore::new(&config.store_folder);
        let orchestrator = Arc::new(ReportOrchestrator::new(
            requester,
            store,
            config.extraction_settings(),
        ));

        let poller = if config.wait_for_ready {
            Some(Arc::new(JobStatusPoller::new(&config)?))
        } else {
            None
        };

        Ok(Self {
            config,
            orchestrator,
            poller,
        })
    }

    /// 运行应用主逻辑
    ///
    /// # 参数
    /// - `report_ids`: 指定要提取的报告；为空时处理存储目录中所有未完成的报告
    pub async fn run(&self, report_ids: &[String]) -> Result<()> {
        let reports = self.load_reports(report_ids).await?;

        if reports.is_empty() {
            warn!("⚠️ 没有找到报告，程序结束");
            return Ok(());
        }

        let (loaded, pending): (Vec<_>, Vec<_>) =
            reports.into_iter().partition(|report| report.is_loaded);
        info!(
            "✓ 待提取 {} 个报告（{} 个已完成，跳过）",
            pending.len(),
            loaded.len()
        );

        if pending.is_empty() {
            info!("✓ 所有报告均已提取完成");
            return Ok(());
        }

        let stats = self.process_all_reports(pending).await?;

        info!(
            "📊 全部完成: 成功 {}/{}，失败 {}，日志: {}",
            stats.success, stats.total, stats.failed, self.config.output_log_file
        );

        Ok(())
    }

    fn max_concurrent(&self) -> usize {
        self.config.max_concurrent_reports.max(1)
    }

    /// 加载报告
    async fn load_reports(&self, report_ids: &[String]) -> Result<Vec<ExtractedReport>> {
        let store = self.orchestrator.store();

        if report_ids.is_empty() {
            info!("\n📁 正在扫描报告目录: {}", store.folder().display());
            return store.load_all().await.context("扫描报告目录失败");
        }

        let mut reports = Vec::with_capacity(report_ids.len());
        for id in report_ids {
            let id = id.trim();
            if id.is_empty() {
                warn!("⚠️ 忽略空的报告ID");
                continue;
            }
            match store.get(id).await? {
                Some(report) => reports.push(report),
                None => {
                    info!("[报告 {}] 存储中不存在，创建种子报告", id);
                    let seed = ExtractedReport::skeleton(id);
                    store.set(id, &seed).await?;
                    reports.push(seed);
                }
            }
        }
        Ok(reports)
    }

    /// 处理所有报告
    async fn process_all_reports(&self, reports: Vec<ExtractedReport>) -> Result<ProcessingStats> {
        let max_concurrent = self.max_concurrent();
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let total = reports.len();
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };
        let total_batches = total.div_ceil(max_concurrent);

        for (batch_index, batch) in reports.chunks(max_concurrent).enumerate() {
            let batch_start = batch_index * max_concurrent;
            let batch_num = batch_index + 1;

            info!(
                "📦 第 {}/{} 批: 报告 {}-{} / 共 {} 个",
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total
            );

            let batch_result = self.process_batch(batch, semaphore.clone()).await?;

            stats.success += batch_result.success;
            stats.failed += batch_result.failed;

            info!(
                "✓ 第 {} 批完成: 成功 {}/{}",
                batch_num,
                batch_result.success,
                batch_result.success + batch_result.failed
            );
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: &[ExtractedReport],
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut handles = Vec::with_capacity(batch.len());

        for report in batch {
            let permit = semaphore.clone().acquire_owned().await?;
            let orchestrator = self.orchestrator.clone();
            let poller = self.poller.clone();
            let report = report.clone();
            let report_id = report.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                extract_report(orchestrator, poller, report).await
            });
            handles.push((report_id, handle));
        }

        let mut result = BatchResult::default();

        for (report_id, handle) in handles {
            match handle.await {
                Ok(true) => result.success += 1,
                Ok(false) => result.failed += 1,
                Err(e) => {
                    error!("[报告 {}] 任务执行失败: {}", report_id, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

/// 提取单个报告，返回报告是否已加载
async fn extract_report(
    orchestrator: Arc<FileOrchestrator>,
    poller: Option<Arc<JobStatusPoller>>,
    report: ExtractedReport,
) -> bool {
    let report_id = report.id.clone();

    if let Some(poller) = poller {
        if let Err(e) = poller.wait_until_ready(&report_id).await {
            error!("[报告 {}] ❌ 后端任务未就绪: {}", report_id, e);
            return false;
        }
    }

    let driver = OrchestratorDriver::new(orchestrator, Some(report));
    match driver.run().await {
        Ok(view) => view.is_loaded(),
        // 驱动器已记录错误
        Err(_) => false,
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}
