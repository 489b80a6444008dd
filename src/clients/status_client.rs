/// 任务状态 API 客户端
///
/// 轮询后端 `/status/{id}`，在字段提取前等待 PDF 处理完成
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};

/// 失败重试间隔上限
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// 单次轮询超时
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);
/// 默认最长等待时间
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// 后端任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Ready,
    Error,
    /// 404 或无法识别的状态
    Missing,
}

impl JobStatus {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "ready" => JobStatus::Ready,
            "error" => JobStatus::Error,
            _ => JobStatus::Missing,
        }
    }

    /// 是否为终止状态（不再轮询）
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Error)
    }
}

/// 单次轮询结果
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// 计算下一次轮询间隔
///
/// 失败时翻倍（不超过 [`MAX_BACKOFF`]），成功时回到基础间隔
pub fn next_backoff(current: Duration, base: Duration, failed: bool) -> Duration {
    if failed {
        current.saturating_mul(2).min(MAX_BACKOFF)
    } else {
        base
    }
}

/// 任务状态轮询器
pub struct JobStatusPoller {
    client: Client,
    base_url: String,
    interval: Duration,
    max_wait: Duration,
}

impl JobStatusPoller {
    /// 根据配置创建轮询器
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_base_url(
            &config.api_base_url,
            Duration::from_millis(config.status_interval_ms),
        )
    }

    /// 使用自定义地址和间隔创建轮询器
    pub fn with_base_url(base_url: impl Into<String>, interval: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(POLL_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            interval,
            max_wait: DEFAULT_MAX_WAIT,
        })
    }

    /// 设置最长等待时间
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    fn endpoint(&self, report_id: &str) -> String {
        format!("{}/status/{}", self.base_url, report_id)
    }

    /// 查询一次任务状态
    ///
    /// 404 视为 `Missing`（任务可能刚创建），其余 4xx/5xx 返回错误
    pub async fn poll_once(&self, report_id: &str) -> AppResult<StatusSnapshot> {
        let endpoint = self.endpoint(report_id);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(StatusSnapshot {
                status: JobStatus::Missing,
                progress: 0.0,
                error: None,
            });
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::BadResponse {
                endpoint,
                status: status.as_u16(),
                message: None,
            }
            .into());
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        Ok(StatusSnapshot {
            status: body
                .status
                .as_deref()
                .map(JobStatus::from_name)
                .unwrap_or(JobStatus::Missing),
            progress: body.progress.unwrap_or(0.0),
            error: body.error,
        })
    }

    /// 轮询直到任务就绪
    ///
    /// # 返回
    /// - `Ok(())`: 状态为 ready
    /// - `Err`: 状态为 error，或超过最长等待时间
    pub async fn wait_until_ready(&self, report_id: &str) -> AppResult<()> {
        let deadline = Instant::now() + self.max_wait;
        let mut delay = self.interval;

        loop {
            match self.poll_once(report_id).await {
                Ok(snapshot) => {
                    debug!(
                        "[报告 {}] 任务状态: {:?} ({}%)",
                        report_id, snapshot.status, snapshot.progress
                    );
                    match snapshot.status {
                        JobStatus::Ready => {
                            info!("[报告 {}] ✓ 后端任务已就绪", report_id);
                            return Ok(());
                        }
                        JobStatus::Error => {
                            return Err(ApiError::BadResponse {
                                endpoint: self.endpoint(report_id),
                                status: StatusCode::OK.as_u16(),
                                message: snapshot.error,
                            }
                            .into());
                        }
                        // 404 时任务可能刚创建，继续轮询
                        JobStatus::Missing | JobStatus::Queued | JobStatus::Processing => {
                            delay = next_backoff(delay, self.interval, false);
                        }
                    }
                }
                Err(e) => {
                    delay = next_backoff(delay, self.interval, true);
                    warn!(
                        "[报告 {}] ⚠️ 状态查询失败: {}，{} 毫秒后重试",
                        report_id,
                        e,
                        delay.as_millis()
                    );
                }
            }

            if Instant::now() + delay > deadline {
                return Err(AppError::api_timeout(
                    self.endpoint(report_id),
                    self.max_wait.as_millis() as u64,
                ));
            }
            tokio::time::sleep(delay).await;
        }
    }
}
