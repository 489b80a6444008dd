/// 字段提取 API 客户端
///
/// 封装对后端 `/ask` 接口的调用：一次请求只提取一个字段
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::FieldKey;
use crate::utils::logging::truncate_text;
use crate::utils::parse_strict;

/// 字段请求能力
///
/// 实现者必须自行处理超时和解析失败，失败一律返回 `None`，不向上抛错
#[async_trait]
pub trait FieldRequester: Send + Sync {
    /// 请求报告的单个字段
    ///
    /// # 参数
    /// - `report_id`: 上传时生成的报告 ID
    /// - `key`: 字段键
    ///
    /// # 返回
    /// 后端回答中该键对应的 JSON 值；超时、网络错误、JSON 无效或缺少该键时为 `None`
    async fn request(&self, report_id: &str, key: FieldKey) -> Option<Value>;
}

#[async_trait]
impl<T: FieldRequester + ?Sized> FieldRequester for Arc<T> {
    async fn request(&self, report_id: &str, key: FieldKey) -> Option<Value> {
        (**self).request(report_id, key).await
    }
}

/// `/ask` 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest<'a> {
    report_id: &'a str,
    field_key: &'a str,
}

/// `/ask` 响应体，`answer` 本身是 JSON 文本
#[derive(Debug, Deserialize)]
struct AskResponse {
    #[serde(default)]
    answer: Value,
}

/// 基于 HTTP 的字段请求客户端
pub struct HttpFieldRequester {
    client: Client,
    ask_url: String,
    timeout: Duration,
}

impl HttpFieldRequester {
    /// 根据配置创建客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_url(
            config.ask_url(),
            Duration::from_millis(config.ask_timeout_ms),
        )
    }

    /// 使用自定义地址和超时创建客户端
    pub fn with_url(ask_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            ask_url: ask_url.into(),
            timeout,
        })
    }

    /// 发送一次提取请求，返回原始 `answer` 文本
    ///
    /// 超过超时时间时请求 future 被丢弃（连接随之取消），返回超时错误
    pub async fn ask(&self, report_id: &str, key: FieldKey) -> AppResult<String> {
        match tokio::time::timeout(self.timeout, self.send_ask(report_id, key)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::api_timeout(
                &self.ask_url,
                self.timeout.as_millis() as u64,
            )),
        }
    }

    async fn send_ask(&self, report_id: &str, key: FieldKey) -> AppResult<String> {
        let body = AskRequest {
            report_id,
            field_key: key.as_str(),
        };

        debug!("请求字段: {} | 报告 {}", key, report_id);

        let response = self
            .client
            .post(&self.ask_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&self.ask_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::BadResponse {
                endpoint: self.ask_url.clone(),
                status: status.as_u16(),
                message: Some(truncate_text(&text, 200)),
            }
            .into());
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&self.ask_url, e))?;
        let parsed: AskResponse = serde_json::from_str(&text)?;

        let answer = match parsed.answer {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        debug!("字段 {} 回答长度: {} 字符", key, answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl FieldRequester for HttpFieldRequester {
    async fn request(&self, report_id: &str, key: FieldKey) -> Option<Value> {
        match self.ask(report_id, key).await {
            Ok(answer) => {
                let parsed = parse_strict(&answer, key.as_str());
                if parsed.is_none() {
                    warn!(
                        "[报告 {}] ⚠️ 字段 {} 的回答无法解析: {}",
                        report_id,
                        key,
                        truncate_text(&answer, 80)
                    );
                }
                parsed
            }
            Err(e) => {
                warn!("[报告 {}] ⚠️ 字段 {} 请求失败: {}", report_id, key, e);
                None
            }
        }
    }
}
