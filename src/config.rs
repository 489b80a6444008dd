use crate::error::{AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "report_extract.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 提取接口配置 ---
    /// 后端 API 地址（不带结尾斜杠）
    pub api_base_url: String,
    /// 字段提取接口路径
    pub ask_path: String,
    /// 单个字段请求的超时时间（毫秒）
    pub ask_timeout_ms: u64,
    /// 两次字段请求之间的间隔（毫秒）
    pub ask_delay_ms: u64,
    /// 开始提取前的等待时间（毫秒）
    pub head_start_ms: u64,
    /// 每批同时请求的字段数量，1 表示顺序请求
    pub batch_size: usize,
    // --- 批量处理配置 ---
    /// 报告 JSON 文件存放目录
    pub store_folder: String,
    /// 同时处理的报告数量
    pub max_concurrent_reports: usize,
    /// 提取前是否等待后端任务就绪
    pub wait_for_ready: bool,
    /// 任务状态轮询间隔（毫秒）
    pub status_interval_ms: u64,
    // --- 日志配置 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8888/api".to_string(),
            ask_path: "/ask".to_string(),
            ask_timeout_ms: 20_000,
            ask_delay_ms: 1_000,
            head_start_ms: 500,
            batch_size: 1,
            store_folder: "reports".to_string(),
            max_concurrent_reports: 4,
            wait_for_ready: false,
            status_interval_ms: 2_500,
            verbose_logging: false,
            output_log_file: "extract_log.txt".to_string(),
        }
    }
}

/// 编排器使用的时间与批量参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// 字段之间的节流间隔
    pub ask_delay: Duration,
    /// 开始前的等待
    pub head_start: Duration,
    /// 每批字段数量（至少为 1）
    pub batch_size: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Config::default().extraction_settings()
    }
}

impl ExtractionSettings {
    /// 不带任何等待的设置，主要用于测试
    pub fn immediate() -> Self {
        Self {
            ask_delay: Duration::ZERO,
            head_start: Duration::ZERO,
            batch_size: 1,
        }
    }
}

impl Config {
    /// 加载配置：默认值 ← 配置文件（可选） ← 环境变量
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("REPORT_EXTRACT_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = Self::from_file_or_default(Path::new(&path))?;
        base.apply_env()
    }

    /// 只从环境变量加载（在默认值之上）
    pub fn from_env() -> AppResult<Self> {
        Self::default().apply_env()
    }

    /// 从 TOML 文件加载，文件不存在时使用默认值
    pub fn from_file_or_default(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// 解析 TOML 文本，缺省的字段使用默认值
    pub fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content).map_err(|source| {
            ConfigError::FileParseFailed {
                path: origin.to_string(),
                source,
            }
        })?;
        Ok(config)
    }

    /// 用环境变量覆盖当前配置
    pub fn apply_env(self) -> AppResult<Self> {
        Ok(Self {
            api_base_url: env_string("API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(self.api_base_url),
            ask_path: env_string("ASK_PATH").unwrap_or(self.ask_path),
            ask_timeout_ms: env_parse("ASK_TIMEOUT_MS", "u64")?.unwrap_or(self.ask_timeout_ms),
            ask_delay_ms: env_parse("ASK_DELAY_MS", "u64")?.unwrap_or(self.ask_delay_ms),
            head_start_ms: env_parse("HEAD_START_MS", "u64")?.unwrap_or(self.head_start_ms),
            batch_size: env_parse("BATCH_SIZE", "usize")?.unwrap_or(self.batch_size),
            store_folder: env_string("STORE_FOLDER").unwrap_or(self.store_folder),
            max_concurrent_reports: env_parse("MAX_CONCURRENT_REPORTS", "usize")?
                .unwrap_or(self.max_concurrent_reports),
            wait_for_ready: env_parse("WAIT_FOR_READY", "bool")?.unwrap_or(self.wait_for_ready),
            status_interval_ms: env_parse("STATUS_INTERVAL_MS", "u64")?
                .unwrap_or(self.status_interval_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
            output_log_file: env_string("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        })
    }

    /// 字段提取接口的完整 URL
    pub fn ask_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), self.ask_path)
    }

    /// 转换为编排器设置
    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            ask_delay: Duration::from_millis(self.ask_delay_ms),
            head_start: Duration::from_millis(self.head_start_ms),
            batch_size: self.batch_size.max(1),
        }
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()),
        },
    }
}
