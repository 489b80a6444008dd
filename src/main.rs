use anyhow::{Context, Result};
use std::path::Path;
use report_extract::utils::logging;
use report_extract::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志（控制台 + 日志文件）
    logging::init(
        config.verbose_logging,
        Some(Path::new(&config.output_log_file)),
    )?;

    // 命令行参数为要提取的报告ID，未指定时处理存储目录中的全部报告
    let report_ids: Vec<String> = std::env::args().skip(1).collect();

    App::initialize(config)
        .await
        .context("应用初始化失败")?
        .run(&report_ids)
        .await?;

    Ok(())
}
