mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;

use logsift_core::config::Config;
use logsift_log_pipeline::LogPipelineBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::DaemonCli::parse();

    // 설정 로드 및 검증 — 실패하면 파이프라인 시작 전에 비정상 종료
    let config = Config::load(&args.config)
        .await
        .map_err(|e| anyhow::anyhow!("loading config file at {:?}: {}", args.config, e))?;

    logging::init_tracing(&config, args.log_level.as_deref())?;

    if args.validate {
        tracing::info!(config = %args.config.display(), "configuration is valid");
        return Ok(());
    }

    tracing::info!("logsift-daemon starting");

    let mut pipeline = LogPipelineBuilder::new()
        .config(config)
        .build()
        .await
        .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

    pipeline
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("pipeline failed: {}", e))?;

    tracing::info!("exiting");
    Ok(())
}
