// ==========================================
// 物料安全数据审批系统 - 主入口
// ==========================================
// 启动: 初始化日志 → 组装 AppState → 启动超期巡检 → 等待 Ctrl-C
// ==========================================

use anyhow::Context;
use msds_workflow::app::{get_default_db_path, AppState};
use msds_workflow::logging;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    if std::env::var("MSDS_WORKFLOW_LOG_JSON").is_ok() {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{}", msds_workflow::APP_NAME);
    tracing::info!("系统版本: {}", msds_workflow::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    match app_state.config_manager.get_config_snapshot() {
        Ok(snapshot) => tracing::info!(config = %snapshot, "当前配置"),
        Err(e) => tracing::warn!(error = %e, "读取配置快照失败"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = app_state.sweeper.clone().spawn(shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("无法监听 Ctrl-C 信号")?;
    tracing::info!("收到退出信号，正在停止...");

    shutdown_tx.send(true).ok();
    sweeper.await.context("超期巡检任务异常退出")?;

    let metrics = app_state.metrics.snapshot();
    tracing::info!(?metrics, "已退出");
    Ok(())
}
