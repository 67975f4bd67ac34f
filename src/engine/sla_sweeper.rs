// ==========================================
// 物料安全数据审批系统 - 超期巡检任务
// ==========================================
// 职责: 定时运行超期评估，把超期条目派发给 on_overdue hook
// 红线: 只读流程数据，不改变任何流程状态
// 附带: 清理流程锁登记表中的空闲锁槽
// ==========================================

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{SlaConfigReader, SlaThresholds};
use crate::config::config_manager::DEFAULT_SWEEP_INTERVAL_SECS;
use crate::engine::context::WorkflowContext;
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::hooks::WorkflowNotification;
use crate::engine::sla::{OverdueEvaluator, OverdueReport};

/// 超期巡检
pub struct OverdueSweeper {
    ctx: WorkflowContext,
    evaluator: Arc<OverdueEvaluator>,
    config: Arc<dyn SlaConfigReader>,
}

impl OverdueSweeper {
    pub fn new(
        ctx: WorkflowContext,
        evaluator: Arc<OverdueEvaluator>,
        config: Arc<dyn SlaConfigReader>,
    ) -> Self {
        Self {
            ctx,
            evaluator,
            config,
        }
    }

    /// 执行一次巡检
    ///
    /// 配置读取失败时使用默认阈值继续
    pub async fn sweep_once(&self) -> WorkflowResult<OverdueReport> {
        let thresholds = match self.config.get_sla_thresholds().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "读取超期阈值失败，使用默认值");
                SlaThresholds::default()
            }
        };

        let evaluator = self.evaluator.clone();
        let report = tokio::task::spawn_blocking(move || evaluator.evaluate(&thresholds))
            .await
            .map_err(|e| {
                WorkflowError::Storage(crate::repository::RepositoryError::Other(
                    anyhow::anyhow!("超期评估任务异常退出: {}", e),
                ))
            })??;

        let notifications: Vec<WorkflowNotification> = report
            .entries
            .iter()
            .cloned()
            .map(WorkflowNotification::Overdue)
            .collect();

        let hooks = self.ctx.hooks.clone();
        let failures = tokio::task::spawn_blocking(move || hooks.dispatch(&notifications))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "超期通知派发任务异常退出");
                0
            });

        let pruned = self.ctx.locks.prune_idle();

        tracing::info!(
            scanned = report.scanned,
            overdue = report.entries.len(),
            hook_failures = failures,
            pruned_lock_slots = pruned,
            live_lock_slots = self.ctx.locks.len(),
            "超期巡检完成"
        );
        tracing::debug!(overdue_ids = ?report.overdue_ids(), "超期流程");

        Ok(report)
    }

    /// 巡检循环，收到关闭信号后退出
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let interval_secs = match self.config.get_sweep_interval_secs().await {
            Ok(secs) if secs > 0 => secs,
            Ok(_) => DEFAULT_SWEEP_INTERVAL_SECS,
            Err(e) => {
                tracing::warn!(error = %e, "读取巡检间隔失败，使用默认值");
                DEFAULT_SWEEP_INTERVAL_SECS
            }
        };
        tracing::info!(interval_secs, "超期巡检已启动");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if let Err(e) = self.sweep_once().await {
                tracing::warn!(error = %e, code = e.code(), "超期巡检失败");
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!("超期巡检已停止");
    }

    /// 在 tokio 运行时上启动巡检循环
    pub fn spawn(self: Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown_rx).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NaturalKey;
    use crate::engine::clock::FixedClock;
    use crate::engine::hooks::{HookDispatcher, WorkflowMetricsHook};
    use crate::engine::state_machine::WorkflowStateMachine;
    use crate::repository::WorkflowRepository;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::error::Error;
    use std::sync::Mutex;

    struct StaticConfig(SlaThresholds);

    #[async_trait]
    impl SlaConfigReader for StaticConfig {
        async fn get_sla_thresholds(&self) -> Result<SlaThresholds, Box<dyn Error + Send + Sync>> {
            Ok(self.0.clone())
        }

        async fn get_sweep_interval_secs(&self) -> Result<u64, Box<dyn Error + Send + Sync>> {
            Ok(1)
        }
    }

    struct BrokenConfig;

    #[async_trait]
    impl SlaConfigReader for BrokenConfig {
        async fn get_sla_thresholds(&self) -> Result<SlaThresholds, Box<dyn Error + Send + Sync>> {
            Err("config table missing".into())
        }

        async fn get_sweep_interval_secs(&self) -> Result<u64, Box<dyn Error + Send + Sync>> {
            Err("config table missing".into())
        }
    }

    fn build(
        config: Arc<dyn SlaConfigReader>,
    ) -> (OverdueSweeper, Arc<WorkflowStateMachine>, Arc<FixedClock>, Arc<WorkflowMetricsHook>) {
        let conn = crate::db::open_in_memory().unwrap();
        let repo = Arc::new(WorkflowRepository::from_connection(Arc::new(Mutex::new(conn))));
        let clock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2026, 5, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ));
        let metrics = Arc::new(WorkflowMetricsHook::new());
        let hooks = Arc::new(HookDispatcher::new().with_hook(metrics.clone()));
        let ctx = WorkflowContext::new(repo.clone(), clock.clone(), hooks);
        let evaluator = Arc::new(OverdueEvaluator::new(repo, clock.clone()));
        let sm = Arc::new(WorkflowStateMachine::new(ctx.clone()));
        (OverdueSweeper::new(ctx, evaluator, config), sm, clock, metrics)
    }

    #[tokio::test]
    async fn test_sweep_flags_without_mutating() {
        let (sweeper, sm, clock, metrics) = build(Arc::new(StaticConfig(SlaThresholds::uniform(1))));
        let wf = sm
            .initiate(NaturalKey::new("P1", "M1", "PL1", "B1"), "alice")
            .unwrap();

        assert!(sweeper.sweep_once().await.unwrap().entries.is_empty());

        clock.advance(ChronoDuration::hours(2));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.overdue_ids(), vec![wf.workflow_id.as_str()]);
        assert_eq!(metrics.snapshot().overdue_flags, 1);
        assert_eq!(sm.get_workflow(&wf.workflow_id).unwrap(), wf);
    }

    #[tokio::test]
    async fn test_sweep_falls_back_to_default_thresholds() {
        let (sweeper, sm, clock, _) = build(Arc::new(BrokenConfig));
        sm.initiate(NaturalKey::new("P1", "M1", "PL1", "B1"), "alice")
            .unwrap();

        clock.advance(ChronoDuration::hours(71));
        assert!(sweeper.sweep_once().await.unwrap().entries.is_empty());
        clock.advance(ChronoDuration::hours(2));
        assert_eq!(sweeper.sweep_once().await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (sweeper, _, _, _) = build(Arc::new(StaticConfig(SlaThresholds::default())));
        let (tx, rx) = watch::channel(false);
        let handle = Arc::new(sweeper).spawn(rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
