// ==========================================
// 物料安全数据审批系统 - 通知 Hook
// ==========================================
// 职责: 定义状态变更后的通知接口，实现依赖倒置
// 说明: Engine 层定义 trait，通知/审计/指标由外部实现
// 红线: hook 在流程锁释放后调用；失败只记录日志，不回滚已持久化的变更
// ==========================================

use crate::domain::{Query, ReviewTeam, Workflow, WorkflowState};
use crate::engine::sla::OverdueEntry;
use serde::Serialize;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hook 返回类型
pub type HookResult = Result<(), Box<dyn Error + Send + Sync>>;

// ==========================================
// NotificationHook Trait
// ==========================================

/// 流程通知 Hook
///
/// 所有方法默认空实现，实现者只覆盖关心的事件。
/// 传入的流程快照为提交后的状态。
pub trait NotificationHook: Send + Sync {
    /// Hook 名称（用于日志）
    fn name(&self) -> &str {
        "anonymous"
    }

    fn on_workflow_created(&self, _workflow: &Workflow, _actor: &str) -> HookResult {
        Ok(())
    }

    fn on_state_changed(
        &self,
        _workflow: &Workflow,
        _from: WorkflowState,
        _actor: &str,
    ) -> HookResult {
        Ok(())
    }

    fn on_query_raised(&self, _workflow: &Workflow, _query: &Query) -> HookResult {
        Ok(())
    }

    fn on_query_resolved(&self, _workflow: &Workflow, _query: &Query) -> HookResult {
        Ok(())
    }

    fn on_query_reassigned(
        &self,
        _workflow: &Workflow,
        _query: &Query,
        _previous_team: ReviewTeam,
        _actor: &str,
    ) -> HookResult {
        Ok(())
    }

    fn on_overdue(&self, _entry: &OverdueEntry) -> HookResult {
        Ok(())
    }
}

// ==========================================
// 通知事件（锁内收集，锁外派发）
// ==========================================

#[derive(Debug, Clone)]
pub enum WorkflowNotification {
    Created {
        workflow: Workflow,
        actor: String,
    },
    StateChanged {
        workflow: Workflow,
        from: WorkflowState,
        actor: String,
    },
    QueryRaised {
        workflow: Workflow,
        query: Query,
    },
    QueryResolved {
        workflow: Workflow,
        query: Query,
    },
    QueryReassigned {
        workflow: Workflow,
        query: Query,
        previous_team: ReviewTeam,
        actor: String,
    },
    Overdue(OverdueEntry),
}

impl WorkflowNotification {
    /// 事件类型标识
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowNotification::Created { .. } => "WorkflowCreated",
            WorkflowNotification::StateChanged { .. } => "StateChanged",
            WorkflowNotification::QueryRaised { .. } => "QueryRaised",
            WorkflowNotification::QueryResolved { .. } => "QueryResolved",
            WorkflowNotification::QueryReassigned { .. } => "QueryReassigned",
            WorkflowNotification::Overdue(_) => "Overdue",
        }
    }

    fn workflow_id(&self) -> &str {
        match self {
            WorkflowNotification::Created { workflow, .. }
            | WorkflowNotification::StateChanged { workflow, .. }
            | WorkflowNotification::QueryRaised { workflow, .. }
            | WorkflowNotification::QueryResolved { workflow, .. }
            | WorkflowNotification::QueryReassigned { workflow, .. } => &workflow.workflow_id,
            WorkflowNotification::Overdue(entry) => &entry.workflow_id,
        }
    }

    fn deliver(&self, hook: &dyn NotificationHook) -> HookResult {
        match self {
            WorkflowNotification::Created { workflow, actor } => {
                hook.on_workflow_created(workflow, actor)
            }
            WorkflowNotification::StateChanged {
                workflow,
                from,
                actor,
            } => hook.on_state_changed(workflow, *from, actor),
            WorkflowNotification::QueryRaised { workflow, query } => {
                hook.on_query_raised(workflow, query)
            }
            WorkflowNotification::QueryResolved { workflow, query } => {
                hook.on_query_resolved(workflow, query)
            }
            WorkflowNotification::QueryReassigned {
                workflow,
                query,
                previous_team,
                actor,
            } => hook.on_query_reassigned(workflow, query, *previous_team, actor),
            WorkflowNotification::Overdue(entry) => hook.on_overdue(entry),
        }
    }
}

// ==========================================
// HookDispatcher - Hook 派发器
// ==========================================

/// 按注册顺序把事件派发给所有 hook
///
/// 单个 hook 失败不影响其他 hook，也不向调用方返回错误
#[derive(Default, Clone)]
pub struct HookDispatcher {
    hooks: Vec<Arc<dyn NotificationHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 hook
    pub fn with_hook(mut self, hook: Arc<dyn NotificationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// 派发事件，返回失败次数
    pub fn dispatch(&self, notifications: &[WorkflowNotification]) -> usize {
        let mut failures = 0;

        for notification in notifications {
            for hook in &self.hooks {
                if let Err(e) = notification.deliver(hook.as_ref()) {
                    failures += 1;
                    tracing::warn!(
                        hook = hook.name(),
                        event = notification.kind(),
                        workflow_id = %notification.workflow_id(),
                        error = %e,
                        "通知 hook 执行失败，已忽略"
                    );
                }
            }
        }

        failures
    }
}

// ==========================================
// WorkflowMetricsHook - 计数器
// ==========================================

/// 内存计数器（观测用，不属于流程状态）
#[derive(Debug, Default)]
pub struct WorkflowMetricsHook {
    workflows_created: AtomicU64,
    state_changes: AtomicU64,
    workflows_completed: AtomicU64,
    queries_raised: AtomicU64,
    queries_resolved: AtomicU64,
    queries_reassigned: AtomicU64,
    overdue_flags: AtomicU64,
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowMetricsSnapshot {
    pub workflows_created: u64,
    pub state_changes: u64,
    pub workflows_completed: u64,
    pub queries_raised: u64,
    pub queries_resolved: u64,
    pub queries_reassigned: u64,
    pub overdue_flags: u64,
}

impl WorkflowMetricsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WorkflowMetricsSnapshot {
        WorkflowMetricsSnapshot {
            workflows_created: self.workflows_created.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
            workflows_completed: self.workflows_completed.load(Ordering::Relaxed),
            queries_raised: self.queries_raised.load(Ordering::Relaxed),
            queries_resolved: self.queries_resolved.load(Ordering::Relaxed),
            queries_reassigned: self.queries_reassigned.load(Ordering::Relaxed),
            overdue_flags: self.overdue_flags.load(Ordering::Relaxed),
        }
    }
}

impl NotificationHook for WorkflowMetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_workflow_created(&self, _workflow: &Workflow, _actor: &str) -> HookResult {
        self.workflows_created.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_state_changed(&self, workflow: &Workflow, _from: WorkflowState, _actor: &str) -> HookResult {
        self.state_changes.fetch_add(1, Ordering::Relaxed);
        if workflow.is_completed() {
            self.workflows_completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn on_query_raised(&self, _workflow: &Workflow, _query: &Query) -> HookResult {
        self.queries_raised.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_query_resolved(&self, _workflow: &Workflow, _query: &Query) -> HookResult {
        self.queries_resolved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_query_reassigned(
        &self,
        _workflow: &Workflow,
        _query: &Query,
        _previous_team: ReviewTeam,
        _actor: &str,
    ) -> HookResult {
        self.queries_reassigned.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_overdue(&self, _entry: &OverdueEntry) -> HookResult {
        self.overdue_flags.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NaturalKey;
    use chrono::NaiveDate;

    struct FailingHook;

    impl NotificationHook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_workflow_created(&self, _workflow: &Workflow, _actor: &str) -> HookResult {
            Err("mail server down".into())
        }
    }

    fn sample_workflow() -> Workflow {
        let now = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Workflow::new(
            "wf1".to_string(),
            NaturalKey::new("P1", "M1", "PL1", "B1"),
            "alice".to_string(),
            now,
        )
    }

    #[test]
    fn test_failure_does_not_stop_other_hooks() {
        let metrics = Arc::new(WorkflowMetricsHook::new());
        let dispatcher = HookDispatcher::new()
            .with_hook(Arc::new(FailingHook))
            .with_hook(metrics.clone());

        let failures = dispatcher.dispatch(&[WorkflowNotification::Created {
            workflow: sample_workflow(),
            actor: "alice".to_string(),
        }]);

        assert_eq!(failures, 1);
        assert_eq!(metrics.snapshot().workflows_created, 1);
    }

    #[test]
    fn test_metrics_count_completion() {
        let metrics = WorkflowMetricsHook::new();
        let mut wf = sample_workflow();
        metrics
            .on_state_changed(&wf, WorkflowState::OriginPending, "bob")
            .unwrap();
        wf.state = WorkflowState::Completed;
        metrics
            .on_state_changed(&wf, WorkflowState::PlantPending, "bob")
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.state_changes, 2);
        assert_eq!(snap.workflows_completed, 1);
    }

    #[test]
    fn test_empty_dispatcher_is_noop() {
        let dispatcher = HookDispatcher::new();
        assert!(dispatcher.is_empty());
        assert_eq!(
            dispatcher.dispatch(&[WorkflowNotification::Created {
                workflow: sample_workflow(),
                actor: "alice".to_string(),
            }]),
            0
        );
    }
}
