// ==========================================
// 物料安全数据审批系统 - 审计轨迹 Hook
// ==========================================
// 职责: 把每次成功的变更写入 action_log
// 红线: 写入失败按 hook 策略处理（记录告警，不回滚状态变更）
// ==========================================

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ActionLog, ActionType, Query, ReviewTeam, Workflow, WorkflowState};
use crate::engine::clock::Clock;
use crate::engine::hooks::{HookResult, NotificationHook};
use crate::engine::sla::OverdueEntry;
use crate::repository::ActionLogRepository;

/// 系统操作人（超期巡检）
pub const SYSTEM_ACTOR: &str = "system";

pub struct AuditTrailHook {
    repo: Arc<ActionLogRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditTrailHook {
    pub fn new(repo: Arc<ActionLogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    fn log(&self, workflow_id: &str, action_type: ActionType, actor: &str) -> ActionLog {
        ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(workflow_id.to_string()),
            action_type,
            actor.to_string(),
            self.clock.now(),
        )
    }

    fn write(&self, log: ActionLog) -> HookResult {
        self.repo.insert(&log)?;
        Ok(())
    }
}

impl NotificationHook for AuditTrailHook {
    fn name(&self) -> &str {
        "audit_trail"
    }

    fn on_workflow_created(&self, workflow: &Workflow, actor: &str) -> HookResult {
        let log = self
            .log(&workflow.workflow_id, ActionType::WorkflowCreated, actor)
            .with_payload(&workflow.natural_key)
            .with_detail(format!("创建审批流程 {}", workflow.natural_key));
        self.write(log)
    }

    fn on_state_changed(&self, workflow: &Workflow, from: WorkflowState, actor: &str) -> HookResult {
        let log = self
            .log(&workflow.workflow_id, ActionType::StateChanged, actor)
            .with_payload(&json!({
                "from": from,
                "to": workflow.state,
                "revision": workflow.revision,
            }))
            .with_detail(format!("{} → {}", from, workflow.state));
        self.write(log)
    }

    fn on_query_raised(&self, workflow: &Workflow, query: &Query) -> HookResult {
        let log = self
            .log(&workflow.workflow_id, ActionType::QueryRaised, &query.raised_by)
            .with_query_id(&query.query_id)
            .with_payload(&json!({
                "team": query.assigned_team,
                "priority": query.priority,
                "question": query.question,
            }));
        self.write(log)
    }

    fn on_query_resolved(&self, workflow: &Workflow, query: &Query) -> HookResult {
        let actor = query.resolved_by.as_deref().unwrap_or(SYSTEM_ACTOR);
        let log = self
            .log(&workflow.workflow_id, ActionType::QueryResolved, actor)
            .with_query_id(&query.query_id)
            .with_payload(&json!({
                "team": query.assigned_team,
                "response": query.response,
                "workflow_state": workflow.state,
            }));
        self.write(log)
    }

    fn on_query_reassigned(
        &self,
        workflow: &Workflow,
        query: &Query,
        previous_team: ReviewTeam,
        actor: &str,
    ) -> HookResult {
        let log = self
            .log(&workflow.workflow_id, ActionType::QueryReassigned, actor)
            .with_query_id(&query.query_id)
            .with_payload(&json!({
                "from_team": previous_team,
                "to_team": query.assigned_team,
            }));
        self.write(log)
    }

    fn on_overdue(&self, entry: &OverdueEntry) -> HookResult {
        let log = self
            .log(&entry.workflow_id, ActionType::Overdue, SYSTEM_ACTOR)
            .with_payload(entry)
            .with_detail(format!(
                "{} 超期 {} 秒",
                entry.state, entry.overdue_by_seconds
            ));
        self.write(log)
    }
}
