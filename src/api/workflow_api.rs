// ==========================================
// 物料安全数据审批系统 - 审批流程 API
// ==========================================
// 职责: 对外暴露流程/问询/超期报告操作，供传输层调用
// 说明: 本层只做参数整理与组合，规则全部在引擎层
// ==========================================

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::SlaThresholds;
use crate::domain::{ActionLog, NaturalKey, Query, QueryPriority, ReviewTeam, Workflow, WorkflowState};
use crate::engine::error::WorkflowResult;
use crate::engine::query_lifecycle::{OpenQuerySummary, QueryLifecycleManager};
use crate::engine::sla::{OverdueEntry, OverdueEvaluator};
use crate::engine::state_machine::WorkflowStateMachine;
use crate::engine::transitions::allowed_targets;
use crate::repository::ActionLogRepository;

// ==========================================
// DTO
// ==========================================

/// 流程详情
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDetail {
    pub workflow: Workflow,
    pub queries: Vec<Query>,
    pub open_teams: BTreeSet<ReviewTeam>,
    /// 当前可达的目标状态
    pub allowed_targets: Vec<WorkflowState>,
}

// ==========================================
// WorkflowApi - 审批流程 API
// ==========================================

/// 审批流程API
///
/// 职责：
/// 1. 流程创建与状态推进
/// 2. 问询提出、改派、答复
/// 3. 超期报告与审计轨迹查询
pub struct WorkflowApi {
    state_machine: Arc<WorkflowStateMachine>,
    queries: Arc<QueryLifecycleManager>,
    evaluator: Arc<OverdueEvaluator>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl WorkflowApi {
    pub fn new(
        state_machine: Arc<WorkflowStateMachine>,
        queries: Arc<QueryLifecycleManager>,
        evaluator: Arc<OverdueEvaluator>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            state_machine,
            queries,
            evaluator,
            action_log_repo,
        }
    }

    // ==========================================
    // 流程操作
    // ==========================================

    /// 创建审批流程，返回 workflow_id
    pub fn initiate(&self, natural_key: NaturalKey, initiated_by: &str) -> WorkflowResult<String> {
        Ok(self
            .state_machine
            .initiate(natural_key, initiated_by)?
            .workflow_id)
    }

    pub fn extend_to_plant(&self, workflow_id: &str, actor: &str) -> WorkflowResult<Workflow> {
        self.state_machine.extend_to_plant(workflow_id, actor)
    }

    /// 提出问询并进入对应团队的评审态（默认优先级）
    pub fn raise_query_and_move_to_review(
        &self,
        workflow_id: &str,
        team: ReviewTeam,
        question: &str,
        actor: &str,
    ) -> WorkflowResult<Workflow> {
        self.queries
            .raise_query_and_move_to_review(workflow_id, team, question, QueryPriority::Normal, actor)
            .map(|(workflow, _)| workflow)
    }

    /// 提出问询并进入评审，指定优先级，同时返回新问询
    pub fn raise_query_with_priority(
        &self,
        workflow_id: &str,
        team: ReviewTeam,
        question: &str,
        priority: QueryPriority,
        actor: &str,
    ) -> WorkflowResult<(Workflow, Query)> {
        self.queries
            .raise_query_and_move_to_review(workflow_id, team, question, priority, actor)
    }

    /// 仅创建问询，不改变流程状态
    pub fn create_query(
        &self,
        workflow_id: &str,
        question: &str,
        team: ReviewTeam,
        priority: QueryPriority,
        raised_by: &str,
    ) -> WorkflowResult<Query> {
        self.queries
            .create_query(workflow_id, question, team, priority, raised_by)
    }

    /// 已有 OPEN 问询时单独进入评审
    pub fn move_to_review(
        &self,
        workflow_id: &str,
        team: ReviewTeam,
        actor: &str,
    ) -> WorkflowResult<Workflow> {
        self.state_machine.move_to_review(workflow_id, team, actor)
    }

    pub fn resolve_query(
        &self,
        query_id: &str,
        response: &str,
        actor: &str,
    ) -> WorkflowResult<Workflow> {
        self.queries.resolve_query(query_id, response, actor)
    }

    /// 改派问询，返回改派后的流程
    pub fn reassign_query(
        &self,
        query_id: &str,
        team: ReviewTeam,
        actor: &str,
    ) -> WorkflowResult<Workflow> {
        self.queries
            .assign_to_team(query_id, team, actor)
            .map(|(workflow, _)| workflow)
    }

    pub fn complete(&self, workflow_id: &str, actor: &str) -> WorkflowResult<Workflow> {
        self.state_machine.complete(workflow_id, actor)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 超期报告（按 workflow_id 排序）
    pub fn get_overdue_report(&self, thresholds: &SlaThresholds) -> WorkflowResult<Vec<OverdueEntry>> {
        Ok(self.evaluator.evaluate(thresholds)?.entries)
    }

    pub fn get_workflow(&self, workflow_id: &str) -> WorkflowResult<Workflow> {
        self.state_machine.get_workflow(workflow_id)
    }

    pub fn find_by_natural_key(&self, natural_key: &NaturalKey) -> WorkflowResult<Option<Workflow>> {
        self.state_machine.find_by_natural_key(natural_key)
    }

    /// 流程详情（含问询与可达状态）
    ///
    /// 流程与问询来自同一次加锁读取，不会观察到提交中途的组合
    pub fn get_workflow_detail(&self, workflow_id: &str) -> WorkflowResult<WorkflowDetail> {
        let (workflow, queries) = self.state_machine.load_with_queries(workflow_id)?;
        let open = OpenQuerySummary::from_queries(&queries);
        let targets = allowed_targets(workflow_id, workflow.state, &open);

        Ok(WorkflowDetail {
            workflow,
            queries,
            open_teams: open.teams,
            allowed_targets: targets,
        })
    }

    pub fn list_queries(&self, workflow_id: &str) -> WorkflowResult<Vec<Query>> {
        self.queries.list_queries(workflow_id)
    }

    pub fn has_open_queries(&self, workflow_id: &str) -> WorkflowResult<bool> {
        self.queries.has_open_queries(workflow_id)
    }

    pub fn open_queries_by_team(&self, workflow_id: &str) -> WorkflowResult<BTreeSet<ReviewTeam>> {
        self.queries.open_queries_by_team(workflow_id)
    }

    pub fn can_transition_to(&self, workflow_id: &str, target: WorkflowState) -> WorkflowResult<bool> {
        self.state_machine.can_transition_to(workflow_id, target)
    }

    /// 审计轨迹（按时间升序）
    pub fn list_audit_trail(&self, workflow_id: &str) -> WorkflowResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_workflow_id(workflow_id)?)
    }
}
