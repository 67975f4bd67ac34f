// ==========================================
// 物料安全数据审批系统 - 问询生命周期管理
// ==========================================
// 职责: 问询的创建、改派、答复；回答"流程是否被阻塞"
// 红线: 问询只能 OPEN → RESOLVED，不可重开
// 红线: 提问与进入评审在同一把锁、同一个事务内完成
// ==========================================

use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Query, QueryPriority, QueryStatus, ReviewTeam, Workflow, WorkflowState};
use crate::engine::error::{require_text, WorkflowError, WorkflowResult};
use crate::engine::state_machine::{WorkflowStateMachine, WorkflowUnit};

// ==========================================
// OpenQuerySummary - OPEN 问询汇总
// ==========================================
// 阻塞判断的唯一依据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenQuerySummary {
    pub open_count: usize,
    pub teams: BTreeSet<ReviewTeam>,
}

impl OpenQuerySummary {
    pub fn from_queries(queries: &[Query]) -> Self {
        queries
            .iter()
            .filter(|q| q.is_open())
            .fold(Self::default(), |mut acc, q| {
                acc.open_count += 1;
                acc.teams.insert(q.assigned_team);
                acc
            })
    }

    pub fn is_blocked(&self) -> bool {
        self.open_count > 0
    }

    pub fn has_team(&self, team: ReviewTeam) -> bool {
        self.teams.contains(&team)
    }
}

// ==========================================
// 锁内问询操作
// ==========================================
impl WorkflowUnit {
    /// 提问并进入评审前的流程状态校验: PLANT_PENDING 或评审态
    fn ensure_accepts_query(&self) -> WorkflowResult<()> {
        self.ensure_not_terminal()?;
        match self.workflow.state {
            WorkflowState::PlantPending
            | WorkflowState::ReviewAPending
            | WorkflowState::ReviewBPending => Ok(()),
            state => Err(WorkflowError::InvalidWorkflowState {
                workflow_id: self.workflow.workflow_id.clone(),
                state,
                operation: "raise_query_and_move_to_review",
            }),
        }
    }

    /// 单独提问只允许 PLANT_PENDING；评审态下提问须同时进入对应评审态
    fn ensure_plant_pending(&self) -> WorkflowResult<()> {
        self.ensure_not_terminal()?;
        match self.workflow.state {
            WorkflowState::PlantPending => Ok(()),
            state => Err(WorkflowError::InvalidWorkflowState {
                workflow_id: self.workflow.workflow_id.clone(),
                state,
                operation: "create_query",
            }),
        }
    }

    fn create_query(
        &mut self,
        team: ReviewTeam,
        question: &str,
        priority: QueryPriority,
        raised_by: &str,
    ) -> Query {
        let query = Query::open(
            Uuid::new_v4().to_string(),
            self.workflow.workflow_id.clone(),
            team,
            question.trim().to_string(),
            priority,
            raised_by.to_string(),
            self.now(),
        );

        tracing::info!(
            workflow_id = %self.workflow.workflow_id,
            query_id = %query.query_id,
            team = %team,
            priority = %priority,
            raised_by = raised_by,
            "问询已创建"
        );

        self.push_query(query.clone());
        query
    }

    /// 进入 `team` 的评审态
    ///
    /// PLANT_PENDING 按转换表进入；已在另一团队评审态时切换为最近进入的团队
    fn enter_review(&mut self, team: ReviewTeam, actor: &str) -> WorkflowResult<()> {
        match self.workflow.state.review_team() {
            None => self.transition(team.review_state(), actor),
            Some(current) if current != team => self.hand_over(team, actor),
            Some(_) => Ok(()),
        }
    }

    fn resolve_query(
        &mut self,
        query_id: &str,
        response: Option<String>,
        resolved_by: &str,
    ) -> WorkflowResult<()> {
        let now = self.now();
        let workflow_id = self.workflow_id().to_string();
        let query = self.query_mut(query_id)?;
        if query.status == QueryStatus::Resolved {
            return Err(WorkflowError::QueryAlreadyResolved {
                query_id: query_id.to_string(),
            });
        }

        query.status = QueryStatus::Resolved;
        query.response = response;
        query.resolved_by = Some(resolved_by.to_string());
        query.resolved_at = Some(now);
        let team = query.assigned_team;

        tracing::info!(
            workflow_id = %workflow_id,
            query_id = query_id,
            team = %team,
            resolved_by = resolved_by,
            "问询已答复"
        );

        self.record_resolution(query_id);
        Ok(())
    }

    /// 改派，返回是否发生了变化
    fn reassign_query(
        &mut self,
        query_id: &str,
        team: ReviewTeam,
        actor: &str,
    ) -> WorkflowResult<bool> {
        let workflow_id = self.workflow_id().to_string();
        let query = self.query_mut(query_id)?;
        if query.status == QueryStatus::Resolved {
            return Err(WorkflowError::QueryAlreadyResolved {
                query_id: query_id.to_string(),
            });
        }

        let previous = query.assigned_team;
        if previous == team {
            return Ok(false);
        }
        query.assigned_team = team;

        tracing::info!(
            workflow_id = %workflow_id,
            query_id = query_id,
            from_team = %previous,
            to_team = %team,
            actor = actor,
            "问询已改派"
        );

        self.record_reassignment(query_id, previous, actor);
        Ok(true)
    }
}

// ==========================================
// QueryLifecycleManager - 问询生命周期管理器
// ==========================================
pub struct QueryLifecycleManager {
    state_machine: Arc<WorkflowStateMachine>,
}

impl QueryLifecycleManager {
    pub fn new(state_machine: Arc<WorkflowStateMachine>) -> Self {
        Self { state_machine }
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 创建 OPEN 问询（不改变流程状态）
    ///
    /// # 错误
    /// - `InvalidWorkflowState`: 流程不在 PLANT_PENDING
    /// - `WorkflowTerminal`: 流程已完成
    pub fn create_query(
        &self,
        workflow_id: &str,
        question: &str,
        team: ReviewTeam,
        priority: QueryPriority,
        raised_by: &str,
    ) -> WorkflowResult<Query> {
        require_text("question", question)?;
        require_text("raised_by", raised_by)?;

        self.state_machine
            .run_locked(workflow_id, |unit| {
                unit.ensure_plant_pending()?;
                Ok(unit.create_query(team, question, priority, raised_by))
            })
            .map(|(query, _)| query)
    }

    /// 提问并进入评审（单锁、单事务）
    pub fn raise_query_and_move_to_review(
        &self,
        workflow_id: &str,
        team: ReviewTeam,
        question: &str,
        priority: QueryPriority,
        actor: &str,
    ) -> WorkflowResult<(Workflow, Query)> {
        require_text("question", question)?;
        require_text("actor", actor)?;

        self.state_machine
            .run_locked(workflow_id, |unit| {
                unit.ensure_accepts_query()?;
                let query = unit.create_query(team, question, priority, actor);
                unit.enter_review(team, actor)?;
                Ok(query)
            })
            .map(|(query, workflow)| (workflow, query))
    }

    /// 答复问询，随后在同一工作单元内评估是否返回 PLANT_PENDING
    ///
    /// # 错误
    /// - `QueryAlreadyResolved`: 问询已答复
    pub fn resolve_query(
        &self,
        query_id: &str,
        response: &str,
        resolved_by: &str,
    ) -> WorkflowResult<Workflow> {
        require_text("resolved_by", resolved_by)?;
        let workflow_id = self.owning_workflow_id(query_id)?;

        let response = Some(response.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        self.state_machine
            .run_locked(&workflow_id, |unit| {
                unit.resolve_query(query_id, response, resolved_by)?;
                unit.realign_review_state(resolved_by)
            })
            .map(|(_, workflow)| workflow)
    }

    /// 改派问询到另一团队（仅 OPEN）
    ///
    /// 改派后若评审态已无对应团队的 OPEN 问询，切换到持有问询的团队
    pub fn assign_to_team(
        &self,
        query_id: &str,
        team: ReviewTeam,
        actor: &str,
    ) -> WorkflowResult<(Workflow, Query)> {
        require_text("actor", actor)?;
        let workflow_id = self.owning_workflow_id(query_id)?;

        self.state_machine
            .run_locked(&workflow_id, |unit| {
                if unit.reassign_query(query_id, team, actor)? {
                    unit.realign_review_state(actor)?;
                }
                unit.query_mut(query_id).map(|q| q.clone())
            })
            .map(|(query, workflow)| (workflow, query))
    }

    // ==========================================
    // 只读
    // ==========================================

    /// 是否存在 OPEN 问询
    pub fn has_open_queries(&self, workflow_id: &str) -> WorkflowResult<bool> {
        self.state_machine.read_locked(workflow_id, |_, queries| {
            OpenQuerySummary::from_queries(queries).is_blocked()
        })
    }

    /// 持有 OPEN 问询的团队
    pub fn open_queries_by_team(&self, workflow_id: &str) -> WorkflowResult<BTreeSet<ReviewTeam>> {
        self.state_machine.read_locked(workflow_id, |_, queries| {
            OpenQuerySummary::from_queries(queries).teams
        })
    }

    /// 流程下的全部问询（按创建时间升序）
    pub fn list_queries(&self, workflow_id: &str) -> WorkflowResult<Vec<Query>> {
        self.state_machine
            .read_locked(workflow_id, |_, queries| queries.to_vec())
    }

    pub fn get_query(&self, query_id: &str) -> WorkflowResult<Query> {
        self.state_machine
            .store()
            .find_query(query_id)?
            .ok_or_else(|| WorkflowError::query_not_found(query_id))
    }

    fn owning_workflow_id(&self, query_id: &str) -> WorkflowResult<String> {
        Ok(self.get_query(query_id)?.workflow_id)
    }
}
