// ==========================================
// 物料安全数据审批系统 - 流程状态机
// ==========================================
// 职责: 维护流程的权威状态，校验并执行状态转换
// 执行顺序: 加锁 → 读取流程+问询 → 查转换表 → 单事务提交 → 解锁 → 派发 hook
// 红线: 流程状态只能经由本模块修改；COMPLETED 后不可再变
// ==========================================

use chrono::NaiveDateTime;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NaturalKey, Query, ReviewTeam, Workflow, WorkflowState};
use crate::engine::context::WorkflowContext;
use crate::engine::error::{require_text, WorkflowError, WorkflowResult};
use crate::engine::hooks::WorkflowNotification;
use crate::engine::locks::lock_slot;
use crate::engine::query_lifecycle::OpenQuerySummary;
use crate::engine::transitions::{check_review_handover, check_transition};
use crate::repository::{RecordStore, RepositoryError, WorkflowChangeSet};

// ==========================================
// WorkflowUnit - 锁内工作单元
// ==========================================
// 持有本次操作读到的流程与问询，记录改动，提交后转为通知
pub(crate) struct WorkflowUnit {
    pub(crate) workflow: Workflow,
    pub(crate) queries: Vec<Query>,
    now: NaiveDateTime,
    workflow_dirty: bool,
    touched_queries: Vec<String>,
    events: Vec<UnitEvent>,
}

enum UnitEvent {
    StateChanged {
        from: WorkflowState,
        actor: String,
    },
    QueryRaised {
        query_id: String,
    },
    QueryResolved {
        query_id: String,
    },
    QueryReassigned {
        query_id: String,
        previous_team: ReviewTeam,
        actor: String,
    },
}

impl WorkflowUnit {
    fn new(workflow: Workflow, queries: Vec<Query>, now: NaiveDateTime) -> Self {
        Self {
            workflow,
            queries,
            now,
            workflow_dirty: false,
            touched_queries: Vec::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub(crate) fn workflow_id(&self) -> &str {
        &self.workflow.workflow_id
    }

    pub(crate) fn open_summary(&self) -> OpenQuerySummary {
        OpenQuerySummary::from_queries(&self.queries)
    }

    pub(crate) fn ensure_not_terminal(&self) -> WorkflowResult<()> {
        if self.workflow.is_completed() {
            return Err(WorkflowError::WorkflowTerminal {
                workflow_id: self.workflow.workflow_id.clone(),
            });
        }
        Ok(())
    }

    /// 按转换表执行状态转换
    pub(crate) fn transition(&mut self, to: WorkflowState, actor: &str) -> WorkflowResult<()> {
        check_transition(
            &self.workflow.workflow_id,
            self.workflow.state,
            to,
            &self.open_summary(),
        )?;
        self.apply_state(to, actor);
        Ok(())
    }

    /// 评审态横向切换到 `team`
    pub(crate) fn hand_over(&mut self, team: ReviewTeam, actor: &str) -> WorkflowResult<()> {
        check_review_handover(
            &self.workflow.workflow_id,
            self.workflow.state,
            team,
            &self.open_summary(),
        )?;
        self.apply_state(team.review_state(), actor);
        Ok(())
    }

    /// 评审态与 OPEN 问询对齐
    ///
    /// - 无 OPEN 问询: 回到 PLANT_PENDING
    /// - 当前团队已无 OPEN 问询、另一团队仍有: 切换到另一团队的评审态
    /// - 其余情况保持不变
    pub(crate) fn realign_review_state(&mut self, actor: &str) -> WorkflowResult<()> {
        let Some(current) = self.workflow.state.review_team() else {
            return Ok(());
        };

        let open = self.open_summary();
        if !open.is_blocked() {
            return self.transition(WorkflowState::PlantPending, actor);
        }

        if !open.has_team(current) {
            if let Some(next) = open.teams.iter().copied().find(|t| *t != current) {
                return self.hand_over(next, actor);
            }
        }

        tracing::debug!(
            workflow_id = %self.workflow.workflow_id,
            state = %self.workflow.state,
            open_queries = open.open_count,
            "仍有未答复问询，保持评审态"
        );
        Ok(())
    }

    fn apply_state(&mut self, to: WorkflowState, actor: &str) {
        let from = self.workflow.state;
        self.workflow.state = to;
        self.workflow.touch(actor, self.now);

        match to {
            WorkflowState::PlantPending if self.workflow.extended_at.is_none() => {
                self.workflow.extended_at = Some(self.now);
            }
            WorkflowState::Completed => {
                self.workflow.completed_at = Some(self.now);
            }
            _ => {}
        }

        self.workflow_dirty = true;
        self.events.push(UnitEvent::StateChanged {
            from,
            actor: actor.to_string(),
        });

        tracing::info!(
            workflow_id = %self.workflow.workflow_id,
            from = %from,
            to = %to,
            actor = actor,
            "流程状态变更"
        );
    }

    // ===== 问询改动记录（由问询管理调用）=====

    pub(crate) fn push_query(&mut self, query: Query) {
        self.touched_queries.push(query.query_id.clone());
        self.events.push(UnitEvent::QueryRaised {
            query_id: query.query_id.clone(),
        });
        self.queries.push(query);
    }

    pub(crate) fn query_mut(&mut self, query_id: &str) -> WorkflowResult<&mut Query> {
        self.queries
            .iter_mut()
            .find(|q| q.query_id == query_id)
            .ok_or_else(|| WorkflowError::query_not_found(query_id))
    }

    pub(crate) fn record_resolution(&mut self, query_id: &str) {
        self.touched_queries.push(query_id.to_string());
        self.events.push(UnitEvent::QueryResolved {
            query_id: query_id.to_string(),
        });
    }

    pub(crate) fn record_reassignment(
        &mut self,
        query_id: &str,
        previous_team: ReviewTeam,
        actor: &str,
    ) {
        self.touched_queries.push(query_id.to_string());
        self.events.push(UnitEvent::QueryReassigned {
            query_id: query_id.to_string(),
            previous_team,
            actor: actor.to_string(),
        });
    }

    // ===== 提交 =====

    fn change_set(&self) -> WorkflowChangeSet {
        let mut changes = WorkflowChangeSet::new();
        if self.workflow_dirty {
            changes = changes.with_workflow(self.workflow.clone());
        }
        for query in &self.queries {
            if self.touched_queries.contains(&query.query_id) {
                changes = changes.with_query(query.clone());
            }
        }
        changes
    }

    fn mark_committed(&mut self) {
        if self.workflow_dirty {
            self.workflow.revision += 1;
        }
    }

    fn find_query(&self, query_id: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.query_id == query_id)
    }

    fn into_notifications(self) -> (Workflow, Vec<WorkflowNotification>) {
        let mut notifications = Vec::with_capacity(self.events.len());

        for event in &self.events {
            let notification = match event {
                UnitEvent::StateChanged { from, actor } => WorkflowNotification::StateChanged {
                    workflow: self.workflow.clone(),
                    from: *from,
                    actor: actor.clone(),
                },
                UnitEvent::QueryRaised { query_id } => match self.find_query(query_id) {
                    Some(query) => WorkflowNotification::QueryRaised {
                        workflow: self.workflow.clone(),
                        query: query.clone(),
                    },
                    None => continue,
                },
                UnitEvent::QueryResolved { query_id } => match self.find_query(query_id) {
                    Some(query) => WorkflowNotification::QueryResolved {
                        workflow: self.workflow.clone(),
                        query: query.clone(),
                    },
                    None => continue,
                },
                UnitEvent::QueryReassigned {
                    query_id,
                    previous_team,
                    actor,
                } => match self.find_query(query_id) {
                    Some(query) => WorkflowNotification::QueryReassigned {
                        workflow: self.workflow.clone(),
                        query: query.clone(),
                        previous_team: *previous_team,
                        actor: actor.clone(),
                    },
                    None => continue,
                },
            };
            notifications.push(notification);
        }

        (self.workflow, notifications)
    }
}

// ==========================================
// WorkflowStateMachine - 流程状态机
// ==========================================
pub struct WorkflowStateMachine {
    ctx: WorkflowContext,
}

impl WorkflowStateMachine {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        &self.ctx.store
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 创建审批流程（初始状态 ORIGIN_PENDING）
    ///
    /// # 错误
    /// - `InvalidInput`: 业务主键字段或发起人为空
    /// - `DuplicateRecord`: 业务主键已存在
    pub fn initiate(&self, natural_key: NaturalKey, initiated_by: &str) -> WorkflowResult<Workflow> {
        if let Some(field) = natural_key.first_blank_field() {
            return Err(WorkflowError::InvalidInput {
                field,
                message: "业务主键字段不能为空".to_string(),
            });
        }
        require_text("initiated_by", initiated_by)?;

        let key = natural_key.normalized();
        let actor = initiated_by.trim();

        let workflow = {
            // 同一业务主键的创建串行执行，UNIQUE 约束兜底
            let slot = self.ctx.locks.slot(&format!("key:{}", key))?;
            let _guard = lock_slot(&slot);

            if let Some(existing) = self.ctx.store.find_workflow_by_key(&key)? {
                return Err(WorkflowError::DuplicateRecord {
                    natural_key: key.to_string(),
                    existing_id: existing.workflow_id,
                });
            }

            let workflow = Workflow::new(
                Uuid::new_v4().to_string(),
                key.clone(),
                actor.to_string(),
                self.ctx.clock.now(),
            );

            match self.ctx.store.insert_workflow(&workflow) {
                Ok(()) => workflow,
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    let existing_id = self
                        .ctx
                        .store
                        .find_workflow_by_key(&key)?
                        .map(|w| w.workflow_id)
                        .unwrap_or_default();
                    return Err(WorkflowError::DuplicateRecord {
                        natural_key: key.to_string(),
                        existing_id,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            workflow_id = %workflow.workflow_id,
            natural_key = %workflow.natural_key,
            actor = actor,
            "审批流程已创建"
        );

        self.ctx.hooks.dispatch(&[WorkflowNotification::Created {
            workflow: workflow.clone(),
            actor: actor.to_string(),
        }]);

        Ok(workflow)
    }

    // ==========================================
    // 状态转换
    // ==========================================

    /// ORIGIN_PENDING → PLANT_PENDING
    pub fn extend_to_plant(&self, workflow_id: &str, actor: &str) -> WorkflowResult<Workflow> {
        require_text("actor", actor)?;
        self.run_locked(workflow_id, |unit| {
            unit.transition(WorkflowState::PlantPending, actor)
        })
        .map(|(_, wf)| wf)
    }

    /// PLANT_PENDING → 团队评审态（需已有该团队的 OPEN 问询）
    pub fn move_to_review(
        &self,
        workflow_id: &str,
        team: ReviewTeam,
        actor: &str,
    ) -> WorkflowResult<Workflow> {
        require_text("actor", actor)?;
        self.run_locked(workflow_id, |unit| {
            unit.transition(team.review_state(), actor)
        })
        .map(|(_, wf)| wf)
    }

    /// 评审态返回评估
    ///
    /// 仍有 OPEN 问询时不回到 PLANT_PENDING（必要时切换到仍持有问询的团队）
    pub fn return_from_review(&self, workflow_id: &str, actor: &str) -> WorkflowResult<Workflow> {
        require_text("actor", actor)?;
        self.run_locked(workflow_id, |unit| {
            unit.ensure_not_terminal()?;
            let state = unit.workflow.state;
            if !state.is_review() {
                return Err(WorkflowError::InvalidStateTransition {
                    from: state,
                    to: WorkflowState::PlantPending,
                });
            }
            unit.realign_review_state(actor)
        })
        .map(|(_, wf)| wf)
    }

    /// PLANT_PENDING → COMPLETED（无 OPEN 问询）
    pub fn complete(&self, workflow_id: &str, actor: &str) -> WorkflowResult<Workflow> {
        require_text("actor", actor)?;
        self.run_locked(workflow_id, |unit| {
            unit.transition(WorkflowState::Completed, actor)
        })
        .map(|(_, wf)| wf)
    }

    // ==========================================
    // 只读
    // ==========================================

    /// 预检: 当前是否可转换到目标状态（无副作用）
    pub fn can_transition_to(&self, workflow_id: &str, target: WorkflowState) -> WorkflowResult<bool> {
        self.read_locked(workflow_id, |workflow, queries| {
            let open = OpenQuerySummary::from_queries(queries);
            check_transition(workflow_id, workflow.state, target, &open).is_ok()
        })
    }

    /// 流程及其全部问询（同一把锁内读取）
    pub fn load_with_queries(&self, workflow_id: &str) -> WorkflowResult<(Workflow, Vec<Query>)> {
        self.read_locked(workflow_id, |workflow, queries| {
            (workflow.clone(), queries.to_vec())
        })
    }

    pub fn get_workflow(&self, workflow_id: &str) -> WorkflowResult<Workflow> {
        self.ctx
            .store
            .find_workflow(workflow_id)?
            .ok_or_else(|| WorkflowError::workflow_not_found(workflow_id))
    }

    pub fn find_by_natural_key(&self, natural_key: &NaturalKey) -> WorkflowResult<Option<Workflow>> {
        Ok(self.ctx.store.find_workflow_by_key(&natural_key.normalized())?)
    }

    // ==========================================
    // 锁内执行
    // ==========================================

    /// 在流程锁内执行一次读-改-写
    ///
    /// 闭包返回错误时不提交任何改动；提交成功后释放锁再派发通知
    pub(crate) fn run_locked<T>(
        &self,
        workflow_id: &str,
        op: impl FnOnce(&mut WorkflowUnit) -> WorkflowResult<T>,
    ) -> WorkflowResult<(T, Workflow)> {
        let (output, workflow, notifications) = {
            let slot = self.ctx.locks.slot(workflow_id)?;
            let _guard = lock_slot(&slot);

            let workflow = self
                .ctx
                .store
                .find_workflow(workflow_id)?
                .ok_or_else(|| WorkflowError::workflow_not_found(workflow_id))?;
            let queries = self.ctx.store.find_queries_for_workflow(workflow_id)?;

            let mut unit = WorkflowUnit::new(workflow, queries, self.ctx.clock.now());
            let output = op(&mut unit)?;

            let changes = unit.change_set();
            if !changes.is_empty() {
                self.ctx.store.commit(&changes)?;
                unit.mark_committed();
            }

            let (workflow, notifications) = unit.into_notifications();
            (output, workflow, notifications)
        };

        if !notifications.is_empty() {
            self.ctx.hooks.dispatch(&notifications);
        }

        Ok((output, workflow))
    }

    /// 在流程锁内只读
    pub(crate) fn read_locked<T>(
        &self,
        workflow_id: &str,
        op: impl FnOnce(&Workflow, &[Query]) -> T,
    ) -> WorkflowResult<T> {
        let slot = self.ctx.locks.slot(workflow_id)?;
        let _guard = lock_slot(&slot);

        let workflow = self
            .ctx
            .store
            .find_workflow(workflow_id)?
            .ok_or_else(|| WorkflowError::workflow_not_found(workflow_id))?;
        let queries = self.ctx.store.find_queries_for_workflow(workflow_id)?;
        Ok(op(&workflow, &queries))
    }
}
