// ==========================================
// 物料安全数据审批系统 - 状态转换表
// ==========================================
// 纯函数，不读写存储
// 转换表:
//   ORIGIN_PENDING        → PLANT_PENDING     无前置条件
//   PLANT_PENDING         → REVIEW_A/B        存在该团队的 OPEN 问询
//   REVIEW_A/B            → PLANT_PENDING     两个团队均无 OPEN 问询
//   PLANT_PENDING         → COMPLETED         无 OPEN 问询
//   REVIEW_A/B            → COMPLETED         有 OPEN 问询时报阻塞，否则非法
// 其余组合一律拒绝；COMPLETED 出发的任何转换为终态错误
// 评审态之间的横向切换不走转换表，见 check_review_handover
// ==========================================

use crate::domain::{ReviewTeam, WorkflowState};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::query_lifecycle::OpenQuerySummary;

/// 校验一次状态转换
pub fn check_transition(
    workflow_id: &str,
    from: WorkflowState,
    to: WorkflowState,
    open: &OpenQuerySummary,
) -> WorkflowResult<()> {
    use WorkflowState::*;

    match (from, to) {
        (Completed, _) => Err(WorkflowError::WorkflowTerminal {
            workflow_id: workflow_id.to_string(),
        }),
        (OriginPending, PlantPending) => Ok(()),
        (PlantPending, ReviewAPending) => require_open_for(workflow_id, ReviewTeam::A, open),
        (PlantPending, ReviewBPending) => require_open_for(workflow_id, ReviewTeam::B, open),
        (ReviewAPending, PlantPending)
        | (ReviewBPending, PlantPending)
        | (PlantPending, Completed) => require_all_clear(workflow_id, open),
        (ReviewAPending, Completed) | (ReviewBPending, Completed) => {
            require_all_clear(workflow_id, open)?;
            Err(WorkflowError::InvalidStateTransition { from, to })
        }
        _ => Err(WorkflowError::InvalidStateTransition { from, to }),
    }
}

/// 校验评审态之间的横向切换
///
/// 流程同一时刻只记录一个评审态。出现以下情况时切换到 `team` 的评审态:
/// - 评审中又向另一团队提出问询（最近进入的评审态生效）
/// - 当前团队的 OPEN 问询已清空或被改派，但另一团队仍有 OPEN 问询
pub fn check_review_handover(
    workflow_id: &str,
    from: WorkflowState,
    team: ReviewTeam,
    open: &OpenQuerySummary,
) -> WorkflowResult<()> {
    let to = team.review_state();
    match from.review_team() {
        Some(current) if current != team => require_open_for(workflow_id, team, open),
        _ if from.is_terminal() => Err(WorkflowError::WorkflowTerminal {
            workflow_id: workflow_id.to_string(),
        }),
        _ => Err(WorkflowError::InvalidStateTransition { from, to }),
    }
}

/// 当前可达的目标状态
pub fn allowed_targets(
    workflow_id: &str,
    from: WorkflowState,
    open: &OpenQuerySummary,
) -> Vec<WorkflowState> {
    WorkflowState::ALL
        .into_iter()
        .filter(|to| check_transition(workflow_id, from, *to, open).is_ok())
        .collect()
}

fn require_open_for(
    workflow_id: &str,
    team: ReviewTeam,
    open: &OpenQuerySummary,
) -> WorkflowResult<()> {
    if open.has_team(team) {
        Ok(())
    } else {
        Err(WorkflowError::MissingOpenQuery {
            workflow_id: workflow_id.to_string(),
            team,
        })
    }
}

fn require_all_clear(workflow_id: &str, open: &OpenQuerySummary) -> WorkflowResult<()> {
    if open.is_blocked() {
        Err(WorkflowError::WorkflowBlocked {
            workflow_id: workflow_id.to_string(),
            open_queries: open.open_count,
        })
    } else {
        Ok(())
    }
}
