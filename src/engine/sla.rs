// ==========================================
// 物料安全数据审批系统 - 超期评估
// ==========================================
// 职责: 计算非终态流程在当前状态的停留时长，标记超过阈值的流程
// 红线: 只读，不加流程锁，不修改任何记录
// 参考时间:
//   ORIGIN_PENDING → created_at
//   PLANT_PENDING  → extended_at（缺失时回退 created_at）
//   REVIEW_A/B     → last_modified_at
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{SlaThresholds, MAX_SLA_HOURS};
use crate::domain::{NaturalKey, Workflow, WorkflowState};
use crate::engine::clock::Clock;
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::repository::RecordStore;

/// 超期条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueEntry {
    pub workflow_id: String,
    pub natural_key: NaturalKey,
    pub state: WorkflowState,
    pub reference_time: NaiveDateTime,
    pub age_seconds: i64,
    pub threshold_seconds: i64,
    pub overdue_by_seconds: i64,
}

/// 超期报告（条目按 workflow_id 排序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueReport {
    pub evaluated_at: NaiveDateTime,
    pub scanned: usize,
    pub entries: Vec<OverdueEntry>,
}

impl OverdueReport {
    pub fn overdue_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.workflow_id.as_str()).collect()
    }
}

/// 当前状态的计时起点
pub fn reference_time(workflow: &Workflow) -> NaiveDateTime {
    match workflow.state {
        WorkflowState::OriginPending => workflow.created_at,
        WorkflowState::PlantPending => workflow.extended_at.unwrap_or(workflow.created_at),
        WorkflowState::ReviewAPending | WorkflowState::ReviewBPending => {
            workflow.last_modified_at
        }
        WorkflowState::Completed => workflow.completed_at.unwrap_or(workflow.last_modified_at),
    }
}

// ==========================================
// OverdueEvaluator - 超期评估器
// ==========================================
pub struct OverdueEvaluator {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl OverdueEvaluator {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 分类（纯函数）
    ///
    /// 停留时长严格大于阈值才算超期；终态流程跳过
    pub fn classify(
        workflows: &[Workflow],
        thresholds: &SlaThresholds,
        now: NaiveDateTime,
    ) -> Vec<OverdueEntry> {
        let mut entries: Vec<OverdueEntry> = workflows
            .iter()
            .filter_map(|wf| {
                let threshold = thresholds.threshold_for(wf.state)?;
                let reference = reference_time(wf);
                let age = now - reference;
                if age <= threshold {
                    return None;
                }
                Some(OverdueEntry {
                    workflow_id: wf.workflow_id.clone(),
                    natural_key: wf.natural_key.clone(),
                    state: wf.state,
                    reference_time: reference,
                    age_seconds: age.num_seconds(),
                    threshold_seconds: threshold.num_seconds(),
                    overdue_by_seconds: (age - threshold).num_seconds(),
                })
            })
            .collect();

        entries.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));
        entries
    }

    /// 读取全部非终态流程并生成报告
    ///
    /// # 错误
    /// - `InvalidInput`: 任一阈值不在 `1..=MAX_SLA_HOURS` 小时内
    pub fn evaluate(&self, thresholds: &SlaThresholds) -> WorkflowResult<OverdueReport> {
        if let Some((field, hours)) = thresholds.first_invalid() {
            return Err(WorkflowError::InvalidInput {
                field,
                message: format!("超期阈值必须在 1..={} 小时内，实际为 {}", MAX_SLA_HOURS, hours),
            });
        }

        let now = self.clock.now();
        let workflows = self.store.list_active_workflows()?;
        let entries = Self::classify(&workflows, thresholds, now);

        tracing::debug!(
            scanned = workflows.len(),
            overdue = entries.len(),
            "超期评估完成"
        );

        Ok(OverdueReport {
            evaluated_at: now,
            scanned: workflows.len(),
            entries,
        })
    }
}
