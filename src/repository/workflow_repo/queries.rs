use super::core::WorkflowRepository;
use super::mapping::{map_query_row, map_workflow_row, QUERY_COLUMNS, WORKFLOW_COLUMNS};
use crate::domain::{Query, Workflow, WorkflowState};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Result as SqliteResult};

impl WorkflowRepository {
    // ==========================================
    // 列表查询
    // ==========================================

    /// 查询所有非终态流程（按 workflow_id 排序，保证输出稳定）
    pub fn list_non_terminal(&self) -> RepositoryResult<Vec<Workflow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM workflow WHERE state <> ? ORDER BY workflow_id",
            WORKFLOW_COLUMNS
        ))?;

        let workflows = stmt
            .query_map(params![WorkflowState::Completed.as_str()], map_workflow_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(workflows)
    }

    /// 查询流程下的全部问询（按创建时间升序）
    pub fn list_queries(&self, workflow_id: &str) -> RepositoryResult<Vec<Query>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM workflow_query WHERE workflow_id = ? ORDER BY created_at, query_id",
            QUERY_COLUMNS
        ))?;

        let queries = stmt
            .query_map(params![workflow_id], map_query_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(queries)
    }
}
