use super::mapping::{map_query_row, map_workflow_row, QUERY_COLUMNS, WORKFLOW_COLUMNS};
use crate::db::format_ts;
use crate::domain::{NaturalKey, Query, Workflow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{RecordStore, WorkflowChangeSet};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// WorkflowRepository - 审批流程仓储
// ==========================================
// 管理 workflow / workflow_query 两张表
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct WorkflowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkflowRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新流程
    pub fn insert(&self, workflow: &Workflow) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            &format!("INSERT INTO workflow ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)", WORKFLOW_COLUMNS),
            params![
                workflow.workflow_id,
                workflow.natural_key.project_code,
                workflow.natural_key.material_code,
                workflow.natural_key.plant_code,
                workflow.natural_key.block_id,
                workflow.state.as_str(),
                format_ts(&workflow.created_at),
                format_ts(&workflow.last_modified_at),
                workflow.extended_at.as_ref().map(format_ts),
                workflow.completed_at.as_ref().map(format_ts),
                workflow.initiated_by,
                workflow.last_modified_by,
                workflow.revision,
            ],
        )?;

        Ok(())
    }

    /// 在单个事务内提交变更集合
    ///
    /// # 并发控制
    /// 流程更新带 revision 检查，任一步失败整个事务回滚
    pub fn commit_changes(&self, changes: &WorkflowChangeSet) -> RepositoryResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if let Some(workflow) = &changes.workflow {
            Self::update_workflow_tx(&tx, workflow)?;
        }

        for query in &changes.queries {
            Self::upsert_query_tx(&tx, query)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    fn update_workflow_tx(tx: &Transaction, workflow: &Workflow) -> RepositoryResult<()> {
        let rows_affected = tx.execute(
            r#"UPDATE workflow
               SET state = ?, last_modified_at = ?, extended_at = ?, completed_at = ?,
                   last_modified_by = ?, revision = revision + 1
               WHERE workflow_id = ? AND revision = ?"#,
            params![
                workflow.state.as_str(),
                format_ts(&workflow.last_modified_at),
                workflow.extended_at.as_ref().map(format_ts),
                workflow.completed_at.as_ref().map(format_ts),
                workflow.last_modified_by,
                workflow.workflow_id,
                workflow.revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM workflow WHERE workflow_id = ?",
                    params![workflow.workflow_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    workflow_id: workflow.workflow_id.clone(),
                    expected: workflow.revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "Workflow".to_string(),
                    id: workflow.workflow_id.clone(),
                },
            });
        }

        Ok(())
    }

    fn upsert_query_tx(tx: &Transaction, query: &Query) -> RepositoryResult<()> {
        tx.execute(
            &format!(
                r#"INSERT INTO workflow_query ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(query_id) DO UPDATE SET
                       assigned_team = excluded.assigned_team,
                       status = excluded.status,
                       response = excluded.response,
                       priority = excluded.priority,
                       resolved_by = excluded.resolved_by,
                       resolved_at = excluded.resolved_at"#,
                QUERY_COLUMNS
            ),
            params![
                query.query_id,
                query.workflow_id,
                query.assigned_team.as_str(),
                query.status.as_str(),
                query.question,
                query.response,
                query.priority.as_str(),
                query.raised_by,
                format_ts(&query.created_at),
                query.resolved_by,
                query.resolved_at.as_ref().map(format_ts),
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询流程
    pub fn find_by_id(&self, workflow_id: &str) -> RepositoryResult<Option<Workflow>> {
        let conn = self.get_conn()?;

        let workflow = conn
            .query_row(
                &format!("SELECT {} FROM workflow WHERE workflow_id = ?", WORKFLOW_COLUMNS),
                params![workflow_id],
                map_workflow_row,
            )
            .optional()?;
        Ok(workflow)
    }

    /// 按业务主键查询流程
    pub fn find_by_natural_key(&self, key: &NaturalKey) -> RepositoryResult<Option<Workflow>> {
        let conn = self.get_conn()?;

        let workflow = conn
            .query_row(
                &format!(
                    r#"SELECT {} FROM workflow
                       WHERE project_code = ? AND material_code = ? AND plant_code = ? AND block_id = ?"#,
                    WORKFLOW_COLUMNS
                ),
                params![
                    key.project_code,
                    key.material_code,
                    key.plant_code,
                    key.block_id
                ],
                map_workflow_row,
            )
            .optional()?;
        Ok(workflow)
    }

    /// 按ID查询问询
    pub fn find_query_by_id(&self, query_id: &str) -> RepositoryResult<Option<Query>> {
        let conn = self.get_conn()?;

        let query = conn
            .query_row(
                &format!("SELECT {} FROM workflow_query WHERE query_id = ?", QUERY_COLUMNS),
                params![query_id],
                map_query_row,
            )
            .optional()?;
        Ok(query)
    }
}

// ==========================================
// RecordStore Trait 实现
// ==========================================
impl RecordStore for WorkflowRepository {
    fn find_workflow(&self, workflow_id: &str) -> RepositoryResult<Option<Workflow>> {
        self.find_by_id(workflow_id)
    }

    fn find_workflow_by_key(&self, key: &NaturalKey) -> RepositoryResult<Option<Workflow>> {
        self.find_by_natural_key(key)
    }

    fn list_active_workflows(&self) -> RepositoryResult<Vec<Workflow>> {
        self.list_non_terminal()
    }

    fn find_query(&self, query_id: &str) -> RepositoryResult<Option<Query>> {
        self.find_query_by_id(query_id)
    }

    fn find_queries_for_workflow(&self, workflow_id: &str) -> RepositoryResult<Vec<Query>> {
        self.list_queries(workflow_id)
    }

    fn insert_workflow(&self, workflow: &Workflow) -> RepositoryResult<()> {
        self.insert(workflow)
    }

    fn commit(&self, changes: &WorkflowChangeSet) -> RepositoryResult<()> {
        self.commit_changes(changes)
    }
}
