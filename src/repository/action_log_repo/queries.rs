use super::core::ActionLogRepository;
use crate::db::parse_ts;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, workflow_id, query_id, action_type, action_ts,
           actor, payload_json, detail
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询指定流程的审计轨迹（按时间升序）
    pub fn find_by_workflow_id(&self, workflow_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE workflow_id = ? ORDER BY action_ts ASC, rowid ASC",
            SELECT_COLUMNS
        ))?;

        let logs = stmt
            .query_map(params![workflow_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }
}

// ==========================================
// 辅助方法
// ==========================================

fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let action_ts_str: String = row.get(4)?;
    let payload_json_str: Option<String> = row.get(6)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        workflow_id: row.get(1)?,
        query_id: row.get(2)?,
        action_type: row.get(3)?,
        action_ts: parse_ts(&action_ts_str, 4)?,
        actor: row.get(5)?,
        // JSON 解析失败时丢弃负载，不阻断审计查询
        payload_json: payload_json_str.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}
