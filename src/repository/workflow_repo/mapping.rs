use crate::db::{parse_opt_ts, parse_ts};
use crate::domain::{NaturalKey, Query, QueryPriority, QueryStatus, ReviewTeam, Workflow, WorkflowState};
use rusqlite::types::Type;
use rusqlite::{Result as SqliteResult, Row};

// ==========================================
// 行映射 (SELECT 列顺序必须与常量一致)
// ==========================================

pub(super) const WORKFLOW_COLUMNS: &str = r#"
    workflow_id, project_code, material_code, plant_code, block_id,
    state, created_at, last_modified_at, extended_at, completed_at,
    initiated_by, last_modified_by, revision
"#;

pub(super) const QUERY_COLUMNS: &str = r#"
    query_id, workflow_id, assigned_team, status, question, response,
    priority, raised_by, created_at, resolved_by, resolved_at
"#;

fn invalid_enum(column: usize, field: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("非法的{}取值: {}", field, raw).into(),
    )
}

pub(super) fn map_workflow_row(row: &Row) -> SqliteResult<Workflow> {
    let state_str: String = row.get(5)?;
    let state = WorkflowState::from_str(&state_str)
        .ok_or_else(|| invalid_enum(5, "state", &state_str))?;

    let created_at: String = row.get(6)?;
    let last_modified_at: String = row.get(7)?;

    Ok(Workflow {
        workflow_id: row.get(0)?,
        natural_key: NaturalKey {
            project_code: row.get(1)?,
            material_code: row.get(2)?,
            plant_code: row.get(3)?,
            block_id: row.get(4)?,
        },
        state,
        created_at: parse_ts(&created_at, 6)?,
        last_modified_at: parse_ts(&last_modified_at, 7)?,
        extended_at: parse_opt_ts(row.get(8)?, 8)?,
        completed_at: parse_opt_ts(row.get(9)?, 9)?,
        initiated_by: row.get(10)?,
        last_modified_by: row.get(11)?,
        revision: row.get(12)?,
    })
}

pub(super) fn map_query_row(row: &Row) -> SqliteResult<Query> {
    let team_str: String = row.get(2)?;
    let assigned_team = ReviewTeam::from_str(&team_str)
        .ok_or_else(|| invalid_enum(2, "assigned_team", &team_str))?;

    let status_str: String = row.get(3)?;
    let status = QueryStatus::from_str(&status_str)
        .ok_or_else(|| invalid_enum(3, "status", &status_str))?;

    // 优先级仅展示用，未知取值回落为 NORMAL
    let priority_str: String = row.get(6)?;
    let priority = QueryPriority::from_str(&priority_str).unwrap_or_default();

    let created_at: String = row.get(8)?;

    Ok(Query {
        query_id: row.get(0)?,
        workflow_id: row.get(1)?,
        assigned_team,
        status,
        question: row.get(4)?,
        response: row.get(5)?,
        priority,
        raised_by: row.get(7)?,
        created_at: parse_ts(&created_at, 8)?,
        resolved_by: row.get(9)?,
        resolved_at: parse_opt_ts(row.get(10)?, 10)?,
    })
}
