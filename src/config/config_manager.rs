// ==========================================
// 物料安全数据审批系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::sla_config_trait::SlaConfigReader;
use crate::config::sla_thresholds::{SlaThresholds, DEFAULT_SLA_HOURS, MAX_SLA_HOURS};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 默认超期巡检间隔（秒）
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3_600;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取整数配置，缺失、格式错误或超出 `1..=max` 时使用默认值
    fn get_i64_or_default(&self, key: &str, default: i64, max: i64) -> ConfigResult<i64> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) if (1..=max).contains(&v) => Ok(v),
                _ => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        default = default,
                        "配置格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// SlaConfigReader Trait 实现
// ==========================================
#[async_trait]
impl SlaConfigReader for ConfigManager {
    async fn get_sla_thresholds(&self) -> ConfigResult<SlaThresholds> {
        Ok(SlaThresholds {
            origin_pending_hours: self
                .get_i64_or_default(config_keys::SLA_ORIGIN_PENDING_HOURS, DEFAULT_SLA_HOURS, MAX_SLA_HOURS)?,
            plant_pending_hours: self
                .get_i64_or_default(config_keys::SLA_PLANT_PENDING_HOURS, DEFAULT_SLA_HOURS, MAX_SLA_HOURS)?,
            review_a_pending_hours: self
                .get_i64_or_default(config_keys::SLA_REVIEW_A_PENDING_HOURS, DEFAULT_SLA_HOURS, MAX_SLA_HOURS)?,
            review_b_pending_hours: self
                .get_i64_or_default(config_keys::SLA_REVIEW_B_PENDING_HOURS, DEFAULT_SLA_HOURS, MAX_SLA_HOURS)?,
        })
    }

    async fn get_sweep_interval_secs(&self) -> ConfigResult<u64> {
        let secs = self.get_i64_or_default(
            config_keys::SLA_SWEEP_INTERVAL_SECS,
            DEFAULT_SWEEP_INTERVAL_SECS as i64,
            i64::MAX,
        )?;
        Ok(secs as u64)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 超期阈值（小时）
    pub const SLA_ORIGIN_PENDING_HOURS: &str = "sla_origin_pending_hours";
    pub const SLA_PLANT_PENDING_HOURS: &str = "sla_plant_pending_hours";
    pub const SLA_REVIEW_A_PENDING_HOURS: &str = "sla_review_a_pending_hours";
    pub const SLA_REVIEW_B_PENDING_HOURS: &str = "sla_review_b_pending_hours";

    // 超期巡检
    pub const SLA_SWEEP_INTERVAL_SECS: &str = "sla_sweep_interval_secs";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let cm = setup();
        assert_eq!(cm.get_sla_thresholds().await.unwrap(), SlaThresholds::default());
        assert_eq!(
            cm.get_sweep_interval_secs().await.unwrap(),
            DEFAULT_SWEEP_INTERVAL_SECS
        );
    }

    #[tokio::test]
    async fn test_override_single_state() {
        let cm = setup();
        cm.set_config_value(config_keys::SLA_REVIEW_B_PENDING_HOURS, "12")
            .unwrap();

        let t = cm.get_sla_thresholds().await.unwrap();
        assert_eq!(t.review_b_pending_hours, 12);
        assert_eq!(t.plant_pending_hours, DEFAULT_SLA_HOURS);
    }

    #[tokio::test]
    async fn test_invalid_value_falls_back() {
        let cm = setup();
        cm.set_config_value(config_keys::SLA_PLANT_PENDING_HOURS, "abc")
            .unwrap();
        cm.set_config_value(config_keys::SLA_ORIGIN_PENDING_HOURS, "-5")
            .unwrap();

        let t = cm.get_sla_thresholds().await.unwrap();
        assert_eq!(t.plant_pending_hours, DEFAULT_SLA_HOURS);
        assert_eq!(t.origin_pending_hours, DEFAULT_SLA_HOURS);
    }

    #[tokio::test]
    async fn test_oversized_hours_fall_back() {
        let cm = setup();
        cm.set_config_value(config_keys::SLA_PLANT_PENDING_HOURS, "9000000000000")
            .unwrap();

        let t = cm.get_sla_thresholds().await.unwrap();
        assert_eq!(t.plant_pending_hours, DEFAULT_SLA_HOURS);
        assert_eq!(
            t.threshold_for(crate::domain::WorkflowState::PlantPending),
            Some(chrono::Duration::hours(DEFAULT_SLA_HOURS))
        );
    }

    #[test]
    fn test_snapshot_contains_written_keys() {
        let cm = setup();
        cm.set_config_value(config_keys::SLA_SWEEP_INTERVAL_SECS, "60")
            .unwrap();
        let snapshot: HashMap<String, String> =
            serde_json::from_str(&cm.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(
            snapshot.get(config_keys::SLA_SWEEP_INTERVAL_SECS).map(String::as_str),
            Some("60")
        );
        assert!(cm.set_config_value("  ", "x").is_err());
    }
}
