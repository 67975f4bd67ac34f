// ==========================================
// 物料安全数据审批系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::WorkflowApi;
use crate::config::{ConfigManager, SlaConfigReader};
use crate::engine::{
    AuditTrailHook, Clock, HookDispatcher, OverdueEvaluator, OverdueSweeper,
    QueryLifecycleManager, SystemClock, WorkflowContext, WorkflowMetricsHook,
    WorkflowStateMachine,
};
use crate::repository::{ActionLogRepository, RecordStore, WorkflowRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 审批流程API
    pub workflow_api: Arc<WorkflowApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 内存计数器
    pub metrics: Arc<WorkflowMetricsHook>,

    /// 超期巡检
    pub sweeper: Arc<OverdueSweeper>,
}

impl AppState {
    /// 创建新的AppState实例（系统时钟）
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化表结构
    /// 2. 初始化所有Repository
    /// 3. 初始化状态机、问询管理、超期评估及 hook
    /// 4. 创建API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_clock(db_path, Arc::new(SystemClock))
    }

    /// 使用指定时钟创建（测试可注入 FixedClock）
    pub fn with_clock(db_path: String, clock: Arc<dyn Clock>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("初始化表结构失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        Self::from_connection(db_path, conn, clock)
    }

    fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let workflow_repo = Arc::new(WorkflowRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法初始化ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化 hook
        // ==========================================
        let metrics = Arc::new(WorkflowMetricsHook::new());
        let audit = Arc::new(AuditTrailHook::new(action_log_repo.clone(), clock.clone()));
        let hooks = Arc::new(
            HookDispatcher::new()
                .with_hook(audit)
                .with_hook(metrics.clone()),
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let store: Arc<dyn RecordStore> = workflow_repo;
        let ctx = WorkflowContext::new(store.clone(), clock.clone(), hooks.clone());
        let state_machine = Arc::new(WorkflowStateMachine::new(ctx.clone()));
        let query_manager = Arc::new(QueryLifecycleManager::new(state_machine.clone()));
        let evaluator = Arc::new(OverdueEvaluator::new(store, clock));

        let sla_config: Arc<dyn SlaConfigReader> = config_manager.clone();
        let sweeper = Arc::new(OverdueSweeper::new(ctx, evaluator.clone(), sla_config));

        // ==========================================
        // 创建API实例
        // ==========================================
        let workflow_api = Arc::new(WorkflowApi::new(
            state_machine,
            query_manager,
            evaluator,
            action_log_repo.clone(),
        ));

        tracing::info!(hooks = hooks.len(), "AppState初始化完成");

        Ok(Self {
            db_path,
            workflow_api,
            config_manager,
            action_log_repo,
            metrics,
            sweeper,
        })
    }
}

/// 默认数据库路径
///
/// 优先读取环境变量 `MSDS_WORKFLOW_DB_PATH`，否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("MSDS_WORKFLOW_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./msds_workflow.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("msds-workflow");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("msds_workflow.db");
        }
    }

    path.to_string_lossy().to_string()
}
