// ==========================================
// 物料安全数据审批系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 多团队审批流程（状态机 + 问询阻塞 + 超期评估）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/表结构）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{QueryPriority, QueryStatus, ReviewTeam, WorkflowState};

// 领域实体
pub use domain::{ActionLog, ActionType, NaturalKey, Query, Workflow};

// 引擎
pub use engine::{
    OverdueEntry, OverdueEvaluator, OverdueReport, OverdueSweeper, QueryLifecycleManager,
    WorkflowError, WorkflowResult, WorkflowStateMachine,
};

// API
pub use api::WorkflowApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物料安全数据审批系统";
