// ==========================================
// 培训课程选课供给系统 - 核心库
// ==========================================
// 职责: 计算"应选课学生"集合，与已持久化选课对账，
//       按优先级排队并向 LMS 导出变更集
// 技术栈: Rust + SQLite + Tokio
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

// 导入层 - 培训课程定义
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 外部数据源 - 数据仓库与成员解析
pub mod membership;

// 外部系统 - LMS 端口与变更集
pub mod lms;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::ids::{AcademicYear, EligibilityTag, QuarterCode, StudentId};
pub use domain::types::{CourseType, HistoryEventType, ImportStatus, MembershipType, Priority};

// 领域实体
pub use domain::course::{CourseInstance, SectionInstance};
pub use domain::enrollment::{EnrollmentHistoryEvent, EnrollmentRecord};
pub use domain::export_batch::ExportBatch;
pub use domain::training_course::TrainingCourse;

// 引擎
pub use engine::{
    ExportCoordinator, HistoryAuditor, PriorityPropagation, ProvisionError, ProvisionResult,
    ProvisioningOrchestrator, ReconciliationEngine, ReconciliationReport,
};

// API
pub use api::{ApiError, ConfigApi, ProvisioningApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "培训课程选课供给系统";
