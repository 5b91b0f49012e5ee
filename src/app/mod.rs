// ==========================================
// 培训课程选课供给系统 - 应用层
// ==========================================
// 职责: 装配数据库、配置与 API，供命令行入口使用
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState, DB_PATH_ENV, WAREHOUSE_FILE_ENV};
