// ==========================================
// 培训课程选课供给系统 - 成员解析错误
// ==========================================

use crate::domain::ids::ParseError;
use crate::membership::warehouse::WarehouseError;
use thiserror::Error;

/// 成员解析错误
#[derive(Error, Debug)]
pub enum MembershipError {
    /// 学年/季度编码格式错误（立即失败，不做猜测）
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("数据仓库访问失败: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("数据仓库查询超时: {query_kind} ({timeout_secs}s)")]
    Timeout {
        query_kind: &'static str,
        timeout_secs: u64,
    },

    #[error("测试名单文件读取失败: {path}: {message}")]
    MockFile { path: String, message: String },

    #[error("配置读取失败: {0}")]
    Config(String),
}
