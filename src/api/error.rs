// ==========================================
// 培训课程选课供给系统 - API层错误类型
// ==========================================
// 职责: 将仓储/引擎/导入层错误转换为调用方可理解的错误
// ==========================================

use crate::engine::error::ProvisionError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误
///
/// 仓储、对账引擎与 CSV 导入的错误在这里汇总成调用方关心的几类。
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 写入与已有数据冲突（重复记录或悬空引用）
    #[error("数据冲突: {0}")]
    Conflict(String),

    /// 课程分配不一致，需要人工处理
    #[error("课程分配不一致: {0}")]
    ConsistencyViolation(String),

    #[error("导出队列为空: {0}")]
    EmptyQueue(String),

    /// 上游数据不可用（可重试）
    #[error("上游数据不可用: {0}")]
    UpstreamUnavailable(String),

    #[error("LMS 未配置")]
    LmsNotConfigured,

    #[error("LMS 调用失败: {0}")]
    LmsError(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 调度方是否应稍后重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::UpstreamUnavailable(_))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            RepositoryError::Duplicate(_) | RepositoryError::DanglingReference(_) => {
                ApiError::Conflict(err.to_string())
            }
            RepositoryError::Decode { .. } => ApiError::InternalError(err.to_string()),
            RepositoryError::LockPoisoned(_) | RepositoryError::Sqlite(_) => {
                ApiError::DatabaseError(err.to_string())
            }
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::InvalidTermFormat(_)
            | ProvisionError::InvalidQuarterCode(_)
            | ProvisionError::InvalidInput(_) => ApiError::InvalidInput(err.to_string()),
            ProvisionError::Config(msg) => ApiError::InternalError(format!("配置读取失败: {}", msg)),
            e @ (ProvisionError::DataAccess(_)
            | ProvisionError::SuspiciousEmptyCandidates { .. }
            | ProvisionError::Timeout { .. }) => ApiError::UpstreamUnavailable(e.to_string()),
            e @ ProvisionError::CourseMismatch { .. } => ApiError::ConsistencyViolation(e.to_string()),
            e @ (ProvisionError::MissingCourse(_) | ProvisionError::MissingSection(_)) => {
                ApiError::NotFound(e.to_string())
            }
            ProvisionError::EmptyQueue(tier) => ApiError::EmptyQueue(tier),
            ProvisionError::Lms(e) => ApiError::LmsError(e.to_string()),
            ProvisionError::Repository(e) => e.into(),
            ProvisionError::Other(e) => ApiError::Other(e),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => e.into(),
            ImportError::Provision(e) => e.into(),
            e if e.is_row_error() => ApiError::ValidationError(e.to_string()),
            e => ApiError::ImportError(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
