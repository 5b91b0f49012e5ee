// ==========================================
// 培训课程选课供给系统 - 课程定义导入错误
// ==========================================

use crate::engine::error::ProvisionError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 课程定义 CSV 导入错误
///
/// 行级错误只拒绝当前行，其余错误中止整个文件。
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("仅支持 .csv 文件: {0}")]
    UnsupportedFormat(String),

    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 格式错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("表头缺少列: {0}")]
    MissingColumn(String),

    #[error("第 {row} 行缺少 {field}")]
    MissingField { row: usize, field: String },

    #[error("第 {row} 行 {field} 取值无效: {message}")]
    BadValue {
        row: usize,
        field: String,
        message: String,
    },

    #[error("第 {row} 行校验失败: {message}")]
    ValidationError { row: usize, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl ImportError {
    /// 是否只影响单行
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            ImportError::MissingField { .. }
                | ImportError::BadValue { .. }
                | ImportError::ValidationError { .. }
        )
    }

    /// 出错的数据行号（表头之后从 1 开始）
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::MissingField { row, .. }
            | ImportError::BadValue { row, .. }
            | ImportError::ValidationError { row, .. } => Some(*row),
            _ => None,
        }
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
