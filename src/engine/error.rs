// ==========================================
// 培训课程选课供给系统 - 引擎层错误类型
// ==========================================
// 分类:
//   配置错误: 学年/季度编码格式错误（立即失败，无部分副作用）
//   数据访问错误: 仓库不可达 / 候选名单可疑为空（中止本次对账，可重试）
//   一致性违反: 课程重分配（本地跳过并记录，不抛出）
//   依赖缺失: 课程/分班实例尚未创建（本次对账失败）
//   远端提交错误: 记录到导出批次，不抛出
// ==========================================

use crate::domain::ids::ParseError;
use crate::lms::LmsError;
use crate::membership::MembershipError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误
#[derive(Error, Debug)]
pub enum ProvisionError {
    // ==========================================
    // 配置错误
    // ==========================================
    #[error("学年编码格式错误: {0}")]
    InvalidTermFormat(String),

    #[error("季度编码格式错误: {0}")]
    InvalidQuarterCode(String),

    #[error("配置读取失败: {0}")]
    Config(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据访问失败: {0}")]
    DataAccess(String),

    /// 候选为空但已有有效选课: 视为上游故障，拒绝批量退课
    #[error("候选名单为空但存在 {active_enrollments} 条有效选课: training_course_id={training_course_id}")]
    SuspiciousEmptyCandidates {
        training_course_id: i64,
        active_enrollments: i64,
    },

    #[error("外部调用超时: {operation} ({timeout_secs}s)")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    // ==========================================
    // 一致性违反
    // ==========================================
    #[error("课程分配不一致: student={student_id}, 现有={existing_course_id}, 计算={computed_course_id}")]
    CourseMismatch {
        student_id: String,
        existing_course_id: String,
        computed_course_id: String,
    },

    // ==========================================
    // 依赖缺失
    // ==========================================
    #[error("课程实例不存在: {0}")]
    MissingCourse(String),

    #[error("分班实例不存在: {0}")]
    MissingSection(String),

    // ==========================================
    // 导出队列
    // ==========================================
    #[error("导出队列为空: priority={0}")]
    EmptyQueue(String),

    #[error("LMS 调用失败: {0}")]
    Lms(#[from] LmsError),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProvisionError {
    /// 是否可由调度方重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::DataAccess(_)
                | ProvisionError::SuspiciousEmptyCandidates { .. }
                | ProvisionError::Timeout { .. }
                | ProvisionError::Lms(LmsError::Unavailable(_))
        )
    }
}

impl From<ParseError> for ProvisionError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidQuarterCode(s) => ProvisionError::InvalidQuarterCode(s),
            e @ ParseError::QuarterOutsideAcademicYear { .. } => {
                ProvisionError::InvalidQuarterCode(e.to_string())
            }
            ParseError::InvalidTermFormat(s) | ParseError::InvalidAcademicYear(s) => {
                ProvisionError::InvalidTermFormat(s)
            }
            other => ProvisionError::InvalidInput(other.to_string()),
        }
    }
}

impl From<MembershipError> for ProvisionError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::Parse(e) => e.into(),
            MembershipError::Warehouse(e) => ProvisionError::DataAccess(e.to_string()),
            MembershipError::Timeout {
                query_kind,
                timeout_secs,
            } => ProvisionError::Timeout {
                operation: format!("warehouse:{}", query_kind),
                timeout_secs,
            },
            e @ MembershipError::MockFile { .. } => ProvisionError::DataAccess(e.to_string()),
            MembershipError::Config(msg) => ProvisionError::Config(msg),
        }
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
