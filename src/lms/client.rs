// ==========================================
// 培训课程选课供给系统 - LMS 端口
// ==========================================
// 职责: 定义外部 LMS 的导入提交/轮询/取消接口与目录查询接口
// 红线: 核心逻辑不依赖具体 HTTP 客户端
// ==========================================

use crate::lms::change_set::ChangeSetBundle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LMS 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LmsError {
    #[error("LMS 不可达: {0}")]
    Unavailable(String),

    #[error("LMS 拒绝请求: status={status}, {message}")]
    Rejected { status: u16, message: String },

    #[error("LMS 资源不存在: {0}")]
    NotFound(String),
}

/// 导入句柄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportHandle {
    pub import_id: String,
    pub workflow_state: String,
}

/// 导入消息（警告或错误）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMessage {
    /// 出错的变更集文件名，如 enrollments.csv
    pub file: String,
    pub message: String,
    /// 出错行内容（LMS 原样返回）
    #[serde(default)]
    pub row_info: Option<String>,
}

/// 导入状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub progress: i64,
    pub workflow_state: String,
    #[serde(default)]
    pub warnings: Vec<ImportMessage>,
    #[serde(default)]
    pub errors: Vec<ImportMessage>,
}

impl ImportProgress {
    /// 远端导入已结束（无论成功与否）
    pub fn is_finished(&self) -> bool {
        self.progress >= 100
            || matches!(
                self.workflow_state.as_str(),
                "imported" | "imported_with_messages" | "failed" | "failed_with_messages" | "aborted"
            )
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self.workflow_state.as_str(),
            "failed" | "failed_with_messages" | "aborted"
        )
    }

    pub fn has_messages(&self) -> bool {
        !self.warnings.is_empty() || !self.errors.is_empty()
    }
}

/// LMS 中已存在课程的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmsCourseMetadata {
    pub course_id: String,
    pub name: String,
    pub short_name: String,
    pub workflow_state: String,
}

// ==========================================
// LmsClient Trait
// ==========================================
// 实现者: 测试中为 FakeLms
#[async_trait]
pub trait LmsClient: Send + Sync {
    /// 提交变更集
    async fn submit_import(
        &self,
        root_account_id: &str,
        bundle: &ChangeSetBundle,
    ) -> Result<ImportHandle, LmsError>;

    /// 轮询导入状态
    async fn poll_import(
        &self,
        root_account_id: &str,
        import_id: &str,
    ) -> Result<ImportProgress, LmsError>;

    /// 取消进行中的导入
    async fn cancel_import(&self, root_account_id: &str, import_id: &str) -> Result<(), LmsError>;

    /// 按课程编码查询课程元数据（课程尚未导入时返回 None）
    async fn course_metadata(&self, course_id: &str) -> Result<Option<LmsCourseMetadata>, LmsError>;

    /// 按角色名查询角色 ID
    async fn role_id(&self, account_id: &str, role: &str) -> Result<Option<String>, LmsError>;
}
