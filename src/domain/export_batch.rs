// ==========================================
// 培训课程选课供给系统 - 导出批次
// ==========================================
// 一个批次 = 一次向 LMS 提交的 CSV 变更集
// 批次 ID: UUID v4
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::types::{ImportStatus, Priority};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBatch {
    pub batch_id: String,
    pub priority: Priority,
    pub status: ImportStatus,
    pub remote_import_id: Option<String>,
    pub progress: Option<i64>,
    pub workflow_state: Option<String>,
    pub warnings: Option<JsonValue>,
    pub errors: Option<JsonValue>,
    pub csv_errors: Option<String>, // 变更集构建失败
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExportBatch {
    pub fn new(priority: Priority) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            priority,
            status: ImportStatus::Pending,
            remote_import_id: None,
            progress: None,
            workflow_state: None,
            warnings: None,
            errors: None,
            csv_errors: None,
            error_message: None,
            created_at: Utc::now(),
            submitted_at: None,
            completed_at: None,
        }
    }

    /// 远端已处理完毕且无错误
    pub fn is_imported(&self) -> bool {
        self.status == ImportStatus::Clean
    }

    /// 仍需轮询远端状态
    pub fn requires_poll(&self) -> bool {
        self.status == ImportStatus::Submitted && self.remote_import_id.is_some()
    }

    /// 自提交以来的分钟数
    pub fn minutes_since_submit(&self, now: DateTime<Utc>) -> Option<i64> {
        self.submitted_at.map(|t| (now - t).num_minutes())
    }
}
