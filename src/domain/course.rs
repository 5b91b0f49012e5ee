// ==========================================
// 培训课程选课供给系统 - 课程副本与分班
// ==========================================
// CourseInstance: 培训课程的第 N 个平行副本
// SectionInstance: 副本内的第 M 个分班
// 两者都携带导出优先级与队列批次引用
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::types::Priority;

// ==========================================
// CourseInstance - 课程副本
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInstance {
    pub id: i64,
    pub training_course_id: i64,
    pub course_id: String, // <term>-<blueprint>-<ordinal:03>
    pub course_ordinal: u32,
    pub created_date: DateTime<Utc>,
    pub provisioned_date: Option<DateTime<Utc>>,
    pub provisioned_error: Option<bool>,
    pub provisioned_status: Option<String>,
    pub deleted_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub queue_id: Option<String>,
}

impl CourseInstance {
    /// 第 index 个分班 ID: <course_id>-<ordinal>-
    pub fn section_id(&self, index: u32) -> String {
        format!("{}-{}-", self.course_id, index + 1)
    }

    pub fn section_import_ids(&self, section_count: u32) -> Vec<String> {
        (0..section_count).map(|i| self.section_id(i)).collect()
    }

    pub fn json_data(&self) -> JsonValue {
        json!({
            "course_id": self.course_id,
            "course_ordinal": self.course_ordinal,
            "created_date": self.created_date.to_rfc3339(),
            "provisioned_date": self.provisioned_date.map(|d| d.to_rfc3339()),
            "provisioned_error": self.provisioned_error,
            "deleted_date": self.deleted_date.map(|d| d.to_rfc3339()),
            "priority": self.priority.as_str(),
            "queue_id": self.queue_id,
        })
    }
}

// ==========================================
// SectionInstance - 分班
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInstance {
    pub id: i64,
    pub course_pk: i64,
    pub section_id: String,
    pub section_ordinal: u32,
    pub created_date: DateTime<Utc>,
    pub provisioned_date: Option<DateTime<Utc>>,
    pub deleted_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub queue_id: Option<String>,
}

impl SectionInstance {
    pub fn json_data(&self) -> JsonValue {
        json!({
            "section_id": self.section_id,
            "section_ordinal": self.section_ordinal,
            "created_date": self.created_date.to_rfc3339(),
            "provisioned_date": self.provisioned_date.map(|d| d.to_rfc3339()),
            "deleted_date": self.deleted_date.map(|d| d.to_rfc3339()),
            "priority": self.priority.as_str(),
        })
    }
}
