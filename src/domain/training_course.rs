// ==========================================
// 培训课程选课供给系统 - 培训课程定义
// ==========================================
// 唯一约束: (blueprint_course_id, term_id)
// 生命周期: 配置导入创建 → retire() 软删除 / purge() 级联硬删除
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::ids::{AcademicYear, ParseError};
use super::types::{CourseStatus, CourseType, MembershipType};

// ==========================================
// TrainingCourse - 培训课程定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCourse {
    // ===== 主键 =====
    pub id: i64,

    // ===== 课程配置 =====
    pub course_name: String,
    pub blueprint_course_id: String,
    pub term_id: String, // AY2025-2026[-suffix]
    pub account_id: String,
    pub membership_type: MembershipType,
    pub course_type: CourseType,
    pub course_status: CourseStatus,

    // ===== 分片参数 =====
    pub course_count: u32,  // 平行课程副本数 (>=1)
    pub section_count: u32, // 每个副本的分班数 (>=0)

    // ===== 状态 =====
    pub is_provisioned: bool,
    pub creation_date: DateTime<Utc>,
    pub deleted_date: Option<DateTime<Utc>>,
}

impl TrainingCourse {
    /// 创建未落库的培训课程定义（id = 0）
    pub fn new(
        course_name: &str,
        blueprint_course_id: &str,
        term_id: &str,
        account_id: &str,
        membership_type: MembershipType,
        course_type: CourseType,
    ) -> Self {
        Self {
            id: 0,
            course_name: course_name.to_string(),
            blueprint_course_id: blueprint_course_id.to_string(),
            term_id: term_id.to_string(),
            account_id: account_id.to_string(),
            membership_type,
            course_type,
            course_status: CourseStatus::Active,
            course_count: 1,
            section_count: 0,
            is_provisioned: true,
            creation_date: Utc::now(),
            deleted_date: None,
        }
    }

    /// 所属学年
    pub fn academic_year(&self) -> Result<AcademicYear, ParseError> {
        AcademicYear::from_term_id(&self.term_id)
    }

    /// 是否参与对账（已开通且未软删除）
    pub fn is_active(&self) -> bool {
        self.is_provisioned && self.deleted_date.is_none()
    }

    /// 课程 ID 前缀: <term>-<blueprint>-
    pub fn course_id_prefix(&self) -> String {
        format!("{}-{}-", self.term_id, self.blueprint_course_id)
    }

    /// 第 index 个副本的课程 ID（序号从 1 起，三位补零）
    pub fn course_id(&self, index: u32) -> String {
        format!("{}{:03}", self.course_id_prefix(), index + 1)
    }

    /// 全部副本课程 ID
    pub fn course_import_ids(&self) -> Vec<String> {
        (0..self.course_count).map(|i| self.course_id(i)).collect()
    }

    /// 副本课程短名（即课程名）
    pub fn course_short_name(&self) -> &str {
        &self.course_name
    }

    /// 副本课程长名: <课程名> (<序号>)
    pub fn course_long_name(&self, ordinal: u32) -> String {
        format!("{} ({})", self.course_name, ordinal)
    }

    /// 配置校验
    pub fn validate(&self) -> Result<(), String> {
        if self.course_name.trim().is_empty() {
            return Err("course_name 不能为空".to_string());
        }
        if self.blueprint_course_id.trim().is_empty() {
            return Err("blueprint_course_id 不能为空".to_string());
        }
        if self.course_count < 1 {
            return Err(format!("course_count 必须 >= 1, 实际 {}", self.course_count));
        }
        self.academic_year().map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn json_data(&self) -> JsonValue {
        json!({
            "course_name": self.course_name,
            "blueprint_course_id": self.blueprint_course_id,
            "term_id": self.term_id,
            "account_id": self.account_id,
            "membership_type": self.membership_type.as_str(),
            "course_type": self.course_type.as_str(),
            "course_status": self.course_status.as_i64(),
            "course_status_name": self.course_status.as_str(),
            "course_count": self.course_count,
            "section_count": self.section_count,
            "creation_date": self.creation_date.to_rfc3339(),
            "deleted_date": self.deleted_date.map(|d| d.to_rfc3339()),
        })
    }
}

impl std::fmt::Display for TrainingCourse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} - {})",
            self.course_name, self.blueprint_course_id, self.term_id
        )
    }
}
