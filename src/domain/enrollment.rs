// ==========================================
// 培训课程选课供给系统 - 选课记录与历史
// ==========================================
// 红线: 选课记录只软删除（deleted_date），历史事件只追加
// 一个学号在同一培训课程下至多一条未删除记录（跨副本）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeSet;

use super::ids::{EligibilityTag, StudentId};
use super::types::{CourseType, HistoryEventType, Priority};

/// 资格标签集合（有序、去重）
pub type EligibleTerms = BTreeSet<EligibilityTag>;

// ==========================================
// EnrollmentRecord - 选课记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: i64,
    pub training_course_id: i64,
    pub course_pk: i64,
    pub section_pk: Option<i64>,
    pub student_id: StudentId,
    pub eligible_terms: EligibleTerms,
    pub created_date: DateTime<Utc>,
    pub provisioned_date: Option<DateTime<Utc>>,
    pub deleted_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub queue_id: Option<String>,
}

impl EnrollmentRecord {
    pub fn is_active(&self) -> bool {
        self.deleted_date.is_none()
    }

    /// 合并资格标签（并集）
    ///
    /// # 返回
    /// 集合是否发生变化
    pub fn merge_eligible_terms(&mut self, incoming: &EligibleTerms) -> bool {
        let before = self.eligible_terms.len();
        self.eligible_terms.extend(incoming.iter().copied());
        self.eligible_terms.len() != before
    }
}

/// 资格标签的字符串表示（写入历史与导出时使用）
pub fn terms_to_strings(terms: &EligibleTerms) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

// ==========================================
// PriorEnrollment - 跨课程的历史选课行
// ==========================================
// 复训筛选使用；由仓储层返回，谓词在引擎层计算
#[derive(Debug, Clone, PartialEq)]
pub struct PriorEnrollment {
    pub student_id: StudentId,
    pub training_course_id: i64,
    pub term_id: String,
    pub course_type: CourseType,
    pub deleted_date: Option<DateTime<Utc>>,
}

impl PriorEnrollment {
    pub fn is_active(&self) -> bool {
        self.deleted_date.is_none()
    }
}

// ==========================================
// EnrollmentDetail - 选课明细（查询视图）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentDetail {
    pub enrollment: EnrollmentRecord,
    pub course_id: String,
    pub section_id: Option<String>,
    pub training_course_id: i64,
    pub course_name: String,
    pub term_id: String,
}

// ==========================================
// EnrollmentHistoryEvent - 选课历史事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentHistoryEvent {
    pub id: i64,
    pub enrollment_id: i64,
    pub event_type: HistoryEventType,
    pub student_id: StudentId,
    pub course_id: String,
    pub section_id: Option<String>,
    pub eligible_terms: Vec<String>,
    pub previous_eligible_terms: Option<Vec<String>>,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EnrollmentHistoryEvent {
    /// 构造待写入事件（id = 0）
    pub fn new(
        event_type: HistoryEventType,
        enrollment_id: i64,
        student_id: &StudentId,
        course_id: &str,
        section_id: Option<&str>,
        eligible_terms: &EligibleTerms,
    ) -> Self {
        Self {
            id: 0,
            enrollment_id,
            event_type,
            student_id: student_id.clone(),
            course_id: course_id.to_string(),
            section_id: section_id.map(str::to_string),
            eligible_terms: terms_to_strings(eligible_terms),
            previous_eligible_terms: None,
            note: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_previous_terms(mut self, previous: &EligibleTerms) -> Self {
        self.previous_eligible_terms = Some(terms_to_strings(previous));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// 新增的资格标签（相对 previous_eligible_terms）
    pub fn terms_added(&self) -> Vec<String> {
        match &self.previous_eligible_terms {
            None => Vec::new(),
            Some(prev) => self
                .eligible_terms
                .iter()
                .filter(|t| !prev.contains(t))
                .cloned()
                .collect(),
        }
    }

    /// 移除的资格标签
    pub fn terms_removed(&self) -> Vec<String> {
        match &self.previous_eligible_terms {
            None => Vec::new(),
            Some(prev) => prev
                .iter()
                .filter(|t| !self.eligible_terms.contains(t))
                .cloned()
                .collect(),
        }
    }

    /// 是否为资格标签变更事件
    pub fn is_terms_update(&self) -> bool {
        self.event_type == HistoryEventType::Updated
            && (!self.terms_added().is_empty() || !self.terms_removed().is_empty())
    }

    /// 单行摘要
    pub fn summary(&self) -> String {
        let mut s = format!("{} for {}", self.event_type.label(), self.student_id);
        if self.event_type == HistoryEventType::Updated {
            let added = self.terms_added();
            let removed = self.terms_removed();
            if !added.is_empty() {
                s.push_str(&format!(" (+{})", added.join(", ")));
            }
            if !removed.is_empty() {
                s.push_str(&format!(" (-{})", removed.join(", ")));
            }
        }
        s
    }

    pub fn json_data(&self) -> JsonValue {
        json!({
            "event_type": self.event_type.as_str(),
            "student_id": self.student_id,
            "course_id": self.course_id,
            "section_id": self.section_id,
            "eligible_terms": self.eligible_terms,
            "previous_eligible_terms": self.previous_eligible_terms,
            "terms_added": self.terms_added(),
            "terms_removed": self.terms_removed(),
            "note": self.note,
            "timestamp": self.timestamp.to_rfc3339(),
            "summary": self.summary(),
        })
    }
}
