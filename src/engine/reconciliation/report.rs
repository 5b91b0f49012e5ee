use crate::domain::enrollment::EnrollmentRecord;
use crate::engine::eligibility::FilterStats;
use serde::{Deserialize, Serialize};

// ==========================================
// CourseMismatch - 课程分配不一致
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMismatch {
    pub student_id: String,
    pub enrollment_id: i64,
    /// 记录当前指向的课程副本
    pub existing_course_id: String,
    /// 确定性分配计算出的课程副本
    pub computed_course_id: String,
}

// ==========================================
// ReconciliationReport - 对账报告
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// 培训课程定义
    pub training_course_id: i64,
    pub term_id: String,
    pub blueprint_course_id: String,

    /// 原始候选人数（筛选前）
    pub candidate_count: usize,

    /// 资格筛选统计
    pub filter_stats: FilterStats,

    /// 新建的选课
    pub created: Vec<EnrollmentRecord>,

    /// 恢复的选课
    pub reactivated: Vec<EnrollmentRecord>,

    /// 退课（软删除）的选课
    pub dropped: Vec<EnrollmentRecord>,

    /// 资格标签变更的选课数
    pub updated: usize,

    /// 无变化的选课数
    pub unchanged: usize,

    /// 分班调整数（旧分班软删除 + 新分班恢复或新建）
    pub section_changes: usize,

    /// 课程分配不一致（跳过，记录保持原样）
    pub mismatches: Vec<CourseMismatch>,

    /// 耗时（毫秒）
    pub duration_ms: u64,
}

impl ReconciliationReport {
    pub fn new(training_course_id: i64, term_id: &str, blueprint_course_id: &str) -> Self {
        Self {
            training_course_id,
            term_id: term_id.to_string(),
            blueprint_course_id: blueprint_course_id.to_string(),
            ..Self::default()
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn reactivated_count(&self) -> usize {
        self.reactivated.len()
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// 是否产生了选课变更
    pub fn has_changes(&self) -> bool {
        !self.created.is_empty()
            || !self.reactivated.is_empty()
            || !self.dropped.is_empty()
            || self.updated > 0
            || self.section_changes > 0
    }

    /// 全部新建/恢复/退课的记录
    pub fn changed_records(&self) -> impl Iterator<Item = &EnrollmentRecord> {
        self.created
            .iter()
            .chain(self.reactivated.iter())
            .chain(self.dropped.iter())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {}: candidates={}, eligible={}, created={}, reactivated={}, dropped={}, updated={}, mismatches={}",
            self.term_id,
            self.blueprint_course_id,
            self.candidate_count,
            self.filter_stats.included,
            self.created.len(),
            self.reactivated.len(),
            self.dropped.len(),
            self.updated,
            self.mismatches.len()
        )
    }
}
