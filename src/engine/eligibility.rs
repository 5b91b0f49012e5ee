// ==========================================
// 培训课程选课供给系统 - 课程类型资格筛选
// ==========================================
// 职责: 依据学生跨课程、跨学年的选课历史筛选候选名单
// 判定表:
//   initial: 同学年已有选课 → 排除；往年修过 initial → 排除；否则纳入
//   booster: 同学年已有选课 → 排除；往年修过 initial → 纳入；否则排除
//   其他类型: 全部纳入
// 历史选课范围: 不含当前培训课程定义
// ==========================================

use crate::config::PriorEnrollmentPolicy;
use crate::domain::enrollment::PriorEnrollment;
use crate::domain::ids::{AcademicYear, StudentId};
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::CourseType;
use crate::engine::error::ProvisionResult;
use crate::membership::CandidateMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 筛选结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityDecision {
    Include,
    /// 同学年已在其他课程选课
    ExcludeSameYear,
    /// 往年已修过 initial 课程
    ExcludePreviousInitial,
    /// booster 课程要求往年修过 initial
    ExcludeNoPreviousInitial,
}

impl EligibilityDecision {
    pub fn is_included(&self) -> bool {
        matches!(self, EligibilityDecision::Include)
    }
}

/// 判定表
pub fn decide(
    course_type: &CourseType,
    same_year_elsewhere: bool,
    previous_initial: bool,
) -> EligibilityDecision {
    match course_type {
        CourseType::Initial => {
            if same_year_elsewhere {
                EligibilityDecision::ExcludeSameYear
            } else if previous_initial {
                EligibilityDecision::ExcludePreviousInitial
            } else {
                EligibilityDecision::Include
            }
        }
        CourseType::Booster => {
            if same_year_elsewhere {
                EligibilityDecision::ExcludeSameYear
            } else if previous_initial {
                EligibilityDecision::Include
            } else {
                EligibilityDecision::ExcludeNoPreviousInitial
            }
        }
        CourseType::Other(_) => EligibilityDecision::Include,
    }
}

/// 筛选统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub candidates: usize,
    pub included: usize,
    pub excluded_same_year: usize,
    pub excluded_previous_initial: usize,
    pub excluded_no_previous_initial: usize,
}

/// 学生的历史选课（已解析学年）
struct PriorIndex {
    by_student: HashMap<StudentId, Vec<(AcademicYear, CourseType, bool)>>,
}

impl PriorIndex {
    fn build(priors: &[PriorEnrollment]) -> Self {
        let mut by_student: HashMap<StudentId, Vec<(AcademicYear, CourseType, bool)>> = HashMap::new();
        for prior in priors {
            match AcademicYear::from_term_id(&prior.term_id) {
                Ok(ay) => by_student.entry(prior.student_id.clone()).or_default().push((
                    ay,
                    prior.course_type.clone(),
                    prior.is_active(),
                )),
                Err(e) => warn!(
                    training_course_id = prior.training_course_id,
                    error = %e,
                    "历史选课的学年编码无法解析，忽略"
                ),
            }
        }
        Self { by_student }
    }
}

// ==========================================
// EligibilityFilter - 资格筛选器
// ==========================================
pub struct EligibilityFilter {
    policy: PriorEnrollmentPolicy,
}

impl EligibilityFilter {
    /// 创建筛选器
    ///
    /// # 参数
    /// - policy: 已退课的往年 initial 选课是否计入
    pub fn new(policy: PriorEnrollmentPolicy) -> Self {
        Self { policy }
    }

    /// 同学年在其他课程有未删除的选课
    pub fn has_enrollment_in_same_academic_year(
        history: &[(AcademicYear, CourseType, bool)],
        ay: AcademicYear,
    ) -> bool {
        history.iter().any(|(y, _, active)| *active && *y == ay)
    }

    /// 往年修过 initial 课程
    ///
    /// ActiveOnly: 只计未删除的记录；IncludeDropped: 已退课的记录同样计入
    pub fn has_previous_primary_enrollment(
        &self,
        history: &[(AcademicYear, CourseType, bool)],
        ay: AcademicYear,
    ) -> bool {
        history.iter().any(|(y, t, active)| {
            *y != ay
                && *t == CourseType::Initial
                && (*active || self.policy == PriorEnrollmentPolicy::IncludeDropped)
        })
    }

    /// 对候选名单做课程类型筛选
    ///
    /// # 参数
    /// - training_course: 当前培训课程定义
    /// - candidates: 原始候选名单
    /// - priors: 其他培训课程定义下的历史选课
    ///
    /// # 返回
    /// - (筛选后的名单, 统计)
    pub fn filter(
        &self,
        training_course: &TrainingCourse,
        candidates: CandidateMap,
        priors: &[PriorEnrollment],
    ) -> ProvisionResult<(CandidateMap, FilterStats)> {
        let ay = training_course.academic_year()?;
        let index = PriorIndex::build(priors);

        let mut stats = FilterStats {
            candidates: candidates.len(),
            ..FilterStats::default()
        };
        let empty = Vec::new();

        let mut included = CandidateMap::new();
        for (student_id, terms) in candidates {
            let history = index.by_student.get(&student_id).unwrap_or(&empty);
            let decision = decide(
                &training_course.course_type,
                Self::has_enrollment_in_same_academic_year(history, ay),
                self.has_previous_primary_enrollment(history, ay),
            );

            if decision.is_included() {
                stats.included += 1;
                included.insert(student_id, terms);
                continue;
            }
            debug!(student_id = %student_id, decision = ?decision, "候选被排除");
            match decision {
                EligibilityDecision::ExcludeSameYear => stats.excluded_same_year += 1,
                EligibilityDecision::ExcludePreviousInitial => stats.excluded_previous_initial += 1,
                EligibilityDecision::ExcludeNoPreviousInitial => {
                    stats.excluded_no_previous_initial += 1
                }
                EligibilityDecision::Include => {}
            }
        }

        debug!(
            course_type = %training_course.course_type,
            policy = self.policy.as_str(),
            candidates = stats.candidates,
            included = stats.included,
            "资格筛选完成"
        );
        Ok((included, stats))
    }
}
