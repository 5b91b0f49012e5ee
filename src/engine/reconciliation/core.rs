use super::report::{CourseMismatch, ReconciliationReport};
use crate::config::ProvisionerConfigReader;
use crate::domain::course::{CourseInstance, SectionInstance};
use crate::domain::enrollment::{EligibleTerms, EnrollmentHistoryEvent, EnrollmentRecord};
use crate::domain::ids::StudentId;
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{HistoryEventType, Priority};
use crate::engine::assignment::{course_index, section_index};
use crate::engine::eligibility::EligibilityFilter;
use crate::engine::error::{ProvisionError, ProvisionResult};
use crate::engine::propagation::PriorityPropagation;
use crate::engine::repositories::ProvisioningRepositories;
use crate::membership::{MembershipResolver, Warehouse};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// Placement - 确定性分配结果
// ==========================================
#[derive(Debug, Clone)]
struct Placement {
    course: CourseInstance,
    section: Option<SectionInstance>,
}

impl Placement {
    fn section_pk(&self) -> Option<i64> {
        self.section.as_ref().map(|s| s.id)
    }

    fn section_id(&self) -> Option<&str> {
        self.section.as_ref().map(|s| s.section_id.as_str())
    }
}

/// 单次对账内的课程副本/分班缓存
struct PlacementCache {
    courses: HashMap<String, CourseInstance>,
    sections: HashMap<String, SectionInstance>,
}

impl PlacementCache {
    fn load(repos: &ProvisioningRepositories, training_course_id: i64) -> ProvisionResult<Self> {
        let mut courses = HashMap::new();
        let mut sections = HashMap::new();
        for course in repos.course_repo.list_by_training_course(training_course_id)? {
            for section in repos.section_repo.list_by_course(course.id)? {
                sections.insert(section.section_id.clone(), section);
            }
            courses.insert(course.course_id.clone(), course);
        }
        Ok(Self { courses, sections })
    }

    /// 计算学号的课程副本与分班
    ///
    /// # 返回
    /// - Err(MissingCourse / MissingSection): 实例尚未创建（课程开通须先于选课对账）
    fn placement_for(&self, tc: &TrainingCourse, student_id: &StudentId) -> ProvisionResult<Placement> {
        let course_id = tc.course_id(course_index(student_id, tc.course_count));
        let course = self
            .courses
            .get(&course_id)
            .cloned()
            .ok_or(ProvisionError::MissingCourse(course_id))?;

        let section = match section_index(student_id, tc.section_count) {
            Some(index) => {
                let section_id = course.section_id(index);
                let section = self
                    .sections
                    .get(&section_id)
                    .cloned()
                    .ok_or(ProvisionError::MissingSection(section_id))?;
                Some(section)
            }
            None => None,
        };

        Ok(Placement { course, section })
    }

    fn course_id_for(&self, course_pk: i64) -> Option<String> {
        self.courses
            .values()
            .find(|c| c.id == course_pk)
            .map(|c| c.course_id.clone())
    }
}

// ==========================================
// ReconciliationEngine - 选课对账引擎
// ==========================================
// 流程:
//   1. 记录该定义下出现过的全部学号（含已软删除）
//   2. 解析候选；候选为空但存在有效选课时中止（熔断）
//   3. 课程类型资格筛选
//   4. 逐个候选: 新建 / 恢复 / 不变 / 分班调整 / 课程不一致跳过
//   5. 步骤1 中未被处理的学号: 退课（软删除）
// 红线: 课程重分配从不静默执行
// 红线: 同一进程内的对账串行执行
pub struct ReconciliationEngine<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    repos: ProvisioningRepositories,
    resolver: MembershipResolver<C>,
    config: Arc<C>,
    propagation: PriorityPropagation,
    pass_lock: Mutex<()>,
}

impl<C> ReconciliationEngine<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    /// 创建对账引擎
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - warehouse: 数据仓库
    /// - config: 配置读取器
    pub fn new(repos: ProvisioningRepositories, warehouse: Arc<dyn Warehouse>, config: Arc<C>) -> Self {
        Self {
            resolver: MembershipResolver::new(warehouse, config.clone()),
            propagation: PriorityPropagation::new(repos.clone()),
            repos,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    /// 对一个培训课程定义执行选课对账
    ///
    /// # 返回
    /// - Ok(ReconciliationReport): 新建/恢复/退课记录与统计
    /// - Err(SuspiciousEmptyCandidates): 候选为空但存在有效选课（未做任何退课）
    /// - Err(MissingCourse / MissingSection): 实例未开通（未做任何写入）
    #[instrument(
        skip(self, training_course),
        fields(
            training_course_id = training_course.id,
            term_id = %training_course.term_id,
            blueprint = %training_course.blueprint_course_id
        )
    )]
    pub async fn reconcile(&self, training_course: &TrainingCourse) -> ProvisionResult<ReconciliationReport> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();
        let tc = training_course;

        // 编码格式错误立即失败
        tc.academic_year()?;

        let mut report = ReconciliationReport::new(tc.id, &tc.term_id, &tc.blueprint_course_id);

        // ==========================================
        // 步骤1: 现有学号
        // ==========================================
        let mut remaining = self.repos.enrollment_repo.student_ids_for_training_course(tc.id)?;
        let active_enrollments = self.repos.enrollment_repo.count_active_for_training_course(tc.id)?;

        // ==========================================
        // 步骤2: 候选解析 + 熔断
        // ==========================================
        let candidates = self.resolver.resolve(tc).await?;
        report.candidate_count = candidates.len();

        if candidates.is_empty() && active_enrollments > 0 {
            warn!(
                active_enrollments,
                "候选名单为空但存在有效选课，疑似上游故障，中止对账"
            );
            return Err(ProvisionError::SuspiciousEmptyCandidates {
                training_course_id: tc.id,
                active_enrollments,
            });
        }

        // ==========================================
        // 步骤3: 资格筛选
        // ==========================================
        let policy = self
            .config
            .get_prior_enrollment_policy()
            .await
            .map_err(|e| ProvisionError::Config(e.to_string()))?;
        let priors = self.repos.enrollment_repo.prior_enrollments_excluding(tc.id)?;
        let (eligible, stats) = EligibilityFilter::new(policy).filter(tc, candidates, &priors)?;
        report.filter_stats = stats;

        // 先完成全部分配计算，依赖缺失时不做任何写入
        let cache = PlacementCache::load(&self.repos, tc.id)?;
        let mut planned = Vec::with_capacity(eligible.len());
        for (student_id, terms) in eligible {
            let placement = cache.placement_for(tc, &student_id)?;
            planned.push((student_id, terms, placement));
        }

        // ==========================================
        // 步骤4: 逐个候选处理
        // ==========================================
        for (student_id, terms, placement) in planned {
            remaining.remove(&student_id);
            self.apply_candidate(tc, &student_id, &terms, &placement, &cache, &mut report)?;
        }

        // ==========================================
        // 步骤5: 退课
        // ==========================================
        for student_id in remaining {
            self.drop_student(tc, &student_id, &mut report)?;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            candidates = report.candidate_count,
            eligible = report.filter_stats.included,
            created = report.created_count(),
            reactivated = report.reactivated_count(),
            dropped = report.dropped_count(),
            updated = report.updated,
            section_changes = report.section_changes,
            mismatches = report.mismatches.len(),
            duration_ms = report.duration_ms,
            "选课对账完成"
        );
        Ok(report)
    }

    fn apply_candidate(
        &self,
        tc: &TrainingCourse,
        student_id: &StudentId,
        terms: &EligibleTerms,
        placement: &Placement,
        cache: &PlacementCache,
        report: &mut ReconciliationReport,
    ) -> ProvisionResult<()> {
        let existing = self
            .repos
            .enrollment_repo
            .list_for_student_in_training_course(tc.id, student_id)?
            .into_iter()
            .next();

        let record = match existing {
            None => {
                let created = self.create(tc, student_id, terms, placement)?;
                report.created.push(created);
                return Ok(());
            }
            Some(r) => r,
        };

        if record.course_pk != placement.course.id {
            let existing_course_id = cache
                .course_id_for(record.course_pk)
                .unwrap_or_else(|| format!("course_pk={}", record.course_pk));
            let err = ProvisionError::CourseMismatch {
                student_id: student_id.to_string(),
                existing_course_id: existing_course_id.clone(),
                computed_course_id: placement.course.course_id.clone(),
            };
            error!(enrollment_id = record.id, error = %err, "课程分配不一致，跳过该学生");
            report.mismatches.push(CourseMismatch {
                student_id: student_id.to_string(),
                enrollment_id: record.id,
                existing_course_id,
                computed_course_id: placement.course.course_id.clone(),
            });
            return Ok(());
        }

        if record.section_pk == placement.section_pk() {
            if record.is_active() {
                self.refresh_terms(record, terms, placement, report)?;
            } else {
                let reactivated = self.reactivate(record, terms, placement)?;
                report.reactivated.push(reactivated);
            }
            return Ok(());
        }

        // 同一课程副本、不同分班: 旧记录软删除，目标分班恢复或新建
        info!(
            student_id = %student_id,
            course_id = %placement.course.course_id,
            from_section_pk = ?record.section_pk,
            to_section = ?placement.section_id(),
            "分班调整"
        );
        if record.is_active() {
            self.soft_delete(record, Some("section change"))?;
        }

        match self.repos.enrollment_repo.find_by_placement(
            student_id,
            placement.course.id,
            placement.section_pk(),
        )? {
            Some(target) if target.is_active() => {
                self.refresh_terms(target, terms, placement, report)?;
            }
            Some(target) => {
                let reactivated = self.reactivate(target, terms, placement)?;
                report.reactivated.push(reactivated);
            }
            None => {
                let created = self.create(tc, student_id, terms, placement)?;
                report.created.push(created);
            }
        }
        report.section_changes += 1;
        Ok(())
    }

    fn create(
        &self,
        tc: &TrainingCourse,
        student_id: &StudentId,
        terms: &EligibleTerms,
        placement: &Placement,
    ) -> ProvisionResult<EnrollmentRecord> {
        let record = EnrollmentRecord {
            id: 0,
            training_course_id: tc.id,
            course_pk: placement.course.id,
            section_pk: placement.section_pk(),
            student_id: student_id.clone(),
            eligible_terms: terms.clone(),
            created_date: Utc::now(),
            provisioned_date: None,
            deleted_date: None,
            priority: Priority::Default,
            queue_id: None,
        };
        let event = EnrollmentHistoryEvent::new(
            HistoryEventType::Created,
            0,
            student_id,
            &placement.course.course_id,
            placement.section_id(),
            terms,
        );

        let created = self.repos.enrollment_repo.create_with_event(&record, event)?;
        self.propagation.trigger(placement.course.id)?;

        info!(
            enrollment_id = created.id,
            student_id = %student_id,
            course_id = %placement.course.course_id,
            section_id = ?placement.section_id(),
            "新建选课"
        );
        Ok(created)
    }

    fn reactivate(
        &self,
        mut record: EnrollmentRecord,
        terms: &EligibleTerms,
        placement: &Placement,
    ) -> ProvisionResult<EnrollmentRecord> {
        let previous = record.eligible_terms.clone();
        record.merge_eligible_terms(terms);
        record.deleted_date = None;
        record.priority = Priority::Default;

        let event = EnrollmentHistoryEvent::new(
            HistoryEventType::Reactivated,
            record.id,
            &record.student_id,
            &placement.course.course_id,
            placement.section_id(),
            &record.eligible_terms,
        )
        .with_previous_terms(&previous);

        self.repos.enrollment_repo.save_with_event(&record, Some(&event))?;
        self.propagation.trigger(record.course_pk)?;

        info!(
            enrollment_id = record.id,
            student_id = %record.student_id,
            course_id = %placement.course.course_id,
            "恢复选课"
        );
        Ok(record)
    }

    /// 有效记录: 资格标签并集合并，集合变化时才写 UPDATED 事件
    fn refresh_terms(
        &self,
        mut record: EnrollmentRecord,
        terms: &EligibleTerms,
        placement: &Placement,
        report: &mut ReconciliationReport,
    ) -> ProvisionResult<()> {
        let previous = record.eligible_terms.clone();
        if !record.merge_eligible_terms(terms) {
            report.unchanged += 1;
            return Ok(());
        }

        let event = EnrollmentHistoryEvent::new(
            HistoryEventType::Updated,
            record.id,
            &record.student_id,
            &placement.course.course_id,
            placement.section_id(),
            &record.eligible_terms,
        )
        .with_previous_terms(&previous);

        self.repos.enrollment_repo.save_with_event(&record, Some(&event))?;
        report.updated += 1;
        debug!(
            enrollment_id = record.id,
            summary = %event.summary(),
            "资格标签更新"
        );
        Ok(())
    }

    fn soft_delete(&self, mut record: EnrollmentRecord, note: Option<&str>) -> ProvisionResult<EnrollmentRecord> {
        let (course_id, section_id) = self
            .repos
            .enrollment_repo
            .placement_ids(record.id)?
            .ok_or_else(|| ProvisionError::MissingCourse(format!("course_pk={}", record.course_pk)))?;

        record.deleted_date = Some(Utc::now());
        record.priority = Priority::Default;

        let mut event = EnrollmentHistoryEvent::new(
            HistoryEventType::Deleted,
            record.id,
            &record.student_id,
            &course_id,
            section_id.as_deref(),
            &record.eligible_terms,
        );
        if let Some(n) = note {
            event = event.with_note(n);
        }

        self.repos.enrollment_repo.save_with_event(&record, Some(&event))?;
        self.propagation.trigger(record.course_pk)?;

        info!(
            enrollment_id = record.id,
            student_id = %record.student_id,
            course_id = %course_id,
            note = ?note,
            "退课（软删除）"
        );
        Ok(record)
    }

    /// 退课: 仅处理未删除的记录，已删除的保持不变
    fn drop_student(
        &self,
        tc: &TrainingCourse,
        student_id: &StudentId,
        report: &mut ReconciliationReport,
    ) -> ProvisionResult<()> {
        let active = self
            .repos
            .enrollment_repo
            .list_for_student_in_training_course(tc.id, student_id)?
            .into_iter()
            .find(|r| r.is_active());

        if let Some(record) = active {
            let dropped = self.soft_delete(record, None)?;
            report.dropped.push(dropped);
        }
        Ok(())
    }
}
