// ==========================================
// 培训课程选课供给系统 - 供给编排器
// ==========================================
// 用途: 课程副本/分班开通 + 选课对账 的执行顺序
// 流程（每个培训课程定义）:
//   1. add_courses: 确保 N 个课程副本存在
//   2. add_sections: 确保每个副本的 M 个分班存在
//   3. reconcile: 选课对账
// 批量任务按学年升序串行执行，单个定义失败不影响其余定义
// ==========================================

use crate::config::ProvisionerConfigReader;
use crate::domain::course::{CourseInstance, SectionInstance};
use crate::domain::ids::AcademicYear;
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::Priority;
use crate::engine::error::{ProvisionError, ProvisionResult};
use crate::engine::propagation::PriorityPropagation;
use crate::engine::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::engine::repositories::ProvisioningRepositories;
use crate::membership::Warehouse;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

// ==========================================
// ProvisionSummary - 开通结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionSummary {
    pub courses_created: usize,
    pub sections_created: usize,
}

/// 批量加载任务中单个定义的结果
#[derive(Debug, Clone, Serialize)]
pub struct CourseLoadOutcome {
    pub training_course_id: i64,
    pub term_id: String,
    pub blueprint_course_id: String,
    pub provision: Option<ProvisionSummary>,
    pub report: Option<ReconciliationReport>,
    pub error: Option<String>,
    pub retryable: bool,
}

impl CourseLoadOutcome {
    fn new(tc: &TrainingCourse) -> Self {
        Self {
            training_course_id: tc.id,
            term_id: tc.term_id.clone(),
            blueprint_course_id: tc.blueprint_course_id.clone(),
            provision: None,
            report: None,
            error: None,
            retryable: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ==========================================
// ProvisioningOrchestrator - 供给编排器
// ==========================================
pub struct ProvisioningOrchestrator<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    repos: ProvisioningRepositories,
    reconciliation: ReconciliationEngine<C>,
    propagation: PriorityPropagation,
}

impl<C> ProvisioningOrchestrator<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - warehouse: 数据仓库
    /// - config: 配置读取器
    pub fn new(repos: ProvisioningRepositories, warehouse: Arc<dyn Warehouse>, config: Arc<C>) -> Self {
        Self {
            reconciliation: ReconciliationEngine::new(repos.clone(), warehouse, config),
            propagation: PriorityPropagation::new(repos.clone()),
            repos,
        }
    }

    pub fn reconciliation(&self) -> &ReconciliationEngine<C> {
        &self.reconciliation
    }

    // ==========================================
    // 课程副本 / 分班开通
    // ==========================================

    /// 确保定义的全部课程副本存在（新建的以 default 优先级待导出）
    ///
    /// # 返回
    /// - (全部副本, 新建数)
    pub fn add_courses(&self, tc: &TrainingCourse) -> ProvisionResult<(Vec<CourseInstance>, usize)> {
        let mut courses = Vec::with_capacity(tc.course_count as usize);
        let mut created = 0;

        for index in 0..tc.course_count {
            let course_id = tc.course_id(index);
            if let Some(existing) = self.repos.course_repo.find_by_course_id(&course_id)? {
                courses.push(existing);
                continue;
            }

            let mut course = CourseInstance {
                id: 0,
                training_course_id: tc.id,
                course_id,
                course_ordinal: index + 1,
                created_date: Utc::now(),
                provisioned_date: None,
                provisioned_error: None,
                provisioned_status: None,
                deleted_date: None,
                priority: Priority::Default,
                queue_id: None,
            };
            course.id = self.repos.course_repo.insert(&course)?;
            info!(course_id = %course.course_id, "新建课程副本");
            courses.push(course);
            created += 1;
        }
        Ok((courses, created))
    }

    /// 确保课程副本的全部分班存在
    ///
    /// # 返回
    /// - (全部分班, 新建数)
    pub fn add_sections(
        &self,
        tc: &TrainingCourse,
        course: &CourseInstance,
    ) -> ProvisionResult<(Vec<SectionInstance>, usize)> {
        let mut sections = Vec::with_capacity(tc.section_count as usize);
        let mut created = 0;

        for index in 0..tc.section_count {
            let section_id = course.section_id(index);
            if let Some(existing) = self.repos.section_repo.find_by_section_id(&section_id)? {
                sections.push(existing);
                continue;
            }

            let mut section = SectionInstance {
                id: 0,
                course_pk: course.id,
                section_id,
                section_ordinal: index + 1,
                created_date: Utc::now(),
                provisioned_date: None,
                deleted_date: None,
                priority: Priority::Default,
                queue_id: None,
            };
            section.id = self.repos.section_repo.insert(&section)?;
            debug!(section_id = %section.section_id, "新建分班");
            sections.push(section);
            created += 1;
        }
        Ok((sections, created))
    }

    /// 开通定义的全部课程副本与分班
    pub fn provision(&self, tc: &TrainingCourse) -> ProvisionResult<ProvisionSummary> {
        let (courses, courses_created) = self.add_courses(tc)?;
        let mut summary = ProvisionSummary {
            courses_created,
            sections_created: 0,
        };
        for course in &courses {
            let (_, created) = self.add_sections(tc, course)?;
            summary.sections_created += created;
        }
        if summary.courses_created > 0 || summary.sections_created > 0 {
            info!(
                training_course_id = tc.id,
                courses_created = summary.courses_created,
                sections_created = summary.sections_created,
                "课程副本/分班开通完成"
            );
        }
        Ok(summary)
    }

    // ==========================================
    // 定义维护
    // ==========================================

    /// 保存定义变更，并将其全部在用副本重新标记为待导出
    ///
    /// # 返回
    /// - Ok(usize): 被提升优先级的副本数
    pub fn update_training_course(&self, tc: &TrainingCourse) -> ProvisionResult<usize> {
        tc.validate().map_err(ProvisionError::InvalidInput)?;
        self.repos.training_course_repo.update(tc)?;
        self.propagation.reprioritize_training_course(tc.id)
    }

    /// 停用定义（软删除，子实体保持不变）
    pub fn retire(&self, training_course_id: i64) -> ProvisionResult<()> {
        self.repos
            .training_course_repo
            .set_deleted_date(training_course_id, Some(Utc::now()))?;
        info!(training_course_id, "培训课程定义已停用");
        Ok(())
    }

    /// 清除定义及其全部课程副本/分班/选课/历史
    ///
    /// # 返回
    /// - Ok(usize): 删除的选课记录数
    pub fn purge(&self, training_course_id: i64) -> ProvisionResult<usize> {
        let enrollments = self.repos.training_course_repo.purge(training_course_id)?;
        info!(training_course_id, enrollments, "培训课程定义已清除");
        Ok(enrollments)
    }

    // ==========================================
    // 批量任务
    // ==========================================

    /// 单个定义: 开通 + 对账
    pub async fn provision_and_reconcile(
        &self,
        tc: &TrainingCourse,
    ) -> ProvisionResult<(ProvisionSummary, ReconciliationReport)> {
        let summary = self.provision(tc)?;
        let report = self.reconciliation.reconcile(tc).await?;
        Ok((summary, report))
    }

    /// 全部已开通、未停用定义按学年升序执行开通 + 对账
    ///
    /// 学年编码无效的定义记为失败，不中断其余定义
    #[instrument(skip(self))]
    pub async fn load_active_courses(&self) -> ProvisionResult<Vec<CourseLoadOutcome>> {
        let mut definitions: Vec<(Option<AcademicYear>, TrainingCourse)> = self
            .repos
            .training_course_repo
            .list_active()?
            .into_iter()
            .map(|tc| (tc.academic_year().ok(), tc))
            .collect();
        definitions.sort_by(|(a, x), (b, y)| a.cmp(b).then(x.id.cmp(&y.id)));

        let mut outcomes = Vec::with_capacity(definitions.len());
        for (_, tc) in &definitions {
            let mut outcome = CourseLoadOutcome::new(tc);
            match self.provision_and_reconcile(tc).await {
                Ok((summary, report)) => {
                    outcome.provision = Some(summary);
                    outcome.report = Some(report);
                }
                Err(e) => {
                    error!(
                        training_course_id = tc.id,
                        term_id = %tc.term_id,
                        blueprint = %tc.blueprint_course_id,
                        error = %e,
                        retryable = e.is_retryable(),
                        "培训课程加载失败"
                    );
                    outcome.retryable = e.is_retryable();
                    outcome.error = Some(e.to_string());
                }
            }
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(definitions = outcomes.len(), failed, "培训课程批量加载完成");
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CourseType, MembershipType};
    use crate::engine::test_support::{setup_test_db, RosterWarehouse, StaticConfig};

    fn orchestrator(students: &[&str]) -> (ProvisioningOrchestrator<StaticConfig>, ProvisioningRepositories) {
        let repos = ProvisioningRepositories::from_connection(setup_test_db());
        let orch = ProvisioningOrchestrator::new(
            repos.clone(),
            RosterWarehouse::new(students),
            Arc::new(StaticConfig::new()),
        );
        (orch, repos)
    }

    fn definition(repos: &ProvisioningRepositories, blueprint: &str, term_id: &str) -> TrainingCourse {
        let mut tc = TrainingCourse::new(
            "Title VI Training",
            blueprint,
            term_id,
            "acct-1",
            MembershipType::TitleVi,
            CourseType::Initial,
        );
        tc.course_count = 2;
        tc.section_count = 3;
        tc.id = repos.training_course_repo.insert(&tc).unwrap();
        tc
    }

    #[test]
    fn test_provision_is_idempotent() {
        let (orch, repos) = orchestrator(&[]);
        let tc = definition(&repos, "BP1", "AY2025-2026");

        let first = orch.provision(&tc).unwrap();
        assert_eq!(first, ProvisionSummary { courses_created: 2, sections_created: 6 });

        let second = orch.provision(&tc).unwrap();
        assert_eq!(second, ProvisionSummary::default());

        let courses = repos.course_repo.list_by_training_course(tc.id).unwrap();
        assert_eq!(courses.len(), 2);
        assert!(courses.iter().all(|c| c.priority == Priority::Default));
        assert_eq!(courses[0].course_id, "AY2025-2026-BP1-001");
        let sections = repos.section_repo.list_by_course(courses[0].id).unwrap();
        assert_eq!(sections[2].section_id, "AY2025-2026-BP1-001-3-");
    }

    #[test]
    fn test_update_reprioritizes_live_courses() {
        let (orch, repos) = orchestrator(&[]);
        let mut tc = definition(&repos, "BP1", "AY2025-2026");
        let (courses, _) = orch.add_courses(&tc).unwrap();
        for c in &courses {
            repos.course_repo.set_priority(c.id, Priority::None).unwrap();
        }

        tc.course_name = "Renamed".to_string();
        assert_eq!(orch.update_training_course(&tc).unwrap(), 2);
        let stored = repos.training_course_repo.find_by_id(tc.id).unwrap().unwrap();
        assert_eq!(stored.course_name, "Renamed");

        tc.course_count = 0;
        assert!(matches!(
            orch.update_training_course(&tc),
            Err(ProvisionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_retire_then_purge() {
        let (orch, repos) = orchestrator(&[]);
        let tc = definition(&repos, "BP1", "AY2025-2026");
        orch.provision(&tc).unwrap();

        orch.retire(tc.id).unwrap();
        assert!(repos.training_course_repo.list_active().unwrap().is_empty());
        // 停用不影响子实体
        assert_eq!(repos.course_repo.list_by_training_course(tc.id).unwrap().len(), 2);

        orch.purge(tc.id).unwrap();
        assert!(repos.training_course_repo.find_by_id(tc.id).unwrap().is_none());
        assert!(repos.course_repo.list_by_training_course(tc.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_active_courses_isolates_failures() {
        let (orch, repos) = orchestrator(&["1000001", "1000002"]);
        let later = definition(&repos, "BP-LATER", "AY2025-2026");
        let earlier = definition(&repos, "BP-EARLIER", "AY2024-2025");
        let mut broken = TrainingCourse::new(
            "Broken",
            "BP-BROKEN",
            "FALL-2025",
            "acct-1",
            MembershipType::TitleVi,
            CourseType::Initial,
        );
        broken.id = repos.training_course_repo.insert(&broken).unwrap();

        let outcomes = orch.load_active_courses().await.unwrap();
        assert_eq!(outcomes.len(), 3);

        // 无效学年排在最前并记为失败
        assert_eq!(outcomes[0].training_course_id, broken.id);
        assert!(outcomes[0].error.is_some());

        assert_eq!(outcomes[1].training_course_id, earlier.id);
        assert_eq!(outcomes[2].training_course_id, later.id);
        assert!(outcomes[1..].iter().all(|o| o.is_ok()));
        assert_eq!(outcomes[1].report.as_ref().unwrap().created_count(), 2);

        // 上一学年已完成首修，本学年首修课程排除
        let later_report = outcomes[2].report.as_ref().unwrap();
        assert_eq!(later_report.created_count(), 0);
        assert_eq!(later_report.filter_stats.excluded_previous_initial, 2);
    }
}
