// ==========================================
// 培训课程选课供给系统 - 供给 API
// ==========================================
// 职责: 对外暴露对账、排队/出队、导出监控、查询与定义维护
// 调用方: 定时任务驱动 / 运维命令行
// LMS 客户端可选；未配置时导出相关接口返回 LmsNotConfigured
// ==========================================

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ProvisionerConfigReader;
use crate::domain::enrollment::{EnrollmentDetail, EnrollmentHistoryEvent};
use crate::domain::export_batch::ExportBatch;
use crate::domain::ids::StudentId;
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::Priority;
use crate::engine::export::{ExportCoordinator, ImportCheck};
use crate::engine::history_audit::{BackfillReport, HistoryAuditReport, HistoryAuditor};
use crate::engine::orchestrator::{CourseLoadOutcome, ProvisionSummary, ProvisioningOrchestrator};
use crate::engine::propagation::PriorityPropagation;
use crate::engine::reconciliation::ReconciliationReport;
use crate::engine::repositories::ProvisioningRepositories;
use crate::importer::{CourseDefinitionImporter, CourseImportSummary};
use crate::lms::LmsClient;
use crate::membership::Warehouse;
use crate::perf::PerfGuard;
use crate::repository::export_queue_repo::QueueCounts;

// ==========================================
// ProvisioningApi - 供给 API
// ==========================================
pub struct ProvisioningApi<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    repos: ProvisioningRepositories,
    orchestrator: ProvisioningOrchestrator<C>,
    propagation: PriorityPropagation,
    auditor: HistoryAuditor,
    importer: CourseDefinitionImporter,
    exporter: Option<ExportCoordinator<C>>,
}

impl<C> ProvisioningApi<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    /// 创建新的 ProvisioningApi 实例
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - warehouse: 数据仓库端口
    /// - lms: LMS 客户端（None 时导出相关接口不可用）
    /// - config: 配置读取器
    pub fn new(
        repos: ProvisioningRepositories,
        warehouse: Arc<dyn Warehouse>,
        lms: Option<Arc<dyn LmsClient>>,
        config: Arc<C>,
    ) -> Self {
        Self {
            orchestrator: ProvisioningOrchestrator::new(repos.clone(), warehouse, config.clone()),
            propagation: PriorityPropagation::new(repos.clone()),
            auditor: HistoryAuditor::new(repos.clone()),
            importer: CourseDefinitionImporter::new(repos.clone()),
            exporter: lms.map(|lms| ExportCoordinator::new(repos.clone(), lms, config)),
            repos,
        }
    }

    // ==========================================
    // 培训课程定义
    // ==========================================

    pub fn list_training_courses(&self) -> ApiResult<Vec<TrainingCourse>> {
        Ok(self.repos.training_course_repo.list_all()?)
    }

    pub fn get_training_course(&self, training_course_id: i64) -> ApiResult<TrainingCourse> {
        self.repos
            .training_course_repo
            .find_by_id(training_course_id)?
            .ok_or_else(|| ApiError::NotFound(format!("TrainingCourse(id={})不存在", training_course_id)))
    }

    /// 从 CSV 导入培训课程定义
    pub fn import_courses(&self, file_path: &Path) -> ApiResult<CourseImportSummary> {
        let _perf = PerfGuard::new("api.import_courses");
        Ok(self.importer.import_file(file_path)?)
    }

    /// 保存定义变更
    ///
    /// # 返回
    /// - Ok(usize): 重新标记为待导出的课程副本数
    pub fn update_training_course(&self, tc: &TrainingCourse) -> ApiResult<usize> {
        if tc.id <= 0 {
            return Err(ApiError::InvalidInput("缺少培训课程定义主键".to_string()));
        }
        Ok(self.orchestrator.update_training_course(tc)?)
    }

    pub fn retire(&self, training_course_id: i64) -> ApiResult<()> {
        self.get_training_course(training_course_id)?;
        Ok(self.orchestrator.retire(training_course_id)?)
    }

    /// 级联清除定义（不可恢复）
    pub fn purge(&self, training_course_id: i64) -> ApiResult<usize> {
        self.get_training_course(training_course_id)?;
        warn!(training_course_id, "清除培训课程定义及全部选课");
        Ok(self.orchestrator.purge(training_course_id)?)
    }

    // ==========================================
    // 开通与对账
    // ==========================================

    pub fn provision(&self, training_course_id: i64) -> ApiResult<ProvisionSummary> {
        let tc = self.get_training_course(training_course_id)?;
        Ok(self.orchestrator.provision(&tc)?)
    }

    /// 单个定义: 开通课程副本/分班后对账
    pub async fn reconcile(&self, training_course_id: i64) -> ApiResult<ReconciliationReport> {
        let _perf = PerfGuard::new("api.reconcile");
        let tc = self.get_training_course(training_course_id)?;
        let (_, report) = self.orchestrator.provision_and_reconcile(&tc).await?;
        Ok(report)
    }

    /// 全部在用定义的开通 + 对账
    pub async fn load_active_courses(&self) -> ApiResult<Vec<CourseLoadOutcome>> {
        let _perf = PerfGuard::new("api.load_active_courses");
        Ok(self.orchestrator.load_active_courses().await?)
    }

    // ==========================================
    // 导出队列
    // ==========================================

    pub fn queue_by_priority(&self, tier: &str) -> ApiResult<(ExportBatch, QueueCounts)> {
        let tier = parse_tier(tier)?;
        Ok(self.propagation.queue_by_priority(tier)?)
    }

    pub fn dequeue(&self, batch_id: &str, imported: bool) -> ApiResult<QueueCounts> {
        if self.repos.batch_repo.find_by_id(batch_id)?.is_none() {
            return Err(ApiError::NotFound(format!("ExportBatch(id={})不存在", batch_id)));
        }
        Ok(self.propagation.dequeue(batch_id, imported)?)
    }

    /// 排队 + 构建变更集 + 提交导入
    pub async fn export_batch(&self, tier: &str) -> ApiResult<ExportBatch> {
        let _perf = PerfGuard::new("api.export_batch");
        let tier = parse_tier(tier)?;
        Ok(self.exporter()?.export_batch(tier).await?)
    }

    pub async fn monitor_imports(&self) -> ApiResult<Vec<ImportCheck>> {
        let _perf = PerfGuard::new("api.monitor_imports");
        Ok(self.exporter()?.monitor_imports().await?)
    }

    pub fn list_batches(&self) -> ApiResult<Vec<ExportBatch>> {
        Ok(self.repos.batch_repo.list_all()?)
    }

    /// 运维取消批次（远端导入进行中时一并取消）
    pub async fn delete_batch(&self, batch_id: &str) -> ApiResult<()> {
        if !self.exporter()?.delete_batch(batch_id).await? {
            return Err(ApiError::NotFound(format!("ExportBatch(id={})不存在", batch_id)));
        }
        info!(batch_id, "导出批次已由运维删除");
        Ok(())
    }

    pub fn has_lms(&self) -> bool {
        self.exporter.is_some()
    }

    fn exporter(&self) -> ApiResult<&ExportCoordinator<C>> {
        self.exporter.as_ref().ok_or(ApiError::LmsNotConfigured)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 学生的全部选课（含课程/分班信息）
    pub fn enrollments_for_student(&self, student_id: &str) -> ApiResult<Vec<EnrollmentDetail>> {
        let student = parse_student(student_id)?;
        Ok(self.repos.enrollment_repo.details_for_student(&student)?)
    }

    pub fn history_for_student(&self, student_id: &str) -> ApiResult<Vec<EnrollmentHistoryEvent>> {
        let student = parse_student(student_id)?;
        Ok(self.repos.history_repo.list_by_student(&student)?)
    }

    // ==========================================
    // 历史审计
    // ==========================================

    pub fn audit_enrollment_history(&self, training_course_id: Option<i64>) -> ApiResult<HistoryAuditReport> {
        let _perf = PerfGuard::new("api.audit_enrollment_history");
        Ok(self.auditor.audit(training_course_id)?)
    }

    pub fn backfill_enrollment_history(
        &self,
        training_course_id: Option<i64>,
        dry_run: bool,
    ) -> ApiResult<BackfillReport> {
        Ok(self.auditor.backfill(training_course_id, dry_run)?)
    }
}

fn parse_tier(tier: &str) -> ApiResult<Priority> {
    match Priority::parse(tier) {
        Some(Priority::None) | None => Err(ApiError::InvalidInput(format!(
            "无效的导出优先级: {}（应为 default / high / immediate）",
            tier
        ))),
        Some(p) => Ok(p),
    }
}

fn parse_student(student_id: &str) -> ApiResult<StudentId> {
    StudentId::new(student_id).map_err(|e| ApiError::InvalidInput(e.to_string()))
}
