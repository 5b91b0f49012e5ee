// ==========================================
// 培训课程选课供给系统 - 优先级传播与导出队列
// ==========================================
// 优先级: none < default < high < immediate
// trigger: 课程优先级为 none 时提升到 default（不升级已提升的优先级）
// queue_by_priority: 原子地将该优先级的实体归入新批次
// dequeue: 导入成功则降一级；否则仅清除批次引用
// 红线: 同一实体同时最多属于一个未关闭批次
// ==========================================

use crate::domain::enrollment::EnrollmentRecord;
use crate::domain::export_batch::ExportBatch;
use crate::domain::types::Priority;
use crate::engine::error::{ProvisionError, ProvisionResult};
use crate::engine::repositories::ProvisioningRepositories;
use crate::repository::QueueCounts;
use chrono::Utc;
use tracing::{debug, info};

// ==========================================
// PriorityPropagation
// ==========================================
pub struct PriorityPropagation {
    repos: ProvisioningRepositories,
}

impl PriorityPropagation {
    pub fn new(repos: ProvisioningRepositories) -> Self {
        Self { repos }
    }

    /// 标记课程副本待导出
    ///
    /// # 返回
    /// - true: 优先级由 none 提升为 default
    /// - false: 已处于提升状态，未修改
    pub fn trigger(&self, course_pk: i64) -> ProvisionResult<bool> {
        let bumped = self.repos.course_repo.trigger_if_idle(course_pk)?;
        if bumped {
            debug!(course_pk, "课程副本标记为待导出");
        }
        Ok(bumped)
    }

    /// 按优先级排队
    ///
    /// # 返回
    /// - Err(ProvisionError::EmptyQueue): 没有可排队的实体
    pub fn queue_by_priority(&self, tier: Priority) -> ProvisionResult<(ExportBatch, QueueCounts)> {
        match self.repos.queue_repo.queue_by_priority(tier)? {
            Some((batch, counts)) => {
                info!(
                    batch_id = %batch.batch_id,
                    priority = %tier,
                    courses = counts.courses,
                    sections = counts.sections,
                    enrollments = counts.enrollments,
                    "导出批次已排队"
                );
                Ok((batch, counts))
            }
            None => Err(ProvisionError::EmptyQueue(tier.to_string())),
        }
    }

    /// 出队
    ///
    /// # 参数
    /// - batch_id: 批次ID
    /// - imported: 远端是否确认导入成功
    pub fn dequeue(&self, batch_id: &str, imported: bool) -> ProvisionResult<QueueCounts> {
        let counts = self.repos.queue_repo.dequeue(batch_id, imported, Utc::now())?;
        info!(
            batch_id,
            imported,
            courses = counts.courses,
            sections = counts.sections,
            enrollments = counts.enrollments,
            "导出批次已出队"
        );
        Ok(counts)
    }

    /// 将选课重置为未开通并重新标记为待导出，同时标记其课程副本
    pub fn reprioritize_enrollment(&self, mut record: EnrollmentRecord) -> ProvisionResult<()> {
        record.provisioned_date = None;
        record.priority = Priority::Default;
        self.repos.enrollment_repo.save_with_event(&record, None)?;
        self.trigger(record.course_pk)?;
        info!(
            enrollment_id = record.id,
            student_id = %record.student_id,
            course_pk = record.course_pk,
            "选课重新标记为待导出"
        );
        Ok(())
    }

    /// 定义变更后将其全部在用课程副本提升到 default
    pub fn reprioritize_training_course(&self, training_course_id: i64) -> ProvisionResult<usize> {
        let raised = self
            .repos
            .course_repo
            .raise_for_training_course(training_course_id, Priority::Default)?;
        info!(training_course_id, raised, "培训课程定义变更，课程副本重新标记为待导出");
        Ok(raised)
    }
}
