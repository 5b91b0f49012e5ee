use super::row_info::parse_row_info;
use crate::config::ProvisionerConfigReader;
use crate::domain::export_batch::ExportBatch;
use crate::domain::ids::StudentId;
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{ImportStatus, Priority};
use crate::engine::error::{ProvisionError, ProvisionResult};
use crate::engine::propagation::PriorityPropagation;
use crate::engine::repositories::ProvisioningRepositories;
use crate::lms::{
    ChangeSet, CourseRow, EnrollmentRow, ImportMessage, ImportProgress, LmsClient, LmsError,
    SectionRow, ENROLLMENTS_FILE,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

const USER_NOT_FOUND_PREFIX: &str = "User not found for enrollment";

/// 一次导出/轮询所需的 LMS 配置，在任何状态变更之前读取
#[derive(Debug, Clone)]
struct LmsSettings {
    root_account_id: String,
    student_role: String,
    timeout: Duration,
}

/// 单个批次的轮询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportCheck {
    pub batch_id: String,
    pub status: ImportStatus,
    pub progress: Option<i64>,
    pub workflow_state: Option<String>,
    /// 重新标记为待导出的选课数（仅 PARTIAL）
    pub reprioritized_enrollments: usize,
}

// ==========================================
// ExportCoordinator - 导出/导入协调器
// ==========================================
pub struct ExportCoordinator<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    repos: ProvisioningRepositories,
    lms: Arc<dyn LmsClient>,
    config: Arc<C>,
    propagation: PriorityPropagation,
}

impl<C> ExportCoordinator<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    pub fn new(repos: ProvisioningRepositories, lms: Arc<dyn LmsClient>, config: Arc<C>) -> Self {
        Self {
            propagation: PriorityPropagation::new(repos.clone()),
            repos,
            lms,
            config,
        }
    }

    /// 排队并提交一个导出批次
    ///
    /// # 返回
    /// - Ok(ExportBatch): SUBMITTED，或 FAILED（失败原因记录在批次上）
    /// - Err(EmptyQueue): 该优先级没有待导出实体
    /// - Err(Config): 配置读取失败，此时尚未排队
    #[instrument(skip(self), fields(priority = %tier))]
    pub async fn export_batch(&self, tier: Priority) -> ProvisionResult<ExportBatch> {
        let settings = self.lms_settings().await?;
        let (mut batch, _counts) = self.propagation.queue_by_priority(tier)?;

        let bundle = match self.build_change_set(&batch.batch_id, &settings).await {
            Ok(change_set) => change_set.render().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let bundle = match bundle {
            Ok(b) => b,
            Err(message) => {
                error!(batch_id = %batch.batch_id, error = %message, "变更集构建失败");
                batch.csv_errors = Some(message);
                self.close_failed(&mut batch)?;
                return Ok(batch);
            }
        };

        match self
            .lms_call(
                &settings,
                "submit_import",
                self.lms.submit_import(&settings.root_account_id, &bundle),
            )
            .await
        {
            Ok(handle) => {
                self.transition(&mut batch, ImportStatus::Submitted);
                batch.remote_import_id = Some(handle.import_id);
                batch.workflow_state = Some(handle.workflow_state);
                batch.submitted_at = Some(Utc::now());
                batch.error_message = None;
                self.repos.batch_repo.update(&batch)?;
                info!(
                    batch_id = %batch.batch_id,
                    import_id = ?batch.remote_import_id,
                    files = bundle.files.len(),
                    "导出批次已提交"
                );
            }
            Err(e) => {
                error!(batch_id = %batch.batch_id, error = %e, "导出批次提交失败");
                batch.error_message = Some(e.to_string());
                self.close_failed(&mut batch)?;
            }
        }
        Ok(batch)
    }

    /// 轮询全部 SUBMITTED 批次并按远端状态收尾
    ///
    /// 轮询失败的批次保持 SUBMITTED，留待下次
    #[instrument(skip(self))]
    pub async fn monitor_imports(&self) -> ProvisionResult<Vec<ImportCheck>> {
        let settings = self.lms_settings().await?;
        let mut checks = Vec::new();

        for mut batch in self.repos.batch_repo.list_by_status(ImportStatus::Submitted)? {
            let Some(import_id) = batch.remote_import_id.clone() else {
                warn!(batch_id = %batch.batch_id, "SUBMITTED 批次缺少远端导入 ID，跳过");
                continue;
            };

            let progress = match self
                .lms_call(
                    &settings,
                    "poll_import",
                    self.lms.poll_import(&settings.root_account_id, &import_id),
                )
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    warn!(batch_id = %batch.batch_id, error = %e, "导入状态轮询失败");
                    checks.push(check_of(&batch, 0));
                    continue;
                }
            };

            batch.progress = Some(progress.progress);
            batch.workflow_state = Some(progress.workflow_state.clone());

            if !progress.is_finished() {
                self.repos.batch_repo.update(&batch)?;
                checks.push(check_of(&batch, 0));
                continue;
            }

            let reprioritized = self.finish_batch(&mut batch, &progress)?;
            checks.push(check_of(&batch, reprioritized));
        }

        info!(batches = checks.len(), "导入状态轮询完成");
        Ok(checks)
    }

    /// 删除批次（进行中的远端导入一并取消）
    ///
    /// # 返回
    /// - Ok(false): 批次不存在
    #[instrument(skip(self))]
    pub async fn delete_batch(&self, batch_id: &str) -> ProvisionResult<bool> {
        let Some(batch) = self.repos.batch_repo.find_by_id(batch_id)? else {
            return Ok(false);
        };

        if let (ImportStatus::Submitted, Some(import_id)) = (batch.status, batch.remote_import_id.as_deref()) {
            let settings = self.lms_settings().await?;
            match self
                .lms_call(
                    &settings,
                    "cancel_import",
                    self.lms.cancel_import(&settings.root_account_id, import_id),
                )
                .await
            {
                Ok(()) => info!(batch_id, import_id, "远端导入已取消"),
                Err(ProvisionError::Lms(LmsError::NotFound(_))) => {
                    warn!(batch_id, import_id, "远端导入不存在，继续删除批次")
                }
                Err(e) => return Err(e),
            }
        }

        self.propagation.dequeue(batch_id, false)?;
        let deleted = self.repos.batch_repo.delete(batch_id)?;
        info!(batch_id, "导出批次已删除");
        Ok(deleted)
    }

    // ==========================================
    // 内部: 收尾
    // ==========================================

    /// 按远端结果收尾；PARTIAL 与 CLEAN 一样视为已导入并下调优先级
    fn finish_batch(&self, batch: &mut ExportBatch, progress: &ImportProgress) -> ProvisionResult<usize> {
        let next = if progress.is_failed() {
            ImportStatus::Failed
        } else if progress.has_messages() || progress.workflow_state == "imported_with_messages" {
            ImportStatus::Partial
        } else {
            ImportStatus::Clean
        };

        batch.completed_at = Some(Utc::now());
        batch.warnings = messages_json(&progress.warnings);
        batch.errors = messages_json(&progress.errors);

        match next {
            ImportStatus::Clean => {
                self.transition(batch, ImportStatus::Clean);
                self.propagation.dequeue(&batch.batch_id, true)?;
                self.repos.batch_repo.delete(&batch.batch_id)?;
                info!(batch_id = %batch.batch_id, "导入完成（无消息），批次记录删除");
                Ok(0)
            }
            ImportStatus::Partial => {
                self.transition(batch, ImportStatus::Partial);
                self.propagation.dequeue(&batch.batch_id, true)?;
                self.repos.batch_repo.update(batch)?;
                warn!(
                    batch_id = %batch.batch_id,
                    warnings = progress.warnings.len(),
                    errors = progress.errors.len(),
                    "导入完成但有消息，保留批次"
                );
                self.reprioritize_failed_enrollments(&progress.errors)
            }
            _ => {
                batch.error_message = Some(format!("remote import {}", progress.workflow_state));
                self.close_failed(batch)?;
                Ok(0)
            }
        }
    }

    fn close_failed(&self, batch: &mut ExportBatch) -> ProvisionResult<()> {
        self.transition(batch, ImportStatus::Failed);
        self.repos.batch_repo.update(batch)?;
        self.propagation.dequeue(&batch.batch_id, false)?;
        warn!(batch_id = %batch.batch_id, error = ?batch.error_message, "导出批次失败，成员释放回队列");
        Ok(())
    }

    fn transition(&self, batch: &mut ExportBatch, next: ImportStatus) {
        if !batch.status.can_transition_to(next) {
            warn!(batch_id = %batch.batch_id, from = %batch.status, to = %next, "非常规的批次状态迁移");
        }
        batch.status = next;
    }

    /// "User not found for enrollment" 的选课重置为未开通并重新待导出
    fn reprioritize_failed_enrollments(&self, errors: &[ImportMessage]) -> ProvisionResult<usize> {
        let mut count = 0;
        for message in errors {
            if message.file != ENROLLMENTS_FILE || !message.message.starts_with(USER_NOT_FOUND_PREFIX) {
                continue;
            }
            let Some(row) = message.row_info.as_deref().and_then(parse_row_info) else {
                error!(row_info = ?message.row_info, "无法解析导入错误行");
                continue;
            };
            let student_id = match StudentId::new(&row.user_integration_id) {
                Ok(sid) => sid,
                Err(e) => {
                    error!(row_info = ?message.row_info, error = %e, "导入错误行学号无效");
                    continue;
                }
            };
            match self
                .repos
                .enrollment_repo
                .find_active_by_course_id(&row.course_id, &student_id)?
            {
                Some(record) => {
                    self.propagation.reprioritize_enrollment(record)?;
                    count += 1;
                }
                None => error!(
                    course_id = %row.course_id,
                    student_id = %student_id,
                    "导入错误行对应的选课不存在"
                ),
            }
        }
        Ok(count)
    }

    // ==========================================
    // 内部: 变更集构建
    // ==========================================

    async fn build_change_set(&self, batch_id: &str, settings: &LmsSettings) -> ProvisionResult<ChangeSet> {
        let role = &settings.student_role;
        let role_id = self
            .lms_call(
                settings,
                "role_id",
                self.lms.role_id(&settings.root_account_id, role),
            )
            .await?
            .unwrap_or_else(|| {
                warn!(role = %role, "LMS 中未找到角色 ID");
                String::new()
            });

        let mut change_set = ChangeSet::default();
        let mut definitions: HashMap<i64, Option<TrainingCourse>> = HashMap::new();

        for row in self.repos.queue_repo.queued_courses(batch_id)? {
            let tc_id = row.course.training_course_id;
            if !definitions.contains_key(&tc_id) {
                let tc = self.repos.training_course_repo.find_by_id(tc_id)?;
                definitions.insert(tc_id, tc);
            }

            let existing = self
                .lms_call(
                    settings,
                    "course_metadata",
                    self.lms.course_metadata(&row.course.course_id),
                )
                .await?;
            // 已存在于 LMS 的课程沿用其名称
            let (short_name, long_name) = match (existing, definitions.get(&tc_id).and_then(Option::as_ref)) {
                (Some(meta), _) => (meta.short_name, meta.name),
                (None, Some(tc)) => (
                    tc.course_short_name().to_string(),
                    tc.course_long_name(row.course.course_ordinal),
                ),
                (None, None) => (row.course_name.clone(), row.course_name.clone()),
            };

            let status = if row.course.deleted_date.is_some() {
                "deleted"
            } else {
                row.course_status.as_str()
            };
            change_set.courses.push(CourseRow {
                course_id: row.course.course_id.clone(),
                short_name,
                long_name,
                account_id: row.account_id.clone(),
                term_id: row.term_id.clone(),
                status: status.to_string(),
                blueprint_course_id: row.blueprint_course_id.clone(),
            });
        }

        for row in self.repos.queue_repo.queued_sections(batch_id)? {
            change_set.sections.push(SectionRow {
                section_id: row.section.section_id.clone(),
                course_id: row.course_id.clone(),
                name: format!("Section {}", row.section.section_ordinal),
                status: active_status(row.section.deleted_date.is_none()).to_string(),
            });
        }

        for row in self.repos.queue_repo.queued_enrollments(batch_id)? {
            change_set.enrollments.push(EnrollmentRow {
                course_id: row.course_id.clone(),
                user_integration_id: row.enrollment.student_id.to_string(),
                role: role.to_string(),
                role_id: role_id.clone(),
                section_id: row.section_id.clone().unwrap_or_default(),
                status: active_status(row.enrollment.is_active()).to_string(),
            });
        }

        Ok(change_set)
    }

    // ==========================================
    // 内部: LMS 调用
    // ==========================================

    async fn lms_settings(&self) -> ProvisionResult<LmsSettings> {
        let config_err = |e: Box<dyn std::error::Error + Send + Sync>| ProvisionError::Config(e.to_string());
        Ok(LmsSettings {
            root_account_id: self.config.get_lms_root_account_id().await.map_err(config_err)?,
            student_role: self.config.get_lms_student_role().await.map_err(config_err)?,
            timeout: Duration::from_secs(self.config.get_lms_timeout_secs().await.map_err(config_err)?),
        })
    }

    async fn lms_call<T, F>(&self, settings: &LmsSettings, operation: &str, call: F) -> ProvisionResult<T>
    where
        F: Future<Output = Result<T, LmsError>>,
    {
        match tokio::time::timeout(settings.timeout, call).await {
            Ok(result) => result.map_err(ProvisionError::from),
            Err(_) => Err(ProvisionError::Timeout {
                operation: operation.to_string(),
                timeout_secs: settings.timeout.as_secs(),
            }),
        }
    }
}

fn active_status(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "deleted"
    }
}

fn messages_json(messages: &[ImportMessage]) -> Option<serde_json::Value> {
    if messages.is_empty() {
        return None;
    }
    serde_json::to_value(messages).ok()
}

fn check_of(batch: &ExportBatch, reprioritized: usize) -> ImportCheck {
    ImportCheck {
        batch_id: batch.batch_id.clone(),
        status: batch.status,
        progress: batch.progress,
        workflow_state: batch.workflow_state.clone(),
        reprioritized_enrollments: reprioritized,
    }
}
