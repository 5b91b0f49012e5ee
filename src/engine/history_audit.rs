// ==========================================
// 培训课程选课供给系统 - 选课历史审计与补录
// ==========================================
// 审计项:
//   - 无任何历史事件的选课
//   - 首个事件不是 CREATED
//   - 删除状态与最近一次生命周期事件不一致
// 补录: 为无历史的选课写入 CREATED 事件（时间取记录创建时间）
// ==========================================

use crate::domain::enrollment::{EnrollmentHistoryEvent, EnrollmentRecord};
use crate::domain::types::HistoryEventType;
use crate::engine::error::{ProvisionError, ProvisionResult};
use crate::engine::repositories::ProvisioningRepositories;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// 审计发现的问题选课
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub enrollment_id: i64,
    pub student_id: String,
    pub detail: String,
}

// ==========================================
// HistoryAuditReport - 审计报告
// ==========================================
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryAuditReport {
    pub total_enrollments: usize,
    pub total_events: i64,
    pub missing_history: Vec<AuditFinding>,
    pub missing_created: Vec<AuditFinding>,
    pub inconsistent_state: Vec<AuditFinding>,
    /// 事件类型 → 数量
    pub event_counts: BTreeMap<String, i64>,
}

impl HistoryAuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing_history.is_empty()
            && self.missing_created.is_empty()
            && self.inconsistent_state.is_empty()
    }
}

/// 补录结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub dry_run: bool,
    /// 缺少历史的选课 ID
    pub candidates: Vec<i64>,
    pub created: usize,
    pub failed: usize,
}

pub struct HistoryAuditor {
    repos: ProvisioningRepositories,
}

impl HistoryAuditor {
    pub fn new(repos: ProvisioningRepositories) -> Self {
        Self { repos }
    }

    /// 审计选课历史完整性
    ///
    /// # 参数
    /// - training_course_id: 仅审计指定定义；None 为全部
    pub fn audit(&self, training_course_id: Option<i64>) -> ProvisionResult<HistoryAuditReport> {
        let enrollments = self.enrollments_in_scope(training_course_id)?;
        let mut report = HistoryAuditReport {
            total_enrollments: enrollments.len(),
            total_events: self.repos.history_repo.count_all()?,
            event_counts: self.repos.history_repo.count_by_event_type()?,
            ..Default::default()
        };

        for record in &enrollments {
            let events = self.repos.history_repo.list_by_enrollment(record.id)?;
            let finding = |detail: String| AuditFinding {
                enrollment_id: record.id,
                student_id: record.student_id.to_string(),
                detail,
            };

            let Some(first) = events.first() else {
                report.missing_history.push(finding("no history events".to_string()));
                continue;
            };

            if first.event_type != HistoryEventType::Created {
                report
                    .missing_created
                    .push(finding(format!("first event is {}", first.event_type)));
            }

            let last_lifecycle = events
                .iter()
                .rev()
                .map(|e| e.event_type)
                .find(|t| *t != HistoryEventType::Updated);
            let history_says_deleted = last_lifecycle == Some(HistoryEventType::Deleted);
            if history_says_deleted != !record.is_active() {
                report.inconsistent_state.push(finding(format!(
                    "deleted_date={:?}, last lifecycle event={:?}",
                    record.deleted_date, last_lifecycle
                )));
            }
        }

        if report.is_clean() {
            info!(enrollments = report.total_enrollments, "选课历史审计通过");
        } else {
            warn!(
                missing_history = report.missing_history.len(),
                missing_created = report.missing_created.len(),
                inconsistent_state = report.inconsistent_state.len(),
                "选课历史审计发现问题"
            );
        }
        Ok(report)
    }

    /// 为缺少历史的选课补录 CREATED 事件
    ///
    /// # 参数
    /// - training_course_id: 仅处理指定定义
    /// - dry_run: 只列出，不写入
    pub fn backfill(&self, training_course_id: Option<i64>, dry_run: bool) -> ProvisionResult<BackfillReport> {
        let with_history = self.repos.history_repo.enrollment_ids_with_history()?;
        let pending: Vec<EnrollmentRecord> = self
            .enrollments_in_scope(training_course_id)?
            .into_iter()
            .filter(|r| !with_history.contains(&r.id))
            .collect();

        let mut report = BackfillReport {
            dry_run,
            candidates: pending.iter().map(|r| r.id).collect(),
            ..Default::default()
        };
        if dry_run || pending.is_empty() {
            info!(candidates = report.candidates.len(), dry_run, "选课历史补录（未写入）");
            return Ok(report);
        }

        for record in &pending {
            match self.backfill_one(record) {
                Ok(()) => report.created += 1,
                Err(e) => {
                    warn!(enrollment_id = record.id, error = %e, "补录历史失败");
                    report.failed += 1;
                }
            }
        }
        info!(created = report.created, failed = report.failed, "选课历史补录完成");
        Ok(report)
    }

    fn backfill_one(&self, record: &EnrollmentRecord) -> ProvisionResult<()> {
        let (course_id, section_id) = self
            .repos
            .enrollment_repo
            .placement_ids(record.id)?
            .ok_or_else(|| ProvisionError::MissingCourse(format!("course_pk={}", record.course_pk)))?;

        let mut event = EnrollmentHistoryEvent::new(
            HistoryEventType::Created,
            record.id,
            &record.student_id,
            &course_id,
            section_id.as_deref(),
            &record.eligible_terms,
        )
        .with_note("backfilled");
        event.timestamp = record.created_date;

        self.repos.history_repo.append(&event)?;
        Ok(())
    }

    fn enrollments_in_scope(&self, training_course_id: Option<i64>) -> ProvisionResult<Vec<EnrollmentRecord>> {
        let all = self.repos.enrollment_repo.list_all()?;
        Ok(match training_course_id {
            Some(id) => all.into_iter().filter(|r| r.training_course_id == id).collect(),
            None => all,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::EligibleTerms;
    use crate::domain::ids::{EligibilityTag, StudentId};
    use crate::domain::types::{CourseType, Priority};
    use crate::engine::test_support::{seed_training_course, setup_test_db};
    use chrono::{Duration, Utc};
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn insert_without_history(
        conn: &Arc<Mutex<Connection>>,
        repos: &ProvisioningRepositories,
        tc_id: i64,
        student: &str,
    ) -> EnrollmentRecord {
        let course = repos.course_repo.list_by_training_course(tc_id).unwrap().remove(0);
        let mut terms = EligibleTerms::new();
        terms.insert(EligibilityTag::parse("20254R").unwrap());
        let record = EnrollmentRecord {
            id: 0,
            training_course_id: tc_id,
            course_pk: course.id,
            section_pk: None,
            student_id: StudentId::new(student).unwrap(),
            eligible_terms: terms.clone(),
            created_date: Utc::now() - Duration::days(30),
            provisioned_date: None,
            deleted_date: None,
            priority: Priority::Default,
            queue_id: None,
        };
        // 先带事件创建，再删除历史，模拟历史功能上线前的旧数据
        let created = repos
            .enrollment_repo
            .create_with_event(
                &record,
                EnrollmentHistoryEvent::new(
                    HistoryEventType::Created,
                    0,
                    &record.student_id,
                    &course.course_id,
                    None,
                    &terms,
                ),
            )
            .unwrap();
        conn.lock()
            .unwrap()
            .execute("DELETE FROM enrollment_history WHERE enrollment_id = ?1", [created.id])
            .unwrap();
        created
    }

    #[test]
    fn test_audit_flags_missing_history_and_backfill_repairs() {
        let conn = setup_test_db();
        let repos = ProvisioningRepositories::from_connection(conn.clone());
        let tc = seed_training_course(&repos, "BP1", "AY2025-2026", CourseType::Initial, 1, 0);
        let legacy = insert_without_history(&conn, &repos, tc.id, "1000001");

        let auditor = HistoryAuditor::new(repos.clone());
        let report = auditor.audit(None).unwrap();
        assert_eq!(report.total_enrollments, 1);
        assert_eq!(report.missing_history.len(), 1);
        assert!(!report.is_clean());

        let dry = auditor.backfill(Some(tc.id), true).unwrap();
        assert_eq!(dry.candidates, vec![legacy.id]);
        assert_eq!(dry.created, 0);
        assert!(repos.history_repo.list_by_enrollment(legacy.id).unwrap().is_empty());

        let applied = auditor.backfill(Some(tc.id), false).unwrap();
        assert_eq!(applied.created, 1);
        let events = repos.history_repo.list_by_enrollment(legacy.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, HistoryEventType::Created);
        assert_eq!(events[0].timestamp.timestamp(), legacy.created_date.timestamp());

        assert!(auditor.audit(Some(tc.id)).unwrap().is_clean());
    }

    #[test]
    fn test_audit_flags_inconsistent_deletion_state() {
        let conn = setup_test_db();
        let repos = ProvisioningRepositories::from_connection(conn.clone());
        let tc = seed_training_course(&repos, "BP1", "AY2025-2026", CourseType::Initial, 1, 0);
        let mut record = insert_without_history(&conn, &repos, tc.id, "1000001");
        HistoryAuditor::new(repos.clone()).backfill(None, false).unwrap();

        // 软删除但未写 DELETED 事件
        record.deleted_date = Some(Utc::now());
        repos.enrollment_repo.save_with_event(&record, None).unwrap();

        let report = HistoryAuditor::new(repos.clone()).audit(None).unwrap();
        assert_eq!(report.inconsistent_state.len(), 1);
        assert!(report.missing_created.is_empty());
        assert_eq!(report.event_counts.get("CREATED"), Some(&1));
    }
}
