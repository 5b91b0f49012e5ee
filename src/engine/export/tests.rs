use super::ExportCoordinator;
use crate::domain::ids::StudentId;
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{CourseType, ImportStatus, Priority};
use crate::engine::error::ProvisionError;
use crate::engine::reconciliation::ReconciliationEngine;
use crate::engine::repositories::ProvisioningRepositories;
use crate::engine::test_support::{seed_training_course, setup_test_db, FakeLms, RosterWarehouse, StaticConfig};
use crate::lms::{ImportMessage, LmsError, COURSES_FILE, ENROLLMENTS_FILE};
use std::sync::Arc;

struct Fixture {
    repos: ProvisioningRepositories,
    lms: Arc<FakeLms>,
    coordinator: ExportCoordinator<StaticConfig>,
    tc: TrainingCourse,
}

/// 一个课程副本、两名学生已完成对账
async fn fixture() -> Fixture {
    let repos = ProvisioningRepositories::from_connection(setup_test_db());
    let config = Arc::new(StaticConfig::new());
    let tc = seed_training_course(&repos, "BP1", "AY2025-2026", CourseType::Initial, 1, 0);

    let engine = ReconciliationEngine::new(
        repos.clone(),
        RosterWarehouse::new(&["0001234", "7654321"]),
        config.clone(),
    );
    engine.reconcile(&tc).await.unwrap();

    let lms = FakeLms::new();
    let coordinator = ExportCoordinator::new(repos.clone(), lms.clone(), config);
    Fixture { repos, lms, coordinator, tc }
}

#[tokio::test]
async fn test_export_batch_submits_change_set() {
    let f = fixture().await;

    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();
    assert_eq!(batch.status, ImportStatus::Submitted);
    assert_eq!(batch.remote_import_id.as_deref(), Some("imp-1"));

    let submitted = f.lms.submitted.lock().unwrap();
    let bundle = &submitted[0];
    let courses = bundle.file(COURSES_FILE).unwrap();
    assert!(courses.contains(&f.tc.course_id(0)));
    assert!(courses.contains("Title VI Training (1)"));

    let enrollments = bundle.file(ENROLLMENTS_FILE).unwrap();
    assert!(enrollments.contains("0001234"));
    assert!(enrollments.contains("7654321"));
    assert!(enrollments.contains(",student,15,"));
}

#[tokio::test]
async fn test_export_uses_existing_lms_course_names() {
    let f = fixture().await;
    f.lms.add_existing_course(&f.tc.course_id(0), "Renamed In LMS", "RENAMED");

    f.coordinator.export_batch(Priority::Default).await.unwrap();
    let submitted = f.lms.submitted.lock().unwrap();
    let courses = submitted[0].file(COURSES_FILE).unwrap();
    assert!(courses.contains("Renamed In LMS"));
    assert!(!courses.contains("Title VI Training (1)"));
}

#[tokio::test]
async fn test_export_empty_queue() {
    let f = fixture().await;
    let err = f.coordinator.export_batch(Priority::High).await.unwrap_err();
    assert!(matches!(err, ProvisionError::EmptyQueue(_)));
    assert!(f.repos.batch_repo.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_clean_import_deletes_batch_and_decrements() {
    let f = fixture().await;
    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();
    f.lms.set_progress("imp-1", "imported", Vec::new());

    let checks = f.coordinator.monitor_imports().await.unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].status, ImportStatus::Clean);
    assert!(f.repos.batch_repo.find_by_id(&batch.batch_id).unwrap().is_none());

    for record in f.repos.enrollment_repo.list_all().unwrap() {
        assert_eq!(record.priority, Priority::None);
        assert!(record.queue_id.is_none());
        assert!(record.provisioned_date.is_some());
    }
    let course = f.repos.course_repo.find_by_course_id(&f.tc.course_id(0)).unwrap().unwrap();
    assert_eq!(course.priority, Priority::None);
}

#[tokio::test]
async fn test_unfinished_import_stays_submitted() {
    let f = fixture().await;
    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();

    let checks = f.coordinator.monitor_imports().await.unwrap();
    assert_eq!(checks[0].status, ImportStatus::Submitted);
    let stored = f.repos.batch_repo.find_by_id(&batch.batch_id).unwrap().unwrap();
    assert_eq!(stored.progress, Some(40));
    assert_eq!(stored.workflow_state.as_deref(), Some("importing"));
}

#[tokio::test]
async fn test_partial_import_retains_batch_and_reprioritizes_missing_users() {
    let f = fixture().await;
    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();
    let course_id = f.tc.course_id(0);
    f.lms.set_progress(
        "imp-1",
        "imported_with_messages",
        vec![
            ImportMessage {
                file: ENROLLMENTS_FILE.to_string(),
                message: "User not found for enrollment (User ID: 0001234)".to_string(),
                row_info: Some(format!(
                    r#"[{{course_id: "{}", user_integration_id: "0001234", role: "student"}}]"#,
                    course_id
                )),
            },
            ImportMessage {
                file: ENROLLMENTS_FILE.to_string(),
                message: "Improper role".to_string(),
                row_info: None,
            },
        ],
    );

    let checks = f.coordinator.monitor_imports().await.unwrap();
    assert_eq!(checks[0].status, ImportStatus::Partial);
    assert_eq!(checks[0].reprioritized_enrollments, 1);

    let stored = f.repos.batch_repo.find_by_id(&batch.batch_id).unwrap().unwrap();
    assert_eq!(stored.status, ImportStatus::Partial);
    assert!(stored.errors.is_some());

    let missing = f
        .repos
        .enrollment_repo
        .find_active_by_course_id(&course_id, &StudentId::new("0001234").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(missing.priority, Priority::Default);
    assert!(missing.provisioned_date.is_none());

    let other = f
        .repos
        .enrollment_repo
        .find_active_by_course_id(&course_id, &StudentId::new("7654321").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(other.priority, Priority::None);

    let course = f.repos.course_repo.find_by_course_id(&course_id).unwrap().unwrap();
    assert_eq!(course.priority, Priority::Default);
}

#[tokio::test]
async fn test_failed_import_releases_members() {
    let f = fixture().await;
    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();
    f.lms.set_progress("imp-1", "failed_with_messages", Vec::new());

    let checks = f.coordinator.monitor_imports().await.unwrap();
    assert_eq!(checks[0].status, ImportStatus::Failed);

    let stored = f.repos.batch_repo.find_by_id(&batch.batch_id).unwrap().unwrap();
    assert_eq!(stored.status, ImportStatus::Failed);
    for record in f.repos.enrollment_repo.list_all().unwrap() {
        assert_eq!(record.priority, Priority::Default);
        assert!(record.queue_id.is_none());
    }
}

#[tokio::test]
async fn test_submit_failure_is_recorded_not_raised() {
    let f = fixture().await;
    f.lms.fail_next_submit(LmsError::Unavailable("connection refused".to_string()));

    let failed = f.coordinator.export_batch(Priority::Default).await.unwrap();
    assert_eq!(failed.status, ImportStatus::Failed);
    assert!(failed.error_message.unwrap().contains("connection refused"));

    // 成员已释放，下一轮可重新排队
    let retry = f.coordinator.export_batch(Priority::Default).await.unwrap();
    assert_eq!(retry.status, ImportStatus::Submitted);
    assert_ne!(retry.batch_id, failed.batch_id);
}

#[tokio::test]
async fn test_config_failure_leaves_queue_untouched() {
    let f = fixture().await;
    let mut broken = StaticConfig::new();
    broken.broken_root_account = true;
    let coordinator = ExportCoordinator::new(f.repos.clone(), f.lms.clone(), Arc::new(broken));

    let err = coordinator.export_batch(Priority::Default).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Config(_)));
    assert!(f.repos.batch_repo.list_all().unwrap().is_empty());
    for record in f.repos.enrollment_repo.list_all().unwrap() {
        assert!(record.queue_id.is_none());
        assert_eq!(record.priority, Priority::Default);
    }

    // 配置恢复后同一批实体仍可导出
    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();
    assert_eq!(batch.status, ImportStatus::Submitted);
    assert_eq!(f.repos.queue_repo.count_members(&batch.batch_id).unwrap().courses, 1);
}

#[tokio::test]
async fn test_delete_submitted_batch_cancels_remote_import() {
    let f = fixture().await;
    let batch = f.coordinator.export_batch(Priority::Default).await.unwrap();

    assert!(f.coordinator.delete_batch(&batch.batch_id).await.unwrap());
    assert_eq!(f.lms.cancelled.lock().unwrap().as_slice(), ["imp-1".to_string()]);
    assert!(f.repos.batch_repo.find_by_id(&batch.batch_id).unwrap().is_none());
    assert_eq!(f.repos.queue_repo.count_members(&batch.batch_id).unwrap().total(), 0);

    assert!(!f.coordinator.delete_batch("missing").await.unwrap());
}
