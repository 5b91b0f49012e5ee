// ==========================================
// 导出流程集成测试
// ==========================================
// 覆盖: CSV 导入定义 → 批量加载 → 排队导出 → 轮询收尾
// ==========================================

mod helpers;

use helpers::fake_lms::FakeLms;
use helpers::fake_warehouse::FakeWarehouse;
use helpers::mock_config::MockConfig;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use training_provisioner::domain::types::ImportStatus;
use training_provisioner::lms::{ImportMessage, LmsClient, ENROLLMENTS_FILE};
use training_provisioner::{ApiError, ProvisioningApi};

const COURSES_CSV: &str = "\
course_name,blueprint_course_id,term_id,account_id,membership_type,course_type,course_count,section_count
Title VI Training,BP1,AY2025-2026,acct-1,title_vi,initial,1,0
";

struct Fixture {
    _db: NamedTempFile,
    _dir: TempDir,
    lms: Arc<FakeLms>,
    api: ProvisioningApi<MockConfig>,
}

/// 导入一个定义并完成首次加载（两名学生）
async fn loaded_fixture() -> Fixture {
    let (db, _conn, repos) = test_helpers::setup_repos();
    let warehouse = FakeWarehouse::new();
    warehouse.set_registered("20254", &["0001234", "7654321"]);
    let lms = FakeLms::new();
    let api = ProvisioningApi::new(repos, warehouse, Some(lms.clone() as Arc<dyn LmsClient>), Arc::new(MockConfig::default()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("courses.csv");
    std::fs::write(&path, COURSES_CSV).unwrap();
    let summary = api.import_courses(&path).unwrap();
    assert_eq!(summary.inserted, 1);
    assert!(!summary.has_rejections());

    let outcomes = api.load_active_courses().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_ok());
    assert_eq!(outcomes[0].report.as_ref().unwrap().created_count(), 2);

    Fixture {
        _db: db,
        _dir: dir,
        lms,
        api,
    }
}

fn user_not_found(course_id: &str, student: &str) -> ImportMessage {
    ImportMessage {
        file: ENROLLMENTS_FILE.to_string(),
        message: format!("User not found for enrollment ({})", student),
        row_info: Some(format!(
            r#"[{{course_id: "{}", user_integration_id: "{}", role: "student", section_id: nil}}]"#,
            course_id, student
        )),
    }
}

#[tokio::test]
async fn test_partial_import_requeues_rejected_enrollment() {
    let f = loaded_fixture().await;

    let batch = f.api.export_batch("default").await.unwrap();
    assert_eq!(batch.status, ImportStatus::Submitted);
    assert_eq!(batch.remote_import_id.as_deref(), Some("imp-1"));
    let first = f.lms.submitted()[0].file(ENROLLMENTS_FILE).unwrap().to_string();
    assert!(first.contains("0001234"));
    assert!(first.contains("7654321"));

    // 远端尚未完成: 批次保持 SUBMITTED
    let checks = f.api.monitor_imports().await.unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].status, ImportStatus::Submitted);

    let course_id = f.api.enrollments_for_student("7654321").unwrap()[0].course_id.clone();
    f.lms.finish_import(
        "imp-1",
        "imported_with_messages",
        vec![user_not_found(&course_id, "7654321")],
    );
    let checks = f.api.monitor_imports().await.unwrap();
    assert_eq!(checks[0].status, ImportStatus::Partial);
    assert_eq!(checks[0].reprioritized_enrollments, 1);

    let retained = f.api.list_batches().unwrap();
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].status, ImportStatus::Partial);

    // 只有被拒绝的选课重新导出
    let batch = f.api.export_batch("default").await.unwrap();
    assert_eq!(batch.remote_import_id.as_deref(), Some("imp-2"));
    let second = f.lms.submitted()[1].file(ENROLLMENTS_FILE).unwrap().to_string();
    assert!(second.contains("7654321"));
    assert!(!second.contains("0001234"));

    f.lms.finish_import("imp-2", "imported", Vec::new());
    let checks = f.api.monitor_imports().await.unwrap();
    assert_eq!(checks[0].status, ImportStatus::Clean);

    // CLEAN 批次删除，PARTIAL 批次保留
    let remaining = f.api.list_batches().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, ImportStatus::Partial);

    let err = f.api.export_batch("default").await.unwrap_err();
    assert!(matches!(err, ApiError::EmptyQueue(_)));
}

#[tokio::test]
async fn test_lms_outage_fails_batch_and_releases_members() {
    let f = loaded_fixture().await;

    f.lms.set_unavailable(true);
    let failed = f.api.export_batch("default").await.unwrap();
    assert_eq!(failed.status, ImportStatus::Failed);
    assert!(f.lms.submitted().is_empty());

    f.lms.set_unavailable(false);
    let batch = f.api.export_batch("default").await.unwrap();
    assert_eq!(batch.status, ImportStatus::Submitted);
    assert_ne!(batch.batch_id, failed.batch_id);
    let enrollments = f.lms.submitted()[0].file(ENROLLMENTS_FILE).unwrap().to_string();
    assert!(enrollments.contains("0001234"));
    assert!(enrollments.contains("7654321"));

    let statuses: Vec<_> = f.api.list_batches().unwrap().iter().map(|b| b.status).collect();
    assert!(statuses.contains(&ImportStatus::Failed));
    assert!(statuses.contains(&ImportStatus::Submitted));
}

#[tokio::test]
async fn test_delete_submitted_batch_cancels_remote_import() {
    let f = loaded_fixture().await;
    let batch = f.api.export_batch("default").await.unwrap();

    f.api.delete_batch(&batch.batch_id).await.unwrap();
    assert_eq!(f.lms.cancelled(), vec!["imp-1".to_string()]);
    assert!(f.api.list_batches().unwrap().is_empty());

    // 成员已释放，可再次排队
    let (_, counts) = f.api.queue_by_priority("default").unwrap();
    assert_eq!(counts.courses, 1);
    assert_eq!(counts.enrollments, 2);

    let err = f.api.delete_batch("no-such-batch").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_export_requires_lms_client() {
    let (_db, _conn, repos) = test_helpers::setup_repos();
    let api = ProvisioningApi::new(repos, FakeWarehouse::new(), None, Arc::new(MockConfig::default()));

    assert!(!api.has_lms());
    assert!(matches!(api.export_batch("default").await, Err(ApiError::LmsNotConfigured)));
    assert!(matches!(api.monitor_imports().await, Err(ApiError::LmsNotConfigured)));
    assert!(matches!(api.export_batch("none").await, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_student_queries_and_history() {
    let f = loaded_fixture().await;

    let details = f.api.enrollments_for_student("0001234").unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].term_id, "AY2025-2026");
    assert_eq!(details[0].course_name, "Title VI Training");

    let history = f.api.history_for_student("0001234").unwrap();
    assert_eq!(history.len(), 1);

    let audit = f.api.audit_enrollment_history(None).unwrap();
    assert!(audit.is_clean());

    assert!(matches!(f.api.enrollments_for_student("  "), Err(ApiError::InvalidInput(_))));
}
