// ==========================================
// 配置与成员数据源集成测试
// ==========================================
// 覆盖: ConfigManager 默认值与覆写、测试名单文件、本地预置仓库文件
// ==========================================

mod helpers;

use helpers::builders::TrainingCourseBuilder;
use helpers::fake_warehouse::FakeWarehouse;
use helpers::mock_config::MockConfig;
use std::sync::Arc;
use training_provisioner::config::{
    config_keys, ConfigManager, PriorEnrollmentPolicy, ProvisionerConfigReader, ProvisionerEnvironment,
};
use training_provisioner::domain::types::MembershipType;
use training_provisioner::engine::{ProvisionError, ProvisioningOrchestrator};
use training_provisioner::membership::FileWarehouse;
use training_provisioner::{ConfigApi, QuarterCode, StudentId};

#[tokio::test]
async fn test_config_manager_defaults() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();

    let overrides = manager.get_start_quarter_overrides().await.unwrap();
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].term_id, "AY2025-2026");
    assert_eq!(overrides[0].start_quarter, "20262");

    assert_eq!(manager.get_membership_mock_file().await.unwrap(), None);
    assert_eq!(manager.get_warehouse_timeout_secs().await.unwrap(), 120);
    assert_eq!(manager.get_lms_timeout_secs().await.unwrap(), 60);
    assert_eq!(
        manager.get_prior_enrollment_policy().await.unwrap(),
        PriorEnrollmentPolicy::ActiveOnly
    );
    assert_eq!(manager.get_lms_root_account_id().await.unwrap(), "training");
    assert_eq!(manager.get_lms_student_role().await.unwrap(), "student");
}

#[tokio::test]
async fn test_start_quarter_override_follows_environment() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();

    manager
        .set_global_config_value(config_keys::ENVIRONMENT, "localdev")
        .unwrap();
    if manager.get_environment().await.unwrap() == ProvisionerEnvironment::Localdev {
        assert_eq!(manager.get_start_quarter_for("AY2025-2026").await.unwrap(), None);
    }

    manager
        .set_global_config_value(config_keys::ENVIRONMENT, "production")
        .unwrap();
    if manager.get_environment().await.unwrap() == ProvisionerEnvironment::Production {
        assert_eq!(
            manager.get_start_quarter_for("AY2025-2026").await.unwrap(),
            Some(QuarterCode::parse("20262").unwrap())
        );
        // 只按学年编码精确匹配
        assert_eq!(manager.get_start_quarter_for("AY2025-2026-LAW").await.unwrap(), None);
        assert_eq!(manager.get_start_quarter_for("AY2024-2025").await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_malformed_values_fall_back_to_defaults() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();

    manager
        .set_global_config_value(config_keys::START_QUARTER_OVERRIDES, "not json")
        .unwrap();
    manager
        .set_global_config_value(config_keys::WAREHOUSE_TIMEOUT_SECS, "soon")
        .unwrap();
    manager
        .set_global_config_value(config_keys::PRIOR_ENROLLMENT_POLICY, "sometimes")
        .unwrap();

    assert!(manager.get_start_quarter_overrides().await.unwrap().is_empty());
    assert_eq!(manager.get_warehouse_timeout_secs().await.unwrap(), 120);
    assert_eq!(
        manager.get_prior_enrollment_policy().await.unwrap(),
        PriorEnrollmentPolicy::ActiveOnly
    );
}

#[tokio::test]
async fn test_config_api_round_trip_through_shared_connection() {
    let (_db, db_path) = test_helpers::create_test_db().unwrap();
    let conn = test_helpers::open_test_connection(&db_path).unwrap();
    let manager = Arc::new(ConfigManager::from_connection(conn).unwrap());
    let api = ConfigApi::new(manager.clone());

    api.update_config(config_keys::PRIOR_ENROLLMENT_POLICY, "INCLUDE_DROPPED")
        .unwrap();
    assert_eq!(
        manager.get_prior_enrollment_policy().await.unwrap(),
        PriorEnrollmentPolicy::IncludeDropped
    );
    assert!(api.update_config(config_keys::LMS_TIMEOUT_SECS, "-1").is_err());
    assert_eq!(manager.get_lms_timeout_secs().await.unwrap(), 60);
}

#[tokio::test]
async fn test_test_membership_file_drives_enrollments() {
    let dir = tempfile::tempdir().unwrap();
    let roster = dir.path().join("roster.json");
    std::fs::write(&roster, r#"{"0012345": ["20261R"], "0054321": ["20254A", "bogus"]}"#).unwrap();

    let (_db, _conn, repos) = test_helpers::setup_repos();
    let warehouse = FakeWarehouse::new();
    let orchestrator = ProvisioningOrchestrator::new(
        repos.clone(),
        warehouse.clone(),
        Arc::new(MockConfig::with_mock_file(roster.to_str().unwrap())),
    );
    let mut tc = TrainingCourseBuilder::new("BP-TEST", "AY2025-2026")
        .membership_type(MembershipType::Test)
        .course_count(2)
        .build();
    tc.id = repos.training_course_repo.insert(&tc).unwrap();

    let (_, report) = orchestrator.provision_and_reconcile(&tc).await.unwrap();
    assert_eq!(report.created_count(), 2);
    assert_eq!(warehouse.query_count(), 0);

    let second = report
        .created
        .iter()
        .find(|r| r.student_id == StudentId::new("0054321").unwrap())
        .unwrap();
    let tags: Vec<String> = second.eligible_terms.iter().map(|t| t.to_string()).collect();
    assert_eq!(tags, vec!["20254A"]);
}

#[tokio::test]
async fn test_test_membership_list_uses_default_terms() {
    let dir = tempfile::tempdir().unwrap();
    let roster = dir.path().join("roster.json");
    std::fs::write(&roster, r#"["0012345", 54321]"#).unwrap();

    let (_db, _conn, repos) = test_helpers::setup_repos();
    let orchestrator = ProvisioningOrchestrator::new(
        repos.clone(),
        FakeWarehouse::new(),
        Arc::new(MockConfig::with_mock_file(roster.to_str().unwrap())),
    );
    let mut tc = TrainingCourseBuilder::new("BP-TEST", "AY2025-2026")
        .membership_type(MembershipType::Test)
        .build();
    tc.id = repos.training_course_repo.insert(&tc).unwrap();

    let (_, report) = orchestrator.provision_and_reconcile(&tc).await.unwrap();
    assert_eq!(report.created_count(), 2);
    for record in &report.created {
        let tags: Vec<String> = record.eligible_terms.iter().map(|t| t.to_string()).collect();
        assert_eq!(tags, vec!["20254R", "20261R"]);
    }
    assert!(report
        .created
        .iter()
        .any(|r| r.student_id.as_str() == "0054321"));
}

#[tokio::test]
async fn test_missing_membership_file_is_data_access_error() {
    let (_db, _conn, repos) = test_helpers::setup_repos();
    let orchestrator = ProvisioningOrchestrator::new(
        repos.clone(),
        FakeWarehouse::new(),
        Arc::new(MockConfig::with_mock_file("/nonexistent/roster.json")),
    );
    let mut tc = TrainingCourseBuilder::new("BP-TEST", "AY2025-2026")
        .membership_type(MembershipType::Test)
        .build();
    tc.id = repos.training_course_repo.insert(&tc).unwrap();

    let err = orchestrator.provision_and_reconcile(&tc).await.unwrap_err();
    assert!(matches!(err, ProvisionError::DataAccess(_)));
    assert!(repos.enrollment_repo.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_file_warehouse_serves_local_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warehouse.json");
    std::fs::write(
        &path,
        r#"{
            "quarter_info": [{"CensusDayStatus": "After Census Day"}],
            "registration": [{"StudentNumber": "0001234"}, {"StudentNumber": 7654321}]
        }"#,
    )
    .unwrap();

    let (_db, _conn, repos) = test_helpers::setup_repos();
    let orchestrator = ProvisioningOrchestrator::new(
        repos.clone(),
        Arc::new(FileWarehouse::new(&path)),
        Arc::new(MockConfig::default()),
    );
    let mut tc = TrainingCourseBuilder::new("BP-T6", "AY2025-2026").section_count(2).build();
    tc.id = repos.training_course_repo.insert(&tc).unwrap();

    let (summary, report) = orchestrator.provision_and_reconcile(&tc).await.unwrap();
    assert_eq!(summary.courses_created, 1);
    assert_eq!(summary.sections_created, 2);
    assert_eq!(report.created_count(), 2);
    // 每个季度都返回同一名单，四个季度的标签合并到一条记录
    for record in &report.created {
        assert_eq!(record.eligible_terms.len(), 4);
        assert!(record.section_pk.is_some());
    }
}
