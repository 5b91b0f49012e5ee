// ==========================================
// 引擎单元测试公共夹具
// ==========================================

use crate::config::{
    ConfigResult, PriorEnrollmentPolicy, ProvisionerConfigReader, ProvisionerEnvironment,
    StartQuarterOverride,
};
use crate::domain::course::{CourseInstance, SectionInstance};
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{CourseType, MembershipType, Priority};
use crate::engine::repositories::ProvisioningRepositories;
use crate::lms::{
    ChangeSetBundle, ImportHandle, ImportMessage, ImportProgress, LmsClient, LmsCourseMetadata,
    LmsError,
};
use crate::membership::{QueryKind, Warehouse, WarehouseError, WarehouseRow};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

/// 固定配置（localdev，策略可调）
pub struct StaticConfig {
    pub policy: PriorEnrollmentPolicy,
    /// 为 true 时读取 LMS 根账户失败
    pub broken_root_account: bool,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self {
            policy: PriorEnrollmentPolicy::ActiveOnly,
            broken_root_account: false,
        }
    }
}

#[async_trait]
impl ProvisionerConfigReader for StaticConfig {
    async fn get_environment(&self) -> ConfigResult<ProvisionerEnvironment> {
        Ok(ProvisionerEnvironment::Localdev)
    }
    async fn get_start_quarter_overrides(&self) -> ConfigResult<Vec<StartQuarterOverride>> {
        Ok(Vec::new())
    }
    async fn get_membership_mock_file(&self) -> ConfigResult<Option<String>> {
        Ok(None)
    }
    async fn get_warehouse_timeout_secs(&self) -> ConfigResult<u64> {
        Ok(5)
    }
    async fn get_prior_enrollment_policy(&self) -> ConfigResult<PriorEnrollmentPolicy> {
        Ok(self.policy)
    }
    async fn get_lms_timeout_secs(&self) -> ConfigResult<u64> {
        Ok(5)
    }
    async fn get_lms_root_account_id(&self) -> ConfigResult<String> {
        if self.broken_root_account {
            return Err("config_kv 不可读".into());
        }
        Ok("training".to_string())
    }
    async fn get_lms_student_role(&self) -> ConfigResult<String> {
        Ok("student".to_string())
    }
}

/// 每个季度都返回同一份注册名单，全部处于普查日后
pub struct RosterWarehouse {
    roster: Mutex<Vec<String>>,
}

impl RosterWarehouse {
    pub fn new(students: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            roster: Mutex::new(students.iter().map(|s| s.to_string()).collect()),
        })
    }

    pub fn set_roster(&self, students: &[&str]) {
        *self.roster.lock().unwrap() = students.iter().map(|s| s.to_string()).collect();
    }
}

#[async_trait]
impl Warehouse for RosterWarehouse {
    async fn execute_query(&self, query: &str) -> Result<Vec<WarehouseRow>, WarehouseError> {
        match QueryKind::classify(query) {
            Some(QueryKind::QuarterInfo) => {
                let mut row = WarehouseRow::new();
                row.insert("CensusDayStatus".into(), json!("After Census Day"));
                Ok(vec![row])
            }
            Some(QueryKind::Registration) => Ok(self
                .roster
                .lock()
                .unwrap()
                .iter()
                .map(|s| {
                    let mut row = WarehouseRow::new();
                    row.insert("StudentNumber".into(), json!(s));
                    row
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

/// 插入培训课程定义及其全部课程副本/分班
pub fn seed_training_course(
    repos: &ProvisioningRepositories,
    blueprint: &str,
    term_id: &str,
    course_type: CourseType,
    course_count: u32,
    section_count: u32,
) -> TrainingCourse {
    let mut tc = TrainingCourse::new(
        "Title VI Training",
        blueprint,
        term_id,
        "acct-1",
        MembershipType::TitleVi,
        course_type,
    );
    tc.course_count = course_count;
    tc.section_count = section_count;
    tc.id = repos.training_course_repo.insert(&tc).unwrap();

    for i in 0..course_count {
        let mut course = CourseInstance {
            id: 0,
            training_course_id: tc.id,
            course_id: tc.course_id(i),
            course_ordinal: i + 1,
            created_date: Utc::now(),
            provisioned_date: None,
            provisioned_error: None,
            provisioned_status: None,
            deleted_date: None,
            priority: Priority::None,
            queue_id: None,
        };
        course.id = repos.course_repo.insert(&course).unwrap();
        for j in 0..section_count {
            let section = SectionInstance {
                id: 0,
                course_pk: course.id,
                section_id: course.section_id(j),
                section_ordinal: j + 1,
                created_date: Utc::now(),
                provisioned_date: None,
                deleted_date: None,
                priority: Priority::None,
                queue_id: None,
            };
            repos.section_repo.insert(&section).unwrap();
        }
    }
    tc
}

/// 内存 LMS: 记录提交内容，按导入 ID 返回预设进度
#[derive(Default)]
pub struct FakeLms {
    pub submitted: Mutex<Vec<ChangeSetBundle>>,
    pub cancelled: Mutex<Vec<String>>,
    progress: Mutex<HashMap<String, ImportProgress>>,
    existing_courses: Mutex<HashMap<String, LmsCourseMetadata>>,
    fail_submit: Mutex<Option<LmsError>>,
}

impl FakeLms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_progress(&self, import_id: &str, state: &str, errors: Vec<ImportMessage>) {
        self.progress.lock().unwrap().insert(
            import_id.to_string(),
            ImportProgress {
                progress: 100,
                workflow_state: state.to_string(),
                warnings: Vec::new(),
                errors,
            },
        );
    }

    pub fn add_existing_course(&self, course_id: &str, name: &str, short_name: &str) {
        self.existing_courses.lock().unwrap().insert(
            course_id.to_string(),
            LmsCourseMetadata {
                course_id: course_id.to_string(),
                name: name.to_string(),
                short_name: short_name.to_string(),
                workflow_state: "available".to_string(),
            },
        );
    }

    pub fn fail_next_submit(&self, err: LmsError) {
        *self.fail_submit.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl LmsClient for FakeLms {
    async fn submit_import(
        &self,
        _root_account_id: &str,
        bundle: &ChangeSetBundle,
    ) -> Result<ImportHandle, LmsError> {
        if let Some(err) = self.fail_submit.lock().unwrap().take() {
            return Err(err);
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(bundle.clone());
        Ok(ImportHandle {
            import_id: format!("imp-{}", submitted.len()),
            workflow_state: "created".to_string(),
        })
    }

    async fn poll_import(&self, _root_account_id: &str, import_id: &str) -> Result<ImportProgress, LmsError> {
        Ok(self
            .progress
            .lock()
            .unwrap()
            .get(import_id)
            .cloned()
            .unwrap_or(ImportProgress {
                progress: 40,
                workflow_state: "importing".to_string(),
                warnings: Vec::new(),
                errors: Vec::new(),
            }))
    }

    async fn cancel_import(&self, _root_account_id: &str, import_id: &str) -> Result<(), LmsError> {
        self.cancelled.lock().unwrap().push(import_id.to_string());
        Ok(())
    }

    async fn course_metadata(&self, course_id: &str) -> Result<Option<LmsCourseMetadata>, LmsError> {
        Ok(self.existing_courses.lock().unwrap().get(course_id).cloned())
    }

    async fn role_id(&self, _account_id: &str, role: &str) -> Result<Option<String>, LmsError> {
        Ok((role == "student").then(|| "15".to_string()))
    }
}
