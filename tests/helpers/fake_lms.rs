// ==========================================
// 内存 LMS Fake
// ==========================================
// 提交的变更集按顺序记录，导入 ID 为 imp-<序号>
// 未预置进度的导入返回 importing
// ==========================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use training_provisioner::lms::{
    ChangeSetBundle, ImportHandle, ImportMessage, ImportProgress, LmsClient, LmsCourseMetadata,
    LmsError,
};

#[derive(Default)]
pub struct FakeLms {
    submitted: Mutex<Vec<ChangeSetBundle>>,
    cancelled: Mutex<Vec<String>>,
    progress: Mutex<HashMap<String, ImportProgress>>,
    unavailable: Mutex<bool>,
}

impl FakeLms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submitted(&self) -> Vec<ChangeSetBundle> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn finish_import(&self, import_id: &str, state: &str, errors: Vec<ImportMessage>) {
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

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check_available(&self) -> Result<(), LmsError> {
        if *self.unavailable.lock().unwrap() {
            return Err(LmsError::Unavailable("503 Service Unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LmsClient for FakeLms {
    async fn submit_import(
        &self,
        _root_account_id: &str,
        bundle: &ChangeSetBundle,
    ) -> Result<ImportHandle, LmsError> {
        self.check_available()?;
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(bundle.clone());
        Ok(ImportHandle {
            import_id: format!("imp-{}", submitted.len()),
            workflow_state: "created".to_string(),
        })
    }

    async fn poll_import(&self, _root_account_id: &str, import_id: &str) -> Result<ImportProgress, LmsError> {
        self.check_available()?;
        Ok(self
            .progress
            .lock()
            .unwrap()
            .get(import_id)
            .cloned()
            .unwrap_or(ImportProgress {
                progress: 10,
                workflow_state: "importing".to_string(),
                warnings: Vec::new(),
                errors: Vec::new(),
            }))
    }

    async fn cancel_import(&self, _root_account_id: &str, import_id: &str) -> Result<(), LmsError> {
        self.cancelled.lock().unwrap().push(import_id.to_string());
        Ok(())
    }

    async fn course_metadata(&self, _course_id: &str) -> Result<Option<LmsCourseMetadata>, LmsError> {
        self.check_available()?;
        Ok(None)
    }

    async fn role_id(&self, _account_id: &str, role: &str) -> Result<Option<String>, LmsError> {
        Ok((role == "student").then(|| "15".to_string()))
    }
}
