// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use training_provisioner::config::{
    ConfigResult, PriorEnrollmentPolicy, ProvisionerConfigReader, ProvisionerEnvironment,
    StartQuarterOverride,
};

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub environment: ProvisionerEnvironment,
    pub start_quarter_overrides: Vec<StartQuarterOverride>,
    pub membership_mock_file: Option<String>,
    pub warehouse_timeout_secs: u64,
    pub prior_enrollment_policy: PriorEnrollmentPolicy,
    pub lms_timeout_secs: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            environment: ProvisionerEnvironment::Localdev,
            start_quarter_overrides: Vec::new(),
            membership_mock_file: None,
            warehouse_timeout_secs: 5,
            prior_enrollment_policy: PriorEnrollmentPolicy::ActiveOnly,
            lms_timeout_secs: 5,
        }
    }
}

impl MockConfig {
    pub fn with_policy(policy: PriorEnrollmentPolicy) -> Self {
        Self {
            prior_enrollment_policy: policy,
            ..Self::default()
        }
    }

    pub fn with_mock_file(path: &str) -> Self {
        Self {
            membership_mock_file: Some(path.to_string()),
            ..Self::default()
        }
    }

    /// production 环境 + 起始季度覆写
    pub fn production_with_override(term_id: &str, start_quarter: &str) -> Self {
        Self {
            environment: ProvisionerEnvironment::Production,
            start_quarter_overrides: vec![StartQuarterOverride {
                term_id: term_id.to_string(),
                start_quarter: start_quarter.to_string(),
            }],
            ..Self::default()
        }
    }
}

#[async_trait]
impl ProvisionerConfigReader for MockConfig {
    async fn get_environment(&self) -> ConfigResult<ProvisionerEnvironment> {
        Ok(self.environment)
    }

    async fn get_start_quarter_overrides(&self) -> ConfigResult<Vec<StartQuarterOverride>> {
        Ok(self.start_quarter_overrides.clone())
    }

    async fn get_membership_mock_file(&self) -> ConfigResult<Option<String>> {
        Ok(self.membership_mock_file.clone())
    }

    async fn get_warehouse_timeout_secs(&self) -> ConfigResult<u64> {
        Ok(self.warehouse_timeout_secs)
    }

    async fn get_prior_enrollment_policy(&self) -> ConfigResult<PriorEnrollmentPolicy> {
        Ok(self.prior_enrollment_policy)
    }

    async fn get_lms_timeout_secs(&self) -> ConfigResult<u64> {
        Ok(self.lms_timeout_secs)
    }

    async fn get_lms_root_account_id(&self) -> ConfigResult<String> {
        Ok("training".to_string())
    }

    async fn get_lms_student_role(&self) -> ConfigResult<String> {
        Ok("student".to_string())
    }
}
