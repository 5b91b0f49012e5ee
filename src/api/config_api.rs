// ==========================================
// 培训课程选课供给系统 - 配置管理 API
// ==========================================
// 职责: 配置查询、更新（仅限已知键，写入前校验）、快照导出
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::config::policy::{PriorEnrollmentPolicy, StartQuarterOverride};

/// 单个配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: Option<String>,
}

/// 可通过 API 修改的配置键
pub const KNOWN_KEYS: [&str; 8] = [
    config_keys::ENVIRONMENT,
    config_keys::START_QUARTER_OVERRIDES,
    config_keys::MEMBERSHIP_MOCK_FILE,
    config_keys::WAREHOUSE_TIMEOUT_SECS,
    config_keys::PRIOR_ENROLLMENT_POLICY,
    config_keys::LMS_TIMEOUT_SECS,
    config_keys::LMS_ROOT_ACCOUNT_ID,
    config_keys::LMS_STUDENT_ROLE,
];

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询全部已知配置（未设置的值为 None）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        KNOWN_KEYS
            .iter()
            .map(|key| {
                Ok(ConfigItem {
                    key: key.to_string(),
                    value: self.get_config(key)?,
                })
            })
            .collect()
    }

    pub fn get_config(&self, key: &str) -> ApiResult<Option<String>> {
        self.config_manager
            .get_global_config_value(key)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 更新单个配置
    ///
    /// # 返回
    /// - Err(InvalidInput): 未知键或值格式错误
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        validate_config_value(key, value)?;
        self.config_manager
            .set_global_config_value(key, value)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        info!(key, value, "配置已更新");
        Ok(())
    }

    /// 配置快照（按键排序）
    pub fn get_config_snapshot(&self) -> ApiResult<BTreeMap<String, String>> {
        self.config_manager
            .get_config_snapshot()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }
}

fn validate_config_value(key: &str, value: &str) -> ApiResult<()> {
    let invalid = |reason: &str| Err(ApiError::InvalidInput(format!("{}: {}", key, reason)));
    match key {
        config_keys::ENVIRONMENT => {
            if !matches!(
                value.trim().to_lowercase().as_str(),
                "localdev" | "eval" | "production" | "prod"
            ) {
                return invalid("取值应为 localdev / eval / production");
            }
        }
        config_keys::START_QUARTER_OVERRIDES => {
            let overrides: Vec<StartQuarterOverride> = serde_json::from_str(value)
                .map_err(|e| ApiError::InvalidInput(format!("{}: {}", key, e)))?;
            if let Some(e) = overrides.iter().find_map(|o| o.quarter().err()) {
                return invalid(format!("start_quarter 无效: {}", e).as_str());
            }
        }
        config_keys::PRIOR_ENROLLMENT_POLICY => {
            if PriorEnrollmentPolicy::parse(value).is_none() {
                return invalid("取值应为 ACTIVE_ONLY / INCLUDE_DROPPED");
            }
        }
        config_keys::WAREHOUSE_TIMEOUT_SECS | config_keys::LMS_TIMEOUT_SECS => {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => {}
                _ => return invalid("应为正整数秒"),
            }
        }
        config_keys::MEMBERSHIP_MOCK_FILE
        | config_keys::LMS_ROOT_ACCOUNT_ID
        | config_keys::LMS_STUDENT_ROLE => {
            if value.trim().is_empty() {
                return invalid("不能为空");
            }
        }
        _ => return invalid("未知配置键"),
    }
    Ok(())
}
