// ==========================================
// 培训课程选课供给系统 - 配置管理器
// ==========================================
// 配置保存在 config_kv 表的 global 作用域中，
// 缺失或无法解析的值回落到内置默认值并记录告警
// ==========================================

use crate::config::policy::{PriorEnrollmentPolicy, ProvisionerEnvironment, StartQuarterOverride};
use crate::config::provisioner_config_trait::{ConfigResult, ProvisionerConfigReader};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 运行环境覆写变量（优先于 config_kv）
pub const ENVIRONMENT_VAR: &str = "TRAINING_PROVISIONER_ENV";

/// AY2025-2026 从春季开始供给
const DEFAULT_START_QUARTER_OVERRIDES: &str =
    r#"[{"term_id":"AY2025-2026","start_quarter":"20262"}]"#;

const GLOBAL_SCOPE: &str = "global";

pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 打开数据库文件并确保表结构存在
    ///
    /// # 参数
    /// - db_path: SQLite 文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 复用仓储层的共享连接（PRAGMA 重新应用一次，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        let manager = Self { conn };
        manager.with_conn(|c| crate::db::configure_sqlite_connection(c))?;
        Ok(manager)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> ConfigResult<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| format!("配置连接锁已中毒: {}", e))?;
        Ok(f(&guard)?)
    }

    /// 读取 global 作用域下的原始值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.with_conn(|c| {
            c.query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// 写入 global 作用域（已存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.with_conn(|c| {
            c.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope_id, key)
                 DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![GLOBAL_SCOPE, key, value],
            )
        })?;
        Ok(())
    }

    /// 当前所有显式设置的键值，按键排序；用于记录一次运行生效的配置
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        self.with_conn(|c| {
            let mut stmt =
                c.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1")?;
            let pairs = stmt.query_map([GLOBAL_SCOPE], |row| Ok((row.get(0)?, row.get(1)?)))?;
            pairs.collect()
        })
    }

    fn value_or(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 解析数值配置；无法解析时回落默认值
    fn parsed_or<T: FromStr + Copy>(&self, key: &str, default: T) -> ConfigResult<T> {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        Ok(raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "配置值无法解析，使用默认值");
            default
        }))
    }
}

#[async_trait]
impl ProvisionerConfigReader for ConfigManager {
    async fn get_environment(&self) -> ConfigResult<ProvisionerEnvironment> {
        let from_env = std::env::var(ENVIRONMENT_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty());
        let raw = match from_env {
            Some(v) => v,
            None => self.value_or(config_keys::ENVIRONMENT, "localdev")?,
        };
        Ok(ProvisionerEnvironment::parse(&raw))
    }

    async fn get_start_quarter_overrides(&self) -> ConfigResult<Vec<StartQuarterOverride>> {
        let raw = self.value_or(
            config_keys::START_QUARTER_OVERRIDES,
            DEFAULT_START_QUARTER_OVERRIDES,
        )?;
        match serde_json::from_str(&raw) {
            Ok(overrides) => Ok(overrides),
            Err(e) => {
                tracing::warn!(
                    config_key = config_keys::START_QUARTER_OVERRIDES,
                    raw_value = %raw,
                    error = %e,
                    "起始季度覆写配置格式错误，忽略覆写"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn get_membership_mock_file(&self) -> ConfigResult<Option<String>> {
        let raw = self.get_global_config_value(config_keys::MEMBERSHIP_MOCK_FILE)?;
        Ok(raw.filter(|v| !v.trim().is_empty()))
    }

    async fn get_warehouse_timeout_secs(&self) -> ConfigResult<u64> {
        self.parsed_or(config_keys::WAREHOUSE_TIMEOUT_SECS, 120)
    }

    async fn get_prior_enrollment_policy(&self) -> ConfigResult<PriorEnrollmentPolicy> {
        let raw = self.value_or(config_keys::PRIOR_ENROLLMENT_POLICY, "ACTIVE_ONLY")?;
        Ok(PriorEnrollmentPolicy::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::PRIOR_ENROLLMENT_POLICY,
                raw_value = %raw,
                "历史选课策略无法识别，使用 ACTIVE_ONLY"
            );
            PriorEnrollmentPolicy::ActiveOnly
        }))
    }

    async fn get_lms_timeout_secs(&self) -> ConfigResult<u64> {
        self.parsed_or(config_keys::LMS_TIMEOUT_SECS, 60)
    }

    async fn get_lms_root_account_id(&self) -> ConfigResult<String> {
        self.value_or(config_keys::LMS_ROOT_ACCOUNT_ID, "training")
    }

    async fn get_lms_student_role(&self) -> ConfigResult<String> {
        self.value_or(config_keys::LMS_STUDENT_ROLE, "student")
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 运行环境
    pub const ENVIRONMENT: &str = "provisioner.environment";

    // 成员解析
    pub const START_QUARTER_OVERRIDES: &str = "membership.start_quarter_overrides";
    pub const MEMBERSHIP_MOCK_FILE: &str = "membership.mock_file";
    pub const WAREHOUSE_TIMEOUT_SECS: &str = "warehouse.timeout_secs";

    // 资格筛选
    pub const PRIOR_ENROLLMENT_POLICY: &str = "eligibility.prior_enrollment_policy";

    // LMS
    pub const LMS_TIMEOUT_SECS: &str = "lms.timeout_secs";
    pub const LMS_ROOT_ACCOUNT_ID: &str = "lms.root_account_id";
    pub const LMS_STUDENT_ROLE: &str = "lms.student_role";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let cfg = manager();
        assert_eq!(cfg.get_warehouse_timeout_secs().await.unwrap(), 120);
        assert_eq!(cfg.get_lms_timeout_secs().await.unwrap(), 60);
        assert_eq!(cfg.get_lms_student_role().await.unwrap(), "student");
        assert_eq!(
            cfg.get_prior_enrollment_policy().await.unwrap(),
            PriorEnrollmentPolicy::ActiveOnly
        );
        assert_eq!(cfg.get_membership_mock_file().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_read_back() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::PRIOR_ENROLLMENT_POLICY, "INCLUDE_DROPPED")
            .unwrap();
        cfg.set_global_config_value(config_keys::WAREHOUSE_TIMEOUT_SECS, "5").unwrap();
        assert_eq!(
            cfg.get_prior_enrollment_policy().await.unwrap(),
            PriorEnrollmentPolicy::IncludeDropped
        );
        assert_eq!(cfg.get_warehouse_timeout_secs().await.unwrap(), 5);

        let snapshot = cfg.get_config_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[config_keys::WAREHOUSE_TIMEOUT_SECS], "5");
    }

    #[tokio::test]
    async fn test_malformed_overrides_are_ignored() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::START_QUARTER_OVERRIDES, "not json")
            .unwrap();
        assert!(cfg.get_start_quarter_overrides().await.unwrap().is_empty());
    }
}
