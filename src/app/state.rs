// ==========================================
// 培训课程选课供给系统 - 应用状态
// ==========================================
// 职责: 打开共享数据库连接，装配仓储/配置/API
// 数据仓库与 LMS 客户端由宿主注入
// ==========================================

use std::sync::Arc;

use rusqlite::Connection;
use std::sync::Mutex;

use crate::api::{ConfigApi, ProvisioningApi};
use crate::config::ConfigManager;
use crate::engine::repositories::ProvisioningRepositories;
use crate::lms::LmsClient;
use crate::membership::Warehouse;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "TRAINING_PROVISIONER_DB_PATH";

/// 本地预置数据仓库文件环境变量
pub const WAREHOUSE_FILE_ENV: &str = "TRAINING_PROVISIONER_WAREHOUSE_FILE";

pub struct AppState {
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub config_manager: Arc<ConfigManager>,
    pub provisioning_api: ProvisioningApi<ConfigManager>,
    pub config_api: ConfigApi,
}

impl AppState {
    /// 创建应用状态
    ///
    /// # 参数
    /// - db_path: SQLite 文件路径（不存在时创建并建表）
    /// - warehouse: 数据仓库端口
    /// - lms: LMS 客户端（可选）
    pub fn new(
        db_path: String,
        warehouse: Arc<dyn Warehouse>,
        lms: Option<Arc<dyn LmsClient>>,
    ) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = crate::db::open_shared_database(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let repos = ProvisioningRepositories::from_connection(conn.clone());
        let provisioning_api = ProvisioningApi::new(repos, warehouse, lms, config_manager.clone());
        let config_api = ConfigApi::new(config_manager.clone());

        tracing::info!(lms_configured = provisioning_api.has_lms(), "AppState初始化完成");
        Ok(Self {
            db_path,
            conn,
            config_manager,
            provisioning_api,
            config_api,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./training_provisioner.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("training-provisioner-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("training-provisioner");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(error = %e, "无法创建数据目录，使用当前目录");
            return "./training_provisioner.db".to_string();
        }
        path = path.join("training_provisioner.db");
    }

    path.to_string_lossy().to_string()
}
