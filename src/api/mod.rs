// ==========================================
// 培训课程选课供给系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供任务驱动与运维命令调用
// ==========================================

pub mod config_api;
pub mod error;
pub mod provisioning_api;

// 重导出核心类型
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use provisioning_api::ProvisioningApi;
