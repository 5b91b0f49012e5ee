// ==========================================
// 培训课程选课供给系统 - 配置读取 Trait
// ==========================================
// 职责: 定义解析器/引擎/导出所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::policy::{PriorEnrollmentPolicy, ProvisionerEnvironment, StartQuarterOverride};
use crate::domain::ids::QuarterCode;
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ProvisionerConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）；测试中为 MockConfig
#[async_trait]
pub trait ProvisionerConfigReader: Send + Sync {
    // ===== 运行环境 =====

    /// 获取运行环境
    ///
    /// # 默认值
    /// - localdev（环境变量 TRAINING_PROVISIONER_ENV 优先）
    async fn get_environment(&self) -> ConfigResult<ProvisionerEnvironment>;

    // ===== 成员解析 =====

    /// 学年起始季度覆写列表
    ///
    /// # 默认值
    /// - [{"term_id": "AY2025-2026", "start_quarter": "20262"}]
    async fn get_start_quarter_overrides(&self) -> ConfigResult<Vec<StartQuarterOverride>>;

    /// 测试名单文件路径（MembershipType::Test 使用）
    async fn get_membership_mock_file(&self) -> ConfigResult<Option<String>>;

    /// 数据仓库查询超时（秒）
    ///
    /// # 默认值
    /// - 120
    async fn get_warehouse_timeout_secs(&self) -> ConfigResult<u64>;

    // ===== 资格筛选 =====

    /// 历史选课判定策略
    ///
    /// # 默认值
    /// - ACTIVE_ONLY
    async fn get_prior_enrollment_policy(&self) -> ConfigResult<PriorEnrollmentPolicy>;

    // ===== LMS =====

    /// LMS 调用超时（秒）
    ///
    /// # 默认值
    /// - 60
    async fn get_lms_timeout_secs(&self) -> ConfigResult<u64>;

    /// LMS 根账户 ID
    ///
    /// # 默认值
    /// - training
    async fn get_lms_root_account_id(&self) -> ConfigResult<String>;

    /// 学生角色名
    ///
    /// # 默认值
    /// - student
    async fn get_lms_student_role(&self) -> ConfigResult<String>;

    // ===== 组合读取 =====

    /// 指定学年编码的起始季度
    ///
    /// # 逻辑
    /// 1. 非 production 环境: None
    /// 2. production: 查找 term_id 完全匹配的覆写
    /// 3. 覆写季度无法解析或不在该学年内: Err
    async fn get_start_quarter_for(&self, term_id: &str) -> ConfigResult<Option<QuarterCode>> {
        match self.get_start_quarter_override(term_id).await? {
            Some(o) => Ok(Some(o.quarter()?)),
            None => Ok(None),
        }
    }

    /// 指定学年编码生效的覆写原文（未校验季度）
    async fn get_start_quarter_override(
        &self,
        term_id: &str,
    ) -> ConfigResult<Option<StartQuarterOverride>> {
        if self.get_environment().await? != ProvisionerEnvironment::Production {
            return Ok(None);
        }
        let overrides = self.get_start_quarter_overrides().await?;
        Ok(overrides.into_iter().find(|o| o.term_id == term_id))
    }
}
