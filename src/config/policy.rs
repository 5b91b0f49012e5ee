// ==========================================
// 培训课程选课供给系统 - 配置值类型
// ==========================================
// 运行环境 / 起始季度覆写 / 历史选课判定策略
// ==========================================

use crate::domain::ids::{AcademicYear, ParseError, QuarterCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerEnvironment {
    Localdev,
    Eval,
    Production,
}

impl ProvisionerEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionerEnvironment::Localdev => "localdev",
            ProvisionerEnvironment::Eval => "eval",
            ProvisionerEnvironment::Production => "production",
        }
    }

    /// 无法识别的值按 localdev 处理
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => ProvisionerEnvironment::Production,
            "eval" => ProvisionerEnvironment::Eval,
            _ => ProvisionerEnvironment::Localdev,
        }
    }
}

impl fmt::Display for ProvisionerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 学年起始季度覆写（仅 production 生效）
///
/// 存储格式: [{"term_id": "AY2025-2026", "start_quarter": "20262"}]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartQuarterOverride {
    pub term_id: String,
    pub start_quarter: String,
}

impl StartQuarterOverride {
    /// 起始季度；必须是 term_id 所在学年内的季度
    pub fn quarter(&self) -> Result<QuarterCode, ParseError> {
        AcademicYear::from_term_id(&self.term_id)?.start_quarter(&self.start_quarter)
    }
}

/// 历史选课判定策略
///
/// - ActiveOnly: 只有未删除的历史选课计入（已退课视为从未选过）
/// - IncludeDropped: 已退课的历史选课同样计入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorEnrollmentPolicy {
    ActiveOnly,
    IncludeDropped,
}

impl PriorEnrollmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorEnrollmentPolicy::ActiveOnly => "ACTIVE_ONLY",
            PriorEnrollmentPolicy::IncludeDropped => "INCLUDE_DROPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE_ONLY" => Some(PriorEnrollmentPolicy::ActiveOnly),
            "INCLUDE_DROPPED" => Some(PriorEnrollmentPolicy::IncludeDropped),
            _ => None,
        }
    }
}

impl Default for PriorEnrollmentPolicy {
    fn default() -> Self {
        PriorEnrollmentPolicy::ActiveOnly
    }
}
