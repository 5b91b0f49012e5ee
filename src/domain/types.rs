// ==========================================
// 培训课程选课供给系统 - 领域类型定义
// ==========================================
// 优先级 / 课程类型 / 成员来源 / 导入状态 等枚举
// 数据库存储格式与 as_str()/from_str() 保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导出优先级 (Priority Tier)
// ==========================================
// 顺序: None < Default < High < Immediate
// 存储: SMALLINT 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    None,      // 无需导出
    Default,   // 常规导出
    High,      // 高优先级
    Immediate, // 立即导出
}

impl Priority {
    pub fn as_i64(&self) -> i64 {
        match self {
            Priority::None => 0,
            Priority::Default => 1,
            Priority::High => 2,
            Priority::Immediate => 3,
        }
    }

    /// 数据库值转换；越界值按边界截断
    pub fn from_i64(v: i64) -> Self {
        match v {
            i64::MIN..=0 => Priority::None,
            1 => Priority::Default,
            2 => Priority::High,
            _ => Priority::Immediate,
        }
    }

    /// 下降一级（None 保持 None）
    pub fn decrement(&self) -> Self {
        Priority::from_i64(self.as_i64() - 1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Immediate => "immediate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "0" | "none" => Some(Priority::None),
            "1" | "default" => Some(Priority::Default),
            "2" | "high" => Some(Priority::High),
            "3" | "immediate" => Some(Priority::Immediate),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Default
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 课程类型 (Course Type)
// ==========================================
// initial: 首修课程; booster: 复训课程
// 其他值原样保留，筛选时全部放行
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseType {
    Initial,
    Booster,
    Other(String),
}

impl CourseType {
    pub fn as_str(&self) -> &str {
        match self {
            CourseType::Initial => "initial",
            CourseType::Booster => "booster",
            CourseType::Other(s) => s.as_str(),
        }
    }

    /// "101" 为历史存量写法，等同 initial
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "initial" | "101" => CourseType::Initial,
            "booster" => CourseType::Booster,
            other => CourseType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 成员来源类型 (Membership Type)
// ==========================================
// 显式枚举 → 解析器映射，不做按名称的动态调用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipType {
    Test,           // 本地文件名单
    TitleVi,        // 首修候选（注册 + 录取）
    TitleViBooster, // 复训候选（与首修同源，由课程类型筛选区分）
}

impl MembershipType {
    pub fn as_i64(&self) -> i64 {
        match self {
            MembershipType::Test => 0,
            MembershipType::TitleVi => 1,
            MembershipType::TitleViBooster => 2,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(MembershipType::Test),
            1 => Some(MembershipType::TitleVi),
            2 => Some(MembershipType::TitleViBooster),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipType::Test => "test_membership",
            MembershipType::TitleVi => "title_vi_membership_candidates",
            MembershipType::TitleViBooster => "title_vi_booster_membership_candidates",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "0" | "test" | "test_membership" => Some(MembershipType::Test),
            "1" | "title_vi" | "title_vi_membership_candidates" => Some(MembershipType::TitleVi),
            "2" | "title_vi_booster" | "title_vi_booster_membership_candidates" => {
                Some(MembershipType::TitleViBooster)
            }
            _ => None,
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 课程状态 (导出 status 列)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Deleted,
    Completed,
    Published,
}

impl CourseStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            CourseStatus::Active => 0,
            CourseStatus::Deleted => 1,
            CourseStatus::Completed => 2,
            CourseStatus::Published => 3,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => CourseStatus::Deleted,
            2 => CourseStatus::Completed,
            3 => CourseStatus::Published,
            _ => CourseStatus::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Active => "active",
            CourseStatus::Deleted => "deleted",
            CourseStatus::Completed => "completed",
            CourseStatus::Published => "published",
        }
    }
}

// ==========================================
// 选课历史事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventType {
    Created,
    Updated,
    Deleted,
    Reactivated,
}

impl HistoryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventType::Created => "CREATED",
            HistoryEventType::Updated => "UPDATED",
            HistoryEventType::Deleted => "DELETED",
            HistoryEventType::Reactivated => "REACTIVATED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(HistoryEventType::Created),
            "UPDATED" => Some(HistoryEventType::Updated),
            "DELETED" => Some(HistoryEventType::Deleted),
            "REACTIVATED" => Some(HistoryEventType::Reactivated),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryEventType::Created => "Enrollment Created",
            HistoryEventType::Updated => "Enrollment Updated",
            HistoryEventType::Deleted => "Enrollment Deleted",
            HistoryEventType::Reactivated => "Enrollment Reactivated",
        }
    }
}

impl fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 导出批次状态机
// ==========================================
// PENDING → SUBMITTED → {CLEAN | PARTIAL | FAILED}
// CLEAN: 终态，批次记录删除
// PARTIAL: 终态，保留错误载荷
// FAILED: 可重试
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Pending,
    Submitted,
    Clean,
    Partial,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "PENDING",
            ImportStatus::Submitted => "SUBMITTED",
            ImportStatus::Clean => "CLEAN",
            ImportStatus::Partial => "PARTIAL",
            ImportStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PENDING" => ImportStatus::Pending,
            "SUBMITTED" => ImportStatus::Submitted,
            "CLEAN" => ImportStatus::Clean,
            "PARTIAL" => ImportStatus::Partial,
            _ => ImportStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Clean | ImportStatus::Partial)
    }

    /// 状态迁移是否合法
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        use ImportStatus::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Pending, Failed)
                | (Submitted, Clean)
                | (Submitted, Partial)
                | (Submitted, Failed)
                | (Failed, Submitted)
                | (Failed, Failed)
        )
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 成员资格来源
// ==========================================
// R: 注册数据; A: 录取数据（人口普查日前的临时资格）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EligibilitySource {
    Registration,
    Admissions,
}

impl EligibilitySource {
    pub fn suffix(&self) -> char {
        match self {
            EligibilitySource::Registration => 'R',
            EligibilitySource::Admissions => 'A',
        }
    }

    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            'R' => Some(EligibilitySource::Registration),
            'A' => Some(EligibilitySource::Admissions),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::None < Priority::Default);
        assert!(Priority::Default < Priority::High);
        assert!(Priority::High < Priority::Immediate);
    }

    #[test]
    fn test_priority_decrement_saturates() {
        assert_eq!(Priority::Immediate.decrement(), Priority::High);
        assert_eq!(Priority::Default.decrement(), Priority::None);
        assert_eq!(Priority::None.decrement(), Priority::None);
    }

    #[test]
    fn test_course_type_legacy_101() {
        assert_eq!(CourseType::from_str("101"), CourseType::Initial);
        assert_eq!(CourseType::from_str("Booster"), CourseType::Booster);
        assert_eq!(
            CourseType::from_str("refresher"),
            CourseType::Other("refresher".to_string())
        );
    }

    #[test]
    fn test_import_status_transitions() {
        assert!(ImportStatus::Pending.can_transition_to(ImportStatus::Submitted));
        assert!(ImportStatus::Submitted.can_transition_to(ImportStatus::Partial));
        assert!(ImportStatus::Failed.can_transition_to(ImportStatus::Submitted));
        assert!(!ImportStatus::Clean.can_transition_to(ImportStatus::Submitted));
        assert!(!ImportStatus::Partial.can_transition_to(ImportStatus::Failed));
    }

    #[test]
    fn test_membership_type_parse() {
        assert_eq!(MembershipType::parse("title_vi"), Some(MembershipType::TitleVi));
        assert_eq!(
            MembershipType::parse("title_vi_booster_membership_candidates"),
            Some(MembershipType::TitleViBooster)
        );
        assert_eq!(MembershipType::parse("eval(x)"), None);
    }
}
