// ==========================================
// 培训课程选课供给系统 - 选课对账引擎
// ==========================================
// 职责: 筛选后的候选名单 ↔ 已持久化选课记录 做差异对账
// 输入: 培训课程定义
// 输出: 新建 / 恢复 / 退课 的选课记录 + 统计
// 红线: 候选为空且存在有效选课时拒绝执行（防止批量误退课）
// 红线: 课程副本不一致时跳过并记录，从不自动纠正
// ==========================================

mod core;
mod report;


pub use self::core::ReconciliationEngine;
pub use self::report::{CourseMismatch, ReconciliationReport};
