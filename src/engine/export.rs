// ==========================================
// 培训课程选课供给系统 - 导出/导入协调器
// ==========================================
// 职责: 排队批次 → 变更集 → 提交 LMS → 轮询 → 出队与批次保留
// 状态机: PENDING → SUBMITTED → {CLEAN | PARTIAL | FAILED}
// CLEAN: 删除批次记录
// PARTIAL: 保留批次与错误载荷，不自动重试；"User not found" 选课重新待导出
// FAILED: 记录失败原因，成员释放回队列
// 红线: 远端错误记录到批次，不抛给调度方
// ==========================================

mod core;
mod row_info;

#[cfg(test)]
mod tests;

pub use self::core::{ExportCoordinator, ImportCheck};
pub use self::row_info::{parse_row_info, RowInfo};
