// ==========================================
// 培训课程选课供给系统 - 选课记录仓储
// ==========================================
// 红线: 记录变更与历史事件在同一事务内写入
// 红线: Repository 不含业务逻辑（谓词计算在引擎层）
// ==========================================

mod core;
mod queries;


pub use self::core::EnrollmentRepository;
pub(crate) use self::core::{map_enrollment_row, ENROLLMENT_COLUMNS};
