// ==========================================
// 培训课程选课供给系统 - 引擎层
// ==========================================
// 职责: 资格筛选、确定性分配、选课对账、优先级传播、导出协调
// 红线: Engine 不拼 SQL，数据访问全部经由 Repository
// ==========================================

pub mod assignment;
pub mod eligibility;
pub mod error;
pub mod export;
pub mod history_audit;
pub mod orchestrator;
pub mod propagation;
pub mod reconciliation;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_support;

// 重导出核心引擎
pub use assignment::{course_index, section_index};
pub use eligibility::{EligibilityDecision, EligibilityFilter, FilterStats};
pub use error::{ProvisionError, ProvisionResult};
pub use export::{ExportCoordinator, ImportCheck};
pub use history_audit::{AuditFinding, BackfillReport, HistoryAuditReport, HistoryAuditor};
pub use orchestrator::{CourseLoadOutcome, ProvisionSummary, ProvisioningOrchestrator};
pub use propagation::PriorityPropagation;
pub use reconciliation::{CourseMismatch, ReconciliationEngine, ReconciliationReport};
pub use repositories::ProvisioningRepositories;
