// ==========================================
// 培训课程选课供给系统 - 成员解析层
// ==========================================
// 职责: 从外部数据仓库解析候选成员
// 输出: {学号: 资格标签集合}
// ==========================================

pub mod calendar;
pub mod error;
pub mod mock;
pub mod queries;
pub mod resolver;
pub mod warehouse;

pub use calendar::{CensusDayStatus, QuarterInfo};
pub use error::MembershipError;
pub use mock::{load_test_membership, FileWarehouse};
pub use queries::QueryKind;
pub use resolver::{CandidateMap, MembershipResolver, MembershipSource};
pub use warehouse::{Warehouse, WarehouseError, WarehouseRow};
