// ==========================================
// 培训课程选课供给系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod course_repo;
pub mod enrollment_history_repo;
pub mod enrollment_repo;
pub mod error;
pub mod export_batch_repo;
pub mod export_queue_repo;
pub mod section_repo;
pub mod training_course_repo;

// 重导出核心仓储
pub use course_repo::CourseRepository;
pub use enrollment_history_repo::EnrollmentHistoryRepository;
pub use enrollment_repo::EnrollmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use export_batch_repo::ExportBatchRepository;
pub use export_queue_repo::{
    ExportQueueRepository, QueueCounts, QueuedCourseRow, QueuedEnrollmentRow, QueuedSectionRow,
};
pub use section_repo::SectionRepository;
pub use training_course_repo::TrainingCourseRepository;
