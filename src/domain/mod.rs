// ==========================================
// 培训课程选课供给系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、标识符、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod course;
pub mod enrollment;
pub mod export_batch;
pub mod ids;
pub mod training_course;
pub mod types;

// 重导出核心类型
pub use course::{CourseInstance, SectionInstance};
pub use enrollment::{
    terms_to_strings, EligibleTerms, EnrollmentDetail, EnrollmentHistoryEvent, EnrollmentRecord,
    PriorEnrollment,
};
pub use export_batch::ExportBatch;
pub use ids::{AcademicYear, EligibilityTag, ParseError, QuarterCode, StudentId};
pub use training_course::TrainingCourse;
pub use types::{
    CourseStatus, CourseType, EligibilitySource, HistoryEventType, ImportStatus, MembershipType,
    Priority,
};
