// ==========================================
// 培训课程选课供给系统 - LMS 接口层
// ==========================================
// 职责: LMS 端口定义 + 变更集渲染
// ==========================================

pub mod change_set;
pub mod client;

pub use change_set::{
    ChangeSet, ChangeSetBundle, CourseRow, EnrollmentRow, SectionRow, COURSES_FILE,
    ENROLLMENTS_FILE, SECTIONS_FILE,
};
pub use client::{ImportHandle, ImportMessage, ImportProgress, LmsClient, LmsCourseMetadata, LmsError};
