// ==========================================
// 培训课程选课供给系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合对账/导出引擎所需的所有 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    CourseRepository, EnrollmentHistoryRepository, EnrollmentRepository, ExportBatchRepository,
    ExportQueueRepository, SectionRepository, TrainingCourseRepository,
};

/// 供给引擎仓储集合
///
/// # 包含的仓储
/// - `training_course_repo`: 培训课程定义
/// - `course_repo`: 课程副本
/// - `section_repo`: 分班
/// - `enrollment_repo`: 选课记录
/// - `history_repo`: 选课历史事件
/// - `batch_repo`: 导出批次
/// - `queue_repo`: 导出队列（排队/出队）
#[derive(Clone)]
pub struct ProvisioningRepositories {
    pub training_course_repo: Arc<TrainingCourseRepository>,
    pub course_repo: Arc<CourseRepository>,
    pub section_repo: Arc<SectionRepository>,
    pub enrollment_repo: Arc<EnrollmentRepository>,
    pub history_repo: Arc<EnrollmentHistoryRepository>,
    pub batch_repo: Arc<ExportBatchRepository>,
    pub queue_repo: Arc<ExportQueueRepository>,
}

impl ProvisioningRepositories {
    /// 基于共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            training_course_repo: Arc::new(TrainingCourseRepository::new(conn.clone())),
            course_repo: Arc::new(CourseRepository::new(conn.clone())),
            section_repo: Arc::new(SectionRepository::new(conn.clone())),
            enrollment_repo: Arc::new(EnrollmentRepository::new(conn.clone())),
            history_repo: Arc::new(EnrollmentHistoryRepository::new(conn.clone())),
            batch_repo: Arc::new(ExportBatchRepository::new(conn.clone())),
            queue_repo: Arc::new(ExportQueueRepository::new(conn)),
        }
    }
}
