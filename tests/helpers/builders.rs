// ==========================================
// 测试数据构建器
// ==========================================

use training_provisioner::domain::types::{CourseType, MembershipType};
use training_provisioner::TrainingCourse;

/// 培训课程定义构建器
pub struct TrainingCourseBuilder {
    tc: TrainingCourse,
}

impl TrainingCourseBuilder {
    pub fn new(blueprint: &str, term_id: &str) -> Self {
        Self {
            tc: TrainingCourse::new(
                "Title VI Training",
                blueprint,
                term_id,
                "acct-1",
                MembershipType::TitleVi,
                CourseType::Initial,
            ),
        }
    }

    pub fn course_type(mut self, course_type: CourseType) -> Self {
        self.tc.course_type = course_type;
        self
    }

    pub fn membership_type(mut self, membership_type: MembershipType) -> Self {
        self.tc.membership_type = membership_type;
        self
    }

    pub fn course_count(mut self, n: u32) -> Self {
        self.tc.course_count = n;
        self
    }

    pub fn section_count(mut self, n: u32) -> Self {
        self.tc.section_count = n;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.tc.course_name = name.to_string();
        self
    }

    pub fn build(self) -> TrainingCourse {
        self.tc
    }
}
