// ==========================================
// 培训课程选课供给系统 - 变更集构建
// ==========================================
// 职责: 将导出批次中的课程/分班/选课渲染为 LMS 导入文件
// 文件: courses.csv / sections.csv / enrollments.csv
// ==========================================

use serde::Serialize;
use std::collections::BTreeMap;

pub const COURSES_FILE: &str = "courses.csv";
pub const SECTIONS_FILE: &str = "sections.csv";
pub const ENROLLMENTS_FILE: &str = "enrollments.csv";

/// courses.csv 行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseRow {
    pub course_id: String,
    pub short_name: String,
    pub long_name: String,
    pub account_id: String,
    pub term_id: String,
    pub status: String,
    pub blueprint_course_id: String,
}

/// sections.csv 行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRow {
    pub section_id: String,
    pub course_id: String,
    pub name: String,
    pub status: String,
}

/// enrollments.csv 行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRow {
    pub course_id: String,
    pub user_integration_id: String,
    pub role: String,
    pub role_id: String,
    pub section_id: String,
    pub status: String,
}

/// 变更集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub courses: Vec<CourseRow>,
    pub sections: Vec<SectionRow>,
    pub enrollments: Vec<EnrollmentRow>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() && self.sections.is_empty() && self.enrollments.is_empty()
    }

    /// 渲染为导入文件集合
    ///
    /// 空表不生成文件；行按主键排序以保证输出稳定
    pub fn render(&self) -> Result<ChangeSetBundle, csv::Error> {
        let mut files = BTreeMap::new();

        let mut courses = self.courses.clone();
        courses.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        if let Some(text) = render_rows(&courses)? {
            files.insert(COURSES_FILE.to_string(), text);
        }

        let mut sections = self.sections.clone();
        sections.sort_by(|a, b| a.section_id.cmp(&b.section_id));
        if let Some(text) = render_rows(&sections)? {
            files.insert(SECTIONS_FILE.to_string(), text);
        }

        let mut enrollments = self.enrollments.clone();
        enrollments.sort_by(|a, b| {
            (&a.course_id, &a.user_integration_id).cmp(&(&b.course_id, &b.user_integration_id))
        });
        if let Some(text) = render_rows(&enrollments)? {
            files.insert(ENROLLMENTS_FILE.to_string(), text);
        }

        Ok(ChangeSetBundle { files })
    }
}

fn render_rows<T: Serialize>(rows: &[T]) -> Result<Option<String>, csv::Error> {
    if rows.is_empty() {
        return Ok(None);
    }
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// 待提交的导入文件集合（文件名 → CSV 文本）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSetBundle {
    pub files: BTreeMap<String, String>,
}

impl ChangeSetBundle {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }
}
