// ==========================================
// 培训课程选课供给系统 - 导入层
// ==========================================
// 职责: 培训课程定义的外部导入（CSV）
// ==========================================

pub mod course_importer;
pub mod error;
pub mod file_parser;

pub use course_importer::{CourseDefinitionImporter, CourseImportSummary, REQUIRED_COLUMNS};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, RawRow};
