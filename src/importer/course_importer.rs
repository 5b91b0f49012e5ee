// ==========================================
// 培训课程选课供给系统 - 培训课程定义导入
// ==========================================
// 流程: CSV 解析 → 字段映射 → 配置校验 → 按 (blueprint, term) upsert
// 行级错误跳过该行并记录；文件级错误整体失败
// 已有定义被更新时，其课程副本重新标记为待导出
// ==========================================

use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{CourseType, MembershipType};
use crate::engine::propagation::PriorityPropagation;
use crate::engine::repositories::ProvisioningRepositories;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{CsvParser, RawRow};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument, warn};

/// 必需列
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "course_name",
    "blueprint_course_id",
    "term_id",
    "membership_type",
    "course_type",
];

/// 导入汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct CourseImportSummary {
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    /// (行号, 错误信息)
    pub rejected: Vec<(usize, String)>,
}

impl CourseImportSummary {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

pub struct CourseDefinitionImporter {
    repos: ProvisioningRepositories,
    propagation: PriorityPropagation,
}

impl CourseDefinitionImporter {
    pub fn new(repos: ProvisioningRepositories) -> Self {
        let propagation = PriorityPropagation::new(repos.clone());
        Self { repos, propagation }
    }

    /// 从 CSV 文件导入
    #[instrument(skip(self, file_path), fields(file = %file_path.display()))]
    pub fn import_file(&self, file_path: &Path) -> ImportResult<CourseImportSummary> {
        let rows = CsvParser::parse_file(file_path)?;
        self.import_rows(rows)
    }

    /// 从任意 Reader 导入
    pub fn import_reader<R: Read>(&self, reader: R) -> ImportResult<CourseImportSummary> {
        let rows = CsvParser::parse_reader(reader)?;
        self.import_rows(rows)
    }

    fn import_rows(&self, rows: Vec<RawRow>) -> ImportResult<CourseImportSummary> {
        CsvParser::require_columns(&rows, &REQUIRED_COLUMNS)?;

        let mut summary = CourseImportSummary {
            total_rows: rows.len(),
            ..Default::default()
        };

        for (row_no, row) in rows {
            let outcome = map_row(row_no, &row).and_then(|tc| self.upsert(tc));
            match outcome {
                Ok(true) => summary.inserted += 1,
                Ok(false) => summary.updated += 1,
                Err(e) => match e.row() {
                    Some(row) => {
                        warn!(row, error = %e, "培训课程定义行被拒绝");
                        summary.rejected.push((row, e.to_string()));
                    }
                    None => return Err(e),
                },
            }
        }

        info!(
            total = summary.total_rows,
            inserted = summary.inserted,
            updated = summary.updated,
            rejected = summary.rejected.len(),
            "培训课程定义导入完成"
        );
        Ok(summary)
    }

    /// 按 (blueprint_course_id, term_id) 插入或更新
    ///
    /// # 返回
    /// - Ok(true): 新插入
    /// - Ok(false): 更新已有定义
    fn upsert(&self, incoming: TrainingCourse) -> ImportResult<bool> {
        let repo = &self.repos.training_course_repo;
        match repo.find_by_key(&incoming.blueprint_course_id, &incoming.term_id)? {
            Some(mut existing) => {
                existing.course_name = incoming.course_name;
                existing.account_id = incoming.account_id;
                existing.membership_type = incoming.membership_type;
                existing.course_type = incoming.course_type;
                existing.course_count = incoming.course_count;
                existing.section_count = incoming.section_count;
                existing.is_provisioned = incoming.is_provisioned;
                repo.update(&existing)?;
                self.propagation.reprioritize_training_course(existing.id)?;
                Ok(false)
            }
            None => {
                let id = repo.insert(&incoming)?;
                info!(training_course_id = id, course = %incoming, "新增培训课程定义");
                Ok(true)
            }
        }
    }
}

// ==========================================
// 字段映射
// ==========================================

fn map_row(row_no: usize, row: &HashMap<String, String>) -> ImportResult<TrainingCourse> {
    let required = |field: &str| -> ImportResult<String> {
        row.get(field)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ImportError::MissingField {
                row: row_no,
                field: field.to_string(),
            })
    };
    let optional = |field: &str| row.get(field).filter(|v| !v.is_empty());

    let membership_raw = required("membership_type")?;
    let membership_type =
        MembershipType::parse(&membership_raw).ok_or_else(|| ImportError::BadValue {
            row: row_no,
            field: "membership_type".to_string(),
            message: format!("未知成员来源: {}", membership_raw),
        })?;

    let mut tc = TrainingCourse::new(
        &required("course_name")?,
        &required("blueprint_course_id")?,
        &required("term_id")?,
        optional("account_id").map(String::as_str).unwrap_or(""),
        membership_type,
        CourseType::from_str(&required("course_type")?),
    );

    if let Some(v) = optional("course_count") {
        tc.course_count = parse_count(row_no, "course_count", v)?;
    }
    if let Some(v) = optional("section_count") {
        tc.section_count = parse_count(row_no, "section_count", v)?;
    }
    if let Some(v) = optional("is_provisioned") {
        tc.is_provisioned = parse_flag(row_no, "is_provisioned", v)?;
    }

    tc.validate()
        .map_err(|message| ImportError::ValidationError { row: row_no, message })?;
    Ok(tc)
}

fn parse_count(row: usize, field: &str, value: &str) -> ImportResult<u32> {
    value
        .parse::<u32>()
        .map_err(|e| ImportError::BadValue {
            row,
            field: field.to_string(),
            message: format!("{} ({})", e, value),
        })
}

fn parse_flag(row: usize, field: &str, value: &str) -> ImportResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Ok(true),
        "0" | "false" | "f" | "no" | "n" => Ok(false),
        _ => Err(ImportError::BadValue {
            row,
            field: field.to_string(),
            message: format!("无法识别的布尔值: {}", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::CourseInstance;
    use crate::domain::types::Priority;
    use crate::engine::test_support::setup_test_db;
    use chrono::Utc;

    const HEADER: &str = "course_name,blueprint_course_id,term_id,account_id,membership_type,course_type,course_count,section_count,is_provisioned\n";

    fn importer() -> (ProvisioningRepositories, CourseDefinitionImporter) {
        let repos = ProvisioningRepositories::from_connection(setup_test_db());
        (repos.clone(), CourseDefinitionImporter::new(repos))
    }

    #[test]
    fn test_import_inserts_and_rejects_bad_rows() {
        let (repos, importer) = importer();
        let data = format!(
            "{}{}{}{}",
            HEADER,
            "Title VI Training,BP1,AY2025-2026,acct-1,title_vi,initial,8,0,true\n",
            "Title VI Booster,BP2,AY2025-2026,acct-1,title_vi_booster,booster,,,\n",
            "Broken,BP3,2025-2026,acct-1,title_vi,initial,1,0,true\n",
        );

        let summary = importer.import_reader(data.as_bytes()).unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].0, 3);

        let tc = repos
            .training_course_repo
            .find_by_key("BP1", "AY2025-2026")
            .unwrap()
            .unwrap();
        assert_eq!(tc.course_count, 8);
        assert_eq!(tc.course_type, CourseType::Initial);
        assert_eq!(tc.membership_type, MembershipType::TitleVi);

        let booster = repos
            .training_course_repo
            .find_by_key("BP2", "AY2025-2026")
            .unwrap()
            .unwrap();
        assert_eq!(booster.course_count, 1);
        assert_eq!(booster.section_count, 0);
        assert!(booster.is_provisioned);
    }

    #[test]
    fn test_reimport_updates_and_reprioritizes_courses() {
        let (repos, importer) = importer();
        let first = format!("{}Title VI Training,BP1,AY2025-2026,acct-1,title_vi,initial,1,0,true\n", HEADER);
        importer.import_reader(first.as_bytes()).unwrap();

        let tc = repos
            .training_course_repo
            .find_by_key("BP1", "AY2025-2026")
            .unwrap()
            .unwrap();
        let course = CourseInstance {
            id: 0,
            training_course_id: tc.id,
            course_id: tc.course_id(0),
            course_ordinal: 1,
            created_date: Utc::now(),
            provisioned_date: Some(Utc::now()),
            provisioned_error: None,
            provisioned_status: None,
            deleted_date: None,
            priority: Priority::None,
            queue_id: None,
        };
        repos.course_repo.insert(&course).unwrap();

        let second = format!("{}Renamed Training,BP1,AY2025-2026,acct-1,title_vi,initial,2,0,true\n", HEADER);
        let summary = importer.import_reader(second.as_bytes()).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 0);

        let updated = repos.training_course_repo.find_by_id(tc.id).unwrap().unwrap();
        assert_eq!(updated.course_name, "Renamed Training");
        assert_eq!(updated.course_count, 2);

        let stored = repos.course_repo.find_by_course_id(&tc.course_id(0)).unwrap().unwrap();
        assert_eq!(stored.priority, Priority::Default);
    }

    #[test]
    fn test_missing_column_fails_whole_file() {
        let (_, importer) = importer();
        let data = "course_name,term_id\nX,AY2025-2026\n";
        let err = importer.import_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(_)));
    }

    #[test]
    fn test_map_row_rejects_unknown_membership_and_bad_counts() {
        let mut row = HashMap::new();
        for (k, v) in [
            ("course_name", "T"),
            ("blueprint_course_id", "BP"),
            ("term_id", "AY2025-2026"),
            ("membership_type", "ldap"),
            ("course_type", "initial"),
        ] {
            row.insert(k.to_string(), v.to_string());
        }
        assert!(matches!(
            map_row(1, &row),
            Err(ImportError::BadValue { field, .. }) if field == "membership_type"
        ));

        row.insert("membership_type".to_string(), "test".to_string());
        row.insert("course_count".to_string(), "0".to_string());
        assert!(matches!(map_row(1, &row), Err(ImportError::ValidationError { .. })));

        row.insert("course_count".to_string(), "-1".to_string());
        assert!(matches!(map_row(1, &row), Err(ImportError::BadValue { .. })));
    }
}
