// ==========================================
// 培训课程选课供给系统 - 本地文件数据源
// ==========================================
// FileWarehouse: 按查询类别返回 JSON 文件中的预置行（本地开发）
// load_test_membership: 测试名单文件（MembershipType::Test）
// ==========================================

use crate::domain::enrollment::EligibleTerms;
use crate::domain::ids::{AcademicYear, EligibilityTag, StudentId};
use crate::membership::error::MembershipError;
use crate::membership::queries::QueryKind;
use crate::membership::resolver::CandidateMap;
use crate::membership::warehouse::{Warehouse, WarehouseError, WarehouseRow};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ==========================================
// FileWarehouse
// ==========================================
// 文件格式: {"registration": [rows], "admissions": [rows], "quarter_info": [rows], "default": [rows]}
// 未匹配的类别回退到 "default"，仍无则返回空集
pub struct FileWarehouse {
    path: PathBuf,
}

impl FileWarehouse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<BTreeMap<String, Vec<WarehouseRow>>, WarehouseError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            WarehouseError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| WarehouseError::QueryFailed(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl Warehouse for FileWarehouse {
    async fn execute_query(&self, query: &str) -> Result<Vec<WarehouseRow>, WarehouseError> {
        let mut data = self.load()?;
        let key = QueryKind::classify(query).map(|k| k.as_str()).unwrap_or("default");

        if let Some(rows) = data.remove(key) {
            tracing::info!(query_kind = key, rows = rows.len(), "返回本地预置数据");
            return Ok(rows);
        }

        tracing::warn!(query_kind = key, "本地预置数据缺少该类别，使用 default");
        Ok(data.remove("default").unwrap_or_default())
    }
}

// ==========================================
// 测试名单
// ==========================================

/// 列表形式名单的默认资格标签: <Y>4R, <Y+1>1R
pub fn default_test_terms(ay: AcademicYear) -> EligibleTerms {
    let mut terms = EligibleTerms::new();
    for code in [format!("{}4R", ay.start), format!("{}1R", ay.end)] {
        if let Ok(tag) = EligibilityTag::parse(&code) {
            terms.insert(tag);
        }
    }
    terms
}

/// 读取测试名单文件
///
/// # 文件格式
/// - {"0012345": ["20254R"], ...}: 学号 → 资格标签
/// - ["0012345", ...]: 所有学号使用默认资格标签
///
/// # 说明
/// - 学号原样保留（字符串不做数值转换）
/// - 无法识别的资格标签跳过并记录告警
pub fn load_test_membership(path: &Path, ay: AcademicYear) -> Result<CandidateMap, MembershipError> {
    let mock_err = |message: String| MembershipError::MockFile {
        path: path.display().to_string(),
        message,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| mock_err(e.to_string()))?;
    let value: JsonValue = serde_json::from_str(&raw).map_err(|e| mock_err(e.to_string()))?;

    let mut candidates = CandidateMap::new();
    match value {
        JsonValue::Object(map) => {
            for (student, tags) in map {
                let student_id = StudentId::new(&student).map_err(|e| mock_err(e.to_string()))?;
                let mut terms = EligibleTerms::new();
                for tag in tags.as_array().into_iter().flatten() {
                    match tag.as_str().map(EligibilityTag::parse) {
                        Some(Ok(t)) => {
                            terms.insert(t);
                        }
                        _ => tracing::warn!(student_id = %student_id, tag = %tag, "忽略无法识别的资格标签"),
                    }
                }
                candidates.entry(student_id).or_default().extend(terms);
            }
        }
        JsonValue::Array(items) => {
            let defaults = default_test_terms(ay);
            for item in items {
                let student_id =
                    StudentId::from_warehouse_value(&item).map_err(|e| mock_err(e.to_string()))?;
                candidates.entry(student_id).or_default().extend(defaults.iter().copied());
            }
        }
        other => {
            return Err(mock_err(format!("不支持的名单格式: {}", other)));
        }
    }

    tracing::info!(
        path = %path.display(),
        students = candidates.len(),
        "测试名单加载完成"
    );
    Ok(candidates)
}
