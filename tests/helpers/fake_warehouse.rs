// ==========================================
// 季度感知的数据仓库 Fake
// ==========================================
// 按查询文本中的 regis_yr/regis_qtr（注册）或 appl_yr/appl_qtr（录取）
// 返回对应季度的预置学号；校历查询按预置的"普查日前"季度集合作答
// ==========================================

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use training_provisioner::membership::{QueryKind, Warehouse, WarehouseError, WarehouseRow};

#[derive(Default)]
pub struct FakeWarehouse {
    registration: Mutex<HashMap<String, Vec<JsonValue>>>,
    admissions: Mutex<HashMap<String, Vec<JsonValue>>>,
    before_census: Mutex<HashSet<String>>,
    fail: AtomicBool,
    queries: Mutex<Vec<(QueryKind, String)>>,
    query_count: AtomicUsize,
}

impl FakeWarehouse {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 设置季度注册名单（覆盖）
    pub fn set_registered(&self, quarter: &str, students: &[&str]) {
        self.registration
            .lock()
            .unwrap()
            .insert(quarter.to_string(), students.iter().map(|s| json!(s)).collect());
    }

    /// 以数值形式返回学号（模拟仓库把学号列读成整数）
    pub fn set_registered_numeric(&self, quarter: &str, students: &[i64]) {
        self.registration
            .lock()
            .unwrap()
            .insert(quarter.to_string(), students.iter().map(|s| json!(s)).collect());
    }

    pub fn set_admitted(&self, quarter: &str, students: &[&str]) {
        self.admissions
            .lock()
            .unwrap()
            .insert(quarter.to_string(), students.iter().map(|s| json!(s)).collect());
    }

    pub fn set_before_census(&self, quarter: &str) {
        self.before_census.lock().unwrap().insert(quarter.to_string());
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// 已执行查询的季度编码（按类别过滤）
    pub fn queried_quarters(&self, kind: QueryKind) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, q)| q.clone())
            .collect()
    }
}

/// 从查询文本提取 "<column> = <value>" 的值
fn extract(query: &str, column: &str) -> Option<String> {
    let start = query.find(&format!("{} = ", column))? + column.len() + 3;
    let digits: String = query[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

fn quarter_of(query: &str, kind: QueryKind) -> Option<String> {
    match kind {
        QueryKind::Registration => Some(format!("{}{}", extract(query, "regis_yr")?, extract(query, "regis_qtr")?)),
        QueryKind::Admissions => Some(format!("{}{}", extract(query, "appl_yr")?, extract(query, "appl_qtr")?)),
        QueryKind::QuarterInfo => extract(query, "AcademicContigYrQtrCode"),
    }
}

fn student_rows(values: &[JsonValue]) -> Vec<WarehouseRow> {
    values
        .iter()
        .map(|v| {
            let mut row = WarehouseRow::new();
            row.insert("StudentNumber".into(), v.clone());
            row
        })
        .collect()
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn execute_query(&self, query: &str) -> Result<Vec<WarehouseRow>, WarehouseError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(WarehouseError::Unavailable("connection refused".to_string()));
        }

        let kind = QueryKind::classify(query)
            .ok_or_else(|| WarehouseError::QueryFailed("unrecognised query".to_string()))?;
        let quarter = quarter_of(query, kind)
            .ok_or_else(|| WarehouseError::QueryFailed("query without quarter".to_string()))?;
        self.queries.lock().unwrap().push((kind, quarter.clone()));

        let rows = match kind {
            QueryKind::QuarterInfo => {
                let status = if self.before_census.lock().unwrap().contains(&quarter) {
                    "Before Census Day"
                } else {
                    "After Census Day"
                };
                let mut row = WarehouseRow::new();
                row.insert("AcademicContigYrQtrCode".into(), json!(quarter));
                row.insert("CensusDayStatus".into(), json!(status));
                vec![row]
            }
            QueryKind::Registration => student_rows(
                self.registration.lock().unwrap().get(&quarter).map(Vec::as_slice).unwrap_or(&[]),
            ),
            QueryKind::Admissions => student_rows(
                self.admissions.lock().unwrap().get(&quarter).map(Vec::as_slice).unwrap_or(&[]),
            ),
        };
        Ok(rows)
    }
}
