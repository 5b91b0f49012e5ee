// ==========================================
// 培训课程选课供给系统 - 校历信息
// ==========================================
// 职责: 查询季度的人口普查日状态
// 规则: 普查日前才查询录取数据（临时资格）
// ==========================================

use crate::domain::ids::QuarterCode;
use crate::membership::error::MembershipError;
use crate::membership::queries::{quarter_info_query, QueryKind};
use crate::membership::warehouse::{execute_with_timeout, Warehouse};
use std::time::Duration;

/// 人口普查日状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusDayStatus {
    BeforeCensusDay,
    AfterCensusDay,
}

impl CensusDayStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Before Census Day" => Some(CensusDayStatus::BeforeCensusDay),
            "After Census Day" => Some(CensusDayStatus::AfterCensusDay),
            _ => None,
        }
    }

    pub fn is_before(&self) -> bool {
        matches!(self, CensusDayStatus::BeforeCensusDay)
    }
}

/// 季度校历信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarterInfo {
    pub quarter: QuarterCode,
    pub academic_year_name: Option<String>,
    pub census_day_status: CensusDayStatus,
}

/// 查询季度校历信息
///
/// # 返回
/// - 仓库未返回行或状态无法识别时按"普查日后"处理（不查询临时资格）
pub async fn info_for_quarter(
    warehouse: &dyn Warehouse,
    quarter: QuarterCode,
    timeout: Duration,
) -> Result<QuarterInfo, MembershipError> {
    let rows = execute_with_timeout(
        warehouse,
        &quarter_info_query(quarter),
        QueryKind::QuarterInfo,
        timeout,
    )
    .await?;

    let row = rows.first();
    let status = row
        .and_then(|r| r.get("CensusDayStatus"))
        .and_then(|v| v.as_str())
        .and_then(CensusDayStatus::parse);

    let census_day_status = match status {
        Some(s) => s,
        None => {
            tracing::warn!(quarter = %quarter, "季度普查日状态缺失，按普查日后处理");
            CensusDayStatus::AfterCensusDay
        }
    };

    Ok(QuarterInfo {
        quarter,
        academic_year_name: row
            .and_then(|r| r.get("AcademicYrName"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        census_day_status,
    })
}
