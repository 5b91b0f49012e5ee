// ==========================================
// 培训课程选课供给系统 - 数据仓库查询文本
// ==========================================
// 注册: enroll_status = 12（已注册）
// 录取: appl_status IN (15, 16)（已录取/已确认）
// 校历: dimDate 中 AcademicQtrCensusDayInd = 'Y' 的日期即人口普查日
// ==========================================

use crate::domain::ids::QuarterCode;

/// 查询类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    QuarterInfo,
    Registration,
    Admissions,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::QuarterInfo => "quarter_info",
            QueryKind::Registration => "registration",
            QueryKind::Admissions => "admissions",
        }
    }

    /// 根据查询文本判定类别（供文件仓库按类别返回预置数据）
    pub fn classify(query: &str) -> Option<Self> {
        if query.contains("AcademicQtrCensusDayInd") {
            Some(QueryKind::QuarterInfo)
        } else if query.contains("sr_adm_appl") {
            Some(QueryKind::Admissions)
        } else if query.contains("registration") {
            Some(QueryKind::Registration)
        } else {
            None
        }
    }
}

/// 季度校历信息查询（人口普查日前/后）
pub fn quarter_info_query(quarter: QuarterCode) -> String {
    format!(
        "SELECT TOP 1
            d.AcademicContigYrQtrCode,
            d.AcademicYrName,
            CASE WHEN CONVERT(DATE, GETDATE()) < d.CalendarDate
                 THEN 'Before Census Day'
                 ELSE 'After Census Day'
            END AS CensusDayStatus
        FROM EDWPresentation.sec.dimDate d
        WHERE d.AcademicContigYrQtrCode = {code}
          AND d.AcademicQtrCensusDayInd = 'Y'",
        code = quarter.code()
    )
}

/// 指定季度的已注册学生
pub fn registration_query(quarter: QuarterCode) -> String {
    format!(
        "SELECT DISTINCT s1.student_no AS StudentNumber
        FROM UWSDBDataStore.sec.registration r
        JOIN UWSDBDataStore.sec.student_1 s1 ON s1.system_key = r.system_key
        WHERE r.regis_yr = {year}
          AND r.regis_qtr = {qtr}
          AND r.enroll_status = 12",
        year = quarter.year,
        qtr = quarter.quarter
    )
}

/// 指定季度的已录取（尚未注册）学生
pub fn admissions_query(quarter: QuarterCode) -> String {
    format!(
        "SELECT DISTINCT s1.student_no AS StudentNumber
        FROM UWSDBDataStore.sec.sr_adm_appl a
        JOIN UWSDBDataStore.sec.student_1 s1 ON s1.system_key = a.system_key
        WHERE a.appl_yr = {year}
          AND a.appl_qtr = {qtr}
          AND a.appl_status IN (15, 16)",
        year = quarter.year,
        qtr = quarter.quarter
    )
}
