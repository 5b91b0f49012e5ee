// ==========================================
// 培训课程选课供给系统 - 标识符与学期编码
// ==========================================
// 红线: 学号始终为不透明字符串，禁止转为整数
// 学年编码: AY<start>-<end>[-suffix]
// 季度编码: <yyyy><q> 五位数字
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::EligibilitySource;

/// 学号标准宽度（仓库返回整数时按此宽度补零）
pub const STUDENT_NUMBER_WIDTH: usize = 7;

/// 标识符解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid term_id format: {0} (expected AY<yyyy>-<yyyy>[-suffix])")]
    InvalidTermFormat(String),

    #[error("Invalid academic_year format: {0} (expected <yyyy>/<yyyy>)")]
    InvalidAcademicYear(String),

    #[error("Invalid quarter_code format: {0} (expected <yyyy><1-4>)")]
    InvalidQuarterCode(String),

    #[error("Quarter {quarter} is outside academic year {academic_year}")]
    QuarterOutsideAcademicYear {
        quarter: String,
        academic_year: String,
    },

    #[error("Invalid eligibility tag: {0}")]
    InvalidEligibilityTag(String),

    #[error("Invalid student id: {0:?}")]
    InvalidStudentId(String),
}

// ==========================================
// StudentId - 学号
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// 从字符串构造（去除首尾空白，保留前导零）
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ParseError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(ParseError::InvalidStudentId(raw.as_ref().to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// 从仓库单元格构造
    ///
    /// - 字符串: 原样保留
    /// - 整数: 补零至 STUDENT_NUMBER_WIDTH 位（整型列已丢失前导零）
    /// - 其他类型: 拒绝
    pub fn from_warehouse_value(value: &serde_json::Value) -> Result<Self, ParseError> {
        match value {
            serde_json::Value::String(s) => Self::new(s),
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(v) => Ok(Self(format!("{:0width$}", v, width = STUDENT_NUMBER_WIDTH))),
                None => Err(ParseError::InvalidStudentId(n.to_string())),
            },
            other => Err(ParseError::InvalidStudentId(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StudentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ==========================================
// AcademicYear - 学年区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcademicYear {
    pub start: u16,
    pub end: u16,
}

impl AcademicYear {
    /// 解析学年编码 AY2025-2026 / AY2025-2026-101
    pub fn from_term_id(term_id: &str) -> Result<Self, ParseError> {
        let err = || ParseError::InvalidTermFormat(term_id.to_string());

        let rest = term_id.strip_prefix("AY").ok_or_else(err)?;
        let mut parts = rest.splitn(3, '-');
        let start = parse_year(parts.next()).ok_or_else(err)?;
        let end = parse_year(parts.next()).ok_or_else(err)?;
        if let Some(suffix) = parts.next() {
            if suffix.is_empty() {
                return Err(err());
            }
        }
        if end != start + 1 {
            return Err(err());
        }
        Ok(Self { start, end })
    }

    /// 解析仓库学年名称 2025/2026
    pub fn from_label(label: &str) -> Result<Self, ParseError> {
        let err = || ParseError::InvalidAcademicYear(label.to_string());
        let (a, b) = label.split_once('/').ok_or_else(err)?;
        let start = parse_year(Some(a)).ok_or_else(err)?;
        let end = parse_year(Some(b)).ok_or_else(err)?;
        if end != start + 1 {
            return Err(err());
        }
        Ok(Self { start, end })
    }

    /// 仓库学年名称
    pub fn label(&self) -> String {
        format!("{}/{}", self.start, self.end)
    }

    /// 解析起始季度，并要求它落在本学年内
    pub fn start_quarter(&self, code: &str) -> Result<QuarterCode, ParseError> {
        let q = QuarterCode::parse(code)?;
        if !self.quarters().contains(&q) {
            return Err(ParseError::QuarterOutsideAcademicYear {
                quarter: q.code(),
                academic_year: self.to_string(),
            });
        }
        Ok(q)
    }

    /// 学年内的四个季度（夏、秋、冬、春）
    pub fn quarters(&self) -> [QuarterCode; 4] {
        [
            QuarterCode { year: self.start, quarter: 3 },
            QuarterCode { year: self.start, quarter: 4 },
            QuarterCode { year: self.end, quarter: 1 },
            QuarterCode { year: self.end, quarter: 2 },
        ]
    }

    /// 从指定季度起的学年季度列表
    ///
    /// - start 早于学年: 返回全部
    /// - start 晚于学年: 返回空
    pub fn quarters_from(&self, start: Option<QuarterCode>) -> Vec<QuarterCode> {
        let all = self.quarters();
        match start {
            None => all.to_vec(),
            Some(s) => all.into_iter().filter(|q| *q >= s).collect(),
        }
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AY{}-{}", self.start, self.end)
    }
}

fn parse_year(s: Option<&str>) -> Option<u16> {
    let s = s?;
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// ==========================================
// QuarterCode - 季度编码
// ==========================================
// 1 冬 / 2 春 / 3 夏 / 4 秋；按数值即时间顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuarterCode {
    pub year: u16,
    pub quarter: u8,
}

impl QuarterCode {
    pub fn parse(code: &str) -> Result<Self, ParseError> {
        let err = || ParseError::InvalidQuarterCode(code.to_string());
        let code_trim = code.trim();
        if code_trim.len() != 5 || !code_trim.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year: u16 = code_trim[..4].parse().map_err(|_| err())?;
        let quarter: u8 = code_trim[4..].parse().map_err(|_| err())?;
        if !(1..=4).contains(&quarter) {
            return Err(err());
        }
        Ok(Self { year, quarter })
    }

    /// 所属学年（夏/秋属于 year/year+1，冬/春属于 year-1/year）
    pub fn academic_year(&self) -> AcademicYear {
        if self.quarter >= 3 {
            AcademicYear { start: self.year, end: self.year + 1 }
        } else {
            AcademicYear { start: self.year.saturating_sub(1), end: self.year }
        }
    }

    pub fn code(&self) -> String {
        format!("{}{}", self.year, self.quarter)
    }
}

impl fmt::Display for QuarterCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.quarter)
    }
}

// ==========================================
// EligibilityTag - 资格标签 (如 20254R)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EligibilityTag {
    pub quarter: QuarterCode,
    pub source: EligibilitySource,
}

impl EligibilityTag {
    pub fn new(quarter: QuarterCode, source: EligibilitySource) -> Self {
        Self { quarter, source }
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let err = || ParseError::InvalidEligibilityTag(s.to_string());
        let s = s.trim();
        if s.len() != 6 || !s.is_ascii() {
            return Err(err());
        }
        let quarter = QuarterCode::parse(&s[..5]).map_err(|_| err())?;
        let source = s[5..]
            .chars()
            .next()
            .and_then(EligibilitySource::from_suffix)
            .ok_or_else(err)?;
        Ok(Self { quarter, source })
    }
}

impl fmt::Display for EligibilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.quarter, self.source.suffix())
    }
}

impl Serialize for EligibilityTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EligibilityTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EligibilityTag::parse(&s).map_err(serde::de::Error::custom)
    }
}
