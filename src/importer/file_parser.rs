// ==========================================
// 培训课程选课供给系统 - CSV 文件解析
// ==========================================
// 输出: 表头 → 单元格 的原始行（已 trim，跳过全空行）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 原始行: (行号, 表头 → 值)，行号从 1 起且不含表头
pub type RawRow = (usize, HashMap<String, String>);

pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件
    ///
    /// # 返回
    /// - Err(FileNotFound / UnsupportedFormat): 文件不可用
    pub fn parse_file(file_path: &Path) -> ImportResult<Vec<RawRow>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }
        let file = File::open(file_path)?;
        Self::parse_reader(file)
    }

    /// 从任意 Reader 解析（测试与内存数据）
    pub fn parse_reader<R: Read>(reader: R) -> ImportResult<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let row_map: HashMap<String, String> = headers
                .iter()
                .cloned()
                .zip(record.iter().map(|v| v.trim().to_string()))
                .collect();

            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }
            rows.push((idx + 1, row_map));
        }
        Ok(rows)
    }

    /// 校验必需列是否齐全
    pub fn require_columns(rows: &[RawRow], required: &[&str]) -> ImportResult<()> {
        let Some((_, first)) = rows.first() else {
            return Ok(());
        };
        for column in required {
            if !first.contains_key(*column) {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }
}
