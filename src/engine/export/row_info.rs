// ==========================================
// LMS 导入错误行解析
// ==========================================
// LMS 返回的 row_info 是 Ruby hash 的文本形式:
//   [{course_id: "AY2025-2026-BP-001", user_integration_id: "0001234", section_id: nil}]
// 先规整为 JSON（给裸键加引号、nil 改为 null）再交给 serde_json
// ==========================================

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").expect("BARE_KEY is a valid regex pattern")
});

static RUBY_NIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\s*nil(\s*[,}])").expect("RUBY_NIL is a valid regex pattern"));

/// 导入错误行中定位选课所需的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInfo {
    pub course_id: String,
    pub user_integration_id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRows {
    List(Vec<RawRow>),
    Single(RawRow),
}

#[derive(Deserialize)]
struct RawRow {
    #[serde(default)]
    course_id: Value,
    #[serde(default)]
    user_integration_id: Value,
}

/// 解析错误行
///
/// # 返回
/// - None: 文本无法解析，或缺少 course_id / user_integration_id
pub fn parse_row_info(row_info: &str) -> Option<RowInfo> {
    let json = to_json(row_info);
    let row = match serde_json::from_str::<RawRows>(&json).ok()? {
        RawRows::List(rows) => rows.into_iter().next()?,
        RawRows::Single(row) => row,
    };
    Some(RowInfo {
        course_id: scalar(row.course_id)?,
        user_integration_id: scalar(row.user_integration_id)?,
    })
}

fn to_json(row_info: &str) -> String {
    let quoted = BARE_KEY.replace_all(row_info.trim(), r#"$1"$2":"#);
    RUBY_NIL.replace_all(&quoted, ": null$1").into_owned()
}

/// 字符串原样返回；数值转成文本；null 与其他类型视为缺失
fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
