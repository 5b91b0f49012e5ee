// ==========================================
// 培训课程选课供给系统 - 选课历史仓储
// ==========================================
// 红线: 历史事件只追加，不更新
// insert_event 接受 &Connection，便于在选课记录事务内调用
// ==========================================

use crate::domain::enrollment::EnrollmentHistoryEvent;
use crate::domain::ids::StudentId;
use crate::domain::types::HistoryEventType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

const HISTORY_COLUMNS: &str = r#"
    id, enrollment_id, event_type, student_id, course_id, section_id,
    eligible_terms, previous_eligible_terms, note, timestamp
"#;

/// 追加一条历史事件
///
/// # 返回
/// - Ok(i64): 新事件主键
pub(crate) fn insert_event(conn: &Connection, event: &EnrollmentHistoryEvent) -> RepositoryResult<i64> {
    let previous = match &event.previous_eligible_terms {
        Some(p) => Some(serde_json::to_string(p)?),
        None => None,
    };
    conn.execute(
        r#"
        INSERT INTO enrollment_history (
            enrollment_id, event_type, student_id, course_id, section_id,
            eligible_terms, previous_eligible_terms, note, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            event.enrollment_id,
            event.event_type.as_str(),
            event.student_id.as_str(),
            event.course_id,
            event.section_id,
            serde_json::to_string(&event.eligible_terms)?,
            previous,
            event.note,
            event.timestamp,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct EnrollmentHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EnrollmentHistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    /// 独立追加事件（回填等不伴随记录变更的场景）
    pub fn append(&self, event: &EnrollmentHistoryEvent) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_event(&conn, event)
    }

    /// 某条选课记录的全部事件（时间升序）
    pub fn list_by_enrollment(&self, enrollment_id: i64) -> RepositoryResult<Vec<EnrollmentHistoryEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM enrollment_history WHERE enrollment_id = ?1 ORDER BY timestamp, id",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![enrollment_id], map_history_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 某学号的全部事件（时间倒序）
    pub fn list_by_student(&self, student_id: &StudentId) -> RepositoryResult<Vec<EnrollmentHistoryEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM enrollment_history WHERE student_id = ?1 ORDER BY timestamp DESC, id DESC",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![student_id.as_str()], map_history_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 已有历史事件的选课记录 ID 集合
    pub fn enrollment_ids_with_history(&self) -> RepositoryResult<HashSet<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT enrollment_id FROM enrollment_history")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// 按事件类型计数
    pub fn count_by_event_type(&self) -> RepositoryResult<BTreeMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT event_type, COUNT(*) FROM enrollment_history GROUP BY event_type ORDER BY event_type",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM enrollment_history", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_history_row(row: &Row) -> rusqlite::Result<EnrollmentHistoryEvent> {
    let event_raw: String = row.get(2)?;
    let event_type = HistoryEventType::from_str(&event_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown event_type {}", event_raw).into(),
        )
    })?;
    let student_raw: String = row.get(3)?;
    let student_id = StudentId::new(&student_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let terms_raw: String = row.get(6)?;
    let previous_raw: Option<String> = row.get(7)?;
    let previous_eligible_terms = match previous_raw {
        Some(raw) => Some(parse_json_column(7, &raw)?),
        None => None,
    };

    Ok(EnrollmentHistoryEvent {
        id: row.get(0)?,
        enrollment_id: row.get(1)?,
        event_type,
        student_id,
        course_id: row.get(4)?,
        section_id: row.get(5)?,
        eligible_terms: parse_json_column(6, &terms_raw)?,
        previous_eligible_terms,
        note: row.get(8)?,
        timestamp: row.get(9)?,
    })
}
