// ==========================================
// 培训课程选课供给系统 - 分班仓储
// ==========================================

use crate::domain::course::SectionInstance;
use crate::domain::types::Priority;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub(crate) const SECTION_COLUMNS: &str = r#"
    s.id, s.course_pk, s.section_id, s.section_ordinal, s.created_date,
    s.provisioned_date, s.deleted_date, s.priority, s.queue_id
"#;

pub struct SectionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SectionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    pub fn insert(&self, section: &SectionInstance) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO section (
                course_pk, section_id, section_ordinal, created_date,
                provisioned_date, deleted_date, priority, queue_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                section.course_pk,
                section.section_id,
                section.section_ordinal,
                section.created_date,
                section.provisioned_date,
                section.deleted_date,
                section.priority.as_i64(),
                section.queue_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<SectionInstance>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM section s WHERE s.id = ?1", SECTION_COLUMNS);
        conn.query_row(&sql, params![id], map_section_row)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn find_by_section_id(&self, section_id: &str) -> RepositoryResult<Option<SectionInstance>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM section s WHERE s.section_id = ?1", SECTION_COLUMNS);
        conn.query_row(&sql, params![section_id], map_section_row)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn list_by_course(&self, course_pk: i64) -> RepositoryResult<Vec<SectionInstance>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM section s WHERE s.course_pk = ?1 ORDER BY s.section_ordinal",
            SECTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![course_pk], map_section_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub(crate) fn map_section_row(row: &Row) -> rusqlite::Result<SectionInstance> {
    Ok(SectionInstance {
        id: row.get(0)?,
        course_pk: row.get(1)?,
        section_id: row.get(2)?,
        section_ordinal: row.get(3)?,
        created_date: row.get(4)?,
        provisioned_date: row.get(5)?,
        deleted_date: row.get(6)?,
        priority: Priority::from_i64(row.get(7)?),
        queue_id: row.get(8)?,
    })
}
