use crate::domain::enrollment::{EnrollmentHistoryEvent, EnrollmentRecord};
use crate::domain::ids::StudentId;
use crate::domain::types::Priority;
use crate::repository::enrollment_history_repo::insert_event;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

pub(crate) const ENROLLMENT_COLUMNS: &str = r#"
    e.id, e.training_course_id, e.course_pk, e.section_pk, e.student_id,
    e.eligible_terms, e.created_date, e.provisioned_date, e.deleted_date,
    e.priority, e.queue_id
"#;

// ==========================================
// EnrollmentRepository - 选课记录仓储
// ==========================================
pub struct EnrollmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EnrollmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 创建选课记录并追加 CREATED 事件（单事务）
    ///
    /// # 参数
    /// - record: 待插入记录（id 忽略）
    /// - event: 历史事件（enrollment_id 由本方法回填）
    ///
    /// # 返回
    /// - Ok(EnrollmentRecord): 带主键的记录
    pub fn create_with_event(
        &self,
        record: &EnrollmentRecord,
        mut event: EnrollmentHistoryEvent,
    ) -> RepositoryResult<EnrollmentRecord> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO enrollment (
                training_course_id, course_pk, section_pk, student_id, eligible_terms,
                created_date, provisioned_date, deleted_date, priority, queue_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.training_course_id,
                record.course_pk,
                record.section_pk,
                record.student_id.as_str(),
                serde_json::to_string(&record.eligible_terms)?,
                record.created_date,
                record.provisioned_date,
                record.deleted_date,
                record.priority.as_i64(),
                record.queue_id,
            ],
        )?;
        let id = tx.last_insert_rowid();

        event.enrollment_id = id;
        insert_event(&tx, &event)?;

        tx.commit()?;

        let mut created = record.clone();
        created.id = id;
        Ok(created)
    }

    /// 保存记录的可变字段，并可选追加一条历史事件（单事务）
    pub fn save_with_event(
        &self,
        record: &EnrollmentRecord,
        event: Option<&EnrollmentHistoryEvent>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            r#"
            UPDATE enrollment SET
                course_pk = ?2, section_pk = ?3, eligible_terms = ?4,
                provisioned_date = ?5, deleted_date = ?6, priority = ?7
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.course_pk,
                record.section_pk,
                serde_json::to_string(&record.eligible_terms)?,
                record.provisioned_date,
                record.deleted_date,
                record.priority.as_i64(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Enrollment", record.id));
        }

        if let Some(ev) = event {
            insert_event(&tx, ev)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 设置优先级（失败重试等场景）
    pub fn set_priority(&self, id: i64, priority: Priority) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE enrollment SET priority = ?2 WHERE id = ?1",
            params![id, priority.as_i64()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Enrollment", id));
        }
        Ok(())
    }
}

pub(crate) fn map_enrollment_row(row: &Row) -> rusqlite::Result<EnrollmentRecord> {
    let student_raw: String = row.get(4)?;
    let student_id = StudentId::new(&student_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let terms_raw: String = row.get(5)?;
    let eligible_terms = serde_json::from_str(&terms_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(EnrollmentRecord {
        id: row.get(0)?,
        training_course_id: row.get(1)?,
        course_pk: row.get(2)?,
        section_pk: row.get(3)?,
        student_id,
        eligible_terms,
        created_date: row.get(6)?,
        provisioned_date: row.get(7)?,
        deleted_date: row.get(8)?,
        priority: Priority::from_i64(row.get(9)?),
        queue_id: row.get(10)?,
    })
}
