// ==========================================
// 培训课程选课供给系统 - 培训课程定义仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 软删除: set_deleted_date；硬删除: purge（外键级联）
// ==========================================

use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{CourseStatus, CourseType, MembershipType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    id, course_name, blueprint_course_id, term_id, account_id,
    membership_type, course_type, course_status, course_count, section_count,
    is_provisioned, creation_date, deleted_date
"#;

pub struct TrainingCourseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TrainingCourseRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    /// 插入培训课程定义
    ///
    /// # 返回
    /// - Ok(i64): 新记录主键
    /// - Err(Duplicate): (blueprint_course_id, term_id) 已存在
    pub fn insert(&self, tc: &TrainingCourse) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO training_course (
                course_name, blueprint_course_id, term_id, account_id,
                membership_type, course_type, course_status, course_count, section_count,
                is_provisioned, creation_date, deleted_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                tc.course_name,
                tc.blueprint_course_id,
                tc.term_id,
                tc.account_id,
                tc.membership_type.as_i64(),
                tc.course_type.as_str(),
                tc.course_status.as_i64(),
                tc.course_count,
                tc.section_count,
                tc.is_provisioned,
                tc.creation_date,
                tc.deleted_date,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新可配置字段（按主键）
    pub fn update(&self, tc: &TrainingCourse) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE training_course SET
                course_name = ?2, account_id = ?3, membership_type = ?4, course_type = ?5,
                course_status = ?6, course_count = ?7, section_count = ?8,
                is_provisioned = ?9, deleted_date = ?10
            WHERE id = ?1
            "#,
            params![
                tc.id,
                tc.course_name,
                tc.account_id,
                tc.membership_type.as_i64(),
                tc.course_type.as_str(),
                tc.course_status.as_i64(),
                tc.course_count,
                tc.section_count,
                tc.is_provisioned,
                tc.deleted_date,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("TrainingCourse", tc.id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<TrainingCourse>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM training_course WHERE id = ?1", SELECT_COLUMNS);
        conn.query_row(&sql, params![id], map_row)
            .optional()
            .map_err(|e| e.into())
    }

    /// 按业务键 (blueprint_course_id, term_id) 查询
    pub fn find_by_key(
        &self,
        blueprint_course_id: &str,
        term_id: &str,
    ) -> RepositoryResult<Option<TrainingCourse>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM training_course WHERE blueprint_course_id = ?1 AND term_id = ?2",
            SELECT_COLUMNS
        );
        conn.query_row(&sql, params![blueprint_course_id, term_id], map_row)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<TrainingCourse>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM training_course ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 已开通且未软删除的培训课程（学年排序由引擎层负责）
    pub fn list_active(&self) -> RepositoryResult<Vec<TrainingCourse>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM training_course WHERE is_provisioned = 1 AND deleted_date IS NULL ORDER BY term_id, id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 设置/清除软删除时间
    pub fn set_deleted_date(
        &self,
        id: i64,
        deleted_date: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE training_course SET deleted_date = ?2 WHERE id = ?1",
            params![id, deleted_date],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("TrainingCourse", id));
        }
        Ok(())
    }

    /// 硬删除（课程副本/分班/选课/历史由外键级联删除）
    ///
    /// # 返回
    /// - Ok(usize): 级联删除的选课记录数
    pub fn purge(&self, id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let enrollment_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM enrollment WHERE training_course_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        let affected = tx.execute("DELETE FROM training_course WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("TrainingCourse", id));
        }

        tx.commit()?;
        Ok(enrollment_count as usize)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<TrainingCourse> {
    let membership_raw: i64 = row.get(5)?;
    let membership_type = MembershipType::from_i64(membership_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Integer,
            format!("unknown membership_type {}", membership_raw).into(),
        )
    })?;

    Ok(TrainingCourse {
        id: row.get(0)?,
        course_name: row.get(1)?,
        blueprint_course_id: row.get(2)?,
        term_id: row.get(3)?,
        account_id: row.get(4)?,
        membership_type,
        course_type: CourseType::from_str(&row.get::<_, String>(6)?),
        course_status: CourseStatus::from_i64(row.get(7)?),
        course_count: row.get(8)?,
        section_count: row.get(9)?,
        is_provisioned: row.get(10)?,
        creation_date: row.get(11)?,
        deleted_date: row.get(12)?,
    })
}
