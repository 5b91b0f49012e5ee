// ==========================================
// 培训课程选课供给系统 - 课程副本仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 优先级变更使用单条 UPDATE ... WHERE 原子完成
// ==========================================

use crate::domain::course::CourseInstance;
use crate::domain::types::Priority;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub(crate) const COURSE_COLUMNS: &str = r#"
    c.id, c.training_course_id, c.course_id, c.course_ordinal, c.created_date,
    c.provisioned_date, c.provisioned_error, c.provisioned_status, c.deleted_date,
    c.priority, c.queue_id
"#;

pub struct CourseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CourseRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    /// 插入课程副本
    ///
    /// # 返回
    /// - Ok(i64): 新记录主键
    pub fn insert(&self, course: &CourseInstance) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO course (
                training_course_id, course_id, course_ordinal, created_date,
                provisioned_date, provisioned_error, provisioned_status, deleted_date,
                priority, queue_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                course.training_course_id,
                course.course_id,
                course.course_ordinal,
                course.created_date,
                course.provisioned_date,
                course.provisioned_error,
                course.provisioned_status,
                course.deleted_date,
                course.priority.as_i64(),
                course.queue_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<CourseInstance>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM course c WHERE c.id = ?1", COURSE_COLUMNS);
        conn.query_row(&sql, params![id], map_course_row)
            .optional()
            .map_err(|e| e.into())
    }

    /// 按课程 ID 字符串查询
    pub fn find_by_course_id(&self, course_id: &str) -> RepositoryResult<Option<CourseInstance>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM course c WHERE c.course_id = ?1", COURSE_COLUMNS);
        conn.query_row(&sql, params![course_id], map_course_row)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn list_by_training_course(
        &self,
        training_course_id: i64,
    ) -> RepositoryResult<Vec<CourseInstance>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM course c WHERE c.training_course_id = ?1 ORDER BY c.course_ordinal",
            COURSE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![training_course_id], map_course_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 触发导出: priority 为 none 时提升到 default
    ///
    /// # 返回
    /// - Ok(true): 优先级被提升
    /// - Ok(false): 已处于更高优先级（不重复提升）
    pub fn trigger_if_idle(&self, id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE course SET priority = ?2 WHERE id = ?1 AND priority = ?3",
            params![id, Priority::Default.as_i64(), Priority::None.as_i64()],
        )?;
        Ok(affected > 0)
    }

    /// 将培训课程下全部未删除副本的优先级提升到 target（只升不降）
    ///
    /// # 返回
    /// - Ok(usize): 被提升的副本数
    pub fn raise_for_training_course(
        &self,
        training_course_id: i64,
        target: Priority,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE course SET priority = ?2
            WHERE training_course_id = ?1 AND deleted_date IS NULL AND priority < ?2
            "#,
            params![training_course_id, target.as_i64()],
        )?;
        Ok(affected)
    }

    /// 直接设置优先级
    pub fn set_priority(&self, id: i64, priority: Priority) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE course SET priority = ?2 WHERE id = ?1",
            params![id, priority.as_i64()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Course", id));
        }
        Ok(())
    }

    /// 记录/清除开通错误（存在错误的副本不参与排队）
    pub fn set_provisioned_error(
        &self,
        id: i64,
        error: Option<bool>,
        status: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE course SET provisioned_error = ?2, provisioned_status = ?3 WHERE id = ?1",
            params![id, error, status],
        )?;
        Ok(())
    }
}

pub(crate) fn map_course_row(row: &Row) -> rusqlite::Result<CourseInstance> {
    Ok(CourseInstance {
        id: row.get(0)?,
        training_course_id: row.get(1)?,
        course_id: row.get(2)?,
        course_ordinal: row.get(3)?,
        created_date: row.get(4)?,
        provisioned_date: row.get(5)?,
        provisioned_error: row.get(6)?,
        provisioned_status: row.get(7)?,
        deleted_date: row.get(8)?,
        priority: Priority::from_i64(row.get(9)?),
        queue_id: row.get(10)?,
    })
}
