// ==========================================
// 培训课程选课供给系统 - 导出队列仓储
// ==========================================
// 覆盖 course / section / enrollment 三张表的 priority + queue_id 字段
// 红线: 排队与出队各自在单事务内完成
// 红线: 一个实体同一时刻至多属于一个未完成批次（queue_id IS NULL 才可入队）
// ==========================================

use crate::domain::course::{CourseInstance, SectionInstance};
use crate::domain::enrollment::EnrollmentRecord;
use crate::domain::export_batch::ExportBatch;
use crate::domain::types::{CourseStatus, Priority};
use crate::repository::course_repo::{map_course_row, COURSE_COLUMNS};
use crate::repository::enrollment_repo::{map_enrollment_row, ENROLLMENT_COLUMNS};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::export_batch_repo::insert_batch;
use crate::repository::section_repo::{map_section_row, SECTION_COLUMNS};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// 批次成员计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub courses: usize,
    pub sections: usize,
    pub enrollments: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.courses + self.sections + self.enrollments
    }
}

/// 批次内课程副本（附带培训课程信息）
#[derive(Debug, Clone)]
pub struct QueuedCourseRow {
    pub course: CourseInstance,
    pub course_name: String,
    pub term_id: String,
    pub account_id: String,
    pub blueprint_course_id: String,
    pub course_status: CourseStatus,
}

/// 批次内分班
#[derive(Debug, Clone)]
pub struct QueuedSectionRow {
    pub section: SectionInstance,
    pub course_id: String,
}

/// 批次内选课记录
#[derive(Debug, Clone)]
pub struct QueuedEnrollmentRow {
    pub enrollment: EnrollmentRecord,
    pub course_id: String,
    pub section_id: Option<String>,
}

pub struct ExportQueueRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExportQueueRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    /// 按优先级排队
    ///
    /// 入队范围:
    /// - priority = tier、未排队、无开通错误的课程副本
    /// - 上述副本下 priority > none 且未排队的分班与选课（级联导出）
    /// - priority = tier、未排队且所属副本无开通错误的分班与选课
    ///
    /// # 返回
    /// - Ok(Some((batch, counts))): 新建批次及成员数
    /// - Ok(None): 没有可排队实体（不创建批次）
    pub fn queue_by_priority(
        &self,
        tier: Priority,
    ) -> RepositoryResult<Option<(ExportBatch, QueueCounts)>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let batch = ExportBatch::new(tier);
        insert_batch(&tx, &batch)?;

        let courses = tx.execute(
            r#"
            UPDATE course SET queue_id = ?1
            WHERE priority = ?2 AND queue_id IS NULL AND COALESCE(provisioned_error, 0) = 0
            "#,
            params![batch.batch_id, tier.as_i64()],
        )?;

        let sections = tx.execute(
            r#"
            UPDATE section SET queue_id = ?1
            WHERE queue_id IS NULL
              AND course_pk NOT IN (SELECT id FROM course WHERE COALESCE(provisioned_error, 0) = 1)
              AND (
                priority = ?2
                OR (priority > 0 AND course_pk IN (SELECT id FROM course WHERE queue_id = ?1))
              )
            "#,
            params![batch.batch_id, tier.as_i64()],
        )?;

        let enrollments = tx.execute(
            r#"
            UPDATE enrollment SET queue_id = ?1
            WHERE queue_id IS NULL
              AND course_pk NOT IN (SELECT id FROM course WHERE COALESCE(provisioned_error, 0) = 1)
              AND (
                priority = ?2
                OR (priority > 0 AND course_pk IN (SELECT id FROM course WHERE queue_id = ?1))
              )
            "#,
            params![batch.batch_id, tier.as_i64()],
        )?;

        let counts = QueueCounts {
            courses,
            sections,
            enrollments,
        };

        if counts.total() == 0 {
            // 未提交的事务在 drop 时回滚，批次记录随之撤销
            return Ok(None);
        }

        tx.commit()?;
        Ok(Some((batch, counts)))
    }

    /// 出队
    ///
    /// - imported = true: priority > none 的成员降一级并记录开通时间
    /// - imported = false: 仅清除批次引用
    ///
    /// # 返回
    /// - Ok(QueueCounts): 释放的成员数
    pub fn dequeue(
        &self,
        batch_id: &str,
        imported: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<QueueCounts> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut released = [0usize; 3];
        for (i, table) in ["course", "section", "enrollment"].iter().enumerate() {
            if imported {
                let decremented = tx.execute(
                    &format!(
                        r#"
                        UPDATE {} SET
                            priority = priority - 1,
                            provisioned_date = COALESCE(provisioned_date, ?2),
                            queue_id = NULL
                        WHERE queue_id = ?1 AND priority > 0
                        "#,
                        table
                    ),
                    params![batch_id, now],
                )?;
                released[i] += decremented;
            }
            let cleared = tx.execute(
                &format!("UPDATE {} SET queue_id = NULL WHERE queue_id = ?1", table),
                params![batch_id],
            )?;
            released[i] += cleared;
        }

        tx.commit()?;
        Ok(QueueCounts {
            courses: released[0],
            sections: released[1],
            enrollments: released[2],
        })
    }

    /// 批次当前成员数
    pub fn count_members(&self, batch_id: &str) -> RepositoryResult<QueueCounts> {
        let conn = self.get_conn()?;
        let count = |table: &str| -> RepositoryResult<usize> {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE queue_id = ?1", table),
                params![batch_id],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };
        Ok(QueueCounts {
            courses: count("course")?,
            sections: count("section")?,
            enrollments: count("enrollment")?,
        })
    }

    pub fn queued_courses(&self, batch_id: &str) -> RepositoryResult<Vec<QueuedCourseRow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, tc.course_name, tc.term_id, tc.account_id,
                   tc.blueprint_course_id, tc.course_status
            FROM course c
            JOIN training_course tc ON tc.id = c.training_course_id
            WHERE c.queue_id = ?1
            ORDER BY c.course_id
            "#,
            COURSE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_id], |row| {
                Ok(QueuedCourseRow {
                    course: map_course_row(row)?,
                    course_name: row.get(11)?,
                    term_id: row.get(12)?,
                    account_id: row.get(13)?,
                    blueprint_course_id: row.get(14)?,
                    course_status: CourseStatus::from_i64(row.get(15)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn queued_sections(&self, batch_id: &str) -> RepositoryResult<Vec<QueuedSectionRow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, c.course_id
            FROM section s
            JOIN course c ON c.id = s.course_pk
            WHERE s.queue_id = ?1
            ORDER BY s.section_id
            "#,
            SECTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_id], |row| {
                Ok(QueuedSectionRow {
                    section: map_section_row(row)?,
                    course_id: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn queued_enrollments(&self, batch_id: &str) -> RepositoryResult<Vec<QueuedEnrollmentRow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, c.course_id, s.section_id
            FROM enrollment e
            JOIN course c ON c.id = e.course_pk
            LEFT JOIN section s ON s.id = e.section_pk
            WHERE e.queue_id = ?1
            ORDER BY c.course_id, e.student_id
            "#,
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_id], |row| {
                Ok(QueuedEnrollmentRow {
                    enrollment: map_enrollment_row(row)?,
                    course_id: row.get(11)?,
                    section_id: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
