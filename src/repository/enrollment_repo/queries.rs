use super::core::{map_enrollment_row, EnrollmentRepository, ENROLLMENT_COLUMNS};
use crate::domain::enrollment::{EnrollmentDetail, EnrollmentRecord, PriorEnrollment};
use crate::domain::ids::StudentId;
use crate::domain::types::CourseType;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeSet;

impl EnrollmentRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<EnrollmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM enrollment e WHERE e.id = ?1", ENROLLMENT_COLUMNS);
        conn.query_row(&sql, params![id], map_enrollment_row)
            .optional()
            .map_err(|e| e.into())
    }

    /// 学号在培训课程下的全部记录（未删除优先，其次按最近创建）
    pub fn list_for_student_in_training_course(
        &self,
        training_course_id: i64,
        student_id: &StudentId,
    ) -> RepositoryResult<Vec<EnrollmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM enrollment e
            WHERE e.training_course_id = ?1 AND e.student_id = ?2
            ORDER BY (e.deleted_date IS NULL) DESC, e.id DESC
            "#,
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![training_course_id, student_id.as_str()], map_enrollment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 按 (学号, 课程副本, 分班) 精确查询
    pub fn find_by_placement(
        &self,
        student_id: &StudentId,
        course_pk: i64,
        section_pk: Option<i64>,
    ) -> RepositoryResult<Option<EnrollmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM enrollment e
            WHERE e.student_id = ?1 AND e.course_pk = ?2
              AND COALESCE(e.section_pk, 0) = COALESCE(?3, 0)
            "#,
            ENROLLMENT_COLUMNS
        );
        conn.query_row(&sql, params![student_id.as_str(), course_pk, section_pk], map_enrollment_row)
            .optional()
            .map_err(|e| e.into())
    }

    /// 培训课程下出现过的全部学号（含已软删除）
    pub fn student_ids_for_training_course(
        &self,
        training_course_id: i64,
    ) -> RepositoryResult<BTreeSet<StudentId>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT student_id FROM enrollment WHERE training_course_id = ?1",
        )?;
        let raw = stmt
            .query_map(params![training_course_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(raw.into_iter().filter_map(|s| StudentId::new(s).ok()).collect())
    }

    /// 培训课程下未删除记录数
    pub fn count_active_for_training_course(&self, training_course_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM enrollment WHERE training_course_id = ?1 AND deleted_date IS NULL",
            params![training_course_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// 指定培训课程以外的全部选课行（含课程学年与类型）
    pub fn prior_enrollments_excluding(
        &self,
        training_course_id: i64,
    ) -> RepositoryResult<Vec<PriorEnrollment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT e.student_id, e.training_course_id, tc.term_id, tc.course_type, e.deleted_date
            FROM enrollment e
            JOIN training_course tc ON tc.id = e.training_course_id
            WHERE e.training_course_id != ?1
            ORDER BY e.student_id, e.id
            "#,
        )?;
        let rows = stmt
            .query_map(params![training_course_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<DateTime<Utc>>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(student, tc_id, term_id, course_type, deleted_date)| {
                Some(PriorEnrollment {
                    student_id: StudentId::new(student).ok()?,
                    training_course_id: tc_id,
                    term_id,
                    course_type: CourseType::from_str(&course_type),
                    deleted_date,
                })
            })
            .collect())
    }

    /// 学号的全部选课明细（含课程/分班 ID）
    pub fn details_for_student(&self, student_id: &StudentId) -> RepositoryResult<Vec<EnrollmentDetail>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, c.course_id, s.section_id, tc.course_name, tc.term_id
            FROM enrollment e
            JOIN course c ON c.id = e.course_pk
            LEFT JOIN section s ON s.id = e.section_pk
            JOIN training_course tc ON tc.id = e.training_course_id
            WHERE e.student_id = ?1
            ORDER BY tc.term_id, e.id
            "#,
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![student_id.as_str()], |row| {
                let enrollment = map_enrollment_row(row)?;
                Ok(EnrollmentDetail {
                    training_course_id: enrollment.training_course_id,
                    enrollment,
                    course_id: row.get(11)?,
                    section_id: row.get(12)?,
                    course_name: row.get(13)?,
                    term_id: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 按课程 ID 字符串与学号查询未删除记录
    pub fn find_active_by_course_id(
        &self,
        course_id: &str,
        student_id: &StudentId,
    ) -> RepositoryResult<Option<EnrollmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM enrollment e
            JOIN course c ON c.id = e.course_pk
            WHERE c.course_id = ?1 AND e.student_id = ?2 AND e.deleted_date IS NULL
            "#,
            ENROLLMENT_COLUMNS
        );
        conn.query_row(&sql, params![course_id, student_id.as_str()], map_enrollment_row)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn list_by_course(&self, course_pk: i64) -> RepositoryResult<Vec<EnrollmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM enrollment e WHERE e.course_pk = ?1 ORDER BY e.id",
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![course_pk], map_enrollment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 全部选课记录（历史审计使用）
    pub fn list_all(&self) -> RepositoryResult<Vec<EnrollmentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM enrollment e ORDER BY e.id", ENROLLMENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_enrollment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 选课记录对应的 (课程 ID, 分班 ID) 字符串
    pub fn placement_ids(&self, enrollment_id: i64) -> RepositoryResult<Option<(String, Option<String>)>> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"
            SELECT c.course_id, s.section_id
            FROM enrollment e
            JOIN course c ON c.id = e.course_pk
            LEFT JOIN section s ON s.id = e.section_pk
            WHERE e.id = ?1
            "#,
            params![enrollment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| e.into())
    }
}
