// ==========================================
// 培训课程选课供给系统 - 导出批次仓储
// ==========================================
// 状态机校验在引擎层，本仓储只做持久化
// ==========================================

use crate::domain::export_batch::ExportBatch;
use crate::domain::types::{ImportStatus, Priority};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};

const BATCH_COLUMNS: &str = r#"
    batch_id, priority, status, remote_import_id, progress, workflow_state,
    warnings, errors, csv_errors, error_message, created_at, submitted_at, completed_at
"#;

/// 插入批次（供排队事务内复用）
pub(crate) fn insert_batch(conn: &Connection, batch: &ExportBatch) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO export_batch (
            batch_id, priority, status, remote_import_id, progress, workflow_state,
            warnings, errors, csv_errors, error_message, created_at, submitted_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        params![
            batch.batch_id,
            batch.priority.as_i64(),
            batch.status.as_str(),
            batch.remote_import_id,
            batch.progress,
            batch.workflow_state,
            json_to_text(&batch.warnings)?,
            json_to_text(&batch.errors)?,
            batch.csv_errors,
            batch.error_message,
            batch.created_at,
            batch.submitted_at,
            batch.completed_at,
        ],
    )?;
    Ok(())
}

fn json_to_text(value: &Option<JsonValue>) -> RepositoryResult<Option<String>> {
    match value {
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
        None => Ok(None),
    }
}

pub struct ExportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExportBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    pub fn insert(&self, batch: &ExportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_batch(&conn, batch)
    }

    /// 保存批次全部可变字段
    pub fn update(&self, batch: &ExportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE export_batch SET
                status = ?2, remote_import_id = ?3, progress = ?4, workflow_state = ?5,
                warnings = ?6, errors = ?7, csv_errors = ?8, error_message = ?9,
                submitted_at = ?10, completed_at = ?11
            WHERE batch_id = ?1
            "#,
            params![
                batch.batch_id,
                batch.status.as_str(),
                batch.remote_import_id,
                batch.progress,
                batch.workflow_state,
                json_to_text(&batch.warnings)?,
                json_to_text(&batch.errors)?,
                batch.csv_errors,
                batch.error_message,
                batch.submitted_at,
                batch.completed_at,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ExportBatch", &batch.batch_id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ExportBatch>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM export_batch WHERE batch_id = ?1", BATCH_COLUMNS);
        conn.query_row(&sql, params![batch_id], map_batch_row)
            .optional()
            .map_err(|e| e.into())
    }

    /// 全部批次（按创建时间倒序）
    pub fn list_all(&self) -> RepositoryResult<Vec<ExportBatch>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM export_batch ORDER BY created_at DESC", BATCH_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_batch_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_by_status(&self, status: ImportStatus) -> RepositoryResult<Vec<ExportBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM export_batch WHERE status = ?1 ORDER BY created_at",
            BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.as_str()], map_batch_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 删除批次记录
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 批次不存在
    pub fn delete(&self, batch_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM export_batch WHERE batch_id = ?1", params![batch_id])?;
        Ok(affected > 0)
    }
}

fn map_batch_row(row: &Row) -> rusqlite::Result<ExportBatch> {
    let parse_json = |idx: usize| -> rusqlite::Result<Option<JsonValue>> {
        match row.get::<_, Option<String>>(idx)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            }),
            None => Ok(None),
        }
    };

    Ok(ExportBatch {
        batch_id: row.get(0)?,
        priority: Priority::from_i64(row.get(1)?),
        status: ImportStatus::from_str(&row.get::<_, String>(2)?),
        remote_import_id: row.get(3)?,
        progress: row.get(4)?,
        workflow_state: row.get(5)?,
        warnings: parse_json(6)?,
        errors: parse_json(7)?,
        csv_errors: row.get(8)?,
        error_message: row.get(9)?,
        created_at: row.get(10)?,
        submitted_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}
