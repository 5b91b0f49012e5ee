// ==========================================
// 培训课程选课供给系统 - 仓储层错误类型
// ==========================================

use thiserror::Error;

/// 仓储层错误
///
/// SQLite 扩展错误码按约束类别归类，其余语句错误统一落入 `Sqlite`。
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{entity} 不存在: {id}")]
    NotFound { entity: String, id: String },

    #[error("共享连接锁已中毒: {0}")]
    LockPoisoned(String),

    /// 违反 UNIQUE / PRIMARY KEY（例如同一学生在同一课程下重复选课）
    #[error("重复记录: {0}")]
    Duplicate(String),

    /// 违反 FOREIGN KEY（例如选课指向已删除的课程）
    #[error("引用的记录不存在: {0}")]
    DanglingReference(String),

    #[error("{column} 列无法解析: {message}")]
    Decode { column: String, message: String },

    #[error("SQLite 错误: {0}")]
    Sqlite(String),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::not_found("row", "?"),
            rusqlite::Error::SqliteFailure(code, msg) if code.code == ErrorCode::ConstraintViolation => {
                let detail = msg.unwrap_or_else(|| code.to_string());
                match code.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        RepositoryError::DanglingReference(detail)
                    }
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        RepositoryError::Duplicate(detail)
                    }
                    _ => RepositoryError::Sqlite(detail),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(idx, _, cause) => RepositoryError::Decode {
                column: format!("#{}", idx),
                message: cause.to_string(),
            },
            other => RepositoryError::Sqlite(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Decode {
            column: "json".to_string(),
            message: err.to_string(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn constraint_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER NOT NULL REFERENCES parent(id),
                 code TEXT UNIQUE
             );
             INSERT INTO parent (id) VALUES (1);
             INSERT INTO child (id, parent_id, code) VALUES (1, 1, 'a');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate() {
        let conn = constraint_db();
        let err: RepositoryError = conn
            .execute("INSERT INTO child (parent_id, code) VALUES (1, 'a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[test]
    fn test_foreign_key_violation_maps_to_dangling_reference() {
        let conn = constraint_db();
        let err: RepositoryError = conn
            .execute("INSERT INTO child (parent_id, code) VALUES (9, 'b')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::DanglingReference(_)));
    }
}
