// ==========================================
// 培训课程选课供给系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建库入口 ensure_schema（幂等）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置（含 SQL 性能追踪）
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 打开数据库、建表，并包装为共享连接
pub fn open_shared_database(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    ensure_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等），并写入 schema_version
///
/// 选课记录唯一性:
/// - (student_id, course_pk, section_pk) 唯一，section 为空时按 0 计
/// - 同一培训课程下同一学号至多一条未删除记录
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
          scope_id TEXT PRIMARY KEY,
          scope_type TEXT NOT NULL,
          scope_key TEXT NOT NULL,
          created_at TEXT NOT NULL DEFAULT (datetime('now')),
          UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now')),
          PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS training_course (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          course_name TEXT NOT NULL,
          blueprint_course_id TEXT NOT NULL,
          term_id TEXT NOT NULL,
          account_id TEXT NOT NULL,
          membership_type INTEGER NOT NULL,
          course_type TEXT NOT NULL,
          course_status INTEGER NOT NULL DEFAULT 0,
          course_count INTEGER NOT NULL DEFAULT 1 CHECK (course_count >= 1),
          section_count INTEGER NOT NULL DEFAULT 0 CHECK (section_count >= 0),
          is_provisioned INTEGER NOT NULL DEFAULT 1,
          creation_date TEXT NOT NULL,
          deleted_date TEXT,
          UNIQUE(blueprint_course_id, term_id)
        );

        CREATE TABLE IF NOT EXISTS course (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          training_course_id INTEGER NOT NULL
            REFERENCES training_course(id) ON DELETE CASCADE,
          course_id TEXT NOT NULL UNIQUE,
          course_ordinal INTEGER NOT NULL,
          created_date TEXT NOT NULL,
          provisioned_date TEXT,
          provisioned_error INTEGER,
          provisioned_status TEXT,
          deleted_date TEXT,
          priority INTEGER NOT NULL DEFAULT 1,
          queue_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_course_training_course
          ON course(training_course_id);
        CREATE INDEX IF NOT EXISTS idx_course_queue
          ON course(priority, queue_id);

        CREATE TABLE IF NOT EXISTS section (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          course_pk INTEGER NOT NULL REFERENCES course(id) ON DELETE CASCADE,
          section_id TEXT NOT NULL UNIQUE,
          section_ordinal INTEGER NOT NULL,
          created_date TEXT NOT NULL,
          provisioned_date TEXT,
          deleted_date TEXT,
          priority INTEGER NOT NULL DEFAULT 1,
          queue_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_section_course ON section(course_pk);

        CREATE TABLE IF NOT EXISTS enrollment (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          training_course_id INTEGER NOT NULL
            REFERENCES training_course(id) ON DELETE CASCADE,
          course_pk INTEGER NOT NULL REFERENCES course(id) ON DELETE CASCADE,
          section_pk INTEGER REFERENCES section(id) ON DELETE CASCADE,
          student_id TEXT NOT NULL,
          eligible_terms TEXT NOT NULL DEFAULT '[]',
          created_date TEXT NOT NULL,
          provisioned_date TEXT,
          deleted_date TEXT,
          priority INTEGER NOT NULL DEFAULT 1,
          queue_id TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_enrollment_student_course_section
          ON enrollment(student_id, course_pk, COALESCE(section_pk, 0));
        CREATE UNIQUE INDEX IF NOT EXISTS uq_enrollment_active_per_training_course
          ON enrollment(training_course_id, student_id) WHERE deleted_date IS NULL;
        CREATE INDEX IF NOT EXISTS idx_enrollment_student ON enrollment(student_id);
        CREATE INDEX IF NOT EXISTS idx_enrollment_course ON enrollment(course_pk);
        CREATE INDEX IF NOT EXISTS idx_enrollment_queue ON enrollment(queue_id);

        CREATE TABLE IF NOT EXISTS enrollment_history (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          enrollment_id INTEGER NOT NULL REFERENCES enrollment(id) ON DELETE CASCADE,
          event_type TEXT NOT NULL,
          student_id TEXT NOT NULL,
          course_id TEXT NOT NULL,
          section_id TEXT,
          eligible_terms TEXT NOT NULL DEFAULT '[]',
          previous_eligible_terms TEXT,
          note TEXT,
          timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_enrollment
          ON enrollment_history(enrollment_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_history_student
          ON enrollment_history(student_id, timestamp DESC);

        CREATE TABLE IF NOT EXISTS export_batch (
          batch_id TEXT PRIMARY KEY,
          priority INTEGER NOT NULL,
          status TEXT NOT NULL DEFAULT 'PENDING',
          remote_import_id TEXT,
          progress INTEGER,
          workflow_state TEXT,
          warnings TEXT,
          errors TEXT,
          csv_errors TEXT,
          error_message TEXT,
          created_at TEXT NOT NULL,
          submitted_at TEXT,
          completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_export_batch_status
          ON export_batch(status, created_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
