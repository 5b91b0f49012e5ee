// ==========================================
// 培训课程选课供给系统 - 作业耗时与 SQL 统计
// ==========================================
// 开关:
// - TRAINING_PROVISIONER_PERF_SQL: 是否统计 SQL（Debug 默认开）
// - TRAINING_PROVISIONER_SLOW_SQL_MS: 慢语句阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const ENV_PERF_SQL: &str = "TRAINING_PROVISIONER_PERF_SQL";
const ENV_SLOW_SQL_MS: &str = "TRAINING_PROVISIONER_SLOW_SQL_MS";
const SQL_LOG_WIDTH: usize = 400;

// 计数器是进程级的；API 调用在共享连接的互斥锁下串行执行，
// 因此 guard 前后的差值即为该作业的语句数
static SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);
static STATEMENTS: AtomicU64 = AtomicU64::new(0);
static SLOW_STATEMENTS: AtomicU64 = AtomicU64::new(0);

/// SQL 统计设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTracing {
    pub enabled: bool,
    pub slow_threshold_ms: u64,
}

impl SqlTracing {
    /// 从环境变量读取设置；未设置时按构建类型取默认值
    pub fn from_env() -> Self {
        let enabled = std::env::var(ENV_PERF_SQL)
            .map(|v| parse_flag(&v))
            .unwrap_or(cfg!(debug_assertions));
        let slow_threshold_ms = std::env::var(ENV_SLOW_SQL_MS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_threshold_ms,
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    ["1", "true", "yes", "on"].contains(&v.as_str())
}

/// 单行化并截断 SQL，供日志输出
fn one_line_sql(sql: &str, width: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(width) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

/// 在连接上安装语句计数与慢语句日志
///
/// # 参数
/// - conn: 刚打开的 SQLite 连接
pub fn install_sqlite_tracing(conn: &mut Connection) {
    apply_sql_tracing(conn, SqlTracing::from_env());
}

/// 按给定设置安装（或卸载）回调
pub fn apply_sql_tracing(conn: &mut Connection, settings: SqlTracing) {
    SQL_ENABLED.store(settings.enabled, Ordering::Relaxed);
    SLOW_THRESHOLD_MS.store(settings.slow_threshold_ms, Ordering::Relaxed);

    if settings.enabled {
        conn.profile(Some(on_statement_finished));
    } else {
        conn.profile(None);
    }
}

fn on_statement_finished(sql: &str, took: Duration) {
    if !SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    STATEMENTS.fetch_add(1, Ordering::Relaxed);

    let ms = took.as_millis() as u64;
    let threshold = SLOW_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }
    SLOW_STATEMENTS.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        threshold_ms = threshold,
        sql = %one_line_sql(sql, SQL_LOG_WIDTH),
        "SQL 执行超过阈值"
    );
}

/// 作业性能 guard，析构时输出一条 `perf` 日志
///
/// ```ignore
/// let _perf = PerfGuard::new("api.reconcile");
/// ```
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            started: Instant::now(),
            statements_at_start: STATEMENTS.load(Ordering::Relaxed),
            slow_at_start: SLOW_STATEMENTS.load(Ordering::Relaxed),
        }
    }

    /// 已耗时（毫秒）
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// 自 guard 创建以来执行的 (语句数, 慢语句数)
    pub fn sql_counts(&self) -> (u64, u64) {
        (
            STATEMENTS
                .load(Ordering::Relaxed)
                .saturating_sub(self.statements_at_start),
            SLOW_STATEMENTS
                .load(Ordering::Relaxed)
                .saturating_sub(self.slow_at_start),
        )
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let (statements, slow_statements) = self.sql_counts();
        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.elapsed_ms(),
            statements,
            slow_statements,
            "作业结束"
        );
    }
}
