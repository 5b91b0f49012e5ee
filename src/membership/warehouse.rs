// ==========================================
// 培训课程选课供给系统 - 数据仓库端口
// ==========================================
// 职责: 定义数据仓库查询接口（参数化查询文本 → 行集合）
// 红线: 核心逻辑只依赖列名访问与行遍历，不依赖具体客户端
// ==========================================

use crate::membership::error::MembershipError;
use crate::membership::queries::QueryKind;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// 仓库返回的一行数据（列名 → 单元格）
pub type WarehouseRow = BTreeMap<String, JsonValue>;

/// 数据仓库访问错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarehouseError {
    #[error("查询文本为空")]
    EmptyQuery,

    #[error("数据仓库不可达: {0}")]
    Unavailable(String),

    #[error("查询执行失败: {0}")]
    QueryFailed(String),
}

// ==========================================
// Warehouse Trait
// ==========================================
// 实现者: FileWarehouse（本地开发）；测试中为 FakeWarehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// 执行查询并返回全部行
    async fn execute_query(&self, query: &str) -> Result<Vec<WarehouseRow>, WarehouseError>;
}

/// 带超时的查询执行
///
/// # 参数
/// - warehouse: 仓库实现
/// - query: 查询文本
/// - kind: 查询类别（用于日志与超时错误）
/// - timeout: 超时时间
///
/// # 返回
/// - Err(MembershipError::Timeout): 超时（不在内部重试，交由调度方处理）
pub async fn execute_with_timeout(
    warehouse: &dyn Warehouse,
    query: &str,
    kind: QueryKind,
    timeout: Duration,
) -> Result<Vec<WarehouseRow>, MembershipError> {
    if query.trim().is_empty() {
        return Err(MembershipError::Warehouse(WarehouseError::EmptyQuery));
    }

    tracing::debug!(query_kind = kind.as_str(), "执行数据仓库查询");
    let started = std::time::Instant::now();

    match tokio::time::timeout(timeout, warehouse.execute_query(query)).await {
        Ok(Ok(rows)) => {
            tracing::debug!(
                query_kind = kind.as_str(),
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "数据仓库查询完成"
            );
            Ok(rows)
        }
        Ok(Err(e)) => {
            tracing::error!(query_kind = kind.as_str(), error = %e, "数据仓库查询失败");
            Err(MembershipError::Warehouse(e))
        }
        Err(_) => {
            tracing::error!(
                query_kind = kind.as_str(),
                timeout_secs = timeout.as_secs(),
                "数据仓库查询超时"
            );
            Err(MembershipError::Timeout {
                query_kind: kind.as_str(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}
