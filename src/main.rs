// ==========================================
// 培训课程选课供给系统 - 命令行入口
// ==========================================
// 用途: 定时任务驱动 / 运维操作
// 数据仓库: 本地预置文件（TRAINING_PROVISIONER_WAREHOUSE_FILE）
// LMS 客户端由宿主部署注入；命令行进程内未配置
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use training_provisioner::app::{get_default_db_path, AppState, DB_PATH_ENV, WAREHOUSE_FILE_ENV};
use training_provisioner::membership::FileWarehouse;

#[derive(Parser)]
#[command(name = "training-provisioner")]
#[command(about = "培训课程选课供给：对账、排队导出与导入轮询", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite 数据库文件（缺省时取用户数据目录）
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<String>,

    /// 本地预置的数据仓库文件
    #[arg(long, global = true, env = WAREHOUSE_FILE_ENV, default_value = "warehouse.json")]
    warehouse_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Tier {
    Default,
    High,
    Immediate,
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Tier::Default => "default",
            Tier::High => "high",
            Tier::Immediate => "immediate",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 开通并对账全部在用培训课程
    Load,

    /// 对账单个培训课程定义
    Reconcile { training_course_id: i64 },

    /// 从 CSV 导入培训课程定义
    Import { csv: PathBuf },

    /// 按优先级排队，生成导出批次
    Queue {
        #[arg(value_enum)]
        tier: Tier,
    },

    /// 释放批次成员
    Dequeue {
        batch_id: String,

        /// 成员已成功导入（下调优先级并记录开通时间）
        #[arg(long)]
        imported: bool,
    },

    /// 排队并提交导出批次
    Export {
        #[arg(value_enum)]
        tier: Tier,
    },

    /// 轮询已提交的导入
    Monitor,

    /// 列出导出批次
    Batches,

    /// 删除导出批次（进行中的远端导入一并取消）
    DeleteBatch { batch_id: String },

    /// 学生的有效选课
    Enrollments { student_id: String },

    /// 学生的选课历史
    History { student_id: String },

    /// 停用培训课程定义
    Retire { training_course_id: i64 },

    /// 删除培训课程定义及其全部数据
    Purge { training_course_id: i64 },

    /// 审计选课历史
    Audit { training_course_id: Option<i64> },

    /// 补齐缺失的选课历史（默认只预览）
    Backfill {
        training_course_id: Option<i64>,

        /// 实际写入
        #[arg(long)]
        apply: bool,
    },

    /// 查看配置，或给出 KEY VALUE 修改配置
    Config {
        #[arg(requires = "value")]
        key: Option<String>,
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    training_provisioner::logging::init();
    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!(
        version = training_provisioner::VERSION,
        db_path = %db_path,
        warehouse_file = %cli.warehouse_file.display(),
        "{}",
        training_provisioner::APP_NAME
    );

    let state = AppState::new(db_path, Arc::new(FileWarehouse::new(cli.warehouse_file)), None)
        .map_err(|e| anyhow!(e))?;
    let api = &state.provisioning_api;

    match cli.command {
        Commands::Load => print_json(&api.load_active_courses().await?),
        Commands::Reconcile { training_course_id } => {
            print_json(&api.reconcile(training_course_id).await?)
        }
        Commands::Import { csv } => print_json(&api.import_courses(&csv)?),
        Commands::Queue { tier } => {
            let (batch, counts) = api.queue_by_priority(tier.as_str())?;
            print_json(&serde_json::json!({ "batch": batch, "counts": counts }))
        }
        Commands::Dequeue { batch_id, imported } => print_json(&api.dequeue(&batch_id, imported)?),
        Commands::Export { tier } => print_json(&api.export_batch(tier.as_str()).await?),
        Commands::Monitor => print_json(&api.monitor_imports().await?),
        Commands::Batches => print_json(&api.list_batches()?),
        Commands::DeleteBatch { batch_id } => Ok(api.delete_batch(&batch_id).await?),
        Commands::Enrollments { student_id } => {
            print_json(&api.enrollments_for_student(&student_id)?)
        }
        Commands::History { student_id } => print_json(&api.history_for_student(&student_id)?),
        Commands::Retire { training_course_id } => Ok(api.retire(training_course_id)?),
        Commands::Purge { training_course_id } => print_json(&api.purge(training_course_id)?),
        Commands::Audit { training_course_id } => {
            print_json(&api.audit_enrollment_history(training_course_id)?)
        }
        Commands::Backfill {
            training_course_id,
            apply,
        } => print_json(&api.backfill_enrollment_history(training_course_id, !apply)?),
        Commands::Config { key, value } => match (key, value) {
            (Some(key), Some(value)) => Ok(state.config_api.update_config(&key, &value)?),
            _ => print_json(&state.config_api.list_configs()?),
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["training-provisioner", "--db", "x.db", "export", "high"]).unwrap();
        assert_eq!(cli.db.as_deref(), Some("x.db"));
        assert!(matches!(cli.command, Commands::Export { tier: Tier::High }));

        let cli = Cli::try_parse_from(["training-provisioner", "backfill", "7", "--apply"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Backfill { training_course_id: Some(7), apply: true }
        ));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["training-provisioner", "queue", "urgent"]).is_err());
        assert!(Cli::try_parse_from(["training-provisioner", "reconcile", "abc"]).is_err());
        assert!(Cli::try_parse_from(["training-provisioner", "config", "lms.timeout_secs"]).is_err());
    }
}
