// apps/sf_cli/src/main.rs

//! StratoFlow 命令行界面
//!
//! 可压缩多块结构求解器的驱动：运行算例、校验输入、查看网格信息。
//! 任何致命错误（非物理状态、未识别的配置、文件失败、重启维度
//! 不匹配）以非零状态退出。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// StratoFlow 求解器命令行工具
#[derive(Parser)]
#[command(name = "sf_cli")]
#[command(author = "StratoFlow Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "StratoFlow compressible flow solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行求解
    Run(commands::run::RunArgs),
    /// 校验输入文件
    Validate(commands::validate::ValidateArgs),
    /// 查看网格信息
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Info(args) => commands::info::execute(args),
    }
}
