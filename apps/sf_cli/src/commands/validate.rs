// apps/sf_cli/src/commands/validate.rs

//! 校验输入文件命令

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use sf_config::parser::read_input;
use sf_io::function::validate_variables;

/// 校验参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 输入文件路径
    pub input: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let config = read_input(&args.input)
        .with_context(|| format!("读取输入 {}", args.input.display()))?;
    validate_variables(&config.output_variables, &config)?;

    info!(
        equation_set = ?config.equation_set,
        time_integration = ?config.time_integration,
        iterations = config.iterations,
        blocks = config.boundary_conditions.len(),
        species = config.num_species(),
        "输入文件有效"
    );
    Ok(())
}
