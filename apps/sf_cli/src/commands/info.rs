// apps/sf_cli/src/commands/info.rs

//! 查看网格信息命令

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use sf_io::plot3d_io::read_grid;

/// 网格信息参数
#[derive(Args)]
pub struct InfoArgs {
    /// 网格文件路径 (.xyz)
    pub grid: PathBuf,
}

pub fn execute(args: InfoArgs) -> Result<()> {
    let blocks = read_grid(&args.grid, 1.0)
        .with_context(|| format!("读取网格 {}", args.grid.display()))?;

    let mut total_cells = 0usize;
    for (bb, nb) in blocks.iter().enumerate() {
        info!(
            "块 {:>3}: {} x {} x {} 单元 ({} 节点)",
            bb,
            nb.num_cells_i(),
            nb.num_cells_j(),
            nb.num_cells_k(),
            nb.num_nodes_i() * nb.num_nodes_j() * nb.num_nodes_k()
        );
        total_cells += nb.num_cells();
    }
    info!(blocks = blocks.len(), cells = total_cells, "网格统计");
    Ok(())
}
