// apps/sf_cli/src/commands/run.rs

//! 运行求解命令
//!
//! 读取输入与网格、构建网格级（含可选的两层多重网格）、时间推进，
//! 按配置输出函数文件、Paraview 元数据与重启文件。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use sf_config::parser::read_input;
use sf_io::function::{write_fun_file, OutputLocation};
use sf_io::meta::write_meta;
use sf_io::plot3d_io::read_grid;
use sf_io::restart::{read_restart, write_restart};
use sf_physics::multigrid::{coarsen, iterate_with_mg, MgMaps};
use sf_physics::parallel::Decomposition;
use sf_physics::{GridLevel, Physics, ResidL2, ResidLinf};

/// 运行求解参数
#[derive(Args)]
pub struct RunArgs {
    /// 输入文件路径
    pub input: PathBuf,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let start = Instant::now();

    let config = read_input(&args.input)
        .with_context(|| format!("读取输入 {}", args.input.display()))?;
    let phys = Physics::from_config(&config);

    let grid_path = args
        .input
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join(format!("{}.xyz", config.grid_name));
    let meshes = read_grid(&grid_path, phys.scales.l_ref)
        .with_context(|| format!("读取网格 {}", grid_path.display()))?;
    info!(blocks = meshes.len(), "网格已读取");

    let decomp = Decomposition::single(meshes.len());
    let mut level = GridLevel::new(meshes, &config, &phys, decomp)?;

    // 重启
    let mut start_iteration = 0usize;
    let mut resid_norm: Option<Vec<f64>> = None;
    if !config.restart_name.is_empty() {
        let restart_path = args
            .input
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join(&config.restart_name);
        let header = read_restart(&restart_path, level.blocks_mut(), &phys, &config)
            .with_context(|| format!("读取重启 {}", restart_path.display()))?;
        start_iteration = header.iteration;
        resid_norm = Some(header.residual_norm);
        info!(iteration = start_iteration, "从重启文件继续");
    }

    // 两层多重网格
    let mut mg: Option<(GridLevel, MgMaps)> = if config.mg_levels == 2 && config.is_implicit() {
        let (coarse, maps) = coarsen(&level, &config, &phys)?;
        info!("两层多重网格已建立");
        Some((coarse, maps))
    } else {
        None
    };

    std::fs::create_dir_all(&args.output)?;
    let mut output_iters: Vec<usize> = Vec::new();
    let mut norms = ResidL2::new(config.num_equations());
    if let Some(norm) = resid_norm {
        norms.restore_normalization(norm);
    }

    info!(
        iterations = config.iterations,
        equations = config.num_equations(),
        "开始时间推进"
    );

    for iteration in start_iteration..start_iteration + config.iterations {
        let (mut l2, linf) = match &mut mg {
            Some((coarse, maps)) => {
                iterate_with_mg(&mut level, coarse, maps, &config, &phys, iteration)?
            }
            None => level.iterate(&config, &phys, iteration)?,
        };

        if let Some(norm) = norms.normalization() {
            l2.restore_normalization(norm.to_vec());
        } else {
            l2.set_normalization(&config.floors);
            norms.restore_normalization(
                l2.normalization().expect("normalization just set").to_vec(),
            );
        }
        report_residuals(iteration, &l2, &linf);

        let iter1 = iteration + 1;
        if config.output_frequency > 0 && iter1 % config.output_frequency == 0 {
            write_outputs(&args.output, &config, &phys, &level, iter1)?;
            output_iters.push(iter1);
            for location in [OutputLocation::Node, OutputLocation::Center] {
                write_meta(
                    &args.output,
                    &config.run_name,
                    &config.grid_name,
                    &output_iters,
                    &config.output_variables,
                    location,
                )?;
            }
        }
        if config.restart_frequency > 0 && iter1 % config.restart_frequency == 0 {
            let path = args
                .output
                .join(format!("{}_{}.rst", config.run_name, iter1));
            write_restart(&path, level.blocks(), &phys, &config, iter1, &norms)?;
        }
    }

    info!(elapsed = ?start.elapsed(), "求解完成");
    Ok(())
}

fn report_residuals(iteration: usize, l2: &ResidL2, linf: &ResidLinf) {
    let values = l2.normalized();
    let joined = values
        .iter()
        .map(|v| format!("{v:>12.5e}"))
        .collect::<Vec<_>>()
        .join(" ");
    info!(
        "iter {:>7}  L2 [{}]  Linf {:.5e} @ 块 {} ({}, {}, {}) 方程 {}",
        iteration,
        joined,
        linf.value,
        linf.block,
        linf.cell.0,
        linf.cell.1,
        linf.cell.2,
        linf.equation
    );
}

fn write_outputs(
    out_dir: &std::path::Path,
    config: &sf_config::SolverConfig,
    phys: &Physics,
    level: &GridLevel,
    iteration: usize,
) -> Result<()> {
    if config.output_variables.is_empty() {
        return Ok(());
    }
    let center = out_dir.join(format!("{}_{}_center.fun", config.run_name, iteration));
    write_fun_file(
        &center,
        level.blocks(),
        phys,
        config,
        &config.output_variables,
        OutputLocation::Center,
    )?;
    let nodes = out_dir.join(format!("{}_{}.fun", config.run_name, iteration));
    write_fun_file(
        &nodes,
        level.blocks(),
        phys,
        config,
        &config.output_variables,
        OutputLocation::Node,
    )?;

    // 壁面量（存在黏性壁时）
    let wall_vars: Vec<String> = ["yplus", "shearStress", "heatFlux", "frictionVelocity"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if level.blocks().iter().any(|b| !b.walls().is_empty()) {
        let wall = out_dir.join(format!(
            "{}_{}_wall_center.fun",
            config.run_name, iteration
        ));
        write_fun_file(
            &wall,
            level.blocks(),
            phys,
            config,
            &wall_vars,
            OutputLocation::WallCenter,
        )?;
    }
    Ok(())
}
