// crates/sf_io/src/restart.rs

//! 重启文件
//!
//! `<runName>_<iter>.rst`（小端二进制）：
//! int32 解的层数（1 或 2）；int32 迭代号；int32 方程数；
//! int32 组分数；逐组分的长度前缀 UTF-8 名字；首迭代 L2 归一化
//! 残差向量；块尺寸头（含变量数）；逐块逐单元的
//! (density, vel_x, vel_y, vel_z, pressure, [tke, sdr], mf_s…)
//! 量纲值。层数为 2 时随后为守恒量时间 n−1 的第二层数据。

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use sf_config::SolverConfig;
use sf_physics::{Block, Conserved, Physics, Primitive, ResidL2};

use crate::error::IoError;

fn read_i32<R: Read>(r: &mut R) -> Result<i32, IoError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64, IoError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// 每单元重启变量数: ρ, V, P + 湍流 + 质量分数
fn num_restart_vars(phys: &Physics) -> usize {
    5 + phys.layout.num_turb() + phys.layout.num_species()
}

/// 写出重启文件
pub fn write_restart(
    path: &Path,
    blocks: &[Block],
    phys: &Physics,
    config: &SolverConfig,
    iteration: usize,
    resid_l2: &ResidL2,
) -> Result<(), IoError> {
    let mut w = BufWriter::new(File::create(path)?);
    let num_solutions: i32 = if config.is_multilevel_in_time() { 2 } else { 1 };
    let sc = &phys.scales;

    w.write_all(&num_solutions.to_le_bytes())?;
    w.write_all(&(iteration as i32).to_le_bytes())?;
    w.write_all(&(config.num_equations() as i32).to_le_bytes())?;
    w.write_all(&(config.num_species() as i32).to_le_bytes())?;
    for fluid in &config.fluids {
        let bytes = fluid.name.as_bytes();
        w.write_all(&(bytes.len() as i32).to_le_bytes())?;
        w.write_all(bytes)?;
    }

    // 首迭代归一化残差向量
    let norm = resid_l2
        .normalization()
        .map(|n| n.to_vec())
        .unwrap_or_else(|| vec![1.0; config.num_equations()]);
    for v in &norm {
        w.write_all(&v.to_le_bytes())?;
    }

    w.write_all(&(blocks.len() as i32).to_le_bytes())?;
    for block in blocks {
        let (ni, nj, nk) = block.dims();
        w.write_all(&(ni as i32).to_le_bytes())?;
        w.write_all(&(nj as i32).to_le_bytes())?;
        w.write_all(&(nk as i32).to_le_bytes())?;
        w.write_all(&(num_restart_vars(phys) as i32).to_le_bytes())?;
    }

    for block in blocks {
        for cell in block.phys_cells() {
            let prim = block.prim_at(cell.0, cell.1, cell.2);
            let mut values: Vec<f64> = vec![
                prim.rho() * sc.rho_ref,
                prim.u() * sc.a_ref,
                prim.v() * sc.a_ref,
                prim.w() * sc.a_ref,
                prim.p() * sc.p_ref,
            ];
            if phys.has_turbulence() {
                values.push(prim.tke() * sc.a_ref * sc.a_ref);
                values.push(prim.sdr() / sc.time_ref);
            }
            for s in 0..phys.layout.num_species() {
                values.push(prim.mass_fraction_n(s));
            }
            let le: Vec<f64> = values
                .iter()
                .map(|v| f64::from_bits(u64::to_le(v.to_bits())))
                .collect();
            w.write_all(bytemuck::cast_slice(&le))?;
        }
    }

    // 第二层：守恒量时间 n−1
    if num_solutions == 2 {
        for block in blocks {
            for cell in block.phys_cells() {
                for v in block.sol_nm1().cell(cell.0, cell.1, cell.2) {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
        }
    }
    w.flush()?;
    Ok(())
}

/// 读取的重启头
#[derive(Debug, Clone)]
pub struct RestartHeader {
    /// 解的层数
    pub num_solutions: usize,
    /// 写出时的迭代号
    pub iteration: usize,
    /// 归一化残差向量
    pub residual_norm: Vec<f64>,
}

/// 读取重启文件并装载到块集合
///
/// 块尺寸或方程数不匹配是致命错误；多级时间推进从单层文件重启时
/// 记一次警告并把时间 n−1 别名到时间 n。
pub fn read_restart(
    path: &Path,
    blocks: &mut [Block],
    phys: &Physics,
    config: &SolverConfig,
) -> Result<RestartHeader, IoError> {
    let mut r = BufReader::new(File::open(path)?);
    let sc = &phys.scales;

    let num_solutions = read_i32(&mut r)?;
    if num_solutions != 1 && num_solutions != 2 {
        return Err(IoError::Format(format!("非法解层数 {num_solutions}")));
    }
    let iteration = read_i32(&mut r)? as usize;

    let num_eq = read_i32(&mut r)? as usize;
    if num_eq != config.num_equations() {
        return Err(IoError::RestartMismatch(format!(
            "方程数 {num_eq} != {}",
            config.num_equations()
        )));
    }
    let num_species = read_i32(&mut r)? as usize;
    if num_species != config.num_species() {
        return Err(IoError::RestartMismatch(format!(
            "组分数 {num_species} != {}",
            config.num_species()
        )));
    }
    for fluid in &config.fluids {
        let len = read_i32(&mut r)? as usize;
        let mut bytes = vec![0u8; len];
        r.read_exact(&mut bytes)?;
        let name = String::from_utf8(bytes)
            .map_err(|_| IoError::Format("组分名不是合法 UTF-8".to_string()))?;
        if name != fluid.name {
            return Err(IoError::RestartMismatch(format!(
                "组分 '{name}' != '{}'",
                fluid.name
            )));
        }
    }

    let mut residual_norm = Vec::with_capacity(num_eq);
    for _ in 0..num_eq {
        residual_norm.push(read_f64(&mut r)?);
    }

    let num_blocks = read_i32(&mut r)? as usize;
    if num_blocks != blocks.len() {
        return Err(IoError::RestartMismatch(format!(
            "块数 {num_blocks} != {}",
            blocks.len()
        )));
    }
    let nvars = num_restart_vars(phys);
    for block in blocks.iter() {
        let ni = read_i32(&mut r)? as usize;
        let nj = read_i32(&mut r)? as usize;
        let nk = read_i32(&mut r)? as usize;
        let nv = read_i32(&mut r)? as usize;
        if (ni, nj, nk) != block.dims() {
            return Err(IoError::RestartMismatch(format!(
                "块 {} 尺寸 {ni}x{nj}x{nk} != {:?}",
                block.id(),
                block.dims()
            )));
        }
        if nv != nvars {
            return Err(IoError::RestartMismatch(format!("变量数 {nv} != {nvars}")));
        }
    }

    for block in blocks.iter_mut() {
        let num_species = phys.layout.num_species();
        for cell in block.phys_cells() {
            let mut values = Vec::with_capacity(nvars);
            for _ in 0..nvars {
                values.push(read_f64(&mut r)?);
            }
            let rho = values[0] / sc.rho_ref;
            let mut prim = Primitive::zeros(phys.layout);
            let mf = &values[values.len() - num_species..];
            for (s, y) in mf.iter().enumerate() {
                prim.as_mut_slice()[s] = rho * y;
            }
            prim.set_velocity(
                glam::DVec3::new(values[1], values[2], values[3]) / sc.a_ref,
            );
            prim.set_p(values[4] / sc.p_ref);
            if phys.has_turbulence() {
                prim.set_turb(
                    values[5] / (sc.a_ref * sc.a_ref),
                    values[6] * sc.time_ref,
                );
            }
            block.set_prim(cell.0, cell.1, cell.2, &prim);
            let cons = prim.to_conserved(phys);
            block
                .sol_n_mut()
                .insert_cell(cell.0, cell.1, cell.2, cons.as_slice());
        }
    }

    // 时间 n−1
    if num_solutions == 2 {
        for block in blocks.iter_mut() {
            for cell in block.phys_cells() {
                let mut values = Vec::with_capacity(num_eq);
                for _ in 0..num_eq {
                    values.push(read_f64(&mut r)?);
                }
                let cons = Conserved::from_slice(&values, phys.layout.num_species());
                block
                    .sol_nm1_mut()
                    .insert_cell(cell.0, cell.1, cell.2, cons.as_slice());
            }
        }
    } else {
        if config.is_multilevel_in_time() {
            tracing::warn!("重启文件只有一层解，时间 n−1 别名到时间 n");
        }
        for block in blocks.iter_mut() {
            block.assign_sol_to_time_nm1();
        }
    }

    Ok(RestartHeader {
        num_solutions: num_solutions as usize,
        iteration,
        residual_norm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use sf_config::{BcKind, EquationSet, InitialConditionSpec, SurfaceSpec};
    use sf_grid::{BlockBoundaries, NodeBlock};

    fn test_setup() -> (SolverConfig, Physics, Vec<Block>) {
        let n = 3usize;
        let spec = |i: [usize; 2], j: [usize; 2], k: [usize; 2]| SurfaceSpec {
            kind: BcKind::SlipWall,
            i_range: i,
            j_range: j,
            k_range: k,
            tag: 0,
        };
        let config = SolverConfig {
            equation_set: EquationSet::Euler,
            boundary_conditions: vec![vec![
                spec([0, 0], [0, n], [0, n]),
                spec([n, n], [0, n], [0, n]),
                spec([0, n], [0, 0], [0, n]),
                spec([0, n], [n, n], [0, n]),
                spec([0, n], [0, n], [0, 0]),
                spec([0, n], [0, n], [n, n]),
            ]],
            initial_conditions: vec![InitialConditionSpec::Uniform {
                tag: -1,
                density: 1.2256,
                velocity: DVec3::new(30.0, 5.0, 0.0),
                pressure: 101325.0,
                turb_intensity: 0.01,
                eddy_visc_ratio: 10.0,
                mass_fractions: Vec::new(),
            }],
            ..Default::default()
        };
        let phys = Physics::from_config(&config);
        let nodes = NodeBlock::cartesian((n, n, n), DVec3::ZERO, DVec3::ONE);
        let bounds =
            BlockBoundaries::from_specs(&config.boundary_conditions[0], (n, n, n)).unwrap();
        let mut block = Block::new(nodes, bounds, 0, 0, 0, 0, &config, &phys).unwrap();
        block.initialize_states(&config, &phys).unwrap();
        block.assign_sol_to_time_n(&phys);
        block.assign_sol_to_time_nm1();
        (config, phys, vec![block])
    }

    #[test]
    fn test_restart_roundtrip() {
        let (config, phys, mut blocks) = test_setup();
        // 不均匀场
        for cell in blocks[0].phys_cells() {
            let mut p = blocks[0].prim_at(cell.0, cell.1, cell.2);
            let bump = 1.0 + 0.01 * (cell.0 + cell.1 + cell.2) as f64;
            p.as_mut_slice()[0] *= bump;
            blocks[0].set_prim(cell.0, cell.1, cell.2, &p);
        }
        let reference: Vec<Vec<f64>> = blocks[0]
            .phys_cells()
            .iter()
            .map(|c| blocks[0].prim_at(c.0, c.1, c.2).as_slice().to_vec())
            .collect();

        let dir = std::env::temp_dir().join("sf_restart_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("case_100.rst");

        let mut l2 = ResidL2::new(config.num_equations());
        l2.add_cell(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        l2.set_normalization(&config.floors);
        write_restart(&path, &blocks, &phys, &config, 100, &l2).unwrap();

        // 清空后读回
        let (_, _, mut fresh) = test_setup();
        let header = read_restart(&path, &mut fresh, &phys, &config).unwrap();
        assert_eq!(header.iteration, 100);
        assert_eq!(header.num_solutions, 1);
        assert_eq!(header.residual_norm.len(), 5);

        for (cell, expect) in fresh[0].phys_cells().iter().zip(&reference) {
            let got = fresh[0].prim_at(cell.0, cell.1, cell.2);
            for (g, e) in got.as_slice().iter().zip(expect) {
                assert!((g - e).abs() < 1e-12, "{g} != {e}");
            }
        }
        let _ = blocks;
    }

    #[test]
    fn test_restart_dimension_mismatch() {
        let (config, phys, blocks) = test_setup();
        let dir = std::env::temp_dir().join("sf_restart_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("case_1.rst");
        let l2 = ResidL2::new(config.num_equations());
        write_restart(&path, &blocks, &phys, &config, 1, &l2).unwrap();

        // rans 配置读取 euler 重启: 方程数不匹配
        let mut config2 = config.clone();
        config2.equation_set = EquationSet::Rans;
        config2.turbulence_model = sf_config::TurbulenceModelKind::KOmegaWilcox2006;
        let phys2 = Physics::from_config(&config2);
        let (_, _, mut blocks2) = test_setup();
        assert!(matches!(
            read_restart(&path, &mut blocks2, &phys2, &config2),
            Err(IoError::RestartMismatch(_))
        ));
    }
}
