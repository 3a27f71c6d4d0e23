// crates/sf_physics/src/multigrid.rs

//! 两层几何多重网格
//!
//! 粗层由每方向隔点保留生成，定义边界面片的索引必须保留；
//! 边界条件重写到粗索引基。限制为体积加权，强迫项为粗层的
//! AX−B 加上细层线性系统残差的限制；延拓为细单元中心在包围
//! 粗六面体内的三线性插值（7 系数，预先算好）。

use sf_config::SolverConfig;
use sf_foundation::interp::{trilinear_interp, trilinear_interp_coeff};
use sf_grid::{Array3D, Direction, NodeBlock, VarArray3D};

use crate::block::Block;
use crate::error::PhysicsError;
use crate::level::GridLevel;
use crate::physics::Physics;
use crate::state::{Conserved, Primitive, StateVec};

// ============================================================
// 粗化映射
// ============================================================

/// 细层到粗层的映射（逐细块）
pub struct MgMaps {
    /// 细单元 → 包围粗单元
    pub to_coarse: Vec<Array3D<(usize, usize, usize)>>,
    /// 细体积 / 映射到同一粗单元的细体积之和
    pub vol_weight: Vec<Array3D<f64>>,
    /// 细单元中心在包围粗六面体内的三线性插值系数
    pub prolong_coeffs: Vec<Array3D<[f64; 7]>>,
}

/// 一个方向上保留的细索引
///
/// 隔点保留，但任何定义边界面片的索引总是保留。
fn kept_indices(block: &Block, dir: Direction) -> Vec<usize> {
    let n = match dir {
        Direction::I => block.dims().0,
        Direction::J => block.dims().1,
        Direction::K => block.dims().2,
    };
    let mut kept: Vec<usize> = (0..=n).step_by(2).collect();
    if kept.last() != Some(&n) {
        kept.push(n);
    }
    for surf in block.boundaries().surfaces() {
        let (td1, td2) = surf.class.direction().tangential();
        if td1 == dir {
            kept.push(surf.r1.0);
            kept.push(surf.r1.1);
        }
        if td2 == dir {
            kept.push(surf.r2.0);
            kept.push(surf.r2.1);
        }
    }
    kept.sort_unstable();
    kept.dedup();
    kept
}

/// 细单元所在的粗单元序号：第一个严格大于 fine 的保留索引减一
#[inline]
fn coarse_cell_of(kept: &[usize], fine: usize) -> usize {
    kept.partition_point(|&x| x <= fine) - 1
}

// ============================================================
// 粗化
// ============================================================

/// 生成粗网格级与映射
pub fn coarsen(
    fine: &GridLevel,
    config: &SolverConfig,
    phys: &Physics,
) -> Result<(GridLevel, MgMaps), PhysicsError> {
    let mut coarse_blocks = Vec::with_capacity(fine.num_blocks());
    let mut to_coarse = Vec::with_capacity(fine.num_blocks());
    let mut vol_weight = Vec::with_capacity(fine.num_blocks());
    let mut kept_all = Vec::with_capacity(fine.num_blocks());

    for block in fine.blocks() {
        let kept = [
            kept_indices(block, Direction::I),
            kept_indices(block, Direction::J),
            kept_indices(block, Direction::K),
        ];
        let (ni, nj, nk) = block.dims();
        let (ci, cj, ck) = (
            kept[0].len() - 1,
            kept[1].len() - 1,
            kept[2].len() - 1,
        );

        // 粗节点
        let mut nodes = NodeBlock::zeros(ci + 1, cj + 1, ck + 1);
        for (kc, kf) in kept[2].iter().enumerate() {
            for (jc, jf) in kept[1].iter().enumerate() {
                for (ic, if_) in kept[0].iter().enumerate() {
                    nodes.set_node(ic, jc, kc, block.nodes().node(*if_, *jf, *kf));
                }
            }
        }

        // 细→粗映射
        let mut map = Array3D::new(ni, nj, nk, 0);
        for (ii, jj, kk) in map.phys_range().iter() {
            *map.get_mut(ii, jj, kk) = (
                coarse_cell_of(&kept[0], ii as usize),
                coarse_cell_of(&kept[1], jj as usize),
                coarse_cell_of(&kept[2], kk as usize),
            );
        }

        // 体积权重
        let mut sums = Array3D::<f64>::new(ci, cj, ck, 0);
        for (ii, jj, kk) in map.phys_range().iter() {
            let (a, b, c) = *map.get(ii, jj, kk);
            *sums.get_mut(a as isize, b as isize, c as isize) +=
                *block.geometry().vol.get(ii, jj, kk);
        }
        let mut weight = Array3D::<f64>::new(ni, nj, nk, 0);
        for (ii, jj, kk) in map.phys_range().iter() {
            let (a, b, c) = *map.get(ii, jj, kk);
            *weight.get_mut(ii, jj, kk) = *block.geometry().vol.get(ii, jj, kk)
                / *sums.get(a as isize, b as isize, c as isize);
        }

        let bounds = block.boundaries().coarsened(&kept);
        let mut cb = Block::new(
            nodes,
            bounds,
            block.id(),
            block.parent(),
            block.rank(),
            block.local_position(),
            config,
            phys,
        )?;
        cb.initialize_states(config, phys)?;

        coarse_blocks.push(cb);
        to_coarse.push(map);
        vol_weight.push(weight);
        kept_all.push(kept);
    }

    let mut coarse = GridLevel::assemble(coarse_blocks, config, phys)?;
    if config.is_viscous() {
        coarse.init_wall_distances(config)?;
    }
    coarse.assign_sol_to_time_n(phys);

    // 延拓系数：细单元中心在包围粗六面体节点间的位置
    let mut prolong_coeffs = Vec::with_capacity(fine.num_blocks());
    for (bb, block) in fine.blocks().iter().enumerate() {
        let (ni, nj, nk) = block.dims();
        let mut coeffs = Array3D::filled(ni, nj, nk, 0, [0.0; 7]);
        let cnodes = coarse.blocks()[bb].nodes();
        for (ii, jj, kk) in coeffs.phys_range().iter() {
            let (ci, cj, ck) = *to_coarse[bb].get(ii, jj, kk);
            let fc = *block.geometry().centroid.get(ii, jj, kk);
            let n = |di: usize, dj: usize, dk: usize| cnodes.node(ci + di, cj + dj, ck + dk);
            *coeffs.get_mut(ii, jj, kk) = trilinear_interp_coeff(
                n(0, 0, 0),
                n(1, 0, 0),
                n(0, 1, 0),
                n(1, 1, 0),
                n(0, 0, 1),
                n(1, 0, 1),
                n(0, 1, 1),
                n(1, 1, 1),
                fc,
            );
        }
        prolong_coeffs.push(coeffs);
    }

    Ok((
        coarse,
        MgMaps {
            to_coarse,
            vol_weight,
            prolong_coeffs,
        },
    ))
}

// ============================================================
// 限制
// ============================================================

/// 逐块体积加权限制（方程块场）
pub fn block_restriction(
    fine: &VarArray3D,
    to_coarse: &Array3D<(usize, usize, usize)>,
    vol_weight: &Array3D<f64>,
    coarse_dims: (usize, usize, usize),
) -> VarArray3D {
    let mut out = VarArray3D::new(
        coarse_dims.0,
        coarse_dims.1,
        coarse_dims.2,
        0,
        fine.block_size(),
    );
    for (ii, jj, kk) in to_coarse.phys_range().iter() {
        let (a, b, c) = *to_coarse.get(ii, jj, kk);
        let w = *vol_weight.get(ii, jj, kk);
        let scaled: StateVec = fine.cell(ii, jj, kk).iter().map(|v| v * w).collect();
        out.add_to_cell(a as isize, b as isize, c as isize, &scaled);
    }
    out
}

/// 限制：状态、残差、时间步、对角在限制后的状态上重算；
/// 强迫项 = 粗层 AX−B + 细层线性残差的限制
///
/// 返回限制后的初始解更新（延拓前用于构造修正量）。
#[allow(clippy::too_many_arguments)]
pub fn restriction(
    fine: &mut GridLevel,
    coarse: &mut GridLevel,
    maps: &MgMaps,
    m: usize,
    config: &SolverConfig,
    phys: &Physics,
    iteration: usize,
) -> Result<Vec<VarArray3D>, PhysicsError> {
    let rank = 0;
    let num_species = phys.layout.num_species();

    // 细层线性系统残差 r = b − A·x = −(A·x − b)
    let fine_r: Vec<VarArray3D> = {
        let solver = fine.solver().expect("multigrid requires implicit solver");
        let axmb = solver.a_x_minus_b(fine.blocks(), phys, None);
        axmb.into_iter()
            .map(|mut a| {
                for cell in a.phys_range().iter().collect::<Vec<_>>() {
                    let neg: StateVec =
                        a.cell(cell.0, cell.1, cell.2).iter().map(|v| -v).collect();
                    a.insert_cell(cell.0, cell.1, cell.2, &neg);
                }
                a
            })
            .collect()
    };

    // 状态的体积加权限制
    for bb in 0..fine.num_blocks() {
        let fine_cons = {
            let fb = &fine.blocks()[bb];
            let dims = fb.dims();
            let mut cons = VarArray3D::new(dims.0, dims.1, dims.2, 0, phys.layout.size());
            for cell in fb.phys_cells() {
                let c = fb.prim_at(cell.0, cell.1, cell.2).to_conserved(phys);
                cons.insert_cell(cell.0, cell.1, cell.2, c.as_slice());
            }
            cons
        };
        let coarse_dims = coarse.blocks()[bb].dims();
        let restricted =
            block_restriction(&fine_cons, &maps.to_coarse[bb], &maps.vol_weight[bb], coarse_dims);
        let cb = &mut coarse.blocks_mut()[bb];
        for cell in cb.phys_cells() {
            let cons = Conserved::from_slice(restricted.cell(cell.0, cell.1, cell.2), num_species);
            let prim = Primitive::from_conserved(&cons, phys, &config.floors);
            cb.set_prim(cell.0, cell.1, cell.2, &prim);
        }
    }
    if m == 0 {
        coarse.assign_sol_to_time_n(phys);
    }

    // 在限制后的状态上重算粗层残差、时间步与对角
    coarse.get_boundary_conditions(config, phys, rank);
    coarse.calc_residual(phys, config, rank)?;
    coarse.calc_time_step(config, phys, iteration);
    coarse.invert_diagonal(config);

    // 解更新经求解器能力限制到粗层
    let coarse_dims: Vec<(usize, usize, usize)> =
        coarse.blocks().iter().map(|b| b.dims()).collect();
    {
        let fine_solver = fine.solver().expect("implicit");
        let coarse_solver = coarse.solver_mut().expect("implicit");
        fine_solver.restriction(
            coarse_solver,
            &maps.to_coarse,
            &maps.vol_weight,
            &coarse_dims,
        );
    }
    let restricted_x: Vec<VarArray3D> = (0..coarse.num_blocks())
        .map(|bb| coarse.solver().expect("implicit").x(bb).clone())
        .collect();

    // 强迫项 = 粗层 AX−B + 细残差的限制
    let coarse_axmb = {
        let solver = coarse.solver().expect("implicit");
        solver.a_x_minus_b(coarse.blocks(), phys, None)
    };
    for bb in 0..coarse.num_blocks() {
        let coarse_dims = coarse.blocks()[bb].dims();
        let restricted_r =
            block_restriction(&fine_r[bb], &maps.to_coarse[bb], &maps.vol_weight[bb], coarse_dims);
        let forcing = &mut coarse.mg_forcing[bb];
        forcing.zero();
        for cell in restricted_r.phys_range().iter().collect::<Vec<_>>() {
            let sum: StateVec = coarse_axmb[bb]
                .cell(cell.0, cell.1, cell.2)
                .iter()
                .zip(restricted_r.cell(cell.0, cell.1, cell.2))
                .map(|(a, r)| a + r)
                .collect();
            forcing.insert_cell(cell.0, cell.1, cell.2, &sum);
        }
    }

    Ok(restricted_x)
}

// ============================================================
// 延拓
// ============================================================

/// 延拓：粗层解更新的修正量三线性插值到细层并加到细层更新
pub fn prolongation(
    coarse: &mut GridLevel,
    fine: &mut GridLevel,
    maps: &MgMaps,
    restricted_x: &[VarArray3D],
) {
    // 修正量 = 粗层最终更新 − 限制的初始更新
    coarse
        .solver_mut()
        .expect("implicit")
        .subtract_from_update(restricted_x);

    let num_eq = restricted_x
        .first()
        .map(|x| x.block_size())
        .unwrap_or(0);

    let mut corrections = Vec::with_capacity(fine.num_blocks());
    for bb in 0..fine.num_blocks() {
        let corr = coarse.solver().expect("implicit").x(bb).clone();
        let node_corr = coarse.blocks()[bb].cell_to_node(&corr);

        let dims = fine.blocks()[bb].dims();
        let mut fine_corr = VarArray3D::new(dims.0, dims.1, dims.2, 1, num_eq);
        for cell in fine.blocks()[bb].phys_cells() {
            let (ci, cj, ck) = *maps.to_coarse[bb].get(cell.0, cell.1, cell.2);
            let coeffs = *maps.prolong_coeffs[bb].get(cell.0, cell.1, cell.2);
            let node = |di: usize, dj: usize, dk: usize| -> StateVec {
                StateVec::from_slice(node_corr.cell(
                    (ci + di) as isize,
                    (cj + dj) as isize,
                    (ck + dk) as isize,
                ))
            };
            let interp: StateVec = (0..num_eq)
                .map(|eq| {
                    trilinear_interp(
                        &coeffs,
                        node(0, 0, 0)[eq],
                        node(1, 0, 0)[eq],
                        node(0, 1, 0)[eq],
                        node(1, 1, 0)[eq],
                        node(0, 0, 1)[eq],
                        node(1, 0, 1)[eq],
                        node(0, 1, 1)[eq],
                        node(1, 1, 1)[eq],
                    )
                })
                .collect();
            fine_corr.insert_cell(cell.0, cell.1, cell.2, &interp);
        }
        corrections.push(fine_corr);
    }

    fine.solver_mut()
        .expect("implicit")
        .add_to_update(&corrections);
}

// ============================================================
// 带多重网格的隐式迭代
// ============================================================

/// 一次 V 循环的隐式迭代
///
/// 细层扫掠后限制到粗层、带强迫项扫掠、延拓修正，再做细层更新。
pub fn iterate_with_mg(
    fine: &mut GridLevel,
    coarse: &mut GridLevel,
    maps: &MgMaps,
    config: &SolverConfig,
    phys: &Physics,
    iteration: usize,
) -> Result<(crate::residual::ResidL2, crate::residual::ResidLinf), PhysicsError> {
    let rank = 0;
    let mut resid_l2 = crate::residual::ResidL2::new(config.num_equations());
    let mut resid_linf = crate::residual::ResidLinf::default();

    fine.assign_sol_to_time_n(phys);

    for m in 0..config.nonlinear_iterations {
        fine.get_boundary_conditions(config, phys, rank);
        fine.calc_residual(phys, config, rank)?;
        fine.calc_time_step(config, phys, iteration);
        fine.invert_diagonal(config);
        fine.initialize_matrix_update();
        fine.solver_sweeps(config, phys, None);

        // V 循环
        let restricted_x = restriction(fine, coarse, maps, m, config, phys, iteration)?;
        {
            let forcing = std::mem::take(&mut coarse.mg_forcing);
            coarse.solver_sweeps(config, phys, Some(&forcing));
            coarse.mg_forcing = forcing;
        }
        prolongation(coarse, fine, maps, &restricted_x);

        resid_l2.zero();
        resid_linf.zero();
        fine.update_blocks(config, phys, m, 0, &mut resid_l2, &mut resid_linf)?;
    }

    Ok((resid_l2, resid_linf))
}
