// crates/sf_physics/src/linear.rs

//! 线性求解器
//!
//! 隐式路径的左端矩阵与松弛扫掠。主对角按配置存储为非耦合标量对
//! 或完整块 Jacobian；扫掠为 LU-SGS（超平面序的对称 Gauss-Seidel），
//! 非对角贡献用通量差近似（Jameson-Yoon）。
//!
//! 求解的系统: (V/Δt + Σ 0.5λ|A|)·ΔU + Σ O_nb·ΔU_nb = −R − forcing。

use sf_config::{MatrixSolverKind, SolverConfig};
use sf_foundation::interp::hyperplane_reorder;
use sf_grid::{Array3D, Connection, Direction, VarArray3D};

use crate::block::Block;
use crate::physics::Physics;
use crate::riemann::physical_flux;
use crate::spectral::UncoupledScalar;
use crate::state::{Primitive, StateVec};

// ============================================================
// 主对角存储
// ============================================================

/// 一个块的主对角
#[derive(Debug, Clone)]
pub enum DiagStore {
    /// 非耦合标量对近似
    Scalar(Array3D<UncoupledScalar>),
    /// 完整块 Jacobian（行优先 n×n）
    Full(VarArray3D),
}

impl DiagStore {
    /// 创建
    pub fn new(mode: MatrixSolverKind, dims: (usize, usize, usize), num_eq: usize) -> Self {
        match mode {
            MatrixSolverKind::Lusgs => {
                Self::Scalar(Array3D::new(dims.0, dims.1, dims.2, 0))
            }
            MatrixSolverKind::BlockLusgs => {
                Self::Full(VarArray3D::new(dims.0, dims.1, dims.2, 0, num_eq * num_eq))
            }
        }
    }

    /// 清零
    pub fn zero(&mut self) {
        match self {
            Self::Scalar(a) => a.fill(UncoupledScalar::ZERO),
            Self::Full(a) => a.zero(),
        }
    }

    /// 累加标量对（流动/湍流谱界）
    pub fn add_scalar(&mut self, cell: (isize, isize, isize), value: UncoupledScalar) {
        match self {
            Self::Scalar(a) => *a.get_mut(cell.0, cell.1, cell.2) += value,
            Self::Full(a) => {
                // 块模式下标量谱界进入矩阵对角
                let n = (a.block_size() as f64).sqrt() as usize;
                let m = a.cell_mut(cell.0, cell.1, cell.2);
                for eq in 0..n {
                    m[eq * n + eq] += value.flow;
                }
            }
        }
    }

    /// 累加完整矩阵（块模式）
    pub fn add_matrix(&mut self, cell: (isize, isize, isize), matrix: &[f64]) {
        match self {
            Self::Scalar(_) => {}
            Self::Full(a) => a.add_to_cell(cell.0, cell.1, cell.2, matrix),
        }
    }

    /// 加体积 / 时间项并分别写入流动与湍流通道
    pub fn add_time_term(&mut self, cell: (isize, isize, isize), value: UncoupledScalar, layout: crate::state::StateLayout) {
        match self {
            Self::Scalar(a) => *a.get_mut(cell.0, cell.1, cell.2) += value,
            Self::Full(a) => {
                let n = layout.size();
                let split = layout.turb_index();
                let m = a.cell_mut(cell.0, cell.1, cell.2);
                for eq in 0..n {
                    let v = if eq < split { value.flow } else { value.turb };
                    m[eq * n + eq] += v;
                }
            }
        }
    }
}

/// 已求逆的主对角
#[derive(Debug, Clone)]
pub enum DiagInverse {
    /// 标量对倒数
    Scalar(Array3D<UncoupledScalar>),
    /// 逆矩阵
    Full(VarArray3D),
}

impl DiagInverse {
    /// 对右端作用 D⁻¹
    pub fn apply(
        &self,
        cell: (isize, isize, isize),
        rhs: &[f64],
        layout: crate::state::StateLayout,
    ) -> StateVec {
        match self {
            Self::Scalar(a) => {
                let inv = a.get(cell.0, cell.1, cell.2);
                let split = layout.turb_index();
                rhs.iter()
                    .enumerate()
                    .map(|(eq, r)| {
                        if eq < split {
                            r * inv.flow
                        } else {
                            r * inv.turb
                        }
                    })
                    .collect()
            }
            Self::Full(a) => {
                let n = layout.size();
                let m = a.cell(cell.0, cell.1, cell.2);
                (0..n)
                    .map(|row| (0..n).map(|col| m[row * n + col] * rhs[col]).sum())
                    .collect()
            }
        }
    }
}

/// Gauss-Jordan 求逆（小型稠密矩阵）
fn invert_dense(matrix: &[f64], n: usize) -> Vec<f64> {
    let mut a = matrix.to_vec();
    let mut inv = vec![0.0; n * n];
    for d in 0..n {
        inv[d * n + d] = 1.0;
    }
    for col in 0..n {
        // 选主元
        let mut pivot_row = col;
        for row in col + 1..n {
            if a[row * n + col].abs() > a[pivot_row * n + col].abs() {
                pivot_row = row;
            }
        }
        if pivot_row != col {
            for cc in 0..n {
                a.swap(col * n + cc, pivot_row * n + cc);
                inv.swap(col * n + cc, pivot_row * n + cc);
            }
        }
        let pivot = a[col * n + col];
        let scale = 1.0 / pivot;
        for cc in 0..n {
            a[col * n + cc] *= scale;
            inv[col * n + cc] *= scale;
        }
        for row in 0..n {
            if row != col {
                let f = a[row * n + col];
                if f != 0.0 {
                    for cc in 0..n {
                        a[row * n + cc] -= f * a[col * n + cc];
                        inv[row * n + cc] -= f * inv[col * n + cc];
                    }
                }
            }
        }
    }
    inv
}

// ============================================================
// 线性求解器能力
// ============================================================

/// 线性求解器能力
pub trait LinearSolver: Send {
    /// 块 bb 的主对角
    fn a_mut(&mut self, block: usize) -> &mut DiagStore;

    /// 清零块 bb 的主对角
    fn zero_a(&mut self, block: usize);

    /// 解更新
    fn x(&self, block: usize) -> &VarArray3D;

    /// 可变解更新
    fn x_mut(&mut self, block: usize) -> &mut VarArray3D;

    /// 加体积 / 时间项
    fn add_diagonal_terms(&mut self, blocks: &[Block], config: &SolverConfig);

    /// 求主对角的逆
    fn invert(&mut self);

    /// 初始化解更新（置零）
    fn initialize_matrix_update(&mut self);

    /// 一次对称扫掠
    fn sweep(&mut self, blocks: &[Block], phys: &Physics, forcing: Option<&[VarArray3D]>);

    /// 连接两侧交换解更新幽灵
    fn exchange_update(&mut self, connections: &[Connection]);

    /// X -= 给定量（逐块逐单元）
    fn subtract_from_update(&mut self, delta: &[VarArray3D]);

    /// X += 给定量
    fn add_to_update(&mut self, delta: &[VarArray3D]);

    /// 把解更新体积加权限制到粗求解器
    fn restriction(
        &self,
        coarse: &mut dyn LinearSolver,
        to_coarse: &[Array3D<(usize, usize, usize)>],
        vol_weight: &[Array3D<f64>],
        coarse_dims: &[(usize, usize, usize)],
    );

    /// A·X − b，b = −residual − forcing
    fn a_x_minus_b(
        &self,
        blocks: &[Block],
        phys: &Physics,
        forcing: Option<&[VarArray3D]>,
    ) -> Vec<VarArray3D>;
}

// ============================================================
// LU-SGS
// ============================================================

/// LU-SGS 求解器
pub struct LuSgs {
    relaxation: f64,
    diags: Vec<DiagStore>,
    inverses: Vec<Option<DiagInverse>>,
    x: Vec<VarArray3D>,
    order: Vec<Vec<(usize, usize, usize)>>,
}

impl LuSgs {
    /// 由块集合构建
    pub fn new(blocks: &[Block], config: &SolverConfig) -> Self {
        let num_eq = config.num_equations();
        let mut diags = Vec::with_capacity(blocks.len());
        let mut x = Vec::with_capacity(blocks.len());
        let mut order = Vec::with_capacity(blocks.len());
        for b in blocks {
            let dims = b.dims();
            diags.push(DiagStore::new(config.matrix_solver, dims, num_eq));
            x.push(VarArray3D::new(dims.0, dims.1, dims.2, 1, num_eq));
            order.push(hyperplane_reorder(dims.0, dims.1, dims.2));
        }
        Self {
            relaxation: config.matrix_relaxation,
            inverses: vec![None; diags.len()],
            diags,
            x,
            order,
        }
    }

    /// 下三角或上三角邻居的非对角贡献
    ///
    /// 返回 O_nb·ΔU_nb，n̂ 为存储面法向（指向 +方向）。
    /// `toward_upper` 为真时邻居在上侧（外法向 = +n̂）。
    fn offdiag_product(
        nb_state: &Primitive,
        nb_dx: &[f64],
        area: &sf_grid::AreaVec,
        toward_upper: bool,
        phys: &Physics,
    ) -> StateVec {
        let n = area.unit;
        let lambda = nb_state.velocity().dot(n).abs() + nb_state.sos(phys);

        // ΔF ≈ F(U+ΔU) − F(U)，守恒空间扰动
        let cons = nb_state.to_conserved(phys);
        let mut perturbed: StateVec = StateVec::from_slice(cons.as_slice());
        for (p, d) in perturbed.iter_mut().zip(nb_dx) {
            *p += d;
        }
        let floors = sf_foundation::Floors::default();
        let pert_cons =
            crate::state::Conserved::from_slice(&perturbed, nb_state.layout().num_species());
        let df: Option<StateVec> = if pert_cons.rho() > 0.0 {
            let pert_prim = Primitive::from_conserved(&pert_cons, phys, &floors);
            if pert_prim.is_physical() {
                let f0 = physical_flux(nb_state, n, phys);
                let f1 = physical_flux(&pert_prim, n, phys);
                Some(f1.iter().zip(&f0).map(|(a, b)| a - b).collect())
            } else {
                None
            }
        } else {
            None
        };

        let sign = if toward_upper { 1.0 } else { -1.0 };
        (0..nb_dx.len())
            .map(|eq| {
                let df_term = df.as_ref().map_or(0.0, |d| d[eq]);
                0.5 * area.mag * (sign * df_term - lambda * nb_dx[eq])
            })
            .collect()
    }

    /// 对一个单元收集给定一侧邻居的非对角贡献
    fn gather_neighbors(
        &self,
        block: &Block,
        bb: usize,
        cell: (isize, isize, isize),
        upper: bool,
        phys: &Physics,
    ) -> StateVec {
        let num_eq = self.x[bb].block_size();
        let mut acc: StateVec = smallvec::smallvec![0.0; num_eq];
        for dir in Direction::ALL {
            let e = dir.unit();
            let (nb, face) = if upper {
                (
                    (cell.0 + e.0, cell.1 + e.1, cell.2 + e.2),
                    (cell.0 + e.0, cell.1 + e.1, cell.2 + e.2),
                )
            } else {
                ((cell.0 - e.0, cell.1 - e.1, cell.2 - e.2), cell)
            };
            // 物理邻居或连接幽灵（X 带 1 层幽灵）
            if !block.in_update_range(nb) {
                continue;
            }
            let nb_dx = StateVec::from_slice(self.x[bb].cell(nb.0, nb.1, nb.2));
            if nb_dx.iter().all(|v| *v == 0.0) {
                continue;
            }
            let nb_state = block.prim_at(nb.0, nb.1, nb.2);
            let area = *block.geometry().farea(dir).get(face.0, face.1, face.2);
            let contrib = Self::offdiag_product(&nb_state, &nb_dx, &area, upper, phys);
            for (a, c) in acc.iter_mut().zip(&contrib) {
                *a += c;
            }
        }
        acc
    }
}

impl LinearSolver for LuSgs {
    fn a_mut(&mut self, block: usize) -> &mut DiagStore {
        &mut self.diags[block]
    }

    fn zero_a(&mut self, block: usize) {
        self.diags[block].zero();
    }

    fn x(&self, block: usize) -> &VarArray3D {
        &self.x[block]
    }

    fn x_mut(&mut self, block: usize) -> &mut VarArray3D {
        &mut self.x[block]
    }

    fn add_diagonal_terms(&mut self, blocks: &[Block], _config: &SolverConfig) {
        let layout = blocks
            .first()
            .map(|b| b.layout())
            .unwrap_or(crate::state::StateLayout::new(1, 0));
        for (bb, block) in blocks.iter().enumerate() {
            for cell in block.phys_cells() {
                let vol = *block.geometry().vol.get(cell.0, cell.1, cell.2);
                let dt = block.dt(cell);
                let term = UncoupledScalar::new(vol / dt, vol / dt);
                self.diags[bb].add_time_term(cell, term, layout);
            }
        }
    }

    fn invert(&mut self) {
        for (diag, inv_slot) in self.diags.iter().zip(self.inverses.iter_mut()) {
            let inv = match diag {
                DiagStore::Scalar(a) => {
                    let mut out = a.clone();
                    for (ii, jj, kk) in a.phys_range().iter() {
                        let d = *a.get(ii, jj, kk);
                        // 松弛因子加强对角
                        let scaled = UncoupledScalar::new(
                            d.flow / self.relaxation,
                            d.turb / self.relaxation,
                        );
                        *out.get_mut(ii, jj, kk) = scaled.recip();
                    }
                    DiagInverse::Scalar(out)
                }
                DiagStore::Full(a) => {
                    let n = (a.block_size() as f64).sqrt() as usize;
                    let mut out = a.clone();
                    for (ii, jj, kk) in a.phys_range().iter() {
                        let scaled: Vec<f64> = a
                            .cell(ii, jj, kk)
                            .iter()
                            .map(|v| v / self.relaxation)
                            .collect();
                        let inv = invert_dense(&scaled, n);
                        out.insert_cell(ii, jj, kk, &inv);
                    }
                    DiagInverse::Full(out)
                }
            };
            *inv_slot = Some(inv);
        }
    }

    fn initialize_matrix_update(&mut self) {
        for x in &mut self.x {
            x.zero();
        }
    }

    fn sweep(&mut self, blocks: &[Block], phys: &Physics, forcing: Option<&[VarArray3D]>) {
        for (bb, block) in blocks.iter().enumerate() {
            let layout = block.layout();
            let order = self.order[bb].clone();

            // 前向扫掠（下三角）
            for &(ii, jj, kk) in &order {
                let cell = (ii as isize, jj as isize, kk as isize);
                let mut rhs: StateVec =
                    StateVec::from_slice(block.residual_at(cell));
                for r in rhs.iter_mut() {
                    *r = -*r;
                }
                if let Some(forcing) = forcing {
                    for (r, f) in rhs.iter_mut().zip(forcing[bb].cell(cell.0, cell.1, cell.2)) {
                        *r -= f;
                    }
                }
                let lower = self.gather_neighbors(block, bb, cell, false, phys);
                for (r, l) in rhs.iter_mut().zip(&lower) {
                    *r -= l;
                }
                let inv = self.inverses[bb].as_ref().expect("diagonal not inverted");
                let dx = inv.apply(cell, &rhs, layout);
                self.x[bb].insert_cell(cell.0, cell.1, cell.2, &dx);
            }

            // 后向扫掠（上三角）
            for &(ii, jj, kk) in order.iter().rev() {
                let cell = (ii as isize, jj as isize, kk as isize);
                let upper = self.gather_neighbors(block, bb, cell, true, phys);
                if upper.iter().all(|v| *v == 0.0) {
                    continue;
                }
                let inv = self.inverses[bb].as_ref().expect("diagonal not inverted");
                let corr = inv.apply(cell, &upper, layout);
                let x = self.x[bb].cell_mut(cell.0, cell.1, cell.2);
                for (xv, c) in x.iter_mut().zip(&corr) {
                    *xv -= c;
                }
            }
        }
    }

    fn exchange_update(&mut self, connections: &[Connection]) {
        for conn in connections {
            for pair in conn.cell_pairs(1) {
                let a_val = StateVec::from_slice(self.x[conn.a.block].cell(
                    pair.a_interior.0,
                    pair.a_interior.1,
                    pair.a_interior.2,
                ));
                let b_val = StateVec::from_slice(self.x[conn.b.block].cell(
                    pair.b_interior.0,
                    pair.b_interior.1,
                    pair.b_interior.2,
                ));
                self.x[conn.a.block].insert_cell(
                    pair.a_ghost.0,
                    pair.a_ghost.1,
                    pair.a_ghost.2,
                    &b_val,
                );
                self.x[conn.b.block].insert_cell(
                    pair.b_ghost.0,
                    pair.b_ghost.1,
                    pair.b_ghost.2,
                    &a_val,
                );
            }
        }
    }

    fn subtract_from_update(&mut self, delta: &[VarArray3D]) {
        for (x, d) in self.x.iter_mut().zip(delta) {
            for (ii, jj, kk) in x.phys_range().iter() {
                let dv = StateVec::from_slice(d.cell(ii, jj, kk));
                x.subtract_from_cell(ii, jj, kk, &dv);
            }
        }
    }

    fn add_to_update(&mut self, delta: &[VarArray3D]) {
        for (x, d) in self.x.iter_mut().zip(delta) {
            for (ii, jj, kk) in x.phys_range().iter() {
                let dv = StateVec::from_slice(d.cell(ii, jj, kk));
                x.add_to_cell(ii, jj, kk, &dv);
            }
        }
    }

    fn restriction(
        &self,
        coarse: &mut dyn LinearSolver,
        to_coarse: &[Array3D<(usize, usize, usize)>],
        vol_weight: &[Array3D<f64>],
        coarse_dims: &[(usize, usize, usize)],
    ) {
        coarse.initialize_matrix_update();
        for bb in 0..self.x.len() {
            let restricted = crate::multigrid::block_restriction(
                &self.x[bb],
                &to_coarse[bb],
                &vol_weight[bb],
                coarse_dims[bb],
            );
            let cx = coarse.x_mut(bb);
            for (ii, jj, kk) in restricted.phys_range().iter() {
                cx.insert_cell(ii, jj, kk, restricted.cell(ii, jj, kk));
            }
        }
    }

    fn a_x_minus_b(
        &self,
        blocks: &[Block],
        phys: &Physics,
        forcing: Option<&[VarArray3D]>,
    ) -> Vec<VarArray3D> {
        let mut out = Vec::with_capacity(blocks.len());
        for (bb, block) in blocks.iter().enumerate() {
            let layout = block.layout();
            let dims = block.dims();
            let mut axmb = VarArray3D::new(dims.0, dims.1, dims.2, 0, layout.size());
            for cell in block.phys_cells() {
                let x = StateVec::from_slice(self.x[bb].cell(cell.0, cell.1, cell.2));
                // 对角部分: 标量模式直接乘，块模式用矩阵乘
                let mut ax: StateVec = match &self.diags[bb] {
                    DiagStore::Scalar(a) => {
                        let d = *a.get(cell.0, cell.1, cell.2);
                        let split = layout.turb_index();
                        x.iter()
                            .enumerate()
                            .map(|(eq, v)| {
                                if eq < split {
                                    v * d.flow
                                } else {
                                    v * d.turb
                                }
                            })
                            .collect()
                    }
                    DiagStore::Full(a) => {
                        let n = layout.size();
                        let m = a.cell(cell.0, cell.1, cell.2);
                        (0..n)
                            .map(|row| (0..n).map(|col| m[row * n + col] * x[col]).sum())
                            .collect()
                    }
                };
                // 非对角部分
                for upper in [false, true] {
                    let nb = self.gather_neighbors(block, bb, cell, upper, phys);
                    for (a, v) in ax.iter_mut().zip(&nb) {
                        *a += v;
                    }
                }
                // − b = + residual + forcing
                for (a, r) in ax.iter_mut().zip(block.residual_at(cell)) {
                    *a += r;
                }
                if let Some(forcing) = forcing {
                    for (a, f) in ax.iter_mut().zip(forcing[bb].cell(cell.0, cell.1, cell.2)) {
                        *a += f;
                    }
                }
                axmb.insert_cell(cell.0, cell.1, cell.2, &ax);
            }
            out.push(axmb);
        }
        out
    }
}

/// 由配置构造线性求解器
pub fn create_linear_solver(blocks: &[Block], config: &SolverConfig) -> Box<dyn LinearSolver> {
    Box::new(LuSgs::new(blocks, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_dense_identity() {
        let m = vec![1.0, 0.0, 0.0, 1.0];
        let inv = invert_dense(&m, 2);
        assert_eq!(inv, m);
    }

    #[test]
    fn test_invert_dense_2x2() {
        let m = vec![4.0, 7.0, 2.0, 6.0];
        let inv = invert_dense(&m, 2);
        // A·A⁻¹ = I
        let prod = [
            m[0] * inv[0] + m[1] * inv[2],
            m[0] * inv[1] + m[1] * inv[3],
            m[2] * inv[0] + m[3] * inv[2],
            m[2] * inv[1] + m[3] * inv[3],
        ];
        assert!((prod[0] - 1.0).abs() < 1e-12);
        assert!(prod[1].abs() < 1e-12);
        assert!(prod[2].abs() < 1e-12);
        assert!((prod[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_diag_scalar_accumulate_and_apply() {
        let layout = crate::state::StateLayout::new(1, 2);
        let mut diag = DiagStore::new(MatrixSolverKind::Lusgs, (1, 1, 1), layout.size());
        diag.add_scalar((0, 0, 0), UncoupledScalar::new(2.0, 4.0));
        let inv = match &diag {
            DiagStore::Scalar(a) => {
                let mut out = a.clone();
                *out.get_mut(0, 0, 0) = a.get(0, 0, 0).recip();
                DiagInverse::Scalar(out)
            }
            _ => unreachable!(),
        };
        let rhs = vec![1.0; 7];
        let dx = inv.apply((0, 0, 0), &rhs, layout);
        assert!((dx[0] - 0.5).abs() < 1e-14);
        assert!((dx[4] - 0.5).abs() < 1e-14);
        assert!((dx[5] - 0.25).abs() < 1e-14);
        assert!((dx[6] - 0.25).abs() < 1e-14);
    }

    #[test]
    fn test_diag_full_time_term() {
        let layout = crate::state::StateLayout::new(1, 0);
        let mut diag = DiagStore::new(MatrixSolverKind::BlockLusgs, (1, 1, 1), 5);
        diag.add_time_term((0, 0, 0), UncoupledScalar::new(3.0, 3.0), layout);
        match &diag {
            DiagStore::Full(a) => {
                let m = a.cell(0, 0, 0);
                for eq in 0..5 {
                    assert_eq!(m[eq * 5 + eq], 3.0);
                }
                assert_eq!(m[1], 0.0);
            }
            _ => unreachable!(),
        }
    }
}
