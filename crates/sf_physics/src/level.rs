// crates/sf_physics/src/level.rs

//! 网格级协调器
//!
//! 一个网格分辨率上的块集合：逐迭代地编排幽灵交换、残差装配、
//! 对角求逆、矩阵求解与状态更新。交换只发生在显式的切片交换
//! 屏障处；L2 残差按平方和-开方语义归约，L∞ 取全局最大并保留
//! 胜者元组。

use glam::DVec3;
use rayon::prelude::*;

use sf_config::SolverConfig;
use sf_grid::{
    find_connections, swap_geometry, swap_geometry_deferred, BlockBoundaries, Connection,
    NodeBlock, VarArray3D,
};

use crate::block::{
    swap_eddy_and_gradient_slices, swap_state_slices, swap_turb_slices, swap_wall_dist_slices,
    Block, SpatialScheme,
};
use crate::error::PhysicsError;
use crate::linear::{create_linear_solver, LinearSolver};
use crate::parallel::Decomposition;
use crate::physics::Physics;
use crate::residual::{ResidL2, ResidLinf};
use crate::spatial::PointCloud;

/// 一个网格分辨率上的块集合
pub struct GridLevel {
    blocks: Vec<Block>,
    connections: Vec<Connection>,
    solver: Option<Box<dyn LinearSolver>>,
    scheme: SpatialScheme,
    /// 多重网格强迫项（粗层持有，限制时写入、源装配时读取）
    pub mg_forcing: Vec<VarArray3D>,
    decomp: Decomposition,
}

impl GridLevel {
    /// 由节点块集合构建
    ///
    /// 派生几何、匹配连接并交换连接幽灵几何（含 t 形交汇的二次
    /// 交换）、建立壁面距离、初始化状态与时间快照。
    pub fn new(
        meshes: Vec<NodeBlock>,
        config: &SolverConfig,
        phys: &Physics,
        decomp: Decomposition,
    ) -> Result<Self, PhysicsError> {
        let mut blocks = Vec::with_capacity(meshes.len());
        for (bb, nodes) in meshes.into_iter().enumerate() {
            let dims = (
                nodes.num_cells_i(),
                nodes.num_cells_j(),
                nodes.num_cells_k(),
            );
            let bounds = match config.boundary_conditions.get(bb) {
                Some(specs) => BlockBoundaries::from_specs(specs, dims)?,
                None => {
                    return Err(PhysicsError::Grid(sf_grid::GridError::Connection(format!(
                        "块 {bb} 缺少边界条件"
                    ))))
                }
            };
            let mut block = Block::new(
                nodes,
                bounds,
                bb,
                bb,
                decomp.rank(bb),
                decomp.local_position(bb),
                config,
                phys,
            )?;
            block.initialize_states(config, phys)?;
            blocks.push(block);
        }

        let mut level = Self::assemble(blocks, config, phys)?;
        level.decomp = decomp;

        // 壁面距离：黏性方程组对全部黏性面心建树
        if config.is_viscous() {
            level.calc_wall_distances(config)?;
        }
        for block in &mut level.blocks {
            block.assign_sol_to_time_n(phys);
            block.assign_sol_to_time_nm1();
        }
        Ok(level)
    }

    /// 由已构建的块集合组装（多重网格粗层复用）
    pub fn assemble(
        blocks: Vec<Block>,
        config: &SolverConfig,
        _phys: &Physics,
    ) -> Result<Self, PhysicsError> {
        let mut blocks = blocks;
        // 连接匹配与幽灵几何交换
        let boundaries: Vec<BlockBoundaries> =
            blocks.iter().map(|b| b.boundaries().clone()).collect();
        let mut geoms: Vec<sf_grid::BlockGeometry> =
            blocks.iter().map(|b| b.geometry().clone()).collect();
        let connections = find_connections(&boundaries, &geoms)?;

        let mut deferred = Vec::new();
        for conn in &connections {
            deferred.extend(swap_geometry(conn, &mut geoms, config.ghost_layers));
        }
        if !deferred.is_empty() {
            for conn in &connections {
                swap_geometry_deferred(conn, &mut geoms, config.ghost_layers, &deferred)?;
            }
        }
        for (block, geom) in blocks.iter_mut().zip(geoms) {
            *block.geometry_mut() = geom;
        }

        let solver = if config.is_implicit() {
            Some(create_linear_solver(&blocks, config))
        } else {
            None
        };

        let mg_forcing = blocks
            .iter()
            .map(|b| {
                let d = b.dims();
                VarArray3D::new(d.0, d.1, d.2, 0, b.layout().size())
            })
            .collect();

        let num_blocks = blocks.len();
        Ok(Self {
            blocks,
            connections,
            solver,
            scheme: SpatialScheme::from_config(config),
            mg_forcing,
            decomp: Decomposition::single(num_blocks),
        })
    }

    /// 块集合
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// 可变块集合
    #[inline]
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// 连接表
    #[inline]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// 线性求解器
    #[inline]
    pub fn solver(&self) -> Option<&dyn LinearSolver> {
        self.solver.as_deref()
    }

    /// 可变线性求解器
    #[inline]
    pub fn solver_mut(&mut self) -> Option<&mut (dyn LinearSolver + '_)> {
        match self.solver {
            Some(ref mut s) => Some(s.as_mut()),
            None => None,
        }
    }

    /// 块数
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// 并行分解
    #[inline]
    pub fn decomposition(&self) -> &Decomposition {
        &self.decomp
    }

    /// 壁面距离：全部黏性面心建树后逐块查询并交换切片
    pub fn init_wall_distances(&mut self, config: &SolverConfig) -> Result<(), PhysicsError> {
        self.calc_wall_distances(config)
    }

    fn calc_wall_distances(&mut self, config: &SolverConfig) -> Result<(), PhysicsError> {
        let mut centers: Vec<DVec3> = Vec::new();
        for block in &self.blocks {
            centers.extend(block.viscous_face_centers());
        }
        let tree = if centers.is_empty() {
            None
        } else {
            Some(PointCloud::new(&centers))
        };
        self.blocks
            .par_iter_mut()
            .try_for_each(|block| block.calc_wall_distance(tree.as_ref(), config))?;
        for conn in &self.connections {
            swap_wall_dist_slices(&mut self.blocks, conn, config.ghost_layers);
        }
        Ok(())
    }

    /// 填充无黏幽灵并协调全部连接，然后填充棱幽灵
    pub fn get_boundary_conditions(&mut self, config: &SolverConfig, phys: &Physics, rank: usize) {
        for block in self.blocks.iter_mut().filter(|b| b.rank() == rank) {
            block.assign_inviscid_ghosts(config, phys);
        }
        for conn in &self.connections {
            // 同 rank 就地交换；跨 rank 路径沿同一有序遍历
            swap_state_slices(&mut self.blocks, conn, config.ghost_layers);
        }
        for block in self.blocks.iter_mut().filter(|b| b.rank() == rank) {
            block.assign_inviscid_ghost_edges(phys);
        }
    }

    /// 残差装配
    ///
    /// 每块跑无源残差；交换涡黏性与梯度切片；湍流时交换湍流切片；
    /// 湍流或反应时装配源项。
    pub fn calc_residual(
        &mut self,
        phys: &Physics,
        config: &SolverConfig,
        rank: usize,
    ) -> Result<(), PhysicsError> {
        let Self {
            blocks,
            solver,
            scheme,
            ..
        } = self;
        for (bb, block) in blocks.iter_mut().enumerate() {
            if block.rank() != rank {
                continue;
            }
            if let Some(solver) = solver.as_mut() {
                solver.zero_a(bb);
            }
            let diag = solver.as_mut().map(|s| s.a_mut(bb));
            block.calc_residual_no_source(phys, config, scheme, diag)?;
        }

        for conn in &self.connections {
            swap_eddy_and_gradient_slices(&mut self.blocks, conn, config.ghost_layers);
        }
        if config.is_rans() {
            for conn in &self.connections {
                swap_turb_slices(&mut self.blocks, conn, config.ghost_layers);
            }
        }

        if config.is_rans() || phys.chemistry.is_reacting() {
            let Self { blocks, solver, .. } = self;
            for (bb, block) in blocks.iter_mut().enumerate() {
                if block.rank() != rank {
                    continue;
                }
                let diag = solver.as_mut().map(|s| s.a_mut(bb));
                block.calc_src_terms(phys, config, diag);
            }
        }
        Ok(())
    }

    /// 逐块局部时间步（块间独立，并行）
    pub fn calc_time_step(&mut self, config: &SolverConfig, phys: &Physics, iteration: usize) {
        let cfl = config.cfl(iteration);
        self.blocks
            .par_iter_mut()
            .for_each(|block| block.calc_dt(config, phys, cfl));
    }

    /// 加体积 / 时间项并求主对角的逆
    pub fn invert_diagonal(&mut self, config: &SolverConfig) {
        let Self { blocks, solver, .. } = self;
        if let Some(solver) = solver.as_mut() {
            solver.add_diagonal_terms(blocks, config);
            solver.invert();
        }
    }

    /// 初始化解更新
    pub fn initialize_matrix_update(&mut self) {
        if let Some(solver) = self.solver.as_mut() {
            solver.initialize_matrix_update();
        }
    }

    /// 求解器扫掠（每次扫掠后交换解更新幽灵）
    pub fn solver_sweeps(
        &mut self,
        config: &SolverConfig,
        phys: &Physics,
        forcing: Option<&[VarArray3D]>,
    ) {
        let Self {
            blocks,
            solver,
            connections,
            ..
        } = self;
        if let Some(solver) = solver.as_mut() {
            for _ in 0..config.matrix_sweeps {
                solver.sweep(blocks, phys, forcing);
                solver.exchange_update(connections);
            }
        }
    }

    /// 应用更新并累计残差范数；最后一个非线性子迭代时移位时间快照
    pub fn update_blocks(
        &mut self,
        config: &SolverConfig,
        phys: &Physics,
        m: usize,
        rk_stage: usize,
        resid_l2: &mut ResidL2,
        resid_linf: &mut ResidLinf,
    ) -> Result<(), PhysicsError> {
        let Self { blocks, solver, .. } = self;
        for (bb, block) in blocks.iter_mut().enumerate() {
            let du = solver.as_ref().map(|s| s.x(bb));
            block.update(config, phys, du, rk_stage, resid_l2, resid_linf)?;
            if config.is_multilevel_in_time() && m == config.nonlinear_iterations - 1 {
                block.assign_sol_to_time_nm1();
            }
        }
        Ok(())
    }

    /// 当前状态快照到时间 n（每个外层迭代开始时，块间并行）
    pub fn assign_sol_to_time_n(&mut self, phys: &Physics) {
        self.blocks
            .par_iter_mut()
            .for_each(|block| block.assign_sol_to_time_n(phys));
    }

    /// 一次完整的非线性迭代
    ///
    /// 显式路径按 RK 阶段循环；隐式路径做对角求逆、矩阵扫掠与增量
    /// 更新。返回本迭代的残差范数。
    pub fn iterate(
        &mut self,
        config: &SolverConfig,
        phys: &Physics,
        iteration: usize,
    ) -> Result<(ResidL2, ResidLinf), PhysicsError> {
        let rank = 0;
        let mut resid_l2 = ResidL2::new(config.num_equations());
        let mut resid_linf = ResidLinf::default();

        self.assign_sol_to_time_n(phys);

        if config.is_implicit() {
            for m in 0..config.nonlinear_iterations {
                self.get_boundary_conditions(config, phys, rank);
                self.calc_residual(phys, config, rank)?;
                self.calc_time_step(config, phys, iteration);
                for block in &mut self.blocks {
                    block.add_time_discretization(phys, config);
                }
                self.invert_diagonal(config);
                self.initialize_matrix_update();
                self.solver_sweeps(config, phys, None);
                resid_l2.zero();
                resid_linf.zero();
                self.update_blocks(config, phys, m, 0, &mut resid_l2, &mut resid_linf)?;
            }
        } else {
            let stages = config.time_integration.num_stages();
            for stage in 0..stages {
                self.get_boundary_conditions(config, phys, rank);
                self.calc_residual(phys, config, rank)?;
                if stage == 0 {
                    self.calc_time_step(config, phys, iteration);
                }
                resid_l2.zero();
                resid_linf.zero();
                self.update_blocks(config, phys, 0, stage, &mut resid_l2, &mut resid_linf)?;
            }
        }

        Ok((resid_l2, resid_linf))
    }
}
