// crates/sf_physics/src/block.rs

//! 块内核
//!
//! 一个结构块的全部状态、几何与元数据，以及围绕它的逐迭代操作：
//! 幽灵填充、三族面的无黏/黏性通量遍历、替代控制体梯度累加、
//! 源项、局部时间步与显式/隐式状态更新、连接切片交换、切分/拼接
//! 与单元到节点的转换。
//!
//! 每迭代的状态机：重置残差与梯度 → 无黏幽灵 → 无黏通量 →
//! [黏性幽灵 → 辅助量 → 黏性通量 | 仅梯度] → 源项 → 连接交换 →
//! 对角 → 求解 → 原始量更新。

use glam::{DMat3, DVec3};

use sf_config::{
    BcKind, FaceReconstruction, SolverConfig, TimeIntegration, ViscousFaceReconstruction,
};
use sf_grid::{
    Array3D, BlockBoundaries, BlockGeometry, BoundarySurface, Connection, Direction, NodeBlock,
    Side, SurfaceClass, VarArray3D,
};

use crate::error::PhysicsError;
use crate::flux::{
    inviscid_spectral_radius, turb_spectral_radius, turb_viscous_spectral_radius, viscous_flux,
    viscous_spectral_radius, wall_flux, ViscousFaceInput,
};
use crate::ghost::{
    characteristic_ghost, pressure_outlet_ghost, slip_wall_ghost, stagnation_inlet_ghost,
    supersonic_outflow_ghost, viscous_wall_ghost, NondimBcState, NonreflectingContext,
};
use crate::gradient::{scalar_grad_gg, vector_grad_gg, FaceGradients};
use crate::limiter::{create_limiter, Limiter};
use crate::linear::DiagStore;
use crate::physics::Physics;
use crate::reconstruction::{muscl_face, weno_face};
use crate::residual::{ResidL2, ResidLinf};
use crate::riemann::{
    create_riemann_solver, numerical_flux_jacobian, rusanov_jacobian_bound, RiemannSolver,
};
use crate::spatial::PointCloud;
use crate::spectral::UncoupledScalar;
use crate::state::{Conserved, Primitive, StateLayout, StateVec};
use crate::wall::{update_wall_vars, WallData, WallFaceInput};

use sf_config::InitialConditionSpec;

/// RK4 低存储系数
const RK4_ALPHA: [f64; 4] = [0.25, 1.0 / 3.0, 0.5, 1.0];

// ============================================================
// 空间格式
// ============================================================

/// 面重构与黎曼求解器的组合
pub struct SpatialScheme {
    /// 黎曼求解器
    pub riemann: Box<dyn RiemannSolver>,
    /// 斜率限制器
    pub limiter: Box<dyn Limiter>,
    /// 重构格式
    pub reconstruction: FaceReconstruction,
    /// 黏性面重构
    pub viscous_reconstruction: ViscousFaceReconstruction,
}

impl SpatialScheme {
    /// 由配置构造（黎曼求解器固定为 Roe，Rusanov 作谱界）
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            riemann: create_riemann_solver("roe").expect("roe always available"),
            limiter: create_limiter(config.limiter),
            reconstruction: config.face_reconstruction,
            viscous_reconstruction: config.viscous_face_reconstruction,
        }
    }
}

// ============================================================
// 块
// ============================================================

/// 一个结构块
pub struct Block {
    id: usize,
    parent: usize,
    rank: usize,
    local_pos: usize,
    layout: StateLayout,
    ghosts: usize,

    nodes: NodeBlock,
    geom: BlockGeometry,
    bounds: BlockBoundaries,
    walls: Vec<WallData>,
    bc_states: Vec<(i32, NondimBcState)>,

    /// 原始状态（带幽灵）
    state: VarArray3D,
    /// 时间 n 的守恒状态
    sol_n: VarArray3D,
    /// 时间 n−1 的守恒状态
    sol_nm1: VarArray3D,
    /// 残差累加器
    residual: VarArray3D,
    /// 局部时间步
    dt: Array3D<f64>,
    /// 谱半径（流动 / 湍流非耦合）
    spec_rad: Array3D<UncoupledScalar>,

    /// 速度梯度张量
    vel_grad: Array3D<DMat3>,
    /// 温度梯度
    temp_grad: Array3D<DVec3>,
    /// 密度梯度
    density_grad: Array3D<DVec3>,
    /// 压力梯度
    pressure_grad: Array3D<DVec3>,
    /// 湍动能梯度
    tke_grad: Array3D<DVec3>,
    /// 比耗散率梯度
    omega_grad: Array3D<DVec3>,
    /// 组分质量分数梯度
    mf_grad: Vec<Array3D<DVec3>>,

    /// 涡黏性
    eddy_visc: Array3D<f64>,
    /// 混合函数 f1
    f1: Array3D<f64>,
    /// 混合函数 f2
    f2: Array3D<f64>,
    /// 温度缓存
    temperature: Array3D<f64>,
    /// 层流黏性缓存
    viscosity: Array3D<f64>,
    /// 壁面距离
    wall_dist: Array3D<f64>,
}

impl Block {
    /// 构造：派生几何、建立壁面数据、分配场
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nodes: NodeBlock,
        bounds: BlockBoundaries,
        id: usize,
        parent: usize,
        rank: usize,
        local_pos: usize,
        config: &SolverConfig,
        phys: &Physics,
    ) -> Result<Self, PhysicsError> {
        let g = config.ghost_layers;
        let geom = BlockGeometry::from_nodes(&nodes, g, id)?;
        let (ni, nj, nk) = (
            nodes.num_cells_i(),
            nodes.num_cells_j(),
            nodes.num_cells_k(),
        );
        let layout = phys.layout;
        let n_eq = layout.size();

        let bc_states: Vec<(i32, NondimBcState)> = config
            .boundary_states
            .iter()
            .map(|s| (s.tag(), NondimBcState::from_spec(s, phys)))
            .collect();

        let walls = bounds
            .viscous_surfaces()
            .map(|surf| {
                let spec = bc_states.iter().find(|(tag, _)| *tag == surf.tag);
                let (wall_law, velocity, temperature, heat_flux) = match spec {
                    Some((
                        _,
                        NondimBcState::ViscousWall {
                            temperature,
                            velocity,
                            heat_flux,
                            wall_law,
                        },
                    )) => (*wall_law, *velocity, *temperature, *heat_flux),
                    _ => (false, DVec3::ZERO, None, 0.0),
                };
                WallData::new(
                    surf.clone(),
                    wall_law,
                    velocity,
                    temperature,
                    heat_flux,
                    layout.num_species(),
                )
            })
            .collect();

        Ok(Self {
            id,
            parent,
            rank,
            local_pos,
            layout,
            ghosts: g,
            nodes,
            geom,
            bounds,
            walls,
            bc_states,
            state: VarArray3D::new(ni, nj, nk, g, n_eq),
            sol_n: VarArray3D::new(ni, nj, nk, 0, n_eq),
            sol_nm1: VarArray3D::new(ni, nj, nk, 0, n_eq),
            residual: VarArray3D::new(ni, nj, nk, 0, n_eq),
            dt: Array3D::new(ni, nj, nk, 0),
            spec_rad: Array3D::new(ni, nj, nk, 0),
            vel_grad: Array3D::filled(ni, nj, nk, g, DMat3::ZERO),
            temp_grad: Array3D::new(ni, nj, nk, g),
            density_grad: Array3D::new(ni, nj, nk, g),
            pressure_grad: Array3D::new(ni, nj, nk, g),
            tke_grad: Array3D::new(ni, nj, nk, g),
            omega_grad: Array3D::new(ni, nj, nk, g),
            mf_grad: vec![Array3D::new(ni, nj, nk, g); layout.num_species()],
            eddy_visc: Array3D::new(ni, nj, nk, g),
            f1: Array3D::new(ni, nj, nk, g),
            f2: Array3D::new(ni, nj, nk, g),
            temperature: Array3D::new(ni, nj, nk, g),
            viscosity: Array3D::new(ni, nj, nk, g),
            wall_dist: Array3D::filled(ni, nj, nk, g, 1.0e30),
        })
    }

    // --------------------------------------------------------
    // 访问器
    // --------------------------------------------------------

    /// 全局块序号
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// 父块序号（切分前的原块）
    #[inline]
    pub fn parent(&self) -> usize {
        self.parent
    }

    /// 所属 rank
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// rank 内局部序号
    #[inline]
    pub fn local_position(&self) -> usize {
        self.local_pos
    }

    /// 状态布局
    #[inline]
    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// 物理单元数
    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.state.ni(), self.state.nj(), self.state.nk())
    }

    /// 幽灵层厚度
    #[inline]
    pub fn ghosts(&self) -> usize {
        self.ghosts
    }

    /// 几何
    #[inline]
    pub fn geometry(&self) -> &BlockGeometry {
        &self.geom
    }

    /// 可变几何（连接几何交换用）
    #[inline]
    pub fn geometry_mut(&mut self) -> &mut BlockGeometry {
        &mut self.geom
    }

    /// 节点
    #[inline]
    pub fn nodes(&self) -> &NodeBlock {
        &self.nodes
    }

    /// 边界表
    #[inline]
    pub fn boundaries(&self) -> &BlockBoundaries {
        &self.bounds
    }

    /// 壁面数据
    #[inline]
    pub fn walls(&self) -> &[WallData] {
        &self.walls
    }

    /// 单元的原始状态
    #[inline]
    pub fn prim_at(&self, i: isize, j: isize, k: isize) -> Primitive {
        Primitive::from_slice(self.state.cell(i, j, k), self.layout.num_species())
    }

    /// 写入单元原始状态
    #[inline]
    pub fn set_prim(&mut self, i: isize, j: isize, k: isize, prim: &Primitive) {
        self.state.insert_cell(i, j, k, prim.as_slice());
    }

    /// 原始状态容器
    #[inline]
    pub fn state(&self) -> &VarArray3D {
        &self.state
    }

    /// 残差容器
    #[inline]
    pub fn residual(&self) -> &VarArray3D {
        &self.residual
    }

    /// 单元残差
    #[inline]
    pub fn residual_at(&self, cell: (isize, isize, isize)) -> &[f64] {
        self.residual.cell(cell.0, cell.1, cell.2)
    }

    /// 单元时间步
    #[inline]
    pub fn dt(&self, cell: (isize, isize, isize)) -> f64 {
        *self.dt.get(cell.0, cell.1, cell.2)
    }

    /// 单元谱半径
    #[inline]
    pub fn spectral_radius(&self, cell: (isize, isize, isize)) -> UncoupledScalar {
        *self.spec_rad.get(cell.0, cell.1, cell.2)
    }

    /// 单元壁面距离
    #[inline]
    pub fn wall_distance(&self, cell: (isize, isize, isize)) -> f64 {
        *self.wall_dist.get(cell.0, cell.1, cell.2)
    }

    /// 单元涡黏性
    #[inline]
    pub fn eddy_viscosity(&self, cell: (isize, isize, isize)) -> f64 {
        *self.eddy_visc.get(cell.0, cell.1, cell.2)
    }

    /// 单元速度梯度
    #[inline]
    pub fn velocity_gradient(&self, cell: (isize, isize, isize)) -> DMat3 {
        *self.vel_grad.get(cell.0, cell.1, cell.2)
    }

    /// 温度梯度
    #[inline]
    pub fn temperature_gradient(&self, cell: (isize, isize, isize)) -> DVec3 {
        *self.temp_grad.get(cell.0, cell.1, cell.2)
    }

    /// 密度梯度
    #[inline]
    pub fn density_gradient(&self, cell: (isize, isize, isize)) -> DVec3 {
        *self.density_grad.get(cell.0, cell.1, cell.2)
    }

    /// 压力梯度
    #[inline]
    pub fn pressure_gradient(&self, cell: (isize, isize, isize)) -> DVec3 {
        *self.pressure_grad.get(cell.0, cell.1, cell.2)
    }

    /// 湍流标量梯度
    #[inline]
    pub fn turb_gradients(&self, cell: (isize, isize, isize)) -> (DVec3, DVec3) {
        (
            *self.tke_grad.get(cell.0, cell.1, cell.2),
            *self.omega_grad.get(cell.0, cell.1, cell.2),
        )
    }

    /// 时间 n 的守恒状态
    #[inline]
    pub fn sol_n(&self) -> &VarArray3D {
        &self.sol_n
    }

    /// 时间 n−1 的守恒状态
    #[inline]
    pub fn sol_nm1(&self) -> &VarArray3D {
        &self.sol_nm1
    }

    /// 可变时间快照（重启读取用）
    pub fn sol_n_mut(&mut self) -> &mut VarArray3D {
        &mut self.sol_n
    }

    /// 可变时间 n−1 快照
    pub fn sol_nm1_mut(&mut self) -> &mut VarArray3D {
        &mut self.sol_nm1
    }

    /// 物理单元坐标表
    pub fn phys_cells(&self) -> Vec<(isize, isize, isize)> {
        self.residual.phys_range().iter().collect()
    }

    /// 解更新幽灵寻址范围（线性求解器 X 带 1 层幽灵）
    #[inline]
    pub fn in_update_range(&self, cell: (isize, isize, isize)) -> bool {
        let (ni, nj, nk) = self.dims();
        cell.0 >= -1
            && cell.0 <= ni as isize
            && cell.1 >= -1
            && cell.1 <= nj as isize
            && cell.2 >= -1
            && cell.2 <= nk as isize
    }

    // --------------------------------------------------------
    // 初始化
    // --------------------------------------------------------

    /// 初始化状态
    ///
    /// 均匀初始条件按无量纲化写入全部单元（含幽灵）；
    /// 点云初始条件对每个单元取最近邻播种。
    pub fn initialize_states(
        &mut self,
        config: &SolverConfig,
        phys: &Physics,
    ) -> Result<(), PhysicsError> {
        let spec = InitialConditionSpec::find_for_block(&config.initial_conditions, self.id as i32)
            .cloned()
            .unwrap_or(InitialConditionSpec::Uniform {
                tag: -1,
                density: phys.scales.rho_ref,
                velocity: DVec3::ZERO,
                pressure: phys.scales.p_ref / phys.eos.gamma_ref(),
                turb_intensity: 0.01,
                eddy_visc_ratio: 10.0,
                mass_fractions: Vec::new(),
            });

        match spec {
            InitialConditionSpec::Uniform {
                density,
                velocity,
                pressure,
                turb_intensity,
                eddy_visc_ratio,
                mass_fractions,
                ..
            } => {
                let sc = &phys.scales;
                let mut prim = Primitive::zeros(self.layout);
                let rho = sc.nondim_density(density);
                let fractions = if mass_fractions.is_empty() {
                    let mut f = vec![0.0; self.layout.num_species()];
                    f[0] = 1.0;
                    f
                } else {
                    mass_fractions
                };
                for (s, y) in fractions.iter().enumerate() {
                    prim.as_mut_slice()[s] = rho * y;
                }
                prim.set_velocity(velocity / sc.a_ref);
                prim.set_p(sc.nondim_pressure(pressure));
                if phys.has_turbulence() {
                    prim.apply_farfield_turb(turb_intensity, eddy_visc_ratio, phys);
                }
                // 含幽灵整体同值，避免未填充区域出现非物理状态
                let g = self.ghosts as isize;
                let (ni, nj, nk) = self.dims();
                for kk in -g..nk as isize + g {
                    for jj in -g..nj as isize + g {
                        for ii in -g..ni as isize + g {
                            self.state.insert_cell(ii, jj, kk, prim.as_slice());
                        }
                    }
                }
            }
            InitialConditionSpec::CloudFile { file, .. } => {
                let (points, states) = crate::spatial::read_cloud_file(
                    std::path::Path::new(&file),
                    self.layout,
                    phys,
                )?;
                let cloud = PointCloud::new(&points);
                let g = self.ghosts as isize;
                let (ni, nj, nk) = self.dims();
                for kk in -g..nk as isize + g {
                    for jj in -g..nj as isize + g {
                        for ii in -g..ni as isize + g {
                            let c = *self.geom.centroid.get(ii, jj, kk);
                            let (idx, _) = cloud
                                .nearest(c)
                                .ok_or_else(|| PhysicsError::CloudFile("空点云".to_string()))?;
                            self.state.insert_cell(ii, jj, kk, states[idx].as_slice());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// 当前状态快照到时间 n
    pub fn assign_sol_to_time_n(&mut self, phys: &Physics) {
        for (ii, jj, kk) in self.sol_n.phys_range().iter() {
            let cons = self.prim_at(ii, jj, kk).to_conserved(phys);
            self.sol_n.insert_cell(ii, jj, kk, cons.as_slice());
        }
    }

    /// 时间 n 快照移到时间 n−1
    pub fn assign_sol_to_time_nm1(&mut self) {
        let snapshot = self.sol_n.clone();
        self.sol_nm1 = snapshot;
    }

    /// 更新辅助量：温度与层流黏性缓存（含幽灵）
    pub fn update_auxiliary(&mut self, phys: &Physics) {
        let g = self.ghosts as isize;
        let (ni, nj, nk) = self.dims();
        for kk in -g..nk as isize + g {
            for jj in -g..nj as isize + g {
                for ii in -g..ni as isize + g {
                    let prim = self.prim_at(ii, jj, kk);
                    if prim.rho() <= 0.0 || prim.p() <= 0.0 {
                        continue;
                    }
                    let t = prim.temperature(phys);
                    *self.temperature.get_mut(ii, jj, kk) = t;
                    *self.viscosity.get_mut(ii, jj, kk) =
                        phys.transport.viscosity(t, &prim.mass_fractions());
                }
            }
        }
    }

    /// 由黏性面心树计算壁面距离
    ///
    /// 容差内的轻微负值钳制为零并记录一次警告；物理单元超出容差
    /// 视为致命错误。
    pub fn calc_wall_distance(
        &mut self,
        tree: Option<&PointCloud>,
        config: &SolverConfig,
    ) -> Result<(), PhysicsError> {
        let Some(tree) = tree else {
            self.wall_dist.fill(1.0e30);
            return Ok(());
        };
        let g = self.ghosts as isize;
        let (ni, nj, nk) = self.dims();
        let mut warned = false;
        for kk in -g..nk as isize + g {
            for jj in -g..nj as isize + g {
                for ii in -g..ni as isize + g {
                    // 角部幽灵没有有效几何
                    let outside = [
                        ii < 0 || ii >= ni as isize,
                        jj < 0 || jj >= nj as isize,
                        kk < 0 || kk >= nk as isize,
                    ]
                    .iter()
                    .filter(|o| **o)
                    .count();
                    if outside > 2 {
                        continue;
                    }
                    let c = *self.geom.centroid.get(ii, jj, kk);
                    let dist = tree.nearest(c).map_or(1.0e30, |(_, d)| d);
                    match config.floors.clamp_wall_distance(dist) {
                        Some((d, clamped)) => {
                            if clamped && !warned && outside == 0 {
                                tracing::warn!(
                                    block = self.id,
                                    "壁面距离出现容差内负值，已钳制为零"
                                );
                                warned = true;
                            }
                            *self.wall_dist.get_mut(ii, jj, kk) = d;
                        }
                        None if outside == 0 => {
                            return Err(PhysicsError::NegativeWallDistance {
                                block: self.id,
                                i: ii,
                                j: jj,
                                k: kk,
                                value: dist,
                            });
                        }
                        None => {
                            *self.wall_dist.get_mut(ii, jj, kk) = 0.0;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// 本块黏性壁面的面心（建树用）
    pub fn viscous_face_centers(&self) -> Vec<DVec3> {
        let mut centers = Vec::new();
        for surf in self.bounds.viscous_surfaces() {
            let dir = surf.class.direction();
            let n = self.geom.num_cells(dir);
            let face = surf.face_index(n);
            for (t1, t2) in surf.iter() {
                let (i, j, k) = dir.map(face, t1, t2);
                centers.push(*self.geom.fcenter(dir).get(i, j, k));
            }
        }
        centers
    }

    // --------------------------------------------------------
    // 幽灵填充
    // --------------------------------------------------------

    /// 边界状态记录
    fn bc_state(&self, tag: i32) -> Option<&NondimBcState> {
        self.bc_states
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, s)| s)
    }

    /// 面片外法向单位向量
    fn outward_normal(&self, surf: &BoundarySurface, t1: isize, t2: isize) -> DVec3 {
        let dir = surf.class.direction();
        let n = self.geom.num_cells(dir);
        let face = surf.face_index(n);
        let (i, j, k) = dir.map(face, t1, t2);
        let unit = self.geom.farea(dir).get(i, j, k).unit;
        match surf.class.side() {
            Side::Lower => -unit,
            Side::Upper => unit,
        }
    }

    /// 无黏幽灵（物理边界面片；连接面片跳过）
    pub fn assign_inviscid_ghosts(&mut self, config: &SolverConfig, phys: &Physics) {
        let surfaces: Vec<BoundarySurface> = self
            .bounds
            .surfaces()
            .iter()
            .filter(|s| !s.kind.is_connection())
            .cloned()
            .collect();
        for surf in surfaces {
            // 非反射出口需要面片平均 Mach 数
            let nr_mach = self.patch_mach_average(&surf, phys);
            for (t1, t2) in surf.iter() {
                self.fill_ghost_column(&surf, t1, t2, nr_mach, config, phys);
            }
        }
    }

    /// 面片的面积平均法向 Mach 数（非反射出口用）
    fn patch_mach_average(&self, surf: &BoundarySurface, phys: &Physics) -> f64 {
        let dir = surf.class.direction();
        let n = self.geom.num_cells(dir);
        let face = surf.face_index(n);
        let mut weighted = 0.0;
        let mut area = 0.0;
        for (t1, t2) in surf.iter() {
            let f = dir.map(face, t1, t2);
            let a = self.geom.farea(dir).get(f.0, f.1, f.2);
            let interior = match surf.class.side() {
                Side::Lower => dir.map(0, t1, t2),
                Side::Upper => dir.map(n as isize - 1, t1, t2),
            };
            let prim = self.prim_at(interior.0, interior.1, interior.2);
            let mach = prim.velocity().dot(a.unit) / prim.sos(phys);
            weighted += mach * a.mag;
            area += a.mag;
        }
        if area > 0.0 {
            weighted / area
        } else {
            0.0
        }
    }

    /// 填充一个面片位置的整条幽灵列
    fn fill_ghost_column(
        &mut self,
        surf: &BoundarySurface,
        t1: isize,
        t2: isize,
        patch_mach: f64,
        config: &SolverConfig,
        phys: &Physics,
    ) {
        let dir = surf.class.direction();
        let side = surf.class.side();
        let n = self.geom.num_cells(dir) as isize;
        let normal = self.outward_normal(surf, t1, t2);
        let bc = self.bc_state(surf.tag).cloned();

        for g in 1..=self.ghosts as isize {
            let (ghost_a, donor_a) = match side {
                Side::Lower => (-g, g - 1),
                Side::Upper => (n - 1 + g, n - g),
            };
            let ghost = dir.map(ghost_a, t1, t2);
            let donor = dir.map(donor_a, t1, t2);
            let interior = match side {
                Side::Lower => dir.map(0, t1, t2),
                Side::Upper => dir.map(n - 1, t1, t2),
            };
            let donor_state = self.prim_at(donor.0, donor.1, donor.2);
            let interior_state = self.prim_at(interior.0, interior.1, interior.2);

            let ghost_state = match surf.kind {
                // 壁面类：逐层镜像
                BcKind::SlipWall | BcKind::ViscousWall => slip_wall_ghost(&donor_state, normal),
                // 其余按第 1 层计算、深层常数外推
                _ if g > 1 => {
                    let first = match side {
                        Side::Lower => dir.map(-1, t1, t2),
                        Side::Upper => dir.map(n, t1, t2),
                    };
                    self.prim_at(first.0, first.1, first.2)
                }
                BcKind::SupersonicOutflow => supersonic_outflow_ghost(&interior_state),
                BcKind::Characteristic | BcKind::SupersonicInflow => {
                    match &bc {
                        Some(NondimBcState::Freestream { state, .. }) => {
                            characteristic_ghost(&interior_state, state, normal, phys)
                        }
                        _ => supersonic_outflow_ghost(&interior_state),
                    }
                }
                BcKind::StagnationInlet => match &bc {
                    Some(NondimBcState::Stagnation {
                        p0,
                        t0,
                        direction,
                        turb_intensity,
                        eddy_visc_ratio,
                    }) => stagnation_inlet_ghost(
                        &interior_state,
                        *p0,
                        *t0,
                        *direction,
                        *turb_intensity,
                        *eddy_visc_ratio,
                        phys,
                    ),
                    _ => supersonic_outflow_ghost(&interior_state),
                },
                BcKind::PressureOutlet => match &bc {
                    Some(NondimBcState::PressureOutlet {
                        pressure,
                        nonreflecting,
                        length_scale,
                    }) => {
                        let ctx = if *nonreflecting {
                            let tn = Conserved::from_slice(
                                self.sol_n.cell(interior.0, interior.1, interior.2),
                                self.layout.num_species(),
                            );
                            let tn_prim = if tn.rho() > 0.0 {
                                Primitive::from_conserved(&tn, phys, &config.floors)
                            } else {
                                interior_state.clone()
                            };
                            let vg = *self.vel_grad.get(interior.0, interior.1, interior.2);
                            let vel_n_grad = normal.x * vg.col(0)
                                + normal.y * vg.col(1)
                                + normal.z * vg.col(2);
                            Some(NonreflectingContext {
                                pressure_tn: tn_prim.p(),
                                pressure_grad: *self.pressure_grad.get(
                                    interior.0,
                                    interior.1,
                                    interior.2,
                                ),
                                vel_n_grad,
                                mach_avg: patch_mach,
                                rho_a: interior_state.rho() * interior_state.sos(phys),
                            })
                        } else {
                            None
                        };
                        pressure_outlet_ghost(
                            &interior_state,
                            *pressure,
                            *length_scale,
                            ctx.as_ref(),
                            normal,
                        )
                    }
                    _ => supersonic_outflow_ghost(&interior_state),
                },
                BcKind::Periodic | BcKind::Interblock => continue,
            };
            self.state.insert_cell(ghost.0, ghost.1, ghost.2, ghost_state.as_slice());
        }
    }

    /// 无黏棱幽灵
    ///
    /// 两相邻面片都不是壁或都是壁：等层取两个相邻常规幽灵的平均，
    /// 不等层从层数更深一侧复制；恰有一侧是壁：把壁条件延伸进棱。
    pub fn assign_inviscid_ghost_edges(&mut self, phys: &Physics) {
        self.assign_ghost_edges(phys, false);
    }

    fn assign_ghost_edges(&mut self, phys: &Physics, viscous: bool) {
        let pairs = [
            (Direction::I, Direction::J, Direction::K),
            (Direction::I, Direction::K, Direction::J),
            (Direction::J, Direction::K, Direction::I),
        ];
        let g_max = self.ghosts as isize;

        for (d1, d2, d3) in pairs {
            let n1 = self.geom.num_cells(d1) as isize;
            let n2 = self.geom.num_cells(d2) as isize;
            let n3 = self.geom.num_cells(d3) as isize;
            for s1 in Side::BOTH {
                for s2 in Side::BOTH {
                    for t3 in 0..n3 {
                        for g1 in 1..=g_max {
                            for g2 in 1..=g_max {
                                self.fill_edge_cell(
                                    (d1, s1, g1, n1),
                                    (d2, s2, g2, n2),
                                    d3,
                                    t3,
                                    viscous,
                                    phys,
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_edge_cell(
        &mut self,
        a1: (Direction, Side, isize, isize),
        a2: (Direction, Side, isize, isize),
        d3: Direction,
        t3: isize,
        viscous: bool,
        phys: &Physics,
    ) {
        let (d1, s1, g1, n1) = a1;
        let (d2, s2, g2, n2) = a2;
        let ax1 = match s1 {
            Side::Lower => -g1,
            Side::Upper => n1 - 1 + g1,
        };
        let ax2 = match s2 {
            Side::Lower => -g2,
            Side::Upper => n2 - 1 + g2,
        };
        let edge = compose_ijk(d1, ax1, d2, ax2, d3, t3);

        // 相邻面片（切向坐标钳制进面片覆盖范围查找）
        let surf1 = self.edge_adjacent_surface(d1, s1, d2, ax2.clamp(0, n2 - 1), d3, t3);
        let surf2 = self.edge_adjacent_surface(d2, s2, d1, ax1.clamp(0, n1 - 1), d3, t3);

        // 连接一侧的棱由交换协议填充，不在此覆写
        let is_connection = |s: &Option<BoundarySurface>| {
            s.as_ref().map_or(false, |s| s.kind.is_connection())
        };
        if is_connection(&surf1) || is_connection(&surf2) {
            return;
        }

        let is_wall = |s: &Option<BoundarySurface>| {
            s.as_ref().map_or(false, |s| {
                if viscous {
                    s.kind == BcKind::ViscousWall
                } else {
                    s.kind.is_wall()
                }
            })
        };
        let wall1 = is_wall(&surf1);
        let wall2 = is_wall(&surf2);

        if viscous && !wall1 && !wall2 {
            // 黏性遍历只在涉及黏性壁时覆写
            return;
        }

        let ghost_state: Primitive = if wall1 != wall2 {
            // 恰有一侧是壁：把壁条件延伸进棱
            let (wd, ws, wg, wn, wsurf) = if wall1 {
                (d1, s1, g1, n1, surf1.clone().expect("wall surface"))
            } else {
                (d2, s2, g2, n2, surf2.clone().expect("wall surface"))
            };
            let donor_ax = match ws {
                Side::Lower => wg - 1,
                Side::Upper => wn - wg,
            };
            let donor = replace_component(edge, wd, donor_ax);
            let donor_state = self.prim_at(donor.0, donor.1, donor.2);
            let face_ax = match ws {
                Side::Lower => 0,
                Side::Upper => wn,
            };
            let face = replace_component(edge, wd, face_ax);
            let unit = self.geom.farea(wd).get(face.0, face.1, face.2).unit;
            let normal = match ws {
                Side::Lower => -unit,
                Side::Upper => unit,
            };
            if viscous {
                let wall_idx = self
                    .walls
                    .iter()
                    .position(|w| w.surface == wsurf)
                    .expect("wall data exists");
                // 壁面量取钳制后的面元
                let (wt1, wt2) = self.edge_wall_coords(&wsurf, edge, d3, t3);
                let wall_velocity = self.walls[wall_idx].wall_velocity;
                let isothermal = self.walls[wall_idx].wall_temperature.is_some();
                let vars = self.walls[wall_idx].at(wt1, wt2).clone();
                viscous_wall_ghost(&donor_state, &vars, wall_velocity, isothermal, phys)
            } else {
                slip_wall_ghost(&donor_state, normal)
            }
        } else if g1 == g2 {
            // 等层：两个相邻常规幽灵的平均
            let na = step_toward_interior(edge, d1, s1);
            let nb = step_toward_interior(edge, d2, s2);
            let sa = self.prim_at(na.0, na.1, na.2);
            let sb = self.prim_at(nb.0, nb.1, nb.2);
            average_states(&sa, &sb)
        } else if g1 > g2 {
            // 不等层：从层数更深一侧复制（向浅方向回退一格）
            let src = step_toward_interior(edge, d2, s2);
            self.prim_at(src.0, src.1, src.2)
        } else {
            let src = step_toward_interior(edge, d1, s1);
            self.prim_at(src.0, src.1, src.2)
        };

        self.state
            .insert_cell(edge.0, edge.1, edge.2, ghost_state.as_slice());
    }

    /// 棱单元在壁面数据中的钳制坐标
    fn edge_wall_coords(
        &self,
        surf: &BoundarySurface,
        edge: (isize, isize, isize),
        _d3: Direction,
        _t3: isize,
    ) -> (isize, isize) {
        let (td1, td2) = surf.class.direction().tangential();
        let v1 = td1.component(edge);
        let v2 = td2.component(edge);
        (
            v1.clamp(surf.r1.0 as isize, surf.r1.1 as isize - 1),
            v2.clamp(surf.r2.0 as isize, surf.r2.1 as isize - 1),
        )
    }

    /// 棱相邻的面片
    fn edge_adjacent_surface(
        &self,
        dir: Direction,
        side: Side,
        other_dir: Direction,
        other_coord: isize,
        d3: Direction,
        t3: isize,
    ) -> Option<BoundarySurface> {
        let class = SurfaceClass::from_parts(dir, side);
        let (td1, td2) = dir.tangential();
        let coord = |d: Direction| {
            if d == other_dir {
                other_coord
            } else if d == d3 {
                t3
            } else {
                0
            }
        };
        self.bounds.find(class, coord(td1), coord(td2)).cloned()
    }

    /// 黏性幽灵：更新壁面数据并覆写黏性壁的幽灵列
    pub fn assign_viscous_ghosts(&mut self, config: &SolverConfig, phys: &Physics) {
        let num_walls = self.walls.len();
        for w in 0..num_walls {
            self.update_wall_surface(w, config, phys);
            self.overwrite_viscous_column(w, phys);
        }
        if num_walls > 0 {
            self.assign_ghost_edges(phys, true);
        }
    }

    /// 更新一个壁面片的逐面数据
    fn update_wall_surface(&mut self, wall_idx: usize, _config: &SolverConfig, phys: &Physics) {
        let surf = self.walls[wall_idx].surface.clone();
        let wall_law = self.walls[wall_idx].wall_law;
        let wall_velocity = self.walls[wall_idx].wall_velocity;
        let wall_temperature = self.walls[wall_idx].wall_temperature;
        let dir = surf.class.direction();
        let n = self.geom.num_cells(dir);
        let face = surf.face_index(n);

        for (t1, t2) in surf.iter() {
            let interior_ax = match surf.class.side() {
                Side::Lower => 0,
                Side::Upper => n as isize - 1,
            };
            let cell = dir.map(interior_ax, t1, t2);
            let f = dir.map(face, t1, t2);
            let prim = self.prim_at(cell.0, cell.1, cell.2);

            let fc = *self.geom.fcenter(dir).get(f.0, f.1, f.2);
            let wall_distance = (*self.geom.centroid.get(cell.0, cell.1, cell.2) - fc).length();
            let unit = self.geom.farea(dir).get(f.0, f.1, f.2).unit;

            let rel = prim.velocity() - wall_velocity;
            let tangential_vel = rel - rel.dot(unit) * unit;
            let tangential_dir = if tangential_vel.length() > 1.0e-30 {
                tangential_vel / tangential_vel.length()
            } else {
                DVec3::ZERO
            };

            let t_int = prim.temperature(phys);
            let mf = prim.mass_fractions();
            let input = WallFaceInput {
                tangential_speed: tangential_vel.length(),
                wall_distance,
                density: prim.rho(),
                viscosity: phys.transport.viscosity(t_int, &mf),
                temperature: t_int,
                cp: phys.eos.cp(t_int, &mf),
                prandtl: phys.transport.prandtl(),
                turb_prandtl: phys.transport.turb_prandtl(),
            };
            let mut vars =
                update_wall_vars(&input, tangential_dir, wall_temperature, wall_law, phys);
            vars.mass_fractions = mf.to_vec();
            *self.walls[wall_idx].at_mut(t1, t2) = vars;
        }
    }

    /// 覆写一个黏性壁面片的幽灵列
    fn overwrite_viscous_column(&mut self, wall_idx: usize, phys: &Physics) {
        let surf = self.walls[wall_idx].surface.clone();
        let wall_velocity = self.walls[wall_idx].wall_velocity;
        let isothermal = self.walls[wall_idx].wall_temperature.is_some();
        let dir = surf.class.direction();
        let side = surf.class.side();
        let n = self.geom.num_cells(dir) as isize;

        for (t1, t2) in surf.iter() {
            let vars = self.walls[wall_idx].at(t1, t2).clone();
            for g in 1..=self.ghosts as isize {
                let (ghost_a, donor_a) = match side {
                    Side::Lower => (-g, g - 1),
                    Side::Upper => (n - 1 + g, n - g),
                };
                let ghost = dir.map(ghost_a, t1, t2);
                let donor = dir.map(donor_a, t1, t2);
                let donor_state = self.prim_at(donor.0, donor.1, donor.2);
                let ghost_state =
                    viscous_wall_ghost(&donor_state, &vars, wall_velocity, isothermal, phys);
                self.state
                    .insert_cell(ghost.0, ghost.1, ghost.2, ghost_state.as_slice());
            }
        }
    }

    // --------------------------------------------------------
    // 残差
    // --------------------------------------------------------

    /// 清零残差、谱半径、梯度与湍流缓存
    pub fn reset_residuals_and_gradients(&mut self) {
        self.residual.zero();
        self.spec_rad.fill(UncoupledScalar::ZERO);
        self.vel_grad.fill(DMat3::ZERO);
        self.temp_grad.fill(DVec3::ZERO);
        self.density_grad.fill(DVec3::ZERO);
        self.pressure_grad.fill(DVec3::ZERO);
        self.tke_grad.fill(DVec3::ZERO);
        self.omega_grad.fill(DVec3::ZERO);
        for mg in &mut self.mf_grad {
            mg.fill(DVec3::ZERO);
        }
        self.eddy_visc.fill(0.0);
        self.f1.fill(0.0);
        self.f2.fill(0.0);
    }

    /// 无源残差装配
    ///
    /// 清零后跑三族无黏遍历；黏性方程组接着重填黏性幽灵、更新辅助
    /// 量并跑三族黏性遍历，否则跑三族仅梯度遍历。
    pub fn calc_residual_no_source(
        &mut self,
        phys: &Physics,
        config: &SolverConfig,
        scheme: &SpatialScheme,
        mut diag: Option<&mut DiagStore>,
    ) -> Result<(), PhysicsError> {
        self.reset_residuals_and_gradients();

        for dir in Direction::ALL {
            self.inviscid_flux_pass(dir, phys, config, scheme, diag.as_deref_mut())?;
        }

        if config.is_viscous() {
            self.assign_viscous_ghosts(config, phys);
            self.update_auxiliary(phys);
            for dir in Direction::ALL {
                self.viscous_flux_pass(dir, phys, config, scheme, diag.as_deref_mut());
            }
        } else {
            for dir in Direction::ALL {
                self.gradient_only_pass(dir, phys);
            }
        }
        Ok(())
    }

    /// 面两侧的重构状态
    fn reconstruct_face(
        &self,
        dir: Direction,
        a: isize,
        t1: isize,
        t2: isize,
        scheme: &SpatialScheme,
    ) -> (Primitive, Primitive) {
        let n = self.geom.num_cells(dir) as isize;
        let cell = |ax: isize| {
            let (i, j, k) = dir.map(ax, t1, t2);
            self.prim_at(i, j, k)
        };
        let width = |ax: isize| {
            let (i, j, k) = dir.map(ax, t1, t2);
            *self.geom.width(dir).get(i, j, k)
        };

        match scheme.reconstruction {
            FaceReconstruction::First => (cell(a - 1), cell(a)),
            FaceReconstruction::ThirdOrder => {
                let kappa = scheme.reconstruction.kappa();
                let left = muscl_face(
                    &cell(a - 2),
                    &cell(a - 1),
                    &cell(a),
                    kappa,
                    scheme.limiter.as_ref(),
                );
                let right = muscl_face(
                    &cell(a + 1),
                    &cell(a),
                    &cell(a - 1),
                    kappa,
                    scheme.limiter.as_ref(),
                );
                (left, right)
            }
            FaceReconstruction::Weno | FaceReconstruction::WenoZ => {
                let z = scheme.reconstruction == FaceReconstruction::WenoZ;
                // 近边界降阶到 MUSCL
                let g = self.ghosts as isize;
                if a - 3 < -g || a + 2 >= n + g {
                    let kappa = FaceReconstruction::ThirdOrder.kappa();
                    let left = muscl_face(
                        &cell(a - 2),
                        &cell(a - 1),
                        &cell(a),
                        kappa,
                        scheme.limiter.as_ref(),
                    );
                    let right = muscl_face(
                        &cell(a + 1),
                        &cell(a),
                        &cell(a - 1),
                        kappa,
                        scheme.limiter.as_ref(),
                    );
                    return (left, right);
                }
                let c: Vec<Primitive> = (a - 3..=a + 2).map(cell).collect();
                let w: Vec<f64> = (a - 3..=a + 2).map(width).collect();
                let left = weno_face(
                    [&c[0], &c[1], &c[2], &c[3], &c[4]],
                    [w[0], w[1], w[2], w[3], w[4]],
                    z,
                );
                let right = weno_face(
                    [&c[5], &c[4], &c[3], &c[2], &c[1]],
                    [w[5], w[4], w[3], w[2], w[1]],
                    z,
                );
                (left, right)
            }
        }
    }

    /// 一族面的无黏通量遍历
    fn inviscid_flux_pass(
        &mut self,
        dir: Direction,
        phys: &Physics,
        config: &SolverConfig,
        scheme: &SpatialScheme,
        mut diag: Option<&mut DiagStore>,
    ) -> Result<(), PhysicsError> {
        let n = self.geom.num_cells(dir) as isize;
        let (td1, td2) = dir.tangential();
        let n1 = self.geom.num_cells(td1) as isize;
        let n2 = self.geom.num_cells(td2) as isize;

        for t2 in 0..n2 {
            for t1 in 0..n1 {
                for a in 0..=n {
                    let f = dir.map(a, t1, t2);
                    let area = *self.geom.farea(dir).get(f.0, f.1, f.2);
                    let (left, right) = self.reconstruct_face(dir, a, t1, t2, scheme);

                    // 重构状态的物理性检查
                    for (side_name, s) in [("left", &left), ("right", &right)] {
                        if s.rho() <= 0.0 || s.p() <= 0.0 {
                            let field = if s.rho() <= 0.0 { "rho" } else { "pressure" };
                            tracing::error!(
                                block = self.id,
                                side = side_name,
                                "面重构得到非物理状态"
                            );
                            return Err(PhysicsError::nonphysical(
                                self.id,
                                f,
                                field,
                                if s.rho() <= 0.0 { s.rho() } else { s.p() },
                            ));
                        }
                    }

                    let flux = scheme.riemann.flux(&left, &right, area.unit, phys);
                    let lower = dir.map(a - 1, t1, t2);
                    let upper = dir.map(a, t1, t2);
                    let lower_phys = a >= 1;
                    let upper_phys = a <= n - 1;

                    let scaled: StateVec = flux.iter().map(|v| v * area.mag).collect();
                    if lower_phys {
                        self.residual.add_to_cell(lower.0, lower.1, lower.2, &scaled);
                    }
                    if upper_phys {
                        self.residual
                            .subtract_from_cell(upper.0, upper.1, upper.2, &scaled);
                    }

                    // Rusanov 通量 Jacobian 累加到主对角
                    if let Some(diag) = diag.as_deref_mut() {
                        if lower_phys {
                            let s = self.prim_at(lower.0, lower.1, lower.2);
                            let lam = rusanov_jacobian_bound(&s, area.unit, phys) * area.mag;
                            let lam_t = 0.5 * s.velocity().dot(area.unit).abs() * area.mag;
                            diag.add_scalar(lower, UncoupledScalar::new(lam, lam_t));
                            if config.matrix_solver.is_block_matrix() {
                                let jac = half_signed_jacobian(&s, area, 1.0, phys);
                                diag.add_matrix(lower, &jac);
                            }
                        }
                        if upper_phys {
                            let s = self.prim_at(upper.0, upper.1, upper.2);
                            let lam = rusanov_jacobian_bound(&s, area.unit, phys) * area.mag;
                            let lam_t = 0.5 * s.velocity().dot(area.unit).abs() * area.mag;
                            diag.add_scalar(upper, UncoupledScalar::new(lam, lam_t));
                            if config.matrix_solver.is_block_matrix() {
                                let jac = half_signed_jacobian(&s, area, -1.0, phys);
                                diag.add_matrix(upper, &jac);
                            }
                        }
                    }

                    // 谱半径：每单元只取其上界面（每族一次）
                    if lower_phys {
                        let cell_state = self.prim_at(lower.0, lower.1, lower.2);
                        let lower_face = dir.map(a - 1, t1, t2);
                        let al = *self.geom.farea(dir).get(lower_face.0, lower_face.1, lower_face.2);
                        let flow = inviscid_spectral_radius(&cell_state, &al, &area, phys);
                        let turb = if phys.has_turbulence() {
                            turb_spectral_radius(&cell_state, &al, &area)
                        } else {
                            0.0
                        };
                        *self.spec_rad.get_mut(lower.0, lower.1, lower.2) +=
                            UncoupledScalar::new(flow, turb);
                    }
                }
            }
        }
        Ok(())
    }

    /// 替代控制体的面上梯度
    fn face_gradients(
        &self,
        dir: Direction,
        a: isize,
        t1: isize,
        t2: isize,
        phys: &Physics,
    ) -> (FaceGradients, f64) {
        let lower = dir.map(a - 1, t1, t2);
        let upper = dir.map(a, t1, t2);
        let (td1, td2) = dir.tangential();

        // 轴向两个面：与相邻单元中心重合
        let f_lo = dir.map(a - 1, t1, t2);
        let f_hi = dir.map(a + 1, t1, t2);
        let f_mid = dir.map(a, t1, t2);
        let ail = 0.5
            * (self.geom.farea(dir).get(f_lo.0, f_lo.1, f_lo.2).vector()
                + self.geom.farea(dir).get(f_mid.0, f_mid.1, f_mid.2).vector());
        let aiu = 0.5
            * (self.geom.farea(dir).get(f_mid.0, f_mid.1, f_mid.2).vector()
                + self.geom.farea(dir).get(f_hi.0, f_hi.1, f_hi.2).vector());

        // 切向四个面：落在共享棱的相邻面中心
        let tan_area = |fam: Direction, offset: isize| {
            let e = fam.unit();
            let lo = (
                lower.0 + e.0 * offset,
                lower.1 + e.1 * offset,
                lower.2 + e.2 * offset,
            );
            let up = (
                upper.0 + e.0 * offset,
                upper.1 + e.1 * offset,
                upper.2 + e.2 * offset,
            );
            0.5 * (self.geom.farea(fam).get(lo.0, lo.1, lo.2).vector()
                + self.geom.farea(fam).get(up.0, up.1, up.2).vector())
        };
        let ajl = tan_area(td1, 0);
        let aju = tan_area(td1, 1);
        let akl = tan_area(td2, 0);
        let aku = tan_area(td2, 1);

        let vol = 0.5
            * (self.geom.vol.get(lower.0, lower.1, lower.2)
                + self.geom.vol.get(upper.0, upper.1, upper.2));

        // 10 单元模板的面值
        let prim_l = self.prim_at(lower.0, lower.1, lower.2);
        let prim_u = self.prim_at(upper.0, upper.1, upper.2);
        let tan_avg = |fam: Direction, toward_upper: bool| -> (Primitive, Primitive) {
            let e = fam.unit();
            let shift: isize = if toward_upper { 1 } else { -1 };
            let l2 = (
                lower.0 + e.0 * shift,
                lower.1 + e.1 * shift,
                lower.2 + e.2 * shift,
            );
            let u2 = (
                upper.0 + e.0 * shift,
                upper.1 + e.1 * shift,
                upper.2 + e.2 * shift,
            );
            (self.prim_at(l2.0, l2.1, l2.2), self.prim_at(u2.0, u2.1, u2.2))
        };

        let num_species = self.layout.num_species();
        let mut grads = FaceGradients::zeros(num_species);

        // 每个面值的四元组: (值低, 值高) × 标量抽取器
        let quad_avg = |a: &Primitive, b: &Primitive, c: &Primitive, d: &Primitive, f: &dyn Fn(&Primitive) -> f64| {
            0.25 * (f(a) + f(b) + f(c) + f(d))
        };

        let (j_lo_l, j_lo_u) = tan_avg(td1, false);
        let (j_hi_l, j_hi_u) = tan_avg(td1, true);
        let (k_lo_l, k_lo_u) = tan_avg(td2, false);
        let (k_hi_l, k_hi_u) = tan_avg(td2, true);

        // 标量梯度装配
        let assemble_scalar = |f: &dyn Fn(&Primitive) -> f64| -> DVec3 {
            scalar_grad_gg(
                ail,
                aiu,
                ajl,
                aju,
                akl,
                aku,
                f(&prim_l),
                f(&prim_u),
                quad_avg(&j_lo_l, &j_lo_u, &prim_l, &prim_u, f),
                quad_avg(&j_hi_l, &j_hi_u, &prim_l, &prim_u, f),
                quad_avg(&k_lo_l, &k_lo_u, &prim_l, &prim_u, f),
                quad_avg(&k_hi_l, &k_hi_u, &prim_l, &prim_u, f),
                vol,
            )
        };

        grads.density = assemble_scalar(&|p| p.rho());
        grads.pressure = assemble_scalar(&|p| p.p());
        grads.temperature = assemble_scalar(&|p| p.temperature(phys));
        if phys.has_turbulence() {
            grads.tke = assemble_scalar(&|p| p.tke());
            grads.sdr = assemble_scalar(&|p| p.sdr());
        }
        if num_species > 1 {
            for s in 0..num_species {
                grads.mass_fractions[s] = assemble_scalar(&move |p| p.mass_fraction_n(s));
            }
        }

        // 速度梯度张量
        let vec_quad = |a: &Primitive, b: &Primitive, c: &Primitive, d: &Primitive| {
            0.25 * (a.velocity() + b.velocity() + c.velocity() + d.velocity())
        };
        grads.velocity = vector_grad_gg(
            ail,
            aiu,
            ajl,
            aju,
            akl,
            aku,
            prim_l.velocity(),
            prim_u.velocity(),
            vec_quad(&j_lo_l, &j_lo_u, &prim_l, &prim_u),
            vec_quad(&j_hi_l, &j_hi_u, &prim_l, &prim_u),
            vec_quad(&k_lo_l, &k_lo_u, &prim_l, &prim_u),
            vec_quad(&k_hi_l, &k_hi_u, &prim_l, &prim_u),
            vol,
        );

        (grads, vol)
    }

    /// 黏性面状态（中心重构）
    fn viscous_face_state(
        &self,
        dir: Direction,
        a: isize,
        t1: isize,
        t2: isize,
        fourth: bool,
    ) -> Primitive {
        let cell = |ax: isize| {
            let (i, j, k) = dir.map(ax, t1, t2);
            self.prim_at(i, j, k)
        };
        if fourth {
            // 四点中心
            let c = [cell(a - 2), cell(a - 1), cell(a), cell(a + 1)];
            let coeff = [-1.0 / 16.0, 9.0 / 16.0, 9.0 / 16.0, -1.0 / 16.0];
            let n = c[0].as_slice().len();
            let mut data: StateVec = smallvec::smallvec![0.0; n];
            for (ci, co) in c.iter().zip(coeff) {
                for (d, v) in data.iter_mut().zip(ci.as_slice()) {
                    *d += co * v;
                }
            }
            Primitive::from_slice(&data, self.layout.num_species())
        } else {
            // 两点中心，按单元宽度加权
            let l = cell(a - 1);
            let u = cell(a);
            let (li, lj, lk) = dir.map(a - 1, t1, t2);
            let (ui, uj, uk) = dir.map(a, t1, t2);
            let wl = *self.geom.width(dir).get(li, lj, lk);
            let wu = *self.geom.width(dir).get(ui, uj, uk);
            let denom = (wl + wu).max(1.0e-30);
            let n = l.as_slice().len();
            let mut data: StateVec = smallvec::smallvec![0.0; n];
            for idx in 0..n {
                data[idx] = (l.as_slice()[idx] * wu + u.as_slice()[idx] * wl) / denom;
            }
            Primitive::from_slice(&data, self.layout.num_species())
        }
    }

    /// 面所在黏性壁面片（壁面律旁路判定）
    fn wall_at_face(&self, dir: Direction, a: isize, t1: isize, t2: isize) -> Option<usize> {
        let n = self.geom.num_cells(dir) as isize;
        let side = if a == 0 {
            Side::Lower
        } else if a == n {
            Side::Upper
        } else {
            return None;
        };
        let class = SurfaceClass::from_parts(dir, side);
        self.walls
            .iter()
            .position(|w| w.surface.class == class && w.surface.contains(t1, t2))
    }

    /// 一族面的黏性通量遍历
    fn viscous_flux_pass(
        &mut self,
        dir: Direction,
        phys: &Physics,
        config: &SolverConfig,
        scheme: &SpatialScheme,
        mut diag: Option<&mut DiagStore>,
    ) {
        let n = self.geom.num_cells(dir) as isize;
        let (td1, td2) = dir.tangential();
        let n1 = self.geom.num_cells(td1) as isize;
        let n2 = self.geom.num_cells(td2) as isize;
        let fourth = scheme.viscous_reconstruction == ViscousFaceReconstruction::CentralFourth;

        for t2 in 0..n2 {
            for t1 in 0..n1 {
                for a in 0..=n {
                    let f = dir.map(a, t1, t2);
                    let area = *self.geom.farea(dir).get(f.0, f.1, f.2);
                    let lower = dir.map(a - 1, t1, t2);
                    let upper = dir.map(a, t1, t2);
                    let lower_phys = a >= 1;
                    let upper_phys = a <= n - 1;

                    let (grads, _alt_vol) = self.face_gradients(dir, a, t1, t2, phys);
                    let face_state = self.viscous_face_state(dir, a, t1, t2, fourth);

                    // 面上的黏性、混合函数与涡黏性
                    let mu_face = {
                        let (li, lj, lk) = lower;
                        let (ui, uj, uk) = upper;
                        let wl = *self.geom.width(dir).get(li, lj, lk);
                        let wu = *self.geom.width(dir).get(ui, uj, uk);
                        (self.viscosity.get(li, lj, lk) * wu + self.viscosity.get(ui, uj, uk) * wl)
                            / (wl + wu).max(1.0e-30)
                    };
                    let wd_face = 0.5
                        * (self.wall_dist.get(lower.0, lower.1, lower.2)
                            + self.wall_dist.get(upper.0, upper.1, upper.2));
                    let (f1_face, f2_face, mut_face) = if phys.has_turbulence() {
                        let (f1, f2) = phys.turbulence.blending(
                            &face_state,
                            mu_face,
                            wd_face,
                            grads.tke,
                            grads.sdr,
                        );
                        let mu_t = phys.turbulence.eddy_viscosity(&face_state, &grads.velocity, f2);
                        (f1, f2, mu_t)
                    } else {
                        (0.0, 0.0, 0.0)
                    };

                    // 壁面律旁路：直接使用存储的壁面量
                    let wall_bypass = self.wall_at_face(dir, a, t1, t2).and_then(|w| {
                        let vars = self.walls[w].at(t1, t2);
                        if self.walls[w].wall_law && !vars.switch_to_low_re() {
                            Some(w)
                        } else {
                            None
                        }
                    });

                    let flux: StateVec = if let Some(w) = wall_bypass {
                        let vars = self.walls[w].at(t1, t2).clone();
                        let wall_velocity = self.walls[w].wall_velocity;
                        let interior = if a == 0 { upper } else { lower };
                        let prim = self.prim_at(interior.0, interior.1, interior.2);
                        let rel = prim.velocity() - wall_velocity;
                        let tangential = rel - rel.dot(area.unit) * area.unit;
                        let t_dir = if tangential.length() > 1.0e-30 {
                            tangential / tangential.length()
                        } else {
                            DVec3::ZERO
                        };
                        let sign = if a == 0 { 1.0 } else { -1.0 };
                        wall_flux(&vars, wall_velocity, t_dir, sign, self.layout)
                    } else {
                        let input = ViscousFaceInput {
                            state: &face_state,
                            grads: &grads,
                            mu: mu_face,
                            mu_t: mut_face,
                            f1: f1_face,
                        };
                        viscous_flux(&input, area.unit, phys)
                    };

                    let scaled: StateVec = flux.iter().map(|v| v * area.mag).collect();
                    // 黏性符号与无黏相反
                    if lower_phys {
                        self.residual
                            .subtract_from_cell(lower.0, lower.1, lower.2, &scaled);
                    }
                    if upper_phys {
                        self.residual.add_to_cell(upper.0, upper.1, upper.2, &scaled);
                    }

                    // 每面把 1/6 梯度与面上湍流量分摊给两侧单元
                    for (cell, is_phys) in [(lower, lower_phys), (upper, upper_phys)] {
                        if !is_phys {
                            continue;
                        }
                        self.accumulate_face_shares(cell, &grads, mut_face, f1_face, f2_face);
                    }

                    // 黏性谱半径（上界面，每族一次）
                    if lower_phys {
                        let cell_state = self.prim_at(lower.0, lower.1, lower.2);
                        let lf = dir.map(a - 1, t1, t2);
                        let al = *self.geom.farea(dir).get(lf.0, lf.1, lf.2);
                        let vol = *self.geom.vol.get(lower.0, lower.1, lower.2);
                        let mu_cell = *self.viscosity.get(lower.0, lower.1, lower.2);
                        let v_flow = config.viscous_cfl_factor
                            * viscous_spectral_radius(
                                &cell_state,
                                &al,
                                &area,
                                vol,
                                mu_cell,
                                mut_face,
                                phys,
                            );
                        let v_turb = if phys.has_turbulence() {
                            config.viscous_cfl_factor
                                * turb_viscous_spectral_radius(
                                    &cell_state,
                                    &al,
                                    &area,
                                    vol,
                                    mu_cell,
                                    mut_face,
                                    phys.turbulence.sigma_k(f1_face),
                                )
                        } else {
                            0.0
                        };
                        *self.spec_rad.get_mut(lower.0, lower.1, lower.2) +=
                            UncoupledScalar::new(v_flow, v_turb);
                        if let Some(diag) = diag.as_deref_mut() {
                            diag.add_scalar(lower, UncoupledScalar::new(v_flow, v_turb));
                        }
                    }
                }
            }
        }
    }

    /// 面量的 1/6 分摊
    fn accumulate_face_shares(
        &mut self,
        cell: (isize, isize, isize),
        grads: &FaceGradients,
        mu_t: f64,
        f1: f64,
        f2: f64,
    ) {
        const SIXTH: f64 = 1.0 / 6.0;
        *self.vel_grad.get_mut(cell.0, cell.1, cell.2) += grads.velocity * SIXTH;
        *self.temp_grad.get_mut(cell.0, cell.1, cell.2) += grads.temperature * SIXTH;
        *self.density_grad.get_mut(cell.0, cell.1, cell.2) += grads.density * SIXTH;
        *self.pressure_grad.get_mut(cell.0, cell.1, cell.2) += grads.pressure * SIXTH;
        *self.tke_grad.get_mut(cell.0, cell.1, cell.2) += grads.tke * SIXTH;
        *self.omega_grad.get_mut(cell.0, cell.1, cell.2) += grads.sdr * SIXTH;
        for (mg, g) in self.mf_grad.iter_mut().zip(&grads.mass_fractions) {
            *mg.get_mut(cell.0, cell.1, cell.2) += *g * SIXTH;
        }
        *self.eddy_visc.get_mut(cell.0, cell.1, cell.2) += mu_t * SIXTH;
        *self.f1.get_mut(cell.0, cell.1, cell.2) += f1 * SIXTH;
        *self.f2.get_mut(cell.0, cell.1, cell.2) += f2 * SIXTH;
    }

    /// 一族面的仅梯度遍历（无黏方程组）
    fn gradient_only_pass(&mut self, dir: Direction, phys: &Physics) {
        let n = self.geom.num_cells(dir) as isize;
        let (td1, td2) = dir.tangential();
        let n1 = self.geom.num_cells(td1) as isize;
        let n2 = self.geom.num_cells(td2) as isize;

        for t2 in 0..n2 {
            for t1 in 0..n1 {
                for a in 0..=n {
                    let (grads, _) = self.face_gradients(dir, a, t1, t2, phys);
                    let lower = dir.map(a - 1, t1, t2);
                    let upper = dir.map(a, t1, t2);
                    if a >= 1 {
                        self.accumulate_face_shares(lower, &grads, 0.0, 0.0, 0.0);
                    }
                    if a <= n - 1 {
                        self.accumulate_face_shares(upper, &grads, 0.0, 0.0, 0.0);
                    }
                }
            }
        }
    }

    /// 化学与湍流源项
    ///
    /// 源项乘体积从残差中减去；源谱半径从谱半径中减去（符号反映
    /// 其在左端的位置），隐式时同时累加到主对角。
    pub fn calc_src_terms(
        &mut self,
        phys: &Physics,
        config: &SolverConfig,
        mut diag: Option<&mut DiagStore>,
    ) {
        let reacting = phys.chemistry.is_reacting();
        let turbulent = phys.has_turbulence();
        if !reacting && !turbulent {
            return;
        }
        for cell in self.phys_cells() {
            let prim = self.prim_at(cell.0, cell.1, cell.2);
            let vol = *self.geom.vol.get(cell.0, cell.1, cell.2);
            let mut src: StateVec = smallvec::smallvec![0.0; self.layout.size()];
            let mut src_jac = UncoupledScalar::ZERO;

            if reacting {
                let t = prim.temperature(phys);
                let (chem_src, chem_jac) = phys.chemistry.source(prim.rho_vec(), t);
                for (s, v) in chem_src.iter().enumerate() {
                    src[s] += v;
                }
                src_jac.flow += chem_jac;
            }

            if turbulent {
                let mu = *self.viscosity.get(cell.0, cell.1, cell.2);
                let mu_t = *self.eddy_visc.get(cell.0, cell.1, cell.2);
                let f1 = *self.f1.get(cell.0, cell.1, cell.2);
                let vg = *self.vel_grad.get(cell.0, cell.1, cell.2);
                let gk = *self.tke_grad.get(cell.0, cell.1, cell.2);
                let gw = *self.omega_grad.get(cell.0, cell.1, cell.2);
                let ts = phys.turbulence.source(&prim, &vg, gk, gw, mu, mu_t, f1);
                src[self.layout.turb_index()] = ts.k;
                src[self.layout.turb_index() + 1] = ts.omega;
                src_jac.turb += ts.jacobian;
            }

            let scaled: StateVec = src.iter().map(|v| v * vol).collect();
            self.residual
                .subtract_from_cell(cell.0, cell.1, cell.2, &scaled);
            *self.spec_rad.get_mut(cell.0, cell.1, cell.2) -= src_jac * vol;
            if let Some(diag) = diag.as_deref_mut() {
                // 破坏项 Jacobian 为负，取反后加强对角
                diag.add_scalar(
                    cell,
                    UncoupledScalar::new(-src_jac.flow * vol, -src_jac.turb * vol),
                );
            }
        }
    }

    // --------------------------------------------------------
    // 时间步与更新
    // --------------------------------------------------------

    /// 局部时间步
    ///
    /// 配置了全局 dt 时换算到无量纲使用；否则 dt = CFL·V/谱半径。
    pub fn calc_dt(&mut self, config: &SolverConfig, phys: &Physics, cfl: f64) {
        if !config.is_local_dt() {
            let dt_nd = phys.scales.nondim_time(config.dt);
            self.dt.fill(dt_nd);
            return;
        }
        for cell in self.phys_cells() {
            let vol = *self.geom.vol.get(cell.0, cell.1, cell.2);
            let sr = self.spec_rad.get(cell.0, cell.1, cell.2).max();
            *self.dt.get_mut(cell.0, cell.1, cell.2) = cfl * vol / sr.max(1.0e-30);
        }
    }

    /// 多级时间离散项（隐式 BDF2）
    ///
    /// R += V/Δt·(1.5·U − 2·U_n + 0.5·U_{n−1})；首个时间级
    /// (U == U_n) 时自然为零。
    pub fn add_time_discretization(&mut self, phys: &Physics, config: &SolverConfig) {
        if !config.is_implicit() || !config.is_multilevel_in_time() {
            return;
        }
        for cell in self.phys_cells() {
            let vol = *self.geom.vol.get(cell.0, cell.1, cell.2);
            let dt = *self.dt.get(cell.0, cell.1, cell.2);
            let cons = self.prim_at(cell.0, cell.1, cell.2).to_conserved(phys);
            let un = self.sol_n.cell(cell.0, cell.1, cell.2);
            let unm1 = self.sol_nm1.cell(cell.0, cell.1, cell.2);
            let term: StateVec = cons
                .as_slice()
                .iter()
                .zip(un.iter().zip(unm1))
                .map(|(c, (n, m))| vol / dt * (1.5 * c - 2.0 * n + 0.5 * m))
                .collect();
            self.residual.add_to_cell(cell.0, cell.1, cell.2, &term);
        }
    }

    /// 状态更新
    ///
    /// 显式 Euler、低存储 RK4（α = 1/4, 1/3, 1/2, 1）或隐式
    /// （施加给定的守恒量增量），然后转回原始量并施加下限，
    /// 同时累计 L2 与 L∞ 残差范数。
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        config: &SolverConfig,
        phys: &Physics,
        du: Option<&VarArray3D>,
        rk_stage: usize,
        resid_l2: &mut ResidL2,
        resid_linf: &mut ResidLinf,
    ) -> Result<(), PhysicsError> {
        for cell in self.phys_cells() {
            let vol = *self.geom.vol.get(cell.0, cell.1, cell.2);
            let dt = *self.dt.get(cell.0, cell.1, cell.2);
            let resid = StateVec::from_slice(self.residual.cell(cell.0, cell.1, cell.2));

            let new_prim = match config.time_integration {
                TimeIntegration::ExplicitEuler | TimeIntegration::Rk4 => {
                    let alpha = if config.time_integration == TimeIntegration::Rk4 {
                        RK4_ALPHA[rk_stage.min(3)]
                    } else {
                        1.0
                    };
                    let un = self.sol_n.cell(cell.0, cell.1, cell.2);
                    let updated: StateVec = un
                        .iter()
                        .zip(&resid)
                        .map(|(u, r)| u - alpha * dt / vol * r)
                        .collect();
                    let cons = Conserved::from_slice(&updated, self.layout.num_species());
                    if cons.rho() <= 0.0 {
                        return Err(PhysicsError::nonphysical(self.id, cell, "rho", cons.rho()));
                    }
                    Primitive::from_conserved(&cons, phys, &config.floors)
                }
                TimeIntegration::ImplicitEuler => {
                    let du = du.expect("implicit update requires solver increment");
                    let prim = self.prim_at(cell.0, cell.1, cell.2);
                    prim.update_with_cons_delta(
                        du.cell(cell.0, cell.1, cell.2),
                        phys,
                        &config.floors,
                    )
                }
            };

            // 非物理状态是致命错误
            if !new_prim.is_physical() {
                let field = if new_prim.rho() <= 0.0 {
                    "rho"
                } else if new_prim.p() <= 0.0 {
                    "pressure"
                } else {
                    "state"
                };
                let value = if new_prim.rho() <= 0.0 {
                    new_prim.rho()
                } else {
                    new_prim.p()
                };
                return Err(PhysicsError::nonphysical(self.id, cell, field, value));
            }
            let t = new_prim.temperature(phys);
            if t <= 0.0 {
                return Err(PhysicsError::nonphysical(self.id, cell, "temperature", t));
            }

            self.state
                .insert_cell(cell.0, cell.1, cell.2, new_prim.as_slice());
            resid_l2.add_cell(&resid);
            resid_linf.update(&resid, self.id, cell);
        }
        Ok(())
    }

    // --------------------------------------------------------
    // 切分与拼接
    // --------------------------------------------------------

    /// 沿 dir 在单元索引 index 处切分
    ///
    /// 自身保留下半块，返回上半块；切分面两侧生成 interblock
    /// 面片（标签 `interblock_tag`）。
    pub fn split(
        &mut self,
        dir: Direction,
        index: usize,
        upper_id: usize,
        interblock_tag: i32,
        config: &SolverConfig,
        phys: &Physics,
    ) -> Result<Block, PhysicsError> {
        let dims = self.dims();
        let upper_nodes = self.nodes.split(dir.as_char(), index)?;
        let upper_bounds = self.bounds.split(dir, index, dims, interblock_tag);

        let lower_nodes = self.nodes.clone();
        let lower_bounds = self.bounds.clone();

        let mut lower = Block::new(
            lower_nodes,
            lower_bounds,
            self.id,
            self.parent,
            self.rank,
            self.local_pos,
            config,
            phys,
        )?;
        let mut upper = Block::new(
            upper_nodes,
            upper_bounds,
            upper_id,
            self.parent,
            self.rank,
            self.local_pos,
            config,
            phys,
        )?;

        // 按绝对单元坐标复制场
        let offset = index as isize;
        for cell in self.phys_cells() {
            let axial = dir.component(cell);
            if axial < offset {
                lower.copy_cell_fields_from(self, cell, cell);
            } else {
                let dst = replace_component(cell, dir, axial - offset);
                upper.copy_cell_fields_from(self, cell, dst);
            }
        }

        // 壁面数据按绝对坐标复制
        lower.copy_wall_data_from(self, dir, 0);
        upper.copy_wall_data_from(self, dir, index);

        *self = lower;
        Ok(upper)
    }

    /// 沿 dir 与上半块拼接
    pub fn join(
        &mut self,
        upper: &Block,
        dir: Direction,
        config: &SolverConfig,
        phys: &Physics,
    ) -> Result<(), PhysicsError> {
        let lower_cells = dir.component((
            self.dims().0 as isize,
            self.dims().1 as isize,
            self.dims().2 as isize,
        )) as usize;
        let mut nodes = self.nodes.clone();
        nodes.join(upper.nodes(), dir.as_char())?;
        let mut bounds = self.bounds.clone();
        bounds.join(&upper.bounds, dir, lower_cells);

        let mut joined = Block::new(
            nodes,
            bounds,
            self.id,
            self.parent,
            self.rank,
            self.local_pos,
            config,
            phys,
        )?;

        for cell in self.phys_cells() {
            joined.copy_cell_fields_from(self, cell, cell);
        }
        for cell in upper.phys_cells() {
            let axial = dir.component(cell);
            let dst = replace_component(cell, dir, axial + lower_cells as isize);
            joined.copy_cell_fields_from(upper, cell, dst);
        }
        joined.copy_wall_data_from(self, dir, 0);
        joined.copy_wall_data_from_joined(upper, dir, lower_cells);

        *self = joined;
        Ok(())
    }

    fn copy_cell_fields_from(
        &mut self,
        src: &Block,
        src_cell: (isize, isize, isize),
        dst_cell: (isize, isize, isize),
    ) {
        self.state.insert_cell(
            dst_cell.0,
            dst_cell.1,
            dst_cell.2,
            src.state.cell(src_cell.0, src_cell.1, src_cell.2),
        );
        self.sol_n.insert_cell(
            dst_cell.0,
            dst_cell.1,
            dst_cell.2,
            src.sol_n.cell(src_cell.0, src_cell.1, src_cell.2),
        );
        self.sol_nm1.insert_cell(
            dst_cell.0,
            dst_cell.1,
            dst_cell.2,
            src.sol_nm1.cell(src_cell.0, src_cell.1, src_cell.2),
        );
        *self.wall_dist.get_mut(dst_cell.0, dst_cell.1, dst_cell.2) =
            *src.wall_dist.get(src_cell.0, src_cell.1, src_cell.2);
        *self.dt.get_mut(dst_cell.0, dst_cell.1, dst_cell.2) =
            *src.dt.get(src_cell.0, src_cell.1, src_cell.2);
    }

    fn copy_wall_data_from(&mut self, src: &Block, dir: Direction, offset: usize) {
        for wall in &mut self.walls {
            let Some(src_wall) = src
                .walls
                .iter()
                .find(|w| w.surface.class == wall.surface.class && w.surface.tag == wall.surface.tag)
            else {
                continue;
            };
            let (td1, td2) = wall.surface.class.direction().tangential();
            let shift1 = if td1 == dir { offset as isize } else { 0 };
            let shift2 = if td2 == dir { offset as isize } else { 0 };
            let r1 = wall.surface.r1;
            let r2 = wall.surface.r2;
            for t2 in r2.0 as isize..r2.1 as isize {
                for t1 in r1.0 as isize..r1.1 as isize {
                    let s1 = t1 + shift1;
                    let s2 = t2 + shift2;
                    if src_wall.surface.contains(s1, s2) {
                        *wall.at_mut(t1, t2) = src_wall.at(s1, s2).clone();
                    }
                }
            }
        }
    }

    fn copy_wall_data_from_joined(&mut self, upper: &Block, dir: Direction, lower_cells: usize) {
        for wall in &mut self.walls {
            let Some(src_wall) = upper
                .walls
                .iter()
                .find(|w| w.surface.class == wall.surface.class && w.surface.tag == wall.surface.tag)
            else {
                continue;
            };
            let (td1, td2) = wall.surface.class.direction().tangential();
            let shift1 = if td1 == dir { lower_cells as isize } else { 0 };
            let shift2 = if td2 == dir { lower_cells as isize } else { 0 };
            let r1 = wall.surface.r1;
            let r2 = wall.surface.r2;
            for t2 in r2.0 as isize..r2.1 as isize {
                for t1 in r1.0 as isize..r1.1 as isize {
                    let s1 = t1 - shift1;
                    let s2 = t2 - shift2;
                    if src_wall.surface.contains(s1, s2) {
                        *wall.at_mut(t1, t2) = src_wall.at(s1, s2).clone();
                    }
                }
            }
        }
    }

    // --------------------------------------------------------
    // 单元到节点
    // --------------------------------------------------------

    /// 单元场转节点场
    ///
    /// 节点值为围绕它的八个单元的平均；贡献只取物理单元与面幽灵
    /// （棱、角幽灵排除），除数随贡献数缩减：内部 1/8、块棱 1/6、
    /// 块角 1/4。
    pub fn cell_to_node(&self, values: &VarArray3D) -> VarArray3D {
        let (ni, nj, nk) = self.dims();
        let bs = values.block_size();
        let mut nodes = VarArray3D::new(ni + 1, nj + 1, nk + 1, 0, bs);

        for kk in 0..=nk as isize {
            for jj in 0..=nj as isize {
                for ii in 0..=ni as isize {
                    let mut acc: StateVec = smallvec::smallvec![0.0; bs];
                    let mut count = 0usize;
                    for dk in -1..=0 {
                        for dj in -1..=0 {
                            for di in -1..=0 {
                                let c = (ii + di, jj + dj, kk + dk);
                                let outside = [
                                    c.0 < 0 || c.0 >= ni as isize,
                                    c.1 < 0 || c.1 >= nj as isize,
                                    c.2 < 0 || c.2 >= nk as isize,
                                ]
                                .iter()
                                .filter(|o| **o)
                                .count();
                                // 棱与角幽灵不参与
                                if outside >= 2 {
                                    continue;
                                }
                                for (a, v) in acc.iter_mut().zip(values.cell(c.0, c.1, c.2)) {
                                    *a += v;
                                }
                                count += 1;
                            }
                        }
                    }
                    let inv = 1.0 / count as f64;
                    for a in acc.iter_mut() {
                        *a *= inv;
                    }
                    nodes.insert_cell(ii, jj, kk, &acc);
                }
            }
        }
        nodes
    }
}

// ============================================================
// 连接切片交换
// ============================================================

/// 在连接两侧交换状态切片（含棱延伸）
pub fn swap_state_slices(blocks: &mut [Block], conn: &Connection, ghosts: usize) {
    for pair in conn.cell_pairs_extended(ghosts) {
        let b_val = StateVec::from_slice(blocks[conn.b.block].state.cell(
            pair.b_interior.0,
            pair.b_interior.1,
            pair.b_interior.2,
        ));
        let a_val = StateVec::from_slice(blocks[conn.a.block].state.cell(
            pair.a_interior.0,
            pair.a_interior.1,
            pair.a_interior.2,
        ));
        blocks[conn.a.block]
            .state
            .insert_cell(pair.a_ghost.0, pair.a_ghost.1, pair.a_ghost.2, &b_val);
        blocks[conn.b.block]
            .state
            .insert_cell(pair.b_ghost.0, pair.b_ghost.1, pair.b_ghost.2, &a_val);
    }
}

/// 交换湍流标量切片
pub fn swap_turb_slices(blocks: &mut [Block], conn: &Connection, ghosts: usize) {
    let layout = blocks[conn.a.block].layout;
    if !layout.has_turbulence() {
        return;
    }
    let ti = layout.turb_index();
    for pair in conn.cell_pairs_extended(ghosts) {
        let b_val: StateVec = blocks[conn.b.block].state.cell(
            pair.b_interior.0,
            pair.b_interior.1,
            pair.b_interior.2,
        )[ti..]
            .iter()
            .copied()
            .collect();
        let a_val: StateVec = blocks[conn.a.block].state.cell(
            pair.a_interior.0,
            pair.a_interior.1,
            pair.a_interior.2,
        )[ti..]
            .iter()
            .copied()
            .collect();
        for (t, v) in b_val.iter().enumerate() {
            blocks[conn.a.block]
                .state
                .set(pair.a_ghost.0, pair.a_ghost.1, pair.a_ghost.2, ti + t, *v);
        }
        for (t, v) in a_val.iter().enumerate() {
            blocks[conn.b.block]
                .state
                .set(pair.b_ghost.0, pair.b_ghost.1, pair.b_ghost.2, ti + t, *v);
        }
    }
}

/// 交换壁面距离切片
pub fn swap_wall_dist_slices(blocks: &mut [Block], conn: &Connection, ghosts: usize) {
    for pair in conn.cell_pairs_extended(ghosts) {
        let b_val = *blocks[conn.b.block].wall_dist.get(
            pair.b_interior.0,
            pair.b_interior.1,
            pair.b_interior.2,
        );
        let a_val = *blocks[conn.a.block].wall_dist.get(
            pair.a_interior.0,
            pair.a_interior.1,
            pair.a_interior.2,
        );
        *blocks[conn.a.block]
            .wall_dist
            .get_mut(pair.a_ghost.0, pair.a_ghost.1, pair.a_ghost.2) = b_val;
        *blocks[conn.b.block]
            .wall_dist
            .get_mut(pair.b_ghost.0, pair.b_ghost.1, pair.b_ghost.2) = a_val;
    }
}

/// 交换涡黏性与梯度切片
pub fn swap_eddy_and_gradient_slices(blocks: &mut [Block], conn: &Connection, ghosts: usize) {
    for pair in conn.cell_pairs_extended(ghosts) {
        for into_a in [true, false] {
            let (dst_b, src_b, ghost, interior) = if into_a {
                (
                    conn.a.block,
                    conn.b.block,
                    pair.a_ghost,
                    pair.b_interior,
                )
            } else {
                (
                    conn.b.block,
                    conn.a.block,
                    pair.b_ghost,
                    pair.a_interior,
                )
            };
            let ev = *blocks[src_b].eddy_visc.get(interior.0, interior.1, interior.2);
            let f1 = *blocks[src_b].f1.get(interior.0, interior.1, interior.2);
            let f2 = *blocks[src_b].f2.get(interior.0, interior.1, interior.2);
            let vg = *blocks[src_b].vel_grad.get(interior.0, interior.1, interior.2);
            let tg = *blocks[src_b].temp_grad.get(interior.0, interior.1, interior.2);
            let dg = *blocks[src_b]
                .density_grad
                .get(interior.0, interior.1, interior.2);
            let pg = *blocks[src_b]
                .pressure_grad
                .get(interior.0, interior.1, interior.2);
            let kg = *blocks[src_b].tke_grad.get(interior.0, interior.1, interior.2);
            let wg = *blocks[src_b]
                .omega_grad
                .get(interior.0, interior.1, interior.2);
            let mfg: Vec<DVec3> = blocks[src_b]
                .mf_grad
                .iter()
                .map(|g| *g.get(interior.0, interior.1, interior.2))
                .collect();

            let dst = &mut blocks[dst_b];
            *dst.eddy_visc.get_mut(ghost.0, ghost.1, ghost.2) = ev;
            *dst.f1.get_mut(ghost.0, ghost.1, ghost.2) = f1;
            *dst.f2.get_mut(ghost.0, ghost.1, ghost.2) = f2;
            *dst.vel_grad.get_mut(ghost.0, ghost.1, ghost.2) = vg;
            *dst.temp_grad.get_mut(ghost.0, ghost.1, ghost.2) = tg;
            *dst.density_grad.get_mut(ghost.0, ghost.1, ghost.2) = dg;
            *dst.pressure_grad.get_mut(ghost.0, ghost.1, ghost.2) = pg;
            *dst.tke_grad.get_mut(ghost.0, ghost.1, ghost.2) = kg;
            *dst.omega_grad.get_mut(ghost.0, ghost.1, ghost.2) = wg;
            for (arr, g) in dst.mf_grad.iter_mut().zip(&mfg) {
                *arr.get_mut(ghost.0, ghost.1, ghost.2) = *g;
            }
        }
    }
}

// ============================================================
// 工具
// ============================================================

fn compose_ijk(
    d1: Direction,
    v1: isize,
    d2: Direction,
    v2: isize,
    d3: Direction,
    v3: isize,
) -> (isize, isize, isize) {
    let mut out = (0, 0, 0);
    for (d, v) in [(d1, v1), (d2, v2), (d3, v3)] {
        match d {
            Direction::I => out.0 = v,
            Direction::J => out.1 = v,
            Direction::K => out.2 = v,
        }
    }
    out
}

fn replace_component(
    cell: (isize, isize, isize),
    dir: Direction,
    value: isize,
) -> (isize, isize, isize) {
    let mut out = cell;
    match dir {
        Direction::I => out.0 = value,
        Direction::J => out.1 = value,
        Direction::K => out.2 = value,
    }
    out
}

fn step_toward_interior(
    cell: (isize, isize, isize),
    dir: Direction,
    side: Side,
) -> (isize, isize, isize) {
    let shift = match side {
        Side::Lower => 1,
        Side::Upper => -1,
    };
    let v = dir.component(cell) + shift;
    replace_component(cell, dir, v)
}

fn average_states(a: &Primitive, b: &Primitive) -> Primitive {
    let data: StateVec = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| 0.5 * (x + y))
        .collect();
    Primitive::from_slice(&data, a.layout().num_species())
}

/// 块矩阵模式的半符号 Jacobian: 0.5·(sign·∂F/∂U + λI)·|A|
fn half_signed_jacobian(
    state: &Primitive,
    area: sf_grid::AreaVec,
    sign: f64,
    phys: &Physics,
) -> Vec<f64> {
    let n = state.layout().size();
    let mut jac = numerical_flux_jacobian(state, area.unit, phys);
    let lam = state.velocity().dot(area.unit).abs() + state.sos(phys);
    for (idx, v) in jac.iter_mut().enumerate() {
        *v *= 0.5 * sign * area.mag;
        let row = idx / n;
        let col = idx % n;
        if row == col {
            *v += 0.5 * lam * area.mag;
        }
    }
    jac
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_config::{EquationSet, SurfaceSpec};

    fn slip_box_config(dims: (usize, usize, usize), velocity: DVec3) -> SolverConfig {
        let (ni, nj, nk) = dims;
        let spec = |i: [usize; 2], j: [usize; 2], k: [usize; 2]| SurfaceSpec {
            kind: BcKind::SlipWall,
            i_range: i,
            j_range: j,
            k_range: k,
            tag: 0,
        };
        SolverConfig {
            equation_set: EquationSet::Euler,
            boundary_conditions: vec![vec![
                spec([0, 0], [0, nj], [0, nk]),
                spec([ni, ni], [0, nj], [0, nk]),
                spec([0, ni], [0, 0], [0, nk]),
                spec([0, ni], [nj, nj], [0, nk]),
                spec([0, ni], [0, nj], [0, 0]),
                spec([0, ni], [0, nj], [nk, nk]),
            ]],
            initial_conditions: vec![InitialConditionSpec::Uniform {
                tag: -1,
                density: 1.2256,
                velocity,
                pressure: 101325.0,
                turb_intensity: 0.01,
                eddy_visc_ratio: 10.0,
                mass_fractions: Vec::new(),
            }],
            ..Default::default()
        }
    }

    fn make_block(dims: (usize, usize, usize), config: &SolverConfig, phys: &Physics) -> Block {
        let nodes = NodeBlock::cartesian(dims, DVec3::ZERO, DVec3::ONE);
        let bounds =
            BlockBoundaries::from_specs(&config.boundary_conditions[0], dims).unwrap();
        let mut block = Block::new(nodes, bounds, 0, 0, 0, 0, config, phys).unwrap();
        block.initialize_states(config, phys).unwrap();
        block
    }

    #[test]
    fn test_block_construction_and_init() {
        let config = slip_box_config((4, 3, 2), DVec3::ZERO);
        let phys = Physics::from_config(&config);
        let block = make_block((4, 3, 2), &config, &phys);
        assert_eq!(block.dims(), (4, 3, 2));
        let p = block.prim_at(1, 1, 1);
        assert!((p.rho() - 1.0).abs() < 1e-12);
        assert!(p.is_physical());
    }

    #[test]
    fn test_slip_wall_ghosts_reflect() {
        let config = slip_box_config((4, 3, 2), DVec3::new(100.0, 0.0, 0.0));
        let phys = Physics::from_config(&config);
        let mut block = make_block((4, 3, 2), &config, &phys);
        block.assign_inviscid_ghosts(&config, &phys);

        // i-min 壁：幽灵 u 取反
        let interior = block.prim_at(0, 1, 1);
        let ghost = block.prim_at(-1, 1, 1);
        assert!((ghost.u() + interior.u()).abs() < 1e-13);
        assert!((ghost.rho() - interior.rho()).abs() < 1e-13);
        // 第二层镜像第二个内部单元
        let ghost2 = block.prim_at(-2, 1, 1);
        let interior2 = block.prim_at(1, 1, 1);
        assert!((ghost2.u() + interior2.u()).abs() < 1e-13);
    }

    #[test]
    fn test_uniform_flow_zero_residual() {
        // 封闭滑移盒中均匀平行流的残差为零（x 向速度, 滑移壁平行于流动时）
        let config = slip_box_config((4, 4, 4), DVec3::ZERO);
        let phys = Physics::from_config(&config);
        let scheme = SpatialScheme::from_config(&config);
        let mut block = make_block((4, 4, 4), &config, &phys);
        block.assign_sol_to_time_n(&phys);
        block.assign_inviscid_ghosts(&config, &phys);
        block.assign_inviscid_ghost_edges(&phys);
        block
            .calc_residual_no_source(&phys, &config, &scheme, None)
            .unwrap();

        for cell in block.phys_cells() {
            for (eq, r) in block.residual_at(cell).iter().enumerate() {
                assert!(
                    r.abs() < 1e-11,
                    "cell {cell:?} eq {eq} residual = {r:e}"
                );
            }
        }
    }

    #[test]
    fn test_spectral_radius_and_dt() {
        let config = slip_box_config((4, 4, 4), DVec3::ZERO);
        let phys = Physics::from_config(&config);
        let scheme = SpatialScheme::from_config(&config);
        let mut block = make_block((4, 4, 4), &config, &phys);
        block.assign_sol_to_time_n(&phys);
        block.assign_inviscid_ghosts(&config, &phys);
        block.assign_inviscid_ghost_edges(&phys);
        block
            .calc_residual_no_source(&phys, &config, &scheme, None)
            .unwrap();
        block.calc_dt(&config, &phys, 1.0);

        for cell in block.phys_cells() {
            let sr = block.spectral_radius(cell);
            assert!(sr.flow > 0.0);
            let dt = block.dt(cell);
            // dt = CFL·V/谱半径
            assert!((dt - 1.0 / sr.flow).abs() < 1e-12);
        }
    }

    #[test]
    fn test_explicit_update_preserves_uniform_flow() {
        let config = slip_box_config((4, 4, 4), DVec3::ZERO);
        let phys = Physics::from_config(&config);
        let scheme = SpatialScheme::from_config(&config);
        let mut block = make_block((4, 4, 4), &config, &phys);
        block.assign_sol_to_time_n(&phys);
        block.assign_inviscid_ghosts(&config, &phys);
        block.assign_inviscid_ghost_edges(&phys);
        block
            .calc_residual_no_source(&phys, &config, &scheme, None)
            .unwrap();
        block.calc_dt(&config, &phys, 0.5);

        let before = block.prim_at(2, 2, 2);
        let mut l2 = ResidL2::new(phys.layout.size());
        let mut linf = ResidLinf::default();
        block
            .update(&config, &phys, None, 0, &mut l2, &mut linf)
            .unwrap();
        let after = block.prim_at(2, 2, 2);
        for (a, b) in before.as_slice().iter().zip(after.as_slice()) {
            assert!((a - b).abs() < 1e-11);
        }
    }

    #[test]
    fn test_conservation_over_updates() {
        // 封闭域内小扰动下守恒量的体积加权和不变
        let mut config = slip_box_config((6, 4, 4), DVec3::ZERO);
        config.cfl_start = 0.5;
        config.cfl_max = 0.5;
        let phys = Physics::from_config(&config);
        let scheme = SpatialScheme::from_config(&config);
        let mut block = make_block((6, 4, 4), &config, &phys);

        // 小密度扰动
        let mut prim = block.prim_at(3, 2, 2);
        prim.as_mut_slice()[0] *= 1.001;
        block.set_prim(3, 2, 2, &prim);

        let total_mass = |b: &Block| -> f64 {
            b.phys_cells()
                .iter()
                .map(|c| b.prim_at(c.0, c.1, c.2).rho() * b.geometry().vol.get(c.0, c.1, c.2))
                .sum()
        };
        let m0 = total_mass(&block);

        let mut l2 = ResidL2::new(phys.layout.size());
        let mut linf = ResidLinf::default();
        for _ in 0..5 {
            block.assign_sol_to_time_n(&phys);
            block.assign_inviscid_ghosts(&config, &phys);
            block.assign_inviscid_ghost_edges(&phys);
            block
                .calc_residual_no_source(&phys, &config, &scheme, None)
                .unwrap();
            block.calc_dt(&config, &phys, 0.5);
            block
                .update(&config, &phys, None, 0, &mut l2, &mut linf)
                .unwrap();
        }
        let m1 = total_mass(&block);
        assert!(
            ((m1 - m0) / m0).abs() < 1e-10,
            "mass drift: {m0} -> {m1}"
        );
    }

    #[test]
    fn test_split_join_roundtrip() {
        let config = slip_box_config((6, 4, 2), DVec3::ZERO);
        let phys = Physics::from_config(&config);
        let mut block = make_block((6, 4, 2), &config, &phys);
        // 非均匀场便于检验
        for cell in block.phys_cells() {
            let mut p = block.prim_at(cell.0, cell.1, cell.2);
            let bump = 1.0 + 0.01 * (cell.0 + 2 * cell.1 + 3 * cell.2) as f64;
            p.as_mut_slice()[0] *= bump;
            block.set_prim(cell.0, cell.1, cell.2, &p);
        }
        block.assign_sol_to_time_n(&phys);
        let reference: Vec<StateVec> = block
            .phys_cells()
            .iter()
            .map(|c| StateVec::from_slice(block.state.cell(c.0, c.1, c.2)))
            .collect();

        let upper = block
            .split(Direction::I, 3, 1, 99, &config, &phys)
            .unwrap();
        assert_eq!(block.dims(), (3, 4, 2));
        assert_eq!(upper.dims(), (3, 4, 2));
        block.join(&upper, Direction::I, &config, &phys).unwrap();
        assert_eq!(block.dims(), (6, 4, 2));

        for (cell, expect) in block.phys_cells().iter().zip(&reference) {
            let got = block.state.cell(cell.0, cell.1, cell.2);
            for (g, e) in got.iter().zip(expect) {
                assert!((g - e).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_cell_to_node_constant_field() {
        let config = slip_box_config((3, 3, 3), DVec3::ZERO);
        let phys = Physics::from_config(&config);
        let block = make_block((3, 3, 3), &config, &phys);
        let mut values = VarArray3D::new(3, 3, 3, 2, 1);
        let g = 2isize;
        for kk in -g..5 {
            for jj in -g..5 {
                for ii in -g..5 {
                    values.set(ii, jj, kk, 0, 7.5);
                }
            }
        }
        let nodes = block.cell_to_node(&values);
        for kk in 0..=3 {
            for jj in 0..=3 {
                for ii in 0..=3 {
                    assert!((nodes.at(ii, jj, kk, 0) - 7.5).abs() < 1e-13);
                }
            }
        }
    }
}
