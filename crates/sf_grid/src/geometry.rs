// crates/sf_grid/src/geometry.rs

//! 派生几何量
//!
//! 从节点坐标按六金字塔分解计算单元体积、三族有符号面积矢量
//! （I 面指向 +i，依此类推）、面心、单元中心与单元宽度。
//!
//! 幽灵层几何通过镜像填充：幽灵单元的体积与面积取相邻内部单元的值，
//! 中心沿外法向平移（第 1 层用第一面到第二面的矢量，更深层用内部
//! 单元间矢量）。12 条棱的幽灵由两个相邻已填充面用同一镜像规则拼装，
//! 角部幽灵不定义。

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::array3d::Array3D;
use crate::error::GridError;
use crate::plot3d::{pyramid_volume, NodeBlock};

// ============================================================
// 方向与侧
// ============================================================

/// 索引方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// i 方向
    I,
    /// j 方向
    J,
    /// k 方向
    K,
}

impl Direction {
    /// 全部三个方向
    pub const ALL: [Direction; 3] = [Direction::I, Direction::J, Direction::K];

    /// 将 (轴向, 切向1, 切向2) 映射为 (i, j, k)
    #[inline]
    pub fn map(self, a: isize, t1: isize, t2: isize) -> (isize, isize, isize) {
        match self {
            Direction::I => (a, t1, t2),
            Direction::J => (t1, a, t2),
            Direction::K => (t1, t2, a),
        }
    }

    /// 两个切向方向
    #[inline]
    pub fn tangential(self) -> (Direction, Direction) {
        match self {
            Direction::I => (Direction::J, Direction::K),
            Direction::J => (Direction::I, Direction::K),
            Direction::K => (Direction::I, Direction::J),
        }
    }

    /// 该方向的单位索引增量
    #[inline]
    pub fn unit(self) -> (isize, isize, isize) {
        match self {
            Direction::I => (1, 0, 0),
            Direction::J => (0, 1, 0),
            Direction::K => (0, 0, 1),
        }
    }

    /// 取三元组中该方向的分量
    #[inline]
    pub fn component(self, v: (isize, isize, isize)) -> isize {
        match self {
            Direction::I => v.0,
            Direction::J => v.1,
            Direction::K => v.2,
        }
    }

    /// 方向字符（'i'/'j'/'k'）
    #[inline]
    pub fn as_char(self) -> char {
        match self {
            Direction::I => 'i',
            Direction::J => 'j',
            Direction::K => 'k',
        }
    }
}

/// 边界侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// 低索引侧
    Lower,
    /// 高索引侧
    Upper,
}

impl Side {
    /// 两侧
    pub const BOTH: [Side; 2] = [Side::Lower, Side::Upper];
}

// ============================================================
// 面积矢量
// ============================================================

/// 有符号面积矢量，单位方向与模分开缓存
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaVec {
    /// 单位法向
    pub unit: DVec3,
    /// 面积模
    pub mag: f64,
}

impl Default for AreaVec {
    fn default() -> Self {
        Self {
            unit: DVec3::ZERO,
            mag: 0.0,
        }
    }
}

impl AreaVec {
    /// 从面积矢量构造
    pub fn from_vector(v: DVec3) -> Self {
        let mag = v.length();
        let unit = if mag > 0.0 { v / mag } else { DVec3::ZERO };
        Self { unit, mag }
    }

    /// 完整面积矢量
    #[inline]
    pub fn vector(&self) -> DVec3 {
        self.unit * self.mag
    }
}

// ============================================================
// 块几何
// ============================================================

/// 一个块的全部派生几何
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockGeometry {
    ni: usize,
    nj: usize,
    nk: usize,
    ghosts: usize,
    /// 单元体积
    pub vol: Array3D<f64>,
    /// 单元中心
    pub centroid: Array3D<DVec3>,
    /// I 面面积（指向 +i）
    pub farea_i: Array3D<AreaVec>,
    /// J 面面积（指向 +j）
    pub farea_j: Array3D<AreaVec>,
    /// K 面面积（指向 +k）
    pub farea_k: Array3D<AreaVec>,
    /// I 面面心
    pub fcenter_i: Array3D<DVec3>,
    /// J 面面心
    pub fcenter_j: Array3D<DVec3>,
    /// K 面面心
    pub fcenter_k: Array3D<DVec3>,
    /// i 方向单元宽度
    pub width_i: Array3D<f64>,
    /// j 方向单元宽度
    pub width_j: Array3D<f64>,
    /// k 方向单元宽度
    pub width_k: Array3D<f64>,
}

impl BlockGeometry {
    /// 从节点块派生内部几何并填充幽灵层
    ///
    /// 任一内部单元体积非正时返回 [`GridError::Geometry`]。
    pub fn from_nodes(nodes: &NodeBlock, ghosts: usize, block_id: usize) -> Result<Self, GridError> {
        let ni = nodes.num_cells_i();
        let nj = nodes.num_cells_j();
        let nk = nodes.num_cells_k();

        let mut geom = Self {
            ni,
            nj,
            nk,
            ghosts,
            vol: Array3D::new(ni, nj, nk, ghosts),
            centroid: Array3D::new(ni, nj, nk, ghosts),
            farea_i: Array3D::new(ni + 1, nj, nk, ghosts),
            farea_j: Array3D::new(ni, nj + 1, nk, ghosts),
            farea_k: Array3D::new(ni, nj, nk + 1, ghosts),
            fcenter_i: Array3D::new(ni + 1, nj, nk, ghosts),
            fcenter_j: Array3D::new(ni, nj + 1, nk, ghosts),
            fcenter_k: Array3D::new(ni, nj, nk + 1, ghosts),
            width_i: Array3D::new(ni, nj, nk, ghosts),
            width_j: Array3D::new(ni, nj, nk, ghosts),
            width_k: Array3D::new(ni, nj, nk, ghosts),
        };

        geom.derive_interior(nodes, block_id)?;
        geom.fill_ghost_faces();
        geom.fill_ghost_edges();
        geom.calc_cell_widths();
        Ok(geom)
    }

    /// 物理单元数
    #[inline]
    pub fn num_cells(self: &BlockGeometry, dir: Direction) -> usize {
        match dir {
            Direction::I => self.ni,
            Direction::J => self.nj,
            Direction::K => self.nk,
        }
    }

    /// 幽灵层厚度
    #[inline]
    pub fn ghosts(&self) -> usize {
        self.ghosts
    }

    /// 指定族的面面积
    #[inline]
    pub fn farea(&self, dir: Direction) -> &Array3D<AreaVec> {
        match dir {
            Direction::I => &self.farea_i,
            Direction::J => &self.farea_j,
            Direction::K => &self.farea_k,
        }
    }

    #[inline]
    fn farea_mut(&mut self, dir: Direction) -> &mut Array3D<AreaVec> {
        match dir {
            Direction::I => &mut self.farea_i,
            Direction::J => &mut self.farea_j,
            Direction::K => &mut self.farea_k,
        }
    }

    /// 指定族的面心
    #[inline]
    pub fn fcenter(&self, dir: Direction) -> &Array3D<DVec3> {
        match dir {
            Direction::I => &self.fcenter_i,
            Direction::J => &self.fcenter_j,
            Direction::K => &self.fcenter_k,
        }
    }

    #[inline]
    fn fcenter_mut(&mut self, dir: Direction) -> &mut Array3D<DVec3> {
        match dir {
            Direction::I => &mut self.fcenter_i,
            Direction::J => &mut self.fcenter_j,
            Direction::K => &mut self.fcenter_k,
        }
    }

    /// 指定方向的单元宽度
    #[inline]
    pub fn width(&self, dir: Direction) -> &Array3D<f64> {
        match dir {
            Direction::I => &self.width_i,
            Direction::J => &self.width_j,
            Direction::K => &self.width_k,
        }
    }

    #[inline]
    fn width_mut(&mut self, dir: Direction) -> &mut Array3D<f64> {
        match dir {
            Direction::I => &mut self.width_i,
            Direction::J => &mut self.width_j,
            Direction::K => &mut self.width_k,
        }
    }

    /// 可变面面积（连接交换使用）
    #[inline]
    pub fn farea_mut_pub(&mut self, dir: Direction) -> &mut Array3D<AreaVec> {
        self.farea_mut(dir)
    }

    /// 可变面心（连接交换使用）
    #[inline]
    pub fn fcenter_mut_pub(&mut self, dir: Direction) -> &mut Array3D<DVec3> {
        self.fcenter_mut(dir)
    }

    /// 可变单元宽度（连接交换使用）
    #[inline]
    pub fn width_mut_pub(&mut self, dir: Direction) -> &mut Array3D<f64> {
        self.width_mut(dir)
    }

    // --------------------------------------------------------
    // 内部几何
    // --------------------------------------------------------

    fn derive_interior(&mut self, nodes: &NodeBlock, block_id: usize) -> Result<(), GridError> {
        let (ni, nj, nk) = (self.ni, self.nj, self.nk);

        // 面面积与面心
        for kk in 0..nk {
            for jj in 0..nj {
                for ii in 0..=ni {
                    let a = nodes.node(ii, jj, kk);
                    let b = nodes.node(ii, jj + 1, kk);
                    let c = nodes.node(ii, jj + 1, kk + 1);
                    let d = nodes.node(ii, jj, kk + 1);
                    let (i, j, k) = (ii as isize, jj as isize, kk as isize);
                    *self.farea_i.get_mut(i, j, k) =
                        AreaVec::from_vector(0.5 * (c - a).cross(d - b));
                    *self.fcenter_i.get_mut(i, j, k) = 0.25 * (a + b + c + d);
                }
            }
        }
        for kk in 0..nk {
            for jj in 0..=nj {
                for ii in 0..ni {
                    let a = nodes.node(ii, jj, kk);
                    let b = nodes.node(ii, jj, kk + 1);
                    let c = nodes.node(ii + 1, jj, kk + 1);
                    let d = nodes.node(ii + 1, jj, kk);
                    let (i, j, k) = (ii as isize, jj as isize, kk as isize);
                    *self.farea_j.get_mut(i, j, k) =
                        AreaVec::from_vector(0.5 * (c - a).cross(d - b));
                    *self.fcenter_j.get_mut(i, j, k) = 0.25 * (a + b + c + d);
                }
            }
        }
        for kk in 0..=nk {
            for jj in 0..nj {
                for ii in 0..ni {
                    let a = nodes.node(ii, jj, kk);
                    let b = nodes.node(ii + 1, jj, kk);
                    let c = nodes.node(ii + 1, jj + 1, kk);
                    let d = nodes.node(ii, jj + 1, kk);
                    let (i, j, k) = (ii as isize, jj as isize, kk as isize);
                    *self.farea_k.get_mut(i, j, k) =
                        AreaVec::from_vector(0.5 * (c - a).cross(d - b));
                    *self.fcenter_k.get_mut(i, j, k) = 0.25 * (a + b + c + d);
                }
            }
        }

        // 退化面检查
        for (arr, fam) in [
            (&self.farea_i, 'i'),
            (&self.farea_j, 'j'),
            (&self.farea_k, 'k'),
        ] {
            for (ii, jj, kk) in arr.phys_range().iter() {
                let a = arr.get(ii, jj, kk);
                if !a.mag.is_finite() {
                    return Err(GridError::geometry(
                        block_id,
                        ii,
                        jj,
                        kk,
                        format!("{fam} 面面积退化"),
                    ));
                }
            }
        }

        // 单元中心与体积（六金字塔分解）
        for kk in 0..nk {
            for jj in 0..nj {
                for ii in 0..ni {
                    let n = |di: usize, dj: usize, dk: usize| nodes.node(ii + di, jj + dj, kk + dk);
                    let centroid = 0.125
                        * (n(0, 0, 0)
                            + n(1, 0, 0)
                            + n(0, 1, 0)
                            + n(1, 1, 0)
                            + n(0, 0, 1)
                            + n(1, 0, 1)
                            + n(0, 1, 1)
                            + n(1, 1, 1));

                    // 底面法向指向单元中心时体积为正
                    let vol =
                        // 下 I 面 (+i 指向内部)
                        pyramid_volume(centroid, n(0,0,0), n(0,1,0), n(0,1,1), n(0,0,1))
                        // 上 I 面（反转环向）
                        + pyramid_volume(centroid, n(1,0,0), n(1,0,1), n(1,1,1), n(1,1,0))
                        // 下 J 面
                        + pyramid_volume(centroid, n(0,0,0), n(0,0,1), n(1,0,1), n(1,0,0))
                        // 上 J 面
                        + pyramid_volume(centroid, n(0,1,0), n(1,1,0), n(1,1,1), n(0,1,1))
                        // 下 K 面
                        + pyramid_volume(centroid, n(0,0,0), n(1,0,0), n(1,1,0), n(0,1,0))
                        // 上 K 面
                        + pyramid_volume(centroid, n(0,0,1), n(0,1,1), n(1,1,1), n(1,0,1));

                    let (i, j, k) = (ii as isize, jj as isize, kk as isize);
                    if vol <= 0.0 {
                        return Err(GridError::geometry(
                            block_id,
                            i,
                            j,
                            k,
                            format!("非正单元体积 {vol:e}"),
                        ));
                    }
                    *self.vol.get_mut(i, j, k) = vol;
                    *self.centroid.get_mut(i, j, k) = centroid;
                }
            }
        }
        Ok(())
    }

    // --------------------------------------------------------
    // 幽灵几何：6 个面
    // --------------------------------------------------------

    fn fill_ghost_faces(&mut self) {
        for axis in Direction::ALL {
            let (tan1, tan2) = axis.tangential();
            let n1 = self.num_cells(tan1) as isize;
            let n2 = self.num_cells(tan2) as isize;
            for side in Side::BOTH {
                for t2 in 0..n2 {
                    for t1 in 0..n1 {
                        self.fill_ghost_line(axis, side, t1, t2);
                    }
                }
            }
        }
    }

    /// 沿 axis 在固定切向坐标 (t1, t2) 处填充一条幽灵线
    ///
    /// 镜像规则对面与棱通用：棱填充时切向坐标本身落在另一方向的
    /// 幽灵区，此时读取的是已填充的面幽灵数据。
    fn fill_ghost_line(&mut self, axis: Direction, side: Side, t1: isize, t2: isize) {
        let n = self.num_cells(axis) as isize;
        let g_max = self.ghosts as isize;

        for g in 1..=g_max {
            let (ghost, donor, prev) = match side {
                Side::Lower => (-g, g - 1, -g + 1),
                Side::Upper => (n - 1 + g, n - g, n - 2 + g),
            };
            let ghost_ijk = axis.map(ghost, t1, t2);
            let donor_ijk = axis.map(donor, t1, t2);

            // 体积与面积取相邻内部（或已填充）单元的值
            let vol = *self.vol.get(donor_ijk.0, donor_ijk.1, donor_ijk.2);
            *self.vol.get_mut(ghost_ijk.0, ghost_ijk.1, ghost_ijk.2) = vol;

            // 中心：第 1 层用第一面到第二面矢量，更深层用单元间矢量
            let shift = if g == 1 {
                let (f0, f1) = match side {
                    Side::Lower => (axis.map(0, t1, t2), axis.map(1, t1, t2)),
                    Side::Upper => (axis.map(n, t1, t2), axis.map(n - 1, t1, t2)),
                };
                *self.fcenter(axis).get(f0.0, f0.1, f0.2)
                    - *self.fcenter(axis).get(f1.0, f1.1, f1.2)
            } else {
                let (c0, c1) = match side {
                    Side::Lower => (axis.map(g - 2, t1, t2), axis.map(g - 1, t1, t2)),
                    Side::Upper => (axis.map(n - g + 1, t1, t2), axis.map(n - g, t1, t2)),
                };
                *self.centroid.get(c0.0, c0.1, c0.2) - *self.centroid.get(c1.0, c1.1, c1.2)
            };
            let prev_ijk = axis.map(prev, t1, t2);
            let base = if g == 1 {
                *self.centroid.get(donor_ijk.0, donor_ijk.1, donor_ijk.2)
            } else {
                *self.centroid.get(prev_ijk.0, prev_ijk.1, prev_ijk.2)
            };
            let ghost_centroid = base + shift;
            *self.centroid.get_mut(ghost_ijk.0, ghost_ijk.1, ghost_ijk.2) = ghost_centroid;

            // 轴向外侧面：面积镜像，面心沿外法向平移
            let (ghost_face, src_outer, src_inner, prev_face) = match side {
                Side::Lower => (-g, g, g - 1, -g + 1),
                Side::Upper => (n + g, n - g, n - g + 1, n + g - 1),
            };
            let gf = axis.map(ghost_face, t1, t2);
            let so = axis.map(src_outer, t1, t2);
            let si = axis.map(src_inner, t1, t2);
            let pf = axis.map(prev_face, t1, t2);
            let mirrored = *self.farea(axis).get(so.0, so.1, so.2);
            *self.farea_mut(axis).get_mut(gf.0, gf.1, gf.2) = mirrored;
            let face_shift = *self.fcenter(axis).get(si.0, si.1, si.2)
                - *self.fcenter(axis).get(so.0, so.1, so.2);
            let new_center = *self.fcenter(axis).get(pf.0, pf.1, pf.2) + face_shift;
            *self.fcenter_mut(axis).get_mut(gf.0, gf.1, gf.2) = new_center;

            // 切向面：镜像面积，面心随单元中心平移
            let donor_centroid = *self.centroid.get(donor_ijk.0, donor_ijk.1, donor_ijk.2);
            let t = ghost_centroid - donor_centroid;
            let (b1, b2) = axis.tangential();
            for fam in [b1, b2] {
                let e = fam.unit();
                for offset in 0..2isize {
                    let gface = (
                        ghost_ijk.0 + e.0 * offset,
                        ghost_ijk.1 + e.1 * offset,
                        ghost_ijk.2 + e.2 * offset,
                    );
                    let dface = (
                        donor_ijk.0 + e.0 * offset,
                        donor_ijk.1 + e.1 * offset,
                        donor_ijk.2 + e.2 * offset,
                    );
                    let fa = *self.farea(fam).get(dface.0, dface.1, dface.2);
                    *self.farea_mut(fam).get_mut(gface.0, gface.1, gface.2) = fa;
                    let fc = *self.fcenter(fam).get(dface.0, dface.1, dface.2) + t;
                    *self.fcenter_mut(fam).get_mut(gface.0, gface.1, gface.2) = fc;
                }
            }
        }
    }

    // --------------------------------------------------------
    // 幽灵几何：12 条棱
    // --------------------------------------------------------

    fn fill_ghost_edges(&mut self) {
        let pairs = [
            (Direction::I, Direction::J, Direction::K),
            (Direction::I, Direction::K, Direction::J),
            (Direction::J, Direction::K, Direction::I),
        ];
        let g_max = self.ghosts as isize;

        for (a1, a2, a3) in pairs {
            let n3 = self.num_cells(a3) as isize;
            for s1 in Side::BOTH {
                for s2 in Side::BOTH {
                    let n1 = self.num_cells(a1) as isize;
                    for t3 in 0..n3 {
                        // 先沿 a2 用 a1 幽灵列做镜像（候选 A 直接写入），
                        // 再与沿 a1 的镜像候选 B 取平均。
                        for g1 in 1..=g_max {
                            let axial1 = match s1 {
                                Side::Lower => -g1,
                                Side::Upper => n1 - 1 + g1,
                            };
                            // a1 幽灵列上的 (t1, t2) 映射：a2 为轴, 切向为 (a1, a3) 或 (a3, a1)
                            let (t1, t2) = tangential_coords(a2, a1, axial1, a3, t3);
                            self.fill_ghost_line(a2, s2, t1, t2);
                        }
                        // 候选 B 与平均
                        let n2 = self.num_cells(a2) as isize;
                        for g1 in 1..=g_max {
                            for g2 in 1..=g_max {
                                let axial1 = match s1 {
                                    Side::Lower => -g1,
                                    Side::Upper => n1 - 1 + g1,
                                };
                                let axial2 = match s2 {
                                    Side::Lower => -g2,
                                    Side::Upper => n2 - 1 + g2,
                                };
                                let donor1 = match s1 {
                                    Side::Lower => g1 - 1,
                                    Side::Upper => n1 - g1,
                                };
                                let edge = edge_ijk(a1, axial1, a2, axial2, a3, t3);
                                let donor_b = edge_ijk(a1, donor1, a2, axial2, a3, t3);

                                let vol_a = *self.vol.get(edge.0, edge.1, edge.2);
                                let vol_b = *self.vol.get(donor_b.0, donor_b.1, donor_b.2);
                                *self.vol.get_mut(edge.0, edge.1, edge.2) = 0.5 * (vol_a + vol_b);

                                let c_a = *self.centroid.get(edge.0, edge.1, edge.2);
                                // 候选 B：沿 a1 平移已填充的 a2 幽灵行
                                let shift = if g1 == 1 {
                                    let f0 = edge_ijk(a1, 0, a2, axial2, a3, t3);
                                    let f1 = edge_ijk(a1, 1, a2, axial2, a3, t3);
                                    let n1f = self.num_cells(a1) as isize;
                                    let (f0, f1) = match s1 {
                                        Side::Lower => (f0, f1),
                                        Side::Upper => (
                                            edge_ijk(a1, n1f, a2, axial2, a3, t3),
                                            edge_ijk(a1, n1f - 1, a2, axial2, a3, t3),
                                        ),
                                    };
                                    *self.fcenter(a1).get(f0.0, f0.1, f0.2)
                                        - *self.fcenter(a1).get(f1.0, f1.1, f1.2)
                                } else {
                                    let (d0, d1) = match s1 {
                                        Side::Lower => (g1 - 2, g1 - 1),
                                        Side::Upper => (n1 - g1 + 1, n1 - g1),
                                    };
                                    let c0 = edge_ijk(a1, d0, a2, axial2, a3, t3);
                                    let c1 = edge_ijk(a1, d1, a2, axial2, a3, t3);
                                    *self.centroid.get(c0.0, c0.1, c0.2)
                                        - *self.centroid.get(c1.0, c1.1, c1.2)
                                };
                                let base = if g1 == 1 {
                                    *self.centroid.get(donor_b.0, donor_b.1, donor_b.2)
                                } else {
                                    let prev1 = match s1 {
                                        Side::Lower => -g1 + 1,
                                        Side::Upper => n1 - 2 + g1,
                                    };
                                    let p = edge_ijk(a1, prev1, a2, axial2, a3, t3);
                                    *self.centroid.get(p.0, p.1, p.2)
                                };
                                let c_b = base + shift;
                                *self.centroid.get_mut(edge.0, edge.1, edge.2) =
                                    0.5 * (c_a + c_b);
                            }
                        }
                    }
                }
            }
        }
    }

    // --------------------------------------------------------
    // 单元宽度
    // --------------------------------------------------------

    /// 由相对面面心距离计算单元宽度（物理单元与面幽灵列）
    pub fn calc_cell_widths(&mut self) {
        let g = self.ghosts as isize;
        for axis in Direction::ALL {
            let n = self.num_cells(axis) as isize;
            let (tan1, tan2) = axis.tangential();
            let n1 = self.num_cells(tan1) as isize;
            let n2 = self.num_cells(tan2) as isize;
            for t2 in 0..n2 {
                for t1 in 0..n1 {
                    for a in -g..n + g {
                        let cell = axis.map(a, t1, t2);
                        let f0 = axis.map(a, t1, t2);
                        let f1 = axis.map(a + 1, t1, t2);
                        let w = (*self.fcenter(axis).get(f1.0, f1.1, f1.2)
                            - *self.fcenter(axis).get(f0.0, f0.1, f0.2))
                        .length();
                        *self.width_mut(axis).get_mut(cell.0, cell.1, cell.2) = w;
                    }
                }
            }
            // 其余两个方向的宽度在幽灵列中取施主单元的值
            for side in Side::BOTH {
                for gg in 1..=g {
                    let (ghost, donor) = match side {
                        Side::Lower => (-gg, gg - 1),
                        Side::Upper => (n - 1 + gg, n - gg),
                    };
                    for t2 in 0..n2 {
                        for t1 in 0..n1 {
                            let gc = axis.map(ghost, t1, t2);
                            let dc = axis.map(donor, t1, t2);
                            for fam in [tan1, tan2] {
                                let w = *self.width(fam).get(dc.0, dc.1, dc.2);
                                *self.width_mut(fam).get_mut(gc.0, gc.1, gc.2) = w;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// a2 为轴时，给定 a1 方向坐标 v1 与 a3 方向坐标 v3，返回 (t1, t2)
///
/// `Direction::map` 的切向顺序约定：I→(J,K), J→(I,K), K→(I,J)。
fn tangential_coords(
    axis: Direction,
    d1: Direction,
    v1: isize,
    d3: Direction,
    v3: isize,
) -> (isize, isize) {
    let (ta, tb) = axis.tangential();
    let mut t1 = 0;
    let mut t2 = 0;
    if ta == d1 {
        t1 = v1;
    } else if ta == d3 {
        t1 = v3;
    }
    if tb == d1 {
        t2 = v1;
    } else if tb == d3 {
        t2 = v3;
    }
    (t1, t2)
}

/// 按三个方向的坐标组装 (i, j, k)
fn edge_ijk(
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

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid(n: (usize, usize, usize)) -> BlockGeometry {
        let nodes = NodeBlock::cartesian(n, DVec3::ZERO, DVec3::ONE);
        BlockGeometry::from_nodes(&nodes, 2, 0).unwrap()
    }

    #[test]
    fn test_unit_cell_volume_and_area() {
        let g = unit_grid((4, 4, 4));
        for (ii, jj, kk) in g.vol.phys_range().iter() {
            assert!((g.vol.get(ii, jj, kk) - 1.0).abs() < 1e-13);
        }
        let a = g.farea_i.get(2, 1, 1);
        assert!((a.mag - 1.0).abs() < 1e-13);
        assert!((a.unit - DVec3::X).length() < 1e-13);
        let a = g.farea_j.get(1, 2, 1);
        assert!((a.unit - DVec3::Y).length() < 1e-13);
        let a = g.farea_k.get(1, 1, 2);
        assert!((a.unit - DVec3::Z).length() < 1e-13);
    }

    #[test]
    fn test_centroid_and_face_center() {
        let g = unit_grid((2, 2, 2));
        assert!((*g.centroid.get(0, 0, 0) - DVec3::splat(0.5)).length() < 1e-13);
        assert!((*g.fcenter_i.get(1, 0, 0) - DVec3::new(1.0, 0.5, 0.5)).length() < 1e-13);
    }

    #[test]
    fn test_negative_volume_detected() {
        // 退化节点块：所有节点重合
        let nodes = NodeBlock::cartesian((2, 2, 2), DVec3::ZERO, DVec3::ZERO);
        assert!(matches!(
            BlockGeometry::from_nodes(&nodes, 1, 0),
            Err(GridError::Geometry { .. })
        ));
    }

    #[test]
    fn test_ghost_mirror_volume_and_centroid() {
        let g = unit_grid((4, 3, 2));
        // 第 1、2 层幽灵体积取相邻内部单元
        assert!((g.vol.get(-1, 1, 1) - 1.0).abs() < 1e-13);
        assert!((g.vol.get(-2, 1, 1) - 1.0).abs() < 1e-13);
        assert!((g.vol.get(5, 1, 1) - 1.0).abs() < 1e-13);
        // 幽灵中心外推
        assert!((*g.centroid.get(-1, 1, 1) - DVec3::new(-0.5, 1.5, 1.5)).length() < 1e-12);
        assert!((*g.centroid.get(-2, 1, 1) - DVec3::new(-1.5, 1.5, 1.5)).length() < 1e-12);
        assert!((*g.centroid.get(4, 0, 0) - DVec3::new(4.5, 0.5, 0.5)).length() < 1e-12);
        assert!((*g.centroid.get(5, 0, 0) - DVec3::new(5.5, 0.5, 0.5)).length() < 1e-12);
    }

    #[test]
    fn test_ghost_face_geometry() {
        let g = unit_grid((4, 3, 2));
        // 幽灵列的轴向面
        assert!((*g.fcenter_i.get(-1, 1, 1) - DVec3::new(-1.0, 1.5, 1.5)).length() < 1e-12);
        assert!((g.farea_i.get(-1, 1, 1).mag - 1.0).abs() < 1e-13);
        // 幽灵列的切向面
        assert!((g.farea_j.get(-1, 1, 1).mag - 1.0).abs() < 1e-13);
        assert!((*g.fcenter_j.get(-1, 1, 1) - DVec3::new(-0.5, 1.0, 1.5)).length() < 1e-12);
    }

    #[test]
    fn test_edge_ghost_assembled() {
        let g = unit_grid((4, 3, 2));
        // i-low / j-low 棱
        assert!((g.vol.get(-1, -1, 0) - 1.0).abs() < 1e-13);
        assert!((*g.centroid.get(-1, -1, 0) - DVec3::new(-0.5, -0.5, 0.5)).length() < 1e-12);
        assert!((g.vol.get(-2, -2, 1) - 1.0).abs() < 1e-13);
        assert!((*g.centroid.get(-2, -2, 1) - DVec3::new(-1.5, -1.5, 1.5)).length() < 1e-12);
        // i-high / k-high 棱
        assert!((*g.centroid.get(4, 1, 2) - DVec3::new(4.5, 1.5, 2.5)).length() < 1e-12);
    }

    #[test]
    fn test_cell_widths() {
        let nodes = NodeBlock::cartesian((3, 3, 3), DVec3::ZERO, DVec3::new(2.0, 1.0, 0.5));
        let g = BlockGeometry::from_nodes(&nodes, 2, 0).unwrap();
        assert!((g.width_i.get(1, 1, 1) - 2.0).abs() < 1e-13);
        assert!((g.width_j.get(1, 1, 1) - 1.0).abs() < 1e-13);
        assert!((g.width_k.get(1, 1, 1) - 0.5).abs() < 1e-13);
        // 幽灵列宽度镜像
        assert!((g.width_i.get(-1, 1, 1) - 2.0).abs() < 1e-13);
        assert!((g.width_i.get(-2, 0, 0) - 2.0).abs() < 1e-13);
    }

    #[test]
    fn test_face_area_antisymmetry() {
        // 同一 I 面从两侧看面积矢量互为相反数（同一存储，符号由使用方向决定）
        let g = unit_grid((3, 3, 3));
        let a = g.farea_i.get(1, 1, 1).vector();
        assert!((a - DVec3::X).length() < 1e-13);
    }

    #[test]
    fn test_volume_positive_when_faces_nonzero() {
        let g = unit_grid((3, 3, 3));
        for (ii, jj, kk) in g.vol.phys_range().iter() {
            let faces_ok = g.farea_i.get(ii, jj, kk).mag > 0.0
                && g.farea_i.get(ii + 1, jj, kk).mag > 0.0
                && g.farea_j.get(ii, jj, kk).mag > 0.0
                && g.farea_j.get(ii, jj + 1, kk).mag > 0.0
                && g.farea_k.get(ii, jj, kk).mag > 0.0
                && g.farea_k.get(ii, jj, kk + 1).mag > 0.0;
            assert!(faces_ok);
            assert!(*g.vol.get(ii, jj, kk) > 0.0);
        }
    }
}
