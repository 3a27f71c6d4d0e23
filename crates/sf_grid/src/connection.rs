// crates/sf_grid/src/connection.rs

//! 块间连接
//!
//! 连接由两个面片与一个相对朝向组成，持有块序号与索引范围，
//! 从不持有状态。8 种朝向 = 切向交换 × 两个切向的反转；
//! 法向（方向 3）随对侧连接自然反转，由面深度索引表达。

use glam::DVec3;
use serde::{Deserialize, Serialize};

use sf_config::BcKind;

use crate::boundary::{BlockBoundaries, BoundarySurface, SurfaceClass};
use crate::error::GridError;
use crate::geometry::{BlockGeometry, Direction, Side};

// ============================================================
// 朝向
// ============================================================

/// 面片间相对朝向（8 种之一）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Orientation {
    /// 交换两个切向
    pub swap: bool,
    /// 反转目标面片第一切向
    pub reverse_d1: bool,
    /// 反转目标面片第二切向
    pub reverse_d2: bool,
}

impl Orientation {
    /// 恒等朝向
    pub const IDENTITY: Self = Self {
        swap: false,
        reverse_d1: false,
        reverse_d2: false,
    };

    /// 全部 8 种朝向
    pub fn all() -> [Orientation; 8] {
        let mut out = [Orientation::IDENTITY; 8];
        let mut n = 0;
        for swap in [false, true] {
            for reverse_d1 in [false, true] {
                for reverse_d2 in [false, true] {
                    out[n] = Orientation {
                        swap,
                        reverse_d1,
                        reverse_d2,
                    };
                    n += 1;
                }
            }
        }
        out
    }

    /// 将 A 面片的相对切向坐标映射到 B 面片
    ///
    /// `dims_b` 为 B 面片的切向范围大小。坐标允许越界（棱延伸），
    /// 反转规则对越界坐标同样成立。
    #[inline]
    pub fn apply(&self, u1: isize, u2: isize, dims_b: (usize, usize)) -> (isize, isize) {
        let (mut v1, mut v2) = if self.swap { (u2, u1) } else { (u1, u2) };
        if self.reverse_d1 {
            v1 = dims_b.0 as isize - 1 - v1;
        }
        if self.reverse_d2 {
            v2 = dims_b.1 as isize - 1 - v2;
        }
        (v1, v2)
    }
}

// ============================================================
// 面片与连接
// ============================================================

/// 连接的一侧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSide {
    /// 全局块序号
    pub block: usize,
    /// 面片类
    pub class: SurfaceClass,
    /// 第一切向单元范围 [start, end)
    pub r1: (usize, usize),
    /// 第二切向单元范围 [start, end)
    pub r2: (usize, usize),
    /// 法向方向的单元数
    pub num_normal: usize,
}

impl PatchSide {
    /// 切向范围大小
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.r1.1 - self.r1.0, self.r2.1 - self.r2.0)
    }

    /// 深度 d（0 基）处的内部单元轴向索引
    #[inline]
    pub fn interior_axial(&self, depth: usize) -> isize {
        match self.class.side() {
            Side::Lower => depth as isize,
            Side::Upper => self.num_normal as isize - 1 - depth as isize,
        }
    }

    /// 第 g 层（1 基）幽灵单元轴向索引
    #[inline]
    pub fn ghost_axial(&self, layer: usize) -> isize {
        match self.class.side() {
            Side::Lower => -(layer as isize),
            Side::Upper => self.num_normal as isize - 1 + layer as isize,
        }
    }

    /// 深度 d 处（从共享面算起第 d 个）的法向面轴向索引
    #[inline]
    pub fn interior_face_axial(&self, depth: usize) -> isize {
        match self.class.side() {
            Side::Lower => depth as isize,
            Side::Upper => self.num_normal as isize - depth as isize,
        }
    }

    /// 第 g 层幽灵单元的外侧法向面轴向索引
    #[inline]
    pub fn ghost_face_axial(&self, layer: usize) -> isize {
        match self.class.side() {
            Side::Lower => -(layer as isize),
            Side::Upper => self.num_normal as isize + layer as isize,
        }
    }

    /// 相对切向坐标转块内 (i, j, k)
    #[inline]
    pub fn cell_ijk(&self, axial: isize, u1: isize, u2: isize) -> (isize, isize, isize) {
        let t1 = self.r1.0 as isize + u1;
        let t2 = self.r2.0 as isize + u2;
        self.class.direction().map(axial, t1, t2)
    }

    fn from_surface(surface: &BoundarySurface, block: usize, dims: (usize, usize, usize)) -> Self {
        let n = match surface.class.direction() {
            Direction::I => dims.0,
            Direction::J => dims.1,
            Direction::K => dims.2,
        };
        Self {
            block,
            class: surface.class,
            r1: surface.r1,
            r2: surface.r2,
            num_normal: n,
        }
    }
}

/// 块间连接记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// 第一侧（全局块序靠前）
    pub a: PatchSide,
    /// 第二侧
    pub b: PatchSide,
    /// A 坐标到 B 坐标的朝向
    pub orientation: Orientation,
    /// 是否周期连接
    pub periodic: bool,
}

/// 交换中的一对单元
#[derive(Debug, Clone, Copy)]
pub struct CellPair {
    /// A 侧内部单元
    pub a_interior: (isize, isize, isize),
    /// A 侧幽灵单元
    pub a_ghost: (isize, isize, isize),
    /// B 侧内部单元
    pub b_interior: (isize, isize, isize),
    /// B 侧幽灵单元
    pub b_ghost: (isize, isize, isize),
    /// 相对面片核心的切向越界方向（棱延伸），核心内为 None
    pub edge_dir: Option<(Direction, Direction)>,
}

impl Connection {
    /// 连接是否涉及给定块
    pub fn involves(&self, block: usize) -> bool {
        self.a.block == block || self.b.block == block
    }

    /// 核心单元配对（不含棱延伸），layer 1..=ghosts
    pub fn cell_pairs(&self, ghosts: usize) -> Vec<CellPair> {
        self.pairs_impl(ghosts, false)
    }

    /// 含切向棱延伸的单元配对
    ///
    /// 切向各向外延 ghosts 层，但不含同时越界两个切向的角部。
    pub fn cell_pairs_extended(&self, ghosts: usize) -> Vec<CellPair> {
        self.pairs_impl(ghosts, true)
    }

    fn pairs_impl(&self, ghosts: usize, extended: bool) -> Vec<CellPair> {
        let (m1, m2) = self.a.dims();
        let g = ghosts as isize;
        let (ext1, ext2) = if extended { (g, g) } else { (0, 0) };
        let (ad1, ad2) = self.a.class.direction().tangential();
        let (bd1, bd2) = self.b.class.direction().tangential();

        let mut pairs = Vec::with_capacity(
            ((m1 as isize + 2 * ext1) * (m2 as isize + 2 * ext2)) as usize * ghosts,
        );
        for u2 in -ext2..m2 as isize + ext2 {
            for u1 in -ext1..m1 as isize + ext1 {
                let out1 = u1 < 0 || u1 >= m1 as isize;
                let out2 = u2 < 0 || u2 >= m2 as isize;
                if out1 && out2 {
                    // 角部不交换
                    continue;
                }
                let edge_dir = if out1 {
                    Some((ad1, bd1_mapped(self.orientation, bd1, bd2)))
                } else if out2 {
                    Some((ad2, bd2_mapped(self.orientation, bd1, bd2)))
                } else {
                    None
                };
                let (v1, v2) = self.orientation.apply(u1, u2, self.b.dims());
                for layer in 1..=ghosts {
                    let depth = layer - 1;
                    pairs.push(CellPair {
                        a_interior: self.a.cell_ijk(self.a.interior_axial(depth), u1, u2),
                        a_ghost: self.a.cell_ijk(self.a.ghost_axial(layer), u1, u2),
                        b_interior: self.b.cell_ijk(self.b.interior_axial(depth), v1, v2),
                        b_ghost: self.b.cell_ijk(self.b.ghost_axial(layer), v1, v2),
                        edge_dir,
                    });
                }
            }
        }
        pairs
    }

    /// 法向面符号：两侧同侧时峰对峰，面积矢量反号
    #[inline]
    pub fn face_sign(&self) -> f64 {
        if self.a.class.side() == self.b.class.side() {
            -1.0
        } else {
            1.0
        }
    }
}

/// A 的第一切向越界时，B 侧对应的越界方向
fn bd1_mapped(o: Orientation, bd1: Direction, bd2: Direction) -> Direction {
    if o.swap {
        bd2
    } else {
        bd1
    }
}

fn bd2_mapped(o: Orientation, bd1: Direction, bd2: Direction) -> Direction {
    if o.swap {
        bd1
    } else {
        bd2
    }
}

// ============================================================
// 连接匹配
// ============================================================

/// 从各块边界表匹配连接
///
/// periodic / interblock 面片按标签两两配对；朝向通过面片角点
/// 面心的差分矢量匹配确定。
pub fn find_connections(
    boundaries: &[BlockBoundaries],
    geoms: &[BlockGeometry],
) -> Result<Vec<Connection>, GridError> {
    let mut tagged: Vec<(i32, usize, BoundarySurface)> = Vec::new();
    for (bb, bounds) in boundaries.iter().enumerate() {
        for s in bounds.surfaces() {
            if s.kind.is_connection() {
                tagged.push((s.tag, bb, s.clone()));
            }
        }
    }
    tagged.sort_by_key(|(tag, block, _)| (*tag, *block));

    let mut connections = Vec::new();
    let mut idx = 0;
    while idx < tagged.len() {
        let (tag, block_a, surf_a) = &tagged[idx];
        if idx + 1 >= tagged.len() || tagged[idx + 1].0 != *tag {
            return Err(GridError::Connection(format!("连接标签 {tag} 未成对")));
        }
        let (_, block_b, surf_b) = &tagged[idx + 1];
        if idx + 2 < tagged.len() && tagged[idx + 2].0 == *tag {
            return Err(GridError::Connection(format!("连接标签 {tag} 出现超过两次")));
        }

        let dims_a = geom_dims(&geoms[*block_a]);
        let dims_b = geom_dims(&geoms[*block_b]);
        let a = PatchSide::from_surface(surf_a, *block_a, dims_a);
        let b = PatchSide::from_surface(surf_b, *block_b, dims_b);
        let periodic = surf_a.kind == BcKind::Periodic;
        let orientation = match_orientation(&a, &b, geoms)?;
        connections.push(Connection {
            a,
            b,
            orientation,
            periodic,
        });
        idx += 2;
    }
    Ok(connections)
}

fn geom_dims(g: &BlockGeometry) -> (usize, usize, usize) {
    (
        g.num_cells(Direction::I),
        g.num_cells(Direction::J),
        g.num_cells(Direction::K),
    )
}

/// 面片边界面心
fn patch_face_center(p: &PatchSide, geoms: &[BlockGeometry], u1: isize, u2: isize) -> DVec3 {
    let geom = &geoms[p.block];
    let dir = p.class.direction();
    let axial = p.interior_face_axial(0);
    let (i, j, k) = p.cell_ijk(axial, u1, u2);
    *geom.fcenter(dir).get(i, j, k)
}

/// 通过角点差分矢量匹配确定朝向
fn match_orientation(
    a: &PatchSide,
    b: &PatchSide,
    geoms: &[BlockGeometry],
) -> Result<Orientation, GridError> {
    let (m1, m2) = a.dims();
    let corners = [
        (0isize, 0isize),
        (m1 as isize - 1, 0),
        (0, m2 as isize - 1),
        (m1 as isize - 1, m2 as isize - 1),
    ];
    let a0 = patch_face_center(a, geoms, 0, 0);
    let scale = (patch_face_center(a, geoms, corners[3].0, corners[3].1) - a0)
        .length()
        .max(1.0e-12);
    let tol = 1.0e-8 * scale;

    for o in Orientation::all() {
        // 尺寸必须一致
        let (n1, n2) = b.dims();
        let ok_dims = if o.swap {
            (m1, m2) == (n2, n1)
        } else {
            (m1, m2) == (n1, n2)
        };
        if !ok_dims {
            continue;
        }
        let (v0_1, v0_2) = o.apply(0, 0, b.dims());
        let b0 = patch_face_center(b, geoms, v0_1, v0_2);
        let matched = corners.iter().all(|&(u1, u2)| {
            let (v1, v2) = o.apply(u1, u2, b.dims());
            let da = patch_face_center(a, geoms, u1, u2) - a0;
            let db = patch_face_center(b, geoms, v1, v2) - b0;
            (da - db).length() < tol
        });
        if matched {
            return Ok(o);
        }
    }
    Err(GridError::Connection(format!(
        "无法确定块 {} 与块 {} 的连接朝向",
        a.block, b.block
    )))
}

// ============================================================
// 几何交换
// ============================================================

/// 延迟的棱更新记录（t 形交汇握手）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredEdge {
    /// 接收块
    pub block: usize,
    /// 棱方向
    pub dir: Direction,
}

/// 在连接两侧交换幽灵几何
///
/// 体积、中心与宽度取对侧内部单元的值；法向面族取对侧对应深度的
/// 面并按侧别修正符号。接收的棱延伸单元体积为零表示对侧尚未填充，
/// 记录为延迟更新留待第二遍交换。
pub fn swap_geometry(
    conn: &Connection,
    geoms: &mut [BlockGeometry],
    ghosts: usize,
) -> Vec<DeferredEdge> {
    let mut deferred = Vec::new();
    let pairs = conn.cell_pairs_extended(ghosts);

    // 周期连接需要按每单元平移修正物理坐标
    for pair in &pairs {
        // A 侧接收
        receive_cell(conn, geoms, pair, true, &mut deferred);
        // B 侧接收
        receive_cell(conn, geoms, pair, false, &mut deferred);
    }

    // 法向面族（仅核心区域）
    for pair in conn.cell_pairs(ghosts) {
        receive_normal_faces(conn, geoms, &pair);
    }

    deferred
}

/// 第二遍交换：处理延迟的棱更新
///
/// 记录的棱方向必须是连接某一侧面片的切向方向，否则视为
/// 前置条件被破坏。
pub fn swap_geometry_deferred(
    conn: &Connection,
    geoms: &mut [BlockGeometry],
    ghosts: usize,
    deferred: &[DeferredEdge],
) -> Result<(), GridError> {
    for d in deferred {
        if !conn.involves(d.block) {
            continue;
        }
        let patch = if conn.a.block == d.block {
            &conn.a
        } else {
            &conn.b
        };
        let (t1, t2) = patch.class.direction().tangential();
        if d.dir != t1 && d.dir != t2 {
            return Err(GridError::Connection(format!(
                "延迟棱更新方向 {} 与连接方向不符 (块 {})",
                d.dir.as_char(),
                d.block
            )));
        }
    }

    let mut still_deferred = Vec::new();
    let pairs = conn.cell_pairs_extended(ghosts);
    for pair in &pairs {
        if pair.edge_dir.is_none() {
            continue;
        }
        receive_cell(conn, geoms, pair, true, &mut still_deferred);
        receive_cell(conn, geoms, pair, false, &mut still_deferred);
    }
    Ok(())
}

fn receive_cell(
    conn: &Connection,
    geoms: &mut [BlockGeometry],
    pair: &CellPair,
    into_a: bool,
    deferred: &mut Vec<DeferredEdge>,
) {
    let (recv_patch, send_patch, ghost, donor) = if into_a {
        (&conn.a, &conn.b, pair.a_ghost, pair.b_interior)
    } else {
        (&conn.b, &conn.a, pair.b_ghost, pair.a_interior)
    };
    let donor_vol = *geoms[send_patch.block].vol.get(donor.0, donor.1, donor.2);

    if donor_vol == 0.0 {
        if let Some((a_dir, b_dir)) = pair.edge_dir {
            deferred.push(DeferredEdge {
                block: recv_patch.block,
                dir: if into_a { a_dir } else { b_dir },
            });
            return;
        }
        // 核心单元体积为零只可能是对侧几何未构建，保持原值
        return;
    }

    // 周期平移：接收侧边界面心 - 发送侧边界面心
    let shift = boundary_shift(conn, geoms, recv_patch, send_patch, pair, into_a);

    let donor_geom = &geoms[send_patch.block];
    let centroid = *donor_geom.centroid.get(donor.0, donor.1, donor.2) + shift;
    let widths = (
        *donor_geom.width_i.get(donor.0, donor.1, donor.2),
        *donor_geom.width_j.get(donor.0, donor.1, donor.2),
        *donor_geom.width_k.get(donor.0, donor.1, donor.2),
    );

    let recv_geom = &mut geoms[recv_patch.block];
    *recv_geom.vol.get_mut(ghost.0, ghost.1, ghost.2) = donor_vol;
    *recv_geom.centroid.get_mut(ghost.0, ghost.1, ghost.2) = centroid;
    // 宽度按接收块的轴向重排：发送块法向宽度对应接收块法向宽度
    let recv_dir = recv_patch.class.direction();
    let send_dir = send_patch.class.direction();
    let send_w = [widths.0, widths.1, widths.2];
    let normal_w = send_w[dir_index(send_dir)];
    let mut tang_w: Vec<f64> = (0..3)
        .filter(|&d| d != dir_index(send_dir))
        .map(|d| send_w[d])
        .collect();
    if conn.orientation.swap {
        tang_w.reverse();
    }
    let (rt1, rt2) = recv_dir.tangential();
    *recv_geom.width_mut_pub(recv_dir).get_mut(ghost.0, ghost.1, ghost.2) = normal_w;
    *recv_geom.width_mut_pub(rt1).get_mut(ghost.0, ghost.1, ghost.2) = tang_w[0];
    *recv_geom.width_mut_pub(rt2).get_mut(ghost.0, ghost.1, ghost.2) = tang_w[1];
}

fn dir_index(d: Direction) -> usize {
    match d {
        Direction::I => 0,
        Direction::J => 1,
        Direction::K => 2,
    }
}

fn boundary_shift(
    conn: &Connection,
    geoms: &[BlockGeometry],
    recv_patch: &PatchSide,
    send_patch: &PatchSide,
    pair: &CellPair,
    into_a: bool,
) -> DVec3 {
    if !conn.periodic {
        return DVec3::ZERO;
    }
    // 以两侧边界面心之差为周期平移
    let recv_cell = if into_a { pair.a_ghost } else { pair.b_ghost };
    let send_cell = if into_a { pair.b_interior } else { pair.a_interior };
    let recv_dir = recv_patch.class.direction();
    let send_dir = send_patch.class.direction();
    let recv_face_axial = recv_patch.interior_face_axial(0);
    let send_face_axial = send_patch.interior_face_axial(0);
    let rf = replace_axial(recv_dir, recv_cell, recv_face_axial);
    let sf = replace_axial(send_dir, send_cell, send_face_axial);
    *geoms[recv_patch.block].fcenter(recv_dir).get(rf.0, rf.1, rf.2)
        - *geoms[send_patch.block].fcenter(send_dir).get(sf.0, sf.1, sf.2)
}

fn replace_axial(
    dir: Direction,
    cell: (isize, isize, isize),
    axial: isize,
) -> (isize, isize, isize) {
    match dir {
        Direction::I => (axial, cell.1, cell.2),
        Direction::J => (cell.0, axial, cell.2),
        Direction::K => (cell.0, cell.1, axial),
    }
}

fn receive_normal_faces(conn: &Connection, geoms: &mut [BlockGeometry], pair: &CellPair) {
    let sign = conn.face_sign();
    for into_a in [true, false] {
        let (recv_patch, send_patch, ghost, donor) = if into_a {
            (&conn.a, &conn.b, pair.a_ghost, pair.b_interior)
        } else {
            (&conn.b, &conn.a, pair.b_ghost, pair.a_interior)
        };
        let recv_dir = recv_patch.class.direction();
        let send_dir = send_patch.class.direction();

        // 幽灵单元外侧面 ← 对侧对应深度的法向面
        let layer = axial_layer(recv_patch, ghost, recv_dir);
        let gf = replace_axial(recv_dir, ghost, recv_patch.ghost_face_axial(layer));
        let depth_face = send_patch.interior_face_axial(layer);
        let sf = replace_axial(send_dir, donor, depth_face);

        let shift = boundary_shift(conn, geoms, recv_patch, send_patch, pair, into_a);
        let src_area = *geoms[send_patch.block].farea(send_dir).get(sf.0, sf.1, sf.2);
        let src_center = *geoms[send_patch.block].fcenter(send_dir).get(sf.0, sf.1, sf.2);
        let recv_geom = &mut geoms[recv_patch.block];
        *recv_geom.farea_mut_pub(recv_dir).get_mut(gf.0, gf.1, gf.2) =
            crate::geometry::AreaVec::from_vector(src_area.vector() * sign);
        *recv_geom.fcenter_mut_pub(recv_dir).get_mut(gf.0, gf.1, gf.2) = src_center + shift;
    }
}

fn axial_layer(patch: &PatchSide, ghost: (isize, isize, isize), dir: Direction) -> usize {
    let axial = dir.component(ghost);
    match patch.class.side() {
        Side::Lower => (-axial) as usize,
        Side::Upper => (axial - patch.num_normal as isize + 1) as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot3d::NodeBlock;
    use sf_config::SurfaceSpec;

    fn build(
        cells: (usize, usize, usize),
        origin: DVec3,
    ) -> (BlockGeometry, (usize, usize, usize)) {
        let nodes = NodeBlock::cartesian(cells, origin, DVec3::ONE);
        (BlockGeometry::from_nodes(&nodes, 2, 0).unwrap(), cells)
    }

    fn surf(kind: BcKind, i: [usize; 2], j: [usize; 2], k: [usize; 2], tag: i32) -> SurfaceSpec {
        SurfaceSpec {
            kind,
            i_range: i,
            j_range: j,
            k_range: k,
            tag,
        }
    }

    #[test]
    fn test_orientation_apply() {
        let o = Orientation {
            swap: true,
            reverse_d1: true,
            reverse_d2: false,
        };
        // B dims (4, 3): u=(1, 2) -> swap (2, 1) -> reverse d1: (4-1-2, 1) = (1, 1)
        assert_eq!(o.apply(1, 2, (4, 3)), (1, 1));
        // 越界坐标同样适用
        assert_eq!(Orientation::IDENTITY.apply(-1, 5, (4, 3)), (-1, 5));
    }

    #[test]
    fn test_match_two_blocks_identity() {
        let (ga, _) = build((4, 3, 2), DVec3::ZERO);
        let (gb, _) = build((4, 3, 2), DVec3::new(4.0, 0.0, 0.0));
        let geoms = vec![ga, gb];
        let ba = BlockBoundaries::from_specs(
            &[surf(BcKind::Interblock, [4, 4], [0, 3], [0, 2], 7)],
            (4, 3, 2),
        )
        .unwrap();
        let bb = BlockBoundaries::from_specs(
            &[surf(BcKind::Interblock, [0, 0], [0, 3], [0, 2], 7)],
            (4, 3, 2),
        )
        .unwrap();
        let conns = find_connections(&[ba, bb], &geoms).unwrap();
        assert_eq!(conns.len(), 1);
        let c = &conns[0];
        assert_eq!(c.a.block, 0);
        assert_eq!(c.b.block, 1);
        assert_eq!(c.orientation, Orientation::IDENTITY);
        assert!(!c.periodic);
        assert!((c.face_sign() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_cell_pairs_aligned() {
        let (ga, _) = build((4, 3, 2), DVec3::ZERO);
        let (gb, _) = build((4, 3, 2), DVec3::new(4.0, 0.0, 0.0));
        let geoms = vec![ga, gb];
        let ba = BlockBoundaries::from_specs(
            &[surf(BcKind::Interblock, [4, 4], [0, 3], [0, 2], 7)],
            (4, 3, 2),
        )
        .unwrap();
        let bbs = BlockBoundaries::from_specs(
            &[surf(BcKind::Interblock, [0, 0], [0, 3], [0, 2], 7)],
            (4, 3, 2),
        )
        .unwrap();
        let conns = find_connections(&[ba, bbs], &geoms).unwrap();
        let pairs = conns[0].cell_pairs(2);
        assert_eq!(pairs.len(), 3 * 2 * 2);
        // A 的第一层幽灵在 i=4，对应 B 的内部单元 i=0
        let p = pairs
            .iter()
            .find(|p| p.a_ghost == (4, 0, 0))
            .expect("pair exists");
        assert_eq!(p.b_interior, (0, 0, 0));
        assert_eq!(p.a_interior, (3, 0, 0));
        assert_eq!(p.b_ghost, (-1, 0, 0));
        // 第二层
        let p = pairs
            .iter()
            .find(|p| p.a_ghost == (5, 1, 1))
            .expect("pair exists");
        assert_eq!(p.b_interior, (1, 1, 1));
    }

    #[test]
    fn test_swap_geometry_fills_ghosts() {
        let (ga, _) = build((4, 3, 2), DVec3::ZERO);
        let (gb, _) = build((4, 3, 2), DVec3::new(4.0, 0.0, 0.0));
        let mut geoms = vec![ga, gb];
        let ba = BlockBoundaries::from_specs(
            &[surf(BcKind::Interblock, [4, 4], [0, 3], [0, 2], 7)],
            (4, 3, 2),
        )
        .unwrap();
        let bbs = BlockBoundaries::from_specs(
            &[surf(BcKind::Interblock, [0, 0], [0, 3], [0, 2], 7)],
            (4, 3, 2),
        )
        .unwrap();
        let conns = find_connections(&[ba, bbs], &geoms).unwrap();
        let _deferred = swap_geometry(&conns[0], &mut geoms, 2);

        // A 的幽灵中心 = B 的内部中心（物理坐标一致）
        assert!(
            (*geoms[0].centroid.get(4, 1, 1) - DVec3::new(4.5, 1.5, 1.5)).length() < 1e-12
        );
        assert!(
            (*geoms[1].centroid.get(-2, 0, 0) - DVec3::new(2.5, 0.5, 0.5)).length() < 1e-12
        );
        assert!((geoms[0].vol.get(5, 2, 1) - 1.0).abs() < 1e-13);
    }

    #[test]
    fn test_periodic_shift() {
        // 单块 j 向周期：j-min 与 j-max 相连
        let (g, _) = build((4, 3, 2), DVec3::ZERO);
        let mut geoms = vec![g];
        let bounds = BlockBoundaries::from_specs(
            &[
                surf(BcKind::Periodic, [0, 4], [0, 0], [0, 2], 5),
                surf(BcKind::Periodic, [0, 4], [3, 3], [0, 2], 5),
            ],
            (4, 3, 2),
        )
        .unwrap();
        let conns = find_connections(&[bounds], &geoms).unwrap();
        assert_eq!(conns.len(), 1);
        assert!(conns[0].periodic);
        let _ = swap_geometry(&conns[0], &mut geoms, 2);
        // j-min 幽灵应来自 j-max 内部并平移到边界外
        assert!(
            (*geoms[0].centroid.get(1, -1, 0) - DVec3::new(1.5, -0.5, 0.5)).length() < 1e-12
        );
        assert!(
            (*geoms[0].centroid.get(1, 3, 0) - DVec3::new(1.5, 3.5, 0.5)).length() < 1e-12
        );
    }

    #[test]
    fn test_deferred_edge_direction_validation() {
        let (g, _) = build((4, 3, 2), DVec3::ZERO);
        let mut geoms = vec![g];
        let bounds = BlockBoundaries::from_specs(
            &[
                surf(BcKind::Periodic, [0, 4], [0, 0], [0, 2], 5),
                surf(BcKind::Periodic, [0, 4], [3, 3], [0, 2], 5),
            ],
            (4, 3, 2),
        )
        .unwrap();
        let conns = find_connections(&[bounds], &geoms).unwrap();
        // J 面片的切向是 I 与 K；J 方向的棱记录是前置条件破坏
        let bad = vec![DeferredEdge {
            block: 0,
            dir: Direction::J,
        }];
        assert!(swap_geometry_deferred(&conns[0], &mut geoms, 2, &bad).is_err());
        let good = vec![DeferredEdge {
            block: 0,
            dir: Direction::I,
        }];
        assert!(swap_geometry_deferred(&conns[0], &mut geoms, 2, &good).is_ok());
    }
}
