// crates/sf_grid/src/boundary.rs

//! 边界面片与逐块边界表
//!
//! 六个正交面片类（i/j/k 的低高两侧）乘以每类任意多个面片。
//! 面片法向范围存储为面索引，切向范围为单元索引半开区间，
//! 切向顺序与 [`Direction::tangential`] 一致。

use serde::{Deserialize, Serialize};

use sf_config::{BcKind, SurfaceSpec};

use crate::error::GridError;
use crate::geometry::{Direction, Side};

// ============================================================
// 面片类
// ============================================================

/// 六个正交面片类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceClass {
    /// i 低侧
    IMin,
    /// i 高侧
    IMax,
    /// j 低侧
    JMin,
    /// j 高侧
    JMax,
    /// k 低侧
    KMin,
    /// k 高侧
    KMax,
}

impl SurfaceClass {
    /// 法向方向
    #[inline]
    pub fn direction(self) -> Direction {
        match self {
            Self::IMin | Self::IMax => Direction::I,
            Self::JMin | Self::JMax => Direction::J,
            Self::KMin | Self::KMax => Direction::K,
        }
    }

    /// 所在侧
    #[inline]
    pub fn side(self) -> Side {
        match self {
            Self::IMin | Self::JMin | Self::KMin => Side::Lower,
            Self::IMax | Self::JMax | Self::KMax => Side::Upper,
        }
    }

    /// 由方向与侧构造
    #[inline]
    pub fn from_parts(dir: Direction, side: Side) -> Self {
        match (dir, side) {
            (Direction::I, Side::Lower) => Self::IMin,
            (Direction::I, Side::Upper) => Self::IMax,
            (Direction::J, Side::Lower) => Self::JMin,
            (Direction::J, Side::Upper) => Self::JMax,
            (Direction::K, Side::Lower) => Self::KMin,
            (Direction::K, Side::Upper) => Self::KMax,
        }
    }
}

// ============================================================
// 边界面片
// ============================================================

/// 一个边界面片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySurface {
    /// 面片类
    pub class: SurfaceClass,
    /// 边界条件类型
    pub kind: BcKind,
    /// 状态记录标签
    pub tag: i32,
    /// 第一切向单元范围 [start, end)
    pub r1: (usize, usize),
    /// 第二切向单元范围 [start, end)
    pub r2: (usize, usize),
}

impl BoundarySurface {
    /// 面片覆盖的面数
    #[inline]
    pub fn num_faces(&self) -> usize {
        (self.r1.1 - self.r1.0) * (self.r2.1 - self.r2.0)
    }

    /// 遍历面片覆盖的切向单元坐标
    pub fn iter(&self) -> impl Iterator<Item = (isize, isize)> + '_ {
        let (r1, r2) = (self.r1, self.r2);
        (r2.0..r2.1)
            .flat_map(move |t2| (r1.0..r1.1).map(move |t1| (t1 as isize, t2 as isize)))
    }

    /// 切向坐标是否落在面片内
    #[inline]
    pub fn contains(&self, t1: isize, t2: isize) -> bool {
        t1 >= self.r1.0 as isize
            && t1 < self.r1.1 as isize
            && t2 >= self.r2.0 as isize
            && t2 < self.r2.1 as isize
    }

    /// 法向面索引（IMin 为 0，IMax 为 ni）
    #[inline]
    pub fn face_index(&self, num_cells_normal: usize) -> isize {
        match self.class.side() {
            Side::Lower => 0,
            Side::Upper => num_cells_normal as isize,
        }
    }

    /// 由输入记录构造
    ///
    /// `dims` 为块的单元数 (ni, nj, nk)；法向范围必须落在块边界上。
    pub fn from_spec(spec: &SurfaceSpec, dims: (usize, usize, usize)) -> Result<Self, GridError> {
        let ranges = [spec.i_range, spec.j_range, spec.k_range];
        let flat_axis = (0..3)
            .find(|&d| ranges[d][0] == ranges[d][1])
            .ok_or_else(|| GridError::Connection("面片缺少法向".to_string()))?;
        let n_axis = [dims.0, dims.1, dims.2][flat_axis];
        let side = if ranges[flat_axis][0] == 0 {
            Side::Lower
        } else if ranges[flat_axis][0] == n_axis {
            Side::Upper
        } else {
            return Err(GridError::Connection(format!(
                "面片法向索引 {} 不在块边界 (0 或 {})",
                ranges[flat_axis][0], n_axis
            )));
        };
        let dir = [Direction::I, Direction::J, Direction::K][flat_axis];
        let (t1_dir, t2_dir) = dir.tangential();
        let pick = |d: Direction| match d {
            Direction::I => spec.i_range,
            Direction::J => spec.j_range,
            Direction::K => spec.k_range,
        };
        let r1 = pick(t1_dir);
        let r2 = pick(t2_dir);
        Ok(Self {
            class: SurfaceClass::from_parts(dir, side),
            kind: spec.kind,
            tag: spec.tag,
            r1: (r1[0], r1[1]),
            r2: (r2[0], r2[1]),
        })
    }
}

// ============================================================
// 逐块边界表
// ============================================================

/// 一个块的有序边界面片表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockBoundaries {
    surfaces: Vec<BoundarySurface>,
}

impl BlockBoundaries {
    /// 由输入记录表构造
    pub fn from_specs(
        specs: &[SurfaceSpec],
        dims: (usize, usize, usize),
    ) -> Result<Self, GridError> {
        let surfaces = specs
            .iter()
            .map(|s| BoundarySurface::from_spec(s, dims))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { surfaces })
    }

    /// 直接由面片构造
    pub fn new(surfaces: Vec<BoundarySurface>) -> Self {
        Self { surfaces }
    }

    /// 全部面片
    #[inline]
    pub fn surfaces(&self) -> &[BoundarySurface] {
        &self.surfaces
    }

    /// 追加面片
    pub fn push(&mut self, surface: BoundarySurface) {
        self.surfaces.push(surface);
    }

    /// 给定类的面片
    pub fn surfaces_of(&self, class: SurfaceClass) -> impl Iterator<Item = &BoundarySurface> {
        self.surfaces.iter().filter(move |s| s.class == class)
    }

    /// 查找覆盖给定切向坐标的面片
    pub fn find(&self, class: SurfaceClass, t1: isize, t2: isize) -> Option<&BoundarySurface> {
        self.surfaces
            .iter()
            .find(|s| s.class == class && s.contains(t1, t2))
    }

    /// 黏性壁面片
    pub fn viscous_surfaces(&self) -> impl Iterator<Item = &BoundarySurface> {
        self.surfaces
            .iter()
            .filter(|s| s.kind == BcKind::ViscousWall)
    }

    /// 沿 dir 在单元索引 index 处切分
    ///
    /// 自身变为下半块的边界表，返回上半块的；切分面两侧各新增一个
    /// interblock 面片（标签 `interblock_tag`）。
    pub fn split(
        &mut self,
        dir: Direction,
        index: usize,
        dims: (usize, usize, usize),
        interblock_tag: i32,
    ) -> BlockBoundaries {
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        let (t1_dir, t2_dir) = dir.tangential();
        let pick = |d: Direction| match d {
            Direction::I => dims.0,
            Direction::J => dims.1,
            Direction::K => dims.2,
        };

        for s in &self.surfaces {
            if s.class.direction() == dir {
                // 法向面片整体归属一侧
                match s.class.side() {
                    Side::Lower => lower.push(s.clone()),
                    Side::Upper => upper.push(s.clone()),
                }
            } else {
                // 切向面片按切分位置裁剪；dir 在面片切向坐标系中的位置
                let (sd1, sd2) = s.class.direction().tangential();
                let in_r1 = sd1 == dir;
                debug_assert!(in_r1 || sd2 == dir);
                let range = if in_r1 { s.r1 } else { s.r2 };
                if range.1 <= index {
                    lower.push(s.clone());
                } else if range.0 >= index {
                    let mut moved = s.clone();
                    let shifted = (range.0 - index, range.1 - index);
                    if in_r1 {
                        moved.r1 = shifted;
                    } else {
                        moved.r2 = shifted;
                    }
                    upper.push(moved);
                } else {
                    let mut lo = s.clone();
                    let mut hi = s.clone();
                    if in_r1 {
                        lo.r1 = (range.0, index);
                        hi.r1 = (0, range.1 - index);
                    } else {
                        lo.r2 = (range.0, index);
                        hi.r2 = (0, range.1 - index);
                    }
                    lower.push(lo);
                    upper.push(hi);
                }
            }
        }

        // 切分面上的连接面片
        let r1 = (0, pick(t1_dir));
        let r2 = (0, pick(t2_dir));
        lower.push(BoundarySurface {
            class: SurfaceClass::from_parts(dir, Side::Upper),
            kind: BcKind::Interblock,
            tag: interblock_tag,
            r1,
            r2,
        });
        upper.push(BoundarySurface {
            class: SurfaceClass::from_parts(dir, Side::Lower),
            kind: BcKind::Interblock,
            tag: interblock_tag,
            r1,
            r2,
        });

        self.surfaces = lower;
        BlockBoundaries { surfaces: upper }
    }

    /// 沿 dir 与上半块的边界表拼接
    ///
    /// `lower_cells` 为拼接前下半块在 dir 方向的单元数。
    /// 切分面上的 interblock 面片被移除。
    pub fn join(&mut self, upper: &BlockBoundaries, dir: Direction, lower_cells: usize) {
        let mut joined: Vec<BoundarySurface> = Vec::new();

        for s in &self.surfaces {
            let at_seam = s.class.direction() == dir
                && s.class.side() == Side::Upper
                && s.kind == BcKind::Interblock;
            if !at_seam {
                joined.push(s.clone());
            }
        }
        for s in &upper.surfaces {
            let at_seam = s.class.direction() == dir
                && s.class.side() == Side::Lower
                && s.kind == BcKind::Interblock;
            if at_seam {
                continue;
            }
            let mut moved = s.clone();
            if s.class.direction() != dir {
                let (sd1, _) = s.class.direction().tangential();
                if sd1 == dir {
                    moved.r1 = (moved.r1.0 + lower_cells, moved.r1.1 + lower_cells);
                } else {
                    moved.r2 = (moved.r2.0 + lower_cells, moved.r2.1 + lower_cells);
                }
            }
            joined.push(moved);
        }

        // 合并相邻的同类切向面片
        joined.dedup_by(|b, a| {
            let same = a.class == b.class && a.kind == b.kind && a.tag == b.tag && a.r2 == b.r2;
            if same && a.r1.1 == b.r1.0 {
                a.r1.1 = b.r1.1;
                return true;
            }
            let same2 = a.class == b.class && a.kind == b.kind && a.tag == b.tag && a.r1 == b.r1;
            if same2 && a.r2.1 == b.r2.0 {
                a.r2.1 = b.r2.1;
                return true;
            }
            false
        });

        self.surfaces = joined;
    }

    /// 面片在粗网格索引基上的重写（每方向隔点保留）
    ///
    /// `kept` 为三个方向被保留的细索引表（升序，含 0 与 n）。
    pub fn coarsened(&self, kept: &[Vec<usize>; 3]) -> BlockBoundaries {
        let to_coarse = |d: Direction, fine: usize| -> usize {
            let table = match d {
                Direction::I => &kept[0],
                Direction::J => &kept[1],
                Direction::K => &kept[2],
            };
            // 第一个 >= fine 的保留索引的序号
            table.partition_point(|&x| x < fine)
        };
        let surfaces = self
            .surfaces
            .iter()
            .map(|s| {
                let (d1, d2) = s.class.direction().tangential();
                BoundarySurface {
                    class: s.class,
                    kind: s.kind,
                    tag: s.tag,
                    r1: (to_coarse(d1, s.r1.0), to_coarse(d1, s.r1.1)),
                    r2: (to_coarse(d2, s.r2.0), to_coarse(d2, s.r2.1)),
                }
            })
            .collect();
        BlockBoundaries { surfaces }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: BcKind, i: [usize; 2], j: [usize; 2], k: [usize; 2], tag: i32) -> SurfaceSpec {
        SurfaceSpec {
            kind,
            i_range: i,
            j_range: j,
            k_range: k,
            tag,
        }
    }

    #[test]
    fn test_from_spec_classifies_sides() {
        let dims = (8, 4, 2);
        let s = BoundarySurface::from_spec(
            &spec(BcKind::ViscousWall, [0, 0], [0, 4], [0, 2], 1),
            dims,
        )
        .unwrap();
        assert_eq!(s.class, SurfaceClass::IMin);
        assert_eq!(s.r1, (0, 4));
        assert_eq!(s.r2, (0, 2));

        let s = BoundarySurface::from_spec(
            &spec(BcKind::SlipWall, [0, 8], [4, 4], [0, 2], 0),
            dims,
        )
        .unwrap();
        assert_eq!(s.class, SurfaceClass::JMax);
        // J 面的切向顺序是 (I, K)
        assert_eq!(s.r1, (0, 8));
        assert_eq!(s.r2, (0, 2));
    }

    #[test]
    fn test_from_spec_interior_plane_rejected() {
        let dims = (8, 4, 2);
        assert!(BoundarySurface::from_spec(
            &spec(BcKind::SlipWall, [3, 3], [0, 4], [0, 2], 0),
            dims,
        )
        .is_err());
    }

    #[test]
    fn test_find_by_coordinates() {
        let dims = (8, 4, 2);
        let bb = BlockBoundaries::from_specs(
            &[
                spec(BcKind::ViscousWall, [0, 0], [0, 2], [0, 2], 1),
                spec(BcKind::SlipWall, [0, 0], [2, 4], [0, 2], 0),
            ],
            dims,
        )
        .unwrap();
        assert_eq!(bb.find(SurfaceClass::IMin, 1, 0).unwrap().kind, BcKind::ViscousWall);
        assert_eq!(bb.find(SurfaceClass::IMin, 3, 1).unwrap().kind, BcKind::SlipWall);
        assert!(bb.find(SurfaceClass::IMax, 0, 0).is_none());
    }

    #[test]
    fn test_split_normal_and_tangential() {
        let dims = (8, 4, 2);
        let mut bb = BlockBoundaries::from_specs(
            &[
                spec(BcKind::ViscousWall, [0, 0], [0, 4], [0, 2], 1),
                spec(BcKind::ViscousWall, [8, 8], [0, 4], [0, 2], 2),
                spec(BcKind::SlipWall, [0, 8], [0, 0], [0, 2], 0),
            ],
            dims,
        )
        .unwrap();
        let upper = bb.split(Direction::I, 3, dims, 99);

        // 下半块: IMin 壁 + 裁剪后的 JMin + interblock IMax
        assert!(bb.surfaces().iter().any(|s| s.class == SurfaceClass::IMin));
        assert!(bb
            .surfaces()
            .iter()
            .any(|s| s.class == SurfaceClass::IMax && s.kind == BcKind::Interblock));
        let jmin = bb
            .surfaces()
            .iter()
            .find(|s| s.class == SurfaceClass::JMin)
            .unwrap();
        assert_eq!(jmin.r1, (0, 3));

        // 上半块: IMax 壁 + 平移后的 JMin + interblock IMin
        assert!(upper.surfaces().iter().any(|s| s.class == SurfaceClass::IMax));
        let jmin_u = upper
            .surfaces()
            .iter()
            .find(|s| s.class == SurfaceClass::JMin)
            .unwrap();
        assert_eq!(jmin_u.r1, (0, 5));
    }

    #[test]
    fn test_split_join_roundtrip() {
        let dims = (8, 4, 2);
        let original = BlockBoundaries::from_specs(
            &[
                spec(BcKind::ViscousWall, [0, 0], [0, 4], [0, 2], 1),
                spec(BcKind::ViscousWall, [8, 8], [0, 4], [0, 2], 2),
                spec(BcKind::SlipWall, [0, 8], [0, 0], [0, 2], 0),
                spec(BcKind::SlipWall, [0, 8], [4, 4], [0, 2], 0),
            ],
            dims,
        )
        .unwrap();
        let mut lower = original.clone();
        let upper = lower.split(Direction::I, 3, dims, 99);
        lower.join(&upper, Direction::I, 3);
        assert_eq!(lower.surfaces().len(), original.surfaces().len());
        for s in original.surfaces() {
            assert!(lower.surfaces().contains(s), "缺少面片 {s:?}");
        }
    }

    #[test]
    fn test_coarsened_keeps_patch_indices() {
        let dims = (8, 4, 2);
        let bb = BlockBoundaries::from_specs(
            &[spec(BcKind::ViscousWall, [0, 0], [2, 4], [0, 2], 1)],
            dims,
        )
        .unwrap();
        // j 方向保留 0,2,4；k 方向保留 0,2
        let kept = [
            vec![0, 2, 4, 6, 8],
            vec![0, 2, 4],
            vec![0, 2],
        ];
        let coarse = bb.coarsened(&kept);
        let s = &coarse.surfaces()[0];
        assert_eq!(s.r1, (1, 2));
        assert_eq!(s.r2, (0, 1));
    }
}
