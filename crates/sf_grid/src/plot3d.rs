// crates/sf_grid/src/plot3d.rs

//! Plot3D 节点坐标块
//!
//! 保存单块的节点坐标 (nI+1, nJ+1, nK+1)，提供金字塔体积分解
//! 与沿索引面的切分 / 拼接。文件读写在 sf_io 中实现。

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::array3d::{Array3D, SliceRange};
use crate::error::GridError;

/// 单块节点坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBlock {
    coords: Array3D<DVec3>,
}

impl NodeBlock {
    /// 从节点数组创建
    pub fn new(coords: Array3D<DVec3>) -> Self {
        Self { coords }
    }

    /// 创建零填充的节点块（节点数 = 单元数 + 1）
    pub fn zeros(num_nodes_i: usize, num_nodes_j: usize, num_nodes_k: usize) -> Self {
        Self {
            coords: Array3D::new(num_nodes_i, num_nodes_j, num_nodes_k, 0),
        }
    }

    /// 均匀直角网格（测试与算例构造用）
    pub fn cartesian(
        num_cells: (usize, usize, usize),
        origin: DVec3,
        spacing: DVec3,
    ) -> Self {
        let mut coords = Array3D::new(num_cells.0 + 1, num_cells.1 + 1, num_cells.2 + 1, 0);
        for kk in 0..=num_cells.2 {
            for jj in 0..=num_cells.1 {
                for ii in 0..=num_cells.0 {
                    *coords.get_mut(ii as isize, jj as isize, kk as isize) = origin
                        + DVec3::new(
                            spacing.x * ii as f64,
                            spacing.y * jj as f64,
                            spacing.z * kk as f64,
                        );
                }
            }
        }
        Self { coords }
    }

    /// i 方向节点数
    #[inline]
    pub fn num_nodes_i(&self) -> usize {
        self.coords.ni()
    }

    /// j 方向节点数
    #[inline]
    pub fn num_nodes_j(&self) -> usize {
        self.coords.nj()
    }

    /// k 方向节点数
    #[inline]
    pub fn num_nodes_k(&self) -> usize {
        self.coords.nk()
    }

    /// i 方向单元数
    #[inline]
    pub fn num_cells_i(&self) -> usize {
        self.coords.ni() - 1
    }

    /// j 方向单元数
    #[inline]
    pub fn num_cells_j(&self) -> usize {
        self.coords.nj() - 1
    }

    /// k 方向单元数
    #[inline]
    pub fn num_cells_k(&self) -> usize {
        self.coords.nk() - 1
    }

    /// 单元总数
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.num_cells_i() * self.num_cells_j() * self.num_cells_k()
    }

    /// 节点坐标
    #[inline]
    pub fn node(&self, i: usize, j: usize, k: usize) -> DVec3 {
        *self.coords.get(i as isize, j as isize, k as isize)
    }

    /// 写入节点坐标
    #[inline]
    pub fn set_node(&mut self, i: usize, j: usize, k: usize, value: DVec3) {
        *self.coords.get_mut(i as isize, j as isize, k as isize) = value;
    }

    /// 沿方向 dir ('i'/'j'/'k') 在节点索引 index 处切分
    ///
    /// 自身保留下半部分（节点 [0, index]），返回上半部分（节点
    /// [index, end]）。index 必须是内部节点。
    pub fn split(&mut self, dir: char, index: usize) -> Result<NodeBlock, GridError> {
        let (n_axis, axis) = match dir {
            'i' => (self.num_nodes_i(), 0usize),
            'j' => (self.num_nodes_j(), 1),
            'k' => (self.num_nodes_k(), 2),
            _ => {
                return Err(GridError::InvalidSplit {
                    dir,
                    index,
                    size: 0,
                })
            }
        };
        if index == 0 || index >= n_axis - 1 {
            return Err(GridError::InvalidSplit {
                dir,
                index,
                size: n_axis - 1,
            });
        }

        let full = self.coords.phys_range();
        let (lower_range, upper_range) = match axis {
            0 => (
                SliceRange::new((0, index as isize + 1), full.j, full.k),
                SliceRange::new((index as isize, full.i.1), full.j, full.k),
            ),
            1 => (
                SliceRange::new(full.i, (0, index as isize + 1), full.k),
                SliceRange::new(full.i, (index as isize, full.j.1), full.k),
            ),
            _ => (
                SliceRange::new(full.i, full.j, (0, index as isize + 1)),
                SliceRange::new(full.i, full.j, (index as isize, full.k.1)),
            ),
        };

        let upper = NodeBlock {
            coords: self.coords.slice(upper_range),
        };
        self.coords = self.coords.slice(lower_range);
        Ok(upper)
    }

    /// 沿方向 dir 与另一块拼接（other 在高索引侧，共享一层节点）
    pub fn join(&mut self, other: &NodeBlock, dir: char) -> Result<(), GridError> {
        let axis = match dir {
            'i' => 0usize,
            'j' => 1,
            'k' => 2,
            _ => {
                return Err(GridError::InvalidSplit {
                    dir,
                    index: 0,
                    size: 0,
                })
            }
        };

        let mine = (
            self.num_nodes_i(),
            self.num_nodes_j(),
            self.num_nodes_k(),
        );
        let theirs = (
            other.num_nodes_i(),
            other.num_nodes_j(),
            other.num_nodes_k(),
        );
        // 切向维度必须一致
        for d in 0..3 {
            if d != axis && [mine.0, mine.1, mine.2][d] != [theirs.0, theirs.1, theirs.2][d] {
                return Err(GridError::Dimension {
                    context: "NodeBlock::join",
                    expected: mine,
                    actual: theirs,
                });
            }
        }

        let joined_dims = match axis {
            0 => (mine.0 + theirs.0 - 1, mine.1, mine.2),
            1 => (mine.0, mine.1 + theirs.1 - 1, mine.2),
            _ => (mine.0, mine.1, mine.2 + theirs.2 - 1),
        };
        let mut joined = Array3D::new(joined_dims.0, joined_dims.1, joined_dims.2, 0);

        for (ii, jj, kk) in self.coords.phys_range().iter() {
            *joined.get_mut(ii, jj, kk) = *self.coords.get(ii, jj, kk);
        }
        let offset = [mine.0 - 1, mine.1 - 1, mine.2 - 1][axis] as isize;
        for (ii, jj, kk) in other.coords.phys_range().iter() {
            let dst = match axis {
                0 => (ii + offset, jj, kk),
                1 => (ii, jj + offset, kk),
                _ => (ii, jj, kk + offset),
            };
            *joined.get_mut(dst.0, dst.1, dst.2) = *other.coords.get(ii, jj, kk);
        }

        self.coords = joined;
        Ok(())
    }
}

// ============================================================
// 金字塔体积
// ============================================================

/// 四边形底面金字塔的有符号体积
///
/// 底面节点 a→b→c→d 按环向排列，apex 为塔尖。
/// 底面法向 (c-a)×(d-b)/2 指向 apex 一侧时体积为正。
pub fn pyramid_volume(apex: DVec3, a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    let base_center = 0.25 * (a + b + c + d);
    let cross = (c - a).cross(d - b);
    cross.dot(apex - base_center) / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_volume_unit_cube_face() {
        // 单位立方体一个面到中心的金字塔体积为 1/6
        let apex = DVec3::new(0.5, 0.5, 0.5);
        let v = pyramid_volume(
            apex,
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        );
        assert!((v - 1.0 / 6.0).abs() < 1e-14);
    }

    #[test]
    fn test_cartesian_dimensions() {
        let nb = NodeBlock::cartesian((4, 3, 2), DVec3::ZERO, DVec3::ONE);
        assert_eq!(nb.num_nodes_i(), 5);
        assert_eq!(nb.num_cells(), 24);
        assert_eq!(nb.node(4, 3, 2), DVec3::new(4.0, 3.0, 2.0));
    }

    #[test]
    fn test_split_join_roundtrip() {
        let original = NodeBlock::cartesian((6, 3, 2), DVec3::ZERO, DVec3::ONE);
        let mut lower = original.clone();
        let upper = lower.split('i', 2).unwrap();
        assert_eq!(lower.num_nodes_i(), 3);
        assert_eq!(upper.num_nodes_i(), 5);
        // 共享节点层
        assert_eq!(lower.node(2, 1, 1), upper.node(0, 1, 1));

        lower.join(&upper, 'i').unwrap();
        assert_eq!(lower, original);
    }

    #[test]
    fn test_split_at_boundary_rejected() {
        let mut nb = NodeBlock::cartesian((4, 4, 4), DVec3::ZERO, DVec3::ONE);
        assert!(nb.split('i', 0).is_err());
        assert!(nb.split('i', 4).is_err());
        assert!(nb.split('x', 2).is_err());
    }

    #[test]
    fn test_join_dimension_mismatch() {
        let mut a = NodeBlock::cartesian((2, 2, 2), DVec3::ZERO, DVec3::ONE);
        let b = NodeBlock::cartesian((2, 3, 2), DVec3::ZERO, DVec3::ONE);
        assert!(a.join(&b, 'i').is_err());
    }
}
