// crates/sf_physics/src/spatial.rs

//! 空间索引
//!
//! R* 树上的最近邻查询：黏性壁面距离（对全部黏性面心建树）
//! 与点云初始条件播种共用。

use glam::DVec3;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::error::PhysicsError;
use crate::physics::Physics;
use crate::state::{Primitive, StateLayout};

type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// 点集上的最近邻索引
#[derive(Debug)]
pub struct PointCloud {
    tree: RTree<IndexedPoint>,
}

impl PointCloud {
    /// 由点集构建
    pub fn new(points: &[DVec3]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(n, p)| IndexedPoint::new([p.x, p.y, p.z], n))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// 最近点的序号与距离
    pub fn nearest(&self, p: DVec3) -> Option<(usize, f64)> {
        self.tree
            .nearest_neighbor(&[p.x, p.y, p.z])
            .map(|entry| {
                let d = DVec3::from_array(*entry.geom()) - p;
                (entry.data, d.length())
            })
    }
}

// ============================================================
// 点云初始条件
// ============================================================

/// 点云文件：空白分隔的行
/// `x y z density vel_x vel_y vel_z pressure [tke sdr] [mf...]`
///
/// 坐标与状态为量纲值，读取时换算到无量纲。
pub fn read_cloud_file(
    path: &std::path::Path,
    layout: StateLayout,
    phys: &Physics,
) -> Result<(Vec<DVec3>, Vec<Primitive>), PhysicsError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PhysicsError::CloudFile(format!("{}: {e}", path.display())))?;

    let sc = &phys.scales;
    let expected = 3 + 5 + layout.num_turb() + if layout.num_species() > 1 {
        layout.num_species()
    } else {
        0
    };

    let mut points = Vec::new();
    let mut states = Vec::new();
    for (no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|t| t.parse())
            .collect::<Result<_, _>>()
            .map_err(|_| PhysicsError::CloudFile(format!("行 {} 无法解析", no + 1)))?;
        if values.len() != expected {
            return Err(PhysicsError::CloudFile(format!(
                "行 {} 字段数 {} != {expected}",
                no + 1,
                values.len()
            )));
        }

        points.push(DVec3::new(values[0], values[1], values[2]) / sc.l_ref);

        let rho = sc.nondim_density(values[3]);
        let mut state = Primitive::zeros(layout);
        let fractions: Vec<f64> = if layout.num_species() > 1 {
            values[values.len() - layout.num_species()..].to_vec()
        } else {
            vec![1.0]
        };
        for (s, y) in fractions.iter().enumerate() {
            state.as_mut_slice()[s] = rho * y;
        }
        state.set_velocity(DVec3::new(values[4], values[5], values[6]) / sc.a_ref);
        state.set_p(sc.nondim_pressure(values[7]));
        if layout.has_turbulence() {
            state.set_turb(
                values[8] / (sc.a_ref * sc.a_ref),
                values[9] * sc.time_ref,
            );
        }
        states.push(state);
    }

    if points.is_empty() {
        return Err(PhysicsError::CloudFile(format!(
            "{} 不含任何数据行",
            path.display()
        )));
    }
    Ok((points, states))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_neighbor() {
        let cloud = PointCloud::new(&[
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
        ]);
        let (idx, dist) = cloud.nearest(DVec3::new(0.9, 0.1, 0.0)).unwrap();
        assert_eq!(idx, 1);
        assert!(dist < 0.2);
    }

    #[test]
    fn test_empty_cloud() {
        let cloud = PointCloud::new(&[]);
        assert!(cloud.is_empty());
        assert!(cloud.nearest(DVec3::ZERO).is_none());
    }

    #[test]
    fn test_read_cloud_file_roundtrip() {
        use crate::physics::test_support::air_physics;
        let phys = air_physics(false);
        let dir = std::env::temp_dir().join("sf_cloud_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cloud.dat");
        std::fs::write(&path, "# cloud\n0.0 0.0 0.0 1.2256 340.0 0.0 0.0 101325.0\n").unwrap();

        let (points, states) = read_cloud_file(&path, phys.layout, &phys).unwrap();
        assert_eq!(points.len(), 1);
        assert!((states[0].rho() - 1.0).abs() < 1e-12);
        assert!((states[0].u() - 340.0 / phys.scales.a_ref).abs() < 1e-12);
    }

    #[test]
    fn test_read_cloud_file_bad_width() {
        use crate::physics::test_support::air_physics;
        let phys = air_physics(false);
        let dir = std::env::temp_dir().join("sf_cloud_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.dat");
        std::fs::write(&path, "0.0 0.0 0.0 1.0\n").unwrap();
        assert!(read_cloud_file(&path, phys.layout, &phys).is_err());
    }
}
