// crates/sf_config/src/boundary.rs

//! 边界条件与边界状态记录
//!
//! 输入文件中的边界描述分为两部分：
//! - `boundaryConditions`: 每块每个面片的类型、索引范围与整数标签
//! - `boundaryStates`: 按标签键入的边界输入状态（驻点条件、出口压力等）
//!
//! 这里只保存解析后的记录；几何面片对象由网格层构建。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

// ============================================================
// 面片类型
// ============================================================

/// 边界面片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BcKind {
    /// 滑移壁（无穿透，切向自由）
    SlipWall,
    /// 黏性壁（无滑移；等温或绝热由状态记录决定）
    ViscousWall,
    /// 特征远场
    Characteristic,
    /// 超声速入口（全状态给定）
    SupersonicInflow,
    /// 超声速出口（全外推）
    SupersonicOutflow,
    /// 驻点入口
    StagnationInlet,
    /// 压力出口
    PressureOutlet,
    /// 周期边界（由连接配对处理）
    Periodic,
    /// 块间连接（由网格拼接生成，不出现在输入文件）
    Interblock,
}

impl BcKind {
    /// 是否为壁面类边界
    #[inline]
    pub fn is_wall(self) -> bool {
        matches!(self, Self::SlipWall | Self::ViscousWall)
    }

    /// 是否由连接交换填充（不经过幽灵填充器）
    #[inline]
    pub fn is_connection(self) -> bool {
        matches!(self, Self::Periodic | Self::Interblock)
    }

    /// 输入文件中的名字
    pub fn name(self) -> &'static str {
        match self {
            Self::SlipWall => "slipWall",
            Self::ViscousWall => "viscousWall",
            Self::Characteristic => "characteristic",
            Self::SupersonicInflow => "supersonicInflow",
            Self::SupersonicOutflow => "supersonicOutflow",
            Self::StagnationInlet => "stagnationInlet",
            Self::PressureOutlet => "pressureOutlet",
            Self::Periodic => "periodic",
            Self::Interblock => "interblock",
        }
    }
}

impl FromStr for BcKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slipWall" => Ok(Self::SlipWall),
            "viscousWall" => Ok(Self::ViscousWall),
            "characteristic" => Ok(Self::Characteristic),
            "supersonicInflow" => Ok(Self::SupersonicInflow),
            "supersonicOutflow" => Ok(Self::SupersonicOutflow),
            "stagnationInlet" => Ok(Self::StagnationInlet),
            "pressureOutlet" => Ok(Self::PressureOutlet),
            "periodic" => Ok(Self::Periodic),
            "interblock" => Ok(Self::Interblock),
            _ => Err(ConfigError::UnknownValue {
                key: "boundaryConditions",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================
// 面片记录
// ============================================================

/// 单个边界面片的输入记录
///
/// 索引范围为节点索引，遵循 `[min, max]` 闭区间；
/// 六个正交面片类中恰有一对 min == max。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    /// 面片类型
    pub kind: BcKind,
    /// i 方向范围
    pub i_range: [usize; 2],
    /// j 方向范围
    pub j_range: [usize; 2],
    /// k 方向范围
    pub k_range: [usize; 2],
    /// 状态记录标签
    pub tag: i32,
}

impl SurfaceSpec {
    /// 检查面片退化为一个索引面
    pub fn is_valid(&self) -> bool {
        let flat = [
            self.i_range[0] == self.i_range[1],
            self.j_range[0] == self.j_range[1],
            self.k_range[0] == self.k_range[1],
        ];
        flat.iter().filter(|f| **f).count() == 1
    }
}

// ============================================================
// 边界状态记录
// ============================================================

/// 按标签键入的边界状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BoundaryStateSpec {
    /// 黏性壁状态：等温（给定温度）或绝热（给定热流，默认 0）
    ViscousWall {
        /// 标签
        tag: i32,
        /// 壁面温度 [K]，None 表示绝热
        temperature: Option<f64>,
        /// 壁面热流 [W/m²]（绝热时为 0）
        heat_flux: f64,
        /// 壁面平移速度 [m/s]
        velocity: DVec3,
        /// 是否使用壁面函数
        wall_law: bool,
    },
    /// 驻点入口
    StagnationInlet {
        /// 标签
        tag: i32,
        /// 驻点压力 [Pa]
        p0: f64,
        /// 驻点温度 [K]
        t0: f64,
        /// 流动方向（单位向量）
        direction: DVec3,
        /// 湍流强度
        turb_intensity: f64,
        /// 湍流黏性比
        eddy_visc_ratio: f64,
    },
    /// 压力出口
    PressureOutlet {
        /// 标签
        tag: i32,
        /// 静压 [Pa]
        pressure: f64,
        /// 非反射处理
        nonreflecting: bool,
        /// 非反射松弛长度尺度 [m]
        length_scale: f64,
    },
    /// 特征远场 / 超声速入口共用的全状态记录
    FreestreamState {
        /// 标签
        tag: i32,
        /// 密度 [kg/m³]
        density: f64,
        /// 速度 [m/s]
        velocity: DVec3,
        /// 压力 [Pa]
        pressure: f64,
        /// 湍流强度
        turb_intensity: f64,
        /// 湍流黏性比
        eddy_visc_ratio: f64,
        /// 各组分质量分数（与 fluids 顺序一致；空表示单组分）
        mass_fractions: Vec<f64>,
    },
}

impl BoundaryStateSpec {
    /// 记录的标签
    pub fn tag(&self) -> i32 {
        match self {
            Self::ViscousWall { tag, .. }
            | Self::StagnationInlet { tag, .. }
            | Self::PressureOutlet { tag, .. }
            | Self::FreestreamState { tag, .. } => *tag,
        }
    }
}

// ============================================================
// 初始条件记录
// ============================================================

/// 初始条件记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InitialConditionSpec {
    /// 均匀初始场
    Uniform {
        /// 适用块标签（-1 表示所有块）
        tag: i32,
        /// 密度 [kg/m³]
        density: f64,
        /// 速度 [m/s]
        velocity: DVec3,
        /// 压力 [Pa]
        pressure: f64,
        /// 湍流强度
        turb_intensity: f64,
        /// 湍流黏性比
        eddy_visc_ratio: f64,
        /// 各组分质量分数
        mass_fractions: Vec<f64>,
    },
    /// 点云文件播种（最近邻）
    CloudFile {
        /// 适用块标签（-1 表示所有块）
        tag: i32,
        /// 点云文件路径
        file: String,
    },
}

impl InitialConditionSpec {
    /// 记录的标签
    pub fn tag(&self) -> i32 {
        match self {
            Self::Uniform { tag, .. } | Self::CloudFile { tag, .. } => *tag,
        }
    }

    /// 查找适用于给定块的记录：精确匹配优先，其次通配 -1
    pub fn find_for_block<'a>(
        specs: &'a [InitialConditionSpec],
        block_tag: i32,
    ) -> Option<&'a InitialConditionSpec> {
        specs
            .iter()
            .find(|s| s.tag() == block_tag)
            .or_else(|| specs.iter().find(|s| s.tag() == -1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bc_kind_roundtrip() {
        for kind in [
            BcKind::SlipWall,
            BcKind::ViscousWall,
            BcKind::StagnationInlet,
            BcKind::PressureOutlet,
            BcKind::Periodic,
        ] {
            assert_eq!(kind.name().parse::<BcKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_surface_spec_validity() {
        let good = SurfaceSpec {
            kind: BcKind::SlipWall,
            i_range: [0, 0],
            j_range: [0, 4],
            k_range: [0, 2],
            tag: 1,
        };
        assert!(good.is_valid());

        let bad = SurfaceSpec {
            i_range: [0, 1],
            ..good.clone()
        };
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_ic_lookup_prefers_exact_tag() {
        let specs = vec![
            InitialConditionSpec::Uniform {
                tag: -1,
                density: 1.0,
                velocity: DVec3::ZERO,
                pressure: 1e5,
                turb_intensity: 0.01,
                eddy_visc_ratio: 10.0,
                mass_fractions: vec![],
            },
            InitialConditionSpec::Uniform {
                tag: 2,
                density: 2.0,
                velocity: DVec3::ZERO,
                pressure: 2e5,
                turb_intensity: 0.01,
                eddy_visc_ratio: 10.0,
                mass_fractions: vec![],
            },
        ];
        assert_eq!(
            InitialConditionSpec::find_for_block(&specs, 2).unwrap().tag(),
            2
        );
        assert_eq!(
            InitialConditionSpec::find_for_block(&specs, 7).unwrap().tag(),
            -1
        );
    }
}
