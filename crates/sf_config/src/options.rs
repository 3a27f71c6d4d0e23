// crates/sf_config/src/options.rs

//! 枚举选项
//!
//! 输入文件中以字符串出现的离散选项，解析失败返回
//! [`ConfigError::UnknownValue`]。

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

/// 方程组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EquationSet {
    /// 无黏 Euler 方程
    Euler,
    /// 层流 Navier-Stokes
    #[default]
    NavierStokes,
    /// 雷诺平均 Navier-Stokes（需要湍流模型）
    Rans,
}

impl EquationSet {
    /// 是否包含黏性通量
    #[inline]
    pub fn is_viscous(self) -> bool {
        !matches!(self, Self::Euler)
    }

    /// 是否求解湍流输运方程
    #[inline]
    pub fn is_rans(self) -> bool {
        matches!(self, Self::Rans)
    }
}

impl FromStr for EquationSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "euler" => Ok(Self::Euler),
            "navierStokes" => Ok(Self::NavierStokes),
            "rans" => Ok(Self::Rans),
            _ => Err(ConfigError::UnknownValue {
                key: "equationSet",
                value: s.to_string(),
            }),
        }
    }
}

/// 时间推进方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimeIntegration {
    /// 显式 Euler
    #[default]
    ExplicitEuler,
    /// 四步低存储 Runge-Kutta
    Rk4,
    /// 隐式 Euler（需要线性求解器）
    ImplicitEuler,
}

impl TimeIntegration {
    /// 是否为隐式推进
    #[inline]
    pub fn is_implicit(self) -> bool {
        matches!(self, Self::ImplicitEuler)
    }

    /// 非线性子迭代内的阶段数（RK4 为 4，其余为 1）
    #[inline]
    pub fn num_stages(self) -> usize {
        match self {
            Self::Rk4 => 4,
            _ => 1,
        }
    }
}

impl FromStr for TimeIntegration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicitEuler" => Ok(Self::ExplicitEuler),
            "rk4" => Ok(Self::Rk4),
            "implicitEuler" => Ok(Self::ImplicitEuler),
            _ => Err(ConfigError::UnknownValue {
                key: "timeIntegration",
                value: s.to_string(),
            }),
        }
    }
}

/// 面重构格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FaceReconstruction {
    /// 常数外推（一阶）
    First,
    /// MUSCL 三单元模板，κ = 1/3
    #[default]
    ThirdOrder,
    /// 五单元 WENO
    Weno,
    /// 五单元 WENO-Z
    WenoZ,
}

impl FaceReconstruction {
    /// 是否为 WENO 族
    #[inline]
    pub fn is_weno(self) -> bool {
        matches!(self, Self::Weno | Self::WenoZ)
    }

    /// MUSCL κ 参数
    #[inline]
    pub fn kappa(self) -> f64 {
        1.0 / 3.0
    }
}

impl FromStr for FaceReconstruction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "thirdOrder" => Ok(Self::ThirdOrder),
            "weno" => Ok(Self::Weno),
            "wenoZ" => Ok(Self::WenoZ),
            _ => Err(ConfigError::UnknownValue {
                key: "faceReconstruction",
                value: s.to_string(),
            }),
        }
    }
}

/// 黏性面重构格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ViscousFaceReconstruction {
    /// 两点中心（按单元宽度加权）
    #[default]
    Central,
    /// 四点中心（四阶）
    CentralFourth,
}

impl FromStr for ViscousFaceReconstruction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "central" => Ok(Self::Central),
            "centralFourth" => Ok(Self::CentralFourth),
            _ => Err(ConfigError::UnknownValue {
                key: "viscousFaceReconstruction",
                value: s.to_string(),
            }),
        }
    }
}

/// 斜率限制器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LimiterKind {
    /// 不限制
    #[default]
    None,
    /// van Albada
    VanAlbada,
    /// minmod
    MinMod,
}

impl FromStr for LimiterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "vanAlbada" => Ok(Self::VanAlbada),
            "minmod" => Ok(Self::MinMod),
            _ => Err(ConfigError::UnknownValue {
                key: "limiter",
                value: s.to_string(),
            }),
        }
    }
}

/// 线性求解器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MatrixSolverKind {
    /// LU-SGS，主对角为非耦合标量对
    #[default]
    Lusgs,
    /// LU-SGS，主对角为完整块 Jacobian
    BlockLusgs,
}

impl MatrixSolverKind {
    /// 主对角是否存储完整块矩阵
    #[inline]
    pub fn is_block_matrix(self) -> bool {
        matches!(self, Self::BlockLusgs)
    }
}

impl FromStr for MatrixSolverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lusgs" => Ok(Self::Lusgs),
            "blusgs" => Ok(Self::BlockLusgs),
            _ => Err(ConfigError::UnknownValue {
                key: "matrixSolver",
                value: s.to_string(),
            }),
        }
    }
}

/// 湍流模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TurbulenceModelKind {
    /// 不求解湍流
    #[default]
    None,
    /// k-ω Wilcox 2006
    KOmegaWilcox2006,
    /// k-ω SST 2003
    KOmegaSst2003,
}

impl FromStr for TurbulenceModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "kOmegaWilcox2006" => Ok(Self::KOmegaWilcox2006),
            "sst2003" | "kOmegaSst2003" => Ok(Self::KOmegaSst2003),
            _ => Err(ConfigError::UnknownValue {
                key: "turbulenceModel",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equation_set_parse() {
        assert_eq!("rans".parse::<EquationSet>().unwrap(), EquationSet::Rans);
        assert!("mhd".parse::<EquationSet>().is_err());
        assert!(EquationSet::Rans.is_viscous());
        assert!(!EquationSet::Euler.is_viscous());
    }

    #[test]
    fn test_time_integration_stages() {
        assert_eq!(TimeIntegration::Rk4.num_stages(), 4);
        assert_eq!(TimeIntegration::ImplicitEuler.num_stages(), 1);
        assert!(TimeIntegration::ImplicitEuler.is_implicit());
    }

    #[test]
    fn test_reconstruction_parse() {
        assert_eq!(
            "wenoZ".parse::<FaceReconstruction>().unwrap(),
            FaceReconstruction::WenoZ
        );
        assert!(FaceReconstruction::Weno.is_weno());
        assert!((FaceReconstruction::ThirdOrder.kappa() - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_unknown_limiter_is_error() {
        assert!(matches!(
            "superbee".parse::<LimiterKind>(),
            Err(ConfigError::UnknownValue { key: "limiter", .. })
        ));
    }
}
