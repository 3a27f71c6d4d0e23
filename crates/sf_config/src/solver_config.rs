// crates/sf_config/src/solver_config.rs

//! SolverConfig - 求解器配置
//!
//! 聚合输入文件中的全部选项。字段全部使用 f64/usize 存储，
//! 由 serde 提供默认值，文本解析器负责填充。

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::boundary::{BoundaryStateSpec, InitialConditionSpec, SurfaceSpec};
use crate::error::ConfigError;
use crate::options::{
    EquationSet, FaceReconstruction, LimiterKind, MatrixSolverKind, TimeIntegration,
    TurbulenceModelKind, ViscousFaceReconstruction,
};
use sf_foundation::Floors;

// ============================================================
// 流体组分
// ============================================================

/// 流体组分描述
///
/// 量热完全气体：比热比与摩尔质量决定气体常数与比热。
/// 黏性由 Sutherland 律给出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidSpec {
    /// 组分名
    pub name: String,
    /// 参考质量分数
    #[serde(default = "default_one")]
    pub mass_fraction: f64,
    /// 摩尔质量 [kg/mol]
    #[serde(default = "default_molar_mass")]
    pub molar_mass: f64,
    /// 比热比
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Sutherland 黏性系数 C1 [kg/(m·s·K^0.5)]
    #[serde(default = "default_sutherland_c1")]
    pub sutherland_c1: f64,
    /// Sutherland 温度常数 S [K]
    #[serde(default = "default_sutherland_s")]
    pub sutherland_s: f64,
}

fn default_one() -> f64 {
    1.0
}
fn default_molar_mass() -> f64 {
    0.02897
}
fn default_gamma() -> f64 {
    1.4
}
fn default_sutherland_c1() -> f64 {
    1.458e-6
}
fn default_sutherland_s() -> f64 {
    110.4
}

impl FluidSpec {
    /// 标准空气
    pub fn air() -> Self {
        Self {
            name: "air".to_string(),
            mass_fraction: 1.0,
            molar_mass: default_molar_mass(),
            gamma: default_gamma(),
            sutherland_c1: default_sutherland_c1(),
            sutherland_s: default_sutherland_s(),
        }
    }

    /// 气体常数 R = R_univ / M [J/(kg·K)]
    #[inline]
    pub fn gas_constant(&self) -> f64 {
        const UNIVERSAL_GAS_CONSTANT: f64 = 8.314462618;
        UNIVERSAL_GAS_CONSTANT / self.molar_mass
    }
}

// ============================================================
// 求解器配置
// ============================================================

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 网格文件名（不含扩展名）
    #[serde(default)]
    pub grid_name: String,
    /// 算例名（输出文件前缀）
    #[serde(default)]
    pub run_name: String,
    /// 重启文件名（空表示冷启动）
    #[serde(default)]
    pub restart_name: String,

    /// 方程组
    #[serde(default)]
    pub equation_set: EquationSet,
    /// 时间推进
    #[serde(default)]
    pub time_integration: TimeIntegration,
    /// 湍流模型
    #[serde(default)]
    pub turbulence_model: TurbulenceModelKind,

    /// 全局时间步长 [s]，> 0 时覆盖 CFL
    #[serde(default)]
    pub dt: f64,
    /// CFL 起始值
    #[serde(default = "default_cfl_start")]
    pub cfl_start: f64,
    /// CFL 上限
    #[serde(default = "default_cfl_max")]
    pub cfl_max: f64,
    /// 每迭代 CFL 增量（0 表示 (max-start)/100）
    #[serde(default)]
    pub cfl_step: f64,
    /// 黏性谱半径系数
    #[serde(default = "default_viscous_cfl_factor")]
    pub viscous_cfl_factor: f64,

    /// 迭代次数
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// 非线性子迭代次数（多级时间推进 > 1）
    #[serde(default = "default_one_usize")]
    pub nonlinear_iterations: usize,
    /// 结果输出间隔
    #[serde(default = "default_iterations")]
    pub output_frequency: usize,
    /// 重启文件输出间隔（0 表示不输出）
    #[serde(default)]
    pub restart_frequency: usize,

    /// 面重构格式
    #[serde(default)]
    pub face_reconstruction: FaceReconstruction,
    /// 黏性面重构格式
    #[serde(default)]
    pub viscous_face_reconstruction: ViscousFaceReconstruction,
    /// 限制器
    #[serde(default)]
    pub limiter: LimiterKind,

    /// 线性求解器
    #[serde(default)]
    pub matrix_solver: MatrixSolverKind,
    /// 隐式松弛因子
    #[serde(default = "default_one")]
    pub matrix_relaxation: f64,
    /// 每迭代求解器扫掠次数
    #[serde(default = "default_one_usize")]
    pub matrix_sweeps: usize,
    /// 多重网格层数（1 或 2）
    #[serde(default = "default_one_usize")]
    pub mg_levels: usize,

    /// 参考温度 [K]
    #[serde(default = "default_t_ref")]
    pub reference_temperature: f64,
    /// 参考密度 [kg/m³]
    #[serde(default = "default_rho_ref")]
    pub reference_density: f64,
    /// 参考长度 [m]
    #[serde(default = "default_one")]
    pub reference_length: f64,

    /// 流体组分
    #[serde(default)]
    pub fluids: Vec<FluidSpec>,
    /// 初始条件记录
    #[serde(default)]
    pub initial_conditions: Vec<InitialConditionSpec>,
    /// 边界状态记录
    #[serde(default)]
    pub boundary_states: Vec<BoundaryStateSpec>,
    /// 每块的边界面片
    #[serde(default)]
    pub boundary_conditions: Vec<Vec<SurfaceSpec>>,

    /// 并行分解方案（外部协作者使用）
    #[serde(default = "default_decomposition")]
    pub decomposition_method: String,
    /// 输出变量名
    #[serde(default)]
    pub output_variables: Vec<String>,

    /// 幽灵层厚度
    #[serde(default = "default_ghost_layers")]
    pub ghost_layers: usize,
    /// 数值下限
    #[serde(default)]
    pub floors: Floors,
}

fn default_cfl_start() -> f64 {
    1.0
}
fn default_cfl_max() -> f64 {
    4.0
}
fn default_viscous_cfl_factor() -> f64 {
    4.0
}
fn default_iterations() -> usize {
    100
}
fn default_one_usize() -> usize {
    1
}
fn default_t_ref() -> f64 {
    288.15
}
fn default_rho_ref() -> f64 {
    1.2256
}
fn default_decomposition() -> String {
    "cubic".to_string()
}
fn default_ghost_layers() -> usize {
    2
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            grid_name: String::new(),
            run_name: String::new(),
            restart_name: String::new(),
            equation_set: EquationSet::default(),
            time_integration: TimeIntegration::default(),
            turbulence_model: TurbulenceModelKind::default(),
            dt: 0.0,
            cfl_start: default_cfl_start(),
            cfl_max: default_cfl_max(),
            cfl_step: 0.0,
            viscous_cfl_factor: default_viscous_cfl_factor(),
            iterations: default_iterations(),
            nonlinear_iterations: 1,
            output_frequency: default_iterations(),
            restart_frequency: 0,
            face_reconstruction: FaceReconstruction::default(),
            viscous_face_reconstruction: ViscousFaceReconstruction::default(),
            limiter: LimiterKind::default(),
            matrix_solver: MatrixSolverKind::default(),
            matrix_relaxation: 1.0,
            matrix_sweeps: 1,
            mg_levels: 1,
            reference_temperature: default_t_ref(),
            reference_density: default_rho_ref(),
            reference_length: 1.0,
            fluids: vec![FluidSpec::air()],
            initial_conditions: Vec::new(),
            boundary_states: Vec::new(),
            boundary_conditions: Vec::new(),
            decomposition_method: default_decomposition(),
            output_variables: Vec::new(),
            ghost_layers: default_ghost_layers(),
            floors: Floors::default(),
        }
    }
}

impl SolverConfig {
    /// 组分数量
    #[inline]
    pub fn num_species(&self) -> usize {
        self.fluids.len().max(1)
    }

    /// 湍流方程数量
    #[inline]
    pub fn num_turb_equations(&self) -> usize {
        if self.is_rans() {
            2
        } else {
            0
        }
    }

    /// 方程总数: ns + 动量 3 + 能量 1 + 湍流
    #[inline]
    pub fn num_equations(&self) -> usize {
        self.num_species() + 4 + self.num_turb_equations()
    }

    /// 是否求解黏性通量
    #[inline]
    pub fn is_viscous(&self) -> bool {
        self.equation_set.is_viscous()
    }

    /// 是否求解 RANS
    #[inline]
    pub fn is_rans(&self) -> bool {
        self.equation_set.is_rans() && self.turbulence_model != TurbulenceModelKind::None
    }

    /// 是否隐式推进
    #[inline]
    pub fn is_implicit(&self) -> bool {
        self.time_integration.is_implicit()
    }

    /// 是否使用局部时间步（CFL 推进）
    #[inline]
    pub fn is_local_dt(&self) -> bool {
        self.dt <= 0.0
    }

    /// 是否使用多级时间存储（BDF 类，需要 n-1 快照）
    #[inline]
    pub fn is_multilevel_in_time(&self) -> bool {
        self.nonlinear_iterations > 1
    }

    /// 给定迭代的 CFL 值（线性爬升）
    pub fn cfl(&self, iteration: usize) -> f64 {
        let step = if self.cfl_step > 0.0 {
            self.cfl_step
        } else {
            (self.cfl_max - self.cfl_start).max(0.0) / 100.0
        };
        (self.cfl_start + step * iteration as f64).min(self.cfl_max)
    }

    /// 校验配置一致性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt <= 0.0 && self.cfl_start <= 0.0 {
            return Err(ConfigError::invalid(
                "dt/cflStart",
                "dt 与 CFL 不能同时非正",
            ));
        }
        if self.equation_set.is_rans() && self.turbulence_model == TurbulenceModelKind::None {
            return Err(ConfigError::invalid(
                "turbulenceModel",
                "rans 方程组需要湍流模型",
            ));
        }
        if !self.equation_set.is_rans() && self.turbulence_model != TurbulenceModelKind::None {
            return Err(ConfigError::invalid(
                "turbulenceModel",
                "非 rans 方程组不应指定湍流模型",
            ));
        }
        if self.matrix_relaxation <= 0.0 {
            return Err(ConfigError::invalid("matrixRelaxation", "必须为正"));
        }
        if self.mg_levels == 0 || self.mg_levels > 2 {
            return Err(ConfigError::invalid("mgLevels", "仅支持 1 或 2 层"));
        }
        if self.ghost_layers < 2 {
            return Err(ConfigError::invalid("ghostLayers", "高阶重构至少需要 2 层"));
        }
        for (bb, surfs) in self.boundary_conditions.iter().enumerate() {
            for s in surfs {
                if !s.is_valid() {
                    return Err(ConfigError::invalid(
                        "boundaryConditions",
                        format!("块 {bb} 存在非平面面片"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// 自由来流方向上的初始速度（用于残差归一化等辅助输出）
    pub fn reference_velocity(&self) -> DVec3 {
        self.initial_conditions
            .iter()
            .find_map(|ic| match ic {
                InitialConditionSpec::Uniform { velocity, .. } => Some(*velocity),
                _ => None,
            })
            .unwrap_or(DVec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = SolverConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.num_equations(), 5);
        assert!(cfg.is_local_dt());
    }

    #[test]
    fn test_rans_equation_count() {
        let cfg = SolverConfig {
            equation_set: EquationSet::Rans,
            turbulence_model: TurbulenceModelKind::KOmegaWilcox2006,
            ..Default::default()
        };
        assert_eq!(cfg.num_equations(), 7);
        assert!(cfg.is_rans());
    }

    #[test]
    fn test_rans_without_model_rejected() {
        let cfg = SolverConfig {
            equation_set: EquationSet::Rans,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_dt_and_cfl_both_nonpositive_rejected() {
        let cfg = SolverConfig {
            dt: 0.0,
            cfl_start: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_cfl_ramp_reaches_max() {
        let cfg = SolverConfig {
            cfl_start: 1.0,
            cfl_max: 11.0,
            cfl_step: 0.1,
            ..Default::default()
        };
        assert!((cfg.cfl(0) - 1.0).abs() < 1e-12);
        assert!((cfg.cfl(50) - 6.0).abs() < 1e-12);
        assert!((cfg.cfl(1000) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_gas_constant_air() {
        let air = FluidSpec::air();
        assert!((air.gas_constant() - 287.0).abs() < 0.2);
    }
}
