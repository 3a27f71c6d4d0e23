// crates/sf_config/src/lib.rs

//! StratoFlow 配置层
//!
//! 解析输入文件并提供求解器配置：
//! - [`options`]: 方程组、时间推进、重构格式等枚举选项
//! - [`boundary`]: 边界条件与边界状态记录
//! - [`solver_config`]: 聚合配置结构体与校验
//! - [`parser`]: 文本输入文件解析器

pub mod boundary;
pub mod error;
pub mod options;
pub mod parser;
pub mod solver_config;

pub use boundary::{BcKind, BoundaryStateSpec, InitialConditionSpec, SurfaceSpec};
pub use error::ConfigError;
pub use options::{
    EquationSet, FaceReconstruction, LimiterKind, MatrixSolverKind, TimeIntegration,
    TurbulenceModelKind, ViscousFaceReconstruction,
};
pub use solver_config::{FluidSpec, SolverConfig};
