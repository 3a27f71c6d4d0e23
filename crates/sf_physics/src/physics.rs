// crates/sf_physics/src/physics.rs

//! 物理模型束
//!
//! 状态方程、输运、湍流与化学能力的聚合，连同无量纲化标尺。
//! 能力以 trait 对象持有，由网格级拥有、按引用传入块操作。

use sf_config::SolverConfig;

use crate::chemistry::{Chemistry, Frozen};
use crate::eos::{Eos, IdealGas};
use crate::state::StateLayout;
use crate::transport::{Sutherland, Transport};
use crate::turbulence::{create_turbulence_model, TurbulenceModel};

// ============================================================
// 无量纲化标尺
// ============================================================

/// 无量纲化标尺
///
/// 速度以参考声速、压力以 ρ_ref·a_ref²、时间以 l_ref/a_ref 归一。
#[derive(Debug, Clone, Copy)]
pub struct NondimScales {
    /// 参考密度 [kg/m³]
    pub rho_ref: f64,
    /// 参考温度 [K]
    pub t_ref: f64,
    /// 参考长度 [m]
    pub l_ref: f64,
    /// 参考声速 [m/s]
    pub a_ref: f64,
    /// 参考压力 ρ_ref·a_ref² [Pa]
    pub p_ref: f64,
    /// 参考黏性 ρ_ref·a_ref·l_ref [kg/(m·s)]
    pub mu_ref: f64,
    /// 参考时间 l_ref/a_ref [s]
    pub time_ref: f64,
}

impl NondimScales {
    /// 由配置计算
    pub fn from_config(config: &SolverConfig) -> Self {
        let total_mf: f64 = config.fluids.iter().map(|f| f.mass_fraction).sum();
        let r_ref: f64 = config
            .fluids
            .iter()
            .map(|f| f.mass_fraction / total_mf * f.gas_constant())
            .sum();
        let gamma_ref: f64 = config
            .fluids
            .iter()
            .map(|f| f.mass_fraction / total_mf * f.gamma)
            .sum();
        let a_ref = (gamma_ref * r_ref * config.reference_temperature).sqrt();
        let rho_ref = config.reference_density;
        let l_ref = config.reference_length;
        Self {
            rho_ref,
            t_ref: config.reference_temperature,
            l_ref,
            a_ref,
            p_ref: rho_ref * a_ref * a_ref,
            mu_ref: rho_ref * a_ref * l_ref,
            time_ref: l_ref / a_ref,
        }
    }

    /// 量纲压力转无量纲
    #[inline]
    pub fn nondim_pressure(&self, p: f64) -> f64 {
        p / self.p_ref
    }

    /// 量纲密度转无量纲
    #[inline]
    pub fn nondim_density(&self, rho: f64) -> f64 {
        rho / self.rho_ref
    }

    /// 量纲速度转无量纲
    #[inline]
    pub fn nondim_velocity(&self, v: f64) -> f64 {
        v / self.a_ref
    }

    /// 量纲温度转无量纲
    #[inline]
    pub fn nondim_temperature(&self, t: f64) -> f64 {
        t / self.t_ref
    }

    /// 量纲长度转无量纲
    #[inline]
    pub fn nondim_length(&self, l: f64) -> f64 {
        l / self.l_ref
    }

    /// 量纲时间转无量纲
    #[inline]
    pub fn nondim_time(&self, t: f64) -> f64 {
        t / self.time_ref
    }
}

// ============================================================
// 物理束
// ============================================================

/// 物理模型束
pub struct Physics {
    /// 状态方程
    pub eos: Box<dyn Eos>,
    /// 输运模型
    pub transport: Box<dyn Transport>,
    /// 湍流闭合
    pub turbulence: Box<dyn TurbulenceModel>,
    /// 化学
    pub chemistry: Box<dyn Chemistry>,
    /// 无量纲化标尺
    pub scales: NondimScales,
    /// 状态布局
    pub layout: StateLayout,
}

impl Physics {
    /// 由配置构造
    pub fn from_config(config: &SolverConfig) -> Self {
        let scales = NondimScales::from_config(config);
        let turbulence = create_turbulence_model(if config.is_rans() {
            config.turbulence_model
        } else {
            sf_config::TurbulenceModelKind::None
        });
        let layout = StateLayout::new(config.num_species(), turbulence.num_equations());
        Self {
            eos: Box::new(IdealGas::from_config(config)),
            transport: Box::new(Sutherland::from_config(config, scales.mu_ref)),
            turbulence,
            chemistry: Box::new(Frozen),
            scales,
            layout,
        }
    }

    /// 是否求解湍流输运
    #[inline]
    pub fn has_turbulence(&self) -> bool {
        self.layout.has_turbulence()
    }
}

impl std::fmt::Debug for Physics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Physics")
            .field("layout", &self.layout)
            .field("scales", &self.scales)
            .finish()
    }
}

/// 测试辅助
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use sf_config::{EquationSet, TurbulenceModelKind};

    /// 标准空气物理束（可选湍流）
    pub fn air_physics(turbulent: bool) -> Physics {
        let mut config = SolverConfig::default();
        if turbulent {
            config.equation_set = EquationSet::Rans;
            config.turbulence_model = TurbulenceModelKind::KOmegaSst2003;
        }
        Physics::from_config(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_air() {
        let scales = NondimScales::from_config(&SolverConfig::default());
        // 288.15 K 空气声速约 340 m/s
        assert!((scales.a_ref - 340.3).abs() < 1.0, "a_ref = {}", scales.a_ref);
        assert!(scales.p_ref > 1.0e5);
        assert!((scales.nondim_temperature(288.15) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_physics_layout_follows_model() {
        let phys = test_support::air_physics(false);
        assert_eq!(phys.layout.size(), 5);
        assert!(!phys.has_turbulence());

        let phys = test_support::air_physics(true);
        assert_eq!(phys.layout.size(), 7);
        assert!(phys.has_turbulence());
    }
}
