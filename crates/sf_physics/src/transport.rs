// crates/sf_physics/src/transport.rs

//! 输运能力
//!
//! 层流黏性由 Sutherland 律给出，混合按质量分数加权；
//! 导热系数经 Prandtl 数闭合。无量纲化：μ 以 ρ_ref·a_ref·l_ref
//! 归一（等价于隐含雷诺数）。

use sf_config::SolverConfig;

/// 输运能力
pub trait Transport: Send + Sync {
    /// 层流黏性 μ(T, Y)
    fn viscosity(&self, temperature: f64, mass_fractions: &[f64]) -> f64;

    /// 层流 Prandtl 数
    fn prandtl(&self) -> f64;

    /// 湍流 Prandtl 数
    fn turb_prandtl(&self) -> f64;

    /// 质量分数转摩尔分数
    fn mole_fractions(&self, mass_fractions: &[f64]) -> Vec<f64>;

    /// 层流导热系数 λ = μ·cp/Pr
    fn thermal_conductivity(&self, mu: f64, cp: f64) -> f64 {
        mu * cp / self.prandtl()
    }

    /// 湍流导热系数 λt = μt·cp/Pr_t
    fn turb_thermal_conductivity(&self, mu_t: f64, cp: f64) -> f64 {
        mu_t * cp / self.turb_prandtl()
    }
}

// ============================================================
// Sutherland 输运
// ============================================================

/// Sutherland 律输运模型
#[derive(Debug, Clone)]
pub struct Sutherland {
    /// 各组分 (C1, S) 无量纲化后的系数
    coeffs: Vec<(f64, f64)>,
    /// 各组分摩尔质量 [kg/mol]
    molar_mass: Vec<f64>,
    t_ref: f64,
    mu_ref: f64,
}

impl Sutherland {
    /// 由配置构造
    ///
    /// `mu_ref = ρ_ref · a_ref · l_ref`（由物理束预先算好传入）。
    pub fn from_config(config: &SolverConfig, mu_ref: f64) -> Self {
        Self {
            coeffs: config
                .fluids
                .iter()
                .map(|f| (f.sutherland_c1, f.sutherland_s))
                .collect(),
            molar_mass: config.fluids.iter().map(|f| f.molar_mass).collect(),
            t_ref: config.reference_temperature,
            mu_ref,
        }
    }

    /// 组分的量纲黏性 [kg/(m·s)]
    fn species_viscosity_dim(&self, s: usize, t_dim: f64) -> f64 {
        let (c1, sc) = self.coeffs[s];
        c1 * t_dim.powf(1.5) / (t_dim + sc)
    }
}

impl Transport for Sutherland {
    fn viscosity(&self, temperature: f64, mass_fractions: &[f64]) -> f64 {
        let t_dim = temperature * self.t_ref;
        let mu_dim: f64 = mass_fractions
            .iter()
            .enumerate()
            .map(|(s, y)| y * self.species_viscosity_dim(s, t_dim))
            .sum();
        mu_dim / self.mu_ref
    }

    fn prandtl(&self) -> f64 {
        0.72
    }

    fn turb_prandtl(&self) -> f64 {
        0.9
    }

    fn mole_fractions(&self, mass_fractions: &[f64]) -> Vec<f64> {
        let total: f64 = mass_fractions
            .iter()
            .zip(&self.molar_mass)
            .map(|(y, m)| y / m)
            .sum();
        mass_fractions
            .iter()
            .zip(&self.molar_mass)
            .map(|(y, m)| (y / m) / total)
            .collect()
    }
}
