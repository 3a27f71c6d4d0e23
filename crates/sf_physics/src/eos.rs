// crates/sf_physics/src/eos.rs

//! 状态方程与热力学能力
//!
//! 全部接口工作在无量纲单位：密度以 ρ_ref、温度以 T_ref、
//! 压力以 ρ_ref·a_ref²、比能以 a_ref² 归一。量热完全理想气体下
//! P = ρ·R·T/γ_ref，a² = γ·P/ρ。

use sf_config::SolverConfig;

/// 状态方程能力
pub trait Eos: Send + Sync {
    /// 温度 T(P, ρ_s)
    fn temperature(&self, pressure: f64, rho_s: &[f64]) -> f64;

    /// 压力 P(ρ_s, T)
    fn pressure(&self, rho_s: &[f64], temperature: f64) -> f64;

    /// 由比总能（已扣除湍动能）求压力
    fn press_from_energy(&self, rho_s: &[f64], energy: f64, vel_mag: f64) -> f64;

    /// 比内能 e(T, Y)
    fn internal_energy(&self, temperature: f64, mass_fractions: &[f64]) -> f64;

    /// 比焓 h(T, Y)
    fn enthalpy(&self, temperature: f64, mass_fractions: &[f64]) -> f64;

    /// 声速
    fn sos(&self, pressure: f64, rho_s: &[f64]) -> f64;

    /// 定压比热
    fn cp(&self, temperature: f64, mass_fractions: &[f64]) -> f64;

    /// 定容比热
    fn cv(&self, temperature: f64, mass_fractions: &[f64]) -> f64;

    /// 混合比热比
    fn gamma(&self, mass_fractions: &[f64]) -> f64;

    /// 参考比热比（无量纲锚点）
    fn gamma_ref(&self) -> f64;
}

// ============================================================
// 量热完全理想气体
// ============================================================

/// 量热完全理想气体（多组分混合）
#[derive(Debug, Clone)]
pub struct IdealGas {
    /// 各组分无量纲气体常数 R_s / R_ref
    r: Vec<f64>,
    /// 各组分比热比
    gamma_s: Vec<f64>,
    /// 参考比热比
    gamma_ref: f64,
}

impl IdealGas {
    /// 由配置构造
    ///
    /// R_ref 取参考质量分数加权的混合气体常数。
    pub fn from_config(config: &SolverConfig) -> Self {
        let fluids = &config.fluids;
        let total_mf: f64 = fluids.iter().map(|f| f.mass_fraction).sum();
        let r_ref: f64 = fluids
            .iter()
            .map(|f| f.mass_fraction / total_mf * f.gas_constant())
            .sum();
        let gamma_ref: f64 = fluids
            .iter()
            .map(|f| f.mass_fraction / total_mf * f.gamma)
            .sum();
        Self {
            r: fluids.iter().map(|f| f.gas_constant() / r_ref).collect(),
            gamma_s: fluids.iter().map(|f| f.gamma).collect(),
            gamma_ref,
        }
    }

    /// 混合无量纲气体常数
    fn r_mix_from_rho(&self, rho_s: &[f64]) -> f64 {
        let rho: f64 = rho_s.iter().sum();
        rho_s
            .iter()
            .zip(&self.r)
            .map(|(rs, r)| rs / rho * r)
            .sum()
    }

    fn r_mix(&self, mass_fractions: &[f64]) -> f64 {
        mass_fractions.iter().zip(&self.r).map(|(y, r)| y * r).sum()
    }

    fn cp_mix(&self, mass_fractions: &[f64]) -> f64 {
        mass_fractions
            .iter()
            .zip(self.r.iter().zip(&self.gamma_s))
            .map(|(y, (r, g))| y * g * r / ((g - 1.0) * self.gamma_ref))
            .sum()
    }

    fn cv_mix(&self, mass_fractions: &[f64]) -> f64 {
        mass_fractions
            .iter()
            .zip(self.r.iter().zip(&self.gamma_s))
            .map(|(y, (r, g))| y * r / ((g - 1.0) * self.gamma_ref))
            .sum()
    }
}

impl Eos for IdealGas {
    fn temperature(&self, pressure: f64, rho_s: &[f64]) -> f64 {
        let rho: f64 = rho_s.iter().sum();
        self.gamma_ref * pressure / (rho * self.r_mix_from_rho(rho_s))
    }

    fn pressure(&self, rho_s: &[f64], temperature: f64) -> f64 {
        let rho: f64 = rho_s.iter().sum();
        rho * self.r_mix_from_rho(rho_s) * temperature / self.gamma_ref
    }

    fn press_from_energy(&self, rho_s: &[f64], energy: f64, vel_mag: f64) -> f64 {
        let rho: f64 = rho_s.iter().sum();
        let mf: Vec<f64> = rho_s.iter().map(|r| r / rho).collect();
        let e_int = energy - 0.5 * vel_mag * vel_mag;
        let temperature = e_int / self.cv_mix(&mf);
        self.pressure(rho_s, temperature)
    }

    fn internal_energy(&self, temperature: f64, mass_fractions: &[f64]) -> f64 {
        self.cv_mix(mass_fractions) * temperature
    }

    fn enthalpy(&self, temperature: f64, mass_fractions: &[f64]) -> f64 {
        self.cp_mix(mass_fractions) * temperature
    }

    fn sos(&self, pressure: f64, rho_s: &[f64]) -> f64 {
        let rho: f64 = rho_s.iter().sum();
        let mf: Vec<f64> = rho_s.iter().map(|r| r / rho).collect();
        (self.gamma(&mf) * pressure / rho).sqrt()
    }

    fn cp(&self, _temperature: f64, mass_fractions: &[f64]) -> f64 {
        self.cp_mix(mass_fractions)
    }

    fn cv(&self, _temperature: f64, mass_fractions: &[f64]) -> f64 {
        self.cv_mix(mass_fractions)
    }

    fn gamma(&self, mass_fractions: &[f64]) -> f64 {
        self.cp_mix(mass_fractions) / self.cv_mix(mass_fractions)
    }

    fn gamma_ref(&self) -> f64 {
        self.gamma_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn air() -> IdealGas {
        IdealGas::from_config(&SolverConfig::default())
    }

    #[test]
    fn test_reference_state_is_unity() {
        let eos = air();
        // 无量纲参考态: ρ=1, T=1 → P = 1/γ
        let p = eos.pressure(&[1.0], 1.0);
        assert!((p - 1.0 / 1.4).abs() < 1e-12);
        assert!((eos.temperature(p, &[1.0]) - 1.0).abs() < 1e-12);
        // 参考声速为 1
        assert!((eos.sos(p, &[1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_energy_pressure_roundtrip() {
        let eos = air();
        let rho_s = [0.8];
        let t = 1.3;
        let p = eos.pressure(&rho_s, t);
        let e = eos.internal_energy(t, &[1.0]);
        let vel = 0.4;
        let p2 = eos.press_from_energy(&rho_s, e + 0.5 * vel * vel, vel);
        assert!((p - p2).abs() < 1e-13);
    }

    #[test]
    fn test_gamma_relation() {
        let eos = air();
        let mf = [1.0];
        let cp = eos.cp(1.0, &mf);
        let cv = eos.cv(1.0, &mf);
        assert!((cp - cv - 1.0 / 1.4).abs() < 1e-12, "cp - cv = R/γ_ref");
        assert!((eos.gamma(&mf) - 1.4).abs() < 1e-12);
    }
}
