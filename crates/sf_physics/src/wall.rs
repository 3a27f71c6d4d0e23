// crates/sf_physics/src/wall.rs

//! 黏性壁面数据
//!
//! 每个黏性壁面片持有逐面的剪切应力、热流、y+、壁面状态与摩擦速度。
//! 壁面律（Spalding 剖面 + Ridder 求根）与低雷诺数直接差分两种
//! 策略按 y+ < 10 切换。

use glam::DVec3;
use serde::{Deserialize, Serialize};

use sf_foundation::interp::find_root;
use sf_grid::{Array3D, BoundarySurface};

use crate::physics::Physics;
use crate::state::Primitive;

/// von Karman 常数
const KAPPA: f64 = 0.41;
/// 对数律截距
const B_CONST: f64 = 5.2;
/// k-ω 模型 β*
const BETA_STAR: f64 = 0.09;

// ============================================================
// 逐面壁量
// ============================================================

/// 一个壁面面元的数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallVars {
    /// 壁面剪切应力向量
    pub shear_stress: DVec3,
    /// 壁面热流
    pub heat_flux: f64,
    /// 第一层网格 y+
    pub yplus: f64,
    /// 壁面温度
    pub temperature: f64,
    /// 壁面涡黏性
    pub turb_eddy_visc: f64,
    /// 壁面层流黏性
    pub viscosity: f64,
    /// 壁面密度
    pub density: f64,
    /// 摩擦速度
    pub friction_velocity: f64,
    /// 壁面湍动能
    pub tke: f64,
    /// 壁面比耗散率
    pub sdr: f64,
    /// 壁面质量分数
    pub mass_fractions: Vec<f64>,
}

impl Default for WallVars {
    fn default() -> Self {
        Self::new(0)
    }
}

impl WallVars {
    /// 指定组分数创建
    pub fn new(num_species: usize) -> Self {
        Self {
            shear_stress: DVec3::ZERO,
            heat_flux: 0.0,
            yplus: 0.0,
            temperature: 0.0,
            turb_eddy_visc: 0.0,
            viscosity: 0.0,
            density: 0.0,
            friction_velocity: 0.0,
            tke: 0.0,
            sdr: 0.0,
            mass_fractions: vec![0.0; num_species],
        }
    }

    /// 是否切换到低雷诺数处理
    #[inline]
    pub fn switch_to_low_re(&self) -> bool {
        self.yplus < 10.0
    }
}

// ============================================================
// 壁面数据
// ============================================================

/// 一个黏性壁面片的全部数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallData {
    /// 所属面片
    pub surface: BoundarySurface,
    /// 是否使用壁面律
    pub wall_law: bool,
    /// 壁面平移速度（无量纲）
    pub wall_velocity: DVec3,
    /// 给定壁面温度（无量纲；None 为绝热）
    pub wall_temperature: Option<f64>,
    /// 给定热流（绝热为 0）
    pub wall_heat_flux: f64,
    data: Array3D<WallVars>,
}

impl WallData {
    /// 创建
    pub fn new(
        surface: BoundarySurface,
        wall_law: bool,
        wall_velocity: DVec3,
        wall_temperature: Option<f64>,
        wall_heat_flux: f64,
        num_species: usize,
    ) -> Self {
        let n1 = surface.r1.1 - surface.r1.0;
        let n2 = surface.r2.1 - surface.r2.0;
        Self {
            surface,
            wall_law,
            wall_velocity,
            wall_temperature,
            wall_heat_flux,
            data: Array3D::filled(n1, n2, 1, 0, WallVars::new(num_species)),
        }
    }

    /// 面元数据（绝对切向坐标）
    #[inline]
    pub fn at(&self, t1: isize, t2: isize) -> &WallVars {
        self.data
            .get(t1 - self.surface.r1.0 as isize, t2 - self.surface.r2.0 as isize, 0)
    }

    /// 可变面元数据
    #[inline]
    pub fn at_mut(&mut self, t1: isize, t2: isize) -> &mut WallVars {
        self.data
            .get_mut(t1 - self.surface.r1.0 as isize, t2 - self.surface.r2.0 as isize, 0)
    }

    /// 壁面原始状态（密度由内部压力与壁面温度经状态方程得出）
    pub fn wall_state(&self, t1: isize, t2: isize, interior: &Primitive, phys: &Physics) -> Primitive {
        let vars = self.at(t1, t2);
        let mut state = interior.clone();
        state.set_velocity(self.wall_velocity);
        let t_wall = if vars.temperature > 0.0 {
            vars.temperature
        } else {
            interior.temperature(phys)
        };
        // 压力取内部值，密度随温度按状态方程调整
        let mf = interior.mass_fractions();
        let rho = interior.rho() * interior.temperature(phys) / t_wall;
        for (s, y) in mf.iter().enumerate() {
            state.as_mut_slice()[s] = rho * y;
        }
        state.set_turb(vars.tke, vars.sdr);
        state
    }
}

// ============================================================
// 壁面律
// ============================================================

/// 壁面更新的输入
#[derive(Debug, Clone, Copy)]
pub struct WallFaceInput {
    /// 内部单元切向速度差模（相对壁面速度）
    pub tangential_speed: f64,
    /// 内部单元到壁面的距离
    pub wall_distance: f64,
    /// 内部单元密度
    pub density: f64,
    /// 内部单元层流黏性
    pub viscosity: f64,
    /// 内部单元温度
    pub temperature: f64,
    /// 内部定压比热
    pub cp: f64,
    /// 层流 Prandtl 数
    pub prandtl: f64,
    /// 湍流 Prandtl 数
    pub turb_prandtl: f64,
}

/// Spalding 剖面: y+ = u+ + e^{-κB}(e^{κu+} - 1 - κu+ - (κu+)²/2 - (κu+)³/6)
fn spalding_yplus(u_plus: f64) -> f64 {
    let ku = KAPPA * u_plus;
    u_plus
        + (-KAPPA * B_CONST).exp()
            * (ku.exp() - 1.0 - ku - ku * ku / 2.0 - ku * ku * ku / 6.0)
}

/// 求摩擦速度：在 Spalding 剖面上匹配 (d, u_t)
pub fn friction_velocity_wall_law(input: &WallFaceInput) -> f64 {
    let WallFaceInput {
        tangential_speed: ut,
        wall_distance: d,
        density: rho,
        viscosity: mu,
        ..
    } = *input;
    if ut <= 0.0 {
        return 0.0;
    }
    // 层流解作为下界，对数律粗估作为上界
    let lam = (mu * ut / (rho * d)).sqrt();
    let bracket_lo = 1.0e-3 * lam.min(1.0e-8);
    let bracket_hi = (10.0 * lam).max(0.5 * ut);
    let residual = |ustar: f64| {
        let yp = rho * ustar * d / mu;
        let up = ut / ustar.max(1.0e-30);
        spalding_yplus(up) - yp
    };
    find_root(residual, bracket_lo, bracket_hi, 1.0e-12)
}

/// Jayatilleke P 函数（壁面律热流的分子/湍流 Prandtl 修正）
fn jayatilleke_p(pr: f64, pr_t: f64) -> f64 {
    let ratio = pr / pr_t;
    9.24 * (ratio.powf(0.75) - 1.0) * (1.0 + 0.28 * (-0.007 * ratio).exp())
}

/// 壁面面元的完整更新
///
/// `tangential_dir` 为内部速度相对壁面的切向单位向量。
/// 返回更新后的 [`WallVars`]（不含质量分数，由调用方填充）。
pub fn update_wall_vars(
    input: &WallFaceInput,
    tangential_dir: DVec3,
    wall_temperature: Option<f64>,
    use_wall_law: bool,
    phys: &Physics,
) -> WallVars {
    let mut vars = WallVars::new(0);
    let t_wall = wall_temperature.unwrap_or(input.temperature);
    vars.temperature = t_wall;
    vars.density = input.density * input.temperature / t_wall;
    vars.viscosity = input.viscosity;

    // 先按低雷诺数差分估计
    let tau_low_re = input.viscosity * input.tangential_speed / input.wall_distance;
    let ustar_low_re = (tau_low_re / input.density).sqrt();

    let (ustar, tau_mag) = if use_wall_law {
        let ustar = friction_velocity_wall_law(input);
        let yplus = input.density * ustar * input.wall_distance / input.viscosity;
        if yplus < 10.0 {
            (ustar_low_re, tau_low_re)
        } else {
            (ustar, input.density * ustar * ustar)
        }
    } else {
        (ustar_low_re, tau_low_re)
    };

    vars.friction_velocity = ustar;
    vars.yplus = input.density * ustar * input.wall_distance / input.viscosity;
    vars.shear_stress = tau_mag * tangential_dir;

    // 热流：等温壁由温差驱动，绝热壁为零
    if let Some(t_w) = wall_temperature {
        if use_wall_law && vars.yplus >= 10.0 {
            let u_plus = input.tangential_speed / ustar.max(1.0e-30);
            let t_plus = input.turb_prandtl
                * (u_plus + jayatilleke_p(input.prandtl, input.turb_prandtl));
            vars.heat_flux =
                input.density * input.cp * ustar * (input.temperature - t_w) / t_plus.max(1.0e-30);
        } else {
            let lambda = phys.transport.thermal_conductivity(input.viscosity, input.cp);
            vars.heat_flux = lambda * (input.temperature - t_w) / input.wall_distance;
        }
    }

    // 壁面湍流量
    if phys.has_turbulence() {
        if use_wall_law && vars.yplus >= 10.0 {
            vars.tke = ustar * ustar / BETA_STAR.sqrt();
            vars.sdr = ustar / (BETA_STAR.sqrt() * KAPPA * input.wall_distance);
            vars.turb_eddy_visc =
                (KAPPA * input.density * ustar * input.wall_distance - input.viscosity).max(0.0);
        } else {
            vars.tke = 0.0;
            vars.sdr = phys.turbulence.wall_sdr(
                input.density,
                input.viscosity,
                input.wall_distance,
            );
            vars.turb_eddy_visc = 0.0;
        }
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::test_support::air_physics;

    fn sample_input(ut: f64, d: f64) -> WallFaceInput {
        WallFaceInput {
            tangential_speed: ut,
            wall_distance: d,
            density: 1.0,
            viscosity: 5.0e-8,
            temperature: 1.0,
            cp: 1.0 / 0.4,
            prandtl: 0.72,
            turb_prandtl: 0.9,
        }
    }

    #[test]
    fn test_spalding_profile_limits() {
        // 小 u+ 时 y+ ≈ u+（黏性底层）
        assert!((spalding_yplus(1.0) - 1.0).abs() < 0.05);
        // 大 u+ 时远超线性
        assert!(spalding_yplus(20.0) > 100.0);
    }

    #[test]
    fn test_friction_velocity_recovers_profile() {
        let input = sample_input(0.3, 1.0e-3);
        let ustar = friction_velocity_wall_law(&input);
        assert!(ustar > 0.0);
        // 验证根满足剖面
        let yp = input.density * ustar * input.wall_distance / input.viscosity;
        let up = input.tangential_speed / ustar;
        assert!((spalding_yplus(up) - yp).abs() / yp < 1e-6);
    }

    #[test]
    fn test_low_re_shear_linear() {
        let phys = air_physics(false);
        let input = sample_input(0.1, 1.0e-5);
        let vars = update_wall_vars(&input, DVec3::X, Some(1.0), false, &phys);
        let expected = input.viscosity * input.tangential_speed / input.wall_distance;
        assert!((vars.shear_stress.x - expected).abs() < 1e-12);
        assert!(vars.yplus > 0.0);
    }

    #[test]
    fn test_adiabatic_wall_no_heat_flux() {
        let phys = air_physics(false);
        let input = sample_input(0.1, 1.0e-5);
        let vars = update_wall_vars(&input, DVec3::X, None, false, &phys);
        assert_eq!(vars.heat_flux, 0.0);
        assert_eq!(vars.temperature, input.temperature);
    }

    #[test]
    fn test_isothermal_heat_flux_sign() {
        let phys = air_physics(false);
        // 内部温度高于壁温：热流入壁为正
        let input = sample_input(0.1, 1.0e-5);
        let vars = update_wall_vars(&input, DVec3::X, Some(0.9), false, &phys);
        assert!(vars.heat_flux > 0.0);
    }

    #[test]
    fn test_wall_law_turbulence_values() {
        let phys = air_physics(true);
        let input = sample_input(0.3, 1.0e-2);
        let vars = update_wall_vars(&input, DVec3::X, Some(1.0), true, &phys);
        if vars.yplus >= 10.0 {
            assert!(vars.tke > 0.0);
            assert!(vars.sdr > 0.0);
        }
    }

    #[test]
    fn test_wall_data_indexing() {
        let surface = BoundarySurface {
            class: sf_grid::SurfaceClass::IMin,
            kind: sf_config::BcKind::ViscousWall,
            tag: 1,
            r1: (2, 6),
            r2: (0, 3),
        };
        let mut wd = WallData::new(surface, false, DVec3::ZERO, Some(1.0), 0.0, 1);
        wd.at_mut(3, 1).yplus = 5.0;
        assert_eq!(wd.at(3, 1).yplus, 5.0);
        assert!(wd.at(3, 1).switch_to_low_re());
    }
}
