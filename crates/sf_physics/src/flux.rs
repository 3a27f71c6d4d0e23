// crates/sf_physics/src/flux.rs

//! 面通量内核
//!
//! 逐面的黏性通量、壁面直接通量与谱半径估计。面循环、重构与
//! 残差累加由块内核驱动。
//!
//! 符号约定：面积矢量由下侧单元指向上侧单元；无黏通量加到下侧、
//! 减去上侧；黏性通量相反（黏性项在守恒形式中带负号）。

use glam::DVec3;

use sf_grid::AreaVec;

use crate::gradient::FaceGradients;
use crate::physics::Physics;
use crate::state::{Primitive, StateVec};
use crate::wall::WallVars;

/// 组分扩散 Schmidt 数
const SCHMIDT: f64 = 0.9;
/// 湍流 Schmidt 数
const SCHMIDT_T: f64 = 0.9;

// ============================================================
// 黏性通量
// ============================================================

/// 黏性通量的面上输入
#[derive(Debug, Clone)]
pub struct ViscousFaceInput<'a> {
    /// 面状态（中心重构）
    pub state: &'a Primitive,
    /// 面上的梯度（替代控制体 Green-Gauss）
    pub grads: &'a FaceGradients,
    /// 面上的层流黏性
    pub mu: f64,
    /// 面上的涡黏性
    pub mu_t: f64,
    /// 面上的混合函数 f1
    pub f1: f64,
}

/// 完整梯度黏性通量 F_v·n（单位面积）
///
/// 动量为偏应力 τ·n（含 Boussinesq 湍流应力），能量为
/// (τ·n)·V + λ_eff ∇T·n + Σ h_s j_s + k 扩散，湍流方程为各自的
/// 扩散通量。
pub fn viscous_flux(input: &ViscousFaceInput, normal: DVec3, phys: &Physics) -> StateVec {
    let l = input.state.layout();
    let g = &input.grads.velocity;
    let mu_eff = input.mu + input.mu_t;

    // 偏应力张量乘法向: τ·n = μ_eff[(∇V + ∇Vᵀ)·n - 2/3 (div V) n] - 2/3 ρk n
    let div = g.col(0).x + g.col(1).y + g.col(2).z;
    let grad_dot_n = DVec3::new(
        g.col(0).dot(normal),
        g.col(1).dot(normal),
        g.col(2).dot(normal),
    );
    let grad_t_dot_n = normal.x * g.col(0) + normal.y * g.col(1) + normal.z * g.col(2);
    let mut tau_n = mu_eff * (grad_dot_n + grad_t_dot_n - 2.0 / 3.0 * div * normal);
    if phys.has_turbulence() {
        tau_n -= 2.0 / 3.0 * input.state.rho() * input.state.tke() * normal;
    }

    let mf = input.state.mass_fractions();
    let t_face = input.state.temperature(phys);
    let cp = phys.eos.cp(t_face, &mf);
    let lambda = phys.transport.thermal_conductivity(input.mu, cp)
        + phys.transport.turb_thermal_conductivity(input.mu_t, cp);

    let mut f: StateVec = smallvec::smallvec![0.0; l.size()];

    // 组分扩散（多组分时）
    let rho_d = input.mu / SCHMIDT + input.mu_t / SCHMIDT_T;
    let mut species_enthalpy_flux = 0.0;
    if l.num_species() > 1 {
        for s in 0..l.num_species() {
            let j_s = rho_d * input.grads.mass_fractions[s].dot(normal);
            f[s] = j_s;
            let h_s = phys.eos.enthalpy(t_face, &unit_fraction(l.num_species(), s));
            species_enthalpy_flux += h_s * j_s;
        }
    }

    f[l.mx()] = tau_n.x;
    f[l.my()] = tau_n.y;
    f[l.mz()] = tau_n.z;
    f[l.energy()] = tau_n.dot(input.state.velocity())
        + lambda * input.grads.temperature.dot(normal)
        + species_enthalpy_flux;

    if phys.has_turbulence() {
        let sigma_k = phys.turbulence.sigma_k(input.f1);
        let sigma_w = phys.turbulence.sigma_w(input.f1);
        let fk = (input.mu + sigma_k * input.mu_t) * input.grads.tke.dot(normal);
        let fw = (input.mu + sigma_w * input.mu_t) * input.grads.sdr.dot(normal);
        f[l.turb_index()] = fk;
        f[l.turb_index() + 1] = fw;
        // k 的分子+湍流输运也出现在能量方程
        f[l.energy()] += fk;
    }
    f
}

fn unit_fraction(n: usize, s: usize) -> Vec<f64> {
    let mut f = vec![0.0; n];
    f[s] = 1.0;
    f
}

/// 壁面律面上的直接通量
///
/// 绕过面重构，使用存储的壁面剪切、热流与壁面状态。
/// `tangential` 为内部流动相对壁面的切向单位向量；`side_sign`
/// 在低索引侧壁为 +1、高索引侧壁为 −1（面积矢量指向 +方向，
/// 壁面应力随法向穿越方向换号）。
pub fn wall_flux(
    wall: &WallVars,
    wall_velocity: DVec3,
    tangential: DVec3,
    side_sign: f64,
    layout: crate::state::StateLayout,
) -> StateVec {
    let mut f: StateVec = smallvec::smallvec![0.0; layout.size()];
    let tau = side_sign * wall.shear_stress.length() * tangential;
    f[layout.mx()] = tau.x;
    f[layout.my()] = tau.y;
    f[layout.mz()] = tau.z;
    // 热流以入壁为正
    f[layout.energy()] = tau.dot(wall_velocity) + side_sign * wall.heat_flux;
    f
}

// ============================================================
// 谱半径
// ============================================================

/// 无黏谱半径贡献
///
/// 以单元状态与上下两界面面积估计 (|V·n̄| + a)·|Ā|。
pub fn inviscid_spectral_radius(
    state: &Primitive,
    area_lower: &AreaVec,
    area_upper: &AreaVec,
    phys: &Physics,
) -> f64 {
    let normal = 0.5 * (area_lower.unit + area_upper.unit);
    let fmag = 0.5 * (area_lower.mag + area_upper.mag);
    (state.velocity().dot(normal).abs() + state.sos(phys)) * fmag
}

/// 黏性谱半径贡献（未乘黏性 CFL 系数）
pub fn viscous_spectral_radius(
    state: &Primitive,
    area_lower: &AreaVec,
    area_upper: &AreaVec,
    vol: f64,
    mu: f64,
    mu_t: f64,
    phys: &Physics,
) -> f64 {
    let fmag = 0.5 * (area_lower.mag + area_upper.mag);
    let mf = state.mass_fractions();
    let gamma = phys.eos.gamma(&mf);
    let coeff = (4.0 / 3.0f64).max(gamma) / state.rho();
    let mu_eff = mu / phys.transport.prandtl() + mu_t / phys.transport.turb_prandtl();
    coeff * mu_eff * fmag * fmag / vol
}

/// 湍流方程的对流谱半径（标量输运，无声速）
pub fn turb_spectral_radius(
    state: &Primitive,
    area_lower: &AreaVec,
    area_upper: &AreaVec,
) -> f64 {
    let normal = 0.5 * (area_lower.unit + area_upper.unit);
    let fmag = 0.5 * (area_lower.mag + area_upper.mag);
    state.velocity().dot(normal).abs() * fmag
}

/// 湍流方程的黏性谱半径贡献
pub fn turb_viscous_spectral_radius(
    state: &Primitive,
    area_lower: &AreaVec,
    area_upper: &AreaVec,
    vol: f64,
    mu: f64,
    mu_t: f64,
    sigma: f64,
) -> f64 {
    let fmag = 0.5 * (area_lower.mag + area_upper.mag);
    (mu + sigma * mu_t) / state.rho() * fmag * fmag / vol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::test_support::air_physics;
    use glam::DMat3;

    fn area(mag: f64, dir: DVec3) -> AreaVec {
        AreaVec {
            unit: dir,
            mag,
        }
    }

    fn face_state() -> Primitive {
        Primitive::from_slice(&[1.0, 0.3, 0.0, 0.0, 1.0 / 1.4], 1)
    }

    #[test]
    fn test_viscous_flux_pure_shear() {
        // du/dy = 1 的剪切，J 面法向 +y：τ·n = μ (1, 0, 0)
        let phys = air_physics(false);
        let state = face_state();
        let mut grads = FaceGradients::zeros(1);
        grads.velocity = DMat3::from_cols(DVec3::new(0.0, 1.0, 0.0), DVec3::ZERO, DVec3::ZERO);
        let input = ViscousFaceInput {
            state: &state,
            grads: &grads,
            mu: 2.0e-5,
            mu_t: 0.0,
            f1: 1.0,
        };
        let f = viscous_flux(&input, DVec3::Y, &phys);
        assert!((f[1] - 2.0e-5).abs() < 1e-18);
        assert!(f[2].abs() < 1e-18);
        // 能量通量 = τ·V
        assert!((f[4] - 2.0e-5 * 0.3).abs() < 1e-18);
    }

    #[test]
    fn test_viscous_flux_heat_conduction() {
        let phys = air_physics(false);
        let state = face_state();
        let mut grads = FaceGradients::zeros(1);
        grads.temperature = DVec3::new(2.0, 0.0, 0.0);
        let input = ViscousFaceInput {
            state: &state,
            grads: &grads,
            mu: 1.0e-5,
            mu_t: 0.0,
            f1: 1.0,
        };
        let f = viscous_flux(&input, DVec3::X, &phys);
        let mf = state.mass_fractions();
        let cp = phys.eos.cp(1.0, &mf);
        let expected = 1.0e-5 * cp / 0.72 * 2.0;
        assert!((f[4] - expected).abs() < 1e-18);
    }

    #[test]
    fn test_viscous_flux_dilatation_term() {
        // 均匀膨胀 div V = 3: τ·n = μ(2·1 - 2/3·3) n = 0? 对角分量 2μ - 2μ = 0
        let phys = air_physics(false);
        let state = face_state();
        let mut grads = FaceGradients::zeros(1);
        grads.velocity = DMat3::from_cols(DVec3::X, DVec3::Y, DVec3::Z);
        let input = ViscousFaceInput {
            state: &state,
            grads: &grads,
            mu: 1.0e-5,
            mu_t: 0.0,
            f1: 1.0,
        };
        let f = viscous_flux(&input, DVec3::X, &phys);
        assert!(f[1].abs() < 1e-18);
    }

    #[test]
    fn test_inviscid_spectral_radius_still_gas() {
        let phys = air_physics(false);
        let state = Primitive::from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0 / 1.4], 1);
        let sr = inviscid_spectral_radius(
            &state,
            &area(2.0, DVec3::X),
            &area(2.0, DVec3::X),
            &phys,
        );
        // 静止气体谱半径 = a·|A| = 1·2
        assert!((sr - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_viscous_spectral_radius_scales() {
        let phys = air_physics(false);
        let state = face_state();
        let a = area(1.0, DVec3::X);
        let sr1 = viscous_spectral_radius(&state, &a, &a, 1.0, 1.0e-5, 0.0, &phys);
        let sr2 = viscous_spectral_radius(&state, &a, &a, 2.0, 1.0e-5, 0.0, &phys);
        assert!((sr1 / sr2 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_turb_spectral_radius_no_sound_speed() {
        let state = face_state();
        let a = area(1.0, DVec3::X);
        let sr = turb_spectral_radius(&state, &a, &a);
        assert!((sr - 0.3).abs() < 1e-14);
    }
}
