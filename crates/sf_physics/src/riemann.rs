// crates/sf_physics/src/riemann.rs

//! 近似黎曼求解器
//!
//! 可插拔的无黏面通量内核：Roe（Harten 熵修正）与 Rusanov。
//! 通量按守恒量布局返回，调用方再乘面积模并按上下游符号累加。
//! Rusanov 谱界同时充当隐式路径的通量 Jacobian。

use glam::DVec3;

use crate::physics::Physics;
use crate::state::{Primitive, StateVec};

/// 黎曼求解器能力
pub trait RiemannSolver: Send + Sync {
    /// 求解器名
    fn name(&self) -> &'static str;

    /// 面通量（单位面积）
    fn flux(&self, left: &Primitive, right: &Primitive, normal: DVec3, phys: &Physics)
        -> StateVec;
}

/// 无黏物理通量 F·n
pub fn physical_flux(state: &Primitive, normal: DVec3, phys: &Physics) -> StateVec {
    let l = state.layout();
    let un = state.velocity().dot(normal);
    let p = state.p();
    let h = state.enthalpy(phys);
    let mut f: StateVec = smallvec::smallvec![0.0; l.size()];
    for s in 0..l.num_species() {
        f[s] = state.rho_n(s) * un;
    }
    let rho = state.rho();
    f[l.mx()] = rho * un * state.u() + p * normal.x;
    f[l.my()] = rho * un * state.v() + p * normal.y;
    f[l.mz()] = rho * un * state.w() + p * normal.z;
    f[l.energy()] = rho * un * h;
    for t in 0..l.num_turb() {
        f[l.turb_index() + t] = rho * un * state.as_slice()[l.turb_index() + t];
    }
    f
}

/// 对流谱半径 |u·n| + a
#[inline]
pub fn max_wave_speed(state: &Primitive, normal: DVec3, phys: &Physics) -> f64 {
    state.velocity().dot(normal).abs() + state.sos(phys)
}

// ============================================================
// Rusanov
// ============================================================

/// Rusanov（局部 Lax-Friedrichs）
#[derive(Debug, Clone, Default)]
pub struct Rusanov;

impl RiemannSolver for Rusanov {
    fn name(&self) -> &'static str {
        "rusanov"
    }

    fn flux(
        &self,
        left: &Primitive,
        right: &Primitive,
        normal: DVec3,
        phys: &Physics,
    ) -> StateVec {
        let fl = physical_flux(left, normal, phys);
        let fr = physical_flux(right, normal, phys);
        let lambda = max_wave_speed(left, normal, phys).max(max_wave_speed(right, normal, phys));
        let ul = left.to_conserved(phys);
        let ur = right.to_conserved(phys);
        fl.iter()
            .zip(&fr)
            .zip(ul.as_slice().iter().zip(ur.as_slice()))
            .map(|((fl, fr), (ul, ur))| 0.5 * (fl + fr) - 0.5 * lambda * (ur - ul))
            .collect()
    }
}

/// Rusanov 谱界（隐式对角的标量通量 Jacobian）
#[inline]
pub fn rusanov_jacobian_bound(state: &Primitive, normal: DVec3, phys: &Physics) -> f64 {
    0.5 * max_wave_speed(state, normal, phys)
}

/// 数值通量 Jacobian ∂(F·n)/∂U（行优先 n×n）
///
/// 守恒量逐分量扰动的有限差分；块矩阵模式的对角累加使用。
pub fn numerical_flux_jacobian(state: &Primitive, normal: DVec3, phys: &Physics) -> Vec<f64> {
    let floors = sf_foundation::Floors::default();
    let n = state.layout().size();
    let cons = state.to_conserved(phys);
    let f0 = physical_flux(state, normal, phys);

    let mut jac = vec![0.0; n * n];
    for col in 0..n {
        let base = cons.as_slice()[col].abs().max(1.0e-8);
        let eps = 1.0e-7 * base;
        let mut perturbed = StateVec::from_slice(cons.as_slice());
        perturbed[col] += eps;
        let pert_cons =
            crate::state::Conserved::from_slice(&perturbed, state.layout().num_species());
        let pert_prim = Primitive::from_conserved(&pert_cons, phys, &floors);
        if !pert_prim.is_physical() {
            continue;
        }
        let f1 = physical_flux(&pert_prim, normal, phys);
        for row in 0..n {
            jac[row * n + col] = (f1[row] - f0[row]) / eps;
        }
    }
    jac
}

// ============================================================
// Roe
// ============================================================

/// Roe 通量差分裂（Harten 熵修正）
#[derive(Debug, Clone)]
pub struct Roe {
    /// 熵修正阈值（以 Roe 声速为尺度）
    entropy_fix: f64,
}

impl Default for Roe {
    fn default() -> Self {
        Self { entropy_fix: 0.1 }
    }
}

impl Roe {
    /// Harten 熵修正
    #[inline]
    fn fix(&self, lambda: f64, a_tilde: f64) -> f64 {
        let delta = self.entropy_fix * a_tilde;
        let mag = lambda.abs();
        if mag >= delta {
            mag
        } else {
            0.5 * (lambda * lambda / delta + delta)
        }
    }
}

impl RiemannSolver for Roe {
    fn flux(
        &self,
        left: &Primitive,
        right: &Primitive,
        normal: DVec3,
        phys: &Physics,
    ) -> StateVec {
        let l = left.layout();
        let roe = Primitive::roe_average(left, right);
        let rho_t = roe.rho();
        let vel_t = roe.velocity();
        let un_t = vel_t.dot(normal);
        let a_t = roe.sos(phys);
        let h_t = roe.enthalpy(phys);

        let d_rho = right.rho() - left.rho();
        let d_p = right.p() - left.p();
        let d_vel = right.velocity() - left.velocity();
        let d_un = d_vel.dot(normal);

        // 波强
        let alpha_minus = (d_p - rho_t * a_t * d_un) / (2.0 * a_t * a_t);
        let alpha_plus = (d_p + rho_t * a_t * d_un) / (2.0 * a_t * a_t);
        let alpha_entropy = d_rho - d_p / (a_t * a_t);

        let lam_minus = self.fix(un_t - a_t, a_t);
        let lam_contact = self.fix(un_t, a_t);
        let lam_plus = self.fix(un_t + a_t, a_t);

        // 切向速度差
        let d_vt = d_vel - d_un * normal;

        let mut diss: StateVec = smallvec::smallvec![0.0; l.size()];
        // 声波
        let add_wave = |diss: &mut StateVec, lam: f64, alpha: f64, vel: DVec3, h: f64| {
            let mass = lam * alpha;
            for s in 0..l.num_species() {
                diss[s] += mass * roe.mass_fraction_n(s);
            }
            diss[l.mx()] += mass * vel.x;
            diss[l.my()] += mass * vel.y;
            diss[l.mz()] += mass * vel.z;
            diss[l.energy()] += mass * h;
            for t in 0..l.num_turb() {
                diss[l.turb_index() + t] += mass * roe.as_slice()[l.turb_index() + t];
            }
        };
        add_wave(
            &mut diss,
            lam_minus,
            alpha_minus,
            vel_t - a_t * normal,
            h_t - a_t * un_t,
        );
        add_wave(
            &mut diss,
            lam_plus,
            alpha_plus,
            vel_t + a_t * normal,
            h_t + a_t * un_t,
        );

        // 熵波与剪切波
        for s in 0..l.num_species() {
            let d_ys = right.mass_fraction_n(s) - left.mass_fraction_n(s);
            diss[s] +=
                lam_contact * (alpha_entropy * roe.mass_fraction_n(s) + rho_t * d_ys);
        }
        let mom_contact = alpha_entropy * vel_t + rho_t * d_vt;
        diss[l.mx()] += lam_contact * mom_contact.x;
        diss[l.my()] += lam_contact * mom_contact.y;
        diss[l.mz()] += lam_contact * mom_contact.z;
        diss[l.energy()] += lam_contact
            * (alpha_entropy * 0.5 * vel_t.length_squared()
                + rho_t * (vel_t.dot(d_vt)));
        for t in 0..l.num_turb() {
            let q_t = roe.as_slice()[l.turb_index() + t];
            let d_q = right.as_slice()[l.turb_index() + t] - left.as_slice()[l.turb_index() + t];
            diss[l.turb_index() + t] += lam_contact * (alpha_entropy * q_t + rho_t * d_q);
        }

        let fl = physical_flux(left, normal, phys);
        let fr = physical_flux(right, normal, phys);
        fl.iter()
            .zip(&fr)
            .zip(&diss)
            .map(|((fl, fr), d)| 0.5 * (fl + fr) - 0.5 * d)
            .collect()
    }

    fn name(&self) -> &'static str {
        "roe"
    }
}

/// 由名字构造黎曼求解器
pub fn create_riemann_solver(name: &str) -> Option<Box<dyn RiemannSolver>> {
    match name {
        "roe" => Some(Box::new(Roe::default())),
        "rusanov" => Some(Box::new(Rusanov)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::test_support::air_physics;

    fn state(rho: f64, u: f64, p: f64) -> Primitive {
        Primitive::from_slice(&[rho, u, 0.0, 0.0, p], 1)
    }

    #[test]
    fn test_physical_flux_still_gas() {
        let phys = air_physics(false);
        let s = state(1.0, 0.0, 1.0 / 1.4);
        let f = physical_flux(&s, DVec3::X, &phys);
        // 静止气体仅剩压力项
        assert!(f[0].abs() < 1e-15);
        assert!((f[1] - 1.0 / 1.4).abs() < 1e-14);
        assert!(f[4].abs() < 1e-15);
    }

    #[test]
    fn test_uniform_flow_consistency() {
        // 两侧状态相同时，数值通量等于物理通量
        let phys = air_physics(false);
        let s = state(1.0, 0.3, 1.0 / 1.4);
        let exact = physical_flux(&s, DVec3::X, &phys);
        for solver in [&Roe::default() as &dyn RiemannSolver, &Rusanov] {
            let f = solver.flux(&s, &s, DVec3::X, &phys);
            for (a, b) in f.iter().zip(&exact) {
                assert!((a - b).abs() < 1e-13, "{}: {a} != {b}", solver.name());
            }
        }
    }

    #[test]
    fn test_rusanov_dissipative_on_jump() {
        let phys = air_physics(false);
        let l = state(1.0, 0.0, 1.0 / 1.4);
        let r = state(0.5, 0.0, 0.5 / 1.4);
        let f = Rusanov.flux(&l, &r, DVec3::X, &phys);
        // 密度跳跃驱动的质量通量为正（从高密度向低密度）
        assert!(f[0] > 0.0);
    }

    #[test]
    fn test_roe_upwinds_supersonic() {
        // 超声速来流时 Roe 通量退化为上游物理通量
        let phys = air_physics(false);
        let l = state(1.0, 2.0, 1.0 / 1.4);
        let r = state(0.9, 1.9, 0.9 / 1.4);
        let f = Roe::default().flux(&l, &r, DVec3::X, &phys);
        let fl = physical_flux(&l, DVec3::X, &phys);
        for (a, b) in f.iter().zip(&fl) {
            assert!((a - b).abs() < 2e-2, "{a} vs {b}");
        }
    }

    #[test]
    fn test_create_by_name() {
        assert!(create_riemann_solver("roe").is_some());
        assert!(create_riemann_solver("rusanov").is_some());
        assert!(create_riemann_solver("godunov").is_none());
    }

    #[test]
    fn test_flux_mirrored_normal() {
        // 法向取反时通量取反（动量分量符号随法向）
        let phys = air_physics(false);
        let l = state(1.0, 0.3, 1.0 / 1.4);
        let r = state(0.8, 0.2, 0.9 / 1.4);
        let f_pos = Roe::default().flux(&l, &r, DVec3::X, &phys);
        let f_neg = Roe::default().flux(&r, &l, -DVec3::X, &phys);
        assert!((f_pos[0] + f_neg[0]).abs() < 1e-13);
        assert!((f_pos[4] + f_neg[4]).abs() < 1e-13);
    }
}
