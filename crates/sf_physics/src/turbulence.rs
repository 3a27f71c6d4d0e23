// crates/sf_physics/src/turbulence.rs

//! 湍流闭合能力
//!
//! k-ω 两方程模型族：Wilcox 2006 与 SST 2003。
//! 全部量为无量纲；μt 与源项由单元状态、速度梯度张量、
//! 湍流标量梯度与壁面距离计算。

use glam::{DMat3, DVec3};

use sf_config::TurbulenceModelKind;

use crate::state::Primitive;

/// 湍流源项结果
#[derive(Debug, Clone, Copy, Default)]
pub struct TurbSource {
    /// k 方程源（单位体积）
    pub k: f64,
    /// ω 方程源（单位体积）
    pub omega: f64,
    /// 源项对角 Jacobian 的界（破坏项导数，恒为负）
    pub jacobian: f64,
}

/// 湍流闭合能力
pub trait TurbulenceModel: Send + Sync {
    /// 模型种类
    fn kind(&self) -> TurbulenceModelKind;

    /// 湍流方程数
    fn num_equations(&self) -> usize {
        if self.kind() == TurbulenceModelKind::None {
            0
        } else {
            2
        }
    }

    /// 涡黏性 μt
    fn eddy_viscosity(&self, state: &Primitive, vel_grad: &DMat3, f2: f64) -> f64;

    /// 混合函数 (f1, f2)
    fn blending(
        &self,
        state: &Primitive,
        mu: f64,
        wall_dist: f64,
        grad_k: DVec3,
        grad_w: DVec3,
    ) -> (f64, f64);

    /// 源项
    #[allow(clippy::too_many_arguments)]
    fn source(
        &self,
        state: &Primitive,
        vel_grad: &DMat3,
        grad_k: DVec3,
        grad_w: DVec3,
        mu: f64,
        mu_t: f64,
        f1: f64,
    ) -> TurbSource;

    /// k 方程扩散系数因子 σk
    fn sigma_k(&self, f1: f64) -> f64;

    /// ω 方程扩散系数因子 σω
    fn sigma_w(&self, f1: f64) -> f64;

    /// 低雷诺数壁面 ω 值
    fn wall_sdr(&self, rho: f64, mu: f64, wall_dist: f64) -> f64;
}

/// 平均应变率张量的模 sqrt(2 S:S)
fn strain_rate_mag(vel_grad: &DMat3) -> f64 {
    let g = vel_grad;
    let s = 0.5 * (*g + g.transpose());
    let mut ss = 0.0;
    for c in 0..3 {
        let col = s.col(c);
        ss += col.length_squared();
    }
    (2.0 * ss).sqrt()
}

/// 速度散度
fn divergence(vel_grad: &DMat3) -> f64 {
    vel_grad.col(0).x + vel_grad.col(1).y + vel_grad.col(2).z
}

/// Boussinesq 应力与速度梯度的双点积（生成项）
fn production(rho: f64, k: f64, mu_t: f64, vel_grad: &DMat3) -> f64 {
    let g = vel_grad;
    let s = 0.5 * (*g + g.transpose());
    let div = divergence(g);
    let mut p = 0.0;
    for r in 0..3 {
        for c in 0..3 {
            let sij = s.col(c)[r];
            let delta = if r == c { 1.0 } else { 0.0 };
            let tau = 2.0 * mu_t * (sij - div * delta / 3.0) - 2.0 / 3.0 * rho * k * delta;
            p += tau * g.col(c)[r];
        }
    }
    p
}

// ============================================================
// 无模型
// ============================================================

/// 不求解湍流
#[derive(Debug, Clone, Default)]
pub struct NoTurbulence;

impl TurbulenceModel for NoTurbulence {
    fn kind(&self) -> TurbulenceModelKind {
        TurbulenceModelKind::None
    }

    fn eddy_viscosity(&self, _state: &Primitive, _vel_grad: &DMat3, _f2: f64) -> f64 {
        0.0
    }

    fn blending(
        &self,
        _state: &Primitive,
        _mu: f64,
        _wall_dist: f64,
        _grad_k: DVec3,
        _grad_w: DVec3,
    ) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn source(
        &self,
        _state: &Primitive,
        _vel_grad: &DMat3,
        _grad_k: DVec3,
        _grad_w: DVec3,
        _mu: f64,
        _mu_t: f64,
        _f1: f64,
    ) -> TurbSource {
        TurbSource::default()
    }

    fn sigma_k(&self, _f1: f64) -> f64 {
        0.0
    }

    fn sigma_w(&self, _f1: f64) -> f64 {
        0.0
    }

    fn wall_sdr(&self, _rho: f64, _mu: f64, _wall_dist: f64) -> f64 {
        0.0
    }
}

// ============================================================
// Wilcox 2006 k-ω
// ============================================================

/// Wilcox 2006 k-ω
#[derive(Debug, Clone)]
pub struct KwWilcox2006 {
    beta_star: f64,
    alpha: f64,
    beta0: f64,
    sigma_k: f64,
    sigma_w: f64,
    sigma_d: f64,
    c_lim: f64,
}

impl Default for KwWilcox2006 {
    fn default() -> Self {
        Self {
            beta_star: 0.09,
            alpha: 0.52,
            beta0: 0.0708,
            sigma_k: 0.6,
            sigma_w: 0.5,
            sigma_d: 0.125,
            c_lim: 7.0 / 8.0,
        }
    }
}

impl TurbulenceModel for KwWilcox2006 {
    fn kind(&self) -> TurbulenceModelKind {
        TurbulenceModelKind::KOmegaWilcox2006
    }

    fn eddy_viscosity(&self, state: &Primitive, vel_grad: &DMat3, _f2: f64) -> f64 {
        let s_mag = strain_rate_mag(vel_grad);
        let omega_bar = state
            .sdr()
            .max(self.c_lim * s_mag / self.beta_star.sqrt());
        state.rho() * state.tke() / omega_bar.max(1.0e-30)
    }

    fn blending(
        &self,
        _state: &Primitive,
        _mu: f64,
        _wall_dist: f64,
        _grad_k: DVec3,
        _grad_w: DVec3,
    ) -> (f64, f64) {
        // Wilcox 模型不混合系数；存 (1, 0) 供输出
        (1.0, 0.0)
    }

    fn source(
        &self,
        state: &Primitive,
        vel_grad: &DMat3,
        grad_k: DVec3,
        grad_w: DVec3,
        _mu: f64,
        mu_t: f64,
        _f1: f64,
    ) -> TurbSource {
        let rho = state.rho();
        let k = state.tke();
        let w = state.sdr().max(1.0e-30);

        let p_k = production(rho, k, mu_t, vel_grad);
        let d_k = self.beta_star * rho * k * w;

        let p_w = self.alpha * w / k.max(1.0e-30) * p_k;
        let d_w = self.beta0 * rho * w * w;
        // 交叉扩散仅取正值
        let cd = self.sigma_d * rho / w * grad_k.dot(grad_w).max(0.0);

        TurbSource {
            k: p_k - d_k,
            omega: p_w - d_w + cd,
            jacobian: -(self.beta_star * w).max(2.0 * self.beta0 * w),
        }
    }

    fn sigma_k(&self, _f1: f64) -> f64 {
        self.sigma_k
    }

    fn sigma_w(&self, _f1: f64) -> f64 {
        self.sigma_w
    }

    fn wall_sdr(&self, rho: f64, mu: f64, wall_dist: f64) -> f64 {
        6.0 * mu / (self.beta0 * rho * wall_dist * wall_dist).max(1.0e-30)
    }
}

// ============================================================
// SST 2003 k-ω
// ============================================================

/// Menter SST 2003 k-ω
#[derive(Debug, Clone)]
pub struct KwSst2003 {
    beta_star: f64,
    a1: f64,
    // 集合 1 (近壁 k-ω)
    sigma_k1: f64,
    sigma_w1: f64,
    beta1: f64,
    gamma1: f64,
    // 集合 2 (远场 k-ε 变换)
    sigma_k2: f64,
    sigma_w2: f64,
    beta2: f64,
    gamma2: f64,
}

impl Default for KwSst2003 {
    fn default() -> Self {
        Self {
            beta_star: 0.09,
            a1: 0.31,
            sigma_k1: 0.85,
            sigma_w1: 0.5,
            beta1: 0.075,
            gamma1: 5.0 / 9.0,
            sigma_k2: 1.0,
            sigma_w2: 0.856,
            beta2: 0.0828,
            gamma2: 0.44,
        }
    }
}

impl KwSst2003 {
    #[inline]
    fn blend(&self, f1: f64, v1: f64, v2: f64) -> f64 {
        f1 * v1 + (1.0 - f1) * v2
    }
}

impl TurbulenceModel for KwSst2003 {
    fn kind(&self) -> TurbulenceModelKind {
        TurbulenceModelKind::KOmegaSst2003
    }

    fn eddy_viscosity(&self, state: &Primitive, vel_grad: &DMat3, f2: f64) -> f64 {
        let s_mag = strain_rate_mag(vel_grad);
        let denom = (self.a1 * state.sdr()).max(s_mag * f2).max(1.0e-30);
        state.rho() * self.a1 * state.tke() / denom
    }

    fn blending(
        &self,
        state: &Primitive,
        mu: f64,
        wall_dist: f64,
        grad_k: DVec3,
        grad_w: DVec3,
    ) -> (f64, f64) {
        let rho = state.rho();
        let k = state.tke();
        let w = state.sdr().max(1.0e-30);
        let d = wall_dist.max(1.0e-30);

        let cd_kw = (2.0 * rho * self.sigma_w2 / w * grad_k.dot(grad_w)).max(1.0e-10);
        let arg1 = ((k.sqrt() / (self.beta_star * w * d))
            .max(500.0 * mu / (rho * d * d * w)))
        .min(4.0 * rho * self.sigma_w2 * k / (cd_kw * d * d));
        let f1 = arg1.powi(4).tanh();

        let arg2 = (2.0 * k.sqrt() / (self.beta_star * w * d))
            .max(500.0 * mu / (rho * d * d * w));
        let f2 = arg2.powi(2).tanh();
        (f1, f2)
    }

    fn source(
        &self,
        state: &Primitive,
        vel_grad: &DMat3,
        grad_k: DVec3,
        grad_w: DVec3,
        _mu: f64,
        mu_t: f64,
        f1: f64,
    ) -> TurbSource {
        let rho = state.rho();
        let k = state.tke();
        let w = state.sdr().max(1.0e-30);

        // 生成项限制到破坏项的 10 倍
        let p_raw = production(rho, k, mu_t, vel_grad);
        let d_k = self.beta_star * rho * k * w;
        let p_k = p_raw.min(10.0 * d_k);

        let gamma = self.blend(f1, self.gamma1, self.gamma2);
        let beta = self.blend(f1, self.beta1, self.beta2);
        let nu_t = (mu_t / rho).max(1.0e-30);
        let p_w = gamma / nu_t * p_k;
        let d_w = beta * rho * w * w;
        let cd = 2.0 * (1.0 - f1) * rho * self.sigma_w2 / w * grad_k.dot(grad_w);

        TurbSource {
            k: p_k - d_k,
            omega: p_w - d_w + cd,
            jacobian: -(self.beta_star * w).max(2.0 * beta * w),
        }
    }

    fn sigma_k(&self, f1: f64) -> f64 {
        self.blend(f1, self.sigma_k1, self.sigma_k2)
    }

    fn sigma_w(&self, f1: f64) -> f64 {
        self.blend(f1, self.sigma_w1, self.sigma_w2)
    }

    fn wall_sdr(&self, rho: f64, mu: f64, wall_dist: f64) -> f64 {
        60.0 * mu / (self.beta1 * rho * wall_dist * wall_dist).max(1.0e-30)
    }
}

/// 由配置构造湍流模型
pub fn create_turbulence_model(kind: TurbulenceModelKind) -> Box<dyn TurbulenceModel> {
    match kind {
        TurbulenceModelKind::None => Box::new(NoTurbulence),
        TurbulenceModelKind::KOmegaWilcox2006 => Box::new(KwWilcox2006::default()),
        TurbulenceModelKind::KOmegaSst2003 => Box::new(KwSst2003::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shear_grad(rate: f64) -> DMat3 {
        // du/dy = rate 的纯剪切
        DMat3::from_cols(
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(rate, 0.0, 0.0),
            DVec3::new(0.0, 0.0, 0.0),
        )
    }

    fn turb_state(k: f64, w: f64) -> Primitive {
        Primitive::from_slice(&[1.0, 0.5, 0.0, 0.0, 1.0 / 1.4, k, w], 1)
    }

    #[test]
    fn test_strain_rate_pure_shear() {
        // 纯剪切 du/dy = s: S12 = s/2, sqrt(2 S:S) = s
        let s = strain_rate_mag(&shear_grad(2.0));
        assert!((s - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_wilcox_eddy_viscosity() {
        let model = KwWilcox2006::default();
        let state = turb_state(1.0e-3, 10.0);
        // 低应变率下 μt = ρk/ω
        let mu_t = model.eddy_viscosity(&state, &shear_grad(1.0e-6), 0.0);
        assert!((mu_t - 1.0e-4).abs() < 1e-10);
        // 高应变率下受限
        let mu_t_lim = model.eddy_viscosity(&state, &shear_grad(1.0e3), 0.0);
        assert!(mu_t_lim < mu_t);
    }

    #[test]
    fn test_wilcox_source_balance_sign() {
        let model = KwWilcox2006::default();
        let state = turb_state(1.0e-3, 10.0);
        let mu_t = model.eddy_viscosity(&state, &shear_grad(1.0), 0.0);
        let src = model.source(
            &state,
            &shear_grad(1.0),
            DVec3::ZERO,
            DVec3::ZERO,
            1.0e-5,
            mu_t,
            1.0,
        );
        // 破坏项导数为负（隐式时加强对角）
        assert!(src.jacobian < 0.0);
        assert!(src.k.is_finite() && src.omega.is_finite());
    }

    #[test]
    fn test_sst_blending_far_from_wall() {
        let model = KwSst2003::default();
        let state = turb_state(1.0e-3, 10.0);
        // 远离壁面 f1 → 0（k-ε 分支）
        let (f1_far, f2_far) = model.blending(&state, 1.0e-6, 1.0e3, DVec3::ZERO, DVec3::ZERO);
        assert!(f1_far < 0.1, "f1 = {f1_far}");
        assert!(f2_far < 0.1);
        // 贴近壁面 f1 → 1
        let (f1_near, _) = model.blending(&state, 1.0e-6, 1.0e-6, DVec3::ZERO, DVec3::ZERO);
        assert!(f1_near > 0.9, "f1 = {f1_near}");
    }

    #[test]
    fn test_sst_sigma_blend() {
        let model = KwSst2003::default();
        assert!((model.sigma_k(1.0) - 0.85).abs() < 1e-14);
        assert!((model.sigma_k(0.0) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_no_model_inert() {
        let model = NoTurbulence;
        assert_eq!(model.num_equations(), 0);
        let state = Primitive::from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0], 1);
        assert_eq!(model.eddy_viscosity(&state, &DMat3::ZERO, 0.0), 0.0);
    }

    #[test]
    fn test_wall_sdr_scales_inverse_square() {
        let model = KwSst2003::default();
        let w1 = model.wall_sdr(1.0, 1.0e-5, 1.0e-3);
        let w2 = model.wall_sdr(1.0, 1.0e-5, 2.0e-3);
        assert!((w1 / w2 - 4.0).abs() < 1e-10);
    }
}
