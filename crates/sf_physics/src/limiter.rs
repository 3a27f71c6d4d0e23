// crates/sf_physics/src/limiter.rs

//! 斜率限制器
//!
//! MUSCL 重构的可插拔限制器。`value` 返回 [0, 1] 的限制因子 s，
//! 代入 κ 格式 U_f = U + s/4·[(1−κs)Δ⁻ + (1+κs)Δ⁺]。

use sf_config::LimiterKind;

/// 斜率限制器能力
pub trait Limiter: Send + Sync {
    /// 限制器名
    fn name(&self) -> &'static str;

    /// 限制因子 s(Δ⁻, Δ⁺) ∈ [0, 1]
    fn value(&self, d_minus: f64, d_plus: f64) -> f64;
}

/// 不限制
#[derive(Debug, Clone, Default)]
pub struct NoLimiter;

impl Limiter for NoLimiter {
    fn name(&self) -> &'static str {
        "none"
    }

    fn value(&self, _d_minus: f64, _d_plus: f64) -> f64 {
        1.0
    }
}

/// van Albada
#[derive(Debug, Clone, Default)]
pub struct VanAlbada;

impl Limiter for VanAlbada {
    fn name(&self) -> &'static str {
        "vanAlbada"
    }

    fn value(&self, d_minus: f64, d_plus: f64) -> f64 {
        const EPS: f64 = 1.0e-30;
        let s = (2.0 * d_minus * d_plus + EPS)
            / (d_minus * d_minus + d_plus * d_plus + EPS);
        s.max(0.0)
    }
}

/// minmod
#[derive(Debug, Clone, Default)]
pub struct MinMod;

impl Limiter for MinMod {
    fn name(&self) -> &'static str {
        "minmod"
    }

    fn value(&self, d_minus: f64, d_plus: f64) -> f64 {
        if d_minus * d_plus <= 0.0 {
            return 0.0;
        }
        let (lo, hi) = if d_minus.abs() < d_plus.abs() {
            (d_minus.abs(), d_plus.abs())
        } else {
            (d_plus.abs(), d_minus.abs())
        };
        (lo / hi.max(1.0e-30)).min(1.0)
    }
}

/// 由配置构造限制器
pub fn create_limiter(kind: LimiterKind) -> Box<dyn Limiter> {
    match kind {
        LimiterKind::None => Box::new(NoLimiter),
        LimiterKind::VanAlbada => Box::new(VanAlbada),
        LimiterKind::MinMod => Box::new(MinMod),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_region_unlimited() {
        // 等斜率时所有限制器都接近 1
        for lim in [
            &NoLimiter as &dyn Limiter,
            &VanAlbada,
            &MinMod,
        ] {
            let s = lim.value(1.0, 1.0);
            assert!((s - 1.0).abs() < 1e-12, "{}: s = {s}", lim.name());
        }
    }

    #[test]
    fn test_extremum_fully_limited() {
        // 符号相反（极值点）时限制到 0
        assert!(VanAlbada.value(1.0, -1.0) < 1e-12);
        assert_eq!(MinMod.value(1.0, -1.0), 0.0);
        // 无限制器保持 1
        assert_eq!(NoLimiter.value(1.0, -1.0), 1.0);
    }

    #[test]
    fn test_van_albada_bounds() {
        for (dm, dp) in [(0.1, 1.0), (1.0, 0.1), (3.0, 2.0), (1e-8, 1.0)] {
            let s = VanAlbada.value(dm, dp);
            assert!((0.0..=1.0 + 1e-12).contains(&s));
        }
    }
}
