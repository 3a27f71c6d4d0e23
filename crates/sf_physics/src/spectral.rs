// crates/sf_physics/src/spectral.rs

//! 非耦合标量对
//!
//! 流动方程组与湍流方程组的谱半径（以及时间项系数）各自独立，
//! 用 {flow, turb} 标量对承载，并提供对方程块的分段缩放。

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

use crate::state::StateLayout;

/// 流动 / 湍流非耦合标量对
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UncoupledScalar {
    /// 流动方程分量
    pub flow: f64,
    /// 湍流方程分量
    pub turb: f64,
}

impl UncoupledScalar {
    /// 零值
    pub const ZERO: Self = Self {
        flow: 0.0,
        turb: 0.0,
    };

    /// 创建
    #[inline]
    pub const fn new(flow: f64, turb: f64) -> Self {
        Self { flow, turb }
    }

    /// 两分量最大值
    #[inline]
    pub fn max(&self) -> f64 {
        self.flow.max(self.turb)
    }

    /// 两分量最小值
    #[inline]
    pub fn min(&self) -> f64 {
        self.flow.min(self.turb)
    }

    /// 清零
    #[inline]
    pub fn zero(&mut self) {
        *self = Self::ZERO;
    }

    /// 倒数
    #[inline]
    pub fn recip(&self) -> Self {
        Self {
            flow: 1.0 / self.flow,
            turb: 1.0 / self.turb,
        }
    }

    /// 对方程块分段缩放：流动方程乘 flow 分量，湍流方程乘 turb 分量
    pub fn array_scale(&self, values: &mut [f64], layout: &StateLayout) {
        let split = layout.turb_index();
        for v in values[..split].iter_mut() {
            *v *= self.flow;
        }
        for v in values[split..].iter_mut() {
            *v *= self.turb;
        }
    }
}

impl Add for UncoupledScalar {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            flow: self.flow + rhs.flow,
            turb: self.turb + rhs.turb,
        }
    }
}

impl AddAssign for UncoupledScalar {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.flow += rhs.flow;
        self.turb += rhs.turb;
    }
}

impl Sub for UncoupledScalar {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            flow: self.flow - rhs.flow,
            turb: self.turb - rhs.turb,
        }
    }
}

impl SubAssign for UncoupledScalar {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.flow -= rhs.flow;
        self.turb -= rhs.turb;
    }
}

impl Mul<f64> for UncoupledScalar {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self {
            flow: self.flow * rhs,
            turb: self.turb * rhs,
        }
    }
}

impl Mul<UncoupledScalar> for f64 {
    type Output = UncoupledScalar;
    #[inline]
    fn mul(self, rhs: UncoupledScalar) -> UncoupledScalar {
        rhs * self
    }
}

impl Div<f64> for UncoupledScalar {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f64) -> Self {
        Self {
            flow: self.flow / rhs,
            turb: self.turb / rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = UncoupledScalar::new(2.0, 3.0);
        let b = UncoupledScalar::new(1.0, 1.0);
        assert_eq!(a + b, UncoupledScalar::new(3.0, 4.0));
        assert_eq!(a - b, UncoupledScalar::new(1.0, 2.0));
        assert_eq!(a * 2.0, UncoupledScalar::new(4.0, 6.0));
        assert_eq!(a.max(), 3.0);
        assert_eq!(a.min(), 2.0);
    }

    #[test]
    fn test_array_scale_splits_at_turbulence() {
        let layout = StateLayout::new(1, 2);
        // [rho, u, v, w, E, k, w]
        let mut values = vec![1.0; 7];
        UncoupledScalar::new(2.0, 3.0).array_scale(&mut values, &layout);
        assert_eq!(values, vec![2.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0]);
    }
}
