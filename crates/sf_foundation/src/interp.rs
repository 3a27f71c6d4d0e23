// crates/sf_foundation/src/interp.rs

//! 通用数值工具
//!
//! 插值系数、Ridder 求根、超平面遍历序等被多个上层模块共享的小工具。

use glam::DVec3;

// ============================================================
// 线性 / 三线性插值
// ============================================================

/// 计算点 x 在线段 x0-x1 上的线性插值系数
///
/// 返回值 c 满足 x ≈ (1-c)·x0 + c·x1，按投影长度计算。
pub fn linear_interp_coeff(x0: DVec3, x1: DVec3, x: DVec3) -> f64 {
    let seg = x1 - x0;
    let len2 = seg.length_squared();
    if len2 < 1.0e-30 {
        return 0.5;
    }
    (x - x0).dot(seg) / len2
}

/// 线性插值
#[inline]
pub fn linear_interp(d0: f64, d1: f64, coeff: f64) -> f64 {
    (1.0 - coeff) * d0 + coeff * d1
}

/// 计算三线性插值的 7 个系数
///
/// 六面体节点编号: x0..x7，按 (i,j,k) 二进制序
/// (x0=(0,0,0), x1=(1,0,0), x2=(0,1,0), x3=(1,1,0), x4..x7 为 k+1 层)。
/// 前 4 个系数沿 k 方向，接着 2 个沿 j 方向，最后 1 个沿 i 方向。
#[allow(clippy::too_many_arguments)]
pub fn trilinear_interp_coeff(
    x0: DVec3,
    x1: DVec3,
    x2: DVec3,
    x3: DVec3,
    x4: DVec3,
    x5: DVec3,
    x6: DVec3,
    x7: DVec3,
    x: DVec3,
) -> [f64; 7] {
    let c04 = linear_interp_coeff(x0, x4, x);
    let c15 = linear_interp_coeff(x1, x5, x);
    let c26 = linear_interp_coeff(x2, x6, x);
    let c37 = linear_interp_coeff(x3, x7, x);

    let m04 = x0.lerp(x4, c04);
    let m15 = x1.lerp(x5, c15);
    let m26 = x2.lerp(x6, c26);
    let m37 = x3.lerp(x7, c37);

    let c0415 = linear_interp_coeff(m04, m15, x);
    let c2637 = linear_interp_coeff(m26, m37, x);

    let m0415 = m04.lerp(m15, c0415);
    let m2637 = m26.lerp(m37, c2637);

    let c_final = linear_interp_coeff(m0415, m2637, x);

    [c04, c15, c26, c37, c0415, c2637, c_final]
}

/// 使用预计算系数执行三线性插值
///
/// 数据顺序与 [`trilinear_interp_coeff`] 的节点顺序一致。
#[allow(clippy::too_many_arguments)]
pub fn trilinear_interp<T>(
    coeffs: &[f64; 7],
    d0: T,
    d1: T,
    d2: T,
    d3: T,
    d4: T,
    d5: T,
    d6: T,
    d7: T,
) -> T
where
    T: Clone
        + std::ops::Add<Output = T>
        + std::ops::Mul<f64, Output = T>,
{
    let lerp = |a: T, b: T, c: f64| a * (1.0 - c) + b * c;

    let d04 = lerp(d0, d4, coeffs[0]);
    let d15 = lerp(d1, d5, coeffs[1]);
    let d26 = lerp(d2, d6, coeffs[2]);
    let d37 = lerp(d3, d7, coeffs[3]);

    let d0415 = lerp(d04, d15, coeffs[4]);
    let d2637 = lerp(d26, d37, coeffs[5]);

    lerp(d0415, d2637, coeffs[6])
}

// ============================================================
// 差分与杂项
// ============================================================

/// 非等距网格上的二阶导数
///
/// x_* 为三个相邻单元的宽度，y_* 为对应的单元值。
pub fn derivative_2nd(x0: f64, x1: f64, x2: f64, y0: f64, y1: f64, y2: f64) -> f64 {
    let fwd = (y2 - y1) / (0.5 * (x2 + x1));
    let bck = (y1 - y0) / (0.5 * (x1 + x0));
    (fwd - bck) / (0.25 * (x2 + x0) + 0.5 * x1)
}

/// 相邻单元宽度的有向累积（重构模板宽度）
///
/// end > start 时为正，反向为负。
pub fn stencil_width(widths: &[f64], start: usize, end: usize) -> f64 {
    if end > start {
        widths[start..end].iter().sum()
    } else if start > end {
        -widths[end..start].iter().sum::<f64>()
    } else {
        0.0
    }
}

/// Kronecker delta
#[inline]
pub fn kronecker(ii: usize, jj: usize) -> f64 {
    if ii == jj {
        1.0
    } else {
        0.0
    }
}

// ============================================================
// Ridder 求根
// ============================================================

/// Ridder 法求根
///
/// 要求 x1、x2 夹住根；不收敛时返回最近的估计值。
pub fn find_root<F: Fn(f64) -> f64>(func: F, mut x1: f64, mut x2: f64, tol: f64) -> f64 {
    const MAX_ITER: usize = 100;

    let mut f1 = func(x1);
    let mut f2 = func(x2);
    if f1.signum() == f2.signum() && f1 != 0.0 && f2 != 0.0 {
        // 区间没有夹住根，退回区间中点
        return 0.5 * (x1 + x2);
    }

    let mut x4 = x1;
    for _ in 0..MAX_ITER {
        let x3 = 0.5 * (x1 + x2);
        let f3 = func(x3);
        if f3 == 0.0 {
            return x3;
        }

        let denom = (f3 * f3 - f1 * f2).abs().sqrt();
        if denom == 0.0 {
            return x3;
        }
        let fac = (f1 - f2).signum();
        x4 = x3 + (x3 - x1) * (fac * f3) / denom;
        let f4 = func(x4);

        if f4 == 0.0 {
            return x4;
        }

        if f4.signum() != f3.signum() {
            x1 = x3;
            f1 = f3;
            x2 = x4;
            f2 = f4;
        } else if f4.signum() != f1.signum() {
            x2 = x4;
            f2 = f4;
        } else {
            x1 = x4;
            f1 = f4;
        }

        if (x2 - x1).abs() <= tol {
            return x4;
        }
    }

    x4
}

// ============================================================
// 超平面遍历序
// ============================================================

/// 生成超平面遍历序
///
/// 将 (i,j,k) 索引按 i+j+k 等值面分组排序，供对称 Gauss-Seidel
/// 类迭代使用。返回的顺序保证同一波前内的单元互不依赖。
pub fn hyperplane_reorder(ni: usize, nj: usize, nk: usize) -> Vec<(usize, usize, usize)> {
    let mut order = Vec::with_capacity(ni * nj * nk);
    for plane in 0..(ni + nj + nk).saturating_sub(2) {
        for kk in 0..nk {
            for jj in 0..nj {
                if plane >= jj + kk {
                    let ii = plane - jj - kk;
                    if ii < ni {
                        order.push((ii, jj, kk));
                    }
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interp_coeff_midpoint() {
        let c = linear_interp_coeff(
            DVec3::ZERO,
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
        );
        assert!((c - 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_trilinear_center_of_unit_cube() {
        let n = |x: f64, y: f64, z: f64| DVec3::new(x, y, z);
        let coeffs = trilinear_interp_coeff(
            n(0., 0., 0.),
            n(1., 0., 0.),
            n(0., 1., 0.),
            n(1., 1., 0.),
            n(0., 0., 1.),
            n(1., 0., 1.),
            n(0., 1., 1.),
            n(1., 1., 1.),
            n(0.5, 0.5, 0.5),
        );
        // 立方体中心对 8 个角值等权
        let v = trilinear_interp(&coeffs, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0);
        assert!((v - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_trilinear_reproduces_linear_field() {
        let n = |x: f64, y: f64, z: f64| DVec3::new(x, y, z);
        let p = n(0.3, 0.7, 0.2);
        let coeffs = trilinear_interp_coeff(
            n(0., 0., 0.),
            n(1., 0., 0.),
            n(0., 1., 0.),
            n(1., 1., 0.),
            n(0., 0., 1.),
            n(1., 0., 1.),
            n(0., 1., 1.),
            n(1., 1., 1.),
            p,
        );
        // 场 φ = x + 2y + 3z 应被精确重现
        let phi = |v: DVec3| v.x + 2.0 * v.y + 3.0 * v.z;
        let v = trilinear_interp(
            &coeffs,
            phi(n(0., 0., 0.)),
            phi(n(1., 0., 0.)),
            phi(n(0., 1., 0.)),
            phi(n(1., 1., 0.)),
            phi(n(0., 0., 1.)),
            phi(n(1., 0., 1.)),
            phi(n(0., 1., 1.)),
            phi(n(1., 1., 1.)),
        );
        assert!((v - phi(p)).abs() < 1e-12);
    }

    #[test]
    fn test_stencil_width_signs() {
        let w = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(stencil_width(&w, 1, 3), 5.0);
        assert_eq!(stencil_width(&w, 3, 1), -5.0);
        assert_eq!(stencil_width(&w, 2, 2), 0.0);
    }

    #[test]
    fn test_find_root_quadratic() {
        // x^2 - 4 在 [0, 10] 的根
        let root = find_root(|x| x * x - 4.0, 0.0, 10.0, 1e-12);
        assert!((root - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_hyperplane_order_covers_all() {
        let order = hyperplane_reorder(3, 4, 5);
        assert_eq!(order.len(), 60);
        // 波前单调不减
        let mut last = 0;
        for (i, j, k) in order {
            assert!(i + j + k >= last);
            last = (i + j + k).max(last);
        }
    }

    #[test]
    fn test_derivative_2nd_parabola() {
        // 均匀网格 dx=1, y = x^2 的二阶导数为 2
        let d = derivative_2nd(1.0, 1.0, 1.0, 0.0, 1.0, 4.0);
        assert!((d - 2.0).abs() < 1e-12);
    }
}
