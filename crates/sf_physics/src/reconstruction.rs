// crates/sf_physics/src/reconstruction.rs

//! 面重构
//!
//! 从单元中心状态外推面两侧状态：
//! - `first`: 常数外推
//! - `muscl`: 三单元 κ 格式 + 限制器
//! - `weno` / `wenoz`: 五单元加权本质无振荡，模板宽度取自单元宽度
//!
//! 重构出的面状态必须满足 ρ > 0、P > 0，违例由通量程序判定上报。

use crate::limiter::Limiter;
use crate::state::{Primitive, StateVec};

/// MUSCL κ 格式单侧重构
///
/// `behind`、`cell`、`ahead` 依次为外推方向上游两格与下游一格，
/// 面位于 `cell` 与 `ahead` 之间。
pub fn muscl_face(
    behind: &Primitive,
    cell: &Primitive,
    ahead: &Primitive,
    kappa: f64,
    limiter: &dyn Limiter,
) -> Primitive {
    let n = cell.as_slice().len();
    let mut data: StateVec = smallvec::smallvec![0.0; n];
    for idx in 0..n {
        let d_minus = cell.as_slice()[idx] - behind.as_slice()[idx];
        let d_plus = ahead.as_slice()[idx] - cell.as_slice()[idx];
        let s = limiter.value(d_minus, d_plus);
        data[idx] = cell.as_slice()[idx]
            + 0.25 * s * ((1.0 - kappa * s) * d_minus + (1.0 + kappa * s) * d_plus);
    }
    Primitive::from_slice(&data, cell.layout().num_species())
}

// ============================================================
// WENO
// ============================================================

/// 三点 Lagrange 插值在 x 处的值
fn lagrange3(xs: [f64; 3], ys: [f64; 3], x: f64) -> f64 {
    let mut out = 0.0;
    for m in 0..3 {
        let mut c = 1.0;
        for n in 0..3 {
            if n != m {
                c *= (x - xs[n]) / (xs[m] - xs[n]);
            }
        }
        out += c * ys[m];
    }
    out
}

/// 五单元 WENO 单侧重构
///
/// `cells[0..5]` 沿外推方向排列，面位于 `cells[2]` 与 `cells[3]`
/// 之间；`widths` 为对应单元宽度，候选模板的插值点由宽度累积得出。
/// `z_weights` 选择 WENO-Z 权重。
pub fn weno_face(cells: [&Primitive; 5], widths: [f64; 5], z_weights: bool) -> Primitive {
    // 单元中心坐标（以第 0 个单元左缘为原点）
    let mut centers = [0.0; 5];
    let mut x = 0.0;
    for m in 0..5 {
        centers[m] = x + 0.5 * widths[m];
        x += widths[m];
    }
    let x_face = centers[2] + 0.5 * widths[2];

    const D: [f64; 3] = [0.1, 0.6, 0.3];
    const EPS: f64 = 1.0e-6;

    let n = cells[2].as_slice().len();
    let mut data: StateVec = smallvec::smallvec![0.0; n];

    for idx in 0..n {
        let v = [
            cells[0].as_slice()[idx],
            cells[1].as_slice()[idx],
            cells[2].as_slice()[idx],
            cells[3].as_slice()[idx],
            cells[4].as_slice()[idx],
        ];

        // 三个候选模板的面值
        let q = [
            lagrange3([centers[0], centers[1], centers[2]], [v[0], v[1], v[2]], x_face),
            lagrange3([centers[1], centers[2], centers[3]], [v[1], v[2], v[3]], x_face),
            lagrange3([centers[2], centers[3], centers[4]], [v[2], v[3], v[4]], x_face),
        ];

        // Jiang-Shu 光滑度指示子
        let beta = [
            13.0 / 12.0 * (v[0] - 2.0 * v[1] + v[2]).powi(2)
                + 0.25 * (v[0] - 4.0 * v[1] + 3.0 * v[2]).powi(2),
            13.0 / 12.0 * (v[1] - 2.0 * v[2] + v[3]).powi(2)
                + 0.25 * (v[1] - v[3]).powi(2),
            13.0 / 12.0 * (v[2] - 2.0 * v[3] + v[4]).powi(2)
                + 0.25 * (3.0 * v[2] - 4.0 * v[3] + v[4]).powi(2),
        ];

        let alpha: [f64; 3] = if z_weights {
            let tau5 = (beta[0] - beta[2]).abs();
            [
                D[0] * (1.0 + tau5 / (beta[0] + EPS)),
                D[1] * (1.0 + tau5 / (beta[1] + EPS)),
                D[2] * (1.0 + tau5 / (beta[2] + EPS)),
            ]
        } else {
            [
                D[0] / (beta[0] + EPS).powi(2),
                D[1] / (beta[1] + EPS).powi(2),
                D[2] / (beta[2] + EPS).powi(2),
            ]
        };
        let total: f64 = alpha.iter().sum();
        data[idx] = (alpha[0] * q[0] + alpha[1] * q[1] + alpha[2] * q[2]) / total;
    }

    Primitive::from_slice(&data, cells[2].layout().num_species())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::{NoLimiter, VanAlbada};

    fn prim(v: f64) -> Primitive {
        Primitive::from_slice(&[v, v, v, v, v], 1)
    }

    #[test]
    fn test_muscl_constant_field() {
        let c = prim(2.0);
        let f = muscl_face(&c, &c, &c, 1.0 / 3.0, &NoLimiter);
        for v in f.as_slice() {
            assert!((v - 2.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_muscl_linear_field_third_order() {
        // 线性场 v = x：单元中心值 0, 1, 2；面位于 1.5
        let f = muscl_face(&prim(0.0), &prim(1.0), &prim(2.0), 1.0 / 3.0, &NoLimiter);
        for v in f.as_slice() {
            assert!((v - 1.5).abs() < 1e-14);
        }
    }

    #[test]
    fn test_muscl_limited_at_extremum() {
        // 极值点上限制器退化为常数外推
        let f = muscl_face(&prim(0.0), &prim(1.0), &prim(0.0), 1.0 / 3.0, &VanAlbada);
        for v in f.as_slice() {
            assert!((v - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_weno_constant_field() {
        let c = prim(3.0);
        let f = weno_face([&c, &c, &c, &c, &c], [1.0; 5], false);
        for v in f.as_slice() {
            assert!((v - 3.0).abs() < 1e-13);
        }
    }

    #[test]
    fn test_weno_linear_field_exact() {
        // 均匀网格线性场应被精确重构到面值 2.5
        let cells = [prim(0.0), prim(1.0), prim(2.0), prim(3.0), prim(4.0)];
        let f = weno_face(
            [&cells[0], &cells[1], &cells[2], &cells[3], &cells[4]],
            [1.0; 5],
            false,
        );
        for v in f.as_slice() {
            assert!((v - 2.5).abs() < 1e-10, "v = {v}");
        }
    }

    #[test]
    fn test_weno_z_sharper_near_jump() {
        // 阶跃附近 WENO-Z 的权重偏向光滑模板，但仍有界
        let cells = [prim(1.0), prim(1.0), prim(1.0), prim(0.0), prim(0.0)];
        let f = weno_face(
            [&cells[0], &cells[1], &cells[2], &cells[3], &cells[4]],
            [1.0; 5],
            true,
        );
        for v in f.as_slice() {
            assert!(*v <= 1.5 && *v >= -0.5);
        }
    }

    #[test]
    fn test_weno_nonuniform_widths() {
        // 非均匀宽度下常数场仍精确
        let c = prim(1.0);
        let f = weno_face([&c, &c, &c, &c, &c], [0.5, 1.0, 2.0, 1.0, 0.25], false);
        for v in f.as_slice() {
            assert!((v - 1.0).abs() < 1e-13);
        }
    }
}
