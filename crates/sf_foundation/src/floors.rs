// crates/sf_foundation/src/floors.rs

//! 数值下限与容差
//!
//! 求解器中的所有下限常量通过 [`Floors`] 结构体显式传递，不使用全局状态。

use serde::{Deserialize, Serialize};

/// 数值下限集合
///
/// 质量分数、湍流变量等在状态更新后会被钳制到这些下限之上；
/// 壁面距离允许的轻微负值由 `wall_dist_tol` 控制。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Floors {
    /// 湍动能下限（无量纲）
    #[serde(default = "default_tke_floor")]
    pub tke_min: f64,
    /// 比耗散率下限（无量纲）
    #[serde(default = "default_sdr_floor")]
    pub sdr_min: f64,
    /// 质量分数下限
    #[serde(default)]
    pub mass_fraction_min: f64,
    /// 壁面距离负值容差，超出即视为致命错误
    #[serde(default = "default_wall_dist_tol")]
    pub wall_dist_tol: f64,
    /// 残差归一化保护值
    #[serde(default = "default_resid_eps")]
    pub resid_eps: f64,
}

fn default_tke_floor() -> f64 {
    1.0e-20
}
fn default_sdr_floor() -> f64 {
    1.0e-10
}
fn default_wall_dist_tol() -> f64 {
    1.0e-10
}
fn default_resid_eps() -> f64 {
    1.0e-30
}

impl Default for Floors {
    fn default() -> Self {
        Self {
            tke_min: default_tke_floor(),
            sdr_min: default_sdr_floor(),
            mass_fraction_min: 0.0,
            wall_dist_tol: default_wall_dist_tol(),
            resid_eps: default_resid_eps(),
        }
    }
}

impl Floors {
    /// 钳制壁面距离
    ///
    /// 轻微负值（容差内）钳制为 0 并返回 `true` 提示调用方记录警告；
    /// 超出容差返回 `None`。
    #[inline]
    pub fn clamp_wall_distance(&self, dist: f64) -> Option<(f64, bool)> {
        if dist >= 0.0 {
            Some((dist, false))
        } else if dist >= -self.wall_dist_tol {
            Some((0.0, true))
        } else {
            None
        }
    }
}
