// crates/sf_physics/src/gradient.rs

//! 梯度引擎
//!
//! 面上的 Green-Gauss 梯度，作用在以面为中心的替代控制体上：
//! 左右两个面与相邻两个单元中心重合，其余四个面落在共享棱的
//! 四个相邻面的中心（三维 10 单元模板）。这样避免了简单中心平均
//! 的奇偶解耦；装配只触及棱幽灵，从不读角幽灵。
//!
//! 速度梯度张量列 j 为分量 j 的梯度向量。

use glam::{DMat3, DVec3};

/// 替代控制体六个面的标量 Green-Gauss 梯度
///
/// 面积矢量遵循存储约定（指向 +i/+j/+k），低侧面在公式中取负号。
#[allow(clippy::too_many_arguments)]
pub fn scalar_grad_gg(
    ail: DVec3,
    aiu: DVec3,
    ajl: DVec3,
    aju: DVec3,
    akl: DVec3,
    aku: DVec3,
    vil: f64,
    viu: f64,
    vjl: f64,
    vju: f64,
    vkl: f64,
    vku: f64,
    vol: f64,
) -> DVec3 {
    (aiu * viu - ail * vil + aju * vju - ajl * vjl + aku * vku - akl * vkl) / vol
}

/// 替代控制体六个面的向量 Green-Gauss 梯度（3×3 张量）
#[allow(clippy::too_many_arguments)]
pub fn vector_grad_gg(
    ail: DVec3,
    aiu: DVec3,
    ajl: DVec3,
    aju: DVec3,
    akl: DVec3,
    aku: DVec3,
    vil: DVec3,
    viu: DVec3,
    vjl: DVec3,
    vju: DVec3,
    vkl: DVec3,
    vku: DVec3,
    vol: f64,
) -> DMat3 {
    let col = |comp: fn(DVec3) -> f64| {
        (aiu * comp(viu) - ail * comp(vil) + aju * comp(vju) - ajl * comp(vjl)
            + aku * comp(vku)
            - akl * comp(vkl))
            / vol
    };
    DMat3::from_cols(col(|v| v.x), col(|v| v.y), col(|v| v.z))
}

/// 一个面上的全部梯度
#[derive(Debug, Clone)]
pub struct FaceGradients {
    /// 速度梯度张量
    pub velocity: DMat3,
    /// 温度梯度
    pub temperature: DVec3,
    /// 密度梯度
    pub density: DVec3,
    /// 压力梯度
    pub pressure: DVec3,
    /// 湍动能梯度
    pub tke: DVec3,
    /// 比耗散率梯度
    pub sdr: DVec3,
    /// 组分质量分数梯度
    pub mass_fractions: Vec<DVec3>,
}

impl FaceGradients {
    /// 零梯度
    pub fn zeros(num_species: usize) -> Self {
        Self {
            velocity: DMat3::ZERO,
            temperature: DVec3::ZERO,
            density: DVec3::ZERO,
            pressure: DVec3::ZERO,
            tke: DVec3::ZERO,
            sdr: DVec3::ZERO,
            mass_fractions: vec![DVec3::ZERO; num_species],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 单位立方替代控制体
    fn unit_areas() -> [DVec3; 6] {
        [DVec3::X, DVec3::X, DVec3::Y, DVec3::Y, DVec3::Z, DVec3::Z]
    }

    #[test]
    fn test_scalar_gradient_uniform_field() {
        let [ail, aiu, ajl, aju, akl, aku] = unit_areas();
        let g = scalar_grad_gg(ail, aiu, ajl, aju, akl, aku, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 1.0);
        assert!(g.length() < 1e-14);
    }

    #[test]
    fn test_scalar_gradient_linear_field() {
        // 场 φ = x，面值 ±0.5 处为 0 与 1
        let [ail, aiu, ajl, aju, akl, aku] = unit_areas();
        let g = scalar_grad_gg(ail, aiu, ajl, aju, akl, aku, 0.0, 1.0, 0.5, 0.5, 0.5, 0.5, 1.0);
        assert!((g - DVec3::X).length() < 1e-14);
    }

    #[test]
    fn test_vector_gradient_shear() {
        // u = y: du/dy = 1，其余为零
        let [ail, aiu, ajl, aju, akl, aku] = unit_areas();
        let v = |y: f64| DVec3::new(y, 0.0, 0.0);
        let g = vector_grad_gg(
            ail,
            aiu,
            ajl,
            aju,
            akl,
            aku,
            v(0.5),
            v(0.5),
            v(0.0),
            v(1.0),
            v(0.5),
            v(0.5),
            1.0,
        );
        // 列 0 是 u 分量的梯度
        assert!((g.col(0) - DVec3::Y).length() < 1e-14);
        assert!(g.col(1).length() < 1e-14);
        assert!(g.col(2).length() < 1e-14);
    }

    #[test]
    fn test_volume_scaling() {
        let [ail, aiu, ajl, aju, akl, aku] = unit_areas();
        let g = scalar_grad_gg(ail, aiu, ajl, aju, akl, aku, 0.0, 1.0, 0.5, 0.5, 0.5, 0.5, 2.0);
        assert!((g - 0.5 * DVec3::X).length() < 1e-14);
    }
}
