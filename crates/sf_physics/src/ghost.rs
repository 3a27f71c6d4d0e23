// crates/sf_physics/src/ghost.rs

//! 幽灵状态计算
//!
//! 给定内侧相邻状态、单位外法向、壁面距离、面片标签与边界类型，
//! 产出幽灵单元状态。循环与棱规则由块内核驱动；本模块只做
//! 逐面的纯计算。
//!
//! 无黏遍历处理全部物理边界；黏性遍历只对黏性壁覆写。
//! 块间连接幽灵不经过本模块，由交换协议填充。

use glam::DVec3;

use sf_config::BoundaryStateSpec;

use crate::physics::Physics;
use crate::state::Primitive;
use crate::wall::WallVars;

// ============================================================
// 无量纲化的边界输入状态
// ============================================================

/// 把边界状态记录换算到无量纲单位
#[derive(Debug, Clone)]
pub enum NondimBcState {
    /// 全状态（特征远场 / 超声速入口）
    Freestream {
        /// 无量纲原始状态
        state: Primitive,
        /// 湍流强度
        turb_intensity: f64,
        /// 湍流黏性比
        eddy_visc_ratio: f64,
    },
    /// 驻点入口
    Stagnation {
        /// 无量纲驻点压力
        p0: f64,
        /// 无量纲驻点温度
        t0: f64,
        /// 流动方向
        direction: DVec3,
        /// 湍流强度
        turb_intensity: f64,
        /// 湍流黏性比
        eddy_visc_ratio: f64,
    },
    /// 压力出口
    PressureOutlet {
        /// 无量纲静压
        pressure: f64,
        /// 非反射处理
        nonreflecting: bool,
        /// 无量纲松弛长度
        length_scale: f64,
    },
    /// 黏性壁
    ViscousWall {
        /// 无量纲壁面温度（None 为绝热）
        temperature: Option<f64>,
        /// 无量纲壁面速度
        velocity: DVec3,
        /// 无量纲热流
        heat_flux: f64,
        /// 是否用壁面律
        wall_law: bool,
    },
}

impl NondimBcState {
    /// 从输入记录换算
    pub fn from_spec(spec: &BoundaryStateSpec, phys: &Physics) -> Self {
        let sc = &phys.scales;
        match spec {
            BoundaryStateSpec::FreestreamState {
                density,
                velocity,
                pressure,
                turb_intensity,
                eddy_visc_ratio,
                mass_fractions,
                ..
            } => {
                let l = phys.layout;
                let mut state = Primitive::zeros(l);
                let rho = sc.nondim_density(*density);
                let fractions: Vec<f64> = if mass_fractions.is_empty() {
                    let mut f = vec![0.0; l.num_species()];
                    f[0] = 1.0;
                    f
                } else {
                    mass_fractions.clone()
                };
                for (s, y) in fractions.iter().enumerate() {
                    state.as_mut_slice()[s] = rho * y;
                }
                state.set_velocity(*velocity / sc.a_ref);
                state.set_p(sc.nondim_pressure(*pressure));
                let mut out = Self::Freestream {
                    state,
                    turb_intensity: *turb_intensity,
                    eddy_visc_ratio: *eddy_visc_ratio,
                };
                if let Self::Freestream { state, .. } = &mut out {
                    state.apply_farfield_turb(*turb_intensity, *eddy_visc_ratio, phys);
                }
                out
            }
            BoundaryStateSpec::StagnationInlet {
                p0,
                t0,
                direction,
                turb_intensity,
                eddy_visc_ratio,
                ..
            } => Self::Stagnation {
                p0: sc.nondim_pressure(*p0),
                t0: sc.nondim_temperature(*t0),
                direction: *direction,
                turb_intensity: *turb_intensity,
                eddy_visc_ratio: *eddy_visc_ratio,
            },
            BoundaryStateSpec::PressureOutlet {
                pressure,
                nonreflecting,
                length_scale,
                ..
            } => Self::PressureOutlet {
                pressure: sc.nondim_pressure(*pressure),
                nonreflecting: *nonreflecting,
                length_scale: sc.nondim_length(*length_scale),
            },
            BoundaryStateSpec::ViscousWall {
                temperature,
                velocity,
                heat_flux,
                wall_law,
                ..
            } => Self::ViscousWall {
                temperature: temperature.map(|t| sc.nondim_temperature(t)),
                velocity: *velocity / sc.a_ref,
                heat_flux: *heat_flux / (sc.rho_ref * sc.a_ref * sc.a_ref * sc.a_ref),
                wall_law: *wall_law,
            },
        }
    }
}

// ============================================================
// 无黏幽灵状态
// ============================================================

/// 滑移壁反射：法向速度取反，切向保持，ρ 与 P 复制
pub fn slip_wall_ghost(interior: &Primitive, normal: DVec3) -> Primitive {
    let mut ghost = interior.clone();
    let vel = interior.velocity();
    ghost.set_velocity(vel - 2.0 * vel.dot(normal) * normal);
    ghost
}

/// 超声速出口：全外推
pub fn supersonic_outflow_ghost(interior: &Primitive) -> Primitive {
    interior.clone()
}

/// 特征远场
///
/// 按内侧法向 Mach 数分支：超声速入/出流全取一侧；亚声速入流取
/// 远场状态、压力从内部外推；亚声速出流取内部状态、压力从远场。
pub fn characteristic_ghost(
    interior: &Primitive,
    freestream: &Primitive,
    normal: DVec3,
    phys: &Physics,
) -> Primitive {
    let un = freestream.velocity().dot(normal);
    let mach_n = un / freestream.sos(phys);
    if mach_n <= -1.0 {
        // 超声速入流
        freestream.clone()
    } else if mach_n < 0.0 {
        // 亚声速入流
        let mut ghost = freestream.clone();
        ghost.set_p(interior.p());
        ghost
    } else if mach_n < 1.0 {
        // 亚声速出流
        let mut ghost = interior.clone();
        ghost.set_p(freestream.p());
        ghost
    } else {
        // 超声速出流
        interior.clone()
    }
}

/// 驻点入口
///
/// 保持驻点焓与等熵关系，速度模取自内部状态。
#[allow(clippy::too_many_arguments)]
pub fn stagnation_inlet_ghost(
    interior: &Primitive,
    p0: f64,
    t0: f64,
    direction: DVec3,
    turb_intensity: f64,
    eddy_visc_ratio: f64,
    phys: &Physics,
) -> Primitive {
    let mf = interior.mass_fractions();
    let cp = phys.eos.cp(t0, &mf);
    let gamma = phys.eos.gamma(&mf);

    let vel_mag = interior.velocity().length();
    // T = T0 - |V|²/(2 cp)，不低于驻点温度的一半
    let t = (t0 - 0.5 * vel_mag * vel_mag / cp).max(0.5 * t0);
    let p = p0 * (t / t0).powf(gamma / (gamma - 1.0));

    let mut ghost = interior.clone();
    ghost.set_p(p);
    // 密度由状态方程: ρ = γ_ref·P/(R_mix·T)，R_mix 从内部状态反解
    let r_mix =
        phys.eos.gamma_ref() * interior.p() / (interior.rho() * interior.temperature(phys));
    let rho = phys.eos.gamma_ref() * p / (r_mix * t);
    for (s, y) in mf.iter().enumerate() {
        ghost.as_mut_slice()[s] = rho * y;
    }
    ghost.set_velocity(vel_mag * direction);
    ghost.apply_farfield_turb(turb_intensity, eddy_visc_ratio, phys);
    ghost
}

/// 非反射出口的时间 n 信息
#[derive(Debug, Clone, Copy)]
pub struct NonreflectingContext {
    /// 时间 n 的压力
    pub pressure_tn: f64,
    /// 时间 n 的压力梯度
    pub pressure_grad: DVec3,
    /// 时间 n 的法向速度梯度（∇(V·n)）
    pub vel_n_grad: DVec3,
    /// 面片的面积平均 Mach 数
    pub mach_avg: f64,
    /// 内部声阻抗 ρ·a
    pub rho_a: f64,
}

/// 压力出口
///
/// 常规变体把幽灵压力设为给定静压；非反射变体用时间 n 的压力与
/// 法向速度梯度以及面片平均 Mach 数做松弛。
pub fn pressure_outlet_ghost(
    interior: &Primitive,
    pressure: f64,
    length_scale: f64,
    nonreflecting: Option<&NonreflectingContext>,
    normal: DVec3,
) -> Primitive {
    let mut ghost = interior.clone();
    match nonreflecting {
        None => ghost.set_p(pressure),
        Some(ctx) => {
            // 出行波修正后的有效压力
            let outgoing = ctx.pressure_grad.dot(normal) - ctx.rho_a * ctx.vel_n_grad.dot(normal);
            let p_eff = ctx.pressure_tn - length_scale * outgoing;
            // 平均 Mach 控制的松弛因子
            let sigma = 0.25;
            let f = sigma * (1.0 - ctx.mach_avg * ctx.mach_avg).max(0.0);
            ghost.set_p((pressure + f * p_eff) / (1.0 + f));
        }
    }
    ghost
}

// ============================================================
// 黏性幽灵状态
// ============================================================

/// 黏性壁幽灵（覆写无黏值）
///
/// 无滑移镜像：速度 2·V_wall − V_int；等温壁温度镜像，绝热壁复制；
/// 密度按状态方程随温度调整；湍流变量对壁面值镜像。
pub fn viscous_wall_ghost(
    interior: &Primitive,
    wall: &WallVars,
    wall_velocity: DVec3,
    isothermal: bool,
    phys: &Physics,
) -> Primitive {
    let mut ghost = interior.clone();
    ghost.set_velocity(2.0 * wall_velocity - interior.velocity());

    let t_int = interior.temperature(phys);
    let t_ghost = if isothermal {
        (2.0 * wall.temperature - t_int).max(0.1 * wall.temperature)
    } else {
        t_int
    };
    // 压力复制，密度随温度
    let rho = interior.rho() * t_int / t_ghost;
    let mf = interior.mass_fractions();
    for (s, y) in mf.iter().enumerate() {
        ghost.as_mut_slice()[s] = rho * y;
    }

    if phys.has_turbulence() {
        ghost.set_turb(
            2.0 * wall.tke - interior.tke(),
            2.0 * wall.sdr - interior.sdr(),
        );
    }
    ghost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::test_support::air_physics;

    fn interior() -> Primitive {
        Primitive::from_slice(&[1.0, 0.3, 0.1, 0.0, 1.0 / 1.4], 1)
    }

    #[test]
    fn test_slip_wall_reflects_normal_velocity() {
        let ghost = slip_wall_ghost(&interior(), DVec3::X);
        assert!((ghost.u() + 0.3).abs() < 1e-14);
        assert!((ghost.v() - 0.1).abs() < 1e-14);
        assert!((ghost.rho() - 1.0).abs() < 1e-14);
        assert!((ghost.p() - 1.0 / 1.4).abs() < 1e-14);
        // 面平均后法向速度为零
        let avg_un = 0.5 * (ghost.velocity() + interior().velocity()).dot(DVec3::X);
        assert!(avg_un.abs() < 1e-14);
    }

    #[test]
    fn test_characteristic_branches() {
        let phys = air_physics(false);
        let int = interior();
        // 亚声速出流（远场速度沿 +x，外法向 +x）
        let far = Primitive::from_slice(&[1.0, 0.3, 0.0, 0.0, 0.9 / 1.4], 1);
        let ghost = characteristic_ghost(&int, &far, DVec3::X, &phys);
        assert!((ghost.p() - 0.9 / 1.4).abs() < 1e-14);
        assert!((ghost.u() - 0.3).abs() < 1e-14);

        // 亚声速入流（外法向 -x，远场向 +x 流入）
        let ghost = characteristic_ghost(&int, &far, -DVec3::X, &phys);
        assert!((ghost.p() - int.p()).abs() < 1e-14);
        assert!((ghost.rho() - far.rho()).abs() < 1e-14);

        // 超声速入流
        let fast = Primitive::from_slice(&[1.0, 2.0, 0.0, 0.0, 1.0 / 1.4], 1);
        let ghost = characteristic_ghost(&int, &fast, -DVec3::X, &phys);
        assert_eq!(ghost.as_slice(), fast.as_slice());

        // 超声速出流
        let ghost = characteristic_ghost(&fast, &fast, DVec3::X, &phys);
        assert_eq!(ghost.as_slice(), fast.as_slice());
    }

    #[test]
    fn test_stagnation_inlet_recovers_total_conditions() {
        let phys = air_physics(false);
        // 静止内部状态 → T = T0, P = P0
        let still = Primitive::from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0 / 1.4], 1);
        let ghost = stagnation_inlet_ghost(&still, 1.0 / 1.4, 1.0, DVec3::X, 0.01, 10.0, &phys);
        assert!((ghost.p() - 1.0 / 1.4).abs() < 1e-12);
        assert!((ghost.temperature(&phys) - 1.0).abs() < 1e-12);

        // 有速度时压力低于驻点压力
        let ghost = stagnation_inlet_ghost(&interior(), 1.0 / 1.4, 1.0, DVec3::X, 0.01, 10.0, &phys);
        assert!(ghost.p() < 1.0 / 1.4);
        assert!(ghost.velocity().dot(DVec3::X) > 0.0);
    }

    #[test]
    fn test_pressure_outlet_plain() {
        let ghost = pressure_outlet_ghost(&interior(), 0.6, 1.0, None, DVec3::X);
        assert!((ghost.p() - 0.6).abs() < 1e-14);
        assert!((ghost.u() - 0.3).abs() < 1e-14);
    }

    #[test]
    fn test_pressure_outlet_nonreflecting_relaxes() {
        let ctx = NonreflectingContext {
            pressure_tn: 0.8,
            pressure_grad: DVec3::ZERO,
            vel_n_grad: DVec3::ZERO,
            mach_avg: 0.5,
            rho_a: 1.0,
        };
        let ghost = pressure_outlet_ghost(&interior(), 0.6, 1.0, Some(&ctx), DVec3::X);
        // 介于给定压力与时间 n 压力之间
        assert!(ghost.p() > 0.6 && ghost.p() < 0.8);
    }

    #[test]
    fn test_viscous_wall_no_slip_mirror() {
        let phys = air_physics(false);
        let mut wall = WallVars::new(1);
        wall.temperature = 1.0;
        let ghost = viscous_wall_ghost(&interior(), &wall, DVec3::ZERO, true, &phys);
        // 面平均速度为壁面速度（零）
        let avg = 0.5 * (ghost.velocity() + interior().velocity());
        assert!(avg.length() < 1e-14);
        // 面平均温度为壁温
        let t_avg = 0.5 * (ghost.temperature(&phys) + interior().temperature(&phys));
        assert!((t_avg - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_viscous_wall_adiabatic_keeps_temperature() {
        let phys = air_physics(false);
        let wall = WallVars::new(1);
        let ghost = viscous_wall_ghost(&interior(), &wall, DVec3::ZERO, false, &phys);
        assert!((ghost.temperature(&phys) - interior().temperature(&phys)).abs() < 1e-12);
    }
}
