// crates/sf_physics/tests/scenarios.rs

//! 端到端小算例
//!
//! 缩小规模的标准场景：Couette 剪切、超声速通道、单块与切分
//! 双块的等价性、RANS 平板入口。迭代数压到测试可承受的量级，
//! 断言定性行为而非收敛终值。

use glam::DVec3;
use sf_config::{
    BcKind, BoundaryStateSpec, EquationSet, InitialConditionSpec, SolverConfig, SurfaceSpec,
    TimeIntegration, TurbulenceModelKind,
};
use sf_grid::NodeBlock;
use sf_physics::parallel::Decomposition;
use sf_physics::{GridLevel, Physics};

fn surf(kind: BcKind, i: [usize; 2], j: [usize; 2], k: [usize; 2], tag: i32) -> SurfaceSpec {
    SurfaceSpec {
        kind,
        i_range: i,
        j_range: j,
        k_range: k,
        tag,
    }
}

fn uniform_ic(velocity: DVec3) -> InitialConditionSpec {
    InitialConditionSpec::Uniform {
        tag: -1,
        density: 1.2256,
        velocity,
        pressure: 101325.0,
        turb_intensity: 0.01,
        eddy_visc_ratio: 10.0,
        mass_fractions: Vec::new(),
    }
}

// ============================================================
// Couette 剪切
// ============================================================

#[test]
fn couette_shear_transmits_from_moving_wall() {
    let (ni, nj, nk) = (8usize, 4usize, 2usize);
    let config = SolverConfig {
        equation_set: EquationSet::NavierStokes,
        time_integration: TimeIntegration::ImplicitEuler,
        cfl_start: 20.0,
        cfl_max: 20.0,
        boundary_conditions: vec![vec![
            surf(BcKind::ViscousWall, [0, 0], [0, nj], [0, nk], 1),
            surf(BcKind::ViscousWall, [ni, ni], [0, nj], [0, nk], 2),
            surf(BcKind::Periodic, [0, ni], [0, 0], [0, nk], 5),
            surf(BcKind::Periodic, [0, ni], [nj, nj], [0, nk], 5),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [0, 0], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [nk, nk], 0),
        ]],
        boundary_states: vec![
            BoundaryStateSpec::ViscousWall {
                tag: 1,
                temperature: Some(288.0),
                heat_flux: 0.0,
                velocity: DVec3::ZERO,
                wall_law: false,
            },
            BoundaryStateSpec::ViscousWall {
                tag: 2,
                temperature: Some(289.0),
                heat_flux: 0.0,
                velocity: DVec3::new(0.0, 75.4, 0.0),
                wall_law: false,
            },
        ],
        initial_conditions: vec![uniform_ic(DVec3::ZERO)],
        reference_temperature: 288.0,
        ..Default::default()
    };
    let phys = Physics::from_config(&config);
    // 壁面间距缩小以提高黏性耦合
    let mesh = vec![NodeBlock::cartesian(
        (ni, nj, nk),
        DVec3::ZERO,
        DVec3::new(1.0e-5, 1.0e-4, 1.0e-4),
    )];
    let mut level = GridLevel::new(mesh, &config, &phys, Decomposition::single(1)).unwrap();

    for iter in 0..40 {
        let (l2, _) = level.iterate(&config, &phys, iter).unwrap();
        assert!(l2.l2().iter().all(|v| v.is_finite()));
    }

    // 动壁（i-max, v_y = 75.4）一侧的切向速度高于静壁一侧
    let b = &level.blocks()[0];
    let near_moving = b.prim_at(ni as isize - 1, 1, 1).v();
    let near_static = b.prim_at(0, 1, 1).v();
    assert!(
        near_moving > near_static,
        "剪切未从动壁传入: {near_moving} <= {near_static}"
    );
    assert!(near_moving > 0.0);
    // 切向速度沿 i 单调不减（库埃特剖面趋势）
    for ii in 0..ni as isize - 1 {
        let lo = b.prim_at(ii, 1, 1).v();
        let hi = b.prim_at(ii + 1, 1, 1).v();
        assert!(hi >= lo - 1e-9, "剖面非单调: v({ii})={lo}, v({})={hi}", ii + 1);
    }
}

// ============================================================
// 超声速通道
// ============================================================

fn supersonic_channel_config(blocks: Vec<Vec<SurfaceSpec>>) -> SolverConfig {
    SolverConfig {
        equation_set: EquationSet::Euler,
        time_integration: TimeIntegration::Rk4,
        cfl_start: 0.5,
        cfl_max: 0.5,
        boundary_conditions: blocks,
        boundary_states: vec![BoundaryStateSpec::FreestreamState {
            tag: 1,
            density: 1.2256,
            velocity: DVec3::new(680.6, 0.0, 0.0),
            pressure: 101325.0,
            turb_intensity: 0.01,
            eddy_visc_ratio: 10.0,
            mass_fractions: Vec::new(),
        }],
        initial_conditions: vec![uniform_ic(DVec3::new(680.6, 0.0, 0.0))],
        ..Default::default()
    }
}

#[test]
fn supersonic_channel_mass_flux_balance() {
    let (ni, nj, nk) = (8usize, 4usize, 2usize);
    let config = supersonic_channel_config(
        vec![vec![
            surf(BcKind::SupersonicInflow, [0, 0], [0, nj], [0, nk], 1),
            surf(BcKind::SupersonicOutflow, [ni, ni], [0, nj], [0, nk], 2),
            surf(BcKind::SlipWall, [0, ni], [0, 0], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni], [nj, nj], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [0, 0], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [nk, nk], 0),
        ]],
    );
    let phys = Physics::from_config(&config);
    let mesh = vec![NodeBlock::cartesian((ni, nj, nk), DVec3::ZERO, DVec3::ONE)];
    let mut level = GridLevel::new(mesh, &config, &phys, Decomposition::single(1)).unwrap();

    let mut last = f64::MAX;
    for iter in 0..50 {
        let (l2, _) = level.iterate(&config, &phys, iter).unwrap();
        last = l2.l2()[0];
    }
    // 均匀超声速流保持定常
    assert!(last < 1e-10, "质量残差 = {last:e}");

    // 进出口平面的质量通量差
    let b = &level.blocks()[0];
    let plane_flux = |ii: isize| -> f64 {
        let mut total = 0.0;
        for kk in 0..nk as isize {
            for jj in 0..nj as isize {
                let p = b.prim_at(ii, jj, kk);
                let a = b.geometry().farea_i.get(ii, jj, kk);
                total += p.rho() * p.velocity().dot(a.unit) * a.mag;
            }
        }
        total
    };
    let inlet = plane_flux(0);
    let outlet = plane_flux(ni as isize - 1);
    assert!(
        ((inlet - outlet) / inlet).abs() < 1e-6,
        "质量通量不守恒: {inlet} vs {outlet}"
    );
}

// ============================================================
// 切分双块与单块的等价性
// ============================================================

#[test]
fn split_two_block_matches_single_block() {
    let (nj, nk) = (4usize, 2usize);
    let ni_total = 8usize;
    let half = 4usize;

    // 单块
    let single_config = supersonic_channel_config(
        vec![vec![
            surf(BcKind::SupersonicInflow, [0, 0], [0, nj], [0, nk], 1),
            surf(BcKind::SupersonicOutflow, [ni_total, ni_total], [0, nj], [0, nk], 2),
            surf(BcKind::SlipWall, [0, ni_total], [0, 0], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni_total], [nj, nj], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni_total], [0, nj], [0, 0], 0),
            surf(BcKind::SlipWall, [0, ni_total], [0, nj], [nk, nk], 0),
        ]],
    );
    let phys = Physics::from_config(&single_config);
    let mesh = vec![NodeBlock::cartesian((ni_total, nj, nk), DVec3::ZERO, DVec3::ONE)];
    let mut single =
        GridLevel::new(mesh, &single_config, &phys, Decomposition::single(1)).unwrap();

    // 双块（在 i = 4 切分）
    let two_config = supersonic_channel_config(
        vec![
            vec![
                surf(BcKind::SupersonicInflow, [0, 0], [0, nj], [0, nk], 1),
                surf(BcKind::Interblock, [half, half], [0, nj], [0, nk], 9),
                surf(BcKind::SlipWall, [0, half], [0, 0], [0, nk], 0),
                surf(BcKind::SlipWall, [0, half], [nj, nj], [0, nk], 0),
                surf(BcKind::SlipWall, [0, half], [0, nj], [0, 0], 0),
                surf(BcKind::SlipWall, [0, half], [0, nj], [nk, nk], 0),
            ],
            vec![
                surf(BcKind::Interblock, [0, 0], [0, nj], [0, nk], 9),
                surf(BcKind::SupersonicOutflow, [half, half], [0, nj], [0, nk], 2),
                surf(BcKind::SlipWall, [0, half], [0, 0], [0, nk], 0),
                surf(BcKind::SlipWall, [0, half], [nj, nj], [0, nk], 0),
                surf(BcKind::SlipWall, [0, half], [0, nj], [0, 0], 0),
                surf(BcKind::SlipWall, [0, half], [0, nj], [nk, nk], 0),
            ],
        ],
    );
    let meshes = vec![
        NodeBlock::cartesian((half, nj, nk), DVec3::ZERO, DVec3::ONE),
        NodeBlock::cartesian((half, nj, nk), DVec3::new(half as f64, 0.0, 0.0), DVec3::ONE),
    ];
    let mut two = GridLevel::new(meshes, &two_config, &phys, Decomposition::single(2)).unwrap();

    // 两个算例施加同一扰动（全局单元 (3,1,1)）
    let perturb = |level: &mut GridLevel, block: usize, cell: (isize, isize, isize)| {
        let b = &mut level.blocks_mut()[block];
        let mut p = b.prim_at(cell.0, cell.1, cell.2);
        p.as_mut_slice()[0] *= 1.01;
        b.set_prim(cell.0, cell.1, cell.2, &p);
    };
    perturb(&mut single, 0, (3, 1, 1));
    perturb(&mut two, 0, (3, 1, 1));

    for iter in 0..5 {
        single.iterate(&single_config, &phys, iter).unwrap();
        two.iterate(&two_config, &phys, iter).unwrap();
    }

    // 全部全局单元逐项比较
    for kk in 0..nk as isize {
        for jj in 0..nj as isize {
            for ii in 0..ni_total as isize {
                let expected = single.blocks()[0].prim_at(ii, jj, kk);
                let (bb, li) = if ii < half as isize {
                    (0, ii)
                } else {
                    (1, ii - half as isize)
                };
                let got = two.blocks()[bb].prim_at(li, jj, kk);
                for (e, g) in expected.as_slice().iter().zip(got.as_slice()) {
                    assert!(
                        (e - g).abs() < 1e-12,
                        "单元 ({ii},{jj},{kk}) 不一致: {e} vs {g}"
                    );
                }
            }
        }
    }
}

// ============================================================
// RANS 平板入口
// ============================================================

#[test]
fn rans_flat_plate_inlet_runs_and_builds_wall_data() {
    let (ni, nj, nk) = (6usize, 4usize, 2usize);
    let config = SolverConfig {
        equation_set: EquationSet::Rans,
        time_integration: TimeIntegration::ImplicitEuler,
        turbulence_model: TurbulenceModelKind::KOmegaWilcox2006,
        cfl_start: 2.0,
        cfl_max: 5.0,
        boundary_conditions: vec![vec![
            surf(BcKind::StagnationInlet, [0, 0], [0, nj], [0, nk], 2),
            surf(BcKind::PressureOutlet, [ni, ni], [0, nj], [0, nk], 3),
            surf(BcKind::ViscousWall, [0, ni], [0, 0], [0, nk], 1),
            surf(BcKind::SlipWall, [0, ni], [nj, nj], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [0, 0], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [nk, nk], 0),
        ]],
        boundary_states: vec![
            BoundaryStateSpec::StagnationInlet {
                tag: 2,
                p0: 117662.9,
                t0: 302.4,
                direction: DVec3::X,
                turb_intensity: 0.01,
                eddy_visc_ratio: 10.0,
            },
            BoundaryStateSpec::PressureOutlet {
                tag: 3,
                pressure: 114426.9,
                nonreflecting: false,
                length_scale: 1.0,
            },
            BoundaryStateSpec::ViscousWall {
                tag: 1,
                temperature: None,
                heat_flux: 0.0,
                velocity: DVec3::ZERO,
                wall_law: false,
            },
        ],
        initial_conditions: vec![InitialConditionSpec::Uniform {
            tag: -1,
            density: 1.32,
            velocity: DVec3::new(70.0, 0.0, 0.0),
            pressure: 114426.9,
            turb_intensity: 0.01,
            eddy_visc_ratio: 10.0,
            mass_fractions: Vec::new(),
        }],
        reference_temperature: 302.4,
        reference_density: 1.32,
        ..Default::default()
    };
    let phys = Physics::from_config(&config);
    assert!(phys.has_turbulence());

    let mesh = vec![NodeBlock::cartesian(
        (ni, nj, nk),
        DVec3::ZERO,
        DVec3::new(0.01, 0.002, 0.01),
    )];
    let mut level = GridLevel::new(mesh, &config, &phys, Decomposition::single(1)).unwrap();

    // 壁面距离已建立
    let b = &level.blocks()[0];
    let wd_near = b.wall_distance((1, 0, 0));
    let wd_far = b.wall_distance((1, 3, 0));
    assert!(wd_near > 0.0 && wd_near < wd_far);

    for iter in 0..10 {
        let (l2, _) = level.iterate(&config, &phys, iter).unwrap();
        assert!(l2.l2().iter().all(|v| v.is_finite()));
    }

    // 壁面数据被逐迭代更新
    let b = &level.blocks()[0];
    assert_eq!(b.walls().len(), 1);
    let vars = b.walls()[0].at(2, 0);
    assert!(vars.yplus > 0.0);
    assert!(vars.shear_stress.length() >= 0.0);
    // 全部状态保持物理
    for cell in b.phys_cells() {
        assert!(b.prim_at(cell.0, cell.1, cell.2).is_physical());
    }
}
