// crates/sf_io/tests/restart_continuation.rs

//! 重启连续性
//!
//! 迭代 N 步写重启、再续算 M 步，与一次性跑 N+M 步的结果
//! 逐单元一致。

use glam::DVec3;
use sf_config::{
    BcKind, BoundaryStateSpec, EquationSet, InitialConditionSpec, SolverConfig, SurfaceSpec,
    TimeIntegration,
};
use sf_grid::NodeBlock;
use sf_io::restart::{read_restart, write_restart};
use sf_physics::parallel::Decomposition;
use sf_physics::{GridLevel, Physics, ResidL2};

fn surf(kind: BcKind, i: [usize; 2], j: [usize; 2], k: [usize; 2], tag: i32) -> SurfaceSpec {
    SurfaceSpec {
        kind,
        i_range: i,
        j_range: j,
        k_range: k,
        tag,
    }
}

fn channel_config() -> SolverConfig {
    let (ni, nj, nk) = (6usize, 3usize, 2usize);
    SolverConfig {
        equation_set: EquationSet::Euler,
        time_integration: TimeIntegration::ExplicitEuler,
        cfl_start: 0.5,
        cfl_max: 0.5,
        boundary_conditions: vec![vec![
            surf(BcKind::SupersonicInflow, [0, 0], [0, nj], [0, nk], 1),
            surf(BcKind::SupersonicOutflow, [ni, ni], [0, nj], [0, nk], 2),
            surf(BcKind::SlipWall, [0, ni], [0, 0], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni], [nj, nj], [0, nk], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [0, 0], 0),
            surf(BcKind::SlipWall, [0, ni], [0, nj], [nk, nk], 0),
        ]],
        boundary_states: vec![BoundaryStateSpec::FreestreamState {
            tag: 1,
            density: 1.2256,
            velocity: DVec3::new(680.6, 0.0, 0.0),
            pressure: 101325.0,
            turb_intensity: 0.01,
            eddy_visc_ratio: 10.0,
            mass_fractions: Vec::new(),
        }],
        initial_conditions: vec![InitialConditionSpec::Uniform {
            tag: -1,
            density: 1.2256,
            velocity: DVec3::new(680.6, 0.0, 0.0),
            pressure: 101325.0,
            turb_intensity: 0.01,
            eddy_visc_ratio: 10.0,
            mass_fractions: Vec::new(),
        }],
        ..Default::default()
    }
}

fn build_level(config: &SolverConfig, phys: &Physics) -> GridLevel {
    let mesh = vec![NodeBlock::cartesian((6, 3, 2), DVec3::ZERO, DVec3::ONE)];
    let mut level = GridLevel::new(mesh, config, phys, Decomposition::single(1)).unwrap();
    // 密度扰动制造非平凡瞬态
    let b = &mut level.blocks_mut()[0];
    let mut p = b.prim_at(2, 1, 1);
    p.as_mut_slice()[0] *= 1.02;
    b.set_prim(2, 1, 1, &p);
    level
}

#[test]
fn restart_continuation_matches_straight_run() {
    let config = channel_config();
    let phys = Physics::from_config(&config);

    // 参考：一次性 10 步
    let mut reference = build_level(&config, &phys);
    for iter in 0..10 {
        reference.iterate(&config, &phys, iter).unwrap();
    }

    // 前 5 步后写重启
    let mut first = build_level(&config, &phys);
    for iter in 0..5 {
        first.iterate(&config, &phys, iter).unwrap();
    }
    let dir = std::env::temp_dir().join("sf_restart_continuation");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("case_5.rst");
    let l2 = ResidL2::new(config.num_equations());
    write_restart(&path, first.blocks(), &phys, &config, 5, &l2).unwrap();

    // 新算例读重启续算 5 步
    let mut resumed = build_level(&config, &phys);
    let header = read_restart(&path, resumed.blocks_mut(), &phys, &config).unwrap();
    assert_eq!(header.iteration, 5);
    for iter in header.iteration..header.iteration + 5 {
        resumed.iterate(&config, &phys, iter).unwrap();
    }

    for cell in reference.blocks()[0].phys_cells() {
        let want = reference.blocks()[0].prim_at(cell.0, cell.1, cell.2);
        let got = resumed.blocks()[0].prim_at(cell.0, cell.1, cell.2);
        for (w, g) in want.as_slice().iter().zip(got.as_slice()) {
            assert!(
                (w - g).abs() <= 1e-12 * w.abs().max(1.0),
                "单元 {cell:?}: {w} != {g}"
            );
        }
    }
}
