// crates/sf_io/src/function.rs

//! 结果函数文件与输出变量注册表
//!
//! `<runName>_<iter>[_center|_wall_center].fun`：块头与网格文件
//! 相同，外加每块一个 int32 变量数；载荷为逐块、逐变量、逐单元
//! （或逐节点）的量纲值 double，i 最快。
//!
//! 未识别的变量名返回 [`IoError::UnknownOutputVariable`]。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sf_config::SolverConfig;
use sf_grid::VarArray3D;
use sf_physics::{Block, Physics};

use crate::error::IoError;

/// 输出位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLocation {
    /// 节点（缺省 .fun）
    Node,
    /// 单元中心（_center）
    Center,
    /// 壁面面元中心（_wall_center）
    WallCenter,
}

impl OutputLocation {
    /// 文件名后缀
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Node => "",
            Self::Center => "_center",
            Self::WallCenter => "_wall_center",
        }
    }
}

/// 校验变量名集合
pub fn validate_variables(names: &[String], config: &SolverConfig) -> Result<(), IoError> {
    for name in names {
        if !is_known_variable(name, config) {
            return Err(IoError::UnknownOutputVariable(name.clone()));
        }
    }
    Ok(())
}

fn is_known_variable(name: &str, config: &SolverConfig) -> bool {
    const PLAIN: &[&str] = &[
        "density",
        "vel_x",
        "vel_y",
        "vel_z",
        "pressure",
        "mach",
        "sos",
        "temperature",
        "energy",
        "enthalpy",
        "cp",
        "cv",
        "viscosityRatio",
        "wallDistance",
        "tke",
        "sdr",
        "velGrad_ux",
        "velGrad_uy",
        "velGrad_uz",
        "velGrad_vx",
        "velGrad_vy",
        "velGrad_vz",
        "velGrad_wx",
        "velGrad_wy",
        "velGrad_wz",
        "tempGrad_x",
        "tempGrad_y",
        "tempGrad_z",
        "densityGrad_x",
        "densityGrad_y",
        "densityGrad_z",
        "pressGrad_x",
        "pressGrad_y",
        "pressGrad_z",
        "tkeGrad_x",
        "tkeGrad_y",
        "tkeGrad_z",
        "sdrGrad_x",
        "sdrGrad_y",
        "sdrGrad_z",
    ];
    const WALL: &[&str] = &[
        "yplus",
        "shearStress",
        "heatFlux",
        "frictionVelocity",
        "wallDensity",
        "wallPressure",
        "wallTemperature",
        "wallViscosity",
        "wallTke",
        "wallSdr",
    ];
    if PLAIN.contains(&name) || WALL.contains(&name) {
        return true;
    }
    if let Some(eq) = name.strip_prefix("resid_") {
        return eq.parse::<usize>().map_or(false, |n| n >= 1 && n <= config.num_equations());
    }
    if let Some(species) = name.strip_prefix("mf_") {
        return config.fluids.iter().any(|f| f.name == species);
    }
    if let Some(species) = name.strip_prefix("vf_") {
        return config.fluids.iter().any(|f| f.name == species);
    }
    false
}

/// 单元上的量纲变量值
fn cell_value(
    block: &Block,
    cell: (isize, isize, isize),
    name: &str,
    phys: &Physics,
    config: &SolverConfig,
) -> Result<f64, IoError> {
    let sc = &phys.scales;
    let prim = block.prim_at(cell.0, cell.1, cell.2);
    let phys_cell = {
        let (ni, nj, nk) = block.dims();
        cell.0 >= 0
            && cell.0 < ni as isize
            && cell.1 >= 0
            && cell.1 < nj as isize
            && cell.2 >= 0
            && cell.2 < nk as isize
    };
    let mf = prim.mass_fractions();
    let t = prim.temperature(phys);

    let value = match name {
        "density" => prim.rho() * sc.rho_ref,
        "vel_x" => prim.u() * sc.a_ref,
        "vel_y" => prim.v() * sc.a_ref,
        "vel_z" => prim.w() * sc.a_ref,
        "pressure" => prim.p() * sc.p_ref,
        "mach" => prim.velocity().length() / prim.sos(phys),
        "sos" => prim.sos(phys) * sc.a_ref,
        "temperature" => t * sc.t_ref,
        "energy" => prim.energy(phys) * sc.a_ref * sc.a_ref,
        "enthalpy" => prim.enthalpy(phys) * sc.a_ref * sc.a_ref,
        "cp" => phys.eos.cp(t, &mf) * sc.a_ref * sc.a_ref / sc.t_ref,
        "cv" => phys.eos.cv(t, &mf) * sc.a_ref * sc.a_ref / sc.t_ref,
        "viscosityRatio" => {
            let mu = phys.transport.viscosity(t, &mf);
            block.eddy_viscosity(cell) / mu.max(1.0e-30)
        }
        "wallDistance" => block.wall_distance(cell) * sc.l_ref,
        "tke" => prim.tke() * sc.a_ref * sc.a_ref,
        "sdr" => prim.sdr() / sc.time_ref,
        _ => {
            let grad_scale = 1.0 / sc.l_ref;
            if let Some(comp) = name.strip_prefix("velGrad_") {
                let g = block.velocity_gradient(cell);
                let v = match comp {
                    "ux" => g.col(0).x,
                    "uy" => g.col(0).y,
                    "uz" => g.col(0).z,
                    "vx" => g.col(1).x,
                    "vy" => g.col(1).y,
                    "vz" => g.col(1).z,
                    "wx" => g.col(2).x,
                    "wy" => g.col(2).y,
                    "wz" => g.col(2).z,
                    _ => return Err(IoError::UnknownOutputVariable(name.to_string())),
                };
                v * sc.a_ref * grad_scale
            } else if let Some(comp) = name.strip_prefix("tempGrad_") {
                pick_component(block.temperature_gradient(cell), comp, name)?
                    * sc.t_ref
                    * grad_scale
            } else if let Some(comp) = name.strip_prefix("densityGrad_") {
                pick_component(block.density_gradient(cell), comp, name)? * sc.rho_ref * grad_scale
            } else if let Some(comp) = name.strip_prefix("pressGrad_") {
                pick_component(block.pressure_gradient(cell), comp, name)? * sc.p_ref * grad_scale
            } else if let Some(comp) = name.strip_prefix("tkeGrad_") {
                let (gk, _) = block.turb_gradients(cell);
                pick_component(gk, comp, name)? * sc.a_ref * sc.a_ref * grad_scale
            } else if let Some(comp) = name.strip_prefix("sdrGrad_") {
                let (_, gw) = block.turb_gradients(cell);
                pick_component(gw, comp, name)? / sc.time_ref * grad_scale
            } else if let Some(eq) = name.strip_prefix("resid_") {
                let eq: usize = eq
                    .parse()
                    .map_err(|_| IoError::UnknownOutputVariable(name.to_string()))?;
                if phys_cell {
                    block.residual_at(cell)[eq - 1]
                } else {
                    0.0
                }
            } else if let Some(species) = name.strip_prefix("mf_") {
                let s = species_index(species, config, name)?;
                prim.mass_fraction_n(s)
            } else if let Some(species) = name.strip_prefix("vf_") {
                let s = species_index(species, config, name)?;
                phys.transport.mole_fractions(&mf)[s]
            } else {
                return Err(IoError::UnknownOutputVariable(name.to_string()));
            }
        }
    };
    Ok(value)
}

fn pick_component(v: glam::DVec3, comp: &str, name: &str) -> Result<f64, IoError> {
    match comp {
        "x" => Ok(v.x),
        "y" => Ok(v.y),
        "z" => Ok(v.z),
        _ => Err(IoError::UnknownOutputVariable(name.to_string())),
    }
}

fn species_index(species: &str, config: &SolverConfig, name: &str) -> Result<usize, IoError> {
    config
        .fluids
        .iter()
        .position(|f| f.name == species)
        .ok_or_else(|| IoError::UnknownOutputVariable(name.to_string()))
}

/// 壁面面元的量纲变量值
fn wall_value(
    wall: &sf_physics::wall::WallVars,
    name: &str,
    phys: &Physics,
) -> Result<f64, IoError> {
    let sc = &phys.scales;
    let tau_scale = sc.rho_ref * sc.a_ref * sc.a_ref;
    let value = match name {
        "yplus" => wall.yplus,
        "shearStress" => wall.shear_stress.length() * tau_scale,
        "heatFlux" => wall.heat_flux * tau_scale * sc.a_ref,
        "frictionVelocity" => wall.friction_velocity * sc.a_ref,
        "wallDensity" => wall.density * sc.rho_ref,
        "wallPressure" => {
            // 壁面压力由密度与温度经状态方程
            phys.eos.pressure(&[wall.density], wall.temperature) * sc.p_ref
        }
        "wallTemperature" => wall.temperature * sc.t_ref,
        "wallViscosity" => wall.viscosity * sc.mu_ref,
        "wallTke" => wall.tke * sc.a_ref * sc.a_ref,
        "wallSdr" => wall.sdr / sc.time_ref,
        _ => return Err(IoError::UnknownOutputVariable(name.to_string())),
    };
    Ok(value)
}

/// 写出函数文件
pub fn write_fun_file(
    path: &Path,
    blocks: &[Block],
    phys: &Physics,
    config: &SolverConfig,
    names: &[String],
    location: OutputLocation,
) -> Result<(), IoError> {
    validate_variables(names, config)?;
    let mut writer = BufWriter::new(File::create(path)?);

    match location {
        OutputLocation::WallCenter => write_wall_payload(&mut writer, blocks, phys, names),
        _ => write_field_payload(&mut writer, blocks, phys, config, names, location),
    }
}

fn write_field_payload<W: Write>(
    writer: &mut W,
    blocks: &[Block],
    phys: &Physics,
    config: &SolverConfig,
    names: &[String],
    location: OutputLocation,
) -> Result<(), IoError> {
    writer.write_all(&(blocks.len() as i32).to_le_bytes())?;
    for block in blocks {
        let (ni, nj, nk) = block.dims();
        let (di, dj, dk) = match location {
            OutputLocation::Center => (ni, nj, nk),
            _ => (ni + 1, nj + 1, nk + 1),
        };
        writer.write_all(&(di as i32).to_le_bytes())?;
        writer.write_all(&(dj as i32).to_le_bytes())?;
        writer.write_all(&(dk as i32).to_le_bytes())?;
        writer.write_all(&(names.len() as i32).to_le_bytes())?;
    }

    for block in blocks {
        let (ni, nj, nk) = block.dims();
        for name in names {
            match location {
                OutputLocation::Center => {
                    for kk in 0..nk as isize {
                        for jj in 0..nj as isize {
                            for ii in 0..ni as isize {
                                let v = cell_value(block, (ii, jj, kk), name, phys, config)?;
                                writer.write_all(&v.to_le_bytes())?;
                            }
                        }
                    }
                }
                _ => {
                    // 节点输出：含幽灵的单元场做 8 单元平均
                    let g = block.ghosts() as isize;
                    let mut field = VarArray3D::new(ni, nj, nk, block.ghosts(), 1);
                    for kk in -g..nk as isize + g {
                        for jj in -g..nj as isize + g {
                            for ii in -g..ni as isize + g {
                                let outside = [
                                    ii < 0 || ii >= ni as isize,
                                    jj < 0 || jj >= nj as isize,
                                    kk < 0 || kk >= nk as isize,
                                ]
                                .iter()
                                .filter(|o| **o)
                                .count();
                                if outside >= 2 {
                                    continue;
                                }
                                let v = cell_value(block, (ii, jj, kk), name, phys, config)?;
                                field.set(ii, jj, kk, 0, v);
                            }
                        }
                    }
                    let nodes = block.cell_to_node(&field);
                    for kk in 0..=nk as isize {
                        for jj in 0..=nj as isize {
                            for ii in 0..=ni as isize {
                                writer.write_all(&nodes.at(ii, jj, kk, 0).to_le_bytes())?;
                            }
                        }
                    }
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_wall_payload<W: Write>(
    writer: &mut W,
    blocks: &[Block],
    phys: &Physics,
    names: &[String],
) -> Result<(), IoError> {
    let surfaces: Vec<(&Block, usize)> = blocks
        .iter()
        .flat_map(|b| (0..b.walls().len()).map(move |w| (b, w)))
        .collect();

    writer.write_all(&(surfaces.len() as i32).to_le_bytes())?;
    for (block, w) in &surfaces {
        let surf = &block.walls()[*w].surface;
        let n1 = surf.r1.1 - surf.r1.0;
        let n2 = surf.r2.1 - surf.r2.0;
        writer.write_all(&(n1 as i32).to_le_bytes())?;
        writer.write_all(&(n2 as i32).to_le_bytes())?;
        writer.write_all(&1i32.to_le_bytes())?;
        writer.write_all(&(names.len() as i32).to_le_bytes())?;
    }

    for (block, w) in &surfaces {
        let wall = &block.walls()[*w];
        for name in names {
            for (t1, t2) in wall.surface.iter() {
                let v = wall_value(wall.at(t1, t2), name, phys)?;
                writer.write_all(&v.to_le_bytes())?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_variable_names() {
        let config = SolverConfig::default();
        assert!(is_known_variable("density", &config));
        assert!(is_known_variable("velGrad_wz", &config));
        assert!(is_known_variable("mf_air", &config));
        assert!(is_known_variable("vf_air", &config));
        assert!(is_known_variable("resid_1", &config));
        assert!(is_known_variable("resid_5", &config));
        assert!(!is_known_variable("resid_6", &config));
        assert!(!is_known_variable("mf_helium", &config));
        assert!(!is_known_variable("vorticityMagnitude", &config));
    }

    #[test]
    fn test_validate_rejects_unknown() {
        let config = SolverConfig::default();
        let names = vec!["density".to_string(), "frobnitz".to_string()];
        assert!(matches!(
            validate_variables(&names, &config),
            Err(IoError::UnknownOutputVariable(_))
        ));
    }

    #[test]
    fn test_output_location_suffixes() {
        assert_eq!(OutputLocation::Node.suffix(), "");
        assert_eq!(OutputLocation::Center.suffix(), "_center");
        assert_eq!(OutputLocation::WallCenter.suffix(), "_wall_center");
    }
}
