// crates/sf_config/src/parser.rs

//! 文本输入文件解析器
//!
//! 输入文件为 `key: value` 形式的文本记录，`#` 起始为注释。
//! 列表值使用方括号，可跨行；复合记录形如
//! `name(key=value; key=[a, b, c])`。
//! `boundaryConditions` 之后跟随逐块的面片描述：
//!
//! ```text
//! boundaryConditions: 1
//! 2 2 2
//! viscousWall 0 0 0 4 0 2 1
//! ...
//! ```

use glam::DVec3;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::boundary::{BcKind, BoundaryStateSpec, InitialConditionSpec, SurfaceSpec};
use crate::error::ConfigError;
use crate::solver_config::{FluidSpec, SolverConfig};

/// 从文件解析配置
pub fn read_input(path: &Path) -> Result<SolverConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let mut config = parse_input(&text)?;
    if config.run_name.is_empty() {
        config.run_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string());
    }
    config.validate()?;
    Ok(config)
}

/// 从字符串解析配置
pub fn parse_input(text: &str) -> Result<SolverConfig, ConfigError> {
    let mut config = SolverConfig::default();

    // 预处理：去注释，保留行号
    let lines: Vec<(usize, String)> = text
        .lines()
        .enumerate()
        .map(|(no, line)| {
            let stripped = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            (no + 1, stripped.trim().to_string())
        })
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let mut idx = 0;
    while idx < lines.len() {
        let (line_no, line) = &lines[idx];
        let (key, value) = split_key_value(*line_no, line)?;

        // 列表值可以跨行：累积到方括号闭合
        let mut value = value.to_string();
        while value.starts_with('[') && !brackets_closed(&value) {
            idx += 1;
            if idx >= lines.len() {
                return Err(ConfigError::parse(*line_no, "列表未闭合"));
            }
            value.push(' ');
            value.push_str(&lines[idx].1);
        }

        match key {
            "gridName" => config.grid_name = value,
            "runName" => config.run_name = value,
            "restartName" => config.restart_name = value,
            "equationSet" => config.equation_set = value.parse()?,
            "timeIntegration" => config.time_integration = value.parse()?,
            "turbulenceModel" => config.turbulence_model = value.parse()?,
            "dt" => config.dt = parse_f64(*line_no, key, &value)?,
            "cflStart" => config.cfl_start = parse_f64(*line_no, key, &value)?,
            "cflMax" => config.cfl_max = parse_f64(*line_no, key, &value)?,
            "cflStep" => config.cfl_step = parse_f64(*line_no, key, &value)?,
            "viscousCflFactor" => {
                config.viscous_cfl_factor = parse_f64(*line_no, key, &value)?
            }
            "iterations" => config.iterations = parse_usize(*line_no, key, &value)?,
            "nonlinearIterations" => {
                config.nonlinear_iterations = parse_usize(*line_no, key, &value)?
            }
            "outputFrequency" => config.output_frequency = parse_usize(*line_no, key, &value)?,
            "restartFrequency" => config.restart_frequency = parse_usize(*line_no, key, &value)?,
            "faceReconstruction" => config.face_reconstruction = value.parse()?,
            "viscousFaceReconstruction" => {
                config.viscous_face_reconstruction = value.parse()?
            }
            "limiter" => config.limiter = value.parse()?,
            "matrixSolver" => config.matrix_solver = value.parse()?,
            "matrixRelaxation" => config.matrix_relaxation = parse_f64(*line_no, key, &value)?,
            "matrixSweeps" => config.matrix_sweeps = parse_usize(*line_no, key, &value)?,
            "mgLevels" => config.mg_levels = parse_usize(*line_no, key, &value)?,
            "referenceTemperature" => {
                config.reference_temperature = parse_f64(*line_no, key, &value)?
            }
            "referenceDensity" => config.reference_density = parse_f64(*line_no, key, &value)?,
            "referenceLength" => config.reference_length = parse_f64(*line_no, key, &value)?,
            "decompositionMethod" => config.decomposition_method = value,
            "ghostLayers" => config.ghost_layers = parse_usize(*line_no, key, &value)?,
            "outputVariables" => {
                config.output_variables = parse_name_list(*line_no, &value)?;
            }
            "fluids" => {
                config.fluids = parse_records(*line_no, &value)?
                    .into_iter()
                    .map(|r| build_fluid(*line_no, r))
                    .collect::<Result<_, _>>()?;
            }
            "initialConditions" => {
                config.initial_conditions = parse_records(*line_no, &value)?
                    .into_iter()
                    .map(|r| build_initial_condition(*line_no, r))
                    .collect::<Result<_, _>>()?;
            }
            "boundaryStates" => {
                config.boundary_states = parse_records(*line_no, &value)?
                    .into_iter()
                    .map(|r| build_boundary_state(*line_no, r))
                    .collect::<Result<_, _>>()?;
            }
            "boundaryConditions" => {
                let num_blocks = parse_usize(*line_no, key, &value)?;
                idx = parse_boundary_conditions(&lines, idx + 1, num_blocks, &mut config)?;
                continue;
            }
            _ => {
                return Err(ConfigError::parse(
                    *line_no,
                    format!("无法识别的选项 '{key}'"),
                ));
            }
        }
        idx += 1;
    }

    Ok(config)
}

// ============================================================
// 基础解析
// ============================================================

fn split_key_value(line_no: usize, line: &str) -> Result<(&str, &str), ConfigError> {
    let pos = line
        .find(':')
        .ok_or_else(|| ConfigError::parse(line_no, "缺少 ':' 分隔符"))?;
    Ok((line[..pos].trim(), line[pos + 1..].trim()))
}

fn parse_f64(line_no: usize, key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::parse(line_no, format!("选项 {key} 需要数值, 得到 '{value}'")))
}

fn parse_usize(line_no: usize, key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::parse(line_no, format!("选项 {key} 需要非负整数, 得到 '{value}'")))
}

fn brackets_closed(value: &str) -> bool {
    let open = value.matches('[').count();
    let close = value.matches(']').count();
    open <= close
}

/// 解析 `[a, b, c]` 形式的名字列表
fn parse_name_list(line_no: usize, value: &str) -> Result<Vec<String>, ConfigError> {
    let inner = strip_brackets(line_no, value)?;
    Ok(inner
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn strip_brackets<'a>(line_no: usize, value: &'a str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if !value.starts_with('[') || !value.ends_with(']') {
        return Err(ConfigError::parse(line_no, "期望方括号列表"));
    }
    Ok(&value[1..value.len() - 1])
}

// ============================================================
// 复合记录
// ============================================================

/// 已解析的复合记录: 名称 + 键值对
struct Record {
    name: String,
    fields: HashMap<String, String>,
}

/// 解析 `[name(k=v; k=[..]), name(..)]`
fn parse_records(line_no: usize, value: &str) -> Result<Vec<Record>, ConfigError> {
    let inner = strip_brackets(line_no, value)?;
    let mut records = Vec::new();
    for chunk in split_top_level(inner, ',') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        let open = chunk
            .find('(')
            .ok_or_else(|| ConfigError::parse(line_no, format!("记录缺少 '(': {chunk}")))?;
        if !chunk.ends_with(')') {
            return Err(ConfigError::parse(line_no, format!("记录缺少 ')': {chunk}")));
        }
        let name = chunk[..open].trim().to_string();
        let body = &chunk[open + 1..chunk.len() - 1];
        let mut fields = HashMap::new();
        for field in split_top_level(body, ';') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let eq = field
                .find('=')
                .ok_or_else(|| ConfigError::parse(line_no, format!("字段缺少 '=': {field}")))?;
            fields.insert(
                field[..eq].trim().to_string(),
                field[eq + 1..].trim().to_string(),
            );
        }
        records.push(Record { name, fields });
    }
    Ok(records)
}

/// 按分隔符切分，但忽略括号与方括号内部
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

impl Record {
    fn f64(&self, line_no: usize, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.fields.get(key) {
            Some(v) => parse_f64(line_no, key, v).map(Some),
            None => Ok(None),
        }
    }

    fn f64_or(&self, line_no: usize, key: &str, default: f64) -> Result<f64, ConfigError> {
        Ok(self.f64(line_no, key)?.unwrap_or(default))
    }

    fn f64_required(&self, line_no: usize, key: &str) -> Result<f64, ConfigError> {
        self.f64(line_no, key)?
            .ok_or_else(|| ConfigError::parse(line_no, format!("记录 {} 缺少字段 {key}", self.name)))
    }

    fn i32_or(&self, line_no: usize, key: &str, default: i32) -> Result<i32, ConfigError> {
        match self.fields.get(key) {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::parse(line_no, format!("字段 {key} 需要整数"))),
            None => Ok(default),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.fields
            .get(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(default)
    }

    fn vec3(&self, line_no: usize, key: &str) -> Result<Option<DVec3>, ConfigError> {
        match self.fields.get(key) {
            Some(v) => {
                let inner = strip_brackets(line_no, v)?;
                let parts: Vec<f64> = inner
                    .split(',')
                    .map(|p| parse_f64(line_no, key, p.trim()))
                    .collect::<Result<_, _>>()?;
                if parts.len() != 3 {
                    return Err(ConfigError::parse(line_no, format!("字段 {key} 需要 3 个分量")));
                }
                Ok(Some(DVec3::new(parts[0], parts[1], parts[2])))
            }
            None => Ok(None),
        }
    }

    fn f64_list(&self, line_no: usize, key: &str) -> Result<Vec<f64>, ConfigError> {
        match self.fields.get(key) {
            Some(v) => {
                let inner = strip_brackets(line_no, v)?;
                inner
                    .split(',')
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| parse_f64(line_no, key, p.trim()))
                    .collect()
            }
            None => Ok(Vec::new()),
        }
    }
}

fn build_fluid(line_no: usize, r: Record) -> Result<FluidSpec, ConfigError> {
    if r.name != "fluid" {
        return Err(ConfigError::parse(line_no, format!("期望 fluid 记录, 得到 {}", r.name)));
    }
    let defaults = FluidSpec::air();
    Ok(FluidSpec {
        name: r
            .fields
            .get("name")
            .cloned()
            .ok_or_else(|| ConfigError::parse(line_no, "fluid 记录缺少 name"))?,
        mass_fraction: r.f64_or(line_no, "massFraction", 1.0)?,
        molar_mass: r.f64_or(line_no, "molarMass", defaults.molar_mass)?,
        gamma: r.f64_or(line_no, "gamma", defaults.gamma)?,
        sutherland_c1: r.f64_or(line_no, "sutherlandC1", defaults.sutherland_c1)?,
        sutherland_s: r.f64_or(line_no, "sutherlandS", defaults.sutherland_s)?,
    })
}

fn build_initial_condition(line_no: usize, r: Record) -> Result<InitialConditionSpec, ConfigError> {
    match r.name.as_str() {
        "icState" => Ok(InitialConditionSpec::Uniform {
            tag: r.i32_or(line_no, "tag", -1)?,
            density: r.f64_required(line_no, "density")?,
            velocity: r
                .vec3(line_no, "velocity")?
                .ok_or_else(|| ConfigError::parse(line_no, "icState 缺少 velocity"))?,
            pressure: r.f64_required(line_no, "pressure")?,
            turb_intensity: r.f64_or(line_no, "turbulenceIntensity", 0.01)?,
            eddy_visc_ratio: r.f64_or(line_no, "eddyViscosityRatio", 10.0)?,
            mass_fractions: r.f64_list(line_no, "massFractions")?,
        }),
        "icFile" => Ok(InitialConditionSpec::CloudFile {
            tag: r.i32_or(line_no, "tag", -1)?,
            file: r
                .fields
                .get("file")
                .cloned()
                .ok_or_else(|| ConfigError::parse(line_no, "icFile 缺少 file"))?,
        }),
        other => Err(ConfigError::parse(line_no, format!("无法识别的初始条件 '{other}'"))),
    }
}

fn build_boundary_state(line_no: usize, r: Record) -> Result<BoundaryStateSpec, ConfigError> {
    let tag = r.i32_or(line_no, "tag", 0)?;
    match r.name.as_str() {
        "viscousWall" => Ok(BoundaryStateSpec::ViscousWall {
            tag,
            temperature: r.f64(line_no, "temperature")?,
            heat_flux: r.f64_or(line_no, "heatFlux", 0.0)?,
            velocity: r.vec3(line_no, "velocity")?.unwrap_or(DVec3::ZERO),
            wall_law: r.bool_or("wallLaw", false),
        }),
        "stagnationInlet" => Ok(BoundaryStateSpec::StagnationInlet {
            tag,
            p0: r.f64_required(line_no, "p0")?,
            t0: r.f64_required(line_no, "t0")?,
            direction: r
                .vec3(line_no, "direction")?
                .ok_or_else(|| ConfigError::parse(line_no, "stagnationInlet 缺少 direction"))?
                .normalize(),
            turb_intensity: r.f64_or(line_no, "turbulenceIntensity", 0.01)?,
            eddy_visc_ratio: r.f64_or(line_no, "eddyViscosityRatio", 10.0)?,
        }),
        "pressureOutlet" => Ok(BoundaryStateSpec::PressureOutlet {
            tag,
            pressure: r.f64_required(line_no, "pressure")?,
            nonreflecting: r.bool_or("nonreflecting", false),
            length_scale: r.f64_or(line_no, "lengthScale", 1.0)?,
        }),
        "characteristic" | "supersonicInflow" => Ok(BoundaryStateSpec::FreestreamState {
            tag,
            density: r.f64_required(line_no, "density")?,
            velocity: r
                .vec3(line_no, "velocity")?
                .ok_or_else(|| ConfigError::parse(line_no, format!("{} 缺少 velocity", r.name)))?,
            pressure: r.f64_required(line_no, "pressure")?,
            turb_intensity: r.f64_or(line_no, "turbulenceIntensity", 0.01)?,
            eddy_visc_ratio: r.f64_or(line_no, "eddyViscosityRatio", 10.0)?,
            mass_fractions: r.f64_list(line_no, "massFractions")?,
        }),
        other => Err(ConfigError::parse(line_no, format!("无法识别的边界状态 '{other}'"))),
    }
}

// ============================================================
// boundaryConditions 块
// ============================================================

fn parse_boundary_conditions(
    lines: &[(usize, String)],
    mut idx: usize,
    num_blocks: usize,
    config: &mut SolverConfig,
) -> Result<usize, ConfigError> {
    for _ in 0..num_blocks {
        let (line_no, counts_line) = lines
            .get(idx)
            .ok_or_else(|| ConfigError::Missing("boundaryConditions 块描述".to_string()))?;
        let counts: Vec<usize> = counts_line
            .split_whitespace()
            .map(|t| parse_usize(*line_no, "surfaceCounts", t))
            .collect::<Result<_, _>>()?;
        if counts.len() != 3 {
            return Err(ConfigError::parse(*line_no, "期望 3 个面片计数"));
        }
        let total = counts[0] + counts[1] + counts[2];
        idx += 1;

        let mut surfaces = Vec::with_capacity(total);
        for _ in 0..total {
            let (line_no, surf_line) = lines
                .get(idx)
                .ok_or_else(|| ConfigError::Missing("boundaryConditions 面片行".to_string()))?;
            let tokens: Vec<&str> = surf_line.split_whitespace().collect();
            if tokens.len() != 8 {
                return Err(ConfigError::parse(*line_no, "面片行需要 8 个字段"));
            }
            let kind = BcKind::from_str(tokens[0])?;
            let nums: Vec<usize> = tokens[1..7]
                .iter()
                .map(|t| parse_usize(*line_no, "surfaceRange", t))
                .collect::<Result<_, _>>()?;
            let tag: i32 = tokens[7]
                .parse()
                .map_err(|_| ConfigError::parse(*line_no, "面片标签需要整数"))?;
            surfaces.push(SurfaceSpec {
                kind,
                i_range: [nums[0], nums[1]],
                j_range: [nums[2], nums[3]],
                k_range: [nums[4], nums[5]],
                tag,
            });
            idx += 1;
        }
        config.boundary_conditions.push(surfaces);
    }
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{EquationSet, TimeIntegration};

    const SAMPLE: &str = r#"
# couette flow
gridName: couette
equationSet: navierStokes
timeIntegration: implicitEuler
cflStart: 1000.0
cflMax: 100000.0
iterations: 2000
faceReconstruction: thirdOrder
limiter: vanAlbada
referenceTemperature: 288.0
referenceDensity: 1.2256
fluids: [fluid(name=air)]
initialConditions: [icState(tag=-1; density=1.2256; velocity=[0, 0, 0]; pressure=101325)]
boundaryStates: [viscousWall(tag=1; temperature=288),
                 viscousWall(tag=2; temperature=289; velocity=[75.4, 0, 0])]
outputVariables: [density, vel_x, pressure, mach]
boundaryConditions: 1
2 2 2
viscousWall 0 0 0 4 0 2 1
viscousWall 64 64 0 4 0 2 2
periodic 0 64 0 0 0 2 3
periodic 0 64 4 4 0 2 4
slipWall 0 64 0 4 0 0 0
slipWall 0 64 0 4 2 2 0
"#;

    #[test]
    fn test_parse_sample_input() {
        let cfg = parse_input(SAMPLE).unwrap();
        assert_eq!(cfg.grid_name, "couette");
        assert_eq!(cfg.equation_set, EquationSet::NavierStokes);
        assert_eq!(cfg.time_integration, TimeIntegration::ImplicitEuler);
        assert_eq!(cfg.iterations, 2000);
        assert_eq!(cfg.fluids.len(), 1);
        assert_eq!(cfg.initial_conditions.len(), 1);
        assert_eq!(cfg.boundary_states.len(), 2);
        assert_eq!(cfg.output_variables.len(), 4);
        assert_eq!(cfg.boundary_conditions.len(), 1);
        assert_eq!(cfg.boundary_conditions[0].len(), 6);
        assert_eq!(cfg.boundary_conditions[0][0].kind, BcKind::ViscousWall);
        assert_eq!(cfg.boundary_conditions[0][0].tag, 1);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_multiline_boundary_states() {
        let cfg = parse_input(SAMPLE).unwrap();
        match &cfg.boundary_states[1] {
            BoundaryStateSpec::ViscousWall {
                tag,
                temperature,
                velocity,
                ..
            } => {
                assert_eq!(*tag, 2);
                assert_eq!(*temperature, Some(289.0));
                assert!((velocity.x - 75.4).abs() < 1e-12);
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = parse_input("frobnicate: 3\n").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_unknown_equation_set_rejected() {
        assert!(parse_input("equationSet: magnetohydrodynamics\n").is_err());
    }

    #[test]
    fn test_stagnation_inlet_record() {
        let text = r#"
equationSet: rans
turbulenceModel: kOmegaWilcox2006
boundaryStates: [stagnationInlet(tag=2; p0=117662.9; t0=302.4; direction=[1, 0, 0]),
                 pressureOutlet(tag=3; pressure=114426.9)]
"#;
        let cfg = parse_input(text).unwrap();
        match &cfg.boundary_states[0] {
            BoundaryStateSpec::StagnationInlet { p0, t0, direction, .. } => {
                assert!((p0 - 117662.9).abs() < 1e-9);
                assert!((t0 - 302.4).abs() < 1e-9);
                assert!((direction.x - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }
}
