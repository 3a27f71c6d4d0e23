// crates/sf_io/src/meta.rs

//! Paraview 元数据
//!
//! `<runName>[_center|_wall_center].p3d`：JSON 对象，描述网格 /
//! 函数文件对与变量名表。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::function::OutputLocation;

/// 一个输出时刻的文件对
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaEntry {
    /// 迭代号（时间精确模式下为时刻）
    pub time: usize,
    /// 网格文件名
    pub xyz: String,
    /// 函数文件名
    pub function: String,
}

/// Paraview 元数据文档
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDocument {
    #[serde(rename = "auto-detect-format")]
    auto_detect_format: bool,
    format: String,
    language: String,
    /// 输出文件对
    pub filenames: Vec<MetaEntry>,
    /// 变量名表
    #[serde(rename = "function-names")]
    pub function_names: Vec<String>,
}

impl MetaDocument {
    /// 创建
    pub fn new(filenames: Vec<MetaEntry>, function_names: Vec<String>) -> Self {
        Self {
            auto_detect_format: true,
            format: "binary".to_string(),
            language: "C".to_string(),
            filenames,
            function_names,
        }
    }
}

/// 写出元数据文件
pub fn write_meta(
    dir: &Path,
    run_name: &str,
    grid_name: &str,
    iterations: &[usize],
    names: &[String],
    location: OutputLocation,
) -> Result<(), IoError> {
    let suffix = location.suffix();
    let entries = iterations
        .iter()
        .map(|it| MetaEntry {
            time: *it,
            xyz: format!("{grid_name}.xyz"),
            function: format!("{run_name}_{it}{suffix}.fun"),
        })
        .collect();
    let doc = MetaDocument::new(entries, names.to_vec());
    let path = dir.join(format!("{run_name}{suffix}.p3d"));
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| IoError::Format(format!("元数据序列化失败: {e}")))?;
    std::fs::write(path, json)?;
    Ok(())
}
