// crates/sf_physics/src/error.rs

//! 物理层错误类型

use thiserror::Error;

/// 物理层错误
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// 非物理状态（重构或更新后）
    #[error("非物理状态: 块 {block} 单元 ({i}, {j}, {k}) {field} = {value:e}")]
    NonphysicalState {
        /// 块序号
        block: usize,
        /// 单元索引
        i: isize,
        /// 单元索引
        j: isize,
        /// 单元索引
        k: isize,
        /// 出错的量
        field: &'static str,
        /// 出错的值
        value: f64,
    },

    /// 壁面距离超出容差的负值
    #[error("壁面距离为负: 块 {block} 单元 ({i}, {j}, {k}) 距离 {value:e}")]
    NegativeWallDistance {
        /// 块序号
        block: usize,
        /// 单元索引
        i: isize,
        /// 单元索引
        j: isize,
        /// 单元索引
        k: isize,
        /// 距离值
        value: f64,
    },

    /// 点云文件不可用或为空
    #[error("点云初始条件无效: {0}")]
    CloudFile(String),

    /// 网格层错误
    #[error(transparent)]
    Grid(#[from] sf_grid::GridError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] sf_config::ConfigError),
}

impl PhysicsError {
    /// 创建非物理状态错误
    pub fn nonphysical(
        block: usize,
        cell: (isize, isize, isize),
        field: &'static str,
        value: f64,
    ) -> Self {
        Self::NonphysicalState {
            block,
            i: cell.0,
            j: cell.1,
            k: cell.2,
            field,
            value,
        }
    }
}
