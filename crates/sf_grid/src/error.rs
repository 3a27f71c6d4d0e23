// crates/sf_grid/src/error.rs

//! 网格层错误类型

use thiserror::Error;

/// 网格错误
#[derive(Debug, Error)]
pub enum GridError {
    /// 几何退化：非正体积或退化面
    #[error("几何错误: 块 {block} 单元 ({i}, {j}, {k}) {message}")]
    Geometry {
        /// 块序号
        block: usize,
        /// 单元索引
        i: isize,
        /// 单元索引
        j: isize,
        /// 单元索引
        k: isize,
        /// 具体描述
        message: String,
    },

    /// 块间连接不一致
    #[error("连接错误: {0}")]
    Connection(String),

    /// 块维度不匹配
    #[error("块维度不匹配: {context} 期望 {expected:?}, 实际 {actual:?}")]
    Dimension {
        /// 出错场景
        context: &'static str,
        /// 期望维度
        expected: (usize, usize, usize),
        /// 实际维度
        actual: (usize, usize, usize),
    },

    /// 切分位置非法
    #[error("切分位置非法: 方向 {dir} 索引 {index} (块大小 {size})")]
    InvalidSplit {
        /// 切分方向
        dir: char,
        /// 切分索引
        index: usize,
        /// 该方向单元数
        size: usize,
    },
}

impl GridError {
    /// 创建几何错误
    pub fn geometry(
        block: usize,
        i: isize,
        j: isize,
        k: isize,
        message: impl Into<String>,
    ) -> Self {
        Self::Geometry {
            block,
            i,
            j,
            k,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_error_names_cell() {
        let err = GridError::geometry(3, 1, 2, 4, "体积非正");
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("(1, 2, 4)"));
    }
}
