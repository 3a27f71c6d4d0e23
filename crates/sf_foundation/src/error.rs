// crates/sf_foundation/src/error.rs

//! 基础错误类型
//!
//! 定义基础设施级别的错误，是错误体系的根基。
//! 高层错误（配置、网格、物理）各自定义专用类型，最终在应用层汇聚。

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型别名
pub type SfResult<T> = Result<T, SfError>;

/// 基础层错误
#[derive(Debug, Error)]
pub enum SfError {
    /// IO 操作失败
    #[error("IO 错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 底层 IO 错误源
        #[source]
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的文件路径
        path: PathBuf,
    },

    /// 数组或集合大小不匹配
    #[error("数组大小不匹配: {name} 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引访问越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别（如 "Cell", "Face"）
        index_type: &'static str,
        /// 访问的索引值
        index: usize,
        /// 容器长度
        len: usize,
    },

    /// 输入数据验证失败
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 内部实现错误，通常表示不变量被破坏
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

impl SfError {
    /// 创建 IO 错误
    #[inline]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带源的 IO 错误
    #[inline]
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 创建文件未找到错误
    #[inline]
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 创建大小不匹配错误
    #[inline]
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 创建无效输入错误
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建内部错误
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 验证数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> SfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 验证索引是否在有效范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> SfResult<()> {
        if index >= len {
            Err(Self::IndexOutOfBounds {
                index_type,
                index,
                len,
            })
        } else {
            Ok(())
        }
    }
}

impl From<std::io::Error> for SfError {
    fn from(err: std::io::Error) -> Self {
        Self::io_with_source("IO 操作失败", err)
    }
}
