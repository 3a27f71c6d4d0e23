// crates/sf_config/src/error.rs

//! 配置层错误类型

use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误 (行 {line}): {message}")]
    Parse {
        /// 行号（从 1 开始）
        line: usize,
        /// 错误说明
        message: String,
    },

    /// 无法识别的选项值
    #[error("无法识别的值 '{value}' (选项 {key})")]
    UnknownValue {
        /// 配置键
        key: &'static str,
        /// 配置值
        value: String,
    },

    /// 无效值
    #[error("无效值 '{key}': {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),

    /// 重启文件与当前配置不一致
    #[error("重启数据不匹配: {0}")]
    RestartMismatch(String),
}

impl ConfigError {
    /// 创建解析错误
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// 创建无效值错误
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_contains_key() {
        let err = ConfigError::UnknownValue {
            key: "equationSet",
            value: "mhd".to_string(),
        };
        assert!(err.to_string().contains("equationSet"));
        assert!(err.to_string().contains("mhd"));
    }
}
