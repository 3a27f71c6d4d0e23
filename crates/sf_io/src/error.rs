// crates/sf_io/src/error.rs

//! IO 层错误类型

use thiserror::Error;

/// IO 错误
#[derive(Debug, Error)]
pub enum IoError {
    /// 底层 IO 失败
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 文件格式不符
    #[error("格式错误: {0}")]
    Format(String),

    /// 无法识别的输出变量名
    #[error("无法识别的输出变量 '{0}'")]
    UnknownOutputVariable(String),

    /// 重启文件与当前算例不一致
    #[error("重启数据不匹配: {0}")]
    RestartMismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variable_message() {
        let err = IoError::UnknownOutputVariable("frobnitz".to_string());
        assert!(err.to_string().contains("frobnitz"));
    }
}
