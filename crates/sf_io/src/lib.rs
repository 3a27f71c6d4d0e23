// crates/sf_io/src/lib.rs

//! StratoFlow 文件 IO
//!
//! - [`plot3d_io`]: Plot3D 多块网格文件（小端二进制）
//! - [`function`]: 结果函数文件与输出变量注册表
//! - [`restart`]: 重启文件
//! - [`meta`]: Paraview 元数据（JSON）

pub mod error;
pub mod function;
pub mod meta;
pub mod plot3d_io;
pub mod restart;

pub use error::IoError;
