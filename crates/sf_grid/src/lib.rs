// crates/sf_grid/src/lib.rs

//! StratoFlow 网格层
//!
//! 多块结构网格的容器与几何：
//! - [`array3d`]: 带幽灵层的三维跨步容器
//! - [`plot3d`]: 节点坐标块与金字塔体积分解
//! - [`geometry`]: 派生几何量（体积、面积矢量、中心、宽度）
//! - [`boundary`]: 边界面片与逐块边界表
//! - [`connection`]: 块间连接与朝向变换

pub mod array3d;
pub mod boundary;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod plot3d;

pub use array3d::{Array3D, SliceRange, VarArray3D};
pub use boundary::{BlockBoundaries, BoundarySurface, SurfaceClass};
pub use connection::{
    find_connections, swap_geometry, swap_geometry_deferred, CellPair, Connection, DeferredEdge,
    Orientation, PatchSide,
};
pub use error::GridError;
pub use geometry::{AreaVec, BlockGeometry, Direction, Side};
pub use plot3d::NodeBlock;
