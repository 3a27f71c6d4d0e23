// crates/sf_io/src/plot3d_io.rs

//! Plot3D 多块网格文件
//!
//! 小端二进制：int32 块数；每块 int32 nI, nJ, nK（节点数）；
//! 随后逐块写 nI·nJ·nK 个 X 坐标 double、再全部 Y、再全部 Z，
//! i 最快。

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::DVec3;

use sf_grid::NodeBlock;

use crate::error::IoError;

fn read_i32<R: Read>(r: &mut R) -> Result<i32, IoError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64_vec<R: Read>(r: &mut R, count: usize) -> Result<Vec<f64>, IoError> {
    let mut bytes = vec![0u8; count * 8];
    r.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().expect("chunk is 8 bytes")))
        .collect())
}

/// 读取网格文件，坐标按参考长度换算为无量纲
pub fn read_grid(path: &Path, l_ref: f64) -> Result<Vec<NodeBlock>, IoError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_blocks = read_i32(&mut reader)?;
    if num_blocks <= 0 {
        return Err(IoError::Format(format!("非法块数 {num_blocks}")));
    }

    let mut dims = Vec::with_capacity(num_blocks as usize);
    for _ in 0..num_blocks {
        let ni = read_i32(&mut reader)?;
        let nj = read_i32(&mut reader)?;
        let nk = read_i32(&mut reader)?;
        if ni < 2 || nj < 2 || nk < 2 {
            return Err(IoError::Format(format!("非法块尺寸 {ni}x{nj}x{nk}")));
        }
        dims.push((ni as usize, nj as usize, nk as usize));
    }

    let mut blocks = Vec::with_capacity(dims.len());
    for (ni, nj, nk) in dims {
        let count = ni * nj * nk;
        let xs = read_f64_vec(&mut reader, count)?;
        let ys = read_f64_vec(&mut reader, count)?;
        let zs = read_f64_vec(&mut reader, count)?;

        let mut nb = NodeBlock::zeros(ni, nj, nk);
        let mut n = 0;
        for kk in 0..nk {
            for jj in 0..nj {
                for ii in 0..ni {
                    nb.set_node(
                        ii,
                        jj,
                        kk,
                        DVec3::new(xs[n], ys[n], zs[n]) / l_ref,
                    );
                    n += 1;
                }
            }
        }
        blocks.push(nb);
    }
    Ok(blocks)
}

/// 写出网格文件（坐标乘参考长度还原量纲）
pub fn write_grid(path: &Path, blocks: &[NodeBlock], l_ref: f64) -> Result<(), IoError> {
    let mut writer = BufWriter::new(File::create(path)?);

    writer.write_all(&(blocks.len() as i32).to_le_bytes())?;
    for nb in blocks {
        writer.write_all(&(nb.num_nodes_i() as i32).to_le_bytes())?;
        writer.write_all(&(nb.num_nodes_j() as i32).to_le_bytes())?;
        writer.write_all(&(nb.num_nodes_k() as i32).to_le_bytes())?;
    }
    for nb in blocks {
        for comp in 0..3 {
            let mut values =
                Vec::with_capacity(nb.num_nodes_i() * nb.num_nodes_j() * nb.num_nodes_k());
            for kk in 0..nb.num_nodes_k() {
                for jj in 0..nb.num_nodes_j() {
                    for ii in 0..nb.num_nodes_i() {
                        let p = nb.node(ii, jj, kk) * l_ref;
                        values.push([p.x, p.y, p.z][comp].to_le());
                    }
                }
            }
            writer.write_all(bytemuck::cast_slice(&values))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// f64 的小端位型转换（批量写出用）
trait ToLe {
    fn to_le(self) -> f64;
}

impl ToLe for f64 {
    #[inline]
    fn to_le(self) -> f64 {
        f64::from_bits(u64::to_le(self.to_bits()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_roundtrip() {
        let dir = std::env::temp_dir().join("sf_plot3d_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("grid.xyz");

        let blocks = vec![
            NodeBlock::cartesian((2, 3, 2), DVec3::ZERO, DVec3::ONE),
            NodeBlock::cartesian((4, 2, 2), DVec3::new(2.0, 0.0, 0.0), DVec3::splat(0.5)),
        ];
        write_grid(&path, &blocks, 1.0).unwrap();
        let loaded = read_grid(&path, 1.0).unwrap();
        assert_eq!(loaded.len(), 2);
        for (a, b) in blocks.iter().zip(&loaded) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_grid_nondimensionalization() {
        let dir = std::env::temp_dir().join("sf_plot3d_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("grid.xyz");

        let blocks = vec![NodeBlock::cartesian((2, 2, 2), DVec3::ZERO, DVec3::splat(2.0))];
        write_grid(&path, &blocks, 1.0).unwrap();
        let loaded = read_grid(&path, 2.0).unwrap();
        assert!((loaded[0].node(2, 2, 2) - DVec3::splat(2.0)).length() < 1e-14);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = std::env::temp_dir().join("sf_plot3d_test3");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.xyz");
        std::fs::write(&path, 5i32.to_le_bytes()).unwrap();
        assert!(read_grid(&path, 1.0).is_err());
    }
}
