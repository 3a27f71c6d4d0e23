// crates/sf_physics/src/parallel.rs

//! 并行分解与归约语义
//!
//! 每个块归属一个 rank；rank 相同的连接两侧就地交换切片，
//! 跨 rank 的路径沿同一有序遍历（全局块位置升序，避免死锁）。
//! 单进程运行时所有块同属 rank 0，归约退化为本地折叠。

use serde::{Deserialize, Serialize};

/// 块到 rank 的分解
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    rank_of: Vec<usize>,
    local_pos: Vec<usize>,
    num_ranks: usize,
}

impl Decomposition {
    /// 全部块落在 rank 0（单进程）
    pub fn single(num_blocks: usize) -> Self {
        Self {
            rank_of: vec![0; num_blocks],
            local_pos: (0..num_blocks).collect(),
            num_ranks: 1,
        }
    }

    /// 指定每块的 rank
    pub fn from_ranks(rank_of: Vec<usize>) -> Self {
        let num_ranks = rank_of.iter().copied().max().map_or(1, |m| m + 1);
        let mut counters = vec![0usize; num_ranks];
        let local_pos = rank_of
            .iter()
            .map(|&r| {
                let p = counters[r];
                counters[r] += 1;
                p
            })
            .collect();
        Self {
            rank_of,
            local_pos,
            num_ranks,
        }
    }

    /// 块数
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.rank_of.len()
    }

    /// rank 数
    #[inline]
    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// 块的 rank
    #[inline]
    pub fn rank(&self, block: usize) -> usize {
        self.rank_of[block]
    }

    /// 块在其 rank 内的局部序号
    #[inline]
    pub fn local_position(&self, block: usize) -> usize {
        self.local_pos[block]
    }

    /// rank 上的块，按全局位置升序（发送顺序保证）
    pub fn blocks_on_rank(&self, rank: usize) -> Vec<usize> {
        (0..self.num_blocks())
            .filter(|&b| self.rank_of[b] == rank)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_rank() {
        let d = Decomposition::single(3);
        assert_eq!(d.num_ranks(), 1);
        assert_eq!(d.rank(2), 0);
        assert_eq!(d.local_position(2), 2);
        assert_eq!(d.blocks_on_rank(0), vec![0, 1, 2]);
    }

    #[test]
    fn test_from_ranks_ascending_order() {
        let d = Decomposition::from_ranks(vec![1, 0, 1, 0]);
        assert_eq!(d.num_ranks(), 2);
        assert_eq!(d.blocks_on_rank(1), vec![0, 2]);
        assert_eq!(d.local_position(2), 1);
        assert_eq!(d.local_position(3), 1);
    }
}
