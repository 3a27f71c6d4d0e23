// crates/sf_physics/src/residual.rs

//! 残差范数
//!
//! 逐方程 L2（平方和 → 开方，按首迭代归一）与带位置的 L∞。
//! 跨块合并是平方和相加 / 取最大；跨进程归约沿用同一语义。

use serde::{Deserialize, Serialize};

use sf_foundation::Floors;

/// 逐方程 L2 残差
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidL2 {
    /// 各方程残差平方和
    sum_sq: Vec<f64>,
    /// 首迭代归一化向量
    norm: Option<Vec<f64>>,
}

impl ResidL2 {
    /// 创建
    pub fn new(num_equations: usize) -> Self {
        Self {
            sum_sq: vec![0.0; num_equations],
            norm: None,
        }
    }

    /// 清零（保留归一化向量）
    pub fn zero(&mut self) {
        self.sum_sq.fill(0.0);
    }

    /// 方程数
    #[inline]
    pub fn num_equations(&self) -> usize {
        self.sum_sq.len()
    }

    /// 累加一个单元的残差
    #[inline]
    pub fn add_cell(&mut self, resid: &[f64]) {
        debug_assert_eq!(resid.len(), self.sum_sq.len());
        for (s, r) in self.sum_sq.iter_mut().zip(resid) {
            *s += r * r;
        }
    }

    /// 合并另一份累积（跨块 / 跨进程求和语义）
    pub fn combine(&mut self, other: &ResidL2) {
        for (s, o) in self.sum_sq.iter_mut().zip(&other.sum_sq) {
            *s += o;
        }
    }

    /// 开方后的 L2 向量
    pub fn l2(&self) -> Vec<f64> {
        self.sum_sq.iter().map(|s| s.sqrt()).collect()
    }

    /// 以当前值设定归一化基准
    pub fn set_normalization(&mut self, floors: &Floors) {
        self.norm = Some(
            self.l2()
                .into_iter()
                .map(|v| v.max(floors.resid_eps))
                .collect(),
        );
    }

    /// 从重启数据恢复归一化基准
    pub fn restore_normalization(&mut self, norm: Vec<f64>) {
        self.norm = Some(norm);
    }

    /// 归一化基准
    pub fn normalization(&self) -> Option<&[f64]> {
        self.norm.as_deref()
    }

    /// 归一化后的 L2 向量（未设定基准时返回原值）
    pub fn normalized(&self) -> Vec<f64> {
        match &self.norm {
            Some(norm) => self
                .l2()
                .iter()
                .zip(norm)
                .map(|(v, n)| v / n)
                .collect(),
            None => self.l2(),
        }
    }
}

/// 带位置的 L∞ 残差
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidLinf {
    /// 最大残差绝对值
    pub value: f64,
    /// 所在块
    pub block: usize,
    /// 单元索引
    pub cell: (isize, isize, isize),
    /// 方程序号
    pub equation: usize,
}

impl Default for ResidLinf {
    fn default() -> Self {
        Self {
            value: 0.0,
            block: 0,
            cell: (0, 0, 0),
            equation: 0,
        }
    }
}

impl ResidLinf {
    /// 清零
    pub fn zero(&mut self) {
        *self = Self::default();
    }

    /// 用一个单元的残差挑战当前最大值
    pub fn update(&mut self, resid: &[f64], block: usize, cell: (isize, isize, isize)) {
        for (eq, r) in resid.iter().enumerate() {
            if r.abs() > self.value {
                self.value = r.abs();
                self.block = block;
                self.cell = cell;
                self.equation = eq;
            }
        }
    }

    /// 合并（跨进程取最大语义；胜者保留完整元组）
    pub fn combine(&mut self, other: &ResidLinf) {
        if other.value > self.value {
            *self = *other;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_accumulation() {
        let mut r = ResidL2::new(2);
        r.add_cell(&[3.0, 0.0]);
        r.add_cell(&[4.0, 1.0]);
        let l2 = r.l2();
        assert!((l2[0] - 5.0).abs() < 1e-14);
        assert!((l2[1] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_l2_combine_square_then_sqrt() {
        let mut a = ResidL2::new(1);
        a.add_cell(&[3.0]);
        let mut b = ResidL2::new(1);
        b.add_cell(&[4.0]);
        a.combine(&b);
        assert!((a.l2()[0] - 5.0).abs() < 1e-14);
    }

    #[test]
    fn test_l2_normalization() {
        let floors = Floors::default();
        let mut r = ResidL2::new(1);
        r.add_cell(&[2.0]);
        r.set_normalization(&floors);
        r.zero();
        r.add_cell(&[1.0]);
        assert!((r.normalized()[0] - 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_linf_keeps_winning_tuple() {
        let mut a = ResidLinf::default();
        a.update(&[0.1, -0.5], 2, (1, 2, 3));
        assert_eq!(a.value, 0.5);
        assert_eq!(a.block, 2);
        assert_eq!(a.equation, 1);

        let mut b = ResidLinf::default();
        b.update(&[0.7], 4, (0, 0, 0));
        a.combine(&b);
        assert_eq!(a.value, 0.7);
        assert_eq!(a.block, 4);
    }
}
