// crates/sf_grid/src/array3d.rs

//! 带幽灵层的三维跨步容器
//!
//! 逻辑索引空间分为物理范围 [0, nI)×[0, nJ)×[0, nK) 与厚度 G 的幽灵环，
//! 幽灵单元以负索引或 ≥ n 的索引寻址。存储为一维 Vec，i 最快、k 最慢。
//!
//! [`Array3D`] 承载任意单元类型；[`VarArray3D`] 为每个单元附带
//! 定长方程块的 f64 容器（状态、残差、解更新等）。
//!
//! 不同实例之间不存在别名；切片交换通过显式拷贝完成。

use serde::{Deserialize, Serialize};

// ============================================================
// 矩形子范围
// ============================================================

/// 矩形子范围 `[start, end)`，允许伸入幽灵环
///
/// "边" 切片可以同时伸入两个幽灵环；角部幽灵不要求有效数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRange {
    /// i 方向 [start, end)
    pub i: (isize, isize),
    /// j 方向 [start, end)
    pub j: (isize, isize),
    /// k 方向 [start, end)
    pub k: (isize, isize),
}

impl SliceRange {
    /// 创建范围
    pub fn new(i: (isize, isize), j: (isize, isize), k: (isize, isize)) -> Self {
        Self { i, j, k }
    }

    /// 各方向尺寸
    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (
            (self.i.1 - self.i.0).max(0) as usize,
            (self.j.1 - self.j.0).max(0) as usize,
            (self.k.1 - self.k.0).max(0) as usize,
        )
    }

    /// 单元总数
    #[inline]
    pub fn len(&self) -> usize {
        let (ni, nj, nk) = self.dims();
        ni * nj * nk
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按 i 最快的顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (isize, isize, isize)> + '_ {
        let r = *self;
        (r.k.0..r.k.1).flat_map(move |kk| {
            (r.j.0..r.j.1).flat_map(move |jj| (r.i.0..r.i.1).map(move |ii| (ii, jj, kk)))
        })
    }
}

// ============================================================
// Array3D
// ============================================================

/// 带幽灵层的三维容器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array3D<T> {
    ni: usize,
    nj: usize,
    nk: usize,
    ghosts: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Array3D<T> {
    /// 创建默认值填充的容器
    pub fn new(ni: usize, nj: usize, nk: usize, ghosts: usize) -> Self {
        let total = (ni + 2 * ghosts) * (nj + 2 * ghosts) * (nk + 2 * ghosts);
        Self {
            ni,
            nj,
            nk,
            ghosts,
            data: vec![T::default(); total],
        }
    }

    /// 创建给定值填充的容器
    pub fn filled(ni: usize, nj: usize, nk: usize, ghosts: usize, value: T) -> Self {
        let total = (ni + 2 * ghosts) * (nj + 2 * ghosts) * (nk + 2 * ghosts);
        Self {
            ni,
            nj,
            nk,
            ghosts,
            data: vec![value; total],
        }
    }

    /// 清空并重设尺寸
    pub fn clear_resize(&mut self, ni: usize, nj: usize, nk: usize, ghosts: usize) {
        *self = Self::new(ni, nj, nk, ghosts);
    }

    /// 全体填充
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Array3D<T> {
    /// 物理 i 方向单元数
    #[inline]
    pub fn ni(&self) -> usize {
        self.ni
    }

    /// 物理 j 方向单元数
    #[inline]
    pub fn nj(&self) -> usize {
        self.nj
    }

    /// 物理 k 方向单元数
    #[inline]
    pub fn nk(&self) -> usize {
        self.nk
    }

    /// 幽灵层厚度
    #[inline]
    pub fn ghosts(&self) -> usize {
        self.ghosts
    }

    /// 物理单元总数
    #[inline]
    pub fn num_physical(&self) -> usize {
        self.ni * self.nj * self.nk
    }

    /// 含幽灵的存储总数
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn stride_j(&self) -> usize {
        self.ni + 2 * self.ghosts
    }

    #[inline]
    fn stride_k(&self) -> usize {
        (self.ni + 2 * self.ghosts) * (self.nj + 2 * self.ghosts)
    }

    /// 线性偏移；索引允许在 [-G, n+G)
    #[inline]
    fn offset(&self, i: isize, j: isize, k: isize) -> usize {
        let g = self.ghosts as isize;
        debug_assert!(i >= -g && i < self.ni as isize + g, "i 越界: {i}");
        debug_assert!(j >= -g && j < self.nj as isize + g, "j 越界: {j}");
        debug_assert!(k >= -g && k < self.nk as isize + g, "k 越界: {k}");
        ((i + g) as usize) + ((j + g) as usize) * self.stride_j() + ((k + g) as usize) * self.stride_k()
    }

    /// 单元访问
    #[inline]
    pub fn get(&self, i: isize, j: isize, k: isize) -> &T {
        &self.data[self.offset(i, j, k)]
    }

    /// 可变单元访问
    #[inline]
    pub fn get_mut(&mut self, i: isize, j: isize, k: isize) -> &mut T {
        let off = self.offset(i, j, k);
        &mut self.data[off]
    }

    /// 索引是否落在物理范围
    #[inline]
    pub fn is_physical(&self, i: isize, j: isize, k: isize) -> bool {
        i >= 0
            && i < self.ni as isize
            && j >= 0
            && j < self.nj as isize
            && k >= 0
            && k < self.nk as isize
    }

    /// 索引是否在含幽灵的寻址范围内
    #[inline]
    pub fn in_range(&self, i: isize, j: isize, k: isize) -> bool {
        let g = self.ghosts as isize;
        i >= -g
            && i < self.ni as isize + g
            && j >= -g
            && j < self.nj as isize + g
            && k >= -g
            && k < self.nk as isize + g
    }

    /// 物理范围
    pub fn phys_range(&self) -> SliceRange {
        SliceRange::new(
            (0, self.ni as isize),
            (0, self.nj as isize),
            (0, self.nk as isize),
        )
    }

    /// 含幽灵的完整范围
    pub fn full_range(&self) -> SliceRange {
        let g = self.ghosts as isize;
        SliceRange::new(
            (-g, self.ni as isize + g),
            (-g, self.nj as isize + g),
            (-g, self.nk as isize + g),
        )
    }
}

impl<T: Clone + Default> Array3D<T> {
    /// 取出矩形切片（拷贝）
    pub fn slice(&self, range: SliceRange) -> Array3D<T> {
        let (ni, nj, nk) = range.dims();
        let mut out = Array3D::new(ni, nj, nk, 0);
        for (n, (ii, jj, kk)) in range.iter().enumerate() {
            out.data[n] = self.get(ii, jj, kk).clone();
        }
        out
    }

    /// 将切片写入矩形范围；切片按 i 最快顺序展开
    ///
    /// # Panics
    ///
    /// 切片尺寸与范围不匹配时 panic（调用方负责形状协商）。
    pub fn insert(&mut self, range: SliceRange, slice: &Array3D<T>) {
        assert_eq!(range.len(), slice.num_physical(), "切片尺寸不匹配");
        for (n, (ii, jj, kk)) in range.iter().enumerate() {
            *self.get_mut(ii, jj, kk) = slice.data[n].clone();
        }
    }

    /// 交换两个容器中形状相同的切片
    pub fn swap_slices(
        a: &mut Array3D<T>,
        range_a: SliceRange,
        b: &mut Array3D<T>,
        range_b: SliceRange,
    ) {
        assert_eq!(range_a.len(), range_b.len(), "交换切片尺寸不匹配");
        let slice_a = a.slice(range_a);
        let slice_b = b.slice(range_b);
        a.insert(range_a, &slice_b);
        b.insert(range_b, &slice_a);
    }
}

// ============================================================
// VarArray3D: 每单元定长方程块
// ============================================================

/// 每个单元携带定长 f64 方程块的三维容器
///
/// 状态、残差、解更新等都使用这一布局；块内索引 b 为方程序号。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarArray3D {
    ni: usize,
    nj: usize,
    nk: usize,
    ghosts: usize,
    block_size: usize,
    data: Vec<f64>,
}

impl VarArray3D {
    /// 创建零初始化容器
    pub fn new(ni: usize, nj: usize, nk: usize, ghosts: usize, block_size: usize) -> Self {
        let total = (ni + 2 * ghosts) * (nj + 2 * ghosts) * (nk + 2 * ghosts) * block_size;
        Self {
            ni,
            nj,
            nk,
            ghosts,
            block_size,
            data: vec![0.0; total],
        }
    }

    /// 物理 i 方向单元数
    #[inline]
    pub fn ni(&self) -> usize {
        self.ni
    }

    /// 物理 j 方向单元数
    #[inline]
    pub fn nj(&self) -> usize {
        self.nj
    }

    /// 物理 k 方向单元数
    #[inline]
    pub fn nk(&self) -> usize {
        self.nk
    }

    /// 幽灵层厚度
    #[inline]
    pub fn ghosts(&self) -> usize {
        self.ghosts
    }

    /// 方程块大小
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    fn offset(&self, i: isize, j: isize, k: isize) -> usize {
        let g = self.ghosts as isize;
        debug_assert!(i >= -g && i < self.ni as isize + g, "i 越界: {i}");
        debug_assert!(j >= -g && j < self.nj as isize + g, "j 越界: {j}");
        debug_assert!(k >= -g && k < self.nk as isize + g, "k 越界: {k}");
        let sj = self.ni + 2 * self.ghosts;
        let sk = sj * (self.nj + 2 * self.ghosts);
        (((i + g) as usize) + ((j + g) as usize) * sj + ((k + g) as usize) * sk) * self.block_size
    }

    /// 单元的方程块
    #[inline]
    pub fn cell(&self, i: isize, j: isize, k: isize) -> &[f64] {
        let off = self.offset(i, j, k);
        &self.data[off..off + self.block_size]
    }

    /// 可变方程块
    #[inline]
    pub fn cell_mut(&mut self, i: isize, j: isize, k: isize) -> &mut [f64] {
        let off = self.offset(i, j, k);
        &mut self.data[off..off + self.block_size]
    }

    /// 单个分量
    #[inline]
    pub fn at(&self, i: isize, j: isize, k: isize, b: usize) -> f64 {
        debug_assert!(b < self.block_size);
        self.data[self.offset(i, j, k) + b]
    }

    /// 写入单个分量
    #[inline]
    pub fn set(&mut self, i: isize, j: isize, k: isize, b: usize, value: f64) {
        debug_assert!(b < self.block_size);
        let off = self.offset(i, j, k) + b;
        self.data[off] = value;
    }

    /// 写入整个方程块
    #[inline]
    pub fn insert_cell(&mut self, i: isize, j: isize, k: isize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.block_size);
        let off = self.offset(i, j, k);
        self.data[off..off + self.block_size].copy_from_slice(values);
    }

    /// 方程块累加
    #[inline]
    pub fn add_to_cell(&mut self, i: isize, j: isize, k: isize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.block_size);
        let off = self.offset(i, j, k);
        for (d, v) in self.data[off..off + self.block_size].iter_mut().zip(values) {
            *d += v;
        }
    }

    /// 方程块减法
    #[inline]
    pub fn subtract_from_cell(&mut self, i: isize, j: isize, k: isize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.block_size);
        let off = self.offset(i, j, k);
        for (d, v) in self.data[off..off + self.block_size].iter_mut().zip(values) {
            *d -= v;
        }
    }

    /// 全体清零
    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    /// 物理范围
    pub fn phys_range(&self) -> SliceRange {
        SliceRange::new(
            (0, self.ni as isize),
            (0, self.nj as isize),
            (0, self.nk as isize),
        )
    }

    /// 取出矩形切片（拷贝，结果不带幽灵层）
    pub fn slice(&self, range: SliceRange) -> VarArray3D {
        let (ni, nj, nk) = range.dims();
        let mut out = VarArray3D::new(ni, nj, nk, 0, self.block_size);
        for (n, (ii, jj, kk)) in range.iter().enumerate() {
            let off = n * self.block_size;
            out.data[off..off + self.block_size].copy_from_slice(self.cell(ii, jj, kk));
        }
        out
    }

    /// 将切片写入矩形范围
    pub fn insert(&mut self, range: SliceRange, slice: &VarArray3D) {
        assert_eq!(range.len(), slice.ni * slice.nj * slice.nk, "切片尺寸不匹配");
        assert_eq!(self.block_size, slice.block_size, "方程块大小不匹配");
        for (n, (ii, jj, kk)) in range.iter().enumerate() {
            let off = n * self.block_size;
            self.insert_cell(ii, jj, kk, &slice.data[off..off + self.block_size]);
        }
    }

    /// 底层数据（测试与 IO 用）
    pub fn raw(&self) -> &[f64] {
        &self.data
    }
}
