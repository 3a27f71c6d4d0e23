// crates/sf_physics/src/state.rs

//! 原始 / 守恒状态
//!
//! 单元状态的两种等价表示：
//! - [`Primitive`]: `[ρ_s…, u, v, w, P, (k, ω)]`
//! - [`Conserved`]: `[ρ_s…, ρu, ρv, ρw, ρE, (ρk, ρω)]`
//!
//! 两者间的转换经过状态方程能力完成，除质量分数与湍流变量的下限
//! 钳制外对机器精度无损。内联存储覆盖 ≤ 2 组分 + 5 流动 + 2 湍流。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use sf_foundation::Floors;

use crate::physics::Physics;

/// 状态向量内联容量
pub type StateVec = SmallVec<[f64; 8]>;

// ============================================================
// 布局
// ============================================================

/// 状态向量布局: [ρ_s…, 动量/速度 3, 能量/压力 1, 湍流 nt]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLayout {
    num_species: usize,
    num_turb: usize,
}

impl StateLayout {
    /// 创建布局
    #[inline]
    pub const fn new(num_species: usize, num_turb: usize) -> Self {
        Self {
            num_species,
            num_turb,
        }
    }

    /// 组分数
    #[inline]
    pub const fn num_species(&self) -> usize {
        self.num_species
    }

    /// 湍流方程数
    #[inline]
    pub const fn num_turb(&self) -> usize {
        self.num_turb
    }

    /// 方程总数
    #[inline]
    pub const fn size(&self) -> usize {
        self.num_species + 4 + self.num_turb
    }

    /// x 动量下标
    #[inline]
    pub const fn mx(&self) -> usize {
        self.num_species
    }

    /// y 动量下标
    #[inline]
    pub const fn my(&self) -> usize {
        self.num_species + 1
    }

    /// z 动量下标
    #[inline]
    pub const fn mz(&self) -> usize {
        self.num_species + 2
    }

    /// 能量（压力）下标
    #[inline]
    pub const fn energy(&self) -> usize {
        self.num_species + 3
    }

    /// 湍流块起始下标
    #[inline]
    pub const fn turb_index(&self) -> usize {
        self.num_species + 4
    }

    /// 是否携带湍流方程
    #[inline]
    pub const fn has_turbulence(&self) -> bool {
        self.num_turb > 0
    }
}

// ============================================================
// 原始状态
// ============================================================

/// 原始状态 `[ρ_s…, u, v, w, P, (k, ω)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    data: StateVec,
    num_species: usize,
}

impl Primitive {
    /// 零状态
    pub fn zeros(layout: StateLayout) -> Self {
        Self {
            data: smallvec::smallvec![0.0; layout.size()],
            num_species: layout.num_species(),
        }
    }

    /// 从切片构造
    pub fn from_slice(values: &[f64], num_species: usize) -> Self {
        Self {
            data: StateVec::from_slice(values),
            num_species,
        }
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> StateLayout {
        StateLayout::new(self.num_species, self.data.len() - self.num_species - 4)
    }

    /// 底层切片
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// 可变底层切片
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 组分密度
    #[inline]
    pub fn rho_n(&self, s: usize) -> f64 {
        self.data[s]
    }

    /// 总密度 Σρ_s
    #[inline]
    pub fn rho(&self) -> f64 {
        self.data[..self.num_species].iter().sum()
    }

    /// 组分密度切片
    #[inline]
    pub fn rho_vec(&self) -> &[f64] {
        &self.data[..self.num_species]
    }

    /// 组分质量分数
    #[inline]
    pub fn mass_fraction_n(&self, s: usize) -> f64 {
        self.rho_n(s) / self.rho()
    }

    /// 全部质量分数
    pub fn mass_fractions(&self) -> StateVec {
        let rho = self.rho();
        self.rho_vec().iter().map(|r| r / rho).collect()
    }

    /// x 速度
    #[inline]
    pub fn u(&self) -> f64 {
        self.data[self.layout().mx()]
    }

    /// y 速度
    #[inline]
    pub fn v(&self) -> f64 {
        self.data[self.layout().my()]
    }

    /// z 速度
    #[inline]
    pub fn w(&self) -> f64 {
        self.data[self.layout().mz()]
    }

    /// 速度向量
    #[inline]
    pub fn velocity(&self) -> DVec3 {
        DVec3::new(self.u(), self.v(), self.w())
    }

    /// 压力
    #[inline]
    pub fn p(&self) -> f64 {
        self.data[self.layout().energy()]
    }

    /// 湍动能
    #[inline]
    pub fn tke(&self) -> f64 {
        let l = self.layout();
        if l.has_turbulence() {
            self.data[l.turb_index()]
        } else {
            0.0
        }
    }

    /// 比耗散率
    #[inline]
    pub fn sdr(&self) -> f64 {
        let l = self.layout();
        if l.has_turbulence() {
            self.data[l.turb_index() + 1]
        } else {
            0.0
        }
    }

    /// 写入速度
    pub fn set_velocity(&mut self, vel: DVec3) {
        let l = self.layout();
        self.data[l.mx()] = vel.x;
        self.data[l.my()] = vel.y;
        self.data[l.mz()] = vel.z;
    }

    /// 写入压力
    pub fn set_p(&mut self, p: f64) {
        let e = self.layout().energy();
        self.data[e] = p;
    }

    /// 写入湍流变量
    pub fn set_turb(&mut self, tke: f64, sdr: f64) {
        let l = self.layout();
        if l.has_turbulence() {
            self.data[l.turb_index()] = tke;
            self.data[l.turb_index() + 1] = sdr;
        }
    }

    /// 温度（经状态方程）
    #[inline]
    pub fn temperature(&self, phys: &Physics) -> f64 {
        phys.eos.temperature(self.p(), self.rho_vec())
    }

    /// 声速
    #[inline]
    pub fn sos(&self, phys: &Physics) -> f64 {
        phys.eos.sos(self.p(), self.rho_vec())
    }

    /// 比内能
    #[inline]
    pub fn internal_energy(&self, phys: &Physics) -> f64 {
        phys.eos.internal_energy(self.temperature(phys), &self.mass_fractions())
    }

    /// 单位质量总能（含湍动能）
    pub fn energy(&self, phys: &Physics) -> f64 {
        self.internal_energy(phys) + 0.5 * self.velocity().length_squared() + self.tke()
    }

    /// 单位质量总焓
    pub fn enthalpy(&self, phys: &Physics) -> f64 {
        let t = self.temperature(phys);
        phys.eos.enthalpy(t, &self.mass_fractions())
            + 0.5 * self.velocity().length_squared()
            + self.tke()
    }

    /// 转换为守恒状态
    pub fn to_conserved(&self, phys: &Physics) -> Conserved {
        let l = self.layout();
        let rho = self.rho();
        let mut data: StateVec = smallvec::smallvec![0.0; l.size()];
        data[..self.num_species].copy_from_slice(self.rho_vec());
        data[l.mx()] = rho * self.u();
        data[l.my()] = rho * self.v();
        data[l.mz()] = rho * self.w();
        data[l.energy()] = rho * self.energy(phys);
        for t in 0..l.num_turb() {
            data[l.turb_index() + t] = rho * self.data[l.turb_index() + t];
        }
        Conserved {
            data,
            num_species: self.num_species,
        }
    }

    /// 由守恒状态构造（湍流变量钳制到下限）
    pub fn from_conserved(cons: &Conserved, phys: &Physics, floors: &Floors) -> Self {
        let l = cons.layout();
        let rho = cons.rho();
        let mut data: StateVec = smallvec::smallvec![0.0; l.size()];
        data[..cons.num_species].copy_from_slice(cons.rho_vec());
        let vel = cons.momentum() / rho;
        data[l.mx()] = vel.x;
        data[l.my()] = vel.y;
        data[l.mz()] = vel.z;
        let tke = if l.has_turbulence() {
            cons.data[l.turb_index()] / rho
        } else {
            0.0
        };
        let energy = cons.energy() / rho;
        data[l.energy()] =
            phys.eos
                .press_from_energy(cons.rho_vec(), energy - tke, vel.length());
        for t in 0..l.num_turb() {
            data[l.turb_index() + t] = cons.data[l.turb_index() + t] / rho;
        }
        let mut prim = Self {
            data,
            num_species: cons.num_species,
        };
        prim.limit_turb(floors);
        prim
    }

    /// 以守恒量增量更新并返回新的原始状态
    ///
    /// 质量分数保持非负并重新归一；湍流变量钳制到下限。
    pub fn update_with_cons_delta(&self, du: &[f64], phys: &Physics, floors: &Floors) -> Primitive {
        let mut cons = self.to_conserved(phys);
        debug_assert_eq!(du.len(), cons.data.len());
        for (c, d) in cons.data.iter_mut().zip(du) {
            *c += d;
        }
        cons.renormalize_species(floors);
        Primitive::from_conserved(&cons, phys, floors)
    }

    /// 湍流变量下限钳制
    pub fn limit_turb(&mut self, floors: &Floors) {
        let l = self.layout();
        if l.has_turbulence() {
            let ti = l.turb_index();
            self.data[ti] = self.data[ti].max(floors.tke_min);
            self.data[ti + 1] = self.data[ti + 1].max(floors.sdr_min);
        }
    }

    /// 远场湍流边界值（湍流强度 + 黏性比）
    pub fn apply_farfield_turb(&mut self, intensity: f64, eddy_visc_ratio: f64, phys: &Physics) {
        let l = self.layout();
        if !l.has_turbulence() {
            return;
        }
        let vel_mag = self.velocity().length();
        let tke = 1.5 * (intensity * vel_mag).powi(2);
        let mu = phys.transport.viscosity(self.temperature(phys), &self.mass_fractions());
        let sdr = self.rho() * tke / (eddy_visc_ratio * mu).max(1.0e-30);
        self.set_turb(tke, sdr);
    }

    /// Roe 平均状态
    pub fn roe_average(left: &Primitive, right: &Primitive) -> Primitive {
        let ratio = (right.rho() / left.rho()).sqrt();
        let denom = 1.0 + ratio;
        let l = left.layout();
        let mut data: StateVec = smallvec::smallvec![0.0; l.size()];
        for s in 0..left.num_species {
            data[s] = left.rho_n(s) * ratio;
        }
        for idx in l.mx()..l.size() {
            data[idx] = (left.data[idx] + ratio * right.data[idx]) / denom;
        }
        Primitive {
            data,
            num_species: left.num_species,
        }
    }

    /// 状态的物理性检查
    #[inline]
    pub fn is_physical(&self) -> bool {
        self.rho() > 0.0 && self.p() > 0.0 && self.data.iter().all(|v| v.is_finite())
    }
}

// ============================================================
// 守恒状态
// ============================================================

/// 守恒状态 `[ρ_s…, ρu, ρv, ρw, ρE, (ρk, ρω)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conserved {
    data: StateVec,
    num_species: usize,
}

impl Conserved {
    /// 零状态
    pub fn zeros(layout: StateLayout) -> Self {
        Self {
            data: smallvec::smallvec![0.0; layout.size()],
            num_species: layout.num_species(),
        }
    }

    /// 从切片构造
    pub fn from_slice(values: &[f64], num_species: usize) -> Self {
        Self {
            data: StateVec::from_slice(values),
            num_species,
        }
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> StateLayout {
        StateLayout::new(self.num_species, self.data.len() - self.num_species - 4)
    }

    /// 底层切片
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// 组分密度
    #[inline]
    pub fn rho_n(&self, s: usize) -> f64 {
        self.data[s]
    }

    /// 总密度
    #[inline]
    pub fn rho(&self) -> f64 {
        self.data[..self.num_species].iter().sum()
    }

    /// 组分密度切片
    #[inline]
    pub fn rho_vec(&self) -> &[f64] {
        &self.data[..self.num_species]
    }

    /// 动量向量
    #[inline]
    pub fn momentum(&self) -> DVec3 {
        let l = self.layout();
        DVec3::new(self.data[l.mx()], self.data[l.my()], self.data[l.mz()])
    }

    /// 总能 ρE
    #[inline]
    pub fn energy(&self) -> f64 {
        self.data[self.layout().energy()]
    }

    /// 质量分数非负化并重新归一
    pub fn renormalize_species(&mut self, floors: &Floors) {
        let rho = self.rho();
        let mut total = 0.0;
        let mut fractions: StateVec = self
            .rho_vec()
            .iter()
            .map(|r| {
                let f = (r / rho).max(floors.mass_fraction_min).max(0.0);
                total += f;
                f
            })
            .collect();
        for f in fractions.iter_mut() {
            *f /= total;
        }
        for (s, f) in fractions.iter().enumerate() {
            self.data[s] = rho * f;
        }
    }
}
