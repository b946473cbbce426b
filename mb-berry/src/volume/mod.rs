//! 规范体 (canonical volume) 数据结构.
//!
//! 所有下游组件 (区域分析、边界提取、对称化、持久化) 只操作本模块定义的
//! 规范表示, 不接触各格式的原始数组.

use ndarray::{Array3, ArrayD, ArrayView, ArrayViewMut, Ix3};

use crate::Idx3d;

/// 规范化构建 (squeeze / 轴置换 / 间距解析).
pub mod build;

/// 体素间距 sidecar 文件.
pub mod sidecar;

pub use build::{BuildError, LoadOptions};

/// 体素轴序. 本库支持两种固定约定, 其间的转换是一次 `[2, 1, 0]` 轴置换.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AxisOrder {
    /// `[z, y, x]`: 第一维为切片方向. 规范加载的默认目标轴序.
    Zyx,

    /// `[x, y, z]`: nifti 等医学容器的原生轴序.
    Xyz,
}

impl AxisOrder {
    /// 返回将 `self` 轴序的数据重排为 `to` 轴序所需的轴置换.
    #[inline]
    pub fn permutation_to(self, to: AxisOrder) -> [usize; 3] {
        if self == to {
            [0, 1, 2]
        } else {
            [2, 1, 0]
        }
    }

    /// 空间 x 方向位于第几根数组轴.
    #[inline]
    pub fn axis_of_x(self) -> usize {
        match self {
            AxisOrder::Zyx => 2,
            AxisOrder::Xyz => 0,
        }
    }

    /// 空间 y 方向位于第几根数组轴. 两种约定下都是第 1 轴.
    #[inline]
    pub fn axis_of_y(self) -> usize {
        1
    }

    /// 空间 z 方向位于第几根数组轴.
    #[inline]
    pub fn axis_of_z(self) -> usize {
        match self {
            AxisOrder::Zyx => 0,
            AxisOrder::Xyz => 2,
        }
    }

    /// 将空间 `(x, y, z)` 三元组重排为该轴序下的逐轴数组.
    #[inline]
    pub fn order_xyz<T: Copy>(self, [x, y, z]: [T; 3]) -> [T; 3] {
        match self {
            AxisOrder::Zyx => [z, y, x],
            AxisOrder::Xyz => [x, y, z],
        }
    }

    /// 将该轴序下的逐轴数组还原为空间 `(x, y, z)` 三元组.
    #[inline]
    pub fn to_xyz<T: Copy>(self, v: [T; 3]) -> [T; 3] {
        // 两种约定互为逆置换, 且均为自逆.
        self.order_xyz(v)
    }

    /// 轴序的小写名称, 如 `"zyx"`.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            AxisOrder::Zyx => "zyx",
            AxisOrder::Xyz => "xyz",
        }
    }

    /// 从名称解析轴序. 大小写不敏感. 未知名称返回 `None`.
    pub fn parse(s: &str) -> Option<AxisOrder> {
        match s.to_ascii_lowercase().as_str() {
            "zyx" => Some(AxisOrder::Zyx),
            "xyz" => Some(AxisOrder::Xyz),
            _ => None,
        }
    }
}

/// 体素数据类型. 宽度与符号性在规范化过程中保持与源数据一致.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Dtype {
    /// 无符号 8 位整数.
    U8,
    /// 无符号 16 位整数 (光片相机的惯用位深).
    U16,
    /// 有符号 16 位整数.
    I16,
    /// 有符号 32 位整数 (常见的图谱标注类型).
    I32,
    /// 无符号 32 位整数.
    U32,
    /// 单精度浮点.
    F32,
    /// 双精度浮点.
    F64,
}

impl Dtype {
    /// 是否是整数类型?
    #[inline]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Dtype::F32 | Dtype::F64)
    }
}

/// 对 [`VoxelData`] (或 [`RawData`]) 的每个 dtype 分支展开同一段代码.
/// 展开体中 `$arr` 绑定为对应的具体 `Array3<T>` / `ArrayD<T>`.
macro_rules! per_dtype {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::volume::VoxelData::U8($arr) => $body,
            $crate::volume::VoxelData::U16($arr) => $body,
            $crate::volume::VoxelData::I16($arr) => $body,
            $crate::volume::VoxelData::I32($arr) => $body,
            $crate::volume::VoxelData::U32($arr) => $body,
            $crate::volume::VoxelData::F32($arr) => $body,
            $crate::volume::VoxelData::F64($arr) => $body,
        }
    };
}

/// 与 [`per_dtype!`] 类似, 但把展开体的结果重新包回原 dtype 分支.
macro_rules! map_dtype {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::volume::VoxelData::U8($arr) => $crate::volume::VoxelData::U8($body),
            $crate::volume::VoxelData::U16($arr) => $crate::volume::VoxelData::U16($body),
            $crate::volume::VoxelData::I16($arr) => $crate::volume::VoxelData::I16($body),
            $crate::volume::VoxelData::I32($arr) => $crate::volume::VoxelData::I32($body),
            $crate::volume::VoxelData::U32($arr) => $crate::volume::VoxelData::U32($body),
            $crate::volume::VoxelData::F32($arr) => $crate::volume::VoxelData::F32($body),
            $crate::volume::VoxelData::F64($arr) => $crate::volume::VoxelData::F64($body),
        }
    };
}

/// 对 [`RawData`] 的每个 dtype 分支展开同一段代码.
macro_rules! per_raw_dtype {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::volume::RawData::U8($arr) => $body,
            $crate::volume::RawData::U16($arr) => $body,
            $crate::volume::RawData::I16($arr) => $body,
            $crate::volume::RawData::I32($arr) => $body,
            $crate::volume::RawData::U32($arr) => $body,
            $crate::volume::RawData::F32($arr) => $body,
            $crate::volume::RawData::F64($arr) => $body,
        }
    };
}

pub(crate) use {map_dtype, per_dtype, per_raw_dtype};

/// 规范体的逐体素存储. dtype 与源数据保持一致.
#[derive(Debug, Clone)]
pub enum VoxelData {
    /// `u8` 体.
    U8(Array3<u8>),
    /// `u16` 体.
    U16(Array3<u16>),
    /// `i16` 体.
    I16(Array3<i16>),
    /// `i32` 体.
    I32(Array3<i32>),
    /// `u32` 体.
    U32(Array3<u32>),
    /// `f32` 体.
    F32(Array3<f32>),
    /// `f64` 体.
    F64(Array3<f64>),
}

impl VoxelData {
    /// 数据类型.
    #[inline]
    pub fn dtype(&self) -> Dtype {
        match self {
            VoxelData::U8(_) => Dtype::U8,
            VoxelData::U16(_) => Dtype::U16,
            VoxelData::I16(_) => Dtype::I16,
            VoxelData::I32(_) => Dtype::I32,
            VoxelData::U32(_) => Dtype::U32,
            VoxelData::F32(_) => Dtype::F32,
            VoxelData::F64(_) => Dtype::F64,
        }
    }

    /// 数组形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        per_dtype!(self, a => a.dim())
    }
}

/// 格式适配器输出的原始多维数组. 规范化 (squeeze + 轴置换)
/// 之前可以携带首/尾单例轴, 因此以动态维度存储.
#[derive(Debug, Clone)]
pub enum RawData {
    /// `u8` 数组.
    U8(ArrayD<u8>),
    /// `u16` 数组.
    U16(ArrayD<u16>),
    /// `i16` 数组.
    I16(ArrayD<i16>),
    /// `i32` 数组.
    I32(ArrayD<i32>),
    /// `u32` 数组.
    U32(ArrayD<u32>),
    /// `f32` 数组.
    F32(ArrayD<f32>),
    /// `f64` 数组.
    F64(ArrayD<f64>),
}

impl RawData {
    /// 数组形状.
    #[inline]
    pub fn shape(&self) -> Vec<usize> {
        per_raw_dtype!(self, a => a.shape().to_vec())
    }
}

/// 格式适配器的读取结果: 原始数组 + 源轴序 + 格式原生携带的体素间距
/// (若有, 按源数组轴序排列, 单位微米).
#[derive(Debug, Clone)]
pub struct RawVolume {
    /// 原始多维数组.
    pub data: RawData,

    /// 源数组的轴序.
    pub axis_order: AxisOrder,

    /// 格式原生的体素间距 (按源轴序排列, 微米). 无原生元数据的格式为 `None`.
    pub native_spacing_um: Option<[f64; 3]>,
}

/// 规范体的元信息: 体素间距 + 轴序.
///
/// 写出时的仿射等价变换由二者派生, 不单独存储.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VolumeMeta {
    /// 体素间距, 按当前轴序逐轴排列, 单位微米.
    pub spacing_um: [f64; 3],

    /// 当前轴序.
    pub axis_order: AxisOrder,
}

impl VolumeMeta {
    /// 构建元信息. 间距必须全为正且有限, 否则程序 panic.
    pub fn new(spacing_um: [f64; 3], axis_order: AxisOrder) -> Self {
        assert!(
            spacing_um.iter().all(|s| s.is_finite() && *s > 0.0),
            "体素间距必须为正: {spacing_um:?}"
        );
        Self {
            spacing_um,
            axis_order,
        }
    }
}

/// 规范体的共用属性和部分通用操作.
pub trait VolumeAttr {
    /// 获取元信息.
    fn meta(&self) -> &VolumeMeta;

    /// 获取数组形状.
    fn shape(&self) -> Idx3d;

    /// 当前轴序.
    #[inline]
    fn axis_order(&self) -> AxisOrder {
        self.meta().axis_order
    }

    /// 逐轴体素间距 (按当前轴序排列, 微米).
    #[inline]
    fn spacing_um(&self) -> [f64; 3] {
        self.meta().spacing_um
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (a, b, c) = self.shape();
        a * b * c
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (i0, j0, k0): &Idx3d) -> bool {
        let (i, j, k) = self.shape();
        *i0 < i && *j0 < j && *k0 < k
    }

    /// 空间 x 方向体素间距, 以微米为单位.
    #[inline]
    fn spacing_x_um(&self) -> f64 {
        self.spacing_um()[self.axis_order().axis_of_x()]
    }

    /// 空间 y 方向体素间距, 以微米为单位.
    #[inline]
    fn spacing_y_um(&self) -> f64 {
        self.spacing_um()[self.axis_order().axis_of_y()]
    }

    /// 空间 z 方向 (相邻切片方向) 体素间距, 以微米为单位.
    #[inline]
    fn spacing_z_um(&self) -> f64 {
        self.spacing_um()[self.axis_order().axis_of_z()]
    }

    /// 体素间距在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [a, b, c] = self.spacing_um();
        a == b && a == c
    }

    /// 获取体素的实际体积值, 以立方微米为单位.
    #[inline]
    fn voxel_um3(&self) -> f64 {
        self.spacing_um().iter().product()
    }

    /// 派生仿射等价变换: 行主序 4x4 矩阵, 对角为空间 (x, y, z) 间距 (微米).
    /// 仅在写出时使用.
    fn affine(&self) -> [f64; 16] {
        let [sx, sy, sz] = self.axis_order().to_xyz(self.spacing_um());
        [
            sx, 0.0, 0.0, 0.0, //
            0.0, sy, 0.0, 0.0, //
            0.0, 0.0, sz, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// 规范体: 三维数组 + 元信息. 所有核心算法的唯一输入表示.
#[derive(Debug, Clone)]
pub struct Volume {
    data: VoxelData,
    meta: VolumeMeta,
}

impl VolumeAttr for Volume {
    #[inline]
    fn meta(&self) -> &VolumeMeta {
        &self.meta
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.shape()
    }
}

impl Volume {
    /// 由逐体素数据和元信息直接创建规范体.
    ///
    /// # 注意
    ///
    /// 常规入口是 [`build::build`] (负责 squeeze、轴置换与间距解析);
    /// 该方法用于在内存中直接拼装, 元信息一致性由调用者保证.
    #[inline]
    pub fn from_parts(data: VoxelData, meta: VolumeMeta) -> Self {
        Self { data, meta }
    }

    /// 获得逐体素数据的不可变借用.
    #[inline]
    pub fn data(&self) -> &VoxelData {
        &self.data
    }

    /// 获得逐体素数据的可变借用.
    #[inline]
    pub fn data_mut(&mut self) -> &mut VoxelData {
        &mut self.data
    }

    /// 拆出逐体素数据.
    #[inline]
    pub fn into_data(self) -> VoxelData {
        self.data
    }

    /// 数据类型.
    #[inline]
    pub fn dtype(&self) -> Dtype {
        self.data.dtype()
    }

    /// 以 `f64` 读出单个体素. 索引越界时 panic.
    #[inline]
    pub fn get(&self, index: Idx3d) -> f64 {
        per_dtype!(&self.data, a => a[index] as f64)
    }

    /// 将整个体转换为 `f64` 数组 (拷贝).
    pub fn to_f64(&self) -> Array3<f64> {
        per_dtype!(&self.data, a => a.mapv(|v| v as f64))
    }

    /// 将整数标签体转换为 `u32` 标签数组 (拷贝).
    ///
    /// 仅整数 dtype 支持该操作, 浮点体返回 `None`.
    /// 有符号类型中的负值按背景 (0) 处理.
    pub fn to_label_array(&self) -> Option<Array3<u32>> {
        match &self.data {
            VoxelData::U8(a) => Some(a.mapv(u32::from)),
            VoxelData::U16(a) => Some(a.mapv(u32::from)),
            VoxelData::U32(a) => Some(a.clone()),
            VoxelData::I16(a) => Some(a.mapv(|v| if v > 0 { v as u32 } else { 0 })),
            VoxelData::I32(a) => Some(a.mapv(|v| if v > 0 { v as u32 } else { 0 })),
            VoxelData::F32(_) | VoxelData::F64(_) => None,
        }
    }

    /// 前景掩码: 体素值 > 0 的位置为 `true`.
    pub fn foreground_mask(&self) -> Array3<bool> {
        per_dtype!(&self.data, a => a.mapv(|v| v > (0 as _)))
    }

    /// 显式转换 dtype (拷贝). 元信息不变.
    ///
    /// 转换经由 `f64` 中间值和 Rust `as` 语义完成 (浮点转整数时饱和截断).
    /// 对称化结果写出前的降型属于此操作, 见 [`crate::symmetry`].
    pub fn cast(&self, dtype: Dtype) -> Volume {
        let wide = self.to_f64();
        let data = cast_from_f64(wide, dtype);
        Volume {
            data,
            meta: self.meta,
        }
    }

    /// 获得 `f64` 体数据的一份不可变 shallow copy. 仅 `F64` dtype 可用,
    /// 其余返回 `None`.
    #[inline]
    pub fn as_f64_view(&self) -> Option<ArrayView<'_, f64, Ix3>> {
        match &self.data {
            VoxelData::F64(a) => Some(a.view()),
            _ => None,
        }
    }

    /// 获得 `f64` 体数据的一份可变 shallow copy. 仅 `F64` dtype 可用,
    /// 其余返回 `None`.
    #[inline]
    pub fn as_f64_view_mut(&mut self) -> Option<ArrayViewMut<'_, f64, Ix3>> {
        match &mut self.data {
            VoxelData::F64(a) => Some(a.view_mut()),
            _ => None,
        }
    }
}

/// 将 `f64` 数组按 Rust `as` 语义转换到目标 dtype.
pub(crate) fn cast_from_f64(wide: Array3<f64>, dtype: Dtype) -> VoxelData {
    match dtype {
        Dtype::U8 => VoxelData::U8(wide.mapv(|v| v as u8)),
        Dtype::U16 => VoxelData::U16(wide.mapv(|v| v as u16)),
        Dtype::I16 => VoxelData::I16(wide.mapv(|v| v as i16)),
        Dtype::I32 => VoxelData::I32(wide.mapv(|v| v as i32)),
        Dtype::U32 => VoxelData::U32(wide.mapv(|v| v as u32)),
        Dtype::F32 => VoxelData::F32(wide.mapv(|v| v as f32)),
        Dtype::F64 => VoxelData::F64(wide),
    }
}
