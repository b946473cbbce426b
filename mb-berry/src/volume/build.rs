//! 规范化构建: 将格式适配器输出的原始数组转换为规范体.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use ndarray::{Array3, ArrayD, Axis, Ix3};

use super::sidecar;
use crate::volume::{
    map_dtype, AxisOrder, RawData, RawVolume, Volume, VolumeMeta, VoxelData,
};

/// 规范化加载选项.
///
/// 本库没有任何进程级可变状态, 所有行为开关都显式穿过入口参数.
#[derive(Copy, Clone, Debug)]
pub struct LoadOptions {
    /// 规范体的目标轴序.
    pub target_order: AxisOrder,

    /// 显式体素间距覆盖, 空间 `(x, y, z)` 序, 微米. 解析优先级最高.
    pub spacing_um: Option<[f64; 3]>,

    /// 间距首次解析成功且 sidecar 不存在时, 是否回写 sidecar.
    pub write_sidecar: bool,

    /// 多通道归档读取的通道索引.
    pub channel: usize,

    /// 分块存储读取的分辨率层级.
    pub level: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            target_order: AxisOrder::Zyx,
            spacing_um: None,
            write_sidecar: true,
            channel: 0,
            level: 0,
        }
    }
}

/// 规范化构建错误.
#[derive(Debug)]
pub enum BuildError {
    /// 去除首/尾单例轴后维度仍不是 3. 携带 squeeze 后的形状.
    Shape(Vec<usize>),

    /// 显式覆盖、格式原生元数据与 sidecar 均无法给出体素间距.
    MissingSpacing(PathBuf),
}

/// 将适配器读取结果规范化为 [`Volume`].
///
/// 依次执行:
///
/// 1. 去除首/尾单例轴 (通道轴等); squeeze 后维度必须恰为 3,
///   否则返回 [`BuildError::Shape`];
/// 2. 源轴序与 `opts.target_order` 不同时做固定 `[2, 1, 0]` 轴置换,
///   仅在目标内存布局要求时才实体化拷贝;
/// 3. 间距解析: 显式覆盖 > 格式原生 > sidecar, 全部缺失则返回
///   [`BuildError::MissingSpacing`];
/// 4. 副作用: 间距由前两级解析成功且 `source` 旁没有 sidecar 时回写
///   sidecar, 使同一数据源的后续加载不再重复推导. 这是全库唯一允许该
///   副作用的位置; 回写失败只记日志, 不影响本次构建.
pub fn build(raw: RawVolume, source: &Path, opts: &LoadOptions) -> Result<Volume, BuildError> {
    let RawVolume {
        data,
        axis_order,
        native_spacing_um,
    } = raw;

    let data = squeeze(data)?;
    let data = permute(data, axis_order, opts.target_order);

    let (spacing_xyz, from_sidecar) = if let Some(s) = opts.spacing_um {
        (s, false)
    } else if let Some(native) = native_spacing_um {
        (axis_order.to_xyz(native), false)
    } else if let Some(s) = sidecar::read_sidecar(source) {
        (s, true)
    } else {
        return Err(BuildError::MissingSpacing(source.to_owned()));
    };

    if opts.write_sidecar && !from_sidecar && !sidecar::sidecar_path(source).exists() {
        match sidecar::write_sidecar(source, spacing_xyz) {
            Ok(()) => debug!("已回写 sidecar: {:?}", sidecar::sidecar_path(source)),
            Err(e) => warn!("sidecar 回写失败 ({}): {e}", source.display()),
        }
    }

    let meta = VolumeMeta::new(opts.target_order.order_xyz(spacing_xyz), opts.target_order);
    Ok(Volume::from_parts(data, meta))
}

/// 去除首/尾单例轴, 并验证维度恰为 3.
fn squeeze(data: RawData) -> Result<VoxelData, BuildError> {
    Ok(match data {
        RawData::U8(a) => VoxelData::U8(squeeze_one(a)?),
        RawData::U16(a) => VoxelData::U16(squeeze_one(a)?),
        RawData::I16(a) => VoxelData::I16(squeeze_one(a)?),
        RawData::I32(a) => VoxelData::I32(squeeze_one(a)?),
        RawData::U32(a) => VoxelData::U32(squeeze_one(a)?),
        RawData::F32(a) => VoxelData::F32(squeeze_one(a)?),
        RawData::F64(a) => VoxelData::F64(squeeze_one(a)?),
    })
}

fn squeeze_one<T>(mut a: ArrayD<T>) -> Result<Array3<T>, BuildError> {
    while a.ndim() > 3 {
        if a.shape()[0] == 1 {
            a = a.index_axis_move(Axis(0), 0);
        } else if a.shape()[a.ndim() - 1] == 1 {
            let last = a.ndim() - 1;
            a = a.index_axis_move(Axis(last), 0);
        } else {
            break;
        }
    }
    if a.ndim() != 3 {
        return Err(BuildError::Shape(a.shape().to_vec()));
    }
    // 维度刚检查过, 该转换不会失败.
    Ok(a.into_dimensionality::<Ix3>().unwrap())
}

/// 轴序置换. 轴序一致时原样返回 (零拷贝).
fn permute(data: VoxelData, from: AxisOrder, to: AxisOrder) -> VoxelData {
    let perm = from.permutation_to(to);
    map_dtype!(data, a => permute_one(a, perm))
}

fn permute_one<T: Clone>(a: Array3<T>, perm: [usize; 3]) -> Array3<T> {
    if perm == [0, 1, 2] {
        return a;
    }
    let a = a.permuted_axes(perm);
    if a.is_standard_layout() {
        a
    } else {
        a.as_standard_layout().to_owned()
    }
}
