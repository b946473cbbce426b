//! 编号单平面图像文件目录适配器.
//!
//! 目录下的平面按文件名升序堆叠为 `[z, y, x]` 体. 该格式不携带任何
//! 间距元数据, 间距依赖 sidecar 或显式覆盖. 写出固定为
//! `Z{index:04}.tif` 命名, 与读取端的排序约定一致.

use std::path::{Path, PathBuf};

use glob::glob;
use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::{Array3, Axis};

use super::{dtype_name, FormatError};
use crate::consts::PLANE_PREFIX;
use crate::volume::{AxisOrder, RawData, RawVolume, Volume, VolumeAttr, VoxelData};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 读取平面目录. 支持 8/16 位单通道平面, 像素类型由首张决定.
pub(crate) fn read(dir: &Path) -> Result<RawVolume, FormatError> {
    let planes = list_planes(dir)?;
    if planes.is_empty() {
        return Err(FormatError::EmptyStack(dir.to_owned()));
    }

    let first = image::open(&planes[0])?;
    let data = match first {
        DynamicImage::ImageLuma8(_) => RawData::U8(read_planes_u8(&planes)?.into_dyn()),
        DynamicImage::ImageLuma16(_) => RawData::U16(read_planes_u16(&planes)?.into_dyn()),
        other => {
            return Err(FormatError::UnsupportedVoxelType(format!(
                "平面栈只支持 8/16 位单通道图像, 发现 {:?}",
                other.color()
            )))
        }
    };

    Ok(RawVolume {
        data,
        axis_order: AxisOrder::Zyx,
        native_spacing_um: None,
    })
}

/// 枚举目录下的平面文件, 按文件名升序.
fn list_planes(dir: &Path) -> Result<Vec<PathBuf>, FormatError> {
    let mut planes = Vec::new();
    for ext in ["tif", "tiff", "png"] {
        let pattern = dir.join(format!("*.{ext}"));
        let pattern = pattern
            .to_str()
            .ok_or_else(|| FormatError::Unsupported(dir.to_owned()))?;
        // 路径刚由合法组件拼出, pattern 不会非法.
        for entry in glob(pattern).unwrap() {
            planes.push(entry.map_err(|e| FormatError::Io(e.into_error()))?);
        }
    }
    planes.sort();
    Ok(planes)
}

macro_rules! impl_plane_reader {
    ($fn_name:ident, $t:ty, $variant:ident) => {
        /// 将平面序列堆叠为三维数组. 每张平面的形状与像素类型
        /// 必须与首张一致.
        fn $fn_name(planes: &[PathBuf]) -> Result<Array3<$t>, FormatError> {
            let mut dim = (0u32, 0u32);
            let mut buf: Vec<$t> = Vec::new();

            for (z, path) in planes.iter().enumerate() {
                let DynamicImage::$variant(img) = image::open(path)? else {
                    return Err(FormatError::StackMismatch(path.clone()));
                };
                if z == 0 {
                    dim = (img.width(), img.height());
                    buf.reserve(planes.len() * (dim.0 * dim.1) as usize);
                } else if (img.width(), img.height()) != dim {
                    return Err(FormatError::StackMismatch(path.clone()));
                }
                buf.extend_from_slice(img.as_raw());
            }

            let (w, h) = (dim.0 as usize, dim.1 as usize);
            // 形状与缓冲长度一致, 不会失败.
            Ok(Array3::from_shape_vec((planes.len(), h, w), buf).unwrap())
        }
    };
}

impl_plane_reader!(read_planes_u8, u8, ImageLuma8);
impl_plane_reader!(read_planes_u16, u16, ImageLuma16);

/// 写出平面目录. 平面取自 (按 `order` 置换后的) 第 0 轴.
///
/// 只支持 `U8` / `U16` 体; 其他 dtype 请先 [`Volume::cast`] 显式降型.
/// 启用 `rayon` feature 时逐平面并行写出, 第一个失败的任务让整个
/// 操作尽快中止 ([`FormatError::Worker`]); 每个任务只写自己的文件,
/// 输出与 worker 数无关.
pub(crate) fn write(volume: &Volume, dir: &Path, order: AxisOrder) -> Result<(), FormatError> {
    std::fs::create_dir_all(dir)?;
    let perm = volume.axis_order().permutation_to(order);

    match volume.data() {
        VoxelData::U8(a) => {
            let a = a.view().permuted_axes(perm).to_owned();
            write_planes_u8(&a, dir)
        }
        VoxelData::U16(a) => {
            let a = a.view().permuted_axes(perm).to_owned();
            write_planes_u16(&a, dir)
        }
        other => Err(FormatError::UnsupportedVoxelType(format!(
            "平面栈写出只支持 u8/u16, 请先将 {} 体显式降型",
            dtype_name(other.dtype())
        ))),
    }
}

macro_rules! impl_plane_writer {
    ($fn_name:ident, $t:ty) => {
        fn $fn_name(data: &Array3<$t>, dir: &Path) -> Result<(), FormatError> {
            let write_one = |z: usize| -> Result<(), FormatError> {
                let plane = data.index_axis(Axis(0), z).to_owned();
                let (h, w) = plane.dim();
                // 缓冲长度与图像尺寸一致, 不会失败.
                let img =
                    ImageBuffer::<Luma<$t>, Vec<$t>>::from_raw(w as u32, h as u32, plane.into_raw_vec())
                        .unwrap();
                img.save(dir.join(format!("{PLANE_PREFIX}{z:04}.tif")))?;
                Ok(())
            };

            let nz = data.len_of(Axis(0));
            #[cfg(feature = "rayon")]
            return (0..nz)
                .into_par_iter()
                .map(write_one)
                .collect::<Result<(), FormatError>>()
                .map_err(|e| FormatError::Worker(Box::new(e)));

            #[cfg(not(feature = "rayon"))]
            (0..nz).try_for_each(write_one)
        }
    };
}

impl_plane_writer!(write_planes_u8, u8);
impl_plane_writer!(write_planes_u16, u16);
