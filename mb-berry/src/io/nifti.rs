//! 医学影像容器 (nifti) 适配器.
//!
//! 读取时保持源文件的数据类型不变; `pixdim` 以毫米计,
//! 与本库的微米间距按 [`UM_PER_MM`] 互转.

use std::path::Path;

use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, NiftiType, NiftiVolume, ReaderOptions};

use super::FormatError;
use crate::consts::UM_PER_MM;
use crate::volume::{per_dtype, AxisOrder, RawData, RawVolume, Volume, VolumeAttr};

/// 读取 nifti 文件. 数组保持文件原生的 `[x, y, z]` 轴序,
/// 由规范化构建统一置换.
pub(crate) fn read(path: &Path) -> Result<RawVolume, FormatError> {
    let obj = ReaderOptions::new().read_file(path)?;
    let header = obj.header().clone();

    let native_spacing_um = native_spacing(&header);
    let volume = obj.into_volume();

    let data = match volume.data_type() {
        NiftiType::Uint8 => RawData::U8(volume.into_ndarray::<u8>()?),
        NiftiType::Uint16 => RawData::U16(volume.into_ndarray::<u16>()?),
        NiftiType::Int16 => RawData::I16(volume.into_ndarray::<i16>()?),
        NiftiType::Int32 => RawData::I32(volume.into_ndarray::<i32>()?),
        NiftiType::Uint32 => RawData::U32(volume.into_ndarray::<u32>()?),
        NiftiType::Float32 => RawData::F32(volume.into_ndarray::<f32>()?),
        NiftiType::Float64 => RawData::F64(volume.into_ndarray::<f64>()?),
        other => {
            return Err(FormatError::UnsupportedVoxelType(format!(
                "nifti 数据类型 {other:?}"
            )))
        }
    };

    Ok(RawVolume {
        data,
        axis_order: AxisOrder::Xyz,
        native_spacing_um,
    })
}

/// 从 header 提取体素间距 (微米, `[x, y, z]` 序).
/// `pixdim` 为非正或非有限值时按 "无原生间距" 处理.
fn native_spacing(header: &NiftiHeader) -> Option<[f64; 3]> {
    let [_, px, py, pz, ..] = header.pixdim;
    let spacing = [
        px as f64 * UM_PER_MM,
        py as f64 * UM_PER_MM,
        pz as f64 * UM_PER_MM,
    ];
    spacing
        .iter()
        .all(|s| s.is_finite() && *s > 0.0)
        .then_some(spacing)
}

/// 写出 nifti 文件. 磁盘轴序 `order` 由调用方显式给出,
/// 数组轴即文件的 `(i, j, k)` 轴, 绝不静默重排.
///
/// 文件名以 `.nii.gz` 结尾时由底层写出器自动压缩.
pub(crate) fn write(volume: &Volume, path: &Path, order: AxisOrder) -> Result<(), FormatError> {
    let perm = volume.axis_order().permutation_to(order);
    let spacing = volume.spacing_um();

    let mut header = NiftiHeader::default();
    header.pixdim = [
        1.0,
        (spacing[perm[0]] / UM_PER_MM) as f32,
        (spacing[perm[1]] / UM_PER_MM) as f32,
        (spacing[perm[2]] / UM_PER_MM) as f32,
        0.0,
        0.0,
        0.0,
        0.0,
    ];

    per_dtype!(volume.data(), a => {
        let view = a.view().permuted_axes(perm);
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&view.as_standard_layout())?;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Dtype, LoadOptions, VolumeMeta, VoxelData};
    use ndarray::Array3;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mb-berry-nifti-{}-{tag}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_u16() -> Volume {
        let mut a = Array3::<u16>::zeros((4, 3, 2));
        a[(0, 0, 0)] = 17;
        a[(3, 2, 1)] = 60000;
        // pixdim 以 f32 毫米存储, 取二进制可精确表示的间距以便逐位比较.
        Volume::from_parts(
            VoxelData::U16(a),
            VolumeMeta::new([500.0, 250.0, 125.0], AxisOrder::Zyx),
        )
    }

    #[test]
    fn test_roundtrip_u16_bit_exact() {
        let dir = temp_dir("u16");
        let path = dir.join("brain.nii");
        let v = sample_u16();
        v.save(&path, AxisOrder::Xyz).unwrap();

        let back = Volume::open(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.dtype(), Dtype::U16);
        assert_eq!(back.shape(), v.shape());
        assert_eq!(back.axis_order(), AxisOrder::Zyx);
        assert_eq!(back.to_f64(), v.to_f64());
        // 间距跟随数据一起往返.
        assert_eq!(back.spacing_um(), [500.0, 250.0, 125.0]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_roundtrip_gz_f32() {
        let dir = temp_dir("f32gz");
        let path = dir.join("stat.nii.gz");
        let mut a = Array3::<f32>::zeros((2, 2, 2));
        a[(1, 0, 1)] = 0.125;
        let v = Volume::from_parts(
            VoxelData::F32(a),
            VolumeMeta::new([1000.0, 1000.0, 1000.0], AxisOrder::Zyx),
        );
        v.save(&path, AxisOrder::Xyz).unwrap();

        let back = Volume::open(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.dtype(), Dtype::F32);
        let (orig, read) = (v.to_f64(), back.to_f64());
        for (a, b) in orig.iter().zip(read.iter()) {
            assert!((a - b).abs() <= 1e-6 * a.abs().max(1.0));
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_written_file_carries_xyz_layout() {
        // zyx 内存序 + 显式 xyz 磁盘序: 读回后标记体素仍在原位.
        let dir = temp_dir("layout");
        let path = dir.join("mark.nii");
        let mut a = Array3::<u8>::zeros((4, 3, 2)); // (z, y, x)
        a[(3, 1, 0)] = 9;
        let v = Volume::from_parts(
            VoxelData::U8(a),
            VolumeMeta::new([2.0, 2.0, 2.0], AxisOrder::Zyx),
        );
        v.save(&path, AxisOrder::Xyz).unwrap();

        let back = Volume::open(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.get((3, 1, 0)), 9.0);

        fs::remove_dir_all(&dir).unwrap();
    }
}
