//! 分块数组存储 (`.zarr` 目录) 适配器.
//!
//! 每个分辨率层级是存储内的一个数组节点 (`/0`, `/1`, ...); 间距与轴序
//! 作为数组 attributes 持久化. 数据以整平面为 chunk, 读取按 subset
//! 惰性实体化, 只取需要的区域.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array3;
use serde_json::json;
use zarrs::array::codec::GzipCodec;
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::store::FilesystemStore;
use zarrs::storage::{ReadableWritableListableStorage, ReadableWritableListableStorageTraits};

use super::FormatError;
use crate::volume::{AxisOrder, Dtype, RawData, RawVolume, Volume, VolumeAttr, VoxelData};
use crate::Idx3d;

/// 已打开的 zarr 数组节点.
///
/// 该结构把磁盘上的分块数组暴露为惰性体: 打开本身不读任何 chunk,
/// [`ZarrStore::read_full`] / [`ZarrStore::read_region`] 才实体化
/// 被请求的部分, 因此大体量数据可以分片消费.
pub struct ZarrStore {
    array: Array<dyn ReadableWritableListableStorageTraits>,
}

/// 对 zarr 数组的每个受支持 dtype 分支展开 retrieve 调用.
macro_rules! retrieve {
    ($array:expr, $subset:expr) => {
        match $array.data_type() {
            DataType::UInt8 => RawData::U8(
                $array
                    .retrieve_array_subset_ndarray::<u8>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            DataType::UInt16 => RawData::U16(
                $array
                    .retrieve_array_subset_ndarray::<u16>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            DataType::Int16 => RawData::I16(
                $array
                    .retrieve_array_subset_ndarray::<i16>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            DataType::Int32 => RawData::I32(
                $array
                    .retrieve_array_subset_ndarray::<i32>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            DataType::UInt32 => RawData::U32(
                $array
                    .retrieve_array_subset_ndarray::<u32>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            DataType::Float32 => RawData::F32(
                $array
                    .retrieve_array_subset_ndarray::<f32>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            DataType::Float64 => RawData::F64(
                $array
                    .retrieve_array_subset_ndarray::<f64>($subset)
                    .map_err(FormatError::ZarrArray)?,
            ),
            other => {
                return Err(FormatError::UnsupportedVoxelType(format!(
                    "zarr 数据类型 {other:?}"
                )))
            }
        }
    };
}

impl ZarrStore {
    /// 打开 `path` 存储中第 `level` 层级的数组节点.
    pub fn open(path: &Path, level: usize) -> Result<Self, FormatError> {
        let store: ReadableWritableListableStorage = Arc::new(
            FilesystemStore::new(path).map_err(|e| FormatError::Zarr(e.to_string()))?,
        );
        let array = Array::open(store, &format!("/{level}")).map_err(FormatError::ZarrCreate)?;
        Ok(Self { array })
    }

    /// 数组形状.
    pub fn shape(&self) -> Idx3d {
        let s = self.array.shape();
        assert_eq!(s.len(), 3, "zarr 数组节点必须是三维");
        (s[0] as usize, s[1] as usize, s[2] as usize)
    }

    /// attributes 中持久化的轴序. 缺失时按 `[z, y, x]` 约定处理.
    pub fn axis_order(&self) -> AxisOrder {
        self.array
            .attributes()
            .get("axis_order")
            .and_then(|v| v.as_str())
            .and_then(AxisOrder::parse)
            .unwrap_or(AxisOrder::Zyx)
    }

    /// attributes 中持久化的体素间距 (按存储轴序排列, 微米).
    pub fn spacing_um(&self) -> Option<[f64; 3]> {
        let values = self.array.attributes().get("spacing_um")?.as_array()?;
        if values.len() != 3 {
            return None;
        }
        let mut spacing = [0.0; 3];
        for (s, v) in spacing.iter_mut().zip(values) {
            *s = v.as_f64()?;
        }
        spacing
            .iter()
            .all(|s| s.is_finite() && *s > 0.0)
            .then_some(spacing)
    }

    /// 实体化整个数组.
    pub fn read_full(&self) -> Result<RawData, FormatError> {
        let subset = ArraySubset::new_with_shape(self.array.shape().to_vec());
        Ok(retrieve!(self.array, &subset))
    }

    /// 实体化给定区域 (起点 + 形状, 按存储轴序). 只有覆盖该区域的
    /// chunk 会被读取与解压.
    pub fn read_region(&self, start: Idx3d, shape: Idx3d) -> Result<RawData, FormatError> {
        let subset = ArraySubset::new_with_ranges(&[
            start.0 as u64..(start.0 + shape.0) as u64,
            start.1 as u64..(start.1 + shape.1) as u64,
            start.2 as u64..(start.2 + shape.2) as u64,
        ]);
        Ok(retrieve!(self.array, &subset))
    }
}

/// 读取存储中第 `level` 层级为原始体.
pub(crate) fn read(path: &Path, level: usize) -> Result<RawVolume, FormatError> {
    let store = ZarrStore::open(path, level)?;
    let axis_order = store.axis_order();
    let native_spacing_um = store.spacing_um();
    Ok(RawVolume {
        data: store.read_full()?,
        axis_order,
        native_spacing_um,
    })
}

/// 写出规范体到存储的 `/0` 层级. 磁盘轴序由 `order` 显式给出,
/// 间距与轴序写入数组 attributes.
pub(crate) fn write(volume: &Volume, path: &Path, order: AxisOrder) -> Result<(), FormatError> {
    std::fs::create_dir_all(path)?;
    let store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(path).map_err(|e| FormatError::Zarr(e.to_string()))?);

    let perm = volume.axis_order().permutation_to(order);
    let (d0, d1, d2) = volume.shape();
    let dims = [d0, d1, d2];
    let shape: Vec<u64> = perm.iter().map(|&i| dims[i] as u64).collect();
    let spacing = volume.spacing_um();
    let spacing_disk = [spacing[perm[0]], spacing[perm[1]], spacing[perm[2]]];

    let mut attrs = serde_json::Map::new();
    attrs.insert("spacing_um".into(), json!(spacing_disk));
    attrs.insert("axis_order".into(), json!(order.as_str()));

    let dimension_names = match order {
        AxisOrder::Zyx => ["z", "y", "x"],
        AxisOrder::Xyz => ["x", "y", "z"],
    };

    let (data_type, fill_value) = dtype_pair(volume.dtype());
    let array = ArrayBuilder::new(
        shape.clone(),
        data_type,
        // 整平面 chunk.
        vec![1, shape[1], shape[2]]
            .try_into()
            .map_err(|e| FormatError::Zarr(format!("chunk 形状非法: {e:?}")))?,
        fill_value,
    )
    .bytes_to_bytes_codecs(vec![Box::new(
        GzipCodec::new(5).map_err(|e| FormatError::Zarr(e.to_string()))?,
    )])
    .dimension_names(dimension_names.into())
    .attributes(attrs)
    .build(store, "/0")
    .map_err(FormatError::ZarrCreate)?;

    array.store_metadata().map_err(FormatError::ZarrStorage)?;

    macro_rules! store_all {
        ($a:expr, $t:ty) => {{
            let data: Array3<$t> = $a.view().permuted_axes(perm).to_owned();
            array
                .store_array_subset_ndarray::<$t, _>(&[0, 0, 0], data)
                .map_err(FormatError::ZarrArray)?;
        }};
    }
    match volume.data() {
        VoxelData::U8(a) => store_all!(a, u8),
        VoxelData::U16(a) => store_all!(a, u16),
        VoxelData::I16(a) => store_all!(a, i16),
        VoxelData::I32(a) => store_all!(a, i32),
        VoxelData::U32(a) => store_all!(a, u32),
        VoxelData::F32(a) => store_all!(a, f32),
        VoxelData::F64(a) => store_all!(a, f64),
    }
    Ok(())
}

/// dtype 到 zarr 数据类型与填充值的映射.
fn dtype_pair(dtype: Dtype) -> (DataType, FillValue) {
    match dtype {
        Dtype::U8 => (DataType::UInt8, FillValue::from(0u8)),
        Dtype::U16 => (DataType::UInt16, FillValue::from(0u16)),
        Dtype::I16 => (DataType::Int16, FillValue::from(0i16)),
        Dtype::I32 => (DataType::Int32, FillValue::from(0i32)),
        Dtype::U32 => (DataType::UInt32, FillValue::from(0u32)),
        Dtype::F32 => (DataType::Float32, FillValue::from(0f32)),
        Dtype::F64 => (DataType::Float64, FillValue::from(0f64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{LoadOptions, VolumeMeta};
    use std::fs;
    use std::path::PathBuf;

    fn temp_store(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mb-berry-zarr-{}-{tag}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("brain.zarr")
    }

    fn sample() -> Volume {
        let mut a = Array3::<u16>::zeros((3, 4, 5));
        a[(0, 0, 0)] = 5;
        a[(2, 3, 4)] = 1234;
        Volume::from_parts(
            VoxelData::U16(a),
            VolumeMeta::new([6.0, 5.0, 4.0], AxisOrder::Zyx),
        )
    }

    #[test]
    fn test_roundtrip_preserves_data_and_meta() {
        let path = temp_store("rt");
        let v = sample();
        v.save(&path, AxisOrder::Zyx).unwrap();

        let back = Volume::open(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.dtype(), Dtype::U16);
        assert_eq!(back.shape(), (3, 4, 5));
        assert_eq!(back.to_f64(), v.to_f64());
        assert_eq!(back.spacing_um(), [6.0, 5.0, 4.0]);

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_region_read_is_partial() {
        let path = temp_store("region");
        sample().save(&path, AxisOrder::Zyx).unwrap();

        let store = ZarrStore::open(&path, 0).unwrap();
        assert_eq!(store.shape(), (3, 4, 5));
        let region = store.read_region((2, 3, 4), (1, 1, 1)).unwrap();
        match region {
            RawData::U16(a) => {
                assert_eq!(a.shape(), &[1, 1, 1]);
                assert_eq!(a[[0, 0, 0]], 1234);
            }
            other => panic!("dtype 不应改变: {other:?}"),
        }

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_missing_level_is_an_error() {
        let path = temp_store("level");
        sample().save(&path, AxisOrder::Zyx).unwrap();
        assert!(ZarrStore::open(&path, 3).is_err());
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
