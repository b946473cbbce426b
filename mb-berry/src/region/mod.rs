//! 区域包围盒与连通域聚类.
//!
//! 本模块把体数据当作 "强度阈值掩码" 或 "整数标签图" 来分析:
//! 计算满足谓词的体素范围 (闭区间包围盒), 以及按最小体素数阈值
//! 枚举标签聚类. 所有坐标均为 0-based.

pub mod components;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{s, ArrayView3};
use num::PrimInt;

use crate::volume::{map_dtype, per_dtype, AxisOrder};
use crate::{Volume, VolumeAttr};

/// 闭区间轴对齐包围盒, 以空间 `(x, y, z)` 方向表示, 与数组轴序无关.
///
/// 两端均为闭 (inclusive): 每对 `(min, max)` 的两端都是被选中体素的坐标.
/// 文本序列化与 [`Volume::crop`] 使用同一约定, 因此二者不会失配.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    /// 空间 x 方向的 (最小, 最大) 体素坐标.
    pub x: (usize, usize),

    /// 空间 y 方向的 (最小, 最大) 体素坐标.
    pub y: (usize, usize),

    /// 空间 z 方向的 (最小, 最大) 体素坐标.
    pub z: (usize, usize),
}

impl BoundingBox {
    /// 各空间方向的体素延展. 闭区间, 因此为 `max - min + 1`.
    #[inline]
    pub fn extent(&self) -> (usize, usize, usize) {
        (
            self.x.1 - self.x.0 + 1,
            self.y.1 - self.y.0 + 1,
            self.z.1 - self.z.0 + 1,
        )
    }

    /// 盒内体素总数.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        let (a, b, c) = self.extent();
        a * b * c
    }

    /// 将空间表示映射为给定轴序下的逐数组轴 `(min, max)` 对.
    #[inline]
    pub fn array_ranges(&self, order: AxisOrder) -> [(usize, usize); 3] {
        order.order_xyz([self.x, self.y, self.z])
    }
}

impl fmt::Display for BoundingBox {
    /// 单行文本形式: `"{xmin}:{xmax}, {ymin}:{ymax}, {zmin}:{zmax}"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}, {}:{}, {}:{}",
            self.x.0, self.x.1, self.y.0, self.y.1, self.z.0, self.z.1
        )
    }
}

/// 解析 [`BoundingBox`] 文本形式失败.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ParseBoundingBoxError;

impl FromStr for BoundingBox {
    type Err = ParseBoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pairs = [(0usize, 0usize); 3];
        let mut parts = s.split(',');
        for pair in pairs.iter_mut() {
            let part = parts.next().ok_or(ParseBoundingBoxError)?;
            let (lo, hi) = part.trim().split_once(':').ok_or(ParseBoundingBoxError)?;
            let lo = lo.trim().parse().map_err(|_| ParseBoundingBoxError)?;
            let hi = hi.trim().parse().map_err(|_| ParseBoundingBoxError)?;
            if lo > hi {
                return Err(ParseBoundingBoxError);
            }
            *pair = (lo, hi);
        }
        if parts.next().is_some() {
            return Err(ParseBoundingBoxError);
        }
        let [x, y, z] = pairs;
        Ok(BoundingBox { x, y, z })
    }
}

/// 谓词未命中任何体素.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EmptySelection;

/// 计算满足谓词的体素的最小闭区间包围盒.
///
/// `order` 声明 `data` 的轴序, 结果一律以空间 `(x, y, z)` 表示.
/// 没有任何体素满足谓词时返回 `Err(EmptySelection)`,
/// 绝不静默返回零尺寸的退化盒.
pub fn bounding_box<T, P>(
    data: ArrayView3<'_, T>,
    order: AxisOrder,
    pred: P,
) -> Result<BoundingBox, EmptySelection>
where
    T: Copy,
    P: Fn(T) -> bool,
{
    let mut min = [usize::MAX; 3];
    let mut max = [0usize; 3];
    let mut hit = false;

    for ((i, j, k), &v) in data.indexed_iter() {
        if !pred(v) {
            continue;
        }
        hit = true;
        for (axis, idx) in [i, j, k].into_iter().enumerate() {
            min[axis] = min[axis].min(idx);
            max[axis] = max[axis].max(idx);
        }
    }
    if !hit {
        return Err(EmptySelection);
    }

    let [x0, y0, z0] = order.to_xyz(min);
    let [x1, y1, z1] = order.to_xyz(max);
    Ok(BoundingBox {
        x: (x0, x1),
        y: (y0, y1),
        z: (z0, z1),
    })
}

/// 枚举标签体中的聚类及其体素数.
///
/// 返回体素数 ≥ `min_extent` 的 `(标签, 体素数)` 列表, 按标签升序排列
/// 以保证确定性. 背景标签 0 无条件排除, 无论其体素数多大;
/// 有符号标签体中的负值同样按背景处理.
pub fn clusters<L>(labels: ArrayView3<'_, L>, min_extent: usize) -> Vec<(L, usize)>
where
    L: PrimInt,
{
    let mut counts = BTreeMap::new();
    for &v in labels.iter() {
        if v > L::zero() {
            *counts.entry(v).or_insert(0usize) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|&(_, c)| c >= min_extent)
        .collect()
}

/// 包围盒与裁剪实现块.
impl Volume {
    /// 前景 (体素值 > 0) 的包围盒.
    pub fn foreground_bounding_box(&self) -> Result<BoundingBox, EmptySelection> {
        per_dtype!(self.data(), a => bounding_box(a.view(), self.axis_order(), |v| v > (0 as _)))
    }

    /// 值等于 `label` 的体素的包围盒.
    ///
    /// 标签操作要求整数 dtype, 浮点体属于调用方契约错误, 程序 panic.
    pub fn label_bounding_box(&self, label: u32) -> Result<BoundingBox, EmptySelection> {
        let labels = self.to_label_array().expect("标签操作要求整数 dtype");
        bounding_box(labels.view(), self.axis_order(), |v| v == label)
    }

    /// 标签聚类枚举. 语义见 [`clusters`].
    ///
    /// 标签操作要求整数 dtype, 浮点体属于调用方契约错误, 程序 panic.
    pub fn clusters(&self, min_extent: usize) -> Vec<(u32, usize)> {
        let labels = self.to_label_array().expect("标签操作要求整数 dtype");
        clusters(labels.view(), min_extent)
    }

    /// 按闭区间包围盒裁剪出子体 (拷贝). 间距与轴序保持不变.
    ///
    /// 盒超出数据范围时程序 panic.
    pub fn crop(&self, bbox: &BoundingBox) -> Volume {
        let [r0, r1, r2] = bbox.array_ranges(self.axis_order());
        let data = map_dtype!(
            self.data(),
            a => a.slice(s![r0.0..=r0.1, r1.0..=r1.1, r2.0..=r2.1]).to_owned()
        );
        Volume::from_parts(data, *self.meta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{VolumeMeta, VoxelData};
    use ndarray::Array3;

    fn volume_with_block() -> Volume {
        // zyx 序: 块占 z 1..=2, y 0..=1, x 2..=3.
        let mut a = Array3::<u8>::zeros((4, 3, 5));
        a.slice_mut(s![1..=2, 0..=1, 2..=3]).fill(1);
        Volume::from_parts(
            VoxelData::U8(a),
            VolumeMeta::new([1.0, 1.0, 1.0], AxisOrder::Zyx),
        )
    }

    #[test]
    fn test_bounding_box_exact_extent() {
        let v = volume_with_block();
        let bbox = v.foreground_bounding_box().unwrap();
        assert_eq!(bbox.x, (2, 3));
        assert_eq!(bbox.y, (0, 1));
        assert_eq!(bbox.z, (1, 2));
        assert_eq!(bbox.extent(), (2, 2, 2));
        assert_eq!(bbox.voxel_count(), 8);
    }

    #[test]
    fn test_bounding_box_empty_is_an_error() {
        let v = Volume::from_parts(
            VoxelData::U8(Array3::zeros((2, 2, 2))),
            VolumeMeta::new([1.0, 1.0, 1.0], AxisOrder::Zyx),
        );
        assert_eq!(v.foreground_bounding_box(), Err(EmptySelection));
    }

    #[test]
    fn test_bounding_box_text_roundtrip() {
        let v = volume_with_block();
        let bbox = v.foreground_bounding_box().unwrap();
        let text = bbox.to_string();
        assert_eq!(text, "2:3, 0:1, 1:2");
        assert_eq!(text.parse::<BoundingBox>().unwrap(), bbox);

        assert!("2:3, 0:1".parse::<BoundingBox>().is_err());
        assert!("3:2, 0:1, 1:2".parse::<BoundingBox>().is_err());
        assert!("a:3, 0:1, 1:2".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn test_crop_matches_serialization_convention() {
        let v = volume_with_block();
        let bbox = v.foreground_bounding_box().unwrap();
        let cropped = v.crop(&bbox);
        // 闭区间: 裁剪结果的形状等于 extent.
        assert_eq!(cropped.shape(), (2, 2, 2)); // zyx 序
        match cropped.data() {
            VoxelData::U8(a) => assert!(a.iter().all(|&p| p == 1)),
            other => panic!("dtype 不应改变: {:?}", other.dtype()),
        }
    }

    #[test]
    fn test_cluster_min_extent_filter() {
        // 三个标签, 体素数分别为 5 / 50 / 500.
        let mut a = Array3::<u32>::zeros((10, 10, 10));
        a.slice_mut(s![0, 0, 0..5]).fill(7);
        a.slice_mut(s![1, 0..5, 0..10]).fill(2);
        a.slice_mut(s![3..8, 0..10, 0..10]).fill(9);
        let v = Volume::from_parts(
            VoxelData::U32(a),
            VolumeMeta::new([1.0, 1.0, 1.0], AxisOrder::Zyx),
        );

        assert_eq!(v.clusters(100), vec![(9, 500)]);
        // 不设阈值时按标签升序给出全部聚类.
        assert_eq!(v.clusters(1), vec![(2, 50), (7, 5), (9, 500)]);
        // 背景 0 无论多大都不出现.
        assert_eq!(v.clusters(0).len(), 3);
    }

    #[test]
    fn test_label_bounding_box_on_label_id() {
        let v = volume_with_block();
        assert!(v.label_bounding_box(1).is_ok());
        assert_eq!(v.label_bounding_box(2), Err(EmptySelection));
    }
}
