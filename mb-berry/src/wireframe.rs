//! 区域邻接边界 (wireframe) 提取.
//!
//! 对标签体中每个正标签独立计算 "膨胀 XOR 腐蚀" 的边缘环, 再以逻辑 OR
//! 合并为单一二值 wireframe. OR 可结合、可交换, 因此并行归约与串行回退
//! 的输出逐位一致, 与 worker 数和标签处理顺序无关.

use std::collections::BTreeSet;

use ndarray::{Array3, ArrayView3, Zip};

use crate::morph::{dilate, erode, Connectivity};
use crate::Volume;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// wireframe 提取结果: 共配准的二值边界掩码与带标签边界.
#[derive(Debug, Clone)]
pub struct Wireframe {
    /// 二值边界掩码.
    pub mask: Array3<bool>,

    /// 带标签边界: 边界体素保留其在输入标签体中的标签, 其余为 0.
    /// 因此每个边界体素恰好归属于它所在的那一个区域.
    pub labeled: Array3<u32>,
}

/// 串行提取 wireframe.
pub fn wireframe(labels: ArrayView3<'_, u32>) -> Wireframe {
    let ids = unique_labels(labels);
    log::debug!("wireframe: {} 个标签, 串行路径", ids.len());
    let init = Array3::from_elem(labels.dim(), false);
    let mask = ids
        .iter()
        .fold(init, |acc, &k| or_masks(acc, label_rim(labels, k)));
    finish(labels, mask)
}

/// 并行提取 wireframe. 输出与 [`wireframe`] 逐位一致.
///
/// 逐标签任务只读共享标签体, 各自产生局部边缘环, 最后以显式 reduce
/// 合并; 没有任何未同步的共享可变状态.
#[cfg(feature = "rayon")]
pub fn par_wireframe(labels: ArrayView3<'_, u32>) -> Wireframe {
    let ids = unique_labels(labels);
    log::debug!("wireframe: {} 个标签, rayon 并行路径", ids.len());
    let dim = labels.dim();
    let mask = ids
        .par_iter()
        .map(|&k| label_rim(labels, k))
        .reduce(|| Array3::from_elem(dim, false), or_masks);
    finish(labels, mask)
}

/// 输入中出现的正标签集合, 升序.
fn unique_labels(labels: ArrayView3<'_, u32>) -> Vec<u32> {
    let set: BTreeSet<u32> = labels.iter().copied().filter(|&v| v != 0).collect();
    set.into_iter().collect()
}

/// 单个标签的边缘环: 该标签二值掩码膨胀与腐蚀不一致的体素.
fn label_rim(labels: ArrayView3<'_, u32>, k: u32) -> Array3<bool> {
    let mask = labels.mapv(|v| v == k);
    let dilated = dilate(mask.view(), Connectivity::Six);
    let eroded = erode(mask.view(), Connectivity::Six);
    Zip::from(&dilated)
        .and(&eroded)
        .map_collect(|&d, &e| d != e)
}

/// 逻辑 OR 归约算子. 可结合、可交换, 这是并行确定性的全部前提.
fn or_masks(mut acc: Array3<bool>, rim: Array3<bool>) -> Array3<bool> {
    acc.zip_mut_with(&rim, |a, &b| *a = *a || b);
    acc
}

fn finish(labels: ArrayView3<'_, u32>, mask: Array3<bool>) -> Wireframe {
    let labeled = Zip::from(&mask)
        .and(labels)
        .map_collect(|&m, &l| if m { l } else { 0 });
    Wireframe { mask, labeled }
}

/// wireframe 实现块.
impl Volume {
    /// 对整数标签体提取 wireframe.
    ///
    /// 启用 `rayon` feature 时走并行路径, 否则串行; 两者输出逐位一致.
    /// 浮点体属于调用方契约错误, 程序 panic.
    pub fn label_wireframe(&self) -> Wireframe {
        let labels = self.to_label_array().expect("wireframe 要求整数标签体");
        #[cfg(feature = "rayon")]
        return par_wireframe(labels.view());

        #[cfg(not(feature = "rayon"))]
        wireframe(labels.view())
    }
}
