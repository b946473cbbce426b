#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供光片显微 (light-sheet) 与 MRI 小鼠脑三维图像的规范化表示
//! 和基础区域拓扑算法.
//!
//! 该 crate 目前仅提供 `safe` 接口. 将来可能为部分高性能场景关键路径提供
//! `unsafe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 面向预处理后的全脑体数据 (单样本单体), 不直接适配
//!   4D 时序数据 (但首/尾单例轴会在规范化时被自动去除).
//! 2. 在非期望情况下, 程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 多格式规范化加载 ✅
//!
//! 将 nifti 容器、多通道 npz 归档、编号切片目录和 zarr 分块存储统一转换为
//! 规范体 (canonical volume): 三维数组 + 轴序 + 体素间距 + 数据类型.
//!
//! 实现位于 `mb-berry/src/volume` 和 `mb-berry/src/io`.
//!
//! ### 体素间距 sidecar ✅
//!
//! 原生元数据缺失时从 sidecar 文件解析间距; 首次成功解析后回写 sidecar,
//! 使同一数据源的后续加载不再重复推导.
//!
//! 实现位于 `mb-berry/src/volume/sidecar.rs`.
//!
//! ### 包围盒与连通域聚类 ✅
//!
//! 对强度阈值掩码或整数标签体计算逐区域体素范围 (闭区间包围盒),
//! 并按最小体素数阈值枚举连通域.
//!
//! 实现位于 `mb-berry/src/region`.
//!
//! ### 区域边界 (wireframe) 提取 ✅
//!
//! 逐标签独立计算膨胀 XOR 腐蚀的边缘环, 以可结合、可交换的逻辑 OR 合并.
//! 串行与并行路径输出逐位一致.
//!
//! 实现位于 `mb-berry/src/wireframe.rs` 与 `mb-berry/src/morph.rs`.
//!
//! ### 双侧对称化 ✅
//!
//! 沿指定轴翻转 + 整数体素平移以校正图谱偏心, 再与原体 (或另一半球体)
//! 以宽类型求平均.
//!
//! 实现位于 `mb-berry/src/symmetry.rs`.
//!
//! ### 数据集迭代加载 ✅
//!
//! 提供按索引编号批量加载样本体的迭代器, 供组统计脚本使用.
//!
//! 实现位于 `mb-berry/src/dataset.rs`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private API 提供文档.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 规范体数据结构与规范化构建.
mod volume;

pub use volume::{
    build, sidecar, AxisOrder, BuildError, Dtype, LoadOptions, RawData, RawVolume, Volume,
    VolumeAttr, VolumeMeta, VoxelData,
};

pub mod consts;

/// 区域包围盒与连通域聚类.
pub mod region;

pub use region::{BoundingBox, EmptySelection};

/// 三维二值形态学原语.
pub mod morph;

pub use morph::Connectivity;

/// 区域邻接边界提取.
pub mod wireframe;

pub use wireframe::Wireframe;

/// 镜像与双侧对称化.
pub mod symmetry;

/// 格式适配与持久化.
pub mod io;

pub use io::{Format, FormatError, LoadError};

pub mod dataset;
pub mod prelude;
