//! 对 `mb-berry::dataset` 的更一层封装. 提供更直接的数据集加载器.

use mb_berry::dataset::{self, volume_loader, VolumeLoader};
use mb_berry::LoadOptions;
use std::env;
use std::path::{Path, PathBuf};

/// 样本文件命名约定: `sample-{index}.nii.gz`.
pub fn sample_name(index: u32) -> String {
    format!("sample-{index}.nii.gz")
}

/// 获取脑样本数据基本路径.
///
/// 1. 若环境变量 `$MB_SAMPLE_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/brain`.
pub fn sample_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("MB_SAMPLE_DIR") {
        PathBuf::from(d)
    } else {
        dataset::home_dataset_dir_with(["brain"]).unwrap()
    }
}

/// 获取前 `count` 个样本的加载器.
pub fn sample_loader<P: AsRef<Path>>(path: P, count: u32, options: LoadOptions) -> VolumeLoader {
    volume_loader(0..count, path, sample_name, options)
}

/// 从 `$MB_SAMPLE_DIR` 或 `$HOME/dataset/brain` 下获取前 `count`
/// 个样本的加载器.
#[inline]
pub fn sample_loader_from_env_or_home(count: u32, options: LoadOptions) -> VolumeLoader {
    sample_loader(sample_dir_from_env_or_home(), count, options)
}
