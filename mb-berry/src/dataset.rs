//! 数据集操作.
//!
//! 提供迭代器风格的多样本批量加载模式, 供组统计与平均脚本使用.

use std::path::{Path, PathBuf};

use crate::volume::{LoadOptions, Volume};
use crate::LoadError;

/// 文件名构造器. 接受样本索引数, 获得文件名.
pub type FilenameBuilder = fn(u32) -> String;

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 从指定索引、路径、文件名构造器来创建通用的样本体加载器.
///
/// # 注意
///
/// 1. `path` 必须是目录, 否则程序 panic.
/// 2. `data` 的所有取值 `value` 必须在 `path` 下有形如 `builder(value)`
///   的受支持数据源, 否则加载器在迭代时会返回 `Result::Error`.
pub fn volume_loader<I: IntoIterator<Item = u32>, P: AsRef<Path>>(
    data: I,
    path: P,
    builder: FilenameBuilder,
    options: LoadOptions,
) -> VolumeLoader {
    let path = path.as_ref().to_owned();
    assert!(path.is_dir());

    let mut data: Vec<u32> = data.into_iter().collect();
    data.reverse();

    VolumeLoader {
        path,
        data_rev: data,
        builder,
        options,
    }
}

/// 样本体加载器, 在内部自动转换文件名并逐个规范化.
#[derive(Debug)]
pub struct VolumeLoader {
    path: PathBuf,
    data_rev: Vec<u32>,
    builder: FilenameBuilder,
    options: LoadOptions,
}

impl Iterator for VolumeLoader {
    type Item = (u32, Result<Volume, LoadError>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.data_rev.pop()?;

        self.path.push((self.builder)(idx));
        let data = Volume::open(self.path.as_path(), &self.options);
        self.path.pop();

        Some((idx, data))
    }
}

impl ExactSizeIterator for VolumeLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}
