//! 压缩多通道显微归档 (`.npz`) 适配器. 只读.
//!
//! 归档内每个通道是一个独立条目 `channel{i}.npy`. 读取按条目名精确
//! 定位, 只解压被请求的那个通道, 其余通道的数据从不被实体化.
//! 通道体素固定为 `u16` (光片相机的惯用位深).

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;

use super::FormatError;
use crate::volume::{AxisOrder, RawData, RawVolume};

/// 多通道显微归档.
///
/// 该结构可建模硬盘上已存储的多通道光片扫描压缩文件,
/// 以通道为单位惰性读取.
pub struct ChannelArchive {
    entry: Mutex<NpzReader<std::fs::File>>,
}

impl ChannelArchive {
    /// 打开归档文件.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        Ok(Self {
            entry: Mutex::new(NpzReader::new(file)?),
        })
    }

    /// 获取归档包含的所有条目名.
    pub fn channel_names(&self) -> Result<Vec<String>, FormatError> {
        Ok(self.entry.lock().unwrap().names()?)
    }

    /// 获取归档的通道个数.
    pub fn channel_len(&self) -> Result<usize, FormatError> {
        Ok(self.entry.lock().unwrap().len())
    }

    /// 按索引读取单个通道. 只有该通道的条目会被解压.
    ///
    /// 请求的条目不存在时返回 [`FormatError::MissingChannel`].
    pub fn channel(&self, index: usize) -> Result<ArrayD<u16>, FormatError> {
        let name = entry_name(index);
        if !self.channel_names()?.iter().any(|n| *n == name) {
            return Err(FormatError::MissingChannel(name));
        }
        let mut reader = self.entry.lock().unwrap();
        Ok(reader.by_name::<OwnedRepr<u16>, IxDyn>(&name)?)
    }
}

/// 通道索引到归档条目名的约定映射.
#[inline]
fn entry_name(index: usize) -> String {
    format!("channel{index}.npy")
}

/// 读取归档的第 `channel` 个通道. 条目按本库约定以 `[z, y, x]` 存储;
/// 归档不携带间距元数据, 间距依赖 sidecar 或显式覆盖.
pub(crate) fn read(path: &Path, channel: usize) -> Result<RawVolume, FormatError> {
    let archive = ChannelArchive::open(path)?;
    let data = archive.channel(channel)?;
    Ok(RawVolume {
        data: RawData::U16(data),
        axis_order: AxisOrder::Zyx,
        native_spacing_um: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, ArrayD};
    use ndarray_npy::NpzWriter;
    use std::fs::{self, File};
    use std::path::PathBuf;

    fn write_archive(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("mb-berry-channels-{}-{tag}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scan.npz");

        let mut ch0 = Array3::<u16>::zeros((2, 2, 2));
        ch0.fill(11);
        let mut ch1 = Array3::<u16>::zeros((2, 2, 2));
        ch1[(1, 1, 1)] = 999;

        let mut npz = NpzWriter::new_compressed(File::create(&path).unwrap());
        npz.add_array("channel0.npy", &ch0).unwrap();
        npz.add_array("channel1.npy", &ch1).unwrap();
        npz.finish().unwrap();
        path
    }

    #[test]
    fn test_reads_only_the_selected_channel() {
        let path = write_archive("select");
        let archive = ChannelArchive::open(&path).unwrap();
        assert_eq!(archive.channel_len().unwrap(), 2);

        // 读取通道 1: 内容来自 channel1, 与 channel0 的常量 11 无关.
        let c1: ArrayD<u16> = archive.channel(1).unwrap();
        assert_eq!(c1.shape(), &[2, 2, 2]);
        assert_eq!(c1[[1, 1, 1]], 999);
        assert!(c1.iter().all(|&v| v == 0 || v == 999));

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_missing_channel_is_an_error() {
        let path = write_archive("missing");
        let archive = ChannelArchive::open(&path).unwrap();
        match archive.channel(7) {
            Err(FormatError::MissingChannel(name)) => assert_eq!(name, "channel7.npy"),
            other => panic!("应报 MissingChannel: {other:?}"),
        }
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_read_as_raw_volume() {
        let path = write_archive("raw");
        let raw = read(&path, 0).unwrap();
        assert_eq!(raw.axis_order, AxisOrder::Zyx);
        assert!(raw.native_spacing_um.is_none());
        match raw.data {
            RawData::U16(a) => assert!(a.iter().all(|&v| v == 11)),
            other => panic!("通道体素应为 u16: {other:?}"),
        }
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
