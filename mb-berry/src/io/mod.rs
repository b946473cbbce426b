//! 格式适配与持久化.
//!
//! 每种支持的格式对应恰好一个适配器; 适配器选择只看扩展名与
//! "目录还是文件" 的区别, 从不嗅探内容. 所有适配器都把数据读成
//! [`RawVolume`], 由规范化构建 ([`crate::build`]) 统一转换; 写出时
//! 由调用方显式给出磁盘轴序, 写出器绝不静默重排轴.

mod channels;
mod nifti;
mod stack;
mod zarr;

pub use channels::ChannelArchive;
pub use zarr::ZarrStore;

use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;

use crate::volume::{AxisOrder, BuildError, Dtype, LoadOptions, RawVolume, Volume};

/// 支持的存储格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    /// 医学影像容器 (`.nii` / `.nii.gz`).
    Nifti,

    /// 编号单平面图像文件目录 (`Z0000.tif`, `Z0001.tif`, ...).
    PlaneStack,

    /// 压缩多通道显微归档 (`.npz`, 每通道一个条目). 只读.
    ChannelArchive,

    /// 分块数组存储 (`.zarr` 目录, 可多分辨率层级).
    Zarr,
}

/// 扩展名注册表. 新格式在此登记即可被 [`detect`] 识别.
static EXTENSIONS: Lazy<Vec<(&'static str, Format)>> = Lazy::new(|| {
    vec![
        (".nii.gz", Format::Nifti),
        (".nii", Format::Nifti),
        (".npz", Format::ChannelArchive),
        (".zarr", Format::Zarr),
    ]
});

/// 格式适配与持久化错误.
#[derive(Debug)]
pub enum FormatError {
    /// 扩展名不被任何适配器认领.
    Unsupported(PathBuf),

    /// 该格式不支持写出 (多通道显微归档只读).
    Unwritable(Format),

    /// 体素类型超出适配器支持范围. 携带描述信息.
    UnsupportedVoxelType(String),

    /// 切片目录中没有任何平面图像.
    EmptyStack(PathBuf),

    /// 切片目录中某平面的形状或像素类型与首张不一致.
    StackMismatch(PathBuf),

    /// 归档中不存在请求的通道条目.
    MissingChannel(String),

    /// 并行任务中的第一个失败. 余下任务被尽快放弃.
    Worker(Box<FormatError>),

    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// nifti 容器错误.
    Nifti(::nifti::error::NiftiError),

    /// 平面图像编解码错误.
    Image(image::ImageError),

    /// npz 归档读取错误.
    Npz(ndarray_npy::ReadNpzError),

    /// zarr 存储层错误.
    ZarrStorage(zarrs::storage::StorageError),

    /// zarr 数组操作错误.
    ZarrArray(zarrs::array::ArrayError),

    /// zarr 数组创建/打开错误.
    ZarrCreate(zarrs::array::ArrayCreateError),

    /// 其他 zarr 错误 (store 构建、codec 配置等).
    Zarr(String),
}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        FormatError::Io(e)
    }
}

impl From<::nifti::error::NiftiError> for FormatError {
    fn from(e: ::nifti::error::NiftiError) -> Self {
        FormatError::Nifti(e)
    }
}

impl From<image::ImageError> for FormatError {
    fn from(e: image::ImageError) -> Self {
        FormatError::Image(e)
    }
}

impl From<ndarray_npy::ReadNpzError> for FormatError {
    fn from(e: ndarray_npy::ReadNpzError) -> Self {
        FormatError::Npz(e)
    }
}

/// 组合加载错误: 适配器读取或规范化构建任一阶段的失败.
#[derive(Debug)]
pub enum LoadError {
    /// 适配器读取失败.
    Format(FormatError),

    /// 规范化构建失败.
    Build(BuildError),
}

impl From<FormatError> for LoadError {
    fn from(e: FormatError) -> Self {
        LoadError::Format(e)
    }
}

impl From<BuildError> for LoadError {
    fn from(e: BuildError) -> Self {
        LoadError::Build(e)
    }
}

/// 按扩展名与目录/文件区别选择适配器. 从不打开文件嗅探内容.
///
/// `.zarr` 目录归 zarr 适配器; 其余目录 (含尚未创建的无扩展名写出目标)
/// 归切片目录适配器; 文件按注册表后缀匹配, 未命中返回
/// [`FormatError::Unsupported`].
pub fn detect(path: &Path) -> Result<Format, FormatError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FormatError::Unsupported(path.to_owned()))?;

    if name.ends_with(".zarr") {
        return Ok(Format::Zarr);
    }
    if path.is_dir() || !name.contains('.') {
        return Ok(Format::PlaneStack);
    }
    EXTENSIONS
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|&(_, f)| f)
        .ok_or_else(|| FormatError::Unsupported(path.to_owned()))
}

/// 读取 `path` 为原始体. 适配器由 [`detect`] 选择.
///
/// `opts.channel` / `opts.level` 仅对相应格式生效, 其余格式忽略.
pub fn read(path: &Path, opts: &LoadOptions) -> Result<RawVolume, FormatError> {
    let format = detect(path)?;
    debug!("read: {} -> {format:?}", path.display());
    match format {
        Format::Nifti => nifti::read(path),
        Format::PlaneStack => stack::read(path),
        Format::ChannelArchive => channels::read(path, opts.channel),
        Format::Zarr => zarr::read(path, opts.level),
    }
}

/// 将规范体写出到 `path`, 磁盘轴序由 `order` 显式给出.
///
/// 格式由 [`detect`] 选择; 多通道显微归档不支持写出. 失败时磁盘上
/// 可能留下写到一半的输出, 但绝不会有任何 "写出完成" 的标记.
pub fn write(volume: &Volume, path: &Path, order: AxisOrder) -> Result<(), FormatError> {
    write_as(volume, path, detect(path)?, order)
}

/// 与 [`write`] 相同, 但由调用方显式指定格式 (format hint),
/// 跳过扩展名检测.
pub fn write_as(
    volume: &Volume,
    path: &Path,
    format: Format,
    order: AxisOrder,
) -> Result<(), FormatError> {
    debug!("write: {} <- {format:?}", path.display());
    match format {
        Format::Nifti => nifti::write(volume, path, order),
        Format::PlaneStack => stack::write(volume, path, order),
        Format::ChannelArchive => Err(FormatError::Unwritable(Format::ChannelArchive)),
        Format::Zarr => zarr::write(volume, path, order),
    }
}

/// 持久化实现块.
impl Volume {
    /// 打开任一支持格式的数据源并规范化. `读取 + 构建` 的组合入口.
    pub fn open(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Volume, LoadError> {
        let raw = read(path.as_ref(), opts)?;
        Ok(crate::build::build(raw, path.as_ref(), opts)?)
    }

    /// 写出到任一支持的输出格式, 磁盘轴序由 `order` 显式给出.
    ///
    /// 间距/方向元信息按格式能力保留: nifti 写入 `pixdim`, zarr 写入
    /// 数组 attributes, 切片目录依赖 sidecar.
    #[inline]
    pub fn save(&self, path: impl AsRef<Path>, order: AxisOrder) -> Result<(), FormatError> {
        write(self, path.as_ref(), order)
    }

    /// 与 [`Volume::save`] 相同, 但显式指定格式.
    #[inline]
    pub fn save_as(
        &self,
        path: impl AsRef<Path>,
        format: Format,
        order: AxisOrder,
    ) -> Result<(), FormatError> {
        write_as(self, path.as_ref(), format, order)
    }
}

/// 把 dtype 映射为人可读名称, 用于错误信息.
pub(crate) fn dtype_name(dtype: Dtype) -> &'static str {
    match dtype {
        Dtype::U8 => "u8",
        Dtype::U16 => "u16",
        Dtype::I16 => "i16",
        Dtype::I32 => "i32",
        Dtype::U32 => "u32",
        Dtype::F32 => "f32",
        Dtype::F64 => "f64",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension_and_dir() {
        assert_eq!(detect(Path::new("a/brain.nii")).unwrap(), Format::Nifti);
        assert_eq!(detect(Path::new("a/brain.nii.gz")).unwrap(), Format::Nifti);
        assert_eq!(
            detect(Path::new("a/brain.npz")).unwrap(),
            Format::ChannelArchive
        );
        assert_eq!(detect(Path::new("a/brain.zarr")).unwrap(), Format::Zarr);
        // 无扩展名的 (可能尚未创建的) 目标按切片目录处理.
        assert_eq!(detect(Path::new("a/planes")).unwrap(), Format::PlaneStack);
        assert!(matches!(
            detect(Path::new("a/brain.czi")),
            Err(FormatError::Unsupported(_))
        ));
    }

    #[test]
    fn test_channel_archive_is_read_only() {
        use crate::volume::{VolumeMeta, VoxelData};
        use ndarray::Array3;

        let v = Volume::from_parts(
            VoxelData::U16(Array3::zeros((1, 1, 1))),
            VolumeMeta::new([1.0, 1.0, 1.0], AxisOrder::Zyx),
        );
        match v.save_as("/tmp/x.npz", Format::ChannelArchive, AxisOrder::Zyx) {
            Err(FormatError::Unwritable(Format::ChannelArchive)) => {}
            other => panic!("npz 归档应当只读: {other:?}"),
        }
    }
}
