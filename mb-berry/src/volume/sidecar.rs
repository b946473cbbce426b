//! 体素间距 sidecar 文件.
//!
//! 编号切片目录、多通道 npz 归档等格式不携带体素间距元数据. sidecar
//! 是数据源旁的小型 key/value 文本文件, 在原生元数据缺失时由规范化构建
//! 读取. 缺失的 sidecar 按 "不存在" 处理, 从不报错.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::consts::{SIDECAR_DIR_FILE, SIDECAR_SUFFIX};

/// sidecar 文件的约定位置.
///
/// 1. 文件型数据源: 同目录下 `{完整文件名}.spacing` (如 `brain.npz.spacing`);
/// 2. 目录型数据源: 目录内 `spacing.txt`.
pub fn sidecar_path(source: &Path) -> PathBuf {
    if source.is_dir() {
        source.join(SIDECAR_DIR_FILE)
    } else {
        match source.file_name() {
            Some(name) => {
                let mut n = name.to_os_string();
                n.push(".");
                n.push(SIDECAR_SUFFIX);
                source.with_file_name(n)
            }
            None => source.with_extension(SIDECAR_SUFFIX),
        }
    }
}

/// 读取 `source` 旁的 sidecar 间距, 按空间 `(x, y, z)` 序返回, 单位微米.
///
/// sidecar 缺失、无法解析或值非正时均返回 `None` (后两者会记一条 warn 日志).
pub fn read_sidecar(source: &Path) -> Option<[f64; 3]> {
    let path = sidecar_path(source);
    let text = fs::read_to_string(&path).ok()?;
    let spacing = parse(&text);
    if spacing.is_none() {
        warn!("sidecar 存在但无法解析出合法间距: {path:?}");
    }
    spacing
}

/// 将空间 `(x, y, z)` 序的间距写入 `source` 旁的 sidecar 文件.
///
/// 只有规范化构建允许调用该函数 (全库唯一的 sidecar 写入位置).
pub fn write_sidecar(source: &Path, [x, y, z]: [f64; 3]) -> std::io::Result<()> {
    let body = format!(
        "# 体素间距, 单位微米. 由 mb-berry 在首次成功解析后回写.\n\
         spacing_x_um: {x}\n\
         spacing_y_um: {y}\n\
         spacing_z_um: {z}\n"
    );
    fs::write(sidecar_path(source), body)
}

/// 解析自由格式 key/value 文本. 未知键、注释与空行一律忽略.
fn parse(text: &str) -> Option<[f64; 3]> {
    let (mut x, mut y, mut z) = (None, None, None);
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "spacing_x_um" => x = value.parse::<f64>().ok(),
            "spacing_y_um" => y = value.parse::<f64>().ok(),
            "spacing_z_um" => z = value.parse::<f64>().ok(),
            _ => {}
        }
    }
    let spacing = [x?, y?, z?];
    spacing
        .iter()
        .all(|s| s.is_finite() && *s > 0.0)
        .then_some(spacing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerates_noise() {
        let text = "\
# 注释行
spacing_x_um: 4.06

operator: someone else   : with colons
spacing_y_um:\t4.06
spacing_z_um: 3
";
        assert_eq!(parse(text), Some([4.06, 4.06, 3.0]));
    }

    #[test]
    fn test_parse_rejects_incomplete_or_invalid() {
        assert_eq!(parse("spacing_x_um: 1\nspacing_y_um: 1\n"), None);
        assert_eq!(
            parse("spacing_x_um: 1\nspacing_y_um: 1\nspacing_z_um: -2\n"),
            None
        );
        assert_eq!(
            parse("spacing_x_um: a\nspacing_y_um: 1\nspacing_z_um: 1\n"),
            None
        );
    }

    #[test]
    fn test_path_convention_for_files() {
        let p = sidecar_path(Path::new("/data/brain.npz"));
        assert_eq!(p, PathBuf::from("/data/brain.npz.spacing"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = std::env::temp_dir().join(format!("mb-berry-sidecar-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let source = dir.join("sample.npz");
        fs::write(&source, b"x").unwrap();

        write_sidecar(&source, [4.0, 4.0, 3.0]).unwrap();
        assert_eq!(read_sidecar(&source), Some([4.0, 4.0, 3.0]));

        fs::remove_dir_all(&dir).unwrap();
    }
}
