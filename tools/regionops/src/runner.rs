//! 程序运行函数.
//!
//! 环境变量约定:
//!
//! | 变量 | 含义 |
//! |---|---|
//! | `MB_OP` | 操作: `convert` / `bbox` / `clusters` / `wireframe` / `symmetrize` |
//! | `MB_INPUT` | 输入数据源路径 |
//! | `MB_OUTPUT` | 输出路径 (需要写出的操作) |
//! | `MB_SPACING_UM` | 显式间距覆盖, 形如 `4.06,4.06,3` (空间 x,y,z 序, 微米) |
//! | `MB_CHANNEL` | 多通道归档的通道索引, 默认 0 |
//! | `MB_LEVEL` | 分块存储的分辨率层级, 默认 0 |
//! | `MB_LABEL` | `bbox` 操作的标签 id; 缺省时按前景 (>0) 计算 |
//! | `MB_MIN_EXTENT` | `clusters` 操作的最小体素数阈值, 默认 1 |
//! | `MB_AXIS` | `symmetrize` 的数组轴, 默认 0 |
//! | `MB_SHIFT` | `symmetrize` 的平移体素数, 默认 0 |

use std::env;
use std::path::PathBuf;

use mb_berry::prelude::*;
use ndarray::Axis;

use crate::result::OpReport;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn spacing_from_env() -> Option<[f64; 3]> {
    let raw = env::var("MB_SPACING_UM").ok()?;
    let mut it = raw.split(',').map(|p| p.trim().parse::<f64>());
    let spacing = [it.next()?.ok()?, it.next()?.ok()?, it.next()?.ok()?];
    it.next().is_none().then_some(spacing)
}

fn load_options() -> LoadOptions {
    LoadOptions {
        spacing_um: spacing_from_env(),
        channel: env_parse("MB_CHANNEL", 0),
        level: env_parse("MB_LEVEL", 0),
        ..LoadOptions::default()
    }
}

/// 实际运行.
pub fn run() -> OpReport {
    let op = env::var("MB_OP").expect("必须通过 $MB_OP 指定操作");
    let input = PathBuf::from(env::var("MB_INPUT").expect("必须通过 $MB_INPUT 指定输入"));
    assert!(input.exists(), "输入不存在: {}", input.display());

    let volume = Volume::open(&input, &load_options()).expect("输入加载失败");
    let mut report = OpReport::new(op.clone());
    report.push(format!(
        "input: {} ({:?}, shape {:?}, {} cpus available)",
        input.display(),
        volume.dtype(),
        volume.shape(),
        utils::cpus(),
    ));

    match op.as_str() {
        "convert" => {
            let output = output_path();
            volume.save(&output, volume.axis_order()).expect("写出失败");
            report.push(format!("converted -> {}", output.display()));
        }
        "bbox" => {
            let bbox = match env::var("MB_LABEL").ok().and_then(|v| v.parse().ok()) {
                Some(label) => volume.label_bounding_box(label),
                None => volume.foreground_bounding_box(),
            }
            .expect("谓词未命中任何体素");
            report.push(bbox.to_string());
        }
        "clusters" => {
            let min_extent = env_parse("MB_MIN_EXTENT", 1usize);
            for (label, count) in volume.clusters(min_extent) {
                report.push(format!("label {label}: {count} voxels"));
            }
        }
        "wireframe" => {
            let output = output_path();
            let wf = volume.label_wireframe();
            let labeled = Volume::from_parts(VoxelData::U32(wf.labeled), *volume.meta());
            labeled.save(&output, labeled.axis_order()).expect("写出失败");
            report.push(format!("labeled wireframe -> {}", output.display()));
        }
        "symmetrize" => {
            let output = output_path();
            let axis = Axis(env_parse("MB_AXIS", 0usize));
            let shift = env_parse("MB_SHIFT", 0usize);
            // 对称化结果为 f64, 写出前降回源 dtype.
            let sym = volume.symmetrize(axis, shift).cast(volume.dtype());
            sym.save(&output, sym.axis_order()).expect("写出失败");
            report.push(format!("symmetrized -> {}", output.display()));
        }
        other => panic!("未知操作 `{other}`"),
    }
    report
}

fn output_path() -> PathBuf {
    PathBuf::from(env::var("MB_OUTPUT").expect("该操作必须通过 $MB_OUTPUT 指定输出"))
}
