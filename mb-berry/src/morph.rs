//! 三维二值形态学原语: 单步膨胀与腐蚀.
//!
//! 这是 wireframe 提取与连通域标注共用的底层服务. 结构元只有两种:
//! 钻石型 (6-连通) 与立方体型 (26-连通).

use itertools::iproduct;
use ndarray::{Array3, ArrayView3};
use once_cell::sync::Lazy;

use crate::Idx3d;

/// 邻域连通性, 同时决定结构元形状.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Connectivity {
    /// 6-连通 (钻石型结构元): 仅面相邻.
    Six,

    /// 26-连通 (立方体结构元): 面、棱、角均相邻.
    TwentySix,
}

/// 6-连通邻域偏移.
const DIAMOND: [(isize, isize, isize); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// 26-连通邻域偏移.
static BOX26: Lazy<Vec<(isize, isize, isize)>> = Lazy::new(|| {
    iproduct!(-1..=1isize, -1..=1isize, -1..=1isize)
        .filter(|&o| o != (0, 0, 0))
        .collect()
});

impl Connectivity {
    /// 该连通性对应的邻域偏移表.
    pub(crate) fn offsets(self) -> &'static [(isize, isize, isize)] {
        match self {
            Connectivity::Six => &DIAMOND,
            Connectivity::TwentySix => BOX26.as_slice(),
        }
    }
}

/// 带越界检查的索引偏移. 偏移出网格时返回 `None`.
pub(crate) fn offset(
    (i, j, k): Idx3d,
    (di, dj, dk): (isize, isize, isize),
    (ni, nj, nk): Idx3d,
) -> Option<Idx3d> {
    let i = i.checked_add_signed(di)?;
    let j = j.checked_add_signed(dj)?;
    let k = k.checked_add_signed(dk)?;
    (i < ni && j < nj && k < nk).then_some((i, j, k))
}

/// 单步二值膨胀. 网格外一律视为背景.
pub fn dilate(mask: ArrayView3<'_, bool>, conn: Connectivity) -> Array3<bool> {
    let dim = mask.dim();
    let mut out = mask.to_owned();
    for (pos, &v) in mask.indexed_iter() {
        if !v {
            continue;
        }
        for &d in conn.offsets() {
            if let Some(p) = offset(pos, d, dim) {
                out[p] = true;
            }
        }
    }
    out
}

/// 单步二值腐蚀. 网格外一律视为背景, 因此贴边的前景体素总会被腐蚀掉.
pub fn erode(mask: ArrayView3<'_, bool>, conn: Connectivity) -> Array3<bool> {
    let dim = mask.dim();
    let mut out = mask.to_owned();
    for (pos, &v) in mask.indexed_iter() {
        if !v {
            continue;
        }
        let keep = conn
            .offsets()
            .iter()
            .all(|&d| offset(pos, d, dim).is_some_and(|p| mask[p]));
        if !keep {
            out[pos] = false;
        }
    }
    out
}
