//! 连通域标注.

use std::collections::VecDeque;

use ndarray::{Array3, ArrayView3};

use crate::morph::{offset, Connectivity};
use crate::Volume;

/// 对二值掩码做连通域标注.
///
/// 返回 `(标签体, 连通域个数)`. 标签从 1 开始、按行优先扫描顺序分配,
/// 背景为 0. 相同输入总是产生相同标注 (确定性), 与调用次数无关.
pub fn label_components(mask: ArrayView3<'_, bool>, conn: Connectivity) -> (Array3<u32>, u32) {
    let dim = mask.dim();
    let mut labels = Array3::<u32>::zeros(dim);
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for (pos, &v) in mask.indexed_iter() {
        if !v || labels[pos] != 0 {
            continue;
        }
        next += 1;
        labels[pos] = next;
        queue.push_back(pos);

        while let Some(p) = queue.pop_front() {
            for &d in conn.offsets() {
                let Some(n) = offset(p, d, dim) else {
                    continue;
                };
                if mask[n] && labels[n] == 0 {
                    labels[n] = next;
                    queue.push_back(n);
                }
            }
        }
    }
    (labels, next)
}

/// 连通域实现块.
impl Volume {
    /// 对前景掩码 (体素值 > 0) 做连通域标注. 语义见 [`label_components`].
    #[inline]
    pub fn connected_components(&self, conn: Connectivity) -> (Array3<u32>, u32) {
        label_components(self.foreground_mask().view(), conn)
    }
}
