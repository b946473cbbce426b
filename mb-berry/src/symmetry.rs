//! 镜像与双侧对称化.
//!
//! 镜像 = 沿指定轴翻转 + 整数体素平移, 用于校正中线不在网格正中的图谱;
//! 对称化 = 与镜像 (或另一半球体的镜像) 逐体素求平均, 供双侧一致的
//! 组统计使用.

use ndarray::{Array3, ArrayView3, Axis, Slice, Zip};
use num::cast::AsPrimitive;
use num::Zero;

use crate::volume::{map_dtype, per_dtype, VoxelData};
use crate::{Volume, VolumeAttr};

/// 沿 `axis` 反转后按 `shift` 个体素平移: 轴起始端补 `shift` 个零,
/// 末端截断 `shift` 个体素, 形状保持不变.
///
/// 补零区是纯填充, 不代表任何解剖内容, 下游的聚类/包围盒分析
/// 不会把它当作前景. `shift >= 轴长` 时结果全零.
///
/// `shift == 0` 时镜像是自逆的: 连续两次应用精确还原输入.
/// `shift > 0` 时截断有损, 两次应用 **不** 保证还原.
pub fn mirror<T>(data: ArrayView3<'_, T>, axis: Axis, shift: usize) -> Array3<T>
where
    T: Copy + Zero,
{
    let mut flipped = data.to_owned();
    flipped.invert_axis(axis);
    if shift == 0 {
        return flipped;
    }

    let n = data.len_of(axis);
    let mut out = Array3::from_elem(data.raw_dim(), T::zero());
    if shift < n {
        out.slice_axis_mut(axis, Slice::from(shift..))
            .assign(&flipped.slice_axis(axis, Slice::from(..n - shift)));
    }
    out
}

/// 对称化: `(v + mirror(v)) / 2`, 逐体素.
///
/// 求和与平均在 `f64` 宽类型上进行, 整数输入不会溢出或截断;
/// 只在最终写出时才 (由调用方显式) 降回窄类型.
pub fn symmetrize<T>(data: ArrayView3<'_, T>, axis: Axis, shift: usize) -> Array3<f64>
where
    T: Copy + AsPrimitive<f64>,
{
    let wide = data.mapv(|v| v.as_());
    let mirrored = mirror(wide.view(), axis, shift);
    Zip::from(&wide)
        .and(&mirrored)
        .map_collect(|&a, &b| (a + b) / 2.0)
}

/// 与另一半球体的镜像求平均: `(a + mirror(b)) / 2`, 逐体素, `f64` 宽类型.
///
/// 两体形状必须一致, 否则程序 panic.
pub fn symmetrize_pair<T>(
    a: ArrayView3<'_, T>,
    b: ArrayView3<'_, T>,
    axis: Axis,
    shift: usize,
) -> Array3<f64>
where
    T: Copy + AsPrimitive<f64>,
{
    assert_eq!(a.dim(), b.dim(), "两半球体形状不一致");
    let a = a.mapv(|v| v.as_());
    let mirrored = mirror(b.mapv(|v| v.as_()).view(), axis, shift);
    Zip::from(&a)
        .and(&mirrored)
        .map_collect(|&p, &q| (p + q) / 2.0)
}

/// 对称化实现块.
impl Volume {
    /// 沿数组轴 `axis` 镜像. dtype 与元信息保持不变. 语义见 [`mirror`].
    pub fn mirror(&self, axis: Axis, shift: usize) -> Volume {
        let data = map_dtype!(self.data(), a => mirror(a.view(), axis, shift));
        Volume::from_parts(data, *self.meta())
    }

    /// 对称化. 语义见 [`symmetrize`].
    ///
    /// 结果一律以 `F64` 存储; 如需与源 dtype 一致, 写出前调用
    /// [`Volume::cast`] 显式降型. 保存结果的 dtype 与输入不同是
    /// 有意为之的既定行为, 不是缺陷.
    pub fn symmetrize(&self, axis: Axis, shift: usize) -> Volume {
        let wide = per_dtype!(self.data(), a => symmetrize(a.view(), axis, shift));
        Volume::from_parts(VoxelData::F64(wide), *self.meta())
    }

    /// 与另一半球体的镜像求平均. 语义见 [`symmetrize_pair`].
    ///
    /// 两体形状必须一致, 否则程序 panic.
    pub fn symmetrize_with(&self, other: &Volume, axis: Axis, shift: usize) -> Volume {
        assert_eq!(self.shape(), other.shape(), "两半球体形状不一致");
        let a = self.to_f64();
        let b = other.to_f64();
        let wide = symmetrize_pair(a.view(), b.view(), axis, shift);
        Volume::from_parts(VoxelData::F64(wide), *self.meta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_mirror_without_shift_is_involution() {
        let mut a = Array3::<u16>::zeros((4, 3, 3));
        a[(0, 0, 0)] = 1;
        a[(2, 1, 2)] = 7;
        let once = mirror(a.view(), Axis(0), 0);
        assert_eq!(once[(3, 0, 0)], 1);
        let twice = mirror(once.view(), Axis(0), 0);
        assert_eq!(twice, a);
    }

    #[test]
    fn test_mirror_shift_pads_and_truncates() {
        let mut a = Array3::<u16>::zeros((4, 3, 3));
        a[(3, 0, 0)] = 9;
        // 翻转后 9 位于轴 0 的 0 号位, 平移 1 之后落在 1 号位.
        let m = mirror(a.view(), Axis(0), 1);
        assert_eq!(m[(1, 0, 0)], 9);
        assert_eq!(m[(0, 0, 0)], 0); // 起始端补零
        assert_eq!(m.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_mirror_shift_beyond_axis_is_all_zero() {
        let mut a = Array3::<u16>::zeros((2, 2, 2));
        a[(0, 0, 0)] = 3;
        let m = mirror(a.view(), Axis(0), 2);
        assert!(m.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_symmetrize_reference_example() {
        // (4, 3, 3) 的体, 仅 (0, 0, 0) 处为 1:
        // 翻转后该体素位于 3 号位, 平移 1 后越过末端被截断,
        // 因此平均结果只在 (0, 0, 0) 处为 0.5.
        let mut a = Array3::<u8>::zeros((4, 3, 3));
        a[(0, 0, 0)] = 1;
        let s = symmetrize(a.view(), Axis(0), 1);
        assert_eq!(s[(0, 0, 0)], 0.5);
        assert_eq!(s.iter().filter(|&&v| v != 0.0).count(), 1);

        // 把源体素换到 (3, 0, 0): 镜像落回网格内 (1, 0, 0),
        // 两处各得 0.5.
        let mut b = Array3::<u8>::zeros((4, 3, 3));
        b[(3, 0, 0)] = 1;
        let s = symmetrize(b.view(), Axis(0), 1);
        assert_eq!(s[(3, 0, 0)], 0.5);
        assert_eq!(s[(1, 0, 0)], 0.5);
        assert_eq!(s.iter().filter(|&&v| v != 0.0).count(), 2);
    }

    #[test]
    fn test_symmetrize_widens_before_averaging() {
        // u8 满量程: 宽类型中间值避免 (255 + 255) 的溢出.
        let a = Array3::<u8>::from_elem((2, 2, 2), 255);
        let s = symmetrize(a.view(), Axis(0), 0);
        assert!(s.iter().all(|&v| v == 255.0));
    }

    #[test]
    fn test_symmetrize_pair_averages_against_mirror_of_other() {
        let mut a = Array3::<f32>::zeros((2, 1, 1));
        let mut b = Array3::<f32>::zeros((2, 1, 1));
        a[(0, 0, 0)] = 2.0;
        b[(0, 0, 0)] = 4.0; // 镜像后位于 (1, 0, 0)
        let s = symmetrize_pair(a.view(), b.view(), Axis(0), 0);
        assert_eq!(s[(0, 0, 0)], 1.0);
        assert_eq!(s[(1, 0, 0)], 2.0);
    }

    #[test]
    #[should_panic]
    fn test_symmetrize_pair_shape_mismatch_panics() {
        let a = Array3::<f32>::zeros((2, 1, 1));
        let b = Array3::<f32>::zeros((1, 1, 1));
        let _ = symmetrize_pair(a.view(), b.view(), Axis(0), 0);
    }
}
