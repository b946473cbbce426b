//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::volume::{
    AxisOrder, BuildError, Dtype, LoadOptions, RawData, RawVolume, Volume, VolumeAttr, VolumeMeta,
    VoxelData,
};

pub use crate::region::{clusters, BoundingBox, EmptySelection};

pub use crate::morph::Connectivity;

pub use crate::symmetry::{mirror, symmetrize, symmetrize_pair};

pub use crate::wireframe::Wireframe;

pub use crate::consts::label::{is_background, is_foreground, BACKGROUND};

pub use crate::io::{ChannelArchive, Format, FormatError, LoadError, ZarrStore};

pub use crate::dataset::{self, home_dataset_dir_with};
