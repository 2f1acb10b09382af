use crate::structs::{DensityCategory, MarkerColor};

/// Maps a raw density label to its marker color.
///
/// Total over all inputs: the four known labels get fixed colors and
/// everything else falls back to gray.
pub fn color_for(label: &str) -> MarkerColor {
    DensityCategory::from_label(label).color()
}

impl DensityCategory {
    pub fn color(&self) -> MarkerColor {
        match self {
            DensityCategory::VeryIntense => MarkerColor::Red,
            DensityCategory::Intense => MarkerColor::Orange,
            DensityCategory::Normal => MarkerColor::Blue,
            DensityCategory::Sparse => MarkerColor::Green,
            DensityCategory::Unknown(_) => MarkerColor::Gray,
        }
    }
}
