//! Translation of recorded operations into single engine calls.

use super::traits::{EngineResult, Generation};
use crate::op::OperationKind;

/// Exactly one mutating engine call with its computed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Brighten(f32),
    Contrast(f32),
    Exposure { exposure: f32, black_point: f32 },
    StretchContrast { lower: f32, upper: f32 },
    BoxBlur(u32),
    GaussianBlur(u32),
    MedianBlur(u32),
    BilateralBlur(u32),
    HslAdjust { hue: f32, saturation: f32, lightness: f32 },
    ColorMatrix(Vec<f32>),
    Edges,
    VerticalFlip,
    HorizontalFlip,
    Transpose,
    Rotate180,
}

impl EngineCall {
    /// The call that undoes a trivially undoable kind by repeating it.
    pub fn involution(kind: OperationKind) -> Option<Self> {
        match kind {
            OperationKind::VerticalFlip => Some(Self::VerticalFlip),
            OperationKind::HorizontalFlip => Some(Self::HorizontalFlip),
            OperationKind::Transpose => Some(Self::Transpose),
            OperationKind::Rotate180 => Some(Self::Rotate180),
            _ => None,
        }
    }

    pub fn is_involution(&self) -> bool {
        matches!(
            self,
            Self::VerticalFlip | Self::HorizontalFlip | Self::Transpose | Self::Rotate180
        )
    }

    pub fn apply<G: Generation>(&self, generation: &mut G) -> EngineResult<()> {
        match self {
            Self::Brighten(delta) => generation.brighten(*delta),
            Self::Contrast(delta) => generation.contrast(*delta),
            Self::Exposure {
                exposure,
                black_point,
            } => generation.exposure(*exposure, *black_point),
            Self::StretchContrast { lower, upper } => generation.stretch_contrast(*lower, *upper),
            Self::BoxBlur(r) => generation.box_blur(*r),
            Self::GaussianBlur(r) => generation.gaussian_blur(*r),
            Self::MedianBlur(r) => generation.median_blur(*r),
            Self::BilateralBlur(r) => generation.bilateral_blur(*r),
            Self::HslAdjust {
                hue,
                saturation,
                lightness,
            } => generation.hsl_adjust(*hue, *saturation, *lightness),
            Self::ColorMatrix(m) => generation.color_matrix(m),
            Self::Edges => generation.edges(),
            Self::VerticalFlip => generation.vertical_flip(),
            Self::HorizontalFlip => generation.horizontal_flip(),
            Self::Transpose => generation.transpose(),
            Self::Rotate180 => generation.rotate180(),
        }
    }
}
