//! Edit operation model: kinds, their static undo traits, and history values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every edit the session knows how to record and undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Brightness slider.
    Brighten,
    /// Contrast slider.
    Contrast,
    /// Exposure slider.
    Exposure,
    /// Levels / stretch-contrast range.
    Levels,
    /// Box blur radius.
    BoxBlur,
    /// Gaussian blur radius.
    GaussianBlur,
    /// Median blur radius.
    MedianBlur,
    /// Bilateral blur radius.
    BilateralBlur,
    /// Hue, saturation and lightness.
    Hsl,
    /// 4x5 color matrix.
    ColorMatrix,
    /// Edge detection.
    Edges,
    /// Mirror rows top to bottom.
    VerticalFlip,
    /// Mirror columns left to right.
    HorizontalFlip,
    /// Swap x and y.
    Transpose,
    /// Rotate by 180 degrees.
    Rotate180,
}

/// Shape of the value an operation carries in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// No value.
    Nothing,
    /// [`OpValue::Scalar`].
    Scalar,
    /// [`OpValue::Range`].
    Range,
    /// [`OpValue::Radius`].
    Radius,
    /// [`OpValue::Hsl`].
    Hsl,
    /// [`OpValue::Matrix`].
    Matrix,
}

/// Static facts about an [`OperationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindTraits {
    /// Re-applying the operation restores the prior pixels.
    pub trivial_undo: bool,
    /// The operation needs an associated value.
    pub requires_value: bool,
    /// Which value variant the operation accepts.
    pub shape: ValueShape,
}

const fn traits(trivial_undo: bool, shape: ValueShape) -> KindTraits {
    KindTraits {
        trivial_undo,
        requires_value: !matches!(shape, ValueShape::Nothing),
        shape,
    }
}

// Indexed by discriminant; keep in declaration order.
const KIND_TRAITS: [KindTraits; 15] = [
    traits(false, ValueShape::Scalar),
    traits(false, ValueShape::Scalar),
    traits(false, ValueShape::Scalar),
    traits(false, ValueShape::Range),
    traits(false, ValueShape::Radius),
    traits(false, ValueShape::Radius),
    traits(false, ValueShape::Radius),
    traits(false, ValueShape::Radius),
    traits(false, ValueShape::Hsl),
    traits(false, ValueShape::Matrix),
    traits(false, ValueShape::Nothing),
    traits(true, ValueShape::Nothing),
    traits(true, ValueShape::Nothing),
    traits(true, ValueShape::Nothing),
    traits(true, ValueShape::Nothing),
];

impl OperationKind {
    /// All kinds in discriminant order.
    pub const ALL: [OperationKind; 15] = [
        Self::Brighten,
        Self::Contrast,
        Self::Exposure,
        Self::Levels,
        Self::BoxBlur,
        Self::GaussianBlur,
        Self::MedianBlur,
        Self::BilateralBlur,
        Self::Hsl,
        Self::ColorMatrix,
        Self::Edges,
        Self::VerticalFlip,
        Self::HorizontalFlip,
        Self::Transpose,
        Self::Rotate180,
    ];

    /// Static lookup of this kind's undo traits.
    pub const fn traits(self) -> KindTraits {
        KIND_TRAITS[self as usize]
    }

    /// True when re-applying the operation undoes it.
    pub const fn trivial_undo(self) -> bool {
        self.traits().trivial_undo
    }

    /// True when the operation must be recorded with a value.
    pub const fn requires_value(self) -> bool {
        self.traits().requires_value
    }

    /// Human-readable label for history lists.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Brighten => "Brightness",
            Self::Contrast => "Contrast",
            Self::Exposure => "Exposure",
            Self::Levels => "Levels",
            Self::BoxBlur => "Box blur",
            Self::GaussianBlur => "Gaussian blur",
            Self::MedianBlur => "Median blur",
            Self::BilateralBlur => "Bilateral blur",
            Self::Hsl => "Hue/Saturation/Lightness",
            Self::ColorMatrix => "Color matrix",
            Self::Edges => "Edges",
            Self::VerticalFlip => "Vertical flip",
            Self::HorizontalFlip => "Horizontal flip",
            Self::Transpose => "Transpose",
            Self::Rotate180 => "Rotate 180°",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value recorded alongside an operation in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OpValue {
    /// Placeholder stored for operations without a value.
    #[default]
    Unset,
    /// Slider position.
    Scalar(f32),
    /// Closed range, e.g. levels.
    Range {
        /// Lower bound.
        lower: f32,
        /// Upper bound.
        upper: f32,
    },
    /// Blur radius in pixels.
    Radius(u32),
    /// Hue rotation in degrees, saturation and lightness multipliers.
    Hsl {
        /// Hue in degrees.
        hue: f32,
        /// Saturation multiplier.
        saturation: f32,
        /// Lightness multiplier.
        lightness: f32,
    },
    /// Row-major 4x5 color matrix.
    Matrix(Vec<f32>),
}

impl OpValue {
    /// Shape tag of this value.
    pub const fn shape(&self) -> ValueShape {
        match self {
            Self::Unset => ValueShape::Nothing,
            Self::Scalar(_) => ValueShape::Scalar,
            Self::Range { .. } => ValueShape::Range,
            Self::Radius(_) => ValueShape::Radius,
            Self::Hsl { .. } => ValueShape::Hsl,
            Self::Matrix(_) => ValueShape::Matrix,
        }
    }
}

/// One recorded history step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// What was applied.
    pub kind: OperationKind,
    /// The value it was applied with, or [`OpValue::Unset`].
    pub value: OpValue,
}
