use serde::{Deserialize, Serialize};

use super::ledger::HistoryLedger;
use crate::{
    engine::call::EngineCall,
    op::{OpValue, OperationKind},
};

/// Slider moves smaller than this are ignored.
pub const SLIDER_EPSILON: f32 = 0.003;

/// Last applied slider values of one session, echoed back to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterValues {
    pub brightness: f32,
    pub contrast: f32,
    pub exposure: f32,
    pub levels_lower: f32,
    pub levels_upper: f32,
    pub box_blur: u32,
    pub gaussian_blur: u32,
    pub median_blur: u32,
    pub bilateral_blur: u32,
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

impl Default for FilterValues {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 0.0,
            exposure: 0.0,
            levels_lower: 0.0,
            levels_upper: 256.0,
            box_blur: 0,
            gaussian_blur: 0,
            median_blur: 0,
            bilateral_blur: 0,
            hue: 0.0,
            saturation: 1.0,
            lightness: 1.0,
        }
    }
}

fn slider_delta(value: f32, last: f32) -> Option<f32> {
    let delta = value - last;
    (delta.abs() > SLIDER_EPSILON).then_some(delta)
}

impl FilterValues {
    /// Engine call that moves the image from the last applied value to
    /// `value`. `None` when the move is too small to matter.
    ///
    /// `value` must already have the shape `kind` expects.
    pub fn plan(&self, kind: OperationKind, value: &OpValue) -> Option<EngineCall> {
        use OperationKind as K;

        match (kind, value) {
            (K::Brighten, OpValue::Scalar(v)) => {
                slider_delta(*v, self.brightness).map(|d| EngineCall::Brighten(d / 100.0))
            }
            (K::Contrast, OpValue::Scalar(v)) => {
                slider_delta(*v, self.contrast).map(EngineCall::Contrast)
            }
            (K::Exposure, OpValue::Scalar(v)) => slider_delta(*v, self.exposure).map(|_| {
                EngineCall::Exposure {
                    exposure: (1.0 + v) / (1.0 + self.exposure),
                    black_point: 0.0,
                }
            }),
            (K::Levels, OpValue::Range { lower, upper }) => Some(EngineCall::StretchContrast {
                lower: *lower,
                upper: *upper,
            }),
            (K::BoxBlur, OpValue::Radius(r)) => Some(EngineCall::BoxBlur(*r)),
            (K::GaussianBlur, OpValue::Radius(r)) => Some(EngineCall::GaussianBlur(*r)),
            (K::MedianBlur, OpValue::Radius(r)) => Some(EngineCall::MedianBlur(*r)),
            (K::BilateralBlur, OpValue::Radius(r)) => Some(EngineCall::BilateralBlur(*r)),
            (
                K::Hsl,
                OpValue::Hsl {
                    hue,
                    saturation,
                    lightness,
                },
            ) => Some(EngineCall::HslAdjust {
                hue: hue - self.hue,
                saturation: saturation - self.saturation + 1.0,
                lightness: lightness - self.lightness + 1.0,
            }),
            (K::ColorMatrix, OpValue::Matrix(m)) => Some(EngineCall::ColorMatrix(m.clone())),
            (K::Edges, _) => Some(EngineCall::Edges),
            (k, _) => EngineCall::involution(k),
        }
    }

    /// Remembers `value` as the last applied value for `kind`.
    pub fn record(&mut self, kind: OperationKind, value: &OpValue) {
        use OperationKind as K;

        match (kind, value) {
            (K::Brighten, OpValue::Scalar(v)) => self.brightness = *v,
            (K::Contrast, OpValue::Scalar(v)) => self.contrast = *v,
            (K::Exposure, OpValue::Scalar(v)) => self.exposure = *v,
            (K::Levels, OpValue::Range { lower, upper }) => {
                self.levels_lower = *lower;
                self.levels_upper = *upper;
            }
            (K::BoxBlur, OpValue::Radius(r)) => self.box_blur = *r,
            (K::GaussianBlur, OpValue::Radius(r)) => self.gaussian_blur = *r,
            (K::MedianBlur, OpValue::Radius(r)) => self.median_blur = *r,
            (K::BilateralBlur, OpValue::Radius(r)) => self.bilateral_blur = *r,
            (
                K::Hsl,
                OpValue::Hsl {
                    hue,
                    saturation,
                    lightness,
                },
            ) => {
                self.hue = *hue;
                self.saturation = *saturation;
                self.lightness = *lightness;
            }
            _ => {}
        }
    }

    /// After an undo of `kind`, falls back to the newest remaining ledger
    /// value for that kind, or to the slider default.
    pub fn restore(&mut self, kind: OperationKind, ledger: &HistoryLedger) {
        match ledger.last_value_of(kind) {
            Some(value) => self.record(kind, value),
            None => self.reset_kind(kind),
        }
    }

    fn reset_kind(&mut self, kind: OperationKind) {
        use OperationKind as K;

        let defaults = Self::default();
        match kind {
            K::Brighten => self.brightness = defaults.brightness,
            K::Contrast => self.contrast = defaults.contrast,
            K::Exposure => self.exposure = defaults.exposure,
            K::Levels => {
                self.levels_lower = defaults.levels_lower;
                self.levels_upper = defaults.levels_upper;
            }
            K::BoxBlur => self.box_blur = defaults.box_blur,
            K::GaussianBlur => self.gaussian_blur = defaults.gaussian_blur,
            K::MedianBlur => self.median_blur = defaults.median_blur,
            K::BilateralBlur => self.bilateral_blur = defaults.bilateral_blur,
            K::Hsl => {
                self.hue = defaults.hue;
                self.saturation = defaults.saturation;
                self.lightness = defaults.lightness;
            }
            _ => {}
        }
    }
}
