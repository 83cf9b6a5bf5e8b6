//! Diffusion curves used to move a quantity from its base-year value towards an end-year value.
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;

/// How a quantity moves between its base-year and end-year values
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Default)]
pub enum DiffusionMethod {
    /// Straight-line interpolation
    #[string = "linear"]
    Linear,
    /// S-shaped interpolation
    #[default]
    #[string = "sigmoid"]
    Sigmoid,
}

/// Shape parameters for a standard sigmoid diffusion curve
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SigmoidShape {
    /// Offset of the curve's midpoint on the normalised 12-unit time axis
    #[serde(default)]
    pub sig_midpoint: f64,
    /// Steepness of the curve
    #[serde(default = "default_sig_steepness")]
    pub sig_steepness: f64,
}

fn default_sig_steepness() -> f64 {
    1.0
}

impl Default for SigmoidShape {
    fn default() -> Self {
        Self {
            sig_midpoint: 0.0,
            sig_steepness: default_sig_steepness(),
        }
    }
}

/// Divide `numerator` by `denominator`, returning zero if the denominator is zero
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fraction of a linear diffusion completed by `curr_yr`, clamped to [0, 1]
pub fn linear_diffusion(base_yr: u32, curr_yr: u32, end_yr: u32) -> f64 {
    if curr_yr <= base_yr {
        return 0.0;
    }
    if curr_yr >= end_yr {
        return 1.0;
    }

    f64::from(curr_yr - base_yr) / f64::from(end_yr - base_yr)
}

/// Fraction of a sigmoid diffusion completed by `curr_yr`.
///
/// The time between `base_yr` and `end_yr` is mapped onto the interval [-6, 6] (shifted by the
/// midpoint), over which the logistic function goes from ~0 to ~1. The result is clamped to
/// exactly 0 at or before `base_yr` and exactly 1 at or after `end_yr`.
pub fn sigmoid_diffusion(base_yr: u32, curr_yr: u32, end_yr: u32, shape: &SigmoidShape) -> f64 {
    if curr_yr <= base_yr {
        return 0.0;
    }
    if curr_yr >= end_yr {
        return 1.0;
    }

    let elapsed = f64::from(curr_yr - base_yr) * 12.0 / f64::from(end_yr - base_yr);
    let x = elapsed - 6.0 - shape.sig_midpoint;
    1.0 / (1.0 + (-shape.sig_steepness * x).exp())
}

/// Fraction of the diffusion completed by `curr_yr` using the given method
pub fn diffusion_fraction(
    method: DiffusionMethod,
    base_yr: u32,
    curr_yr: u32,
    end_yr: u32,
    shape: &SigmoidShape,
) -> f64 {
    match method {
        DiffusionMethod::Linear => linear_diffusion(base_yr, curr_yr, end_yr),
        DiffusionMethod::Sigmoid => sigmoid_diffusion(base_yr, curr_yr, end_yr, shape),
    }
}

/// Interpolate between two values given the fraction of the diffusion completed
pub fn interpolate(value_by: f64, value_ey: f64, fraction: f64) -> f64 {
    value_by + (value_ey - value_by) * fraction
}
