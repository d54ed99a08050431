// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Affine-configuration dispatch.
//!
//! The four affine configurations (none, bias, weight, both) are four
//! zero-sized-or-borrowing types implementing [`Affine`]. Selecting one
//! happens once per call, together with the element type, and the
//! reducers are monomorphised for the pair:
//!
//! ```text
//! (DType, AffineConfig) ──match──► forward_rows::<T, A> / backward_rows::<T, A>
//! ```
//!
//! Inside the per-element loops `A::HAS_GAMMA` / `A::HAS_BETA` are
//! constants, so absent parameters cost neither a read nor a branch.

use crate::backward::{backward_rows, ParamGrads};
use crate::forward::forward_rows;
use crate::{LayerNormError, RowLayout};
use std::fmt;
use std::str::FromStr;
use tensor_core::{bf16, f16, DType, Element, Tensor};

/// Which affine parameters take part in a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffineConfig {
    /// Plain normalization.
    None,
    /// Shift by `beta` only.
    Bias,
    /// Scale by `gamma` only.
    Weight,
    /// Scale by `gamma`, then shift by `beta`.
    Both,
}

impl AffineConfig {
    /// All four configurations.
    pub const ALL: [AffineConfig; 4] = [
        AffineConfig::None,
        AffineConfig::Bias,
        AffineConfig::Weight,
        AffineConfig::Both,
    ];

    /// Selects the configuration from parameter presence.
    pub fn from_presence(has_gamma: bool, has_beta: bool) -> Self {
        match (has_gamma, has_beta) {
            (false, false) => AffineConfig::None,
            (false, true) => AffineConfig::Bias,
            (true, false) => AffineConfig::Weight,
            (true, true) => AffineConfig::Both,
        }
    }

    /// Returns `true` if `gamma` is part of the configuration.
    pub fn has_gamma(self) -> bool {
        matches!(self, AffineConfig::Weight | AffineConfig::Both)
    }

    /// Returns `true` if `beta` is part of the configuration.
    pub fn has_beta(self) -> bool {
        matches!(self, AffineConfig::Bias | AffineConfig::Both)
    }

    /// Returns a short label.
    pub fn as_str(self) -> &'static str {
        match self {
            AffineConfig::None => "none",
            AffineConfig::Bias => "bias",
            AffineConfig::Weight => "weight",
            AffineConfig::Both => "both",
        }
    }
}

impl fmt::Display for AffineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AffineConfig {
    type Err = LayerNormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AffineConfig::None),
            "bias" => Ok(AffineConfig::Bias),
            "weight" => Ok(AffineConfig::Weight),
            "both" => Ok(AffineConfig::Both),
            other => Err(LayerNormError::Config(format!(
                "unknown affine configuration '{other}'; expected 'none', 'bias', 'weight', or 'both'"
            ))),
        }
    }
}

/// A compile-time specialised affine transform.
pub(crate) trait Affine: Sync {
    const HAS_GAMMA: bool;
    const HAS_BETA: bool;

    /// `x̂ · gamma[j] + beta[j]`, with absent terms elided.
    fn apply(&self, j: usize, xhat: f32) -> f32;

    /// Gradient flowing into `x̂`: `dy · gamma[j]`, or `dy` without a weight.
    fn scale(&self, j: usize, dy: f32) -> f32;
}

pub(crate) struct NoAffine;

pub(crate) struct BiasOnly<'a> {
    beta: &'a [f32],
}

pub(crate) struct WeightOnly<'a> {
    gamma: &'a [f32],
}

pub(crate) struct WeightAndBias<'a> {
    gamma: &'a [f32],
    beta: &'a [f32],
}

impl Affine for NoAffine {
    const HAS_GAMMA: bool = false;
    const HAS_BETA: bool = false;

    #[inline(always)]
    fn apply(&self, _j: usize, xhat: f32) -> f32 {
        xhat
    }

    #[inline(always)]
    fn scale(&self, _j: usize, dy: f32) -> f32 {
        dy
    }
}

impl Affine for BiasOnly<'_> {
    const HAS_GAMMA: bool = false;
    const HAS_BETA: bool = true;

    #[inline(always)]
    fn apply(&self, j: usize, xhat: f32) -> f32 {
        xhat + self.beta[j]
    }

    #[inline(always)]
    fn scale(&self, _j: usize, dy: f32) -> f32 {
        dy
    }
}

impl Affine for WeightOnly<'_> {
    const HAS_GAMMA: bool = true;
    const HAS_BETA: bool = false;

    #[inline(always)]
    fn apply(&self, j: usize, xhat: f32) -> f32 {
        xhat * self.gamma[j]
    }

    #[inline(always)]
    fn scale(&self, j: usize, dy: f32) -> f32 {
        dy * self.gamma[j]
    }
}

impl Affine for WeightAndBias<'_> {
    const HAS_GAMMA: bool = true;
    const HAS_BETA: bool = true;

    #[inline(always)]
    fn apply(&self, j: usize, xhat: f32) -> f32 {
        xhat * self.gamma[j] + self.beta[j]
    }

    #[inline(always)]
    fn scale(&self, j: usize, dy: f32) -> f32 {
        dy * self.gamma[j]
    }
}

/// Affine parameters widened to `f32` once per call.
///
/// Parameters are `n2` long, so the widening copy is negligible next to
/// the `n1 * n2` work and lets one kernel serve mixed-dtype parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct AffineParams {
    gamma: Option<Vec<f32>>,
    beta: Option<Vec<f32>>,
}

impl AffineParams {
    pub(crate) fn new(gamma: Option<&Tensor>, beta: Option<&Tensor>) -> Self {
        Self {
            gamma: gamma.map(Tensor::to_f32_vec),
            beta: beta.map(Tensor::to_f32_vec),
        }
    }

    pub(crate) fn config(&self) -> AffineConfig {
        AffineConfig::from_presence(self.gamma.is_some(), self.beta.is_some())
    }
}

/// Binds `$a` to the specialised [`Affine`] for `$params` and evaluates `$body`.
macro_rules! with_affine {
    ($params:expr, |$a:ident| $body:expr) => {
        match (&$params.gamma, &$params.beta) {
            (None, None) => {
                let $a = &NoAffine;
                $body
            }
            (None, Some(beta)) => {
                let $a = &BiasOnly { beta };
                $body
            }
            (Some(gamma), None) => {
                let $a = &WeightOnly { gamma };
                $body
            }
            (Some(gamma), Some(beta)) => {
                let $a = &WeightAndBias { gamma, beta };
                $body
            }
        }
    };
}

/// Runs the forward reducer for the input's dtype and the parameters' configuration.
///
/// `output` must have the input's dtype and element count; `mean` and
/// `invvar` must be `n1` long.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dispatch_forward(
    input: &Tensor,
    params: &AffineParams,
    rows: RowLayout,
    epsilon: f64,
    rows_per_task: usize,
    output: &mut Tensor,
    mean: &mut [f32],
    invvar: &mut [f32],
) -> Result<(), LayerNormError> {
    #[allow(clippy::too_many_arguments)]
    fn typed<T: Element>(
        input: &Tensor,
        params: &AffineParams,
        rows: RowLayout,
        epsilon: f64,
        rows_per_task: usize,
        output: &mut Tensor,
        mean: &mut [f32],
        invvar: &mut [f32],
    ) -> Result<(), LayerNormError> {
        let x = input.as_slice::<T>()?;
        let y = output.as_slice_mut::<T>()?;
        with_affine!(params, |affine| forward_rows(
            x,
            y,
            mean,
            invvar,
            rows.n2,
            epsilon,
            rows_per_task,
            affine
        ));
        Ok(())
    }

    match input.dtype() {
        DType::F32 => typed::<f32>(
            input,
            params,
            rows,
            epsilon,
            rows_per_task,
            output,
            mean,
            invvar,
        ),
        DType::F16 => typed::<f16>(
            input,
            params,
            rows,
            epsilon,
            rows_per_task,
            output,
            mean,
            invvar,
        ),
        DType::BF16 => typed::<bf16>(
            input,
            params,
            rows,
            epsilon,
            rows_per_task,
            output,
            mean,
            invvar,
        ),
        dtype => Err(LayerNormError::UnsupportedDType {
            name: "input",
            dtype,
        }),
    }
}

/// Runs the backward reducer for the input's dtype and the parameters' configuration.
///
/// Writes the input gradient into `grad_input` and returns the reduced
/// parameter gradients, present exactly for the parameters in `params`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dispatch_backward(
    grad_output: &Tensor,
    mean: &[f32],
    invvar: &[f32],
    input: &Tensor,
    params: &AffineParams,
    rows: RowLayout,
    rows_per_task: usize,
    grad_input: &mut Tensor,
) -> Result<ParamGrads, LayerNormError> {
    #[allow(clippy::too_many_arguments)]
    fn typed<T: Element>(
        grad_output: &Tensor,
        mean: &[f32],
        invvar: &[f32],
        input: &Tensor,
        params: &AffineParams,
        rows: RowLayout,
        rows_per_task: usize,
        grad_input: &mut Tensor,
    ) -> Result<ParamGrads, LayerNormError> {
        let dy = grad_output.as_slice::<T>()?;
        let x = input.as_slice::<T>()?;
        let dx = grad_input.as_slice_mut::<T>()?;
        Ok(with_affine!(params, |affine| backward_rows(
            dy,
            x,
            mean,
            invvar,
            dx,
            rows.n2,
            rows_per_task,
            affine
        )))
    }

    match input.dtype() {
        DType::F32 => typed::<f32>(
            grad_output,
            mean,
            invvar,
            input,
            params,
            rows,
            rows_per_task,
            grad_input,
        ),
        DType::F16 => typed::<f16>(
            grad_output,
            mean,
            invvar,
            input,
            params,
            rows,
            rows_per_task,
            grad_input,
        ),
        DType::BF16 => typed::<bf16>(
            grad_output,
            mean,
            invvar,
            input,
            params,
            rows,
            rows_per_task,
            grad_input,
        ),
        dtype => Err(LayerNormError::UnsupportedDType {
            name: "input",
            dtype,
        }),
    }
}
