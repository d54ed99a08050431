// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The layer-norm entry point.
//!
//! ```text
//!  caller tensors
//!      │  validate (device, layout, shapes, dtypes)
//!      ▼
//!  RowLayout (n1, n2) + AffineParams
//!      │  dispatch on (dtype, affine)
//!      ▼
//!  forward_rows / backward_rows   ── on the instance's rayon pool
//!      │
//!      ▼
//!  freshly allocated output tensors
//! ```

use crate::affine::{dispatch_backward, dispatch_forward, AffineParams};
use crate::{AffineConfig, LayerNormConfig, LayerNormError, RowLayout};
use std::time::Instant;
use tensor_core::{DType, Shape, Tensor};

/// Result of a forward call.
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    /// Normalized (and affine-transformed) input; same shape and dtype as the input.
    pub output: Tensor,
    /// Per-row mean, `f32` of shape `[n1]`.
    pub mean: Tensor,
    /// Per-row `1 / sqrt(var + eps)`, `f32` of shape `[n1]`.
    pub invvar: Tensor,
}

/// Result of a backward call.
#[derive(Debug, Clone)]
pub struct BackwardOutput {
    /// Gradient with respect to the input.
    pub grad_input: Tensor,
    /// Gradient with respect to `gamma`; `None` when `gamma` was not supplied.
    pub grad_gamma: Option<Tensor>,
    /// Gradient with respect to `beta`; `None` when `beta` was not supplied.
    pub grad_beta: Option<Tensor>,
}

/// Layer normalization over a trailing block of dimensions.
///
/// An instance carries its [`LayerNormConfig`] and, when `num_threads` is
/// set, a dedicated rayon pool; otherwise work runs on the global pool.
/// Instances hold no per-call state and can be shared across threads.
///
/// # Example
/// ```
/// use layer_norm::{LayerNorm, LayerNormConfig};
/// use tensor_core::{Shape, Tensor};
///
/// let ln = LayerNorm::new(LayerNormConfig::default()).unwrap();
/// let x = Tensor::from_f32(Shape::matrix(1, 4), &[1.0, 2.0, 3.0, 4.0]).unwrap();
/// let fwd = ln.forward_none_affine(&x, &Shape::vector(4), 1e-5).unwrap();
/// assert_eq!(fwd.mean.as_f32_slice(), &[2.5]);
/// ```
pub struct LayerNorm {
    config: LayerNormConfig,
    pool: Option<rayon::ThreadPool>,
}

impl LayerNorm {
    /// Creates an instance, building a dedicated worker pool if requested.
    pub fn new(config: LayerNormConfig) -> Result<Self, LayerNormError> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("layer-norm-{i}"))
                    .build()?;
                tracing::info!("layer-norm worker pool created with {n} threads");
                Some(pool)
            }
            None => None,
        };
        Ok(Self { config, pool })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LayerNormConfig {
        &self.config
    }

    /// Returns the number of threads calls will run on.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Normalizes `input` over its trailing `normalized_shape` dimensions.
    ///
    /// `gamma` and `beta` are independently optional; each must have
    /// `normalized_shape` (or `[n2]`) and any floating dtype.
    ///
    /// # Errors
    /// Device/layout, shape, and dtype violations, all raised before
    /// anything is allocated.
    pub fn forward(
        &self,
        input: &Tensor,
        normalized_shape: &Shape,
        gamma: Option<&Tensor>,
        beta: Option<&Tensor>,
        epsilon: f64,
    ) -> Result<ForwardOutput, LayerNormError> {
        let rows = crate::validate::forward_args(input, normalized_shape, gamma, beta)?;
        let params = AffineParams::new(gamma, beta);
        let start = Instant::now();

        let mut output = Tensor::zeros(input.shape().clone(), input.dtype());
        let mut mean = vec![0.0f32; rows.n1];
        let mut invvar = vec![0.0f32; rows.n1];
        let rows_per_task = self.config.rows_per_task;
        self.install(|| {
            dispatch_forward(
                input,
                &params,
                rows,
                epsilon,
                rows_per_task,
                &mut output,
                &mut mean,
                &mut invvar,
            )
        })?;

        self.trace_call("forward", rows, params.config(), input.dtype(), epsilon, start);
        Ok(ForwardOutput {
            output,
            mean: Tensor::from_vec(Shape::vector(rows.n1), mean)?,
            invvar: Tensor::from_vec(Shape::vector(rows.n1), invvar)?,
        })
    }

    /// Computes gradients of a forward call with respect to its input and
    /// whichever affine parameters it used.
    ///
    /// `mean`/`invvar` must come from the forward call on the same `input`
    /// with the same `gamma`/`beta` presence; mixing calls yields wrong
    /// gradients and is not detected. `epsilon` is already folded into
    /// `invvar` and only recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn backward(
        &self,
        grad_output: &Tensor,
        mean: &Tensor,
        invvar: &Tensor,
        input: &Tensor,
        normalized_shape: &Shape,
        gamma: Option<&Tensor>,
        beta: Option<&Tensor>,
        epsilon: f64,
    ) -> Result<BackwardOutput, LayerNormError> {
        let rows = crate::validate::backward_args(
            grad_output,
            mean,
            invvar,
            input,
            normalized_shape,
            gamma,
            beta,
        )?;
        let params = AffineParams::new(gamma, beta);
        let start = Instant::now();

        let mean = mean.as_slice::<f32>()?;
        let invvar = invvar.as_slice::<f32>()?;
        let mut grad_input = Tensor::zeros(input.shape().clone(), input.dtype());
        let rows_per_task = self.config.rows_per_task;
        let grads = self.install(|| {
            dispatch_backward(
                grad_output,
                mean,
                invvar,
                input,
                &params,
                rows,
                rows_per_task,
                &mut grad_input,
            )
        })?;

        let grad_gamma = match (gamma, grads.gamma) {
            (Some(g), Some(sums)) => Some(param_grad(g, &sums)?),
            _ => None,
        };
        let grad_beta = match (beta, grads.beta) {
            (Some(b), Some(sums)) => Some(param_grad(b, &sums)?),
            _ => None,
        };

        self.trace_call("backward", rows, params.config(), input.dtype(), epsilon, start);
        Ok(BackwardOutput {
            grad_input,
            grad_gamma,
            grad_beta,
        })
    }

    /// Forward without affine parameters.
    pub fn forward_none_affine(
        &self,
        input: &Tensor,
        normalized_shape: &Shape,
        epsilon: f64,
    ) -> Result<ForwardOutput, LayerNormError> {
        self.forward(input, normalized_shape, None, None, epsilon)
    }

    /// Forward with a bias only.
    pub fn forward_with_bias_affine(
        &self,
        input: &Tensor,
        normalized_shape: &Shape,
        beta: &Tensor,
        epsilon: f64,
    ) -> Result<ForwardOutput, LayerNormError> {
        self.forward(input, normalized_shape, None, Some(beta), epsilon)
    }

    /// Forward with a weight only.
    pub fn forward_with_weight_affine(
        &self,
        input: &Tensor,
        normalized_shape: &Shape,
        gamma: &Tensor,
        epsilon: f64,
    ) -> Result<ForwardOutput, LayerNormError> {
        self.forward(input, normalized_shape, Some(gamma), None, epsilon)
    }

    /// Forward with weight and bias.
    pub fn forward_with_both_affine(
        &self,
        input: &Tensor,
        normalized_shape: &Shape,
        gamma: &Tensor,
        beta: &Tensor,
        epsilon: f64,
    ) -> Result<ForwardOutput, LayerNormError> {
        self.forward(input, normalized_shape, Some(gamma), Some(beta), epsilon)
    }

    /// Backward of [`forward_none_affine`](Self::forward_none_affine).
    pub fn backward_none_affine(
        &self,
        grad_output: &Tensor,
        mean: &Tensor,
        invvar: &Tensor,
        input: &Tensor,
        normalized_shape: &Shape,
        epsilon: f64,
    ) -> Result<BackwardOutput, LayerNormError> {
        self.backward(grad_output, mean, invvar, input, normalized_shape, None, None, epsilon)
    }

    /// Backward of [`forward_with_bias_affine`](Self::forward_with_bias_affine).
    #[allow(clippy::too_many_arguments)]
    pub fn backward_with_bias_affine(
        &self,
        grad_output: &Tensor,
        mean: &Tensor,
        invvar: &Tensor,
        input: &Tensor,
        normalized_shape: &Shape,
        beta: &Tensor,
        epsilon: f64,
    ) -> Result<BackwardOutput, LayerNormError> {
        self.backward(
            grad_output,
            mean,
            invvar,
            input,
            normalized_shape,
            None,
            Some(beta),
            epsilon,
        )
    }

    /// Backward of [`forward_with_weight_affine`](Self::forward_with_weight_affine).
    #[allow(clippy::too_many_arguments)]
    pub fn backward_with_weight_affine(
        &self,
        grad_output: &Tensor,
        mean: &Tensor,
        invvar: &Tensor,
        input: &Tensor,
        normalized_shape: &Shape,
        gamma: &Tensor,
        epsilon: f64,
    ) -> Result<BackwardOutput, LayerNormError> {
        self.backward(
            grad_output,
            mean,
            invvar,
            input,
            normalized_shape,
            Some(gamma),
            None,
            epsilon,
        )
    }

    /// Backward of [`forward_with_both_affine`](Self::forward_with_both_affine).
    #[allow(clippy::too_many_arguments)]
    pub fn backward_with_both_affine(
        &self,
        grad_output: &Tensor,
        mean: &Tensor,
        invvar: &Tensor,
        input: &Tensor,
        normalized_shape: &Shape,
        gamma: &Tensor,
        beta: &Tensor,
        epsilon: f64,
    ) -> Result<BackwardOutput, LayerNormError> {
        self.backward(
            grad_output,
            mean,
            invvar,
            input,
            normalized_shape,
            Some(gamma),
            Some(beta),
            epsilon,
        )
    }

    // ── Private helpers ────────────────────────────────────────

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn trace_call(
        &self,
        pass: &str,
        rows: RowLayout,
        affine: AffineConfig,
        dtype: DType,
        epsilon: f64,
        start: Instant,
    ) {
        if self.config.enable_profiling {
            tracing::debug!(
                "layer_norm {pass}: n1={}, n2={}, affine={affine}, dtype={dtype}, eps={epsilon:e}, {:.3}ms",
                rows.n1,
                rows.n2,
                start.elapsed().as_secs_f64() * 1000.0,
            );
        }
    }
}

impl Default for LayerNorm {
    /// Default configuration on the global rayon pool.
    fn default() -> Self {
        Self {
            config: LayerNormConfig::default(),
            pool: None,
        }
    }
}

impl std::fmt::Debug for LayerNorm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerNorm")
            .field("config", &self.config)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

/// Narrows reduced `f64` sums into a tensor shaped and typed like `param`.
fn param_grad(param: &Tensor, sums: &[f64]) -> Result<Tensor, LayerNormError> {
    let values: Vec<f32> = sums.iter().map(|&v| v as f32).collect();
    let grad = Tensor::from_vec(param.shape().clone(), values)?;
    Ok(if param.dtype() == DType::F32 {
        grad
    } else {
        grad.to_dtype(param.dtype())
    })
}
