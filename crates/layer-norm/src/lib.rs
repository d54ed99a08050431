// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # layer-norm
//!
//! Layer normalization over the trailing dimensions of a tensor, with the
//! saved statistics and gradients needed for training.
//!
//! The crate is organised leaf-first:
//! - [`resolve`]: reduces an input shape and a `normalized_shape` to the
//!   `(n1, n2)` row layout every kernel works in.
//! - `forward`: per-row two-pass mean/variance and the normalized output.
//! - `backward`: per-row input gradient plus cross-row reduction of the
//!   affine-parameter gradients.
//! - `affine`: picks one of four specialised code paths (no affine,
//!   bias, weight, both) per call, see [`AffineConfig`].
//! - [`LayerNorm`]: the boundary: validation, allocation, dispatch.
//!
//! # Parallelism
//! Rows are independent, so both passes split the row space into tiles
//! executed by rayon. The parameter gradients are the only cross-row
//! quantity; they are reduced from per-tile partial sums.
//!
//! # Example
//! ```
//! use layer_norm::LayerNorm;
//! use tensor_core::{Shape, Tensor};
//!
//! let ln = LayerNorm::default();
//! let ns = Shape::vector(4);
//! let x = Tensor::from_f32(Shape::matrix(2, 4), &[1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 1.0, 1.0]).unwrap();
//! let fwd = ln.forward(&x, &ns, None, None, 1e-5).unwrap();
//!
//! let dy = Tensor::from_f32(Shape::matrix(2, 4), &[1.0; 8]).unwrap();
//! let bwd = ln
//!     .backward(&dy, &fwd.mean, &fwd.invvar, &x, &ns, None, None, 1e-5)
//!     .unwrap();
//! assert!(bwd.grad_gamma.is_none());
//! ```

mod affine;
mod backward;
mod config;
mod error;
mod forward;
mod norm;
mod resolve;
mod validate;

pub use affine::AffineConfig;
pub use config::LayerNormConfig;
pub use error::{ErrorKind, LayerNormError};
pub use norm::{BackwardOutput, ForwardOutput, LayerNorm};
pub use resolve::{resolve, RowLayout};

use tensor_core::{Shape, Tensor};

/// [`LayerNorm::forward`] with the default configuration on the global pool.
pub fn forward(
    input: &Tensor,
    normalized_shape: &Shape,
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    epsilon: f64,
) -> Result<ForwardOutput, LayerNormError> {
    LayerNorm::default().forward(input, normalized_shape, gamma, beta, epsilon)
}

/// [`LayerNorm::backward`] with the default configuration on the global pool.
#[allow(clippy::too_many_arguments)]
pub fn backward(
    grad_output: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &Shape,
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    epsilon: f64,
) -> Result<BackwardOutput, LayerNormError> {
    LayerNorm::default().backward(
        grad_output,
        mean,
        invvar,
        input,
        normalized_shape,
        gamma,
        beta,
        epsilon,
    )
}
