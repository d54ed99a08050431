// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backward reduction: input gradient and affine-parameter gradients.
//!
//! With `x̂ = (x - mean) · invvar` recomputed from the saved statistics and
//! `g = dy · gamma` (or `dy` without a weight), each row needs two sums
//! before its input gradient can be written:
//!
//! ```text
//! mean_g[i]    = Σ_j g[i,j] / n2
//! mean_gx̂[i]   = Σ_j g[i,j] · x̂[i,j] / n2
//! dx[i,j]      = invvar[i] · (g[i,j] - mean_g[i] - x̂[i,j] · mean_gx̂[i])
//! ```
//!
//! The parameter gradients reduce across rows instead:
//!
//! ```text
//! dgamma[j] = Σ_i dy[i,j] · x̂[i,j]
//! dbeta[j]  = Σ_i dy[i,j]
//! ```
//!
//! Every task owns a tile of rows, writes that tile's slice of `dx`, and
//! accumulates private `f64` partials for `dgamma`/`dbeta`. The partials
//! are then combined pairwise by rayon's `reduce`, so no two tasks ever
//! write the same location.

use crate::affine::Affine;
use rayon::prelude::*;
use tensor_core::Element;

/// Reduced parameter gradients. `None` means the parameter was absent.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParamGrads {
    pub gamma: Option<Vec<f64>>,
    pub beta: Option<Vec<f64>>,
}

/// One task's partial sums. Vectors of absent parameters stay empty.
#[derive(Debug)]
struct Partials {
    gamma: Vec<f64>,
    beta: Vec<f64>,
}

impl Partials {
    fn zeros<A: Affine>(n2: usize) -> Self {
        Self {
            gamma: if A::HAS_GAMMA { vec![0.0; n2] } else { Vec::new() },
            beta: if A::HAS_BETA { vec![0.0; n2] } else { Vec::new() },
        }
    }

    fn combine(mut self, other: Self) -> Self {
        for (acc, v) in self.gamma.iter_mut().zip(&other.gamma) {
            *acc += v;
        }
        for (acc, v) in self.beta.iter_mut().zip(&other.beta) {
            *acc += v;
        }
        self
    }
}

/// Computes `grad_input` for every row and returns the reduced parameter gradients.
#[allow(clippy::too_many_arguments)]
pub(crate) fn backward_rows<T: Element, A: Affine>(
    grad_output: &[T],
    input: &[T],
    mean: &[f32],
    invvar: &[f32],
    grad_input: &mut [T],
    n2: usize,
    rows_per_task: usize,
    affine: &A,
) -> ParamGrads {
    debug_assert_eq!(grad_output.len(), input.len());
    debug_assert_eq!(grad_input.len(), input.len());
    debug_assert_eq!(input.len(), mean.len() * n2);

    // Saturates for oversized tiles, which then cover every row.
    let tile = n2.saturating_mul(rows_per_task);
    let partials = grad_input
        .par_chunks_mut(tile)
        .zip(grad_output.par_chunks(tile))
        .zip(input.par_chunks(tile))
        .zip(mean.par_chunks(rows_per_task))
        .zip(invvar.par_chunks(rows_per_task))
        .map(|((((dx_tile, dy_tile), x_tile), mean_tile), invvar_tile)| {
            let mut partial = Partials::zeros::<A>(n2);
            let rows = dx_tile
                .chunks_mut(n2)
                .zip(dy_tile.chunks(n2))
                .zip(x_tile.chunks(n2))
                .zip(mean_tile.iter().zip(invvar_tile));
            for (((dx, dy), x), (&m, &iv)) in rows {
                backward_row(dy, x, m, iv, dx, affine, &mut partial);
            }
            partial
        })
        .reduce(|| Partials::zeros::<A>(n2), Partials::combine);

    ParamGrads {
        gamma: A::HAS_GAMMA.then_some(partials.gamma),
        beta: A::HAS_BETA.then_some(partials.beta),
    }
}

#[inline]
fn backward_row<T: Element, A: Affine>(
    dy: &[T],
    x: &[T],
    mean: f32,
    invvar: f32,
    dx: &mut [T],
    affine: &A,
    partial: &mut Partials,
) {
    let n = dy.len() as f64;

    let mut sum_g = 0.0f64;
    let mut sum_g_xhat = 0.0f64;
    for (j, (dyj, xj)) in dy.iter().zip(x).enumerate() {
        let xhat = (xj.to_f32() - mean) * invvar;
        let g = affine.scale(j, dyj.to_f32());
        sum_g += g as f64;
        sum_g_xhat += g as f64 * xhat as f64;
    }
    let mean_g = (sum_g / n) as f32;
    let mean_g_xhat = (sum_g_xhat / n) as f32;

    for (j, ((dxj, dyj), xj)) in dx.iter_mut().zip(dy).zip(x).enumerate() {
        let dyj = dyj.to_f32();
        let xhat = (xj.to_f32() - mean) * invvar;
        let g = affine.scale(j, dyj);
        *dxj = T::from_f32(invvar * (g - mean_g - xhat * mean_g_xhat));
        if A::HAS_GAMMA {
            partial.gamma[j] += dyj as f64 * xhat as f64;
        }
        if A::HAS_BETA {
            partial.beta[j] += dyj as f64;
        }
    }
}
