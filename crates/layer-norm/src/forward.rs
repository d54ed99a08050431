// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Forward reduction: per-row statistics and the normalized output.
//!
//! For each row `i` of the `(n1, n2)` input:
//!
//! ```text
//! mean[i]   = Σ_j x[i,j] / n2
//! var[i]    = Σ_j (x[i,j] - mean[i])² / n2          (biased)
//! invvar[i] = 1 / sqrt(var[i] + eps)
//! y[i,j]    = (x[i,j] - mean[i]) · invvar[i] · gamma[j] + beta[j]
//! ```
//!
//! Epsilon is added to the variance only, never to the inputs, so the
//! saved mean is the exact mean of the row. With `eps = 0` a constant row
//! yields an infinite `invvar`; that value is returned as is.
//!
//! Rows are split into tiles of `rows_per_task` rows and the tiles run in
//! parallel on the current rayon pool. Each row reads only its own input
//! and writes only its own output and statistics.

use crate::affine::Affine;
use rayon::prelude::*;
use tensor_core::Element;

/// Saved statistics of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RowStats {
    pub mean: f32,
    pub invvar: f32,
}

/// Two-pass mean and inverse standard deviation with `f64` accumulators.
pub(crate) fn row_stats<T: Element>(row: &[T], epsilon: f64) -> RowStats {
    let n = row.len() as f64;
    let mean = row.iter().map(|x| x.to_f32() as f64).sum::<f64>() / n;
    let var = row
        .iter()
        .map(|x| {
            let d = x.to_f32() as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    RowStats {
        mean: mean as f32,
        invvar: (1.0 / (var + epsilon).sqrt()) as f32,
    }
}

/// Normalizes every row of `input` into `output` and records its statistics.
///
/// `input` and `output` hold `mean.len()` rows of `n2` elements.
#[allow(clippy::too_many_arguments)]
pub(crate) fn forward_rows<T: Element, A: Affine>(
    input: &[T],
    output: &mut [T],
    mean: &mut [f32],
    invvar: &mut [f32],
    n2: usize,
    epsilon: f64,
    rows_per_task: usize,
    affine: &A,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert_eq!(input.len(), mean.len() * n2);

    // Saturates for oversized tiles, which then cover every row.
    let tile = n2.saturating_mul(rows_per_task);
    output
        .par_chunks_mut(tile)
        .zip(input.par_chunks(tile))
        .zip(mean.par_chunks_mut(rows_per_task))
        .zip(invvar.par_chunks_mut(rows_per_task))
        .for_each(|(((y_tile, x_tile), mean_tile), invvar_tile)| {
            let rows = y_tile
                .chunks_mut(n2)
                .zip(x_tile.chunks(n2))
                .zip(mean_tile.iter_mut().zip(invvar_tile.iter_mut()));
            for ((y, x), (m, iv)) in rows {
                // The output is built from the rounded statistics, which are
                // exactly what backward reads back.
                let stats = row_stats(x, epsilon);
                normalize_row(x, y, stats, affine);
                *m = stats.mean;
                *iv = stats.invvar;
            }
        });
}

#[inline]
fn normalize_row<T: Element, A: Affine>(x: &[T], y: &mut [T], stats: RowStats, affine: &A) {
    for (j, (yj, xj)) in y.iter_mut().zip(x).enumerate() {
        let xhat = (xj.to_f32() - stats.mean) * stats.invvar;
        *yj = T::from_f32(affine.apply(j, xhat));
    }
}
