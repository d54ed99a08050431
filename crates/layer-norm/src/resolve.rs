// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reduction-extent resolution.
//!
//! Layer normalization treats its input as a 2-D `(n1, n2)` matrix: `n2`
//! is the number of elements in the trailing `normalized_shape` block and
//! `n1` is the number of such rows.

use crate::LayerNormError;
use tensor_core::Shape;

/// The effective row layout of a normalization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    /// Number of independent rows.
    pub n1: usize,
    /// Elements per row.
    pub n2: usize,
}

impl RowLayout {
    /// Total number of elements, `n1 * n2`.
    pub fn num_elements(&self) -> usize {
        self.n1 * self.n2
    }
}

/// Computes `(n1, n2)` for an input shape and a declared normalized shape.
///
/// # Errors
/// Fails if `normalized_shape` is empty or has a zero dimension, or if
/// the trailing dimensions of `input_shape` do not equal it.
///
/// # Examples
/// ```
/// use layer_norm::resolve;
/// use tensor_core::Shape;
///
/// let rows = resolve(&Shape::new(vec![2, 3, 4, 5]), &Shape::matrix(4, 5)).unwrap();
/// assert_eq!((rows.n1, rows.n2), (6, 20));
/// ```
pub fn resolve(input_shape: &Shape, normalized_shape: &Shape) -> Result<RowLayout, LayerNormError> {
    if normalized_shape.rank() == 0 {
        return Err(LayerNormError::EmptyNormalizedShape {
            normalized_shape: normalized_shape.clone(),
        });
    }
    if normalized_shape.is_empty() {
        return Err(LayerNormError::ZeroSizedNormalizedDim {
            normalized_shape: normalized_shape.clone(),
        });
    }
    if !input_shape.ends_with(normalized_shape) {
        return Err(LayerNormError::InputShapeMismatch {
            normalized_shape: normalized_shape.clone(),
            input: input_shape.clone(),
        });
    }

    let leading = input_shape.rank() - normalized_shape.rank();
    let n1 = input_shape.dims()[..leading].iter().product();
    let n2 = normalized_shape.num_elements();
    Ok(RowLayout { n1, n2 })
}
