// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::DType;

/// Errors that can occur during tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The number of provided elements does not match the shape.
    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Typed access was requested with the wrong element type.
    #[error("dtype mismatch: tensor holds {actual}, requested {requested}")]
    DTypeMismatch { requested: DType, actual: DType },

    /// A dtype name could not be parsed.
    #[error("unknown dtype '{0}'; expected one of f32, f16, bf16, i8")]
    UnknownDType(String),

    /// A dimension index is out of range for the tensor's rank.
    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },
}
