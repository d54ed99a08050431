// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for layer normalization.

use tensor_core::{DType, Device, Shape, TensorError};

/// Coarse classification of a [`LayerNormError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A shape or length does not satisfy the call's contract.
    Shape,
    /// A tensor is on the wrong device or is not contiguous.
    DeviceOrLayout,
    /// A tensor has an element type the call cannot accept.
    DType,
    /// Invalid configuration or thread-pool setup.
    Config,
}

/// Errors raised by the layer-norm entry points.
///
/// All of them are detected before any output buffer is allocated, so a
/// failed call never leaves partial results behind.
#[derive(Debug, thiserror::Error)]
pub enum LayerNormError {
    /// `normalized_shape` has no dimensions.
    #[error(
        "expected normalized_shape to be at least 1-dimensional, i.e., containing at \
         least one element, but got normalized_shape={normalized_shape}"
    )]
    EmptyNormalizedShape { normalized_shape: Shape },

    /// `normalized_shape` contains a zero-sized dimension.
    #[error("normalized_shape={normalized_shape} must contain only positive dimensions")]
    ZeroSizedNormalizedDim { normalized_shape: Shape },

    /// The input's trailing dimensions do not equal `normalized_shape`.
    #[error(
        "Given normalized_shape={normalized_shape}, expected input with shape {}, \
         but got input of size {input}",
        expected_pattern(.normalized_shape)
    )]
    InputShapeMismatch { normalized_shape: Shape, input: Shape },

    /// An auxiliary tensor does not have the shape implied by `(n1, n2)`.
    #[error("{name} has shape {actual}, expected {expected}")]
    AuxShapeMismatch {
        name: &'static str,
        expected: Shape,
        actual: Shape,
    },

    /// A tensor is not on the device the kernel runs on.
    #[error("{name} must be on {expected}, but is on {actual}")]
    DeviceMismatch {
        name: &'static str,
        expected: Device,
        actual: Device,
    },

    /// A tensor is not laid out densely in row-major order.
    #[error("{name} must be contiguous, got shape {shape} with strides {strides:?}")]
    NonContiguous {
        name: &'static str,
        shape: Shape,
        strides: Vec<usize>,
    },

    /// A tensor has a different dtype than the call requires.
    #[error("{name} must have dtype {expected}, got {actual}")]
    DTypeMismatch {
        name: &'static str,
        expected: DType,
        actual: DType,
    },

    /// A tensor's dtype is not a floating-point type.
    #[error("{name} has unsupported dtype {dtype}; expected f32, f16 or bf16")]
    UnsupportedDType { name: &'static str, dtype: DType },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The dedicated worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A tensor-level operation failed.
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

impl LayerNormError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyNormalizedShape { .. }
            | Self::ZeroSizedNormalizedDim { .. }
            | Self::InputShapeMismatch { .. }
            | Self::AuxShapeMismatch { .. } => ErrorKind::Shape,
            Self::DeviceMismatch { .. } | Self::NonContiguous { .. } => ErrorKind::DeviceOrLayout,
            Self::DTypeMismatch { .. } | Self::UnsupportedDType { .. } => ErrorKind::DType,
            Self::Config(_) | Self::ThreadPool(_) => ErrorKind::Config,
            Self::Tensor(TensorError::BufferSizeMismatch { .. })
            | Self::Tensor(TensorError::InvalidAxis { .. }) => ErrorKind::Shape,
            Self::Tensor(_) => ErrorKind::DType,
        }
    }
}

/// Renders `[*, d0, d1, ...]`.
fn expected_pattern(normalized_shape: &Shape) -> String {
    let mut s = String::from("[*");
    for d in normalized_shape.dims() {
        s.push_str(&format!(", {d}"));
    }
    s.push(']');
    s
}
