// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Host tensor container used at the boundary of the layer-norm kernels.
//!
//! This crate provides:
//! - [`Tensor`]: an owned n-dimensional tensor with typed [`Storage`],
//!   row-major strides, and a [`Device`] placement tag.
//! - [`Shape`]: runtime shape descriptors.
//! - [`DType`]: supported element data types (f32, f16, bf16, i8).
//! - [`Element`]: the bridge from each element type to `f32` arithmetic.
//!
//! # Design Goals
//! - Zero-copy stride permutation (`transpose`); explicit `contiguous` copies.
//! - Typed buffers instead of reinterpreted bytes, so reduced-precision
//!   elements are always read through `half`.
//! - Clean error types via `thiserror`.

mod device;
mod dtype;
mod element;
mod error;
mod shape;
mod tensor;

pub use device::Device;
pub use dtype::DType;
pub use element::Element;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::{Storage, Tensor};

pub use half::{bf16, f16};
