// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Argument checks run before any output is allocated.

use crate::{resolve, LayerNormError, RowLayout};
use tensor_core::{DType, Device, Shape, Tensor};

/// The kernels in this crate execute on host memory.
const KERNEL_DEVICE: Device = Device::Cpu;

/// Validates forward arguments and resolves the row layout.
pub(crate) fn forward_args(
    input: &Tensor,
    normalized_shape: &Shape,
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
) -> Result<RowLayout, LayerNormError> {
    check_placement("input", input)?;
    check_optional_placement("gamma", gamma)?;
    check_optional_placement("beta", beta)?;

    let rows = resolve(input.shape(), normalized_shape)?;
    check_float("input", input)?;
    check_params(gamma, beta, normalized_shape, rows)?;
    Ok(rows)
}

/// Validates backward arguments and resolves the row layout.
pub(crate) fn backward_args(
    grad_output: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &Shape,
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
) -> Result<RowLayout, LayerNormError> {
    check_placement("grad_output", grad_output)?;
    check_placement("mean", mean)?;
    check_placement("invvar", invvar)?;
    check_placement("input", input)?;
    check_optional_placement("gamma", gamma)?;
    check_optional_placement("beta", beta)?;

    let rows = resolve(input.shape(), normalized_shape)?;
    check_float("input", input)?;

    if grad_output.shape() != input.shape() {
        return Err(LayerNormError::AuxShapeMismatch {
            name: "grad_output",
            expected: input.shape().clone(),
            actual: grad_output.shape().clone(),
        });
    }
    if grad_output.dtype() != input.dtype() {
        return Err(LayerNormError::DTypeMismatch {
            name: "grad_output",
            expected: input.dtype(),
            actual: grad_output.dtype(),
        });
    }

    check_stat("mean", mean, rows)?;
    check_stat("invvar", invvar, rows)?;
    check_params(gamma, beta, normalized_shape, rows)?;
    Ok(rows)
}

fn check_placement(name: &'static str, tensor: &Tensor) -> Result<(), LayerNormError> {
    if tensor.device() != KERNEL_DEVICE {
        return Err(LayerNormError::DeviceMismatch {
            name,
            expected: KERNEL_DEVICE,
            actual: tensor.device(),
        });
    }
    if !tensor.is_contiguous() {
        return Err(LayerNormError::NonContiguous {
            name,
            shape: tensor.shape().clone(),
            strides: tensor.strides().to_vec(),
        });
    }
    Ok(())
}

fn check_optional_placement(
    name: &'static str,
    tensor: Option<&Tensor>,
) -> Result<(), LayerNormError> {
    tensor.map_or(Ok(()), |t| check_placement(name, t))
}

fn check_float(name: &'static str, tensor: &Tensor) -> Result<(), LayerNormError> {
    if tensor.dtype().is_float() {
        Ok(())
    } else {
        Err(LayerNormError::UnsupportedDType {
            name,
            dtype: tensor.dtype(),
        })
    }
}

/// Saved statistics are `f32` vectors of length `n1`.
fn check_stat(name: &'static str, stat: &Tensor, rows: RowLayout) -> Result<(), LayerNormError> {
    let expected = Shape::vector(rows.n1);
    if stat.shape() != &expected {
        return Err(LayerNormError::AuxShapeMismatch {
            name,
            expected,
            actual: stat.shape().clone(),
        });
    }
    if stat.dtype() != DType::F32 {
        return Err(LayerNormError::DTypeMismatch {
            name,
            expected: DType::F32,
            actual: stat.dtype(),
        });
    }
    Ok(())
}

fn check_params(
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    normalized_shape: &Shape,
    rows: RowLayout,
) -> Result<(), LayerNormError> {
    for (name, param) in [("gamma", gamma), ("beta", beta)] {
        if let Some(param) = param {
            check_param(name, param, normalized_shape, rows)?;
        }
    }
    Ok(())
}

/// Parameters have `normalized_shape` (or its flattened `[n2]` form) and
/// any floating dtype.
fn check_param(
    name: &'static str,
    param: &Tensor,
    normalized_shape: &Shape,
    rows: RowLayout,
) -> Result<(), LayerNormError> {
    let shape = param.shape();
    if shape != normalized_shape && shape != &Shape::vector(rows.n2) {
        return Err(LayerNormError::AuxShapeMismatch {
            name,
            expected: normalized_shape.clone(),
            actual: shape.clone(),
        });
    }
    check_float(name, param)
}
