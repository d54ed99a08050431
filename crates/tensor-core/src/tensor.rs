// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type and its typed storage.

use crate::{DType, Device, Element, Shape, TensorError};
use half::{bf16, f16};

/// Typed backing buffer of a [`Tensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    I8(Vec<i8>),
}

impl Storage {
    /// Allocates a zero-filled buffer of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Storage::F32(vec![0.0; len]),
            DType::F16 => Storage::F16(vec![f16::ZERO; len]),
            DType::BF16 => Storage::BF16(vec![bf16::ZERO; len]),
            DType::I8 => Storage::I8(vec![0; len]),
        }
    }

    /// Narrows `f32` values into a buffer of the given dtype.
    pub fn from_f32_values(dtype: DType, values: &[f32]) -> Self {
        fn narrow<T: Element>(values: &[f32]) -> Storage {
            T::into_storage(values.iter().map(|&v| T::from_f32(v)).collect())
        }
        match dtype {
            DType::F32 => Storage::F32(values.to_vec()),
            DType::F16 => narrow::<f16>(values),
            DType::BF16 => narrow::<bf16>(values),
            DType::I8 => narrow::<i8>(values),
        }
    }

    /// Returns the element type held by this buffer.
    pub fn dtype(&self) -> DType {
        match self {
            Storage::F32(_) => DType::F32,
            Storage::F16(_) => DType::F16,
            Storage::BF16(_) => DType::BF16,
            Storage::I8(_) => DType::I8,
        }
    }

    /// Returns the number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Storage::F32(v) => v.len(),
            Storage::F16(v) => v.len(),
            Storage::BF16(v) => v.len(),
            Storage::I8(v) => v.len(),
        }
    }

    /// Returns `true` if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widens the element at `offset` to `f32`.
    fn get_f32(&self, offset: usize) -> f32 {
        match self {
            Storage::F32(v) => v[offset],
            Storage::F16(v) => v[offset].to_f32(),
            Storage::BF16(v) => v[offset].to_f32(),
            Storage::I8(v) => v[offset] as f32,
        }
    }

    /// Copies the elements at `offsets`, in order, into a new buffer.
    fn gather(&self, offsets: &[usize]) -> Storage {
        match self {
            Storage::F32(v) => Storage::F32(offsets.iter().map(|&o| v[o]).collect()),
            Storage::F16(v) => Storage::F16(offsets.iter().map(|&o| v[o]).collect()),
            Storage::BF16(v) => Storage::BF16(offsets.iter().map(|&o| v[o]).collect()),
            Storage::I8(v) => Storage::I8(offsets.iter().map(|&o| v[o]).collect()),
        }
    }
}

/// An owned, n-dimensional tensor.
///
/// `Tensor` is the data carrier at the kernel boundary. It owns its
/// buffer and records, next to the shape, the strides used to address
/// it and the device it is placed on.
///
/// # Memory Layout
/// Freshly created tensors are row-major (C order) and contiguous.
/// [`transpose`](Tensor::transpose) permutes strides without moving
/// data, producing a non-contiguous tensor; [`contiguous`](Tensor::contiguous)
/// materialises a row-major copy.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Shape,
    strides: Vec<usize>,
    device: Device,
    storage: Storage,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
    /// assert_eq!(t.num_elements(), 6);
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let storage = Storage::zeros(dtype, shape.num_elements());
        Self::from_storage(shape, storage)
    }

    /// Creates a tensor where every element equals `value`.
    pub fn full(shape: Shape, dtype: DType, value: f32) -> Self {
        let values = vec![value; shape.num_elements()];
        Self::from_storage(shape, Storage::from_f32_values(dtype, &values))
    }

    /// Creates a tensor that takes ownership of `values`.
    ///
    /// Returns an error if `values.len()` differs from the shape's element count.
    pub fn from_vec<T: Element>(shape: Shape, values: Vec<T>) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if values.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self::from_storage(shape, T::into_storage(values)))
    }

    /// Creates a tensor from a slice of `f32` values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.as_f32_slice(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        Self::from_vec(shape, values.to_vec())
    }

    fn from_storage(shape: Shape, storage: Storage) -> Self {
        let strides = shape.strides();
        Self {
            shape,
            strides,
            device: Device::Cpu,
            storage,
        }
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns the device the tensor is placed on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns the element strides used to address the buffer.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the backing buffer.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns the number of logical elements.
    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    /// Returns `true` if the strides describe a dense row-major layout.
    ///
    /// Dimensions of extent 0 or 1 never affect addressing, so their
    /// strides are ignored.
    pub fn is_contiguous(&self) -> bool {
        self.shape
            .dims()
            .iter()
            .zip(&self.strides)
            .zip(self.shape.strides())
            .all(|((&dim, &stride), expected)| dim <= 1 || stride == expected)
    }

    /// Borrows the buffer as a slice of `T`, in storage order.
    ///
    /// Storage order equals logical order only for contiguous tensors.
    pub fn as_slice<T: Element>(&self) -> Result<&[T], TensorError> {
        T::slice(&self.storage).ok_or(TensorError::DTypeMismatch {
            requested: T::DTYPE,
            actual: self.dtype(),
        })
    }

    /// Mutably borrows the buffer as a slice of `T`, in storage order.
    pub fn as_slice_mut<T: Element>(&mut self) -> Result<&mut [T], TensorError> {
        let actual = self.dtype();
        T::slice_mut(&mut self.storage).ok_or(TensorError::DTypeMismatch {
            requested: T::DTYPE,
            actual,
        })
    }

    /// Interprets the buffer as a slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn as_f32_slice(&self) -> &[f32] {
        match &self.storage {
            Storage::F32(v) => v.as_slice(),
            other => panic!("as_f32_slice called on {:?} tensor", other.dtype()),
        }
    }

    /// Interprets the buffer as a mutable slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        match &mut self.storage {
            Storage::F32(v) => v.as_mut_slice(),
            other => panic!("as_f32_slice_mut called on {:?} tensor", other.dtype()),
        }
    }

    /// Returns every element widened to `f32`, in logical (row-major) order.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        if self.is_contiguous() {
            (0..self.num_elements())
                .map(|i| self.storage.get_f32(i))
                .collect()
        } else {
            self.logical_offsets()
                .into_iter()
                .map(|o| self.storage.get_f32(o))
                .collect()
        }
    }

    /// Converts to another dtype, producing a contiguous tensor.
    pub fn to_dtype(&self, dtype: DType) -> Tensor {
        let storage = Storage::from_f32_values(dtype, &self.to_f32_vec());
        let mut out = Self::from_storage(self.shape.clone(), storage);
        out.device = self.device;
        out
    }

    /// Re-tags the tensor with a device placement. The buffer is untouched.
    pub fn to_device(mut self, device: Device) -> Tensor {
        self.device = device;
        self
    }

    /// Swaps two dimensions by permuting strides; no data is moved.
    ///
    /// The result is generally not contiguous.
    pub fn transpose(mut self, a: usize, b: usize) -> Result<Tensor, TensorError> {
        let rank = self.shape.rank();
        for axis in [a, b] {
            if axis >= rank {
                return Err(TensorError::InvalidAxis { axis, rank });
            }
        }
        let mut dims = self.shape.dims().to_vec();
        dims.swap(a, b);
        self.strides.swap(a, b);
        self.shape = Shape::new(dims);
        Ok(self)
    }

    /// Returns a row-major copy; clones if already contiguous.
    pub fn contiguous(&self) -> Tensor {
        if self.is_contiguous() {
            return self.clone();
        }
        let storage = self.storage.gather(&self.logical_offsets());
        let mut out = Self::from_storage(self.shape.clone(), storage);
        out.device = self.device;
        out
    }

    /// Buffer offsets of every logical element in row-major order.
    fn logical_offsets(&self) -> Vec<usize> {
        let dims = self.shape.dims();
        let total = self.num_elements();
        let mut offsets = Vec::with_capacity(total);
        if total == 0 {
            return offsets;
        }
        let mut index = vec![0usize; dims.len()];
        for _ in 0..total {
            offsets.push(index.iter().zip(&self.strides).map(|(i, s)| i * s).sum());
            for axis in (0..dims.len()).rev() {
                index[axis] += 1;
                if index[axis] < dims[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        offsets
    }
}
