// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element types and the conversions kernels compute through.
//!
//! Every storable element widens to `f32` for arithmetic and narrows back
//! when results are written. Reductions that need more headroom widen the
//! `f32` value further to `f64` inside the kernel.

use crate::{DType, Storage};
use half::{bf16, f16};

/// A scalar type that can back a [`crate::Tensor`].
pub trait Element: Copy + Send + Sync + PartialEq + std::fmt::Debug + 'static {
    /// The dtype tag matching this element type.
    const DTYPE: DType;

    /// Widens the value to `f32`.
    fn to_f32(self) -> f32;

    /// Narrows an `f32` into this type (round to nearest).
    fn from_f32(value: f32) -> Self;

    /// Borrows the storage as a slice of `Self`, if the variant matches.
    fn slice(storage: &Storage) -> Option<&[Self]>;

    /// Mutably borrows the storage as a slice of `Self`, if the variant matches.
    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]>;

    /// Wraps an owned buffer in the matching storage variant.
    fn into_storage(values: Vec<Self>) -> Storage;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $to:expr, $from:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            #[inline(always)]
            fn to_f32(self) -> f32 {
                $to(self)
            }

            #[inline(always)]
            fn from_f32(value: f32) -> Self {
                $from(value)
            }

            fn slice(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }

            fn into_storage(values: Vec<Self>) -> Storage {
                Storage::$variant(values)
            }
        }
    };
}

impl_element!(f32, F32, |v: f32| v, |v: f32| v);
impl_element!(f16, F16, f16::to_f32, f16::from_f32);
impl_element!(bf16, BF16, bf16::to_f32, bf16::from_f32);
impl_element!(i8, I8, |v: i8| v as f32, |v: f32| {
    v.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
});
