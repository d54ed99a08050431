// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compute-device placement tags.

use std::fmt;

/// Where a tensor's buffer is considered to live.
///
/// Buffers in this crate are always host memory; the tag records the
/// placement a caller asked for so that kernels can refuse tensors that
/// belong to a different device instead of reading them as if they were
/// local.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Device {
    /// Host CPU memory.
    #[default]
    Cpu,
    /// A CUDA device, identified by ordinal.
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}
