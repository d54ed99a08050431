// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CLI command implementations.

pub mod benchmark;
pub mod config;
pub mod forward;
pub mod gradcheck;

use layer_norm::{AffineConfig, LayerNormConfig};
use rand::{rngs::StdRng, Rng};
use std::path::Path;
use tensor_core::{DType, Shape, Tensor};
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber from the `-v` count.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the engine configuration, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayerNormConfig> {
    match path {
        Some(p) => {
            let config = LayerNormConfig::from_file(p)?;
            tracing::info!("loaded configuration from {}", p.display());
            Ok(config)
        }
        None => Ok(LayerNormConfig::default()),
    }
}

/// Uniform random values in `[lo, hi)`, stored as `dtype`.
pub fn random_tensor(
    rng: &mut StdRng,
    shape: Shape,
    dtype: DType,
    lo: f32,
    hi: f32,
) -> anyhow::Result<Tensor> {
    let values: Vec<f32> = (0..shape.num_elements())
        .map(|_| rng.gen_range(lo..hi))
        .collect();
    let t = Tensor::from_f32(shape, &values)?;
    Ok(if dtype == DType::F32 {
        t
    } else {
        t.to_dtype(dtype)
    })
}

/// Random `gamma` around one and `beta` around zero, for the parameters in `affine`.
pub fn random_params(
    rng: &mut StdRng,
    affine: AffineConfig,
    n2: usize,
) -> anyhow::Result<(Option<Tensor>, Option<Tensor>)> {
    let ns = Shape::vector(n2);
    let gamma = affine
        .has_gamma()
        .then(|| random_tensor(rng, ns.clone(), DType::F32, 0.5, 1.5))
        .transpose()?;
    let beta = affine
        .has_beta()
        .then(|| random_tensor(rng, ns, DType::F32, -0.5, 0.5))
        .transpose()?;
    Ok((gamma, beta))
}
