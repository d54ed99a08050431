// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `lnorm benchmark` command: sweep thread counts and affine kinds.
//!
//! Each configuration gets one warm-up call, then `iters` timed calls of
//! forward and backward; the table reports the mean per call.

use layer_norm::{AffineConfig, LayerNorm, LayerNormConfig};
use rand::{rngs::StdRng, SeedableRng};
use std::time::Instant;
use tensor_core::{DType, Shape};

const EPSILON: f64 = 1e-5;

pub fn execute(
    config: LayerNormConfig,
    rows: usize,
    cols: usize,
    iters: usize,
    threads_str: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(iters > 0, "--iters must be positive");

    let threads: Vec<usize> = threads_str
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("invalid thread count '{}': {e}", s.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              lnorm · Benchmark Suite                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Shape:         {rows} x {cols} (f32)");
    println!("  Threads:       {threads:?}");
    println!("  Rows per task: {}", config.rows_per_task);
    println!("  Iterations:    {iters}");
    println!();

    let mut rng = StdRng::seed_from_u64(0);
    let ns = Shape::vector(cols);
    let x = super::random_tensor(&mut rng, Shape::matrix(rows, cols), DType::F32, -1.0, 1.0)?;
    let dy = super::random_tensor(&mut rng, Shape::matrix(rows, cols), DType::F32, -1.0, 1.0)?;

    println!(
        "  {:<8} {:<8} {:>12} {:>12} {:>14}",
        "Threads", "Affine", "Forward", "Backward", "Fwd GElem/s",
    );
    println!("  {}", "-".repeat(58));

    let mut results: Vec<BenchResult> = Vec::new();

    for &n in &threads {
        let ln = LayerNorm::new(LayerNormConfig {
            num_threads: Some(n),
            enable_profiling: false,
            ..config.clone()
        })?;

        for affine in AffineConfig::ALL {
            let (gamma, beta) = super::random_params(&mut rng, affine, cols)?;
            let (gamma, beta) = (gamma.as_ref(), beta.as_ref());

            let fwd = ln.forward(&x, &ns, gamma, beta, EPSILON)?;
            let start = Instant::now();
            for _ in 0..iters {
                ln.forward(&x, &ns, gamma, beta, EPSILON)?;
            }
            let forward_ms = start.elapsed().as_secs_f64() * 1000.0 / iters as f64;

            ln.backward(&dy, &fwd.mean, &fwd.invvar, &x, &ns, gamma, beta, EPSILON)?;
            let start = Instant::now();
            for _ in 0..iters {
                ln.backward(&dy, &fwd.mean, &fwd.invvar, &x, &ns, gamma, beta, EPSILON)?;
            }
            let backward_ms = start.elapsed().as_secs_f64() * 1000.0 / iters as f64;

            let r = BenchResult {
                threads: n,
                affine,
                forward_ms,
                backward_ms,
                gelems_per_sec: (rows * cols) as f64 / (forward_ms * 1e6),
            };
            println!(
                "  {:<8} {:<8} {:>10.3}ms {:>10.3}ms {:>14.2}",
                r.threads, r.affine, r.forward_ms, r.backward_ms, r.gelems_per_sec,
            );
            results.push(r);
        }
    }
    println!();

    // ── Summary ────────────────────────────────────────────────
    let fastest = results
        .iter()
        .min_by(|a, b| (a.forward_ms + a.backward_ms).total_cmp(&(b.forward_ms + b.backward_ms)));
    if let Some(f) = fastest {
        println!("  Summary:");
        println!(
            "   Fastest round trip: {} threads, affine = {} ({:.3}ms)",
            f.threads,
            f.affine,
            f.forward_ms + f.backward_ms,
        );
        println!();
    }

    Ok(())
}

#[derive(Debug)]
struct BenchResult {
    threads: usize,
    affine: AffineConfig,
    forward_ms: f64,
    backward_ms: f64,
    gelems_per_sec: f64,
}
