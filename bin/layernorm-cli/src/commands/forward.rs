// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `lnorm forward` command: normalize a seeded random batch.
//!
//! Prints the saved per-row statistics and a summary of the output rows,
//! or the same data as JSON with `--json`.

use layer_norm::{AffineConfig, LayerNorm, LayerNormConfig};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tensor_core::{DType, Shape};

pub struct Args {
    pub rows: usize,
    pub cols: usize,
    pub affine: AffineConfig,
    pub epsilon: f64,
    pub dtype: DType,
    pub seed: u64,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    rows: usize,
    cols: usize,
    affine: AffineConfig,
    dtype: DType,
    epsilon: f64,
    elapsed_ms: f64,
    per_row: Vec<RowReport>,
}

#[derive(Debug, Serialize)]
struct RowReport {
    mean: f32,
    invvar: f32,
    out_mean: f32,
    out_std: f32,
    out_min: f32,
    out_max: f32,
}

pub fn execute(config: LayerNormConfig, args: Args) -> anyhow::Result<()> {
    let ln = LayerNorm::new(config)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let x = super::random_tensor(
        &mut rng,
        Shape::matrix(args.rows, args.cols),
        args.dtype,
        -3.0,
        3.0,
    )?;
    let (gamma, beta) = super::random_params(&mut rng, args.affine, args.cols)?;

    let start = std::time::Instant::now();
    let fwd = ln.forward(
        &x,
        &Shape::vector(args.cols),
        gamma.as_ref(),
        beta.as_ref(),
        args.epsilon,
    )?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let output = fwd.output.to_f32_vec();
    let per_row: Vec<RowReport> = fwd
        .mean
        .as_f32_slice()
        .iter()
        .zip(fwd.invvar.as_f32_slice())
        .zip(output.chunks(args.cols.max(1)))
        .map(|((&mean, &invvar), row)| summarize(mean, invvar, row))
        .collect();

    let report = Report {
        rows: args.rows,
        cols: args.cols,
        affine: args.affine,
        dtype: args.dtype,
        epsilon: args.epsilon,
        elapsed_ms,
        per_row,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              lnorm · Forward Pass                    ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Input:    {} x {} ({})", report.rows, report.cols, report.dtype);
    println!("  Affine:   {}", report.affine);
    println!("  Epsilon:  {:e}", report.epsilon);
    println!("  Elapsed:  {:.3}ms", report.elapsed_ms);
    println!();
    println!(
        "  {:>5} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Row", "Mean", "InvVar", "Out mean", "Out std", "Out min", "Out max",
    );
    println!("  {}", "-".repeat(72));
    for (i, r) in report.per_row.iter().enumerate() {
        println!(
            "  {:>5} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            i, r.mean, r.invvar, r.out_mean, r.out_std, r.out_min, r.out_max,
        );
    }
    println!();

    Ok(())
}

fn summarize(mean: f32, invvar: f32, row: &[f32]) -> RowReport {
    let n = row.len() as f64;
    let out_mean = row.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = row
        .iter()
        .map(|&v| (v as f64 - out_mean).powi(2))
        .sum::<f64>()
        / n;
    RowReport {
        mean,
        invvar,
        out_mean: out_mean as f32,
        out_std: var.sqrt() as f32,
        out_min: row.iter().copied().fold(f32::INFINITY, f32::min),
        out_max: row.iter().copied().fold(f32::NEG_INFINITY, f32::max),
    }
}
