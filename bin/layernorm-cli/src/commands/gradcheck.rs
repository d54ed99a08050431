// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `lnorm gradcheck` command: analytic vs. numeric gradients.
//!
//! Uses the scalar loss `L = Σ w · out` with random `w`, so backward is fed
//! `grad_output = w` and every partial derivative of `L` is checked by a
//! central difference of step `delta`.

use layer_norm::{AffineConfig, LayerNorm, LayerNormConfig};
use rand::{rngs::StdRng, SeedableRng};
use tensor_core::{DType, Shape, Tensor};

const EPSILON: f64 = 1e-5;

pub fn execute(
    config: LayerNormConfig,
    rows: usize,
    cols: usize,
    affine: AffineConfig,
    delta: f32,
    tolerance: f64,
    seed: u64,
) -> anyhow::Result<()> {
    let ln = LayerNorm::new(config)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let ns = Shape::vector(cols);
    let x = super::random_tensor(&mut rng, Shape::matrix(rows, cols), DType::F32, -2.0, 2.0)?;
    let w = super::random_tensor(&mut rng, Shape::matrix(rows, cols), DType::F32, -1.0, 1.0)?;
    let (gamma, beta) = super::random_params(&mut rng, affine, cols)?;

    let fwd = ln.forward(&x, &ns, gamma.as_ref(), beta.as_ref(), EPSILON)?;
    let bwd = ln.backward(
        &w,
        &fwd.mean,
        &fwd.invvar,
        &x,
        &ns,
        gamma.as_ref(),
        beta.as_ref(),
        EPSILON,
    )?;

    let loss = |x: &Tensor, gamma: Option<&Tensor>, beta: Option<&Tensor>| -> anyhow::Result<f64> {
        let out = ln.forward(x, &ns, gamma, beta, EPSILON)?.output;
        Ok(out
            .as_f32_slice()
            .iter()
            .zip(w.as_f32_slice())
            .map(|(&o, &w)| o as f64 * w as f64)
            .sum())
    };

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              lnorm · Gradient Check                  ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Input:      {rows} x {cols}, affine = {affine}");
    println!("  Delta:      {delta:e}");
    println!("  Tolerance:  {tolerance:e}");
    println!();
    println!("  {:<12} {:>10} {:>14}", "Gradient", "Elements", "Max error");
    println!("  {}", "-".repeat(38));

    let mut worst = 0.0f64;

    let err = max_error(&x, bwd.grad_input.as_f32_slice(), delta, |xp| {
        loss(xp, gamma.as_ref(), beta.as_ref())
    })?;
    report("grad_input", x.num_elements(), err);
    worst = worst.max(err);

    if let (Some(g), Some(dg)) = (&gamma, &bwd.grad_gamma) {
        let err = max_error(g, dg.as_f32_slice(), delta, |gp| {
            loss(&x, Some(gp), beta.as_ref())
        })?;
        report("grad_gamma", g.num_elements(), err);
        worst = worst.max(err);
    }
    if let (Some(b), Some(db)) = (&beta, &bwd.grad_beta) {
        let err = max_error(b, db.as_f32_slice(), delta, |bp| {
            loss(&x, gamma.as_ref(), Some(bp))
        })?;
        report("grad_beta", b.num_elements(), err);
        worst = worst.max(err);
    }
    println!();

    if worst > tolerance {
        anyhow::bail!("gradient check failed: max error {worst:e} exceeds tolerance {tolerance:e}");
    }
    println!("  PASSED (max error {worst:e})");
    Ok(())
}

fn report(name: &str, elements: usize, err: f64) {
    println!("  {name:<12} {elements:>10} {err:>14.3e}");
}

/// Largest `|analytic - numeric| / (1 + |numeric|)` over the elements of `t`.
fn max_error<F>(t: &Tensor, analytic: &[f32], delta: f32, loss: F) -> anyhow::Result<f64>
where
    F: Fn(&Tensor) -> anyhow::Result<f64>,
{
    let mut worst = 0.0f64;
    for (i, &a) in analytic.iter().enumerate() {
        let mut plus = t.clone();
        plus.as_f32_slice_mut()[i] += delta;
        let mut minus = t.clone();
        minus.as_f32_slice_mut()[i] -= delta;
        let numeric = (loss(&plus)? - loss(&minus)?) / (2.0 * delta as f64);
        let err = (a as f64 - numeric).abs() / (1.0 + numeric.abs());
        tracing::trace!("element {i}: analytic {a}, numeric {numeric}");
        worst = worst.max(err);
    }
    Ok(worst)
}
