// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: forward/backward through the public entry points.
//!
//! Covers the worked scenario, boundary layouts, finite-difference
//! gradient checks, the error taxonomy, and reduced-precision dtypes.

use approx::assert_abs_diff_eq;
use layer_norm::{ErrorKind, LayerNorm, LayerNormConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tensor_core::{DType, Device, Shape, Tensor};

const EPS: f64 = 1e-5;

// ── Helpers ────────────────────────────────────────────────────

fn random_tensor(rng: &mut StdRng, shape: Shape, lo: f32, hi: f32) -> Tensor {
    let values: Vec<f32> = (0..shape.num_elements())
        .map(|_| rng.gen_range(lo..hi))
        .collect();
    Tensor::from_f32(shape, &values).unwrap()
}

/// Σ w·out, accumulated in f64.
fn weighted_loss(
    ln: &LayerNorm,
    x: &Tensor,
    ns: &Shape,
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    w: &Tensor,
) -> f64 {
    let out = ln.forward(x, ns, gamma, beta, EPS).unwrap().output;
    out.as_f32_slice()
        .iter()
        .zip(w.as_f32_slice())
        .map(|(&o, &w)| o as f64 * w as f64)
        .sum()
}

/// Central difference of the loss with respect to element `i` of `t`.
fn numeric_grad(t: &Tensor, i: usize, delta: f32, loss: impl Fn(&Tensor) -> f64) -> f64 {
    let mut plus = t.clone();
    plus.as_f32_slice_mut()[i] += delta;
    let mut minus = t.clone();
    minus.as_f32_slice_mut()[i] -= delta;
    (loss(&plus) - loss(&minus)) / (2.0 * delta as f64)
}

fn assert_grad_close(analytic: f32, numeric: f64, what: &str) {
    let tol = 1e-2 * (1.0 + numeric.abs());
    assert!(
        (analytic as f64 - numeric).abs() <= tol,
        "{what}: analytic {analytic} vs numeric {numeric}"
    );
}

// ── Forward ────────────────────────────────────────────────────

#[test]
fn test_worked_example() {
    let x = Tensor::from_f32(Shape::matrix(1, 4), &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let fwd = layer_norm::forward(&x, &Shape::vector(4), None, None, EPS).unwrap();

    assert_abs_diff_eq!(fwd.mean.as_f32_slice()[0], 2.5, epsilon = 1e-6);
    assert_abs_diff_eq!(fwd.invvar.as_f32_slice()[0], 0.894_423, epsilon = 1e-5);
    let expected = [-1.341_635, -0.447_212, 0.447_212, 1.341_635];
    for (o, e) in fwd.output.as_f32_slice().iter().zip(expected) {
        assert_abs_diff_eq!(*o, e, epsilon = 1e-4);
    }
}

#[test]
fn test_affine_applied_per_column() {
    let ln = LayerNorm::default();
    let ns = Shape::vector(4);
    let x = Tensor::from_f32(Shape::matrix(1, 4), &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let g = Tensor::from_f32(ns.clone(), &[2.0, 2.0, -1.0, 0.0]).unwrap();
    let b = Tensor::from_f32(ns.clone(), &[0.0, 1.0, 0.0, 5.0]).unwrap();

    let plain = ln.forward_none_affine(&x, &ns, EPS).unwrap().output;
    let both = ln.forward_with_both_affine(&x, &ns, &g, &b, EPS).unwrap().output;
    let (p, y) = (plain.as_f32_slice(), both.as_f32_slice());
    assert_abs_diff_eq!(y[0], 2.0 * p[0], epsilon = 1e-6);
    assert_abs_diff_eq!(y[1], 2.0 * p[1] + 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(y[2], -p[2], epsilon = 1e-6);
    assert_abs_diff_eq!(y[3], 5.0, epsilon = 1e-6);
}

#[test]
fn test_multi_dim_normalized_shape() {
    // [2, 3, 4] normalized over [3, 4]: two rows of twelve.
    let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
    let x = Tensor::from_f32(Shape::new(vec![2, 3, 4]), &values).unwrap();
    let fwd = layer_norm::forward(&x, &Shape::matrix(3, 4), None, None, EPS).unwrap();

    assert_eq!(fwd.mean.shape(), &Shape::vector(2));
    assert_abs_diff_eq!(fwd.mean.as_f32_slice()[0], 5.5, epsilon = 1e-6);
    assert_abs_diff_eq!(fwd.mean.as_f32_slice()[1], 17.5, epsilon = 1e-6);
    // Both rows are shifted copies, so their normalized values agree.
    let out = fwd.output.as_f32_slice();
    for j in 0..12 {
        assert_abs_diff_eq!(out[j], out[12 + j], epsilon = 1e-5);
    }
}

#[test]
fn test_single_element_rows() {
    let ns = Shape::vector(1);
    let x = Tensor::from_f32(Shape::matrix(3, 1), &[3.0, -7.0, 0.5]).unwrap();
    let b = Tensor::from_f32(ns.clone(), &[0.25]).unwrap();

    let fwd = LayerNorm::default()
        .forward_with_bias_affine(&x, &ns, &b, EPS)
        .unwrap();
    assert_eq!(fwd.output.as_f32_slice(), &[0.25, 0.25, 0.25]);
    assert_eq!(fwd.mean.as_f32_slice(), &[3.0, -7.0, 0.5]);
    let expected_invvar = (1.0 / EPS.sqrt()) as f32;
    for &iv in fwd.invvar.as_f32_slice() {
        assert_abs_diff_eq!(iv, expected_invvar, epsilon = 1e-2);
    }

    let plain = layer_norm::forward(&x, &ns, None, None, EPS).unwrap();
    assert!(plain.output.as_f32_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn test_zero_rows() {
    let ln = LayerNorm::default();
    let ns = Shape::vector(4);
    let x = Tensor::zeros(Shape::matrix(0, 4), DType::F32);
    let g = Tensor::full(ns.clone(), DType::F32, 1.0);
    let b = Tensor::zeros(ns.clone(), DType::F32);

    let fwd = ln.forward_with_both_affine(&x, &ns, &g, &b, EPS).unwrap();
    assert_eq!(fwd.output.shape(), &Shape::matrix(0, 4));
    assert_eq!(fwd.mean.num_elements(), 0);
    assert_eq!(fwd.invvar.num_elements(), 0);

    let bwd = ln
        .backward_with_both_affine(&x, &fwd.mean, &fwd.invvar, &x, &ns, &g, &b, EPS)
        .unwrap();
    assert_eq!(bwd.grad_input.num_elements(), 0);
    assert_eq!(bwd.grad_gamma.unwrap().to_f32_vec(), vec![0.0; 4]);
    assert_eq!(bwd.grad_beta.unwrap().to_f32_vec(), vec![0.0; 4]);
}

#[test]
fn test_zero_epsilon_constant_row() {
    let x = Tensor::from_f32(Shape::matrix(1, 3), &[2.0, 2.0, 2.0]).unwrap();
    let fwd = layer_norm::forward(&x, &Shape::vector(3), None, None, 0.0).unwrap();
    assert!(fwd.invvar.as_f32_slice()[0].is_infinite());
}

// ── Backward ───────────────────────────────────────────────────

#[test]
fn test_grad_input_finite_difference() {
    let mut rng = StdRng::seed_from_u64(7);
    let ns = Shape::vector(5);
    let x = random_tensor(&mut rng, Shape::matrix(3, 5), -2.0, 2.0);
    let w = random_tensor(&mut rng, Shape::matrix(3, 5), -1.0, 1.0);
    let g = random_tensor(&mut rng, ns.clone(), 0.5, 1.5);
    let b = random_tensor(&mut rng, ns.clone(), -0.5, 0.5);
    let ln = LayerNorm::default();

    let fwd = ln.forward(&x, &ns, Some(&g), Some(&b), EPS).unwrap();
    let bwd = ln
        .backward(&w, &fwd.mean, &fwd.invvar, &x, &ns, Some(&g), Some(&b), EPS)
        .unwrap();

    let dx = bwd.grad_input.as_f32_slice();
    for i in 0..x.num_elements() {
        let numeric = numeric_grad(&x, i, 1e-2, |xp| {
            weighted_loss(&ln, xp, &ns, Some(&g), Some(&b), &w)
        });
        assert_grad_close(dx[i], numeric, &format!("grad_input[{i}]"));
    }
}

#[test]
fn test_param_grads_finite_difference() {
    let mut rng = StdRng::seed_from_u64(11);
    let ns = Shape::vector(4);
    let x = random_tensor(&mut rng, Shape::matrix(6, 4), -3.0, 3.0);
    let w = random_tensor(&mut rng, Shape::matrix(6, 4), -1.0, 1.0);
    let g = random_tensor(&mut rng, ns.clone(), 0.5, 1.5);
    let b = random_tensor(&mut rng, ns.clone(), -0.5, 0.5);
    let ln = LayerNorm::default();

    let fwd = ln.forward_with_both_affine(&x, &ns, &g, &b, EPS).unwrap();
    let bwd = ln
        .backward_with_both_affine(&w, &fwd.mean, &fwd.invvar, &x, &ns, &g, &b, EPS)
        .unwrap();
    let dg = bwd.grad_gamma.unwrap();
    let db = bwd.grad_beta.unwrap();

    for j in 0..4 {
        let numeric = numeric_grad(&g, j, 1e-2, |gp| {
            weighted_loss(&ln, &x, &ns, Some(gp), Some(&b), &w)
        });
        assert_grad_close(dg.as_f32_slice()[j], numeric, &format!("grad_gamma[{j}]"));

        let numeric = numeric_grad(&b, j, 1e-2, |bp| {
            weighted_loss(&ln, &x, &ns, Some(&g), Some(bp), &w)
        });
        assert_grad_close(db.as_f32_slice()[j], numeric, &format!("grad_beta[{j}]"));
    }
}

#[test]
fn test_grad_beta_is_column_sum() {
    let ns = Shape::vector(2);
    let x = Tensor::from_f32(Shape::matrix(3, 2), &[1.0, 2.0, 5.0, -1.0, 0.0, 4.0]).unwrap();
    let dy = Tensor::from_f32(Shape::matrix(3, 2), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let b = Tensor::zeros(ns.clone(), DType::F32);
    let ln = LayerNorm::default();

    let fwd = ln.forward_with_bias_affine(&x, &ns, &b, EPS).unwrap();
    let bwd = ln
        .backward_with_bias_affine(&dy, &fwd.mean, &fwd.invvar, &x, &ns, &b, EPS)
        .unwrap();
    assert_eq!(bwd.grad_beta.unwrap().as_f32_slice(), &[9.0, 12.0]);
}

#[test]
fn test_absent_params_have_no_grads() {
    let ns = Shape::vector(3);
    let x = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 4.0, 0.0, -1.0, 1.0]).unwrap();
    let dy = Tensor::full(Shape::matrix(2, 3), DType::F32, 1.0);
    let g = Tensor::full(ns.clone(), DType::F32, 1.0);
    let ln = LayerNorm::default();

    let fwd = ln.forward_with_weight_affine(&x, &ns, &g, EPS).unwrap();
    let bwd = ln
        .backward_with_weight_affine(&dy, &fwd.mean, &fwd.invvar, &x, &ns, &g, EPS)
        .unwrap();
    assert!(bwd.grad_gamma.is_some());
    assert!(bwd.grad_beta.is_none());

    let fwd = ln.forward_none_affine(&x, &ns, EPS).unwrap();
    let bwd = ln
        .backward_none_affine(&dy, &fwd.mean, &fwd.invvar, &x, &ns, EPS)
        .unwrap();
    assert!(bwd.grad_gamma.is_none());
    assert!(bwd.grad_beta.is_none());
    // Uniform upstream gradient is orthogonal to every normalized row.
    for &v in bwd.grad_input.as_f32_slice() {
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-5);
    }
}

#[test]
fn test_dedicated_pool_matches_global() {
    let mut rng = StdRng::seed_from_u64(3);
    let ns = Shape::vector(16);
    let x = random_tensor(&mut rng, Shape::matrix(37, 16), -4.0, 4.0);
    let dy = random_tensor(&mut rng, Shape::matrix(37, 16), -1.0, 1.0);
    let g = random_tensor(&mut rng, ns.clone(), 0.5, 1.5);

    let global = LayerNorm::default();
    let pooled = LayerNorm::new(LayerNormConfig {
        num_threads: Some(3),
        rows_per_task: 5,
        enable_profiling: false,
    })
    .unwrap();

    let a = global.forward_with_weight_affine(&x, &ns, &g, EPS).unwrap();
    let b = pooled.forward_with_weight_affine(&x, &ns, &g, EPS).unwrap();
    assert_eq!(a.output.as_f32_slice(), b.output.as_f32_slice());
    assert_eq!(a.invvar.as_f32_slice(), b.invvar.as_f32_slice());

    let ga = global
        .backward_with_weight_affine(&dy, &a.mean, &a.invvar, &x, &ns, &g, EPS)
        .unwrap();
    let gb = pooled
        .backward_with_weight_affine(&dy, &b.mean, &b.invvar, &x, &ns, &g, EPS)
        .unwrap();
    assert_eq!(ga.grad_input.as_f32_slice(), gb.grad_input.as_f32_slice());
    let (da, db) = (ga.grad_gamma.unwrap(), gb.grad_gamma.unwrap());
    for (a, b) in da.as_f32_slice().iter().zip(db.as_f32_slice()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

// ── Reduced precision ──────────────────────────────────────────

#[test]
fn test_half_precision_input() {
    let mut rng = StdRng::seed_from_u64(5);
    let ns = Shape::vector(8);
    let x32 = random_tensor(&mut rng, Shape::matrix(4, 8), -2.0, 2.0);

    for dtype in [DType::F16, DType::BF16] {
        let x = x32.to_dtype(dtype);
        let fwd = layer_norm::forward(&x, &ns, None, None, EPS).unwrap();
        assert_eq!(fwd.output.dtype(), dtype);
        assert_eq!(fwd.mean.dtype(), DType::F32);

        // Reference on the rounded inputs, in f32.
        let widened = Tensor::from_f32(x.shape().clone(), &x.to_f32_vec()).unwrap();
        let reference = layer_norm::forward(&widened, &ns, None, None, EPS).unwrap();
        for (o, r) in fwd
            .output
            .to_f32_vec()
            .iter()
            .zip(reference.output.as_f32_slice())
        {
            assert_abs_diff_eq!(*o, *r, epsilon = 3e-2);
        }
    }
}

#[test]
fn test_mixed_dtype_params() {
    let ns = Shape::vector(3);
    let x = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, -1.0, 0.0, 1.0]).unwrap();
    let dy = Tensor::full(Shape::matrix(2, 3), DType::F32, 1.0);
    let g = Tensor::full(ns.clone(), DType::F16, 2.0);
    let b = Tensor::full(ns.clone(), DType::BF16, 0.5);
    let ln = LayerNorm::default();

    let fwd = ln.forward_with_both_affine(&x, &ns, &g, &b, EPS).unwrap();
    assert_eq!(fwd.output.dtype(), DType::F32);
    assert_abs_diff_eq!(fwd.output.as_f32_slice()[1], 0.5, epsilon = 1e-6);

    let bwd = ln
        .backward_with_both_affine(&dy, &fwd.mean, &fwd.invvar, &x, &ns, &g, &b, EPS)
        .unwrap();
    let dg = bwd.grad_gamma.unwrap();
    let db = bwd.grad_beta.unwrap();
    assert_eq!(dg.dtype(), DType::F16);
    assert_eq!(db.dtype(), DType::BF16);
    assert_eq!(db.to_f32_vec(), vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_flat_param_shape_accepted() {
    let ns = Shape::matrix(2, 2);
    let x = Tensor::from_f32(Shape::new(vec![1, 2, 2]), &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let g = Tensor::full(Shape::vector(4), DType::F32, 1.0);
    let fwd = LayerNorm::default()
        .forward_with_weight_affine(&x, &ns, &g, EPS)
        .unwrap();
    let bwd = LayerNorm::default()
        .backward_with_weight_affine(&x, &fwd.mean, &fwd.invvar, &x, &ns, &g, EPS)
        .unwrap();
    assert_eq!(bwd.grad_gamma.unwrap().shape(), &Shape::vector(4));
}

// ── Errors ─────────────────────────────────────────────────────

#[test]
fn test_shape_errors() {
    let x = Tensor::zeros(Shape::matrix(2, 3), DType::F32);

    let err = layer_norm::forward(&x, &Shape::new(vec![]), None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let err = layer_norm::forward(&x, &Shape::matrix(3, 0), None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let err = layer_norm::forward(&x, &Shape::vector(4), None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert!(err.to_string().contains("expected input with shape [*, 4]"));

    let err = layer_norm::forward(&x, &Shape::matrix(3, 2), None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let bad_gamma = Tensor::zeros(Shape::vector(4), DType::F32);
    let err = layer_norm::forward(&x, &Shape::vector(3), Some(&bad_gamma), None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_placement_errors() {
    let ns = Shape::vector(3);
    let x = Tensor::zeros(Shape::matrix(2, 3), DType::F32);

    let on_gpu = x.clone().to_device(Device::Cuda(0));
    let err = layer_norm::forward(&on_gpu, &ns, None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceOrLayout);
    assert!(err.to_string().contains("cuda:0"));

    let strided = Tensor::zeros(Shape::matrix(3, 2), DType::F32)
        .transpose(0, 1)
        .unwrap();
    let err = layer_norm::forward(&strided, &ns, None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceOrLayout);

    // A contiguous copy of the same view is accepted.
    assert!(layer_norm::forward(&strided.contiguous(), &ns, None, None, EPS).is_ok());

    let beta_on_gpu = Tensor::zeros(ns.clone(), DType::F32).to_device(Device::Cuda(1));
    let err = layer_norm::forward(&x, &ns, None, Some(&beta_on_gpu), EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceOrLayout);
}

#[test]
fn test_dtype_errors() {
    let ns = Shape::vector(3);
    let x = Tensor::zeros(Shape::matrix(2, 3), DType::I8);
    let err = layer_norm::forward(&x, &ns, None, None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DType);

    let x = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
    let int_gamma = Tensor::zeros(ns.clone(), DType::I8);
    let err = layer_norm::forward(&x, &ns, Some(&int_gamma), None, EPS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DType);
}

#[test]
fn test_backward_aux_errors() {
    let ns = Shape::vector(3);
    let x = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 7.0]).unwrap();
    let fwd = layer_norm::forward(&x, &ns, None, None, EPS).unwrap();
    let dy = Tensor::full(Shape::matrix(2, 3), DType::F32, 1.0);

    let dy_half = dy.to_dtype(DType::F16);
    let err = layer_norm::backward(&dy_half, &fwd.mean, &fwd.invvar, &x, &ns, None, None, EPS)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DType);

    let dy_short = Tensor::zeros(Shape::matrix(1, 3), DType::F32);
    let err = layer_norm::backward(&dy_short, &fwd.mean, &fwd.invvar, &x, &ns, None, None, EPS)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let mean_short = Tensor::zeros(Shape::vector(1), DType::F32);
    let err = layer_norm::backward(&dy, &mean_short, &fwd.invvar, &x, &ns, None, None, EPS)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let invvar_half = fwd.invvar.to_dtype(DType::F16);
    let err = layer_norm::backward(&dy, &fwd.mean, &invvar_half, &x, &ns, None, None, EPS)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DType);

    let mean_on_gpu = fwd.mean.clone().to_device(Device::Cuda(0));
    let err = layer_norm::backward(&dy, &mean_on_gpu, &fwd.invvar, &x, &ns, None, None, EPS)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceOrLayout);
}

#[test]
fn test_oversized_rows_per_task() {
    let ns = Shape::vector(4);
    let x_values = [1.0, 2.0, 3.0, 4.0, 0.0, 2.0, 0.0, 2.0];
    let dy_values = [1.0, -1.0, 0.5, 2.0, 0.0, 1.0, 1.0, -2.0];
    let x = Tensor::from_f32(Shape::matrix(2, 4), &x_values).unwrap();
    let dy = Tensor::from_f32(Shape::matrix(2, 4), &dy_values).unwrap();
    let g = Tensor::from_f32(ns.clone(), &[1.0, 0.5, -1.0, 2.0]).unwrap();

    // Largest value a TOML integer can hold.
    let config = LayerNormConfig::from_toml(&format!("rows_per_task = {}", i64::MAX)).unwrap();
    assert_eq!(config.rows_per_task, i64::MAX as usize);
    let huge = LayerNorm::new(config).unwrap();
    let reference = LayerNorm::default();

    let a = huge.forward_with_weight_affine(&x, &ns, &g, EPS).unwrap();
    let b = reference.forward_with_weight_affine(&x, &ns, &g, EPS).unwrap();
    assert_eq!(a.output.as_f32_slice(), b.output.as_f32_slice());
    assert_eq!(a.invvar.as_f32_slice(), b.invvar.as_f32_slice());

    let ga = huge
        .backward_with_weight_affine(&dy, &a.mean, &a.invvar, &x, &ns, &g, EPS)
        .unwrap();
    let gb = reference
        .backward_with_weight_affine(&dy, &b.mean, &b.invvar, &x, &ns, &g, EPS)
        .unwrap();
    assert_eq!(ga.grad_input.as_f32_slice(), gb.grad_input.as_f32_slice());
    for (p, q) in ga
        .grad_gamma
        .unwrap()
        .as_f32_slice()
        .iter()
        .zip(gb.grad_gamma.unwrap().as_f32_slice())
    {
        assert_abs_diff_eq!(*p, *q, epsilon = 1e-5);
    }
}

#[test]
fn test_config_errors() {
    let err = LayerNorm::new(LayerNormConfig {
        num_threads: Some(0),
        ..Default::default()
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
