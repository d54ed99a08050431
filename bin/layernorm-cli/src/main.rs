// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # lnorm
//!
//! Command-line driver for the layer-norm kernels.
//!
//! ## Usage
//! ```bash
//! # Normalize a seeded random batch and print the saved statistics
//! lnorm forward --rows 4 --cols 8 --affine both
//!
//! # Check analytic gradients against central differences
//! lnorm gradcheck --rows 3 --cols 16 --affine weight
//!
//! # Time forward/backward across thread counts
//! lnorm benchmark --rows 1024 --cols 1024 --threads 1,2,4
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lnorm",
    about = "Layer normalization forward/backward on the CPU",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file for the layer-norm engine.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forward pass on seeded random input.
    Forward {
        /// Number of rows (n1).
        #[arg(long, default_value_t = 4)]
        rows: usize,

        /// Row length (n2).
        #[arg(long, default_value_t = 8)]
        cols: usize,

        /// Affine configuration: none, bias, weight, both.
        #[arg(short, long, default_value = "both")]
        affine: String,

        /// Variance epsilon.
        #[arg(short, long, default_value_t = 1e-5)]
        epsilon: f64,

        /// Input dtype: f32, f16, bf16.
        #[arg(short, long, default_value = "f32")]
        dtype: String,

        /// Seed for the random input.
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Emit the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Compare backward against central finite differences.
    Gradcheck {
        /// Number of rows (n1).
        #[arg(long, default_value_t = 3)]
        rows: usize,

        /// Row length (n2).
        #[arg(long, default_value_t = 8)]
        cols: usize,

        /// Affine configuration: none, bias, weight, both.
        #[arg(short, long, default_value = "both")]
        affine: String,

        /// Perturbation size.
        #[arg(long, default_value_t = 1e-2)]
        delta: f32,

        /// Maximum tolerated error, relative to `1 + |numeric|`.
        #[arg(long, default_value_t = 1e-2)]
        tolerance: f64,

        /// Seed for the random input.
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
    },

    /// Time forward and backward across thread counts and affine kinds.
    Benchmark {
        /// Number of rows (n1).
        #[arg(long, default_value_t = 512)]
        rows: usize,

        /// Row length (n2).
        #[arg(long, default_value_t = 1024)]
        cols: usize,

        /// Timed iterations per configuration.
        #[arg(long, default_value_t = 20)]
        iters: usize,

        /// Comma-separated thread counts to sweep (e.g., "1,2,4").
        #[arg(long, default_value = "1,2,4")]
        threads: String,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Forward {
            rows,
            cols,
            affine,
            epsilon,
            dtype,
            seed,
            json,
        } => commands::forward::execute(
            config,
            commands::forward::Args {
                rows,
                cols,
                affine: affine.parse()?,
                epsilon,
                dtype: dtype.parse()?,
                seed,
                json,
            },
        ),
        Commands::Gradcheck {
            rows,
            cols,
            affine,
            delta,
            tolerance,
            seed,
        } => commands::gradcheck::execute(
            config,
            rows,
            cols,
            affine.parse()?,
            delta,
            tolerance,
            seed,
        ),
        Commands::Benchmark {
            rows,
            cols,
            iters,
            threads,
        } => commands::benchmark::execute(config, rows, cols, iters, &threads),
        Commands::Config => commands::config::execute(&config),
    }
}
