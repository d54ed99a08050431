// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `lnorm config` command: print the effective configuration.

use layer_norm::LayerNormConfig;

pub fn execute(config: &LayerNormConfig) -> anyhow::Result<()> {
    println!("# effective layer-norm configuration");
    println!("# worker threads: {}", config.resolve_threads());
    print!("{}", config.to_toml()?);
    Ok(())
}
