// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::{Context, Result};
use logcap_config::{AgentConfig, ConfigError};
use logcap_storage::PositionStore;
use std::path::Path;

pub fn validate_config(path: &Path) -> Result<()> {
    match AgentConfig::load(path) {
        Ok(_) => {
            println!("{} is valid", path.display());
            Ok(())
        }
        Err(ConfigError::Invalid(problems)) => {
            eprintln!("{} has {} problem(s):", path.display(), problems.len());
            for problem in &problems {
                eprintln!("  - {problem}");
            }
            std::process::exit(1);
        }
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

pub fn show_defaults() -> Result<()> {
    let config = AgentConfig::default();
    let yaml = serde_yaml::to_string(&config).context("failed to serialize default config")?;
    print!("{yaml}");
    Ok(())
}

pub fn positions(state_dir: &Path) -> Result<()> {
    let directory = state_dir.join("positions");
    let store = PositionStore::load(directory.clone(), 3, 0)
        .with_context(|| format!("failed to load position store at {}", directory.display()))?;
    println!("files tracked:      {}", store.file_position_count());
    println!("containers tracked: {}", store.container_position_count());
    Ok(())
}
