// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! YAML configuration with environment-variable overrides for the log-capture agent.
//!
//! Every duration/count default lives on the `Default`
//! impl of its section struct, so `AgentConfig::default()` alone describes a
//! runnable (if minimally useful) agent.

mod env_override;
mod error;
mod sections;
mod validate;

pub use error::ConfigError;
pub use sections::{
    AdminConfig, AgentConfig, ContainersConfig, DispatcherConfig, DlqConfig, FileSinkConfig,
    FilesConfig, GlobalConfig, LokiSinkConfig, PositionsConfig, SeekStrategy, SinksConfig,
};

use std::path::Path;

impl AgentConfig {
    /// Load configuration: read `path` as YAML (if it exists; otherwise start
    /// from defaults), apply `OJLC_*` environment overrides, then validate.
    ///
    /// Validation collects every problem found rather than stopping at the
    /// first, so operators can fix a misconfigured file in one pass.
    pub fn load(path: &Path) -> Result<AgentConfig, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AgentConfig::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        env_override::apply(&mut config);

        let problems = validate::validate(&config);
        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(config)
    }
}
