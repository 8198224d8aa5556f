// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON shapes for the subset of the container daemon's API the agent uses:
//! `GET /containers/json`, `GET /events`, `GET /containers/{id}/logs`.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "Labels", default)]
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// Names as reported stripped of the leading `/` the daemon always adds.
    pub fn display_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .map(|n| n.strip_prefix('/').unwrap_or(n))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonEvent {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Actor")]
    pub actor: EventActor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventActor {
    #[serde(rename = "ID")]
    pub id: String,
}

impl DaemonEvent {
    pub fn is_container_lifecycle(&self) -> bool {
        self.kind == "container" && matches!(self.action.as_str(), "start" | "die" | "destroy")
    }
}
