use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-facing image summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageInspectInfo {
    pub tag: String,
    pub created: Option<DateTime<Utc>>,
    pub docker_version: String,
    pub labels: BTreeMap<String, String>,
    pub architecture: String,
    pub os: String,
    /// Layer blob digests, root first (filled in by sourced images)
    pub layers: Vec<String>,
}
