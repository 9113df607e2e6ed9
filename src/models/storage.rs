// Volume models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_VOLUME_SCOPE: &str = "local";

/// Engine volume, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub driver: String,
    pub labels: BTreeMap<String, String>,
    pub mountpoint: String,
    pub scope: String,
}
