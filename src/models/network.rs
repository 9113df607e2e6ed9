// Network models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Engine network. `name` is not unique; identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub labels: BTreeMap<String, String>,
    pub scope: String,
    /// Not reported by the plain listing; always false here.
    pub ipv6: bool,
    /// Not reported by the plain listing; always false here.
    pub internal: bool,
    pub created_at: Option<DateTime<Utc>>,
}
