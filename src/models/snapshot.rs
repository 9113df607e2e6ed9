// Snapshot of one entity kind, as last fetched from the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Container;

/// The four inventory kinds the engine lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Containers,
    Images,
    Networks,
    Volumes,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Containers,
        EntityKind::Images,
        EntityKind::Networks,
        EntityKind::Volumes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Containers => "containers",
            EntityKind::Images => "images",
            EntityKind::Networks => "networks",
            EntityKind::Volumes => "volumes",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown inventory kind {:?} (expected containers, images, networks or volumes)",
                    s
                )
            })
    }
}

/// Immutable result of one successful listing. A refresh replaces it whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot<T> {
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<T>,
}

impl<T> InventorySnapshot<T> {
    pub fn new(items: Vec<T>, fetched_at: DateTime<Utc>) -> Self {
        Self { fetched_at, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Running and not-running containers, each in engine order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGroups<'a> {
    pub running: Vec<&'a Container>,
    pub not_running: Vec<&'a Container>,
}

impl InventorySnapshot<Container> {
    /// Splits the snapshot into its named groups.
    pub fn groups(&self) -> ContainerGroups<'_> {
        let (running, not_running): (Vec<&Container>, Vec<&Container>) =
            self.items.iter().partition(|c| c.is_running());
        ContainerGroups {
            running,
            not_running,
        }
    }
}
