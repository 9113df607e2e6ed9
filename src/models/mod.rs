// Inventory domain models

mod container;
mod image;
mod network;
mod snapshot;
mod storage;

pub use container::{Container, ContainerState, PortMapping};
pub use image::{ContainerImageRef, DEFAULT_TAG, Image};
pub use network::Network;
pub use snapshot::{ContainerGroups, EntityKind, InventorySnapshot};
pub use storage::{DEFAULT_VOLUME_SCOPE, Volume};
