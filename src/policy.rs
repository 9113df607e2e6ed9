// Ordering and grouping applied to each fetched listing. Pure functions, no I/O.

use crate::models::{Container, Image, Network, Volume};

/// Running containers first, then all others; engine order kept within each group.
pub fn order_containers(containers: Vec<Container>) -> Vec<Container> {
    let (mut running, not_running): (Vec<_>, Vec<_>) =
        containers.into_iter().partition(Container::is_running);
    running.extend(not_running);
    running
}

/// Newest first. Stable, so equal timestamps keep engine order; unknown
/// timestamps sort after every known one.
pub fn sort_images(mut images: Vec<Image>) -> Vec<Image> {
    images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    images
}

/// Name ascending, ordinal (byte-wise, case-sensitive).
pub fn sort_networks(mut networks: Vec<Network>) -> Vec<Network> {
    networks.sort_by(|a, b| a.name.cmp(&b.name));
    networks
}

/// Name ascending, ordinal (byte-wise, case-sensitive).
pub fn sort_volumes(mut volumes: Vec<Volume>) -> Vec<Volume> {
    volumes.sort_by(|a, b| a.name.cmp(&b.name));
    volumes
}
