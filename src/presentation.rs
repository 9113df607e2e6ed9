// Pure mapping from inventory snapshots to display trees (group headers, entity rows, detail rows)

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::inventory::KindSnapshot;
use crate::models::{Container, ContainerState, Image, InventorySnapshot, Network, Volume};

const SHORT_ID_LEN: usize = 12;
const MAX_VOLUME_LABELS: usize = 5;
const DETAIL_ICON: &str = "symbol-property";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collapsible {
    None,
    Collapsed,
    Expanded,
}

/// What a node stands for. Consumers dispatch actions on this, not on labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Placeholder,
    Group { running: bool },
    Container { id: String },
    Image { id: String },
    Network { id: String },
    Volume { name: String },
    Detail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub kind: NodeKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Action context, e.g. `container-running` enables stop/restart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'static str>,
    pub collapsible: Collapsible,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            description: None,
            icon: None,
            color: None,
            tooltip: None,
            context: None,
            collapsible: Collapsible::None,
            children: Vec::new(),
        }
    }

    fn placeholder(label: &str) -> Self {
        Self::new(NodeKind::Placeholder, label)
    }

    fn detail(label: &str, value: impl Into<String>) -> Self {
        Self {
            description: Some(value.into()),
            icon: Some(DETAIL_ICON),
            ..Self::new(NodeKind::Detail, label)
        }
    }

    fn with_children(mut self, children: Vec<TreeNode>, collapsible: Collapsible) -> Self {
        self.children = children;
        self.collapsible = collapsible;
        self
    }
}

pub fn tree(snapshot: &KindSnapshot) -> Vec<TreeNode> {
    match snapshot {
        KindSnapshot::Containers(s) => container_tree(s),
        KindSnapshot::Images(s) => image_tree(s),
        KindSnapshot::Networks(s) => network_tree(s),
        KindSnapshot::Volumes(s) => volume_tree(s),
    }
}

/// "Running (n)" and "Stopped (n)" headers; a header is omitted when its group is empty.
pub fn container_tree(snapshot: &InventorySnapshot<Container>) -> Vec<TreeNode> {
    if snapshot.is_empty() {
        return vec![TreeNode::placeholder("No containers found")];
    }
    let groups = snapshot.groups();
    let mut roots = Vec::with_capacity(2);
    if !groups.running.is_empty() {
        let header = TreeNode {
            icon: Some("play-circle"),
            color: Some("charts.green"),
            context: Some("container-group-running"),
            ..TreeNode::new(
                NodeKind::Group { running: true },
                format!("Running ({})", groups.running.len()),
            )
        };
        let children = groups.running.iter().map(|c| container_node(c)).collect();
        roots.push(header.with_children(children, Collapsible::Expanded));
    }
    if !groups.not_running.is_empty() {
        let header = TreeNode {
            icon: Some("debug-stop"),
            color: Some("charts.red"),
            context: Some("container-group-stopped"),
            ..TreeNode::new(
                NodeKind::Group { running: false },
                format!("Stopped ({})", groups.not_running.len()),
            )
        };
        let children = groups.not_running.iter().map(|c| container_node(c)).collect();
        roots.push(header.with_children(children, Collapsible::Collapsed));
    }
    roots
}

fn container_node(c: &Container) -> TreeNode {
    let (icon, color, context) = match c.state {
        ContainerState::Running => ("play-circle", "charts.green", "container-running"),
        ContainerState::Paused => ("debug-pause", "charts.yellow", "container-paused"),
        _ => ("debug-stop", "charts.red", "container-stopped"),
    };

    let mut details = vec![
        TreeNode::detail("ID", short_id(&c.id)),
        TreeNode::detail("Image", c.image.original_name.as_str()),
        TreeNode::detail("Status", c.status.as_str()),
        TreeNode::detail("Created", format_created(c.created_at)),
    ];
    if !c.networks.is_empty() {
        details.push(TreeNode::detail("Networks", c.networks.join(", ")));
    }
    let published: Vec<String> = c
        .ports
        .iter()
        .filter_map(|p| p.host_port.map(|host| format!("{}:{}", host, p.container_port)))
        .collect();
    if !published.is_empty() {
        details.push(TreeNode::detail("Ports", published.join(", ")));
    }

    TreeNode {
        description: Some(c.status.clone()),
        icon: Some(icon),
        color: Some(color),
        tooltip: Some(format!(
            "{}\n{}\nStatus: {}",
            c.name, c.image.original_name, c.status
        )),
        context: Some(context),
        ..TreeNode::new(NodeKind::Container { id: c.id.clone() }, c.name.as_str())
    }
    .with_children(details, Collapsible::Collapsed)
}

pub fn image_tree(snapshot: &InventorySnapshot<Image>) -> Vec<TreeNode> {
    if snapshot.is_empty() {
        return vec![TreeNode::placeholder("No images found")];
    }
    snapshot.items.iter().map(image_node).collect()
}

fn image_node(image: &Image) -> TreeNode {
    let size = size_in_mb(image.size_bytes);
    let created = format_created(image.created_at);
    let name = &image.image_ref.original_name;
    let details = vec![
        TreeNode::detail("ID", short_id(image.id.trim_start_matches("sha256:"))),
        TreeNode::detail("Repository", image.image_ref.repository.as_str()),
        TreeNode::detail("Tag", image.image_ref.tag.as_str()),
        TreeNode::detail("Size", size.as_str()),
        TreeNode::detail("Created", created.as_str()),
    ];
    TreeNode {
        description: Some(size.clone()),
        icon: Some("package"),
        tooltip: Some(format!("{}\nSize: {}\nCreated: {}", name, size, created)),
        context: Some("image"),
        ..TreeNode::new(NodeKind::Image { id: image.id.clone() }, name.as_str())
    }
    .with_children(details, Collapsible::Collapsed)
}

pub fn network_tree(snapshot: &InventorySnapshot<Network>) -> Vec<TreeNode> {
    if snapshot.is_empty() {
        return vec![TreeNode::placeholder("No networks found")];
    }
    snapshot
        .items
        .iter()
        .map(|n| {
            let details = vec![
                TreeNode::detail("ID", short_id(&n.id)),
                TreeNode::detail("Driver", n.driver.as_str()),
                TreeNode::detail("Scope", n.scope.as_str()),
                TreeNode::detail("IPv6", if n.ipv6 { "Enabled" } else { "Disabled" }),
                TreeNode::detail("Internal", if n.internal { "Yes" } else { "No" }),
                TreeNode::detail("Created", format_created(n.created_at)),
            ];
            TreeNode {
                description: Some(n.driver.clone()),
                icon: Some("globe"),
                tooltip: Some(format!("{}\nDriver: {}\nScope: {}", n.name, n.driver, n.scope)),
                context: Some("network"),
                ..TreeNode::new(NodeKind::Network { id: n.id.clone() }, n.name.as_str())
            }
            .with_children(details, Collapsible::Collapsed)
        })
        .collect()
}

pub fn volume_tree(snapshot: &InventorySnapshot<Volume>) -> Vec<TreeNode> {
    if snapshot.is_empty() {
        return vec![TreeNode::placeholder("No volumes found")];
    }
    snapshot
        .items
        .iter()
        .map(|v| {
            let mut details = vec![
                TreeNode::detail("Driver", v.driver.as_str()),
                TreeNode::detail("Scope", v.scope.as_str()),
                TreeNode::detail("Mountpoint", v.mountpoint.as_str()),
            ];
            details.extend(
                v.labels
                    .iter()
                    .filter(|(k, val)| !k.is_empty() && !val.is_empty())
                    .take(MAX_VOLUME_LABELS)
                    .map(|(k, val)| TreeNode::detail(k, val.as_str())),
            );
            TreeNode {
                description: Some(v.driver.clone()),
                icon: Some("database"),
                tooltip: Some(format!(
                    "{}\nDriver: {}\nMountpoint: {}",
                    v.name, v.driver, v.mountpoint
                )),
                context: Some("volume"),
                ..TreeNode::new(NodeKind::Volume { name: v.name.clone() }, v.name.as_str())
            }
            .with_children(details, Collapsible::Collapsed)
        })
        .collect()
}

fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

fn size_in_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

fn format_created(created_at: Option<DateTime<Utc>>) -> String {
    match created_at {
        Some(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}
