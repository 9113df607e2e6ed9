// Parse the engine's line-delimited JSON listings (`--format {{json .}}`) into models.
//
// One JSON object per line; blank lines are dropped. A line that does not decode
// fails the whole listing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::error::InventoryParseError;
use crate::models::{
    Container, ContainerImageRef, ContainerState, DEFAULT_VOLUME_SCOPE, EntityKind, Image,
    Network, PortMapping, Volume,
};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    names: Column,
    #[serde(default)]
    image: String,
    #[serde(default)]
    labels: Column,
    #[serde(default)]
    ports: Column,
    #[serde(default)]
    networks: Column,
    #[serde(default)]
    created_at: String,
    state: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    repository: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default)]
    labels: Column,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeRow {
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default)]
    labels: Column,
    #[serde(default)]
    mountpoint: String,
    #[serde(default)]
    scope: Option<String>,
}

/// A listing column that docker prints as one string and podman as an array
/// (`Names`, `Networks`) or an object (`Labels`). Other shapes decode as `Other`
/// and read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Column {
    #[default]
    Missing,
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Other(serde_json::Value),
}

impl Column {
    /// The column as docker would print it; list entries are comma-joined.
    fn text(&self) -> String {
        match self {
            Column::Text(text) => text.clone(),
            Column::List(items) => items.join(","),
            Column::Missing | Column::Map(_) | Column::Other(_) => String::new(),
        }
    }

    /// First entry of a list column, the whole text otherwise.
    fn first(&self) -> String {
        match self {
            Column::List(items) => items.first().cloned().unwrap_or_default(),
            other => other.text(),
        }
    }

    fn labels(&self) -> BTreeMap<String, String> {
        match self {
            Column::Map(map) => map.clone(),
            other => parse_labels(&other.text()),
        }
    }
}

/// Decodes every non-blank line into `R` and converts it; fails on the first bad line.
fn parse_lines<R, T>(
    kind: EntityKind,
    raw: &str,
    convert: impl Fn(R) -> Result<T, String>,
) -> Result<Vec<T>, InventoryParseError>
where
    R: DeserializeOwned,
{
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str::<R>(line)
                .map_err(|e| e.to_string())
                .and_then(&convert)
                .map_err(|message| InventoryParseError {
                    kind,
                    line: idx + 1,
                    message,
                })
        })
        .collect()
}

pub fn parse_containers(raw: &str) -> Result<Vec<Container>, InventoryParseError> {
    parse_lines(EntityKind::Containers, raw, |row: ContainerRow| {
        let state: ContainerState = row.state.parse()?;
        let networks = row.networks.text();
        Ok(Container {
            id: row.id,
            name: row.names.first().trim_start_matches('/').to_string(),
            labels: row.labels.labels(),
            image: ContainerImageRef::parse(&row.image),
            ports: parse_ports(&row.ports.text()),
            networks: if networks.is_empty() {
                Vec::new()
            } else {
                vec![networks]
            },
            created_at: parse_timestamp(&row.created_at),
            state,
            status: row.status,
        })
    })
}

pub fn parse_images(raw: &str) -> Result<Vec<Image>, InventoryParseError> {
    parse_lines(EntityKind::Images, raw, |row: ImageRow| {
        Ok(Image {
            id: row.id,
            image_ref: ContainerImageRef::from_parts(&row.repository, row.tag.as_deref()),
            created_at: parse_timestamp(&row.created_at),
            size_bytes: parse_size(row.size.as_deref().unwrap_or("0")),
        })
    })
}

pub fn parse_networks(raw: &str) -> Result<Vec<Network>, InventoryParseError> {
    parse_lines(EntityKind::Networks, raw, |row: NetworkRow| {
        Ok(Network {
            id: row.id,
            name: row.name,
            driver: row.driver,
            labels: row.labels.labels(),
            scope: row.scope,
            ipv6: false,
            internal: false,
            created_at: parse_timestamp(&row.created_at),
        })
    })
}

pub fn parse_volumes(raw: &str) -> Result<Vec<Volume>, InventoryParseError> {
    parse_lines(EntityKind::Volumes, raw, |row: VolumeRow| {
        Ok(Volume {
            name: row.name,
            driver: row.driver,
            labels: row.labels.labels(),
            mountpoint: row.mountpoint,
            scope: row
                .scope
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_VOLUME_SCOPE.to_string()),
        })
    })
}

/// Human-readable size (`"1.5GB"`, `"512MB"`, `"13.3kB"`, `"512B"`) to bytes, 1024-based.
/// Missing or unparseable sizes are 0.
pub fn parse_size(size: &str) -> u64 {
    let size = size.trim();
    let multiplier = if size.contains("GB") {
        GIB
    } else if size.contains("MB") {
        MIB
    } else if size.contains("KB") || size.contains("kB") {
        KIB
    } else {
        1.0
    };
    let value = numeric_prefix(size).unwrap_or(0.0);
    let bytes = (value * multiplier).round();
    if bytes.is_finite() && bytes > 0.0 {
        bytes as u64
    } else {
        0
    }
}

fn numeric_prefix(s: &str) -> Option<f64> {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

/// `key=value,key2=value2` label column. Entries without `=` map to an empty value.
pub fn parse_labels(labels: &str) -> BTreeMap<String, String> {
    labels
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

/// Ports column, e.g. `0.0.0.0:8080->80/tcp, :::8080->80/tcp, 443/tcp`.
/// Segments that are not a single port (ranges, garbage) are skipped.
pub fn parse_ports(ports: &str) -> Vec<PortMapping> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(parse_port_segment)
        .collect()
}

fn parse_port_segment(segment: &str) -> Option<PortMapping> {
    let (host, container) = match segment.split_once("->") {
        Some((host, container)) => (Some(host), container),
        None => (None, segment),
    };
    let (container_port, protocol) = match container.split_once('/') {
        Some((port, proto)) => (port, proto),
        None => (container, "tcp"),
    };
    let container_port: u16 = container_port.parse().ok()?;

    let (host_ip, host_port) = match host {
        Some(host) => {
            let (ip, port) = host.rsplit_once(':')?;
            let port: u16 = port.parse().ok()?;
            let ip = (!ip.is_empty()).then(|| ip.to_string());
            (ip, Some(port))
        }
        None => (None, None),
    };

    Some(PortMapping {
        host_ip,
        host_port,
        container_port,
        protocol: protocol.to_string(),
    })
}

/// Engine timestamps: `2024-01-15 10:30:00 +0000 UTC` (listing format), RFC 3339,
/// or a bare date. Anything else is `None`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    // Drop the trailing zone abbreviation ("UTC", "CEST") which chrono cannot parse.
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() >= 3 {
        let candidate = parts[..3].join(" ");
        if let Ok(ts) = DateTime::parse_from_str(&candidate, "%Y-%m-%d %H:%M:%S%.f %z") {
            return Some(ts.with_timezone(&Utc));
        }
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}
