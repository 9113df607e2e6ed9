// Mutating and read-only engine operations: argv construction, confirmation
// policy, warnings and outcome messages. Execution lives in `inventory`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::models::EntityKind;

pub const DEFAULT_LOGS_TAIL: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Start,
    Stop,
    Restart,
    RemoveContainer,
    Logs,
    Inspect,
    Pull,
    RemoveImage,
    Tag,
    Run,
    PruneContainers,
    PruneImages,
    PruneVolumes,
    PruneNetworks,
    PruneAll,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Start,
        Operation::Stop,
        Operation::Restart,
        Operation::RemoveContainer,
        Operation::Logs,
        Operation::Inspect,
        Operation::Pull,
        Operation::RemoveImage,
        Operation::Tag,
        Operation::Run,
        Operation::PruneContainers,
        Operation::PruneImages,
        Operation::PruneVolumes,
        Operation::PruneNetworks,
        Operation::PruneAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::RemoveContainer => "remove-container",
            Operation::Logs => "logs",
            Operation::Inspect => "inspect",
            Operation::Pull => "pull",
            Operation::RemoveImage => "remove-image",
            Operation::Tag => "tag",
            Operation::Run => "run",
            Operation::PruneContainers => "prune-containers",
            Operation::PruneImages => "prune-images",
            Operation::PruneVolumes => "prune-volumes",
            Operation::PruneNetworks => "prune-networks",
            Operation::PruneAll => "prune-all",
        }
    }

    /// Destructive operations; callers must obtain confirmation before `execute`.
    pub fn requires_confirmation(self) -> bool {
        matches!(
            self,
            Operation::RemoveContainer
                | Operation::RemoveImage
                | Operation::PruneContainers
                | Operation::PruneImages
                | Operation::PruneVolumes
                | Operation::PruneNetworks
                | Operation::PruneAll
        )
    }

    /// Every destructive operation is irreversible.
    pub fn is_irreversible(self) -> bool {
        self.requires_confirmation()
    }

    /// Name of the identifier argument, or `None` for prune operations which take none.
    pub fn identifier_name(self) -> Option<&'static str> {
        match self {
            Operation::Start
            | Operation::Stop
            | Operation::Restart
            | Operation::RemoveContainer
            | Operation::Logs => Some("container"),
            Operation::Inspect => Some("container or image"),
            Operation::Pull | Operation::RemoveImage | Operation::Tag | Operation::Run => {
                Some("image")
            }
            Operation::PruneContainers
            | Operation::PruneImages
            | Operation::PruneVolumes
            | Operation::PruneNetworks
            | Operation::PruneAll => None,
        }
    }

    /// Kinds whose snapshots are stale after the operation succeeds.
    pub fn affected_kinds(self) -> &'static [EntityKind] {
        match self {
            Operation::Start
            | Operation::Stop
            | Operation::Restart
            | Operation::RemoveContainer
            | Operation::Run
            | Operation::PruneContainers => &[EntityKind::Containers],
            Operation::Pull | Operation::RemoveImage | Operation::Tag | Operation::PruneImages => {
                &[EntityKind::Images]
            }
            Operation::PruneVolumes => &[EntityKind::Volumes],
            Operation::PruneNetworks => &[EntityKind::Networks],
            Operation::PruneAll => &EntityKind::ALL,
            Operation::Logs | Operation::Inspect => &[],
        }
    }

    /// Confirmation prompt for destructive operations.
    pub fn warning(self, identifier: &str) -> Option<Warning> {
        let (level, message, confirm_label) = match self {
            Operation::RemoveContainer => (
                WarningLevel::Irreversible,
                format!("Are you sure you want to remove container \"{}\"?", identifier),
                "Remove",
            ),
            Operation::RemoveImage => (
                WarningLevel::Irreversible,
                format!("Are you sure you want to remove image \"{}\"?", identifier),
                "Remove",
            ),
            Operation::PruneContainers => (
                WarningLevel::Irreversible,
                "Remove all stopped containers?".to_string(),
                "Prune",
            ),
            Operation::PruneImages => (
                WarningLevel::Irreversible,
                "Remove all unused images?".to_string(),
                "Prune",
            ),
            Operation::PruneVolumes => (
                WarningLevel::DataLoss,
                "Remove all unused volumes? This may result in data loss!".to_string(),
                "Prune",
            ),
            Operation::PruneNetworks => (
                WarningLevel::Irreversible,
                "Remove all unused networks?".to_string(),
                "Prune",
            ),
            Operation::PruneAll => (
                WarningLevel::DataLoss,
                "Remove all unused containers, images, networks, and volumes? This may result in data loss!"
                    .to_string(),
                "Prune All",
            ),
            _ => return None,
        };
        Some(Warning {
            level,
            message,
            confirm_label,
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation {:?}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningLevel {
    Irreversible,
    /// Irreversible and may delete user data (volumes).
    DataLoss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub level: WarningLevel,
    pub message: String,
    pub confirm_label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
}

/// `-p [hostPort:]containerPort[/protocol]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<PortProtocol>,
}

impl PortBinding {
    fn to_arg(&self) -> String {
        let mut arg = match self.host_port {
            Some(host) => format!("{}:{}", host, self.container_port),
            None => self.container_port.to_string(),
        };
        if let Some(PortProtocol::Udp) = self.protocol {
            arg.push_str("/udp");
        }
        arg
    }
}

impl FromStr for PortBinding {
    type Err = String;

    /// Parses `8080:80`, `80`, `53:53/udp`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ports, protocol) = match s.split_once('/') {
            Some((ports, "tcp")) => (ports, Some(PortProtocol::Tcp)),
            Some((ports, "udp")) => (ports, Some(PortProtocol::Udp)),
            Some((_, other)) => return Err(format!("unsupported protocol {:?}", other)),
            None => (s, None),
        };
        let parse_port =
            |p: &str| p.parse::<u16>().map_err(|_| format!("invalid port {:?} in {:?}", p, s));
        let (host_port, container_port) = match ports.split_once(':') {
            Some((host, container)) => (Some(parse_port(host)?), parse_port(container)?),
            None => (None, parse_port(ports)?),
        };
        Ok(PortBinding {
            container_port,
            host_port,
            protocol,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Bind,
    Volume,
}

/// `--mount type=bind|volume,source=..,target=..[,readonly]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    #[serde(rename = "type")]
    pub kind: MountKind,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub read_only: bool,
}

impl Mount {
    fn to_arg(&self) -> String {
        let kind = match self.kind {
            MountKind::Bind => "bind",
            MountKind::Volume => "volume",
        };
        let mut arg = format!(
            "type={},source={},target={}",
            kind, self.source, self.destination
        );
        if self.read_only {
            arg.push_str(",readonly");
        }
        arg
    }
}

impl FromStr for Mount {
    type Err = String;

    /// Parses `source:destination[:ro]`. Sources starting with `/` or `.` are
    /// bind mounts, anything else names a volume.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(source), Some(destination)) = (parts.next(), parts.next()) else {
            return Err(format!("mount {:?} must be source:destination[:ro]", s));
        };
        let read_only = match parts.next() {
            None => false,
            Some("ro") => true,
            Some("rw") => false,
            Some(other) => return Err(format!("unknown mount mode {:?}", other)),
        };
        let kind = if source.starts_with('/') || source.starts_with('.') {
            MountKind::Bind
        } else {
            MountKind::Volume
        };
        Ok(Mount {
            kind,
            source: source.to_string(),
            destination: destination.to_string(),
            read_only,
        })
    }
}

/// Extra arguments: `new_tag` for tag, everything else for run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationParams {
    pub new_tag: Option<String>,
    pub name: Option<String>,
    pub publish_all_ports: bool,
    pub ports: Vec<PortBinding>,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<Mount>,
    pub network: Option<String>,
}

/// One operation as issued by a consumer (tree selection, CLI arguments, HTTP body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation: Operation,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub params: OperationParams,
    /// Set by the caller once the user has accepted `Operation::warning`.
    #[serde(default)]
    pub confirmed: bool,
}

impl OperationRequest {
    pub fn new(operation: Operation, identifier: impl Into<String>) -> Self {
        Self {
            operation,
            identifier: identifier.into(),
            params: OperationParams::default(),
            confirmed: false,
        }
    }

    pub fn with_params(mut self, params: OperationParams) -> Self {
        self.params = params;
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    /// Checks confirmation and arguments, then builds the engine argv.
    pub fn engine_args(&self, logs_tail: usize) -> Result<Vec<String>, EngineError> {
        let op = self.operation;
        if op.requires_confirmation() && !self.confirmed {
            return Err(EngineError::ConfirmationRequired {
                operation: op.as_str(),
            });
        }

        let args: Vec<String> = match op {
            Operation::Start | Operation::Stop | Operation::Restart => {
                vec![op.as_str().to_string(), self.identifier()?]
            }
            Operation::RemoveContainer => vec!["rm".into(), self.identifier()?],
            Operation::Logs => vec![
                "logs".into(),
                "--tail".into(),
                logs_tail.to_string(),
                self.identifier()?,
            ],
            Operation::Inspect => vec!["inspect".into(), self.identifier()?],
            Operation::Pull => vec!["pull".into(), self.identifier()?],
            Operation::RemoveImage => vec!["rmi".into(), self.identifier()?],
            Operation::Tag => {
                let new_tag = required(op, "new tag", self.params.new_tag.as_deref())?;
                vec!["tag".into(), self.identifier()?, new_tag]
            }
            Operation::Run => self.run_args()?,
            Operation::PruneContainers => prune_args("container"),
            Operation::PruneImages => prune_args("image"),
            Operation::PruneVolumes => prune_args("volume"),
            Operation::PruneNetworks => prune_args("network"),
            Operation::PruneAll => ["system", "prune", "-f", "--volumes"]
                .map(String::from)
                .to_vec(),
        };
        Ok(args)
    }

    /// Human-readable result line for a successful run.
    pub fn success_message(&self, logs_tail: usize) -> String {
        let id = self.identifier.trim();
        match self.operation {
            Operation::Start => format!("Container \"{}\" started", id),
            Operation::Stop => format!("Container \"{}\" stopped", id),
            Operation::Restart => format!("Container \"{}\" restarted", id),
            Operation::RemoveContainer => format!("Container \"{}\" removed", id),
            Operation::Logs => format!("Fetched last {} log lines of \"{}\"", logs_tail, id),
            Operation::Inspect => format!("Inspected \"{}\"", id),
            Operation::Pull => format!("Image \"{}\" pulled", id),
            Operation::RemoveImage => format!("Image \"{}\" removed", id),
            Operation::Tag => format!(
                "Image tagged as \"{}\"",
                self.params.new_tag.as_deref().unwrap_or_default().trim()
            ),
            Operation::Run => format!("Container started from image \"{}\"", id),
            Operation::PruneContainers => "Stopped containers pruned".to_string(),
            Operation::PruneImages => "Unused images pruned".to_string(),
            Operation::PruneVolumes => "Unused volumes pruned".to_string(),
            Operation::PruneNetworks => "Unused networks pruned".to_string(),
            Operation::PruneAll => "All unused resources pruned".to_string(),
        }
    }

    fn identifier(&self) -> Result<String, EngineError> {
        let argument = self.operation.identifier_name().unwrap_or("identifier");
        required(self.operation, argument, Some(&self.identifier))
    }

    fn run_args(&self) -> Result<Vec<String>, EngineError> {
        let op = self.operation;
        let p = &self.params;
        let mut args: Vec<String> = vec!["run".into(), "-d".into()];

        if let Some(name) = p.name.as_deref().filter(|n| !n.trim().is_empty()) {
            args.push("--name".into());
            args.push(required(op, "name", Some(name))?);
        }
        if p.publish_all_ports {
            args.push("-P".into());
        }
        for port in &p.ports {
            args.push("-p".into());
            args.push(port.to_arg());
        }
        for (key, value) in &p.env {
            if key.is_empty() || key.contains('=') {
                return Err(invalid(op, "environment variable", format!("bad name {:?}", key)));
            }
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }
        for mount in &p.mounts {
            for (what, value) in [("source", &mount.source), ("destination", &mount.destination)] {
                if value.is_empty() || value.contains(',') {
                    return Err(invalid(op, "mount", format!("bad {} {:?}", what, value)));
                }
            }
            args.push("--mount".into());
            args.push(mount.to_arg());
        }
        if let Some(network) = p.network.as_deref().filter(|n| !n.trim().is_empty()) {
            args.push("--network".into());
            args.push(required(op, "network", Some(network))?);
        }
        args.push(self.identifier()?);
        Ok(args)
    }
}

fn prune_args(kind: &str) -> Vec<String> {
    vec![kind.to_string(), "prune".into(), "-f".into()]
}

/// Trimmed, non-empty value that cannot be mistaken for an engine flag.
fn required(
    op: Operation,
    argument: &'static str,
    value: Option<&str>,
) -> Result<String, EngineError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(EngineError::MissingArgument {
            operation: op.as_str(),
            argument,
        });
    }
    if value.starts_with('-') {
        return Err(invalid(op, argument, format!("{:?} looks like a flag", value)));
    }
    Ok(value.to_string())
}

fn invalid(op: Operation, argument: &'static str, reason: String) -> EngineError {
    EngineError::InvalidArgument {
        operation: op.as_str(),
        argument,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_set_is_exactly_the_destructive_operations() {
        let confirmed: Vec<&str> = Operation::ALL
            .into_iter()
            .filter(|op| op.requires_confirmation())
            .map(Operation::as_str)
            .collect();
        assert_eq!(
            confirmed,
            [
                "remove-container",
                "remove-image",
                "prune-containers",
                "prune-images",
                "prune-volumes",
                "prune-networks",
                "prune-all"
            ]
        );
        for op in ["start", "stop", "restart", "logs", "inspect", "pull", "tag", "run"] {
            let op: Operation = op.parse().unwrap();
            assert!(!op.requires_confirmation(), "{op} should not need confirmation");
            assert!(op.warning("x").is_none());
        }
    }

    #[test]
    fn volume_pruning_warns_about_data_loss() {
        let w = Operation::PruneVolumes.warning("").unwrap();
        assert_eq!(w.level, WarningLevel::DataLoss);
        assert!(w.message.contains("may result in data loss"));

        let w = Operation::PruneAll.warning("").unwrap();
        assert_eq!(w.level, WarningLevel::DataLoss);

        let w = Operation::RemoveContainer.warning("web").unwrap();
        assert_eq!(w.level, WarningLevel::Irreversible);
        assert_eq!(w.message, "Are you sure you want to remove container \"web\"?");
        assert!(!w.message.contains("data loss"));
    }

    #[test]
    fn unconfirmed_destructive_request_is_rejected_before_argv() {
        let err = OperationRequest::new(Operation::RemoveContainer, "web")
            .engine_args(DEFAULT_LOGS_TAIL)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::ConfirmationRequired {
                operation: "remove-container"
            }
        );
    }

    #[test]
    fn simple_verbs_map_to_engine_argv() {
        let args = |op, id: &str| {
            OperationRequest::new(op, id)
                .confirmed()
                .engine_args(DEFAULT_LOGS_TAIL)
                .unwrap()
        };
        assert_eq!(args(Operation::Start, "web"), ["start", "web"]);
        assert_eq!(args(Operation::Restart, " web "), ["restart", "web"]);
        assert_eq!(args(Operation::RemoveContainer, "web"), ["rm", "web"]);
        assert_eq!(args(Operation::Logs, "web"), ["logs", "--tail", "500", "web"]);
        assert_eq!(args(Operation::Inspect, "nginx"), ["inspect", "nginx"]);
        assert_eq!(args(Operation::RemoveImage, "nginx"), ["rmi", "nginx"]);
        assert_eq!(args(Operation::PruneNetworks, ""), ["network", "prune", "-f"]);
        assert_eq!(
            args(Operation::PruneAll, ""),
            ["system", "prune", "-f", "--volumes"]
        );
    }

    #[test]
    fn identifiers_are_required_and_never_flags() {
        let err = OperationRequest::new(Operation::Stop, "   ")
            .engine_args(DEFAULT_LOGS_TAIL)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingArgument { argument: "container", .. }));

        let err = OperationRequest::new(Operation::Stop, "--all")
            .engine_args(DEFAULT_LOGS_TAIL)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
    }

    #[test]
    fn tag_needs_a_new_tag() {
        let req = OperationRequest::new(Operation::Tag, "nginx");
        assert!(matches!(
            req.engine_args(DEFAULT_LOGS_TAIL),
            Err(EngineError::MissingArgument { argument: "new tag", .. })
        ));
        let req = req.with_params(OperationParams {
            new_tag: Some("registry.local/nginx:v1".into()),
            ..Default::default()
        });
        assert_eq!(
            req.engine_args(DEFAULT_LOGS_TAIL).unwrap(),
            ["tag", "nginx", "registry.local/nginx:v1"]
        );
    }

    #[test]
    fn run_builds_optional_flags_in_order() {
        let bare = OperationRequest::new(Operation::Run, "nginx:latest");
        assert_eq!(bare.engine_args(DEFAULT_LOGS_TAIL).unwrap(), ["run", "-d", "nginx:latest"]);

        let full = OperationRequest::new(Operation::Run, "nginx:latest").with_params(OperationParams {
            name: Some("web".into()),
            publish_all_ports: true,
            ports: vec!["8080:80".parse().unwrap(), "53/udp".parse().unwrap()],
            env: BTreeMap::from([("MODE".to_string(), "prod".to_string())]),
            mounts: vec!["data:/var/lib/data:ro".parse().unwrap()],
            network: Some("backend".into()),
            ..Default::default()
        });
        assert_eq!(
            full.engine_args(DEFAULT_LOGS_TAIL).unwrap(),
            [
                "run",
                "-d",
                "--name",
                "web",
                "-P",
                "-p",
                "8080:80",
                "-p",
                "53/udp",
                "-e",
                "MODE=prod",
                "--mount",
                "type=volume,source=data,target=/var/lib/data,readonly",
                "--network",
                "backend",
                "nginx:latest"
            ]
        );
    }

    #[test]
    fn mount_and_port_parsing() {
        let m: Mount = "./src:/app".parse().unwrap();
        assert_eq!(m.kind, MountKind::Bind);
        assert!(!m.read_only);
        assert!("nodest".parse::<Mount>().is_err());
        assert!("a:/b:xx".parse::<Mount>().is_err());

        let p: PortBinding = "8080:80/tcp".parse().unwrap();
        assert_eq!(p.host_port, Some(8080));
        assert_eq!(p.container_port, 80);
        assert!("http".parse::<PortBinding>().is_err());
        assert!("80/sctp".parse::<PortBinding>().is_err());
    }

    #[test]
    fn affected_kinds_follow_the_verb() {
        assert_eq!(Operation::Start.affected_kinds(), [EntityKind::Containers]);
        assert_eq!(Operation::Tag.affected_kinds(), [EntityKind::Images]);
        assert_eq!(Operation::PruneAll.affected_kinds(), EntityKind::ALL);
        assert!(Operation::Logs.affected_kinds().is_empty());
    }
}
