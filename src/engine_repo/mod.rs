// Engine access through its CLI: listing subcommands and their parsers

pub mod parse;
mod runner;

pub use runner::{CancelToken, CliRunner, DEFAULT_TIMEOUT, EngineRunner};

use std::sync::Arc;
use tracing::instrument;

use crate::error::EngineError;
use crate::models::{Container, EntityKind, Image, Network, Volume};

const JSON_FORMAT: [&str; 2] = ["--format", "{{json .}}"];

/// Listing argv for one kind, e.g. `ps -a --format {{json .}}`.
pub fn listing_args(kind: EntityKind) -> Vec<String> {
    let verb: &[&str] = match kind {
        EntityKind::Containers => &["ps", "-a"],
        EntityKind::Images => &["images"],
        EntityKind::Networks => &["network", "ls"],
        EntityKind::Volumes => &["volume", "ls"],
    };
    verb.iter()
        .chain(JSON_FORMAT.iter())
        .map(|s| s.to_string())
        .collect()
}

/// Fetches and parses listings through an `EngineRunner`. Results are in engine
/// order; ordering policy is applied by the inventory.
#[derive(Clone)]
pub struct EngineRepo {
    runner: Arc<dyn EngineRunner>,
}

impl EngineRepo {
    pub fn new(runner: Arc<dyn EngineRunner>) -> Self {
        Self { runner }
    }

    pub async fn run(&self, args: &[String], cancel: &CancelToken) -> Result<String, EngineError> {
        self.runner.run(args, cancel).await
    }

    #[instrument(skip(self, cancel), fields(repo = "engine", operation = "list_containers"))]
    pub async fn list_containers(&self, cancel: &CancelToken) -> Result<Vec<Container>, EngineError> {
        let raw = self.run(&listing_args(EntityKind::Containers), cancel).await?;
        Ok(parse::parse_containers(&raw)?)
    }

    #[instrument(skip(self, cancel), fields(repo = "engine", operation = "list_images"))]
    pub async fn list_images(&self, cancel: &CancelToken) -> Result<Vec<Image>, EngineError> {
        let raw = self.run(&listing_args(EntityKind::Images), cancel).await?;
        Ok(parse::parse_images(&raw)?)
    }

    #[instrument(skip(self, cancel), fields(repo = "engine", operation = "list_networks"))]
    pub async fn list_networks(&self, cancel: &CancelToken) -> Result<Vec<Network>, EngineError> {
        let raw = self.run(&listing_args(EntityKind::Networks), cancel).await?;
        Ok(parse::parse_networks(&raw)?)
    }

    #[instrument(skip(self, cancel), fields(repo = "engine", operation = "list_volumes"))]
    pub async fn list_volumes(&self, cancel: &CancelToken) -> Result<Vec<Volume>, EngineError> {
        let raw = self.run(&listing_args(EntityKind::Volumes), cancel).await?;
        Ok(parse::parse_volumes(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_args_request_one_json_object_per_line() {
        assert_eq!(
            listing_args(EntityKind::Containers),
            ["ps", "-a", "--format", "{{json .}}"]
        );
        assert_eq!(
            listing_args(EntityKind::Networks),
            ["network", "ls", "--format", "{{json .}}"]
        );
        assert_eq!(
            listing_args(EntityKind::Volumes),
            ["volume", "ls", "--format", "{{json .}}"]
        );
        assert_eq!(listing_args(EntityKind::Images), ["images", "--format", "{{json .}}"]);
    }
}
