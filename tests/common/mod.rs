// Shared test helpers: scripted engine runner and listing fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use dockside::engine_repo::{CancelToken, EngineRepo, EngineRunner, listing_args};
use dockside::error::{EngineCommandError, EngineError};
use dockside::inventory::Inventory;
use dockside::models::EntityKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const CONTAINERS_JSON: &str = r#"{"ID":"abc123","Names":"web","Image":"nginx:latest","Labels":"","Ports":"0.0.0.0:8080->80/tcp","Networks":"bridge","CreatedAt":"2024-01-15 10:30:00 +0000 UTC","State":"running","Status":"Up 2 hours"}
{"ID":"def456","Names":"db","Image":"postgres:16","Labels":"","Ports":"","Networks":"backend","CreatedAt":"2024-01-14 09:00:00 +0000 UTC","State":"exited","Status":"Exited (0) 3 hours ago"}
{"ID":"fed789","Names":"cache","Image":"redis","Labels":"","Ports":"6379/tcp","Networks":"","CreatedAt":"2024-01-13 08:00:00 +0000 UTC","State":"running","Status":"Up 1 day"}
"#;

pub const IMAGES_JSON: &str = r#"{"ID":"sha256:1111111111111111","Repository":"nginx","Tag":"latest","CreatedAt":"2024-01-10 12:00:00 +0000 UTC","Size":"187MB"}
{"ID":"sha256:2222222222222222","Repository":"postgres","Tag":"16","CreatedAt":"2024-02-01 12:00:00 +0000 UTC","Size":"1.5GB"}
"#;

pub const NETWORKS_JSON: &str = r#"{"ID":"n1","Name":"host","Driver":"host","Labels":"","Scope":"local","CreatedAt":"2024-01-01 00:00:00 +0000 UTC"}
{"ID":"n2","Name":"bridge","Driver":"bridge","Labels":"","Scope":"local","CreatedAt":"2024-01-01 00:00:00 +0000 UTC"}
"#;

pub const VOLUMES_JSON: &str = r#"{"Name":"pgdata","Driver":"local","Labels":"com.example.app=db","Mountpoint":"/var/lib/docker/volumes/pgdata/_data","Scope":"local"}
{"Name":"cache","Driver":"local","Labels":"","Mountpoint":"/var/lib/docker/volumes/cache/_data","Scope":""}
"#;

/// Engine stand-in: returns scripted results per argv and records every call.
/// Unscripted commands fail with exit code 1.
#[derive(Default)]
pub struct FakeRunner {
    responses: Mutex<HashMap<String, Result<String, EngineError>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scripts the result for one argv, e.g. `"rm web"`.
    pub fn respond(&self, argv: &str, result: Result<String, EngineError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(argv.to_string(), result);
    }

    pub fn respond_listing(&self, kind: EntityKind, result: Result<String, EngineError>) {
        self.respond(&listing_args(kind).join(" "), result);
    }

    /// Scripts all four listings with the fixtures above.
    pub fn with_fixtures(self: Arc<Self>) -> Arc<Self> {
        self.respond_listing(EntityKind::Containers, Ok(CONTAINERS_JSON.into()));
        self.respond_listing(EntityKind::Images, Ok(IMAGES_JSON.into()));
        self.respond_listing(EntityKind::Networks, Ok(NETWORKS_JSON.into()));
        self.respond_listing(EntityKind::Volumes, Ok(VOLUMES_JSON.into()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|argv| argv.join(" "))
            .collect()
    }

    pub fn call_count(&self, argv: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == argv).count()
    }
}

#[async_trait]
impl EngineRunner for FakeRunner {
    async fn run(&self, args: &[String], cancel: &CancelToken) -> Result<String, EngineError> {
        let command = args.join(" ");
        self.calls.lock().unwrap().push(args.to_vec());
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled { command });
        }
        let scripted = self.responses.lock().unwrap().get(&command).cloned();
        scripted.unwrap_or_else(|| Err(command_failure(&command, "unexpected command")))
    }
}

pub fn command_failure(command: &str, stderr: &str) -> EngineError {
    EngineCommandError {
        command: format!("docker {}", command),
        exit_code: Some(1),
        stderr: stderr.to_string(),
    }
    .into()
}

pub fn listing_key(kind: EntityKind) -> String {
    listing_args(kind).join(" ")
}

pub fn inventory(runner: &Arc<FakeRunner>) -> Inventory {
    Inventory::new(EngineRepo::new(runner.clone()))
}
