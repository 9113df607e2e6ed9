// Image and image reference models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG: &str = "latest";

/// `repository[:tag]` as the engine reports it, split into parts.
///
/// `original_name` is `repository:tag` when the reference carried a tag and
/// just `repository` otherwise (the tag then reads as "latest").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImageRef {
    pub original_name: String,
    pub repository: String,
    pub tag: String,
}

impl ContainerImageRef {
    /// Splits a reference such as `nginx:1.27`, `nginx` or
    /// `localhost:5000/team/app:v1`. A `:` that is followed by a `/` belongs to
    /// the registry host and is not a tag separator. A digest (`@sha256:...`)
    /// stays on the repository; only the name before `@` can carry a tag.
    pub fn parse(reference: &str) -> Self {
        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (reference, None),
        };
        let (repository, tag) = match name.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') && !tag.is_empty() => {
                (repository, Some(tag))
            }
            _ => (name, None),
        };
        let repository = match digest {
            Some(digest) => format!("{}@{}", repository, digest),
            None => repository.to_string(),
        };
        Self {
            original_name: reference.to_string(),
            repository,
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
        }
    }

    /// Builds a reference from the separate repository/tag columns of the image listing.
    pub fn from_parts(repository: &str, tag: Option<&str>) -> Self {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => Self {
                original_name: format!("{}:{}", repository, tag),
                repository: repository.to_string(),
                tag: tag.to_string(),
            },
            None => Self::untagged(repository),
        }
    }

    fn untagged(repository: &str) -> Self {
        Self {
            original_name: repository.to_string(),
            repository: repository.to_string(),
            tag: DEFAULT_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    #[serde(rename = "ref")]
    pub image_ref: ContainerImageRef,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}
