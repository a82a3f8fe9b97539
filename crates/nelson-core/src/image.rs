//! Registry image references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A destination registry: `host[:port][/path]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryUri(pub String);

impl RegistryUri {
    pub fn new(uri: &str) -> Self {
        Self(uri.trim_end_matches('/').to_string())
    }

    /// Registry host (and port, if any).
    pub fn host(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(host, _)| host)
    }

    /// Repository prefix below the host, if any.
    pub fn path(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, path)| path)
    }
}

impl fmt::Display for RegistryUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A container image reference: `[registry/]repository[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl Image {
    pub fn parse(reference: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidImage(reference.to_string());
        if reference.is_empty() || reference.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_string())),
            Some(_) => return Err(invalid()),
            None => (reference, None),
        };

        // A colon after the last slash separates the tag; earlier colons
        // belong to a registry port.
        let last_slash = rest.rfind('/').map_or(0, |i| i + 1);
        let (path, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&rest[..split], Some(rest[split + 1..].to_string()))
            }
            None => (rest, None),
        };
        if tag.as_deref() == Some("") {
            return Err(invalid());
        }

        let (registry, repository) = match path.split_once('/') {
            Some((first, remainder)) if looks_like_host(first) => {
                (Some(first.to_string()), remainder.to_string())
            }
            _ => (None, path.to_string()),
        };
        if repository.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// The final path segment of the repository (`units/search` → `search`).
    pub fn base_name(&self) -> &str {
        self.repository
            .rsplit_once('/')
            .map_or(self.repository.as_str(), |(_, name)| name)
    }

    /// The same image, addressed under another registry.
    ///
    /// The digest is dropped: it belongs to the source registry's manifest
    /// and is recomputed on push. A reference pinned only by digest has
    /// nothing left to name it at the destination, so it is refused.
    pub fn retarget(&self, registry: &RegistryUri) -> CoreResult<Self> {
        if self.tag.is_none() && self.digest.is_some() {
            return Err(CoreError::UntaggedImage(self.to_string()));
        }
        let repository = match registry.path() {
            Some(prefix) => format!("{prefix}/{}", self.base_name()),
            None => self.base_name().to_string(),
        };
        Ok(Self {
            registry: Some(registry.host().to_string()),
            repository,
            tag: self.tag.clone(),
            digest: None,
        })
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn looks_like_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}
