//! Discovery identities: stack names, service names and feature versions.
//!
//! A stack name identifies one concrete deployment
//! (`search--1-4-2--3f9a01bc`); a service name identifies the feature line
//! that deployments of compatible versions share (`search@1.4`). Both are
//! derived from a unit definition, never assigned by hand.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::types::{NamespaceName, Plan, UnitDef};

/// Length of the hash suffix carried by stack names.
const HASH_LEN: usize = 8;

/// The `major.minor` portion of a unit version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureVersion {
    pub major: u64,
    pub minor: u64,
}

impl From<&semver::Version> for FeatureVersion {
    fn from(v: &semver::Version) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
        }
    }
}

impl fmt::Display for FeatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Identity of a single deployment of a unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StackName {
    pub service_type: String,
    pub version: semver::Version,
    pub hash: String,
}

impl StackName {
    pub fn new(service_type: &str, version: &semver::Version, hash: &str) -> Self {
        Self {
            service_type: service_type.to_string(),
            version: version.clone(),
            hash: hash.to_string(),
        }
    }

    /// The service line this stack belongs to.
    pub fn service_name(&self) -> ServiceName {
        ServiceName {
            service_type: self.service_type.clone(),
            version: FeatureVersion::from(&self.version),
        }
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}--{}-{}-{}--{}",
            self.service_type, self.version.major, self.version.minor, self.version.patch, self.hash
        )
    }
}

impl FromStr for StackName {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidStackName(s.to_string());
        let mut parts = s.rsplitn(3, "--");
        let hash = parts.next().ok_or_else(invalid)?;
        let version = parts.next().ok_or_else(invalid)?;
        let service_type = parts.next().ok_or_else(invalid)?;
        if service_type.is_empty() || hash.is_empty() {
            return Err(invalid());
        }

        let nums: Vec<u64> = version
            .split('-')
            .map(|n| n.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        let [major, minor, patch] = nums.as_slice() else {
            return Err(invalid());
        };

        Ok(Self {
            service_type: service_type.to_string(),
            version: semver::Version::new(*major, *minor, *patch),
            hash: hash.to_string(),
        })
    }
}

/// Identity of a service line: unit name plus feature version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceName {
    pub service_type: String,
    pub version: FeatureVersion,
}

impl ServiceName {
    pub fn new(service_type: &str, version: FeatureVersion) -> Self {
        Self {
            service_type: service_type.to_string(),
            version,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service_type, self.version)
    }
}

impl FromStr for ServiceName {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidServiceName(s.to_string());
        let (name, version) = s.split_once('@').ok_or_else(invalid)?;
        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            service_type: name.to_string(),
            version: FeatureVersion {
                major: major.parse().map_err(|_| invalid())?,
                minor: minor.parse().map_err(|_| invalid())?,
            },
        })
    }
}

/// Derive the hash suffix for a deployment of `unit` under `plan` in `namespace`.
///
/// The same inputs always produce the same hash, so re-deploying an
/// identical unit/plan pair lands on the same stack name.
pub fn deployment_hash(unit: &UnitDef, plan: &Plan, namespace: &NamespaceName) -> String {
    let version = unit.version.to_string();
    let mut hasher = Sha256::new();
    for part in [
        unit.name.as_str(),
        version.as_str(),
        plan.name.as_str(),
        namespace.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..HASH_LEN].to_string()
}
