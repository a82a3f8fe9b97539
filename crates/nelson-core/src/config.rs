//! nelson.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::image::RegistryUri;
use crate::policy::PolicyConfig;
use crate::types::{Datacenter, TrafficShiftPolicy, TrafficShiftSettings};

const DEFAULT_WORKFLOW: &str = "magnetar";
const DEFAULT_INSTRUCTION_SECS: u64 = 120;
const DEFAULT_PROGRAM_SECS: u64 = 1800;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NelsonConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub datacenters: Vec<DatacenterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow used when a deploy request does not name one.
    #[serde(default = "default_workflow")]
    pub default: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_WORKFLOW.to_string(),
        }
    }
}

/// Deadlines in seconds; `0` disables one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_instruction_secs")]
    pub instruction_secs: u64,
    #[serde(default = "default_program_secs")]
    pub program_secs: u64,
}

fn default_workflow() -> String {
    DEFAULT_WORKFLOW.to_string()
}

fn default_instruction_secs() -> u64 {
    DEFAULT_INSTRUCTION_SECS
}

fn default_program_secs() -> u64 {
    DEFAULT_PROGRAM_SECS
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            instruction_secs: DEFAULT_INSTRUCTION_SECS,
            program_secs: DEFAULT_PROGRAM_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory holding one `{deployment_id}.log` per deployment.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatacenterConfig {
    pub name: String,
    pub domain: String,
    pub registry: String,
    pub policy: Option<PolicySection>,
    pub traffic_shift: Option<TrafficShiftSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    pub resource_creds_path: Option<String>,
    pub pki_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficShiftSection {
    pub policy: Option<String>,
    pub duration_secs: Option<u64>,
}

impl NelsonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: NelsonConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Per-instruction deadline, unless disabled.
    pub fn instruction_timeout(&self) -> Option<Duration> {
        seconds(self.timeouts.instruction_secs)
    }

    /// Whole-program deadline, unless disabled.
    pub fn program_timeout(&self) -> Option<Duration> {
        seconds(self.timeouts.program_secs)
    }

    /// Resolve a configured datacenter by name.
    pub fn datacenter(&self, name: &str) -> anyhow::Result<Option<Datacenter>> {
        self.datacenters
            .iter()
            .find(|dc| dc.name == name)
            .map(DatacenterConfig::to_datacenter)
            .transpose()
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl DatacenterConfig {
    pub fn to_datacenter(&self) -> anyhow::Result<Datacenter> {
        let defaults = PolicyConfig::default();
        let policy = match &self.policy {
            Some(p) => PolicyConfig {
                resource_creds_path: p
                    .resource_creds_path
                    .clone()
                    .unwrap_or(defaults.resource_creds_path),
                pki_path: p.pki_path.clone(),
            },
            None => defaults,
        };

        let traffic_shift = match &self.traffic_shift {
            Some(ts) => TrafficShiftSettings {
                policy: match &ts.policy {
                    Some(p) => p.parse::<TrafficShiftPolicy>()?,
                    None => TrafficShiftPolicy::Atomic,
                },
                duration_secs: ts.duration_secs.unwrap_or(0),
            },
            None => TrafficShiftSettings::default(),
        };

        Ok(Datacenter {
            name: self.name.clone(),
            domain: self.domain.clone(),
            registry: RegistryUri::new(&self.registry),
            policy,
            traffic_shift,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[workflow]
default = "canopus"

[timeouts]
instruction_secs = 30

[logging]
dir = "/var/nelson/logs"

[[datacenters]]
name = "dc1"
domain = "dc1.example.com"
registry = "registry.dc1.example.com/units"

[datacenters.policy]
pki_path = "pki"

[datacenters.traffic_shift]
policy = "linear"
duration_secs = 600
"#;

    #[test]
    fn test_parse_full() {
        let config = NelsonConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.workflow.default, "canopus");
        assert_eq!(config.instruction_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.program_timeout(), Some(Duration::from_secs(1800)));

        let dc = config.datacenter("dc1").unwrap().unwrap();
        assert_eq!(dc.registry.host(), "registry.dc1.example.com");
        assert_eq!(dc.policy.pki_path.as_deref(), Some("pki"));
        assert_eq!(dc.policy.resource_creds_path, "%env%/%resource%/creds/%unit%");
        assert_eq!(dc.traffic_shift.policy, TrafficShiftPolicy::Linear);
        assert_eq!(dc.traffic_shift.duration_secs, 600);
    }

    #[test]
    fn test_parse_minimal() {
        let config = NelsonConfig::from_toml_str("").unwrap();
        assert_eq!(config.workflow.default, "magnetar");
        assert_eq!(config.instruction_timeout(), Some(Duration::from_secs(120)));
        assert!(config.datacenter("dc1").unwrap().is_none());
    }

    #[test]
    fn test_zero_disables_a_timeout() {
        let config = NelsonConfig::from_toml_str("[timeouts]\nprogram_secs = 0\n").unwrap();
        assert_eq!(config.program_timeout(), None);
        assert_eq!(config.instruction_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_empty_workflow_table_keeps_default() {
        let config = NelsonConfig::from_toml_str("[workflow]
").unwrap();
        assert_eq!(config.workflow.default, "magnetar");
    }

    #[test]
    fn test_unknown_shift_policy_is_an_error() {
        let toml_str = r#"
[[datacenters]]
name = "dc1"
domain = "dc1.example.com"
registry = "registry.local"

[datacenters.traffic_shift]
policy = "sudden"
"#;
        let config = NelsonConfig::from_toml_str(toml_str).unwrap();
        assert!(config.datacenter("dc1").is_err());
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = NelsonConfig::from_toml_str(FULL).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("dc1.example.com"));
    }
}
