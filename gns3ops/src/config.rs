//! Application configuration (`gns3ops.toml`).
//!
//! Every field has a default, so a missing file, or one with only a few
//! keys, gives a working lab setup.
//!
//! ```toml
//! [gns3]
//! url = "http://127.0.0.1:3080"
//! project = "Solange"
//!
//! [session]
//! delay_factor = 2
//! batch_policy = "continue"
//!
//! [credentials]
//! username = "admin"
//! password = "cisco123"
//! enable_secret = "enable123"
//!
//! [ssh]
//! host_key_verification = "accept_new"
//! known_hosts = "config/known_hosts"
//!
//! [endpoints.R1]
//! host = "192.168.1.1"
//! interface = "FastEthernet0/0"
//! netmask = "255.255.255.0"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::backup::BackupStore;
use crate::discovery::DiscoveryConfig;
use crate::driver::{BatchPolicy, Timing};
use crate::error::{Result, StoreError};
use crate::inventory::{Credentials, InventoryStore, ManagementEndpoint, parse};
use crate::oplog::OperationLog;
use crate::templates::TemplateStore;
use crate::transport::HostKeyVerification;

/// GNS3 server and project selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gns3Section {
    pub url: String,
    pub project: String,
    pub node_types: Vec<String>,
    pub console_host: String,

    /// Seconds.
    pub request_timeout: u64,
}

impl Default for Gns3Section {
    fn default() -> Self {
        let discovery = DiscoveryConfig::default();
        Self {
            url: discovery.url,
            project: "Solange".to_string(),
            node_types: discovery.node_types,
            console_host: discovery.console_host,
            request_timeout: discovery.request_timeout.as_secs(),
        }
    }
}

/// Session timing, in seconds, and batch behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub connect_timeout: u64,
    pub command_timeout: u64,
    pub extended_timeout: u64,
    pub delay_factor: u32,
    pub batch_policy: BatchPolicy,

    /// Interfaces searched, in order, for the management address.
    pub management_interfaces: Vec<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            connect_timeout: timing.connect_timeout.as_secs(),
            command_timeout: timing.command_timeout.as_secs(),
            extended_timeout: timing.extended_timeout.as_secs(),
            delay_factor: timing.delay_factor,
            batch_policy: BatchPolicy::default(),
            management_interfaces: parse::DEFAULT_MANAGEMENT_INTERFACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Credentials applied by SSH setup and used for devices with none on file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    pub username: String,
    pub password: String,
    pub enable_secret: String,
}

impl Default for CredentialsSection {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "cisco123".to_string(),
            enable_secret: "enable123".to_string(),
        }
    }
}

impl std::fmt::Debug for CredentialsSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsSection")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// SSH setup parameters and host key checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSection {
    pub domain_name: String,
    pub key_modulus: u32,

    /// `strict`, `accept_new` or `disabled`. Devices may override it.
    pub host_key_verification: HostKeyVerification,

    /// known_hosts file. Unset uses the user's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<PathBuf>,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            domain_name: "automation.local".to_string(),
            key_modulus: 1024,
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
        }
    }
}

/// Where state lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub inventory: PathBuf,
    pub display_cache: PathBuf,
    pub backups: PathBuf,
    pub oplog: PathBuf,
    pub templates: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            inventory: PathBuf::from("config/devices.yaml"),
            display_cache: PathBuf::from("config/devices_cache.json"),
            backups: PathBuf::from("backups"),
            oplog: PathBuf::from("logs/operations.jsonl"),
            templates: PathBuf::from("config/templates"),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gns3: Gns3Section,
    pub session: SessionSection,
    pub credentials: CredentialsSection,
    pub ssh: SshSection,
    pub paths: PathsSection,

    /// Management endpoints by node name.
    pub endpoints: IndexMap<String, ManagementEndpoint>,
}

impl AppConfig {
    /// Parse TOML text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, StoreError> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`. A missing file gives the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                debug!("Loading configuration from {}", path.display());
                Ok(Self::from_toml(&text)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(StoreError::io(path, e).into()),
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            url: self.gns3.url.clone(),
            project: self.gns3.project.clone(),
            node_types: self.gns3.node_types.clone(),
            console_host: self.gns3.console_host.clone(),
            endpoints: self.endpoints.clone(),
            request_timeout: Duration::from_secs(self.gns3.request_timeout),
        }
    }

    pub fn timing(&self) -> Timing {
        Timing {
            connect_timeout: Duration::from_secs(self.session.connect_timeout),
            command_timeout: Duration::from_secs(self.session.command_timeout),
            extended_timeout: Duration::from_secs(self.session.extended_timeout),
            delay_factor: self.session.delay_factor,
            ..Timing::default()
        }
    }

    /// Configured credentials as a device record holds them.
    pub fn credentials(&self) -> Credentials {
        let set = |v: &str| (!v.is_empty()).then(|| v.to_string());
        Credentials {
            username: set(&self.credentials.username),
            password: set(&self.credentials.password),
            enable_secret: set(&self.credentials.enable_secret),
        }
    }

    pub fn inventory_store(&self) -> InventoryStore {
        InventoryStore::new(&self.paths.inventory).with_display_cache(&self.paths.display_cache)
    }

    pub fn backup_store(&self) -> BackupStore {
        BackupStore::new(&self.paths.backups)
    }

    pub fn operation_log(&self) -> OperationLog {
        OperationLog::new(&self.paths.oplog)
    }

    pub fn template_store(&self) -> TemplateStore {
        TemplateStore::new(&self.paths.templates)
    }
}
