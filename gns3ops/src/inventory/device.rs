//! Device records as stored in the inventory.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::Timing;
use crate::transport::{HostKeyVerification, TransportConfig, TransportProfile};

fn default_ssh_port() -> u16 {
    22
}

/// Host and port of a line endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where a device is reached over SSH once it has been set up for it.
///
/// `interface` and `netmask`, when present, are used to assign the address
/// during SSH setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementEndpoint {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
}

impl ManagementEndpoint {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

/// Login material for a device. Debug output is redacted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_secret: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("enable_secret", &redact(&self.enable_secret))
            .finish()
    }
}

impl Credentials {
    /// These credentials, with each missing field taken from `fallback`.
    pub fn or(&self, fallback: &Credentials) -> Credentials {
        let pick = |own: &Option<String>, other: &Option<String>| {
            own.clone().or_else(|| other.clone())
        };
        Credentials {
            username: pick(&self.username, &fallback.username),
            password: pick(&self.password, &fallback.password),
            enable_secret: pick(&self.enable_secret, &fallback.enable_secret),
        }
    }
}

/// Per-device overrides of the session timing and SSH checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_factor: Option<u32>,

    /// SSH host key checking for this device, instead of the `[ssh]` default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key_verification: Option<HostKeyVerification>,
}

/// One row of `show ip interface brief`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    pub name: String,

    /// `None` when unassigned.
    pub ip_address: Option<String>,

    pub status: String,

    pub protocol: String,
}

impl InterfaceState {
    pub fn is_up(&self) -> bool {
        self.status == "up" && self.protocol == "up"
    }
}

/// Last state captured from the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub uptime: Option<String>,

    #[serde(default)]
    pub memory: Option<String>,

    #[serde(default)]
    pub config_lines: Option<u32>,

    #[serde(default)]
    pub management_ip: Option<String>,

    #[serde(default)]
    pub interfaces: Vec<InterfaceState>,

    #[serde(default)]
    pub reachable: bool,

    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A managed device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,

    /// Transport used by default for this device.
    #[serde(default)]
    pub profile: TransportProfile,

    /// Console endpoint.
    pub endpoint: Endpoint,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management: Option<ManagementEndpoint>,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub settings: SessionSettings,

    #[serde(default)]
    pub state: DeviceState,
}

impl Device {
    /// A console-reached device with nothing captured yet.
    pub fn console(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            node_id: None,
            node_type: None,
            profile: TransportProfile::Console,
            endpoint,
            management: None,
            credentials: Credentials::default(),
            settings: SessionSettings::default(),
            state: DeviceState::default(),
        }
    }

    /// Endpoint for `profile`, if the device has one.
    pub fn endpoint_for(&self, profile: TransportProfile) -> Option<Endpoint> {
        match profile {
            TransportProfile::Console => Some(self.endpoint.clone()),
            TransportProfile::Ssh => self.management.as_ref().map(ManagementEndpoint::endpoint),
        }
    }

    /// Transport configuration for `profile`.
    pub fn transport_config(
        &self,
        profile: TransportProfile,
        timing: &Timing,
    ) -> Option<TransportConfig> {
        let endpoint = self.endpoint_for(profile)?;
        let mut config = TransportConfig::new(profile, endpoint.host, endpoint.port)
            .with_timeout(timing.connect_timeout);

        if profile == TransportProfile::Ssh {
            if let Some(username) = &self.credentials.username {
                config = config.with_username(username.clone());
            }
            if let Some(password) = &self.credentials.password {
                config = config.with_password(password.clone());
            }
        }

        Some(config)
    }

    /// `defaults` with this device's overrides applied.
    pub fn timing(&self, defaults: &Timing) -> Timing {
        let mut timing = defaults.clone();
        if let Some(secs) = self.settings.timeout {
            timing.command_timeout = Duration::from_secs(secs);
        }
        if let Some(factor) = self.settings.delay_factor {
            timing.delay_factor = factor;
        }
        timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        let mut device = Device::console("R1", Endpoint::new("127.0.0.1", 5000));
        device.management = Some(ManagementEndpoint {
            host: "192.168.1.10".into(),
            port: 22,
            interface: Some("FastEthernet0/0".into()),
            netmask: Some("255.255.255.0".into()),
        });
        device.credentials = Credentials {
            username: Some("admin".into()),
            password: Some("cisco123".into()),
            enable_secret: Some("cisco".into()),
        };
        device
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let debug = format!("{:?}", device().credentials);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("cisco123"));
        assert!(!debug.contains("\"cisco\""));
    }

    #[test]
    fn test_transport_config_per_profile() {
        let device = device();
        let timing = Timing::default();

        let console = device
            .transport_config(TransportProfile::Console, &timing)
            .unwrap();
        assert_eq!(console.socket_addr(), "127.0.0.1:5000");
        assert!(console.username.is_none());

        let ssh = device.transport_config(TransportProfile::Ssh, &timing).unwrap();
        assert_eq!(ssh.socket_addr(), "192.168.1.10:22");
        assert_eq!(ssh.username.as_deref(), Some("admin"));
        assert!(ssh.password.is_some());

        let bare = Device::console("R2", Endpoint::new("127.0.0.1", 5001));
        assert!(bare.transport_config(TransportProfile::Ssh, &timing).is_none());
    }

    #[test]
    fn test_credentials_fall_back_per_field() {
        let own = Credentials {
            username: Some("ops".into()),
            ..Default::default()
        };
        let defaults = device().credentials;

        let merged = own.or(&defaults);
        assert_eq!(merged.username.as_deref(), Some("ops"));
        assert_eq!(merged.password.as_deref(), Some("cisco123"));
        assert_eq!(merged.enable_secret.as_deref(), Some("cisco"));
        assert_eq!(Credentials::default().or(&defaults), defaults);
    }

    #[test]
    fn test_timing_overrides() {
        let mut device = device();
        device.settings.delay_factor = Some(4);
        let timing = device.timing(&Timing::default());
        assert_eq!(timing.delay_factor, 4);
        assert_eq!(timing.command_timeout, Timing::default().command_timeout);
    }

    #[test]
    fn test_management_port_defaults_to_ssh() {
        let endpoint: ManagementEndpoint = serde_yaml::from_str("host: 10.0.0.1").unwrap();
        assert_eq!(endpoint.port, 22);
        assert_eq!(endpoint.endpoint().to_string(), "10.0.0.1:22");
    }
}
