//! Opening transports to inventory devices.

use std::future::Future;
use std::path::PathBuf;

use crate::driver::Timing;
use crate::error::{DriverError, Result};
use crate::inventory::Device;
use crate::transport::{
    Connection, HostKeyVerification, Transport, TransportConfig, TransportProfile,
};

/// Opens a transport to a device.
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    fn connect(
        &self,
        device: &Device,
        profile: TransportProfile,
        timing: &Timing,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Real console and SSH lines.
#[derive(Debug, Clone, Default)]
pub struct LineConnector {
    host_key_verification: HostKeyVerification,
    known_hosts: Option<PathBuf>,
}

impl LineConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host key checking for devices without their own setting.
    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn with_known_hosts(mut self, path: Option<PathBuf>) -> Self {
        self.known_hosts = path;
        self
    }

    fn transport_config(
        &self,
        device: &Device,
        profile: TransportProfile,
        timing: &Timing,
    ) -> Result<TransportConfig> {
        let config = device.transport_config(profile, timing).ok_or_else(|| {
            DriverError::InvalidConfig {
                message: format!("{} has no {:?} endpoint", device.name, profile),
            }
        })?;
        let mode = device
            .settings
            .host_key_verification
            .unwrap_or(self.host_key_verification);
        let config = config.with_host_key_verification(mode);
        Ok(match &self.known_hosts {
            Some(path) => config.with_known_hosts_path(path.clone()),
            None => config,
        })
    }
}

impl Connector for LineConnector {
    type Transport = Connection;

    async fn connect(
        &self,
        device: &Device,
        profile: TransportProfile,
        timing: &Timing,
    ) -> Result<Connection> {
        let config = self.transport_config(device, profile, timing)?;
        Connection::open(&config).await
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;
    use crate::error::TransportError;
    use crate::transport::scripted::ScriptedTransport;

    /// Hands out scripted transports per device name, in the order they were
    /// added. A device with no script left fails to connect. Every attempt is
    /// recorded with the device as the connector saw it.
    #[derive(Default)]
    pub(crate) struct ScriptedConnector {
        scripts: Mutex<HashMap<String, VecDeque<ScriptedTransport>>>,
        attempts: Mutex<Vec<(Device, TransportProfile)>>,
    }

    impl ScriptedConnector {
        pub fn with(self, device: &str, transport: ScriptedTransport) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(device.to_string())
                .or_default()
                .push_back(transport);
            self
        }

        pub fn attempts(&self) -> Vec<(Device, TransportProfile)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl Connector for ScriptedConnector {
        type Transport = ScriptedTransport;

        async fn connect(
            &self,
            device: &Device,
            profile: TransportProfile,
            _timing: &Timing,
        ) -> Result<ScriptedTransport> {
            self.attempts.lock().unwrap().push((device.clone(), profile));
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&device.name)
                .and_then(VecDeque::pop_front);
            script.ok_or_else(|| {
                TransportError::ConnectionFailed {
                    host: device.endpoint.host.clone(),
                    port: device.endpoint.port,
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                }
                .into()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::inventory::{Credentials, Endpoint, ManagementEndpoint};

    fn ssh_device() -> Device {
        let mut device = Device::console("R1", Endpoint::new("127.0.0.1", 5000));
        device.management = Some(ManagementEndpoint {
            host: "10.0.0.1".to_string(),
            port: 22,
            interface: None,
            netmask: None,
        });
        device.credentials = Credentials {
            username: Some("admin".to_string()),
            password: Some("cisco123".to_string()),
            enable_secret: None,
        };
        device
    }

    #[test]
    fn test_host_key_mode_defaults_from_connector() {
        let connector = LineConnector::new()
            .with_host_key_verification(HostKeyVerification::AcceptNew)
            .with_known_hosts(Some(PathBuf::from("/tmp/lab_known_hosts")));

        let config = connector
            .transport_config(&ssh_device(), TransportProfile::Ssh, &Timing::default())
            .unwrap();
        assert_eq!(config.host_key_verification, HostKeyVerification::AcceptNew);
        assert_eq!(config.known_hosts_path, Some(PathBuf::from("/tmp/lab_known_hosts")));
    }

    #[test]
    fn test_device_host_key_mode_wins() {
        let connector =
            LineConnector::new().with_host_key_verification(HostKeyVerification::AcceptNew);
        let mut device = ssh_device();
        device.settings.host_key_verification = Some(HostKeyVerification::Strict);

        let config = connector
            .transport_config(&device, TransportProfile::Ssh, &Timing::default())
            .unwrap();
        assert_eq!(config.host_key_verification, HostKeyVerification::Strict);
        assert!(config.known_hosts_path.is_none());
    }

    #[test]
    fn test_missing_endpoint_is_invalid_config() {
        let device = Device::console("R1", Endpoint::new("127.0.0.1", 5000));
        let err = LineConnector::new()
            .transport_config(&device, TransportProfile::Ssh, &Timing::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_refused_ssh_is_connection_error() {
        let mut device = ssh_device();
        device.management = Some(ManagementEndpoint {
            host: "127.0.0.1".to_string(),
            port: 1,
            interface: None,
            netmask: None,
        });
        let timing = Timing {
            connect_timeout: std::time::Duration::from_secs(2),
            ..Timing::default()
        };

        let Err(err) = LineConnector::new()
            .connect(&device, TransportProfile::Ssh, &timing)
            .await
        else {
            panic!("connected to a closed port");
        };
        assert!(matches!(err.kind(), ErrorKind::Connection | ErrorKind::Timeout));
    }
}
