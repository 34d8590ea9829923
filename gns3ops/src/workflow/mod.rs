//! Batch operations over the inventory.
//!
//! Every operation visits its devices one after another, opens a session
//! per device, writes one operation record per device and moves on to the
//! next device when one fails. Sessions to the same device are serialized
//! through [`DeviceLocks`], so operations can also run side by side as
//! background jobs.

mod commands;
mod connect;
mod configure;
mod report;
mod state;

pub use commands::{SshSetup, password_commands};
pub use connect::{Connector, LineConnector};
pub use report::{BatchReport, DeviceResult};

use std::sync::Arc;

use log::{debug, error, info};
use secrecy::SecretString;
use tokio::sync::Mutex;

use crate::backup::BackupStore;
use crate::config::{AppConfig, SshSection};
use crate::discovery::DiscoveryConfig;
use crate::driver::{BatchPolicy, Session, Timing};
use crate::error::{Error, Result, StoreError};
use crate::inventory::{Credentials, Device, Inventory, InventoryStore};
use crate::jobs::DeviceLocks;
use crate::oplog::{OperationKind, OperationLog, OperationRecord, OperationStatus};
use crate::platform::{PlatformDefinition, ios};
use crate::templates::TemplateStore;
use crate::transport::TransportProfile;

/// Stores, settings and a connector: everything an operation needs.
pub struct Workflow<C = LineConnector> {
    connector: C,
    platform: PlatformDefinition,
    timing: Timing,
    policy: BatchPolicy,
    management_interfaces: Vec<String>,
    credentials: Credentials,
    ssh: SshSection,
    discovery: DiscoveryConfig,
    inventory: InventoryStore,
    inventory_lock: Arc<Mutex<()>>,
    backups: BackupStore,
    templates: TemplateStore,
    oplog: OperationLog,
    locks: DeviceLocks,
}

impl Workflow<LineConnector> {
    /// Workflow over real console and SSH lines.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let connector = LineConnector::new()
            .with_host_key_verification(config.ssh.host_key_verification)
            .with_known_hosts(config.ssh.known_hosts.clone());
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> Workflow<C> {
    pub fn with_connector(config: &AppConfig, connector: C) -> Result<Self> {
        Ok(Self {
            connector,
            platform: ios::platform()?,
            timing: config.timing(),
            policy: config.session.batch_policy,
            management_interfaces: config.session.management_interfaces.clone(),
            credentials: config.credentials(),
            ssh: config.ssh.clone(),
            discovery: config.discovery_config(),
            inventory: config.inventory_store(),
            inventory_lock: Arc::new(Mutex::new(())),
            backups: config.backup_store(),
            templates: config.template_store(),
            oplog: config.operation_log(),
            locks: DeviceLocks::new(),
        })
    }

    pub fn with_platform(mut self, platform: PlatformDefinition) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share device locks with other workflows.
    pub fn with_locks(mut self, locks: DeviceLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn inventory_store(&self) -> &InventoryStore {
        &self.inventory
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn oplog(&self) -> &OperationLog {
        &self.oplog
    }

    /// Open a session to `device` and bring it to a prompt. Credentials the
    /// device lacks come from the `[credentials]` defaults.
    pub async fn open(
        &self,
        device: &Device,
        profile: TransportProfile,
    ) -> Result<Session<C::Transport>> {
        let device = Device {
            credentials: device.credentials.or(&self.credentials),
            ..device.clone()
        };
        let timing = device.timing(&self.timing);
        info!("{}: connecting ({:?})", device.name, profile);
        let transport = self.connector.connect(&device, profile, &timing).await?;

        let secret = device.credentials.enable_secret.map(SecretString::from);

        let mut session = Session::new(device.name.clone(), transport, self.platform.clone())
            .with_timing(timing)
            .with_enable_secret(secret);
        session.establish().await?;
        Ok(session)
    }

    async fn close(&self, session: Session<C::Transport>) {
        let name = session.name().to_string();
        if let Err(e) = session.close().await {
            debug!("{}: close failed: {}", name, e);
        }
    }

    /// Devices named in `names`, or every device when empty.
    async fn targets(&self, names: &[String]) -> Result<Vec<Device>> {
        let inventory = self.inventory.load().await?;
        if names.is_empty() {
            return Ok(inventory.iter().cloned().collect());
        }

        names
            .iter()
            .map(|name| {
                inventory.get(name).cloned().ok_or_else(|| {
                    Error::from(StoreError::NotFound {
                        what: "device",
                        name: name.clone(),
                    })
                })
            })
            .collect()
    }

    /// Load, change and save the inventory, one writer at a time.
    async fn persist<F>(&self, update: F) -> Result<Inventory>
    where
        F: FnOnce(&mut Inventory),
    {
        let _guard = self.inventory_lock.lock().await;
        self.inventory.update(update).await
    }

    /// Log and record how one device fared.
    async fn settle(
        &self,
        kind: OperationKind,
        device: &str,
        outcome: Result<(OperationStatus, String)>,
    ) -> DeviceResult {
        let (status, detail) = match outcome {
            Ok((status, detail)) => {
                info!("{}: {} {}: {}", device, kind, status, detail);
                (status, detail)
            }
            Err(e) => {
                error!("{}: {} failed: {}", device, kind, e);
                (OperationStatus::Failed, format!("{}: {}", e.kind(), e))
            }
        };

        self.oplog
            .record(OperationRecord::new(kind, device, status, detail.clone()))
            .await;

        DeviceResult {
            device: device.to_string(),
            status,
            detail,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::connect::scripted::ScriptedConnector;
    use super::*;
    use crate::config::PathsSection;
    use crate::inventory::Endpoint;
    use crate::oplog::LogQuery;
    use crate::transport::scripted::ScriptedTransport;

    pub(crate) fn fast() -> Timing {
        Timing {
            connect_timeout: Duration::from_millis(200),
            command_timeout: Duration::from_millis(300),
            extended_timeout: Duration::from_millis(300),
            delay_factor: 1,
            nudge_interval: Duration::from_millis(100),
            settle: Duration::from_millis(10),
        }
    }

    pub(crate) fn config(dir: &Path) -> AppConfig {
        AppConfig {
            paths: PathsSection {
                inventory: dir.join("config/devices.yaml"),
                display_cache: dir.join("config/devices_cache.json"),
                backups: dir.join("backups"),
                oplog: dir.join("logs/operations.jsonl"),
                templates: dir.join("config/templates"),
            },
            ..AppConfig::default()
        }
    }

    pub(crate) fn device(name: &str, port: u16) -> Device {
        Device::console(name, Endpoint::new("127.0.0.1", port))
    }

    /// Workflow over scripted lines, with `devices` already on file.
    pub(crate) async fn workflow(
        config: &AppConfig,
        connector: ScriptedConnector,
        devices: &[Device],
    ) -> Workflow<ScriptedConnector> {
        let _ = env_logger::builder().is_test(true).try_init();

        let workflow = Workflow::with_connector(config, connector)
            .unwrap()
            .with_platform(ios::platform().unwrap().with_on_open_commands(Vec::new()))
            .with_timing(fast());

        let mut inventory = Inventory::default();
        for device in devices {
            inventory.upsert(device.clone());
        }
        workflow.inventory_store().save(&inventory).await.unwrap();
        workflow
    }

    /// Console that answers the first poke with `name#`.
    pub(crate) fn router(name: &str) -> ScriptedTransport {
        let prompt = format!("\r\n{}#", name);
        ScriptedTransport::new(TransportProfile::Console).on("", &[prompt.as_str()])
    }

    /// Echo of `command` followed by `body` lines and `prompt`.
    pub(crate) fn reply(command: &str, body: &str, prompt: &str) -> String {
        if body.is_empty() {
            format!("{}\r\n{}", command, prompt)
        } else {
            format!("{}\r\n{}\r\n{}", command, body, prompt)
        }
    }

    #[tokio::test]
    async fn test_unknown_target_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let workflow = workflow(&config, ScriptedConnector::default(), &[device("R1", 5000)]).await;

        assert_eq!(workflow.targets(&[]).await.unwrap().len(), 1);
        assert!(workflow.targets(&["R9".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_device_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let workflow = workflow(&config, ScriptedConnector::default(), &[]).await;

        let device = device("R1", 5000);
        let outcome = workflow.open(&device, TransportProfile::Console).await.map(|_| {
            (OperationStatus::Success, String::new())
        });
        let result = workflow.settle(OperationKind::StatusCheck, "R1", outcome).await;
        assert_eq!(result.status, OperationStatus::Failed);
        assert!(result.detail.starts_with("connection"));

        let records = workflow.oplog().query(&LogQuery::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_ssh_login_falls_back_to_configured_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut r1 = device("R1", 5000);
        r1.management = Some(crate::inventory::ManagementEndpoint {
            host: "10.0.0.1".to_string(),
            port: 22,
            interface: None,
            netmask: None,
        });
        r1.credentials.username = Some("netops".to_string());

        let line = ScriptedTransport::new(TransportProfile::Ssh).banner("\r\nR1#");
        let workflow = workflow(&config, ScriptedConnector::default().with("R1", line), &[]).await;
        workflow.open(&r1, TransportProfile::Ssh).await.unwrap();

        let attempts = workflow.connector.attempts();
        assert_eq!(attempts.len(), 1);
        let (seen, profile) = &attempts[0];
        assert_eq!(*profile, TransportProfile::Ssh);
        assert_eq!(seen.credentials.username.as_deref(), Some("netops"));
        assert_eq!(seen.credentials.password.as_deref(), Some("cisco123"));
        assert_eq!(seen.credentials.enable_secret.as_deref(), Some("enable123"));

        let ssh = seen.transport_config(TransportProfile::Ssh, &fast()).unwrap();
        assert_eq!(ssh.username.as_deref(), Some("netops"));
        assert!(ssh.password.is_some());
    }
}
