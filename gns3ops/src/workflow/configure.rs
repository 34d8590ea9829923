//! Operations that read or change device configuration.

use std::path::Path;

use log::{info, warn};

use super::commands::{SshSetup, password_commands};
use super::report::judge;
use super::{BatchReport, Connector, Workflow};
use crate::backup::{BackupFile, fetch_running_config, restore_lines};
use crate::driver::{BatchPolicy, CommandSequence, CommandSpec, Session};
use crate::error::{DriverError, Result, StoreError};
use crate::inventory::{Device, ManagementEndpoint};
use crate::oplog::{OperationKind, OperationStatus};
use crate::transport::{Transport, TransportProfile};

const SHOW_IP_SSH: &str = "show ip ssh";

/// Enable, apply `sequence` in configuration mode, save.
async fn configure<T: Transport>(
    session: &mut Session<T>,
    sequence: &CommandSequence,
    policy: BatchPolicy,
) -> Result<(OperationStatus, String)> {
    session.enable().await?;
    let responses = session.send_config(sequence, policy).await?;
    let saved = session.save_config().await?;
    Ok(judge(&responses, Some(&saved)))
}

impl<C: Connector> Workflow<C> {
    /// Save the running configuration of each device (all when `names` is
    /// empty) to the backup directory.
    pub async fn backup(&self, names: &[String]) -> Result<BatchReport> {
        let mut report = BatchReport::new(OperationKind::Backup);
        for device in self.targets(names).await? {
            let outcome = self.backup_device(&device).await;
            report.push(self.settle(OperationKind::Backup, &device.name, outcome).await);
        }
        Ok(report)
    }

    async fn backup_device(&self, device: &Device) -> Result<(OperationStatus, String)> {
        let config = {
            let _guard = self.locks.lock(&device.name).await;
            let mut session = self.open(device, device.profile).await?;
            let config = fetch_running_config(&mut session).await;
            self.close(session).await;
            config?
        };

        let backup = self.backups.save(&device.name, &config).await?;
        Ok((
            OperationStatus::Success,
            format!("saved {}", backup.path.display()),
        ))
    }

    /// Replay a backup onto `name`: the latest one, or `file` when given.
    pub async fn restore(&self, name: &str, file: Option<&Path>) -> Result<BatchReport> {
        let device = self
            .targets(&[name.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound {
                what: "device",
                name: name.to_string(),
            })?;

        let outcome = self.restore_device(&device, file).await;
        let mut report = BatchReport::new(OperationKind::Restore);
        report.push(self.settle(OperationKind::Restore, name, outcome).await);
        Ok(report)
    }

    async fn restore_device(
        &self,
        device: &Device,
        file: Option<&Path>,
    ) -> Result<(OperationStatus, String)> {
        let backup = match file {
            Some(path) => BackupFile {
                device: device.name.clone(),
                path: path.to_path_buf(),
                taken: chrono::Local::now().naive_local(),
                size: 0,
                sequence: 1,
            },
            None => self.backups.latest(&device.name).await?,
        };
        let text = self.backups.read(&backup).await?;

        let sequence = restore_lines(&text);
        if sequence.is_empty() {
            return Err(DriverError::InvalidConfig {
                message: format!("{} holds no configuration lines", backup.path.display()),
            }
            .into());
        }
        info!(
            "{}: restoring {} lines from {}",
            device.name,
            sequence.len(),
            backup.path.display()
        );

        let (status, detail) = self.apply(device, device.profile, &sequence).await?;
        Ok((
            status,
            format!("{} from {}", detail, backup.path.display()),
        ))
    }

    /// Apply `sequence` in configuration mode on each device, then save.
    pub async fn bulk_configure(
        &self,
        names: &[String],
        sequence: &CommandSequence,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new(OperationKind::BulkConfig);
        for device in self.targets(names).await? {
            let outcome = self.apply(&device, device.profile, sequence).await;
            report.push(
                self.settle(OperationKind::BulkConfig, &device.name, outcome)
                    .await,
            );
        }
        Ok(report)
    }

    /// Set a new local user password (and enable secret) on each device.
    ///
    /// Stored credentials change only for devices where everything was
    /// applied and saved.
    pub async fn rotate_password(
        &self,
        names: &[String],
        username: &str,
        password: &str,
        enable_secret: Option<&str>,
    ) -> Result<BatchReport> {
        let sequence = password_commands(username, password, enable_secret);
        let mut report = BatchReport::new(OperationKind::PasswordRotation);

        for device in self.targets(names).await? {
            let mut outcome = self.apply(&device, device.profile, &sequence).await;
            if let Ok((OperationStatus::Success, _)) = &outcome {
                let saved = self
                    .persist(|inventory| {
                        if let Some(record) = inventory.get_mut(&device.name) {
                            record.credentials.username = Some(username.to_string());
                            record.credentials.password = Some(password.to_string());
                            if let Some(secret) = enable_secret {
                                record.credentials.enable_secret = Some(secret.to_string());
                            }
                        }
                    })
                    .await;
                if let Err(e) = saved {
                    outcome = Err(e);
                }
            }
            report.push(
                self.settle(OperationKind::PasswordRotation, &device.name, outcome)
                    .await,
            );
        }
        Ok(report)
    }

    /// Configure SSH access over each device's console.
    ///
    /// On success the device keeps the configured credentials. With a
    /// management endpoint, SSH is then tried with those credentials and the
    /// device switches to SSH for later sessions when it answers.
    pub async fn setup_ssh(&self, names: &[String]) -> Result<BatchReport> {
        let mut report = BatchReport::new(OperationKind::SshSetup);

        for device in self.targets(names).await? {
            let management = device
                .management
                .clone()
                .or_else(|| self.discovery.endpoints.get(&device.name).cloned());

            let (Some(username), Some(password)) =
                (&self.credentials.username, &self.credentials.password)
            else {
                let outcome = Err(DriverError::InvalidConfig {
                    message: "SSH setup needs a username and password".to_string(),
                }
                .into());
                report.push(self.settle(OperationKind::SshSetup, &device.name, outcome).await);
                continue;
            };

            let setup = SshSetup {
                domain_name: &self.ssh.domain_name,
                username,
                password,
                enable_secret: self.credentials.enable_secret.as_deref(),
                key_modulus: self.ssh.key_modulus,
                management: management.as_ref(),
            };

            let mut outcome = self
                .apply(&device, TransportProfile::Console, &setup.commands())
                .await;

            if let Ok((OperationStatus::Success, detail)) = outcome {
                let credentials = self.credentials.clone();
                let endpoint = management.clone();
                outcome = self
                    .persist(|inventory| {
                        if let Some(record) = inventory.get_mut(&device.name) {
                            record.credentials = credentials;
                            if endpoint.is_some() {
                                record.management = endpoint;
                                record.profile = TransportProfile::Ssh;
                            }
                        }
                    })
                    .await
                    .map(|_| match &management {
                        Some(endpoint) => (
                            OperationStatus::Success,
                            format!("{}, SSH on {}", detail, endpoint.endpoint()),
                        ),
                        None => (OperationStatus::Success, detail),
                    });
            }

            report.push(self.settle(OperationKind::SshSetup, &device.name, outcome).await);
        }
        Ok(report)
    }

    /// Keep the configured credentials, then log in over SSH. The device
    /// switches to SSH only once that login works; otherwise the setup is
    /// partial and the device stays on its console.
    async fn finish_ssh_setup(
        &self,
        device: &Device,
        management: Option<ManagementEndpoint>,
        detail: String,
    ) -> Result<(OperationStatus, String)> {
        let credentials = self.credentials.clone();
        let endpoint = management.clone();
        self.persist(|inventory| {
            if let Some(record) = inventory.get_mut(&device.name) {
                record.credentials = credentials;
                if endpoint.is_some() {
                    record.management = endpoint;
                }
            }
        })
        .await?;

        let Some(management) = management else {
            return Ok((OperationStatus::Success, detail));
        };
        let address = management.endpoint();
        let target = Device {
            credentials: self.credentials.clone(),
            management: Some(management),
            ..device.clone()
        };

        match self.verify_ssh(&target).await {
            Ok(()) => {
                self.persist(|inventory| {
                    if let Some(record) = inventory.get_mut(&device.name) {
                        record.profile = TransportProfile::Ssh;
                    }
                })
                .await?;
                Ok((
                    OperationStatus::Success,
                    format!("{}, SSH on {}", detail, address),
                ))
            }
            Err(reason) => {
                warn!("{}: SSH on {} not usable: {}", device.name, address, reason);
                Ok((
                    OperationStatus::Partial,
                    format!("{}, SSH on {} not verified: {}", detail, address, reason),
                ))
            }
        }
    }

    /// Log in over SSH and check that the server reports itself enabled.
    async fn verify_ssh(&self, device: &Device) -> std::result::Result<(), String> {
        let _guard = self.locks.lock(&device.name).await;
        let mut session = self
            .open(device, TransportProfile::Ssh)
            .await
            .map_err(|e| format!("{}: {}", e.kind(), e))?;
        let shown = session.execute(&CommandSpec::new(SHOW_IP_SSH)).await;
        self.close(session).await;

        let response = shown.map_err(|e| format!("{}: {}", e.kind(), e))?;
        if response.result.contains("SSH Enabled") {
            Ok(())
        } else {
            Err(format!("'{}' does not report SSH enabled", SHOW_IP_SSH))
        }
    }

    /// One locked session that configures and saves.
    async fn apply(
        &self,
        device: &Device,
        profile: TransportProfile,
        sequence: &CommandSequence,
    ) -> Result<(OperationStatus, String)> {
        let _guard = self.locks.lock(&device.name).await;
        let mut session = self.open(device, profile).await?;
        let outcome = configure(&mut session, sequence, self.policy).await;
        self.close(session).await;
        outcome
    }
}
