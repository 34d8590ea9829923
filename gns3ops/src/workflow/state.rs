//! Discovery and state refresh.

use log::{info, warn};

use super::{BatchReport, Connector, DeviceResult, Workflow};
use crate::discovery::{DiscoveredNode, discover};
use crate::error::Result;
use crate::inventory::{Device, DeviceState, capture_state};
use crate::oplog::{OperationKind, OperationRecord, OperationStatus};

impl<C: Connector> Workflow<C> {
    /// Discover the project's routers, record them and capture their state.
    ///
    /// Devices already on file keep their credentials, settings and
    /// management endpoint. A router that cannot be reached is still
    /// recorded, marked unreachable.
    pub async fn discover_and_capture(&self) -> Result<BatchReport> {
        let nodes = match discover(&self.discovery).await {
            Ok(nodes) => nodes,
            Err(e) => {
                self.oplog
                    .record(OperationRecord::new(
                        OperationKind::Discovery,
                        self.discovery.project.clone(),
                        OperationStatus::Failed,
                        e.to_string(),
                    ))
                    .await;
                return Err(e);
            }
        };
        info!(
            "Discovered {} routers in {}",
            nodes.len(),
            self.discovery.project
        );

        self.capture_discovered(&nodes).await
    }

    async fn capture_discovered(&self, nodes: &[DiscoveredNode]) -> Result<BatchReport> {
        let inventory = self
            .persist(|inventory| {
                for node in nodes {
                    inventory.merge_discovered(node.to_device());
                }
            })
            .await?;

        let mut report = BatchReport::new(OperationKind::Discovery);
        for node in nodes {
            let Some(device) = inventory.get(&node.name) else {
                continue;
            };
            let captured = self.capture(device).await;
            report.push(
                self.store_state(OperationKind::Discovery, &device.name, captured)
                    .await,
            );
        }
        Ok(report)
    }

    /// Reconnect to devices (all when `names` is empty) and refresh their
    /// recorded state.
    pub async fn status_check(&self, names: &[String]) -> Result<BatchReport> {
        let mut report = BatchReport::new(OperationKind::StatusCheck);
        for device in self.targets(names).await? {
            let captured = self.capture(&device).await;
            report.push(
                self.store_state(OperationKind::StatusCheck, &device.name, captured)
                    .await,
            );
        }
        Ok(report)
    }

    async fn capture(&self, device: &Device) -> Result<DeviceState> {
        let _guard = self.locks.lock(&device.name).await;
        let mut session = self.open(device, device.profile).await?;
        let state = capture_state(&mut session, self.management_interfaces.as_slice()).await;
        self.close(session).await;
        state
    }

    /// Save a capture result on the device record and log the outcome.
    async fn store_state(
        &self,
        kind: OperationKind,
        name: &str,
        captured: Result<DeviceState>,
    ) -> DeviceResult {
        let outcome = match captured {
            Ok(state) => {
                let detail = format!(
                    "hostname {}, {} interfaces, management {}",
                    state.hostname.as_deref().unwrap_or("unknown"),
                    state.interfaces.len(),
                    state.management_ip.as_deref().unwrap_or("none")
                );
                self.persist(|inventory| {
                    if let Some(device) = inventory.get_mut(name) {
                        device.state = state;
                    }
                })
                .await
                .map(|_| (OperationStatus::Success, detail))
            }
            Err(e) => {
                let message = e.to_string();
                let saved = self
                    .persist(|inventory| {
                        if let Some(device) = inventory.get_mut(name) {
                            device.state.reachable = false;
                            device.state.last_error = Some(message);
                        }
                    })
                    .await;
                if let Err(save_error) = saved {
                    warn!("{}: could not record failure: {}", name, save_error);
                }
                Err(e)
            }
        };

        self.settle(kind, name, outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::connect::scripted::ScriptedConnector;
    use super::super::tests::{config, device, reply, router, workflow};
    use crate::discovery::DiscoveredNode;
    use crate::inventory::{Credentials, Endpoint, parse};
    use crate::oplog::{LogQuery, OperationKind, OperationStatus};

    fn capture_script(name: &str) -> crate::transport::scripted::ScriptedTransport {
        let prompt = format!("{}#", name);
        let hostname = reply(parse::SHOW_HOSTNAME, &format!("hostname {}", name), &prompt);
        let uptime = reply(
            parse::SHOW_UPTIME,
            &format!("{} uptime is 12 minutes", name),
            &prompt,
        );
        let memory = reply(
            parse::SHOW_MEMORY,
            "Cisco 3725 (R7000) processor (revision 0.1) with 124928K/6144K bytes of memory.",
            &prompt,
        );
        let count = reply(
            parse::SHOW_CONFIG_COUNT,
            "Number of lines which match regexp = 112",
            &prompt,
        );
        let brief = reply(
            parse::SHOW_INTERFACES,
            "Interface              IP-Address      OK? Method Status                Protocol\r\n\
             FastEthernet0/0        192.168.1.1     YES manual up                    up\r\n\
             FastEthernet0/1        unassigned      YES unset  administratively down down",
            &prompt,
        );

        router(name)
            .on(parse::SHOW_HOSTNAME, &[hostname.as_str()])
            .on(parse::SHOW_UPTIME, &[uptime.as_str()])
            .on(parse::SHOW_MEMORY, &[memory.as_str()])
            .on(parse::SHOW_CONFIG_COUNT, &[count.as_str()])
            .on(parse::SHOW_INTERFACES, &[brief.as_str()])
    }

    #[tokio::test]
    async fn test_status_check_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let connector = ScriptedConnector::default().with("R1", capture_script("R1"));
        let workflow = workflow(&config, connector, &[device("R1", 5000), device("R2", 5001)]).await;

        let report = workflow.status_check(&[]).await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.get("R1").unwrap().status, OperationStatus::Success);
        assert_eq!(report.get("R2").unwrap().status, OperationStatus::Failed);

        let inventory = workflow.inventory_store().load().await.unwrap();
        let r1 = &inventory.get("R1").unwrap().state;
        assert!(r1.reachable);
        assert_eq!(r1.hostname.as_deref(), Some("R1"));
        assert_eq!(r1.management_ip.as_deref(), Some("192.168.1.1"));
        assert_eq!(r1.config_lines, Some(112));

        let r2 = &inventory.get("R2").unwrap().state;
        assert!(!r2.reachable);
        assert!(r2.last_error.is_some());

        let records = workflow
            .oplog()
            .query(&LogQuery {
                kind: Some(OperationKind::StatusCheck),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_discovered_nodes_merge_and_capture() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let mut known = device("R1", 4999);
        known.credentials = Credentials {
            username: Some("admin".into()),
            ..Default::default()
        };
        let connector = ScriptedConnector::default().with("R1", capture_script("R1"));
        let workflow = workflow(&config, connector, &[known]).await;

        let nodes = vec![
            DiscoveredNode {
                name: "R1".into(),
                node_id: "n1".into(),
                node_type: "dynamips".into(),
                status: "started".into(),
                console: Endpoint::new("127.0.0.1", 5000),
                management: None,
            },
            DiscoveredNode {
                name: "R2".into(),
                node_id: "n2".into(),
                node_type: "dynamips".into(),
                status: "started".into(),
                console: Endpoint::new("127.0.0.1", 5001),
                management: None,
            },
        ];

        let report = workflow.capture_discovered(&nodes).await.unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);

        let inventory = workflow.inventory_store().load().await.unwrap();
        assert_eq!(inventory.names().collect::<Vec<_>>(), ["R1", "R2"]);
        let r1 = inventory.get("R1").unwrap();
        assert_eq!(r1.endpoint.port, 5000);
        assert_eq!(r1.credentials.username.as_deref(), Some("admin"));
        assert!(r1.state.reachable);
        assert!(!inventory.get("R2").unwrap().state.reachable);
    }
}
