//! Topology discovery against a GNS3 server.
//!
//! Reads the nodes of one project and turns the running routers into
//! console endpoints. Everything that shapes the result (node types, the
//! default console host, the management endpoint table) is passed in
//! explicitly.

mod client;
mod types;

pub use client::Gns3Client;
pub use types::{Node, Project};

use std::time::Duration;

use indexmap::IndexMap;
use log::{info, warn};

use crate::error::Result;
use crate::inventory::{Device, Endpoint, ManagementEndpoint};

/// Console hosts that mean "the server itself".
const WILDCARD_HOSTS: &[&str] = &["", "0.0.0.0", "::", "0:0:0:0:0:0:0:0"];

/// Inputs that shape discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// GNS3 server base URL, e.g. `http://127.0.0.1:3080`.
    pub url: String,

    pub project: String,

    /// Node types kept. Empty keeps every type.
    pub node_types: Vec<String>,

    /// Host used when a node's console listens on a wildcard address.
    pub console_host: String,

    /// Management endpoints by node name.
    pub endpoints: IndexMap<String, ManagementEndpoint>,

    pub request_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3080".to_string(),
            project: String::new(),
            node_types: vec!["dynamips".to_string(), "iou".to_string()],
            console_host: "127.0.0.1".to_string(),
            endpoints: IndexMap::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A running node reachable on its console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredNode {
    pub name: String,
    pub node_id: String,
    pub node_type: String,
    pub status: String,
    pub console: Endpoint,
    pub management: Option<ManagementEndpoint>,
}

impl DiscoveredNode {
    /// Inventory record for this node, nothing captured yet.
    pub fn to_device(&self) -> Device {
        let mut device = Device::console(self.name.clone(), self.console.clone());
        device.node_id = Some(self.node_id.clone());
        device.node_type = Some(self.node_type.clone());
        device.management = self.management.clone();
        device
    }
}

/// Keep the started nodes of interest that have a telnet console.
///
/// Skipped nodes are logged, never an error.
pub fn select_nodes(nodes: Vec<Node>, config: &DiscoveryConfig) -> Vec<DiscoveredNode> {
    nodes
        .into_iter()
        .filter_map(|node| {
            if !config.node_types.is_empty() && !config.node_types.contains(&node.node_type) {
                info!("Skipping {} ({}): not a router type", node.name, node.node_type);
                return None;
            }

            if node.status != "started" {
                info!("Skipping {}: status {}", node.name, node.status);
                return None;
            }

            let Some(port) = node.console else {
                warn!("Router {} has no console port configured", node.name);
                return None;
            };

            if let Some(kind) = node.console_type.as_deref() {
                if kind != "telnet" {
                    warn!("Router {} console is {}, not telnet", node.name, kind);
                    return None;
                }
            }

            let host = match node.console_host.as_deref() {
                Some(host) if !WILDCARD_HOSTS.contains(&host) => host.to_string(),
                _ => config.console_host.clone(),
            };

            Some(DiscoveredNode {
                management: config.endpoints.get(&node.name).cloned(),
                console: Endpoint::new(host, port),
                name: node.name,
                node_id: node.node_id,
                node_type: node.node_type,
                status: node.status,
            })
        })
        .collect()
}

/// Discover the routers of the configured project.
pub async fn discover(config: &DiscoveryConfig) -> Result<Vec<DiscoveredNode>> {
    let client = Gns3Client::new(&config.url, config.request_timeout)?;
    let project = client.project(&config.project).await?;
    info!("Found project {} ({})", project.name, project.project_id);

    let nodes = client.nodes(&project.project_id).await?;
    info!("Project {} has {} nodes", project.name, nodes.len());

    let selected = select_nodes(nodes, config);
    for node in &selected {
        info!("Found router {} on {} (telnet)", node.name, node.console);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryError, Error};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn node(name: &str, node_type: &str, status: &str, console: Option<u16>) -> Node {
        Node {
            name: name.to_string(),
            node_id: format!("id-{}", name),
            node_type: node_type.to_string(),
            status: status.to_string(),
            console,
            console_host: Some("0.0.0.0".to_string()),
            console_type: Some("telnet".to_string()),
        }
    }

    #[test]
    fn test_only_started_routers_with_console() {
        let nodes = vec![
            node("R1", "dynamips", "started", Some(5000)),
            node("R2", "dynamips", "stopped", Some(5001)),
            node("R3", "dynamips", "started", None),
            node("SW1", "ethernet_switch", "started", Some(5003)),
            node("R4", "iou", "started", Some(5004)),
        ];

        let selected = select_nodes(nodes, &DiscoveryConfig::default());
        let names: Vec<_> = selected.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["R1", "R4"]);
        assert!(selected.iter().all(|n| n.status == "started"));
        assert_eq!(selected[0].console, Endpoint::new("127.0.0.1", 5000));
    }

    #[test]
    fn test_empty_type_filter_keeps_all_types() {
        let config = DiscoveryConfig {
            node_types: Vec::new(),
            ..DiscoveryConfig::default()
        };
        let nodes = vec![
            node("SW1", "ethernet_switch", "started", Some(5003)),
            node("PC1", "vpcs", "suspended", Some(5004)),
        ];
        assert_eq!(select_nodes(nodes, &config).len(), 1);
    }

    #[test]
    fn test_console_host_and_type() {
        let mut remote = node("R1", "dynamips", "started", Some(5000));
        remote.console_host = Some("10.0.0.5".to_string());
        let mut vnc = node("R2", "dynamips", "started", Some(5901));
        vnc.console_type = Some("vnc".to_string());

        let selected = select_nodes(vec![remote, vnc], &DiscoveryConfig::default());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].console.host, "10.0.0.5");
    }

    #[test]
    fn test_management_endpoint_from_table() {
        let mut config = DiscoveryConfig::default();
        config.endpoints.insert(
            "R1".to_string(),
            ManagementEndpoint {
                host: "192.168.1.10".to_string(),
                port: 22,
                interface: Some("FastEthernet0/0".to_string()),
                netmask: Some("255.255.255.0".to_string()),
            },
        );

        let selected = select_nodes(
            vec![
                node("R1", "dynamips", "started", Some(5000)),
                node("R2", "dynamips", "started", Some(5001)),
            ],
            &config,
        );
        assert_eq!(selected[0].management.as_ref().unwrap().host, "192.168.1.10");
        assert!(selected[1].management.is_none());

        let device = selected[0].to_device();
        assert_eq!(device.node_type.as_deref(), Some("dynamips"));
        assert!(device.management.is_some());
    }

    /// Serve canned JSON bodies by request path, one connection per request.
    async fn serve(routes: Vec<(&'static str, u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("").to_string();

                let (status, body) = routes
                    .iter()
                    .find(|(route, _, _)| *route == path)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or((404, "not found"));
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_discover_against_server() {
        let url = serve(vec![
            (
                "/v2/projects",
                200,
                r#"[{"name": "Other", "project_id": "p0"}, {"name": "Solange", "project_id": "p1", "status": "opened"}]"#,
            ),
            (
                "/v2/projects/p1/nodes",
                200,
                r#"[
                    {"name": "R1", "node_id": "n1", "node_type": "dynamips", "status": "started", "console": 5000, "console_host": "0.0.0.0", "console_type": "telnet"},
                    {"name": "R2", "node_id": "n2", "node_type": "dynamips", "status": "stopped", "console": 5001, "console_host": "0.0.0.0", "console_type": "telnet"}
                ]"#,
            ),
        ])
        .await;

        let config = DiscoveryConfig {
            url,
            project: "Solange".to_string(),
            ..DiscoveryConfig::default()
        };
        let nodes = discover(&config).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "R1");
        assert_eq!(nodes[0].console.to_string(), "127.0.0.1:5000");

        let missing = DiscoveryConfig {
            project: "Nope".to_string(),
            ..config.clone()
        };
        let err = discover(&missing).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Discovery(DiscoveryError::ProjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let url = serve(vec![("/v2/projects", 500, "boom")]).await;
        let client = Gns3Client::new(&url, Duration::from_secs(5)).unwrap();
        let err = client.projects().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Discovery(DiscoveryError::Api { status: 500, .. })
        ));
    }
}
