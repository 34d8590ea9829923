//! GNS3 REST payloads (the fields gns3ops reads).

use serde::Deserialize;

/// A project as listed by `GET /v2/projects`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub name: String,
    pub project_id: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// A node as listed by `GET /v2/projects/{id}/nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Node {
    pub name: String,
    pub node_id: String,
    pub node_type: String,

    #[serde(default)]
    pub status: String,

    /// Console TCP port. Absent or null when the node has no console.
    #[serde(default)]
    pub console: Option<u16>,

    #[serde(default)]
    pub console_host: Option<String>,

    #[serde(default)]
    pub console_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_payload() {
        let json = r#"{
            "name": "R1",
            "node_id": "6f0ed2c4-7f40-4a4b-9d2b-1c9c5b0e8f3a",
            "node_type": "dynamips",
            "status": "started",
            "console": 5000,
            "console_host": "0.0.0.0",
            "console_type": "telnet",
            "properties": {"platform": "c3725"}
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.console, Some(5000));
        assert_eq!(node.console_type.as_deref(), Some("telnet"));

        let json = r#"{"name": "SW1", "node_id": "x", "node_type": "ethernet_switch", "console": null}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.console, None);
        assert_eq!(node.status, "");
    }
}
