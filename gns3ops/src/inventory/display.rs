//! Display cache: a flat, presentation-ready view of the inventory.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::store::Inventory;
use crate::transport::TransportProfile;

/// One device as a dashboard would list it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub name: String,

    /// Management address when known, else `console:<port>`.
    pub host: String,

    pub port: u16,

    pub connection_type: TransportProfile,

    pub status: &'static str,

    pub console_host: String,

    pub console_port: u16,

    pub hostname: Option<String>,

    pub uptime: Option<String>,

    pub last_updated: Option<DateTime<Utc>>,
}

/// Build the display view of `inventory`.
pub fn view(inventory: &Inventory) -> Vec<DisplayEntry> {
    inventory
        .iter()
        .map(|device| {
            let management = device
                .management
                .as_ref()
                .map(|m| (m.host.clone(), m.port))
                .or_else(|| device.state.management_ip.clone().map(|ip| (ip, 22)));

            let (host, port, connection_type) = match management {
                Some((host, port)) => (host, port, TransportProfile::Ssh),
                None => (
                    format!("console:{}", device.endpoint.port),
                    device.endpoint.port,
                    TransportProfile::Console,
                ),
            };

            DisplayEntry {
                name: device.name.clone(),
                host,
                port,
                connection_type,
                status: if device.state.reachable {
                    "online"
                } else {
                    "offline"
                },
                console_host: device.endpoint.host.clone(),
                console_port: device.endpoint.port,
                hostname: device.state.hostname.clone(),
                uptime: device.state.uptime.clone(),
                last_updated: device.state.last_seen,
            }
        })
        .collect()
}
