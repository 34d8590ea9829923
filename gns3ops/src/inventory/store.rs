//! The YAML inventory file.
//!
//! The inventory is the only store that is ever read back. The JSON display
//! cache is rewritten from it on every save.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::device::Device;
use super::display;
use crate::error::{Result, StoreError};

/// All known devices, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub devices: IndexMap<String, Device>,
}

impl Inventory {
    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Device> {
        self.devices.get_mut(name)
    }

    /// Insert or replace a device, keeping its position if it existed.
    pub fn upsert(&mut self, device: Device) -> Option<Device> {
        self.devices.insert(device.name.clone(), device)
    }

    /// Record a rediscovered device.
    ///
    /// Topology fields come from discovery. Credentials, settings and a
    /// management endpoint already on file survive unless discovery
    /// supplies its own.
    pub fn merge_discovered(&mut self, mut device: Device) {
        if let Some(existing) = self.devices.get(&device.name) {
            if device.credentials == Default::default() {
                device.credentials = existing.credentials.clone();
            }
            if device.management.is_none() {
                device.management = existing.management.clone();
            }
            if device.settings == Default::default() {
                device.settings = existing.settings.clone();
            }
            if device.profile != existing.profile && device.management.is_some() {
                device.profile = existing.profile;
            }
        }
        self.upsert(device);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Write `data` to `path` through a temporary file and a rename.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> std::result::Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Inventory file plus its derived display cache.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    path: PathBuf,
    display_path: Option<PathBuf>,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            display_path: None,
        }
    }

    /// Also regenerate a JSON display cache at `path` on every save.
    pub fn with_display_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.display_path = Some(path.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the inventory. A missing file is an empty inventory.
    pub async fn load(&self) -> Result<Inventory> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No inventory at {}, starting empty", self.path.display());
                return Ok(Inventory::default());
            }
            Err(e) => return Err(StoreError::io(&self.path, e).into()),
        };

        let inventory: Inventory = serde_yaml::from_str(&text).map_err(StoreError::from)?;
        debug!(
            "Loaded {} devices from {}",
            inventory.len(),
            self.path.display()
        );
        Ok(inventory)
    }

    /// Save the inventory and refresh the display cache.
    pub async fn save(&self, inventory: &Inventory) -> Result<()> {
        let yaml = serde_yaml::to_string(inventory).map_err(StoreError::from)?;
        write_atomic(&self.path, yaml.as_bytes()).await?;
        info!(
            "Saved {} devices to {}",
            inventory.len(),
            self.path.display()
        );

        if let Some(display_path) = &self.display_path {
            let json = serde_json::to_vec_pretty(&display::view(inventory))
                .map_err(StoreError::from)?;
            write_atomic(display_path, &json).await?;
        }
        Ok(())
    }

    /// Load, apply `update`, save.
    pub async fn update<F>(&self, update: F) -> Result<Inventory>
    where
        F: FnOnce(&mut Inventory),
    {
        let mut inventory = self.load().await?;
        update(&mut inventory);
        self.save(&inventory).await?;
        Ok(inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::device::{Credentials, Endpoint, ManagementEndpoint};

    fn device(name: &str, port: u16) -> Device {
        Device::console(name, Endpoint::new("127.0.0.1", port))
    }

    #[tokio::test]
    async fn test_round_trip_preserves_names_and_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("config/devices.yaml"))
            .with_display_cache(dir.path().join("config/devices_cache.json"));

        let mut inventory = Inventory::default();
        inventory.upsert(device("R2", 5001));
        inventory.upsert(device("R1", 5000));
        store.save(&inventory).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, inventory);
        assert_eq!(loaded.names().collect::<Vec<_>>(), ["R2", "R1"]);
        assert_eq!(loaded.get("R1").unwrap().endpoint, Endpoint::new("127.0.0.1", 5000));

        let cache = tokio::fs::read_to_string(dir.path().join("config/devices_cache.json"))
            .await
            .unwrap();
        assert!(cache.contains("\"R2\""));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("nope.yaml"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.yaml");
        tokio::fs::write(&path, "devices: [not, a, map").await.unwrap();
        let err = InventoryStore::new(&path).load().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Persistence);
    }

    #[test]
    fn test_merge_keeps_credentials_and_management() {
        let mut inventory = Inventory::default();
        let mut known = device("R1", 5000);
        known.credentials = Credentials {
            username: Some("admin".into()),
            ..Default::default()
        };
        known.management = Some(ManagementEndpoint {
            host: "192.168.1.10".into(),
            port: 22,
            interface: None,
            netmask: None,
        });
        inventory.upsert(known);

        inventory.merge_discovered(device("R1", 5010));
        let merged = inventory.get("R1").unwrap();
        assert_eq!(merged.endpoint.port, 5010);
        assert_eq!(merged.credentials.username.as_deref(), Some("admin"));
        assert!(merged.management.is_some());
        assert_eq!(inventory.len(), 1);
    }
}
