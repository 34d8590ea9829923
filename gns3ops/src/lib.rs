//! # gns3ops
//!
//! Automation for Cisco IOS routers running in a GNS3 lab.
//!
//! gns3ops discovers the running routers of a GNS3 project, drives their
//! CLIs over the telnet console or SSH, and keeps an inventory of what it
//! found. On top of that sit batch operations: state capture, backups and
//! restore, bulk configuration, password rotation and SSH setup.
//!
//! ## Features
//!
//! - Async console (telnet) and SSH transports behind one trait
//! - Tail-anchored prompt matching with automatic answers to confirmation
//!   questions
//! - Privilege level tracking (exec, privileged, configuration)
//! - YAML inventory with a derived JSON display cache
//! - JSON Lines operation log, text backups, configuration templates
//! - Background jobs with per-device locking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gns3ops::{AppConfig, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gns3ops::Error> {
//!     let config = AppConfig::load("gns3ops.toml").await?;
//!     let workflow = Workflow::from_config(&config)?;
//!
//!     let report = workflow.discover_and_capture().await?;
//!     println!("{}", report);
//!
//!     let report = workflow.backup(&[]).await?;
//!     for result in &report.results {
//!         println!("{}: {} {}", result.device, result.status, result.detail);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod channel;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod inventory;
pub mod jobs;
pub mod oplog;
pub mod platform;
pub mod templates;
pub mod transport;
pub mod workflow;

// Re-export main types for convenience
pub use backup::{BackupFile, BackupStore};
pub use config::AppConfig;
pub use discovery::{DiscoveredNode, DiscoveryConfig};
pub use driver::{BatchPolicy, CommandSequence, CommandSpec, Outcome, Response, Session, Timing};
pub use error::{Error, ErrorKind, Result};
pub use inventory::{Device, Inventory, InventoryStore};
pub use jobs::{DeviceLocks, Job, JobRunner, JobState};
pub use oplog::{LogQuery, OperationKind, OperationLog, OperationRecord, OperationStatus};
pub use platform::{PlatformDefinition, PrivilegeLevel};
pub use templates::{Template, TemplateStore};
pub use transport::{Connection, TransportConfig, TransportProfile};
pub use workflow::{BatchReport, DeviceResult, Workflow};
