//! Device inventory: records, state capture and persistence.

mod capture;
mod device;
pub mod display;
pub mod parse;
mod store;

pub use capture::capture_state;
pub use device::{
    Credentials, Device, DeviceState, Endpoint, InterfaceState, ManagementEndpoint,
    SessionSettings,
};
pub use display::DisplayEntry;
pub use store::{Inventory, InventoryStore};
pub(crate) use store::write_atomic;
