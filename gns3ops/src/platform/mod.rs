//! Platform definitions.
//!
//! Prompt patterns, privilege levels, canned answers and failure strings
//! for the device CLIs gns3ops drives.

mod definition;
pub mod ios;
mod privilege_level;

pub use definition::PlatformDefinition;
pub use privilege_level::PrivilegeLevel;
