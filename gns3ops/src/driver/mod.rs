//! Device sessions and the command protocol.
//!
//! A [`Session`] owns one line to one device for the length of one job:
//! it finds the prompt, tracks the privilege level, runs command
//! sequences and answers confirmation questions.

mod command;
mod privilege;
pub(crate) mod response;
mod session;

pub use command::{CommandSequence, CommandSpec, WaitHint, redact};
pub use privilege::{PrivilegeManager, Transition};
pub use response::{Outcome, Response, normalize_output};
pub use session::{BatchPolicy, CONFIGURATION, PRIVILEGED, Session, Timing};
